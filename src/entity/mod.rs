//! Entities stamped with sequential identifiers.

mod hook;
mod payment;
mod repository;

pub use hook::{CreationHook, HookOutcome};
pub use payment::Payment;
pub use repository::{Repository, Stored};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::contracts::EntityError;
use crate::sequence::IdFormat;

/// An entity kind whose records carry a sequential identifier.
///
/// # Invariants
/// - The identifier is assigned once, when the record is first created
/// - Updates never change it
pub trait Identified: Serialize + DeserializeOwned + Send + Sync {
    /// Collection the records are stored in.
    const COLLECTION: &'static str;
    /// Counter the identifiers are drawn from.
    const SEQUENCE: &'static str;
    /// Text placed before the counter value.
    const PREFIX: &'static str;
    /// Name of the unique-indexed identifier field.
    const ID_FIELD: &'static str;
    /// Other unique fields searched by `Repository::lookup`, in order.
    const LOOKUP_FIELDS: &'static [&'static str] = &[];

    fn sequential_id(&self) -> Option<&str>;

    fn set_sequential_id(&mut self, id: String);

    /// Unique-indexed fields besides the identifier.
    fn unique_fields(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Checks a record before it is created.
    fn validate_new(&self) -> Result<(), EntityError> {
        Ok(())
    }

    /// Checks replacement contents before an update.
    fn validate_update(&self) -> Result<(), EntityError> {
        Ok(())
    }

    fn id_format() -> IdFormat {
        IdFormat::new(Self::PREFIX)
    }
}
