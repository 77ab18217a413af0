use std::sync::Arc;

use crate::contracts::{SequenceAllocator, SequenceError};
use crate::entity::Identified;

/// What the creation hook did to an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    Assigned(String),
    /// The entity already exists; its identifier was left alone.
    Skipped,
}

/// Stamps new entities with `PREFIX + next value` before they are persisted.
pub struct CreationHook<A> {
    allocator: Arc<A>,
}

impl<A: SequenceAllocator> CreationHook<A> {
    pub fn new(allocator: Arc<A>) -> Self {
        Self { allocator }
    }

    pub fn allocator(&self) -> &Arc<A> {
        &self.allocator
    }

    /// Runs before an entity write.
    ///
    /// For a new entity this allocates from `E::SEQUENCE` and overwrites any
    /// identifier the caller supplied. For an existing entity it does nothing.
    /// On error the entity is left unchanged and must not be written.
    pub async fn before_insert<E: Identified>(
        &self,
        entity: &mut E,
        is_new: bool,
    ) -> Result<HookOutcome, SequenceError> {
        if !is_new {
            return Ok(HookOutcome::Skipped);
        }

        let value = self.allocator.next_value(E::SEQUENCE).await?;
        let id = E::id_format().format(value);
        entity.set_sequential_id(id.clone());
        Ok(HookOutcome::Assigned(id))
    }
}
