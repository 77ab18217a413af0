use serde::{Deserialize, Serialize};

use crate::contracts::EntityError;
use crate::entity::Identified;

/// A customer payment for a salon package.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// `PID<n>`, assigned on creation.
    #[serde(default)]
    pub payment_id: Option<String>,
    /// Customer reference, unique across payments when present.
    #[serde(default)]
    pub cus_id: Option<String>,
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub payment_date: String,
    #[serde(default)]
    pub package_amount: String,
    #[serde(default)]
    pub total_amount: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub email: String,
}

impl Payment {
    fn cus_id(&self) -> &str {
        self.cus_id.as_deref().unwrap_or("")
    }

    fn require(fields: &[(&str, &str)]) -> Result<(), EntityError> {
        let missing: Vec<&str> = fields
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(EntityError::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )))
        }
    }
}

impl Identified for Payment {
    const COLLECTION: &'static str = "payments";
    const SEQUENCE: &'static str = "PaymentID";
    const PREFIX: &'static str = "PID";
    const ID_FIELD: &'static str = "payment_id";
    const LOOKUP_FIELDS: &'static [&'static str] = &["cus_id"];

    fn sequential_id(&self) -> Option<&str> {
        self.payment_id.as_deref()
    }

    fn set_sequential_id(&mut self, id: String) {
        self.payment_id = Some(id);
    }

    fn unique_fields(&self) -> Vec<(&'static str, String)> {
        match self.cus_id.as_deref().map(str::trim) {
            Some(cus_id) if !cus_id.is_empty() => vec![("cus_id", cus_id.to_string())],
            _ => Vec::new(),
        }
    }

    fn validate_new(&self) -> Result<(), EntityError> {
        Self::require(&[
            ("user_name", self.user_name.as_str()),
            ("payment_date", self.payment_date.as_str()),
            ("package_amount", self.package_amount.as_str()),
            ("total_amount", self.total_amount.as_str()),
            ("method", self.method.as_str()),
            ("email", self.email.as_str()),
        ])
    }

    fn validate_update(&self) -> Result<(), EntityError> {
        Self::require(&[
            ("cus_id", self.cus_id()),
            ("payment_date", self.payment_date.as_str()),
            ("package_amount", self.package_amount.as_str()),
            ("total_amount", self.total_amount.as_str()),
            ("method", self.method.as_str()),
        ])
    }
}
