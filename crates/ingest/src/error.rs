use thiserror::Error;

/// Raised by platform adapters only when a structurally required field is
/// absent. Field-sparse but well-formed payloads never error; optional fields
/// fall back to documented defaults instead.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Failures reported by the order-store collaborator. `Unavailable` is the
/// only transient class; everything else is permanent and must not be retried.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Uniqueness violation on (tenant_id, external_id).
    #[error("order already exists for this tenant/external id")]
    Duplicate,
    #[error("order not found")]
    NotFound,
    /// Connectivity or timeout talking to the store.
    #[error("order store unavailable: {0}")]
    Unavailable(String),
    /// Domain-level rejection other than not-found.
    #[error("order store rejected operation: {0}")]
    Rejected(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}
