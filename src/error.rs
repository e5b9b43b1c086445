use thiserror::Error;

use crate::report::export::ExportError;
use crate::storage::StoreError;

/// Failures surfaced by the read and export pipelines.
///
/// An empty result is not an error; it comes back as an envelope with
/// `status = false`.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed request input. The store is never queried.
    #[error("{0}")]
    Validation(String),
    /// The store rejected the statement or could not be reached.
    #[error(transparent)]
    Upstream(#[from] StoreError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
