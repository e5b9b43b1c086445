use async_trait::async_trait;
use thiserror::Error;

use crate::models::Reading;
use crate::query::QueryPlan;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The statement failed or the database could not be reached.
    #[error("database error: {0}")]
    Upstream(#[from] sqlx::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read access to the time-series table.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Check that the database answers. Used at startup and by `/health`.
    async fn ping(&self) -> StoreResult<()>;

    /// Execute a compiled plan and return its rows in plan order.
    ///
    /// Rows that fail to decode are skipped; statement failures are returned.
    async fn fetch(&self, plan: &QueryPlan) -> StoreResult<Vec<Reading>>;
}
