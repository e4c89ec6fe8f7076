//! Error types for the resource pool

use crate::resource::BoxError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("Pool is closed")]
    Closed,

    #[error("Failed to create resource: {0}")]
    CreationFailed(#[source] BoxError),

    #[error("Operation was cancelled")]
    Cancelled,
}

impl PoolError {
    /// Whether this error came from a closed pool
    pub fn is_closed(&self) -> bool {
        matches!(self, PoolError::Closed)
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
