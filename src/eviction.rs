//! Staleness tracking for buffered resources

use std::time::{Duration, Instant};

/// Why a buffered resource was thrown away instead of handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
    /// Sat in the holding area longer than the stale timeout
    Stale,

    /// Failed its liveness probe
    Dead,
}

/// A resource plus the instant it entered the pool
#[derive(Debug)]
pub(crate) struct Timestamped<R> {
    resource: R,
    since: Instant,
}

impl<R> Timestamped<R> {
    pub fn now(resource: R) -> Self {
        Self {
            resource,
            since: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.since.elapsed()
    }

    /// Strictly older than `timeout`
    pub fn is_stale(&self, timeout: Duration) -> bool {
        self.age() > timeout
    }

    pub fn into_inner(self) -> R {
        self.resource
    }

    pub fn resource_mut(&mut self) -> &mut R {
        &mut self.resource
    }
}
