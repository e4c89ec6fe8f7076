//! Health monitoring for resource pools

use crate::metrics::PoolMetrics;

/// Share of probed or aged-out resources above which the pool is flagged
const HIGH_EVICTION_RATIO: f64 = 0.5;

/// Health status of a resource pool
///
/// # Examples
///
/// ```
/// use freshpool::{PoolConfiguration, Resource, ResourcePool};
/// use std::convert::Infallible;
///
/// struct Conn;
///
/// impl Resource for Conn {
///     type Error = Infallible;
///     fn ping(&mut self) -> Result<(), Infallible> { Ok(()) }
///     fn close(self) -> Result<(), Infallible> { Ok(()) }
/// }
///
/// let pool = ResourcePool::new(|| Ok::<_, Infallible>(Conn), PoolConfiguration::new().with_capacity(3));
///
/// let health = pool.get_health_status();
/// assert!(health.is_healthy());
/// assert_eq!(health.available_resources, 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct HealthStatus {
    /// Whether the pool is healthy
    pub is_healthy: bool,

    /// Number of warnings detected
    pub warning_count: usize,

    /// Idle resources in the holding area
    pub available_resources: usize,

    /// Holding area capacity
    pub total_capacity: usize,

    /// Whether the pool has been closed
    pub is_closed: bool,

    /// Warning messages
    pub warnings: Vec<String>,
}

impl HealthStatus {
    /// Derive a health status from a metrics snapshot
    pub fn from_metrics(metrics: &PoolMetrics) -> Self {
        let mut warnings = Vec::new();
        let mut is_healthy = true;

        if metrics.is_closed {
            warnings.push("Pool is closed".to_string());
            is_healthy = false;
        }

        // Every factory call failed: nothing can be handed out once the buffer runs dry
        if metrics.creation_failures > 0 && metrics.total_created == 0 {
            warnings.push(format!(
                "Factory failing: {} failures, no successful creations",
                metrics.creation_failures
            ));
            is_healthy = false;
        }

        if metrics.available_resources == 0 && metrics.max_capacity > 0 && !metrics.is_closed {
            warnings.push("Holding area is empty".to_string());
        }

        let checked = metrics.total_reused + metrics.total_evictions();
        if checked > 0 {
            let ratio = metrics.total_evictions() as f64 / checked as f64;
            if ratio > HIGH_EVICTION_RATIO {
                warnings.push(format!("High eviction rate: {:.1}%", ratio * 100.0));
            }
        }

        if metrics.close_errors > 0 {
            warnings.push(format!("{} resource close errors", metrics.close_errors));
        }

        Self {
            is_healthy,
            warning_count: warnings.len(),
            available_resources: metrics.available_resources,
            total_capacity: metrics.max_capacity,
            is_closed: metrics.is_closed,
            warnings,
        }
    }

    /// Check if the pool is healthy
    pub fn is_healthy(&self) -> bool {
        self.is_healthy
    }
}
