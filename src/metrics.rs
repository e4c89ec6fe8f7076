//! Metrics collection and export for resource pools

use crate::eviction::EvictionReason;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metrics data for a pool
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
/// let pool = ResourcePool::new(|| Ok::<_, Infallible>(Conn), PoolConfiguration::new().with_capacity(2));
///
/// let conn = pool.get().unwrap();
/// let metrics = pool.get_metrics();
/// assert_eq!(metrics.total_created, 2);
/// assert_eq!(metrics.total_reused, 1);
/// assert_eq!(metrics.available_resources, 1);
/// # pool.put(conn);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PoolMetrics {
    /// Resources successfully created by the factory
    pub total_created: usize,

    /// Factory calls that failed
    pub creation_failures: usize,

    /// Acquires served from the holding area
    pub total_reused: usize,

    /// Releases accepted back into the holding area
    pub total_returned: usize,

    /// Buffered resources discarded for exceeding the stale timeout
    pub stale_evictions: usize,

    /// Buffered resources discarded after a failed liveness probe
    pub dead_evictions: usize,

    /// Releases closed because the holding area was full
    pub overflow_closes: usize,

    /// Resources closed while draining on shutdown
    pub shutdown_closes: usize,

    /// Errors reported by `Resource::close`
    pub close_errors: usize,

    /// Idle resources currently buffered
    pub available_resources: usize,

    /// Holding area capacity
    pub max_capacity: usize,

    /// How full the holding area is (0.0 to 1.0)
    pub fill_ratio: f64,

    /// Whether the pool has been closed
    pub is_closed: bool,
}

impl PoolMetrics {
    /// Total buffered resources discarded by the freshness checks
    pub fn total_evictions(&self) -> usize {
        self.stale_evictions + self.dead_evictions
    }

    /// Export metrics as a HashMap
    pub fn export(&self) -> HashMap<String, String> {
        let mut metrics = HashMap::new();
        metrics.insert("total_created".to_string(), self.total_created.to_string());
        metrics.insert("creation_failures".to_string(), self.creation_failures.to_string());
        metrics.insert("total_reused".to_string(), self.total_reused.to_string());
        metrics.insert("total_returned".to_string(), self.total_returned.to_string());
        metrics.insert("stale_evictions".to_string(), self.stale_evictions.to_string());
        metrics.insert("dead_evictions".to_string(), self.dead_evictions.to_string());
        metrics.insert("overflow_closes".to_string(), self.overflow_closes.to_string());
        metrics.insert("shutdown_closes".to_string(), self.shutdown_closes.to_string());
        metrics.insert("close_errors".to_string(), self.close_errors.to_string());
        metrics.insert("available_resources".to_string(), self.available_resources.to_string());
        metrics.insert("max_capacity".to_string(), self.max_capacity.to_string());
        metrics.insert("fill_ratio".to_string(), format!("{:.2}", self.fill_ratio));
        metrics.insert("is_closed".to_string(), self.is_closed.to_string());
        metrics
    }
}

/// Metrics exporter for Prometheus format
pub struct MetricsExporter;

impl MetricsExporter {
    /// Export metrics in Prometheus exposition format
    ///
    /// ```
    /// use freshpool::{MetricsExporter, PoolMetrics};
    /// use std::collections::HashMap;
    ///
    /// let metrics = PoolMetrics {
    ///     total_created: 4,
    ///     creation_failures: 0,
    ///     total_reused: 10,
    ///     total_returned: 9,
    ///     stale_evictions: 1,
    ///     dead_evictions: 0,
    ///     overflow_closes: 0,
    ///     shutdown_closes: 0,
    ///     close_errors: 0,
    ///     available_resources: 3,
    ///     max_capacity: 4,
    ///     fill_ratio: 0.75,
    ///     is_closed: false,
    /// };
    ///
    /// let mut tags = HashMap::new();
    /// tags.insert("service".to_string(), "api".to_string());
    ///
    /// let output = MetricsExporter::export_prometheus(&metrics, "db", Some(&tags));
    /// assert!(output.contains("resourcepool_available{pool=\"db\",service=\"api\"} 3"));
    /// assert!(output.contains("resourcepool_evictions_total{pool=\"db\",service=\"api\",reason=\"stale\"} 1"));
    /// ```
    pub fn export_prometheus(
        metrics: &PoolMetrics,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        let mut output = String::new();
        let labels = Self::format_labels(pool_name, tags);

        // Gauge metrics
        output.push_str("# HELP resourcepool_available Idle resources in the holding area\n");
        output.push_str("# TYPE resourcepool_available gauge\n");
        output.push_str(&format!("resourcepool_available{{{}}} {}\n", labels, metrics.available_resources));

        output.push_str("# HELP resourcepool_capacity Holding area capacity\n");
        output.push_str("# TYPE resourcepool_capacity gauge\n");
        output.push_str(&format!("resourcepool_capacity{{{}}} {}\n", labels, metrics.max_capacity));

        output.push_str("# HELP resourcepool_fill_ratio Holding area fill ratio\n");
        output.push_str("# TYPE resourcepool_fill_ratio gauge\n");
        output.push_str(&format!("resourcepool_fill_ratio{{{}}} {:.2}\n", labels, metrics.fill_ratio));

        output.push_str("# HELP resourcepool_closed Whether the pool is closed\n");
        output.push_str("# TYPE resourcepool_closed gauge\n");
        output.push_str(&format!("resourcepool_closed{{{}}} {}\n", labels, u8::from(metrics.is_closed)));

        // Counter metrics
        output.push_str("# HELP resourcepool_created_total Resources created by the factory\n");
        output.push_str("# TYPE resourcepool_created_total counter\n");
        output.push_str(&format!("resourcepool_created_total{{{}}} {}\n", labels, metrics.total_created));

        output.push_str("# HELP resourcepool_creation_failures_total Failed factory calls\n");
        output.push_str("# TYPE resourcepool_creation_failures_total counter\n");
        output.push_str(&format!("resourcepool_creation_failures_total{{{}}} {}\n", labels, metrics.creation_failures));

        output.push_str("# HELP resourcepool_reused_total Acquires served from the holding area\n");
        output.push_str("# TYPE resourcepool_reused_total counter\n");
        output.push_str(&format!("resourcepool_reused_total{{{}}} {}\n", labels, metrics.total_reused));

        output.push_str("# HELP resourcepool_returned_total Releases buffered for reuse\n");
        output.push_str("# TYPE resourcepool_returned_total counter\n");
        output.push_str(&format!("resourcepool_returned_total{{{}}} {}\n", labels, metrics.total_returned));

        output.push_str("# HELP resourcepool_evictions_total Buffered resources discarded\n");
        output.push_str("# TYPE resourcepool_evictions_total counter\n");
        output.push_str(&format!("resourcepool_evictions_total{{{},reason=\"stale\"}} {}\n", labels, metrics.stale_evictions));
        output.push_str(&format!("resourcepool_evictions_total{{{},reason=\"dead\"}} {}\n", labels, metrics.dead_evictions));

        output.push_str("# HELP resourcepool_overflow_closes_total Releases closed because the pool was full\n");
        output.push_str("# TYPE resourcepool_overflow_closes_total counter\n");
        output.push_str(&format!("resourcepool_overflow_closes_total{{{}}} {}\n", labels, metrics.overflow_closes));

        output.push_str("# HELP resourcepool_shutdown_closes_total Resources closed on shutdown\n");
        output.push_str("# TYPE resourcepool_shutdown_closes_total counter\n");
        output.push_str(&format!("resourcepool_shutdown_closes_total{{{}}} {}\n", labels, metrics.shutdown_closes));

        output.push_str("# HELP resourcepool_close_errors_total Errors while closing resources\n");
        output.push_str("# TYPE resourcepool_close_errors_total counter\n");
        output.push_str(&format!("resourcepool_close_errors_total{{{}}} {}\n", labels, metrics.close_errors));

        output
    }

    /// Build a `prometheus::Registry` holding the current values as gauges
    #[cfg(feature = "prometheus")]
    pub fn to_registry(
        metrics: &PoolMetrics,
        pool_name: &str,
    ) -> prometheus::Result<prometheus::Registry> {
        use prometheus::{Gauge, IntGauge, Opts, Registry};

        let registry = Registry::new();
        let opts = |name: &str, help: &str| Opts::new(name, help).const_label("pool", pool_name);

        let int_gauges = [
            ("resourcepool_available", "Idle resources in the holding area", metrics.available_resources),
            ("resourcepool_capacity", "Holding area capacity", metrics.max_capacity),
            ("resourcepool_created", "Resources created by the factory", metrics.total_created),
            ("resourcepool_creation_failures", "Failed factory calls", metrics.creation_failures),
            ("resourcepool_reused", "Acquires served from the holding area", metrics.total_reused),
            ("resourcepool_returned", "Releases buffered for reuse", metrics.total_returned),
            ("resourcepool_stale_evictions", "Resources discarded as stale", metrics.stale_evictions),
            ("resourcepool_dead_evictions", "Resources discarded after a failed probe", metrics.dead_evictions),
            ("resourcepool_overflow_closes", "Releases closed because the pool was full", metrics.overflow_closes),
            ("resourcepool_shutdown_closes", "Resources closed on shutdown", metrics.shutdown_closes),
            ("resourcepool_close_errors", "Errors while closing resources", metrics.close_errors),
        ];

        for (name, help, value) in int_gauges {
            let gauge = IntGauge::with_opts(opts(name, help))?;
            gauge.set(i64::try_from(value).unwrap_or(i64::MAX));
            registry.register(Box::new(gauge))?;
        }

        let fill = Gauge::with_opts(opts("resourcepool_fill_ratio", "Holding area fill ratio"))?;
        fill.set(metrics.fill_ratio);
        registry.register(Box::new(fill))?;

        Ok(registry)
    }

    fn format_labels(pool_name: &str, tags: Option<&HashMap<String, String>>) -> String {
        let mut labels = vec![format!("pool=\"{}\"", escape_label_value(pool_name))];

        if let Some(tags) = tags {
            let mut sorted: Vec<_> = tags.iter().collect();
            sorted.sort();
            for (key, value) in sorted {
                labels.push(format!("{}=\"{}\"", key, escape_label_value(value)));
            }
        }

        labels.join(",")
    }
}

/// Escape a label value for the text exposition format
fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Internal metrics tracker
#[derive(Default)]
pub(crate) struct MetricsTracker {
    pub total_created: AtomicUsize,
    pub creation_failures: AtomicUsize,
    pub total_reused: AtomicUsize,
    pub total_returned: AtomicUsize,
    pub stale_evictions: AtomicUsize,
    pub dead_evictions: AtomicUsize,
    pub overflow_closes: AtomicUsize,
    pub shutdown_closes: AtomicUsize,
    pub close_errors: AtomicUsize,
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_eviction(&self, reason: EvictionReason) {
        match reason {
            EvictionReason::Stale => self.stale_evictions.fetch_add(1, Ordering::Relaxed),
            EvictionReason::Dead => self.dead_evictions.fetch_add(1, Ordering::Relaxed),
        };
    }

    pub fn get_metrics(&self, available: usize, capacity: usize, is_closed: bool) -> PoolMetrics {
        let fill_ratio = if capacity > 0 {
            available as f64 / capacity as f64
        } else {
            0.0
        };

        PoolMetrics {
            total_created: self.total_created.load(Ordering::Relaxed),
            creation_failures: self.creation_failures.load(Ordering::Relaxed),
            total_reused: self.total_reused.load(Ordering::Relaxed),
            total_returned: self.total_returned.load(Ordering::Relaxed),
            stale_evictions: self.stale_evictions.load(Ordering::Relaxed),
            dead_evictions: self.dead_evictions.load(Ordering::Relaxed),
            overflow_closes: self.overflow_closes.load(Ordering::Relaxed),
            shutdown_closes: self.shutdown_closes.load(Ordering::Relaxed),
            close_errors: self.close_errors.load(Ordering::Relaxed),
            available_resources: available,
            max_capacity: capacity,
            fill_ratio,
            is_closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_and_fill_ratio() {
        let tracker = MetricsTracker::new();
        tracker.total_created.fetch_add(3, Ordering::Relaxed);
        tracker.record_eviction(EvictionReason::Stale);
        tracker.record_eviction(EvictionReason::Dead);
        tracker.record_eviction(EvictionReason::Dead);

        let metrics = tracker.get_metrics(1, 4, false);
        assert_eq!(metrics.total_created, 3);
        assert_eq!(metrics.stale_evictions, 1);
        assert_eq!(metrics.dead_evictions, 2);
        assert_eq!(metrics.total_evictions(), 3);
        assert!((metrics.fill_ratio - 0.25).abs() < f64::EPSILON);

        let exported = metrics.export();
        assert_eq!(exported["fill_ratio"], "0.25");
        assert_eq!(exported["is_closed"], "false");
    }

    #[test]
    fn test_labels_are_sorted() {
        let mut tags = HashMap::new();
        tags.insert("zone".to_string(), "b".to_string());
        tags.insert("app".to_string(), "x".to_string());

        let labels = MetricsExporter::format_labels("p", Some(&tags));
        assert_eq!(labels, "pool=\"p\",app=\"x\",zone=\"b\"");
    }

    #[test]
    fn test_label_values_are_escaped() {
        let mut tags = HashMap::new();
        tags.insert("path".to_string(), "C:\\tmp\n\"x\"".to_string());

        let labels = MetricsExporter::format_labels("a\"b", Some(&tags));
        assert_eq!(labels, r#"pool="a\"b",path="C:\\tmp\n\"x\"""#);
    }

    #[cfg(feature = "prometheus")]
    #[test]
    fn test_registry_export() {
        let metrics = MetricsTracker::new().get_metrics(2, 4, false);
        let registry = MetricsExporter::to_registry(&metrics, "cache").unwrap();
        let families = registry.gather();

        let available = families
            .iter()
            .find(|family| family.get_name() == "resourcepool_available")
            .unwrap();
        assert_eq!(available.get_metric()[0].get_gauge().get_value(), 2.0);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serialize() {
        let metrics = MetricsTracker::new().get_metrics(0, 2, true);
        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["max_capacity"], 2);
        assert_eq!(json["is_closed"], true);
    }
}
