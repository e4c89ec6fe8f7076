//! Pool configuration options

use std::num::NonZeroUsize;
use std::time::Duration;

/// Stale timeout used when none (or a nonsensical one) is given
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default capacity: the number of parallel execution units on this host
pub fn default_capacity() -> usize {
    std::thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(1)
}

/// Configuration for resource pool behavior
///
/// Builders are applied in call order, so a later call overrides an earlier
/// one for the same field.
///
/// # Examples
///
/// ```
/// use freshpool::PoolConfiguration;
/// use std::time::Duration;
///
/// let config = PoolConfiguration::new()
///     .with_capacity(8)
///     .with_stale_timeout(Duration::from_millis(250));
///
/// assert_eq!(config.capacity, 8);
/// assert_eq!(config.stale_timeout, Duration::from_millis(250));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfiguration {
    /// Maximum number of idle resources buffered in the holding area.
    /// Also the number of resources created during pre-warming.
    pub capacity: usize,

    /// Maximum age of a buffered resource before it is discarded instead of
    /// being handed out
    pub stale_timeout: Duration,
}

impl Default for PoolConfiguration {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            stale_timeout: DEFAULT_STALE_TIMEOUT,
        }
    }
}

impl PoolConfiguration {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the capacity
    ///
    /// A capacity of zero is normalized to the default CPU-derived capacity.
    ///
    /// ```
    /// use freshpool::PoolConfiguration;
    /// use freshpool::config::default_capacity;
    ///
    /// let config = PoolConfiguration::new().with_capacity(0);
    /// assert_eq!(config.capacity, default_capacity());
    /// ```
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = if capacity == 0 {
            default_capacity()
        } else {
            capacity
        };
        self
    }

    /// Set the stale timeout
    pub fn with_stale_timeout(mut self, timeout: Duration) -> Self {
        self.stale_timeout = timeout;
        self
    }

    /// Set the stale timeout from a signed number of seconds
    ///
    /// Negative or non-finite values fall back to [`DEFAULT_STALE_TIMEOUT`].
    pub fn with_stale_timeout_secs_f64(self, secs: f64) -> Self {
        let timeout = Duration::try_from_secs_f64(secs).unwrap_or(DEFAULT_STALE_TIMEOUT);
        self.with_stale_timeout(timeout)
    }

    /// Capacity with the zero case normalized, for configs built by struct literal
    pub(crate) fn effective_capacity(&self) -> usize {
        if self.capacity == 0 {
            default_capacity()
        } else {
            self.capacity
        }
    }
}
