//! Core resource pool implementation

use crate::config::PoolConfiguration;
use crate::errors::{PoolError, PoolResult};
use crate::eviction::{EvictionReason, Timestamped};
use crate::health::HealthStatus;
use crate::metrics::{MetricsExporter, MetricsTracker, PoolMetrics};
use crate::resource::{BoxError, Resource};

use crossbeam::queue::ArrayQueue;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

type Factory<R> = Box<dyn Fn() -> Result<R, BoxError> + Send + Sync>;

/// A pooled resource that goes back to the pool when dropped
///
/// If the pool has been closed by the time the guard drops, the resource is
/// closed instead.
pub struct PooledResource<R: Resource> {
    resource: Option<R>,
    pool: Arc<PoolInner<R>>,
}

impl<R: Resource> PooledResource<R> {
    /// Take the resource out of pool management
    pub fn detach(mut self) -> R {
        self.resource.take().expect("Resource already taken")
    }

    /// Close the resource instead of returning it, e.g. after an I/O error
    pub fn discard(mut self) {
        if let Some(resource) = self.resource.take() {
            self.pool.close_resource(resource);
        }
    }
}

impl<R: Resource> Deref for PooledResource<R> {
    type Target = R;

    fn deref(&self) -> &Self::Target {
        self.resource.as_ref().expect("Resource already taken")
    }
}

impl<R: Resource> DerefMut for PooledResource<R> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.resource.as_mut().expect("Resource already taken")
    }
}

impl<R: Resource> Drop for PooledResource<R> {
    fn drop(&mut self) {
        if let Some(resource) = self.resource.take()
            && let Some(rejected) = self.pool.put(resource)
        {
            self.pool.close_resource(rejected);
        }
    }
}

/// Thread-safe pool of connection-like resources
///
/// Cloning the pool is cheap and yields another handle to the same holding
/// area. The pool closes itself when the last handle is dropped.
///
/// # Examples
///
/// ```
/// use freshpool::{PoolConfiguration, Resource, ResourcePool};
/// use std::convert::Infallible;
/// use std::time::Duration;
///
/// #[derive(Debug)]
/// struct Conn(u32);
///
/// impl Resource for Conn {
///     type Error = Infallible;
///     fn ping(&mut self) -> Result<(), Infallible> { Ok(()) }
///     fn close(self) -> Result<(), Infallible> { Ok(()) }
/// }
///
/// let config = PoolConfiguration::new()
///     .with_capacity(4)
///     .with_stale_timeout(Duration::from_secs(30));
/// let pool = ResourcePool::new(|| Ok::<_, Infallible>(Conn(7)), config);
/// assert_eq!(pool.available_count(), 4);
///
/// let conn = pool.get().unwrap();
/// assert_eq!(conn.0, 7);
/// pool.put(conn);
///
/// pool.close();
/// assert!(pool.get().unwrap_err().is_closed());
/// ```
pub struct ResourcePool<R: Resource> {
    inner: Arc<PoolInner<R>>,
}

impl<R: Resource> Clone for ResourcePool<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<R: Resource> fmt::Debug for ResourcePool<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("capacity", &self.inner.capacity)
            .field("available", &self.inner.available.len())
            .field("stale_timeout", &self.inner.stale_timeout)
            .field("closed", &self.inner.is_closed())
            .finish()
    }
}

impl<R: Resource> ResourcePool<R> {
    /// Create a pool and pre-warm it with up to `capacity` resources
    ///
    /// Factory failures during pre-warming are logged and skipped, so the
    /// pool may start under-populated. Construction itself never fails.
    pub fn new<F, E>(factory: F, config: PoolConfiguration) -> Self
    where
        F: Fn() -> Result<R, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        let capacity = config.effective_capacity();
        let inner = PoolInner {
            available: ArrayQueue::new(capacity),
            factory: Box::new(move || factory().map_err(Into::<BoxError>::into)),
            closed: AtomicBool::new(false),
            shutdown: Mutex::new(()),
            stale_timeout: config.stale_timeout,
            capacity,
            metrics: MetricsTracker::new(),
        };

        let pool = Self {
            inner: Arc::new(inner),
        };
        pool.warmup();
        pool
    }

    /// Create a pool with the default configuration
    pub fn with_defaults<F, E>(factory: F) -> Self
    where
        F: Fn() -> Result<R, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self::new(factory, PoolConfiguration::default())
    }

    /// Acquire a resource
    ///
    /// Buffered resources older than the stale timeout, or whose probe fails,
    /// are closed and skipped. When the holding area runs dry a new resource
    /// is created on the spot. Never waits on other callers.
    pub fn get(&self) -> PoolResult<R> {
        self.inner.get()
    }

    /// Acquire a resource, collapsing every failure into `None`
    pub fn try_get(&self) -> Option<R> {
        self.get().ok()
    }

    /// Acquire a resource wrapped in a guard that releases it on drop
    pub fn get_pooled(&self) -> PoolResult<PooledResource<R>> {
        let resource = self.inner.get()?;
        Ok(PooledResource {
            resource: Some(resource),
            pool: Arc::clone(&self.inner),
        })
    }

    /// Release a resource back into the holding area
    ///
    /// When the holding area is full the resource is closed. When the pool is
    /// closed the resource is handed back untouched and closing it is up to
    /// the caller.
    pub fn put(&self, resource: R) -> Option<R> {
        self.inner.put(resource)
    }

    /// Close the pool and every resource sitting in the holding area
    ///
    /// Idempotent. Resources currently on loan are not touched.
    pub fn close(&self) {
        self.inner.close();
    }

    /// Top the holding area up toward capacity, returning how many resources were buffered
    pub fn warmup(&self) -> usize {
        self.inner.warmup()
    }

    /// Close every buffered resource that has outlived the stale timeout
    ///
    /// Fresh resources keep their original timestamps. Returns the number evicted.
    pub fn evict_stale(&self) -> usize {
        self.inner.evict_stale()
    }

    /// Acquire a resource on the blocking thread pool
    pub async fn get_async(&self) -> PoolResult<R> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.get())
            .await
            .map_err(|_| PoolError::Cancelled)?
    }

    /// Warm up on the blocking thread pool
    pub async fn warmup_async(&self) -> PoolResult<usize> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.warmup())
            .await
            .map_err(|_| PoolError::Cancelled)
    }

    /// Close on the blocking thread pool
    pub async fn close_async(&self) -> PoolResult<()> {
        let pool = self.clone();
        tokio::task::spawn_blocking(move || pool.close())
            .await
            .map_err(|_| PoolError::Cancelled)
    }

    /// Get available count
    pub fn available_count(&self) -> usize {
        self.inner.available.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn stale_timeout(&self) -> Duration {
        self.inner.stale_timeout
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Get pool metrics
    pub fn get_metrics(&self) -> PoolMetrics {
        self.inner.metrics.get_metrics(
            self.inner.available.len(),
            self.inner.capacity,
            self.inner.is_closed(),
        )
    }

    /// Get health status
    pub fn get_health_status(&self) -> HealthStatus {
        HealthStatus::from_metrics(&self.get_metrics())
    }

    /// Export metrics
    pub fn export_metrics(&self) -> HashMap<String, String> {
        self.get_metrics().export()
    }

    /// Export metrics in Prometheus format
    pub fn export_metrics_prometheus(
        &self,
        pool_name: &str,
        tags: Option<&HashMap<String, String>>,
    ) -> String {
        MetricsExporter::export_prometheus(&self.get_metrics(), pool_name, tags)
    }
}

pub(crate) struct PoolInner<R: Resource> {
    available: ArrayQueue<Timestamped<R>>,
    factory: Factory<R>,
    closed: AtomicBool,
    // Serializes the closed transition with the shutdown drain
    shutdown: Mutex<()>,
    stale_timeout: Duration,
    capacity: usize,
    metrics: MetricsTracker,
}

impl<R: Resource> PoolInner<R> {
    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn get(&self) -> PoolResult<R> {
        if self.is_closed() {
            return Err(PoolError::Closed);
        }

        while let Some(mut entry) = self.available.pop() {
            let verdict = if entry.is_stale(self.stale_timeout) {
                debug!("Evicting stale resource (idle {:?})", entry.age());
                Some(EvictionReason::Stale)
            } else if let Err(e) = entry.resource_mut().ping() {
                debug!("Evicting dead resource: {}", e);
                Some(EvictionReason::Dead)
            } else {
                None
            };

            match verdict {
                None => {
                    self.metrics.total_reused.fetch_add(1, Ordering::Relaxed);
                    return Ok(entry.into_inner());
                }
                Some(reason) => {
                    self.metrics.record_eviction(reason);
                    self.close_resource(entry.into_inner());
                }
            }
        }

        debug!("Holding area empty, creating resource");
        self.create()
    }

    fn put(&self, resource: R) -> Option<R> {
        if self.is_closed() {
            debug!("Pool closed, handing released resource back to caller");
            return Some(resource);
        }

        match self.available.push(Timestamped::now(resource)) {
            Ok(()) => {
                self.metrics.total_returned.fetch_add(1, Ordering::Relaxed);
                // Lost a race with close(): its drain may already be finished
                if self.is_closed() {
                    self.drain();
                }
            }
            Err(rejected) => {
                debug!("Holding area full ({}), closing released resource", self.capacity);
                self.metrics.overflow_closes.fetch_add(1, Ordering::Relaxed);
                self.close_resource(rejected.into_inner());
            }
        }
        None
    }

    fn close(&self) {
        let _guard = self.shutdown.lock();
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        let drained = self.drain();
        info!("Pool closed, {} idle resources released", drained);
    }

    fn warmup(&self) -> usize {
        if self.is_closed() {
            return 0;
        }

        let wanted = self.capacity.saturating_sub(self.available.len());
        if wanted == 0 {
            return 0;
        }

        let mut buffered = 0;
        for _ in 0..wanted {
            let Ok(resource) = self.create() else {
                continue;
            };
            if let Err(rejected) = self.available.push(Timestamped::now(resource)) {
                self.metrics.overflow_closes.fetch_add(1, Ordering::Relaxed);
                self.close_resource(rejected.into_inner());
                break;
            }
            buffered += 1;
        }

        if self.is_closed() {
            self.drain();
        }

        info!("Pool warmed up: {}/{} resources buffered", buffered, wanted);
        buffered
    }

    fn evict_stale(&self) -> usize {
        if self.is_closed() {
            return 0;
        }

        let mut keep = Vec::new();
        let mut evicted = 0;

        // Bounded by a snapshot so concurrent releases cannot keep the sweep going
        for _ in 0..self.available.len() {
            let Some(entry) = self.available.pop() else {
                break;
            };
            if entry.is_stale(self.stale_timeout) {
                self.metrics.record_eviction(EvictionReason::Stale);
                self.close_resource(entry.into_inner());
                evicted += 1;
            } else {
                keep.push(entry);
            }
        }

        for entry in keep {
            if let Err(rejected) = self.available.push(entry) {
                self.metrics.overflow_closes.fetch_add(1, Ordering::Relaxed);
                self.close_resource(rejected.into_inner());
            }
        }

        if self.is_closed() {
            self.drain();
        }

        if evicted > 0 {
            debug!("Evicted {} stale resources", evicted);
        }
        evicted
    }

    fn create(&self) -> PoolResult<R> {
        match (self.factory)() {
            Ok(resource) => {
                self.metrics.total_created.fetch_add(1, Ordering::Relaxed);
                Ok(resource)
            }
            Err(e) => {
                self.metrics.creation_failures.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to create resource: {}", e);
                Err(PoolError::CreationFailed(e))
            }
        }
    }

    fn drain(&self) -> usize {
        let mut drained = 0;
        while let Some(entry) = self.available.pop() {
            self.metrics.shutdown_closes.fetch_add(1, Ordering::Relaxed);
            self.close_resource(entry.into_inner());
            drained += 1;
        }
        drained
    }

    fn close_resource(&self, resource: R) {
        if let Err(e) = resource.close() {
            self.metrics.close_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Failed to close resource: {}", e);
        }
    }
}

impl<R: Resource> Drop for PoolInner<R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[derive(Debug)]
    struct TestConn {
        id: usize,
        alive: Arc<AtomicBool>,
        closes: Arc<AtomicUsize>,
    }

    impl Resource for TestConn {
        type Error = io::Error;

        fn ping(&mut self) -> Result<(), io::Error> {
            if self.alive.load(Ordering::SeqCst) {
                Ok(())
            } else {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
        }

        fn close(self) -> Result<(), io::Error> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Harness {
        next_id: Arc<AtomicUsize>,
        alive: Arc<AtomicBool>,
        closes: Arc<AtomicUsize>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                next_id: Arc::new(AtomicUsize::new(0)),
                alive: Arc::new(AtomicBool::new(true)),
                closes: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn pool(&self, config: PoolConfiguration) -> ResourcePool<TestConn> {
            let next_id = Arc::clone(&self.next_id);
            let alive = Arc::clone(&self.alive);
            let closes = Arc::clone(&self.closes);
            ResourcePool::new(
                move || {
                    Ok::<_, io::Error>(TestConn {
                        id: next_id.fetch_add(1, Ordering::SeqCst),
                        alive: Arc::clone(&alive),
                        closes: Arc::clone(&closes),
                    })
                },
                config,
            )
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    fn config(capacity: usize) -> PoolConfiguration {
        PoolConfiguration::new().with_capacity(capacity)
    }

    #[test]
    fn test_prewarm_fills_to_capacity() {
        let harness = Harness::new();
        let pool = harness.pool(config(3));

        assert_eq!(pool.available_count(), 3);
        assert_eq!(pool.get_metrics().total_created, 3);
    }

    #[test]
    fn test_get_reuses_buffered_resource() {
        let harness = Harness::new();
        let pool = harness.pool(config(1));

        let conn = pool.get().unwrap();
        assert_eq!(conn.id, 0);
        assert_eq!(pool.available_count(), 0);

        pool.put(conn);
        let again = pool.get().unwrap();
        assert_eq!(again.id, 0);
        assert_eq!(pool.get_metrics().total_reused, 2);
    }

    #[test]
    fn test_get_falls_back_to_factory_when_empty() {
        let harness = Harness::new();
        let pool = harness.pool(config(1));

        let first = pool.get().unwrap();
        let second = pool.get().unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(pool.get_metrics().total_created, 2);
    }

    #[test]
    fn test_dead_resource_is_closed_and_skipped() {
        let harness = Harness::new();
        let pool = harness.pool(config(2));

        harness.alive.store(false, Ordering::SeqCst);
        let conn = pool.get().unwrap();

        // Both buffered resources failed the probe; the fallback is brand new
        assert_eq!(conn.id, 2);
        assert_eq!(harness.closes(), 2);
        assert_eq!(pool.get_metrics().dead_evictions, 2);
    }

    #[test]
    fn test_overflow_on_put_closes_resource() {
        let harness = Harness::new();
        let pool = harness.pool(config(1));

        let extra = pool.get().unwrap();
        let spare = pool.get().unwrap();
        assert!(pool.put(extra).is_none());
        assert!(pool.put(spare).is_none());

        assert_eq!(pool.available_count(), 1);
        assert_eq!(harness.closes(), 1);
        assert_eq!(pool.get_metrics().overflow_closes, 1);
    }

    #[test]
    fn test_close_is_idempotent() {
        let harness = Harness::new();
        let pool = harness.pool(config(2));

        pool.close();
        pool.close();

        assert!(pool.is_closed());
        assert_eq!(harness.closes(), 2);
        assert_eq!(pool.available_count(), 0);
    }

    #[test]
    fn test_pooled_guard_returns_on_drop() {
        let harness = Harness::new();
        let pool = harness.pool(config(1));

        {
            let conn = pool.get_pooled().unwrap();
            assert_eq!(conn.id, 0);
            assert_eq!(pool.available_count(), 0);
        }

        assert_eq!(pool.available_count(), 1);
    }

    #[test]
    fn test_pooled_guard_discard_and_detach() {
        let harness = Harness::new();
        let pool = harness.pool(config(2));

        pool.get_pooled().unwrap().discard();
        assert_eq!(harness.closes(), 1);
        assert_eq!(pool.available_count(), 1);

        let conn = pool.get_pooled().unwrap().detach();
        assert_eq!(pool.available_count(), 0);
        assert_eq!(harness.closes(), 1);
        drop(conn);
    }

    #[test]
    fn test_pooled_guard_closes_after_pool_closed() {
        let harness = Harness::new();
        let pool = harness.pool(config(1));

        let conn = pool.get_pooled().unwrap();
        pool.close();
        drop(conn);

        assert_eq!(harness.closes(), 1);
        assert_eq!(pool.available_count(), 0);
    }

    #[test]
    fn test_evict_stale_keeps_fresh_resources() {
        let harness = Harness::new();
        let pool = harness.pool(config(2).with_stale_timeout(Duration::from_millis(30)));

        let conn = pool.get().unwrap();
        thread::sleep(Duration::from_millis(50));
        pool.put(conn);

        assert_eq!(pool.evict_stale(), 1);
        assert_eq!(pool.available_count(), 1);
        assert_eq!(harness.closes(), 1);
        assert_eq!(pool.get().unwrap().id, 0);
    }

    #[test]
    fn test_warmup_tops_up() {
        let harness = Harness::new();
        let pool = harness.pool(config(3));

        let _a = pool.get().unwrap();
        let _b = pool.get().unwrap();
        assert_eq!(pool.warmup(), 2);
        assert_eq!(pool.available_count(), 3);
        assert_eq!(pool.warmup(), 0);
    }

    #[test]
    fn test_warmup_on_full_pool_creates_nothing() {
        let harness = Harness::new();
        let pool = harness.pool(config(2));

        assert_eq!(pool.warmup(), 0);
        assert_eq!(pool.warmup(), 0);
        assert_eq!(pool.get_metrics().total_created, 2);
        assert_eq!(harness.next_id.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_with_defaults_uses_default_configuration() {
        let harness = Harness::new();
        let next_id = Arc::clone(&harness.next_id);
        let alive = Arc::clone(&harness.alive);
        let closes = Arc::clone(&harness.closes);
        let pool = ResourcePool::with_defaults(move || {
            Ok::<_, io::Error>(TestConn {
                id: next_id.fetch_add(1, Ordering::SeqCst),
                alive: Arc::clone(&alive),
                closes: Arc::clone(&closes),
            })
        });

        assert_eq!(pool.capacity(), crate::config::default_capacity());
        assert_eq!(pool.stale_timeout(), Duration::from_secs(5));
        assert_eq!(pool.available_count(), pool.capacity());
        assert!(!pool.is_closed());
    }

    #[test]
    fn test_dropping_last_handle_closes_pool() {
        let harness = Harness::new();
        let pool = harness.pool(config(2));
        let handle = pool.clone();

        drop(pool);
        assert_eq!(harness.closes(), 0);
        drop(handle);
        assert_eq!(harness.closes(), 2);
    }

    #[tokio::test]
    async fn test_async_get_and_close() {
        let harness = Harness::new();
        let pool = harness.pool(config(1));

        let conn = pool.get_async().await.unwrap();
        assert_eq!(conn.id, 0);
        pool.put(conn);

        pool.close_async().await.unwrap();
        assert_eq!(harness.closes(), 1);
        assert!(matches!(pool.get_async().await, Err(PoolError::Closed)));
        assert_eq!(pool.warmup_async().await.unwrap(), 0);
    }
}
