//! # freshpool
//!
//! Bounded, thread-safe pool for expensive connection-like resources
//! (sockets, RPC channels, database handles) with staleness eviction and
//! liveness probing.
//!
//! ## Features
//!
//! - Lock-free holding area backed by a fixed-capacity queue
//! - Resources idle longer than the stale timeout are closed, never handed out
//! - Liveness probe on every reuse
//! - Acquire never blocks: an empty pool falls back to the factory
//! - Hard capacity bound on release, overflow is closed
//! - Best-effort pre-warming at construction
//! - Idempotent shutdown that closes every buffered resource exactly once
//! - RAII guards, async wrappers, metrics and health reporting
//!
//! ## Quick Start
//!
//! ```rust
//! use freshpool::{PoolConfiguration, Resource, ResourcePool};
//! use std::io;
//! use std::time::Duration;
//!
//! struct Session;
//!
//! impl Resource for Session {
//!     type Error = io::Error;
//!     fn ping(&mut self) -> io::Result<()> { Ok(()) }
//!     fn close(self) -> io::Result<()> { Ok(()) }
//! }
//!
//! let pool = ResourcePool::new(
//!     || Ok::<_, io::Error>(Session),
//!     PoolConfiguration::new()
//!         .with_capacity(2)
//!         .with_stale_timeout(Duration::from_secs(10)),
//! );
//!
//! {
//!     let _session = pool.get_pooled().unwrap();
//!     // Session goes back to the pool when `_session` goes out of scope
//! }
//!
//! pool.close();
//! ```

pub mod config;
mod errors;
mod eviction;
mod health;
mod metrics;
mod pool;
mod resource;

pub use config::PoolConfiguration;
pub use errors::{PoolError, PoolResult};
pub use eviction::EvictionReason;
pub use health::HealthStatus;
pub use metrics::{MetricsExporter, PoolMetrics};
pub use pool::{PooledResource, ResourcePool};
pub use resource::{BoxError, Resource};
