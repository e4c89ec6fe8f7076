//! Basic usage examples for ResourcePool

use freshpool::{PoolConfiguration, PoolError, Resource, ResourcePool};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct Connection {
    id: usize,
    healthy: Arc<AtomicBool>,
}

impl Resource for Connection {
    type Error = io::Error;

    fn ping(&mut self) -> io::Result<()> {
        if self.healthy.load(Ordering::Relaxed) {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))
        }
    }

    fn close(self) -> io::Result<()> {
        println!("   closing connection {}", self.id);
        Ok(())
    }
}

fn connection_pool(capacity: usize, healthy: Arc<AtomicBool>) -> ResourcePool<Connection> {
    let next_id = Arc::new(AtomicUsize::new(1));
    let config = PoolConfiguration::new()
        .with_capacity(capacity)
        .with_stale_timeout(Duration::from_millis(50));

    ResourcePool::new(
        move || {
            Ok::<_, io::Error>(Connection {
                id: next_id.fetch_add(1, Ordering::Relaxed),
                healthy: Arc::clone(&healthy),
            })
        },
        config,
    )
}

fn main() {
    println!("=== freshpool - Basic Examples ===\n");

    // Example 1: Acquire and release
    acquire_release();

    // Example 2: Staleness
    staleness();

    // Example 3: Liveness probing
    liveness();

    // Example 4: Failing factory
    failing_factory();

    // Example 5: Metrics and health
    metrics_and_health();
}

fn acquire_release() {
    println!("1. Acquire and release:");
    let pool = connection_pool(2, Arc::new(AtomicBool::new(true)));

    {
        let conn = pool.get_pooled().unwrap();
        println!("   Got connection {}", conn.id);
        // Connection automatically returned when dropped
    }

    println!("   Available after return: {}\n", pool.available_count());
    pool.close();
}

fn staleness() {
    println!("2. Staleness:");
    let pool = connection_pool(1, Arc::new(AtomicBool::new(true)));

    thread::sleep(Duration::from_millis(60));
    let conn = pool.get().unwrap();
    println!("   Stale connection was replaced by connection {}\n", conn.id);
    pool.put(conn);
    pool.close();
}

fn liveness() {
    println!("3. Liveness probing:");
    let healthy = Arc::new(AtomicBool::new(true));
    let pool = connection_pool(2, Arc::clone(&healthy));

    healthy.store(false, Ordering::Relaxed);
    let conn = pool.get().unwrap();
    println!("   Dead connections skipped, got connection {}\n", conn.id);
    pool.close();
}

fn failing_factory() {
    println!("4. Failing factory:");
    let pool: ResourcePool<Connection> = ResourcePool::new(
        || Err(io::Error::new(io::ErrorKind::ConnectionRefused, "backend down")),
        PoolConfiguration::new().with_capacity(1),
    );

    match pool.get() {
        Err(PoolError::CreationFailed(e)) => println!("   No connection available: {}\n", e),
        other => println!("   Unexpected: {:?}\n", other.map(|c| c.id)),
    }
}

fn metrics_and_health() {
    println!("5. Metrics and health:");
    let pool = connection_pool(2, Arc::new(AtomicBool::new(true)));

    let conn = pool.get().unwrap();
    pool.put(conn);

    for (key, value) in pool.export_metrics() {
        println!("   {}: {}", key, value);
    }

    let health = pool.get_health_status();
    println!("   Healthy: {}, warnings: {:?}", health.is_healthy(), health.warnings);

    pool.close();
}
