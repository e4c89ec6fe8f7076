// Small demo binary; see demos/ for more usage.
// Build with `--features demo`.
// Run with RUST_LOG=debug to watch evictions and fallback creation.

use freshpool::{PoolConfiguration, Resource, ResourcePool};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use tracing::info;

struct DemoConn {
    id: usize,
}

impl Resource for DemoConn {
    type Error = io::Error;

    fn ping(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        info!("Closing connection {}", self.id);
        Ok(())
    }
}

fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}

fn main() {
    init_logging();

    let next_id = Arc::new(AtomicUsize::new(1));
    let config = PoolConfiguration::new()
        .with_capacity(2)
        .with_stale_timeout(Duration::from_millis(50));

    let pool = ResourcePool::new(
        move || {
            Ok::<_, io::Error>(DemoConn {
                id: next_id.fetch_add(1, Ordering::Relaxed),
            })
        },
        config,
    );

    match pool.get() {
        Ok(conn) => {
            info!("Got connection {}", conn.id);
            pool.put(conn);
        }
        Err(e) => info!("No connection: {}", e),
    }

    thread::sleep(Duration::from_millis(60));
    if let Ok(conn) = pool.get() {
        info!("After going stale, got connection {}", conn.id);
        pool.put(conn);
    }

    info!("Metrics: {:?}", pool.get_metrics());
    pool.close();
}
