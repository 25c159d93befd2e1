//! Example: the nightly-report scenario on Redis.
//!
//! Two workers race for the same lock; exactly one runs the job and the
//! other backs off once its waiting budget expires.
//!
//! Run with: `cargo run --example keyvalue_lock`
//!
//! Requires a Redis server. Set the REDIS_URL environment variable or
//! start one on localhost:6379.

use std::time::Duration;

use crosslock::{Mutex, Settings, Strategy};

fn report_settings(redis_url: &str) -> Settings {
    let mut settings = Settings::new(Strategy::KeyValue, "nightly-report");
    settings.connection = Some(redis_url.to_string());
    settings.lease_ttl = Duration::from_secs(30);
    settings
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let redis_url =
        std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());

    println!("Connecting to {redis_url}...");
    let settings = report_settings(&redis_url);

    let mut first = Mutex::from_settings(&settings).await?;
    let mut second = Mutex::from_settings(&settings).await?;

    // Worker one gets the lock and starts the report.
    assert!(first.acquire(Duration::ZERO).await?);
    println!("worker-1: generating the nightly report");

    // Worker two waits two seconds, then gives up without error.
    if second.acquire(Duration::from_secs(2)).await? {
        println!("worker-2: unexpectedly got the lock");
    } else {
        println!("worker-2: report already running elsewhere, skipping");
    }

    // Long job? Push the lease deadline out instead of picking a huge TTL.
    first.renew(Duration::from_secs(30)).await?;
    println!("worker-1: lease renewed");

    first.release().await?;
    println!("worker-1: done, lock released");

    Ok(())
}
