//! Example: one code path, four storage strategies.
//!
//! Run with: `cargo run --example strategies -- <file|relational|keyvalue|pubsub>`
//!
//! The network strategies read POSTGRES_URL or REDIS_URL from the
//! environment. Set RUST_LOG=crosslock=debug to watch the backend at work.

use std::time::Duration;

use crosslock::{Mutex, Settings, Strategy};

fn settings_for(strategy: Strategy) -> Result<Settings, Box<dyn std::error::Error>> {
    let mut settings = Settings::new(strategy, "strategies-demo");
    match strategy {
        Strategy::File => {
            settings.directory = Some(std::env::temp_dir().join("crosslock-demo"));
        }
        Strategy::Relational => {
            settings.connection = Some(std::env::var("POSTGRES_URL")?);
        }
        Strategy::KeyValue | Strategy::PubSub => {
            settings.connection = Some(std::env::var("REDIS_URL")?);
        }
    }
    Ok(settings)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let strategy: Strategy = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => Strategy::File,
    };
    println!("Strategy: {strategy}");

    let settings = settings_for(strategy)?;
    let mut mutex = Mutex::from_settings(&settings).await?;

    if mutex.acquire(Duration::from_secs(2)).await? {
        println!("Acquired '{}' via {strategy}", mutex.name());
        if let Some(lease) = mutex.lease() {
            match lease.remaining() {
                Some(remaining) => println!("Lease expires in {remaining:?}"),
                None => println!("Lease held until released (no expiry)"),
            }
        }
        mutex.release().await?;
        println!("Released");
    } else {
        println!("Lock busy, gave up after 2s");
    }

    Ok(())
}
