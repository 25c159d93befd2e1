//! Example: file-backed locking between processes on one host.
//!
//! Run with: `cargo run --example file_lock`

use std::time::Duration;

use crosslock::{Mutex, Settings, Strategy};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let directory = std::env::temp_dir().join("crosslock-demo");

    let mut settings = Settings::new(Strategy::File, "demo-resource");
    settings.directory = Some(directory.clone());

    let mut mutex = Mutex::from_settings(&settings).await?;
    println!("Lock files live under {}", directory.display());

    // Single attempt: report and move on if someone else holds it.
    if mutex.acquire(Duration::ZERO).await? {
        println!("Lock acquired");

        // Do some work while holding the lock.
        tokio::time::sleep(Duration::from_secs(1)).await;
        println!("Work completed");

        mutex.release().await?;
        println!("Lock released, file unlinked");
    } else {
        println!("Another process holds the lock");
    }

    // Blocking attempt: wait up to five seconds for the holder to finish.
    println!("\nAcquiring with a 5 second budget...");
    if mutex.acquire(Duration::from_secs(5)).await? {
        println!("Lock acquired");
        mutex.release().await?;
        println!("Lock released");
    } else {
        println!("Budget elapsed while the lock stayed busy");
    }

    Ok(())
}
