/* demos/sweep.rs */

use padel_limit::*;
use std::time::Duration as StdDuration;
use tokio::time::sleep;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Starting sweep demo...\n");

    const SWEEP_INTERVAL_MS: u64 = 200;
    const RETENTION_MS: u64 = 500;

    let policy = PolicyTable::default()
        .with_sweep_interval(Duration::millis(SWEEP_INTERVAL_MS))
        .with_retention(Duration::millis(RETENTION_MS));
    let limiter = match RateLimiter::start(policy) {
        Ok(limiter) => limiter,
        Err(err) => {
            eprintln!("failed to start limiter: {err}");
            return;
        }
    };

    println!("  - Sweep interval: {} ms", SWEEP_INTERVAL_MS);
    println!("  - Retention: {} ms\n", RETENTION_MS);

    let rule = limiter.policy().rule(Category::Default);
    for i in 0..100 {
        limiter.check_rate_limit(&format!("default:192.168.0.{i}"), &rule);
    }
    println!("  Tracked callers after 100 requests: {}", limiter.store().len());
    assert_eq!(limiter.store().len(), 100);

    let wait = RETENTION_MS + 2 * SWEEP_INTERVAL_MS;
    println!("  Waiting {} ms for the sweep...", wait);
    sleep(StdDuration::from_millis(wait)).await;

    println!("  Tracked callers after the sweep: {}", limiter.store().len());
    assert!(limiter.store().is_empty());

    limiter.shutdown();
    println!("\nSweep demo completed successfully.");
}
