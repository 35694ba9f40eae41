/* demos/demo.rs */

use padel_limit::*;
use std::collections::HashMap;
use std::time::Duration as StdDuration;
use tokio::time::sleep;

fn caller(ip: &str) -> HashMap<String, String> {
    [("x-forwarded-for".to_string(), format!("{ip}, 10.0.0.1"))].into()
}

fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Checked(result) if result.allowed => {
            format!("Allowed (remaining {}/{})", result.remaining, result.limit)
        }
        Outcome::Checked(result) => format!(
            "Denied (retry after {}s, resets at {})",
            result.retry_after.unwrap_or(1),
            result.reset_iso8601()
        ),
        other => format!("Bypassed ({other:?})"),
    }
}

async fn test_lead_form() -> Result<(), LimitError> {
    let request = caller("1.1.1.1");
    println!("  Lead form: 3 requests + 1 burst per minute.");

    for i in 1..=5 {
        let outcome = limit!(&request, "/api/lead")?;
        println!("  Request #{}: {}", i, describe(&outcome));
        assert_eq!(outcome.is_denied(), i > 4);
    }
    println!("  Lead form test passed.");
    Ok(())
}

async fn test_invite_routes() -> Result<(), LimitError> {
    let request = caller("2.2.2.2");
    println!("  Invite routes resolve to their own categories.");

    for path in ["/api/invites/join", "/api/invites/abc/accept", "/api/invites/abc"] {
        let outcome = limit!(&request, path)?;
        println!("  {}: {}", path, describe(&outcome));
        assert!(!outcome.is_denied());
    }

    let outcome = limit!(&request, "/dashboard")?;
    println!("  /dashboard: {}", describe(&outcome));
    assert_eq!(outcome, Outcome::Unmatched);
    println!("  Invite routes test passed.");
    Ok(())
}

async fn test_short_window() -> Result<(), LimitError> {
    let request = caller("3.3.3.3");
    println!("  Auth overridden to 1 request per 500ms.");

    let first = limit!(&request, category: Category::Auth)?;
    let second = limit!(&request, category: Category::Auth)?;
    println!("  Request #1: {}", describe(&first));
    println!("  Request #2: {}", describe(&second));
    assert!(second.is_denied());

    println!("  Waiting for 600ms...");
    sleep(StdDuration::from_millis(600)).await;
    let third = limit!(&request, category: Category::Auth)?;
    println!("  Request #3: {}", describe(&third));
    assert!(!third.is_denied());
    println!("  Short window test passed.");
    Ok(())
}

async fn test_safe_list() -> Result<(), LimitError> {
    let request = caller("9.9.9.9");
    println!("  9.9.9.9 is safe-listed, 20 lead requests all pass.");
    for _ in 0..20 {
        assert_eq!(limit!(&request, "/api/lead")?, Outcome::SafeListed);
    }
    println!("  Safe-list test passed.");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), LimitError> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("Starting padel-limit demo...\n");

    init_rate_limiter!(
        PolicyTable::from_env()
            .with_gate(Gate::new(DeployEnvironment::Production).with_safe_list("9.9.9.9"))
            .with_rule(
                Category::Lead,
                RateLimitConfig::new(Duration::minutes(1), 3).with_burst(1)
            )
            .with_rule(Category::Auth, RateLimitConfig::new(Duration::millis(500), 1))
    )?;

    println!("--- Lead form ---");
    test_lead_form().await?;
    println!("\n--- Invite routes ---");
    test_invite_routes().await?;
    println!("\n--- Short window ---");
    test_short_window().await?;
    println!("\n--- Safe-list ---");
    test_safe_list().await?;

    println!("\nAll demos completed successfully.");
    Ok(())
}
