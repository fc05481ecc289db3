// src/performance_test.rs
// Measures Apply throughput: concurrent credits and debits spread over a set of accounts,
// plus a redelivery pass that must change nothing.
use std::sync::Arc;
use std::time::Instant;

use idempotent_ledger::infra::ids;
use idempotent_ledger::storage::ledger;
use idempotent_ledger::{ApplicationEngine, ApplyOutcome};
use rand::Rng;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let num_items: usize = 2_000;
    let num_accounts: usize = 20;

    println!(
        "--- Apply Performance Test: {} intents over {} accounts ---",
        num_items, num_accounts
    );

    let store = ledger::connect(&database_url, 10).await?;
    let engine = Arc::new(ApplicationEngine::new(store.clone()));
    let run = ids::rand_id();

    let mut rng = rand::thread_rng();
    let intents: Vec<(String, String, i64)> = (0..num_items)
        .map(|i| {
            let account = format!("perf-{}-{}", run, i % num_accounts);
            let amount: i64 = if rng.gen_bool(0.6) {
                rng.gen_range(1..=1_000)
            } else {
                -rng.gen_range(1..=1_000)
            };
            (account, format!("perf-{}-k{}", run, i), amount)
        })
        .collect();

    // --- Time the main pass ---
    let start_time = Instant::now();
    let outcomes = apply_all(&engine, &intents).await?;
    let duration = start_time.elapsed();

    let applied = outcomes.iter().filter(|o| **o == ApplyOutcome::Applied).count();
    let rejected = outcomes
        .iter()
        .filter(|o| matches!(o, ApplyOutcome::Rejected(_)))
        .count();
    let failed = outcomes
        .iter()
        .filter(|o| matches!(o, ApplyOutcome::Failed(_)))
        .count();

    // --- Redelivery pass: every key is already consumed or rejected ---
    let redelivery_start = Instant::now();
    let redelivered = apply_all(&engine, &intents).await?;
    let redelivery_duration = redelivery_start.elapsed();
    let duplicates = redelivered
        .iter()
        .filter(|o| **o == ApplyOutcome::AlreadyApplied)
        .count();

    let mut negative = 0;
    for i in 0..num_accounts {
        let balance = store.balance(&format!("perf-{}-{}", run, i)).await?;
        if balance < 0 {
            negative += 1;
        }
    }

    println!("\n--- Results ---");
    println!("Applied: {}  Rejected: {}  Failed: {}", applied, rejected, failed);
    println!(
        "Total time: {} ms  ({:.2} µs per intent)",
        duration.as_millis(),
        duration.as_micros() as f64 / num_items as f64
    );
    println!(
        "Redelivery pass: {} ms, {} reported AlreadyApplied",
        redelivery_duration.as_millis(),
        duplicates
    );
    println!("Accounts with negative balance: {} (must be 0)", negative);
    Ok(())
}

async fn apply_all(
    engine: &Arc<ApplicationEngine>,
    intents: &[(String, String, i64)],
) -> anyhow::Result<Vec<ApplyOutcome>> {
    let mut handles = Vec::with_capacity(intents.len());
    for (account, key, amount) in intents.iter().cloned() {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine.apply(&account, &key, &ids::rand_id(), amount).await
        }));
    }
    let mut outcomes = Vec::with_capacity(handles.len());
    for h in handles {
        outcomes.push(h.await?);
    }
    Ok(outcomes)
}
