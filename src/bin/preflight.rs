use idempotent_ledger::storage::ledger;
use idempotent_ledger::{Config, NatsChannel};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight -- [--skip-nats]\n\
         \n\
         Requires env vars:\n\
           DATABASE_URL\n\
         Optional:\n\
           NATS_URL, NATS_SUBJECT, NATS_QUEUE_GROUP, DB_MAX_CONNECTIONS\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }
    let skip_nats = args.iter().any(|a| a == "--skip-nats");

    // Force-read config (nice error messages if missing)
    let config = Config::from_env()?;

    println!("> Preflight:");
    println!("  DATABASE_URL scheme={}", config.database_url.split(':').next().unwrap_or_default());
    println!("  NATS_SUBJECT={}", config.nats_subject);
    println!("  WORKER_CONCURRENCY={}", config.worker_concurrency);
    println!("  APPLY_TIMEOUT_MS={}", config.apply_timeout.as_millis());

    // Store connectivity + schema
    let store = ledger::connect(&config.database_url, config.db_max_connections)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot open ledger store: {}", e))?;
    store.ping().await?;
    println!("  Ledger store reachable, schema ensured.");

    // Event channel connectivity
    match (config.nats_url.as_deref(), skip_nats) {
        (_, true) => println!("  NATS check skipped."),
        (None, false) => {
            println!("  NATS_URL not set: only the all-in-one binary (in-process channel) can run.")
        }
        (Some(url), false) => {
            NatsChannel::connect(url, &config.nats_subject, &config.nats_queue_group)
                .await
                .map_err(|e| anyhow::anyhow!("Cannot reach NATS at {}: {}", url, e))?;
            println!("  NATS reachable at {}.", url);
        }
    }

    println!("> Preflight OK.");
    Ok(())
}
