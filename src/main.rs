use clap::Parser;
use miette::{IntoDiagnostic, Result};
use paypoll::application::engine::TransactionEngine;
use paypoll::domain::clock::{ClockHandle, SystemClock};
use paypoll::domain::ports::LedgerStoreBox;
use paypoll::error::PaymentError;
use paypoll::infrastructure::in_memory::InMemoryLedgerStore;
use paypoll::interfaces::cli::args::Cli;
use paypoll::interfaces::cli::json_writer::JsonWriter;
use paypoll::interfaces::cli::run;
use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init()
        .map_err(|e| miette::miette!("failed to initialise logging: {e}"))?;

    let outcome = execute(cli).await;

    match outcome {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => {
            tracing::debug!(kind = %e.kind(), "command failed");
            let mut err = JsonWriter::new(io::stderr().lock());
            err.write_error(&e).into_diagnostic()?;
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn execute(cli: Cli) -> Result<(), PaymentError> {
    let config = cli.engine.to_config()?;
    let clock: ClockHandle = Arc::new(SystemClock);
    let store = open_store(cli.db_path.as_deref(), clock.clone())?;
    let engine = TransactionEngine::new(config, store, clock)?;

    let stdout = io::stdout();
    let mut out = JsonWriter::new(stdout.lock());
    run(Arc::new(engine), cli.command, &mut out).await
}

fn open_store(db_path: Option<&Path>, clock: ClockHandle) -> Result<LedgerStoreBox, PaymentError> {
    match db_path {
        Some(path) => open_persistent(path, clock),
        None => {
            // Use in-memory storage
            let store = InMemoryLedgerStore::new(clock);
            store.spawn_reaper(Duration::from_secs(1));
            Ok(Box::new(store))
        }
    }
}

#[cfg(feature = "storage-rocksdb")]
fn open_persistent(path: &Path, clock: ClockHandle) -> Result<LedgerStoreBox, PaymentError> {
    use paypoll::infrastructure::rocksdb::RocksDBLedgerStore;
    Ok(Box::new(RocksDBLedgerStore::open(path, clock)?))
}

#[cfg(not(feature = "storage-rocksdb"))]
fn open_persistent(path: &Path, _clock: ClockHandle) -> Result<LedgerStoreBox, PaymentError> {
    Err(PaymentError::StoreUnavailable(format!(
        "{} requested but this build lacks the storage-rocksdb feature",
        path.display()
    )))
}
