use clap::Parser;
use miette::{IntoDiagnostic, Result};
use payrail::application::TreasuryContext;
use payrail::application::runs::{PayoutRequest, PayrollService};
use payrail::application::worker::{RetryPolicy, WorkerOptions};
use payrail::domain::money::Amount;
use payrail::domain::ports::{GatewayRef, InstructionStoreRef, RunStoreRef, SettlementGateway};
use payrail::infrastructure::in_memory::InMemoryLedgerStore;
use payrail::infrastructure::simulated_ledger::SimulatedLedger;
use payrail::interfaces::csv::run_reader::RunReader;
use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

/// Executes a payroll run CSV against the simulated settlement ledger.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input run CSV file (payee_type, payee_id, account, amount_cents)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[cfg(feature = "storage-rocksdb")]
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Asset units to credit the treasury with. Defaults to exactly covering
    /// the run; pass a smaller value to exercise the preflight check.
    #[arg(long)]
    fund: Option<u128>,

    /// Native reserve floor the treasury must hold for fees.
    #[arg(long, default_value_t = 0)]
    min_reserve: u128,

    /// Retry budget per instruction.
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Failure rate at which the run-level circuit breaker trips.
    #[arg(long, default_value_t = 0.5)]
    circuit_breaker_rate: f64,

    /// Test hook: deterministic fraction of attempts failed before the
    /// gateway.
    #[arg(long)]
    force_failure_rate: Option<f64>,
}

const ASSET: &str = "USDx";

#[cfg_attr(not(feature = "storage-rocksdb"), allow(unused_variables))]
fn open_stores(cli: &Cli) -> Result<(InstructionStoreRef, RunStoreRef)> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = &cli.db_path {
        let store = Arc::new(
            payrail::infrastructure::rocksdb::RocksDbLedgerStore::open(db_path)
                .into_diagnostic()?,
        );
        let instructions: InstructionStoreRef = store.clone();
        let runs: RunStoreRef = store;
        return Ok((instructions, runs));
    }

    let store = Arc::new(InMemoryLedgerStore::new());
    let instructions: InstructionStoreRef = store.clone();
    let runs: RunStoreRef = store;
    Ok((instructions, runs))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let (instructions, runs) = open_stores(&cli)?;
    let ledger = Arc::new(SimulatedLedger::new());
    let gateway: GatewayRef = ledger.clone();

    let file = File::open(&cli.input).into_diagnostic()?;
    let mut requests = Vec::new();
    let mut total: u128 = 0;
    let mut accounts: HashMap<String, String> = HashMap::new();
    for row in RunReader::new(file).rows() {
        let row = row.into_diagnostic()?;
        let account_ref = match accounts.get(&row.account) {
            Some(existing) => existing.clone(),
            None => {
                let created = ledger.create_account(&row.account).await.into_diagnostic()?;
                accounts.insert(row.account.clone(), created.clone());
                created
            }
        };
        let amount = Amount::try_from(row.amount_cents).into_diagnostic()?;
        total += amount.cents().as_units();
        requests.push(PayoutRequest {
            payee: row.payee(),
            account_ref,
            amount,
        });
    }

    let treasury_account = ledger.create_account("treasury").await.into_diagnostic()?;
    ledger
        .credit(
            &treasury_account,
            ASSET,
            cli.fund.unwrap_or(total),
            cli.min_reserve,
        )
        .await
        .into_diagnostic()?;

    let treasury = TreasuryContext {
        org_id: "org-cli".to_string(),
        treasury_account_ref: treasury_account,
        asset_ref: ASSET.to_string(),
        min_native_reserve: cli.min_reserve,
    };
    let options = WorkerOptions {
        retry: RetryPolicy {
            max_attempts: cli.max_retries,
            ..RetryPolicy::default()
        },
        force_failure_rate: cli.force_failure_rate,
        circuit_breaker_failure_rate: cli.circuit_breaker_rate,
        ..WorkerOptions::default()
    };

    let service = PayrollService::new(gateway, instructions, runs);
    let run = service
        .create_run(&treasury, "cli-run", &requests)
        .await
        .into_diagnostic()?;
    let execution = service
        .execute_run(&run.id, &treasury, &options)
        .await
        .into_diagnostic()?;

    println!("payee_id,amount_cents,status,detail");
    for receipt in &execution.report.receipts {
        let detail = receipt
            .tx_ref
            .clone()
            .or_else(|| receipt.error_code.clone())
            .unwrap_or_default();
        println!(
            "{},{},{},{detail}",
            receipt.payee_id, receipt.amount, receipt.status
        );
    }
    println!(
        "run {} status={} failure_rate={:.2} halted={}",
        execution.run.id,
        execution.run.status,
        execution.report.failure_rate,
        execution.report.halted
    );

    Ok(())
}
