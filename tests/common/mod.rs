#![allow(dead_code)]

use payrail::application::TreasuryContext;
use payrail::application::ewa::EwaService;
use payrail::application::runs::PayrollService;
use payrail::application::timesheets::TimesheetService;
use payrail::application::worker::{Backoff, RetryPolicy, WorkerOptions};
use payrail::domain::ports::{GatewayRef, SettlementGateway};
use payrail::infrastructure::in_memory::InMemoryLedgerStore;
use payrail::infrastructure::simulated_ledger::SimulatedLedger;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

pub const ASSET: &str = "USDx";

/// One wired-up core: in-memory stores, simulated ledger, funded treasury.
pub struct Harness {
    pub store: Arc<InMemoryLedgerStore>,
    pub ledger: Arc<SimulatedLedger>,
    pub gateway: GatewayRef,
    pub treasury: TreasuryContext,
}

impl Harness {
    pub async fn funded(asset_units: u128, reserve_units: u128) -> Self {
        let store = Arc::new(InMemoryLedgerStore::new());
        let ledger = Arc::new(SimulatedLedger::new());
        let gateway: GatewayRef = ledger.clone();
        let treasury_account = ledger.create_account("treasury").await.unwrap();
        ledger
            .credit(&treasury_account, ASSET, asset_units, reserve_units)
            .await
            .unwrap();
        Self {
            store,
            ledger,
            gateway,
            treasury: TreasuryContext {
                org_id: "org-1".to_string(),
                treasury_account_ref: treasury_account,
                asset_ref: ASSET.to_string(),
                min_native_reserve: reserve_units,
            },
        }
    }

    pub fn payroll(&self) -> PayrollService {
        PayrollService::new(self.gateway.clone(), self.store.clone(), self.store.clone())
    }

    pub fn ewa(&self) -> EwaService {
        EwaService::new(
            self.gateway.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
        )
    }

    pub fn timesheets(&self) -> TimesheetService {
        TimesheetService::new(
            self.gateway.clone(),
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
        )
    }

    pub async fn payee_account(&self, label: &str) -> String {
        self.ledger.create_account(label).await.unwrap()
    }

    pub async fn asset_balance(&self, account_ref: &str) -> u128 {
        self.ledger
            .get_balances(account_ref, ASSET)
            .await
            .unwrap()
            .asset_units
    }
}

/// Worker options with no backoff so retries run instantly in tests.
pub fn worker_options(max_attempts: u32) -> WorkerOptions {
    WorkerOptions {
        retry: RetryPolicy {
            max_attempts,
            backoff: Backoff::None,
        },
        ..WorkerOptions::default()
    }
}

/// Writes a run CSV with `rows` identical payroll lines.
pub fn generate_run_csv(path: &Path, rows: usize, amount_cents: i64) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["payee_type", "payee_id", "account", "amount_cents"])?;
    for i in 1..=rows {
        wtr.write_record([
            "employee_payroll".to_string(),
            format!("emp-{i}"),
            format!("acct-{i}"),
            amount_cents.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}
