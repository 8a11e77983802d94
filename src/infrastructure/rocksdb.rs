use crate::domain::instruction::PayoutInstruction;
use crate::domain::ports::{
    InstructionStore, NonceStore, RunStore, TimesheetStore, WithdrawalStore,
};
use crate::domain::run::PayrollRun;
use crate::domain::timesheet::ContractorTimesheet;
use crate::domain::withdrawal::EarnedWageWithdrawal;
use crate::error::{PayoutError, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

pub const CF_INSTRUCTIONS: &str = "instructions";
pub const CF_RUNS: &str = "runs";
pub const CF_NONCES: &str = "nonces";
pub const CF_WITHDRAWALS: &str = "withdrawals";
pub const CF_TIMESHEETS: &str = "timesheets";

const ALL_CFS: [&str; 5] = [
    CF_INSTRUCTIONS,
    CF_RUNS,
    CF_NONCES,
    CF_WITHDRAWALS,
    CF_TIMESHEETS,
];

/// A persistent ledger store backed by RocksDB, one column family per entity.
///
/// The used-nonce set is key presence in its own column family, so replay
/// protection survives restarts instead of living in a process-wide set.
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbLedgerStore {
    db: Arc<DB>,
}

impl RocksDbLedgerStore {
    /// Opens or creates the database at `path`, ensuring every column family
    /// exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors: Vec<_> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;
        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| PayoutError::Storage(format!("column family {name} not found")))
    }

    fn put_json<T: Serialize>(&self, cf_name: &str, key: &str, value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db.put_cf(cf, key.as_bytes(), serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &str) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan_json<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) =
                item.map_err(|e| PayoutError::Storage(format!("iteration error: {e}")))?;
            out.push(serde_json::from_slice(&value)?);
        }
        Ok(out)
    }
}

#[async_trait]
impl InstructionStore for RocksDbLedgerStore {
    async fn put_instruction(&self, instruction: PayoutInstruction) -> Result<()> {
        self.put_json(CF_INSTRUCTIONS, &instruction.id, &instruction)
    }

    async fn get_instruction(&self, id: &str) -> Result<Option<PayoutInstruction>> {
        self.get_json(CF_INSTRUCTIONS, id)
    }

    async fn instructions_for_run(&self, run_id: &str) -> Result<Vec<PayoutInstruction>> {
        let mut found: Vec<PayoutInstruction> = self
            .scan_json::<PayoutInstruction>(CF_INSTRUCTIONS)?
            .into_iter()
            .filter(|i| i.run_id.as_deref() == Some(run_id))
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }
}

#[async_trait]
impl RunStore for RocksDbLedgerStore {
    async fn put_run(&self, run: PayrollRun) -> Result<()> {
        self.put_json(CF_RUNS, &run.id, &run)
    }

    async fn get_run(&self, id: &str) -> Result<Option<PayrollRun>> {
        self.get_json(CF_RUNS, id)
    }
}

#[async_trait]
impl NonceStore for RocksDbLedgerStore {
    async fn consume(&self, nonce_key: &str) -> Result<bool> {
        // RocksDB serializes writes; the key-presence check and the insert go
        // through one write batch so a nonce is only ever consumed once.
        let cf = self.cf(CF_NONCES)?;
        if self.db.get_pinned_cf(cf, nonce_key.as_bytes())?.is_some() {
            return Ok(false);
        }
        let mut batch = WriteBatch::default();
        batch.put_cf(cf, nonce_key.as_bytes(), b"1");
        self.db.write(batch)?;
        Ok(true)
    }

    async fn is_used(&self, nonce_key: &str) -> Result<bool> {
        let cf = self.cf(CF_NONCES)?;
        Ok(self.db.get_pinned_cf(cf, nonce_key.as_bytes())?.is_some())
    }
}

#[async_trait]
impl WithdrawalStore for RocksDbLedgerStore {
    async fn put_withdrawal(&self, withdrawal: EarnedWageWithdrawal) -> Result<()> {
        self.put_json(CF_WITHDRAWALS, &withdrawal.id, &withdrawal)
    }

    async fn get_withdrawal(&self, id: &str) -> Result<Option<EarnedWageWithdrawal>> {
        self.get_json(CF_WITHDRAWALS, id)
    }

    async fn withdrawals_for_period(
        &self,
        employee_id: &str,
        period_start: NaiveDate,
    ) -> Result<Vec<EarnedWageWithdrawal>> {
        Ok(self
            .scan_json::<EarnedWageWithdrawal>(CF_WITHDRAWALS)?
            .into_iter()
            .filter(|w| w.employee_id == employee_id && w.period_start == period_start)
            .collect())
    }
}

#[async_trait]
impl TimesheetStore for RocksDbLedgerStore {
    async fn put_timesheet(&self, timesheet: ContractorTimesheet) -> Result<()> {
        self.put_json(CF_TIMESHEETS, &timesheet.id, &timesheet)
    }

    async fn get_timesheet(&self, id: &str) -> Result<Option<ContractorTimesheet>> {
        self.get_json(CF_TIMESHEETS, id)
    }

    async fn timesheets_for_org(&self, org_id: &str) -> Result<Vec<ContractorTimesheet>> {
        Ok(self
            .scan_json::<ContractorTimesheet>(CF_TIMESHEETS)?
            .into_iter()
            .filter(|t| t.org_id == org_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::instruction::Payee;
    use crate::domain::money::Cents;
    use tempfile::tempdir;

    fn instruction(run_id: Option<&str>) -> PayoutInstruction {
        PayoutInstruction::new(
            run_id.map(str::to_string),
            "org-1".to_string(),
            Payee::Contractor {
                contractor_id: "con-1".to_string(),
            },
            "treasury-1".to_string(),
            "acct-1".to_string(),
            Cents::new(500),
            "USDx".to_string(),
            "ts-1",
            "contractor_timesheet",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_open_creates_column_families() {
        let dir = tempdir().unwrap();
        let store = RocksDbLedgerStore::open(dir.path()).expect("failed to open RocksDB");
        for name in ALL_CFS {
            assert!(store.db.cf_handle(name).is_some());
        }
    }

    #[tokio::test]
    async fn test_instruction_roundtrip_and_run_filter() {
        let dir = tempdir().unwrap();
        let store = RocksDbLedgerStore::open(dir.path()).unwrap();

        let standalone = instruction(None);
        let grouped = instruction(Some("run-1"));
        store.put_instruction(standalone.clone()).await.unwrap();
        store.put_instruction(grouped.clone()).await.unwrap();

        let fetched = store.get_instruction(&standalone.id).await.unwrap().unwrap();
        assert_eq!(fetched, standalone);

        let for_run = store.instructions_for_run("run-1").await.unwrap();
        assert_eq!(for_run, vec![grouped]);
    }

    #[tokio::test]
    async fn test_nonce_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDbLedgerStore::open(dir.path()).unwrap();
            assert!(store.consume("w:1:h").await.unwrap());
        }
        let store = RocksDbLedgerStore::open(dir.path()).unwrap();
        assert!(store.is_used("w:1:h").await.unwrap());
        assert!(!store.consume("w:1:h").await.unwrap());
    }
}
