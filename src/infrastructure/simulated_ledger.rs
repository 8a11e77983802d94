use crate::domain::ports::{Balances, Confirmation, SendOutcome, SendRequest, SettlementGateway};
use crate::error::{PayoutError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Account {
    /// Balance per asset reference, in minor units.
    assets: HashMap<String, u128>,
    /// Native units held back for fees.
    reserve: u128,
}

#[derive(Debug, Clone)]
struct LedgerTx {
    confirmed_at: DateTime<Utc>,
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<String, Account>,
    txs: HashMap<String, LedgerTx>,
    /// Idempotency-key dedup map: a repeated send resolves to the original
    /// transfer instead of moving value twice.
    sends_by_key: HashMap<String, String>,
}

/// An in-process settlement network used for tests and the CLI demo.
///
/// Behaves like the real thing at the interface: accounts hold per-asset
/// balances plus a native reserve, transfers are deduplicated by idempotency
/// key, and underfunded sends fail with a gateway error code.
#[derive(Default, Clone)]
pub struct SimulatedLedger {
    state: Arc<RwLock<LedgerState>>,
}

impl SimulatedLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettlementGateway for SimulatedLedger {
    async fn create_account(&self, label: &str) -> Result<String> {
        let mut state = self.state.write().await;
        let account_ref = format!("{label}-{}", Uuid::new_v4());
        state.accounts.insert(
            account_ref.clone(),
            Account {
                assets: HashMap::new(),
                reserve: 0,
            },
        );
        Ok(account_ref)
    }

    async fn get_balances(&self, account_ref: &str, asset_ref: &str) -> Result<Balances> {
        let state = self.state.read().await;
        let account = state
            .accounts
            .get(account_ref)
            .ok_or_else(|| PayoutError::Gateway("UNKNOWN_ACCOUNT".to_string()))?;
        Ok(Balances {
            asset_units: account.assets.get(asset_ref).copied().unwrap_or(0),
            reserve_units: account.reserve,
        })
    }

    async fn send(&self, request: SendRequest) -> Result<SendOutcome> {
        let mut state = self.state.write().await;

        if let Some(tx_ref) = state.sends_by_key.get(&request.idempotency_key) {
            return Ok(SendOutcome {
                tx_ref: tx_ref.clone(),
            });
        }

        let from_balance = state
            .accounts
            .get(&request.from_account_ref)
            .ok_or_else(|| PayoutError::Gateway("UNKNOWN_ACCOUNT".to_string()))?
            .assets
            .get(&request.asset_ref)
            .copied()
            .unwrap_or(0);
        if from_balance < request.amount_minor_units {
            return Err(PayoutError::Gateway("INSUFFICIENT_FUNDS".to_string()));
        }
        if !state.accounts.contains_key(&request.to_account_ref) {
            return Err(PayoutError::Gateway("UNKNOWN_ACCOUNT".to_string()));
        }

        if let Some(from) = state.accounts.get_mut(&request.from_account_ref) {
            *from.assets.entry(request.asset_ref.clone()).or_insert(0) -=
                request.amount_minor_units;
        }
        if let Some(to) = state.accounts.get_mut(&request.to_account_ref) {
            *to.assets.entry(request.asset_ref.clone()).or_insert(0) +=
                request.amount_minor_units;
        }

        let tx_ref = format!("tx-{}", Uuid::new_v4());
        state.txs.insert(
            tx_ref.clone(),
            LedgerTx {
                confirmed_at: Utc::now(),
            },
        );
        state
            .sends_by_key
            .insert(request.idempotency_key, tx_ref.clone());
        Ok(SendOutcome { tx_ref })
    }

    async fn wait_for_confirmation(&self, tx_ref: &str) -> Result<Confirmation> {
        let state = self.state.read().await;
        let tx = state
            .txs
            .get(tx_ref)
            .ok_or_else(|| PayoutError::Gateway("UNKNOWN_TX".to_string()))?;
        Ok(Confirmation {
            confirmed_at: tx.confirmed_at,
        })
    }

    async fn credit(
        &self,
        account_ref: &str,
        asset_ref: &str,
        asset_units: u128,
        reserve_units: u128,
    ) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(account_ref)
            .ok_or_else(|| PayoutError::Gateway("UNKNOWN_ACCOUNT".to_string()))?;
        account.reserve += reserve_units;
        *account.assets.entry(asset_ref.to_string()).or_insert(0) += asset_units;
        Ok(())
    }
}
