//! Application layer: the services that orchestrate authorization, preflight
//! and execution over the domain ports.

pub mod ewa;
pub mod preflight;
pub mod runs;
pub mod timesheets;
pub mod worker;

use serde::{Deserialize, Serialize};

/// Where an organization's payouts draw from: the treasury account on the
/// settlement network, the payout asset, and the native reserve floor kept
/// back for fees.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryContext {
    pub org_id: String,
    pub treasury_account_ref: String,
    pub asset_ref: String,
    pub min_native_reserve: u128,
}
