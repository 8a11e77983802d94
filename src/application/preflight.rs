use crate::domain::ports::{Balances, GatewayRef};
use crate::error::{PayoutError, PreflightReason, Result};

/// Solvency check run before any instruction is committed to execution.
///
/// All-or-nothing per call: either the treasury covers both the payout amount
/// and the native fee reserve, or the check fails carrying every reason that
/// applies. Comparisons are integer-only.
pub fn preflight(
    balances: Balances,
    required_asset_units: u128,
    min_native_reserve: u128,
) -> Result<()> {
    let mut reasons = Vec::new();
    if balances.asset_units < required_asset_units {
        reasons.push(PreflightReason::InsufficientTokenBalance);
    }
    if balances.reserve_units < min_native_reserve {
        reasons.push(PreflightReason::InsufficientNativeReserve);
    }
    if reasons.is_empty() {
        Ok(())
    } else {
        Err(PayoutError::PreflightFailed(reasons))
    }
}

/// Fetches the treasury balances from the gateway and preflights them.
pub async fn preflight_treasury(
    gateway: &GatewayRef,
    treasury_account: &str,
    asset_ref: &str,
    required_asset_units: u128,
    min_native_reserve: u128,
) -> Result<()> {
    let balances = gateway.get_balances(treasury_account, asset_ref).await?;
    preflight(balances, required_asset_units, min_native_reserve)
}
