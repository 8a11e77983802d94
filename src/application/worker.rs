use crate::domain::instruction::{InstructionStatus, PayoutInstruction};
use crate::domain::money::Cents;
use crate::domain::ports::{GatewayRef, InstructionStoreRef, SendRequest};
use crate::error::{PayoutError, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry behaviour for one worker pass, injected rather than hard-coded so
/// tests can pin deterministic failure counts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    None,
    Fixed(Duration),
    Exponential { base: Duration, cap: Duration },
}

impl Backoff {
    /// Delay before the next attempt, `attempt` being the 1-based attempt that
    /// just failed.
    pub fn delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            Self::None => None,
            Self::Fixed(d) => Some(*d),
            Self::Exponential { base, cap } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                Some((*base * factor).min(*cap))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerOptions {
    pub retry: RetryPolicy,
    /// Test hook: fraction of attempts that fail synthetically before reaching
    /// the gateway. Deterministic, not random.
    pub force_failure_rate: Option<f64>,
    /// The run halts when the observed failure rate reaches this threshold.
    pub circuit_breaker_failure_rate: f64,
    /// Upper bound on one `wait_for_confirmation` call.
    pub confirmation_timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            force_failure_rate: None,
            circuit_breaker_failure_rate: 0.5,
            confirmation_timeout: Duration::from_secs(30),
        }
    }
}

/// Outcome of one instruction after a worker pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    pub instruction_id: String,
    pub payee_id: String,
    pub amount: Cents,
    pub status: InstructionStatus,
    pub tx_ref: Option<String>,
    pub error_code: Option<String>,
    pub attempts: u32,
}

/// Circuit-breaker report for one worker pass. A per-pass artifact, not an
/// entity: it is rebuilt from scratch every execution.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub receipts: Vec<ExecutionReceipt>,
    pub instructions: Vec<PayoutInstruction>,
    pub failure_rate: f64,
    pub halted: bool,
    /// Manual follow-up markers for instructions that exhausted their retry
    /// budget.
    pub flags: Vec<String>,
}

impl ExecutionReport {
    pub fn failed_count(&self) -> usize {
        self.receipts
            .iter()
            .filter(|r| r.status == InstructionStatus::Failed)
            .count()
    }
}

/// Deterministic failure injector: fires exactly `floor(rate * attempts)`
/// times over any attempt sequence.
struct FailureInjector {
    rate: f64,
    attempts: u64,
    injected: u64,
}

impl FailureInjector {
    fn new(rate: Option<f64>) -> Self {
        Self {
            rate: rate.unwrap_or(0.0).clamp(0.0, 1.0),
            attempts: 0,
            injected: 0,
        }
    }

    fn fires(&mut self) -> bool {
        self.attempts += 1;
        let target = (self.rate * self.attempts as f64).floor() as u64;
        if self.injected < target {
            self.injected += 1;
            true
        } else {
            false
        }
    }
}

/// Drives instructions through the settlement gateway with bounded retries and
/// a run-level circuit breaker.
///
/// Per-instruction failures never surface as errors from `execute`; they are
/// folded into the report and the caller interprets the aggregate. Only store
/// failures propagate.
pub struct ExecutionWorker {
    gateway: GatewayRef,
    store: InstructionStoreRef,
}

impl ExecutionWorker {
    pub fn new(gateway: GatewayRef, store: InstructionStoreRef) -> Self {
        Self { gateway, store }
    }

    pub async fn execute(
        &self,
        mut instructions: Vec<PayoutInstruction>,
        options: &WorkerOptions,
    ) -> Result<ExecutionReport> {
        let mut injector = FailureInjector::new(options.force_failure_rate);
        let mut receipts = Vec::new();
        let mut flags = Vec::new();
        let mut total = 0usize;
        let mut failed = 0usize;

        for instruction in instructions.iter_mut() {
            // Already-settled instructions are never re-submitted, and produce
            // no new receipt.
            if instruction.status == InstructionStatus::Confirmed {
                debug!("skipping confirmed instruction {}", instruction.id);
                continue;
            }
            total += 1;

            let confirmed =
                self.drive_instruction(instruction, options, &mut injector).await?;
            if !confirmed {
                failed += 1;
                flags.push(format!(
                    "instruction {} failed after {} attempts: {}; manual follow-up required",
                    instruction.id,
                    instruction.attempts,
                    instruction.error_code.as_deref().unwrap_or("UNKNOWN")
                ));
            }
            receipts.push(ExecutionReceipt {
                instruction_id: instruction.id.clone(),
                payee_id: instruction.payee.id().to_string(),
                amount: instruction.amount,
                status: instruction.status,
                tx_ref: instruction.tx_ref.clone(),
                error_code: instruction.error_code.clone(),
                attempts: instruction.attempts,
            });
        }

        let failure_rate = if total == 0 {
            0.0
        } else {
            failed as f64 / total as f64
        };
        let halted = failure_rate >= options.circuit_breaker_failure_rate;
        if halted {
            warn!(
                "circuit breaker tripped: {failed}/{total} failed (threshold {})",
                options.circuit_breaker_failure_rate
            );
        }

        Ok(ExecutionReport {
            receipts,
            instructions,
            failure_rate,
            halted,
            flags,
        })
    }

    /// Runs the retry loop for one instruction. Returns whether it confirmed.
    async fn drive_instruction(
        &self,
        instruction: &mut PayoutInstruction,
        options: &WorkerOptions,
        injector: &mut FailureInjector,
    ) -> Result<bool> {
        let max_attempts = options.retry.max_attempts;

        while instruction.attempts < max_attempts {
            instruction.attempts += 1;
            instruction.transition(InstructionStatus::Submitted)?;

            if injector.fires() {
                // Synthetic failure: burns retry budget and counts toward the
                // failure tally, but never reaches the gateway.
                instruction.mark_failed("FORCED_FAILURE".to_string())?;
                self.store.put_instruction(instruction.clone()).await?;
                debug!(
                    "forced failure for instruction {} (attempt {})",
                    instruction.id, instruction.attempts
                );
                continue;
            }

            match self.attempt_send(instruction, options).await {
                Ok(tx_ref) => {
                    instruction.mark_confirmed(tx_ref)?;
                    self.store.put_instruction(instruction.clone()).await?;
                    info!(
                        "instruction {} confirmed on attempt {} (tx {})",
                        instruction.id,
                        instruction.attempts,
                        instruction.tx_ref.as_deref().unwrap_or("?")
                    );
                    return Ok(true);
                }
                Err(err) => {
                    // Gateway error codes are captured verbatim.
                    let code = match err {
                        PayoutError::Gateway(code) => code,
                        other => other.to_string(),
                    };
                    warn!(
                        "instruction {} attempt {} failed: {code}",
                        instruction.id, instruction.attempts
                    );
                    instruction.mark_failed(code)?;
                    self.store.put_instruction(instruction.clone()).await?;
                }
            }

            if instruction.attempts < max_attempts
                && let Some(delay) = options.retry.backoff.delay(instruction.attempts)
            {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(false)
    }

    async fn attempt_send(
        &self,
        instruction: &PayoutInstruction,
        options: &WorkerOptions,
    ) -> Result<String> {
        let outcome = self
            .gateway
            .send(SendRequest {
                idempotency_key: instruction.idempotency_key.clone(),
                from_account_ref: instruction.treasury_ref.clone(),
                to_account_ref: instruction.account_ref.clone(),
                amount_minor_units: instruction.amount.as_units(),
                asset_ref: instruction.asset_ref.clone(),
            })
            .await?;

        match tokio::time::timeout(
            options.confirmation_timeout,
            self.gateway.wait_for_confirmation(&outcome.tx_ref),
        )
        .await
        {
            Ok(confirmation) => {
                confirmation?;
                Ok(outcome.tx_ref)
            }
            Err(_) => Err(PayoutError::Gateway("CONFIRMATION_TIMEOUT".to_string())),
        }
    }
}
