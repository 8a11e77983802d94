use thiserror::Error;

pub type Result<T> = std::result::Result<T, PayoutError>;

/// Reasons a treasury preflight check can fail. A single check may report both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightReason {
    InsufficientTokenBalance,
    InsufficientNativeReserve,
}

impl std::fmt::Display for PreflightReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientTokenBalance => write!(f, "INSUFFICIENT_TOKEN_BALANCE"),
            Self::InsufficientNativeReserve => write!(f, "INSUFFICIENT_NATIVE_RESERVE"),
        }
    }
}

#[derive(Error, Debug)]
pub enum PayoutError {
    #[error("SIGNATURE_EXPIRED")]
    SignatureExpired,
    #[error("SIGNATURE_MISMATCH")]
    SignatureMismatch,
    #[error("SIGNATURE_NONCE_REPLAYED")]
    SignatureNonceReplayed,
    #[error("PREFLIGHT_FAILED:{}", join_reasons(.0))]
    PreflightFailed(Vec<PreflightReason>),
    #[error("gateway error: {0}")]
    Gateway(String),
    #[error("TIMESHEET_NOT_DISPUTABLE: status is {0}")]
    TimesheetNotDisputable(String),
    #[error("TIMESHEET_NOT_RESOLVABLE: status is {0}")]
    TimesheetNotResolvable(String),
    #[error("TIMESHEET_NOT_APPROVABLE: status is {0}")]
    TimesheetNotApprovable(String),
    #[error("RUN_NOT_EXECUTABLE: {0}")]
    RunNotExecutable(String),
    #[error("requested {requested} cents but only {available} accrued")]
    InsufficientAccrual { requested: i64, available: i64 },
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(String),
    #[cfg(feature = "storage-rocksdb")]
    #[error("RocksDB error: {0}")]
    Rocks(#[from] rocksdb::Error),
}

fn join_reasons(reasons: &[PreflightReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
