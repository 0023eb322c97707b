use thiserror::Error;

use crate::types::TankKey;

/// Remote operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOp {
    Resolve,
    Read,
    Write,
    Invoke,
}

impl std::fmt::Display for RemoteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RemoteOp::Resolve => "resolve",
            RemoteOp::Read => "read",
            RemoteOp::Write => "write",
            RemoteOp::Invoke => "invoke",
        })
    }
}

/// Coarse cause, used for logging and exit-code mapping only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Endpoint or device not reachable / not registered.
    Unreachable,
    /// Endpoint answered but refused the operation.
    Rejected,
    /// Endpoint answered with a value we cannot interpret.
    Malformed,
    Other,
}

/// The single failure kind for reads, writes, invocations and resolution
/// against a remote endpoint.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{op} {target} failed: {detail}")]
pub struct CommunicationError {
    pub op: RemoteOp,
    /// Full remote name, e.g. `epfl/station1/cyan/level`.
    pub target: String,
    pub kind: FailureKind,
    pub detail: String,
}

impl CommunicationError {
    pub fn new(
        op: RemoteOp,
        target: impl Into<String>,
        kind: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            op,
            target: target.into(),
            kind,
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum PlantError {
    #[error(transparent)]
    Communication(#[from] CommunicationError),
    #[error("unknown station: {0} (expected 1..=6)")]
    UnknownStation(u8),
    #[error("unknown tank: {0}")]
    UnknownTank(String),
    #[error("writer for {0} already claimed")]
    WriterClaimed(TankKey),
    #[error("{command} is not available on {key}")]
    UnsupportedCommand { command: &'static str, key: TankKey },
    #[error("{0} is unavailable (remote not resolved)")]
    TankUnavailable(TankKey),
    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
