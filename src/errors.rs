//! Error taxonomy for the radar.
//!
//! `FetchError` covers per-token failures that are recorded in the batch
//! summary and never abort a cycle. `RadarError` covers fatal conditions that
//! abort the run with a non-zero exit. Everything else is propagated as
//! `anyhow::Error` with context.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Per-token recoverable failure of the fact-gathering stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("account {address} is not an SPL token mint (owner {owner})")]
    NotAMint { address: String, owner: String },

    #[error("malformed mint data: {0}")]
    MalformedMint(String),

    #[error("fact gathering timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("fetch worker failed: {0}")]
    Worker(String),
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Rpc(_) | FetchError::Timeout(_))
    }
}

/// Fatal conditions that abort a run.
#[derive(Error, Debug)]
pub enum RadarError {
    #[error("rules file unreadable at {path}: {reason}")]
    RulesUnreadable { path: PathBuf, reason: String },

    #[error("token list unreadable at {path}: {reason}")]
    TokenListUnreadable { path: PathBuf, reason: String },

    #[error("token list at {path} contains no valid tokens")]
    TokenListEmpty { path: PathBuf },

    #[error("state file unreadable at {path}: {reason}")]
    StateUnreadable { path: PathBuf, reason: String },

    #[error("cannot write {path}: {reason}")]
    OutputUnwritable { path: PathBuf, reason: String },

    #[error("notifier not configured: {0}")]
    NotifierUnconfigured(String),
}
