//! alpha-radar - trust and risk snapshots for a curated list of tokens
//!
//! Each scan scores every listed token from on-chain authorities, holder
//! concentration and best-effort market data, and raises alerts when risk is
//! high or the picture shifted since the previous scan.

pub mod types;
pub mod errors;
pub mod config;
pub mod logging;
pub mod cli;
pub mod curation;
pub mod radar;

// Re-export main types for convenience
pub use config::{AlertRules, RadarConfig};
pub use errors::{FetchError, RadarError};
pub use types::{Chain, Token, TokenList};
