//! Radar module - token trust snapshots and change alerts.
//!
//! Facts about each tracked token are gathered from chain and market sources,
//! scored into a `Snapshot`, compared with the previous snapshot of the same
//! token, and turned into alerts when something material changed.

pub mod types;
pub mod scorer;
pub mod detector;
pub mod storage;
pub mod sqlite_ledger;
pub mod market_data;
pub mod data_sources;
pub mod notifier;
pub mod output;
pub mod pipeline;

// Re-export main public types and the pipeline
pub use pipeline::ScanPipeline;
pub use types::{
    Alert, Authority, CycleReport, MarketData, RiskAssessment, RiskLabel, ScanResult, Snapshot,
    TokenFacts,
};

// Re-export the seams for custom implementations
pub use data_sources::{FactGatherer, SolanaFactGatherer};
pub use notifier::{AlertFileSink, AlertSink, TelegramNotifier};
pub use sqlite_ledger::{SnapshotLedger, SqliteSnapshotLedger};
pub use storage::{JsonFileStateStore, MemoryStateStore, StateStore};
pub use output::OutputWriter;
