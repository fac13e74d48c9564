//! Scan cycle orchestration.
//!
//! A cycle runs in two stages. The fetch stage gathers facts for every token
//! concurrently, bounded by a semaphore, with a per-token timeout. The reducer
//! stage then walks the results in input order on a single task: score, detect
//! against the previous snapshot, collect alerts, replace the state entry. Only
//! the reducer touches the state store, so no locking is needed.

use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

use crate::config::{AlertRules, RadarConfig, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MAX_PARALLEL_FETCHES};
use crate::errors::FetchError;
use crate::radar::data_sources::FactGatherer;
use crate::radar::detector::detect;
use crate::radar::notifier::AlertSink;
use crate::radar::scorer::build_snapshot;
use crate::radar::sqlite_ledger::SnapshotLedger;
use crate::radar::storage::StateStore;
use crate::radar::types::{Alert, CycleReport, ScanResult, Snapshot, TokenFacts};
use crate::types::Token;

/// One scan cycle over a token list.
pub struct ScanPipeline {
    gatherer: Arc<dyn FactGatherer>,
    rules: AlertRules,
    max_parallel_fetches: usize,
    fetch_timeout: Duration,
    ledger: Option<Arc<dyn SnapshotLedger>>,
}

impl ScanPipeline {
    pub fn new(gatherer: Arc<dyn FactGatherer>, rules: AlertRules) -> Self {
        Self {
            gatherer,
            rules,
            max_parallel_fetches: DEFAULT_MAX_PARALLEL_FETCHES,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            ledger: None,
        }
    }

    /// Apply the concurrency and timeout settings of `config`.
    pub fn with_config(self, config: &RadarConfig) -> Self {
        self.with_max_parallel_fetches(config.max_parallel_fetches)
            .with_fetch_timeout(config.fetch_timeout())
    }

    pub fn with_max_parallel_fetches(mut self, max: usize) -> Self {
        self.max_parallel_fetches = max.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Also append every fresh snapshot to `ledger`.
    pub fn with_ledger(mut self, ledger: Arc<dyn SnapshotLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn rules(&self) -> &AlertRules {
        &self.rules
    }

    /// Run one cycle: gather, score, detect, persist state, emit alerts.
    ///
    /// Per-token failures end up as error results in the report. Only state
    /// persistence and alert emission failures abort the cycle.
    #[instrument(skip_all, fields(tokens = tokens.len()))]
    pub async fn run_cycle(
        &self,
        tokens: &[Token],
        state: &mut dyn StateStore,
        sink: &dyn AlertSink,
    ) -> Result<CycleReport> {
        let cycle_ts = Utc::now();
        let fetched = self.fetch_all(tokens).await;

        let mut results = Vec::with_capacity(tokens.len());
        let mut alerts = Vec::new();

        for (token, outcome) in tokens.iter().zip(fetched) {
            let key = token.identity_key();
            match outcome {
                Ok(facts) => {
                    let snapshot = build_snapshot(token, &facts, &self.rules, Utc::now());
                    let reasons = detect(state.get(&key), &snapshot, &self.rules);
                    debug!(
                        "{} scored {} ({}), {} reason(s)",
                        key,
                        snapshot.risk_score,
                        snapshot.risk,
                        reasons.len()
                    );
                    if let Some(alert) = Alert::from_reasons(snapshot.clone(), reasons) {
                        alerts.push(alert);
                    }
                    state.put(key.clone(), snapshot.clone());
                    results.push(ScanResult::Ok { key, snapshot });
                }
                Err(e) => {
                    warn!("Fact gathering failed for {}: {}", key, e);
                    results.push(ScanResult::Error {
                        key,
                        ts: Utc::now(),
                        token: token.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        state.save().await?;

        if let Some(ledger) = &self.ledger {
            record_in_ledger(ledger.as_ref(), &results).await;
        }

        sink.emit(&alerts).await?;

        let report = CycleReport {
            ts: cycle_ts,
            results,
            alerts,
        };
        info!(
            "Cycle complete: {} token(s), {} error(s), {} alert(s)",
            report.results.len(),
            report.error_count(),
            report.alerts.len()
        );
        Ok(report)
    }

    /// Gather and score a single token without touching any state.
    #[instrument(skip(self, token), fields(address = %token.address))]
    pub async fn analyze(&self, token: &Token) -> Result<Snapshot, FetchError> {
        let facts = gather_with_timeout(self.gatherer.as_ref(), token, self.fetch_timeout).await?;
        Ok(build_snapshot(token, &facts, &self.rules, Utc::now()))
    }

    /// Fetch facts for every token concurrently; results come back in input order.
    async fn fetch_all(&self, tokens: &[Token]) -> Vec<Result<TokenFacts, FetchError>> {
        let semaphore = Arc::new(Semaphore::new(self.max_parallel_fetches));
        let mut handles = Vec::with_capacity(tokens.len());

        for token in tokens {
            let gatherer = Arc::clone(&self.gatherer);
            let semaphore = Arc::clone(&semaphore);
            let token = token.clone();
            let timeout = self.fetch_timeout;

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return Err(FetchError::Worker(e.to_string())),
                };
                gather_with_timeout(gatherer.as_ref(), &token, timeout).await
            }));
        }

        let mut fetched = Vec::with_capacity(handles.len());
        for handle in handles {
            fetched.push(match handle.await {
                Ok(outcome) => outcome,
                Err(e) => Err(FetchError::Worker(e.to_string())),
            });
        }
        fetched
    }
}

async fn gather_with_timeout(
    gatherer: &dyn FactGatherer,
    token: &Token,
    timeout: Duration,
) -> Result<TokenFacts, FetchError> {
    match tokio::time::timeout(timeout, gatherer.gather(token)).await {
        Ok(outcome) => outcome,
        Err(_) => Err(FetchError::Timeout(timeout)),
    }
}

/// Ledger writes are best-effort; the state file drives change detection.
async fn record_in_ledger(ledger: &dyn SnapshotLedger, results: &[ScanResult]) {
    let mut recorded = 0usize;
    for snapshot in results.iter().filter_map(ScanResult::snapshot) {
        match ledger.insert_snapshot(snapshot).await {
            Ok(_) => recorded += 1,
            Err(e) => warn!("Failed to record snapshot for {} in ledger: {:#}", snapshot.token.address, e),
        }
    }
    debug!("Recorded {} snapshot(s) in ledger", recorded);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radar::storage::MemoryStateStore;
    use crate::radar::types::{Authority, MarketData};
    use crate::types::Chain;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct StaticGatherer {
        facts: HashMap<String, TokenFacts>,
    }

    #[async_trait]
    impl FactGatherer for StaticGatherer {
        async fn gather(&self, token: &Token) -> Result<TokenFacts, FetchError> {
            self.facts
                .get(&token.address)
                .cloned()
                .ok_or_else(|| FetchError::Rpc(format!("account {} not found", token.address)))
        }
    }

    #[derive(Default)]
    struct CapturingSink {
        batches: Mutex<Vec<Vec<Alert>>>,
    }

    #[async_trait]
    impl AlertSink for CapturingSink {
        async fn emit(&self, alerts: &[Alert]) -> Result<()> {
            self.batches.lock().unwrap().push(alerts.to_vec());
            Ok(())
        }
    }

    fn risky_facts() -> TokenFacts {
        TokenFacts {
            mint_authority: Authority::Set("Auth".into()),
            freeze_authority: Authority::Set("Freeze".into()),
            supply_raw: Some(100),
            decimals: Some(0),
            top_holder_amounts: vec![10],
            market: MarketData::default(),
        }
    }

    #[tokio::test]
    async fn test_failed_token_leaves_state_untouched() {
        let gatherer = StaticGatherer {
            facts: HashMap::from([("GOOD".to_string(), risky_facts())]),
        };
        let pipeline = ScanPipeline::new(Arc::new(gatherer), AlertRules::default());
        let tokens = vec![
            Token::new("GOOD", Chain::Solana, "GOOD"),
            Token::new("BAD", Chain::Solana, "BAD"),
        ];
        let mut state = MemoryStateStore::new();
        let sink = CapturingSink::default();

        let report = pipeline.run_cycle(&tokens, &mut state, &sink).await.unwrap();

        assert_eq!(report.error_count(), 1);
        assert!(report.results[1].is_error());
        assert_eq!(state.len(), 1);
        assert!(state.get("solana:bad").is_none());
        // score 5 + 3 = 8: HIGH on first sighting
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(sink.batches.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_does_not_need_state() {
        let gatherer = StaticGatherer {
            facts: HashMap::from([("GOOD".to_string(), risky_facts())]),
        };
        let pipeline = ScanPipeline::new(Arc::new(gatherer), AlertRules::default());

        let snapshot = pipeline.analyze(&Token::new("GOOD", Chain::Solana, "GOOD")).await.unwrap();
        assert_eq!(snapshot.risk_score, 8);
        assert_eq!(snapshot.top10_pct, Some(10.0));

        let err = pipeline.analyze(&Token::new("BAD", Chain::Solana, "BAD")).await.unwrap_err();
        assert!(matches!(err, FetchError::Rpc(_)));
    }

    #[test]
    fn test_parallelism_is_at_least_one() {
        let gatherer = StaticGatherer { facts: HashMap::new() };
        let pipeline = ScanPipeline::new(Arc::new(gatherer), AlertRules::default()).with_max_parallel_fetches(0);
        assert_eq!(pipeline.max_parallel_fetches, 1);
    }
}
