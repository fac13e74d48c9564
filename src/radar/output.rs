//! Batch summary and per-token snapshot files.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::RadarError;
use crate::radar::storage::{read_json_optional, write_json_atomic};
use crate::radar::types::{CycleReport, ScanResult, Snapshot};

/// Batch summary of one cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSummary {
    pub ts: DateTime<Utc>,
    pub results: Vec<ScanResult>,
}

/// Writes cycle results under the data directory.
#[derive(Debug, Clone)]
pub struct OutputWriter {
    summary_path: PathBuf,
    latest_dir: PathBuf,
}

impl OutputWriter {
    pub fn new(summary_path: impl Into<PathBuf>, latest_dir: impl Into<PathBuf>) -> Self {
        Self {
            summary_path: summary_path.into(),
            latest_dir: latest_dir.into(),
        }
    }

    pub fn summary_path(&self) -> &Path {
        &self.summary_path
    }

    /// Write the batch summary and one file per successful snapshot.
    pub async fn write_report(&self, report: &CycleReport) -> Result<()> {
        let summary = BatchSummary {
            ts: report.ts,
            results: report.results.clone(),
        };
        write_json_atomic(&self.summary_path, &summary)
            .await
            .map_err(|e| unwritable(&self.summary_path, e))?;

        let mut written = 0usize;
        for snapshot in report.results.iter().filter_map(ScanResult::snapshot) {
            let path = self.snapshot_path(snapshot);
            write_json_atomic(&path, snapshot)
                .await
                .map_err(|e| unwritable(&path, e))?;
            debug!("Wrote snapshot file {}", path.display());
            written += 1;
        }

        info!(
            "Wrote summary of {} result(s) to {} and {} snapshot file(s)",
            report.results.len(),
            self.summary_path.display(),
            written
        );
        Ok(())
    }

    /// Last written batch summary, if any.
    pub async fn read_summary(&self) -> Result<Option<BatchSummary>> {
        read_json_optional(&self.summary_path).await
    }

    /// `<latest_dir>/<chain>-<symbol>-<address>.json`
    pub fn snapshot_path(&self, snapshot: &Snapshot) -> PathBuf {
        let token = &snapshot.token;
        let stem = format!("{}-{}-{}", token.chain, token.symbol, token.address);
        self.latest_dir.join(format!("{}.json", sanitize_file_name(&stem)))
    }
}

fn unwritable(path: &Path, e: anyhow::Error) -> anyhow::Error {
    RadarError::OutputUnwritable {
        path: path.to_path_buf(),
        reason: format!("{:#}", e),
    }
    .into()
}

/// Replace each run of characters outside `[A-Za-z0-9_.-]` with one `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radar::types::{Authority, RiskLabel};
    use crate::types::{Chain, Token};

    fn snapshot(symbol: &str, address: &str) -> Snapshot {
        Snapshot {
            ts: Utc::now(),
            token: Token::new(symbol, Chain::Solana, address),
            mint_authority: Authority::NotSet,
            freeze_authority: Authority::NotSet,
            supply_raw: Some("1000".into()),
            decimals: Some(0),
            top10_pct: Some(10.0),
            liquidity_usd: None,
            volume_24h_usd: None,
            risk_score: 0,
            risk: RiskLabel::Low,
            flags: Vec::new(),
        }
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("solana-WIF-EKpQ"), "solana-WIF-EKpQ");
        assert_eq!(sanitize_file_name("solana-$W I F/../x"), "solana-_W_I_F_.._x");
        assert_eq!(sanitize_file_name("evm-猫猫-0xAb"), "evm-_-0xAb");
    }

    #[tokio::test]
    async fn test_write_report_skips_errors() {
        let dir = tempfile::tempdir().unwrap();
        let writer = OutputWriter::new(dir.path().join("alpha-latest.json"), dir.path().join("latest"));

        let ok = snapshot("WIF", "EKpQ");
        let report = CycleReport {
            ts: Utc::now(),
            results: vec![
                ScanResult::Ok {
                    key: "solana:ekpq".into(),
                    snapshot: ok.clone(),
                },
                ScanResult::Error {
                    key: "solana:bad".into(),
                    ts: Utc::now(),
                    token: Token::new("BAD", Chain::Solana, "bad"),
                    error: "RPC error: boom".into(),
                },
            ],
            alerts: Vec::new(),
        };
        writer.write_report(&report).await.unwrap();

        let summary = writer.read_summary().await.unwrap().unwrap();
        assert_eq!(summary.results, report.results);

        let files: Vec<_> = std::fs::read_dir(dir.path().join("latest"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(files, vec!["solana-WIF-EKpQ.json".to_string()]);
        assert_eq!(writer.snapshot_path(&ok), dir.path().join("latest").join("solana-WIF-EKpQ.json"));
    }
}
