//! Alert sinks - where a cycle's alert batch goes.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TelegramConfig;
use crate::radar::storage::{read_json_optional, write_json_atomic};
use crate::radar::types::Alert;

/// Consumer of an alert batch.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn emit(&self, alerts: &[Alert]) -> Result<()>;
}

/// Render one alert as plain text lines.
pub fn render_alert(alert: &Alert) -> String {
    let token = &alert.token;
    let snapshot = &alert.snapshot;

    let mut lines = Vec::with_capacity(alert.reasons.len() + 6);
    lines.push(format!("ALPHA ALERT: {} ({})", token.symbol, token.chain));
    lines.push(format!("Address: {}", token.address));
    lines.extend(alert.reasons.iter().map(|reason| format!("- {}", reason)));
    lines.push(format!("Risk: {}", snapshot.risk));
    lines.push(format!("Top10%: {}", or_unknown(snapshot.top10_pct)));
    lines.push(format!("Liquidity$ (best-effort): {}", or_unknown(snapshot.liquidity_usd)));
    lines.push(format!("Volume24h$ (best-effort): {}", or_unknown(snapshot.volume_24h_usd)));
    lines.join("\n")
}

fn or_unknown<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "?".to_string())
}

/// Alert batch as written to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertBatch {
    pub ts: DateTime<Utc>,
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

/// Writes the batch to a JSON file, replacing the previous one.
#[derive(Debug, Clone)]
pub struct AlertFileSink {
    path: PathBuf,
}

impl AlertFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the last written batch, if any.
    pub async fn read(&self) -> Result<Option<AlertBatch>> {
        read_json_optional(&self.path).await
    }
}

#[async_trait]
impl AlertSink for AlertFileSink {
    async fn emit(&self, alerts: &[Alert]) -> Result<()> {
        let batch = AlertBatch {
            ts: Utc::now(),
            alerts: alerts.to_vec(),
        };
        write_json_atomic(&self.path, &batch).await?;
        info!("Wrote {} alert(s) to {}", alerts.len(), self.path.display());
        Ok(())
    }
}

/// Sends each alert as a Telegram message.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    config: TelegramConfig,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(client: Client, config: TelegramConfig) -> Self {
        Self { client, config }
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }

    async fn send(&self, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.config.chat_id,
            text,
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.send_message_url())
            .timeout(Duration::from_secs(15))
            .json(&body)
            .send()
            .await
            .context("Telegram request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(anyhow!("Telegram error ({}): {}", status, detail));
        }
        Ok(())
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    async fn emit(&self, alerts: &[Alert]) -> Result<()> {
        for alert in alerts {
            self.send(&render_alert(alert))
                .await
                .with_context(|| format!("Failed to send alert for {}", alert.token.address))?;
            debug!("Sent alert for {}", alert.token.address);
        }
        info!("Sent {} alert(s) to Telegram", alerts.len());
        Ok(())
    }
}
