//! Best-effort market data from the DexScreener aggregator.
//!
//! API: `{base}/tokens/{address}`, free, no API key required. Any failure is
//! reported to the caller, which degrades it to unknown market data.

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::radar::types::MarketData;

#[derive(Debug, Deserialize)]
struct DexScreenerResponse {
    #[serde(default)]
    pairs: Option<Vec<DexPair>>,
}

#[derive(Debug, Deserialize)]
struct DexPair {
    #[serde(default)]
    liquidity: Option<DexLiquidity>,
    #[serde(default)]
    volume: Option<DexVolume>,
}

#[derive(Debug, Deserialize)]
struct DexLiquidity {
    usd: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DexVolume {
    h24: Option<f64>,
}

/// DexScreener API client.
#[derive(Debug, Clone)]
pub struct DexScreenerClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl DexScreenerClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Liquidity and 24h volume of the first listed pair.
    ///
    /// `Ok(None)` when the token has no pairs.
    #[instrument(skip(self))]
    pub async fn fetch_market(&self, address: &str) -> Result<Option<MarketData>> {
        let url = format!("{}/tokens/{}", self.base_url, address);

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .context("DexScreener request failed")?;

        if !response.status().is_success() {
            return Err(anyhow!("DexScreener API error: {}", response.status()));
        }

        let body = response.text().await.context("Failed to read DexScreener response")?;
        let market = parse_market(&body)?;
        debug!("DexScreener market for {}: {:?}", address, market);
        Ok(market)
    }
}

/// Extract market figures from a DexScreener token response body.
pub fn parse_market(body: &str) -> Result<Option<MarketData>> {
    let data: DexScreenerResponse =
        serde_json::from_str(body).context("Failed to parse DexScreener response")?;

    let pair = match data.pairs.and_then(|pairs| pairs.into_iter().next()) {
        Some(pair) => pair,
        None => return Ok(None),
    };

    Ok(Some(MarketData {
        liquidity_usd: pair
            .liquidity
            .and_then(|l| l.usd)
            .filter(|v| v.is_finite() && *v >= 0.0),
        volume_24h_usd: pair
            .volume
            .and_then(|v| v.h24)
            .filter(|v| v.is_finite() && *v >= 0.0),
    }))
}
