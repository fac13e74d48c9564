//! Runtime configuration and alert rules.
//!
//! `RadarConfig` is built from defaults overridden by environment variables
//! (or builder methods in tests). `AlertRules` is read from the rules JSON
//! file; unrecognized or malformed options fall back to their defaults.

use crate::errors::RadarError;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MIN_LIQUIDITY_USD: f64 = 0.0;
pub const DEFAULT_TOP10_JUMP_PCT: f64 = 10.0;
pub const DEFAULT_LIQUIDITY_DROP_PCT: f64 = 30.0;

pub const DEFAULT_RPC_URL: &str = "https://api.mainnet-beta.solana.com";
pub const DEFAULT_DEXSCREENER_URL: &str = "https://api.dexscreener.com/latest/dex";
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

pub const DEFAULT_MAX_PARALLEL_FETCHES: usize = 4;
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_RPC_RETRY_ATTEMPTS: usize = 3;
pub const DEFAULT_RATE_LIMIT_RPS: u32 = 10;

pub const STATE_FILE: &str = "alpha-state.json";
pub const SUMMARY_FILE: &str = "alpha-latest.json";
pub const ALERTS_FILE: &str = "alpha-alerts.json";
pub const LATEST_DIR: &str = "latest";

/// Scoring and change-detection thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRules {
    /// Liquidity below this adds risk points
    pub min_liquidity_usd: f64,
    /// Percentage-point increase of top-10 concentration that alerts
    pub top10_jump_pct: f64,
    /// Percentage drop of liquidity that alerts
    pub liquidity_drop_pct: f64,
}

impl Default for AlertRules {
    fn default() -> Self {
        Self {
            min_liquidity_usd: DEFAULT_MIN_LIQUIDITY_USD,
            top10_jump_pct: DEFAULT_TOP10_JUMP_PCT,
            liquidity_drop_pct: DEFAULT_LIQUIDITY_DROP_PCT,
        }
    }
}

impl AlertRules {
    /// Extract rules from a parsed rules document.
    ///
    /// Accepts flat keys at the top level as well as the nested
    /// `solana.minLiquidityUsd` / `alerts.*` layout; flat keys win.
    pub fn from_value(doc: &Value) -> Self {
        let defaults = Self::default();

        let lookup = |section: &str, key: &str| -> Option<f64> {
            number(doc.get(key)).or_else(|| number(doc.get(section).and_then(|s| s.get(key))))
        };

        Self {
            min_liquidity_usd: lookup("solana", "minLiquidityUsd")
                .unwrap_or(defaults.min_liquidity_usd),
            top10_jump_pct: lookup("alerts", "top10JumpPct").unwrap_or(defaults.top10_jump_pct),
            liquidity_drop_pct: lookup("alerts", "liquidityDropPct")
                .unwrap_or(defaults.liquidity_drop_pct),
        }
    }

    /// Parse rules from JSON text. Invalid JSON is an error; invalid options are not.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let doc: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(&doc))
    }

    /// Load the rules file. A missing or unparseable file is fatal.
    pub fn load(path: &Path) -> Result<Self, RadarError> {
        let text = std::fs::read_to_string(path).map_err(|e| RadarError::RulesUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let rules = Self::from_json(&text).map_err(|e| RadarError::RulesUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!("Loaded alert rules from {}: {:?}", path.display(), rules);
        Ok(rules)
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64).filter(|v| v.is_finite())
}

/// Telegram bot credentials.
#[derive(Debug, Clone, PartialEq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

/// Runtime configuration for one radar run.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarConfig {
    pub root_dir: PathBuf,
    pub rpc_url: String,
    pub rules_path: PathBuf,
    pub token_list_path: PathBuf,
    pub private_list_path: PathBuf,
    pub data_dir: PathBuf,
    /// SQLite snapshot ledger; disabled when unset
    pub db_path: Option<PathBuf>,
    pub dexscreener_base_url: String,
    pub max_parallel_fetches: usize,
    pub fetch_timeout_seconds: u64,
    pub rpc_retry_attempts: usize,
    pub rate_limit_requests_per_second: u32,
    pub telegram: Option<TelegramConfig>,
}

impl Default for RadarConfig {
    fn default() -> Self {
        Self::with_root(PathBuf::from("."))
    }
}

impl RadarConfig {
    /// Defaults with every path resolved under `root`.
    pub fn with_root(root: PathBuf) -> Self {
        Self {
            rules_path: root.join("rules.json"),
            token_list_path: root.join("alpha-list.json"),
            private_list_path: root.join("alpha-list.local.json"),
            data_dir: root.join("data"),
            root_dir: root,
            rpc_url: DEFAULT_RPC_URL.to_string(),
            db_path: None,
            dexscreener_base_url: DEFAULT_DEXSCREENER_URL.to_string(),
            max_parallel_fetches: DEFAULT_MAX_PARALLEL_FETCHES,
            fetch_timeout_seconds: DEFAULT_FETCH_TIMEOUT_SECS,
            rpc_retry_attempts: DEFAULT_RPC_RETRY_ATTEMPTS,
            rate_limit_requests_per_second: DEFAULT_RATE_LIMIT_RPS,
            telegram: None,
        }
    }

    /// Build from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let root = var("ALPHA_RADAR_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let mut config = Self::with_root(root);

        if let Some(url) = var("RPC_URL") {
            config.rpc_url = url;
        }
        if let Some(path) = var("RULES_PATH") {
            config.rules_path = PathBuf::from(path);
        }
        if let Some(path) = var("ALPHA_LIST_PATH") {
            config.token_list_path = PathBuf::from(path);
        }
        if let Some(path) = var("ALPHA_LIST_LOCAL_PATH") {
            config.private_list_path = PathBuf::from(path);
        }
        if let Some(path) = var("DATA_DIR") {
            config.data_dir = PathBuf::from(path);
        }
        config.db_path = var("DB_PATH").map(PathBuf::from);
        if let Some(url) = var("DEXSCREENER_URL") {
            config.dexscreener_base_url = url;
        }

        config.max_parallel_fetches =
            parse_or("MAX_PARALLEL_FETCHES", var("MAX_PARALLEL_FETCHES"), config.max_parallel_fetches)
                .max(1);
        config.fetch_timeout_seconds =
            parse_or("FETCH_TIMEOUT_SECS", var("FETCH_TIMEOUT_SECS"), config.fetch_timeout_seconds);
        config.rpc_retry_attempts =
            parse_or("RPC_RETRY_ATTEMPTS", var("RPC_RETRY_ATTEMPTS"), config.rpc_retry_attempts);
        config.rate_limit_requests_per_second = parse_or(
            "RPC_RATE_LIMIT_RPS",
            var("RPC_RATE_LIMIT_RPS"),
            config.rate_limit_requests_per_second,
        );

        config.telegram = match (var("TG_BOT_TOKEN"), var("TG_CHAT_ID")) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                bot_token,
                chat_id,
                api_base: var("TG_API_BASE").unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string()),
            }),
            _ => None,
        };

        config
    }

    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.rpc_url = url.into();
        self
    }

    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.data_dir = dir;
        self
    }

    pub fn with_db_path(mut self, path: PathBuf) -> Self {
        self.db_path = Some(path);
        self
    }

    pub fn with_max_parallel_fetches(mut self, max: usize) -> Self {
        self.max_parallel_fetches = max.max(1);
        self
    }

    pub fn with_fetch_timeout(mut self, seconds: u64) -> Self {
        self.fetch_timeout_seconds = seconds;
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }

    pub fn state_path(&self) -> PathBuf {
        self.data_dir.join(STATE_FILE)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.data_dir.join(SUMMARY_FILE)
    }

    pub fn alerts_path(&self) -> PathBuf {
        self.data_dir.join(ALERTS_FILE)
    }

    pub fn latest_dir(&self) -> PathBuf {
        self.data_dir.join(LATEST_DIR)
    }
}

fn parse_or<T: std::str::FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value {:?} for {}", raw, key);
            default
        }),
        None => default,
    }
}
