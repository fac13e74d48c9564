//! Snapshot, facts and alert types for the radar.

use crate::types::Token;
use chrono::{DateTime, Utc};
use nonempty::NonEmpty;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Marker the on-chain layer uses for a permanently disabled authority.
pub const AUTHORITY_NOT_SET: &str = "(not set)";

/// Tri-state on-chain authority.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Authority {
    /// Authority held by the given key
    Set(String),
    /// Authority permanently disabled
    NotSet,
    /// Not observed (e.g. chain without an on-chain probe)
    #[default]
    Unknown,
}

impl Authority {
    pub fn from_option(key: Option<String>) -> Self {
        match key {
            Some(key) => Authority::Set(key),
            None => Authority::NotSet,
        }
    }

    pub fn is_set(&self) -> bool {
        matches!(self, Authority::Set(_))
    }
}

impl Serialize for Authority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Authority::Set(key) => serializer.serialize_str(key),
            Authority::NotSet => serializer.serialize_str(AUTHORITY_NOT_SET),
            Authority::Unknown => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for Authority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(match raw {
            None => Authority::Unknown,
            Some(s) if s == AUTHORITY_NOT_SET => Authority::NotSet,
            Some(s) if s.trim().is_empty() => Authority::Unknown,
            Some(s) => Authority::Set(s),
        })
    }
}

/// Best-effort market figures from an aggregator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketData {
    pub liquidity_usd: Option<f64>,
    pub volume_24h_usd: Option<f64>,
}

/// Raw facts gathered for one token before scoring.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenFacts {
    pub mint_authority: Authority,
    pub freeze_authority: Authority,
    /// Raw total supply in base units
    pub supply_raw: Option<u128>,
    pub decimals: Option<u8>,
    /// Raw amounts of the largest holder accounts, largest first
    pub top_holder_amounts: Vec<u128>,
    pub market: MarketData,
}

/// Risk label derived from the integer score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLabel {
    Low,
    Med,
    High,
}

impl RiskLabel {
    /// HIGH when score >= 8, MED when 4 <= score < 8, LOW otherwise.
    pub fn from_score(score: u32) -> Self {
        match score {
            s if s >= 8 => RiskLabel::High,
            s if s >= 4 => RiskLabel::Med,
            _ => RiskLabel::Low,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLabel::Low => "LOW",
            RiskLabel::Med => "MED",
            RiskLabel::High => "HIGH",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "LOW" => Some(RiskLabel::Low),
            "MED" => Some(RiskLabel::Med),
            "HIGH" => Some(RiskLabel::High),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the scorer.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub score: u32,
    pub risk: RiskLabel,
    /// One entry per evaluated rule, in evaluation order
    pub flags: Vec<String>,
}

/// One scored observation of a token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub ts: DateTime<Utc>,
    pub token: Token,
    #[serde(default)]
    pub mint_authority: Authority,
    #[serde(default)]
    pub freeze_authority: Authority,
    /// Raw supply as a decimal string
    #[serde(default)]
    pub supply_raw: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub top10_pct: Option<f64>,
    #[serde(default)]
    pub liquidity_usd: Option<f64>,
    #[serde(default, rename = "volume24hUsd")]
    pub volume_24h_usd: Option<f64>,
    pub risk_score: u32,
    pub risk: RiskLabel,
    #[serde(default)]
    pub flags: Vec<String>,
}

/// Alert produced for one token when at least one detector rule fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub token: Token,
    #[serde(
        rename = "alerts",
        serialize_with = "serialize_reasons",
        deserialize_with = "deserialize_reasons"
    )]
    pub reasons: NonEmpty<String>,
    pub snapshot: Snapshot,
}

impl Alert {
    /// Build an alert; `None` when no reason fired.
    pub fn from_reasons(snapshot: Snapshot, reasons: Vec<String>) -> Option<Self> {
        let reasons = NonEmpty::from_vec(reasons)?;
        Some(Self {
            token: snapshot.token.clone(),
            reasons,
            snapshot,
        })
    }
}

fn serialize_reasons<S: Serializer>(
    reasons: &NonEmpty<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(reasons.iter())
}

fn deserialize_reasons<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<NonEmpty<String>, D::Error> {
    let reasons = Vec::<String>::deserialize(deserializer)?;
    NonEmpty::from_vec(reasons)
        .ok_or_else(|| serde::de::Error::custom("alert must carry at least one reason"))
}

/// Per-token entry of the batch summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ScanResult {
    Ok {
        key: String,
        snapshot: Snapshot,
    },
    Error {
        key: String,
        ts: DateTime<Utc>,
        token: Token,
        error: String,
    },
}

impl ScanResult {
    pub fn key(&self) -> &str {
        match self {
            ScanResult::Ok { key, .. } | ScanResult::Error { key, .. } => key,
        }
    }

    pub fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            ScanResult::Ok { snapshot, .. } => Some(snapshot),
            ScanResult::Error { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ScanResult::Error { .. })
    }
}

/// Everything one scan cycle produced, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub ts: DateTime<Utc>,
    pub results: Vec<ScanResult>,
    pub alerts: Vec<Alert>,
}

impl CycleReport {
    pub fn error_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_error()).count()
    }
}
