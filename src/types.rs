//! Core types shared across the alpha-radar system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A chain-specific address (mint on Solana, contract on EVM).
pub type Address = String;

/// Chain a tracked token lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Solana,
    Evm,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Chain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Chain::Solana => "solana",
            Chain::Evm => "evm",
            Chain::Unknown => "unknown",
        }
    }

    /// Parse a chain name, mapping anything unrecognized to `Unknown`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "solana" => Chain::Solana,
            "evm" => Chain::Evm,
            _ => Chain::Unknown,
        }
    }
}

impl fmt::Display for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_symbol() -> String {
    "UNKNOWN".to_string()
}

/// A tracked asset from the curated token list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Display symbol
    #[serde(default = "default_symbol")]
    pub symbol: String,
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub chain: Chain,
    /// Empty when the list entry omits it; such entries are dropped on load
    #[serde(default)]
    pub address: Address,
    /// Informational tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Public notes carried over from list curation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Token {
    pub fn new(symbol: impl Into<String>, chain: Chain, address: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            chain,
            address: address.into(),
            tags: Vec::new(),
            notes: None,
        }
    }

    /// Unique identity key: lower-cased `chain:address`.
    pub fn identity_key(&self) -> String {
        identity_key(self.chain, &self.address)
    }
}

pub fn identity_key(chain: Chain, address: &str) -> String {
    format!("{}:{}", chain.as_str(), address.trim()).to_lowercase()
}

/// The published token list consumed by a scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenList {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub tokens: Vec<Token>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_is_lowercased() {
        let token = Token::new("BONK", Chain::Solana, "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263");
        assert_eq!(
            token.identity_key(),
            "solana:dezxaz8z7pnrnrjjz3wxborgixca6xjnb7yab1ppb263"
        );
    }

    #[test]
    fn test_unknown_chain_deserializes() {
        let token: Token =
            serde_json::from_str(r#"{"chain":"tron","address":"T9yD14Nj"}"#).unwrap();
        assert_eq!(token.chain, Chain::Unknown);
        assert_eq!(token.symbol, "UNKNOWN");
        assert!(token.tags.is_empty());
    }

    #[test]
    fn test_token_defaults() {
        let token: Token = serde_json::from_str(r#"{"symbol":"B"}"#).unwrap();
        assert_eq!(token.chain, Chain::Unknown);
        assert!(token.address.is_empty());
    }

    #[test]
    fn test_chain_parse() {
        assert_eq!(Chain::parse("SOLANA"), Chain::Solana);
        assert_eq!(Chain::parse(" evm "), Chain::Evm);
        assert_eq!(Chain::parse("cosmos"), Chain::Unknown);
    }
}
