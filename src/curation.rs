//! Token list curation.
//!
//! The private list (`alpha-list.local.json`) carries working notes that must
//! never leave the machine. Publishing strips every token down to its public
//! fields, drops duplicates and stamps the list before writing it out.

use anyhow::Result;
use chrono::{SecondsFormat, Utc};
use std::collections::HashSet;
use std::path::Path;
use tracing::{info, warn};

use crate::errors::RadarError;
use crate::radar::storage::write_json_atomic;
use crate::types::{Token, TokenList};

/// Source stamp of published lists.
pub const PUBLIC_LIST_SOURCE: &str = "binance-alpha-manual";

/// Read a token list file. A missing or unparseable file is fatal.
pub async fn read_token_list(path: &Path) -> Result<TokenList, RadarError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RadarError::TokenListUnreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    serde_json::from_str(&text).map_err(|e| RadarError::TokenListUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Load the scan input: tokens without an address and repeated identity keys
/// are dropped, the rest keep their list order. An empty result is fatal.
pub async fn load_token_list(path: &Path) -> Result<Vec<Token>, RadarError> {
    let list = read_token_list(path).await?;
    let tokens = validate_tokens(list.tokens);
    if tokens.is_empty() {
        return Err(RadarError::TokenListEmpty {
            path: path.to_path_buf(),
        });
    }
    info!("Loaded {} token(s) from {}", tokens.len(), path.display());
    Ok(tokens)
}

pub fn validate_tokens(tokens: Vec<Token>) -> Vec<Token> {
    let mut seen = HashSet::new();
    let mut valid = Vec::with_capacity(tokens.len());

    for token in tokens {
        if token.address.trim().is_empty() {
            warn!("Skipping token {} without an address", token.symbol);
            continue;
        }
        let key = token.identity_key();
        if !seen.insert(key.clone()) {
            warn!("Skipping duplicate token {}", key);
            continue;
        }
        valid.push(token);
    }
    valid
}

/// Public form of a token: symbol, chain, address and notes only.
pub fn sanitize_token(token: Token) -> Token {
    Token {
        symbol: token.symbol,
        name: None,
        chain: token.chain,
        address: token.address,
        tags: Vec::new(),
        notes: token.notes,
    }
}

/// Sanitize, de-duplicate (first occurrence wins) and stamp a private list.
pub fn build_public_list(private: TokenList) -> TokenList {
    let mut seen = HashSet::new();
    let tokens = private
        .tokens
        .into_iter()
        .map(sanitize_token)
        .filter(|token| !token.address.trim().is_empty())
        .filter(|token| seen.insert(token.identity_key()))
        .collect();

    TokenList {
        source: Some(PUBLIC_LIST_SOURCE.to_string()),
        updated_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        tokens,
    }
}

/// Publish the private list at `private_path` to `public_path`.
pub async fn publish(private_path: &Path, public_path: &Path) -> Result<TokenList> {
    let private = read_token_list(private_path).await?;
    let public = build_public_list(private);

    write_json_atomic(public_path, &public)
        .await
        .map_err(|e| RadarError::OutputUnwritable {
            path: public_path.to_path_buf(),
            reason: format!("{:#}", e),
        })?;

    info!(
        "Published {} token(s) to {}",
        public.tokens.len(),
        public_path.display()
    );
    Ok(public)
}
