//! Data sources for gathering on-chain and market facts about a token.
//!
//! On-chain facts come from a Solana RPC endpoint (mint account and largest
//! token accounts) behind a shared rate limiter and retry policy. Market data
//! is best-effort: any aggregator failure degrades to unknown values.

use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::Client;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::RetryIf;
use tracing::{debug, instrument, warn};

use crate::config::RadarConfig;
use crate::errors::FetchError;
use crate::radar::market_data::DexScreenerClient;
use crate::radar::scorer::TOP_HOLDER_COUNT;
use crate::radar::types::{Authority, MarketData, TokenFacts};
use crate::types::{Chain, Token};

/// SPL Token program ID
pub const TOKEN_PROGRAM: &str = "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA";

/// Token-2022 program ID
pub const TOKEN_2022_PROGRAM: &str = "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb";

/// Size of the base SPL mint layout (Token-2022 extensions follow it).
pub const MINT_LEN: usize = 82;

/// Source of raw facts for one token.
#[async_trait]
pub trait FactGatherer: Send + Sync {
    /// Gather facts for `token`. Market data is best-effort and never fails
    /// the call; only the on-chain portion can.
    async fn gather(&self, token: &Token) -> Result<TokenFacts, FetchError>;
}

/// Decoded base layout of an SPL mint account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintInfo {
    pub mint_authority: Option<Pubkey>,
    pub supply: u64,
    pub decimals: u8,
    pub is_initialized: bool,
    pub freeze_authority: Option<Pubkey>,
}

/// Decode the 82-byte SPL mint layout.
///
/// ```text
/// 0..4    COption tag (u32 LE)    4..36   mint authority
/// 36..44  supply (u64 LE)         44      decimals
/// 45      is_initialized          46..50  COption tag (u32 LE)
/// 50..82  freeze authority
/// ```
pub fn decode_mint(data: &[u8]) -> Result<MintInfo, FetchError> {
    if data.len() < MINT_LEN {
        return Err(FetchError::MalformedMint(format!(
            "expected at least {} bytes, got {}",
            MINT_LEN,
            data.len()
        )));
    }

    let mint_authority = decode_coption_pubkey(&data[0..36])?;
    let supply = u64::from_le_bytes(read_array(&data[36..44])?);
    let decimals = data[44];
    let is_initialized = match data[45] {
        0 => false,
        1 => true,
        other => {
            return Err(FetchError::MalformedMint(format!(
                "invalid is_initialized byte {}",
                other
            )))
        }
    };
    let freeze_authority = decode_coption_pubkey(&data[46..82])?;

    Ok(MintInfo {
        mint_authority,
        supply,
        decimals,
        is_initialized,
        freeze_authority,
    })
}

fn decode_coption_pubkey(bytes: &[u8]) -> Result<Option<Pubkey>, FetchError> {
    let tag = u32::from_le_bytes(read_array(&bytes[0..4])?);
    match tag {
        0 => Ok(None),
        1 => Ok(Some(Pubkey::new_from_array(read_array(&bytes[4..36])?))),
        other => Err(FetchError::MalformedMint(format!("invalid option tag {}", other))),
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N], FetchError> {
    <[u8; N]>::try_from(bytes).map_err(|e| FetchError::MalformedMint(e.to_string()))
}

/// Parse raw holder amounts, keeping the ten largest accounts.
pub fn parse_holder_amounts<'a, I>(amounts: I) -> Result<Vec<u128>, FetchError>
where
    I: IntoIterator<Item = &'a str>,
{
    amounts
        .into_iter()
        .take(TOP_HOLDER_COUNT)
        .map(|raw| {
            raw.parse::<u128>()
                .map_err(|e| FetchError::Rpc(format!("invalid holder amount {:?}: {}", raw, e)))
        })
        .collect()
}

/// Solana RPC + DexScreener fact gatherer.
pub struct SolanaFactGatherer {
    rpc: Arc<RpcClient>,
    market: DexScreenerClient,
    limiter: DefaultDirectRateLimiter,
    retry_attempts: usize,
}

impl SolanaFactGatherer {
    pub fn new(
        rpc: Arc<RpcClient>,
        market: DexScreenerClient,
        requests_per_second: u32,
        retry_attempts: usize,
    ) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
        Self {
            rpc,
            market,
            limiter: RateLimiter::direct(quota),
            retry_attempts,
        }
    }

    /// Build from runtime configuration.
    pub fn from_config(config: &RadarConfig) -> Self {
        let rpc = Arc::new(RpcClient::new_with_timeout(
            config.rpc_url.clone(),
            config.fetch_timeout(),
        ));
        let market = DexScreenerClient::new(Client::new(), config.dexscreener_base_url.clone());
        Self::new(
            rpc,
            market,
            config.rate_limit_requests_per_second,
            config.rpc_retry_attempts,
        )
    }

    /// Mint and holder facts with retries on transient failures.
    #[instrument(skip(self, mint), fields(mint = %mint))]
    async fn fetch_onchain_with_retries(&self, mint: &Pubkey) -> Result<(MintInfo, Vec<u128>), FetchError> {
        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .map(jitter)
            .take(self.retry_attempts);

        RetryIf::spawn(
            retry_strategy,
            || self.fetch_onchain(mint),
            |e: &FetchError| {
                if e.is_transient() {
                    debug!("Retrying on-chain fetch: {}", e);
                }
                e.is_transient()
            },
        )
        .await
    }

    async fn fetch_onchain(&self, mint: &Pubkey) -> Result<(MintInfo, Vec<u128>), FetchError> {
        self.limiter.until_ready().await;
        let account = self
            .rpc
            .get_account(mint)
            .await
            .map_err(|e| FetchError::Rpc(e.to_string()))?;

        let owner = account.owner.to_string();
        if owner != TOKEN_PROGRAM && owner != TOKEN_2022_PROGRAM {
            return Err(FetchError::NotAMint {
                address: mint.to_string(),
                owner,
            });
        }
        let info = decode_mint(&account.data)?;

        self.limiter.until_ready().await;
        let largest = self
            .rpc
            .get_token_largest_accounts(mint)
            .await
            .map_err(|e| FetchError::Rpc(e.to_string()))?;
        let amounts = parse_holder_amounts(largest.iter().map(|b| b.amount.amount.as_str()))?;

        debug!(
            "Mint {}: supply={} decimals={} holders={}",
            mint,
            info.supply,
            info.decimals,
            amounts.len()
        );
        Ok((info, amounts))
    }

    /// Market data, degraded to unknown on any failure.
    async fn market_for(&self, address: &str) -> MarketData {
        match self.market.fetch_market(address).await {
            Ok(Some(market)) => market,
            Ok(None) => {
                debug!("No market pairs listed for {}", address);
                MarketData::default()
            }
            Err(e) => {
                warn!("Market data unavailable for {}: {:#}", address, e);
                MarketData::default()
            }
        }
    }
}

#[async_trait]
impl FactGatherer for SolanaFactGatherer {
    #[instrument(skip(self, token), fields(chain = %token.chain, address = %token.address))]
    async fn gather(&self, token: &Token) -> Result<TokenFacts, FetchError> {
        match token.chain {
            Chain::Solana => {
                let mint = Pubkey::from_str(token.address.trim()).map_err(|e| {
                    FetchError::InvalidAddress {
                        address: token.address.clone(),
                        reason: e.to_string(),
                    }
                })?;

                let (info, amounts) = self.fetch_onchain_with_retries(&mint).await?;
                let market = self.market_for(&token.address).await;

                Ok(TokenFacts {
                    mint_authority: Authority::from_option(info.mint_authority.map(|k| k.to_string())),
                    freeze_authority: Authority::from_option(
                        info.freeze_authority.map(|k| k.to_string()),
                    ),
                    supply_raw: Some(u128::from(info.supply)),
                    decimals: Some(info.decimals),
                    top_holder_amounts: amounts,
                    market,
                })
            }
            // No on-chain probe for other chains; market data only
            Chain::Evm | Chain::Unknown => Ok(TokenFacts {
                market: self.market_for(&token.address).await,
                ..TokenFacts::default()
            }),
        }
    }
}
