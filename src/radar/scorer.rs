//! Snapshot scorer - turns raw token facts into a risk score, label and flags.
//!
//! Scoring is a pure function of the facts and the liquidity threshold. Rules
//! are evaluated in a fixed order; each rule appends exactly one flag when its
//! input is known, and unknown inputs never fail the computation.

use crate::config::AlertRules;
use crate::radar::types::{RiskAssessment, RiskLabel, Snapshot, TokenFacts};
use crate::types::Token;
use chrono::{DateTime, Utc};

/// Only the first ten holder accounts count towards concentration.
pub const TOP_HOLDER_COUNT: usize = 10;

pub const MINT_AUTHORITY_POINTS: u32 = 5;
pub const FREEZE_AUTHORITY_POINTS: u32 = 3;
pub const VERY_CONCENTRATED_POINTS: u32 = 4;
pub const CONCENTRATED_POINTS: u32 = 2;
pub const THIN_LIQUIDITY_POINTS: u32 = 2;

pub const VERY_CONCENTRATED_PCT: f64 = 60.0;
pub const CONCENTRATED_PCT: f64 = 40.0;

pub const FLAG_MINT_SET: &str = "Mint authority is set (supply can change).";
pub const FLAG_MINT_NOT_SET: &str = "Mint authority not set (fixed supply).";
pub const FLAG_FREEZE_SET: &str = "Freeze authority is set (accounts can be frozen).";
pub const FLAG_FREEZE_NOT_SET: &str = "Freeze authority not set.";
pub const FLAG_VERY_CONCENTRATED: &str = "Top 10 holders >= 60% (very concentrated).";
pub const FLAG_CONCENTRATED: &str = "Top 10 holders >= 40% (concentrated).";
pub const FLAG_MODERATE: &str = "Top 10 concentration looks moderate.";
pub const FLAG_LIQUIDITY_OK: &str = "Liquidity passes minimum threshold.";
pub const FLAG_LIQUIDITY_UNKNOWN: &str = "Liquidity data unavailable (best-effort).";

/// Share of `supply` held by the first ten `amounts`, truncated to two
/// decimal places.
///
/// Computed on exact integers; `None` when the supply is zero or the ratio
/// cannot be represented.
pub fn top10_pct(amounts: &[u128], supply: u128) -> Option<f64> {
    if supply == 0 {
        return None;
    }

    let held = amounts
        .iter()
        .take(TOP_HOLDER_COUNT)
        .try_fold(0u128, |acc, amount| acc.checked_add(*amount))?;

    // basis points = held * 10_000 / supply, split to avoid overflowing held * 10_000
    let whole = (held / supply).checked_mul(10_000)?;
    let fraction = (held % supply).checked_mul(10_000)? / supply;
    let basis_points = whole.checked_add(fraction)?;

    Some(basis_points as f64 / 100.0)
}

/// Concentration for a fact set, `None` when the supply is unknown or zero.
pub fn facts_top10_pct(facts: &TokenFacts) -> Option<f64> {
    top10_pct(&facts.top_holder_amounts, facts.supply_raw?)
}

/// Score a fact set against the minimum liquidity threshold.
pub fn score(facts: &TokenFacts, min_liquidity_usd: f64) -> RiskAssessment {
    score_parts(
        facts.mint_authority.is_set(),
        facts.freeze_authority.is_set(),
        facts_top10_pct(facts),
        facts.market.liquidity_usd,
        min_liquidity_usd,
    )
}

fn score_parts(
    mint_authority_set: bool,
    freeze_authority_set: bool,
    top10_pct: Option<f64>,
    liquidity_usd: Option<f64>,
    min_liquidity_usd: f64,
) -> RiskAssessment {
    let mut score = 0;
    let mut flags = Vec::with_capacity(4);

    if mint_authority_set {
        score += MINT_AUTHORITY_POINTS;
        flags.push(FLAG_MINT_SET.to_string());
    } else {
        flags.push(FLAG_MINT_NOT_SET.to_string());
    }

    if freeze_authority_set {
        score += FREEZE_AUTHORITY_POINTS;
        flags.push(FLAG_FREEZE_SET.to_string());
    } else {
        flags.push(FLAG_FREEZE_NOT_SET.to_string());
    }

    if let Some(pct) = top10_pct {
        if pct >= VERY_CONCENTRATED_PCT {
            score += VERY_CONCENTRATED_POINTS;
            flags.push(FLAG_VERY_CONCENTRATED.to_string());
        } else if pct >= CONCENTRATED_PCT {
            score += CONCENTRATED_POINTS;
            flags.push(FLAG_CONCENTRATED.to_string());
        } else {
            flags.push(FLAG_MODERATE.to_string());
        }
    }

    match liquidity_usd {
        Some(liquidity) if liquidity < min_liquidity_usd => {
            score += THIN_LIQUIDITY_POINTS;
            flags.push(format!("Liquidity < ${} (thin).", min_liquidity_usd));
        }
        Some(_) => flags.push(FLAG_LIQUIDITY_OK.to_string()),
        None => flags.push(FLAG_LIQUIDITY_UNKNOWN.to_string()),
    }

    RiskAssessment {
        score,
        risk: RiskLabel::from_score(score),
        flags,
    }
}

/// Score the facts and assemble the snapshot observed at `ts`.
pub fn build_snapshot(
    token: &Token,
    facts: &TokenFacts,
    rules: &AlertRules,
    ts: DateTime<Utc>,
) -> Snapshot {
    let assessment = score(facts, rules.min_liquidity_usd);

    Snapshot {
        ts,
        token: token.clone(),
        mint_authority: facts.mint_authority.clone(),
        freeze_authority: facts.freeze_authority.clone(),
        supply_raw: facts.supply_raw.map(|s| s.to_string()),
        decimals: facts.decimals,
        top10_pct: facts_top10_pct(facts),
        liquidity_usd: facts.market.liquidity_usd,
        volume_24h_usd: facts.market.volume_24h_usd,
        risk_score: assessment.score,
        risk: assessment.risk,
        flags: assessment.flags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radar::types::{Authority, MarketData};
    use crate::types::Chain;

    fn facts(
        mint: Authority,
        freeze: Authority,
        top10: Option<(Vec<u128>, u128)>,
        liquidity: Option<f64>,
    ) -> TokenFacts {
        let (top_holder_amounts, supply_raw) = match top10 {
            Some((amounts, supply)) => (amounts, Some(supply)),
            None => (Vec::new(), None),
        };
        TokenFacts {
            mint_authority: mint,
            freeze_authority: freeze,
            supply_raw,
            decimals: Some(6),
            top_holder_amounts,
            market: MarketData {
                liquidity_usd: liquidity,
                volume_24h_usd: None,
            },
        }
    }

    #[test]
    fn test_top10_pct_truncates_to_two_decimals() {
        assert_eq!(top10_pct(&[1, 1], 3), Some(66.66));
        assert_eq!(top10_pct(&[50], 100), Some(50.0));
        assert_eq!(top10_pct(&[100], 100), Some(100.0));
    }

    #[test]
    fn test_top10_pct_zero_supply_is_indeterminate() {
        assert_eq!(top10_pct(&[10, 20], 0), None);
        assert_eq!(top10_pct(&[], 0), None);
    }

    #[test]
    fn test_top10_pct_ignores_holders_beyond_ten() {
        let amounts = vec![1u128; 20];
        assert_eq!(top10_pct(&amounts, 100), Some(10.0));
    }

    #[test]
    fn test_top10_pct_exact_beyond_float_precision() {
        // 2^60 supply: f64 cannot represent supply - 1 exactly
        let supply: u128 = 1 << 60;
        let held = supply - 1;
        assert_eq!(top10_pct(&[held], supply), Some(99.99));

        let supply = u64::MAX as u128 * 10;
        let amounts = vec![u64::MAX as u128; 10];
        assert_eq!(top10_pct(&amounts, supply), Some(100.0));
    }

    #[test]
    fn test_score_example_from_thin_concentrated_token() {
        let f = facts(
            Authority::NotSet,
            Authority::NotSet,
            Some((vec![70], 100)),
            Some(1.0),
        );
        let assessment = score(&f, 5000.0);
        assert_eq!(assessment.score, 6);
        assert_eq!(assessment.risk, RiskLabel::Med);
        assert_eq!(
            assessment.flags,
            vec![
                "Mint authority not set (fixed supply).",
                "Freeze authority not set.",
                "Top 10 holders >= 60% (very concentrated).",
                "Liquidity < $5000 (thin).",
            ]
        );
    }

    #[test]
    fn test_score_all_unknown() {
        let assessment = score(&TokenFacts::default(), 0.0);
        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.risk, RiskLabel::Low);
        assert_eq!(assessment.flags.len(), 3);
        assert_eq!(
            assessment.flags,
            vec![FLAG_MINT_NOT_SET, FLAG_FREEZE_NOT_SET, FLAG_LIQUIDITY_UNKNOWN]
        );
    }

    #[test]
    fn test_score_all_risky() {
        let f = facts(
            Authority::Set("MintAuth1".into()),
            Authority::Set("FreezeAuth1".into()),
            Some((vec![90], 100)),
            Some(10.0),
        );
        let assessment = score(&f, 1000.0);
        assert_eq!(assessment.score, 14);
        assert_eq!(assessment.risk, RiskLabel::High);
        assert_eq!(
            assessment.flags,
            vec![
                "Mint authority is set (supply can change).",
                "Freeze authority is set (accounts can be frozen).",
                "Top 10 holders >= 60% (very concentrated).",
                "Liquidity < $1000 (thin).",
            ]
        );
    }

    #[test]
    fn test_middle_band_flags() {
        let f = facts(Authority::NotSet, Authority::NotSet, Some((vec![45], 100)), Some(20.0));
        let assessment = score(&f, 10.0);
        assert_eq!(
            assessment.flags,
            vec![
                "Mint authority not set (fixed supply).",
                "Freeze authority not set.",
                "Top 10 holders >= 40% (concentrated).",
                "Liquidity passes minimum threshold.",
            ]
        );
    }

    #[test]
    fn test_concentration_bands() {
        let band = |held: u128| {
            score(
                &facts(Authority::NotSet, Authority::NotSet, Some((vec![held], 100)), None),
                0.0,
            )
        };
        assert_eq!(band(39).score, 0);
        assert_eq!(band(39).flags[2], FLAG_MODERATE);
        assert_eq!(band(40).score, 2);
        assert_eq!(band(59).score, 2);
        assert_eq!(band(60).score, 4);
    }

    #[test]
    fn test_liquidity_at_threshold_is_sufficient() {
        let f = facts(Authority::NotSet, Authority::NotSet, None, Some(5000.0));
        let assessment = score(&f, 5000.0);
        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.flags[2], FLAG_LIQUIDITY_OK);
    }

    #[test]
    fn test_score_is_deterministic() {
        let f = facts(
            Authority::Set("M".into()),
            Authority::Unknown,
            Some((vec![45, 3], 100)),
            Some(250.0),
        );
        assert_eq!(score(&f, 500.0), score(&f, 500.0));
    }

    #[test]
    fn test_adding_authority_never_lowers_score() {
        let base = facts(Authority::NotSet, Authority::NotSet, Some((vec![50], 100)), Some(1.0));
        let mut with_mint = base.clone();
        with_mint.mint_authority = Authority::Set("M".into());
        let mut with_freeze = base.clone();
        with_freeze.freeze_authority = Authority::Set("F".into());

        let s = score(&base, 10.0).score;
        assert!(score(&with_mint, 10.0).score >= s);
        assert!(score(&with_freeze, 10.0).score >= s);
    }

    #[test]
    fn test_build_snapshot_carries_facts() {
        let token = Token::new("BONK", Chain::Solana, "Bonk111");
        let f = facts(
            Authority::Set("MintAuth".into()),
            Authority::NotSet,
            Some((vec![25, 20], 100)),
            None,
        );
        let ts = Utc::now();
        let snapshot = build_snapshot(&token, &f, &AlertRules::default(), ts);

        assert_eq!(snapshot.ts, ts);
        assert_eq!(snapshot.supply_raw.as_deref(), Some("100"));
        assert_eq!(snapshot.top10_pct, Some(45.0));
        assert_eq!(snapshot.risk_score, 7);
        assert_eq!(snapshot.risk, RiskLabel::Med);
        assert_eq!(snapshot.flags.len(), 4);
    }
}
