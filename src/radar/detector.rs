//! Change detector - compares a fresh snapshot with the previous one.
//!
//! Detection is pure and total: missing history or missing market data only
//! suppresses the rules that need them.

use crate::config::AlertRules;
use crate::radar::types::{RiskLabel, Snapshot};

pub const HIGH_RISK_REASON: &str = "Risk is HIGH";

/// Reasons to alert on `current`, in rule order. Empty means no alert.
pub fn detect(previous: Option<&Snapshot>, current: &Snapshot, rules: &AlertRules) -> Vec<String> {
    let mut reasons = Vec::new();

    if let Some(previous) = previous {
        if let Some(delta) = concentration_jump(previous, current) {
            if delta >= rules.top10_jump_pct {
                reasons.push(format!("Top10 concentration jumped +{:.2}%", delta));
            }
        }

        if let Some(drop_pct) = liquidity_drop_pct(previous, current) {
            if drop_pct >= rules.liquidity_drop_pct {
                reasons.push(format!("Liquidity dropped ~{:.1}%", drop_pct));
            }
        }
    }

    if current.risk == RiskLabel::High {
        reasons.push(HIGH_RISK_REASON.to_string());
    }

    reasons
}

/// Signed percentage-point change of top-10 concentration.
///
/// Both sides carry two decimals, so the difference is taken in whole
/// hundredths and is exact.
fn concentration_jump(previous: &Snapshot, current: &Snapshot) -> Option<f64> {
    let before = hundredths(previous.top10_pct?)?;
    let after = hundredths(current.top10_pct?)?;
    Some((after - before) as f64 / 100.0)
}

fn hundredths(pct: f64) -> Option<i64> {
    pct.is_finite().then(|| (pct * 100.0).round() as i64)
}

/// Percentage drop of liquidity; `None` when either side is unknown or the
/// previous liquidity is zero.
fn liquidity_drop_pct(previous: &Snapshot, current: &Snapshot) -> Option<f64> {
    let before = previous.liquidity_usd.filter(|v| v.is_finite() && *v != 0.0)?;
    let after = current.liquidity_usd.filter(|v| v.is_finite())?;
    Some((before - after) / before * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::radar::types::Authority;
    use crate::types::{Chain, Token};
    use chrono::Utc;

    fn snapshot(top10: Option<f64>, liquidity: Option<f64>, risk: RiskLabel) -> Snapshot {
        Snapshot {
            ts: Utc::now(),
            token: Token::new("JUP", Chain::Solana, "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN"),
            mint_authority: Authority::NotSet,
            freeze_authority: Authority::NotSet,
            supply_raw: Some("1000".into()),
            decimals: Some(6),
            top10_pct: top10,
            liquidity_usd: liquidity,
            volume_24h_usd: None,
            risk_score: 0,
            risk,
            flags: Vec::new(),
        }
    }

    fn rules() -> AlertRules {
        AlertRules {
            min_liquidity_usd: 5000.0,
            top10_jump_pct: 10.0,
            liquidity_drop_pct: 30.0,
        }
    }

    #[test]
    fn test_concentration_jump_and_liquidity_drop() {
        let prev = snapshot(Some(30.0), Some(10_000.0), RiskLabel::Low);
        let cur = snapshot(Some(45.0), Some(6_000.0), RiskLabel::Med);

        let reasons = detect(Some(&prev), &cur, &rules());
        assert_eq!(
            reasons,
            vec![
                "Top10 concentration jumped +15.00%".to_string(),
                "Liquidity dropped ~40.0%".to_string(),
            ]
        );
    }

    #[test]
    fn test_first_sighting_only_reports_high_risk() {
        let cur = snapshot(Some(99.0), Some(0.0), RiskLabel::High);
        assert_eq!(detect(None, &cur, &rules()), vec![HIGH_RISK_REASON.to_string()]);

        let cur = snapshot(Some(99.0), Some(0.0), RiskLabel::Med);
        assert!(detect(None, &cur, &rules()).is_empty());
    }

    #[test]
    fn test_high_risk_repeats_every_cycle() {
        let prev = snapshot(Some(50.0), Some(100.0), RiskLabel::High);
        let cur = snapshot(Some(50.0), Some(100.0), RiskLabel::High);
        assert_eq!(detect(Some(&prev), &cur, &rules()), vec![HIGH_RISK_REASON.to_string()]);
    }

    #[test]
    fn test_decrease_never_fires() {
        let prev = snapshot(Some(80.0), Some(1_000.0), RiskLabel::Low);
        let cur = snapshot(Some(20.0), Some(50_000.0), RiskLabel::Low);
        assert!(detect(Some(&prev), &cur, &rules()).is_empty());
    }

    #[test]
    fn test_thresholds_are_inclusive() {
        let prev = snapshot(Some(30.0), Some(1_000.0), RiskLabel::Low);
        let cur = snapshot(Some(40.0), Some(700.0), RiskLabel::Low);
        let reasons = detect(Some(&prev), &cur, &rules());
        assert_eq!(reasons.len(), 2);
        assert_eq!(reasons[0], "Top10 concentration jumped +10.00%");
        assert_eq!(reasons[1], "Liquidity dropped ~30.0%");
    }

    #[test]
    fn test_exact_threshold_jump_fires() {
        let prev = snapshot(Some(6.08), None, RiskLabel::Low);
        let cur = snapshot(Some(16.08), None, RiskLabel::Low);
        assert_eq!(
            detect(Some(&prev), &cur, &AlertRules::default()),
            vec!["Top10 concentration jumped +10.00%".to_string()]
        );

        // every two-decimal starting point, as produced from basis points
        for before in 0..9000u32 {
            let prev = snapshot(Some(f64::from(before) / 100.0), None, RiskLabel::Low);
            let cur = snapshot(Some(f64::from(before + 1000) / 100.0), None, RiskLabel::Low);
            assert_eq!(detect(Some(&prev), &cur, &rules()).len(), 1, "from {}", before);
        }
    }

    #[test]
    fn test_jump_just_below_threshold_is_quiet() {
        let prev = snapshot(Some(6.09), None, RiskLabel::Low);
        let cur = snapshot(Some(16.08), None, RiskLabel::Low);
        assert!(detect(Some(&prev), &cur, &rules()).is_empty());
    }

    #[test]
    fn test_zero_previous_liquidity_never_fires() {
        let prev = snapshot(None, Some(0.0), RiskLabel::Low);
        for current in [0.0, 10.0, 1_000_000.0] {
            let cur = snapshot(None, Some(current), RiskLabel::Low);
            assert!(detect(Some(&prev), &cur, &rules()).is_empty());
        }
    }

    #[test]
    fn test_unknown_values_suppress_rules() {
        let prev = snapshot(None, None, RiskLabel::Low);
        let cur = snapshot(Some(90.0), Some(1.0), RiskLabel::Low);
        assert!(detect(Some(&prev), &cur, &rules()).is_empty());

        let prev = snapshot(Some(10.0), Some(10_000.0), RiskLabel::Low);
        let cur = snapshot(None, None, RiskLabel::Low);
        assert!(detect(Some(&prev), &cur, &rules()).is_empty());
    }

    #[test]
    fn test_total_liquidity_loss() {
        let prev = snapshot(None, Some(2_500.0), RiskLabel::Low);
        let cur = snapshot(None, Some(0.0), RiskLabel::Low);
        assert_eq!(detect(Some(&prev), &cur, &rules()), vec!["Liquidity dropped ~100.0%".to_string()]);
    }
}
