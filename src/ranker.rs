//! Opportunity Ranker
//!
//! Pure conversion of a cycle's quotes into ranked spread candidates: for
//! each pair with at least two quotes, buy at the venue with minimum
//! amountOut, sell at the venue with maximum amountOut, ties broken by
//! first-seen order. A candidate exists only when the profit percentage
//! strictly exceeds the configured threshold.
//!
//! No I/O and no clock reads here — ranking an unchanged quote set is
//! byte-identical across runs.
//!
//! Author: AI-Generated
//! Created: 2026-08-04

use crate::quoter::PairQuotes;
use crate::types::OpportunityCandidate;
use alloy::primitives::U256;
use std::cmp::Ordering;
use tracing::{debug, info};

/// Rank all pairs' quotes into candidates, best profit first. Only the
/// first entry is eligible for the execution path; the rest are persisted
/// as observational records.
pub fn rank(quotes: &[PairQuotes], threshold_percent: f64) -> Vec<OpportunityCandidate> {
    let mut candidates: Vec<OpportunityCandidate> = quotes
        .iter()
        .filter_map(|pair_quotes| best_spread(pair_quotes, threshold_percent))
        .collect();

    // Stable sort: equal profits keep pair input order
    candidates.sort_by(|a, b| {
        b.profit_percent
            .partial_cmp(&a.profit_percent)
            .unwrap_or(Ordering::Equal)
    });

    for candidate in &candidates {
        info!(
            "🎯 OPPORTUNITY: {} | Buy {} | Sell {} | Profit {:.4}%",
            candidate.pair,
            candidate.buy.venue_name,
            candidate.sell.venue_name,
            candidate.profit_percent
        );
    }

    candidates
}

fn best_spread(pair_quotes: &PairQuotes, threshold_percent: f64) -> Option<OpportunityCandidate> {
    if pair_quotes.quotes.len() < 2 {
        debug!(
            "{}: {} quote(s), no spread possible",
            pair_quotes.pair,
            pair_quotes.quotes.len()
        );
        return None;
    }

    // Strict comparisons keep the first-seen venue on ties
    let mut buy = &pair_quotes.quotes[0];
    let mut sell = &pair_quotes.quotes[0];
    for quote in &pair_quotes.quotes[1..] {
        if quote.amount_out < buy.amount_out {
            buy = quote;
        }
        if quote.amount_out > sell.amount_out {
            sell = quote;
        }
    }

    // Zero output on the buy side: undefined profit ratio, skip the pair
    if buy.amount_out.is_zero() {
        debug!("{}: buy-side amountOut is zero, skipping", pair_quotes.pair);
        return None;
    }

    if buy.venue_address == sell.venue_address {
        return None;
    }

    let profit = profit_percent(buy.amount_out, sell.amount_out)?;
    if profit <= threshold_percent {
        debug!(
            "{}: profit {:.4}% <= threshold {:.4}%, no candidate",
            pair_quotes.pair, profit, threshold_percent
        );
        return None;
    }

    Some(OpportunityCandidate::new(
        pair_quotes.pair.clone(),
        buy.clone(),
        sell.clone(),
        profit,
    ))
}

/// `(sell_out / buy_out - 1) * 100`. None when the buy side is zero.
pub fn profit_percent(buy_out: U256, sell_out: U256) -> Option<f64> {
    if buy_out.is_zero() {
        return None;
    }
    Some((amount_to_f64(sell_out) / amount_to_f64(buy_out) - 1.0) * 100.0)
}

fn amount_to_f64(amount: U256) -> f64 {
    // Decimal string round-trip: exact for amounts within f64 mantissa
    // range, saturating (never panicking) beyond it.
    amount.to_string().parse().unwrap_or(f64::INFINITY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetPair, VenueQuote};
    use alloy::primitives::Address;
    use chrono::{TimeZone, Utc};

    fn test_pair(symbol: &str) -> AssetPair {
        let (base, quote) = symbol.split_once('/').unwrap();
        AssetPair::new(
            base.into(),
            quote.into(),
            Address::repeat_byte(0xaa),
            Address::repeat_byte(0xbb),
        )
    }

    fn quote(pair: &AssetPair, venue: &str, venue_byte: u8, amount_out: u64) -> VenueQuote {
        VenueQuote {
            venue_name: venue.into(),
            venue_address: Address::repeat_byte(venue_byte),
            pair: pair.clone(),
            sample_amount_in: U256::from(10).pow(U256::from(18)),
            amount_out: U256::from(amount_out),
            // Fixed timestamp: ranking must not depend on wall clock
            observed_at: Utc.with_ymd_and_hms(2026, 8, 4, 12, 0, 0).unwrap(),
        }
    }

    fn pair_quotes(symbol: &str, quotes: Vec<(&str, u8, u64)>) -> PairQuotes {
        let pair = test_pair(symbol);
        PairQuotes {
            quotes: quotes
                .into_iter()
                .map(|(name, byte, out)| quote(&pair, name, byte, out))
                .collect(),
            pair,
        }
    }

    #[test]
    fn test_reference_scenario_five_percent_spread() {
        // V1 quotes 100, V2 quotes 105, threshold 0.5% -> one candidate,
        // buy V1, sell V2, profit exactly 5.0%
        let quotes = vec![pair_quotes("A/B", vec![("V1", 1, 100), ("V2", 2, 105)])];
        let candidates = rank(&quotes, 0.5);

        assert_eq!(candidates.len(), 1);
        let c = &candidates[0];
        assert_eq!(c.buy.venue_name, "V1");
        assert_eq!(c.sell.venue_name, "V2");
        assert!((c.profit_percent - 5.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_above_spread_yields_nothing() {
        let quotes = vec![pair_quotes("A/B", vec![("V1", 1, 100), ("V2", 2, 105)])];
        assert!(rank(&quotes, 6.0).is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        // 125/100 is exactly 25% in f64; exactly at threshold must NOT
        // produce a candidate
        let quotes = vec![pair_quotes("A/B", vec![("V1", 1, 100), ("V2", 2, 125)])];
        assert!(rank(&quotes, 25.0).is_empty());
        assert_eq!(rank(&quotes, 24.9).len(), 1);
    }

    #[test]
    fn test_min_max_selection_across_three_venues() {
        let quotes = vec![pair_quotes(
            "A/B",
            vec![("V1", 1, 102), ("V2", 2, 98), ("V3", 3, 107)],
        )];
        let candidates = rank(&quotes, 0.5);

        assert_eq!(candidates[0].buy.venue_name, "V2");
        assert_eq!(candidates[0].sell.venue_name, "V3");
    }

    #[test]
    fn test_ties_break_first_seen() {
        // V1 and V2 both quote the minimum; V3 and V4 both the maximum.
        // First-seen wins on both sides.
        let quotes = vec![pair_quotes(
            "A/B",
            vec![("V1", 1, 100), ("V2", 2, 100), ("V3", 3, 110), ("V4", 4, 110)],
        )];
        let candidates = rank(&quotes, 0.5);

        assert_eq!(candidates[0].buy.venue_name, "V1");
        assert_eq!(candidates[0].sell.venue_name, "V3");
    }

    #[test]
    fn test_zero_buy_side_skips_pair() {
        let quotes = vec![pair_quotes("A/B", vec![("V1", 1, 0), ("V2", 2, 105)])];
        assert!(rank(&quotes, 0.5).is_empty());
    }

    #[test]
    fn test_single_quote_pair_skipped() {
        let quotes = vec![pair_quotes("A/B", vec![("V1", 1, 100)])];
        assert!(rank(&quotes, 0.5).is_empty());
    }

    #[test]
    fn test_candidates_sorted_descending_by_profit() {
        let quotes = vec![
            pair_quotes("A/B", vec![("V1", 1, 100), ("V2", 2, 102)]),
            pair_quotes("C/D", vec![("V1", 1, 100), ("V2", 2, 110)]),
        ];
        let candidates = rank(&quotes, 0.5);

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].pair.symbol(), "C/D");
        assert!(candidates[0].profit_percent > candidates[1].profit_percent);
    }

    #[test]
    fn test_ranking_is_byte_identical_for_unchanged_quotes() {
        let quotes = vec![
            pair_quotes("A/B", vec![("V1", 1, 100), ("V2", 2, 105), ("V3", 3, 103)]),
            pair_quotes("C/D", vec![("V1", 1, 200), ("V2", 2, 207)]),
        ];

        let first = serde_json::to_string(&rank(&quotes, 0.5)).unwrap();
        let second = serde_json::to_string(&rank(&quotes, 0.5)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_profit_percent_formula() {
        // 125/100: exact in binary floating point
        assert_eq!(
            profit_percent(U256::from(100u64), U256::from(125u64)),
            Some(25.0)
        );
        let near = profit_percent(U256::from(100u64), U256::from(105u64)).unwrap();
        assert!((near - 5.0).abs() < 1e-12);
        assert_eq!(profit_percent(U256::ZERO, U256::from(105u64)), None);
    }
}
