//! Quote Aggregator
//!
//! Fans out one quote call per (venue, pair) combination, all concurrent,
//! each under its own timeout. A venue that reverts or times out on a pair
//! is excluded for that pair only — it never aborts the scan and it never
//! stalls the other venues. The cycle waits for every call to settle
//! (success or timeout) before ranking.
//!
//! Author: AI-Generated
//! Created: 2026-08-04

use crate::chain::ChainReader;
use crate::config::{EngineConfig, VenueConfig};
use crate::types::{AssetPair, VenueQuote};
use alloy::primitives::U256;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// All successful quotes for one pair in one cycle. May be empty or a
/// singleton, in which case no opportunity can form for that pair.
#[derive(Debug, Clone)]
pub struct PairQuotes {
    pub pair: AssetPair,
    pub quotes: Vec<VenueQuote>,
}

pub struct QuoteAggregator {
    chain: Arc<dyn ChainReader>,
    venues: Vec<VenueConfig>,
    pairs: Vec<AssetPair>,
    sample_amount_in: U256,
    call_timeout: Duration,
}

impl QuoteAggregator {
    pub fn new(chain: Arc<dyn ChainReader>, config: &EngineConfig) -> Self {
        Self {
            chain,
            venues: config.venues.clone(),
            pairs: config.pairs.clone(),
            sample_amount_in: config.sample_amount_in,
            call_timeout: Duration::from_millis(config.quote_timeout_ms),
        }
    }

    /// Query every venue for every pair. Quotes within a pair keep the
    /// configured venue order (ranking tie-breaks depend on it).
    pub async fn collect(&self) -> Vec<PairQuotes> {
        let mut futs = Vec::with_capacity(self.pairs.len() * self.venues.len());

        for (pair_idx, pair) in self.pairs.iter().enumerate() {
            for venue in &self.venues {
                let chain = Arc::clone(&self.chain);
                let pair = pair.clone();
                let venue = venue.clone();
                let amount_in = self.sample_amount_in;
                let call_timeout = self.call_timeout;

                futs.push(async move {
                    let outcome = tokio::time::timeout(
                        call_timeout,
                        chain.amount_out(
                            venue.router,
                            pair.base_address,
                            pair.quote_address,
                            amount_in,
                        ),
                    )
                    .await;

                    let quote = match outcome {
                        Ok(Ok(amount_out)) => Some(VenueQuote {
                            venue_name: venue.name.clone(),
                            venue_address: venue.router,
                            pair: pair.clone(),
                            sample_amount_in: amount_in,
                            amount_out,
                            observed_at: Utc::now(),
                        }),
                        Ok(Err(e)) => {
                            debug!("venue {} failed to quote {}: {}", venue.name, pair, e);
                            None
                        }
                        Err(_) => {
                            debug!(
                                "venue {} timed out quoting {} after {:?}",
                                venue.name, pair, call_timeout
                            );
                            None
                        }
                    };

                    (pair_idx, quote)
                });
            }
        }

        // join_all settles every call and preserves submission order, so
        // quotes land grouped per pair in venue order.
        let mut grouped: Vec<PairQuotes> = self
            .pairs
            .iter()
            .map(|pair| PairQuotes {
                pair: pair.clone(),
                quotes: Vec::new(),
            })
            .collect();

        for (pair_idx, quote) in join_all(futs).await {
            if let Some(quote) = quote {
                grouped[pair_idx].quotes.push(quote);
            }
        }

        grouped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{MockChainReader, VenueBehavior};
    use alloy::primitives::Address;

    fn test_pair() -> AssetPair {
        AssetPair::new(
            "WETH".into(),
            "USDC".into(),
            Address::repeat_byte(0xaa),
            Address::repeat_byte(0xbb),
        )
    }

    fn test_config(venues: Vec<VenueConfig>) -> EngineConfig {
        EngineConfig {
            rpc_url: String::new(),
            venues,
            pairs: vec![test_pair()],
            sample_amount_in: crate::config::unit_sample_amount(),
            profit_threshold_percent: 0.5,
            guardrails: crate::types::GuardrailConfig {
                max_gas_limit: 2_000_000,
                max_slippage_percent: 2.0,
                kill_switch_engaged: false,
            },
            enable_live_execution: false,
            deployed_contract: None,
            signer: None,
            scan_interval_secs: 30,
            quote_timeout_ms: 1_000,
            confirmation_timeout_secs: 120,
            data_dir: std::env::temp_dir(),
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            verifier_url: None,
            verify_poll_interval_secs: 60,
        }
    }

    fn venue(name: &str, byte: u8) -> VenueConfig {
        VenueConfig {
            name: name.into(),
            router: Address::repeat_byte(byte),
        }
    }

    #[tokio::test]
    async fn test_single_venue_failure_excludes_venue_only() {
        let chain = Arc::new(MockChainReader::with_quotes(vec![
            (Address::repeat_byte(0x01), VenueBehavior::Quote(U256::from(100u64))),
            (Address::repeat_byte(0x02), VenueBehavior::Revert),
            (Address::repeat_byte(0x03), VenueBehavior::Quote(U256::from(105u64))),
        ]));
        let config = test_config(vec![venue("A", 0x01), venue("B", 0x02), venue("C", 0x03)]);

        let aggregator = QuoteAggregator::new(chain, &config);
        let grouped = aggregator.collect().await;

        assert_eq!(grouped.len(), 1);
        let names: Vec<&str> = grouped[0].quotes.iter().map(|q| q.venue_name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_venue_times_out_without_stalling_others() {
        let chain = Arc::new(MockChainReader::with_quotes(vec![
            (Address::repeat_byte(0x01), VenueBehavior::Quote(U256::from(100u64))),
            (Address::repeat_byte(0x02), VenueBehavior::Hang),
        ]));
        let config = test_config(vec![venue("Fast", 0x01), venue("Dead", 0x02)]);

        let aggregator = QuoteAggregator::new(chain, &config);
        let grouped = aggregator.collect().await;

        assert_eq!(grouped[0].quotes.len(), 1);
        assert_eq!(grouped[0].quotes[0].venue_name, "Fast");
    }

    #[tokio::test]
    async fn test_all_venues_failing_yields_empty_pair() {
        let chain = Arc::new(MockChainReader::with_quotes(vec![
            (Address::repeat_byte(0x01), VenueBehavior::Revert),
            (Address::repeat_byte(0x02), VenueBehavior::Revert),
        ]));
        let config = test_config(vec![venue("A", 0x01), venue("B", 0x02)]);

        let aggregator = QuoteAggregator::new(chain, &config);
        let grouped = aggregator.collect().await;

        assert_eq!(grouped.len(), 1);
        assert!(grouped[0].quotes.is_empty());
    }
}
