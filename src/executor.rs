//! Trade Executor
//!
//! Builds the `executeArbitrage` calldata for the deployed contract, fills
//! nonce / chain id / EIP-1559 fees / gas limit, signs through the
//! configured adapter, submits the raw transaction, and blocks (bounded)
//! for one confirmation. Realized profit is extracted from the
//! `ArbitrageExecuted` event when present.
//!
//! Exactly one attempt per cycle reaches this stage; the executor never
//! retries — a retry is a new scan cycle producing a new candidate.
//!
//! Author: AI-Generated
//! Created: 2026-08-04
//! Modified: 2026-08-06 - gas limit buffer clamped to configured ceiling

use crate::chain::{ChainReader, ExecutionReceipt};
use crate::contracts::IArbExecutor;
use crate::signer::SignerAdapter;
use crate::types::OpportunityCandidate;
use alloy::network::TransactionBuilder;
use alloy::primitives::{Address, Bytes, TxHash, I256};
use alloy::rpc::types::{Log, TransactionRequest};
use alloy::sol_types::{SolCall, SolValue};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Successful, confirmed execution of one candidate.
#[derive(Debug, Clone)]
pub struct ConfirmedExecution {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    /// Realized profit in whole tokens (18 decimals) parsed from the
    /// ArbitrageExecuted event; None when the event was absent.
    pub realized_profit: Option<f64>,
}

/// Why an attempt that reached the executor did not confirm.
#[derive(Debug)]
pub enum ExecutionFailure {
    /// Signing failed (local key or remote endpoint).
    Signing { reason: String },
    /// The node rejected the submission; nothing reached the mempool.
    /// Raw node reason kept verbatim.
    Rejected { reason: String },
    /// Submitted, but no confirmation within the bounded wait. The
    /// transaction may still land later.
    ConfirmationTimeout { tx_hash: TxHash },
    /// Confirmed but reverted on chain.
    Reverted { tx_hash: TxHash },
}

/// Build the execution transaction for a candidate. Same builder feeds the
/// simulation call and the live submission — identical arguments by
/// construction. `encodedParams` packs (targetToken, venueA, venueB, amount).
pub fn build_execution_tx(
    candidate: &OpportunityCandidate,
    contract: Address,
    from: Address,
) -> TransactionRequest {
    let amount = candidate.buy.sample_amount_in;
    let venue_a = candidate.buy.venue_address;
    let venue_b = candidate.sell.venue_address;

    let params = (candidate.pair.quote_address, venue_a, venue_b, amount).abi_encode_params();

    let call = IArbExecutor::executeArbitrageCall {
        asset: candidate.pair.base_address,
        amount,
        venueA: venue_a,
        venueB: venue_b,
        params: params.into(),
    };

    TransactionRequest::default()
        .with_from(from)
        .with_to(contract)
        .with_input(Bytes::from(call.abi_encode()))
}

/// Submitted gas limit: node estimate plus 30% headroom for state movement
/// between estimation and inclusion, never above the configured ceiling the
/// guardrail already enforced on the raw estimate.
pub fn buffered_gas_limit(estimate: u64, max_gas_limit: u64) -> u64 {
    (estimate.saturating_mul(130) / 100).min(max_gas_limit)
}

pub struct TradeExecutor {
    chain: Arc<dyn ChainReader>,
    signer: Arc<dyn SignerAdapter>,
    max_gas_limit: u64,
    confirmation_timeout: Duration,
}

impl TradeExecutor {
    pub fn new(
        chain: Arc<dyn ChainReader>,
        signer: Arc<dyn SignerAdapter>,
        max_gas_limit: u64,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            chain,
            signer,
            max_gas_limit,
            confirmation_timeout,
        }
    }

    /// Fill, sign, submit and confirm. `gas_estimate` is the raw node
    /// estimate the guardrails already approved.
    pub async fn submit_and_confirm(
        &self,
        tx: TransactionRequest,
        gas_estimate: u64,
    ) -> Result<ConfirmedExecution, ExecutionFailure> {
        let from = self.signer.address();

        let (chain_id, nonce, fees) = tokio::try_join!(
            self.chain.chain_id(),
            self.chain.nonce(from),
            self.chain.fee_estimate(),
        )
        .map_err(|e| ExecutionFailure::Rejected {
            reason: format!("pre-submission chain read failed: {e}"),
        })?;

        let tx = tx
            .with_chain_id(chain_id)
            .with_nonce(nonce)
            .with_gas_limit(buffered_gas_limit(gas_estimate, self.max_gas_limit))
            .with_max_fee_per_gas(fees.max_fee_per_gas)
            .with_max_priority_fee_per_gas(fees.max_priority_fee_per_gas);

        let raw = self
            .signer
            .sign_transaction(tx)
            .await
            .map_err(|e| ExecutionFailure::Signing {
                reason: e.to_string(),
            })?;

        let tx_hash = self
            .chain
            .send_raw_transaction(&raw)
            .await
            .map_err(|e| ExecutionFailure::Rejected {
                reason: e.to_string(),
            })?;

        info!("📝 transaction submitted: {}", tx_hash);

        let receipt = match self
            .chain
            .wait_for_receipt(tx_hash, self.confirmation_timeout)
            .await
        {
            Ok(receipt) => receipt,
            Err(e) => {
                // Transport hiccups during the wait are indistinguishable
                // from a pending transaction; the tx may still land.
                warn!("confirmation wait for {} ended without receipt: {}", tx_hash, e);
                return Err(ExecutionFailure::ConfirmationTimeout { tx_hash });
            }
        };

        if !receipt.succeeded {
            return Err(ExecutionFailure::Reverted { tx_hash });
        }

        let realized_profit = extract_realized_profit(&receipt.logs);
        log_confirmation(&receipt, realized_profit);

        Ok(ConfirmedExecution {
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            realized_profit,
        })
    }
}

fn log_confirmation(receipt: &ExecutionReceipt, realized_profit: Option<f64>) {
    match realized_profit {
        Some(profit) => info!(
            "✅ confirmed in block {} | gas used {} | 💎 realized profit {:.6}",
            receipt.block_number, receipt.gas_used, profit
        ),
        None => info!(
            "✅ confirmed in block {} | gas used {} | no ArbitrageExecuted event, profit unknown",
            receipt.block_number, receipt.gas_used
        ),
    }
}

/// Scan receipt logs for the ArbitrageExecuted event and convert its
/// int256 profit to whole tokens (18 decimals).
pub fn extract_realized_profit(logs: &[Log]) -> Option<f64> {
    logs.iter().find_map(|log| {
        log.log_decode::<IArbExecutor::ArbitrageExecuted>()
            .ok()
            .map(|decoded| signed_to_tokens(decoded.inner.data.profit))
    })
}

fn signed_to_tokens(raw: I256) -> f64 {
    raw.to_string().parse::<f64>().map(|v| v / 1e18).unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AssetPair, VenueQuote};
    use alloy::primitives::{Address, U256};
    use alloy::sol_types::SolEvent;
    use chrono::Utc;

    fn test_candidate() -> OpportunityCandidate {
        let pair = AssetPair::new(
            "WETH".into(),
            "USDC".into(),
            Address::repeat_byte(0xaa),
            Address::repeat_byte(0xbb),
        );
        let quote = |venue: u8, out: u64| VenueQuote {
            venue_name: format!("V{venue}"),
            venue_address: Address::repeat_byte(venue),
            pair: pair.clone(),
            sample_amount_in: U256::from(10).pow(U256::from(18)),
            amount_out: U256::from(out),
            observed_at: Utc::now(),
        };
        let q1 = quote(1, 100);
        let q2 = quote(2, 105);
        OpportunityCandidate::new(pair, q1, q2, 5.0)
    }

    #[test]
    fn test_build_execution_tx_targets_contract_with_selector() {
        let contract = Address::repeat_byte(0xcc);
        let from = Address::repeat_byte(0xdd);
        let tx = build_execution_tx(&test_candidate(), contract, from);

        let input = tx.input.input().expect("calldata set");
        assert_eq!(
            &input[..4],
            IArbExecutor::executeArbitrageCall::SELECTOR.as_slice()
        );

        // selector + 5 head words + bytes offset payload (4 words params + len word)
        assert!(input.len() > 4 + 5 * 32);
    }

    #[test]
    fn test_encoded_params_pack_target_and_venues() {
        let candidate = test_candidate();
        let params = (
            candidate.pair.quote_address,
            candidate.buy.venue_address,
            candidate.sell.venue_address,
            candidate.buy.sample_amount_in,
        )
            .abi_encode_params();

        // 4 static words
        assert_eq!(params.len(), 128);
        // Word 0 is the target (quote) token, right-aligned
        assert_eq!(&params[12..32], candidate.pair.quote_address.as_slice());
        // Word 1 and 2 are the venues
        assert_eq!(&params[44..64], candidate.buy.venue_address.as_slice());
        assert_eq!(&params[76..96], candidate.sell.venue_address.as_slice());
    }

    #[test]
    fn test_buffered_gas_limit() {
        assert_eq!(buffered_gas_limit(1_000_000, 2_000_000), 1_300_000);
        // Buffer clamped at the ceiling
        assert_eq!(buffered_gas_limit(1_800_000, 2_000_000), 2_000_000);
    }

    #[test]
    fn test_extract_realized_profit_from_event() {
        let event = IArbExecutor::ArbitrageExecuted {
            asset: Address::repeat_byte(0xaa),
            amount: U256::from(10).pow(U256::from(18)),
            profit: I256::try_from(50_000_000_000_000_000u128).unwrap(), // 0.05
            venueA: Address::repeat_byte(0x01),
            venueB: Address::repeat_byte(0x02),
        };

        let log = Log {
            inner: alloy::primitives::Log {
                address: Address::repeat_byte(0xcc),
                data: event.encode_log_data(),
            },
            ..Default::default()
        };

        let profit = extract_realized_profit(&[log]).unwrap();
        assert!((profit - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_extract_realized_profit_ignores_foreign_logs() {
        let log = Log::default();
        assert!(extract_realized_profit(&[log]).is_none());
        assert!(extract_realized_profit(&[]).is_none());
    }
}
