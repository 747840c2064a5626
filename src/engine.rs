//! Scan/execute cycle orchestration
//!
//! One cycle: aggregate quotes → rank → persist candidates → [live only]
//! guardrails → simulate → sign → submit → confirm → persist outcome.
//!
//! The quote phase of overlapping cycles may run concurrently; the
//! simulate→sign→submit→confirm sequence is single-flight per engine
//! instance. A cycle that finds a new best candidate while an attempt is in
//! flight skips execution rather than double-submitting — the next cycle
//! re-detects against fresh state.
//!
//! Author: AI-Generated
//! Created: 2026-08-05
//! Modified: 2026-08-06 - pre-submission re-quote for the slippage guardrail

use crate::chain::{ChainError, ChainReader};
use crate::config::EngineConfig;
use crate::errors::{is_insufficient_funds, EngineError};
use crate::executor::{build_execution_tx, ConfirmedExecution, ExecutionFailure, TradeExecutor};
use crate::guardrails::{GuardrailEvaluator, GuardrailViolation};
use crate::persistence::PersistenceGateway;
use crate::quoter::QuoteAggregator;
use crate::ranker;
use crate::signer::SignerAdapter;
use crate::simulator::TradeSimulator;
use crate::types::{AttemptStatus, ExecutionAttempt, OpportunityCandidate, ScanReport};
use alloy::primitives::TxHash;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct Engine {
    config: EngineConfig,
    chain: Arc<dyn ChainReader>,
    signer: Option<Arc<dyn SignerAdapter>>,
    persistence: Arc<PersistenceGateway>,
    /// Permit for the simulate→sign→submit→confirm sequence. Held across
    /// the whole attempt; overlapping cycles skip instead of queueing.
    in_flight: Mutex<()>,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        chain: Arc<dyn ChainReader>,
        signer: Option<Arc<dyn SignerAdapter>>,
        persistence: Arc<PersistenceGateway>,
    ) -> Self {
        Self {
            config,
            chain,
            signer,
            persistence,
            in_flight: Mutex::new(()),
        }
    }

    pub fn persistence(&self) -> &Arc<PersistenceGateway> {
        &self.persistence
    }

    /// Run one full scan cycle. An empty market is a normal empty report;
    /// errors identify the stage that aborted the execution path.
    pub async fn run_cycle(&self) -> Result<ScanReport, EngineError> {
        let aggregator = QuoteAggregator::new(Arc::clone(&self.chain), &self.config);
        let quotes = aggregator.collect().await;

        let candidates = ranker::rank(&quotes, self.config.profit_threshold_percent);

        // Every candidate is persisted; only the best is execution-eligible
        for candidate in &candidates {
            self.persistence.record_candidate(candidate);
        }

        if candidates.is_empty() {
            info!("scan complete: no opportunity found");
            return Ok(ScanReport::empty());
        }

        if !self.config.enable_live_execution {
            return Ok(ScanReport {
                opportunities: candidates,
                executed: false,
                tx_hash: None,
                skipped: Some("live execution disabled".into()),
            });
        }

        let Ok(_permit) = self.in_flight.try_lock() else {
            warn!("execution attempt already in flight — skipping this cycle's candidate");
            return Ok(ScanReport {
                opportunities: candidates,
                executed: false,
                tx_hash: None,
                skipped: Some("execution attempt already in flight".into()),
            });
        };

        let best = candidates[0].clone();
        let confirmed = self.execute_candidate(&best).await?;

        Ok(ScanReport {
            opportunities: candidates,
            executed: true,
            tx_hash: Some(confirmed.tx_hash),
            skipped: None,
        })
    }

    /// Guardrails → simulation → signing → submission for the cycle's best
    /// candidate. Every terminal outcome is durably recorded before the
    /// error (if any) propagates to the caller.
    async fn execute_candidate(
        &self,
        candidate: &OpportunityCandidate,
    ) -> Result<ConfirmedExecution, EngineError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            EngineError::Configuration("live execution enabled but no signer configured".into())
        })?;
        let contract = self.config.deployed_contract.ok_or_else(|| {
            EngineError::Configuration("DEPLOYED_CONTRACT_ADDRESS required for live execution".into())
        })?;

        let guardrails = GuardrailEvaluator::new(self.config.guardrails.clone());

        if let Err(violation) = guardrails.check_kill_switch() {
            self.record_rejection(candidate, &violation, None);
            return Err(violation.into());
        }

        info!(
            "🚀 executing best candidate: {} | buy {} sell {} | expected {:.4}%",
            candidate.pair, candidate.buy.venue_name, candidate.sell.venue_name,
            candidate.profit_percent
        );

        let tx = build_execution_tx(candidate, contract, signer.address());

        // Gas guardrail needs the estimate for the built transaction. An
        // estimation revert means the node could not simulate the call.
        let gas_estimate = match self.chain.estimate_gas(&tx).await {
            Ok(estimate) => estimate,
            Err(e) => {
                let reason = format!("gas estimation reverted: {e}");
                self.record_attempt(candidate, AttemptStatus::SimulationFailed, false, None, None, None, Some(reason.clone()));
                return Err(EngineError::SimulationFailed(reason));
            }
        };
        info!("⛽ gas estimate: {}", gas_estimate);

        if let Err(violation) = guardrails.check_gas(gas_estimate) {
            self.record_rejection(candidate, &violation, Some(gas_estimate));
            return Err(violation.into());
        }

        // Venue state may have moved since detection; re-quote both legs
        // with the same sample amount immediately before submission.
        let fresh_profit = match self.requote(candidate).await {
            Ok(profit) => profit,
            Err(e) => {
                let reason = format!("pre-submission re-quote failed: {e}");
                self.record_attempt(candidate, AttemptStatus::Failed, false, Some(gas_estimate), None, None, Some(reason.clone()));
                return Err(EngineError::Rpc(reason));
            }
        };
        if let Err(violation) = guardrails.check_slippage(candidate.profit_percent, fresh_profit) {
            self.record_rejection(candidate, &violation, Some(gas_estimate));
            return Err(violation.into());
        }

        let simulator = TradeSimulator::new(Arc::clone(&self.chain));
        if let Err(e) = simulator.simulate(&tx).await {
            let reason = e.to_string();
            self.record_attempt(candidate, AttemptStatus::SimulationFailed, false, Some(gas_estimate), None, None, Some(reason));
            return Err(e);
        }

        let executor = TradeExecutor::new(
            Arc::clone(&self.chain),
            Arc::clone(signer),
            self.config.guardrails.max_gas_limit,
            Duration::from_secs(self.config.confirmation_timeout_secs),
        );

        match executor.submit_and_confirm(tx, gas_estimate).await {
            Ok(confirmed) => {
                self.record_attempt(
                    candidate,
                    AttemptStatus::Confirmed,
                    true,
                    Some(gas_estimate),
                    Some(confirmed.tx_hash),
                    confirmed.realized_profit,
                    None,
                );
                Ok(confirmed)
            }
            Err(failure) => {
                let (status, tx_hash, reason) = match &failure {
                    ExecutionFailure::Signing { reason } => (
                        AttemptStatus::Failed,
                        None,
                        format!("signing failed: {reason}"),
                    ),
                    ExecutionFailure::Rejected { reason } => {
                        (AttemptStatus::Failed, None, reason.clone())
                    }
                    ExecutionFailure::ConfirmationTimeout { tx_hash } => (
                        AttemptStatus::Submitted,
                        Some(*tx_hash),
                        "confirmation not observed within bounded wait".into(),
                    ),
                    ExecutionFailure::Reverted { tx_hash } => (
                        AttemptStatus::Failed,
                        Some(*tx_hash),
                        "transaction reverted on chain".into(),
                    ),
                };
                self.record_attempt(candidate, status, true, Some(gas_estimate), tx_hash, None, Some(reason.clone()));

                if is_insufficient_funds(&reason) {
                    Err(EngineError::InsufficientFunds(reason))
                } else {
                    Err(EngineError::Submission(reason))
                }
            }
        }
    }

    /// Fresh profit percentage for a candidate's two legs, same sample
    /// amount as detection (which is also the executed amount).
    async fn requote(&self, candidate: &OpportunityCandidate) -> Result<f64, ChainError> {
        let pair = &candidate.pair;
        let amount = self.config.sample_amount_in;

        let (buy_out, sell_out) = tokio::try_join!(
            self.chain.amount_out(
                candidate.buy.venue_address,
                pair.base_address,
                pair.quote_address,
                amount,
            ),
            self.chain.amount_out(
                candidate.sell.venue_address,
                pair.base_address,
                pair.quote_address,
                amount,
            ),
        )?;

        ranker::profit_percent(buy_out, sell_out)
            .ok_or_else(|| ChainError::Revert("buy venue returned zero output on re-quote".into()))
    }

    fn record_rejection(
        &self,
        candidate: &OpportunityCandidate,
        violation: &GuardrailViolation,
        gas_estimate: Option<u64>,
    ) {
        let status = match violation {
            GuardrailViolation::GasLimitExceeded { .. } => AttemptStatus::GasExceeded,
            GuardrailViolation::KillSwitchEngaged
            | GuardrailViolation::SlippageExceeded { .. } => AttemptStatus::Failed,
        };
        warn!("guardrail rejected {}: {}", candidate.pair, violation);
        self.record_attempt(
            candidate,
            status,
            false,
            gas_estimate,
            None,
            None,
            Some(violation.to_string()),
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn record_attempt(
        &self,
        candidate: &OpportunityCandidate,
        status: AttemptStatus,
        simulated: bool,
        gas_estimate: Option<u64>,
        tx_hash: Option<TxHash>,
        actual_profit: Option<f64>,
        reason: Option<String>,
    ) {
        self.persistence.record_attempt(&ExecutionAttempt {
            candidate_id: candidate.id.clone(),
            pair: candidate.pair.symbol(),
            status,
            simulated,
            gas_estimate,
            tx_hash,
            expected_profit_percent: candidate.profit_percent,
            actual_profit,
            reason,
            executed_at: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::testing::{MockChainReader, VenueBehavior};
    use crate::config::VenueConfig;
    use crate::types::{AssetPair, GuardrailConfig};
    use alloy::primitives::{Address, U256};
    use async_trait::async_trait;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Signer that records how often it was asked to sign.
    struct CountingSigner {
        sign_calls: AtomicUsize,
    }

    impl CountingSigner {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                sign_calls: AtomicUsize::new(0),
            })
        }

        fn signed(&self) -> usize {
            self.sign_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SignerAdapter for CountingSigner {
        fn address(&self) -> Address {
            Address::repeat_byte(0xdd)
        }

        async fn sign_transaction(
            &self,
            _tx: alloy::rpc::types::TransactionRequest,
        ) -> Result<Vec<u8>, EngineError> {
            self.sign_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![0x02, 0x01])
        }
    }

    const VENUE_LOW: u8 = 0x01;
    const VENUE_HIGH: u8 = 0x02;

    fn spread_chain() -> Arc<MockChainReader> {
        // 5% spread between the two venues
        Arc::new(MockChainReader::with_quotes(vec![
            (
                Address::repeat_byte(VENUE_LOW),
                VenueBehavior::Quote(U256::from(100_000_000u64)),
            ),
            (
                Address::repeat_byte(VENUE_HIGH),
                VenueBehavior::Quote(U256::from(105_000_000u64)),
            ),
        ]))
    }

    fn test_config(live: bool, kill_switch: bool, data_dir: &PathBuf) -> EngineConfig {
        EngineConfig {
            rpc_url: String::new(),
            venues: vec![
                VenueConfig {
                    name: "V1".into(),
                    router: Address::repeat_byte(VENUE_LOW),
                },
                VenueConfig {
                    name: "V2".into(),
                    router: Address::repeat_byte(VENUE_HIGH),
                },
            ],
            pairs: vec![AssetPair::new(
                "WETH".into(),
                "USDC".into(),
                Address::repeat_byte(0xaa),
                Address::repeat_byte(0xbb),
            )],
            sample_amount_in: crate::config::unit_sample_amount(),
            profit_threshold_percent: 0.5,
            guardrails: GuardrailConfig {
                max_gas_limit: 2_000_000,
                max_slippage_percent: 2.0,
                kill_switch_engaged: kill_switch,
            },
            enable_live_execution: live,
            deployed_contract: Some(Address::repeat_byte(0xcc)),
            signer: None,
            scan_interval_secs: 30,
            quote_timeout_ms: 1_000,
            confirmation_timeout_secs: 5,
            data_dir: data_dir.clone(),
            listen_addr: "127.0.0.1:0".parse().unwrap(),
            verifier_url: None,
            verify_poll_interval_secs: 60,
        }
    }

    fn test_engine(
        tag: &str,
        live: bool,
        kill_switch: bool,
        chain: Arc<MockChainReader>,
        signer: Arc<CountingSigner>,
    ) -> (Engine, PathBuf) {
        let dir = std::env::temp_dir().join(format!("arb_engine_cycle_{tag}"));
        let _ = fs::remove_dir_all(&dir);
        let config = test_config(live, kill_switch, &dir);
        let persistence = Arc::new(PersistenceGateway::new(&dir).unwrap());
        (
            Engine::new(config, chain, Some(signer), persistence),
            dir,
        )
    }

    #[tokio::test]
    async fn test_simulation_only_mode_never_executes() {
        let chain = spread_chain();
        let signer = CountingSigner::new();
        let (engine, dir) = test_engine("simonly", false, false, Arc::clone(&chain), Arc::clone(&signer));

        let report = engine.run_cycle().await.unwrap();

        assert_eq!(report.opportunities.len(), 1);
        assert!(!report.executed);
        assert_eq!(chain.sent(), 0);
        assert_eq!(signer.signed(), 0);
        // Candidate persisted even without execution
        assert_eq!(engine.persistence().read_candidates().unwrap().len(), 1);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_no_opportunity_is_a_normal_empty_report() {
        // Single venue: no spread can form
        let chain = Arc::new(MockChainReader::with_quotes(vec![(
            Address::repeat_byte(VENUE_LOW),
            VenueBehavior::Quote(U256::from(100u64)),
        )]));
        let signer = CountingSigner::new();
        let (engine, dir) = test_engine("empty", true, false, chain, signer);

        let report = engine.run_cycle().await.unwrap();
        assert!(report.opportunities.is_empty());
        assert!(!report.executed);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_kill_switch_blocks_all_submission() {
        let chain = spread_chain();
        let signer = CountingSigner::new();
        let (engine, dir) = test_engine("kill", true, true, Arc::clone(&chain), Arc::clone(&signer));

        let err = engine.run_cycle().await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::Guardrail(GuardrailViolation::KillSwitchEngaged)
        ));
        assert_eq!(chain.sent(), 0);
        assert_eq!(signer.signed(), 0);

        // Rejection durably recorded with its reason
        let attempts = engine.persistence().read_attempts().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Failed);
        assert!(attempts[0].reason.as_ref().unwrap().contains("kill switch"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_gas_over_ceiling_records_gas_exceeded_with_zero_writes() {
        let chain = spread_chain();
        *chain.gas_estimate.lock().unwrap() = Ok(2_000_001);
        let signer = CountingSigner::new();
        let (engine, dir) = test_engine("gas", true, false, Arc::clone(&chain), Arc::clone(&signer));

        let err = engine.run_cycle().await.unwrap_err();

        assert!(matches!(
            err,
            EngineError::Guardrail(GuardrailViolation::GasLimitExceeded { .. })
        ));
        assert_eq!(chain.sent(), 0);
        assert_eq!(signer.signed(), 0);

        // One candidate record and one rejected-attempt record
        assert_eq!(engine.persistence().read_candidates().unwrap().len(), 1);
        let attempts = engine.persistence().read_attempts().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::GasExceeded);
        assert_eq!(attempts[0].gas_estimate, Some(2_000_001));

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_simulation_failure_prevents_signing_and_submission() {
        let chain = spread_chain();
        *chain.call_result.lock().unwrap() = Err("execution reverted: unprofitable".into());
        let signer = CountingSigner::new();
        let (engine, dir) = test_engine("sim", true, false, Arc::clone(&chain), Arc::clone(&signer));

        let err = engine.run_cycle().await.unwrap_err();

        assert!(matches!(err, EngineError::SimulationFailed(_)));
        assert_eq!(signer.signed(), 0, "signer must not be invoked after failed simulation");
        assert_eq!(chain.sent(), 0, "no transaction may be sent after failed simulation");

        let attempts = engine.persistence().read_attempts().unwrap();
        assert_eq!(attempts[0].status, AttemptStatus::SimulationFailed);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_happy_path_confirms_and_records() {
        let chain = spread_chain();
        let signer = CountingSigner::new();
        let (engine, dir) = test_engine("happy", true, false, Arc::clone(&chain), Arc::clone(&signer));

        let report = engine.run_cycle().await.unwrap();

        assert!(report.executed);
        assert!(report.tx_hash.is_some());
        assert_eq!(chain.sent(), 1);
        assert_eq!(signer.signed(), 1);

        let attempts = engine.persistence().read_attempts().unwrap();
        assert_eq!(attempts.len(), 1);
        assert_eq!(attempts[0].status, AttemptStatus::Confirmed);
        assert!(attempts[0].simulated);

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_node_rejection_is_recorded_verbatim() {
        let chain = spread_chain();
        *chain.send_result.lock().unwrap() = Err("nonce too low".into());
        let signer = CountingSigner::new();
        let (engine, dir) = test_engine("reject", true, false, Arc::clone(&chain), Arc::clone(&signer));

        let err = engine.run_cycle().await.unwrap_err();
        assert!(matches!(err, EngineError::Submission(_)));

        let attempts = engine.persistence().read_attempts().unwrap();
        assert_eq!(attempts[0].status, AttemptStatus::Failed);
        assert!(attempts[0].reason.as_ref().unwrap().contains("nonce too low"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_insufficient_funds_classified() {
        let chain = spread_chain();
        *chain.send_result.lock().unwrap() =
            Err("insufficient funds for gas * price + value".into());
        let signer = CountingSigner::new();
        let (engine, dir) = test_engine("funds", true, false, chain, signer);

        let err = engine.run_cycle().await.unwrap_err();
        assert!(matches!(err, EngineError::InsufficientFunds(_)));
        assert_eq!(err.status_code(), 402);

        let _ = fs::remove_dir_all(&dir);
    }
}
