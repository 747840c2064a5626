//! Trade Simulator
//!
//! Dry-runs the exact execution call (same target, same calldata) as a
//! state-read-only `eth_call` against current chain state. Any revert or
//! simulation error short-circuits execution — the real transaction is
//! never sent after a failed simulation. This is the last automated
//! correctness check and it is mandatory.
//!
//! Author: AI-Generated
//! Created: 2026-08-04

use crate::chain::ChainReader;
use crate::errors::EngineError;
use alloy::rpc::types::TransactionRequest;
use std::sync::Arc;
use tracing::debug;

pub struct TradeSimulator {
    chain: Arc<dyn ChainReader>,
}

impl TradeSimulator {
    pub fn new(chain: Arc<dyn ChainReader>) -> Self {
        Self { chain }
    }

    /// `tx` must carry the exact calldata that would be submitted.
    pub async fn simulate(&self, tx: &TransactionRequest) -> Result<(), EngineError> {
        match self.chain.call(tx).await {
            Ok(_) => {
                debug!("🔬 simulation passed");
                Ok(())
            }
            Err(e) => Err(EngineError::SimulationFailed(e.to_string())),
        }
    }
}
