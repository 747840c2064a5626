//! Chain access layer
//!
//! `ChainReader` is the engine's only window onto the blockchain node:
//! venue quote calls, gas/fee data, balance lookups, simulation calls and
//! raw transaction submission. Components depend on the trait, not on the
//! transport, so the whole execution path is testable without a node.
//!
//! `RpcChainReader` is the production implementation over an alloy HTTP
//! provider. One immutable chain session per invocation — handles are
//! passed explicitly into each component, never held as globals.
//!
//! Author: AI-Generated
//! Created: 2026-08-03
//! Modified: 2026-08-05 - receipt polling with bounded wait

use crate::contracts::IUniswapV2Router02;
use async_trait::async_trait;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Log, TransactionRequest};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// How often the bounded confirmation wait re-polls for a receipt.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("call reverted: {0}")]
    Revert(String),

    #[error("timed out waiting for {0}")]
    Timeout(String),
}

/// EIP-1559 fee estimate for the next submission.
#[derive(Debug, Clone, Copy)]
pub struct FeeEstimate {
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Minimal receipt view the executor needs.
#[derive(Debug, Clone)]
pub struct ExecutionReceipt {
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub succeeded: bool,
    pub logs: Vec<Log>,
}

/// Read (and submit-raw) interface to the blockchain node.
#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Quote `amount_in` of `token_in` into `token_out` through `router`
    /// (`getAmountsOut`, last element of the returned amounts).
    async fn amount_out(
        &self,
        router: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<U256, ChainError>;

    /// State-read-only execution of `tx` against latest state.
    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, ChainError>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ChainError>;

    async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError>;

    async fn nonce(&self, address: Address) -> Result<u64, ChainError>;

    async fn balance(&self, address: Address) -> Result<U256, ChainError>;

    async fn chain_id(&self) -> Result<u64, ChainError>;

    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Submit a signed EIP-2718 encoded transaction; returns its hash.
    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError>;

    /// Block (bounded) until one confirmation for `tx_hash` is observed.
    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<ExecutionReceipt, ChainError>;
}

/// Production `ChainReader` over an alloy HTTP provider.
pub struct RpcChainReader {
    provider: DynProvider,
}

impl RpcChainReader {
    /// Connect and verify the endpoint answers before any component uses it.
    pub async fn connect(rpc_url: &str) -> Result<Self, crate::errors::EngineError> {
        let provider = ProviderBuilder::new()
            .connect(rpc_url)
            .await
            .map_err(|e| {
                crate::errors::EngineError::Rpc(format!(
                    "failed to connect to RPC endpoint: {e}"
                ))
            })?
            .erased();

        let reader = Self { provider };
        reader
            .block_number()
            .await
            .map_err(|e| crate::errors::EngineError::Rpc(format!("RPC endpoint unreachable: {e}")))?;

        Ok(reader)
    }
}

/// Node errors arrive as free-form strings; split revert-looking ones from
/// transport failures so quote exclusion logs read sensibly.
fn classify(err: impl std::fmt::Display) -> ChainError {
    let msg = err.to_string();
    if msg.to_lowercase().contains("revert") {
        ChainError::Revert(msg)
    } else {
        ChainError::Transport(msg)
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn amount_out(
        &self,
        router: Address,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<U256, ChainError> {
        let contract = IUniswapV2Router02::new(router, self.provider.clone());
        let amounts = contract
            .getAmountsOut(amount_in, vec![token_in, token_out])
            .call()
            .await
            .map_err(classify)?;

        amounts
            .last()
            .copied()
            .ok_or_else(|| ChainError::Revert("empty amounts array from getAmountsOut".into()))
    }

    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes, ChainError> {
        self.provider.call(tx.clone()).await.map_err(classify)
    }

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64, ChainError> {
        self.provider.estimate_gas(tx.clone()).await.map_err(classify)
    }

    async fn fee_estimate(&self) -> Result<FeeEstimate, ChainError> {
        let estimate = self
            .provider
            .estimate_eip1559_fees()
            .await
            .map_err(classify)?;

        Ok(FeeEstimate {
            max_fee_per_gas: estimate.max_fee_per_gas,
            max_priority_fee_per_gas: estimate.max_priority_fee_per_gas,
        })
    }

    async fn nonce(&self, address: Address) -> Result<u64, ChainError> {
        self.provider
            .get_transaction_count(address)
            .await
            .map_err(classify)
    }

    async fn balance(&self, address: Address) -> Result<U256, ChainError> {
        self.provider.get_balance(address).await.map_err(classify)
    }

    async fn chain_id(&self) -> Result<u64, ChainError> {
        self.provider.get_chain_id().await.map_err(classify)
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider.get_block_number().await.map_err(classify)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> Result<TxHash, ChainError> {
        let pending = self
            .provider
            .send_raw_transaction(raw)
            .await
            .map_err(classify)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_receipt(
        &self,
        tx_hash: TxHash,
        timeout: Duration,
    ) -> Result<ExecutionReceipt, ChainError> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(receipt) = self
                .provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(classify)?
            {
                return Ok(ExecutionReceipt {
                    tx_hash,
                    block_number: receipt.block_number.unwrap_or_default(),
                    gas_used: receipt.gas_used,
                    succeeded: receipt.status(),
                    logs: receipt.inner.logs().to_vec(),
                });
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(ChainError::Timeout(format!("receipt for {tx_hash}")));
            }

            debug!("receipt for {} not yet available, re-polling", tx_hash);
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}
