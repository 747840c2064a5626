//! Signer Adapter
//!
//! Polymorphic signing: the unsigned transaction is built identically
//! upstream; only this step differs between strategies.
//!
//! - `LocalKeySigner` holds the key in-process and produces an EIP-2718
//!   encoded signed transaction.
//! - `RemoteSigner` delegates to an external signing endpoint authenticated
//!   by a pre-shared confirmation secret. A missing secret fails closed at
//!   construction — there is no silent fallback to local signing.
//!
//! Author: AI-Generated
//! Created: 2026-08-04
//! Modified: 2026-08-06 - remote signer response validation

use crate::config::SignerConfig;
use crate::errors::EngineError;
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::Address;
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

#[async_trait]
pub trait SignerAdapter: Send + Sync {
    /// The account the signed transactions originate from.
    fn address(&self) -> Address;

    /// Sign a fully populated transaction request; returns the raw
    /// EIP-2718 encoded bytes ready for `eth_sendRawTransaction`.
    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Vec<u8>, EngineError>;
}

/// Build the configured strategy. Configuration has already validated the
/// selection; construction re-validates key material.
pub fn build_signer(config: &SignerConfig) -> Result<Arc<dyn SignerAdapter>, EngineError> {
    match config {
        SignerConfig::Local { private_key } => Ok(Arc::new(LocalKeySigner::new(private_key)?)),
        SignerConfig::Remote {
            url,
            secret,
            address,
        } => Ok(Arc::new(RemoteSigner::new(
            url.clone(),
            secret.clone(),
            *address,
        )?)),
    }
}

// ── Local key ────────────────────────────────────────────────────────

pub struct LocalKeySigner {
    wallet: EthereumWallet,
    address: Address,
}

impl LocalKeySigner {
    pub fn new(private_key: &str) -> Result<Self, EngineError> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| EngineError::Configuration(format!("PRIVATE_KEY is invalid: {e}")))?;
        let address = signer.address();

        Ok(Self {
            wallet: EthereumWallet::from(signer),
            address,
        })
    }
}

#[async_trait]
impl SignerAdapter for LocalKeySigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Vec<u8>, EngineError> {
        let envelope = tx
            .build(&self.wallet)
            .await
            .map_err(|e| EngineError::Submission(format!("failed to sign transaction: {e}")))?;
        Ok(envelope.encoded_2718())
    }
}

// ── Remote signing service ───────────────────────────────────────────

#[derive(Serialize)]
struct SignRequest<'a> {
    tx: &'a TransactionRequest,
    #[serde(rename = "secretConfirmation")]
    secret_confirmation: &'a str,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedTx")]
    signed_tx: String,
}

#[derive(Debug)]
pub struct RemoteSigner {
    client: reqwest::Client,
    endpoint: String,
    secret: String,
    address: Address,
}

impl RemoteSigner {
    pub fn new(endpoint: String, secret: String, address: Address) -> Result<Self, EngineError> {
        // Construction-time invariant: never reachable with an empty secret
        if secret.trim().is_empty() {
            return Err(EngineError::Configuration(
                "remote signer requires a pre-shared confirmation secret".into(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            secret,
            address,
        })
    }
}

#[async_trait]
impl SignerAdapter for RemoteSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn sign_transaction(&self, tx: TransactionRequest) -> Result<Vec<u8>, EngineError> {
        debug!("requesting signature from remote signer at {}", self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .json(&SignRequest {
                tx: &tx,
                secret_confirmation: &self.secret,
            })
            .send()
            .await
            .map_err(|e| EngineError::Submission(format!("remote signer unreachable: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EngineError::Submission(format!(
                "remote signer rejected request ({status}): {body}"
            )));
        }

        let parsed: SignResponse = response.json().await.map_err(|e| {
            EngineError::Submission(format!("remote signer returned malformed response: {e}"))
        })?;

        alloy::hex::decode(parsed.signed_tx.trim()).map_err(|e| {
            EngineError::Submission(format!("remote signer returned malformed signedTx: {e}"))
        })
    }
}
