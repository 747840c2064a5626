//! Error taxonomy for the engine
//!
//! One variant per failure class from the cycle's point of view. Venue-local
//! quote failures and persistence write failures are absorbed where they
//! happen (logged, venue/write dropped) and never surface here. An empty
//! scan is a normal `ScanReport`, not an error.
//!
//! Author: AI-Generated
//! Created: 2026-08-03

use crate::guardrails::GuardrailViolation;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Missing or malformed required setting. Fatal; raised before any
    /// network call is made.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A safety guardrail rejected the candidate before any transaction
    /// was built or sent.
    #[error("guardrail rejection: {0}")]
    Guardrail(#[from] GuardrailViolation),

    /// The state-read-only dry run of the execution call reverted or
    /// errored. No transaction is sent after this.
    #[error("simulation failed: {0}")]
    SimulationFailed(String),

    /// The node rejected the submission, or the transaction failed after
    /// submission. The raw node reason is kept verbatim for diagnostics.
    #[error("submission failed: {0}")]
    Submission(String),

    /// The signing account cannot cover the transaction cost.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// RPC connectivity failure (endpoint unreachable, transport error).
    #[error("rpc error: {0}")]
    Rpc(String),
}

impl EngineError {
    /// Which stage of the cycle aborted — included in every error response.
    pub fn stage(&self) -> &'static str {
        match self {
            EngineError::Configuration(_) => "configuration",
            EngineError::Guardrail(_) => "guardrail",
            EngineError::SimulationFailed(_) => "simulation",
            EngineError::Submission(_) => "submission",
            EngineError::InsufficientFunds(_) => "funds",
            EngineError::Rpc(_) => "rpc",
        }
    }

    /// HTTP status for the trigger endpoint.
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Guardrail(_) | EngineError::SimulationFailed(_) => 400,
            EngineError::InsufficientFunds(_) => 402,
            EngineError::Rpc(_) => 502,
            EngineError::Configuration(_) | EngineError::Submission(_) => 500,
        }
    }
}

/// Node error messages are free-form; this is the classifier that routes a
/// rejected submission to the 402 path instead of the generic 500.
pub fn is_insufficient_funds(reason: &str) -> bool {
    reason.to_lowercase().contains("insufficient funds")
}
