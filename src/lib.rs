//! Cross-Venue Arbitrage Engine Library
//!
//! Monitors a configurable set of DEX routers for price spreads on
//! configured token pairs, ranks the spreads, and — when live execution is
//! enabled — captures the best one through a deployed arbitrage contract
//! behind strict guardrails: kill switch, gas ceiling, pre-submission
//! slippage re-check, and mandatory simulation.
//!
//! Author: AI-Generated
//! Created: 2026-08-03

pub mod chain;
pub mod config;
pub mod contracts;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod guardrails;
pub mod persistence;
pub mod quoter;
pub mod ranker;
pub mod server;
pub mod signer;
pub mod simulator;
pub mod types;
pub mod verifier;

// Re-export commonly used types
pub use config::{load_config, load_config_from_file, EngineConfig};
pub use engine::Engine;
pub use errors::EngineError;
pub use types::{
    AssetPair, AttemptStatus, ExecutionAttempt, OpportunityCandidate, ScanReport, VenueQuote,
};
