// Core data structures for the detection/execution cycle.
// Records persisted by the PersistenceGateway live here too so the
// engine, the HTTP layer, and the gateway share one definition.

use alloy::primitives::{Address, TxHash, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered token pair (`base/quote`), resolved to on-chain addresses at
/// configuration time. Used as a lookup key; never created at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPair {
    pub base: String,
    pub quote: String,
    pub base_address: Address,
    pub quote_address: Address,
}

impl AssetPair {
    pub fn new(base: String, quote: String, base_address: Address, quote_address: Address) -> Self {
        Self {
            base,
            quote,
            base_address,
            quote_address,
        }
    }

    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

impl fmt::Display for AssetPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A single venue's answer to "how much `quote` for the sample `base` input".
/// Produced fresh each scan cycle and never mutated; the next cycle's quote
/// for the same venue+pair supersedes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueQuote {
    pub venue_name: String,
    pub venue_address: Address,
    pub pair: AssetPair,
    pub sample_amount_in: U256,
    pub amount_out: U256,
    pub observed_at: DateTime<Utc>,
}

/// A ranked spread between two venues for the same pair.
///
/// Invariant: `profit_percent = (sell.amount_out / buy.amount_out - 1) * 100`
/// and strictly exceeds the configured threshold, or the candidate does not
/// exist. `detected_at` derives from the underlying quotes so that ranking an
/// unchanged quote set is byte-identical.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityCandidate {
    pub id: String,
    pub pair: AssetPair,
    pub buy: VenueQuote,
    pub sell: VenueQuote,
    pub profit_percent: f64,
    pub detected_at: DateTime<Utc>,
}

impl OpportunityCandidate {
    pub fn new(pair: AssetPair, buy: VenueQuote, sell: VenueQuote, profit_percent: f64) -> Self {
        let detected_at = buy.observed_at.max(sell.observed_at);
        let id = format!(
            "{}:{}>{}:{}",
            pair.symbol(),
            buy.venue_name,
            sell.venue_name,
            detected_at.timestamp_millis()
        );
        Self {
            id,
            pair,
            buy,
            sell,
            profit_percent,
            detected_at,
        }
    }
}

/// Safety policy snapshot, loaded once per invocation and read-only for the
/// duration of a scan cycle.
#[derive(Debug, Clone)]
pub struct GuardrailConfig {
    pub max_gas_limit: u64,
    pub max_slippage_percent: f64,
    pub kill_switch_engaged: bool,
}

/// Lifecycle of an execution attempt.
/// Terminal: Confirmed, Failed, SimulationFailed, GasExceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptStatus {
    Simulated,
    SimulationFailed,
    GasExceeded,
    Submitted,
    Confirmed,
    Failed,
}

/// Durable record of one execution attempt (also the persisted execution
/// row). Guardrail rejections land here with the typed violation rendered
/// into `reason`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionAttempt {
    pub candidate_id: String,
    pub pair: String,
    pub status: AttemptStatus,
    pub simulated: bool,
    pub gas_estimate: Option<u64>,
    pub tx_hash: Option<TxHash>,
    pub expected_profit_percent: f64,
    pub actual_profit: Option<f64>,
    pub reason: Option<String>,
    pub executed_at: DateTime<Utc>,
}

/// Contract verification lifecycle, advanced by the background poll —
/// never by the execution path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationStatus {
    #[default]
    Unsubmitted,
    Submitted,
    Verified,
    AlreadyVerified,
    Error,
}

impl VerificationStatus {
    /// True once the status can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            VerificationStatus::Verified
                | VerificationStatus::AlreadyVerified
                | VerificationStatus::Error
        )
    }
}

/// Metadata for a deployed arbitrage contract, registered by the external
/// deployment collaborator and upserted by contract address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub contract_address: Address,
    pub deployer_address: Address,
    pub deployment_tx_hash: TxHash,
    pub gas_used: u64,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    #[serde(default)]
    pub verification_url: Option<String>,
    #[serde(default = "chrono::Utc::now")]
    pub deployed_at: DateTime<Utc>,
}

/// Result of one scan cycle, returned by the trigger endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    pub opportunities: Vec<OpportunityCandidate>,
    pub executed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
    /// Why the best candidate was not executed (live mode off, attempt
    /// already in flight). Absent when executed or when nothing was found.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl ScanReport {
    pub fn empty() -> Self {
        Self {
            opportunities: Vec::new(),
            executed: false,
            tx_hash: None,
            skipped: None,
        }
    }
}

/// Flattened candidate row for the append-only candidate log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub candidate_id: String,
    pub pair: String,
    pub buy_venue: String,
    pub buy_venue_address: Address,
    pub sell_venue: String,
    pub sell_venue_address: Address,
    pub profit_percent: f64,
    pub detected_at: DateTime<Utc>,
}

impl From<&OpportunityCandidate> for CandidateRecord {
    fn from(c: &OpportunityCandidate) -> Self {
        Self {
            candidate_id: c.id.clone(),
            pair: c.pair.symbol(),
            buy_venue: c.buy.venue_name.clone(),
            buy_venue_address: c.buy.venue_address,
            sell_venue: c.sell.venue_name.clone(),
            sell_venue_address: c.sell.venue_address,
            profit_percent: c.profit_percent,
            detected_at: c.detected_at,
        }
    }
}
