//! Pre-trade guardrails
//!
//! A candidate may proceed to simulation only if the kill switch is off,
//! the gas estimate for the built transaction stays under the configured
//! ceiling, and the freshly re-queried spread has not slipped past the
//! slippage ceiling. Any violation is typed, recorded, and stops the
//! execution path — the scan cycle itself continues.
//!
//! The slippage re-check exists because quotes are sampled asynchronously:
//! venue state can move between detection and execution.
//!
//! Author: AI-Generated
//! Created: 2026-08-03

use crate::types::GuardrailConfig;
use thiserror::Error;

/// Typed guardrail rejection. Terminal for the attempt that triggered it.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GuardrailViolation {
    #[error("kill switch engaged — live execution disabled")]
    KillSwitchEngaged,

    #[error("gas estimate {estimate} exceeds configured ceiling {limit}")]
    GasLimitExceeded { estimate: u64, limit: u64 },

    #[error(
        "profit slipped {drift:.4}% (observed {observed:.4}% -> fresh {fresh:.4}%), ceiling {limit}%"
    )]
    SlippageExceeded {
        observed: f64,
        fresh: f64,
        drift: f64,
        limit: f64,
    },
}

/// Evaluates the per-cycle guardrail snapshot. The snapshot is immutable for
/// the cycle; the kill switch therefore takes effect on the next submission
/// attempt, never by interrupting one in flight.
pub struct GuardrailEvaluator {
    config: GuardrailConfig,
}

impl GuardrailEvaluator {
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    /// Checked before every submission attempt.
    pub fn check_kill_switch(&self) -> Result<(), GuardrailViolation> {
        if self.config.kill_switch_engaged {
            return Err(GuardrailViolation::KillSwitchEngaged);
        }
        Ok(())
    }

    /// `estimate` is the raw node estimate for the execution transaction,
    /// obtained after building it. "Does not exceed" — equality passes.
    pub fn check_gas(&self, estimate: u64) -> Result<(), GuardrailViolation> {
        if estimate > self.config.max_gas_limit {
            return Err(GuardrailViolation::GasLimitExceeded {
                estimate,
                limit: self.config.max_gas_limit,
            });
        }
        Ok(())
    }

    /// `observed` is the profit percent at detection time, `fresh` the
    /// just-re-queried value. Only deterioration counts; an improved fresh
    /// quote never rejects.
    pub fn check_slippage(&self, observed: f64, fresh: f64) -> Result<(), GuardrailViolation> {
        let drift = observed - fresh;
        if drift > self.config.max_slippage_percent {
            return Err(GuardrailViolation::SlippageExceeded {
                observed,
                fresh,
                drift,
                limit: self.config.max_slippage_percent,
            });
        }
        Ok(())
    }
}
