//! Configuration management
//!
//! Loads the engine configuration from environment variables (optionally a
//! chosen .env file) into one strongly typed struct, validated once at
//! startup. Any missing or malformed required field fails fast with a
//! ConfigurationError before a single network call is made.
//!
//! Router map, pair list, and token address map arrive as JSON blobs, the
//! same contract the external deployment tooling already speaks.
//!
//! Author: AI-Generated
//! Created: 2026-08-03
//! Modified: 2026-08-06 - explicit local/remote signer selection

use crate::errors::EngineError;
use crate::types::{AssetPair, GuardrailConfig};
use alloy::primitives::{Address, U256};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// A quote venue: display name plus its router contract.
#[derive(Debug, Clone)]
pub struct VenueConfig {
    pub name: String,
    pub router: Address,
}

/// Signing strategy, selected explicitly by configuration — never inferred
/// mid-execution from which variables happen to be set.
#[derive(Debug, Clone)]
pub enum SignerConfig {
    Local {
        private_key: String,
    },
    Remote {
        url: String,
        secret: String,
        address: Address,
    },
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    // Network
    pub rpc_url: String,

    // Scan universe
    pub venues: Vec<VenueConfig>,
    pub pairs: Vec<AssetPair>,
    /// Unit sample input quoted at every venue (1 token, 18 decimals).
    pub sample_amount_in: U256,

    // Decision thresholds
    pub profit_threshold_percent: f64,
    pub guardrails: GuardrailConfig,

    // Execution
    pub enable_live_execution: bool,
    pub deployed_contract: Option<Address>,
    pub signer: Option<SignerConfig>,

    // Scheduling
    pub scan_interval_secs: u64,
    pub quote_timeout_ms: u64,
    pub confirmation_timeout_secs: u64,

    // Ambient
    pub data_dir: PathBuf,
    pub listen_addr: SocketAddr,
    pub verifier_url: Option<String>,
    pub verify_poll_interval_secs: u64,
}

pub fn load_config() -> Result<EngineConfig, EngineError> {
    dotenv::dotenv().ok();
    from_env()
}

/// Load from a specific .env file (e.g. `.env.base`), then the process env.
pub fn load_config_from_file(path: &str) -> Result<EngineConfig, EngineError> {
    dotenv::from_filename(path)
        .map_err(|e| EngineError::Configuration(format!("failed to load env file {path}: {e}")))?;
    from_env()
}

fn from_env() -> Result<EngineConfig, EngineError> {
    let rpc_url = required("RPC_URL")?;

    let venues = parse_router_map(&required("DEX_ROUTERS")?)?;
    let pairs = parse_pairs(&required("TOKEN_PAIRS")?, &required("TOKEN_ADDRESSES")?)?;

    let profit_threshold_percent = parse_num::<f64>("PROFIT_THRESHOLD_PERCENT", "0.5")?;
    if profit_threshold_percent < 0.0 {
        return Err(EngineError::Configuration(
            "PROFIT_THRESHOLD_PERCENT must be >= 0".into(),
        ));
    }

    let max_slippage_percent = parse_num::<f64>("MAX_SLIPPAGE_PERCENT", "2")?;
    if max_slippage_percent < 0.0 {
        return Err(EngineError::Configuration(
            "MAX_SLIPPAGE_PERCENT must be >= 0".into(),
        ));
    }

    let guardrails = GuardrailConfig {
        max_gas_limit: parse_num::<u64>("MAX_GAS_LIMIT", "2000000")?,
        max_slippage_percent,
        kill_switch_engaged: parse_flag("EXECUTOR_KILL_SWITCH"),
    };

    let enable_live_execution = parse_flag("ENABLE_LIVE_EXECUTION");

    let deployed_contract = optional("DEPLOYED_CONTRACT_ADDRESS")
        .map(|raw| parse_address("DEPLOYED_CONTRACT_ADDRESS", &raw))
        .transpose()?;

    let signer = select_signer(
        optional("PRIVATE_KEY"),
        optional("REMOTE_SIGNER_URL"),
        optional("SECRET_CONFIRMATION"),
        optional("REMOTE_SIGNER_ADDRESS"),
    )?;

    if enable_live_execution {
        if deployed_contract.is_none() {
            return Err(EngineError::Configuration(
                "DEPLOYED_CONTRACT_ADDRESS required for live execution".into(),
            ));
        }
        if signer.is_none() {
            return Err(EngineError::Configuration(
                "live execution requires PRIVATE_KEY or REMOTE_SIGNER_URL".into(),
            ));
        }
    }

    Ok(EngineConfig {
        rpc_url,
        venues,
        pairs,
        sample_amount_in: unit_sample_amount(),
        profit_threshold_percent,
        guardrails,
        enable_live_execution,
        deployed_contract,
        signer,
        scan_interval_secs: parse_num::<u64>("SCAN_INTERVAL_SECS", "30")?,
        quote_timeout_ms: parse_num::<u64>("QUOTE_TIMEOUT_MS", "5000")?,
        confirmation_timeout_secs: parse_num::<u64>("CONFIRMATION_TIMEOUT_SECS", "120")?,
        data_dir: PathBuf::from(optional("DATA_DIR").unwrap_or_else(|| "data".into())),
        listen_addr: parse_listen_addr(&optional("LISTEN_ADDR").unwrap_or_else(|| "0.0.0.0:8787".into()))?,
        verifier_url: optional("VERIFIER_URL"),
        verify_poll_interval_secs: parse_num::<u64>("VERIFY_POLL_INTERVAL_SECS", "60")?,
    })
}

/// 1 token with 18 decimals — the fixed sample input per quote call.
pub fn unit_sample_amount() -> U256 {
    U256::from(10).pow(U256::from(18))
}

/// `DEX_ROUTERS` JSON object `{venueName: routerAddress}`. Key order of the
/// parsed map (lexicographic) fixes the venue iteration order, which in turn
/// fixes ranking tie-breaks — deterministic across runs.
pub(crate) fn parse_router_map(raw: &str) -> Result<Vec<VenueConfig>, EngineError> {
    let map: BTreeMap<String, String> = serde_json::from_str(raw)
        .map_err(|e| EngineError::Configuration(format!("DEX_ROUTERS is not a JSON object: {e}")))?;

    if map.is_empty() {
        return Err(EngineError::Configuration("DEX_ROUTERS is empty".into()));
    }

    map.into_iter()
        .map(|(name, addr)| {
            let router = parse_address(&format!("DEX_ROUTERS[{name}]"), &addr)?;
            Ok(VenueConfig { name, router })
        })
        .collect()
}

/// `TOKEN_PAIRS` JSON array `["BASE/QUOTE", ...]` resolved against the
/// `TOKEN_ADDRESSES` JSON object `{symbol: address}`.
pub(crate) fn parse_pairs(raw_pairs: &str, raw_tokens: &str) -> Result<Vec<AssetPair>, EngineError> {
    let symbols: Vec<String> = serde_json::from_str(raw_pairs)
        .map_err(|e| EngineError::Configuration(format!("TOKEN_PAIRS is not a JSON array: {e}")))?;

    let tokens: BTreeMap<String, String> = serde_json::from_str(raw_tokens).map_err(|e| {
        EngineError::Configuration(format!("TOKEN_ADDRESSES is not a JSON object: {e}"))
    })?;

    if symbols.is_empty() {
        return Err(EngineError::Configuration("TOKEN_PAIRS is empty".into()));
    }

    let resolve = |sym: &str| -> Result<Address, EngineError> {
        let raw = tokens.get(sym).ok_or_else(|| {
            EngineError::Configuration(format!("TOKEN_ADDRESSES missing entry for {sym}"))
        })?;
        parse_address(&format!("TOKEN_ADDRESSES[{sym}]"), raw)
    };

    symbols
        .iter()
        .map(|symbol| {
            let (base, quote) = symbol.split_once('/').ok_or_else(|| {
                EngineError::Configuration(format!("invalid pair '{symbol}', expected BASE/QUOTE"))
            })?;
            Ok(AssetPair::new(
                base.to_string(),
                quote.to_string(),
                resolve(base)?,
                resolve(quote)?,
            ))
        })
        .collect()
}

/// Explicit signing strategy selection. Remote signing fails closed: a
/// configured remote URL with a missing secret (or address) is a
/// configuration error, never a silent fallback to the local key.
pub(crate) fn select_signer(
    private_key: Option<String>,
    remote_url: Option<String>,
    secret: Option<String>,
    remote_address: Option<String>,
) -> Result<Option<SignerConfig>, EngineError> {
    match (private_key, remote_url) {
        (Some(_), Some(_)) => Err(EngineError::Configuration(
            "set either PRIVATE_KEY or REMOTE_SIGNER_URL, not both".into(),
        )),
        (Some(private_key), None) => Ok(Some(SignerConfig::Local { private_key })),
        (None, Some(url)) => {
            let secret = secret.filter(|s| !s.trim().is_empty()).ok_or_else(|| {
                EngineError::Configuration(
                    "REMOTE_SIGNER_URL set but SECRET_CONFIRMATION missing — refusing to sign"
                        .into(),
                )
            })?;
            let address = remote_address.ok_or_else(|| {
                EngineError::Configuration(
                    "REMOTE_SIGNER_URL set but REMOTE_SIGNER_ADDRESS missing".into(),
                )
            })?;
            Ok(Some(SignerConfig::Remote {
                url,
                secret,
                address: parse_address("REMOTE_SIGNER_ADDRESS", &address)?,
            }))
        }
        (None, None) => Ok(None),
    }
}

fn required(key: &str) -> Result<String, EngineError> {
    std::env::var(key).map_err(|_| EngineError::Configuration(format!("{key} not set")))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(key: &str) -> bool {
    optional(key)
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn parse_num<T: FromStr>(key: &str, default: &str) -> Result<T, EngineError>
where
    T::Err: std::fmt::Display,
{
    let raw = optional(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| EngineError::Configuration(format!("{key}='{raw}' is not a valid number: {e}")))
}

fn parse_address(field: &str, raw: &str) -> Result<Address, EngineError> {
    Address::from_str(raw.trim())
        .map_err(|e| EngineError::Configuration(format!("{field}='{raw}' is not an address: {e}")))
}

fn parse_listen_addr(raw: &str) -> Result<SocketAddr, EngineError> {
    raw.parse()
        .map_err(|e| EngineError::Configuration(format!("LISTEN_ADDR='{raw}' is invalid: {e}")))
}
