//! Persistence Gateway
//!
//! Durable, best-effort observability records: append-only JSONL for
//! opportunity candidates and execution attempts, upsert-by-address JSON
//! document for deployed-contract metadata.
//!
//! Persistence is a fire-and-forget side channel with its own error
//! handling: a write failure is logged and the in-memory decision path
//! continues untouched — "couldn't record" is never "couldn't execute".
//!
//! Author: AI-Generated
//! Created: 2026-08-04

use crate::types::{CandidateRecord, DeploymentRecord, ExecutionAttempt, OpportunityCandidate};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

const CANDIDATES_FILE: &str = "candidates.jsonl";
const EXECUTIONS_FILE: &str = "executions.jsonl";
const DEPLOYMENTS_FILE: &str = "deployments.json";

pub struct PersistenceGateway {
    data_dir: PathBuf,
}

impl PersistenceGateway {
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create data directory {data_dir:?}"))?;
        Ok(Self { data_dir })
    }

    // ── Decision-path writes (never propagate errors) ────────────────

    pub fn record_candidate(&self, candidate: &OpportunityCandidate) {
        if let Err(e) = self.append(CANDIDATES_FILE, &CandidateRecord::from(candidate)) {
            warn!("failed to persist candidate {}: {e:#}", candidate.id);
        }
    }

    pub fn record_attempt(&self, attempt: &ExecutionAttempt) {
        if let Err(e) = self.append(EXECUTIONS_FILE, attempt) {
            warn!(
                "failed to persist execution attempt for {}: {e:#}",
                attempt.candidate_id
            );
        }
    }

    pub fn upsert_deployment(&self, record: &DeploymentRecord) {
        if let Err(e) = self.try_upsert_deployment(record) {
            warn!(
                "failed to persist deployment {}: {e:#}",
                record.contract_address
            );
        }
    }

    // ── Readers (verification poll, exports, tests) ──────────────────

    pub fn read_candidates(&self) -> Result<Vec<CandidateRecord>> {
        self.read_jsonl(CANDIDATES_FILE)
    }

    pub fn read_attempts(&self) -> Result<Vec<ExecutionAttempt>> {
        self.read_jsonl(EXECUTIONS_FILE)
    }

    pub fn load_deployments(&self) -> Result<BTreeMap<Address, DeploymentRecord>> {
        let path = self.data_dir.join(DEPLOYMENTS_FILE);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {path:?}"))?;
        serde_json::from_str(&raw).with_context(|| format!("malformed deployments file {path:?}"))
    }

    // ── Internals ────────────────────────────────────────────────────

    fn append<T: Serialize>(&self, file: &str, record: &T) -> Result<()> {
        let path = self.data_dir.join(file);
        let mut handle = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open {path:?}"))?;

        let json = serde_json::to_string(record).context("failed to serialize record")?;
        writeln!(handle, "{json}")?;
        Ok(())
    }

    fn read_jsonl<T: DeserializeOwned>(&self, file: &str) -> Result<Vec<T>> {
        let path = self.data_dir.join(file);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(
                serde_json::from_str(&line)
                    .with_context(|| format!("failed to parse record: {line}"))?,
            );
        }
        Ok(records)
    }

    fn try_upsert_deployment(&self, record: &DeploymentRecord) -> Result<()> {
        let mut deployments = self.load_deployments()?;
        deployments.insert(record.contract_address, record.clone());

        let path = self.data_dir.join(DEPLOYMENTS_FILE);
        let json = serde_json::to_string_pretty(&deployments)
            .context("failed to serialize deployments")?;
        fs::write(&path, json).with_context(|| format!("failed to write {path:?}"))?;
        Ok(())
    }
}
