//! Contract verification status poll
//!
//! Background task that advances persisted DeploymentRecords through the
//! verification lifecycle by polling an explorer-style status endpoint.
//! Runs entirely outside the execution path: terminal records are left
//! alone, poll failures are logged and retried next round.
//!
//! Author: AI-Generated
//! Created: 2026-08-06

use crate::persistence::PersistenceGateway;
use crate::types::{DeploymentRecord, VerificationStatus};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    url: Option<String>,
}

pub struct VerificationPoller {
    client: reqwest::Client,
    endpoint: String,
    persistence: Arc<PersistenceGateway>,
    interval: Duration,
}

impl VerificationPoller {
    pub fn new(endpoint: String, persistence: Arc<PersistenceGateway>, interval: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            persistence,
            interval,
        }
    }

    pub async fn run(self) {
        info!(
            "verification poll started: {} every {:?}",
            self.endpoint, self.interval
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll_once().await;
        }
    }

    async fn poll_once(&self) {
        let deployments = match self.persistence.load_deployments() {
            Ok(deployments) => deployments,
            Err(e) => {
                warn!("verification poll: failed to load deployments: {e:#}");
                return;
            }
        };

        for (address, record) in deployments {
            if record.verification_status.is_terminal() {
                continue;
            }

            match self.fetch_status(address).await {
                Ok((status, url)) => self.apply_update(record, status, url),
                Err(e) => warn!("verification poll for {address} failed: {e:#}"),
            }
        }
    }

    fn apply_update(
        &self,
        mut record: DeploymentRecord,
        status: VerificationStatus,
        url: Option<String>,
    ) {
        if status == record.verification_status && url.is_none() {
            debug!(
                "verification status for {} unchanged ({:?})",
                record.contract_address, status
            );
            return;
        }

        info!(
            "verification status for {}: {:?} -> {:?}",
            record.contract_address, record.verification_status, status
        );
        record.verification_status = status;
        if url.is_some() {
            record.verification_url = url;
        }
        self.persistence.upsert_deployment(&record);
    }

    async fn fetch_status(&self, address: Address) -> Result<(VerificationStatus, Option<String>)> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("address", format!("{address}"))])
            .send()
            .await
            .context("verification endpoint unreachable")?
            .error_for_status()
            .context("verification endpoint returned an error status")?;

        let parsed: StatusResponse = response
            .json()
            .await
            .context("malformed verification response")?;

        Ok((map_status(&parsed.status), parsed.url))
    }
}

/// Explorer status strings → lifecycle states. Unknown strings stay at
/// Submitted so the poll keeps watching them.
fn map_status(raw: &str) -> VerificationStatus {
    match raw.trim().to_lowercase().as_str() {
        "verified" | "pass" => VerificationStatus::Verified,
        "already_verified" | "already verified" => VerificationStatus::AlreadyVerified,
        "error" | "fail" | "failure" => VerificationStatus::Error,
        "unsubmitted" => VerificationStatus::Unsubmitted,
        _ => VerificationStatus::Submitted,
    }
}
