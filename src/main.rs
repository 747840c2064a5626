//! Cross-Venue Arbitrage Engine
//!
//! Main entry point. Loads and validates configuration, opens one chain
//! session for the invocation, then runs the periodic scan loop alongside
//! the HTTP trigger endpoint. Quote phases of overlapping cycles run
//! concurrently; execution is single-flight inside the engine.
//!
//! Author: AI-Generated
//! Created: 2026-08-05
//! Modified: 2026-08-06 - --once mode, verification poll task

use anyhow::Result;
use arb_engine::chain::{ChainReader, RpcChainReader};
use arb_engine::config::{load_config, load_config_from_file};
use arb_engine::engine::Engine;
use arb_engine::persistence::PersistenceGateway;
use arb_engine::server;
use arb_engine::signer::build_signer;
use arb_engine::verifier::VerificationPoller;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Cross-venue DEX arbitrage detection and guarded execution engine
#[derive(Parser)]
#[command(name = "arb-engine")]
struct Args {
    /// Run a single scan cycle, print the report as JSON, and exit
    #[arg(long)]
    once: bool,

    /// Alternate .env file to load (e.g. .env.base)
    #[arg(long, env = "ENV_FILE")]
    env_file: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let args = Args::parse();

    let config = match &args.env_file {
        Some(path) => load_config_from_file(path)?,
        None => load_config()?,
    };

    info!("Arbitrage engine starting...");
    info!("Venues: {}", config.venues.len());
    info!("Pairs: {}", config.pairs.len());
    info!("Profit threshold: {:.4}%", config.profit_threshold_percent);
    info!(
        "Guardrails: max gas {} | max slippage {:.2}% | kill switch {}",
        config.guardrails.max_gas_limit,
        config.guardrails.max_slippage_percent,
        config.guardrails.kill_switch_engaged
    );

    // One immutable chain session per invocation, passed into components
    let chain = RpcChainReader::connect(&config.rpc_url).await?;
    let block = chain.block_number().await?;
    info!("Connected! Current block: {}", block);

    let signer = match &config.signer {
        Some(signer_config) => Some(build_signer(signer_config)?),
        None => None,
    };

    if config.enable_live_execution {
        warn!("⚠️ LIVE EXECUTION ENABLED - REAL FUNDS AT RISK!");
        if let Some(signer) = &signer {
            match chain.balance(signer.address()).await {
                Ok(balance) => info!("Signer {} balance: {} wei", signer.address(), balance),
                Err(e) => warn!("could not read signer balance: {}", e),
            }
        }
    } else {
        info!("Simulation-only mode: candidates are detected and recorded, never executed");
    }

    let persistence = Arc::new(PersistenceGateway::new(&config.data_dir)?);
    let chain: Arc<dyn ChainReader> = Arc::new(chain);
    let engine = Arc::new(Engine::new(
        config.clone(),
        chain,
        signer,
        Arc::clone(&persistence),
    ));

    if args.once {
        return match engine.run_cycle().await {
            Ok(report) => {
                println!("{}", serde_json::to_string_pretty(&report)?);
                Ok(())
            }
            Err(e) => {
                error!("scan cycle aborted at {} stage: {}", e.stage(), e);
                std::process::exit(1);
            }
        };
    }

    // Verification poll (supplemental; only when an endpoint is configured)
    if let Some(url) = config.verifier_url.clone() {
        let poller = VerificationPoller::new(
            url,
            Arc::clone(&persistence),
            Duration::from_secs(config.verify_poll_interval_secs),
        );
        tokio::spawn(poller.run());
    }

    // Periodic scan loop. Each tick spawns its own cycle so a slow
    // confirmation wait never delays the next quote-gathering phase.
    {
        let engine = Arc::clone(&engine);
        let interval_secs = config.scan_interval_secs.max(1);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!("Scan loop started: every {}s", interval_secs);

            loop {
                ticker.tick().await;
                let engine = Arc::clone(&engine);
                tokio::spawn(async move {
                    match engine.run_cycle().await {
                        Ok(report) if report.executed => info!(
                            "cycle executed candidate, tx {:?}",
                            report.tx_hash
                        ),
                        Ok(report) => debug!(
                            "cycle complete: {} opportunity(ies), none executed",
                            report.opportunities.len()
                        ),
                        Err(e) => warn!("cycle aborted at {} stage: {}", e.stage(), e),
                    }
                });
            }
        });
    }

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("HTTP trigger listening on {}", config.listen_addr);
    axum::serve(listener, server::router(engine)).await?;

    Ok(())
}
