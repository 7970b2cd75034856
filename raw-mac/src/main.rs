/*
SPDX-FileCopyrightText: Copyright 2026 LG Electronics Inc.
SPDX-License-Identifier: MIT
*/

use std::path::PathBuf;
use std::process;

use clap::Parser;
use tracing::{error, info, warn};

use raw_mac::config::ScenarioConfig;
use raw_mac::network::Network;
use raw_mac::observe::TracingObserver;

// ── CLI argument definition ───────────────────────────────────────────────────

/// RAW MAC scenario runner.
///
/// Example:
///   raw-mac --config demos/raw_scenario.yaml --duration-ms 2000
#[derive(Debug, Parser)]
#[command(
    name = "raw-mac",
    about = "802.11ah Restricted Access Window scheduler – scenario runner",
    long_about = None,
)]
struct Cli {
    /// Path to the YAML scenario file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Simulated time to run, in milliseconds.
    #[arg(short = 'd', long = "duration-ms", default_value_t = 1000)]
    duration_ms: u64,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Level is controlled by the RUST_LOG env-var (e.g. RUST_LOG=debug).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    info!(
        config      = ?cli.config,
        duration_ms = cli.duration_ms,
        "Configuration"
    );

    // ── Load scenario ─────────────────────────────────────────────────────────
    let scenario = match &cli.config {
        Some(path) => match ScenarioConfig::load_from_file(path) {
            Ok(scenario) => scenario,
            Err(e) => {
                error!("Failed to load scenario: {:#}", e);
                process::exit(1);
            }
        },
        None => {
            warn!("No scenario file provided, using the default single-station scenario");
            ScenarioConfig::default_scenario()
        }
    };

    let mut network = match Network::new(&scenario, TracingObserver) {
        Ok(network) => network,
        Err(e) => {
            error!("Invalid scenario: {:#}", e);
            process::exit(1);
        }
    };

    let layout = *network.layout();
    info!(
        groups           = layout.group_count,
        group_size       = layout.group_size,
        slots            = layout.slot_count,
        slot_duration_us = layout.slot_duration_us,
        dtim_cycle_us    = layout.dtim_cycle_us(),
        "RAW layout"
    );

    // ── Run ───────────────────────────────────────────────────────────────────
    network.run_until(cli.duration_ms.saturating_mul(1_000));

    // ── Summary ───────────────────────────────────────────────────────────────
    let report = network.report();
    info!(
        "Access point: beacons={} immediate={} scheduled={} unscheduled={} dropped={} uplink={}",
        report.ap.beacons_sent,
        report.ap.immediate,
        report.ap.scheduled,
        report.ap.unscheduled,
        report.ap.dropped,
        report.ap.uplink_received,
    );
    info!(
        "Medium: lost to sleeping receivers={} aged out of slot queues={}",
        report.lost_asleep, report.aged_out
    );
    info!("{} station(s):", report.stations.len());
    for sta in &report.stations {
        info!(
            "  [{addr}]  state={state:?}  downlink={down}  uplink={up}  dropped={drop}  sleeps={sleeps}  slept={slept}us",
            addr = sta.address,
            state = sta.state,
            down = sta.counters.downlink_received,
            up = sta.counters.uplink_sent,
            drop = sta.counters.uplink_dropped,
            sleeps = sta.counters.sleeps,
            slept = sta.counters.slept_us,
        );
    }
}
