//! `sqes_cli` entry point (spec §6.1): parses CLI arguments, loads and
//! validates configuration, then drives the orchestrator for the
//! requested date range, unwinding on SIGTERM/SIGINT/SIGHUP the way the
//! teacher's `main.rs` races its server future against `ctrl_c()`.

use clap::Parser;
use sqes::cli::CliArgs;
use sqes::config;
use sqes::config::source_map::load_source_mapping;
use sqes::orchestrator::{Orchestrator, OrchestratorInputs};
use std::path::Path;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    sqes::logging::init(args.verbosity());

    if args.wants_auxiliary_scraper() {
        info!("sensor/station/latency catalog scrapers are out of scope for this build");
        return;
    }

    let config = match config::load_from_file(Path::new(&args.config)) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            std::process::exit(1);
        }
    };

    let errors = config::validate(&config);
    if !errors.is_empty() {
        for e in &errors {
            error!("configuration error: {e}");
        }
        std::process::exit(1);
    }

    if args.check_config {
        info!("configuration is valid");
        return;
    }

    let (start, end) = match args.date_bounds() {
        Ok(bounds) => bounds,
        Err(e) => {
            error!("{e}");
            std::process::exit(1);
        }
    };

    let source_map = Arc::new(load_source_mapping(Path::new("source.cfg")));
    let orchestrator = Orchestrator::new(Arc::new(config), source_map);

    let stations = args.stations.clone();
    let inputs = OrchestratorInputs {
        start_date: start,
        end_date: end,
        stations_filter: if stations.is_empty() { None } else { Some(stations.as_slice()) },
        network_filter: args.network.as_deref(),
        ppsd: args.ppsd,
        mseed: args.mseed,
        flush: args.flush,
    };

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            std::process::exit(1);
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGINT handler");
            std::process::exit(1);
        }
    };
    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to install SIGHUP handler");
            std::process::exit(1);
        }
    };

    tokio::select! {
        result = orchestrator.run(inputs) => {
            match result {
                Ok(()) => info!("run complete"),
                Err(e) => {
                    error!(error = %e, "run failed");
                    std::process::exit(1);
                }
            }
        }
        _ = sigterm.recv() => {
            warn!("received SIGTERM, shutting down");
            std::process::exit(128 + 15);
        }
        _ = sigint.recv() => {
            warn!("received SIGINT, shutting down");
            std::process::exit(128 + 2);
        }
        _ = sighup.recv() => {
            warn!("received SIGHUP, shutting down");
            std::process::exit(128 + 1);
        }
    }
}
