//! Application entry point for the 2D liquid viewer.
//!
//! This binary parses the command line, sets up logging, loads the
//! simulation config and delegates all interactive logic and rendering to
//! [`Viewer`] from the `viewer` module.

mod viewer;

use std::path::PathBuf;

use clap::Parser;
use liquid_core::Config;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use viewer::Viewer;

#[derive(Parser, Debug)]
#[command(name = "liquid-view")]
#[command(about = "Interactive 2D particle liquid")]
#[command(version)]
struct Args {
    /// TOML file overriding simulation constants
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Seed for particle spawn jitter
    #[arg(short, long)]
    seed: Option<u64>,

    /// Log per-frame statistics
    #[arg(short, long)]
    verbose: bool,
}

/// Starts the native eframe application.
///
/// ### Returns
/// - `Ok(())` if the application runs to completion without errors.
/// - `Err` if eframe fails to create the native window or event loop, or the
///   simulation cannot start.
fn main() -> eframe::Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = match &args.config {
        Some(path) => Config::load(path).unwrap_or_else(|e| {
            warn!("failed to load {}: {e}, using defaults", path.display());
            Config::default()
        }),
        None => Config::default(),
    };
    info!(workers = cfg.worker_threads, max_particles = cfg.max_particles, "starting viewer");

    let options = eframe::NativeOptions::default();
    eframe::run_native(
        "2D Liquid",
        options,
        Box::new(move |_cc| Ok(Box::new(Viewer::new(cfg, args.seed)?))),
    )
}
