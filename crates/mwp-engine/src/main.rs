//! MultiWindow Pilot engine: entry point.
//!
//! Finds the configured application windows, runs one control loop per
//! window, and stops cleanly on Ctrl+C in the console or on the global stop
//! hotkey (`engine.stop_hotkey`, default Ctrl+Q, any window focused).
//!
//! # Usage
//!
//! ```text
//! mwp-engine [OPTIONS]
//!
//! Options:
//!   --config <PATH>      Config file [default: platform config dir]
//!   --dry-run            Simulated windows, detector and input
//!   --log-level <LEVEL>  Overrides engine.log_level from the config
//! ```
//!
//! | Variable          | Description                                  |
//! |-------------------|----------------------------------------------|
//! | `MWP_CONFIG`      | Same as `--config`                           |
//! | `MWP_DRY_RUN`     | Same as `--dry-run`                          |
//! | `MWP_LOG_LEVEL`   | Same as `--log-level`                        |
//! | `RUST_LOG`        | Full `tracing` filter, wins over both above  |
//!
//! On anything but Windows the engine always runs dry.
//!
//! # Architecture overview
//!
//! ```text
//! Coordinator  (rescans windows, owns the registry table)
//!   └─ ControlLoop per window   Scanning → EventPending → Responding
//!        ├─ Observation         capture + detector, reopened after faults
//!        └─ InjectionChain      5 strategies, #4 behind the PointerArbiter
//! StatusBus → logged here
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use mwp_core::{Detection, Rect, StrategyKind, WindowHandle, WindowId};
use tokio::sync::{broadcast, watch};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use mwp_engine::application::arbiter::PointerArbiter;
use mwp_engine::application::control_loop::LoopContext;
use mwp_engine::application::coordinator::Coordinator;
use mwp_engine::application::inject::{InjectionChain, InjectionStrategy};
use mwp_engine::application::observe::ObservationFactory;
use mwp_engine::application::status::{StatusBus, StatusEvent, StatusKind};
use mwp_engine::application::window_registry::WindowRegistry;
use mwp_engine::infrastructure::hotkey::{watch_stop_hotkey, KeyStateReader};
use mwp_engine::infrastructure::injection::mock::{AttemptLog, MockStrategy};
use mwp_engine::infrastructure::observation::{CaptureBackend, ConfiguredObservationFactory, DetectorBackend};
use mwp_engine::infrastructure::storage::config::{config_file_path, load_config, AppConfig};
use mwp_engine::infrastructure::window_registry::simulated::SimulatedWindowRegistry;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// MultiWindow Pilot engine.
#[derive(Debug, Parser)]
#[command(
    name = "mwp-engine",
    about = "Drives several application windows at once without focusing them",
    version
)]
struct Cli {
    /// Path of the TOML config file.
    #[arg(long, env = "MWP_CONFIG")]
    config: Option<PathBuf>,

    /// Use simulated windows, detections and input instead of the OS.
    #[arg(long, env = "MWP_DRY_RUN")]
    dry_run: bool,

    /// `tracing` level when `RUST_LOG` is unset.
    #[arg(long, env = "MWP_LOG_LEVEL")]
    log_level: Option<String>,
}

/// Everything the coordinator needs, built from config.
struct Wiring {
    registry: Arc<dyn WindowRegistry>,
    strategies: Vec<Arc<dyn InjectionStrategy>>,
    observations: Arc<dyn ObservationFactory>,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => config_file_path().context("no --config given and no platform config directory")?,
    };
    let config = load_config(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let level = cli.log_level.clone().unwrap_or_else(|| config.engine.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level)))
        .init();

    let settings = config.to_loop_settings().context("invalid configuration")?;
    let stop_hotkey = config.stop_hotkey().context("invalid configuration")?;

    let dry_run = cli.dry_run || !cfg!(target_os = "windows");
    if !cli.dry_run && dry_run {
        warn!("native adapters are Windows-only; running with simulated windows");
    }
    info!(config = %config_path.display(), dry_run, "MultiWindow Pilot engine starting");

    let arbiter = PointerArbiter::new();
    let wiring = if dry_run {
        simulated_wiring(&config, &arbiter)
    } else {
        native_wiring(&config, &arbiter)?
    };

    let chain = InjectionChain::new(wiring.strategies);
    info!(strategies = ?chain.kinds(), "injection chain ready");

    let bus = StatusBus::new();
    tokio::spawn(log_status(bus.subscribe()));

    let ctx = LoopContext {
        registry: wiring.registry,
        chain,
        observations: wiring.observations,
        bus,
        settings: Arc::new(settings),
    };
    let coordinator = Coordinator::new(ctx, arbiter, config.rescan_interval());

    // ── Graceful shutdown ─────────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    let stop_tx = Arc::new(stop_tx);
    let ctrl_c_stop = Arc::clone(&stop_tx);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, stopping all control loops");
                ctrl_c_stop.send_replace(true);
            }
            Err(e) => error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });
    match stop_hotkey {
        Some(hotkey) => {
            info!(%hotkey, "press the stop hotkey in any window to stop");
            tokio::spawn(watch_stop_hotkey(hotkey, key_state_reader(), Arc::clone(&stop_tx)));
        }
        None => info!("stop hotkey disabled"),
    }

    let confirmation = coordinator.run(stop_rx).await;

    info!(joined = confirmation.joined, "MultiWindow Pilot engine stopped");
    Ok(())
}

// ── Wiring ────────────────────────────────────────────────────────────────────

fn simulated_wiring(config: &AppConfig, arbiter: &PointerArbiter) -> Wiring {
    let sim = &config.simulation;
    let registry = SimulatedWindowRegistry::new();
    for i in 0..sim.windows {
        let offset = 40 * i as i32;
        registry.open(WindowHandle::new(
            WindowId(0x1000 + u64::from(i)),
            Rect::new(offset, offset, sim.width, sim.height),
            format!("Simulated window {}", i + 1),
            "simulated.exe",
        ));
    }

    let hit = Detection::new(
        sim.detection_label.clone(),
        0.95,
        Rect::new((sim.width / 3) as i32, (sim.height / 3) as i32, 24, 24),
    );
    let observations = ConfiguredObservationFactory::new(
        CaptureBackend::Blank,
        DetectorBackend::Simulated {
            every: sim.detection_every,
            detection: Some(hit),
        },
    );

    // The simulated chain mirrors an unelevated desktop: no privileged
    // delivery, window messages accepted.
    let log = AttemptLog::default();
    let strategies: Vec<Arc<dyn InjectionStrategy>> = vec![
        Arc::new(MockStrategy::failing(StrategyKind::PrivilegedLowLevel, log.clone())),
        Arc::new(MockStrategy::succeeding(StrategyKind::WindowMessage, log.clone())),
        Arc::new(
            MockStrategy::succeeding(StrategyKind::TargetedSynthetic, log.clone())
                .with_pointer_arbiter(arbiter.clone()),
        ),
        Arc::new(
            MockStrategy::succeeding(StrategyKind::ExclusiveRealDevice, log.clone()).with_arbiter(arbiter.clone()),
        ),
        Arc::new(MockStrategy::succeeding(StrategyKind::ForegroundActivation, log)),
    ];

    Wiring {
        registry: Arc::new(registry),
        strategies,
        observations: Arc::new(observations),
    }
}

#[cfg(target_os = "windows")]
fn detector_backend(config: &AppConfig) -> DetectorBackend {
    match &config.detection.service_url {
        Some(url) => DetectorBackend::Remote {
            url: url.clone(),
            timeout: std::time::Duration::from_millis(config.detection.request_timeout_ms),
        },
        None => {
            warn!("no detection.service_url configured; loops will only run their cadence");
            DetectorBackend::Simulated { every: 0, detection: None }
        }
    }
}

#[cfg(target_os = "windows")]
fn native_wiring(config: &AppConfig, arbiter: &PointerArbiter) -> anyhow::Result<Wiring> {
    use mwp_engine::infrastructure::capture::spool::FrameSpool;
    use mwp_engine::infrastructure::injection::windows::native_strategies;
    use mwp_engine::infrastructure::window_registry::NativeWindowRegistry;

    let spool = config.detection.spool_dir.clone().map(FrameSpool::new);
    let observations = ConfiguredObservationFactory::new(CaptureBackend::PrintWindow { spool }, detector_backend(config));
    Ok(Wiring {
        registry: Arc::new(NativeWindowRegistry::new(config.window_criteria())),
        strategies: native_strategies(arbiter, config.message_timeout()),
        observations: Arc::new(observations),
    })
}

#[cfg(not(target_os = "windows"))]
fn native_wiring(_config: &AppConfig, _arbiter: &PointerArbiter) -> anyhow::Result<Wiring> {
    anyhow::bail!("native window control is only available on Windows")
}

/// The physical keyboard on Windows, dry runs included.  Elsewhere nothing
/// can be sampled and the hotkey never fires.
#[cfg(target_os = "windows")]
fn key_state_reader() -> Arc<dyn KeyStateReader> {
    Arc::new(mwp_engine::infrastructure::hotkey::windows::AsyncKeyState)
}

#[cfg(not(target_os = "windows"))]
fn key_state_reader() -> Arc<dyn KeyStateReader> {
    Arc::new(mwp_engine::infrastructure::hotkey::mock::SimulatedKeyboard::default())
}

// ── Status logging ────────────────────────────────────────────────────────────

async fn log_status(mut rx: broadcast::Receiver<StatusEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => log_event(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "status logger fell behind");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn log_event(event: &StatusEvent) {
    let window = event.window;
    match &event.kind {
        StatusKind::WindowRegistered { handle } => {
            info!(%window, title = %handle.title, process = %handle.process_name, "window registered");
        }
        StatusKind::WindowRemoved => info!(%window, "window removed"),
        StatusKind::PhaseChanged { from, to } => info!(%window, ?from, ?to, "phase changed"),
        StatusKind::DetectionsFound { count, nearest } => {
            info!(%window, count, nearest = nearest.as_deref().unwrap_or("-"), "detections");
        }
        StatusKind::Injection(outcome) if outcome.is_success() => {
            debug!(%window, action = %outcome.action, via = ?outcome.succeeded_with, elapsed = ?outcome.elapsed, "injected");
        }
        StatusKind::Injection(outcome) => {
            warn!(%window, action = %outcome.action, detail = %outcome.detail(), "injection failed");
        }
        StatusKind::Fault { reason, consecutive_failures } => {
            warn!(%window, consecutive_failures, %reason, "loop faulted");
        }
        StatusKind::LoopExited { reason } => info!(%window, ?reason, "loop exited"),
        StatusKind::LoopCrashed { restarts } => error!(%window, restarts, "loop crashed"),
    }
}
