//! MultiWindow Pilot detection server: entry point.
//!
//! Answers health, find-target and batch-find requests from the engine over
//! JSON-over-WebSocket.  Recognition results come from annotation files an
//! external recognizer writes next to each spooled frame.
//!
//! # Usage
//!
//! ```text
//! mwp-detect-server [OPTIONS]
//!
//! Options:
//!   --bind      <IP>     Address to listen on          [default: 127.0.0.1]
//!   --port      <PORT>   WebSocket port                [default: 24850]
//!   --threshold <0..1>   Minimum confidence for found  [default: 0.8]
//!   --suffix    <EXT>    Annotation file suffix        [default: .detections.json]
//!   --log-level <LEVEL>  Fallback when RUST_LOG unset  [default: info]
//! ```
//!
//! | Variable              | Flag          |
//! |-----------------------|---------------|
//! | `MWP_DETECT_BIND`     | `--bind`      |
//! | `MWP_DETECT_PORT`     | `--port`      |
//! | `MWP_DETECT_THRESHOLD`| `--threshold` |
//! | `MWP_DETECT_SUFFIX`   | `--suffix`    |
//! | `MWP_LOG_LEVEL`       | `--log-level` |

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mwp_detect_server::application::DetectService;
use mwp_detect_server::domain::config::{ServerConfig, DEFAULT_PORT};
use mwp_detect_server::infrastructure::annotations::DEFAULT_SUFFIX;
use mwp_detect_server::infrastructure::{run_server, AnnotationMatcher};

#[derive(Debug, Parser)]
#[command(
    name = "mwp-detect-server",
    about = "Standalone detection service for MultiWindow Pilot",
    version
)]
struct Cli {
    /// IP address to bind.  Keep loopback unless the engine runs elsewhere
    /// and shares the spool directory.
    #[arg(long, default_value = "127.0.0.1", env = "MWP_DETECT_BIND")]
    bind: String,

    #[arg(long, default_value_t = DEFAULT_PORT, env = "MWP_DETECT_PORT")]
    port: u16,

    /// Minimum confidence for a candidate to be reported as found.
    #[arg(long, default_value_t = 0.8, env = "MWP_DETECT_THRESHOLD")]
    threshold: f32,

    /// Suffix appended to an image path to find its annotation file.
    #[arg(long, default_value = DEFAULT_SUFFIX, env = "MWP_DETECT_SUFFIX")]
    suffix: String,

    #[arg(long, default_value = "info", env = "MWP_LOG_LEVEL")]
    log_level: String,
}

impl Cli {
    /// # Errors
    ///
    /// Fails on an unparsable bind address or a threshold outside `[0, 1]`.
    fn into_server_config(&self) -> anyhow::Result<ServerConfig> {
        let bind_addr: SocketAddr = format!("{}:{}", self.bind, self.port)
            .parse()
            .with_context(|| format!("invalid bind address: '{}:{}'", self.bind, self.port))?;
        if !(0.0..=1.0).contains(&self.threshold) {
            anyhow::bail!("threshold must be within [0, 1], got {}", self.threshold);
        }
        Ok(ServerConfig {
            bind_addr,
            threshold: self.threshold,
            ..ServerConfig::default()
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .init();

    let config = cli.into_server_config()?;
    info!(
        "detection server starting: bind={}, threshold={}, suffix={}",
        config.bind_addr, config.threshold, cli.suffix
    );

    let matcher = Arc::new(AnnotationMatcher::with_suffix(cli.suffix.clone()));
    let service = DetectService::new(matcher, config.threshold);

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, shutting down");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("failed to listen for Ctrl+C signal: {e}"),
        }
    });

    run_server(config, service, running).await?;

    info!("detection server stopped");
    Ok(())
}
