use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;

use anyhow::Context;
use clap::Parser;

use tactile_beacon::app::UiRuntime;
use tactile_beacon::config::BeaconConfig;
use tactile_beacon::logging;
use tactile_beacon::platform::create_platform;
use tactile_beacon::protocol::Outbound;

/// Overlay annotations and region-click monitoring over stdin/stdout NDJSON
#[derive(Parser, Debug)]
#[command(name = "tactile-beacon", version, about)]
struct Args {
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the in-memory platform instead of the native one
    #[arg(long)]
    headless: bool,

    /// Verbose logging (RUST_LOG may override)
    #[arg(long)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.debug);

    let config = BeaconConfig::load_or_default(args.config.as_deref())
        .context("loading configuration")?;
    tracing::debug!(?config, "configuration loaded");

    let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>();
    let writer = std::thread::Builder::new()
        .name("beacon-writer".into())
        .spawn(move || {
            let stdout = std::io::stdout();
            for outbound in outbound_rx {
                let line = match outbound.to_line() {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to encode outbound message");
                        continue;
                    }
                };
                let mut out = stdout.lock();
                if writeln!(out, "{line}").and_then(|_| out.flush()).is_err() {
                    tracing::warn!("stdout closed");
                    break;
                }
            }
        })
        .context("spawning writer thread")?;

    // The runtime, and with it every overlay, stays on the main thread
    let platform = create_platform(args.headless, &config);
    let runtime = UiRuntime::new(platform, &config, outbound_tx);
    let handle = runtime.handle();

    std::thread::Builder::new()
        .name("beacon-reader".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read stdin");
                        break;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                if !handle.submit_line(&line) {
                    break;
                }
            }
            tracing::info!("stdin closed, shutting down");
            handle.shutdown();
        })
        .context("spawning reader thread")?;

    runtime.run();

    if writer.join().is_err() {
        tracing::error!("writer thread panicked");
    }
    Ok(())
}
