//! `phonelink` – phone sensor bridge entry point.
//!
//! Wires the whole pipeline together:
//!
//! 1. Loads `~/.phonelink/config.toml` (writing defaults on first run).
//! 2. Initialises tracing with an optional OpenTelemetry exporter.
//! 3. Intercepts **Ctrl-C** to signal a graceful shutdown.
//! 4. Spawns the event bus, diagnostics monitor, WebSocket egress and the
//!    ingest pump, then supervises the transport client, re-dialling the
//!    phone with a fixed delay whenever the link drops.

mod config;
mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use phonelink_middleware::{
    ConnectionState, DiagnosticsMonitor, EventBus, IngestPump, PublishSink, TransportClient,
    TransportKind, WsEgress,
};

/// Delay between supervision retries after the link drops or no transport
/// could be reached.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Raw-frame channel depth between the transport client and the ingest pump.
const FRAME_CHANNEL_CAPACITY: usize = 256;

fn main() {
    // Telemetry first: the guard must outlive the Tokio runtime so pending
    // spans are flushed after the last task finishes.
    let _telemetry = telemetry::init_tracing("phonelink");

    print_banner();

    // ── Configuration ─────────────────────────────────────────────────────
    let mut cfg = match config::load() {
        Ok(Some(cfg)) => {
            println!(
                "  Config loaded from {}",
                config::config_path().display().to_string().bold()
            );
            cfg
        }
        Ok(None) => {
            let cfg = config::Config::default();
            match config::save(&cfg) {
                Ok(()) => println!(
                    "  {} Default config written to {}",
                    "✓".green().bold(),
                    config::config_path().display().to_string().bold()
                ),
                Err(e) => println!("{}: {}", "Could not write default config".yellow(), e),
            }
            cfg
        }
        Err(e) => {
            println!("{}: {}", "Config error".red(), e);
            println!("  Using default configuration.");
            config::Config::default()
        }
    };
    // Overrides apply whether or not a config file exists yet.
    config::apply_env_overrides(&mut cfg);

    let order = match cfg.transport_order() {
        Ok(order) => order,
        Err(e) => {
            eprintln!("{}: {}", "Invalid transport configuration".red(), e);
            std::process::exit(2);
        }
    };

    println!(
        "  Bridging {} → ws://0.0.0.0:{}\n",
        cfg.endpoint.bold(),
        cfg.egress_port
    );

    // ── Ctrl-C handler ────────────────────────────────────────────────────
    // The handler gets its own sender clone; `shutdown_tx` stays alive in
    // `main` so a failed install cannot close the channel and make every
    // loop read "closed" as an immediate shutdown.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let ctrlc_tx = shutdown_tx.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        println!();
        println!(
            "{}",
            "⚠  Ctrl-C received – shutting down the bridge …".yellow().bold()
        );
        let _ = ctrlc_tx.send(true);
    }) {
        warn!(error = %e, "Failed to install Ctrl-C handler; graceful shutdown on Ctrl-C will not be available");
    }

    // The runtime is created only after `init_tracing` (see telemetry.rs).
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start async runtime".red(), e);
            std::process::exit(1);
        }
    };
    runtime.block_on(run(cfg, order, shutdown_rx));
    drop(shutdown_tx);

    println!("{}", "  ✓ Bridge stopped.".green());
}

/// Spawn the long-lived tasks and supervise the transport client until
/// shutdown.
async fn run(cfg: config::Config, order: Vec<TransportKind>, shutdown: watch::Receiver<bool>) {
    let bus = Arc::new(EventBus::default());
    let state = ConnectionState::new();
    let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);

    // Dashboard-facing event stream.
    let egress = WsEgress::new(bus.clone());
    let egress_addr = SocketAddr::from(([0, 0, 0, 0], cfg.egress_port));
    let egress_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = egress.run(egress_addr, egress_shutdown).await {
            error!(error = %e, "event stream egress failed");
        }
    });

    let sink: Arc<dyn PublishSink> = bus.clone();
    let pump = IngestPump::new(sink.clone(), &cfg.base_frame);
    let ingest = tokio::spawn(pump.run(frames_rx));

    let monitor = DiagnosticsMonitor::new(state.clone(), sink, &cfg.base_frame);
    tokio::spawn(monitor.run(shutdown.clone()));

    // ── Transport supervision ─────────────────────────────────────────────
    // `connect_and_run` walks the transport preference list exactly once;
    // the re-dial policy lives here, outside the client.
    let mut client = TransportClient::new(cfg.endpoint.clone(), state, frames_tx, shutdown.clone());
    let mut shutdown = shutdown;

    loop {
        match client.connect_and_run(&order).await {
            Ok(()) => info!("connection ended"),
            Err(e) => warn!(error = %e, "no transport reachable"),
        }
        if *shutdown.borrow() {
            break;
        }
        info!(delay_s = RETRY_DELAY.as_secs(), "re-dialling phone sensor server");
        tokio::select! {
            _ = tokio::time::sleep(RETRY_DELAY) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    // Dropping the client closes the frame channel; the pump drains what is
    // left and stops.
    drop(client);
    let _ = ingest.await;
    info!("bridge shut down");
}

// ─────────────────────────────────────────────────────────────────────────────
// Banner
// ─────────────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("{}", r#"   ___  __                    __   _       __  "#.bold().cyan());
    println!("{}", r#"  / _ \/ /  ___  ___  ___ ___/ /  (_)__  / /__"#.bold().cyan());
    println!("{}", r#" / ___/ _ \/ _ \/ _ \/ -_) _  /  / / _ \/  '_/"#.bold().cyan());
    println!("{}", r#"/_/  /_//_/\___/_//_/\__/\_,_/  /_/_//_/_/\_\ "#.bold().cyan());
    println!();
    println!(
        "  {} {}",
        "PhoneLink".bold(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
    println!("  Phone Sensor Stream Bridge");
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn run_stops_when_shutdown_is_already_signalled() {
        let cfg = config::Config {
            // A port nothing listens on: the dial fails fast and the
            // supervision loop must then honour the shutdown flag.
            endpoint: "127.0.0.1:9".to_string(),
            egress_port: 0,
            ..Default::default()
        };
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(
            Duration::from_secs(5),
            run(cfg, vec![TransportKind::Tcp], shutdown_rx),
        )
        .await
        .expect("run must exit once shutdown is signalled");
    }
}
