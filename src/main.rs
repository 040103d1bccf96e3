//! nutwake entry point: CLI dispatch, signal handlers, async runtime.

mod app;
mod clock;
mod config;
mod daemon;
mod monitor;
mod state;
mod system;

use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use app::cli::{Args, HELP_TEXT};
use app::logging::{filter_for_level, init_tracing, reload_level, VALID_LEVELS};
use clock::{Clock, SystemClock};
use config::persistence::{load_config, load_log_level};
use daemon::status::{run_health_check, run_ups_test, show_status};
use daemon::{Collaborators, PowerEventLoop};
use monitor::{ArpMacResolver, NutUpsMonitor, PingChecker, UdpWolSender};
use state::{ClientStateTracker, JsonFileStore};

/// Resolves on Ctrl+C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("Shutdown signal received (Ctrl+C)"),
                    _ = sigterm.recv() => info!("Shutdown signal received (SIGTERM)"),
                }
                return;
            }
            Err(e) => warn!("Failed to install SIGTERM handler: {}", e),
        }
    }

    tokio::signal::ctrl_c().await.ok();
    info!("Shutdown signal received (Ctrl+C)");
}

/// Re-read the log level from the config file on every SIGHUP.
#[cfg(unix)]
fn spawn_log_level_reloader(config_path: Option<String>) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sighup = match signal(SignalKind::hangup()) {
        Ok(s) => s,
        Err(e) => {
            warn!("Failed to setup SIGHUP handler: {}", e);
            return;
        }
    };

    tokio::spawn(async move {
        loop {
            sighup.recv().await;
            info!("SIGHUP received, reloading log level configuration");

            match load_log_level(config_path.as_deref()).await {
                Ok(level) => {
                    let filter = filter_for_level(&level).unwrap_or("info");
                    match reload_level(filter) {
                        Ok(_) => info!("Log level reloaded: {}", level.to_uppercase()),
                        Err(e) => error!("Failed to reload log level: {}", e),
                    }
                }
                Err(e) => error!("Failed to reload config: {:#}", e),
            }
        }
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            if err.kind() == clap::error::ErrorKind::DisplayHelp {
                print!("{}", HELP_TEXT);
                std::process::exit(0);
            }
            if err.kind() == clap::error::ErrorKind::DisplayVersion {
                println!("\x1b[32mnutwake {} ({})\x1b[0m", env!("CARGO_PKG_VERSION"), std::env::consts::ARCH);
                std::process::exit(0);
            }

            eprintln!("{}", err);
            eprintln!();
            print!("{}", HELP_TEXT);
            std::process::exit(1);
        }
    };

    let config_path = args.config.as_deref();

    // Commands that do not need the logger
    if args.status {
        return show_status(config_path, args.state_file.as_deref()).await;
    }

    // Priority: 1. --log-level flag, 2. LOG_LEVEL env, 3. config file, 4. default (info)
    let requested_level = match args.log_level.clone().or_else(|| std::env::var("LOG_LEVEL").ok()) {
        Some(level) => level,
        None => load_log_level(config_path).await.unwrap_or_else(|_| "info".to_string()),
    };
    let filter = filter_for_level(&requested_level).unwrap_or_else(|| {
        eprintln!("Invalid log level '{}'. Using INFO. Valid levels: {}", requested_level, VALID_LEVELS);
        "info"
    });
    init_tracing(filter);

    if args.check {
        return run_health_check(config_path, args.state_file.as_deref()).await;
    }

    if args.test {
        return run_ups_test(config_path).await;
    }

    let mut config = match load_config(config_path, &ArpMacResolver).await {
        Ok(c) => c,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };
    if let Some(state_file) = args.state_file.as_deref() {
        config.state_file = state_file.into();
    }

    if args.show_config {
        println!("\n{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("nutwake v{} started. Monitoring UPS: {}", env!("CARGO_PKG_VERSION"), config.nut.ups);

    let config = Arc::new(config);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store = JsonFileStore::new(config.state_file.clone());
    info!("Using state file: {:?}", store.path());
    let tracker = ClientStateTracker::new(&config.clients, Box::new(store), clock.clone());

    let io = Collaborators {
        ups: Arc::new(NutUpsMonitor::new(&config.nut)),
        checker: Arc::new(PingChecker),
        wol: Arc::new(UdpWolSender::new()),
    };

    #[cfg(unix)]
    spawn_log_level_reloader(args.config.clone());

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = stop_tx.send(());
    });

    let mut power_loop = PowerEventLoop::new(Arc::clone(&config), tracker, io, clock);
    power_loop
        .run(async {
            let _ = stop_rx.await;
        })
        .await;

    let pending = power_loop.pending_down();
    if !pending.is_empty() {
        warn!("Stopped during restoration ({:?}) with {} client(s) still down; the cycle resumes on next start",
            power_loop.state(), pending.len());
    }

    info!("nutwake shutdown complete");
    Ok(())
}
