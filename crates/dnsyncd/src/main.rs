// # dnsyncd - dnsync daemon
//
// Thin integration layer: all reconciliation logic lives in dnsync-core.
//
// The daemon is responsible for:
// 1. Reading configuration from flags and `DNSYNC_*` environment variables
// 2. Initializing logging and the runtime
// 3. Wiring the Marathon client, the event pipeline and the Route53 provider
// 4. Running the driver until a signal or a fatal error
// 5. Serving the admin health endpoint
//
// ## Example
//
// ```bash
// export DNSYNC_HOSTED_ZONE_ID=Z0123456789
// export DNSYNC_RECORD_SET=lb.example.com
// export DNSYNC_RECORD_SET_TYPE=weighted,enumerated
//
// dnsyncd --marathon-host http://marathon.mesos:8080 --app-id marathon-lb
// ```
//
// AWS credentials come from the default provider chain.

mod admin;
mod config;

use anyhow::Result;
use clap::Parser;
use config::Config;
use dnsync_core::engine::{Driver, DriverEvent, Reconciler};
use dnsync_core::events::spawn_subscription;
use dnsync_core::traits::EventSource;
use dnsync_marathon::MarathonClient;
use dnsync_route53::Route53Provider;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (fatal reconciliation error)
#[derive(Debug, Clone, Copy)]
enum DnsyncExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<DnsyncExitCode> for ExitCode {
    fn from(code: DnsyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

fn main() -> ExitCode {
    let config = match Config::try_parse() {
        Ok(cfg) => cfg,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                DnsyncExitCode::ConfigError.into()
            } else {
                // --help and --version
                DnsyncExitCode::CleanShutdown.into()
            };
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DnsyncExitCode::ConfigError.into();
    }

    let log_level = match config.log_level() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Configuration validation error: {}", e);
            return DnsyncExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DnsyncExitCode::ConfigError.into();
    }

    info!("Starting dnsyncd");
    info!(
        "Syncing {} ({}) in zone {} with Marathon app {}",
        config.record_set,
        config.record_set_type,
        config.hosted_zone_id(),
        config.app_id
    );

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DnsyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => DnsyncExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {:#}", e);
                DnsyncExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Run the daemon until a shutdown signal or a fatal error
async fn run_daemon(config: Config) -> Result<()> {
    let cancel = CancellationToken::new();
    let driver_config = config.driver_config();

    let marathon = MarathonClient::new(&config.marathon_host)?;
    let route53 = Route53Provider::from_env().await;
    let reconciler = Reconciler::new(Box::new(route53), config.reconcile_config()?)?;

    let (mut driver, mut driver_events) = Driver::new(
        Box::new(marathon.clone()),
        reconciler,
        driver_config.clone(),
        cancel.clone(),
    )?;

    let mut tasks = Vec::new();
    let mut probe: Option<Arc<dyn EventSource>> = None;

    if config.no_events {
        info!("Event subscription disabled, updating every {}s", config.interval);
    } else {
        let source: Arc<dyn EventSource> = Arc::new(marathon.clone());
        probe = Some(Arc::clone(&source));

        let (updates, subscription) = spawn_subscription(source, &driver_config, cancel.clone());
        driver = driver.with_updates(updates);
        tasks.push(subscription);
    }

    tasks.push(tokio::spawn(async move {
        while let Some(event) = driver_events.recv().await {
            match event {
                DriverEvent::Reconciled {
                    addresses,
                    deletes,
                    upserts,
                    completed,
                } => info!(
                    addresses,
                    deletes, upserts, completed, "Reconciliation finished"
                ),
                other => debug!("Driver event: {:?}", other),
            }
        }
    }));

    let admin_addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.admin_http_port));
    let listener = tokio::net::TcpListener::bind(admin_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind admin HTTP port {}: {}", admin_addr, e))?;
    let admin = tokio::spawn(admin::serve(
        listener,
        admin::AdminState { probe },
        cancel.clone(),
    ));

    tasks.push(tokio::spawn(cancel_on_signal(cancel.clone())));

    let result = driver.run().await;

    // Stop whatever is still running, then wait for it
    cancel.cancel();
    for task in tasks {
        let _ = task.await;
    }
    match admin.await {
        Ok(Err(e)) => warn!("Admin HTTP server error: {}", e),
        Err(e) => warn!("Admin HTTP server task failed: {}", e),
        Ok(Ok(())) => {}
    }

    result?;
    info!("Shutdown complete");
    Ok(())
}

/// Cancel `cancel` on SIGTERM or SIGINT
#[cfg(unix)]
async fn cancel_on_signal(cancel: CancellationToken) {
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(term), Ok(int)) => (term, int),
            (Err(e), _) | (_, Err(e)) => {
                error!("Failed to setup signal handlers: {}", e);
                return;
            }
        };

    let received = tokio::select! {
        _ = cancel.cancelled() => return,
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };

    info!("Received shutdown signal: {}", received);
    cancel.cancel();
}

/// Cancel `cancel` on CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn cancel_on_signal(cancel: CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => {
                info!("Received shutdown signal: SIGINT");
                cancel.cancel();
            }
            Err(e) => error!("Failed to wait for CTRL-C: {}", e),
        },
    }
}
