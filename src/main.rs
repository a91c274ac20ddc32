use std::sync::Arc;
use std::time::Duration;

use kube::Client;
use kube_leader_election::{LeaseLock, LeaseLockParams};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use search_operator::health::{HealthState, run_health_server};
use search_operator::{run_controller, run_controller_scoped};

const LEASE_NAME: &str = "search-operator-leader";
const LEASE_TTL: Duration = Duration::from_secs(15);
const LEASE_RENEW_INTERVAL: Duration = Duration::from_secs(5);

/// Time given to in-flight reconciles after a shutdown signal
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(5);

type BoxError = Box<dyn std::error::Error>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    install_crypto_provider()?;
    init_tracing()?;

    info!("Starting search-operator");
    let client = Client::try_default().await?;

    let holder_id = env_or("POD_NAME", || {
        hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    });
    let lease_namespace = env_or("POD_NAMESPACE", || "default".to_string());
    let watch_namespace = std::env::var("WATCH_NAMESPACE")
        .ok()
        .filter(|ns| !ns.is_empty());

    // Health endpoints answer before leadership is held
    let health_state = Arc::new(HealthState::new());
    let health_handle = {
        let health_state = health_state.clone();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let lease = lease_lock(&client, &lease_namespace, &holder_id);
    info!(%holder_id, namespace = %lease_namespace, lease_name = LEASE_NAME, "Waiting to acquire leadership");
    acquire_leadership(&lease).await;
    let renewal_handle = spawn_lease_renewal(lease);

    info!(
        scope = watch_namespace.as_deref().unwrap_or("cluster-wide"),
        "Watching SearchOperator resources"
    );
    let cancel = CancellationToken::new();
    let controller_handle = {
        let health_state = health_state.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            match watch_namespace {
                Some(ns) => run_controller_scoped(client, Some(health_state), Some(&ns), cancel).await,
                None => run_controller(client, Some(health_state), cancel).await,
            }
        })
    };

    tokio::select! {
        result = controller_handle => {
            if let Err(e) = result {
                error!("Controller task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        // Renewal only returns by panicking
        Err(e) = renewal_handle => {
            error!("Lease renewal task panicked: {}", e);
        }
        _ = shutdown_signal() => {
            info!("Received shutdown signal");
            health_state.set_ready(false).await;
            // Readiness waits stop so in-flight reconciles return promptly
            cancel.cancel();
            tokio::time::sleep(SHUTDOWN_GRACE_PERIOD).await;
        }
    }

    info!("Operator stopped");
    Ok(())
}

/// Install the rustls provider, tolerating one installed earlier
fn install_crypto_provider() -> Result<(), BoxError> {
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
        && rustls::crypto::CryptoProvider::get_default().is_none()
    {
        return Err("Failed to install rustls crypto provider".into());
    }
    Ok(())
}

fn init_tracing() -> Result<(), BoxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("search_operator=info".parse()?)
                .add_directive("kube=info".parse()?)
                .add_directive("kube_leader_election=info".parse()?),
        )
        .init();
    Ok(())
}

fn env_or(key: &str, fallback: impl FnOnce() -> String) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        let value = fallback();
        warn!("{} not set, using {}", key, value);
        value
    })
}

fn lease_lock(client: &Client, namespace: &str, holder_id: &str) -> LeaseLock {
    LeaseLock::new(
        client.clone(),
        namespace,
        LeaseLockParams {
            holder_id: holder_id.to_string(),
            lease_name: LEASE_NAME.to_string(),
            lease_ttl: LEASE_TTL,
        },
    )
}

async fn acquire_leadership(lease: &LeaseLock) {
    loop {
        match lease.try_acquire_or_renew().await {
            Ok(result) if result.acquired_lease => {
                info!("Acquired leadership");
                return;
            }
            Ok(_) => info!("Another instance is leader, waiting"),
            Err(e) => warn!("Failed to acquire lease: {}, retrying", e),
        }
        tokio::time::sleep(LEASE_RENEW_INTERVAL).await;
    }
}

/// Renew the lease until it is lost, then exit so the pod re-enters election
fn spawn_lease_renewal(lease: LeaseLock) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(LEASE_RENEW_INTERVAL).await;
            match lease.try_acquire_or_renew().await {
                Ok(result) if result.acquired_lease => {}
                Ok(_) => {
                    error!("Lost leadership, shutting down");
                    std::process::exit(1);
                }
                Err(e) => {
                    error!("Failed to renew lease: {}, shutting down", e);
                    std::process::exit(1);
                }
            }
        }
    })
}

/// Wait for SIGTERM or SIGINT
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
