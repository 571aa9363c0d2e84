//! # Give
//!
//! Assembles the application from settings: the store selected by
//! `database.backend`, the JWT verifier and the HTTP router.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState};
use auth_adapters::JwtVerifier;
use configs::{LogFormat, LogSettings, Settings, StoreBackend};
use domains::IdentityVerifier;
use secrecy::ExposeSecret;
use services::{RetryPolicy, VotePolicy};
use storage_adapters::MemoryStore;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let dotenv = configs::load_dotenv();
    let settings = Settings::load().context("loading settings")?;
    init_tracing(&settings.log);
    if let Some(path) = dotenv {
        debug!(path = %path.display(), "loaded .env");
    }

    let identity: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(
        settings.auth.jwt_secret.expose_secret().as_bytes(),
        settings.auth.issuer.as_deref(),
        settings.auth.audience.as_deref(),
    ));

    let policy = VotePolicy {
        unique_voters: settings.votes.unique_voters,
        retry: RetryPolicy {
            max_attempts: settings.votes.max_attempts,
            base_delay: settings.votes.base_backoff(),
            max_delay: settings.votes.max_backoff(),
        },
    };
    if !policy.unique_voters {
        warn!("voter uniqueness is off; a client retry after an unknown outcome may double count");
    }

    let state = build_state(&settings, identity, policy).await?;
    let app = router(state);

    let address = settings.server.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, backend = ?settings.database.backend, "give listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving http")?;

    info!("give stopped");
    Ok(())
}

fn init_tracing(log: &LogSettings) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.filter));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

async fn build_state(
    settings: &Settings,
    identity: Arc<dyn IdentityVerifier>,
    policy: VotePolicy,
) -> anyhow::Result<AppState> {
    match settings.database.backend {
        StoreBackend::Memory => {
            warn!("using the in-memory store; data is lost on restart");
            Ok(AppState::new(Arc::new(MemoryStore::new()), identity, policy))
        }
        #[cfg(feature = "db-postgres")]
        StoreBackend::Postgres => {
            let url = settings
                .database
                .url
                .as_ref()
                .context("database.url is required for postgres")?;
            let store = storage_adapters::PgStore::connect(
                url.expose_secret(),
                settings.database.max_connections,
                settings.database.acquire_timeout(),
            )
            .await
            .context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            info!("postgres store ready");
            Ok(AppState::new(Arc::new(store), identity, policy))
        }
        #[cfg(not(feature = "db-postgres"))]
        StoreBackend::Postgres => anyhow::bail!("built without the db-postgres feature"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("received SIGTERM, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
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
