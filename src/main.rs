mod api_client;
mod auth;
mod bridge;
mod config;
mod domain;
mod tracker;

use std::{path::Path, sync::Arc, time::Duration};

use api_client::StudyDocsClient;
use auth::CookieCredentials;
use bridge::{ReaderBridgeApi, services::session::SessionRegistry};
use config::Config;
use poem::{
    EndpointExt, Route, Server,
    listener::TcpListener,
    middleware::{Cors, Tracing as PoemTracing},
};
use poem_openapi::OpenApiService;
use tokio_util::task::TaskTracker;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder, prelude::*};
use tracker::{resume::PageGeometry, session::SessionDeps};

type ReaderResult<T> = anyhow::Result<T>;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> ReaderResult<()> {
    // Respect RUST_LOG if set, default to info for our crate and warn for deps.
    let default_filter = format!(
        "{}=info,poem=info,reqwest=warn,h2=warn",
        env!("CARGO_PKG_NAME")
    );
    let env_filter = std::env::var("RUST_LOG").unwrap_or(default_filter);
    SubscriberBuilder::default()
        .with_env_filter(EnvFilter::new(env_filter))
        .with_target(false)
        .with_level(true)
        .pretty()
        .finish()
        .with(ErrorLayer::default())
        .init();
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        "starting StudyDocs reader bridge"
    );
    if Path::new(".env.local").exists() {
        dotenvy::from_filename(".env.local")?;
    } else if Path::new(".env").exists() {
        dotenvy::from_filename(".env")?;
    };
    let config = Config::load();
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let credentials = Arc::new(CookieCredentials::from_cookie_header(&config.cookies));
    let client = Arc::new(
        StudyDocsClient::new(&config.api_base_url, credentials.clone())?
            .with_keepalive_timeout(config.keepalive_timeout),
    );
    tracing::info!(
        api_base = %client.base_url(),
        debounce_ms = config.debounce.as_millis() as u64,
        "configured StudyDocs client"
    );

    let keepalive = TaskTracker::new();
    let deps = SessionDeps {
        sink: client.clone(),
        positions: client.clone(),
        credentials: credentials.clone(),
        keepalive: keepalive.clone(),
        quiet_window: config.debounce,
        geometry: PageGeometry::default(),
    };
    let sessions = Arc::new(SessionRegistry::new(deps));

    let sweeper = sessions.clone();
    let idle_timeout = config.session_idle_timeout;
    let idle_sweep = tokio::spawn(async move { sweeper.run_idle_sweep(idle_timeout).await });

    run_poem(client, credentials, sessions.clone(), &config.bind_addr).await?;

    idle_sweep.abort();
    let closed = sessions.close_all().await;
    keepalive.close();
    tracing::info!(closed, pending = keepalive.len(), "waiting for progress deliveries");
    let wait = config.keepalive_timeout + SHUTDOWN_GRACE;
    if tokio::time::timeout(wait, keepalive.wait()).await.is_err() {
        tracing::warn!(pending = keepalive.len(), "giving up on progress deliveries");
    }
    Ok(())
}

pub async fn run_poem(
    client: Arc<StudyDocsClient>,
    credentials: Arc<CookieCredentials>,
    sessions: Arc<SessionRegistry>,
    bind_addr: &str,
) -> ReaderResult<()> {
    let version = env!("CARGO_PKG_VERSION");
    let api = ReaderBridgeApi {
        client,
        credentials,
        sessions,
    };
    let api_service = OpenApiService::new(api, "StudyDocs Reader Bridge", version)
        .server(format!("http://{}", bind_addr));
    let ui = api_service.rapidoc();
    let spec = api_service.spec();
    let route = Route::new()
        .nest("/", api_service)
        .nest("/ui", ui)
        .nest("/spec", poem::endpoint::make_sync(move |_| spec.clone()))
        .with(Cors::new())
        .with(PoemTracing);

    tracing::info!(%bind_addr, "starting HTTP server");
    Server::new(TcpListener::bind(bind_addr))
        .run_with_graceful_shutdown(route, shutdown_signal(), Some(SHUTDOWN_GRACE))
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, unloading open sessions");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, unloading open sessions");
        }
    }
}
