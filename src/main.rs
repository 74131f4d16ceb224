use polling::{config::Config, db, routes, services::token::TokenService, state::AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 0. Load .env file immediately
    // Silently ignores a missing file; real deployments set the environment directly.
    dotenvy::dotenv().ok();

    // 1. Initialize logging
    // Respects RUST_LOG, defaults to debug for this crate and tower_http.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "polling=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    // 2. Load configuration
    // Bails out on a missing JWT_SECRET or a malformed number.
    let config = Config::from_env()?;

    // 3. Initialize Sentry (if configured)
    // The guard has to live as long as main for events to be flushed.
    let _guard = sentry::init((
        config.sentry_dsn.clone(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            traces_sample_rate: 1.0,
            ..Default::default()
        },
    ));

    // 4. Install rustls crypto provider
    // Has to happen before the database connection opens TLS.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    tracing::info!("Starting polling service...");

    // 5. Token service
    // An unusable signing secret stops the process here, never per request.
    let tokens = Arc::new(TokenService::new(config.token.clone())?);

    // 6. Connect to the store
    // Postgres with migrations when DATABASE_URL is set, memory otherwise.
    let store = db::connect(config.database_url.as_deref()).await?;
    tracing::info!("Store ready");

    // 7. Build the app state and router
    let state = AppState { store, tokens };
    let app = routes::create_routes(state);

    // 8. Start the server
    // 0.0.0.0 so it binds to all interfaces (necessary in Docker).
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
