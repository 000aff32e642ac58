use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tradejournal::{api, config::Config, db::init_db, LogMailer, Mailer, Repository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the environment may already be set.
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = Config::from_env().context("Configuration error")?;
    let port = config.port;

    let pool = init_db(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    let repo = Arc::new(Repository::new(pool));
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new());
    let state = api::AppState::new(repo, config, mailer).context("Invalid password hashing parameters")?;

    let app = api::create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
