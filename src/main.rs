use std::env;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deal_digest::{create_router, AppState, Config};

const DEFAULT_LOG_FILTER: &str = "deal_digest=debug,tower_http=debug,axum::rejection=trace";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;

    tracing::info!("Starting Deal Digest analysis service");
    tracing::info!("Model: {} via {}", config.llm.model, config.llm.api_base_url);
    tracing::info!(
        "Max uploads: {} files of {}MB each",
        config.max_file_uploads,
        config.max_file_size_mb
    );
    tracing::info!("Max concurrent requests: {}", config.max_concurrent_requests);

    let addr = format!("{}:{}", config.server_host, config.bind_port());
    let state = AppState::from_config(config)?;
    let app = create_router(state);

    tracing::info!("Server listening on {}", addr);

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let json = env::var("LOG_FORMAT").map(|f| f.eq_ignore_ascii_case("json")).unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .init();
    }
}
