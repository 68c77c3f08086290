use game_maker_backend::{
    config::{get_config, init_config},
    routes,
    telemetry::init_tracing,
    AppState,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    init_config()?;
    let config = get_config().clone();

    if config.llm.api_key.is_empty() {
        tracing::warn!("LLM_API_KEY is not set, generation requests will be rejected by the provider");
    }

    let addr: SocketAddr = config.server_address.parse()?;
    info!(
        %addr,
        model = %config.llm.model_name,
        chapters = config.chapters.len(),
        "Starting {} v{}",
        config.app_name,
        config.version
    );

    let app = routes::router(AppState::new(config)?);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
