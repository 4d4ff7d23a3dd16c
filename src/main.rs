use summary_stream::handlers::create_app_router;
use summary_stream::init::app_init;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("🚀 Starting summary stream server...");
    let (config, state) = app_init().await?;
    log::info!("✅ Application state initialized");
    let app = create_app_router(state);

    // Start server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    log::info!("");
    log::info!("🎉 Server started!");
    log::info!("📍 http://{}", addr);
    log::info!("📡 Summarize: http://{}/api/summarize", addr);
    log::info!("❤️  Health: http://{}/health", addr);
    log::info!("");
    log::info!("🤖 Backend: {}", config.backend);
    if config.backend == summary_stream::backends::BackendKind::Ollama {
        log::info!("🔌 Ollama: {} ({})", config.ai.url, config.ai.model);
    }
    log::info!("⏱️  Fragment delay: {:?}", config.fragment_delay);
    log::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
