use framemog::server::{router, AppState};
use framemog::ServerConfig;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,axum=info,hyper=info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter)
        .init();

    let config = ServerConfig::from_env();
    info!(
        "event" = "config.loaded",
        dedupe_threshold = config.pipeline.dedupe_threshold,
        min_ranked_people = config.pipeline.min_ranked_people
    );
    let app = router(AppState::new(config.pipeline));

    let listener = match TcpListener::bind(config.listen).await {
        Ok(listener) => listener,
        Err(err) => {
            error!("event" = "server.bind_failed", addr = %config.listen, %err);
            std::process::exit(1);
        }
    };
    info!("listening" = %config.listen, "event" = "server.start");

    if let Err(err) = axum::serve(listener, app).await {
        error!(%err, "server error");
    }
}
