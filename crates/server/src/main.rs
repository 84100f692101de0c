use axum::http::{HeaderName, HeaderValue, Method};
use herald_server::{
    config::Config,
    db,
    directory::{Directory, DiscordDirectory},
    middleware::auth,
    reconcile::Dispatcher,
    routes, AppState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() {
    if std::env::args().nth(1).as_deref() == Some("generate-api-key") {
        let key = auth::generate_api_key();
        println!("API token (give to clients): {}", key.token);
        println!("API_KEY_SALT={}", key.salt);
        println!("API_KEY={}", key.hash);
        return;
    }

    // Load .env if present
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env();

    let pool = db::init_pool(&config.database_path)
        .await
        .expect("Failed to initialize database");

    let directory = Arc::new(DiscordDirectory::new(&config.discord_token));
    if let Err(e) = directory.open().await {
        tracing::error!("Discord login failed, platform calls will fail until restart: {}", e);
    }

    let state = Arc::new(AppState::new(pool.clone(), config.clone(), directory.clone()));

    let dispatcher = Arc::new(Dispatcher::new(
        pool,
        directory.clone(),
        config.dispatch_interval(),
    ));
    let dispatch = dispatcher.spawn();

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();

    let app = routes::build_router(state).layer(
        ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("authorization"),
                ])
                .allow_credentials(true),
        ),
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");

    tracing::info!("Herald server running on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received");
        })
        .await
        .expect("Server error");

    dispatch.stop().await;
    directory.close().await;
}
