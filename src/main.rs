use actix_web::{middleware::Logger, App, HttpServer};
use order_service::{config::Config, db, routes, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().map_err(std::io::Error::other)?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "order_service=info,actix_web=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(?config, "configuration loaded");

    let pool = db::create_pool(&config)
        .await
        .map_err(std::io::Error::other)?;
    db::migrate(&pool).await.map_err(std::io::Error::other)?;
    tracing::info!("database ready");

    let state = AppState::new(pool, &config);
    let addr = config.socket_addr();
    tracing::info!(%addr, "listening");

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .configure(|cfg| routes(cfg, &state))
    })
    .bind(addr)?
    .run()
    .await
}
