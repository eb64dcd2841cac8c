use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use sinewave::{
    AppState,
    config::Config,
    router::create_router,
    store::{MemoryStore, PgStore},
};
use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    let state = match config.database_url.clone() {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .after_connect(|conn, _meta| {
                    Box::pin(async move {
                        conn.execute("SET application_name = 'sinewave_backend';")
                            .await?;
                        Ok(())
                    })
                })
                .connect(&database_url)
                .await
                .expect("Failed to connect to Postgres");

            let store = PgStore::new(pool);
            store.migrate().await.expect("Failed to apply database schema");
            tracing::info!("Using Postgres store");
            AppState::new(config.clone(), Arc::new(store))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data is kept in memory only");
            AppState::new(config.clone(), Arc::new(MemoryStore::new()))
        }
    };

    let app = create_router(state);

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        app,
    )
    .await
    .expect("Failed to start server");
}
