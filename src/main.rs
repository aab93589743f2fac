use axum::{Router, routing::get, routing::post};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use trainer_api::AppState;
use trainer_api::config::TrainerConfig;
use trainer_api::handlers;
use trainer_api::store::Store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("trainer_api=debug,tower_http=debug")
        }))
        .init();

    let config_path =
        std::env::var("TRAINER_CONFIG").unwrap_or_else(|_| "trainer.toml".to_string());
    let config = TrainerConfig::load(&config_path)?;

    let db_path = std::env::var("TRAINER_DB").unwrap_or_else(|_| config.database.path.clone());
    let store = Arc::new(Store::open(&db_path)?);
    tracing::info!("store opened at {db_path}");

    let state = AppState {
        store,
        auth: config.auth.clone(),
    };

    let app = Router::new()
        // Auth
        .route("/api/v1/auth/register", post(handlers::auth::register))
        .route("/api/v1/auth/login", post(handlers::auth::login))
        .route("/api/v1/auth/signout", post(handlers::auth::signout))
        .route("/api/v1/auth/user", get(handlers::auth::current_user))
        // Client roster
        .route(
            "/api/v1/clients",
            get(handlers::clients::list_clients).post(handlers::clients::create_client),
        )
        .route(
            "/api/v1/clients/{id}",
            get(handlers::clients::get_client)
                .patch(handlers::clients::update_client)
                .delete(handlers::clients::delete_client),
        )
        // Per-client metrics: dashboard payload and preference saves
        .route(
            "/api/v1/clients/{id}/metrics",
            get(handlers::metrics::get_client_metrics)
                .post(handlers::metrics::save_metric_preferences),
        )
        .route(
            "/api/v1/clients/{id}/metrics/{metric_id}",
            post(handlers::metrics::add_metric_value),
        )
        // Metric catalog
        .route(
            "/api/v1/metric-definitions",
            get(handlers::metrics::list_definitions),
        )
        // Exercise library
        .route(
            "/api/v1/exercises",
            get(handlers::exercises::list_exercises).post(handlers::exercises::create_exercise),
        )
        .route(
            "/api/v1/exercises/{id}",
            get(handlers::exercises::get_exercise)
                .put(handlers::exercises::update_exercise)
                .delete(handlers::exercises::delete_exercise),
        )
        // Filter option lookups
        .route("/api/v1/body-parts", get(handlers::exercises::list_body_parts))
        .route(
            "/api/v1/muscle-groups",
            get(handlers::exercises::list_muscle_groups),
        )
        .route("/api/v1/equipment", get(handlers::exercises::list_equipment))
        // Health
        .route("/healthz", get(handlers::health::healthz))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("trainer-api listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
