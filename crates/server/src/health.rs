use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use slotbook_core::DialogueEngine;
use slotbook_db::{ping, DbPool};
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
    engine: Arc<DialogueEngine>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub database: HealthCheck,
    pub catalog: HealthCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool, engine: Arc<DialogueEngine>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool, engine })
}

pub async fn spawn(
    bind_address: &str,
    port: u16,
    db_pool: DbPool,
    engine: Arc<DialogueEngine>,
) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(event_name = "system.health.start", bind_address = %address, "health endpoint started");

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool, engine)).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = database_check(&state.db_pool).await;
    let catalog = catalog_check(&state.engine);
    let ready = database.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck { status: "ready", detail: "slotbook-server runtime initialized".to_string() },
        database,
        catalog,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match ping(pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => HealthCheck { status: "degraded", detail: format!("database query failed: {error}") },
    }
}

// An empty catalog keeps the bot answering, so it never degrades the overall status.
fn catalog_check(engine: &DialogueEngine) -> HealthCheck {
    let catalog = engine.catalog();
    let packages = catalog.menu_packages().len();
    let masters = catalog.active_masters().len();
    HealthCheck {
        status: if packages == 0 { "empty" } else { "ready" },
        detail: format!("{packages} packages, {masters} active masters"),
    }
}
