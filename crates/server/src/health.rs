use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use threadmind_db::DbPool;
use threadmind_slack::{EventQueue, WorkerState};
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    pub db_pool: Option<DbPool>,
    pub queue: EventQueue,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: HealthCheck,
    pub worker: HealthCheck,
    pub pending_events: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(bind_address = %address, "health endpoint started");

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(error = %error, "health endpoint server terminated unexpectedly");
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let database = match &state.db_pool {
        Some(pool) => database_check(pool).await,
        None => HealthCheck { status: "ready", detail: "feedback database disabled".to_string() },
    };
    let worker = worker_check(state.queue.state());
    let ready = database.status == "ready" && worker.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        database,
        worker,
        pending_events: state.queue.pending(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn database_check(pool: &DbPool) -> HealthCheck {
    match threadmind_db::ping(pool).await {
        Ok(()) => HealthCheck { status: "ready", detail: "database query succeeded".to_string() },
        Err(error) => {
            HealthCheck { status: "degraded", detail: format!("database query failed: {error}") }
        }
    }
}

fn worker_check(state: WorkerState) -> HealthCheck {
    let status = if state == WorkerState::Running { "ready" } else { "degraded" };
    HealthCheck { status, detail: format!("event worker {}", state.as_str()) }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use threadmind_db::connect_with_settings;
    use threadmind_slack::EventQueue;

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_returns_ready_when_database_and_worker_are_up() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        let (queue, _receiver) = EventQueue::new();

        let (status, Json(payload)) =
            health(State(HealthState { db_pool: Some(pool.clone()), queue })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.database.status, "ready");
        assert_eq!(payload.worker.detail, "event worker running");
        assert_eq!(payload.pending_events, 0);

        pool.close().await;
    }

    #[tokio::test]
    async fn health_is_degraded_when_the_database_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool should connect");
        pool.close().await;
        let (queue, _receiver) = EventQueue::new();

        let (status, Json(payload)) = health(State(HealthState { db_pool: Some(pool), queue })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.database.status, "degraded");
        assert_eq!(payload.worker.status, "ready");
    }

    #[tokio::test]
    async fn health_is_degraded_once_the_worker_drains() {
        let (queue, _receiver) = EventQueue::new();
        queue.close();

        let (status, Json(payload)) = health(State(HealthState { db_pool: None, queue })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.database.detail, "feedback database disabled");
        assert_eq!(payload.worker.detail, "event worker draining");
        assert_eq!(payload.pending_events, 1);
    }
}
