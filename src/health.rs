use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::db::Database;

type AppState = Arc<Mutex<Database>>;

pub fn router(db: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .with_state(db)
}

/// Sobe o servidor de health-check (usado pelo host para saber se o bot está vivo).
pub async fn serve(db: AppState, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Health server listening");
    axum::serve(listener, router(db)).await?;
    Ok(())
}

// ── GET / ───────────────────────────────────────────────────────────────

async fn index() -> &'static str {
    "Bragfy bot is running"
}

// ── GET /health ─────────────────────────────────────────────────────────

async fn health(State(db): State<AppState>) -> (StatusCode, Json<Value>) {
    let stats = match db.lock() {
        Ok(db) => db.stats(),
        Err(_) => {
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "error": "database lock poisoned" })),
            )
        }
    };

    match stats {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "status": "ok",
                "users": stats.users,
                "activities": stats.activities,
            })),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "error": e.to_string() })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    fn state() -> AppState {
        let db = Database::init(":memory:").unwrap();
        let user = db.upsert_user(1, "Ana", None, None).unwrap();
        db.create_activity(
            user.id,
            "deploy",
            chrono::NaiveDate::from_ymd_opt(2026, 3, 5)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
        )
        .unwrap();
        Arc::new(Mutex::new(db))
    }

    #[tokio::test]
    async fn test_health_reports_counts() {
        let resp = router(state())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "ok");
        assert_eq!(v["users"], 1);
        assert_eq!(v["activities"], 1);
    }

    #[tokio::test]
    async fn test_health_unavailable_when_lock_poisoned() {
        let db = state();
        let held = db.clone();
        let _ = std::thread::spawn(move || {
            let _guard = held.lock().unwrap();
            panic!("worker died holding the database");
        })
        .join();
        assert!(db.is_poisoned());

        let resp = router(db)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let v: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(v["status"], "error");
    }

    #[tokio::test]
    async fn test_index() {
        let resp = router(state())
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
