use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use serde_json::json;
use tracing::{error, info};

use crate::error::Result;
use crate::ingest;
use crate::models::EmailPayload;
use crate::notify::{self, Telegram};
use crate::settings::Settings;

pub struct AppState {
    pub pool: Pool<SqliteConnectionManager>,
    pub api_key: String,
    pub telegram: Telegram,
    pub chat_id: String,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ingest", post(handle_ingest))
        .with_state(state)
}

pub async fn serve(settings: &Settings) -> Result<()> {
    let db_path = PathBuf::from(&settings.data_dir).join("dompet.db");
    let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")
    });
    let pool = Pool::new(manager)?;

    let state = Arc::new(AppState {
        pool,
        api_key: settings.ingest_api_key.clone(),
        telegram: Telegram::new(settings.telegram_bot_token.clone()),
        chat_id: settings.telegram_chat_id.clone(),
    });

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr).await?;
    info!(addr = %settings.bind_addr, "ingest server listening");
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}

/// Exact-match key comparison. An empty configured key locks the
/// endpoint rather than opening it.
fn api_key_matches(configured: &str, presented: Option<&str>) -> bool {
    !configured.is_empty() && presented == Some(configured)
}

async fn handle_ingest(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<EmailPayload>,
) -> Response {
    let presented = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    if !api_key_matches(&state.api_key, presented) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid api key" })),
        )
            .into_response();
    }

    let conn = match state.pool.get() {
        Ok(conn) => conn,
        Err(e) => {
            error!(error = %e, "connection pool exhausted");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "storage unavailable" })),
            )
                .into_response();
        }
    };

    match ingest::ingest_email(&conn, &payload) {
        Ok(result) => {
            if let Some(notification) = result.notification {
                let telegram = state.telegram.clone();
                let chat_id = state.chat_id.clone();
                tokio::spawn(async move {
                    notify::notify_pending(&telegram, &chat_id, &notification).await;
                });
            }
            (StatusCode::OK, Json(json!(result.outcome))).into_response()
        }
        Err(e) => {
            error!(gmail_message_id = %payload.gmail_message_id, error = %e, "ingestion failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": e.to_string() })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        let manager = SqliteConnectionManager::file(dir.path().join("test.db"));
        let pool = Pool::new(manager).unwrap();
        crate::db::init_db(&pool.get().unwrap()).unwrap();
        let state = Arc::new(AppState {
            pool,
            api_key: "secret".to_string(),
            telegram: Telegram::new(""),
            chat_id: String::new(),
        });
        (dir, state)
    }

    fn ingest_request(key: Option<&str>, message_id: &str) -> Request<Body> {
        let payload = serde_json::json!({
            "gmail_message_id": message_id,
            "subject": "Receipt from Gojek",
            "text_body": "Pembayaran Rp 25.000 via OVO",
            "from_email": "no-reply@gojek.com",
        });
        let mut builder = Request::builder()
            .method("POST")
            .uri("/ingest")
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(payload.to_string())).unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_wrong_key_gets_401_and_persists_nothing() {
        let (_dir, state) = test_state();
        let router = build_router(state.clone());

        let response = router
            .oneshot(ingest_request(Some("wrong"), "m-1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert!(body["error"].is_string());

        let raw_count: i64 = state
            .pool
            .get()
            .unwrap()
            .query_row("SELECT count(*) FROM raw_emails", [], |r| r.get(0))
            .unwrap();
        assert_eq!(raw_count, 0);
    }

    #[tokio::test]
    async fn test_ingest_roundtrip_then_deduped_redelivery() {
        let (_dir, state) = test_state();
        let router = build_router(state);

        let first = router
            .clone()
            .oneshot(ingest_request(Some("secret"), "m-http"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let first = body_json(first).await;
        assert_eq!(first["deduped"], false);
        assert!(first["raw_email_id"].is_i64());
        assert!(first["transaction_id"].is_i64());

        let second = router
            .oneshot(ingest_request(Some("secret"), "m-http"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::OK);
        let second = body_json(second).await;
        assert_eq!(second["deduped"], true);
        assert_eq!(second["raw_email_id"], first["raw_email_id"]);
        assert_eq!(second["transaction_id"], first["transaction_id"]);
    }

    #[test]
    fn test_api_key_exact_match() {
        assert!(api_key_matches("secret", Some("secret")));
        assert!(!api_key_matches("secret", Some("Secret")));
        assert!(!api_key_matches("secret", Some("secret ")));
        assert!(!api_key_matches("secret", None));
    }

    #[test]
    fn test_empty_configured_key_rejects_everything() {
        assert!(!api_key_matches("", Some("")));
        assert!(!api_key_matches("", None));
    }
}
