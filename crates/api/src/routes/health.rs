use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(healthz))
}

/// Liveness plus the number of tracked alerts.
async fn healthz(State(state): State<AppState>) -> Json<Value> {
    let alerts = state.monitor.store().len().await;
    Json(json!({
        "status": "ok",
        "alerts": alerts,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::{app, send, FixedSource};

    #[tokio::test]
    async fn reports_ok_and_alert_count() {
        let app = app(FixedSource::default()).await;
        let (status, body) = send(&app, "GET", "/healthz", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok", "alerts": 0 }));
    }
}
