use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;

use common::{Alert, AlertDraft, AlertSeed, CheckData, Crossover, MaType, TriggerEvent};

use crate::{ApiError, AppState};

pub fn alerts_router() -> Router<AppState> {
    Router::new()
        .route("/api/alerts", get(list_alerts).post(create_alert))
        .route("/api/alerts/:id", delete(delete_alert))
        .route("/api/alerts/check", post(check_alerts))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct CreateAlertRequest {
    ticker: String,
    #[serde(alias = "short_p")]
    short_period: usize,
    #[serde(alias = "long_p")]
    long_period: usize,
    #[serde(default)]
    ma_type: MaType,
    /// Results the caller already computed; skips the initial fetch.
    #[serde(default)]
    check_data: Option<CheckData>,
    #[serde(default)]
    crossover: Option<Crossover>,
}

async fn create_alert(
    State(state): State<AppState>,
    Json(req): Json<CreateAlertRequest>,
) -> Result<(StatusCode, Json<Alert>), ApiError> {
    let draft = AlertDraft::new(&req.ticker, req.short_period, req.long_period, req.ma_type);
    let seed = (req.check_data.is_some() || req.crossover.is_some()).then_some(AlertSeed {
        check_data: req.check_data,
        crossover: req.crossover,
    });
    let alert = state.monitor.add_alert(draft, seed).await?;
    Ok((StatusCode::CREATED, Json(alert)))
}

// ─── Read / delete ────────────────────────────────────────────────────────────

async fn list_alerts(State(state): State<AppState>) -> Json<Vec<Alert>> {
    Json(state.monitor.list_alerts().await)
}

async fn delete_alert(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.monitor.delete_alert(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Check ────────────────────────────────────────────────────────────────────

async fn check_alerts(State(state): State<AppState>) -> Json<Vec<TriggerEvent>> {
    Json(state.monitor.check_all_now().await)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::{app, send, series, FixedSource};

    #[tokio::test]
    async fn create_list_delete() {
        let app = app(FixedSource::default()).await;

        let (status, created) = send(
            &app,
            "POST",
            "/api/alerts",
            Some(json!({
                "ticker": " msft ",
                "short_period": 10,
                "long_period": 50,
                "crossover": { "signal": 1, "date": "2024-05-02" }
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["ticker"], "MSFT");
        assert_eq!(created["ma_type"], "EMA");
        assert_eq!(created["last_crossover"]["signal"], 1);

        let (_, listed) = send(&app, "GET", "/api/alerts", None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let id = created["id"].as_str().unwrap();
        let (status, _) = send(&app, "DELETE", &format!("/api/alerts/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, "DELETE", &format!("/api/alerts/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains(id));
    }

    #[tokio::test]
    async fn inverted_pair_is_bad_request() {
        let app = app(FixedSource::default()).await;
        let (status, body) = send(
            &app,
            "POST",
            "/api/alerts",
            Some(json!({ "ticker": "AAPL", "short_p": 50, "long_p": 20 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn check_returns_fired_alerts() {
        // SMA(2) drops below SMA(3) on the final close.
        let mut source = FixedSource::default();
        source.series.insert(
            "DIP".into(),
            series("DIP", &[10.0, 11.0, 12.0, 13.0, 14.0, 9.0]),
        );
        let app = app(source).await;

        let (status, _) = send(
            &app,
            "POST",
            "/api/alerts",
            Some(json!({ "ticker": "DIP", "short_period": 2, "long_period": 3, "ma_type": "SMA" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, fired) = send(&app, "POST", "/api/alerts/check", None).await;
        assert_eq!(status, StatusCode::OK);
        let fired = fired.as_array().unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0]["ticker"], "DIP");
        assert_eq!(fired[0]["signal"], -1);
        assert_eq!(fired[0]["price"], 9.0);
    }
}
