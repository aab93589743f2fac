use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::AppState;
use crate::aggregator;
use crate::auth;
use crate::models::metrics::{AddValueRequest, MetricPreference, SavePreferenceEntry};
use crate::resolver;
use crate::store::{self, PreferenceWriteError};

const NOT_YOURS: &str = "Client not found or you do not have access";

/// The metric catalog, for preference editors that need the full list.
pub async fn list_definitions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    auth::require_user(&state, &headers, "view metrics")?;
    let definitions = state
        .store
        .list_metric_definitions()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(serde_json::json!({ "definitions": definitions })))
}

/// The full dashboard payload for one client: the latest-value summary
/// strip plus the historical series, both in the client's display order.
pub async fn get_client_metrics(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "view metrics")?;
    let owned = state
        .store
        .client_owned_by(&client_id, &user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if !owned {
        return Err((StatusCode::NOT_FOUND, NOT_YOURS.to_string()));
    }

    let definitions = state.store.list_metric_definitions().map_err(|e| {
        tracing::error!("metric catalog read failed: {e}");
        (
            StatusCode::BAD_REQUEST,
            "Failed to load metric definitions".to_string(),
        )
    })?;
    // a failed preference read degrades to the alphabetical fallback
    let preferences = state.store.list_preferences(&client_id).unwrap_or_else(|e| {
        tracing::warn!(client_id = %client_id, "preference read failed: {e}");
        Vec::new()
    });

    let ranked = resolver::resolve_metrics(&definitions, &preferences);
    let (metrics_data, metrics_historical_data) =
        aggregator::aggregate(&client_id, &ranked, state.store.as_ref()).await;

    Ok(Json(serde_json::json!({
        "metricsData": metrics_data,
        "metricsHistoricalData": metrics_historical_data,
    })))
}

/// Replace the client's preference set with the submitted order.
pub async fn save_metric_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "update metrics")?;
    let owned = state
        .store
        .client_owned_by(&client_id, &user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if !owned {
        return Err((StatusCode::NOT_FOUND, NOT_YOURS.to_string()));
    }

    let invalid = || {
        (
            StatusCode::BAD_REQUEST,
            "Invalid metrics data provided".to_string(),
        )
    };
    let entries = body
        .get("metricsToSave")
        .and_then(|value| value.as_array())
        .ok_or_else(invalid)?;
    let entries: Vec<SavePreferenceEntry> =
        serde_json::from_value(serde_json::Value::Array(entries.clone())).map_err(|_| invalid())?;

    let rows: Vec<MetricPreference> = entries
        .iter()
        .map(|entry| MetricPreference {
            metric_id: entry.id,
            display_order: entry.display_order,
            is_visible: entry.is_visible,
        })
        .collect();

    state
        .store
        .replace_preferences(&client_id, &rows)
        .map_err(|e| match e {
            PreferenceWriteError::DeleteFailed(_) => (
                StatusCode::BAD_REQUEST,
                "Failed to delete existing preferences".to_string(),
            ),
            PreferenceWriteError::InsertFailed(_) => (
                StatusCode::BAD_REQUEST,
                "Failed to update preferences".to_string(),
            ),
        })?;

    Ok(Json(serde_json::json!({ "success": true })))
}

/// Append one observation for a client+metric.
pub async fn add_metric_value(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((client_id, metric_id)): Path<(String, i64)>,
    Json(req): Json<AddValueRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "record metrics")?;
    let owned = state
        .store
        .client_owned_by(&client_id, &user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if !owned {
        return Err((StatusCode::NOT_FOUND, NOT_YOURS.to_string()));
    }

    let id = uuid::Uuid::new_v4().to_string();
    let recorded_at = req.recorded_at.unwrap_or_else(store::now_utc);
    state
        .store
        .insert_value(&id, &client_id, metric_id, req.value, &recorded_at)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(serde_json::json!({ "success": true })))
}
