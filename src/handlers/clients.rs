use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::AppState;
use crate::auth;
use crate::models::client::*;
use crate::models::metrics::MetricPreference;
use crate::store;

const NOT_YOURS: &str = "Client not found or you do not have access";

/// Compact age for the roster table: `3d`, `2m`, `1y`. Anything under a
/// day renders as `1d`.
fn format_time_ago(timestamp: &str) -> String {
    let Ok(then) = chrono::DateTime::parse_from_rfc3339(timestamp) else {
        return String::new();
    };
    let days = (chrono::Utc::now() - then.with_timezone(&chrono::Utc))
        .num_days()
        .abs();
    if days == 0 {
        "1d".to_string()
    } else if days < 30 {
        format!("{days}d")
    } else if days < 365 {
        format!("{}m", days / 30)
    } else {
        format!("{}y", days / 365)
    }
}

fn to_entry(client: Client) -> ClientEntry {
    ClientEntry {
        demo: client.name.contains("Demo"),
        last_activity: format_time_ago(&client.updated_at),
        id: client.id,
        name: client.name,
        last_training7d: client.last_training_completion,
        last_training30d: client.last_training_30d_completion,
        last_tasks7d: client.last_task_completion,
        category: client.client_type,
        status: client.status,
        avatar: client.avatar_url,
    }
}

pub async fn list_clients(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ClientListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "view clients")?;
    let rows = state
        .store
        .list_clients(&user.id, &query)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    let clients: Vec<ClientEntry> = rows.into_iter().map(to_entry).collect();
    Ok(Json(serde_json::json!({ "clients": clients })))
}

pub async fn create_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateClientRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "create a client")?;

    let now = store::now_utc();
    let client = Client {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: user.id,
        name: format!("{} {}", req.first_name, req.last_name),
        first_name: req.first_name,
        last_name: req.last_name,
        email: req.email,
        client_type: req.client_type.unwrap_or_else(|| "Online".to_string()),
        status: "Connected".to_string(),
        avatar_url: None,
        assigned_to: req.assigned_to,
        last_training_completion: None,
        last_training_30d_completion: None,
        last_task_completion: None,
        created_at: now.clone(),
        updated_at: now,
    };
    state
        .store
        .create_client(&client)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    // Seed metric preferences from the ordered id list: position becomes
    // display order, everything visible. A seeding failure does not undo
    // the client create.
    if let Some(metric_ids) = req.ordered_metric_ids.filter(|ids| !ids.is_empty()) {
        let rows: Vec<MetricPreference> = metric_ids
            .iter()
            .enumerate()
            .map(|(position, metric_id)| MetricPreference {
                metric_id: *metric_id,
                display_order: position as i64,
                is_visible: true,
            })
            .collect();
        if let Err(e) = state.store.replace_preferences(&client.id, &rows) {
            tracing::warn!(client_id = %client.id, "failed to seed metric preferences: {e}");
        }
    }

    Ok(Json(serde_json::json!({ "client": client })))
}

pub async fn get_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "view clients")?;
    let client = state
        .store
        .get_client(&id, &user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, NOT_YOURS.to_string()))?;
    Ok(Json(serde_json::json!({ "client": client })))
}

pub async fn update_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateClientRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "update a client")?;
    let mut client = state
        .store
        .get_client(&id, &user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, NOT_YOURS.to_string()))?;

    let name_parts_changed = req.first_name.is_some() || req.last_name.is_some();
    if let Some(first_name) = req.first_name {
        client.first_name = first_name;
    }
    if let Some(last_name) = req.last_name {
        client.last_name = last_name;
    }
    match req.name {
        Some(name) => client.name = name,
        None if name_parts_changed => {
            client.name = format!("{} {}", client.first_name, client.last_name);
        }
        None => {}
    }
    if let Some(email) = req.email {
        client.email = email;
    }
    if let Some(client_type) = req.client_type {
        client.client_type = client_type;
    }
    if let Some(status) = req.status {
        client.status = status;
    }
    if let Some(avatar_url) = req.avatar_url {
        client.avatar_url = Some(avatar_url);
    }
    if let Some(assigned_to) = req.assigned_to {
        client.assigned_to = Some(assigned_to);
    }
    client.updated_at = store::now_utc();

    let updated = state
        .store
        .update_client(&client)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if !updated {
        return Err((StatusCode::NOT_FOUND, NOT_YOURS.to_string()));
    }
    Ok(Json(serde_json::json!({ "client": client })))
}

pub async fn delete_client(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "delete a client")?;
    let deleted = state
        .store
        .delete_client(&id, &user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if !deleted {
        return Err((StatusCode::NOT_FOUND, NOT_YOURS.to_string()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn time_ago_buckets() {
        let now = chrono::Utc::now();
        let fmt = |days: i64| {
            (now - chrono::Duration::days(days))
                .format("%Y-%m-%dT%H:%M:%SZ")
                .to_string()
        };
        assert_eq!(format_time_ago(&fmt(0)), "1d");
        assert_eq!(format_time_ago(&fmt(5)), "5d");
        assert_eq!(format_time_ago(&fmt(90)), "3m");
        assert_eq!(format_time_ago(&fmt(800)), "2y");
        assert_eq!(format_time_ago("not a date"), "");
    }
}
