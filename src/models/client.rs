use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct Client {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub client_type: String,
    pub status: String,
    pub avatar_url: Option<String>,
    pub assigned_to: Option<String>,
    pub last_training_completion: Option<f64>,
    pub last_training_30d_completion: Option<f64>,
    pub last_task_completion: Option<f64>,
    pub created_at: String,
    pub updated_at: String,
}

/// Row shape for the roster table: denormalized display fields only.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientEntry {
    pub id: String,
    pub name: String,
    pub demo: bool,
    pub last_activity: String,
    pub last_training7d: Option<f64>,
    pub last_training30d: Option<f64>,
    pub last_tasks7d: Option<f64>,
    pub category: String,
    pub status: String,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    pub client_type: Option<String>,
    pub assigned_to: Option<String>,
    /// When present, seeds the client's metric preferences: position in the
    /// list becomes the display order, all entries visible.
    pub ordered_metric_ids: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientRequest {
    pub name: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub client_type: Option<String>,
    pub status: Option<String>,
    pub avatar_url: Option<String>,
    pub assigned_to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClientListQuery {
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}
