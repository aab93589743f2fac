use serde::{Deserialize, Serialize};

/// Catalog entry describing a trackable quantity. Owned by catalog
/// management; this service only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub id: i64,
    pub name: String,
    pub unit: Option<String>,
}

/// Per-client visibility and ordering override for one metric.
#[derive(Debug, Clone)]
pub struct MetricPreference {
    pub metric_id: i64,
    pub display_order: i64,
    pub is_visible: bool,
}

/// One timestamped observation for a client+metric.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuePoint {
    pub value: f64,
    pub recorded_at: String,
}

/// Latest-value card for the dashboard summary strip.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSummary {
    pub id: i64,
    pub name: String,
    pub value: Option<String>,
    pub last_update: Option<String>,
    pub unit: Option<String>,
    pub display_order: i64,
}

/// Full chronological series plus first-to-last percent change.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricHistory {
    pub id: i64,
    pub name: String,
    pub unit: Option<String>,
    pub data: Vec<SeriesPoint>,
    pub percent_change: String,
    pub display_order: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesPoint {
    pub date: String,
    pub value: f64,
}

/// One entry of the `metricsToSave` payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePreferenceEntry {
    pub id: i64,
    pub display_order: i64,
    #[serde(default = "default_visible")]
    pub is_visible: bool,
}

fn default_visible() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddValueRequest {
    pub value: f64,
    pub recorded_at: Option<String>,
}
