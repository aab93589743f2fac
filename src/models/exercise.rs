use serde::{Deserialize, Serialize};

/// Exercise library entry. Rows with no `user_id` form the shared catalog;
/// rows with one are that trainer's custom entries. Array-valued fields are
/// stored as JSON text in the database.
#[derive(Debug, Clone, Serialize)]
pub struct Exercise {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub target_muscles: Vec<String>,
    pub secondary_muscles: Vec<String>,
    pub body_parts: Vec<String>,
    pub equipments: Vec<String>,
    pub instructions: Vec<String>,
    pub gif_filename: Option<String>,
    pub video_url: Option<String>,
    pub video_platform: Option<String>,
    pub status: String,
    pub is_custom: bool,
    pub is_private: bool,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateExerciseRequest {
    pub name: String,
    #[serde(default)]
    pub target_muscles: Vec<String>,
    #[serde(default)]
    pub secondary_muscles: Vec<String>,
    #[serde(default)]
    pub body_parts: Vec<String>,
    #[serde(default)]
    pub equipments: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    pub gif_filename: Option<String>,
    pub video_url: Option<String>,
    pub video_platform: Option<String>,
    #[serde(default = "default_custom")]
    pub is_custom: bool,
    #[serde(default)]
    pub is_private: bool,
}

fn default_custom() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct UpdateExerciseRequest {
    pub name: Option<String>,
    pub target_muscles: Option<Vec<String>>,
    pub secondary_muscles: Option<Vec<String>>,
    pub body_parts: Option<Vec<String>>,
    pub equipments: Option<Vec<String>>,
    pub instructions: Option<Vec<String>>,
    pub gif_filename: Option<String>,
    pub video_url: Option<String>,
    pub video_platform: Option<String>,
    pub status: Option<String>,
    pub is_private: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ExerciseListQuery {
    #[serde(rename = "sortBy")]
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub equipments: Option<String>,
    pub target_muscles: Option<String>,
    pub body_parts: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    pub is_custom: Option<String>,
}
