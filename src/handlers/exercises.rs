use std::collections::BTreeSet;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};

use crate::AppState;
use crate::auth;
use crate::models::exercise::*;
use crate::store;

/// Filters and sorting run in-process after merging the shared catalog with
/// the caller's custom entries, since the interesting fields are JSON
/// arrays rather than columns.
fn apply_filters(exercises: &mut Vec<Exercise>, query: &ExerciseListQuery) {
    if let Some(equipment) = query.equipments.as_deref().filter(|v| *v != "all") {
        exercises.retain(|e| e.equipments.iter().any(|x| x == equipment));
    }
    if let Some(muscle) = query.target_muscles.as_deref().filter(|v| *v != "all") {
        exercises.retain(|e| e.target_muscles.iter().any(|x| x == muscle));
    }
    if let Some(part) = query.body_parts.as_deref().filter(|v| *v != "all") {
        exercises.retain(|e| e.body_parts.iter().any(|x| x == part));
    }
    if let Some(status) = query.status.as_deref().filter(|v| *v != "all") {
        exercises.retain(|e| e.status == status);
    }
    if let Some(search) = query.search.as_deref() {
        let terms: Vec<String> = search
            .split_whitespace()
            .map(|term| term.to_lowercase())
            .collect();
        if !terms.is_empty() {
            exercises.retain(|e| {
                let name = e.name.to_lowercase();
                terms.iter().all(|term| name.contains(term))
            });
        }
    }
    if let Some(is_custom) = query.is_custom.as_deref().filter(|v| *v != "all") {
        let wanted = is_custom == "true";
        exercises.retain(|e| e.is_custom == wanted);
    }
}

fn apply_sort(exercises: &mut [Exercise], query: &ExerciseListQuery) {
    let sort_by = query.sort_by.as_deref().unwrap_or("updated_at");
    let ascending = query.order.as_deref() == Some("asc");
    exercises.sort_by(|a, b| {
        let ordering = match sort_by {
            "name" => a.name.cmp(&b.name),
            "status" => a.status.cmp(&b.status),
            "created_at" => a.created_at.cmp(&b.created_at),
            "is_custom" => a.is_custom.cmp(&b.is_custom),
            _ => a.updated_at.cmp(&b.updated_at),
        };
        if ascending { ordering } else { ordering.reverse() }
    });
}

pub async fn list_exercises(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ExerciseListQuery>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "view exercises")?;
    let mut exercises = state
        .store
        .list_exercises(&user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    apply_filters(&mut exercises, &query);
    apply_sort(&mut exercises, &query);
    Ok(Json(serde_json::json!({ "exercises": exercises })))
}

pub async fn create_exercise(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateExerciseRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "create a exercise")?;
    let name = req.name.trim().to_string();
    if name.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Exercise name is required".to_string()));
    }

    let now = store::now_utc();
    let exercise = Exercise {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: Some(user.id),
        name,
        target_muscles: req.target_muscles,
        secondary_muscles: req.secondary_muscles,
        body_parts: req.body_parts,
        equipments: req.equipments,
        instructions: req.instructions,
        gif_filename: req.gif_filename,
        video_url: req.video_url,
        video_platform: req.video_platform,
        status: "active".to_string(),
        is_custom: req.is_custom,
        is_private: req.is_private,
        created_at: now.clone(),
        updated_at: now,
    };
    state
        .store
        .create_exercise(&exercise)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "exercise": exercise })),
    ))
}

pub async fn get_exercise(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "view exercises")?;
    let exercise = state
        .store
        .get_exercise(&id, &user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Exercise not found".to_string()))?;
    Ok(Json(serde_json::json!({ "exercise": exercise })))
}

pub async fn update_exercise(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<UpdateExerciseRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "update a exercise")?;
    let mut exercise = state
        .store
        .get_exercise(&id, &user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?
        .ok_or_else(|| (StatusCode::NOT_FOUND, "Exercise not found".to_string()))?;

    // shared catalog rows are read-only
    if exercise.user_id.as_deref() != Some(user.id.as_str()) {
        return Err((StatusCode::NOT_FOUND, "Exercise not found".to_string()));
    }

    if let Some(name) = req.name {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err((StatusCode::BAD_REQUEST, "Exercise name is required".to_string()));
        }
        exercise.name = name;
    }
    if let Some(target_muscles) = req.target_muscles {
        exercise.target_muscles = target_muscles;
    }
    if let Some(secondary_muscles) = req.secondary_muscles {
        exercise.secondary_muscles = secondary_muscles;
    }
    if let Some(body_parts) = req.body_parts {
        exercise.body_parts = body_parts;
    }
    if let Some(equipments) = req.equipments {
        exercise.equipments = equipments;
    }
    if let Some(instructions) = req.instructions {
        exercise.instructions = instructions;
    }
    if let Some(gif_filename) = req.gif_filename {
        exercise.gif_filename = Some(gif_filename);
    }
    if let Some(video_url) = req.video_url {
        exercise.video_url = Some(video_url);
    }
    if let Some(video_platform) = req.video_platform {
        exercise.video_platform = Some(video_platform);
    }
    if let Some(status) = req.status {
        exercise.status = status;
    }
    if let Some(is_private) = req.is_private {
        exercise.is_private = is_private;
    }
    exercise.updated_at = store::now_utc();

    let updated = state
        .store
        .update_exercise(&exercise)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if !updated {
        return Err((StatusCode::NOT_FOUND, "Exercise not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "exercise": exercise })))
}

pub async fn delete_exercise(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = auth::require_user(&state, &headers, "delete a exercise")?;
    let deleted = state
        .store
        .delete_exercise(&id, &user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    if !deleted {
        return Err((StatusCode::NOT_FOUND, "Exercise not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

// ── Filter option lookups ──

fn distinct_values(
    exercises: &[Exercise],
    field: fn(&Exercise) -> &Vec<String>,
) -> Vec<String> {
    let mut values = BTreeSet::new();
    for exercise in exercises {
        for value in field(exercise) {
            values.insert(value.clone());
        }
    }
    values.into_iter().collect()
}

async fn list_field_values(
    state: &AppState,
    headers: &HeaderMap,
    field: fn(&Exercise) -> &Vec<String>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    let user = auth::require_user(state, headers, "view exercises")?;
    let exercises = state
        .store
        .list_exercises(&user.id)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(Json(distinct_values(&exercises, field)))
}

pub async fn list_body_parts(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    list_field_values(&state, &headers, |e| &e.body_parts).await
}

pub async fn list_muscle_groups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    list_field_values(&state, &headers, |e| &e.target_muscles).await
}

pub async fn list_equipment(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    list_field_values(&state, &headers, |e| &e.equipments).await
}
