use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use voyager_core::types::{SavedDestination, Trip, User, UserId, UserPatch};
use voyager_core::VoyagerError;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserBody {
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDestinationBody {
    pub destination_id: Uuid,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTripBody {
    pub name: String,
    #[serde(default)]
    pub destination_ids: Vec<Uuid>,
}

/// POST /api/user
pub async fn create_user(
    State(app): State<AppState>,
    Json(body): Json<CreateUserBody>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let catalog = app.catalog.clone();
    let user = tokio::task::spawn_blocking(move || catalog.create_user(&body.email, body.full_name))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/user/{id}
pub async fn get_user(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<User>, AppError> {
    let catalog = app.catalog.clone();
    let user = tokio::task::spawn_blocking(move || catalog.get_user(&UserId::new(id)))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(user))
}

/// PATCH /api/user/{id}: apply a partial update and return the stored user.
pub async fn update_user(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, AppError> {
    let catalog = app.catalog.clone();
    let fields = patch.fields();
    let user = tokio::task::spawn_blocking(move || catalog.update_user(&UserId::new(id), &patch))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    tracing::info!(user = %user.id, ?fields, "user updated");
    Ok(Json(user))
}

/// DELETE /api/user/{id}: remove the user with their saved destinations and trips.
pub async fn delete_user(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let catalog = app.catalog.clone();
    tokio::task::spawn_blocking(move || catalog.delete_user(&UserId::new(id)))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(serde_json::json!({ "message": "Account deleted" })))
}

/// GET /api/user/{id}/saved
pub async fn list_saved(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<SavedDestination>>, AppError> {
    let catalog = app.catalog.clone();
    let saved = tokio::task::spawn_blocking(move || catalog.saved_destinations(&UserId::new(id)))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(saved))
}

/// POST /api/user/{id}/saved
pub async fn save_destination(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SaveDestinationBody>,
) -> Result<(StatusCode, Json<SavedDestination>), AppError> {
    let catalog = app.catalog.clone();
    let saved = tokio::task::spawn_blocking(move || {
        catalog.save_destination(&UserId::new(id), body.destination_id)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok((StatusCode::CREATED, Json(saved)))
}

/// GET /api/user/{id}/trips
pub async fn list_trips(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Trip>>, AppError> {
    let catalog = app.catalog.clone();
    let trips = tokio::task::spawn_blocking(move || catalog.trips(&UserId::new(id)))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(trips))
}

/// POST /api/user/{id}/trips
pub async fn create_trip(
    State(app): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<CreateTripBody>,
) -> Result<(StatusCode, Json<Trip>), AppError> {
    let catalog = app.catalog.clone();
    let trip = tokio::task::spawn_blocking(move || {
        if body.name.trim().is_empty() {
            return Err(VoyagerError::InvalidPatch("trip name is required".into()));
        }
        catalog.add_trip(&UserId::new(id), body.name.trim(), body.destination_ids)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok((StatusCode::CREATED, Json(trip)))
}
