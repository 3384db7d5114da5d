use axum::extract::{Path, State};
use axum::Json;
use uuid::Uuid;
use voyager_core::types::DestinationRecord;
use voyager_core::VoyagerError;

use crate::error::AppError;
use crate::state::AppState;

/// GET /api/generate-destinations
///
/// Next batch of unviewed destinations.
pub async fn generate_destinations(
    State(app): State<AppState>,
) -> Result<Json<Vec<DestinationRecord>>, AppError> {
    let catalog = app.catalog.clone();
    let limit = app.batch_size;
    let batch = tokio::task::spawn_blocking(move || {
        let batch = catalog.next_batch(limit)?;
        if batch.is_empty() {
            return Err(VoyagerError::NoDestinations);
        }
        Ok(batch.iter().map(|d| d.to_record()).collect::<Vec<_>>())
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    tracing::debug!(count = batch.len(), "serving destination batch");
    Ok(Json(batch))
}

/// POST /api/destinations/{id}/viewed
pub async fn mark_viewed(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DestinationRecord>, AppError> {
    let catalog = app.catalog.clone();
    let record = tokio::task::spawn_blocking(move || {
        let d = catalog.mark_viewed(id)?;
        Ok::<_, VoyagerError>(d.to_record())
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(record))
}
