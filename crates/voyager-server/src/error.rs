use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use voyager_core::error::VoyagerError;

/// Body returned by the feed endpoint when the catalog has nothing unviewed.
pub const NO_DESTINATIONS_MESSAGE: &str = "No cached destinations. Please run `voyager seed`";

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<VoyagerError>() {
            Some(VoyagerError::NoDestinations) => {
                let body = serde_json::json!({ "message": NO_DESTINATIONS_MESSAGE });
                return (StatusCode::SERVICE_UNAVAILABLE, axum::Json(body)).into_response();
            }
            Some(e) => match e {
                VoyagerError::NotInitialized => StatusCode::BAD_REQUEST,
                VoyagerError::UserNotFound(_) | VoyagerError::DestinationNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                VoyagerError::UserExists(_) | VoyagerError::UpdateInFlight(_) => {
                    StatusCode::CONFLICT
                }
                VoyagerError::InvalidEmail(_) | VoyagerError::InvalidPatch(_) => {
                    StatusCode::BAD_REQUEST
                }
                VoyagerError::InvalidDeletionTransition { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                VoyagerError::Api { .. } | VoyagerError::Http(_) => StatusCode::BAD_GATEWAY,
                VoyagerError::NoDestinations
                | VoyagerError::Catalog(_)
                | VoyagerError::Io(_)
                | VoyagerError::Yaml(_)
                | VoyagerError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            None => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
