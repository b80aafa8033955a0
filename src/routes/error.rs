//! Mapping of [`CasError`] to HTTP responses. Details stay in the logs.

use axum::{
    Json,
    response::{IntoResponse, Response},
};
use http::StatusCode;
use serde::Serialize;

use crate::cas::CasError;

/// Errors that abort a request instead of ending in a failure redirect.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct RouteError(#[from] pub CasError);

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub error: &'static str,
    pub message: &'static str,
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            CasError::Transport(e) => {
                tracing::error!(error = %e, "CAS server request failed");
                (
                    StatusCode::BAD_GATEWAY,
                    ErrorBody {
                        error: "cas_unavailable",
                        message: "The CAS server could not be reached",
                    },
                )
            }
            CasError::Configuration(_) | CasError::InvalidUrl { .. } => {
                tracing::error!(error = %self.0, "CAS request could not be built");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody {
                        error: "internal_error",
                        message: "Internal server error",
                    },
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_hides_details() {
        let response =
            RouteError(CasError::Configuration("ca_path /secret/ca.pem".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
