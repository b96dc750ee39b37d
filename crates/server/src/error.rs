use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use smartcrop_core::errors::{ApplicationError, DomainError, InterfaceError};
use smartcrop_db::repositories::RepositoryError;
use tracing::error;
use uuid::Uuid;

pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// JSON body of every non-2xx response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub correlation_id: String,
}

#[derive(Debug)]
pub struct ApiError(pub InterfaceError);

impl ApiError {
    pub fn from_application(error: ApplicationError, correlation_id: &str) -> Self {
        Self(error.into_interface(correlation_id))
    }

    pub fn domain(error: DomainError, correlation_id: &str) -> Self {
        Self::from_application(ApplicationError::from(error), correlation_id)
    }

    pub fn not_found(message: impl Into<String>, correlation_id: &str) -> Self {
        Self::from_application(ApplicationError::NotFound(message.into()), correlation_id)
    }

    pub fn repository(error: RepositoryError, correlation_id: &str) -> Self {
        let application = match error {
            RepositoryError::DuplicatePhone(_) => {
                ApplicationError::Conflict("Phone number already registered".to_string())
            }
            other => ApplicationError::Persistence(other.to_string()),
        };
        Self::from_application(application, correlation_id)
    }

    pub fn malformed_body(rejection: JsonRejection, correlation_id: &str) -> Self {
        Self(InterfaceError::BadRequest {
            message: format!("Malformed JSON body: {}", rejection.body_text()),
            correlation_id: correlation_id.to_string(),
        })
    }

    pub fn status(&self) -> StatusCode {
        match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
            InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(
                event_name = "http.request.failed",
                correlation_id = self.0.correlation_id(),
                error = %self.0,
                "request failed with server error"
            );
        }

        let body = ErrorBody {
            error: self.0.user_message(),
            correlation_id: self.0.correlation_id().to_string(),
        };
        (status, Json(body)).into_response()
    }
}
