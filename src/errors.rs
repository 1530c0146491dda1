//! # Error Handling
//!
//! Every failure that reaches a caller is an [`ApiError`]. Persistence failures are logged with
//! their internal details and answered with a generic message; filter problems, duplicate names
//! and field-level validation failures carry a user-facing message.
//!
//! ```rust,ignore
//! async fn handler(State(state): State<AppState>) -> Result<Json<Grid>, ApiError> {
//!     let saved = saved_search::Entity::find_by_id(id)
//!         .one(&state.db)
//!         .await?
//!         .ok_or_else(|| ApiError::not_found("Saved search", Some(id.to_string())))?;
//!     ...
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

use crate::export::ExportError;
use crate::filter::{FilterError, TranslateError};
use crate::validation::{ValidationError, ValidationErrors};

/// Message returned when the validation query rejects the current filters.
pub const INVALID_FILTERS_MESSAGE: &str = "The search filters are invalid";

#[derive(Debug)]
pub enum ApiError {
    /// 404 Not Found
    NotFound {
        resource: String,
        id: Option<String>,
    },

    /// 400 Bad Request
    BadRequest { message: String },

    /// 409 Conflict, raised by duplicate-name pre-checks
    Conflict { message: String },

    /// 422 Unprocessable Entity, one entry per failing field
    ValidationFailed { errors: Vec<ValidationError> },

    /// 500, details logged and never sent
    Database { message: String, internal: DbErr },

    /// 500, details logged and never sent
    Internal {
        message: String,
        internal: Option<String>,
    },
}

impl ApiError {
    // ============================================================================
    // Constructors
    // ============================================================================

    pub fn not_found(resource: impl Into<String>, id: Option<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Duplicate-name conflict for a saved search, report or template.
    pub fn duplicate_name(kind: &str, name: &str) -> Self {
        Self::conflict(format!("A {kind} named '{name}' already exists"))
    }

    /// The validation query failed against the current filters.
    #[must_use]
    pub fn invalid_filters() -> Self {
        Self::bad_request(INVALID_FILTERS_MESSAGE)
    }

    #[must_use]
    pub fn validation_failed(errors: Vec<ValidationError>) -> Self {
        Self::ValidationFailed { errors }
    }

    /// Single field-level error.
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            errors: vec![ValidationError::new(field, message)],
        }
    }

    #[must_use]
    pub fn database(err: DbErr) -> Self {
        Self::Database {
            message: "A database error occurred".to_string(),
            internal: err,
        }
    }

    pub fn internal(message: impl Into<String>, internal: Option<String>) -> Self {
        Self::Internal {
            message: message.into(),
            internal,
        }
    }

    // ============================================================================
    // Internal methods
    // ============================================================================

    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::ValidationFailed { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Database { .. } | Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Sanitized message shown to the user.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotFound { resource, id: Some(id) } => format!("{resource} '{id}' not found"),
            Self::NotFound { resource, id: None } => format!("{resource} not found"),
            Self::ValidationFailed { errors } => match errors.as_slice() {
                [single] => single.message.clone(),
                _ => format!(
                    "Validation failed: {}",
                    errors
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            },
            Self::BadRequest { message }
            | Self::Conflict { message }
            | Self::Database { message, .. }
            | Self::Internal { message, .. } => message.clone(),
        }
    }

    fn log_internal(&self) {
        match self {
            Self::Database { internal, .. } => {
                tracing::error!(error = ?internal, "Database error occurred");
            }
            Self::Internal {
                internal: Some(details),
                ..
            } => {
                tracing::error!(details = %details, "Internal error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "API error"
                );
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Vec<ValidationError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = match self {
            Self::ValidationFailed { errors } => ErrorResponse {
                error: "Validation failed".to_string(),
                details: Some(errors),
            },
            other => ErrorResponse {
                error: other.user_message(),
                details: None,
            },
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// Conversions
// ============================================================================

/// `RecordNotFound` becomes a 404, every other `DbErr` a logged 500.
impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(msg) => Self::NotFound {
                resource: msg.split_whitespace().next().unwrap_or("Resource").to_string(),
                id: None,
            },
            _ => Self::database(err),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        Self::field("filter", err.to_string())
    }
}

impl From<TranslateError> for ApiError {
    fn from(err: TranslateError) -> Self {
        Self::bad_request(err.to_string())
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::NoResults => Self::bad_request(err.to_string()),
            ExportError::Format(message) => Self::internal("Export failed", Some(message)),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        Self::validation_failed(vec![err])
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::validation_failed(errors.into_errors())
    }
}
