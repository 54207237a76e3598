use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;
use thiserror::Error;

use campus_core::{AuthError, DatabaseError, DenyReason, WorkflowError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("{0}")]
    Validation(String),
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("An admin account already exists")]
    AdminExists,
    #[error("{0}")]
    Forbidden(DenyReason),
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Submission already graded")]
    AlreadyGraded,
    #[error("Unknown internal error")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials => StatusCode::BAD_REQUEST,
            Self::AdminExists => StatusCode::CONFLICT,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::AlreadyGraded => StatusCode::CONFLICT,
            Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        // Store faults are logged in full but never leak details out
        if let Self::Unknown(detail) = &self {
            error!("Internal error: {}", detail);
        }

        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::AdminExists => Self::AdminExists,
            AuthError::Validation(message) => Self::Validation(message),
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<WorkflowError> for ServerError {
    fn from(value: WorkflowError) -> Self {
        match value {
            WorkflowError::Denied(reason) => Self::Forbidden(reason),
            WorkflowError::Invalid(message) => Self::Validation(message),
            WorkflowError::AlreadyGraded => Self::AlreadyGraded,
            WorkflowError::Db(e) => e.into(),
        }
    }
}
