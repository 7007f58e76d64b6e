//! Error types for schoolhouse operations.

use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::json;

use crate::{SchoolId, StudentId};

/// The coarse category of a [`DomainError`].
///
/// Transport layers decide how to present each kind; the kind itself is stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A referenced school or student does not exist.
    NotFound,
    /// An enrollment would exceed the school's capacity.
    CapacityExceeded,
    /// A school name collides with an existing one.
    DuplicateName,
    /// Structurally invalid input.
    Validation,
    /// An optimistic-concurrency check failed at write time.
    VersionConflict,
    /// The storage backend failed.
    Storage,
}

/// Errors raised by the aggregate, the handlers, and the repository adapters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// The referenced entity does not exist (or is not owned by the referenced school).
    #[error("{entity} not found with identifier: {id}")]
    NotFound {
        /// What kind of thing was looked up ("School" or "Student").
        entity: &'static str,
        /// The identifier that was looked up.
        id: String,
    },
    /// The school is at maximum capacity.
    #[error("School {school_id} is at maximum capacity")]
    CapacityExceeded {
        /// The school that is full.
        school_id: SchoolId,
    },
    /// A school with this name already exists (compared case-insensitively).
    #[error("A school with the name {name:?} already exists")]
    DuplicateName {
        /// The offending name.
        name: String,
    },
    /// The input is invalid.
    #[error("{0}")]
    Validation(String),
    /// The school was modified by another transaction since it was read.
    #[error("School {school_id} was modified concurrently; reload and retry")]
    VersionConflict {
        /// The school whose version moved.
        school_id: SchoolId,
    },
    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    /// Shorthand for a missing school.
    pub fn school_not_found(id: SchoolId) -> Self {
        DomainError::NotFound {
            entity: "School",
            id: id.to_string(),
        }
    }

    /// Shorthand for a missing student.
    pub fn student_not_found(id: StudentId) -> Self {
        DomainError::NotFound {
            entity: "Student",
            id: id.to_string(),
        }
    }

    /// Returns the category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::CapacityExceeded { .. } => ErrorKind::CapacityExceeded,
            DomainError::DuplicateName { .. } => ErrorKind::DuplicateName,
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::VersionConflict { .. } => ErrorKind::VersionConflict,
            DomainError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// The HTTP status that expresses the intent of this error.
    pub fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::CapacityExceeded | ErrorKind::DuplicateName | ErrorKind::VersionConflict => {
                StatusCode::CONFLICT
            }
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "Not Found",
            ErrorKind::CapacityExceeded => "Capacity Exceeded",
            ErrorKind::DuplicateName => "Duplicate Name",
            ErrorKind::Validation => "Bad Request",
            ErrorKind::VersionConflict => "Optimistic Locking Failure",
            ErrorKind::Storage => "Internal Server Error",
        }
    }

    /// Renders this error as a problem-details document.
    pub fn problem_details(&self) -> serde_json::Value {
        let status = self.status_code();
        // Storage details stay in the logs.
        let detail = match self {
            DomainError::Storage(_) => "An unexpected error occurred".to_string(),
            other => other.to_string(),
        };
        let mut body = json!({
            "type": "about:blank",
            "title": self.title(),
            "status": status.as_u16(),
            "detail": detail,
            "timestamp": Utc::now().to_rfc3339(),
        });
        if let DomainError::CapacityExceeded { school_id } = self {
            body["schoolId"] = json!(school_id.to_string());
        }
        body
    }
}

impl IntoResponse for DomainError {
    fn into_response(self) -> Response {
        if self.kind() == ErrorKind::Storage {
            tracing::error!(error = %self, "request failed with a storage error");
        }
        let status = self.status_code();
        let body = self.problem_details().to_string();
        (status, [(CONTENT_TYPE, "application/problem+json")], body).into_response()
    }
}

impl From<sqlx::Error> for DomainError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => DomainError::NotFound {
                entity: "Row",
                id: "unknown".to_string(),
            },
            _ => DomainError::Storage(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_http_intent() {
        let school_id = SchoolId::generate();
        let cases = [
            (DomainError::school_not_found(school_id), StatusCode::NOT_FOUND),
            (
                DomainError::CapacityExceeded { school_id },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::DuplicateName {
                    name: "Central".to_string(),
                },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::Validation("blank".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                DomainError::VersionConflict { school_id },
                StatusCode::CONFLICT,
            ),
            (
                DomainError::Storage("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status_code(), status, "{:?}", error);
        }
    }

    #[test]
    fn capacity_problem_carries_school_id() {
        let school_id = SchoolId::generate();
        let body = DomainError::CapacityExceeded { school_id }.problem_details();
        assert_eq!(body["status"], 409);
        assert_eq!(body["title"], "Capacity Exceeded");
        assert_eq!(body["schoolId"], school_id.to_string());
    }

    #[test]
    fn storage_problem_hides_details() {
        let body = DomainError::Storage("connection reset by peer".to_string()).problem_details();
        assert_eq!(body["detail"], "An unexpected error occurred");
    }

    #[test]
    fn into_response_sets_problem_content_type() {
        let response =
            DomainError::Validation("name must not be blank".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            response.headers().get(CONTENT_TYPE).unwrap(),
            "application/problem+json"
        );
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let error: DomainError = sqlx::Error::RowNotFound.into();
        assert_eq!(error.kind(), ErrorKind::NotFound);
        let error: DomainError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(error.kind(), ErrorKind::Storage);
    }
}
