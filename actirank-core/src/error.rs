//! Failure taxonomy of a detection run.

use crate::classifier::ClassifierError;
use crate::recording::RecordingError;
use crate::report::AggregateError;
use serde::Serialize;
use thiserror::Error;

/// Coarse class of a [`DetectError`], for callers that branch on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The submitted recording cannot be analysed. Client-side problem.
    Input,
    /// No classifier was loaded at startup.
    ModelUnavailable,
    /// Anything else.
    Internal,
}

impl ErrorKind {
    /// HTTP-style status class a transport should report.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Input => 400,
            ErrorKind::ModelUnavailable => 503,
            ErrorKind::Internal => 500,
        }
    }
}

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("recording has {found} columns, {required} required")]
    InsufficientColumns { found: usize, required: usize },
    #[error("recording too short: {rows} samples give no {window_size}-sample window")]
    TooShort { rows: usize, window_size: usize },
    #[error("recording has no samples")]
    EmptyRecording,
    #[error("recording too large: more than {limit} samples")]
    TooLarge { limit: usize },
    #[error("classifier model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl DetectError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DetectError::InsufficientColumns { .. }
            | DetectError::TooShort { .. }
            | DetectError::EmptyRecording
            | DetectError::TooLarge { .. } => ErrorKind::Input,
            DetectError::ModelUnavailable(_) => ErrorKind::ModelUnavailable,
            DetectError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Body for a transport response. Internal failures get a generic
    /// message; the detail is logged where the error is raised.
    pub fn to_response(&self) -> ErrorResponse {
        let error = match self.kind() {
            ErrorKind::Internal => "internal error while processing the recording".to_string(),
            _ => self.to_string(),
        };
        ErrorResponse {
            error,
            kind: self.kind(),
            status: self.kind().status_code(),
        }
    }
}

impl From<RecordingError> for DetectError {
    fn from(err: RecordingError) -> Self {
        match err {
            RecordingError::InsufficientColumns { found, required } => {
                DetectError::InsufficientColumns { found, required }
            }
            RecordingError::Empty => DetectError::EmptyRecording,
            RecordingError::TooManyRows { limit } => DetectError::TooLarge { limit },
            other => DetectError::Internal(other.to_string()),
        }
    }
}

impl From<ClassifierError> for DetectError {
    fn from(err: ClassifierError) -> Self {
        DetectError::Internal(err.to_string())
    }
}

impl From<AggregateError> for DetectError {
    fn from(err: AggregateError) -> Self {
        DetectError::Internal(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: ErrorKind,
    #[serde(skip)]
    pub status: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        let too_short = DetectError::TooShort {
            rows: 50,
            window_size: 128,
        };
        assert_eq!(too_short.kind(), ErrorKind::Input);
        assert_eq!(too_short.kind().status_code(), 400);
        assert_eq!(
            DetectError::ModelUnavailable("missing".into()).kind(),
            ErrorKind::ModelUnavailable
        );
        assert_eq!(DetectError::Internal("x".into()).kind().status_code(), 500);
    }

    #[test]
    fn test_recording_error_mapping() {
        let err: DetectError = RecordingError::InsufficientColumns {
            found: 20,
            required: 23,
        }
        .into();
        assert!(matches!(
            err,
            DetectError::InsufficientColumns {
                found: 20,
                required: 23
            }
        ));

        let err: DetectError = RecordingError::InvalidValue {
            line: 3,
            column: 1,
            value: "x".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let err: DetectError = RecordingError::TooManyRows { limit: 10 }.into();
        assert!(matches!(err, DetectError::TooLarge { limit: 10 }));
        assert_eq!(err.kind(), ErrorKind::Input);
    }

    #[test]
    fn test_internal_response_is_generic() {
        let response = DetectError::Internal("secret detail".into()).to_response();
        assert_eq!(response.status, 500);
        assert!(!response.error.contains("secret"));

        let response = DetectError::InsufficientColumns {
            found: 20,
            required: 23,
        }
        .to_response();
        assert_eq!(response.status, 400);
        assert!(response.error.contains("20 columns"));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["kind"], "input");
    }
}
