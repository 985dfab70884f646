//! Error taxonomy shared by the prediction pipeline and both front ends.

use std::fmt;
use thiserror::Error;

/// Coarse classification of a [`PredictError`], stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    MissingPayload,
    InvalidPayloadStructure,
    InvalidFeatureShape,
    ModelUnavailable,
    InferenceFailure,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingPayload => "MissingPayload",
            ErrorKind::InvalidPayloadStructure => "InvalidPayloadStructure",
            ErrorKind::InvalidFeatureShape => "InvalidFeatureShape",
            ErrorKind::ModelUnavailable => "ModelUnavailable",
            ErrorKind::InferenceFailure => "InferenceFailure",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Failure of any pipeline stage. Display strings are user-facing.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PredictError {
    #[error("Missing 'input' map/list or 'values' list")]
    MissingPayload,

    #[error("{0}")]
    InvalidPayloadStructure(String),

    #[error("{0}")]
    InvalidFeatureShape(String),

    #[error("Model not available")]
    ModelUnavailable { reason: String },

    #[error("Prediction error")]
    InferenceFailure { detail: String },
}

impl PredictError {
    pub fn structure(message: impl Into<String>) -> Self {
        PredictError::InvalidPayloadStructure(message.into())
    }

    pub fn shape(message: impl Into<String>) -> Self {
        PredictError::InvalidFeatureShape(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PredictError::MissingPayload => ErrorKind::MissingPayload,
            PredictError::InvalidPayloadStructure(_) => ErrorKind::InvalidPayloadStructure,
            PredictError::InvalidFeatureShape(_) => ErrorKind::InvalidFeatureShape,
            PredictError::ModelUnavailable { .. } => ErrorKind::ModelUnavailable,
            PredictError::InferenceFailure { .. } => ErrorKind::InferenceFailure,
        }
    }

    /// Operator-facing diagnostics. Never sent to network clients.
    pub fn details(&self) -> Option<&str> {
        match self {
            PredictError::ModelUnavailable { reason } => Some(reason),
            PredictError::InferenceFailure { detail } => Some(detail),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PredictError>;
