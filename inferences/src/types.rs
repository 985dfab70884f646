use serde::Serialize;

use cardio_backend::{ErrorBody, PredictError, PredictionResponse};

/// The single JSON document written to stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Document {
    Prediction(PredictionResponse),
    Error(ErrorBody),
}

impl Document {
    pub fn error(message: impl Into<String>) -> Self {
        Document::Error(ErrorBody::new(message))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Document::Error(_))
    }
}

impl From<Result<PredictionResponse, PredictError>> for Document {
    fn from(result: Result<PredictionResponse, PredictError>) -> Self {
        match result {
            Ok(response) => Document::Prediction(response),
            Err(err) => Document::Error(ErrorBody::operator(&err)),
        }
    }
}
