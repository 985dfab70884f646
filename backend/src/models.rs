use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PredictError;

/// Outcome for one row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub label: i64,
    /// Probability of the positive class. `None` when the artifact has no
    /// probability output.
    pub probability: Option<f32>,
}

/// Wire shape of a successful prediction.
///
/// A single row yields [`PredictionResponse::Single`]; two or more rows yield
/// [`PredictionResponse::Batch`]. Clients rely on this switch, so keep it
/// unless the protocol version changes. Absent probabilities serialize as
/// `null`, never as a missing key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PredictionResponse {
    Single {
        prediction: i64,
        probability: Option<f32>,
    },
    Batch {
        predictions: Vec<i64>,
        probabilities: Option<Vec<f32>>,
    },
}

impl PredictionResponse {
    pub fn from_results(results: &[PredictionResult]) -> Self {
        if let [only] = results {
            return PredictionResponse::Single {
                prediction: only.label,
                probability: only.probability,
            };
        }

        PredictionResponse::Batch {
            predictions: results.iter().map(|r| r.label).collect(),
            probabilities: results.iter().map(|r| r.probability).collect(),
        }
    }

    /// Labels in row order, whatever the shape.
    pub fn labels(&self) -> Vec<i64> {
        match self {
            PredictionResponse::Single { prediction, .. } => vec![*prediction],
            PredictionResponse::Batch { predictions, .. } => predictions.clone(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PredictionResponse::Single { .. } => 1,
            PredictionResponse::Batch { predictions, .. } => predictions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Error document shared by the HTTP and stdio front ends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorBody {
            error: message.into(),
            kind: None,
            details: None,
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Message and kind only; safe for network clients.
    pub fn public(err: &PredictError) -> Self {
        ErrorBody::new(err.to_string()).with_kind(err.kind().as_str())
    }

    /// Message plus diagnostics, for operator-facing channels.
    pub fn operator(err: &PredictError) -> Self {
        let body = ErrorBody::new(err.to_string());
        match err.details() {
            Some(details) => body.with_details(details),
            None => body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

impl HealthStatus {
    pub fn ok() -> Self {
        HealthStatus {
            status: "ok".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Readiness {
    pub ready: bool,
    pub model_loaded: bool,
}

/// Description of the bound artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub source: String,
    pub features: Vec<String>,
    pub feature_count: usize,
    pub probability: bool,
    pub loaded_at: DateTime<Utc>,
}
