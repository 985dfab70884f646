use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use once_cell::sync::OnceCell;
use tract_onnx::prelude::*;

use crate::error::{PredictError, Result};
use crate::features::{FeatureMatrix, Row, FEATURE_COUNT, FEATURE_NAMES};
use crate::models::{ModelInfo, PredictionResult};

/// Optional behaviours of a loaded artifact, resolved once at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities {
    pub probability: bool,
}

/// A pretrained binary classifier.
pub trait Classifier: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// One class label per row.
    fn predict(&self, matrix: &FeatureMatrix) -> anyhow::Result<Vec<i64>>;

    /// Probability of the positive class per row. Only called when
    /// [`Capabilities::probability`] is set.
    fn predict_proba(&self, _matrix: &FeatureMatrix) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("artifact has no probability output")
    }

    /// Labels plus, when `with_probability` is set, positive-class
    /// probabilities. Artifacts that produce both from one run override this.
    fn infer(&self, matrix: &FeatureMatrix, with_probability: bool) -> anyhow::Result<Inference> {
        let labels = self.predict(matrix)?;
        let probabilities = if with_probability {
            Some(self.predict_proba(matrix)?)
        } else {
            None
        };
        Ok(Inference {
            labels,
            probabilities,
        })
    }
}

/// Produces a classifier from a serialized artifact.
pub trait ArtifactLoader: Send + Sync {
    fn load(&self) -> anyhow::Result<Box<dyn Classifier>>;

    /// Where the artifact comes from, for logs and `/model-info`.
    fn source(&self) -> String;
}

pub struct LoadedModel {
    classifier: Box<dyn Classifier>,
    capabilities: Capabilities,
    source: String,
    loaded_at: DateTime<Utc>,
}

impl LoadedModel {
    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            source: self.source.clone(),
            features: FEATURE_NAMES.iter().map(|f| f.to_string()).collect(),
            feature_count: FEATURE_COUNT,
            probability: self.capabilities.probability,
            loaded_at: self.loaded_at,
        }
    }
}

pub enum ModelState {
    Ready(LoadedModel),
    Unavailable { reason: String },
}

/// Labels and optional positive-class probabilities, index-aligned with the
/// input rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Inference {
    pub labels: Vec<i64>,
    pub probabilities: Option<Vec<f32>>,
}

impl Inference {
    pub fn into_results(self) -> Vec<PredictionResult> {
        match self.probabilities {
            Some(probs) => self
                .labels
                .into_iter()
                .zip(probs)
                .map(|(label, p)| PredictionResult {
                    label,
                    probability: Some(p),
                })
                .collect(),
            None => self
                .labels
                .into_iter()
                .map(|label| PredictionResult {
                    label,
                    probability: None,
                })
                .collect(),
        }
    }
}

/// Load-once handle on the classifier artifact.
///
/// The loader runs at most once. Concurrent first callers wait on that single
/// attempt and all see its outcome; a failed load leaves the gateway
/// permanently unavailable.
pub struct ModelGateway {
    loader: Box<dyn ArtifactLoader>,
    state: OnceCell<ModelState>,
}

impl ModelGateway {
    pub fn new(loader: impl ArtifactLoader + 'static) -> Self {
        Self {
            loader: Box::new(loader),
            state: OnceCell::new(),
        }
    }

    pub fn onnx<P: AsRef<Path>>(model_path: P) -> Self {
        Self::new(OnnxLoader::new(model_path))
    }

    pub fn ensure_loaded(&self) -> &ModelState {
        self.state.get_or_init(|| self.load())
    }

    fn load(&self) -> ModelState {
        let source = self.loader.source();
        let attempt = catch_unwind(AssertUnwindSafe(|| self.loader.load()))
            .unwrap_or_else(|panic| Err(anyhow::anyhow!(panic_message(panic))));

        match attempt {
            Ok(classifier) => {
                let capabilities = classifier.capabilities();
                info!(
                    "Model loaded from {} (probability output: {})",
                    source, capabilities.probability
                );
                ModelState::Ready(LoadedModel {
                    classifier,
                    capabilities,
                    source,
                    loaded_at: Utc::now(),
                })
            }
            Err(e) => {
                error!("Model load failed from {}: {:#}", source, e);
                ModelState::Unavailable {
                    reason: format!("{:#}", e),
                }
            }
        }
    }

    /// Whether a usable artifact is bound. Triggers the first load.
    pub fn is_ready(&self) -> bool {
        matches!(self.ensure_loaded(), ModelState::Ready(_))
    }

    /// Whether a load has been attempted, without attempting one.
    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn model(&self) -> Result<&LoadedModel> {
        match self.ensure_loaded() {
            ModelState::Ready(model) => Ok(model),
            ModelState::Unavailable { reason } => {
                warn!("Prediction refused, model unavailable: {}", reason);
                Err(PredictError::ModelUnavailable {
                    reason: reason.clone(),
                })
            }
        }
    }

    pub fn model_info(&self) -> Result<ModelInfo> {
        self.model().map(LoadedModel::info)
    }

    pub fn infer(&self, matrix: &FeatureMatrix) -> Result<Inference> {
        let model = self.model()?;
        let rows = matrix.len();

        let with_probability = model.capabilities.probability;

        let Inference {
            labels,
            probabilities,
        } = guarded("inference", || model.classifier.infer(matrix, with_probability))?;
        check_len("labels", labels.len(), rows)?;

        let probabilities = match (with_probability, probabilities) {
            (true, Some(probs)) => {
                check_len("probabilities", probs.len(), rows)?;
                Some(probs)
            }
            (true, None) => {
                return Err(inference_failure(
                    "artifact advertises probabilities but returned none".to_string(),
                ))
            }
            (false, _) => None,
        };

        Ok(Inference {
            labels,
            probabilities,
        })
    }
}

static GATEWAY: OnceCell<Arc<ModelGateway>> = OnceCell::new();

/// Process-wide gateway. `model_path` is only read by the first caller.
pub fn get_gateway<P: AsRef<Path>>(model_path: P) -> Arc<ModelGateway> {
    GATEWAY
        .get_or_init(|| Arc::new(ModelGateway::onnx(model_path)))
        .clone()
}

fn guarded<T>(stage: &str, call: impl FnOnce() -> anyhow::Result<T>) -> Result<T> {
    let outcome = catch_unwind(AssertUnwindSafe(call))
        .unwrap_or_else(|panic| Err(anyhow::anyhow!("panicked: {}", panic_message(panic))));

    outcome.map_err(|e| inference_failure(format!("{} failed: {:#}", stage, e)))
}

fn check_len(output: &str, got: usize, expected: usize) -> Result<()> {
    if got == expected {
        return Ok(());
    }
    Err(inference_failure(format!(
        "{} output has {} values for {} rows",
        output, got, expected
    )))
}

fn inference_failure(detail: String) -> PredictError {
    error!("Inference error: {}", detail);
    PredictError::InferenceFailure { detail }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

/// Reads an ONNX artifact from disk.
#[derive(Debug, Clone)]
pub struct OnnxLoader {
    path: PathBuf,
}

impl OnnxLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl ArtifactLoader for OnnxLoader {
    fn load(&self) -> anyhow::Result<Box<dyn Classifier>> {
        let classifier = OnnxClassifier::load(&self.path)
            .with_context(|| format!("Could not load model {}", self.path.display()))?;
        Ok(Box::new(classifier))
    }

    fn source(&self) -> String {
        self.path.display().to_string()
    }
}

/// Classifier exported to ONNX with output 0 = labels and, optionally,
/// output 1 = per-class probabilities.
pub struct OnnxClassifier {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>,
    capabilities: Capabilities,
}

impl OnnxClassifier {
    pub fn load<P: AsRef<Path>>(model_path: P) -> TractResult<Self> {
        let model = tract_onnx::onnx()
            .model_for_path(model_path)?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, FEATURE_COUNT)),
            )?;

        let capabilities = Capabilities {
            probability: model.output_outlets()?.len() > 1,
        };
        let model = model.into_optimized()?.into_runnable()?;

        Ok(Self {
            model,
            capabilities,
        })
    }

    fn run_row(&self, row: &Row) -> TractResult<(i64, Option<f32>)> {
        let input = Tensor::from_shape(&[1, FEATURE_COUNT], row)?;
        let outputs = self.model.run(tvec!(input.into()))?;

        let labels = outputs
            .first()
            .ok_or_else(|| anyhow::anyhow!("model produced no outputs"))?
            .cast_to::<i64>()?;
        let label = *labels
            .as_slice::<i64>()?
            .first()
            .ok_or_else(|| anyhow::anyhow!("empty label output"))?;

        let probability = match outputs.get(1) {
            Some(probs) => {
                let probs = probs.cast_to::<f32>()?;
                let probs = probs.as_slice::<f32>()?;
                // Binary classifier: column 1 is the positive class.
                probs.get(1).or_else(|| probs.first()).copied()
            }
            None => None,
        };

        Ok((label, probability))
    }
}

impl Classifier for OnnxClassifier {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn predict(&self, matrix: &FeatureMatrix) -> anyhow::Result<Vec<i64>> {
        Ok(self.infer(matrix, false)?.labels)
    }

    fn predict_proba(&self, matrix: &FeatureMatrix) -> anyhow::Result<Vec<f32>> {
        self.infer(matrix, true)?
            .probabilities
            .ok_or_else(|| anyhow::anyhow!("no probability output"))
    }

    // One run per row; label and probability come from the same outputs.
    fn infer(&self, matrix: &FeatureMatrix, with_probability: bool) -> anyhow::Result<Inference> {
        let mut labels = Vec::with_capacity(matrix.len());
        let mut probabilities = Vec::new();

        for (index, row) in matrix.rows().iter().enumerate() {
            let (label, probability) = self.run_row(row)?;
            labels.push(label);
            if with_probability {
                probabilities.push(
                    probability
                        .ok_or_else(|| anyhow::anyhow!("row {}: no probability output", index))?,
                );
            }
        }

        Ok(Inference {
            labels,
            probabilities: with_probability.then_some(probabilities),
        })
    }
}
