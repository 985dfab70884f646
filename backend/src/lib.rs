//! Cardiac-risk prediction core: payload normalization, feature ordering,
//! load-once ONNX inference and response shaping, plus the actix-web routes
//! that expose them.

pub mod config;
pub mod error;
pub mod features;
pub mod inference;
pub mod models;
pub mod normalize;
pub mod pipeline;
pub mod routes;

pub use config::ServerConfig;
pub use error::{ErrorKind, PredictError};
pub use features::{FeatureMatrix, FEATURE_COUNT, FEATURE_NAMES};
pub use inference::{get_gateway, ArtifactLoader, Capabilities, Classifier, ModelGateway};
pub use models::{ErrorBody, ModelInfo, PredictionResponse, PredictionResult};
pub use normalize::Payload;
