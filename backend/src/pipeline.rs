//! The request path shared by the HTTP server and the stdio process:
//! payload → raw rows → feature matrix → inference → response shape.

use log::debug;
use serde_json::Value;

use crate::error::Result;
use crate::features::build_matrix;
use crate::inference::ModelGateway;
use crate::models::PredictionResponse;
use crate::normalize::{normalize, Payload};

/// Runs a prediction for an already-parsed request body.
pub fn predict_json(gateway: &ModelGateway, body: Value) -> Result<PredictionResponse> {
    // An unavailable model wins over payload errors.
    gateway.model()?;
    predict(gateway, Payload::from_json(body)?)
}

pub fn predict(gateway: &ModelGateway, payload: Payload) -> Result<PredictionResponse> {
    let batch = normalize(payload)?;
    let matrix = build_matrix(&batch)?;
    debug!("Running inference on {} row(s)", matrix.len());

    let inference = gateway.infer(&matrix)?;
    Ok(PredictionResponse::from_results(&inference.into_results()))
}
