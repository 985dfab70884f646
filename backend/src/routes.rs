use std::time::Instant;

use actix_web::error::{BlockingError, InternalError};
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, Responder, ResponseError};
use log::{error, info};
use serde_json::Value;

use crate::error::{ErrorKind, PredictError};
use crate::inference::ModelGateway;
use crate::models::{ErrorBody, HealthStatus, Readiness};
use crate::pipeline;

impl ResponseError for PredictError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::MissingPayload => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::InvalidPayloadStructure | ErrorKind::InvalidFeatureShape => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::InferenceFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody::public(self))
    }
}

fn blocking_failure(e: BlockingError) -> PredictError {
    error!("Blocking task failed: {}", e);
    PredictError::InferenceFailure {
        detail: format!("blocking task failed: {}", e),
    }
}

pub async fn index() -> impl Responder {
    HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body("Backend running")
}

pub async fn healthz() -> impl Responder {
    HttpResponse::Ok().json(HealthStatus::ok())
}

fn readiness<E: std::fmt::Display>(outcome: Result<bool, E>) -> Readiness {
    let ready = outcome.unwrap_or_else(|e| {
        error!("Readiness check failed: {}", e);
        false
    });
    Readiness {
        ready,
        model_loaded: ready,
    }
}

pub async fn readyz(gateway: web::Data<ModelGateway>) -> impl Responder {
    let outcome = web::block(move || gateway.is_ready()).await;
    HttpResponse::Ok().json(readiness(outcome))
}

pub async fn model_info(gateway: web::Data<ModelGateway>) -> Result<HttpResponse, PredictError> {
    let info = web::block(move || gateway.model_info())
        .await
        .map_err(blocking_failure)??;
    Ok(HttpResponse::Ok().json(info))
}

pub async fn predict(
    gateway: web::Data<ModelGateway>,
    body: web::Json<Value>,
) -> Result<HttpResponse, PredictError> {
    let start_time = Instant::now();
    let body = body.into_inner();

    let response = web::block(move || pipeline::predict_json(&gateway, body))
        .await
        .map_err(blocking_failure)??;

    info!(
        "Prediction served: {} row(s) in {} ms",
        response.len(),
        start_time.elapsed().as_millis()
    );
    Ok(HttpResponse::Ok().json(response))
}

pub async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(ErrorBody::new("Endpoint not found").with_kind("NotFound"))
}

/// Malformed or non-JSON request bodies.
pub fn json_config(limit: usize) -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(limit)
        .error_handler(|err, _req| {
            let body = ErrorBody::new(format!("Invalid JSON body: {}", err))
                .with_kind(ErrorKind::InvalidPayloadStructure.as_str());
            InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
        })
}

/// Registers every endpoint. The gateway is expected as `web::Data<ModelGateway>`.
pub fn configure(json_limit: usize) -> impl FnOnce(&mut web::ServiceConfig) {
    move |cfg: &mut web::ServiceConfig| {
        cfg.app_data(json_config(json_limit))
            .route("/", web::get().to(index))
            .route("/healthz", web::get().to(healthz))
            .route("/readyz", web::get().to(readyz))
            .route("/model-info", web::get().to(model_info))
            .route("/predict", web::post().to(predict))
            .route("/api/predict", web::post().to(predict));
    }
}
