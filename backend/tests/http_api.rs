//! End-to-end tests for the HTTP surface, driven through `actix_web::test`
//! with an in-memory classifier in place of the ONNX artifact.

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use cardio_backend::{
    routes, ArtifactLoader, Capabilities, Classifier, FeatureMatrix, ModelGateway,
    PredictionResponse,
};

// ============================================================================
// Test doubles
// ============================================================================

/// Predicts 1 when `age` (column 0) is at least 55; probability = age / 100.
struct AgeRule {
    proba: bool,
}

impl Classifier for AgeRule {
    fn capabilities(&self) -> Capabilities {
        Capabilities {
            probability: self.proba,
        }
    }

    fn predict(&self, matrix: &FeatureMatrix) -> anyhow::Result<Vec<i64>> {
        Ok(matrix
            .rows()
            .iter()
            .map(|row| i64::from(row[0] >= 55.0))
            .collect())
    }

    fn predict_proba(&self, matrix: &FeatureMatrix) -> anyhow::Result<Vec<f32>> {
        Ok(matrix.rows().iter().map(|row| row[0] / 100.0).collect())
    }
}

struct Failing;

impl Classifier for Failing {
    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    fn predict(&self, _: &FeatureMatrix) -> anyhow::Result<Vec<i64>> {
        anyhow::bail!("secret internal path /opt/model/trees.bin")
    }
}

enum Artifact {
    WithProba,
    LabelsOnly,
    Broken,
    Missing,
}

impl ArtifactLoader for Artifact {
    fn load(&self) -> anyhow::Result<Box<dyn Classifier>> {
        match self {
            Artifact::WithProba => Ok(Box::new(AgeRule { proba: true })),
            Artifact::LabelsOnly => Ok(Box::new(AgeRule { proba: false })),
            Artifact::Broken => Ok(Box::new(Failing)),
            Artifact::Missing => anyhow::bail!("models/model.onnx: No such file or directory"),
        }
    }

    fn source(&self) -> String {
        "memory://heart".to_string()
    }
}

macro_rules! app {
    ($artifact:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(ModelGateway::new($artifact)))
                .configure(routes::configure(64 * 1024))
                .default_service(web::route().to(routes::not_found)),
        )
        .await
    };
}

fn row(age: f32) -> Vec<f32> {
    let mut row = vec![0.0; 13];
    row[0] = age;
    row
}

// ============================================================================
// Health and readiness
// ============================================================================

#[actix_web::test]
async fn test_healthz_is_unconditional() {
    let app = app!(Artifact::Missing);
    let req = test::TestRequest::get().uri("/healthz").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"status": "ok"}));
}

#[actix_web::test]
async fn test_readyz_reports_loaded_model() {
    let app = app!(Artifact::WithProba);
    let req = test::TestRequest::get().uri("/readyz").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"ready": true, "model_loaded": true}));
}

#[actix_web::test]
async fn test_readyz_reports_missing_model() {
    let app = app!(Artifact::Missing);
    let req = test::TestRequest::get().uri("/readyz").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"ready": false, "model_loaded": false}));
}

#[actix_web::test]
async fn test_model_info() {
    let app = app!(Artifact::LabelsOnly);
    let req = test::TestRequest::get().uri("/model-info").to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["source"], "memory://heart");
    assert_eq!(body["feature_count"], 13);
    assert_eq!(body["probability"], false);
    assert_eq!(body["features"][0], "age");
}

// ============================================================================
// Prediction shapes
// ============================================================================

#[actix_web::test]
async fn test_predict_single_named_row() {
    let app = app!(Artifact::WithProba);
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({"input": {"age": 75, "sex": 1, "cp": 3}}))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"prediction": 1, "probability": 0.75}));
}

#[actix_web::test]
async fn test_predict_empty_input_is_all_zero_row() {
    let app = app!(Artifact::WithProba);
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({"input": {}}))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"prediction": 0, "probability": 0.0}));
}

#[actix_web::test]
async fn test_predict_batch_shape_from_nested_values() {
    let app = app!(Artifact::WithProba);
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({ "values": [row(25.0), row(75.0)] }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body,
        json!({"predictions": [0, 1], "probabilities": [0.25, 0.75]})
    );
}

#[actix_web::test]
async fn test_predict_flat_values_is_single_shape() {
    let app = app!(Artifact::LabelsOnly);
    let req = test::TestRequest::post()
        .uri("/api/predict")
        .set_json(json!({ "values": row(60.0) }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body, json!({"prediction": 1, "probability": null}));
}

#[actix_web::test]
async fn test_batch_without_probability_and_round_trip() {
    let app = app!(Artifact::LabelsOnly);
    let ages = [30.0, 80.0, 55.0, 54.0];
    let inputs: Vec<Value> = ages.iter().map(|age| json!({ "age": age })).collect();
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(json!({ "input": inputs }))
        .to_request();
    let parsed: PredictionResponse = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        parsed,
        PredictionResponse::Batch {
            predictions: vec![0, 1, 1, 0],
            probabilities: None
        }
    );
}

// ============================================================================
// Error mapping
// ============================================================================

async fn post_error(artifact: Artifact, payload: Value) -> (StatusCode, Value) {
    let app = app!(artifact);
    let req = test::TestRequest::post()
        .uri("/predict")
        .set_json(payload)
        .to_request();
    let resp = test::call_service(&app, req).await;
    let status = resp.status();
    let body: Value = test::read_body_json(resp).await;
    (status, body)
}

#[actix_web::test]
async fn test_missing_payload_is_422() {
    let (status, body) = post_error(Artifact::WithProba, json!({"other": 1})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["kind"], "MissingPayload");
}

#[actix_web::test]
async fn test_empty_values_is_400() {
    let (status, body) = post_error(Artifact::WithProba, json!({"values": []})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({"error": "Empty 'values' provided", "kind": "InvalidFeatureShape"})
    );
}

#[actix_web::test]
async fn test_input_list_with_scalar_is_400() {
    let (status, body) = post_error(Artifact::WithProba, json!({"input": [{"age": 1}, "x"]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidPayloadStructure");
}

#[actix_web::test]
async fn test_wrong_row_length_is_400() {
    let (status, body) = post_error(Artifact::WithProba, json!({"values": [[1, 2, 3]]})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["kind"], "InvalidFeatureShape");
}

#[actix_web::test]
async fn test_unavailable_model_is_503() {
    let (status, body) = post_error(Artifact::Missing, json!({"input": {"age": 60}})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"error": "Model not available", "kind": "ModelUnavailable"}));
}

#[actix_web::test]
async fn test_inference_failure_is_500_without_detail() {
    let (status, body) = post_error(Artifact::Broken, json!({"input": {"age": 60}})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Prediction error", "kind": "InferenceFailure"}));
    assert!(!body.to_string().contains("/opt/model"));
}

#[actix_web::test]
async fn test_malformed_json_is_400() {
    let app = app!(Artifact::WithProba);
    let req = test::TestRequest::post()
        .uri("/predict")
        .insert_header(("content-type", "application/json"))
        .set_payload("{\"input\": ")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["kind"], "InvalidPayloadStructure");
}

#[actix_web::test]
async fn test_unknown_route_is_404() {
    let app = app!(Artifact::WithProba);
    let req = test::TestRequest::get().uri("/metrics").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Endpoint not found");
}
