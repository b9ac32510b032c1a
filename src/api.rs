use std::sync::Arc;

use rocket::http::Status;
use rocket::serde::json::{self, Json, Value};
use rocket::{catch, get, post, Request, Responder, State};
use tracing::{debug, error, warn};

use crate::error::ValidationError;
use crate::features;
use crate::service::ModelService;
use crate::types::{ErrorResponse, HealthResponse, ModelInfoResponse, PredictionResponse};

const MODEL_INFO_ERROR: &str = "Error retrieving model information";
const PREDICTION_ERROR: &str = "Prediction error";

/// 对外的错误响应：400 带具体原因，500 只给通用提示
#[derive(Debug, Responder)]
pub enum ApiError {
    #[response(status = 400)]
    BadRequest(Json<ErrorResponse>),
    #[response(status = 500)]
    Internal(Json<ErrorResponse>),
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        ApiError::BadRequest(Json(ErrorResponse::new(detail)))
    }

    pub fn internal(detail: &str) -> Self {
        ApiError::Internal(Json(ErrorResponse::new(detail)))
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::bad_request(e.to_string())
    }
}

#[get("/health")]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        message: "Service is operational".to_string(),
    })
}

#[get("/model-info")]
pub async fn model_info(
    service: &State<Arc<ModelService>>,
) -> Result<Json<ModelInfoResponse>, ApiError> {
    // 未预加载时由第一次请求触发加载
    let described = service.ensure_loaded().await.and_then(|()| service.describe());
    match described {
        Ok(meta) => Ok(Json(meta.into())),
        Err(e) => {
            error!(error = %e, "model info unavailable");
            Err(ApiError::internal(MODEL_INFO_ERROR))
        }
    }
}

#[post("/predict", data = "<body>")]
pub async fn predict(
    service: &State<Arc<ModelService>>,
    body: Result<Json<Value>, json::Error<'_>>,
) -> Result<Json<PredictionResponse>, ApiError> {
    let payload = body.map_err(|e| {
        debug!(error = ?e, "predict body is not valid JSON");
        ApiError::bad_request("Request body is not valid JSON")
    })?;

    // 校验失败直接返回 400，不占用推理线程
    let features = features::validate(&payload).map_err(|e| {
        warn!(error = %e, "rejected predict request");
        ApiError::from(e)
    })?;

    let prediction = service.predict(features).await.map_err(|e| {
        error!(error = %e, "prediction failed");
        ApiError::internal(PREDICTION_ERROR)
    })?;

    Ok(Json(PredictionResponse {
        prediction,
        status: "success".to_string(),
        features_used: features.to_vec(),
    }))
}

/// 未匹配路由、框架层错误等同样返回 JSON
#[catch(default)]
pub fn default_catcher(status: Status, req: &Request<'_>) -> (Status, Json<ErrorResponse>) {
    debug!(method = %req.method(), uri = %req.uri(), code = status.code, "caught");
    let detail = status.reason().unwrap_or("Unknown Error");
    (status, Json(ErrorResponse::new(detail)))
}
