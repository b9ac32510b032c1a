use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::metadata::{FeatureInfo, ModelMetadata};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfoResponse {
    pub model_type: String,
    pub dataset: String,
    pub features: BTreeMap<String, FeatureInfo>,
}

impl From<ModelMetadata> for ModelInfoResponse {
    fn from(meta: ModelMetadata) -> Self {
        Self {
            model_type: meta.model_type,
            dataset: meta.dataset,
            features: meta.features,
        }
    }
}

/// `/predict` 的请求体；服务端按原始 JSON 校验，这个类型给客户端用
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictRequest {
    pub features: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub prediction: f64,
    pub status: String,
    pub features_used: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub detail: String,
}

impl ErrorResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            detail: detail.into(),
        }
    }
}
