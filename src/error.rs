use thiserror::Error;

use crate::metadata::ModelStatus;

/// 请求体不符合特征向量约定：客户端错误，映射为 400
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Request body must contain a `features` array")]
    MissingFeatures,

    #[error("Expected {expected} features, got {actual}")]
    WrongFeatureCount { expected: usize, actual: usize },

    #[error("Feature at position {index} is not a number")]
    MalformedFeature { index: usize },

    #[error("Feature at position {index} is not a finite number")]
    NonFiniteFeature { index: usize },

    #[error("Feature at position {index} exceeds the supported magnitude {limit:e}")]
    FeatureOutOfRange { index: usize, limit: f64 },
}

/// 校验通过之后出现的服务端错误：映射为 500，细节只写日志
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("model failed to load: {0:#}")]
    Load(anyhow::Error),

    #[error("inference failed: {0:#}")]
    Inference(anyhow::Error),

    #[error("model metadata unavailable (status = {status:?})")]
    Metadata { status: ModelStatus },
}
