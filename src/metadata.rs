use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::features::Feature;

pub const DATASET_NAME: &str = "California Housing Dataset";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModelStatus {
    Unloaded,
    Loading,
    Loaded,
    Error,
}

/// 单个特征的说明
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInfo {
    pub position: usize,
    pub description: String,
}

impl FeatureInfo {
    pub fn of(feature: Feature) -> Self {
        Self {
            position: feature.position(),
            description: feature.description().to_string(),
        }
    }
}

/// 模型静态信息：加载完成时计算一次，之后只读
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelMetadata {
    pub model_type: String,
    pub dataset: String,
    pub features: BTreeMap<String, FeatureInfo>,
}

impl ModelMetadata {
    pub fn new(model_type: &str, features: BTreeMap<String, FeatureInfo>) -> Self {
        Self {
            model_type: model_type.to_string(),
            dataset: DATASET_NAME.to_string(),
            features,
        }
    }
}

/// 默认的特征说明表
pub fn default_feature_info() -> BTreeMap<String, FeatureInfo> {
    Feature::ALL
        .iter()
        .map(|f| (f.name().to_string(), FeatureInfo::of(*f)))
        .collect()
}
