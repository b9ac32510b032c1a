use rocket::serde::json::Value;
use serde::Serialize;

use crate::error::ValidationError;

/// 特征个数：California Housing 数据集固定 8 列
pub const FEATURE_COUNT: usize = 8;

/// 单个特征允许的最大绝对值；远超真实数据（人口最多约 3.6 万），
/// 同时保证线性模型的输出不会溢出成 inf
pub const MAX_FEATURE_MAGNITUDE: f64 = 1e9;

/// 8 个输入特征，顺序即模型输入的位置顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    MedInc,
    HouseAge,
    AveRooms,
    AveBedrms,
    Population,
    AveOccup,
    Latitude,
    Longitude,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::MedInc,
        Feature::HouseAge,
        Feature::AveRooms,
        Feature::AveBedrms,
        Feature::Population,
        Feature::AveOccup,
        Feature::Latitude,
        Feature::Longitude,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Feature::MedInc => "MedInc",
            Feature::HouseAge => "HouseAge",
            Feature::AveRooms => "AveRooms",
            Feature::AveBedrms => "AveBedrms",
            Feature::Population => "Population",
            Feature::AveOccup => "AveOccup",
            Feature::Latitude => "Latitude",
            Feature::Longitude => "Longitude",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Feature::MedInc => "median income in block group (tens of thousands of dollars)",
            Feature::HouseAge => "median house age in block group (years)",
            Feature::AveRooms => "average number of rooms per household",
            Feature::AveBedrms => "average number of bedrooms per household",
            Feature::Population => "block group population",
            Feature::AveOccup => "average number of household members",
            Feature::Latitude => "block group latitude (degrees)",
            Feature::Longitude => "block group longitude (degrees)",
        }
    }

    pub fn position(self) -> usize {
        self as usize
    }
}

/// 一次请求的输入向量：构造后不可变，所有值保证有限
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Result<Self, ValidationError> {
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(ValidationError::NonFiniteFeature { index });
        }
        if let Some(index) = values.iter().position(|v| v.abs() > MAX_FEATURE_MAGNITUDE) {
            return Err(ValidationError::FeatureOutOfRange {
                index,
                limit: MAX_FEATURE_MAGNITUDE,
            });
        }
        Ok(Self(values))
    }

    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.position()]
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}

/// 校验请求体：`features` 必须是长度为 8 的数值数组。
///
/// 先检查长度再检查元素类型，这样 `[1.0, 2.0]` 总是得到计数错误。
/// 数值字符串（如 `"8.3"`）会被宽松地转换成浮点数。
pub fn validate(payload: &Value) -> Result<FeatureVector, ValidationError> {
    let items = payload
        .get("features")
        .and_then(Value::as_array)
        .ok_or(ValidationError::MissingFeatures)?;

    if items.len() != FEATURE_COUNT {
        return Err(ValidationError::WrongFeatureCount {
            expected: FEATURE_COUNT,
            actual: items.len(),
        });
    }

    let mut values = [0.0; FEATURE_COUNT];
    for (index, (slot, item)) in values.iter_mut().zip(items).enumerate() {
        *slot = coerce(item).ok_or(ValidationError::MalformedFeature { index })?;
    }

    FeatureVector::new(values)
}

fn coerce(item: &Value) -> Option<f64> {
    match item {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}
