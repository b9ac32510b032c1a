use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::Linear;

use crate::features::{FeatureVector, FEATURE_COUNT};
use crate::metadata::{default_feature_info, FeatureInfo};

/// 统一的回归模型抽象：加载后只读，可以被多个推理线程同时调用
pub trait Regressor: Send + Sync {
    /// 模型族名称，出现在 `/model-info` 里
    fn model_type(&self) -> &str;

    /// 同步推理：8 个特征进，1 个价格出（原样返回，不做裁剪）
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    fn feature_info(&self) -> BTreeMap<String, FeatureInfo> {
        default_feature_info()
    }
}

/// 基于 Candle `Linear` 层的线性回归：y = x · wᵀ + b
pub struct LinearRegressor {
    linear: Linear,
    device: Device,
}

impl LinearRegressor {
    /// `weight` 需要 8 个元素（[8] 或 [1, 8]），`bias` 需要 1 个元素
    pub fn new(weight: Tensor, bias: Tensor) -> Result<Self> {
        if weight.elem_count() != FEATURE_COUNT {
            bail!(
                "weight tensor has {} elements, expected {}",
                weight.elem_count(),
                FEATURE_COUNT
            );
        }
        if bias.elem_count() != 1 {
            bail!("bias tensor has {} elements, expected 1", bias.elem_count());
        }

        let device = weight.device().clone();
        let weight = weight.to_dtype(DType::F64)?.reshape((1, FEATURE_COUNT))?;
        let bias = bias.to_dtype(DType::F64)?.reshape(1)?;

        Ok(Self {
            linear: Linear::new(weight, Some(bias)),
            device,
        })
    }

    pub fn from_coefficients(coefficients: &[f64; FEATURE_COUNT], intercept: f64) -> Result<Self> {
        let device = Device::Cpu;
        let weight = Tensor::from_slice(coefficients.as_slice(), (1, FEATURE_COUNT), &device)?;
        let bias = Tensor::new(&[intercept], &device)?;
        Self::new(weight, bias)
    }
}

impl Regressor for LinearRegressor {
    fn model_type(&self) -> &str {
        "Linear Regressor"
    }

    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let input = Tensor::from_slice(
            features.as_array().as_slice(),
            (1, FEATURE_COUNT),
            &self.device,
        )?;
        let output = self.linear.forward(&input)?.flatten_all()?.to_vec1::<f64>()?;
        output
            .first()
            .copied()
            .context("model produced an empty output tensor")
    }
}
