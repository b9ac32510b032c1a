use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use candle_core::Device;

use crate::engine::{LinearRegressor, Regressor};
use crate::features::FEATURE_COUNT;

/// 在 California Housing 全量数据上用最小二乘拟合得到的系数，
/// 顺序与 `Feature::ALL` 一致；目标值单位为 10 万美元
pub const BASELINE_COEFFICIENTS: [f64; FEATURE_COUNT] = [
    4.366_932_93e-1,
    9.435_778_03e-3,
    -1.073_220_41e-1,
    6.450_656_94e-1,
    -3.976_389_42e-6,
    -3.786_542_65e-3,
    -4.213_143_78e-1,
    -4.345_137_55e-1,
];
pub const BASELINE_INTERCEPT: f64 = -36.941_920_207_184_41;

/// 模型的后端存储：负责把持久化的模型变成内存里的 Regressor
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// 日志里展示的来源描述
    fn source(&self) -> String;

    async fn load(&self) -> Result<Arc<dyn Regressor>>;
}

/// 内置基线模型，不依赖任何文件
#[derive(Debug, Default, Clone, Copy)]
pub struct BaselineStore;

#[async_trait]
impl ModelStore for BaselineStore {
    fn source(&self) -> String {
        "built-in baseline coefficients".to_string()
    }

    async fn load(&self) -> Result<Arc<dyn Regressor>> {
        let model = LinearRegressor::from_coefficients(&BASELINE_COEFFICIENTS, BASELINE_INTERCEPT)?;
        Ok(Arc::new(model))
    }
}

/// 从本地 safetensors 文件读取 `weight` / `bias` 两个张量
#[derive(Debug, Clone)]
pub struct SafetensorsStore {
    path: PathBuf,
}

impl SafetensorsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ModelStore for SafetensorsStore {
    fn source(&self) -> String {
        format!("safetensors file {}", self.path.display())
    }

    async fn load(&self) -> Result<Arc<dyn Regressor>> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .with_context(|| format!("failed to read {}", self.path.display()))?;

        let mut tensors = candle_core::safetensors::load_buffer(&bytes, &Device::Cpu)
            .with_context(|| format!("failed to decode {}", self.path.display()))?;

        let weight = tensors
            .remove("weight")
            .context("artifact has no `weight` tensor")?;
        let bias = tensors.remove("bias").context("artifact has no `bias` tensor")?;

        let model = LinearRegressor::new(weight, bias)
            .with_context(|| format!("invalid linear model in {}", self.path.display()))?;
        Ok(Arc::new(model))
    }
}
