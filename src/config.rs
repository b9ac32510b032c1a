use std::path::PathBuf;
use std::sync::Arc;

use rocket::figment::providers::{Env, Format, Toml};
use rocket::figment::{Figment, Profile};
use serde::{Deserialize, Serialize};

use crate::model_store::{BaselineStore, ModelStore, SafetensorsStore};

/// 业务相关配置，和 Rocket 自己的配置一起从 Rocket.toml / ROCKET_* 环境变量读取
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// safetensors 模型文件；不填则使用内置基线模型
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    #[serde(default = "available_parallelism")]
    pub max_concurrent_infer: usize,

    /// 启动后在后台预加载模型
    #[serde(default = "default_true")]
    pub preload: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            max_concurrent_infer: available_parallelism(),
            preload: true,
        }
    }
}

impl ServiceConfig {
    pub fn store(&self) -> Arc<dyn ModelStore> {
        match &self.model_path {
            Some(path) => Arc::new(SafetensorsStore::new(path)),
            None => Arc::new(BaselineStore),
        }
    }
}

fn default_true() -> bool {
    true
}

pub fn available_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// 默认 worker 数：min(cpu, 4)
pub fn default_workers() -> usize {
    available_parallelism().min(4)
}

/// Rocket 默认配置 + 我们的 worker 默认值，再叠加 Rocket.toml 和环境变量
pub fn figment() -> Figment {
    Figment::from(rocket::Config::default())
        .merge(("workers", default_workers()))
        .merge(Toml::file(Env::var_or("ROCKET_CONFIG", "Rocket.toml")).nested())
        .merge(Env::prefixed("ROCKET_").ignore(&["PROFILE"]).global())
        .select(Profile::from_env_or(
            "ROCKET_PROFILE",
            rocket::Config::DEFAULT_PROFILE,
        ))
}
