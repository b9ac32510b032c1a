pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod metadata;
pub mod model_store;
pub mod service;
pub mod telemetry;
pub mod types;

use std::sync::Arc;

use rocket::fairing::AdHoc;
use rocket::figment::Figment;
use rocket::{catchers, routes, Build, Rocket};
use tracing::{debug, error, info, warn};

use api::{default_catcher, health, model_info, predict};
use config::ServiceConfig;
use service::ModelService;

/// 挂载路由和 catcher，不涉及状态
pub fn mount(rocket: Rocket<Build>) -> Rocket<Build> {
    rocket
        .mount("/", routes![health, model_info, predict])
        .register("/", catchers![default_catcher])
        .attach(AdHoc::on_response("Request log", |req, res| {
            Box::pin(async move {
                debug!(
                    method = %req.method(),
                    uri = %req.uri(),
                    status = res.status().code,
                    "request handled"
                );
            })
        }))
}

/// 使用已构造好的服务（测试或嵌入场景）
pub fn with_service(rocket: Rocket<Build>, service: Arc<ModelService>) -> Rocket<Build> {
    mount(rocket).manage(service)
}

/// 生产入口：配置来自 Rocket.toml / ROCKET_* 环境变量
pub fn rocket() -> Rocket<Build> {
    rocket_with(config::figment())
}

/// 从给定配置构造服务；开启 preload 时在点火阶段等待模型加载完成，
/// 端口绑定之前模型就已经可用
pub fn rocket_with(figment: Figment) -> Rocket<Build> {
    mount(rocket::custom(figment)).attach(AdHoc::try_on_ignite(
        "Model service",
        |rocket| async move {
            let extracted = rocket.figment().extract::<ServiceConfig>();
            let config = match extracted {
                Ok(config) => config,
                Err(e) => {
                    error!(error = %e, "invalid service configuration");
                    return Err(rocket);
                }
            };

            let store = config.store();
            info!(
                source = %store.source(),
                max_concurrent_infer = config.max_concurrent_infer,
                preload = config.preload,
                "model service configured"
            );
            let service = ModelService::new(store, config.max_concurrent_infer);

            if config.preload {
                if let Err(e) = service.ensure_loaded().await {
                    warn!(error = %e, "model preload failed, will retry on first request");
                }
            }

            Ok(rocket.manage(service))
        },
    ))
}
