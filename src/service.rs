use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use parking_lot::RwLock;
use tokio::sync::{OnceCell, Semaphore};
use tracing::{error, info};

use crate::engine::Regressor;
use crate::error::ServiceError;
use crate::features::FeatureVector;
use crate::metadata::{ModelMetadata, ModelStatus};
use crate::model_store::ModelStore;

/// 加载过程中被取消（future 被 drop）时，把状态恢复成加载前的值
struct LoadingGuard<'a> {
    status: &'a RwLock<ModelStatus>,
    previous: ModelStatus,
    armed: bool,
}

impl<'a> LoadingGuard<'a> {
    fn enter(status: &'a RwLock<ModelStatus>) -> Self {
        let previous = std::mem::replace(&mut *status.write(), ModelStatus::Loading);
        Self {
            status,
            previous,
            armed: true,
        }
    }

    fn finish(mut self, status: ModelStatus) {
        *self.status.write() = status;
        self.armed = false;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.status.write() = self.previous;
        }
    }
}

struct LoadedModel {
    regressor: Arc<dyn Regressor>,
    metadata: ModelMetadata,
}

/// 进程内唯一的模型服务：
/// - store: 模型的后端存储，只会被成功加载一次
/// - loaded: 一次性初始化屏障，加载完成后只读
/// - semaphore: 控制最多 N 个并发推理任务
pub struct ModelService {
    store: Arc<dyn ModelStore>,
    loaded: OnceCell<LoadedModel>,
    status: RwLock<ModelStatus>,
    semaphore: Arc<Semaphore>,
    max_concurrent_infer: usize,
}

impl ModelService {
    pub fn new(store: Arc<dyn ModelStore>, max_concurrent_infer: usize) -> Arc<Self> {
        let max_concurrent_infer = max_concurrent_infer.max(1);
        Arc::new(Self {
            store,
            loaded: OnceCell::new(),
            status: RwLock::new(ModelStatus::Unloaded),
            semaphore: Arc::new(Semaphore::new(max_concurrent_infer)),
            max_concurrent_infer,
        })
    }

    pub fn status(&self) -> ModelStatus {
        *self.status.read()
    }

    pub fn max_concurrent_infer(&self) -> usize {
        self.max_concurrent_infer
    }

    /// 确保模型已加载。并发调用者会等待同一次加载；
    /// 加载失败时状态记为 Error，下一个调用者会重新尝试。
    pub async fn ensure_loaded(&self) -> Result<(), ServiceError> {
        self.loaded_model().await.map(|_| ())
    }

    /// 返回缓存的模型信息；模型尚未加载完成时报错
    pub fn describe(&self) -> Result<ModelMetadata, ServiceError> {
        self.loaded
            .get()
            .map(|m| m.metadata.clone())
            .ok_or_else(|| ServiceError::Metadata {
                status: self.status(),
            })
    }

    /// 推理：等待加载屏障，拿到并发许可后放到 blocking 线程池执行
    pub async fn predict(&self, features: FeatureVector) -> Result<f64, ServiceError> {
        let regressor = Arc::clone(&self.loaded_model().await?.regressor);

        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|e| ServiceError::Inference(anyhow!(e)))?;

        let joined = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            regressor.predict(&features)
        })
        .await;

        let price = match joined {
            Ok(Ok(price)) => price,
            Ok(Err(e)) => return Err(ServiceError::Inference(e)),
            Err(e) => {
                return Err(ServiceError::Inference(anyhow!(
                    "inference worker failed: {e}"
                )))
            }
        };

        if !price.is_finite() {
            return Err(ServiceError::Inference(anyhow!(
                "model produced a non-finite output: {price}"
            )));
        }
        Ok(price)
    }

    async fn loaded_model(&self) -> Result<&LoadedModel, ServiceError> {
        self.loaded.get_or_try_init(|| self.load()).await
    }

    async fn load(&self) -> Result<LoadedModel, ServiceError> {
        let guard = LoadingGuard::enter(&self.status);
        let source = self.store.source();
        info!(%source, "loading model");
        let start = Instant::now();

        match self.store.load().await {
            Ok(regressor) => {
                let metadata = ModelMetadata::new(regressor.model_type(), regressor.feature_info());
                guard.finish(ModelStatus::Loaded);
                info!(
                    %source,
                    model_type = %metadata.model_type,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "model loaded"
                );
                Ok(LoadedModel {
                    regressor,
                    metadata,
                })
            }
            Err(e) => {
                guard.finish(ModelStatus::Error);
                error!(%source, error = %format!("{e:#}"), "model load failed");
                Err(ServiceError::Load(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use anyhow::{bail, Result};
    use async_trait::async_trait;

    use super::*;
    use crate::features::FEATURE_COUNT;

    struct SumRegressor;

    impl Regressor for SumRegressor {
        fn model_type(&self) -> &str {
            "Sum"
        }

        fn predict(&self, features: &FeatureVector) -> Result<f64> {
            Ok(features.as_array().iter().sum())
        }
    }

    struct NanRegressor;

    impl Regressor for NanRegressor {
        fn model_type(&self) -> &str {
            "Nan"
        }

        fn predict(&self, _features: &FeatureVector) -> Result<f64> {
            Ok(f64::NAN)
        }
    }

    struct PanickingRegressor;

    impl Regressor for PanickingRegressor {
        fn model_type(&self) -> &str {
            "Panic"
        }

        fn predict(&self, _features: &FeatureVector) -> Result<f64> {
            panic!("boom")
        }
    }

    /// 记录 load 次数；前 `failures` 次加载失败
    struct CountingStore {
        loads: AtomicUsize,
        failures: usize,
        delay: Duration,
        regressor: fn() -> Arc<dyn Regressor>,
    }

    impl CountingStore {
        fn new(regressor: fn() -> Arc<dyn Regressor>) -> Arc<Self> {
            Arc::new(Self {
                loads: AtomicUsize::new(0),
                failures: 0,
                delay: Duration::ZERO,
                regressor,
            })
        }
    }

    #[async_trait]
    impl ModelStore for CountingStore {
        fn source(&self) -> String {
            "counting".to_string()
        }

        async fn load(&self) -> Result<Arc<dyn Regressor>> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if n < self.failures {
                bail!("disk on fire");
            }
            Ok((self.regressor)())
        }
    }

    fn sum() -> Arc<dyn Regressor> {
        Arc::new(SumRegressor)
    }

    fn nan() -> Arc<dyn Regressor> {
        Arc::new(NanRegressor)
    }

    fn panicking() -> Arc<dyn Regressor> {
        Arc::new(PanickingRegressor)
    }

    fn vector(seed: f64) -> FeatureVector {
        FeatureVector::new([seed; FEATURE_COUNT]).unwrap()
    }

    #[tokio::test]
    async fn concurrent_first_requests_load_once() {
        let store = Arc::new(CountingStore {
            loads: AtomicUsize::new(0),
            failures: 0,
            delay: Duration::from_millis(50),
            regressor: sum,
        });
        let service = ModelService::new(store.clone(), 2);

        let (a, b, c) = tokio::join!(
            service.predict(vector(1.0)),
            service.predict(vector(2.0)),
            service.predict(vector(3.0)),
        );

        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert_eq!(a.unwrap(), 8.0);
        assert_eq!(b.unwrap(), 16.0);
        assert_eq!(c.unwrap(), 24.0);
        assert_eq!(service.status(), ModelStatus::Loaded);
    }

    #[tokio::test]
    async fn describe_requires_loaded_model() {
        let service = ModelService::new(CountingStore::new(sum), 1);
        assert!(matches!(
            service.describe(),
            Err(ServiceError::Metadata {
                status: ModelStatus::Unloaded
            })
        ));

        service.ensure_loaded().await.unwrap();
        let meta = service.describe().unwrap();
        assert_eq!(meta.model_type, "Sum");
        assert_eq!(meta.features.len(), FEATURE_COUNT);
    }

    #[tokio::test]
    async fn failed_load_is_distinct_and_retryable() {
        let store = Arc::new(CountingStore {
            loads: AtomicUsize::new(0),
            failures: 1,
            delay: Duration::ZERO,
            regressor: sum,
        });
        let service = ModelService::new(store.clone(), 1);

        let err = service.predict(vector(1.0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Load(_)));
        assert_eq!(service.status(), ModelStatus::Error);
        assert!(matches!(
            service.describe(),
            Err(ServiceError::Metadata {
                status: ModelStatus::Error
            })
        ));

        assert_eq!(service.predict(vector(1.0)).await.unwrap(), 8.0);
        assert_eq!(store.loads.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancelled_load_restores_previous_status() {
        let store = Arc::new(CountingStore {
            loads: AtomicUsize::new(0),
            failures: 0,
            delay: Duration::from_secs(30),
            regressor: sum,
        });
        let service = ModelService::new(store.clone(), 1);

        let attempt = tokio::time::timeout(Duration::from_millis(20), service.ensure_loaded()).await;
        assert!(attempt.is_err());
        assert_eq!(store.loads.load(Ordering::SeqCst), 1);
        assert_eq!(service.status(), ModelStatus::Unloaded);
        assert!(matches!(
            service.describe(),
            Err(ServiceError::Metadata {
                status: ModelStatus::Unloaded
            })
        ));
    }

    #[tokio::test]
    async fn non_finite_output_is_an_inference_error() {
        let service = ModelService::new(CountingStore::new(nan), 1);
        let err = service.predict(vector(1.0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Inference(_)));
    }

    #[tokio::test]
    async fn panicking_worker_is_an_inference_error() {
        let service = ModelService::new(CountingStore::new(panicking), 1);
        let err = service.predict(vector(1.0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Inference(_)));

        // 许可随 panic 一起释放，服务仍然可用
        let err = service.predict(vector(2.0)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Inference(_)));
    }

    #[tokio::test]
    async fn zero_concurrency_is_clamped_to_one() {
        let service = ModelService::new(CountingStore::new(sum), 0);
        assert_eq!(service.max_concurrent_infer(), 1);
        assert_eq!(service.predict(vector(0.5)).await.unwrap(), 4.0);
    }
}
