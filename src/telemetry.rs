use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化日志：优先读取 RUST_LOG，否则使用 `default_filter`
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
