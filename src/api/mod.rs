//! API 模块
//!
//! 对外的 HTTP 入口：触发运行、健康检查、指标

pub mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::orchestrator::RunDispatcher;

/// 处理请求时共享的状态
pub struct AppState {
    pub config: Config,
    pub dispatcher: RunDispatcher,
}

impl AppState {
    pub fn new(config: Config, dispatcher: RunDispatcher) -> Self {
        Self { config, dispatcher }
    }
}

/// 创建路由
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/quiz", post(handlers::trigger_quiz))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(state)
        .layer(axum_middleware::from_fn(middleware::metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
