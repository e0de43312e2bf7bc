use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

use crate::api::{self, AppState};
use crate::config::Config;
use crate::orchestrator::{OrchestratorSettings, RunDispatcher};
use crate::services::{ChromeCollaboratorFactory, CollaboratorFactory};
use crate::utils::logging;

/// 应用主结构
pub struct App {
    config: Config,
    state: Arc<AppState>,
}

impl App {
    /// 使用生产环境的协作者初始化应用
    pub fn initialize(config: Config) -> Self {
        let factory = Arc::new(ChromeCollaboratorFactory::new(config.clone()));
        Self::with_factory(config, factory)
    }

    /// 使用指定的协作者工厂初始化应用
    pub fn with_factory(config: Config, factory: Arc<dyn CollaboratorFactory>) -> Self {
        logging::log_startup(&config);

        let dispatcher = RunDispatcher::new(
            factory,
            OrchestratorSettings::from_config(&config),
            config.max_concurrent_runs,
        );
        let state = Arc::new(AppState::new(config.clone(), dispatcher));

        Self { config, state }
    }

    pub fn router(&self) -> axum::Router {
        api::create_router(self.state.clone())
    }

    /// 绑定端口并运行 HTTP 服务，直到收到 Ctrl+C
    pub async fn run(self) -> Result<()> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("监听 {} 失败", addr))?;
        info!("✓ HTTP 服务已启动: http://{}", addr);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("HTTP 服务异常退出")?;

        info!("👋 服务已停止");
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("收到退出信号，正在停止服务...");
    }
}
