//! 运行调度器 - 编排层
//!
//! ## 职责
//!
//! 1. **脱离请求执行**：每个被接受的请求启动一个独立的 tokio 任务
//! 2. **并发控制**：使用 Semaphore 限制同时进行的运行数量
//! 3. **资源隔离**：每次运行通过工厂创建自己的协作者（包括浏览器）
//! 4. **运行监督**：任务的失败和 panic 只记录日志和指标，不会回到 HTTP 调用方

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::metrics;
use crate::models::{Identity, RunReport};
use crate::orchestrator::quiz_orchestrator::{OrchestratorSettings, QuizOrchestrator};
use crate::services::CollaboratorFactory;
use crate::utils::logging;

/// 运行调度器
#[derive(Clone)]
pub struct RunDispatcher {
    factory: Arc<dyn CollaboratorFactory>,
    settings: OrchestratorSettings,
    semaphore: Arc<Semaphore>,
    next_run: Arc<AtomicU64>,
}

impl RunDispatcher {
    /// 创建调度器
    ///
    /// # 参数
    /// - `factory`: 每次运行调用一次的协作者工厂
    /// - `settings`: 编排参数
    /// - `max_concurrent`: 同时进行的运行数量上限
    pub fn new(
        factory: Arc<dyn CollaboratorFactory>,
        settings: OrchestratorSettings,
        max_concurrent: usize,
    ) -> Self {
        Self {
            factory,
            settings,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            next_run: Arc::new(AtomicU64::new(1)),
        }
    }

    /// 启动一次脱离请求的运行
    ///
    /// 立即返回；返回的句柄只用于测试或关闭时等待，调用方可以直接丢弃
    pub fn dispatch(&self, identity: Identity, url: String) -> JoinHandle<Option<RunReport>> {
        let run_id = format!("run-{}", self.next_run.fetch_add(1, Ordering::Relaxed));
        info!("[{}] 📥 已接受请求: {} ({})", run_id, url, identity.email);

        let dispatcher = self.clone();
        let supervised_id = run_id.clone();
        let worker = tokio::spawn(async move { dispatcher.execute(run_id, identity, url).await });

        // 监督任务：捕获 panic，保证活动计数不泄漏
        tokio::spawn(async move {
            match worker.await {
                Ok(report) => report,
                Err(e) => {
                    error!("[{}] ❌ 运行任务异常退出: {}", supervised_id, e);
                    metrics::RUNS_TOTAL.with_label_values(&["panicked"]).inc();
                    None
                }
            }
        })
    }

    async fn execute(&self, run_id: String, identity: Identity, url: String) -> Option<RunReport> {
        let _permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("[{}] ❌ 获取运行许可失败: {}", run_id, e);
                return None;
            }
        };
        let _active = ActiveRunGuard::new();

        let collaborators = match self.factory.create().await {
            Ok(collaborators) => collaborators,
            Err(e) => {
                error!("[{}] ❌ 初始化协作者失败: {}", run_id, e);
                metrics::RUNS_TOTAL.with_label_values(&["setup_failed"]).inc();
                return None;
            }
        };

        let orchestrator = QuizOrchestrator::new(collaborators, self.settings);
        let report = orchestrator.run(&run_id, &identity, &url).await;
        orchestrator.shutdown().await;

        logging::print_run_summary(&report);
        metrics::record_run(&report);
        Some(report)
    }
}

/// 活动运行计数，drop 时自动减一（包括 panic 展开）
struct ActiveRunGuard;

impl ActiveRunGuard {
    fn new() -> Self {
        metrics::RUNS_ACTIVE.inc();
        Self
    }
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        metrics::RUNS_ACTIVE.dec();
    }
}
