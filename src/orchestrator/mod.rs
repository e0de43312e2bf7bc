//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `dispatcher` - 运行调度器
//! - 每个被接受的请求启动一个脱离请求的运行
//! - 控制并发数量（Semaphore）
//! - 每次运行创建独立的协作者（浏览器不共享）
//! - 汇总日志和指标
//!
//! ### `quiz_orchestrator` - 题目链编排器
//! - 截止时间内的 渲染 → 解析 → 求解 → 提交 → 决策 循环
//!
//! ### `run_state` - 单次运行状态
//!
//! ## 层次关系
//!
//! ```text
//! dispatcher (处理多个并发运行)
//!     ↓
//! quiz_orchestrator (处理一条题目链)
//!     ↓
//! workflow (截止时间 / 决策 / 日志上下文)
//!     ↓
//! services (能力层：render / extract / solve / submit)
//!     ↓
//! infrastructure (基础设施：JsExecutor)
//! ```

pub mod dispatcher;
pub mod quiz_orchestrator;
pub mod run_state;

pub use dispatcher::RunDispatcher;
pub use quiz_orchestrator::{OrchestratorSettings, QuizOrchestrator};
pub use run_state::QuizRunState;
