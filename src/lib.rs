//! # Quiz Solver
//!
//! 自动求解限时题目链的服务：接收题目地址，渲染页面、提取任务、求解、提交，
//! 并根据判定结果在截止时间内前进或重试
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `browser/` - 启动或连接 Chrome
//! - `infrastructure/` - `JsExecutor`，唯一的 page owner，提供导航、eval、读取内容能力
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个能力只处理一道题
//! - `PageRenderer` / `TaskExtractor` / `AnswerEngine` / `SubmissionClient` - 能力接口
//! - `ChromePageRenderer` / `HtmlTaskExtractor` / `LlmAnswerEngine` / `HttpSubmissionClient` - 生产实现
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 一道题范围内的规则
//! - `Deadline` - 运行截止时间
//! - `DecisionPolicy` - 重试还是前进（纯函数）
//! - `RunCtx` - 日志上下文（运行ID + 题目序号）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/quiz_orchestrator` - 题目链状态机
//! - `orchestrator/dispatcher` - 脱离请求执行的运行调度，控制并发
//!
//! 入口：`api/`（axum）

pub mod api;
pub mod app;
pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use app::App;
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{Answer, AnswerFormat, QuizTask, RunReport, SubmissionVerdict};
pub use orchestrator::{QuizOrchestrator, RunDispatcher};
pub use workflow::{DecisionPolicy, NextAction, RunCtx};
