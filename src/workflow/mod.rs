//! 流程层（Workflow）
//!
//! 一道题范围内的计时、决策和日志上下文

pub mod deadline;
pub mod decision;
pub mod run_ctx;

pub use deadline::Deadline;
pub use decision::{DecisionPolicy, NextAction};
pub use run_ctx::RunCtx;
