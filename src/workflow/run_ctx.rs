//! 运行上下文
//!
//! 封装"我正在处理哪次运行的第几题"这一信息，用于日志

use std::fmt::Display;

/// 运行上下文
#[derive(Debug, Clone)]
pub struct RunCtx {
    /// 运行ID
    pub run_id: String,

    /// 触发本次运行的身份
    pub email: String,

    /// 当前题目序号（从1开始）
    pub quiz_index: usize,
}

impl RunCtx {
    /// 创建新的运行上下文
    pub fn new(run_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            email: email.into(),
            quiz_index: 1,
        }
    }

    /// 进入下一题
    pub fn next_quiz(&mut self) {
        self.quiz_index += 1;
    }
}

impl Display for RunCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{} 第{}题]", self.run_id, self.quiz_index)
    }
}
