//! 重试 / 前进决策
//!
//! 纯函数：只看判定结果、剩余时间和已访问列表，不依赖任何外部资源

use std::time::Duration;

use crate::models::{CompletionReason, SubmissionVerdict};

/// 决策结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    /// 前往下一题（需要重新渲染）
    Advance(String),
    /// 用已解析的任务重新求解当前题
    RetrySame,
    /// 正常结束
    Complete(CompletionReason),
    /// 截止时间已过
    TimedOut,
}

/// 决策策略参数
#[derive(Debug, Clone, Copy)]
pub struct DecisionPolicy {
    /// 完成一轮求解所需的最短时间
    pub min_cycle: Duration,
    /// 答错且没有下一题时，同一题最多重试几次
    pub same_quiz_max_retries: usize,
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            min_cycle: Duration::from_secs(5),
            same_quiz_max_retries: 1,
        }
    }
}

impl DecisionPolicy {
    /// 根据判定结果决定下一步
    ///
    /// # 参数
    /// - `verdict`: 最近一次提交的判定
    /// - `remaining`: 距截止时间的剩余时长
    /// - `visited_urls`: 本次运行已访问的题目
    /// - `same_quiz_retries`: 当前题已经重试的次数
    pub fn decide(
        &self,
        verdict: &SubmissionVerdict,
        remaining: Duration,
        visited_urls: &[String],
        same_quiz_retries: usize,
    ) -> NextAction {
        if remaining.is_zero() {
            return NextAction::TimedOut;
        }

        // 空白或无法渲染的地址等同于没有下一题
        let next_url = verdict.renderable_next_url();
        let unvisited_next = next_url.filter(|next| !visited_urls.iter().any(|v| v == next));

        if verdict.correct {
            return match (next_url, unvisited_next) {
                (_, Some(next)) => NextAction::Advance(next.to_string()),
                (Some(_), None) => NextAction::Complete(CompletionReason::LoopDetected),
                (None, _) => NextAction::Complete(CompletionReason::ChainFinished),
            };
        }

        if remaining < self.min_cycle {
            return NextAction::Complete(CompletionReason::BudgetExhausted);
        }

        // 有新的下一题时优先前进，不在一道题上耗时间
        if let Some(next) = unvisited_next {
            return NextAction::Advance(next.to_string());
        }

        if same_quiz_retries < self.same_quiz_max_retries {
            NextAction::RetrySame
        } else {
            NextAction::Complete(CompletionReason::RetriesExhausted)
        }
    }
}
