use std::time::Duration;

use serde::Serialize;

/// 状态机所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// 已创建，尚未开始渲染第一题
    Idle,
    Rendering,
    Parsing,
    Solving,
    Submitting,
    Deciding,
    Completed,
    TimedOut,
    Failed,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::TimedOut | RunPhase::Failed)
    }

    pub fn name(self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Rendering => "rendering",
            RunPhase::Parsing => "parsing",
            RunPhase::Solving => "solving",
            RunPhase::Submitting => "submitting",
            RunPhase::Deciding => "deciding",
            RunPhase::Completed => "completed",
            RunPhase::TimedOut => "timed_out",
            RunPhase::Failed => "failed",
        }
    }
}

/// 运行状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    TimedOut,
    Failed,
}

impl RunStatus {
    pub fn name(self) -> &'static str {
        match self {
            RunStatus::InProgress => "in_progress",
            RunStatus::Completed => "completed",
            RunStatus::TimedOut => "timed_out",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// 渲染失败（重试一次后仍失败）
    Render,
    /// 解析失败（不重试）
    Parse,
    /// 求解失败（按答错处理，不会终止运行）
    Solve,
    /// 提交失败（重试耗尽）
    Submission,
}

impl FailureCategory {
    pub fn name(self) -> &'static str {
        match self {
            FailureCategory::Render => "render failure",
            FailureCategory::Parse => "parse failure",
            FailureCategory::Solve => "solve failure",
            FailureCategory::Submission => "submission failure",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 正常结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionReason {
    /// 答对且没有下一题
    ChainFinished,
    /// 下一题已经访问过
    LoopDetected,
    /// 剩余时间不足以再完成一轮求解
    BudgetExhausted,
    /// 同一题的重试次数用完
    RetriesExhausted,
}

/// 一次提交的记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmissionRecord {
    pub quiz_url: String,
    pub correct: bool,
    /// 答案未真正发出（求解失败或超出大小上限）
    pub synthetic: bool,
}

/// 一次运行的最终结果
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    pub failure: Option<FailureCategory>,
    pub completion: Option<CompletionReason>,
    pub quizzes_solved: usize,
    pub visited_urls: Vec<String>,
    pub submissions: Vec<SubmissionRecord>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    pub started_at: chrono::DateTime<chrono::Local>,
}

impl RunReport {
    /// 针对某一题实际发出的提交次数
    pub fn submissions_for(&self, quiz_url: &str) -> usize {
        self.submissions
            .iter()
            .filter(|s| s.quiz_url == quiz_url && !s.synthetic)
            .count()
    }
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serializes_to_json() {
        let report = RunReport {
            run_id: "run-1".to_string(),
            status: RunStatus::Completed,
            failure: None,
            completion: Some(CompletionReason::ChainFinished),
            quizzes_solved: 1,
            visited_urls: vec!["https://q/1".to_string()],
            submissions: vec![SubmissionRecord {
                quiz_url: "https://q/1".to_string(),
                correct: true,
                synthetic: false,
            }],
            elapsed: Duration::from_millis(1500),
            started_at: chrono::Local::now(),
        };

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["status"], "completed");
        assert_eq!(value["completion"], "chain_finished");
        assert_eq!(value["elapsed"], 1.5);
        assert!(value["started_at"].is_string());
    }
}
