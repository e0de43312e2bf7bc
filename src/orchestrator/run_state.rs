//! 单次运行的状态
//!
//! 只由一个编排器独占；进入终止状态后任何修改都是程序错误

use std::time::Duration;

use crate::models::{
    CompletionReason, FailureCategory, RunPhase, RunReport, RunStatus, SubmissionRecord,
    SubmissionVerdict,
};
use crate::workflow::Deadline;

/// 运行状态
#[derive(Debug)]
pub struct QuizRunState {
    run_id: String,
    deadline: Deadline,
    started_at: chrono::DateTime<chrono::Local>,
    visited_urls: Vec<String>,
    current_url: String,
    quizzes_solved: usize,
    last_verdict: Option<SubmissionVerdict>,
    phase: RunPhase,
    same_quiz_retries: usize,
    submissions: Vec<SubmissionRecord>,
    failure: Option<FailureCategory>,
    completion: Option<CompletionReason>,
}

impl QuizRunState {
    /// 创建一次运行：截止时间从此刻算起，初始题目记为已访问，处于 `Idle`
    pub fn start(run_id: impl Into<String>, initial_url: impl Into<String>, budget: Duration) -> Self {
        let initial_url = initial_url.into();
        Self {
            run_id: run_id.into(),
            deadline: Deadline::after(budget),
            started_at: chrono::Local::now(),
            visited_urls: vec![initial_url.clone()],
            current_url: initial_url,
            quizzes_solved: 0,
            last_verdict: None,
            phase: RunPhase::Idle,
            same_quiz_retries: 0,
            submissions: Vec::new(),
            failure: None,
            completion: None,
        }
    }

    pub fn deadline(&self) -> &Deadline {
        &self.deadline
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.remaining()
    }

    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn visited_urls(&self) -> &[String] {
        &self.visited_urls
    }

    pub fn quizzes_solved(&self) -> usize {
        self.quizzes_solved
    }

    pub fn last_verdict(&self) -> Option<&SubmissionVerdict> {
        self.last_verdict.as_ref()
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn same_quiz_retries(&self) -> usize {
        self.same_quiz_retries
    }

    pub fn is_finished(&self) -> bool {
        self.phase.is_terminal()
    }

    fn assert_active(&self) {
        assert!(
            !self.phase.is_terminal(),
            "运行 {} 已结束 ({})，不能再修改状态",
            self.run_id,
            self.phase.name()
        );
    }

    /// 进入下一个非终止阶段
    pub fn enter(&mut self, phase: RunPhase) {
        self.assert_active();
        assert!(!phase.is_terminal(), "终止状态只能通过 finish_* 进入");
        self.phase = phase;
    }

    /// 记录判定结果；答对计数加一
    pub fn record_verdict(&mut self, verdict: SubmissionVerdict, synthetic: bool) {
        self.assert_active();
        if verdict.correct {
            self.quizzes_solved += 1;
        }
        self.submissions.push(SubmissionRecord {
            quiz_url: self.current_url.clone(),
            correct: verdict.correct,
            synthetic,
        });
        self.last_verdict = Some(verdict);
    }

    /// 前往下一题（不能是已访问的题目）
    pub fn advance_to(&mut self, next_url: String) {
        self.assert_active();
        assert!(
            !self.visited_urls.contains(&next_url),
            "题目 {} 已访问过",
            next_url
        );
        self.visited_urls.push(next_url.clone());
        self.current_url = next_url;
        self.same_quiz_retries = 0;
        self.last_verdict = None;
        self.phase = RunPhase::Rendering;
    }

    /// 用已解析的任务重新求解当前题
    pub fn retry_same(&mut self) {
        self.assert_active();
        self.same_quiz_retries += 1;
        self.phase = RunPhase::Solving;
    }

    pub fn finish_completed(&mut self, reason: CompletionReason) {
        self.assert_active();
        self.completion = Some(reason);
        self.phase = RunPhase::Completed;
    }

    pub fn finish_timed_out(&mut self) {
        self.assert_active();
        self.phase = RunPhase::TimedOut;
    }

    pub fn finish_failed(&mut self, category: FailureCategory) {
        self.assert_active();
        self.failure = Some(category);
        self.phase = RunPhase::Failed;
    }

    pub fn status(&self) -> RunStatus {
        match self.phase {
            RunPhase::Completed => RunStatus::Completed,
            RunPhase::TimedOut => RunStatus::TimedOut,
            RunPhase::Failed => RunStatus::Failed,
            _ => RunStatus::InProgress,
        }
    }

    /// 生成最终报告
    pub fn into_report(self) -> RunReport {
        RunReport {
            status: self.status(),
            elapsed: self.deadline.elapsed(),
            run_id: self.run_id,
            failure: self.failure,
            completion: self.completion,
            quizzes_solved: self.quizzes_solved,
            visited_urls: self.visited_urls,
            submissions: self.submissions,
            started_at: self.started_at,
        }
    }
}
