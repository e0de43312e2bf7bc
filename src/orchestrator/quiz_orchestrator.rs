//! 题目链编排器 - 编排层
//!
//! ## 职责
//!
//! 在一个截止时间内驱动 渲染 → 解析 → 求解 → 提交 → 决策 的循环，
//! 直到题目链结束、超时或失败。
//!
//! ## 设计特点
//!
//! - **只依赖 trait**：渲染、提取、求解、提交都通过 `Collaborators` 注入
//! - **截止时间唯一**：每一步开始前检查，进行中的 future 超时即丢弃
//! - **决策是纯函数**：重试还是前进由 `DecisionPolicy` 决定
//! - **错误不外泄**：单题错误只转换为状态迁移，运行本身总能产出报告

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{ApiError, AppError};
use crate::metrics;
use crate::models::{
    Answer, FailureCategory, Identity, QuizTask, RunPhase, RunReport, SubmissionVerdict,
};
use crate::orchestrator::run_state::QuizRunState;
use crate::services::Collaborators;
use crate::utils::logging::truncate_text;
use crate::workflow::{DecisionPolicy, NextAction, RunCtx};

/// 提交重试的最大退避时间
const MAX_SUBMIT_BACKOFF: Duration = Duration::from_secs(10);

/// 编排参数
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// 单次运行总时长
    pub quiz_timeout: Duration,
    /// 单次渲染超时
    pub render_timeout: Duration,
    /// 渲染失败后的重试次数
    pub render_max_retries: usize,
    /// 提交传输失败后的重试次数
    pub submit_max_retries: usize,
    pub policy: DecisionPolicy,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quiz_timeout: config.quiz_timeout(),
            render_timeout: config.render_timeout(),
            render_max_retries: config.render_max_retries,
            submit_max_retries: config.submit_max_retries,
            policy: DecisionPolicy {
                min_cycle: Duration::from_secs(config.min_cycle_secs),
                same_quiz_max_retries: config.same_quiz_max_retries,
            },
        }
    }
}

/// 单步失败的原因
enum StepFailure {
    /// 撞到截止时间
    Deadline,
    /// 重试用尽或不可重试
    Failed,
    /// 答案在本地被拒绝，没有发送
    Rejected(String),
}

/// 题目链编排器
pub struct QuizOrchestrator {
    collaborators: Collaborators,
    settings: OrchestratorSettings,
}

impl QuizOrchestrator {
    pub fn new(collaborators: Collaborators, settings: OrchestratorSettings) -> Self {
        Self {
            collaborators,
            settings,
        }
    }

    /// 执行一次完整运行
    ///
    /// # 参数
    /// - `run_id`: 运行ID（仅用于日志）
    /// - `identity`: 提交身份
    /// - `initial_url`: 第一题地址
    ///
    /// # 返回
    /// 运行报告；单题错误不会作为 Err 返回
    pub async fn run(&self, run_id: &str, identity: &Identity, initial_url: &str) -> RunReport {
        let mut state = QuizRunState::start(run_id, initial_url, self.settings.quiz_timeout);
        let mut ctx = RunCtx::new(run_id, identity.email.as_str());
        info!(
            "{} 🚀 开始运行: {} (预算 {} 秒)",
            ctx,
            initial_url,
            self.settings.quiz_timeout.as_secs()
        );

        let mut html: Option<String> = None;
        let mut task: Option<QuizTask> = None;
        let mut answer: Option<Answer> = None;

        while !state.is_finished() {
            if state.deadline().is_expired() {
                warn!("{} ⏰ 已到截止时间 (阶段: {})", ctx, state.phase().name());
                state.finish_timed_out();
                break;
            }

            match state.phase() {
                RunPhase::Idle => state.enter(RunPhase::Rendering),
                RunPhase::Rendering => {
                    match self.render_with_retry(&state, &ctx).await {
                        Ok(page) => {
                            html = Some(page);
                            state.enter(RunPhase::Parsing);
                        }
                        Err(StepFailure::Deadline) => state.finish_timed_out(),
                        Err(_) => state.finish_failed(FailureCategory::Render),
                    }
                }
                RunPhase::Parsing => {
                    let started = Instant::now();
                    let page = html.take().unwrap_or_default();
                    match self.collaborators.extractor.extract(&page, state.current_url()) {
                        Ok(parsed) => {
                            metrics::record_stage("parse", true, started.elapsed().as_secs_f64());
                            debug!(
                                "{} 任务说明: {}",
                                ctx,
                                truncate_text(&parsed.instructions, 200)
                            );
                            task = Some(parsed);
                            state.enter(RunPhase::Solving);
                        }
                        Err(e) => {
                            metrics::record_stage("parse", false, started.elapsed().as_secs_f64());
                            error!("{} ❌ 解析任务失败: {}", ctx, e);
                            state.finish_failed(FailureCategory::Parse);
                        }
                    }
                }
                RunPhase::Solving => {
                    let Some(current) = task.as_ref() else {
                        error!("{} ❌ 求解阶段缺少任务", ctx);
                        state.finish_failed(FailureCategory::Parse);
                        continue;
                    };
                    let started = Instant::now();
                    info!("{} 🧠 求解中 (格式: {})", ctx, current.answer_format);
                    match state
                        .deadline()
                        .run_within(self.collaborators.engine.solve(current))
                        .await
                    {
                        None => state.finish_timed_out(),
                        Some(Ok(solved)) => {
                            metrics::record_stage("solve", true, started.elapsed().as_secs_f64());
                            answer = Some(solved);
                            state.enter(RunPhase::Submitting);
                        }
                        Some(Err(e)) => {
                            // 求解失败按答错处理，交给决策决定重试还是前进
                            metrics::record_stage("solve", false, started.elapsed().as_secs_f64());
                            warn!("{} ⚠️ 求解失败 ({}): {}", ctx, FailureCategory::Solve, e);
                            state.record_verdict(SubmissionVerdict::synthetic_incorrect(None), true);
                            state.enter(RunPhase::Deciding);
                        }
                    }
                }
                RunPhase::Submitting => {
                    let (Some(current), Some(ans)) = (task.as_ref(), answer.take()) else {
                        error!("{} ❌ 提交阶段缺少任务或答案", ctx);
                        state.finish_failed(FailureCategory::Submission);
                        continue;
                    };
                    match self.submit_with_retry(&state, &ctx, identity, current, &ans).await {
                        Ok(verdict) => {
                            metrics::record_submission(verdict.correct);
                            if verdict.correct {
                                info!("{} ✅ 回答正确", ctx);
                            } else {
                                info!("{} ❌ 回答错误: {}", ctx, verdict.reason.as_deref().unwrap_or("-"));
                            }
                            state.record_verdict(verdict, false);
                            state.enter(RunPhase::Deciding);
                        }
                        Err(StepFailure::Rejected(reason)) => {
                            state.record_verdict(SubmissionVerdict::synthetic_incorrect(Some(reason)), true);
                            state.enter(RunPhase::Deciding);
                        }
                        Err(StepFailure::Deadline) => state.finish_timed_out(),
                        Err(StepFailure::Failed) => state.finish_failed(FailureCategory::Submission),
                    }
                }
                RunPhase::Deciding => {
                    let Some(verdict) = state.last_verdict().cloned() else {
                        error!("{} ❌ 决策阶段缺少判定结果", ctx);
                        state.finish_failed(FailureCategory::Submission);
                        continue;
                    };
                    let action = self.settings.policy.decide(
                        &verdict,
                        state.remaining(),
                        state.visited_urls(),
                        state.same_quiz_retries(),
                    );
                    debug!("{} 决策: {:?}", ctx, action);
                    match action {
                        NextAction::Advance(next_url) => {
                            info!("{} ➡️ 前往下一题: {}", ctx, next_url);
                            state.advance_to(next_url);
                            ctx.next_quiz();
                            task = None;
                        }
                        NextAction::RetrySame => {
                            info!("{} 🔄 重新求解当前题", ctx);
                            state.retry_same();
                        }
                        NextAction::Complete(reason) => {
                            info!("{} 🏁 运行结束: {:?}", ctx, reason);
                            state.finish_completed(reason);
                        }
                        NextAction::TimedOut => state.finish_timed_out(),
                    }
                }
                RunPhase::Completed | RunPhase::TimedOut | RunPhase::Failed => break,
            }
        }

        state.into_report()
    }

    /// 释放协作者持有的资源（浏览器）
    pub async fn shutdown(self) {
        self.collaborators.renderer.close().await;
    }

    /// 渲染当前题目，失败后按配置重试
    ///
    /// 每次尝试的时限是渲染超时与剩余时间中较小者
    async fn render_with_retry(
        &self,
        state: &QuizRunState,
        ctx: &RunCtx,
    ) -> Result<String, StepFailure> {
        let url = state.current_url();
        let attempts = self.settings.render_max_retries + 1;

        for attempt in 1..=attempts {
            if state.deadline().is_expired() {
                return Err(StepFailure::Deadline);
            }
            info!("{} 🌐 渲染题目 (第 {}/{} 次): {}", ctx, attempt, attempts, url);
            let started = Instant::now();
            let result = state
                .deadline()
                .run_bounded(self.settings.render_timeout, self.collaborators.renderer.render(url))
                .await;
            let seconds = started.elapsed().as_secs_f64();

            match result {
                Ok(Ok(page)) => {
                    metrics::record_stage("render", true, seconds);
                    return Ok(page);
                }
                Ok(Err(e)) => warn!("{} ⚠️ 渲染失败: {}", ctx, e),
                Err(true) => {
                    metrics::record_stage("render", false, seconds);
                    return Err(StepFailure::Deadline);
                }
                Err(false) => warn!(
                    "{} ⚠️ 渲染超时 ({} 秒)",
                    ctx,
                    self.settings.render_timeout.as_secs()
                ),
            }
            metrics::record_stage("render", false, seconds);
        }

        error!("{} ❌ 渲染失败，已重试 {} 次", ctx, self.settings.render_max_retries);
        Err(StepFailure::Failed)
    }

    /// 提交答案；传输失败和 5xx 按指数退避重试
    async fn submit_with_retry(
        &self,
        state: &QuizRunState,
        ctx: &RunCtx,
        identity: &Identity,
        task: &QuizTask,
        answer: &Answer,
    ) -> Result<SubmissionVerdict, StepFailure> {
        let deadline = state.deadline();
        let mut retries = 0usize;

        loop {
            let started = Instant::now();
            let result = deadline
                .run_within(self.collaborators.submitter.submit(
                    identity,
                    state.current_url(),
                    &task.submit_url,
                    answer,
                ))
                .await;
            let seconds = started.elapsed().as_secs_f64();

            let err = match result {
                None => {
                    metrics::record_stage("submit", false, seconds);
                    return Err(StepFailure::Deadline);
                }
                Some(Ok(verdict)) => {
                    metrics::record_stage("submit", true, seconds);
                    return Ok(verdict);
                }
                Some(Err(e)) => e,
            };
            metrics::record_stage("submit", false, seconds);

            if let AppError::Api(ApiError::PayloadTooLarge { size, limit }) = &err {
                warn!("{} ⚠️ 答案 {} 字节超过上限 {} 字节，未提交", ctx, size, limit);
                return Err(StepFailure::Rejected(err.to_string()));
            }

            if !err.is_retryable() {
                error!("{} ❌ 提交失败（不可重试）: {}", ctx, err);
                return Err(StepFailure::Failed);
            }
            if retries >= self.settings.submit_max_retries {
                error!("{} ❌ 提交失败，已重试 {} 次: {}", ctx, retries, err);
                return Err(StepFailure::Failed);
            }

            let backoff = Duration::from_secs(1u64 << retries.min(4)).min(MAX_SUBMIT_BACKOFF);
            if backoff >= deadline.remaining() {
                error!("{} ❌ 提交失败且剩余时间不足以重试: {}", ctx, err);
                return Err(StepFailure::Failed);
            }
            retries += 1;
            warn!(
                "{} ⚠️ 提交失败，{} 秒后第 {} 次重试: {}",
                ctx,
                backoff.as_secs(),
                retries,
                err
            );
            deadline.sleep(backoff).await;
        }
    }
}
