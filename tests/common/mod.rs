#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map};

use quiz_solver::error::{ApiError, AppError, AppResult, LlmError, TaskError};
use quiz_solver::models::{Answer, AnswerFormat, Identity, QuizTask, SubmissionVerdict};
use quiz_solver::services::{
    AnswerEngine, CollaboratorFactory, Collaborators, PageRenderer, SubmissionClient,
    TaskExtractor,
};

pub const SUBMIT_URL: &str = "https://grader.test/submit";

pub fn identity() -> Identity {
    Identity::new("student@example.com", "s3cret")
}

/// 各协作者被调用的次数
#[derive(Default)]
pub struct Calls {
    renders: AtomicUsize,
    parses: AtomicUsize,
    solves: AtomicUsize,
    submits: AtomicUsize,
    closes: AtomicUsize,
    submitted_for: Mutex<Vec<String>>,
}

impl Calls {
    pub fn renders(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }

    pub fn parses(&self) -> usize {
        self.parses.load(Ordering::SeqCst)
    }

    pub fn solves(&self) -> usize {
        self.solves.load(Ordering::SeqCst)
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn total(&self) -> usize {
        self.renders() + self.parses() + self.solves() + self.submits()
    }

    /// 每次提交对应的题目地址
    pub fn submitted_for(&self) -> Vec<String> {
        self.submitted_for.lock().unwrap().clone()
    }
}

/// 提交端的一次预设响应
pub enum SubmitStep {
    Verdict(SubmissionVerdict),
    Transport,
    ServerError(u16),
    ClientError(u16),
    TooLarge,
}

pub fn correct(next_url: Option<&str>) -> SubmitStep {
    SubmitStep::Verdict(SubmissionVerdict {
        correct: true,
        reason: None,
        next_url: next_url.map(str::to_string),
    })
}

pub fn incorrect(next_url: Option<&str>) -> SubmitStep {
    SubmitStep::Verdict(SubmissionVerdict {
        correct: false,
        reason: Some("wrong value".to_string()),
        next_url: next_url.map(str::to_string),
    })
}

/// 预设好的一次运行
#[derive(Default)]
pub struct Scenario {
    render_delay: Option<Duration>,
    render_failures: usize,
    parse_fails: bool,
    solve_delay: Option<Duration>,
    solve_failures: usize,
    submit_steps: Vec<SubmitStep>,
}

impl Scenario {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = Some(delay);
        self
    }

    pub fn render_failures(mut self, count: usize) -> Self {
        self.render_failures = count;
        self
    }

    pub fn parse_fails(mut self) -> Self {
        self.parse_fails = true;
        self
    }

    pub fn solve_delay(mut self, delay: Duration) -> Self {
        self.solve_delay = Some(delay);
        self
    }

    pub fn solve_failures(mut self, count: usize) -> Self {
        self.solve_failures = count;
        self
    }

    pub fn submit(mut self, step: SubmitStep) -> Self {
        self.submit_steps.push(step);
        self
    }

    pub fn build(self) -> (Collaborators, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        (self.build_with(calls.clone()), calls)
    }

    pub fn build_with(self, calls: Arc<Calls>) -> Collaborators {
        Collaborators {
            renderer: Box::new(FakeRenderer {
                calls: calls.clone(),
                delay: self.render_delay,
                failures_left: Mutex::new(self.render_failures),
            }),
            extractor: Box::new(FakeExtractor {
                calls: calls.clone(),
                fails: self.parse_fails,
            }),
            engine: Box::new(FakeEngine {
                calls: calls.clone(),
                delay: self.solve_delay,
                failures_left: Mutex::new(self.solve_failures),
            }),
            submitter: Box::new(FakeSubmitter {
                calls,
                steps: Mutex::new(self.submit_steps.into_iter().collect()),
            }),
        }
    }
}

struct FakeRenderer {
    calls: Arc<Calls>,
    delay: Option<Duration>,
    failures_left: Mutex<usize>,
}

#[async_trait]
impl PageRenderer for FakeRenderer {
    async fn render(&self, url: &str) -> AppResult<String> {
        self.calls.renders.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(AppError::Other(format!("render of {} failed", url)));
            }
        }
        Ok(format!("<html><body>{}</body></html>", url))
    }

    async fn close(&self) {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeExtractor {
    calls: Arc<Calls>,
    fails: bool,
}

impl TaskExtractor for FakeExtractor {
    fn extract(&self, html: &str, page_url: &str) -> AppResult<QuizTask> {
        self.calls.parses.fetch_add(1, Ordering::SeqCst);
        if self.fails {
            return Err(TaskError::NoTaskContent.into());
        }
        let mut context = Map::new();
        context.insert("source_url".to_string(), json!(page_url));
        Ok(QuizTask {
            instructions: html.to_string(),
            submit_url: SUBMIT_URL.to_string(),
            answer_format: AnswerFormat::Number,
            file_urls: Vec::new(),
            context,
        })
    }
}

struct FakeEngine {
    calls: Arc<Calls>,
    delay: Option<Duration>,
    failures_left: Mutex<usize>,
}

#[async_trait]
impl AnswerEngine for FakeEngine {
    async fn solve(&self, _task: &QuizTask) -> AppResult<Answer> {
        self.calls.solves.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        {
            let mut left = self.failures_left.lock().unwrap();
            if *left > 0 {
                *left -= 1;
                return Err(LlmError::EmptyContent {
                    model: "fake".to_string(),
                }
                .into());
            }
        }
        Ok(Answer(json!(42)))
    }
}

struct FakeSubmitter {
    calls: Arc<Calls>,
    steps: Mutex<VecDeque<SubmitStep>>,
}

#[async_trait]
impl SubmissionClient for FakeSubmitter {
    async fn submit(
        &self,
        _identity: &Identity,
        quiz_url: &str,
        submit_url: &str,
        _answer: &Answer,
    ) -> AppResult<SubmissionVerdict> {
        self.calls.submits.fetch_add(1, Ordering::SeqCst);
        self.calls
            .submitted_for
            .lock()
            .unwrap()
            .push(quiz_url.to_string());

        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected submission for {}", quiz_url));

        match step {
            SubmitStep::Verdict(verdict) => Ok(verdict),
            SubmitStep::Transport => Err(AppError::api_request_failed(
                submit_url,
                std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
            )),
            SubmitStep::ServerError(status) | SubmitStep::ClientError(status) => {
                Err(ApiError::BadResponse {
                    endpoint: submit_url.to_string(),
                    status,
                    body: None,
                }
                .into())
            }
            SubmitStep::TooLarge => Err(ApiError::PayloadTooLarge {
                size: 2 * 1024 * 1024,
                limit: 1024 * 1024,
            }
            .into()),
        }
    }
}

/// 统计创建次数的协作者工厂；每次运行都是“第一题答对且没有下一题”
#[derive(Default)]
pub struct CountingFactory {
    pub created: AtomicUsize,
    pub calls: Arc<Calls>,
}

impl CountingFactory {
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollaboratorFactory for CountingFactory {
    async fn create(&self) -> AppResult<Collaborators> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Scenario::new()
            .submit(correct(None))
            .build_with(self.calls.clone()))
    }
}
