//! 协作者接口
//!
//! 编排层只依赖这里的 trait，具体实现（浏览器、LLM、HTTP）可以替换

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{Answer, Identity, QuizTask, SubmissionVerdict};

/// 页面渲染能力
#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// 渲染页面并返回执行 JS 之后的 HTML
    async fn render(&self, url: &str) -> AppResult<String>;

    /// 释放渲染资源，运行结束时调用一次
    async fn close(&self) {}
}

/// 任务提取能力（纯函数，不做 IO）
pub trait TaskExtractor: Send + Sync {
    /// 从渲染后的页面中提取任务
    ///
    /// # 参数
    /// - `html`: 渲染后的页面
    /// - `page_url`: 页面地址，用于解析相对链接
    fn extract(&self, html: &str, page_url: &str) -> AppResult<QuizTask>;
}

/// 求解能力
#[async_trait]
pub trait AnswerEngine: Send + Sync {
    async fn solve(&self, task: &QuizTask) -> AppResult<Answer>;
}

/// 提交能力
///
/// 每次调用只发送一次请求，重试由编排层决定
#[async_trait]
pub trait SubmissionClient: Send + Sync {
    /// 提交答案
    ///
    /// # 参数
    /// - `identity`: 提交身份
    /// - `quiz_url`: 当前题目地址（随答案一起提交）
    /// - `submit_url`: 提交地址（来自页面内容）
    /// - `answer`: 答案
    async fn submit(
        &self,
        identity: &Identity,
        quiz_url: &str,
        submit_url: &str,
        answer: &Answer,
    ) -> AppResult<SubmissionVerdict>;
}

/// 一次运行使用的全部协作者
pub struct Collaborators {
    pub renderer: Box<dyn PageRenderer>,
    pub extractor: Box<dyn TaskExtractor>,
    pub engine: Box<dyn AnswerEngine>,
    pub submitter: Box<dyn SubmissionClient>,
}

/// 协作者工厂
///
/// 每次运行调用一次，保证运行之间不共享浏览器等可变资源
#[async_trait]
pub trait CollaboratorFactory: Send + Sync {
    async fn create(&self) -> AppResult<Collaborators>;
}
