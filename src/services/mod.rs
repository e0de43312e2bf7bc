//! 业务能力层（Services）
//!
//! 描述"我能做什么"：渲染、提取、求解、提交，每个能力只处理一道题

pub mod answer_engine;
pub mod collaborators;
pub mod factory;
pub mod file_fetcher;
pub mod llm_service;
pub mod page_renderer;
pub mod submission_client;
pub mod task_extractor;

pub use answer_engine::LlmAnswerEngine;
pub use collaborators::{
    AnswerEngine, CollaboratorFactory, Collaborators, PageRenderer, SubmissionClient,
    TaskExtractor,
};
pub use factory::ChromeCollaboratorFactory;
pub use file_fetcher::{FileFetcher, FileKind};
pub use llm_service::LlmService;
pub use page_renderer::ChromePageRenderer;
pub use submission_client::HttpSubmissionClient;
pub use task_extractor::HtmlTaskExtractor;
