use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppResult;
use crate::services::answer_engine::LlmAnswerEngine;
use crate::services::collaborators::{CollaboratorFactory, Collaborators};
use crate::services::file_fetcher::FileFetcher;
use crate::services::llm_service::LlmService;
use crate::services::page_renderer::ChromePageRenderer;
use crate::services::submission_client::HttpSubmissionClient;
use crate::services::task_extractor::HtmlTaskExtractor;

/// 生产环境使用的协作者工厂
///
/// HTTP 客户端在运行之间共享（内部是连接池），浏览器每次运行单独启动
pub struct ChromeCollaboratorFactory {
    config: Config,
    http: reqwest::Client,
}

impl ChromeCollaboratorFactory {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CollaboratorFactory for ChromeCollaboratorFactory {
    async fn create(&self) -> AppResult<Collaborators> {
        let config = &self.config;
        let renderer = ChromePageRenderer::start(config).await?;

        let fetcher = FileFetcher::new(
            self.http.clone(),
            config.submit_timeout(),
            config.max_file_bytes,
        );
        let engine = LlmAnswerEngine::new(LlmService::new(config), fetcher, config.max_payload_bytes);
        let submitter = HttpSubmissionClient::new(
            self.http.clone(),
            config.submit_timeout(),
            config.max_payload_bytes,
        );

        Ok(Collaborators {
            renderer: Box::new(renderer),
            extractor: Box::new(HtmlTaskExtractor::new()),
            engine: Box::new(engine),
            submitter: Box::new(submitter),
        })
    }
}
