//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"导航 / 执行 JS / 读取内容"的能力

use std::time::Duration;

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{AppResult, BrowserError};

/// 页面内容已就绪的判断脚本
///
/// 题目页面由 JS 生成内容，正文足够长或出现 pre/code 即可认为已渲染
const CONTENT_READY_JS: &str = "(() => { \
    const body = document.body; \
    if (!body) return false; \
    return body.innerText.length > 500 || document.querySelectorAll('pre, code').length > 0; \
})()";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 goto() / eval() / content() 能力
/// - 不认识 QuizTask
/// - 不处理业务流程
/// - 被丢弃时（例如渲染超时被取消）在后台关闭页面
pub struct JsExecutor {
    page: Page,
    closed: bool,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self {
            page,
            closed: false,
        }
    }

    /// 导航到指定 URL 并等待加载完成
    pub async fn goto(&self, url: &str) -> AppResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationFailed {
                url: url.to_string(),
                source: Box::new(e),
            })?;
        Ok(())
    }

    /// 执行 JS 代码并返回 JSON 结果
    ///
    /// # 参数
    /// - `js_code`: 要执行的 JavaScript 代码
    ///
    /// # 返回
    /// 返回 JSON 值
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)?;
        Ok(typed_value)
    }

    /// 轮询等待动态内容出现
    ///
    /// # 返回
    /// 在 `max_wait` 内就绪返回 true；超时返回 false（不视为错误）
    pub async fn wait_for_content(&self, max_wait: Duration) -> bool {
        let give_up_at = Instant::now() + max_wait;
        loop {
            match self.eval_as::<bool>(CONTENT_READY_JS).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => debug!("检查页面内容失败: {}", e),
            }
            if Instant::now() + POLL_INTERVAL > give_up_at {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// 读取渲染后的完整 HTML
    pub async fn content(&self) -> AppResult<String> {
        Ok(self.page.content().await?)
    }

    /// 关闭页面，释放 page
    pub async fn close(mut self) {
        self.closed = true;
        if let Err(e) = self.page.clone().close().await {
            debug!("关闭页面失败: {}", e);
        }
    }
}

impl Drop for JsExecutor {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("没有可用的运行时，页面未关闭");
            return;
        };
        let page = self.page.clone();
        runtime.spawn(async move {
            if let Err(e) = page.close().await {
                debug!("关闭被取消的页面失败: {}", e);
            }
        });
    }
}
