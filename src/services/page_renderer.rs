//! 页面渲染服务
//!
//! 每次运行持有一个浏览器，每次渲染打开一个新页面，读完即关

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Browser;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::browser;
use crate::config::Config;
use crate::error::{AppResult, BrowserError};
use crate::infrastructure::JsExecutor;
use crate::services::collaborators::PageRenderer;

/// 动态内容最长等待时间，超时后按当前内容继续
const CONTENT_WAIT: Duration = Duration::from_secs(5);

/// 基于 Chrome 的渲染器
pub struct ChromePageRenderer {
    browser: Mutex<Option<Browser>>,
    /// 是否由本渲染器启动（连接已有浏览器时不负责关闭进程）
    owned: bool,
}

impl ChromePageRenderer {
    /// 按配置启动新浏览器，或连接到调试端口上的已有浏览器
    pub async fn start(config: &Config) -> AppResult<Self> {
        let (browser, owned) = match config.browser_debug_port {
            Some(port) => (browser::connect_browser(port).await?, false),
            None => (
                browser::launch_browser(
                    config.browser_headless,
                    config.chrome_executable.as_deref(),
                )
                .await?,
                true,
            ),
        };
        Ok(Self {
            browser: Mutex::new(Some(browser)),
            owned,
        })
    }
}

#[async_trait]
impl PageRenderer for ChromePageRenderer {
    async fn render(&self, url: &str) -> AppResult<String> {
        let guard = self.browser.lock().await;
        let browser = guard.as_ref().ok_or_else(|| BrowserError::PageCreationFailed {
            source: "浏览器已关闭".into(),
        })?;

        debug!("🌐 渲染页面: {}", url);
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::PageCreationFailed {
                source: Box::new(e),
            })?;
        let executor = JsExecutor::new(page);

        let html = async {
            executor.goto(url).await?;
            if !executor.wait_for_content(CONTENT_WAIT).await {
                debug!("等待动态内容超时，使用当前页面内容: {}", url);
            }
            executor.content().await
        }
        .await;

        executor.close().await;

        let html = html?;
        info!("✓ 页面渲染完成: {} ({} 字节)", url, html.len());
        Ok(html)
    }

    async fn close(&self) {
        let Some(mut browser) = self.browser.lock().await.take() else {
            return;
        };
        if !self.owned {
            return;
        }
        if let Err(e) = browser.close().await {
            warn!("关闭浏览器失败: {}", e);
            return;
        }
        if let Err(e) = browser.wait().await {
            debug!("等待浏览器退出失败: {}", e);
        }
        debug!("浏览器已关闭");
    }
}
