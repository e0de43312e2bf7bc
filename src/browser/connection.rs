use chromiumoxide::Browser;
use tracing::{error, info};

use super::{spawn_event_loop, SETTLE_DELAY};
use crate::error::{AppResult, BrowserError};

/// 连接到已在运行的浏览器（远程调试端口）
pub async fn connect_browser(port: u16) -> AppResult<Browser> {
    let browser_url = format!("http://localhost:{}", port);
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        BrowserError::ConnectionFailed {
            port,
            source: Box::new(e),
        }
    })?;
    spawn_event_loop(handler);

    // 等待浏览器状态同步
    tokio::time::sleep(SETTLE_DELAY).await;

    info!("✓ 浏览器连接成功");
    Ok(browser)
}
