use std::path::Path;

use chromiumoxide::{Browser, BrowserConfig};
use tracing::{debug, error, info};

use super::{spawn_event_loop, SETTLE_DELAY};
use crate::error::{AppResult, BrowserError};

/// 启动浏览器
///
/// # 参数
/// - `headless`: 是否使用无头模式
/// - `executable`: Chrome 可执行文件路径，为空时由 chromiumoxide 自动查找
pub async fn launch_browser(headless: bool, executable: Option<&str>) -> AppResult<Browser> {
    info!("🚀 启动{}浏览器...", if headless { "无头" } else { "" });

    let mut builder = BrowserConfig::builder();
    builder = if headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(path) = executable {
        debug!("Chrome 路径: {}", path);
        builder = builder.chrome_executable(Path::new(path));
    }

    let config = builder
        .args(vec![
            "--disable-gpu",             // 无头模式下禁用 GPU
            "--no-sandbox",              // 容器内运行需要禁用沙盒
            "--disable-dev-shm-usage",   // 防止共享内存不足
            "--remote-debugging-port=0", // 让浏览器自动选择端口
        ])
        .build()
        .map_err(|e| {
            error!("配置浏览器失败: {}", e);
            BrowserError::LaunchFailed { source: e.into() }
        })?;

    let (browser, handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动浏览器失败: {}", e);
        BrowserError::LaunchFailed {
            source: Box::new(e),
        }
    })?;
    spawn_event_loop(handler);

    // 等待浏览器状态同步
    tokio::time::sleep(SETTLE_DELAY).await;

    debug!("浏览器启动成功");
    Ok(browser)
}
