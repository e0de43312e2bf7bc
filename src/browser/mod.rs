//! 浏览器资源
//!
//! 每次运行拥有自己的浏览器实例，运行结束时关闭

pub mod connection;
pub mod headless;

use std::time::Duration;

use chromiumoxide::handler::Handler;
use futures::StreamExt;

pub use connection::connect_browser;
pub use headless::launch_browser;

/// 在后台处理浏览器事件，直到连接断开
pub(crate) fn spawn_event_loop(mut handler: Handler) {
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });
}

/// 启动或连接浏览器后等待状态同步的时间
pub(crate) const SETTLE_DELAY: Duration = Duration::from_millis(300);
