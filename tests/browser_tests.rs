use std::time::Duration;

use axum::{routing::get, Router};
use chromiumoxide::Browser;

use quiz_solver::browser::launch_browser;
use quiz_solver::JsExecutor;

/// 启动一个永远不返回的页面服务
async fn spawn_hanging_page() -> String {
    let app = Router::new().route(
        "/slow",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(600)).await;
            "never"
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/slow", addr)
}

async fn open_pages(browser: &Browser) -> usize {
    browser.pages().await.expect("读取页面列表失败").len()
}

#[tokio::test]
#[ignore] // 需要本机安装 Chrome：cargo test -- --ignored
async fn test_cancelled_navigation_closes_page() {
    let url = spawn_hanging_page().await;
    let mut browser = launch_browser(true, None).await.expect("启动浏览器失败");
    let before = open_pages(&browser).await;

    let page = browser.new_page("about:blank").await.expect("创建页面失败");
    let executor = JsExecutor::new(page);
    let result = tokio::time::timeout(Duration::from_millis(500), async move {
        executor.goto(&url).await
    })
    .await;
    assert!(result.is_err(), "导航应当被超时取消");

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(open_pages(&browser).await, before);

    let _ = browser.close().await;
}

#[tokio::test]
#[ignore]
async fn test_explicit_close_releases_page() {
    let mut browser = launch_browser(true, None).await.expect("启动浏览器失败");
    let before = open_pages(&browser).await;

    let page = browser.new_page("about:blank").await.expect("创建页面失败");
    JsExecutor::new(page).close().await;

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(open_pages(&browser).await, before);

    let _ = browser.close().await;
}
