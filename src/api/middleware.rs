use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

use crate::metrics::{HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION_SECONDS};

/// 统计 HTTP 请求数量和耗时
pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = route_label(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16().to_string();

    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method.as_str(), path, status.as_str()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method.as_str(), path])
        .observe(duration);

    response
}

/// 未知路径统一归为一个标签，避免标签数量失控
fn route_label(path: &str) -> &'static str {
    match path {
        "/quiz" => "/quiz",
        "/health" => "/health",
        "/metrics" => "/metrics",
        _ => "other",
    }
}
