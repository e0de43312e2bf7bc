use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{info, warn};

use crate::api::AppState;
use crate::metrics;
use crate::models::{Identity, QuizRequest, QuizResponse};

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// 触发一次运行
///
/// - 请求体不合法 → 400
/// - 密钥不匹配 → 403，不启动运行
/// - 通过 → 200，运行在后台继续
pub async fn trigger_quiz(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QuizRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!("⚠️ 请求体无效: {}", rejection.body_text());
            return error_response(StatusCode::BAD_REQUEST, "Invalid JSON payload");
        }
    };

    if let Err(reason) = request.validate() {
        warn!("⚠️ 请求字段无效: {}", reason);
        return error_response(StatusCode::BAD_REQUEST, reason);
    }

    if request.secret != state.config.student_secret {
        warn!("⚠️ 密钥不匹配，拒绝请求 ({})", request.email);
        return error_response(StatusCode::FORBIDDEN, "Invalid secret");
    }

    if !state.config.is_expected_email(&request.email) {
        warn!(
            "⚠️ 请求邮箱 {} 与配置的 {} 不一致，按请求中的邮箱提交",
            request.email, state.config.student_email
        );
    }

    info!("📥 收到题目请求: {}", request.url);
    state
        .dispatcher
        .dispatch(Identity::from(&request), request.url.trim().to_string());

    (StatusCode::OK, Json(QuizResponse::accepted())).into_response()
}

pub async fn health() -> impl IntoResponse {
    Json(json!({ "status": "healthy" }))
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}
