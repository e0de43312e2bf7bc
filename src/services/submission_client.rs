//! 提交服务
//!
//! 把答案 POST 到页面给出的提交地址，解析判定结果

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info, warn};

use crate::error::{ApiError, AppError, AppResult};
use crate::models::{Answer, Identity, SubmissionVerdict, SubmitPayload};
use crate::services::collaborators::SubmissionClient;
use crate::utils::logging::truncate_text;

/// 基于 HTTP 的提交客户端
pub struct HttpSubmissionClient {
    client: reqwest::Client,
    timeout: Duration,
    max_payload_bytes: usize,
}

impl HttpSubmissionClient {
    pub fn new(client: reqwest::Client, timeout: Duration, max_payload_bytes: usize) -> Self {
        Self {
            client,
            timeout,
            max_payload_bytes,
        }
    }

    /// 序列化请求体并检查大小
    pub fn encode_payload(&self, payload: &SubmitPayload<'_>) -> AppResult<Vec<u8>> {
        let body = serde_json::to_vec(payload)?;
        if body.len() > self.max_payload_bytes {
            return Err(ApiError::PayloadTooLarge {
                size: body.len(),
                limit: self.max_payload_bytes,
            }
            .into());
        }
        Ok(body)
    }
}

#[async_trait]
impl SubmissionClient for HttpSubmissionClient {
    async fn submit(
        &self,
        identity: &Identity,
        quiz_url: &str,
        submit_url: &str,
        answer: &Answer,
    ) -> AppResult<SubmissionVerdict> {
        let payload = SubmitPayload {
            email: &identity.email,
            secret: &identity.secret,
            url: quiz_url,
            answer,
        };
        let body = self.encode_payload(&payload)?;
        debug!("📤 提交答案到 {} ({} 字节)", submit_url, body.len());

        let response = self
            .client
            .post(submit_url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(self.timeout)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(submit_url, e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AppError::api_request_failed(submit_url, e))?;

        if status.is_server_error() {
            warn!("⚠️ 提交地址返回 {}: {}", status, truncate_text(&text, 200));
            return Err(ApiError::BadResponse {
                endpoint: submit_url.to_string(),
                status: status.as_u16(),
                body: Some(text),
            }
            .into());
        }

        match serde_json::from_str::<SubmissionVerdict>(&text) {
            // 4xx 但带有判定结果时同样视为有效判定
            Ok(verdict) if status.is_success() || status.is_client_error() => {
                let verdict = verdict.resolve_next_url(submit_url);
                info!(
                    "📨 判定结果: correct={}, reason={:?}, next={:?}",
                    verdict.correct, verdict.reason, verdict.next_url
                );
                Ok(verdict)
            }
            Err(e) if status.is_success() => {
                warn!("⚠️ 无法解析判定结果: {}", truncate_text(&text, 200));
                Err(e.into())
            }
            _ => Err(ApiError::BadResponse {
                endpoint: submit_url.to_string(),
                status: status.as_u16(),
                body: Some(text),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    /// 启动本地评分服务，返回基础地址
    async fn spawn_grader() -> String {
        let app = Router::new()
            .route(
                "/correct",
                post(|| async { Json(json!({ "correct": true, "url": "/quiz-2" })) }),
            )
            .route(
                "/wrong",
                post(|| async {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "correct": false, "reason": "off by one" })),
                    )
                }),
            )
            .route(
                "/busy",
                post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "try later") }),
            )
            .route(
                "/missing",
                post(|| async {
                    (StatusCode::NOT_FOUND, Json(json!({ "detail": "not found" })))
                }),
            )
            .route("/garbled", post(|| async { "<html>ok</html>" }));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn submit_to(endpoint: &str) -> AppResult<SubmissionVerdict> {
        let client = HttpSubmissionClient::new(reqwest::Client::new(), Duration::from_secs(5), 1024);
        client
            .submit(
                &Identity::new("student@example.com", "s3cret"),
                "https://quiz.example.com/quiz-1",
                endpoint,
                &Answer(json!(42)),
            )
            .await
    }

    #[tokio::test]
    async fn test_success_returns_verdict_with_resolved_next_url() {
        let base = spawn_grader().await;
        let verdict = submit_to(&format!("{}/correct", base)).await.unwrap();
        assert!(verdict.correct);
        assert_eq!(verdict.next_url, Some(format!("{}/quiz-2", base)));
    }

    #[tokio::test]
    async fn test_client_error_with_verdict_body_is_a_verdict() {
        let base = spawn_grader().await;
        let verdict = submit_to(&format!("{}/wrong", base)).await.unwrap();
        assert!(!verdict.correct);
        assert_eq!(verdict.reason.as_deref(), Some("off by one"));
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let base = spawn_grader().await;
        let err = submit_to(&format!("{}/busy", base)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Api(ApiError::BadResponse { status: 503, .. })
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_client_error_without_verdict_is_not_retryable() {
        let base = spawn_grader().await;
        let err = submit_to(&format!("{}/missing", base)).await.unwrap_err();
        assert!(matches!(
            err,
            AppError::Api(ApiError::BadResponse { status: 404, .. })
        ));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unparseable_success_body_is_an_error() {
        let base = spawn_grader().await;
        let err = submit_to(&format!("{}/garbled", base)).await.unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::JsonParseFailed { .. })));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_connection_refused_is_retryable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = submit_to(&format!("http://{}/submit", addr)).await.unwrap_err();
        assert!(matches!(err, AppError::Api(ApiError::RequestFailed { .. })));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_payload_over_limit_is_rejected_locally() {
        let client = HttpSubmissionClient::new(reqwest::Client::new(), Duration::from_secs(5), 256);
        let answer = Answer(json!("x".repeat(512)));
        let payload = SubmitPayload {
            email: "student@example.com",
            secret: "s3cret",
            url: "https://quiz.example.com/quiz-1",
            answer: &answer,
        };
        match client.encode_payload(&payload) {
            Err(AppError::Api(ApiError::PayloadTooLarge { size, limit })) => {
                assert!(size > 512);
                assert_eq!(limit, 256);
            }
            other => panic!("应当在本地拒绝: {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_payload_shape() {
        let client = HttpSubmissionClient::new(reqwest::Client::new(), Duration::from_secs(5), 1024);
        let answer = Answer(json!(42));
        let payload = SubmitPayload {
            email: "student@example.com",
            secret: "s3cret",
            url: "https://quiz.example.com/quiz-1",
            answer: &answer,
        };
        let body: serde_json::Value = serde_json::from_slice(&client.encode_payload(&payload).unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "email": "student@example.com",
                "secret": "s3cret",
                "url": "https://quiz.example.com/quiz-1",
                "answer": 42
            })
        );
    }
}
