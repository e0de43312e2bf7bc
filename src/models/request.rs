use serde::{Deserialize, Serialize};

use crate::models::task::Answer;

/// 入口请求体
#[derive(Debug, Clone, Deserialize)]
pub struct QuizRequest {
    pub email: String,
    pub secret: String,
    pub url: String,
}

impl QuizRequest {
    /// 校验字段内容，返回第一个不合法字段的说明
    pub fn validate(&self) -> Result<(), String> {
        if self.email.trim().is_empty() {
            return Err("email must not be empty".to_string());
        }
        if self.secret.trim().is_empty() {
            return Err("secret must not be empty".to_string());
        }
        match url::Url::parse(self.url.trim()) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
            _ => Err(format!("url is not a valid http(s) URL: {}", self.url)),
        }
    }
}

/// 提交答案时使用的身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
    pub secret: String,
}

impl Identity {
    pub fn new(email: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            secret: secret.into(),
        }
    }
}

impl From<&QuizRequest> for Identity {
    fn from(request: &QuizRequest) -> Self {
        Self::new(request.email.trim(), request.secret.as_str())
    }
}

/// 入口响应体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl QuizResponse {
    pub fn accepted() -> Self {
        Self {
            status: "accepted".to_string(),
            message: Some("Quiz request received and is being processed".to_string()),
        }
    }
}

/// 提交答案的请求体
#[derive(Debug, Clone, Serialize)]
pub struct SubmitPayload<'a> {
    pub email: &'a str,
    pub secret: &'a str,
    /// 当前题目的地址
    pub url: &'a str,
    pub answer: &'a Answer,
}
