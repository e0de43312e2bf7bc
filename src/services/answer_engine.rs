//! 求解服务
//!
//! 下载任务文件、调用模型、把回复解析成要求的答案格式

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value as JsonValue;
use tracing::{debug, info, warn};

use crate::error::{ApiError, AppResult};
use crate::models::{Answer, AnswerFormat, QuizTask};
use crate::services::collaborators::AnswerEngine;
use crate::services::file_fetcher::{FetchedFile, FileFetcher, FileKind};
use crate::services::llm_service::LlmService;
use crate::utils::logging::truncate_text;

/// 每个文本文件内联到提示词的最大字符数
const MAX_INLINE_CHARS: usize = 20_000;

const SYSTEM_PROMPT: &str = "You are a data analysis assistant that solves short data tasks.\n\
The user gives you the task instructions, the required answer format and the contents of any \
referenced files. Work out the answer carefully, then reply with the final answer only: \
no explanation, no units, no surrounding text. \
For JSON answers reply with a single JSON value. \
For boolean answers reply with true or false. \
For image answers reply with a data URI (data:image/png;base64,...).";

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"-?\d+(?:\.\d+)?(?:[eE][-+]?\d+)?").unwrap();
    static ref THOUSANDS_RE: Regex = Regex::new(r"(\d),(\d{3})").unwrap();
    static ref BOOLEAN_RE: Regex = Regex::new(r"(?i)\b(true|false|yes|no)\b").unwrap();
    static ref FENCED_JSON_RE: Regex = Regex::new(r"(?s)```(?:json)?\s*([\{\[].*?[\}\]])\s*```").unwrap();
    static ref BRACED_RE: Regex = Regex::new(r"(?s)\{.*\}").unwrap();
    static ref DATA_URI_RE: Regex = Regex::new(r"data:[\w/+.-]+;base64,[A-Za-z0-9+/]+=*").unwrap();
    static ref BARE_BASE64_RE: Regex = Regex::new(r"^[A-Za-z0-9+/]{16,}={0,2}$").unwrap();
}

/// 基于 LLM 的求解器
pub struct LlmAnswerEngine {
    llm: LlmService,
    fetcher: FileFetcher,
    max_payload_bytes: usize,
}

impl LlmAnswerEngine {
    pub fn new(llm: LlmService, fetcher: FileFetcher, max_payload_bytes: usize) -> Self {
        Self {
            llm,
            fetcher,
            max_payload_bytes,
        }
    }

    /// 下载全部文件；单个文件失败只记录，不影响求解
    async fn fetch_files(&self, task: &QuizTask) -> Vec<Result<FetchedFile, String>> {
        let headers = task.request_headers();
        let mut files = Vec::with_capacity(task.file_urls.len());
        for url in &task.file_urls {
            match self.fetcher.fetch(url, &headers).await {
                Ok(file) => files.push(Ok(file)),
                Err(e) => {
                    warn!("⚠️ 文件下载失败 {}: {}", url, e);
                    files.push(Err(format!("{} (download failed: {})", url, e)));
                }
            }
        }
        files
    }
}

#[async_trait]
impl AnswerEngine for LlmAnswerEngine {
    async fn solve(&self, task: &QuizTask) -> AppResult<Answer> {
        let files = self.fetch_files(task).await;
        let (user_message, images) = build_user_message(task, &files);

        let reply = match self
            .llm
            .send_to_llm(&user_message, Some(SYSTEM_PROMPT), Some(&images))
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!("⚠️ 模型调用失败，使用兜底答案: {}", e);
                return Ok(Answer::fallback(task.answer_format));
            }
        };
        debug!("模型回复: {}", truncate_text(&reply, 200));

        let answer = parse_answer(&reply, task.answer_format);
        check_payload_size(&answer, task.answer_format, self.max_payload_bytes)?;

        info!(
            "✓ 求解完成 ({}): {}",
            task.answer_format,
            truncate_text(&answer.value().to_string(), 120)
        );
        Ok(answer)
    }
}

/// 构建用户消息，返回 (文本, 图片 data URI 列表)
fn build_user_message(task: &QuizTask, files: &[Result<FetchedFile, String>]) -> (String, Vec<String>) {
    let mut message = format!(
        "Task instructions:\n{}\n\nRequired answer format: {}\n\n",
        task.instructions, task.answer_format
    );
    let mut images = Vec::new();

    for (i, file) in files.iter().enumerate() {
        match file {
            Ok(file) => match file.kind {
                FileKind::Text => {
                    let text = String::from_utf8_lossy(&file.bytes);
                    message.push_str(&format!(
                        "File {} ({}):\n{}\n\n",
                        i + 1,
                        file.url,
                        truncate_text(&text, MAX_INLINE_CHARS)
                    ));
                }
                FileKind::Image => {
                    images.push(format!("data:{};base64,{}", file.mime(), STANDARD.encode(&file.bytes)));
                    message.push_str(&format!("File {} ({}): attached as image\n\n", i + 1, file.url));
                }
                FileKind::Binary => {
                    message.push_str(&format!(
                        "File {} ({}): binary file, {} bytes, type {}\n\n",
                        i + 1,
                        file.url,
                        file.bytes.len(),
                        file.content_type.as_deref().unwrap_or("unknown")
                    ));
                }
            },
            Err(note) => message.push_str(&format!("File {}: {}\n\n", i + 1, note)),
        }
    }

    let extra: serde_json::Map<String, JsonValue> = task
        .context
        .iter()
        .filter(|(k, _)| k.as_str() != "source_url")
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    if !extra.is_empty() {
        let pretty = serde_json::to_string_pretty(&extra).unwrap_or_default();
        message.push_str(&format!("Additional context:\n{}\n\n", pretty));
    }

    message.push_str("Reply with the final answer only.");
    (message, images)
}

/// 把模型回复解析成指定格式；无法解析时返回格式对应的兜底值或原文
pub fn parse_answer(reply: &str, format: AnswerFormat) -> Answer {
    let content = reply.trim();
    let value = match format {
        AnswerFormat::Boolean => match BOOLEAN_RE.captures(content) {
            Some(caps) => {
                let word = caps[1].to_ascii_lowercase();
                JsonValue::Bool(word == "true" || word == "yes")
            }
            None => JsonValue::Bool(false),
        },
        AnswerFormat::Number => {
            let normalized = THOUSANDS_RE.replace_all(content, "$1$2");
            NUMBER_RE
                .find(&normalized)
                .and_then(|m| parse_number(m.as_str()))
                .unwrap_or_else(|| JsonValue::from(0))
        }
        AnswerFormat::String => match serde_json::from_str::<JsonValue>(content) {
            Ok(JsonValue::String(s)) => JsonValue::String(s),
            _ => JsonValue::String(content.trim_matches('`').trim().to_string()),
        },
        AnswerFormat::JsonObject => parse_json_value(content)
            .unwrap_or_else(|| JsonValue::String(content.to_string())),
        AnswerFormat::Base64DataUri => {
            let uri = match DATA_URI_RE.find(content) {
                Some(m) => m.as_str().to_string(),
                None if BARE_BASE64_RE.is_match(content) => {
                    format!("data:image/png;base64,{}", content)
                }
                None => content.to_string(),
            };
            JsonValue::String(uri)
        }
    };
    Answer(value)
}

fn parse_number(raw: &str) -> Option<JsonValue> {
    if raw.contains(['.', 'e', 'E']) {
        let n: f64 = raw.parse().ok()?;
        serde_json::Number::from_f64(n).map(JsonValue::Number)
    } else {
        raw.parse::<i64>().ok().map(JsonValue::from)
    }
}

fn parse_json_value(content: &str) -> Option<JsonValue> {
    if let Ok(value) = serde_json::from_str::<JsonValue>(content) {
        return Some(value);
    }
    if let Some(caps) = FENCED_JSON_RE.captures(content) {
        if let Ok(value) = serde_json::from_str::<JsonValue>(&caps[1]) {
            return Some(value);
        }
    }
    BRACED_RE
        .find(content)
        .and_then(|m| serde_json::from_str::<JsonValue>(m.as_str()).ok())
}

/// 图片答案在本地检查大小，超过提交上限的答案不会被发送
fn check_payload_size(answer: &Answer, format: AnswerFormat, limit: usize) -> AppResult<()> {
    if format != AnswerFormat::Base64DataUri {
        return Ok(());
    }
    let size = answer.value().as_str().map(str::len).unwrap_or(0);
    if size > limit {
        warn!("⚠️ 图片答案 {} 字节超过上限 {} 字节", size, limit);
        return Err(ApiError::PayloadTooLarge { size, limit }.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_boolean() {
        assert_eq!(parse_answer("True", AnswerFormat::Boolean).0, json!(true));
        assert_eq!(parse_answer("The answer is no.", AnswerFormat::Boolean).0, json!(false));
        assert_eq!(parse_answer("unclear", AnswerFormat::Boolean).0, json!(false));
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_answer("The sum is 12,345.", AnswerFormat::Number).0, json!(12345));
        assert_eq!(parse_answer("-3.5", AnswerFormat::Number).0, json!(-3.5));
        assert_eq!(parse_answer("none", AnswerFormat::Number).0, json!(0));
    }

    #[test]
    fn test_parse_json_object_from_fenced_block() {
        let reply = "Here you go:\n```json\n{\"a\": 1, \"b\": [2, 3]}\n```";
        assert_eq!(parse_answer(reply, AnswerFormat::JsonObject).0, json!({"a": 1, "b": [2, 3]}));
    }

    #[test]
    fn test_parse_json_object_embedded_in_text() {
        let reply = "Result: {\"city\": \"Paris\"} as requested";
        assert_eq!(parse_answer(reply, AnswerFormat::JsonObject).0, json!({"city": "Paris"}));
    }

    #[test]
    fn test_parse_string_unwraps_json_string() {
        assert_eq!(parse_answer("\"hello world\"", AnswerFormat::String).0, json!("hello world"));
        assert_eq!(parse_answer("`abc`", AnswerFormat::String).0, json!("abc"));
    }

    #[test]
    fn test_parse_data_uri() {
        let reply = "Chart: data:image/png;base64,iVBORw0KGgo= done";
        assert_eq!(
            parse_answer(reply, AnswerFormat::Base64DataUri).0,
            json!("data:image/png;base64,iVBORw0KGgo=")
        );
        assert_eq!(
            parse_answer("iVBORw0KGgoAAAANSUhEUg==", AnswerFormat::Base64DataUri).0,
            json!("data:image/png;base64,iVBORw0KGgoAAAANSUhEUg==")
        );
    }

    #[test]
    fn test_oversized_image_answer_is_rejected() {
        let big = Answer(json!(format!("data:image/png;base64,{}", "A".repeat(2048))));
        let err = check_payload_size(&big, AnswerFormat::Base64DataUri, 1024).unwrap_err();
        assert!(matches!(
            err,
            crate::error::AppError::Api(ApiError::PayloadTooLarge { limit: 1024, .. })
        ));
        assert!(check_payload_size(&big, AnswerFormat::String, 1024).is_ok());
    }
}
