use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// 答案格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerFormat {
    Boolean,
    Number,
    String,
    /// `data:<mime>;base64,...` 形式的数据 URI
    Base64DataUri,
    JsonObject,
}

impl AnswerFormat {
    /// 获取标准名称
    pub fn name(self) -> &'static str {
        match self {
            AnswerFormat::Boolean => "boolean",
            AnswerFormat::Number => "number",
            AnswerFormat::String => "string",
            AnswerFormat::Base64DataUri => "base64-data-uri",
            AnswerFormat::JsonObject => "json-object",
        }
    }
}

impl std::fmt::Display for AnswerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// 从渲染后页面中提取出的任务
///
/// 每访问一个题目 URL 创建一次，创建后不再修改
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizTask {
    /// 任务说明原文
    pub instructions: String,
    /// 答案提交地址（绝对 URL，始终来自页面内容）
    pub submit_url: String,
    pub answer_format: AnswerFormat,
    /// 任务引用的文件地址，按出现顺序
    #[serde(default)]
    pub file_urls: Vec<String>,
    /// 页面附带的辅助信息，例如下载文件所需的请求头
    #[serde(default)]
    pub context: Map<String, JsonValue>,
}

impl QuizTask {
    /// 下载文件时需要附带的请求头（来自 `context.headers`）
    pub fn request_headers(&self) -> Vec<(String, String)> {
        self.context
            .get("headers")
            .and_then(|v| v.as_object())
            .map(|headers| {
                headers
                    .iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// 计算得到的答案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Answer(pub JsonValue);

impl Answer {
    pub fn value(&self) -> &JsonValue {
        &self.0
    }

    /// 对应格式的兜底答案
    pub fn fallback(format: AnswerFormat) -> Self {
        let value = match format {
            AnswerFormat::Boolean => JsonValue::Bool(false),
            AnswerFormat::Number => JsonValue::from(0),
            AnswerFormat::String | AnswerFormat::Base64DataUri => JsonValue::String(String::new()),
            AnswerFormat::JsonObject => JsonValue::Object(Map::new()),
        };
        Self(value)
    }
}

impl From<JsonValue> for Answer {
    fn from(value: JsonValue) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_headers_from_context() {
        let mut context = Map::new();
        context.insert("headers".to_string(), json!({"X-Api-Key": "abc", "X-Bad": 1}));
        let task = QuizTask {
            instructions: String::new(),
            submit_url: "https://example.com/submit".to_string(),
            answer_format: AnswerFormat::Number,
            file_urls: Vec::new(),
            context,
        };
        assert_eq!(
            task.request_headers(),
            vec![("X-Api-Key".to_string(), "abc".to_string())]
        );
    }

    #[test]
    fn test_fallback_matches_format() {
        assert_eq!(Answer::fallback(AnswerFormat::Boolean).0, json!(false));
        assert_eq!(Answer::fallback(AnswerFormat::Number).0, json!(0));
        assert_eq!(Answer::fallback(AnswerFormat::JsonObject).0, json!({}));
    }
}
