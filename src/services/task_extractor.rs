//! 任务提取服务
//!
//! 从渲染后的 HTML 中找出 base64 编码的任务说明，再从说明里解析提交地址、
//! 答案格式和需要下载的文件。纯函数，不做任何 IO。

use base64::{engine::general_purpose::STANDARD, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value as JsonValue};
use tracing::{debug, info};
use url::Url;

use crate::error::{AppResult, TaskError};
use crate::models::{AnswerFormat, QuizTask};
use crate::services::collaborators::TaskExtractor;

/// base64 候选最短长度
const MIN_BASE64_LEN: usize = 20;

lazy_static! {
    /// 依次查找的容器标签
    static ref CONTAINER_RES: Vec<(&'static str, Regex)> = ["pre", "code", "div", "span"]
        .iter()
        .map(|tag| {
            let re = Regex::new(&format!(r"(?is)<{tag}\b[^>]*>(.*?)</{tag}\s*>")).unwrap();
            (*tag, re)
        })
        .collect();
    static ref DATA_TASK_RE: Regex = Regex::new(r#"(?i)data-task\s*=\s*["']([^"']+)["']"#).unwrap();
    static ref SCRIPT_RE: Regex = Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").unwrap();
    static ref QUOTED_BASE64_RE: Regex = Regex::new(r#"["']([A-Za-z0-9+/]{20,}={0,2})["']"#).unwrap();
    static ref LONG_BASE64_RE: Regex = Regex::new(r"[A-Za-z0-9+/]{40,}={0,2}").unwrap();
    static ref BASE64_CHARS_RE: Regex = Regex::new(r"^[A-Za-z0-9+/]*={0,2}$").unwrap();
    static ref TAG_RE: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref NON_VISIBLE_RE: Regex = Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(?:script|style)\s*>").unwrap();
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").unwrap();

    static ref URL_RE: Regex = Regex::new(r#"https?://[^\s<>"{}|\\^`\[\]]+"#).unwrap();
    static ref RELATIVE_SUBMIT_RE: Regex = Regex::new(r#"(?i)(?:^|[\s"'(])(/[^\s"'<>()]*submit[^\s"'<>()]*)"#).unwrap();
    static ref FILE_EXT_RE: Regex = Regex::new(r"(?i)\.(pdf|csv|json|xlsx|xls|txt|png|jpg|jpeg|gif|mp3|wav|mp4)(?:[?#]|$)").unwrap();
    static ref DOWNLOAD_RE: Regex = Regex::new(r"(?i)download[:\s]+([^\s]+)").unwrap();
    static ref HEADER_RE: Regex = Regex::new(r#"(?m)\b(X-[A-Za-z0-9-]+)\s*:\s*([^\s<>"',;]+)"#).unwrap();

    /// 说明中给出的提交示例，例如 `{"email": "...", "answer": ...}`
    static ref PAYLOAD_SAMPLE_RE: Regex = Regex::new(r#"(?s)\{[^{}]*"email"[^{}]*\}"#).unwrap();
    static ref PAYLOAD_PHRASE_RE: Regex = Regex::new(r"(?i)json\s+(?:payload|body)").unwrap();
    static ref ANSWER_SAMPLE_RE: Regex = Regex::new(r#""answer"\s*:\s*(true|false|-?\d+(?:\.\d+)?|\{|\[|"data:)"#).unwrap();
}

/// 结尾需要去掉的标点
const URL_TRAILING: &[char] = &['.', ',', ';', ':', '!', '?', ')'];

/// 基于 HTML 的任务提取器
#[derive(Debug, Default, Clone)]
pub struct HtmlTaskExtractor;

impl HtmlTaskExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl TaskExtractor for HtmlTaskExtractor {
    fn extract(&self, html: &str, page_url: &str) -> AppResult<QuizTask> {
        let instructions = find_instructions(html).ok_or(TaskError::NoTaskContent)?;
        debug!("任务说明 ({} 字符)", instructions.chars().count());

        let submit_url = find_submit_url(&instructions, page_url)?;
        let answer_format = detect_answer_format(&instructions);
        let file_urls = extract_file_urls(&instructions, page_url);

        let mut context = Map::new();
        context.insert("source_url".to_string(), JsonValue::from(page_url));
        let headers = extract_headers(&instructions);
        if !headers.is_empty() {
            context.insert("headers".to_string(), JsonValue::Object(headers));
        }

        info!(
            "✓ 解析任务: 格式={}, 文件={}, 提交地址={}",
            answer_format,
            file_urls.len(),
            submit_url
        );

        Ok(QuizTask {
            instructions,
            submit_url,
            answer_format,
            file_urls,
            context,
        })
    }
}

// ========== 任务说明 ==========

/// 按优先级查找任务说明：容器标签 → data-task → script 字面量 → 任意长 base64 串 → 可见文本
fn find_instructions(html: &str) -> Option<String> {
    for (tag, re) in CONTAINER_RES.iter() {
        for caps in re.captures_iter(html) {
            let text = strip_tags(&caps[1]);
            if let Some(decoded) = decode_candidate(&text) {
                debug!("在 <{}> 中找到 base64 任务", tag);
                return Some(decoded);
            }
        }
    }

    for caps in DATA_TASK_RE.captures_iter(html) {
        if let Some(decoded) = decode_candidate(&caps[1]) {
            debug!("在 data-task 属性中找到 base64 任务");
            return Some(decoded);
        }
    }

    for script in SCRIPT_RE.captures_iter(html) {
        for caps in QUOTED_BASE64_RE.captures_iter(&script[1]) {
            if let Some(decoded) = decode_candidate(&caps[1]) {
                debug!("在 <script> 中找到 base64 任务");
                return Some(decoded);
            }
        }
    }

    for m in LONG_BASE64_RE.find_iter(html) {
        if let Some(decoded) = decode_candidate(m.as_str()) {
            debug!("在页面文本中找到 base64 任务");
            return Some(decoded);
        }
    }

    // 页面直接给出明文任务
    let visible = visible_text(html);
    if URL_RE.is_match(&visible) {
        debug!("未找到 base64 内容，使用页面可见文本");
        return Some(visible);
    }
    None
}

/// 候选串能解码为可读文本时返回解码结果
fn decode_candidate(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() < MIN_BASE64_LEN || !BASE64_CHARS_RE.is_match(&compact) {
        return None;
    }
    let bytes = STANDARD.decode(compact.as_bytes()).ok()?;
    let text = String::from_utf8(bytes).ok()?;
    let printable = text
        .chars()
        .all(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'));
    let text = text.trim();
    (printable && !text.is_empty()).then(|| text.to_string())
}

fn strip_tags(fragment: &str) -> String {
    decode_entities(&TAG_RE.replace_all(fragment, " "))
        .trim()
        .to_string()
}

fn visible_text(html: &str) -> String {
    let without_scripts = NON_VISIBLE_RE.replace_all(html, " ");
    let text = strip_tags(&without_scripts);
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

// ========== 提交地址 ==========

fn clean_url(url: &str) -> String {
    url.trim_end_matches(URL_TRAILING)
        .trim_matches(|c| c == '\'' || c == '"')
        .to_string()
}

/// 优先选择包含 "submit" 的地址，否则取第一个地址，最后尝试相对路径
fn find_submit_url(instructions: &str, page_url: &str) -> AppResult<String> {
    let urls: Vec<String> = URL_RE
        .find_iter(instructions)
        .map(|m| clean_url(m.as_str()))
        .collect();

    let candidate = urls
        .iter()
        .find(|u| u.to_lowercase().contains("submit"))
        .or_else(|| urls.first())
        .cloned();

    let candidate = match candidate {
        Some(url) => url,
        None => {
            let relative = RELATIVE_SUBMIT_RE
                .captures(instructions)
                .map(|caps| clean_url(&caps[1]))
                .ok_or(TaskError::MissingSubmitUrl)?;
            resolve(page_url, &relative).ok_or(TaskError::InvalidUrl { url: relative })?
        }
    };

    match Url::parse(&candidate) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(candidate),
        _ => Err(TaskError::InvalidUrl { url: candidate }.into()),
    }
}

fn resolve(base: &str, relative: &str) -> Option<String> {
    Url::parse(base)
        .ok()?
        .join(relative)
        .ok()
        .map(|u| u.to_string())
}

// ========== 答案格式 ==========

/// 判断答案格式
///
/// 说明里带有提交示例时，以示例中 `answer` 的类型为准；否则按关键词判断
fn detect_answer_format(instructions: &str) -> AnswerFormat {
    if let Some(caps) = ANSWER_SAMPLE_RE.captures(instructions) {
        let format = match &caps[1] {
            "true" | "false" => AnswerFormat::Boolean,
            "{" | "[" => AnswerFormat::JsonObject,
            "\"data:" => AnswerFormat::Base64DataUri,
            _ => AnswerFormat::Number,
        };
        debug!("根据提交示例判断答案格式: {}", format);
        return format;
    }

    // 去掉提交示例本身，避免其中的 `{` 和 "JSON payload" 字样干扰判断
    let scan = PAYLOAD_SAMPLE_RE.replace_all(instructions, " ");
    let scan = PAYLOAD_PHRASE_RE.replace_all(&scan, " ");
    let lower = scan.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| lower.contains(k));

    if has_any(&["base64", "data:image", "chart", "visualization", "image"]) {
        AnswerFormat::Base64DataUri
    } else if has_any(&["json", "object"]) || scan.contains('{') {
        AnswerFormat::JsonObject
    } else if has_any(&["true", "false", "boolean", "yes/no"]) {
        AnswerFormat::Boolean
    } else if has_any(&["number", "count", "sum", "average", "total"]) {
        AnswerFormat::Number
    } else {
        AnswerFormat::String
    }
}

// ========== 文件与请求头 ==========

/// 带数据文件扩展名的地址，以及 `download: <url>` 形式提到的地址，按出现顺序去重
fn extract_file_urls(instructions: &str, page_url: &str) -> Vec<String> {
    let mut file_urls: Vec<String> = Vec::new();
    let mut push = |url: String| {
        if !file_urls.contains(&url) {
            file_urls.push(url);
        }
    };

    for m in URL_RE.find_iter(instructions) {
        let url = clean_url(m.as_str());
        if FILE_EXT_RE.is_match(&url) {
            push(url);
        }
    }

    for caps in DOWNLOAD_RE.captures_iter(instructions) {
        let url = clean_url(&caps[1]);
        if url.starts_with("http") {
            push(url);
        } else if url.starts_with('/') {
            if let Some(resolved) = resolve(page_url, &url) {
                push(resolved);
            }
        }
    }

    file_urls
}

fn extract_headers(instructions: &str) -> Map<String, JsonValue> {
    HEADER_RE
        .captures_iter(instructions)
        .map(|caps| (caps[1].to_string(), JsonValue::from(&caps[2])))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE_URL: &str = "https://quiz.example.com/quiz-834";

    fn encode(text: &str) -> String {
        STANDARD.encode(text)
    }

    #[test]
    fn test_extract_from_pre_block() {
        let instructions = "Q834. Download https://quiz.example.com/data.csv and sum the value column.\n\
                            Post your answer to https://quiz.example.com/submit";
        let html = format!(
            "<html><body><div id=\"result\"><pre>{}</pre></div></body></html>",
            encode(instructions)
        );

        let task = HtmlTaskExtractor::new().extract(&html, PAGE_URL).unwrap();
        assert_eq!(task.instructions, instructions);
        assert_eq!(task.submit_url, "https://quiz.example.com/submit");
        assert_eq!(task.answer_format, AnswerFormat::Number);
        assert_eq!(task.file_urls, vec!["https://quiz.example.com/data.csv"]);
        assert_eq!(task.context["source_url"], PAGE_URL);
    }

    #[test]
    fn test_extract_from_script_literal() {
        let instructions = "Is the dataset sorted? Answer true or false. Submit to https://grader.example.com/answer.";
        let html = format!(
            "<html><body><div id=\"out\"></div><script>document.querySelector('#out').innerHTML = atob('{}');</script></body></html>",
            encode(instructions)
        );

        let task = HtmlTaskExtractor::new().extract(&html, PAGE_URL).unwrap();
        assert_eq!(task.submit_url, "https://grader.example.com/answer");
        assert_eq!(task.answer_format, AnswerFormat::Boolean);
    }

    #[test]
    fn test_extract_from_data_attribute() {
        let instructions = "Return the city name as text. Submit: https://quiz.example.com/submit";
        let html = format!("<main data-task=\"{}\"></main>", encode(instructions));

        let task = HtmlTaskExtractor::new().extract(&html, PAGE_URL).unwrap();
        assert_eq!(task.answer_format, AnswerFormat::String);
    }

    #[test]
    fn test_plain_text_page_is_accepted() {
        let html = "<html><body><p>Scrape the secret code and POST it to https://quiz.example.com/submit</p></body></html>";
        let task = HtmlTaskExtractor::new().extract(html, PAGE_URL).unwrap();
        assert!(task.instructions.starts_with("Scrape the secret code"));
        assert_eq!(task.submit_url, "https://quiz.example.com/submit");
    }

    #[test]
    fn test_page_without_task_fails() {
        let err = HtmlTaskExtractor::new()
            .extract("<html><body><p>Loading...</p></body></html>", PAGE_URL)
            .unwrap_err();
        assert!(matches!(err, crate::error::AppError::Task(TaskError::NoTaskContent)));
    }

    #[test]
    fn test_relative_submit_url_is_resolved() {
        let instructions = "What is the total count of rows? POST the result to /api/submit";
        let html = format!("<pre>{}</pre>", encode(instructions));

        let task = HtmlTaskExtractor::new().extract(&html, PAGE_URL).unwrap();
        assert_eq!(task.submit_url, "https://quiz.example.com/api/submit");
    }

    #[test]
    fn test_missing_submit_url() {
        let instructions = "There is no endpoint mentioned in this particular task text.";
        let html = format!("<pre>{}</pre>", encode(instructions));
        let err = HtmlTaskExtractor::new().extract(&html, PAGE_URL).unwrap_err();
        assert!(matches!(err, crate::error::AppError::Task(TaskError::MissingSubmitUrl)));
    }

    #[test]
    fn test_submit_url_prefers_keyword_and_strips_punctuation() {
        let text = "Data at https://cdn.example.com/a.json. Send to \"https://quiz.example.com/submit?id=3\".";
        assert_eq!(
            find_submit_url(text, PAGE_URL).unwrap(),
            "https://quiz.example.com/submit?id=3"
        );
    }

    #[test]
    fn test_answer_format_from_payload_sample() {
        let text = r#"Post this JSON payload to https://q.example.com/submit:
{
  "email": "your email",
  "secret": "your secret",
  "url": "https://q.example.com/quiz-1",
  "answer": 12345
}"#;
        assert_eq!(detect_answer_format(text), AnswerFormat::Number);
    }

    #[test]
    fn test_answer_format_keywords() {
        assert_eq!(detect_answer_format("Render a chart of sales"), AnswerFormat::Base64DataUri);
        assert_eq!(detect_answer_format("Return an object with keys a and b"), AnswerFormat::JsonObject);
        assert_eq!(detect_answer_format("Answer with the average price"), AnswerFormat::Number);
        assert_eq!(detect_answer_format("Name the capital"), AnswerFormat::String);
    }

    #[test]
    fn test_file_urls_deduplicated_in_order() {
        let text = "Use https://x.example.com/b.pdf and https://x.example.com/a.csv, \
                    then download: https://x.example.com/raw and https://x.example.com/b.pdf again. \
                    Also download: /files/extra.txt";
        assert_eq!(
            extract_file_urls(text, PAGE_URL),
            vec![
                "https://x.example.com/b.pdf",
                "https://x.example.com/a.csv",
                "https://x.example.com/raw",
                "https://quiz.example.com/files/extra.txt",
            ]
        );
    }

    #[test]
    fn test_headers_are_collected_into_context() {
        let instructions = "Fetch https://api.example.com/data.json with header X-Api-Key: abc123 and submit to https://quiz.example.com/submit";
        let html = format!("<pre>{}</pre>", encode(instructions));

        let task = HtmlTaskExtractor::new().extract(&html, PAGE_URL).unwrap();
        assert_eq!(
            task.request_headers(),
            vec![("X-Api-Key".to_string(), "abc123".to_string())]
        );
    }
}
