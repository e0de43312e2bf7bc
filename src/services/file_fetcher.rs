//! 文件下载服务
//!
//! 下载任务引用的数据文件，超过大小上限立即中止

use std::time::Duration;

use phf::phf_map;
use tracing::debug;

use crate::error::{ApiError, AppError, AppResult};

/// 文件类别，决定文件如何交给模型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// 可以直接内联到提示词的文本
    Text,
    /// 交给视觉模型的图片
    Image,
    /// 其他二进制文件，只描述大小和类型
    Binary,
}

static FILE_KINDS: phf::Map<&'static str, FileKind> = phf_map! {
    "csv" => FileKind::Text,
    "tsv" => FileKind::Text,
    "json" => FileKind::Text,
    "txt" => FileKind::Text,
    "md" => FileKind::Text,
    "xml" => FileKind::Text,
    "html" => FileKind::Text,
    "htm" => FileKind::Text,
    "png" => FileKind::Image,
    "jpg" => FileKind::Image,
    "jpeg" => FileKind::Image,
    "gif" => FileKind::Image,
    "webp" => FileKind::Image,
    "bmp" => FileKind::Image,
    "pdf" => FileKind::Binary,
    "xlsx" => FileKind::Binary,
    "xls" => FileKind::Binary,
    "mp3" => FileKind::Binary,
    "wav" => FileKind::Binary,
    "mp4" => FileKind::Binary,
};

impl FileKind {
    /// 根据 URL 的扩展名和 Content-Type 判断类别
    pub fn detect(url: &str, content_type: Option<&str>) -> Self {
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let by_extension = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.contains('/'))
            .and_then(|ext| FILE_KINDS.get(ext.as_str()).copied());
        if let Some(kind) = by_extension {
            return kind;
        }
        match content_type {
            Some(ct) if ct.starts_with("image/") => FileKind::Image,
            Some(ct) if ct.starts_with("text/") || ct.contains("json") || ct.contains("csv") => {
                FileKind::Text
            }
            _ => FileKind::Binary,
        }
    }
}

/// 下载得到的文件
#[derive(Debug, Clone)]
pub struct FetchedFile {
    pub url: String,
    pub kind: FileKind,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FetchedFile {
    /// 图片的 MIME 类型，Content-Type 缺失时按扩展名推断
    pub fn mime(&self) -> String {
        if let Some(ct) = &self.content_type {
            return ct.split(';').next().unwrap_or(ct).trim().to_string();
        }
        let lower = self.url.to_ascii_lowercase();
        let mime = if lower.contains(".png") {
            "image/png"
        } else if lower.contains(".gif") {
            "image/gif"
        } else if lower.contains(".webp") {
            "image/webp"
        } else if lower.contains(".jpg") || lower.contains(".jpeg") {
            "image/jpeg"
        } else {
            "application/octet-stream"
        };
        mime.to_string()
    }
}

/// 文件下载器
#[derive(Clone)]
pub struct FileFetcher {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl FileFetcher {
    pub fn new(client: reqwest::Client, timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client,
            timeout,
            max_bytes,
        }
    }

    /// 下载文件
    ///
    /// # 参数
    /// - `url`: 文件地址
    /// - `headers`: 附加请求头（来自任务上下文）
    pub async fn fetch(&self, url: &str, headers: &[(String, String)]) -> AppResult<FetchedFile> {
        debug!("📥 下载文件: {}", url);
        let mut request = self.client.get(url).timeout(self.timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut response = request
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::BadResponse {
                endpoint: url.to_string(),
                status: status.as_u16(),
                body: None,
            }
            .into());
        }

        if let Some(length) = response.content_length() {
            if length as usize > self.max_bytes {
                return Err(self.too_large(url));
            }
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?
        {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(self.too_large(url));
            }
            bytes.extend_from_slice(&chunk);
        }

        let kind = FileKind::detect(url, content_type.as_deref());
        debug!("✓ 文件下载完成: {} ({} 字节, {:?})", url, bytes.len(), kind);

        Ok(FetchedFile {
            url: url.to_string(),
            kind,
            content_type,
            bytes,
        })
    }

    fn too_large(&self, url: &str) -> AppError {
        ApiError::FileTooLarge {
            url: url.to_string(),
            limit: self.max_bytes,
        }
        .into()
    }
}
