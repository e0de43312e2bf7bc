use serde::{Deserialize, Serialize};

/// 一次提交的判定结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionVerdict {
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// 下一题地址。答对时表示继续，答错时表示可以跳过本题
    #[serde(default, rename = "url", skip_serializing_if = "Option::is_none")]
    pub next_url: Option<String>,
}

impl SubmissionVerdict {
    /// 可以直接渲染的下一题地址
    ///
    /// 空白地址视为没有下一题；只接受绝对 http(s) 地址
    pub fn renderable_next_url(&self) -> Option<&str> {
        let next = self.next_url.as_deref()?.trim();
        match url::Url::parse(next) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Some(next),
            _ => None,
        }
    }

    /// 规范化下一题地址：空白去掉，相对地址按 `base` 解析
    ///
    /// # 参数
    /// - `base`: 返回该判定的地址（提交地址）
    pub fn resolve_next_url(mut self, base: &str) -> Self {
        self.next_url = self
            .next_url
            .take()
            .map(|next| next.trim().to_string())
            .filter(|next| !next.is_empty())
            .and_then(|next| match url::Url::parse(&next) {
                Ok(_) => Some(next),
                Err(url::ParseError::RelativeUrlWithoutBase) => url::Url::parse(base)
                    .and_then(|base| base.join(&next))
                    .map(|joined| joined.to_string())
                    .ok(),
                Err(_) => None,
            });
        self
    }

    /// 求解失败或答案未发送时使用的“答错”判定
    pub fn synthetic_incorrect(reason: Option<String>) -> Self {
        Self {
            correct: false,
            reason,
            next_url: None,
        }
    }
}
