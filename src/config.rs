use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// 程序配置
///
/// 加载顺序：默认值 → `QUIZ_CONFIG_FILE` 指向的 TOML 文件 → 环境变量
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 监听地址
    pub api_host: String,
    /// 监听端口
    pub api_port: u16,
    /// 提交答案时使用的身份
    pub student_email: String,
    /// 入口鉴权用的密钥，同时随答案提交
    pub student_secret: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 运行时限 ---
    /// 单次运行的总时长（秒）
    pub quiz_timeout_secs: u64,
    /// 完成一次完整求解所需的最短时间（秒）
    pub min_cycle_secs: u64,
    /// 单次渲染超时（秒）
    pub render_timeout_secs: u64,
    /// 渲染失败后的重试次数
    pub render_max_retries: usize,
    /// 单次提交超时（秒）
    pub submit_timeout_secs: u64,
    /// 提交传输失败后的重试次数
    pub submit_max_retries: usize,
    /// 答错且没有下一题时，同一题的重试次数
    pub same_quiz_max_retries: usize,
    // --- 大小限制 ---
    pub max_payload_bytes: usize,
    pub max_file_bytes: usize,
    /// 同时运行的任务数量
    pub max_concurrent_runs: usize,
    // --- 浏览器配置 ---
    pub browser_headless: bool,
    pub chrome_executable: Option<String>,
    /// 设置后连接已有浏览器而不是启动新的
    pub browser_debug_port: Option<u16>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            student_email: String::new(),
            student_secret: String::new(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o".to_string(),
            quiz_timeout_secs: 180,
            min_cycle_secs: 5,
            render_timeout_secs: 30,
            render_max_retries: 1,
            submit_timeout_secs: 30,
            submit_max_retries: 2,
            same_quiz_max_retries: 1,
            max_payload_bytes: 1024 * 1024,
            max_file_bytes: 10 * 1024 * 1024,
            max_concurrent_runs: 4,
            browser_headless: true,
            chrome_executable: None,
            browser_debug_port: None,
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载完整配置并校验
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("QUIZ_CONFIG_FILE") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => Self::default(),
        };
        let config = base.with_env()?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 文件加载
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadFailed {
            path: path.to_string(),
            source: Box::new(e),
        })?;
        Self::from_toml_str(&content, path)
    }

    fn from_toml_str(content: &str, path: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::TomlParseFailed {
            path: path.to_string(),
            source: Box::new(e),
        })
    }

    /// 用环境变量覆盖已有配置
    pub fn with_env(self) -> Result<Self, ConfigError> {
        Ok(Self {
            api_host: env_string("API_HOST").unwrap_or(self.api_host),
            api_port: env_parse("API_PORT", "u16")?.unwrap_or(self.api_port),
            student_email: env_string("STUDENT_EMAIL").unwrap_or(self.student_email),
            student_secret: env_string("STUDENT_SECRET").unwrap_or(self.student_secret),
            llm_api_key: env_string("LLM_API_KEY").unwrap_or(self.llm_api_key),
            llm_api_base_url: env_string("LLM_API_BASE_URL").unwrap_or(self.llm_api_base_url),
            llm_model_name: env_string("LLM_MODEL_NAME").unwrap_or(self.llm_model_name),
            quiz_timeout_secs: env_parse("QUIZ_TIMEOUT_SECS", "u64")?
                .unwrap_or(self.quiz_timeout_secs),
            min_cycle_secs: env_parse("MIN_CYCLE_SECS", "u64")?.unwrap_or(self.min_cycle_secs),
            render_timeout_secs: env_parse("RENDER_TIMEOUT_SECS", "u64")?
                .unwrap_or(self.render_timeout_secs),
            render_max_retries: env_parse("RENDER_MAX_RETRIES", "usize")?
                .unwrap_or(self.render_max_retries),
            submit_timeout_secs: env_parse("SUBMIT_TIMEOUT_SECS", "u64")?
                .unwrap_or(self.submit_timeout_secs),
            submit_max_retries: env_parse("SUBMIT_MAX_RETRIES", "usize")?
                .unwrap_or(self.submit_max_retries),
            same_quiz_max_retries: env_parse("SAME_QUIZ_MAX_RETRIES", "usize")?
                .unwrap_or(self.same_quiz_max_retries),
            max_payload_bytes: env_parse("MAX_PAYLOAD_BYTES", "usize")?
                .unwrap_or(self.max_payload_bytes),
            max_file_bytes: env_parse("MAX_FILE_BYTES", "usize")?.unwrap_or(self.max_file_bytes),
            max_concurrent_runs: env_parse("MAX_CONCURRENT_RUNS", "usize")?
                .unwrap_or(self.max_concurrent_runs),
            browser_headless: env_parse("BROWSER_HEADLESS", "bool")?
                .unwrap_or(self.browser_headless),
            chrome_executable: env_string("CHROME_EXECUTABLE").or(self.chrome_executable),
            browser_debug_port: env_parse("BROWSER_DEBUG_PORT", "u16")?
                .or(self.browser_debug_port),
            verbose_logging: env_parse("VERBOSE_LOGGING", "bool")?
                .unwrap_or(self.verbose_logging),
        })
    }

    /// 校验必填项
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("STUDENT_EMAIL", &self.student_email),
            ("STUDENT_SECRET", &self.student_secret),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingValue {
                    name: name.to_string(),
                });
            }
        }
        if self.max_concurrent_runs == 0 {
            return Err(ConfigError::EnvVarParseFailed {
                var_name: "MAX_CONCURRENT_RUNS".to_string(),
                value: "0".to_string(),
                expected_type: "正整数".to_string(),
            });
        }
        Ok(())
    }

    /// 请求中的邮箱是否与配置的身份一致（忽略大小写和首尾空白）
    pub fn is_expected_email(&self, email: &str) -> bool {
        self.student_email.trim().eq_ignore_ascii_case(email.trim())
    }

    /// 监听地址
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }

    pub fn quiz_timeout(&self) -> Duration {
        Duration::from_secs(self.quiz_timeout_secs)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_secs(self.render_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str, expected_type: &str) -> Result<Option<T>, ConfigError> {
    match env_string(name) {
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value,
                expected_type: expected_type.to_string(),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_quiz_rules() {
        let config = Config::default();
        assert_eq!(config.quiz_timeout(), Duration::from_secs(180));
        assert_eq!(config.max_payload_bytes, 1024 * 1024);
        assert_eq!(config.render_max_retries, 1);
        assert!(config.student_secret.is_empty());
    }

    #[test]
    fn test_validate_requires_secret() {
        let config = Config {
            student_email: "student@example.com".to_string(),
            ..Default::default()
        };
        match config.validate() {
            Err(ConfigError::MissingValue { name }) => assert_eq!(name, "STUDENT_SECRET"),
            other => panic!("应当缺少 STUDENT_SECRET: {:?}", other),
        }
    }

    #[test]
    fn test_expected_email_ignores_case_and_whitespace() {
        let config = Config {
            student_email: "Student@Example.com".to_string(),
            ..Default::default()
        };
        assert!(config.is_expected_email(" student@example.com "));
        assert!(!config.is_expected_email("other@example.com"));
    }

    #[test]
    fn test_toml_partial_override() {
        let content = r#"
            student_email = "student@example.com"
            student_secret = "s3cret"
            quiz_timeout_secs = 120
        "#;
        let config = Config::from_toml_str(content, "inline.toml").unwrap();
        assert_eq!(config.quiz_timeout_secs, 120);
        assert_eq!(config.api_port, 8000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_parse_error_reports_path() {
        let err = Config::from_toml_str("quiz_timeout_secs = \"abc\"", "bad.toml").unwrap_err();
        assert!(err.to_string().contains("bad.toml"));
    }
}
