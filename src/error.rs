use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// API 调用错误（提交、下载）
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 任务解析错误
    #[error("任务解析错误: {0}")]
    Task(#[from] TaskError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// 运行已超过截止时间
    #[error("已超过本次运行的截止时间")]
    DeadlineExceeded,
    /// 其他错误
    #[error("错误: {0}")]
    Other(String),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    /// 启动浏览器失败
    #[error("启动无头浏览器失败: {source}")]
    LaunchFailed { source: BoxError },
    /// 连接浏览器失败
    #[error("无法连接到浏览器 (端口: {port}): {source}")]
    ConnectionFailed { port: u16, source: BoxError },
    /// 创建页面失败
    #[error("创建页面失败: {source}")]
    PageCreationFailed { source: BoxError },
    /// 导航失败
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed { url: String, source: BoxError },
    /// 渲染超时
    #[error("渲染 {url} 超时 ({secs} 秒)")]
    RenderTimeout { url: String, secs: u64 },
    /// 执行脚本或读取页面内容失败
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed { source: BoxError },
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 网络请求失败（连接、超时等传输层错误）
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed { endpoint: String, source: BoxError },
    /// API 返回错误状态码
    #[error("API返回错误响应 ({endpoint}): status={status}, body={body:?}")]
    BadResponse {
        endpoint: String,
        status: u16,
        body: Option<String>,
    },
    /// 提交内容超过大小上限，未发送
    #[error("提交内容大小 {size} 字节超过上限 {limit} 字节")]
    PayloadTooLarge { size: usize, limit: usize },
    /// 下载文件超过大小上限
    #[error("文件 {url} 超过大小上限 {limit} 字节")]
    FileTooLarge { url: String, limit: usize },
    /// JSON 解析失败
    #[error("JSON解析失败: {source}")]
    JsonParseFailed { source: BoxError },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed { model: String, source: BoxError },
    /// 构建请求失败
    #[error("构建 LLM 请求失败: {source}")]
    RequestBuildFailed { source: BoxError },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 任务解析错误
#[derive(Debug, Error)]
pub enum TaskError {
    /// 页面中找不到任务内容
    #[error("页面中找不到任务内容")]
    NoTaskContent,
    /// 页面中找不到提交地址
    #[error("任务说明中找不到提交地址")]
    MissingSubmitUrl,
    /// URL 无效
    #[error("无效的 URL: {url}")]
    InvalidUrl { url: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 缺少必填配置
    #[error("缺少必填配置 {name}")]
    MissingValue { name: String },
    /// 读取配置文件失败
    #[error("读取配置文件 {path} 失败: {source}")]
    FileReadFailed { path: String, source: BoxError },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed { path: String, source: BoxError },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            source: Box::new(err),
        })
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err.url().map(|u| u.to_string()).unwrap_or_default();
        AppError::Api(ApiError::RequestFailed {
            endpoint,
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }

    /// 是否为可重试的瞬时错误
    ///
    /// 传输层失败和 5xx 可以重试；4xx、解析失败、超限都不重试
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::Api(ApiError::RequestFailed { .. }) => true,
            AppError::Api(ApiError::BadResponse { status, .. }) => *status >= 500,
            AppError::Browser(_) => true,
            _ => false,
        }
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
