/// 日志工具模块
///
/// 提供日志初始化、格式化和输出的辅助函数
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::models::{RunReport, RunStatus};

/// 初始化日志
///
/// `RUST_LOG` 优先；未设置时按 `verbose` 选择 debug 或 info
///
/// # 参数
/// - `verbose`: 是否输出详细日志
pub fn init(verbose: bool) {
    let default_filter = if verbose {
        "quiz_solver=debug,tower_http=debug,info"
    } else {
        "quiz_solver=info,tower_http=info,warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into());

    // 测试中可能被重复调用
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init();
}

/// 记录程序启动信息
///
/// # 参数
/// - `config`: 已加载的配置
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 题目链自动求解服务");
    info!("🌐 监听地址: {}", config.bind_addr());
    info!("🤖 模型: {} ({})", config.llm_model_name, config.llm_api_base_url);
    info!("⏱️ 单次运行预算: {} 秒", config.quiz_timeout_secs);
    info!("📊 最大并发运行数: {}", config.max_concurrent_runs);
    if config.llm_api_key.is_empty() {
        warn!("⚠️ 未设置 LLM_API_KEY，求解将使用兜底答案");
    }
    info!("{}", "=".repeat(60));
}

/// 打印一次运行的统计信息
///
/// # 参数
/// - `report`: 运行报告
pub fn print_run_summary(report: &RunReport) {
    let icon = match report.status {
        RunStatus::Completed => "✅",
        RunStatus::TimedOut => "⏰",
        RunStatus::Failed => "❌",
        RunStatus::InProgress => "⏳",
    };

    info!("\n{}", "=".repeat(60));
    info!("📊 [{}] 运行结束 {} {}", report.run_id, icon, report.status);
    info!(
        "开始时间: {}",
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    );
    info!("耗时: {:.1} 秒", report.elapsed.as_secs_f64());
    info!("{}", "─".repeat(60));
    info!("✅ 答对: {}", report.quizzes_solved);
    info!("📄 访问题目: {}", report.visited_urls.len());
    info!(
        "📨 提交次数: {}",
        report.submissions.iter().filter(|s| !s.synthetic).count()
    );
    if let Some(failure) = report.failure {
        info!("❌ 失败原因: {}", failure);
    }
    if let Some(completion) = report.completion {
        info!("🏁 结束原因: {:?}", completion);
    }
    info!("{}", "=".repeat(60));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
