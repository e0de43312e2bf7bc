//! 运行指标
//!
//! prometheus 全局注册表，`/metrics` 输出文本格式

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Encoder, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    TextEncoder,
};

use crate::models::RunReport;

lazy_static! {
    // HTTP
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .unwrap();

    // 运行
    pub static ref RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_runs_total",
        "Total number of finished quiz runs",
        &["status"]
    )
    .unwrap();

    pub static ref RUNS_ACTIVE: IntGauge = register_int_gauge!(
        "quiz_runs_active",
        "Number of quiz runs currently in progress"
    )
    .unwrap();

    pub static ref RUN_DURATION_SECONDS: Histogram = register_histogram!(
        "quiz_run_duration_seconds",
        "Wall-clock duration of a quiz run",
        vec![5.0, 15.0, 30.0, 60.0, 90.0, 120.0, 150.0, 180.0, 240.0]
    )
    .unwrap();

    pub static ref QUIZZES_SOLVED_TOTAL: IntCounter = register_int_counter!(
        "quizzes_solved_total",
        "Total number of quizzes answered correctly"
    )
    .unwrap();

    // 阶段
    pub static ref STAGE_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "quiz_stage_duration_seconds",
        "Duration of a single orchestrator stage",
        &["stage", "status"],
        vec![0.01, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .unwrap();

    pub static ref SUBMISSIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "quiz_submissions_total",
        "Total number of answers submitted",
        &["correct"]
    )
    .unwrap();
}

/// 以 prometheus 文本格式输出全部指标
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer)
        .map_err(|e| prometheus::Error::Msg(format!("指标不是合法的 UTF-8: {}", e)))
}

/// 记录一个阶段的耗时
pub fn record_stage(stage: &str, ok: bool, seconds: f64) {
    let status = if ok { "success" } else { "error" };
    STAGE_DURATION_SECONDS
        .with_label_values(&[stage, status])
        .observe(seconds);
}

/// 记录一次实际发出的提交
pub fn record_submission(correct: bool) {
    let label = if correct { "true" } else { "false" };
    SUBMISSIONS_TOTAL.with_label_values(&[label]).inc();
}

/// 记录一次运行的最终结果
pub fn record_run(report: &RunReport) {
    RUNS_TOTAL.with_label_values(&[report.status.name()]).inc();
    RUN_DURATION_SECONDS.observe(report.elapsed.as_secs_f64());
    QUIZZES_SOLVED_TOTAL.inc_by(report.quizzes_solved as u64);
}
