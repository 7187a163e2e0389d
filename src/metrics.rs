use std::sync::LazyLock;

use prometheus::*;

static METRIC_QUERY_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!("iqdb_query_duration", "duration of the similarity query in seconds")
        .unwrap()
});

static METRIC_QUERY_MAX_SCORE: LazyLock<Histogram> = LazyLock::new(|| {
    register_histogram!(
        "iqdb_query_max_score",
        "max score of the similarity query",
        vec![10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]
    )
    .unwrap()
});

/// 记录一次查询耗时
pub fn observe_query_duration(duration: f64) {
    METRIC_QUERY_DURATION.observe(duration);
}

/// 记录一次查询的最高分
pub fn observe_query_max_score(score: f64) {
    METRIC_QUERY_MAX_SCORE.observe(score);
}

/// 以 prometheus 文本格式导出全部指标
pub fn gather() -> String {
    TextEncoder::new().encode_to_string(&prometheus::gather()).unwrap_or_default()
}
