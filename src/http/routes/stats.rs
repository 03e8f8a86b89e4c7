//! GET /tcp、/stats、/metrics、/health

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::context::StatsSnapshot;
use crate::http::HttpServerState;

/// GET /tcp：纯文本统计快照
pub async fn tcp_stats_handler(State(state): State<HttpServerState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        state.ctx.snapshot().to_string(),
    )
}

/// GET /stats：JSON 统计快照
pub async fn json_stats_handler(State(state): State<HttpServerState>) -> Json<StatsSnapshot> {
    Json(state.ctx.snapshot())
}

/// Prometheus 文本暴露格式
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /metrics：网关计数器的 Prometheus 视图，由统计汇总任务周期性刷新。
/// 记录器未安装（统计端点被单独嵌入、未走 `GatewayServer::run`）时返回 503。
pub async fn prometheus_handler() -> Response {
    match crate::infra::metrics::render() {
        Some(body) => ([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body).into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "linegate: prometheus recorder not installed",
        )
            .into_response(),
    }
}

pub async fn health_handler() -> &'static str {
    "ok"
}
