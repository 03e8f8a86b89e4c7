//! HTTP 路由模块
//!
//! 路由结构：
//! - `/tcp`     - 人类可读的连接 / 请求统计快照
//! - `/stats`   - 同一快照的 JSON 形式
//! - `/metrics` - Prometheus 抓取端点
//! - `/health`  - 存活检查

pub mod stats;

use axum::{routing::get, Router};
use crate::http::HttpServerState;

/// 创建所有路由
pub fn create_routes() -> Router<HttpServerState> {
    Router::new()
        .route("/metrics", get(stats::prometheus_handler))
        .route("/tcp", get(stats::tcp_stats_handler))
        .route("/stats", get(stats::json_stats_handler))
        .route("/health", get(stats::health_handler))
}
