//! HTTP 统计服务器 - 使用 Axum 暴露只读统计快照

use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::context::GatewayContext;
use crate::error::{Result, ServerError};
use crate::http::routes;

/// HTTP 统计服务器共享状态
#[derive(Clone)]
pub struct HttpServerState {
    pub ctx: Arc<GatewayContext>,
}

/// HTTP 统计服务器
pub struct StatsHttpServer {
    state: HttpServerState,
    port: u16,
}

impl StatsHttpServer {
    pub fn new(ctx: Arc<GatewayContext>, port: u16) -> Self {
        Self {
            state: HttpServerState { ctx },
            port,
        }
    }

    /// 构建路由
    pub fn router(&self) -> Router {
        Router::new()
            .merge(routes::create_routes())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// 启动 HTTP 服务器（调用方负责放到单独的 tokio task 中）
    pub async fn start(&self) -> Result<()> {
        let addr = format!("0.0.0.0:{}", self.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{}: {}", addr, e)))?;

        info!("🌐 HTTP 统计服务器启动在端口 {}", self.port);

        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}
