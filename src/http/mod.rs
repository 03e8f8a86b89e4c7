//! HTTP 服务器模块 - 使用 Axum 提供只读统计端点
//!
//! 与 TCP 网关分开监听，只读取共享上下文的快照，不修改任何计数。

pub mod routes;
pub mod server;

pub use server::{HttpServerState, StatsHttpServer};
