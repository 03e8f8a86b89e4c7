//! 外部查询服务
//!
//! 每读到一行就以该行作为查询参数发起一次请求，把响应体原样写回客户端。
//! 查询内容按原始字节传递，不要求是合法 UTF-8。
//! 任何失败（请求错误、读取响应体失败、空响应体）都退化为"这一行没有响应"。

mod echo;
mod http;

pub use echo::EchoLookup;
pub use http::HttpLookup;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

use crate::config::LookupConfig;
use crate::error::Result;

/// 查询服务接口
#[async_trait]
pub trait LookupService: Send + Sync {
    /// 以 `query`（去掉行尾后的原始字节）发起一次查询；返回 None 表示没有可写回的内容
    async fn lookup(&self, query: &[u8]) -> Option<Bytes>;

    /// 实现名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 根据配置构造查询服务
pub fn from_config(config: &LookupConfig) -> Result<Arc<dyn LookupService>> {
    if config.echo {
        return Ok(Arc::new(EchoLookup));
    }
    Ok(Arc::new(HttpLookup::new(config)?))
}
