use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::LookupService;

/// 回显查询服务（用于测试和本地调试）
///
/// 不访问网络，直接把查询内容作为响应体返回
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoLookup;

#[async_trait]
impl LookupService for EchoLookup {
    async fn lookup(&self, query: &[u8]) -> Option<Bytes> {
        debug!("[ECHO LOOKUP] query={:?}", String::from_utf8_lossy(query));
        if query.is_empty() {
            return None;
        }
        Some(Bytes::copy_from_slice(query))
    }

    fn name(&self) -> &'static str {
        "echo"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_returns_query() {
        let lookup = EchoLookup;
        assert_eq!(lookup.lookup(b"42").await, Some(Bytes::from_static(b"42")));
        assert_eq!(lookup.lookup(b"").await, None);
        // 非 UTF-8 字节原样返回
        assert_eq!(
            lookup.lookup(b"\xffab").await,
            Some(Bytes::from_static(b"\xffab"))
        );
    }
}
