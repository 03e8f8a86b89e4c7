use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};
use url::{form_urlencoded, Url};

use super::LookupService;
use crate::config::LookupConfig;
use crate::error::{Result, ServerError};

/// HTTP 查询服务
///
/// `GET {base_url}?{query_param}={line}`，响应体原样返回；非 2xx 响应同样返回其响应体。
#[derive(Debug, Clone)]
pub struct HttpLookup {
    client: Client,
    base_url: Url,
    query_param: String,
}

impl HttpLookup {
    pub fn new(config: &LookupConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url).map_err(|e| {
            ServerError::Configuration(format!("lookup.base_url 无效 {}: {}", config.base_url, e))
        })?;
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url,
            query_param: config.query_param.clone(),
        })
    }

    /// 构造单次查询 URL。
    ///
    /// 查询内容按原始字节做 `application/x-www-form-urlencoded` 编码，
    /// 非 UTF-8 字节编码为 `%XX`，不做有损转换；`base_url` 自带的查询参数保留在前面。
    pub fn request_url(&self, query: &[u8]) -> Url {
        let key: String = form_urlencoded::byte_serialize(self.query_param.as_bytes()).collect();
        let value: String = form_urlencoded::byte_serialize(query).collect();
        let pair = format!("{}={}", key, value);

        let mut url = self.base_url.clone();
        let full = match url.query() {
            Some(existing) if !existing.is_empty() => format!("{}&{}", existing, pair),
            _ => pair,
        };
        url.set_query(Some(&full));
        url
    }

    async fn fetch(&self, query: &[u8]) -> Result<Bytes> {
        let url = self.request_url(query);
        debug!("[HTTP LOOKUP] GET {}", url);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            debug!(
                "[HTTP LOOKUP] non-success status {} for query={:?}",
                status,
                String::from_utf8_lossy(query)
            );
        }
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl LookupService for HttpLookup {
    async fn lookup(&self, query: &[u8]) -> Option<Bytes> {
        match self.fetch(query).await {
            Ok(body) if body.is_empty() => {
                warn!("[HTTP LOOKUP] 空响应体: query={:?}", String::from_utf8_lossy(query));
                None
            }
            Ok(body) => Some(body),
            Err(e) => {
                warn!(
                    "[HTTP LOOKUP] 请求失败: query={:?}, error={}",
                    String::from_utf8_lossy(query),
                    e
                );
                None
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_url_encodes_query() {
        let lookup = HttpLookup::new(&LookupConfig::default()).unwrap();
        let url = lookup.request_url(b"hello world&more");
        assert_eq!(
            url.as_str(),
            "http://www.google.com/search?q=hello+world%26more"
        );
    }

    #[test]
    fn test_request_url_keeps_non_utf8_bytes() {
        let lookup = HttpLookup::new(&LookupConfig::default()).unwrap();
        let url = lookup.request_url(b"\xff\xfe ok");
        assert_eq!(url.as_str(), "http://www.google.com/search?q=%FF%FE+ok");
    }

    #[test]
    fn test_request_url_appends_to_existing_query() {
        let config = LookupConfig {
            base_url: "http://lookup.local/api?lang=en".to_string(),
            ..LookupConfig::default()
        };
        let lookup = HttpLookup::new(&config).unwrap();
        assert_eq!(
            lookup.request_url(b"42").as_str(),
            "http://lookup.local/api?lang=en&q=42"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let config = LookupConfig {
            base_url: "::not a url".to_string(),
            ..LookupConfig::default()
        };
        assert!(matches!(
            HttpLookup::new(&config),
            Err(ServerError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_service_yields_none() {
        // 端口 1 上没有服务，连接被拒绝
        let config = LookupConfig {
            base_url: "http://127.0.0.1:1/search".to_string(),
            timeout_secs: 2,
            ..LookupConfig::default()
        };
        let lookup = HttpLookup::new(&config).unwrap();
        assert_eq!(lookup.lookup(b"42").await, None);
    }
}
