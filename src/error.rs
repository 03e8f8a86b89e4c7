use thiserror::Error;

/// 服务器错误类型
#[derive(Debug, Error)]
pub enum ServerError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// 监听地址绑定失败
    #[error("Bind error: {0}")]
    Bind(String),
    /// accept 失败（致命，进程退出）
    #[error("Accept error: {0}")]
    Accept(String),
    /// 读超时
    #[error("Timeout error: {0}")]
    Timeout(String),
    /// 对端关闭连接
    #[error("Peer closed: {0}")]
    PeerClosed(String),
    /// 网络 I/O 错误
    #[error("Network error: {0}")]
    Network(String),
    /// 外部查询服务错误
    #[error("Lookup error: {0}")]
    Lookup(String),
}

impl ServerError {
    /// 是否属于单个连接内的读错误（读超时 / 对端关闭 / I/O 错误）
    pub fn is_connection_local(&self) -> bool {
        matches!(
            self,
            ServerError::Timeout(_) | ServerError::PeerClosed(_) | ServerError::Network(_)
        )
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        ServerError::Network(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ServerError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        ServerError::Timeout(err.to_string())
    }
}

impl From<reqwest::Error> for ServerError {
    fn from(err: reqwest::Error) -> Self {
        ServerError::Lookup(err.to_string())
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, ServerError>;
