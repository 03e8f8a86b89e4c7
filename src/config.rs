use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// TCP 监听地址
    pub host: String,
    /// TCP 监听端口
    pub port: u16,
    /// HTTP 统计端点端口
    pub stats_port: u16,
    /// 是否启动 HTTP 统计端点
    pub enable_stats: bool,
    /// 最大并发处理连接数（准入闸门容量）
    pub max_connections: u32,
    /// 每个补充周期允许的外部调用次数（令牌预算容量）
    pub api_rate_limit: u32,
    /// 令牌补充 / 速率计数清零周期（毫秒）
    pub refill_interval_ms: u64,
    /// 单次读空闲超时（秒）
    pub read_timeout_secs: u64,
    /// 日志级别
    pub log_level: String,
    /// 外部查询服务配置
    pub lookup: LookupConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9999,
            stats_port: 8080,
            enable_stats: true,
            max_connections: 100,
            api_rate_limit: 30,
            refill_interval_ms: 1000,
            read_timeout_secs: 30,
            log_level: "info".to_string(),
            lookup: LookupConfig::default(),
        }
    }
}

impl ServerConfig {
    /// 创建新的服务器配置
    pub fn new() -> Self {
        Self::default()
    }

    /// TCP 监听地址（host:port）
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn refill_interval(&self) -> Duration {
        Duration::from_millis(self.refill_interval_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    /// 从 TOML 文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("无法读取配置文件: {:?}", path.as_ref()))?;

        Self::from_toml_str(&content)
    }

    /// 从 TOML 文本解析配置（未填写的字段取默认值）
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content).context("配置文件格式错误")?;
        let config: Self = toml_config.into();
        config.validate()?;
        Ok(config)
    }

    /// 从环境变量加载配置（LINEGATE_ 前缀）
    pub fn merge_from_env(&mut self) -> Result<()> {
        if let Ok(host) = env::var("LINEGATE_HOST") {
            self.host = host;
        }
        if let Ok(port) = env::var("LINEGATE_PORT") {
            self.port = port.parse().unwrap_or(self.port);
        }
        if let Ok(port) = env::var("LINEGATE_STATS_PORT") {
            self.stats_port = port.parse().unwrap_or(self.stats_port);
        }
        if let Ok(max_conn) = env::var("LINEGATE_MAX_CONNECTIONS") {
            self.max_connections = max_conn.parse().unwrap_or(self.max_connections);
        }
        if let Ok(limit) = env::var("LINEGATE_RATE_LIMIT") {
            self.api_rate_limit = limit.parse().unwrap_or(self.api_rate_limit);
        }
        if let Ok(timeout) = env::var("LINEGATE_READ_TIMEOUT") {
            self.read_timeout_secs = timeout.parse().unwrap_or(self.read_timeout_secs);
        }
        if let Ok(url) = env::var("LINEGATE_LOOKUP_URL") {
            self.lookup.base_url = url;
        }
        if let Ok(log_level) = env::var("LINEGATE_LOG_LEVEL") {
            self.log_level = log_level;
        }

        Ok(())
    }

    /// 从命令行参数合并配置
    pub fn merge_from_cli(&mut self, cli: &crate::cli::Cli) {
        if let Some(host) = &cli.host {
            self.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.port = port;
        }
        if let Some(port) = cli.stats_port {
            self.stats_port = port;
        }
        if cli.no_stats {
            self.enable_stats = false;
        }
        if let Some(max_conn) = cli.max_connections {
            self.max_connections = max_conn;
        }
        if let Some(limit) = cli.rate_limit {
            self.api_rate_limit = limit;
        }
        if let Some(timeout) = cli.read_timeout {
            self.read_timeout_secs = timeout;
        }
        if let Some(url) = &cli.lookup_url {
            self.lookup.base_url = url.clone();
        }
        if cli.echo_lookup {
            self.lookup.echo = true;
        }
        if let Some(log_level) = cli.get_log_level() {
            self.log_level = log_level;
        }
    }

    /// 校验配置
    pub fn validate(&self) -> Result<()> {
        if self.max_connections == 0 {
            bail!("max_connections 必须大于 0");
        }
        if self.api_rate_limit == 0 {
            bail!("api_rate_limit 必须大于 0");
        }
        if self.refill_interval_ms == 0 {
            bail!("refill_interval_ms 必须大于 0");
        }
        if self.read_timeout_secs == 0 {
            bail!("read_timeout_secs 必须大于 0");
        }
        url::Url::parse(&self.lookup.base_url)
            .with_context(|| format!("lookup.base_url 无效: {}", self.lookup.base_url))?;
        Ok(())
    }

    /// 加载配置（按优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    pub fn load(cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = Self::new();

        if let Some(config_file) = &cli.config_file {
            if Path::new(config_file).exists() {
                info!("📄 从配置文件加载: {}", config_file);
                config = Self::from_toml_file(config_file)?;
            } else {
                tracing::warn!("⚠️ 配置文件不存在: {}", config_file);
            }
        } else if Path::new("config.toml").exists() {
            info!("📄 从默认配置文件加载: config.toml");
            config = Self::from_toml_file("config.toml")?;
        }

        config.merge_from_env()?;
        config.merge_from_cli(cli);
        config.validate()?;

        Ok(config)
    }
}

/// 外部查询服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupConfig {
    /// 查询服务基础 URL，每行内容作为查询参数附加在后面
    pub base_url: String,
    /// 查询参数名
    pub query_param: String,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
    /// 不访问外部服务，直接回显查询内容
    pub echo: bool,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: "http://www.google.com/search".to_string(),
            query_param: "q".to_string(),
            timeout_secs: 10,
            echo: false,
        }
    }
}

impl LookupConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// TOML 配置文件结构（用于反序列化）
#[derive(Debug, Deserialize)]
struct TomlConfig {
    server: Option<TomlServerConfig>,
    limits: Option<TomlLimitsConfig>,
    lookup: Option<TomlLookupConfig>,
    logging: Option<TomlLoggingConfig>,
}

#[derive(Debug, Deserialize)]
struct TomlServerConfig {
    host: Option<String>,
    port: Option<u16>,
    stats_port: Option<u16>,
    enable_stats: Option<bool>,
    read_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlLimitsConfig {
    max_connections: Option<u32>,
    api_rate_limit: Option<u32>,
    refill_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlLookupConfig {
    base_url: Option<String>,
    query_param: Option<String>,
    timeout_secs: Option<u64>,
    echo: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct TomlLoggingConfig {
    level: Option<String>,
    format: Option<String>,
    file: Option<String>,
}

impl From<TomlConfig> for ServerConfig {
    fn from(toml: TomlConfig) -> Self {
        let mut config = ServerConfig::default();

        if let Some(server) = toml.server {
            if let Some(host) = server.host {
                config.host = host;
            }
            if let Some(port) = server.port {
                config.port = port;
            }
            if let Some(port) = server.stats_port {
                config.stats_port = port;
            }
            if let Some(enable) = server.enable_stats {
                config.enable_stats = enable;
            }
            if let Some(timeout) = server.read_timeout_secs {
                config.read_timeout_secs = timeout;
            }
        }

        if let Some(limits) = toml.limits {
            if let Some(max_conn) = limits.max_connections {
                config.max_connections = max_conn;
            }
            if let Some(limit) = limits.api_rate_limit {
                config.api_rate_limit = limit;
            }
            if let Some(interval) = limits.refill_interval_ms {
                config.refill_interval_ms = interval;
            }
        }

        if let Some(lookup) = toml.lookup {
            if let Some(url) = lookup.base_url {
                config.lookup.base_url = url;
            }
            if let Some(param) = lookup.query_param {
                config.lookup.query_param = param;
            }
            if let Some(timeout) = lookup.timeout_secs {
                config.lookup.timeout_secs = timeout;
            }
            if let Some(echo) = lookup.echo {
                config.lookup.echo = echo;
            }
        }

        if let Some(level) = toml.logging.and_then(|l| l.level) {
            config.log_level = level;
        }

        config
    }
}

/// 启动早期读取的日志配置（在完整配置加载之前初始化日志）
#[derive(Debug, Default, Clone)]
pub struct EarlyLoggingConfig {
    pub level: Option<String>,
    pub format: Option<String>,
    pub file: Option<String>,
}

impl EarlyLoggingConfig {
    /// `LINEGATE_LOG_LEVEL` 优先于配置文件中的级别
    fn apply_env_level(&mut self, level: Option<String>) {
        if let Some(level) = level {
            self.level = Some(level);
        }
    }
}

/// 启动早期的日志配置：配置文件 [logging] 段 + `LINEGATE_LOG_LEVEL`
pub fn load_early_logging_config(config_file: Option<&str>) -> EarlyLoggingConfig {
    let mut early = read_logging_section(config_file.unwrap_or("config.toml"));
    early.apply_env_level(env::var("LINEGATE_LOG_LEVEL").ok());
    early
}

/// 快速读取配置文件的 [logging] 段；文件缺失或格式错误时返回空配置
fn read_logging_section(path: &str) -> EarlyLoggingConfig {
    #[derive(Deserialize)]
    struct LoggingOnly {
        logging: Option<TomlLoggingConfig>,
    }

    let Ok(content) = fs::read_to_string(path) else {
        return EarlyLoggingConfig::default();
    };

    match toml::from_str::<LoggingOnly>(&content) {
        Ok(LoggingOnly {
            logging: Some(logging),
        }) => EarlyLoggingConfig {
            level: logging.level,
            format: logging.format,
            file: logging.file,
        },
        _ => EarlyLoggingConfig::default(),
    }
}

/// `generate-config` 输出的默认配置文件
pub const DEFAULT_CONFIG_TOML: &str = r#"# linegate 配置文件
# 此文件由 linegate generate-config 生成

[server]
host = "localhost"
port = 9999
stats_port = 8080
enable_stats = true
read_timeout_secs = 30

[limits]
max_connections = 100
api_rate_limit = 30
refill_interval_ms = 1000

[lookup]
base_url = "http://www.google.com/search"
query_param = "q"
timeout_secs = 10
echo = false

[logging]
level = "info"
format = "compact"
# file = "./logs/linegate.log"
"#;
