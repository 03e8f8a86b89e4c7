use clap::{ArgAction, Parser, Subcommand, ValueEnum};

/// linegate - 面向行的 TCP 网关，对外部查询服务做限流与背压
///
/// 命令行参数优先级最高：CLI > 环境变量 (LINEGATE_*) > 配置文件 > 默认值
#[derive(Parser, Debug, Default)]
#[command(name = "linegate", version)]
#[command(about = "面向行的 TCP 网关：准入控制 + 外部调用限流", long_about = None)]
pub struct Cli {
    #[arg(long, value_name = "FILE", help = "配置文件（默认 ./config.toml）")]
    pub config_file: Option<String>,

    #[arg(long, value_name = "ADDRESS", help_heading = "监听", help = "TCP 监听地址")]
    pub host: Option<String>,

    #[arg(long, value_name = "PORT", help_heading = "监听", help = "TCP 监听端口")]
    pub port: Option<u16>,

    #[arg(long, value_name = "PORT", help_heading = "监听", help = "HTTP 统计端点端口")]
    pub stats_port: Option<u16>,

    #[arg(long, help_heading = "监听", help = "不启动 HTTP 统计端点")]
    pub no_stats: bool,

    #[arg(long, value_name = "NUM", help_heading = "限流", help = "同时处理的连接上限，超出的连接排队等待")]
    pub max_connections: Option<u32>,

    #[arg(long, value_name = "NUM", help_heading = "限流", help = "每个补充周期允许的外部调用次数")]
    pub rate_limit: Option<u32>,

    #[arg(long, value_name = "SECS", help_heading = "限流", help = "两行之间允许的最长空闲（秒）")]
    pub read_timeout: Option<u64>,

    #[arg(long, value_name = "URL", help_heading = "查询服务", help = "外部查询服务 URL")]
    pub lookup_url: Option<String>,

    /// 本地调试：不访问网络，把每行原样回显
    #[arg(long, help_heading = "查询服务")]
    pub echo_lookup: bool,

    #[arg(long, value_name = "LEVEL", help_heading = "日志", help = "trace / debug / info / warn / error")]
    pub log_level: Option<String>,

    #[arg(long, value_enum, value_name = "FORMAT", help_heading = "日志")]
    pub log_format: Option<LogFormat>,

    #[arg(long, value_name = "PATH", help_heading = "日志", help = "写入文件而不是 stdout")]
    pub log_file: Option<String>,

    /// -v info，-vv debug，-vvv trace
    #[arg(short, action = ArgAction::Count, help_heading = "日志")]
    pub verbose: u8,

    /// 只输出错误
    #[arg(long, short = 'q', help_heading = "日志")]
    pub quiet: bool,

    /// debug 级别 + pretty 格式
    #[arg(long, help_heading = "日志")]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LogFormat::Compact => "compact",
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 把内置默认配置写到 PATH
    GenerateConfig {
        #[arg(value_name = "PATH", default_value = "config.toml")]
        path: String,
    },
    /// 解析并校验 PATH 处的配置文件，打印摘要
    ValidateConfig {
        #[arg(value_name = "PATH", default_value = "config.toml")]
        path: String,
    },
    /// 打印 默认值 + 配置文件 + 环境变量 + CLI 合并后的配置
    ShowConfig,
}

impl Cli {
    /// 命令行决定的日志级别；None 表示交给配置文件 / 环境变量
    ///
    /// `--quiet` > `--dev` > `--log-level` > `-v` 计数
    pub fn get_log_level(&self) -> Option<String> {
        let level = match (self.quiet, self.dev, self.log_level.as_deref(), self.verbose) {
            (true, _, _, _) => "error",
            (_, true, _, _) => "debug",
            (_, _, Some(level), _) => level,
            (_, _, None, 0) => return None,
            (_, _, None, 1) => "info",
            (_, _, None, 2) => "debug",
            _ => "trace",
        };
        Some(level.to_string())
    }

    pub fn get_log_format(&self) -> Option<String> {
        let format = if self.dev {
            Some(LogFormat::Pretty)
        } else {
            self.log_format
        };
        format.map(|f| f.as_str().to_string())
    }
}
