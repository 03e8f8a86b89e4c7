use anyhow::Context;
use clap::Parser;
use linegate::{
    cli::{Cli, Commands},
    config::{self, ServerConfig},
    logging, GatewayServer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 不存在时忽略
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Some(command) = &cli.command {
        return run_subcommand(command, &cli);
    }

    let (level, format, file) = resolve_logging(&cli);
    let log_guard = logging::init_logging(&level, format.as_deref(), file.as_deref(), cli.quiet)?;

    tracing::info!("🚀 linegate {} starting", env!("CARGO_PKG_VERSION"));

    let config = ServerConfig::load(&cli).context("无法加载网关配置")?;
    let server = match GatewayServer::new(config) {
        Ok(server) => server,
        Err(e) => {
            tracing::error!("❌ 网关初始化失败: {}", e);
            drop(log_guard);
            std::process::exit(1);
        }
    };

    // run 只在 bind / accept 失败时返回，两者都是致命错误
    if let Err(e) = server.run().await {
        tracing::error!("❌ 监听失败，进程退出: {}", e);
        drop(log_guard);
        std::process::exit(1);
    }

    Ok(())
}

/// 日志参数：命令行 > LINEGATE_LOG_LEVEL > 配置文件 [logging] > info
fn resolve_logging(cli: &Cli) -> (String, Option<String>, Option<String>) {
    let early = config::load_early_logging_config(cli.config_file.as_deref());

    let level = cli
        .get_log_level()
        .or(early.level)
        .unwrap_or_else(|| "info".to_string());
    let format = cli.get_log_format().or(early.format);
    let file = cli.log_file.clone().or(early.file);

    (level, format, file)
}

fn run_subcommand(command: &Commands, cli: &Cli) -> anyhow::Result<()> {
    match command {
        Commands::GenerateConfig { path } => {
            std::fs::write(path, config::DEFAULT_CONFIG_TOML)
                .with_context(|| format!("写入 {} 失败", path))?;
            println!("✅ 默认配置已写入 {}", path);
        }
        Commands::ValidateConfig { path } => {
            let config = ServerConfig::from_toml_file(path)
                .with_context(|| format!("{} 不是有效的 linegate 配置", path))?;
            println!("✅ {} 校验通过", path);
            println!("  - listen:          {}", config.bind_address());
            println!("  - max connections: {}", config.max_connections);
            println!(
                "  - rate budget:     {} calls / {}ms",
                config.api_rate_limit, config.refill_interval_ms
            );
            println!("  - lookup:          {}", config.lookup.base_url);
        }
        Commands::ShowConfig => {
            let config = ServerConfig::load(cli).context("无法加载网关配置")?;
            println!("# 默认值 + 配置文件 + LINEGATE_* + 命令行");
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }
    Ok(())
}
