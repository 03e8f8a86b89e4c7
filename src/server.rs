use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::context::GatewayContext;
use crate::error::{Result, ServerError};
use crate::handler::ConnectionHandler;
use crate::http::StatsHttpServer;
use crate::lookup::{self, LookupService};

/// 统计汇总任务的上报周期
const STATS_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// TCP 网关服务器
pub struct GatewayServer {
    config: ServerConfig,
    ctx: Arc<GatewayContext>,
}

impl GatewayServer {
    /// 创建新的网关服务器，查询服务由配置决定
    pub fn new(config: ServerConfig) -> Result<Self> {
        let lookup = lookup::from_config(&config.lookup)?;
        Ok(Self::with_lookup(config, lookup))
    }

    /// 使用指定的查询服务创建网关服务器
    pub fn with_lookup(config: ServerConfig, lookup: Arc<dyn LookupService>) -> Self {
        info!("🔧 初始化网关组件 (lookup={})", lookup.name());
        let ctx = Arc::new(GatewayContext::new(&config, lookup));
        Self { config, ctx }
    }

    /// 共享上下文（供统计端点和测试读取）
    pub fn context(&self) -> Arc<GatewayContext> {
        self.ctx.clone()
    }

    /// 绑定 TCP 监听地址
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_address();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{}: {}", addr, e)))?;
        info!("🔗 Listen to {}", listener.local_addr()?);
        Ok(listener)
    }

    /// 运行服务器：后台任务 + 统计端点 + TCP 主循环。
    ///
    /// 只在 bind 或 accept 失败时返回，调用方应以非零状态退出进程。
    pub async fn run(&self) -> Result<()> {
        info!("🚀 启动网关主循环...");
        self.show_config_info();

        let listener = self.bind().await?;
        self.start_background_tasks();

        if self.config.enable_stats {
            self.start_http_server();
        }

        self.serve(listener).await
    }

    /// accept 主循环：每个连接一个 task，accept 失败视为致命错误直接返回
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await.map_err(|e| {
                error!("❌ l.Accept failed: {}", e);
                ServerError::Accept(e.to_string())
            })?;
            self.spawn_connection(stream, peer);
        }
    }

    fn spawn_connection(&self, stream: tokio::net::TcpStream, peer: SocketAddr) {
        debug!("📥 accepted {}", peer);
        let handler = ConnectionHandler::new(self.ctx.clone(), stream, peer);
        tokio::spawn(handler.run());
    }

    /// 显示配置信息
    fn show_config_info(&self) {
        info!("📊 网关配置信息:");
        info!("  - TCP 监听地址: {}", self.config.bind_address());
        info!("  - 最大连接数: {}", self.config.max_connections);
        info!(
            "  - 外部调用限额: {} 次 / {}ms",
            self.config.api_rate_limit, self.config.refill_interval_ms
        );
        info!("  - 读空闲超时: {}秒", self.config.read_timeout_secs);
        info!("  - 查询服务: {}", self.ctx.lookup.name());
        if self.config.enable_stats {
            info!("  - 统计端口: {}", self.config.stats_port);
        }
    }

    /// 启动后台任务：令牌补充、速率清零、统计汇总
    pub fn start_background_tasks(&self) -> Vec<JoinHandle<()>> {
        let handles = vec![
            spawn_budget_refiller(self.ctx.clone()),
            spawn_rate_resetter(self.ctx.clone()),
            spawn_stats_reporter(self.ctx.clone(), STATS_REPORT_INTERVAL),
        ];
        info!("✅ 后台任务启动完成");
        handles
    }

    /// 在单独的 tokio task 中启动 HTTP 统计服务器；失败只记录日志，不影响 TCP 服务
    fn start_http_server(&self) {
        if let Err(e) = crate::infra::metrics::install() {
            warn!("⚠️ {}，/metrics 将返回 503", e);
        }

        let http_server = StatsHttpServer::new(self.ctx.clone(), self.config.stats_port);
        tokio::spawn(async move {
            if let Err(e) = http_server.start().await {
                error!("❌ HTTP 统计服务器启动失败: {}", e);
            }
        });

        info!(
            "✅ HTTP 统计服务器已在后台启动（端口 {}）",
            self.config.stats_port
        );
    }
}

/// 令牌补充任务：每个周期把预算补满
pub fn spawn_budget_refiller(ctx: Arc<GatewayContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ctx.refill_interval);
        // 第一次 tick 立即返回，预算初始已是满额
        interval.tick().await;
        loop {
            interval.tick().await;
            let added = ctx.budget.refill();
            if added > 0 {
                debug!("🪙 refilled {} tokens", added);
            }
        }
    })
}

/// 速率清零任务：每个周期把 rate 计数归零
pub fn spawn_rate_resetter(ctx: Arc<GatewayContext>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(ctx.refill_interval);
        interval.tick().await;
        loop {
            interval.tick().await;
            ctx.counters.reset_rate();
        }
    })
}

/// 统计汇总任务：周期性上报 Prometheus 指标并打印一行摘要
pub fn spawn_stats_reporter(ctx: Arc<GatewayContext>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;

            let snapshot = ctx.snapshot();
            crate::infra::metrics::record_snapshot(&snapshot);

            info!(
                "📊 网关统计: 连接={}/{}, 速率={}/周期, 接收={}, 处理={}, 积压={}, 跳过={}, 运行={}秒",
                snapshot.active_connections,
                ctx.gate.capacity(),
                snapshot.counters.rate,
                snapshot.counters.received,
                snapshot.counters.processed,
                snapshot.counters.backlog(),
                snapshot.lookup_skipped,
                snapshot.uptime_secs
            );
        }
    })
}
