//! 单连接处理状态机
//!
//! `Admitted → Reading → (Skipped | Proxying) → Reading → … → Closed`
//!
//! - 开始前阻塞获取准入许可，许可随 handler 退出自动释放
//! - 每次读一行前重新计时空闲超时
//! - 读失败（超时、对端关闭、I/O 错误、EOF 前的半行）直接结束循环，不再重读
//! - `quit` 行关闭连接；其余行尝试获取令牌，成功则调用外部服务并写回，失败则静默跳过
//! - 行内容以原始字节交给查询服务，不做 UTF-8 转换

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use crate::context::GatewayContext;
use crate::error::{Result, ServerError};

/// 终止连接的控制行
pub const QUIT_COMMAND: &[u8] = b"quit";

/// 单行处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// 调用了外部服务并写回了响应
    Proxied { bytes: usize },
    /// 调用了外部服务但没有可写回的内容
    NoResponse,
    /// 令牌预算耗尽，跳过外部调用
    Skipped,
    /// 写回失败（连接继续处理下一行）
    WriteFailed,
}

/// 连接结束原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// 客户端发送了 quit
    Quit,
    /// 读失败
    ReadFailed(String),
}

/// 去掉一个结尾 `\n`，再去掉一个结尾 `\r`
pub fn normalize_line(raw: &[u8]) -> &[u8] {
    let line = raw.strip_suffix(b"\n").unwrap_or(raw);
    line.strip_suffix(b"\r").unwrap_or(line)
}

/// 带空闲超时读取一行（包含结尾的 `\n`）。
///
/// 对端关闭时残留的不完整行视为读失败，不作为有效行处理。
pub async fn read_line<R>(reader: &mut R, buf: &mut Vec<u8>, idle_timeout: Duration) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    let n = tokio::time::timeout(idle_timeout, reader.read_until(b'\n', buf)).await??;

    if n == 0 {
        return Err(ServerError::PeerClosed("EOF".to_string()));
    }
    if buf.last() != Some(&b'\n') {
        return Err(ServerError::PeerClosed(format!(
            "连接关闭时存在未结束的行（{} 字节）",
            n
        )));
    }
    Ok(())
}

/// 连接处理器
pub struct ConnectionHandler<S> {
    ctx: Arc<GatewayContext>,
    stream: S,
    peer: SocketAddr,
    id: u64,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(ctx: Arc<GatewayContext>, stream: S, peer: SocketAddr) -> Self {
        let id = ctx.next_connection_id();
        Self {
            ctx,
            stream,
            peer,
            id,
        }
    }

    /// 运行连接处理循环直到连接结束
    pub async fn run(self) -> CloseReason {
        let Self {
            ctx,
            stream,
            peer,
            id,
        } = self;

        // 准入：满员时在这里阻塞，此前不做任何读取
        let _permit = ctx.gate.acquire().await;
        debug!("🔌 [conn {}] {} admitted, active={}", id, peer, ctx.gate.active());

        let (reader, mut writer) = tokio::io::split(stream);
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        let reason = loop {
            if let Err(e) = read_line(&mut reader, &mut buf, ctx.read_timeout).await {
                if e.is_connection_local() {
                    info!("[conn {}] {} read ended: {}", id, peer, e);
                } else {
                    warn!("[conn {}] {} read failed: {}", id, peer, e);
                }
                break CloseReason::ReadFailed(e.to_string());
            }

            ctx.counters.record_received();

            let line = normalize_line(&buf);
            if line == QUIT_COMMAND {
                info!("👋 [conn {}] {} quit connection", id, peer);
                break CloseReason::Quit;
            }

            let outcome = process_line(&ctx, line, &mut writer).await;
            debug!(
                "[conn {}] line={:?} outcome={:?}",
                id,
                String::from_utf8_lossy(line),
                outcome
            );

            ctx.counters.record_processed();
        };

        if let Err(e) = writer.shutdown().await {
            debug!("[conn {}] {} shutdown failed: {}", id, peer, e);
        }
        debug!("🔌 [conn {}] {} closed: {:?}", id, peer, reason);

        reason
    }
}

/// 处理一行：获取令牌 → 调用外部服务 → 写回响应
async fn process_line<W>(ctx: &GatewayContext, query: &[u8], writer: &mut W) -> LineOutcome
where
    W: AsyncWrite + Unpin,
{
    if !ctx.budget.try_acquire() {
        debug!("⏭️ Skip calling external API: budget exhausted");
        return LineOutcome::Skipped;
    }

    let Some(payload) = ctx.lookup.lookup(query).await else {
        return LineOutcome::NoResponse;
    };

    let written = async {
        writer.write_all(&payload).await?;
        writer.flush().await
    }
    .await;

    match written {
        Ok(()) => LineOutcome::Proxied {
            bytes: payload.len(),
        },
        Err(e) => {
            warn!("conn.Write failed: {}", e);
            LineOutcome::WriteFailed
        }
    }
}
