use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use linegate::{EchoLookup, GatewayContext, GatewayServer, ServerConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

fn test_config(rate_limit: u32, max_connections: u32, read_timeout_secs: u64) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        enable_stats: false,
        api_rate_limit: rate_limit,
        max_connections,
        read_timeout_secs,
        // 测试期间不补充令牌
        refill_interval_ms: 60_000,
        ..ServerConfig::default()
    }
}

/// 启动只有 accept 循环的网关（不启动后台任务）
async fn start_gateway(config: ServerConfig) -> (SocketAddr, Arc<GatewayContext>) {
    let server = GatewayServer::with_lookup(config, Arc::new(EchoLookup));
    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();
    let ctx = server.context();

    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    (addr, ctx)
}

/// 在超时内读取一次；超时返回 None，EOF 返回 Some(空)
async fn read_some(stream: &mut TcpStream, wait: Duration) -> Option<Vec<u8>> {
    let mut buf = vec![0u8; 1024];
    match tokio::time::timeout(wait, stream.read(&mut buf)).await {
        Ok(Ok(n)) => Some(buf[..n].to_vec()),
        Ok(Err(_)) => Some(Vec::new()),
        Err(_) => None,
    }
}

async fn wait_until<F: Fn() -> bool>(cond: F, wait: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + wait;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cond()
}

#[tokio::test]
async fn test_echo_lookup_round_trip() {
    let (addr, ctx) = start_gateway(test_config(30, 100, 5)).await;

    let mut conn = TcpStream::connect(addr).await.unwrap();
    conn.write_all(b"42\n").await.unwrap();

    let reply = read_some(&mut conn, Duration::from_secs(2)).await;
    assert_eq!(reply.as_deref(), Some(&b"42"[..]));

    assert!(wait_until(|| ctx.counters.snapshot().processed == 1, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_multiple_clients_each_get_their_reply() {
    let (addr, ctx) = start_gateway(test_config(30, 100, 5)).await;

    let mut clients = Vec::new();
    for i in 0..10 {
        clients.push(tokio::spawn(async move {
            let mut conn = TcpStream::connect(addr).await.unwrap();
            for q in 1..=3 {
                let text = format!("{}:{}", i, q);
                conn.write_all(format!("{}\n", text).as_bytes()).await.unwrap();
                let reply = read_some(&mut conn, Duration::from_secs(2)).await.unwrap();
                assert_eq!(reply, text.as_bytes());
            }
            conn.write_all(b"quit\n").await.unwrap();
        }));
    }
    for client in clients {
        client.await.unwrap();
    }

    assert!(wait_until(|| ctx.gate.active() == 0, Duration::from_secs(2)).await);
    let snap = ctx.counters.snapshot();
    assert_eq!(snap.processed, 30);
    // 每个客户端的 quit 行也计入接收数
    assert_eq!(snap.received, 40);
    assert_eq!(ctx.budget.available(), 0);
}

#[tokio::test]
async fn test_budget_of_one_serves_exactly_one_connection() {
    let (addr, ctx) = start_gateway(test_config(1, 100, 5)).await;

    let mut a = TcpStream::connect(addr).await.unwrap();
    let mut b = TcpStream::connect(addr).await.unwrap();
    a.write_all(b"A\n").await.unwrap();
    b.write_all(b"B\n").await.unwrap();

    let reply_a = read_some(&mut a, Duration::from_millis(500)).await;
    let reply_b = read_some(&mut b, Duration::from_millis(500)).await;

    let served: Vec<_> = [reply_a, reply_b]
        .into_iter()
        .filter(|r| matches!(r, Some(bytes) if !bytes.is_empty()))
        .collect();
    assert_eq!(served.len(), 1);

    // 两条连接的行都已处理完
    assert!(wait_until(|| ctx.counters.snapshot().processed == 2, Duration::from_secs(2)).await);
    assert_eq!(ctx.budget.skipped_total(), 1);
}

#[tokio::test]
async fn test_skipped_lines_count_as_processed() {
    let (addr, ctx) = start_gateway(test_config(2, 100, 5)).await;

    let mut conn = TcpStream::connect(addr).await.unwrap();
    conn.write_all(b"1\n2\n3\n4\n5\n").await.unwrap();

    assert!(wait_until(|| ctx.counters.snapshot().processed == 5, Duration::from_secs(2)).await);
    let snap = ctx.counters.snapshot();
    assert_eq!(snap.received, 5);
    assert_eq!(snap.backlog(), 0);
    assert_eq!(ctx.budget.granted_total(), 2);
    assert_eq!(ctx.budget.skipped_total(), 3);
}

#[tokio::test]
async fn test_quit_closes_without_consuming_budget() {
    let (addr, ctx) = start_gateway(test_config(5, 100, 5)).await;

    for quit in [&b"quit\n"[..], &b"quit\r\n"[..]] {
        let mut conn = TcpStream::connect(addr).await.unwrap();
        conn.write_all(quit).await.unwrap();

        // 服务端关闭连接后读到 EOF
        let reply = read_some(&mut conn, Duration::from_secs(2)).await;
        assert_eq!(reply.as_deref(), Some(&b""[..]));
    }

    assert_eq!(ctx.budget.available(), 5);
    assert_eq!(ctx.budget.granted_total(), 0);
    assert!(wait_until(|| ctx.gate.active() == 0, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_admission_gate_stalls_extra_connection() {
    let (addr, ctx) = start_gateway(test_config(30, 1, 5)).await;

    let mut first = TcpStream::connect(addr).await.unwrap();
    first.write_all(b"first\n").await.unwrap();
    let reply = read_some(&mut first, Duration::from_secs(2)).await;
    assert_eq!(reply.as_deref(), Some(&b"first"[..]));

    // 第二个连接能建立，但在第一个连接释放槽位前不会被读取
    let mut second = TcpStream::connect(addr).await.unwrap();
    second.write_all(b"second\n").await.unwrap();
    assert_eq!(read_some(&mut second, Duration::from_millis(300)).await, None);
    assert_eq!(ctx.counters.snapshot().received, 1);
    assert_eq!(ctx.gate.active(), 1);

    first.write_all(b"quit\n").await.unwrap();

    let reply = read_some(&mut second, Duration::from_secs(2)).await;
    assert_eq!(reply.as_deref(), Some(&b"second"[..]));
    assert_eq!(ctx.gate.active(), 1);
}

#[tokio::test]
async fn test_idle_connection_is_closed_and_slot_released() {
    let (addr, ctx) = start_gateway(test_config(30, 100, 1)).await;

    let mut conn = TcpStream::connect(addr).await.unwrap();
    assert!(wait_until(|| ctx.gate.active() == 1, Duration::from_secs(1)).await);

    let reply = read_some(&mut conn, Duration::from_secs(3)).await;
    assert_eq!(reply.as_deref(), Some(&b""[..]));
    assert!(wait_until(|| ctx.gate.active() == 0, Duration::from_secs(1)).await);
    assert_eq!(ctx.counters.snapshot().received, 0);
}

#[tokio::test]
async fn test_background_tasks_refill_and_reset() {
    let config = ServerConfig {
        refill_interval_ms: 50,
        ..test_config(2, 100, 5)
    };
    let server = GatewayServer::with_lookup(config, Arc::new(EchoLookup));
    let ctx = server.context();
    let tasks = server.start_background_tasks();

    assert!(ctx.budget.try_acquire());
    assert!(ctx.budget.try_acquire());
    assert!(!ctx.budget.try_acquire());
    ctx.counters.record_received();

    assert!(wait_until(|| ctx.budget.available() == 2, Duration::from_secs(1)).await);
    assert!(wait_until(|| ctx.counters.snapshot().rate == 0, Duration::from_secs(1)).await);
    // 清零不影响累计接收数
    assert_eq!(ctx.counters.snapshot().received, 1);

    for task in tasks {
        task.abort();
    }
}
