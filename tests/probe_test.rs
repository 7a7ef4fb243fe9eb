//! Network probes against a local HTTP stub.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use dpi_verify::probe::{
    DpiTarget, NetworkProber, Outcome, Probe, ProbeKind, ProbeRunner, ProbeSettings, StandardTarget,
};

const KB: usize = 1024;

/// Serve canned responses keyed by request path until the test ends.
async fn spawn_stub() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(serve(stream));
        }
    });
    addr
}

async fn serve(mut stream: TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let request = String::from_utf8_lossy(&buf);
    let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();

    let (status, declared, sent, hang_after) = match path.as_str() {
        "/ok" => ("200 OK", 300 * KB, 300 * KB, false),
        "/blocked" => ("403 Forbidden", 18 * KB, 18 * KB, false),
        "/small" => ("503 Service Unavailable", 1000, 1000, false),
        "/truncated" => ("200 OK", 256 * KB, 16 * KB, false),
        "/stall" => ("200 OK", 256 * KB, 16 * KB, true),
        "/hang" => {
            tokio::time::sleep(Duration::from_secs(60)).await;
            return;
        }
        _ => ("404 Not Found", 0, 0, false),
    };

    let head = format!("HTTP/1.1 {status}\r\nContent-Length: {declared}\r\nConnection: close\r\n\r\n");
    if stream.write_all(head.as_bytes()).await.is_err() {
        return;
    }
    let body = vec![b'x'; sent];
    if stream.write_all(&body).await.is_err() {
        return;
    }
    let _ = stream.flush().await;
    if hang_after {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
}

fn prober() -> NetworkProber {
    NetworkProber::new(ProbeSettings {
        http_timeout: Duration::from_secs(2),
        dpi_timeout: Duration::from_secs(1),
        ..ProbeSettings::default()
    })
    .unwrap()
}

fn dpi(addr: SocketAddr, path: &str) -> Probe {
    Probe::Dpi(DpiTarget::new("LOCAL-01", "Stub", format!("http://{addr}{path}")))
}

fn http(addr: SocketAddr, path: &str) -> Probe {
    Probe::Http {
        url: format!("http://{addr}{path}"),
        kind: ProbeKind::Http,
    }
}

#[tokio::test]
async fn http_probe_reports_status() {
    let addr = spawn_stub().await;
    let p = prober();
    let cancel = CancellationToken::new();

    let ok = p.run("P", &http(addr, "/ok"), &cancel).await;
    assert!(ok.success);
    assert_eq!(ok.message, "HTTP 200");
    assert_eq!(ok.status_code, Some(200));
    assert!(ok.timing_ms.is_some());

    let err = p.run("P", &http(addr, "/small"), &cancel).await;
    assert!(!err.success);
    assert_eq!(err.message, "HTTP 503");
    assert_eq!(err.outcome(), Outcome::Failure);
}

#[tokio::test]
async fn http_probe_times_out() {
    let addr = spawn_stub().await;
    let result = prober().run("P", &http(addr, "/hang"), &CancellationToken::new()).await;
    assert!(!result.success);
    assert_eq!(result.message, "conn_timeout");
}

#[tokio::test]
async fn refused_connection_is_a_failure_result() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = prober().run("P", &http(addr, "/"), &CancellationToken::new()).await;
    assert!(!result.success);
    assert!(result.message.starts_with("error:"), "{}", result.message);
}

#[tokio::test]
async fn dpi_full_range_is_success() {
    let addr = spawn_stub().await;
    let result = prober().run("P", &dpi(addr, "/ok"), &CancellationToken::new()).await;
    assert!(result.success, "{}", result.message);
    assert_eq!(result.target, "LOCAL-01 <Stub>");
    assert_eq!(result.status_code, Some(200));
    assert!(result.bytes.unwrap() >= 262_144);
    assert!(result.message.ends_with(" OK"));
}

#[tokio::test]
async fn dpi_block_page_is_likely_blocked() {
    let addr = spawn_stub().await;
    let result = prober().run("P", &dpi(addr, "/blocked"), &CancellationToken::new()).await;
    assert!(!result.success);
    assert!(result.likely_blocked);
    assert_eq!(result.message, "HTTP 403 size=18432 KB=18.0 LIKELY_BLOCKED");
}

#[tokio::test]
async fn dpi_small_error_is_plain_failure() {
    let addr = spawn_stub().await;
    let result = prober().run("P", &dpi(addr, "/small"), &CancellationToken::new()).await;
    assert!(!result.success);
    assert!(!result.likely_blocked);
    assert_eq!(result.message, "HTTP 503 size=1000 KB=1.0 FAIL");
}

#[tokio::test]
async fn dpi_interrupted_body_keeps_success_verdict() {
    let addr = spawn_stub().await;
    let p = prober();
    let cancel = CancellationToken::new();

    let cut = p.run("P", &dpi(addr, "/truncated"), &cancel).await;
    assert!(cut.success, "{}", cut.message);
    assert!(!cut.likely_blocked);
    assert_eq!(cut.bytes, Some(16 * 1024));
    assert!(cut.message.starts_with("HTTP 200 size=16384 KB=16.0 OK ("), "{}", cut.message);

    let stalled = p.run("P", &dpi(addr, "/stall"), &cancel).await;
    assert!(stalled.success, "{}", stalled.message);
    assert!(!stalled.likely_blocked);
    assert!(stalled.message.ends_with("OK (conn_timeout)"), "{}", stalled.message);
}

#[tokio::test]
async fn cancelled_probe_resolves_promptly() {
    let addr = spawn_stub().await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let result = tokio::time::timeout(Duration::from_secs(1), prober().run("P", &http(addr, "/hang"), &cancel))
        .await
        .unwrap();
    assert_eq!(result.message, "cancelled");
    assert_eq!(result.kind, ProbeKind::Http);
}

#[tokio::test]
async fn preflight_sees_reachable_and_unreachable_hosts() {
    let addr = spawn_stub().await;
    let p = prober();

    // Any HTTP answer counts as reachable, even a 404.
    assert!(!p.is_url_blocked(&format!("http://{addr}/"), Duration::from_secs(2)).await);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let closed = listener.local_addr().unwrap();
    drop(listener);
    assert!(p.is_url_blocked(&format!("http://{closed}/"), Duration::from_secs(2)).await);
    let target = StandardTarget::parse(&closed.to_string()).unwrap();
    assert!(p.is_domain_blocked(&target, Duration::from_secs(2)).await);
}
