//! In-process fake servers for network tests
//!
//! `FakeServer::respond` answers every request with a canned response. Pointed
//! at as a forward proxy it serves absolute-form requests exactly like an origin,
//! so it stands in for both a working proxy and a direct target.
//! `FakeServer::redirecting` answers `/final` with a 200 and every other path
//! with a 302 pointing there, which tells the redirect policies apart.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Clone, Copy)]
enum Behavior {
    Respond(u16, &'static str),
    Redirect,
    Silent,
}

/// Body of the 302 served by `FakeServer::redirecting`
pub(crate) const REDIRECT_BODY: &str = "moved";
/// Body served once the redirect has been followed
pub(crate) const REDIRECT_TARGET_BODY: &str = "final";

pub(crate) struct FakeServer {
    addr: SocketAddr,
    hits: Arc<AtomicUsize>,
    task: JoinHandle<()>,
}

impl FakeServer {
    /// Server answering every request with `status` and `body`
    pub(crate) async fn respond(status: u16, body: &'static str) -> Self {
        Self::spawn(Behavior::Respond(status, body)).await
    }

    /// Server answering `/final` with 200 and anything else with a 302 to `/final`
    pub(crate) async fn redirecting() -> Self {
        Self::spawn(Behavior::Redirect).await
    }

    /// Server that accepts connections and never answers
    pub(crate) async fn silent() -> Self {
        Self::spawn(Behavior::Silent).await
    }

    async fn spawn(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    break;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(async move {
                    match behavior {
                        Behavior::Respond(status, body) => answer(stream, |_| (status, "", body)).await,
                        Behavior::Redirect => answer(stream, redirect_route).await,
                        Behavior::Silent => {
                            let _held = stream;
                            tokio::time::sleep(Duration::from_secs(3600)).await;
                        }
                    }
                });
            }
        });

        Self { addr, hits, task }
    }

    /// `host:port`, usable as a candidate address
    pub(crate) fn address(&self) -> String {
        self.addr.to_string()
    }

    pub(crate) fn url(&self) -> String {
        format!("http://{}/", self.addr)
    }

    /// Connections accepted so far
    pub(crate) fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Status, extra header lines and body for a request target
fn redirect_route(target: &str) -> (u16, &'static str, &'static str) {
    if target.ends_with("/final") {
        (200, "", REDIRECT_TARGET_BODY)
    } else {
        (302, "Location: /final\r\n", REDIRECT_BODY)
    }
}

async fn answer<F>(mut stream: TcpStream, route: F)
where
    F: Fn(&str) -> (u16, &'static str, &'static str),
{
    let mut buf = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") && buf.len() < 16 * 1024 {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }

    // Origin-form "/path" or, when used as a proxy, absolute-form "http://host/path".
    let head = String::from_utf8_lossy(&buf);
    let target = head.split_whitespace().nth(1).unwrap_or("/");
    let (status, extra_headers, body) = route(target);

    let response = format!(
        "HTTP/1.1 {} Fake\r\nContent-Type: text/plain\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        extra_headers,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

/// Address nothing is listening on
pub(crate) async fn closed_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr.to_string()
}
