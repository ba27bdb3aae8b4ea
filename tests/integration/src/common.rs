//! Shared helpers for the integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use comtest::{ComTestProxy, ComTestServer, ComTestServerConfig};
use dcerpc::{DceRpcClientBuilder, DceRpcServer, DceRpcServerConfig, Interface, SyntaxId};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Install a test-writer subscriber once per process
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// A server running in the background until dropped or shut down
pub struct RunningServer<S> {
    pub addr: SocketAddr,
    pub server: Arc<S>,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl<S> RunningServer<S> {
    /// Stop accepting and wait for open connections to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
        }
    }
}

impl<S> Drop for RunningServer<S> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn ephemeral_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tracing::debug!("Test server listening on {}", addr);
    (listener, addr)
}

/// Start a ComTest server on an ephemeral port
pub async fn start_comtest_server(config: ComTestServerConfig) -> RunningServer<ComTestServer> {
    let server = Arc::new(ComTestServer::new(config).await.unwrap());
    let (listener, addr) = ephemeral_listener().await;
    let (tx, rx) = oneshot::channel::<()>();

    let task_server = server.clone();
    let handle = tokio::spawn(async move {
        let _ = task_server
            .serve_until(listener, async {
                let _ = rx.await;
            })
            .await;
    });

    RunningServer {
        addr,
        server,
        shutdown: Some(tx),
        handle: Some(handle),
    }
}

/// Start a bare DCE RPC server with one interface on an ephemeral port
pub async fn start_rpc_server(
    interface: Interface,
    config: DceRpcServerConfig,
) -> RunningServer<DceRpcServer> {
    let server = Arc::new(DceRpcServer::with_config(config));
    server.register_interface(interface).await;
    let (listener, addr) = ephemeral_listener().await;
    let (tx, rx) = oneshot::channel::<()>();

    let task_server = server.clone();
    let handle = tokio::spawn(async move {
        let _ = task_server
            .serve_until(listener, async {
                let _ = rx.await;
            })
            .await;
    });

    RunningServer {
        addr,
        server,
        shutdown: Some(tx),
        handle: Some(handle),
    }
}

pub async fn connect_proxy(addr: SocketAddr) -> ComTestProxy {
    ComTestProxy::connect_timeout(addr, Duration::from_secs(5))
        .await
        .unwrap()
}

/// Proxy bound with a smaller fragment size
pub async fn connect_proxy_with_frag(addr: SocketAddr, max_frag: u16) -> ComTestProxy {
    let builder = DceRpcClientBuilder::from_syntax(comtest::icomtest_syntax())
        .max_frag(max_frag)
        .timeout(Duration::from_secs(5));
    ComTestProxy::connect_with(builder, addr).await.unwrap()
}

pub fn echo_syntax() -> SyntaxId {
    SyntaxId::new(
        dcerpc::Uuid::parse("f1a2b3c4-d5e6-7890-abcd-ef1234567890").unwrap(),
        1,
        0,
    )
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

/// Counters shared by concurrent test clients
#[derive(Default)]
pub struct ConcurrentStats {
    pub successes: AtomicU64,
    pub failures: AtomicU64,
}

impl ConcurrentStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self) {
        self.successes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn successes(&self) -> u64 {
        self.successes.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}
