//! Stress Tests - many concurrent clients
//!
//! - Concurrent proxies against one shared ComTest instance
//! - Concurrent calls sharing one association
//! - Connection limiting and statistics under load

mod common;

use std::f64::consts::PI;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::Barrier;

use common::*;
use comtest::{BString, ComTestServerConfig, IComTest};

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_many_concurrent_clients() {
    init_logging();

    const NUM_CLIENTS: usize = 32;
    const REQUESTS_PER_CLIENT: usize = 50;

    let running =
        start_comtest_server(ComTestServerConfig::new("127.0.0.1:0".parse().unwrap())).await;
    let addr = running.addr;
    let stats = Arc::new(ConcurrentStats::new());
    let barrier = Arc::new(Barrier::new(NUM_CLIENTS));

    let clients = (0..NUM_CLIENTS).map(|client_id| {
        let stats = stats.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            let proxy = connect_proxy(addr).await;
            barrier.wait().await;

            for req_id in 0..REQUESTS_PER_CLIENT {
                let radius = (client_id * REQUESTS_PER_CLIENT + req_id) as f64 / 10.0;
                let comment = BString::new(&format!("client_{client_id}_request_{req_id}"));
                match proxy.com_test_method(radius, comment).await {
                    Ok(area) if approx_eq(area, PI * radius * radius) => stats.record_success(),
                    Ok(area) => {
                        eprintln!("client {client_id} request {req_id}: wrong area {area}");
                        stats.record_failure();
                    }
                    Err(e) => {
                        eprintln!("client {client_id} request {req_id} failed: {e}");
                        stats.record_failure();
                    }
                }
            }
        })
    });

    for handle in join_all(clients).await {
        handle.unwrap();
    }

    assert_eq!(stats.failures(), 0);
    assert_eq!(stats.successes(), (NUM_CLIENTS * REQUESTS_PER_CLIENT) as u64);

    let server_stats = running.server.stats();
    assert_eq!(server_stats.connections_accepted, NUM_CLIENTS as u64);
    assert_eq!(
        server_stats.requests_processed,
        (NUM_CLIENTS * REQUESTS_PER_CLIENT) as u64
    );
    assert_eq!(server_stats.requests_failed, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_proxy_serialises_calls() {
    init_logging();
    let running =
        start_comtest_server(ComTestServerConfig::new("127.0.0.1:0".parse().unwrap())).await;
    let proxy = Arc::new(connect_proxy(running.addr).await);

    let calls = (0..100).map(|i| {
        let proxy = proxy.clone();
        async move {
            let radius = i as f64;
            let area = proxy
                .com_test_method(radius, BString::new("shared"))
                .await
                .unwrap();
            approx_eq(area, PI * radius * radius)
        }
    });

    assert!(join_all(calls).await.into_iter().all(|ok| ok));
    assert_eq!(running.server.stats().connections_accepted, 1);
}

#[tokio::test]
async fn test_connection_limit() {
    init_logging();
    let config =
        ComTestServerConfig::new("127.0.0.1:0".parse().unwrap()).with_max_connections(2);
    let running = start_comtest_server(config).await;

    let first = connect_proxy(running.addr).await;
    let second = connect_proxy(running.addr).await;

    // the third connection is accepted by the kernel and then dropped
    let third = comtest::ComTestProxy::connect_timeout(running.addr, Duration::from_secs(2)).await;
    assert!(third.is_err());
    assert_eq!(running.server.stats().connections_rejected, 1);

    assert_eq!(first.com_test_method(1.0, BString::new("")).await.unwrap(), PI);
    drop(second);
    drop(first);

    // a slot frees up once a client disconnects
    let mut retry = None;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if let Ok(proxy) =
            comtest::ComTestProxy::connect_timeout(running.addr, Duration::from_secs(2)).await
        {
            retry = Some(proxy);
            break;
        }
    }
    let proxy = retry.expect("no connection slot became free");
    assert_eq!(proxy.com_test_method(2.0, BString::new("")).await.unwrap(), 4.0 * PI);
}
