//! Fragmentation Tests - calls larger than one fragment
//!
//! - IComTest arguments that span many request fragments
//! - Responses split by the server's negotiated max_xmit_frag
//! - Fragment flags, call ids and alloc_hint as seen on the wire

mod common;

use std::f64::consts::PI;

use bytes::{BufMut, Bytes, BytesMut};
use futures::future::join_all;
use tokio::net::TcpStream;

use common::*;
use comtest::{BString, ComTestServerConfig, IComTest};
use dcerpc::{
    BindPdu, DceRpcClientBuilder, DceRpcServerConfig, DceRpcTransport, FragmentGenerator,
    Interface, InterfaceBuilder, Pdu, RequestPdu,
};

/// opnum 0 echoes, opnum 1 returns N pattern bytes (N as u32 LE)
fn create_large_echo_interface() -> Interface {
    InterfaceBuilder::from_syntax(echo_syntax())
        .operation(0, |args: Bytes| async move { Ok(args) })
        .operation(1, |args: Bytes| async move {
            let Some(size) = args.get(..4) else {
                return Err(dcerpc::RpcError::Truncated("size".to_string()));
            };
            let size = u32::from_le_bytes([size[0], size[1], size[2], size[3]]) as usize;
            Ok(pattern(size))
        })
        .build()
}

fn pattern(size: usize) -> Bytes {
    let mut data = BytesMut::with_capacity(size);
    for i in 0..size {
        data.put_u8((i % 251) as u8);
    }
    data.freeze()
}

fn long_comment(units: usize) -> BString {
    BString::new(&"abc".repeat(units / 3 + 1)[..units])
}

#[tokio::test]
async fn test_comment_larger_than_one_fragment() {
    init_logging();
    let running =
        start_comtest_server(ComTestServerConfig::new("127.0.0.1:0".parse().unwrap())).await;
    let proxy = connect_proxy(running.addr).await;

    // 40 000 UTF-16 units is ~80 KB of stub, roughly twenty fragments
    let area = proxy.com_test_method(3.0, long_comment(40_000)).await.unwrap();
    assert!(approx_eq(area, 9.0 * PI));
}

#[tokio::test]
async fn test_small_negotiated_fragments() {
    init_logging();
    let running =
        start_comtest_server(ComTestServerConfig::new("127.0.0.1:0".parse().unwrap())).await;
    let proxy = connect_proxy_with_frag(running.addr, 256).await;
    assert_eq!(proxy.client().max_frag(), (256, 256));

    for units in [0, 100, 116, 117, 1_000, 10_000] {
        let area = proxy.com_test_method(1.0, long_comment(units)).await.unwrap();
        assert_eq!(area, PI, "comment of {units} units");
    }
}

#[tokio::test]
async fn test_large_response_is_fragmented() {
    init_logging();
    let config = DceRpcServerConfig {
        max_xmit_frag: 1024,
        ..Default::default()
    };
    let running = start_rpc_server(create_large_echo_interface(), config).await;
    let client = DceRpcClientBuilder::from_syntax(echo_syntax())
        .connect(running.addr)
        .await
        .unwrap();

    for size in [0usize, 1, 1000, 1001, 65_536, 300_000] {
        let reply = client
            .call(1, Bytes::copy_from_slice(&(size as u32).to_le_bytes()))
            .await
            .unwrap();
        assert_eq!(reply, pattern(size), "size {size}");
    }

    let payload = pattern(150_000);
    assert_eq!(client.call(0, payload.clone()).await.unwrap(), payload);
}

#[tokio::test]
async fn test_fragments_on_the_wire() {
    init_logging();
    let config = DceRpcServerConfig {
        max_xmit_frag: 512,
        ..Default::default()
    };
    let running = start_rpc_server(create_large_echo_interface(), config).await;
    let stream = TcpStream::connect(running.addr).await.unwrap();
    let mut transport = DceRpcTransport::new(stream);

    let bind = BindPdu::new(1, echo_syntax());
    transport.write_pdu(&bind.encode().unwrap()).await.unwrap();
    let Pdu::BindAck(ack) = transport.read_pdu_decoded().await.unwrap() else {
        panic!("expected bind_ack");
    };
    assert_eq!(ack.max_xmit_frag, 512);

    let payload = pattern(5_000);
    let request = RequestPdu::new(2, 0, payload.clone());
    let fragments = FragmentGenerator::fragment_request(&request, 512);
    assert!(fragments.len() > 1);
    for fragment in &fragments {
        transport.write_pdu(&fragment.encode().unwrap()).await.unwrap();
    }

    let mut assembled = BytesMut::new();
    let mut count = 0;
    loop {
        let Pdu::Response(response) = transport.read_pdu_decoded().await.unwrap() else {
            panic!("expected response");
        };
        let flags = response.header.packet_flags;
        assert_eq!(response.header.call_id, 2);
        assert_eq!(flags.is_first_frag(), count == 0);
        assert!(response.header.frag_length as usize <= 512);
        if count == 0 {
            assert_eq!(response.alloc_hint as usize, payload.len());
        }
        assembled.extend_from_slice(&response.stub_data);
        count += 1;
        if flags.is_last_frag() {
            break;
        }
    }
    assert!(count > 1);
    assert_eq!(assembled.freeze(), payload);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_large_calls() {
    init_logging();
    let running =
        start_comtest_server(ComTestServerConfig::new("127.0.0.1:0".parse().unwrap())).await;
    let addr = running.addr;

    let tasks = (0..8).map(|i| async move {
        let proxy = connect_proxy_with_frag(addr, 1024).await;
        let radius = i as f64;
        let area = proxy
            .com_test_method(radius, long_comment(5_000 + i * 777))
            .await
            .unwrap();
        approx_eq(area, PI * radius * radius)
    });

    let results = join_all(tasks).await;
    assert!(results.into_iter().all(|ok| ok));
}
