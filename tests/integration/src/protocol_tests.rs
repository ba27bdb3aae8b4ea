//! Protocol Tests - raw PDUs against the ComTest endpoint
//!
//! - Bind acceptance, rejection and fragment size negotiation
//! - Fault statuses for unbound, unknown-interface and unknown-opnum calls
//! - Malformed stubs answered in-band without dropping the association

mod common;

use bytes::Bytes;
use tokio::net::TcpStream;

use common::*;
use comtest::{icomtest_syntax, ComError, ComTestServerConfig, HResult, IID_ICOMTEST};
use dcerpc::{
    BindPdu, ContextResult, DceRpcClientBuilder, DceRpcTransport, FaultStatus, Pdu,
    RejectReason, RequestPdu, RpcError, SyntaxId, Uuid,
};
use midl_ndr::{NdrReader, NdrWriter};

async fn raw_connection(
    running: &RunningServer<comtest::ComTestServer>,
) -> DceRpcTransport<TcpStream> {
    let stream = TcpStream::connect(running.addr).await.unwrap();
    DceRpcTransport::new(stream)
}

async fn server() -> RunningServer<comtest::ComTestServer> {
    init_logging();
    start_comtest_server(ComTestServerConfig::new("127.0.0.1:0".parse().unwrap())).await
}

async fn bind(transport: &mut DceRpcTransport<TcpStream>, syntax: SyntaxId) -> Pdu {
    let bind = BindPdu::new(1, syntax);
    transport.write_pdu(&bind.encode().unwrap()).await.unwrap();
    transport.read_pdu_decoded().await.unwrap()
}

async fn request(
    transport: &mut DceRpcTransport<TcpStream>,
    call_id: u32,
    opnum: u16,
    stub: Bytes,
) -> Pdu {
    let request = RequestPdu::new(call_id, opnum, stub);
    transport.write_pdu(&request.encode().unwrap()).await.unwrap();
    transport.read_pdu_decoded().await.unwrap()
}

fn fault_status(pdu: Pdu) -> u32 {
    match pdu {
        Pdu::Fault(fault) => fault.status,
        other => panic!("expected fault, got {:?}", other.header().packet_type),
    }
}

#[tokio::test]
async fn test_bind_accepted() {
    let running = server().await;
    let mut transport = raw_connection(&running).await;

    match bind(&mut transport, icomtest_syntax()).await {
        Pdu::BindAck(ack) => {
            assert_eq!(ack.header.call_id, 1);
            assert_eq!(ack.results.len(), 1);
            assert_eq!(ack.results[0].result, ContextResult::Acceptance);
            assert_eq!(ack.results[0].transfer_syntax, SyntaxId::ndr());
            assert_eq!(ack.secondary_addr, running.addr.port().to_string());
        }
        other => panic!("expected bind_ack, got {:?}", other.header().packet_type),
    }
}

#[tokio::test]
async fn test_bind_negotiates_fragment_size() {
    let running = server().await;
    let mut transport = raw_connection(&running).await;

    let mut pdu = BindPdu::new(1, icomtest_syntax());
    pdu.max_xmit_frag = 2048;
    pdu.max_recv_frag = 1024;
    transport.write_pdu(&pdu.encode().unwrap()).await.unwrap();

    match transport.read_pdu_decoded().await.unwrap() {
        Pdu::BindAck(ack) => {
            assert_eq!(ack.max_xmit_frag, 1024);
            assert_eq!(ack.max_recv_frag, 2048);
        }
        other => panic!("expected bind_ack, got {:?}", other.header().packet_type),
    }
}

#[tokio::test]
async fn test_bind_rejections() {
    let running = server().await;

    let mut transport = raw_connection(&running).await;
    let unknown = SyntaxId::new(Uuid::generate(), 0, 0);
    match bind(&mut transport, unknown).await {
        Pdu::BindAck(ack) => {
            assert_eq!(ack.results[0].result, ContextResult::ProviderRejection);
            assert_eq!(ack.results[0].reason, RejectReason::AbstractSyntaxNotSupported);
        }
        other => panic!("expected bind_ack, got {:?}", other.header().packet_type),
    }

    let mut transport = raw_connection(&running).await;
    match bind(&mut transport, SyntaxId::new(IID_ICOMTEST, 1, 0)).await {
        Pdu::BindAck(ack) => {
            assert_eq!(ack.results[0].reason, RejectReason::AbstractSyntaxNotSupported);
        }
        other => panic!("expected bind_ack, got {:?}", other.header().packet_type),
    }
}

#[tokio::test]
async fn test_client_bind_failure_is_reported() {
    let running = server().await;
    let result = DceRpcClientBuilder::new(Uuid::generate(), 1, 0)
        .connect(running.addr)
        .await;
    let err = match result {
        Err(e) => e,
        Ok(_) => panic!("bind to an unknown interface succeeded"),
    };
    assert!(matches!(err, RpcError::BindFailed(_)));
    assert_eq!(ComError::from(err).hresult(), HResult::RPC_E_SERVERFAULT);
}

#[tokio::test]
async fn test_request_without_bind_faults() {
    let running = server().await;
    let mut transport = raw_connection(&running).await;

    let status = fault_status(request(&mut transport, 7, 7, Bytes::new()).await);
    assert_eq!(status, FaultStatus::ContextMismatch as u32);
}

#[tokio::test]
async fn test_unknown_opnums_fault() {
    let running = server().await;
    let mut transport = raw_connection(&running).await;
    bind(&mut transport, icomtest_syntax()).await;

    // IUnknown is not served remotely
    for (call_id, opnum) in [(2, 0), (3, 1), (4, 2), (5, 8), (6, 200)] {
        let status = fault_status(request(&mut transport, call_id, opnum, Bytes::new()).await);
        assert_eq!(status, FaultStatus::OpRngError as u32, "opnum {opnum}");
    }
}

#[tokio::test]
async fn test_malformed_stub_gets_hresult() {
    let running = server().await;
    let mut transport = raw_connection(&running).await;
    bind(&mut transport, icomtest_syntax()).await;

    // radius present, BSTR referent truncated
    let reply = request(&mut transport, 2, 7, Bytes::from_static(&[0; 10])).await;
    let Pdu::Response(response) = reply else {
        panic!("expected response");
    };
    let mut reader = NdrReader::new(response.stub_data);
    assert_eq!(reader.read::<f64>().unwrap(), 0.0);
    assert_eq!(reader.read::<u32>().unwrap(), HResult::RPC_E_INVALID_DATA.0);

    // the association is still usable
    let mut writer = NdrWriter::new();
    writer.write(&1.0f64).unwrap().write(&midl_ndr::BString::new("ok")).unwrap();
    let reply = request(&mut transport, 3, 7, writer.into_bytes()).await;
    let Pdu::Response(response) = reply else {
        panic!("expected response");
    };
    let mut reader = NdrReader::new(response.stub_data);
    assert_eq!(reader.read::<f64>().unwrap(), std::f64::consts::PI);
    assert_eq!(reader.read::<u32>().unwrap(), 0);
}

#[tokio::test]
async fn test_garbage_pdu_gets_protocol_fault() {
    let running = server().await;
    let mut transport = raw_connection(&running).await;

    // valid header framing, unknown packet type 42
    let pdu = [5, 0, 42, 0x03, 0x10, 0, 0, 0, 16, 0, 0, 0, 9, 0, 0, 0];
    transport.write_pdu(&pdu).await.unwrap();
    let status = fault_status(transport.read_pdu_decoded().await.unwrap());
    assert_eq!(status, FaultStatus::ProtoError as u32);
}
