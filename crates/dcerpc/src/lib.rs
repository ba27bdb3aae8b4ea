//! DCE RPC (MS-RPC) client and server implementation
//!
//! A wire-compatible implementation of the connection-oriented DCE RPC
//! protocol (DCE 1.1 / MS-RPCE) over TCP with the NDR transfer syntax.
//!
//! # Example
//!
//! ## TCP Server
//!
//! ```no_run
//! use dcerpc::{DceRpcServer, InterfaceBuilder};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() {
//!     let interface = InterfaceBuilder::new(
//!         "12345678-1234-1234-1234-123456789012",
//!         1,
//!         0,
//!     )
//!     .unwrap()
//!     // Operation 1: echo
//!     .operation(1, |args: Bytes| async move { Ok(args) })
//!     .build();
//!
//!     let server = DceRpcServer::new();
//!     server.register_interface(interface).await;
//!     server.run("127.0.0.1:12345".parse().unwrap()).await.unwrap();
//! }
//! ```
//!
//! ## TCP Client
//!
//! ```no_run
//! use dcerpc::{DceRpcClient, SyntaxId, Uuid};
//! use bytes::Bytes;
//!
//! #[tokio::main]
//! async fn main() {
//!     let interface = SyntaxId::new(
//!         Uuid::parse("12345678-1234-1234-1234-123456789012").unwrap(),
//!         1,
//!         0,
//!     );
//!
//!     let client = DceRpcClient::connect(
//!         "127.0.0.1:12345".parse().unwrap(),
//!         interface,
//!     ).await.unwrap();
//!
//!     let result = client.call(1, Bytes::from("hello")).await.unwrap();
//!     assert_eq!(result.as_ref(), b"hello");
//! }
//! ```

pub mod error;

pub mod dcerpc;
pub mod dcerpc_client;
pub mod dcerpc_server;
pub mod dcerpc_transport;
pub mod fragmentation;

pub use error::{Result, RpcError};

pub use dcerpc::{
    BindAckPdu, BindPdu, CharRep, ContextElement, ContextOutcome, ContextResult,
    DataRepresentation, FaultPdu, FaultStatus, FloatRep, IntRep, PacketFlags, PacketType, Pdu,
    PduHeader, RejectReason, RequestPdu, ResponsePdu, SyntaxId, Uuid, DCE_RPC_VERSION,
    DCE_RPC_VERSION_MINOR, DEFAULT_MAX_FRAG, NDR_SYNTAX_UUID, NDR_SYNTAX_VERSION,
};
pub use dcerpc_client::{DceRpcClient, DceRpcClientBuilder};
pub use dcerpc_server::{
    DceRpcServer, DceRpcServerConfig, Interface, InterfaceBuilder, OperationHandler, ServerStats,
    ServerStatsSnapshot,
};
pub use dcerpc_transport::{DceRpcTransport, DEFAULT_MAX_PDU_SIZE};
pub use fragmentation::{FragmentAssembler, FragmentGenerator};
