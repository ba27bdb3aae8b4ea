//! DCE RPC Client
//!
//! One client is one association: it binds a single presentation context
//! and serialises its calls over the connection.

use crate::dcerpc::{BindPdu, ContextResult, Pdu, RequestPdu, SyntaxId, Uuid, DEFAULT_MAX_FRAG};
use crate::dcerpc_transport::{DceRpcTransport, DEFAULT_MAX_PDU_SIZE};
use crate::error::{Result, RpcError};
use crate::fragmentation::{FragmentAssembler, FragmentGenerator};
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

/// DCE RPC client over any byte stream (TCP by default)
pub struct DceRpcClient<S = TcpStream> {
    read_transport: Mutex<DceRpcTransport<ReadHalf<S>>>,
    write_transport: Mutex<DceRpcTransport<WriteHalf<S>>>,
    call_id_counter: AtomicU32,
    interface: SyntaxId,
    context_id: u16,
    max_xmit_frag: u16,
    max_recv_frag: u16,
    assoc_group_id: u32,
    call_timeout: Option<Duration>,
    is_bound: bool,
}

impl DceRpcClient<TcpStream> {
    /// Connect to a DCE RPC server and bind to the specified interface
    pub async fn connect(addr: SocketAddr, interface: SyntaxId) -> Result<Self> {
        DceRpcClientBuilder::from_syntax(interface).connect(addr).await
    }
}

impl<S: AsyncRead + AsyncWrite + Send> DceRpcClient<S> {
    fn with_limits(stream: S, interface: SyntaxId, max_pdu_size: usize) -> Self {
        let (reader, writer) = tokio::io::split(stream);
        Self {
            read_transport: Mutex::new(
                DceRpcTransport::new(reader).with_max_pdu_size(max_pdu_size),
            ),
            write_transport: Mutex::new(
                DceRpcTransport::new(writer).with_max_pdu_size(max_pdu_size),
            ),
            call_id_counter: AtomicU32::new(1),
            interface,
            context_id: 0,
            max_xmit_frag: DEFAULT_MAX_FRAG,
            max_recv_frag: DEFAULT_MAX_FRAG,
            assoc_group_id: 0,
            call_timeout: None,
            is_bound: false,
        }
    }

    fn next_call_id(&self) -> u32 {
        self.call_id_counter.fetch_add(1, Ordering::SeqCst)
    }

    /// Perform the bind handshake with the server
    pub async fn bind(&mut self) -> Result<()> {
        let call_id = self.next_call_id();
        let mut bind = BindPdu::new(call_id, self.interface);
        bind.max_xmit_frag = self.max_xmit_frag;
        bind.max_recv_frag = self.max_recv_frag;

        debug!(call_id, interface = %self.interface.uuid, "Sending bind");

        self.write_transport
            .get_mut()
            .write_pdu(&bind.encode()?)
            .await?;
        let pdu = self.read_transport.get_mut().read_pdu_decoded().await?;

        let ack = match pdu {
            Pdu::BindAck(ack) => ack,
            Pdu::Fault(fault) => return Err(RpcError::Fault(fault.status)),
            other => {
                return Err(RpcError::InvalidMessageType(
                    other.header().packet_type as i32,
                ))
            }
        };

        if ack.header.call_id != call_id {
            return Err(RpcError::CallIdMismatch {
                expected: call_id,
                got: ack.header.call_id,
            });
        }

        let outcome = ack
            .results
            .first()
            .ok_or_else(|| RpcError::BindFailed("empty result list".to_string()))?;
        if outcome.result != ContextResult::Acceptance {
            return Err(RpcError::BindFailed(format!(
                "{} rejected: {:?} / {:?}",
                self.interface.uuid, outcome.result, outcome.reason
            )));
        }

        // bind_ack limits are from the server's point of view
        self.max_xmit_frag = ack.max_recv_frag;
        self.max_recv_frag = ack.max_xmit_frag;
        self.assoc_group_id = ack.assoc_group_id;
        self.is_bound = true;

        debug!(
            max_xmit = self.max_xmit_frag,
            max_recv = self.max_recv_frag,
            assoc_group = self.assoc_group_id,
            "Bind accepted"
        );
        Ok(())
    }

    /// Call `opnum` with NDR-encoded `stub_data` and return the response stub
    ///
    /// Requests larger than the negotiated fragment size are split, and
    /// fragmented responses are reassembled. A fault PDU becomes
    /// `RpcError::Fault(status)`.
    pub async fn call(&self, opnum: u16, stub_data: Bytes) -> Result<Bytes> {
        match self.call_timeout {
            Some(limit) => with_timeout(limit, self.call_inner(opnum, stub_data)).await,
            None => self.call_inner(opnum, stub_data).await,
        }
    }

    async fn call_inner(
        &self,
        opnum: u16,
        stub_data: Bytes,
    ) -> Result<Bytes> {
        if !self.is_bound {
            return Err(RpcError::BindFailed("not bound".to_string()));
        }

        // one outstanding call per association
        let mut read = self.read_transport.lock().await;

        let call_id = self.next_call_id();
        let mut request = RequestPdu::new(call_id, opnum, stub_data);
        request.context_id = self.context_id;

        let fragments = FragmentGenerator::fragment_request(&request, self.max_xmit_frag);
        debug!(
            call_id,
            opnum,
            stub_len = request.stub_data.len(),
            fragments = fragments.len(),
            "Sending request"
        );

        {
            let mut write = self.write_transport.lock().await;
            for frag in &fragments {
                write.write_pdu(&frag.encode()?).await?;
            }
        }

        let mut assembler = FragmentAssembler::new(call_id);
        loop {
            match read.read_pdu_decoded().await? {
                Pdu::Response(response) => {
                    if is_stale(response.header.call_id, call_id) {
                        debug!(
                            call_id,
                            stale = response.header.call_id,
                            "Discarding response to an abandoned call"
                        );
                        continue;
                    }
                    if response.header.call_id != call_id {
                        return Err(RpcError::CallIdMismatch {
                            expected: call_id,
                            got: response.header.call_id,
                        });
                    }
                    if let Some(stub) = assembler.add_fragment(
                        &response.header,
                        &response.stub_data,
                        response.context_id,
                        None,
                        response.alloc_hint,
                    )? {
                        trace!(call_id, len = stub.len(), "Call completed");
                        return Ok(stub);
                    }
                }
                Pdu::Fault(fault) => {
                    if is_stale(fault.header.call_id, call_id) {
                        debug!(
                            call_id,
                            stale = fault.header.call_id,
                            "Discarding fault for an abandoned call"
                        );
                        continue;
                    }
                    if fault.header.call_id != call_id {
                        return Err(RpcError::CallIdMismatch {
                            expected: call_id,
                            got: fault.header.call_id,
                        });
                    }
                    warn!(call_id, opnum, "Call faulted: 0x{:08x}", fault.status);
                    return Err(RpcError::Fault(fault.status));
                }
                other => {
                    return Err(RpcError::InvalidMessageType(
                        other.header().packet_type as i32,
                    ))
                }
            }
        }
    }

    pub fn interface(&self) -> &SyntaxId {
        &self.interface
    }

    pub fn is_bound(&self) -> bool {
        self.is_bound
    }

    /// Negotiated (transmit, receive) fragment sizes
    pub fn max_frag(&self) -> (u16, u16) {
        (self.max_xmit_frag, self.max_recv_frag)
    }

    pub fn assoc_group_id(&self) -> u32 {
        self.assoc_group_id
    }
}

/// A reply to an earlier call whose caller timed out or was cancelled
fn is_stale(got: u32, current: u32) -> bool {
    got < current
}

async fn with_timeout<T>(limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| RpcError::Timeout)?
}

/// Builder for DCE RPC clients
pub struct DceRpcClientBuilder {
    interface: SyntaxId,
    timeout: Option<Duration>,
    call_timeout: Option<Duration>,
    max_pdu_size: usize,
    max_frag: u16,
}

impl DceRpcClientBuilder {
    pub fn new(interface_uuid: Uuid, major_version: u16, minor_version: u16) -> Self {
        Self::from_syntax(SyntaxId::new(interface_uuid, major_version, minor_version))
    }

    pub fn from_syntax(interface: SyntaxId) -> Self {
        Self {
            interface,
            timeout: None,
            call_timeout: None,
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            max_frag: DEFAULT_MAX_FRAG,
        }
    }

    /// Limit for connect + bind
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Limit for each call
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = Some(timeout);
        self
    }

    pub fn max_pdu_size(mut self, size: usize) -> Self {
        self.max_pdu_size = size;
        self
    }

    /// Fragment size offered in the bind
    pub fn max_frag(mut self, size: u16) -> Self {
        self.max_frag = size;
        self
    }

    /// Connect to the server and perform bind
    pub async fn connect(self, addr: SocketAddr) -> Result<DceRpcClient> {
        let connect = async {
            let stream = TcpStream::connect(addr).await?;
            stream.set_nodelay(true)?;
            self.bind_stream(stream).await
        };
        match self.timeout {
            Some(limit) => with_timeout(limit, connect).await,
            None => connect.await,
        }
    }

    /// Bind over an already connected stream
    pub async fn bind_stream<S>(&self, stream: S) -> Result<DceRpcClient<S>>
    where
        S: AsyncRead + AsyncWrite + Send,
    {
        let mut client = DceRpcClient::with_limits(stream, self.interface, self.max_pdu_size);
        client.max_xmit_frag = self.max_frag;
        client.max_recv_frag = self.max_frag;
        client.call_timeout = self.call_timeout;
        client.bind().await?;
        Ok(client)
    }
}
