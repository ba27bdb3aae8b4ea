//! DCE RPC Server
//!
//! - Each connection handled in a separate Tokio task
//! - Semaphore-based connection limiting
//! - Server statistics tracking
//! - Graceful shutdown via `run_until` / `serve_until`
//! - Fragmented requests reassembled, large responses fragmented

use crate::dcerpc::{
    BindAckPdu, BindPdu, ContextOutcome, FaultPdu, FaultStatus, Pdu, PduHeader, RejectReason,
    RequestPdu, ResponsePdu, SyntaxId, Uuid, DEFAULT_MAX_FRAG, NDR_SYNTAX_UUID,
};
use crate::dcerpc_transport::{DceRpcTransport, DEFAULT_MAX_PDU_SIZE};
use crate::error::{Result, RpcError};
use crate::fragmentation::{FragmentAssembler, FragmentGenerator};
use bytes::Bytes;
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, error, info, warn};

/// Operation handler function type
pub type OperationHandler =
    Arc<dyn Fn(Bytes) -> Pin<Box<dyn Future<Output = Result<Bytes>> + Send>> + Send + Sync>;

/// Interface definition - the operations served for one interface version
pub struct Interface {
    pub syntax: SyntaxId,
    operations: HashMap<u16, OperationHandler>,
}

impl Interface {
    pub fn new(uuid: Uuid, major_version: u16, minor_version: u16) -> Self {
        Self::from_syntax(SyntaxId::new(uuid, major_version, minor_version))
    }

    pub fn from_syntax(syntax: SyntaxId) -> Self {
        Self {
            syntax,
            operations: HashMap::new(),
        }
    }

    /// Register an operation handler
    pub fn register_operation<F, Fut>(&mut self, opnum: u16, handler: F)
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes>> + Send + 'static,
    {
        self.operations
            .insert(opnum, Arc::new(move |args| Box::pin(handler(args))));
    }

    pub fn get_operation(&self, opnum: u16) -> Option<&OperationHandler> {
        self.operations.get(&opnum)
    }

    pub fn opnums(&self) -> Vec<u16> {
        let mut opnums: Vec<u16> = self.operations.keys().copied().collect();
        opnums.sort_unstable();
        opnums
    }
}

/// DCE RPC Server configuration
#[derive(Debug, Clone)]
pub struct DceRpcServerConfig {
    pub max_pdu_size: usize,
    pub max_connections: usize,
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
}

impl Default for DceRpcServerConfig {
    fn default() -> Self {
        Self {
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            max_connections: 10000,
            max_xmit_frag: DEFAULT_MAX_FRAG,
            max_recv_frag: DEFAULT_MAX_FRAG,
        }
    }
}

/// Server statistics
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_accepted: AtomicU64,
    pub connections_active: AtomicU64,
    pub connections_rejected: AtomicU64,
    pub requests_received: AtomicU64,
    pub requests_processed: AtomicU64,
    pub requests_failed: AtomicU64,
    pub bytes_received: AtomicU64,
    pub bytes_sent: AtomicU64,
}

impl ServerStats {
    pub fn snapshot(&self) -> ServerStatsSnapshot {
        ServerStatsSnapshot {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            requests_received: self.requests_received.load(Ordering::Relaxed),
            requests_processed: self.requests_processed.load(Ordering::Relaxed),
            requests_failed: self.requests_failed.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
        }
    }

    fn count(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }
}

/// Snapshot of server statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatsSnapshot {
    pub connections_accepted: u64,
    pub connections_active: u64,
    pub connections_rejected: u64,
    pub requests_received: u64,
    pub requests_processed: u64,
    pub requests_failed: u64,
    pub bytes_received: u64,
    pub bytes_sent: u64,
}

type InterfaceTable = Arc<RwLock<HashMap<Uuid, Interface>>>;

/// DCE RPC Server
///
/// Interfaces live behind an `Arc<RwLock>`; the lock is released before
/// an operation handler runs, so handlers never block registration.
pub struct DceRpcServer {
    interfaces: InterfaceTable,
    config: DceRpcServerConfig,
    assoc_group_counter: AtomicU32,
    stats: Arc<ServerStats>,
}

impl DceRpcServer {
    pub fn new() -> Self {
        Self::with_config(DceRpcServerConfig::default())
    }

    pub fn with_config(config: DceRpcServerConfig) -> Self {
        Self {
            interfaces: Arc::new(RwLock::new(HashMap::new())),
            config,
            assoc_group_counter: AtomicU32::new(1),
            stats: Arc::new(ServerStats::default()),
        }
    }

    pub fn config(&self) -> &DceRpcServerConfig {
        &self.config
    }

    pub fn stats(&self) -> &Arc<ServerStats> {
        &self.stats
    }

    /// Register an interface; replaces any interface with the same UUID
    pub async fn register_interface(&self, interface: Interface) {
        info!(
            "Registering interface: {} version {}.{} ({} operations)",
            interface.syntax.uuid,
            interface.syntax.major_version(),
            interface.syntax.minor_version(),
            interface.operations.len()
        );
        let mut interfaces = self.interfaces.write().await;
        interfaces.insert(interface.syntax.uuid, interface);
    }

    /// Bind `addr` and serve forever
    pub async fn run(&self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_until(listener, std::future::pending()).await
    }

    /// Bind `addr` and serve until `shutdown` resolves
    pub async fn run_until<F: Future<Output = ()>>(
        &self,
        addr: SocketAddr,
        shutdown: F,
    ) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve an already bound listener (e.g. one bound to port 0) until
    /// `shutdown` resolves, then wait for open connections to drain.
    pub async fn serve_until<F: Future<Output = ()>>(
        &self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            "DCE RPC server listening on {} (max_connections: {})",
            local_addr, self.config.max_connections
        );

        let semaphore = Arc::new(Semaphore::new(self.config.max_connections));
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;

                _ = &mut shutdown => {
                    info!("Server shutting down gracefully");
                    let _ = semaphore.acquire_many(self.config.max_connections as u32).await;
                    info!("All connections closed");
                    return Ok(());
                }

                accepted = listener.accept() => {
                    let (stream, peer_addr) = accepted?;

                    let permit = match semaphore.clone().try_acquire_owned() {
                        Ok(permit) => permit,
                        Err(_) => {
                            ServerStats::count(&self.stats.connections_rejected, 1);
                            warn!("Connection limit reached, rejecting connection from {}", peer_addr);
                            drop(stream);
                            continue;
                        }
                    };

                    ServerStats::count(&self.stats.connections_accepted, 1);
                    ServerStats::count(&self.stats.connections_active, 1);
                    debug!("Accepted connection from {}", peer_addr);

                    let connection = Connection {
                        interfaces: Arc::clone(&self.interfaces),
                        config: self.config.clone(),
                        assoc_group_id: self.assoc_group_counter.fetch_add(1, Ordering::SeqCst),
                        secondary_addr: local_addr.port().to_string(),
                        stats: Arc::clone(&self.stats),
                    };

                    tokio::spawn(async move {
                        let _permit = permit;
                        let stats = Arc::clone(&connection.stats);
                        let (reader, writer) = stream.into_split();
                        let result = connection.serve(reader, writer).await;
                        stats.connections_active.fetch_sub(1, Ordering::Relaxed);

                        match result {
                            Ok(()) | Err(RpcError::ConnectionClosed) => {
                                debug!("Connection closed from {}", peer_addr)
                            }
                            Err(e) => warn!("Connection error from {}: {}", peer_addr, e),
                        }
                    });
                }
            }
        }
    }

    /// Serve a single already-established byte stream
    pub async fn serve_stream<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let connection = Connection {
            interfaces: Arc::clone(&self.interfaces),
            config: self.config.clone(),
            assoc_group_id: self.assoc_group_counter.fetch_add(1, Ordering::SeqCst),
            secondary_addr: String::new(),
            stats: Arc::clone(&self.stats),
        };
        match connection.serve(reader, writer).await {
            Err(RpcError::ConnectionClosed) => Ok(()),
            other => other,
        }
    }
}

impl Default for DceRpcServer {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by one accepted association
struct Connection {
    interfaces: InterfaceTable,
    config: DceRpcServerConfig,
    assoc_group_id: u32,
    secondary_addr: String,
    stats: Arc<ServerStats>,
}

/// Negotiated per-association state
struct Association {
    /// presentation context id -> interface UUID
    contexts: HashMap<u16, Uuid>,
    max_xmit_frag: u16,
    pending: Option<FragmentAssembler>,
}

impl Connection {
    async fn serve<R, W>(&self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut read_transport =
            DceRpcTransport::new(reader).with_max_pdu_size(self.config.max_pdu_size);
        let mut write_transport =
            DceRpcTransport::new(writer).with_max_pdu_size(self.config.max_pdu_size);

        let mut assoc = Association {
            contexts: HashMap::new(),
            max_xmit_frag: self.config.max_xmit_frag,
            pending: None,
        };

        loop {
            let data = read_transport.read_pdu().await?;
            ServerStats::count(&self.stats.bytes_received, data.len() as u64);

            let pdu = match Pdu::decode(&data) {
                Ok(pdu) => pdu,
                Err(e) => {
                    warn!("Rejecting undecodable PDU: {}", e);
                    let call_id = PduHeader::decode(&data).map(|h| h.call_id).unwrap_or(0);
                    let fault = FaultPdu::new(call_id, FaultStatus::ProtoError);
                    self.send(&mut write_transport, &fault.encode()?).await?;
                    continue;
                }
            };

            match pdu {
                Pdu::Bind(bind) => {
                    debug!(
                        call_id = bind.header.call_id,
                        contexts = bind.context_list.len(),
                        "Received bind"
                    );
                    let ack = self.process_bind(&bind, &mut assoc).await;
                    self.send(&mut write_transport, &ack.encode()?).await?;
                }

                Pdu::Request(request) => {
                    let stub = match self.collect_request(&request, &mut assoc) {
                        Ok(Some(stub)) => stub,
                        Ok(None) => continue,
                        Err(e) => {
                            assoc.pending = None;
                            ServerStats::count(&self.stats.requests_failed, 1);
                            warn!(
                                call_id = request.header.call_id,
                                "Rejecting request fragment: {}", e
                            );
                            let mut fault =
                                FaultPdu::new(request.header.call_id, FaultStatus::ProtoError);
                            fault.context_id = request.context_id;
                            self.send(&mut write_transport, &fault.encode()?).await?;
                            continue;
                        }
                    };
                    ServerStats::count(&self.stats.requests_received, 1);
                    debug!(
                        call_id = request.header.call_id,
                        opnum = request.opnum,
                        stub_len = stub.len(),
                        "Received request"
                    );

                    match self.process_request(&request, stub, &assoc).await {
                        Ok(response) => {
                            for frag in
                                FragmentGenerator::fragment_response(&response, assoc.max_xmit_frag)
                            {
                                self.send(&mut write_transport, &frag.encode()?).await?;
                            }
                        }
                        Err(fault) => {
                            self.send(&mut write_transport, &fault.encode()?).await?;
                        }
                    }
                }

                Pdu::BindAck(_) | Pdu::Response(_) => {
                    warn!("Received unexpected client-bound PDU");
                }

                Pdu::Fault(fault) => {
                    warn!(
                        "Received fault from client: 0x{:08x} ({})",
                        fault.status,
                        FaultStatus::describe(fault.status)
                    );
                }
            }
        }
    }

    async fn send<W: AsyncWrite + Unpin>(
        &self,
        transport: &mut DceRpcTransport<W>,
        data: &[u8],
    ) -> Result<()> {
        ServerStats::count(&self.stats.bytes_sent, data.len() as u64);
        transport.write_pdu(data).await
    }

    async fn process_bind(&self, bind: &BindPdu, assoc: &mut Association) -> BindAckPdu {
        let interfaces = self.interfaces.read().await;

        let mut results = Vec::with_capacity(bind.context_list.len());
        for context in &bind.context_list {
            let interface_uuid = context.abstract_syntax.uuid;
            let outcome = match interfaces.get(&interface_uuid) {
                None => {
                    debug!("Bind rejected: unknown interface {}", interface_uuid);
                    ContextOutcome::rejected(RejectReason::AbstractSyntaxNotSupported)
                }
                Some(iface)
                    if iface.syntax.major_version() != context.abstract_syntax.major_version() =>
                {
                    debug!(
                        "Bind rejected: {} version {} not served",
                        interface_uuid,
                        context.abstract_syntax.major_version()
                    );
                    ContextOutcome::rejected(RejectReason::AbstractSyntaxNotSupported)
                }
                Some(_) => {
                    let ndr = context
                        .transfer_syntaxes
                        .iter()
                        .any(|ts| ts.uuid == NDR_SYNTAX_UUID);
                    if ndr {
                        assoc.contexts.insert(context.context_id, interface_uuid);
                        ContextOutcome::accepted(SyntaxId::ndr())
                    } else {
                        ContextOutcome::rejected(RejectReason::TransferSyntaxesNotSupported)
                    }
                }
            };
            results.push(outcome);
        }

        if results.is_empty() {
            results.push(ContextOutcome::rejected(RejectReason::NotSpecified));
        }

        assoc.max_xmit_frag = self.config.max_xmit_frag.min(bind.max_recv_frag);

        let mut ack = BindAckPdu::new(bind.header.call_id, self.assoc_group_id, results);
        ack.max_xmit_frag = assoc.max_xmit_frag;
        ack.max_recv_frag = self.config.max_recv_frag.min(bind.max_xmit_frag);
        ack.secondary_addr = self.secondary_addr.clone();
        ack
    }

    /// Returns the full stub once the last fragment of a call arrives
    fn collect_request(
        &self,
        request: &RequestPdu,
        assoc: &mut Association,
    ) -> Result<Option<Bytes>> {
        let flags = request.header.packet_flags;
        if flags.is_first_frag() && flags.is_last_frag() && assoc.pending.is_none() {
            return Ok(Some(request.stub_data.clone()));
        }

        let assembler = assoc
            .pending
            .get_or_insert_with(|| FragmentAssembler::new(request.header.call_id));
        let done = assembler.add_fragment(
            &request.header,
            &request.stub_data,
            request.context_id,
            Some(request.opnum),
            request.alloc_hint,
        )?;
        if done.is_some() {
            assoc.pending = None;
        }
        Ok(done)
    }

    async fn process_request(
        &self,
        request: &RequestPdu,
        stub: Bytes,
        assoc: &Association,
    ) -> std::result::Result<ResponsePdu, FaultPdu> {
        let call_id = request.header.call_id;
        let fail = |status: FaultStatus| {
            ServerStats::count(&self.stats.requests_failed, 1);
            warn!(call_id, opnum = request.opnum, "Request faulted: {:?}", status);
            let mut fault = FaultPdu::new(call_id, status);
            fault.context_id = request.context_id;
            fault
        };

        let Some(interface_uuid) = assoc.contexts.get(&request.context_id) else {
            return Err(fail(FaultStatus::ContextMismatch));
        };

        let interfaces = self.interfaces.read().await;
        let Some(interface) = interfaces.get(interface_uuid) else {
            return Err(fail(FaultStatus::UnkIf));
        };
        let Some(handler) = interface.get_operation(request.opnum).map(Arc::clone) else {
            return Err(fail(FaultStatus::OpRngError));
        };
        drop(interfaces);

        match handler(stub).await {
            Ok(result) => {
                ServerStats::count(&self.stats.requests_processed, 1);
                let mut response = ResponsePdu::new(call_id, result);
                response.context_id = request.context_id;
                Ok(response)
            }
            Err(e) => {
                error!("Operation {} failed: {}", request.opnum, e);
                let status = match e {
                    RpcError::OperationUnavailable(_) => FaultStatus::OpRngError,
                    RpcError::Truncated(_) | RpcError::InvalidPduData(_) => FaultStatus::FaultNdr,
                    _ => FaultStatus::Unspecified,
                };
                Err(fail(status))
            }
        }
    }
}

/// Builder for creating DCE RPC interfaces with a fluent API
pub struct InterfaceBuilder {
    interface: Interface,
}

impl InterfaceBuilder {
    pub fn new(uuid: &str, major_version: u16, minor_version: u16) -> Option<Self> {
        let uuid = Uuid::parse(uuid)?;
        Some(Self {
            interface: Interface::new(uuid, major_version, minor_version),
        })
    }

    pub fn from_syntax(syntax: SyntaxId) -> Self {
        Self {
            interface: Interface::from_syntax(syntax),
        }
    }

    pub fn operation<F, Fut>(mut self, opnum: u16, handler: F) -> Self
    where
        F: Fn(Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Bytes>> + Send + 'static,
    {
        self.interface.register_operation(opnum, handler);
        self
    }

    pub fn build(self) -> Interface {
        self.interface
    }
}
