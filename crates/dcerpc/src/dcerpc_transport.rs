//! DCE RPC transport layer
//!
//! Connection-oriented PDUs are self-delimiting via the frag_length field
//! in the header, so a byte stream is framed by peeking at the first 16
//! bytes of every PDU.

use crate::dcerpc::{Pdu, PduHeader};
use crate::error::{Result, RpcError};
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Maximum PDU size (64 KB default, typical DCE RPC limit)
pub const DEFAULT_MAX_PDU_SIZE: usize = 65536;

/// Frames DCE RPC PDUs over an async byte stream
pub struct DceRpcTransport<T> {
    inner: T,
    max_pdu_size: usize,
    read_buf: BytesMut,
}

impl<T> DceRpcTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            read_buf: BytesMut::with_capacity(8192),
        }
    }

    pub fn with_max_pdu_size(mut self, max_size: usize) -> Self {
        self.max_pdu_size = max_size;
        self
    }

    pub fn max_pdu_size(&self) -> usize {
        self.max_pdu_size
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: AsyncRead + Unpin> DceRpcTransport<T> {
    /// Read one complete PDU (header included)
    pub async fn read_pdu(&mut self) -> Result<Bytes> {
        self.fill_to(PduHeader::SIZE, "incomplete PDU header").await?;

        let header = PduHeader::decode(&self.read_buf[..PduHeader::SIZE])?;
        let frag_length = header.frag_length as usize;

        if frag_length < PduHeader::SIZE {
            return Err(RpcError::InvalidPduData(format!(
                "fragment length {} is shorter than the header",
                frag_length
            )));
        }
        if frag_length > self.max_pdu_size {
            return Err(RpcError::RecordTooLarge {
                size: frag_length,
                max: self.max_pdu_size,
            });
        }

        self.fill_to(frag_length, "incomplete PDU body").await?;
        trace!(
            ptype = ?header.packet_type,
            call_id = header.call_id,
            frag_length,
            "read PDU"
        );
        Ok(self.read_buf.split_to(frag_length).freeze())
    }

    /// Read and decode one PDU
    pub async fn read_pdu_decoded(&mut self) -> Result<Pdu> {
        let data = self.read_pdu().await?;
        Pdu::decode(&data)
    }

    /// Keep reading until at least `len` bytes are buffered
    async fn fill_to(&mut self, len: usize, context: &str) -> Result<()> {
        while self.read_buf.len() < len {
            self.read_buf.reserve(len - self.read_buf.len());
            let n = self.inner.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Err(RpcError::ConnectionClosed);
                }
                return Err(RpcError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    context.to_string(),
                )));
            }
        }
        Ok(())
    }
}

impl<T: AsyncWrite + Unpin> DceRpcTransport<T> {
    /// Write one encoded PDU and flush it
    pub async fn write_pdu(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > self.max_pdu_size {
            return Err(RpcError::PduTooLarge {
                size: data.len(),
                max: self.max_pdu_size,
            });
        }
        self.inner.write_all(data).await?;
        self.inner.flush().await?;
        Ok(())
    }
}
