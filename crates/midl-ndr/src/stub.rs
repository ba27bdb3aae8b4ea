//! Stub buffers
//!
//! Marshaling a call is a sequence of aligned writes into one buffer whose
//! offsets are measured from the start of the stub; unmarshaling mirrors
//! it. `NdrWriter` and `NdrReader` carry the buffer, the context and the
//! running position together so stub code reads as a list of fields.

use crate::error::{NdrError, Result};
use crate::{NdrContext, NdrDecode, NdrEncode};
use bytes::{Buf, Bytes, BytesMut};

/// Builds NDR stub data
#[derive(Debug, Default)]
pub struct NdrWriter {
    buf: BytesMut,
    ctx: NdrContext,
    position: usize,
}

impl NdrWriter {
    pub fn new() -> Self {
        Self::with_context(NdrContext::default())
    }

    pub fn with_context(ctx: NdrContext) -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
            ctx,
            position: 0,
        }
    }

    /// Append one value at its natural alignment
    pub fn write<T: NdrEncode>(&mut self, value: &T) -> Result<&mut Self> {
        value.ndr_encode(&mut self.buf, &self.ctx, &mut self.position)?;
        Ok(self)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Consumes NDR stub data
#[derive(Debug)]
pub struct NdrReader {
    buf: Bytes,
    ctx: NdrContext,
    position: usize,
}

impl NdrReader {
    pub fn new(buf: Bytes) -> Self {
        Self::with_context(buf, NdrContext::default())
    }

    pub fn with_context(buf: Bytes, ctx: NdrContext) -> Self {
        Self {
            buf,
            ctx,
            position: 0,
        }
    }

    /// Read the next value at its natural alignment
    pub fn read<T: NdrDecode>(&mut self) -> Result<T> {
        T::ndr_decode(&mut self.buf, &self.ctx, &mut self.position)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    /// Require that the stub has been consumed up to alignment padding
    pub fn finish(self) -> Result<()> {
        let left = self.buf.remaining();
        if left > NdrContext::align_padding(self.position, 8) {
            return Err(NdrError::TrailingData(left));
        }
        Ok(())
    }
}
