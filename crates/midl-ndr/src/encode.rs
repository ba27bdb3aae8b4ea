//! NDR encoding trait

use crate::{NdrContext, Result};
use bytes::{BufMut, Bytes, BytesMut};

/// A type with an NDR wire representation
pub trait NdrEncode {
    /// Append this value to `buf`.
    ///
    /// `position` is the offset from the start of the stub data; it drives
    /// alignment and must be advanced by every byte written, padding
    /// included.
    fn ndr_encode<B: BufMut>(&self, buf: &mut B, ctx: &NdrContext, position: &mut usize)
        -> Result<()>;

    /// Alignment of the first primitive in the encoding
    fn ndr_align() -> usize
    where
        Self: Sized,
    {
        1
    }

    /// Encoded size when the value starts at a suitably aligned offset
    fn ndr_size(&self) -> usize;

    /// Encode as a standalone little-endian stub
    fn to_ndr_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.ndr_size());
        let mut position = 0;
        self.ndr_encode(&mut buf, &NdrContext::default(), &mut position)?;
        Ok(buf.freeze())
    }
}
