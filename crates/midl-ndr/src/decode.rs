//! NDR decoding trait

use crate::{NdrContext, Result};
use bytes::Buf;

/// A type that can be read back from its NDR wire representation
pub trait NdrDecode: Sized {
    /// Read a value from `buf`, advancing `position` (the offset from the
    /// start of the stub data) past it and any leading padding.
    fn ndr_decode<B: Buf>(buf: &mut B, ctx: &NdrContext, position: &mut usize) -> Result<Self>;

    /// Alignment of the first primitive in the encoding
    fn ndr_align() -> usize {
        1
    }

    /// Decode a standalone little-endian stub
    fn from_ndr_bytes(mut data: &[u8]) -> Result<Self> {
        let mut position = 0;
        Self::ndr_decode(&mut data, &NdrContext::default(), &mut position)
    }
}
