//! NDR conformant arrays
//!
//! ```text
//! max_count: u32      # element count, aligned to 4
//! elements[max_count] # each element at its own alignment
//! ```

use crate::error::{NdrError, Result, MAX_NDR_ALLOCATION_SIZE};
use crate::{NdrContext, NdrDecode, NdrEncode};
use bytes::{Buf, BufMut};

/// Conformant array - size determined at runtime
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConformantArray<T> {
    pub elements: Vec<T>,
}

impl<T> ConformantArray<T> {
    pub fn new(elements: Vec<T>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn into_inner(self) -> Vec<T> {
        self.elements
    }
}

impl<T> From<Vec<T>> for ConformantArray<T> {
    fn from(elements: Vec<T>) -> Self {
        Self { elements }
    }
}

impl<T: NdrEncode> NdrEncode for ConformantArray<T> {
    fn ndr_encode<B: BufMut>(
        &self,
        buf: &mut B,
        ctx: &NdrContext,
        position: &mut usize,
    ) -> Result<()> {
        (self.elements.len() as u32).ndr_encode(buf, ctx, position)?;
        for elem in &self.elements {
            elem.ndr_encode(buf, ctx, position)?;
        }
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_size(&self) -> usize {
        4 + self.elements.iter().map(|e| e.ndr_size()).sum::<usize>()
    }
}

impl<T: NdrDecode> NdrDecode for ConformantArray<T> {
    fn ndr_decode<B: Buf>(buf: &mut B, ctx: &NdrContext, position: &mut usize) -> Result<Self> {
        let max_count = u32::ndr_decode(buf, ctx, position)? as usize;

        // every element occupies at least one byte, so a count larger than
        // what is left cannot be genuine
        if max_count > buf.remaining() || max_count > MAX_NDR_ALLOCATION_SIZE {
            return Err(NdrError::AllocationLimitExceeded {
                requested: max_count,
                limit: buf.remaining().min(MAX_NDR_ALLOCATION_SIZE),
            });
        }

        let mut elements = Vec::with_capacity(max_count);
        for _ in 0..max_count {
            elements.push(T::ndr_decode(buf, ctx, position)?);
        }
        Ok(Self { elements })
    }

    fn ndr_align() -> usize {
        4
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BString;
    use bytes::BytesMut;

    #[test]
    fn test_i32_array() {
        let ctx = NdrContext::new();
        let array = ConformantArray::new(vec![1i32, -1, 7]);
        let mut buf = BytesMut::new();
        let mut pos = 0;
        array.ndr_encode(&mut buf, &ctx, &mut pos).unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(&buf[0..4], &[3, 0, 0, 0]);

        let mut reader = buf.freeze();
        let mut pos = 0;
        let decoded = ConformantArray::<i32>::ndr_decode(&mut reader, &ctx, &mut pos).unwrap();
        assert_eq!(decoded, array);
    }

    #[test]
    fn test_bstr_array() {
        let ctx = NdrContext::new();
        let array = ConformantArray::new(vec![BString::new("ComTestMethod"), BString::new("radius")]);
        let mut buf = BytesMut::new();
        let mut pos = 0;
        array.ndr_encode(&mut buf, &ctx, &mut pos).unwrap();
        assert_eq!(array.ndr_size(), buf.len());

        let mut reader = buf.freeze();
        let mut pos = 0;
        let decoded = ConformantArray::<BString>::ndr_decode(&mut reader, &ctx, &mut pos).unwrap();
        assert_eq!(decoded.elements[1].to_string_lossy(), "radius");
    }

    #[test]
    fn test_absurd_count_rejected() {
        let ctx = NdrContext::new();
        let mut reader: &[u8] = &[0xff, 0xff, 0xff, 0x7f, 0, 0, 0, 0];
        let mut pos = 0;
        assert!(matches!(
            ConformantArray::<u32>::ndr_decode(&mut reader, &ctx, &mut pos),
            Err(NdrError::AllocationLimitExceeded { .. })
        ));
    }
}
