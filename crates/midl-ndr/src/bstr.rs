//! Automation strings (BSTR)
//!
//! A BSTR is a length-prefixed UTF-16 string that may also be NULL. On the
//! wire (MS-OAUT 2.2.23) it travels as a unique pointer to a
//! FLAGGED_WORD_BLOB:
//!
//! ```text
//! referent_id: u32         # 0 for a NULL BSTR, nothing else follows
//! max_count:   u32         # conformance, in UTF-16 units
//! cBytes:      u32         # length in bytes
//! clSize:      u32         # length in UTF-16 units
//! asData:      u16[clSize]
//! (pad to 4)
//! ```

use crate::error::{NdrError, Result, MAX_NDR_ALLOCATION_SIZE};
use crate::{NdrContext, NdrDecode, NdrEncode};
use bytes::{Buf, BufMut};
use std::fmt;

/// Referent id written for a non-NULL BSTR
const BSTR_REFERENT: u32 = 0x0002_0000;

/// An automation string; `None` content is the NULL BSTR
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BString {
    units: Option<Vec<u16>>,
}

impl BString {
    pub fn new(s: &str) -> Self {
        Self {
            units: Some(s.encode_utf16().collect()),
        }
    }

    /// The NULL BSTR
    pub fn null() -> Self {
        Self { units: None }
    }

    pub fn from_units(units: Vec<u16>) -> Self {
        Self { units: Some(units) }
    }

    pub fn is_null(&self) -> bool {
        self.units.is_none()
    }

    /// Length in UTF-16 units (NULL has length 0)
    pub fn len(&self) -> usize {
        self.units.as_ref().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_units(&self) -> &[u16] {
        self.units.as_deref().unwrap_or(&[])
    }

    /// Decode as UTF-16, failing on unpaired surrogates
    pub fn to_string_checked(&self) -> Result<String> {
        char::decode_utf16(self.as_units().iter().copied())
            .collect::<std::result::Result<String, _>>()
            .map_err(NdrError::from)
    }

    /// Decode as UTF-16, replacing unpaired surrogates with U+FFFD
    pub fn to_string_lossy(&self) -> String {
        String::from_utf16_lossy(self.as_units())
    }
}

impl From<&str> for BString {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for BString {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl fmt::Display for BString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl NdrEncode for BString {
    fn ndr_encode<B: BufMut>(
        &self,
        buf: &mut B,
        ctx: &NdrContext,
        position: &mut usize,
    ) -> Result<()> {
        let Some(units) = &self.units else {
            return 0u32.ndr_encode(buf, ctx, position);
        };

        let count = units.len() as u32;
        BSTR_REFERENT.ndr_encode(buf, ctx, position)?;
        count.ndr_encode(buf, ctx, position)?;
        (count * 2).ndr_encode(buf, ctx, position)?;
        count.ndr_encode(buf, ctx, position)?;
        for unit in units {
            ctx.put_u16(buf, *unit);
        }
        *position += units.len() * 2;
        ctx.write_align(buf, position, 4);
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_size(&self) -> usize {
        match &self.units {
            None => 4,
            Some(units) => 16 + units.len() * 2 + NdrContext::align_padding(units.len() * 2, 4),
        }
    }
}

impl NdrDecode for BString {
    fn ndr_decode<B: Buf>(buf: &mut B, ctx: &NdrContext, position: &mut usize) -> Result<Self> {
        let referent = u32::ndr_decode(buf, ctx, position)?;
        if referent == 0 {
            return Ok(Self::null());
        }

        let max_count = u32::ndr_decode(buf, ctx, position)?;
        let byte_len = u32::ndr_decode(buf, ctx, position)?;
        let count = u32::ndr_decode(buf, ctx, position)?;
        if count != max_count || byte_len != count.saturating_mul(2) {
            return Err(NdrError::ConformanceMismatch {
                max_count,
                actual_count: count,
            });
        }

        let byte_len = byte_len as usize;
        if byte_len > MAX_NDR_ALLOCATION_SIZE {
            return Err(NdrError::AllocationLimitExceeded {
                requested: byte_len,
                limit: MAX_NDR_ALLOCATION_SIZE,
            });
        }
        ctx.read_align(buf, position, 1, byte_len)?;

        let units = (0..count).map(|_| ctx.get_u16(buf)).collect();
        *position += byte_len;

        let padding = NdrContext::align_padding(*position, 4);
        let skip = padding.min(buf.remaining());
        buf.advance(skip);
        *position += skip;

        Ok(Self::from_units(units))
    }

    fn ndr_align() -> usize {
        4
    }
}
