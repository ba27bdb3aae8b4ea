//! Automation VARIANT (subset)
//!
//! Only the scalar VARTYPEs an automation method needs are modelled. The
//! wire form follows MS-OAUT 2.2.29.1 wireVARIANT with the union reduced
//! to those arms:
//!
//! ```text
//! (align 8)
//! clSize:       u32   # size of the whole structure in 8-byte units
//! rpcReserved:  u32
//! vt:           u16
//! wReserved1-3: u16 x 3
//! switch_is:    u32   # == vt
//! value                 # aligned to its natural size
//! ```

use crate::bstr::BString;
use crate::error::{NdrError, Result};
use crate::{NdrContext, NdrDecode, NdrEncode};
use bytes::{Buf, BufMut};

/// VARTYPE codes
pub mod vt {
    pub const VT_EMPTY: u16 = 0;
    pub const VT_NULL: u16 = 1;
    pub const VT_I2: u16 = 2;
    pub const VT_I4: u16 = 3;
    pub const VT_R4: u16 = 4;
    pub const VT_R8: u16 = 5;
    pub const VT_BSTR: u16 = 8;
    pub const VT_BOOL: u16 = 11;
    pub const VT_UI1: u16 = 17;
}

/// VARIANT_BOOL true
pub const VARIANT_TRUE: i16 = -1;
/// VARIANT_BOOL false
pub const VARIANT_FALSE: i16 = 0;

/// Fixed part of the wire structure before the value
const HEADER_SIZE: usize = 20;

/// A tagged automation value
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Variant {
    #[default]
    Empty,
    Null,
    I2(i16),
    I4(i32),
    R4(f32),
    R8(f64),
    Bool(bool),
    Bstr(BString),
    UI1(u8),
}

impl Variant {
    /// The VARTYPE tag
    pub fn vt(&self) -> u16 {
        match self {
            Variant::Empty => vt::VT_EMPTY,
            Variant::Null => vt::VT_NULL,
            Variant::I2(_) => vt::VT_I2,
            Variant::I4(_) => vt::VT_I4,
            Variant::R4(_) => vt::VT_R4,
            Variant::R8(_) => vt::VT_R8,
            Variant::Bool(_) => vt::VT_BOOL,
            Variant::Bstr(_) => vt::VT_BSTR,
            Variant::UI1(_) => vt::VT_UI1,
        }
    }

    fn value_size(&self) -> usize {
        match self {
            Variant::Empty | Variant::Null => 0,
            Variant::UI1(_) => 1,
            Variant::I2(_) | Variant::Bool(_) => 2,
            Variant::I4(_) | Variant::R4(_) => 4,
            // header ends at offset 20, so a double needs 4 bytes of padding
            Variant::R8(_) => 4 + 8,
            Variant::Bstr(b) => b.ndr_size(),
        }
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Variant::R8(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Variant::I4(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::Bstr(BString::new(v))
    }
}

impl From<BString> for Variant {
    fn from(v: BString) -> Self {
        Variant::Bstr(v)
    }
}

impl NdrEncode for Variant {
    fn ndr_encode<B: BufMut>(
        &self,
        buf: &mut B,
        ctx: &NdrContext,
        position: &mut usize,
    ) -> Result<()> {
        ctx.write_align(buf, position, 8);

        let cl_size = (HEADER_SIZE + self.value_size()).div_ceil(8) as u32;
        let vt = self.vt();
        cl_size.ndr_encode(buf, ctx, position)?;
        0u32.ndr_encode(buf, ctx, position)?;
        vt.ndr_encode(buf, ctx, position)?;
        for _ in 0..3 {
            0u16.ndr_encode(buf, ctx, position)?;
        }
        (vt as u32).ndr_encode(buf, ctx, position)?;

        match self {
            Variant::Empty | Variant::Null => Ok(()),
            Variant::I2(v) => v.ndr_encode(buf, ctx, position),
            Variant::I4(v) => v.ndr_encode(buf, ctx, position),
            Variant::R4(v) => v.ndr_encode(buf, ctx, position),
            Variant::R8(v) => v.ndr_encode(buf, ctx, position),
            Variant::Bool(v) => {
                let raw = if *v { VARIANT_TRUE } else { VARIANT_FALSE };
                raw.ndr_encode(buf, ctx, position)
            }
            Variant::Bstr(v) => v.ndr_encode(buf, ctx, position),
            Variant::UI1(v) => v.ndr_encode(buf, ctx, position),
        }
    }

    fn ndr_align() -> usize {
        8
    }

    fn ndr_size(&self) -> usize {
        HEADER_SIZE + self.value_size()
    }
}

impl NdrDecode for Variant {
    fn ndr_decode<B: Buf>(buf: &mut B, ctx: &NdrContext, position: &mut usize) -> Result<Self> {
        ctx.read_align(buf, position, 8, HEADER_SIZE)?;

        let _cl_size = u32::ndr_decode(buf, ctx, position)?;
        let _rpc_reserved = u32::ndr_decode(buf, ctx, position)?;
        let vt = u16::ndr_decode(buf, ctx, position)?;
        for _ in 0..3 {
            u16::ndr_decode(buf, ctx, position)?;
        }
        let switch = u32::ndr_decode(buf, ctx, position)?;
        if switch != vt as u32 {
            return Err(NdrError::InvalidDiscriminant(switch));
        }

        Ok(match vt {
            vt::VT_EMPTY => Variant::Empty,
            vt::VT_NULL => Variant::Null,
            vt::VT_I2 => Variant::I2(i16::ndr_decode(buf, ctx, position)?),
            vt::VT_I4 => Variant::I4(i32::ndr_decode(buf, ctx, position)?),
            vt::VT_R4 => Variant::R4(f32::ndr_decode(buf, ctx, position)?),
            vt::VT_R8 => Variant::R8(f64::ndr_decode(buf, ctx, position)?),
            vt::VT_BOOL => Variant::Bool(i16::ndr_decode(buf, ctx, position)? != VARIANT_FALSE),
            vt::VT_BSTR => Variant::Bstr(BString::ndr_decode(buf, ctx, position)?),
            vt::VT_UI1 => Variant::UI1(u8::ndr_decode(buf, ctx, position)?),
            other => return Err(NdrError::UnsupportedVarType(other)),
        })
    }

    fn ndr_align() -> usize {
        8
    }
}
