//! NDR encoding/decoding context
//!
//! The context carries the byte order negotiated by the data representation
//! label and provides aligned, bounds-checked primitive access. Every
//! helper takes the running stub `position` so alignment is computed from
//! the start of the stub, not from the start of whatever buffer is in hand.

use crate::error::{NdrError, Result};
use bytes::{Buf, BufMut};

/// NDR encoding/decoding context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdrContext {
    pub little_endian: bool,
}

impl NdrContext {
    /// Little-endian, the NDR default
    pub fn new() -> Self {
        Self {
            little_endian: true,
        }
    }

    pub fn big_endian() -> Self {
        Self {
            little_endian: false,
        }
    }

    /// Padding needed to bring `position` to a multiple of `alignment`
    #[inline]
    pub fn align_padding(position: usize, alignment: usize) -> usize {
        if alignment <= 1 {
            return 0;
        }
        (alignment - position % alignment) % alignment
    }

    /// Write zero padding up to `alignment`
    pub fn write_align<B: BufMut>(&self, buf: &mut B, position: &mut usize, alignment: usize) {
        let padding = Self::align_padding(*position, alignment);
        buf.put_bytes(0, padding);
        *position += padding;
    }

    /// Skip padding up to `alignment`, then make sure `size` bytes follow
    pub fn read_align<B: Buf>(
        &self,
        buf: &mut B,
        position: &mut usize,
        alignment: usize,
        size: usize,
    ) -> Result<()> {
        let padding = Self::align_padding(*position, alignment);
        if buf.remaining() < padding + size {
            return Err(NdrError::BufferUnderflow {
                needed: padding + size,
                have: buf.remaining(),
            });
        }
        buf.advance(padding);
        *position += padding;
        Ok(())
    }

    #[inline]
    pub fn put_u8<B: BufMut>(&self, buf: &mut B, value: u8) {
        buf.put_u8(value);
    }

    #[inline]
    pub fn put_i8<B: BufMut>(&self, buf: &mut B, value: i8) {
        buf.put_i8(value);
    }

    #[inline]
    pub fn put_u16<B: BufMut>(&self, buf: &mut B, value: u16) {
        if self.little_endian {
            buf.put_u16_le(value)
        } else {
            buf.put_u16(value)
        }
    }

    #[inline]
    pub fn put_i16<B: BufMut>(&self, buf: &mut B, value: i16) {
        self.put_u16(buf, value as u16)
    }

    #[inline]
    pub fn put_u32<B: BufMut>(&self, buf: &mut B, value: u32) {
        if self.little_endian {
            buf.put_u32_le(value)
        } else {
            buf.put_u32(value)
        }
    }

    #[inline]
    pub fn put_i32<B: BufMut>(&self, buf: &mut B, value: i32) {
        self.put_u32(buf, value as u32)
    }

    #[inline]
    pub fn put_u64<B: BufMut>(&self, buf: &mut B, value: u64) {
        if self.little_endian {
            buf.put_u64_le(value)
        } else {
            buf.put_u64(value)
        }
    }

    #[inline]
    pub fn put_i64<B: BufMut>(&self, buf: &mut B, value: i64) {
        self.put_u64(buf, value as u64)
    }

    #[inline]
    pub fn put_f32<B: BufMut>(&self, buf: &mut B, value: f32) {
        self.put_u32(buf, value.to_bits())
    }

    #[inline]
    pub fn put_f64<B: BufMut>(&self, buf: &mut B, value: f64) {
        self.put_u64(buf, value.to_bits())
    }

    // The getters below assume the caller already checked `remaining()`,
    // normally through `read_align`.

    #[inline]
    pub fn get_u8<B: Buf>(&self, buf: &mut B) -> u8 {
        buf.get_u8()
    }

    #[inline]
    pub fn get_i8<B: Buf>(&self, buf: &mut B) -> i8 {
        buf.get_i8()
    }

    #[inline]
    pub fn get_u16<B: Buf>(&self, buf: &mut B) -> u16 {
        if self.little_endian {
            buf.get_u16_le()
        } else {
            buf.get_u16()
        }
    }

    #[inline]
    pub fn get_i16<B: Buf>(&self, buf: &mut B) -> i16 {
        self.get_u16(buf) as i16
    }

    #[inline]
    pub fn get_u32<B: Buf>(&self, buf: &mut B) -> u32 {
        if self.little_endian {
            buf.get_u32_le()
        } else {
            buf.get_u32()
        }
    }

    #[inline]
    pub fn get_i32<B: Buf>(&self, buf: &mut B) -> i32 {
        self.get_u32(buf) as i32
    }

    #[inline]
    pub fn get_u64<B: Buf>(&self, buf: &mut B) -> u64 {
        if self.little_endian {
            buf.get_u64_le()
        } else {
            buf.get_u64()
        }
    }

    #[inline]
    pub fn get_i64<B: Buf>(&self, buf: &mut B) -> i64 {
        self.get_u64(buf) as i64
    }

    #[inline]
    pub fn get_f32<B: Buf>(&self, buf: &mut B) -> f32 {
        f32::from_bits(self.get_u32(buf))
    }

    #[inline]
    pub fn get_f64<B: Buf>(&self, buf: &mut B) -> f64 {
        f64::from_bits(self.get_u64(buf))
    }
}

impl Default for NdrContext {
    fn default() -> Self {
        Self::new()
    }
}
