//! NDR primitive type implementations
//!
//! | MIDL Type      | Rust Type    | Size | Alignment |
//! |----------------|--------------|------|-----------|
//! | boolean        | bool         | 1    | 1         |
//! | byte           | u8           | 1    | 1         |
//! | small          | i8           | 1    | 1         |
//! | short          | i16          | 2    | 2         |
//! | unsigned short | u16          | 2    | 2         |
//! | long           | i32          | 4    | 4         |
//! | unsigned long  | u32          | 4    | 4         |
//! | hyper          | i64          | 8    | 8         |
//! | unsigned hyper | u64          | 8    | 8         |
//! | float          | f32          | 4    | 4         |
//! | double         | f64          | 8    | 8         |
//! | GUID           | uuid::Uuid   | 16   | 4         |

use crate::{NdrContext, NdrDecode, NdrEncode, Result};
use bytes::{Buf, BufMut};

macro_rules! impl_ndr_primitive {
    ($ty:ty, $size:expr, $put:ident, $get:ident) => {
        impl NdrEncode for $ty {
            fn ndr_encode<B: BufMut>(
                &self,
                buf: &mut B,
                ctx: &NdrContext,
                position: &mut usize,
            ) -> Result<()> {
                ctx.write_align(buf, position, $size);
                ctx.$put(buf, *self);
                *position += $size;
                Ok(())
            }

            fn ndr_align() -> usize {
                $size
            }

            fn ndr_size(&self) -> usize {
                $size
            }
        }

        impl NdrDecode for $ty {
            fn ndr_decode<B: Buf>(
                buf: &mut B,
                ctx: &NdrContext,
                position: &mut usize,
            ) -> Result<Self> {
                ctx.read_align(buf, position, $size, $size)?;
                let value = ctx.$get(buf);
                *position += $size;
                Ok(value)
            }

            fn ndr_align() -> usize {
                $size
            }
        }
    };
}

impl_ndr_primitive!(u8, 1, put_u8, get_u8);
impl_ndr_primitive!(i8, 1, put_i8, get_i8);
impl_ndr_primitive!(u16, 2, put_u16, get_u16);
impl_ndr_primitive!(i16, 2, put_i16, get_i16);
impl_ndr_primitive!(u32, 4, put_u32, get_u32);
impl_ndr_primitive!(i32, 4, put_i32, get_i32);
impl_ndr_primitive!(u64, 8, put_u64, get_u64);
impl_ndr_primitive!(i64, 8, put_i64, get_i64);
impl_ndr_primitive!(f32, 4, put_f32, get_f32);
impl_ndr_primitive!(f64, 8, put_f64, get_f64);

/// NDR boolean - one byte, any non-zero value reads as true
impl NdrEncode for bool {
    fn ndr_encode<B: BufMut>(
        &self,
        buf: &mut B,
        ctx: &NdrContext,
        position: &mut usize,
    ) -> Result<()> {
        (*self as u8).ndr_encode(buf, ctx, position)
    }

    fn ndr_size(&self) -> usize {
        1
    }
}

impl NdrDecode for bool {
    fn ndr_decode<B: Buf>(buf: &mut B, ctx: &NdrContext, position: &mut usize) -> Result<Self> {
        Ok(u8::ndr_decode(buf, ctx, position)? != 0)
    }
}

/// GUID: `{ unsigned long Data1; unsigned short Data2, Data3; byte Data4[8]; }`
impl NdrEncode for uuid::Uuid {
    fn ndr_encode<B: BufMut>(
        &self,
        buf: &mut B,
        ctx: &NdrContext,
        position: &mut usize,
    ) -> Result<()> {
        let (data1, data2, data3, data4) = self.as_fields();
        ctx.write_align(buf, position, 4);
        ctx.put_u32(buf, data1);
        ctx.put_u16(buf, data2);
        ctx.put_u16(buf, data3);
        buf.put_slice(data4);
        *position += 16;
        Ok(())
    }

    fn ndr_align() -> usize {
        4
    }

    fn ndr_size(&self) -> usize {
        16
    }
}

impl NdrDecode for uuid::Uuid {
    fn ndr_decode<B: Buf>(buf: &mut B, ctx: &NdrContext, position: &mut usize) -> Result<Self> {
        ctx.read_align(buf, position, 4, 16)?;
        let data1 = ctx.get_u32(buf);
        let data2 = ctx.get_u16(buf);
        let data3 = ctx.get_u16(buf);
        let mut data4 = [0u8; 8];
        buf.copy_to_slice(&mut data4);
        *position += 16;
        Ok(uuid::Uuid::from_fields(data1, data2, data3, &data4))
    }

    fn ndr_align() -> usize {
        4
    }
}
