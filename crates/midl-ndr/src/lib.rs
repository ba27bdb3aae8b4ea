//! NDR (Network Data Representation) runtime library
//!
//! Marshaling support for DCE RPC stub data as specified in C706 chapter 14
//! and MS-RPCE, plus the automation types from MS-OAUT (BSTR, VARIANT).
//!
//! # NDR Wire Format
//!
//! - Primitives align to their natural size (1, 2, 4, or 8 bytes)
//! - Alignment is relative to the start of the stub data
//! - Conformant data carries its element count up front
//! - Unique pointers are a referent id (0 = NULL) followed by the pointee

mod arrays;
mod bstr;
mod context;
mod decode;
mod encode;
mod error;
mod primitives;
mod stub;
mod variant;

pub use arrays::ConformantArray;
pub use bstr::BString;
pub use context::NdrContext;
pub use decode::NdrDecode;
pub use encode::NdrEncode;
pub use error::{NdrError, Result, MAX_NDR_ALLOCATION_SIZE};
pub use stub::{NdrReader, NdrWriter};
pub use variant::{vt, Variant, VARIANT_FALSE, VARIANT_TRUE};

/// Re-export bytes for convenience
pub use bytes::{Buf, BufMut, Bytes, BytesMut};
