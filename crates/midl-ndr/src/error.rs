//! NDR error types

use thiserror::Error;

/// Largest conformant allocation a decoder will honour
pub const MAX_NDR_ALLOCATION_SIZE: usize = 16 * 1024 * 1024;

/// NDR encoding/decoding errors
#[derive(Debug, Error)]
pub enum NdrError {
    #[error("buffer underflow: needed {needed} bytes, have {have}")]
    BufferUnderflow { needed: usize, have: usize },

    #[error("conformance mismatch: max_count={max_count}, actual_count={actual_count}")]
    ConformanceMismatch { max_count: u32, actual_count: u32 },

    #[error("invalid union discriminant: {0}")]
    InvalidDiscriminant(u32),

    #[error("unsupported VARTYPE 0x{0:04x}")]
    UnsupportedVarType(u16),

    #[error("allocation of {requested} bytes exceeds limit {limit}")]
    AllocationLimitExceeded { requested: usize, limit: usize },

    #[error("{0} trailing bytes after stub data")]
    TrailingData(usize),

    #[error("UTF-16 error: {0}")]
    Utf16Error(#[from] std::char::DecodeUtf16Error),
}

/// Result type for NDR operations
pub type Result<T> = std::result::Result<T, NdrError>;
