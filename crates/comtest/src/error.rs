//! ComTest error types

use crate::automation::DispId;
use crate::hresult::HResult;
use dcerpc::RpcError;
use midl_ndr::NdrError;
use thiserror::Error;

/// Result type for IComTest and IDispatch calls
pub type ComResult<T> = std::result::Result<T, ComError>;

#[derive(Error, Debug)]
pub enum ComError {
    /// Failure status returned by the object
    #[error("call failed: {0}")]
    HResult(HResult),

    /// GetIDsOfNames could not resolve every name; unresolved slots hold
    /// DISPID_UNKNOWN
    #[error("unknown name in {0:?}")]
    UnknownNames(Vec<DispId>),

    #[error("DCE RPC error: {0}")]
    Rpc(#[from] RpcError),

    #[error("NDR error: {0}")]
    Ndr(#[from] NdrError),
}

impl ComError {
    /// The HRESULT a COM caller would observe for this failure
    pub fn hresult(&self) -> HResult {
        match self {
            ComError::HResult(hr) => *hr,
            ComError::UnknownNames(_) => HResult::DISP_E_UNKNOWNNAME,
            ComError::Rpc(e) if e.is_disconnect() => HResult::RPC_E_DISCONNECTED,
            ComError::Rpc(RpcError::Timeout) => HResult::RPC_E_DISCONNECTED,
            ComError::Rpc(RpcError::Truncated(_) | RpcError::InvalidPduData(_)) => {
                HResult::RPC_E_INVALID_DATA
            }
            ComError::Rpc(_) => HResult::RPC_E_SERVERFAULT,
            ComError::Ndr(_) => HResult::RPC_E_INVALID_DATA,
        }
    }
}

impl From<HResult> for ComError {
    fn from(hr: HResult) -> Self {
        ComError::HResult(hr)
    }
}
