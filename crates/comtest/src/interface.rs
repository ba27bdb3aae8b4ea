//! The IComTest contract

use crate::error::ComResult;
use async_trait::async_trait;
use midl_ndr::BString;

/// Operation numbers of the IComTest dual interface vtable
pub mod opnum {
    pub const QUERY_INTERFACE: u16 = 0;
    pub const ADD_REF: u16 = 1;
    pub const RELEASE: u16 = 2;
    pub const GET_TYPE_INFO_COUNT: u16 = 3;
    pub const GET_TYPE_INFO: u16 = 4;
    pub const GET_IDS_OF_NAMES: u16 = 5;
    pub const INVOKE: u16 = 6;
    pub const COM_TEST_METHOD: u16 = 7;
}

/// Automation-compatible test interface
///
/// Implemented locally by [`ComTest`](crate::ComTest) and remotely by
/// [`ComTestProxy`](crate::ComTestProxy).
#[async_trait]
pub trait IComTest: Send + Sync {
    /// `HRESULT ComTestMethod([in] double radius, [in] BSTR comment,
    /// [out, retval] double* ReturnVal)`
    async fn com_test_method(&self, radius: f64, comment: BString) -> ComResult<f64>;
}
