//! ComTest automation component
//!
//! One dual interface, `IComTest`, with a single method:
//!
//! ```text
//! HRESULT ComTestMethod([in] double radius, [in] BSTR comment,
//!                       [out, retval] double* ReturnVal);
//! ```
//!
//! implemented by the `ComTest` class and carried over connection-oriented
//! DCE RPC by a stub/proxy pair. Late-bound callers use the IDispatch
//! surface (type info, GetIDsOfNames, Invoke).
//!
//! ```text
//! ComTestProxy ──NDR──▶ DceRpcClient ══TCP══▶ DceRpcServer ──▶ stub ──▶ ComTest
//! ```
//!
//! # Example
//!
//! ```no_run
//! use comtest::{BString, ComTestProxy, IComTest};
//!
//! # async fn example() -> comtest::ComResult<()> {
//! let proxy = ComTestProxy::connect("127.0.0.1:5150".parse().unwrap()).await?;
//! let area = proxy.com_test_method(2.0, BString::new("hello")).await?;
//! println!("area = {area}");
//! # Ok(())
//! # }
//! ```

pub mod activation;
pub mod automation;
pub mod hresult;
pub mod ids;
pub mod interface;
pub mod registration;

mod config;
mod error;
mod object;
mod proxy;
mod server;
mod stub;

pub use activation::{ClassFactory, ClassRegistry, ComServerObject};
pub use automation::{
    DispId, DispParams, Dispatch, FuncDesc, InvokeResult, ParamDesc, TypeInfo, DISPATCH_METHOD,
    DISPID_COMTESTMETHOD, DISPID_UNKNOWN,
};
pub use com_test::ComTest;
pub use config::{ComTestServerConfig, DEFAULT_PORT};
pub use error::{ComError, ComResult};
pub use hresult::HResult;
pub use ids::{
    icomtest_syntax, CLSID_COMTEST, IID_ICOMTEST, IID_IDISPATCH, IID_IUNKNOWN, IID_NULL,
    LIBID_COMTESTLIBRARY,
};
pub use interface::IComTest;
pub use object::{ComObject, RefCount};
pub use proxy::ComTestProxy;
pub use registration::{register_server, unregister_server, RegistryStore, TypeLibRegistration};
pub use server::ComTestServer;
pub use stub::create_icomtest_interface;

pub use midl_ndr::{BString, Variant};
