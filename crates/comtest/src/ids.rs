//! Identity metadata for the ComTest component

use dcerpc::{SyntaxId, Uuid};

/// IComTest interface identifier
pub const IID_ICOMTEST: Uuid = Uuid::from_u128(0x1B31B683_F0AA_4E71_8F50_F2D2E5E9E210);

/// ComTest class identifier
pub const CLSID_COMTEST: Uuid = Uuid::from_u128(0x71AD0B2F_E5D0_4272_A4FD_18F707D5E0D6);

/// ComTest type library identifier
pub const LIBID_COMTESTLIBRARY: Uuid = Uuid::from_u128(0x47A20781_26AD_465F_BDA9_AC59CEA74B69);

pub const IID_IUNKNOWN: Uuid = Uuid::from_u128(0x00000000_0000_0000_C000_000000000046);

pub const IID_IDISPATCH: Uuid = Uuid::from_u128(0x00020400_0000_0000_C000_000000000046);

/// The "no interface" GUID passed as `riid` to IDispatch methods
pub const IID_NULL: Uuid = Uuid::NIL;

/// COM interfaces are versioned by IID alone
pub const INTERFACE_VERSION: (u16, u16) = (0, 0);

/// Type library version
pub const TYPELIB_VERSION: (u16, u16) = (1, 0);

/// Presentation syntax used to bind to IComTest
pub fn icomtest_syntax() -> SyntaxId {
    SyntaxId::new(IID_ICOMTEST, INTERFACE_VERSION.0, INTERFACE_VERSION.1)
}
