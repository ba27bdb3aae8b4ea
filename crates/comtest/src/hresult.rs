//! HRESULT status codes
//!
//! An HRESULT is a 32-bit status: bit 31 is the severity (1 = failure),
//! bits 16-26 the facility and the low word the code.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub u32);

impl HResult {
    pub const S_OK: Self = Self(0x0000_0000);
    pub const S_FALSE: Self = Self(0x0000_0001);

    pub const E_NOTIMPL: Self = Self(0x8000_4001);
    pub const E_NOINTERFACE: Self = Self(0x8000_4002);
    pub const E_POINTER: Self = Self(0x8000_4003);
    pub const E_FAIL: Self = Self(0x8000_4005);
    pub const E_UNEXPECTED: Self = Self(0x8000_FFFF);
    pub const E_INVALIDARG: Self = Self(0x8007_0057);
    pub const E_OUTOFMEMORY: Self = Self(0x8007_000E);

    pub const REGDB_E_CLASSNOTREG: Self = Self(0x8004_0154);
    pub const CLASS_E_NOAGGREGATION: Self = Self(0x8004_0110);

    pub const DISP_E_UNKNOWNINTERFACE: Self = Self(0x8002_0001);
    pub const DISP_E_MEMBERNOTFOUND: Self = Self(0x8002_0003);
    pub const DISP_E_PARAMNOTFOUND: Self = Self(0x8002_0004);
    pub const DISP_E_TYPEMISMATCH: Self = Self(0x8002_0005);
    pub const DISP_E_UNKNOWNNAME: Self = Self(0x8002_0006);
    pub const DISP_E_BADVARTYPE: Self = Self(0x8002_0008);
    pub const DISP_E_EXCEPTION: Self = Self(0x8002_0009);
    pub const DISP_E_BADINDEX: Self = Self(0x8002_000B);
    pub const DISP_E_BADPARAMCOUNT: Self = Self(0x8002_000E);

    pub const RPC_E_DISCONNECTED: Self = Self(0x8001_0108);
    pub const RPC_E_INVALID_DATA: Self = Self(0x8001_000F);
    pub const RPC_E_SERVERFAULT: Self = Self(0x8001_0105);

    /// Severity bit clear
    pub fn succeeded(self) -> bool {
        self.0 & 0x8000_0000 == 0
    }

    pub fn failed(self) -> bool {
        !self.succeeded()
    }

    pub fn facility(self) -> u16 {
        ((self.0 >> 16) & 0x1FFF) as u16
    }

    pub fn code(self) -> u16 {
        self.0 as u16
    }

    /// Symbolic name, when the code is one of the constants above
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::S_OK => "S_OK",
            Self::S_FALSE => "S_FALSE",
            Self::E_NOTIMPL => "E_NOTIMPL",
            Self::E_NOINTERFACE => "E_NOINTERFACE",
            Self::E_POINTER => "E_POINTER",
            Self::E_FAIL => "E_FAIL",
            Self::E_UNEXPECTED => "E_UNEXPECTED",
            Self::E_INVALIDARG => "E_INVALIDARG",
            Self::E_OUTOFMEMORY => "E_OUTOFMEMORY",
            Self::REGDB_E_CLASSNOTREG => "REGDB_E_CLASSNOTREG",
            Self::CLASS_E_NOAGGREGATION => "CLASS_E_NOAGGREGATION",
            Self::DISP_E_UNKNOWNINTERFACE => "DISP_E_UNKNOWNINTERFACE",
            Self::DISP_E_MEMBERNOTFOUND => "DISP_E_MEMBERNOTFOUND",
            Self::DISP_E_PARAMNOTFOUND => "DISP_E_PARAMNOTFOUND",
            Self::DISP_E_TYPEMISMATCH => "DISP_E_TYPEMISMATCH",
            Self::DISP_E_UNKNOWNNAME => "DISP_E_UNKNOWNNAME",
            Self::DISP_E_BADVARTYPE => "DISP_E_BADVARTYPE",
            Self::DISP_E_EXCEPTION => "DISP_E_EXCEPTION",
            Self::DISP_E_BADINDEX => "DISP_E_BADINDEX",
            Self::DISP_E_BADPARAMCOUNT => "DISP_E_BADPARAMCOUNT",
            Self::RPC_E_DISCONNECTED => "RPC_E_DISCONNECTED",
            Self::RPC_E_INVALID_DATA => "RPC_E_INVALID_DATA",
            Self::RPC_E_SERVERFAULT => "RPC_E_SERVERFAULT",
            _ => return None,
        })
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "0x{:08X} ({})", self.0, name),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl From<u32> for HResult {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<HResult> for u32 {
    fn from(value: HResult) -> Self {
        value.0
    }
}
