//! Automation (IDispatch) support
//!
//! Late-bound callers resolve member names to DISPIDs with
//! `get_ids_of_names` and then call `invoke` with the arguments packed as
//! VARIANTs. Arguments arrive right-to-left, the way `DISPPARAMS.rgvarg`
//! stores them: the last declared parameter is `args[0]`.

use crate::error::{ComError, ComResult};
use crate::hresult::HResult;
use crate::ids::{IID_ICOMTEST, IID_NULL};
use async_trait::async_trait;
use dcerpc::Uuid;
use midl_ndr::{vt, BString, Variant};
use std::sync::{Arc, OnceLock};

/// Dispatch identifier
pub type DispId = i32;

/// Slot value for a name GetIDsOfNames could not resolve
pub const DISPID_UNKNOWN: DispId = -1;

pub const DISPID_COMTESTMETHOD: DispId = 1;

/// `wFlags` bits for `invoke`
pub const DISPATCH_METHOD: u16 = 0x1;
pub const DISPATCH_PROPERTYGET: u16 = 0x2;
pub const DISPATCH_PROPERTYPUT: u16 = 0x4;

/// Locale id used when the caller does not care
pub const LOCALE_USER_DEFAULT: u32 = 0x0400;

/// Parameter description
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDesc {
    pub name: &'static str,
    pub vt: u16,
}

/// Member function description
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDesc {
    pub dispid: DispId,
    pub name: &'static str,
    pub params: Vec<ParamDesc>,
    pub ret_vt: u16,
    pub help: &'static str,
}

impl FuncDesc {
    /// Position of a parameter in declaration order
    pub fn param_index(&self, name: &str) -> Option<usize> {
        self.params
            .iter()
            .position(|p| p.name.eq_ignore_ascii_case(name))
    }
}

/// Type information for one dispatch interface
#[derive(Debug, Clone, PartialEq)]
pub struct TypeInfo {
    pub name: &'static str,
    pub iid: Uuid,
    pub doc: &'static str,
    pub funcs: Vec<FuncDesc>,
}

impl TypeInfo {
    /// Shared type information of IComTest
    pub fn icomtest() -> Arc<TypeInfo> {
        static INFO: OnceLock<Arc<TypeInfo>> = OnceLock::new();
        INFO.get_or_init(|| {
            Arc::new(TypeInfo {
                name: "IComTest",
                iid: IID_ICOMTEST,
                doc: "ComTest automation interface",
                funcs: vec![FuncDesc {
                    dispid: DISPID_COMTESTMETHOD,
                    name: "ComTestMethod",
                    params: vec![
                        ParamDesc {
                            name: "radius",
                            vt: vt::VT_R8,
                        },
                        ParamDesc {
                            name: "comment",
                            vt: vt::VT_BSTR,
                        },
                    ],
                    ret_vt: vt::VT_R8,
                    help: "Area of a circle of the given radius",
                }],
            })
        })
        .clone()
    }

    pub fn func(&self, dispid: DispId) -> Option<&FuncDesc> {
        self.funcs.iter().find(|f| f.dispid == dispid)
    }

    pub fn func_by_name(&self, name: &str) -> Option<&FuncDesc> {
        self.funcs.iter().find(|f| f.name.eq_ignore_ascii_case(name))
    }

    /// Map a member name and its parameter names to DISPIDs
    ///
    /// Parameter DISPIDs are their declaration positions.
    pub fn ids_of_names<S: AsRef<str>>(&self, names: &[S]) -> ComResult<Vec<DispId>> {
        let Some(member) = names.first() else {
            return Ok(Vec::new());
        };
        let func = self.func_by_name(member.as_ref());

        let mut ids = Vec::with_capacity(names.len());
        ids.push(func.map_or(DISPID_UNKNOWN, |f| f.dispid));
        for name in &names[1..] {
            let id = func
                .and_then(|f| f.param_index(name.as_ref()))
                .map_or(DISPID_UNKNOWN, |i| i as DispId);
            ids.push(id);
        }

        if ids.contains(&DISPID_UNKNOWN) {
            Err(ComError::UnknownNames(ids))
        } else {
            Ok(ids)
        }
    }

    /// Validate an invoke request and coerce its arguments
    ///
    /// On success returns the member and its arguments in declaration
    /// order, each converted to the declared type.
    pub fn prepare_invoke(
        &self,
        dispid: DispId,
        riid: &Uuid,
        flags: u16,
        params: &DispParams,
    ) -> std::result::Result<(&FuncDesc, Vec<Variant>), InvokeResult> {
        if *riid != IID_NULL {
            return Err(InvokeResult::error(HResult::DISP_E_UNKNOWNINTERFACE));
        }
        let func = self
            .func(dispid)
            .ok_or_else(|| InvokeResult::error(HResult::DISP_E_MEMBERNOTFOUND))?;
        if flags & DISPATCH_METHOD == 0 {
            return Err(InvokeResult::error(HResult::DISP_E_MEMBERNOTFOUND));
        }
        if !params.named_args.is_empty() {
            return Err(InvokeResult::error(HResult::DISP_E_PARAMNOTFOUND));
        }
        if params.args.len() != func.params.len() {
            return Err(InvokeResult::error(HResult::DISP_E_BADPARAMCOUNT));
        }

        let count = params.args.len();
        let mut args = Vec::with_capacity(count);
        for (i, param) in func.params.iter().enumerate() {
            let slot = count - 1 - i;
            let value = coerce(&params.args[slot], param.vt).ok_or_else(|| {
                InvokeResult::arg_error(HResult::DISP_E_TYPEMISMATCH, slot as u32)
            })?;
            args.push(value);
        }
        Ok((func, args))
    }
}

/// Convert an argument to the declared parameter type
fn coerce(value: &Variant, target: u16) -> Option<Variant> {
    match (target, value) {
        (vt::VT_R8, Variant::R8(v)) => Some(Variant::R8(*v)),
        (vt::VT_R8, Variant::R4(v)) => Some(Variant::R8(f64::from(*v))),
        (vt::VT_R8, Variant::I4(v)) => Some(Variant::R8(f64::from(*v))),
        (vt::VT_R8, Variant::I2(v)) => Some(Variant::R8(f64::from(*v))),
        (vt::VT_R8, Variant::UI1(v)) => Some(Variant::R8(f64::from(*v))),
        (vt::VT_BSTR, Variant::Bstr(s)) => Some(Variant::Bstr(s.clone())),
        (vt::VT_BSTR, Variant::Empty) => Some(Variant::Bstr(BString::new(""))),
        _ => None,
    }
}

/// Arguments of an `invoke` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispParams {
    /// Positional arguments, last parameter first
    pub args: Vec<Variant>,
    /// DISPIDs of named arguments
    pub named_args: Vec<DispId>,
}

impl DispParams {
    /// Build from arguments in declaration order
    pub fn positional(mut args: Vec<Variant>) -> Self {
        args.reverse();
        Self {
            args,
            named_args: Vec::new(),
        }
    }
}

/// Outcome of an `invoke` call
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeResult {
    pub hresult: HResult,
    pub result: Variant,
    /// Index into `args` of the argument that failed coercion
    pub arg_err: u32,
}

impl InvokeResult {
    pub fn ok(result: Variant) -> Self {
        Self {
            hresult: HResult::S_OK,
            result,
            arg_err: 0,
        }
    }

    pub fn error(hresult: HResult) -> Self {
        Self {
            hresult,
            result: Variant::Empty,
            arg_err: 0,
        }
    }

    pub fn arg_error(hresult: HResult, arg_err: u32) -> Self {
        Self {
            hresult,
            result: Variant::Empty,
            arg_err,
        }
    }

    pub fn into_result(self) -> ComResult<Variant> {
        if self.hresult.succeeded() {
            Ok(self.result)
        } else {
            Err(ComError::HResult(self.hresult))
        }
    }
}

/// IDispatch
#[async_trait]
pub trait Dispatch: Send + Sync {
    fn get_type_info_count(&self) -> u32 {
        1
    }

    fn get_type_info(&self, index: u32, lcid: u32) -> ComResult<Arc<TypeInfo>>;

    fn get_ids_of_names(&self, riid: &Uuid, names: &[String], lcid: u32)
        -> ComResult<Vec<DispId>>;

    async fn invoke(
        &self,
        dispid: DispId,
        riid: &Uuid,
        lcid: u32,
        flags: u16,
        params: &DispParams,
    ) -> InvokeResult;
}
