//! Server stub for IComTest
//!
//! Unmarshals each request, calls the object and marshals the out
//! parameters followed by the HRESULT. A request that does not unmarshal
//! is answered with `RPC_E_INVALID_DATA` instead of a fault, so the
//! association stays usable.
//!
//! IUnknown (opnums 0-2) is not served: remote reference counting and
//! interface queries go through IRemUnknown in DCOM.

use crate::activation::ComServerObject;
use crate::automation::{DispId, DispParams, InvokeResult, DISPID_UNKNOWN};
use crate::error::ComError;
use crate::hresult::HResult;
use crate::ids::icomtest_syntax;
use crate::interface::opnum;
use bytes::Bytes;
use dcerpc::{Interface, InterfaceBuilder, RpcError, Uuid};
use midl_ndr::{BString, ConformantArray, NdrError, NdrReader, NdrWriter, Variant};
use std::sync::Arc;
use tracing::{debug, warn};

/// Build the DCE RPC interface that serves `object`
pub fn create_icomtest_interface(object: Arc<dyn ComServerObject>) -> Interface {
    let count_obj = object.clone();
    let info_obj = object.clone();
    let names_obj = object.clone();
    let invoke_obj = object.clone();
    let method_obj = object;

    InterfaceBuilder::from_syntax(icomtest_syntax())
        .operation(opnum::GET_TYPE_INFO_COUNT, move |stub| {
            let object = count_obj.clone();
            async move { get_type_info_count(object, stub) }
        })
        .operation(opnum::GET_TYPE_INFO, move |stub| {
            let object = info_obj.clone();
            async move { get_type_info(object, stub) }
        })
        .operation(opnum::GET_IDS_OF_NAMES, move |stub| {
            let object = names_obj.clone();
            async move { get_ids_of_names(object, stub) }
        })
        .operation(opnum::INVOKE, move |stub| {
            let object = invoke_obj.clone();
            async move { invoke(object, stub).await }
        })
        .operation(opnum::COM_TEST_METHOD, move |stub| {
            let object = method_obj.clone();
            async move { com_test_method(object, stub).await }
        })
        .build()
}

fn decode_get_type_info(stub: Bytes) -> midl_ndr::Result<(u32, u32)> {
    let mut reader = NdrReader::new(stub);
    let index = reader.read::<u32>()?;
    let lcid = reader.read::<u32>()?;
    reader.finish()?;
    Ok((index, lcid))
}

fn decode_get_ids_of_names(stub: Bytes) -> midl_ndr::Result<(Uuid, Vec<BString>, u32)> {
    let mut reader = NdrReader::new(stub);
    let riid = Uuid::from(reader.read::<uuid::Uuid>()?);
    let names = reader.read::<ConformantArray<BString>>()?;
    let lcid = reader.read::<u32>()?;
    reader.finish()?;
    Ok((riid, names.into_inner(), lcid))
}

type InvokeArgs = (DispId, Uuid, u32, u32, Vec<Variant>);

fn decode_invoke(stub: Bytes) -> midl_ndr::Result<InvokeArgs> {
    let mut reader = NdrReader::new(stub);
    let dispid = reader.read::<i32>()?;
    let riid = Uuid::from(reader.read::<uuid::Uuid>()?);
    let lcid = reader.read::<u32>()?;
    let flags = reader.read::<u32>()?;
    let args = reader.read::<ConformantArray<Variant>>()?;
    reader.finish()?;
    Ok((dispid, riid, lcid, flags, args.into_inner()))
}

fn decode_com_test_method(stub: Bytes) -> midl_ndr::Result<(f64, BString)> {
    let mut reader = NdrReader::new(stub);
    let radius = reader.read::<f64>()?;
    let comment = reader.read::<BString>()?;
    reader.finish()?;
    Ok((radius, comment))
}

fn marshal_error(e: NdrError) -> RpcError {
    RpcError::InvalidPduData(format!("marshaling reply: {e}"))
}

fn rejected(op: &str, e: &NdrError) -> HResult {
    warn!("{}: malformed request: {}", op, e);
    HResult::RPC_E_INVALID_DATA
}

fn get_type_info_count(object: Arc<dyn ComServerObject>, _stub: Bytes) -> dcerpc::Result<Bytes> {
    let count = object.get_type_info_count();
    let mut writer = NdrWriter::new();
    writer
        .write(&count)
        .and_then(|w| w.write(&HResult::S_OK.0))
        .map_err(marshal_error)?;
    Ok(writer.into_bytes())
}

fn get_type_info(object: Arc<dyn ComServerObject>, stub: Bytes) -> dcerpc::Result<Bytes> {
    let decoded = decode_get_type_info(stub);

    // an ITypeInfo cannot be marshaled without object references
    let hr = match decoded {
        Ok((index, lcid)) => match object.get_type_info(index, lcid) {
            Ok(_) => HResult::E_NOTIMPL,
            Err(e) => e.hresult(),
        },
        Err(e) => rejected("GetTypeInfo", &e),
    };

    let mut writer = NdrWriter::new();
    writer
        .write(&0u32)
        .and_then(|w| w.write(&hr.0))
        .map_err(marshal_error)?;
    Ok(writer.into_bytes())
}

fn get_ids_of_names(object: Arc<dyn ComServerObject>, stub: Bytes) -> dcerpc::Result<Bytes> {
    let decoded = decode_get_ids_of_names(stub);

    let (ids, hr): (Vec<DispId>, HResult) = match decoded {
        Ok((riid, names, lcid)) => {
            let names: Vec<String> = names.iter().map(BString::to_string_lossy).collect();
            debug!("GetIDsOfNames {:?}", names);
            match object.get_ids_of_names(&riid, &names, lcid) {
                Ok(ids) => (ids, HResult::S_OK),
                Err(ComError::UnknownNames(ids)) => (ids, HResult::DISP_E_UNKNOWNNAME),
                Err(e) => (vec![DISPID_UNKNOWN; names.len()], e.hresult()),
            }
        }
        Err(e) => (Vec::new(), rejected("GetIDsOfNames", &e)),
    };

    let mut writer = NdrWriter::new();
    writer
        .write(&ConformantArray::new(ids))
        .and_then(|w| w.write(&hr.0))
        .map_err(marshal_error)?;
    Ok(writer.into_bytes())
}

async fn invoke(object: Arc<dyn ComServerObject>, stub: Bytes) -> dcerpc::Result<Bytes> {
    let decoded = decode_invoke(stub);

    let outcome = match decoded {
        Ok((dispid, riid, lcid, flags, args)) => {
            // flags wider than a WORD name no dispatch kind we know
            let flags = u16::try_from(flags).unwrap_or(0);
            let params = DispParams {
                args,
                named_args: Vec::new(),
            };
            object.invoke(dispid, &riid, lcid, flags, &params).await
        }
        Err(e) => InvokeResult::error(rejected("Invoke", &e)),
    };

    let mut writer = NdrWriter::new();
    writer
        .write(&outcome.result)
        .and_then(|w| w.write(&outcome.arg_err))
        .and_then(|w| w.write(&outcome.hresult.0))
        .map_err(marshal_error)?;
    Ok(writer.into_bytes())
}

async fn com_test_method(
    object: Arc<dyn ComServerObject>,
    stub: Bytes,
) -> dcerpc::Result<Bytes> {
    let decoded = decode_com_test_method(stub);

    let (area, hr) = match decoded {
        Ok((radius, comment)) => match object.com_test_method(radius, comment).await {
            Ok(area) => (area, HResult::S_OK),
            Err(e) => (0.0, e.hresult()),
        },
        Err(e) => (0.0, rejected("ComTestMethod", &e)),
    };

    let mut writer = NdrWriter::new();
    writer
        .write(&area)
        .and_then(|w| w.write(&hr.0))
        .map_err(marshal_error)?;
    Ok(writer.into_bytes())
}
