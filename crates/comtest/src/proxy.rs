//! Client proxy for IComTest
//!
//! Marshals calls into NDR stubs, sends them over a bound DCE RPC client
//! and turns the trailing HRESULT of each reply back into a `ComResult`.

use crate::automation::{DispId, DispParams, InvokeResult, TypeInfo};
use crate::error::{ComError, ComResult};
use crate::hresult::HResult;
use crate::ids::icomtest_syntax;
use crate::interface::{opnum, IComTest};
use async_trait::async_trait;
use bytes::Bytes;
use dcerpc::{DceRpcClient, DceRpcClientBuilder, Uuid};
use midl_ndr::{BString, ConformantArray, NdrReader, NdrWriter, Variant};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// Remote IComTest reached over DCE RPC
pub struct ComTestProxy<S = TcpStream> {
    client: DceRpcClient<S>,
}

impl ComTestProxy<TcpStream> {
    /// Connect and bind to IComTest at `addr`
    pub async fn connect(addr: SocketAddr) -> ComResult<Self> {
        Self::connect_with(DceRpcClientBuilder::from_syntax(icomtest_syntax()), addr).await
    }

    /// Connect with a connect/bind timeout
    pub async fn connect_timeout(addr: SocketAddr, timeout: Duration) -> ComResult<Self> {
        let builder = DceRpcClientBuilder::from_syntax(icomtest_syntax()).timeout(timeout);
        Self::connect_with(builder, addr).await
    }

    pub async fn connect_with(builder: DceRpcClientBuilder, addr: SocketAddr) -> ComResult<Self> {
        let client = builder.connect(addr).await?;
        debug!("Bound to IComTest at {}", addr);
        Ok(Self { client })
    }
}

impl<S: AsyncRead + AsyncWrite + Send + 'static> ComTestProxy<S> {
    /// Wrap a client already bound to IComTest
    pub fn new(client: DceRpcClient<S>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &DceRpcClient<S> {
        &self.client
    }

    async fn call(&self, opnum: u16, writer: NdrWriter) -> ComResult<NdrReader> {
        let reply = self.client.call(opnum, writer.into_bytes()).await?;
        Ok(NdrReader::new(reply))
    }

    pub async fn get_type_info_count(&self) -> ComResult<u32> {
        let mut reply = self.call(opnum::GET_TYPE_INFO_COUNT, NdrWriter::new()).await?;
        let count = reply.read::<u32>()?;
        check(reply.read::<u32>()?)?;
        reply.finish()?;
        Ok(count)
    }

    /// Remote ITypeInfo is not marshaled; a successful reply yields the
    /// locally known description
    pub async fn get_type_info(&self, index: u32, lcid: u32) -> ComResult<Arc<TypeInfo>> {
        let mut writer = NdrWriter::new();
        writer.write(&index)?.write(&lcid)?;
        let mut reply = self.call(opnum::GET_TYPE_INFO, writer).await?;
        let _pointer = reply.read::<u32>()?;
        check(reply.read::<u32>()?)?;
        reply.finish()?;
        Ok(TypeInfo::icomtest())
    }

    pub async fn get_ids_of_names(
        &self,
        riid: &Uuid,
        names: &[&str],
        lcid: u32,
    ) -> ComResult<Vec<DispId>> {
        let names = ConformantArray::new(names.iter().map(|n| BString::new(n)).collect());
        let mut writer = NdrWriter::new();
        writer
            .write(&uuid::Uuid::from(*riid))?
            .write(&names)?
            .write(&lcid)?;

        let mut reply = self.call(opnum::GET_IDS_OF_NAMES, writer).await?;
        let ids = reply.read::<ConformantArray<i32>>()?.into_inner();
        let hr = HResult(reply.read::<u32>()?);
        reply.finish()?;
        match hr {
            HResult::DISP_E_UNKNOWNNAME => Err(ComError::UnknownNames(ids)),
            hr if hr.failed() => Err(ComError::HResult(hr)),
            _ => Ok(ids),
        }
    }

    /// Late-bound call; the outcome carries the remote HRESULT
    pub async fn invoke(
        &self,
        dispid: DispId,
        riid: &Uuid,
        lcid: u32,
        flags: u16,
        params: &DispParams,
    ) -> ComResult<InvokeResult> {
        if !params.named_args.is_empty() {
            return Ok(InvokeResult::error(HResult::DISP_E_PARAMNOTFOUND));
        }

        let mut writer = NdrWriter::new();
        writer
            .write(&dispid)?
            .write(&uuid::Uuid::from(*riid))?
            .write(&lcid)?
            .write(&u32::from(flags))?
            .write(&ConformantArray::new(params.args.clone()))?;

        let mut reply = self.call(opnum::INVOKE, writer).await?;
        let result = reply.read::<Variant>()?;
        let arg_err = reply.read::<u32>()?;
        let hresult = HResult(reply.read::<u32>()?);
        reply.finish()?;
        Ok(InvokeResult {
            hresult,
            result,
            arg_err,
        })
    }

    /// Send a raw stub to an opnum
    pub async fn call_raw(&self, opnum: u16, stub: Bytes) -> ComResult<Bytes> {
        Ok(self.client.call(opnum, stub).await?)
    }
}

fn check(raw: u32) -> ComResult<()> {
    let hr = HResult(raw);
    if hr.succeeded() {
        Ok(())
    } else {
        Err(ComError::HResult(hr))
    }
}

#[async_trait]
impl<S: AsyncRead + AsyncWrite + Send + 'static> IComTest for ComTestProxy<S> {
    async fn com_test_method(&self, radius: f64, comment: BString) -> ComResult<f64> {
        let mut writer = NdrWriter::new();
        writer.write(&radius)?.write(&comment)?;

        let mut reply = self.call(opnum::COM_TEST_METHOD, writer).await?;
        let area = reply.read::<f64>()?;
        check(reply.read::<u32>()?)?;
        reply.finish()?;
        Ok(area)
    }
}
