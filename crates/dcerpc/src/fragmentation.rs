//! Multi-PDU fragmentation (C706 section 12.5)
//!
//! Stub data larger than the negotiated `max_xmit_frag` is split over
//! several request or response PDUs that share a call_id. The first one
//! carries FIRST_FRAG, the last one LAST_FRAG, and every fragment's
//! alloc_hint announces the total stub length.
//!
//! ```text
//! max_frag (e.g. 4280 bytes)
//! ├── PDU header (16 bytes)
//! ├── request/response body header (8 bytes)
//! ├── object UUID (16 bytes, optional, request only)
//! └── stub data fragment
//! ```

use crate::dcerpc::{PacketFlags, PduHeader, RequestPdu, ResponsePdu, Uuid};
use crate::error::{Result, RpcError};
use bytes::{Bytes, BytesMut};

/// Upper bound for a reassembled stub, whatever alloc_hint claims
pub const MAX_ASSEMBLED_STUB: usize = 16 * 1024 * 1024;

/// Splits outgoing stub data into fragments
pub struct FragmentGenerator;

impl FragmentGenerator {
    /// Bytes of stub data that fit in one fragment of `max_frag` bytes
    pub fn max_stub_size(max_frag: u16, has_object_uuid: bool) -> usize {
        let object_uuid_size = if has_object_uuid { Uuid::SIZE } else { 0 };
        let overhead = PduHeader::SIZE + RequestPdu::BODY_HEADER_SIZE + object_uuid_size;
        (max_frag as usize).saturating_sub(overhead)
    }

    /// Cut `stub` into chunks of at most `max_stub` bytes and pair each
    /// with its fragment flags. Empty stub data still yields one fragment.
    fn split(stub: &Bytes, max_stub: usize) -> Vec<(PacketFlags, Bytes)> {
        if stub.len() <= max_stub || max_stub == 0 {
            return vec![(PacketFlags::complete(), stub.clone())];
        }

        let total = stub.len();
        (0..total)
            .step_by(max_stub)
            .map(|offset| {
                let end = (offset + max_stub).min(total);
                let flags = PacketFlags::fragment(offset == 0, end == total);
                (flags, stub.slice(offset..end))
            })
            .collect()
    }

    pub fn fragment_request(request: &RequestPdu, max_frag: u16) -> Vec<RequestPdu> {
        let max_stub = Self::max_stub_size(max_frag, request.object_uuid.is_some());
        let total = request.stub_data.len() as u32;

        Self::split(&request.stub_data, max_stub)
            .into_iter()
            .map(|(flags, chunk)| {
                let mut frag = request.clone();
                frag.header.packet_flags = flags;
                frag.alloc_hint = total;
                frag.stub_data = chunk;
                frag
            })
            .collect()
    }

    pub fn fragment_response(response: &ResponsePdu, max_frag: u16) -> Vec<ResponsePdu> {
        let max_stub = Self::max_stub_size(max_frag, false);
        let total = response.stub_data.len() as u32;

        Self::split(&response.stub_data, max_stub)
            .into_iter()
            .map(|(flags, chunk)| {
                let mut frag = response.clone();
                frag.header.packet_flags = flags;
                frag.alloc_hint = total;
                frag.stub_data = chunk;
                frag
            })
            .collect()
    }
}

/// Reassembles the stub data of one fragmented call
pub struct FragmentAssembler {
    call_id: u32,
    stub_data: BytesMut,
    context_id: u16,
    opnum: Option<u16>,
    received_first: bool,
    received_last: bool,
}

impl FragmentAssembler {
    pub fn new(call_id: u32) -> Self {
        Self {
            call_id,
            stub_data: BytesMut::new(),
            context_id: 0,
            opnum: None,
            received_first: false,
            received_last: false,
        }
    }

    pub fn call_id(&self) -> u32 {
        self.call_id
    }

    pub fn context_id(&self) -> u16 {
        self.context_id
    }

    pub fn opnum(&self) -> Option<u16> {
        self.opnum
    }

    pub fn is_complete(&self) -> bool {
        self.received_first && self.received_last
    }

    /// Feed one fragment.
    ///
    /// Returns `Ok(Some(stub))` once LAST_FRAG arrives, `Ok(None)` while
    /// more fragments are expected.
    pub fn add_fragment(
        &mut self,
        header: &PduHeader,
        stub: &[u8],
        ctx_id: u16,
        opnum: Option<u16>,
        alloc_hint: u32,
    ) -> Result<Option<Bytes>> {
        if header.call_id != self.call_id {
            return Err(RpcError::CallIdMismatch {
                expected: self.call_id,
                got: header.call_id,
            });
        }

        if header.packet_flags.is_first_frag() {
            if self.received_first {
                return Err(RpcError::FragmentAssembly(
                    "duplicate first fragment".to_string(),
                ));
            }
            self.received_first = true;
            self.context_id = ctx_id;
            self.opnum = opnum;
            self.stub_data
                .reserve((alloc_hint as usize).min(MAX_ASSEMBLED_STUB));
        } else if !self.received_first {
            return Err(RpcError::FragmentAssembly(
                "fragment arrived before FIRST_FRAG".to_string(),
            ));
        }

        if self.received_last {
            return Err(RpcError::FragmentAssembly(
                "fragment arrived after LAST_FRAG".to_string(),
            ));
        }
        if ctx_id != self.context_id {
            return Err(RpcError::ContextMismatch);
        }
        if opnum.is_some() && opnum != self.opnum {
            return Err(RpcError::FragmentAssembly(format!(
                "opnum changed mid-call: {:?} -> {:?}",
                self.opnum, opnum
            )));
        }
        if self.stub_data.len() + stub.len() > MAX_ASSEMBLED_STUB {
            return Err(RpcError::RecordTooLarge {
                size: self.stub_data.len() + stub.len(),
                max: MAX_ASSEMBLED_STUB,
            });
        }

        self.stub_data.extend_from_slice(stub);

        if header.packet_flags.is_last_frag() {
            self.received_last = true;
            return Ok(Some(self.stub_data.split().freeze()));
        }
        Ok(None)
    }

    /// Start over for a new call
    pub fn reset(&mut self, call_id: u32) {
        self.call_id = call_id;
        self.stub_data.clear();
        self.context_id = 0;
        self.opnum = None;
        self.received_first = false;
        self.received_last = false;
    }
}
