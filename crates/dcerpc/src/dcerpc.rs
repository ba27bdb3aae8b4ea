//! DCE RPC PDU (Protocol Data Unit) types
//!
//! Connection-oriented wire format as defined in:
//! - DCE 1.1: Remote Procedure Call (C706), chapter 12
//! - MS-RPCE: Remote Procedure Call Protocol Extensions
//!
//! Common header:
//! ```text
//! +--------+--------+--------+--------+
//! |  vers  |vers_min| ptype  | pflags |
//! +--------+--------+--------+--------+
//! |        data representation        |
//! +--------+--------+--------+--------+
//! |   frag_len      |   auth_len      |
//! +--------+--------+--------+--------+
//! |             call_id               |
//! +--------+--------+--------+--------+
//! ```
//!
//! Only the PDUs an unauthenticated association needs are modelled:
//! bind, bind_ack, request, response and fault.

use crate::error::{Result, RpcError};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;

/// DCE RPC protocol version
pub const DCE_RPC_VERSION: u8 = 5;
/// DCE RPC protocol minor version
pub const DCE_RPC_VERSION_MINOR: u8 = 0;

/// Default fragment size offered during bind
pub const DEFAULT_MAX_FRAG: u16 = 4280;

/// NDR transfer syntax UUID
pub const NDR_SYNTAX_UUID: Uuid = Uuid::from_u128(0x8a885d04_1ceb_11c9_9fe8_08002b104860);
/// NDR transfer syntax version
pub const NDR_SYNTAX_VERSION: u32 = 2;

/// DCE RPC packet types (connection-oriented subset)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PacketType {
    Request = 0,
    Response = 2,
    Fault = 3,
    Bind = 11,
    BindAck = 12,
    BindNak = 13,
    AlterContext = 14,
    AlterContextResp = 15,
    Auth3 = 16,
    Shutdown = 17,
    CoCancel = 18,
    Orphaned = 19,
}

impl PacketType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Request),
            2 => Some(Self::Response),
            3 => Some(Self::Fault),
            11 => Some(Self::Bind),
            12 => Some(Self::BindAck),
            13 => Some(Self::BindNak),
            14 => Some(Self::AlterContext),
            15 => Some(Self::AlterContextResp),
            16 => Some(Self::Auth3),
            17 => Some(Self::Shutdown),
            18 => Some(Self::CoCancel),
            19 => Some(Self::Orphaned),
            _ => None,
        }
    }
}

/// Packet flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketFlags(u8);

impl PacketFlags {
    pub const FIRST_FRAG: u8 = 0x01;
    pub const LAST_FRAG: u8 = 0x02;
    pub const PENDING_CANCEL: u8 = 0x04;
    pub const CONC_MPX: u8 = 0x10;
    pub const DID_NOT_EXECUTE: u8 = 0x20;
    pub const MAYBE: u8 = 0x40;
    /// Object UUID follows the request body header
    pub const OBJECT_UUID: u8 = 0x80;

    pub fn new() -> Self {
        Self(0)
    }

    /// Flags for a PDU that is not fragmented
    pub fn complete() -> Self {
        Self(Self::FIRST_FRAG | Self::LAST_FRAG)
    }

    /// Flags for fragment `first`/`last` of a fragmented PDU
    pub fn fragment(first: bool, last: bool) -> Self {
        let mut bits = 0;
        if first {
            bits |= Self::FIRST_FRAG;
        }
        if last {
            bits |= Self::LAST_FRAG;
        }
        Self(bits)
    }

    pub fn is_first_frag(&self) -> bool {
        (self.0 & Self::FIRST_FRAG) != 0
    }

    pub fn is_last_frag(&self) -> bool {
        (self.0 & Self::LAST_FRAG) != 0
    }

    pub fn has(&self, flag: u8) -> bool {
        (self.0 & flag) != 0
    }

    pub fn with(self, flag: u8) -> Self {
        Self(self.0 | flag)
    }

    pub fn as_u8(&self) -> u8 {
        self.0
    }

    pub fn from_u8(value: u8) -> Self {
        Self(value)
    }
}

/// Integer representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntRep {
    BigEndian = 0,
    LittleEndian = 1,
}

/// Character representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharRep {
    Ascii = 0,
    Ebcdic = 1,
}

/// Floating point representation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatRep {
    Ieee = 0,
    Vax = 1,
    Cray = 2,
    Ibm = 3,
}

/// Data representation format label (MS-RPCE 2.2.2.3)
///
/// Byte 0 carries the integer representation in its upper nibble and the
/// character set in its lower nibble, byte 1 the floating point format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataRepresentation {
    pub int_rep: IntRep,
    pub char_rep: CharRep,
    pub float_rep: FloatRep,
}

impl DataRepresentation {
    /// Little-endian, ASCII, IEEE
    pub fn ndr() -> Self {
        Self {
            int_rep: IntRep::LittleEndian,
            char_rep: CharRep::Ascii,
            float_rep: FloatRep::Ieee,
        }
    }

    pub fn big_endian() -> Self {
        Self {
            int_rep: IntRep::BigEndian,
            ..Self::ndr()
        }
    }

    pub fn encode(&self) -> [u8; 4] {
        let byte0 = (self.char_rep as u8) | ((self.int_rep as u8) << 4);
        [byte0, self.float_rep as u8, 0, 0]
    }

    pub fn decode(data: [u8; 4]) -> Self {
        let int_rep = if (data[0] & 0xF0) == 0 {
            IntRep::BigEndian
        } else {
            IntRep::LittleEndian
        };
        let char_rep = if (data[0] & 0x0F) == 0 {
            CharRep::Ascii
        } else {
            CharRep::Ebcdic
        };
        let float_rep = match data[1] {
            0 => FloatRep::Ieee,
            1 => FloatRep::Vax,
            2 => FloatRep::Cray,
            _ => FloatRep::Ibm,
        };
        Self {
            int_rep,
            char_rep,
            float_rep,
        }
    }

    pub fn is_little_endian(&self) -> bool {
        self.int_rep == IntRep::LittleEndian
    }

    fn order(&self) -> WireOrder {
        WireOrder {
            little_endian: self.is_little_endian(),
        }
    }
}

impl Default for DataRepresentation {
    fn default() -> Self {
        Self::ndr()
    }
}

/// Byte-order aware put/get helpers for PDU bodies
#[derive(Debug, Clone, Copy)]
struct WireOrder {
    little_endian: bool,
}

impl WireOrder {
    fn put_u16(&self, buf: &mut BytesMut, value: u16) {
        if self.little_endian {
            buf.put_u16_le(value)
        } else {
            buf.put_u16(value)
        }
    }

    fn put_u32(&self, buf: &mut BytesMut, value: u32) {
        if self.little_endian {
            buf.put_u32_le(value)
        } else {
            buf.put_u32(value)
        }
    }

    fn get_u16(&self, cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u16> {
        need(cursor, 2, what)?;
        Ok(if self.little_endian {
            cursor.get_u16_le()
        } else {
            cursor.get_u16()
        })
    }

    fn get_u32(&self, cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u32> {
        need(cursor, 4, what)?;
        Ok(if self.little_endian {
            cursor.get_u32_le()
        } else {
            cursor.get_u32()
        })
    }

    fn get_u8(&self, cursor: &mut Cursor<&[u8]>, what: &str) -> Result<u8> {
        need(cursor, 1, what)?;
        Ok(cursor.get_u8())
    }
}

fn need(cursor: &Cursor<&[u8]>, n: usize, what: &str) -> Result<()> {
    if cursor.remaining() < n {
        return Err(RpcError::Truncated(what.to_string()));
    }
    Ok(())
}

fn pad_to_4(buf: &mut BytesMut) {
    while buf.len() % 4 != 0 {
        buf.put_u8(0);
    }
}

/// UUID / GUID (128 bits) in DCE field layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, PartialOrd, Ord)]
pub struct Uuid {
    pub time_low: u32,
    pub time_mid: u16,
    pub time_hi_and_version: u16,
    pub clock_seq_hi_and_reserved: u8,
    pub clock_seq_low: u8,
    pub node: [u8; 6],
}

impl Uuid {
    /// Nil UUID (all zeros)
    pub const NIL: Self = Self::from_u128(0);

    /// Encoded size in bytes
    pub const SIZE: usize = 16;

    /// Build from the 128-bit big-endian integer form of the textual UUID,
    /// e.g. `0x1B31B683_F0AA_4E71_8F50_F2D2E5E9E210`.
    pub const fn from_u128(v: u128) -> Self {
        Self {
            time_low: (v >> 96) as u32,
            time_mid: (v >> 80) as u16,
            time_hi_and_version: (v >> 64) as u16,
            clock_seq_hi_and_reserved: (v >> 56) as u8,
            clock_seq_low: (v >> 48) as u8,
            node: [
                (v >> 40) as u8,
                (v >> 32) as u8,
                (v >> 24) as u8,
                (v >> 16) as u8,
                (v >> 8) as u8,
                v as u8,
            ],
        }
    }

    /// Parse `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx`, optionally wrapped in
    /// braces. Hex digits are case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        let inner = match s.strip_prefix('{') {
            Some(rest) => rest.strip_suffix('}')?,
            None => s,
        };
        if inner.len() != 36 {
            return None;
        }
        uuid::Uuid::parse_str(inner).ok().map(Self::from)
    }

    /// Generate a random v4 UUID
    pub fn generate() -> Self {
        Self::from(uuid::Uuid::new_v4())
    }

    pub fn is_nil(&self) -> bool {
        *self == Self::NIL
    }

    /// Uppercase braced form, as used in registry key paths:
    /// `{1B31B683-F0AA-4E71-8F50-F2D2E5E9E210}`
    pub fn to_registry_string(&self) -> String {
        format!("{{{}}}", self).to_uppercase()
    }

    pub fn encode(&self, buf: &mut BytesMut, little_endian: bool) {
        if little_endian {
            buf.put_u32_le(self.time_low);
            buf.put_u16_le(self.time_mid);
            buf.put_u16_le(self.time_hi_and_version);
        } else {
            buf.put_u32(self.time_low);
            buf.put_u16(self.time_mid);
            buf.put_u16(self.time_hi_and_version);
        }
        buf.put_u8(self.clock_seq_hi_and_reserved);
        buf.put_u8(self.clock_seq_low);
        buf.put_slice(&self.node);
    }

    pub fn decode(cursor: &mut Cursor<&[u8]>, little_endian: bool) -> Result<Self> {
        need(cursor, Self::SIZE, "UUID")?;
        let (time_low, time_mid, time_hi_and_version) = if little_endian {
            (cursor.get_u32_le(), cursor.get_u16_le(), cursor.get_u16_le())
        } else {
            (cursor.get_u32(), cursor.get_u16(), cursor.get_u16())
        };
        let clock_seq_hi_and_reserved = cursor.get_u8();
        let clock_seq_low = cursor.get_u8();
        let mut node = [0u8; 6];
        cursor.copy_to_slice(&mut node);

        Ok(Self {
            time_low,
            time_mid,
            time_hi_and_version,
            clock_seq_hi_and_reserved,
            clock_seq_low,
            node,
        })
    }
}

impl From<uuid::Uuid> for Uuid {
    fn from(value: uuid::Uuid) -> Self {
        Self::from_u128(value.as_u128())
    }
}

impl From<Uuid> for uuid::Uuid {
    fn from(value: Uuid) -> Self {
        let mut tail = [0u8; 8];
        tail[0] = value.clock_seq_hi_and_reserved;
        tail[1] = value.clock_seq_low;
        tail[2..].copy_from_slice(&value.node);
        uuid::Uuid::from_fields(
            value.time_low,
            value.time_mid,
            value.time_hi_and_version,
            &tail,
        )
    }
}

impl FromStr for Uuid {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s).ok_or_else(|| RpcError::InvalidUuid(s.to_string()))
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&uuid::Uuid::from(*self).hyphenated(), f)
    }
}

/// Syntax ID - interface UUID with version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyntaxId {
    pub uuid: Uuid,
    /// Major version in the lower 16 bits, minor in the upper 16 bits
    pub version: u32,
}

impl SyntaxId {
    pub fn new(uuid: Uuid, major: u16, minor: u16) -> Self {
        Self {
            uuid,
            version: (major as u32) | ((minor as u32) << 16),
        }
    }

    /// NDR transfer syntax
    pub fn ndr() -> Self {
        Self {
            uuid: NDR_SYNTAX_UUID,
            version: NDR_SYNTAX_VERSION,
        }
    }

    pub fn nil() -> Self {
        Self::new(Uuid::NIL, 0, 0)
    }

    pub fn major_version(&self) -> u16 {
        self.version as u16
    }

    pub fn minor_version(&self) -> u16 {
        (self.version >> 16) as u16
    }

    fn encode(&self, buf: &mut BytesMut, order: WireOrder) {
        self.uuid.encode(buf, order.little_endian);
        order.put_u32(buf, self.version);
    }

    fn decode(cursor: &mut Cursor<&[u8]>, order: WireOrder) -> Result<Self> {
        let uuid = Uuid::decode(cursor, order.little_endian)?;
        let version = order.get_u32(cursor, "syntax version")?;
        Ok(Self { uuid, version })
    }
}

/// Common PDU header (16 bytes)
#[derive(Debug, Clone)]
pub struct PduHeader {
    pub version: u8,
    pub version_minor: u8,
    pub packet_type: PacketType,
    pub packet_flags: PacketFlags,
    pub data_rep: DataRepresentation,
    /// Total length of this fragment, header included
    pub frag_length: u16,
    pub auth_length: u16,
    pub call_id: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    pub fn new(packet_type: PacketType, call_id: u32) -> Self {
        Self {
            version: DCE_RPC_VERSION,
            version_minor: DCE_RPC_VERSION_MINOR,
            packet_type,
            packet_flags: PacketFlags::complete(),
            data_rep: DataRepresentation::ndr(),
            frag_length: 0,
            auth_length: 0,
            call_id,
        }
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        let order = self.data_rep.order();
        buf.put_u8(self.version);
        buf.put_u8(self.version_minor);
        buf.put_u8(self.packet_type as u8);
        buf.put_u8(self.packet_flags.as_u8());
        buf.put_slice(&self.data_rep.encode());
        order.put_u16(buf, self.frag_length);
        order.put_u16(buf, self.auth_length);
        order.put_u32(buf, self.call_id);
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE {
            return Err(RpcError::Truncated(format!(
                "PDU header ({} bytes)",
                data.len()
            )));
        }

        let version = data[0];
        if version != DCE_RPC_VERSION {
            return Err(RpcError::VersionMismatch {
                expected: DCE_RPC_VERSION,
                got: version,
            });
        }

        let packet_type =
            PacketType::from_u8(data[2]).ok_or(RpcError::InvalidMessageType(data[2] as i32))?;
        let data_rep = DataRepresentation::decode([data[4], data[5], data[6], data[7]]);
        let order = data_rep.order();

        let mut cursor = Cursor::new(&data[8..Self::SIZE]);
        let frag_length = order.get_u16(&mut cursor, "frag_length")?;
        let auth_length = order.get_u16(&mut cursor, "auth_length")?;
        let call_id = order.get_u32(&mut cursor, "call_id")?;

        Ok(Self {
            version,
            version_minor: data[1],
            packet_type,
            packet_flags: PacketFlags::from_u8(data[3]),
            data_rep,
            frag_length,
            auth_length,
            call_id,
        })
    }

    /// Encode `body` behind this header, fixing up `frag_length`
    fn frame(&self, body: &[u8]) -> Result<Bytes> {
        let total = Self::SIZE + body.len();
        let frag_length = u16::try_from(total).map_err(|_| RpcError::PduTooLarge {
            size: total,
            max: u16::MAX as usize,
        })?;

        let mut header = self.clone();
        header.frag_length = frag_length;

        let mut buf = BytesMut::with_capacity(total);
        header.encode(&mut buf);
        buf.put_slice(body);
        Ok(buf.freeze())
    }

    fn expect(&self, packet_type: PacketType) -> Result<()> {
        if self.packet_type != packet_type {
            return Err(RpcError::InvalidMessageType(self.packet_type as i32));
        }
        Ok(())
    }

    /// Body bytes of `data`, bounded by `frag_length` and stripped of any
    /// trailing auth verifier
    fn body<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let end = (self.frag_length as usize).min(data.len());
        let auth = if self.auth_length > 0 {
            self.auth_length as usize + 8
        } else {
            0
        };
        let end = end.saturating_sub(auth).max(Self::SIZE);
        &data[Self::SIZE..end]
    }
}

/// Presentation context element offered by a bind
#[derive(Debug, Clone)]
pub struct ContextElement {
    pub context_id: u16,
    pub abstract_syntax: SyntaxId,
    pub transfer_syntaxes: Vec<SyntaxId>,
}

impl ContextElement {
    pub fn new(context_id: u16, abstract_syntax: SyntaxId, transfer_syntax: SyntaxId) -> Self {
        Self {
            context_id,
            abstract_syntax,
            transfer_syntaxes: vec![transfer_syntax],
        }
    }

    fn encode(&self, buf: &mut BytesMut, order: WireOrder) {
        order.put_u16(buf, self.context_id);
        buf.put_u8(self.transfer_syntaxes.len() as u8);
        buf.put_u8(0);
        self.abstract_syntax.encode(buf, order);
        for ts in &self.transfer_syntaxes {
            ts.encode(buf, order);
        }
    }

    fn decode(cursor: &mut Cursor<&[u8]>, order: WireOrder) -> Result<Self> {
        let context_id = order.get_u16(cursor, "context element")?;
        let count = order.get_u8(cursor, "context element")?;
        let _reserved = order.get_u8(cursor, "context element")?;
        let abstract_syntax = SyntaxId::decode(cursor, order)?;
        let mut transfer_syntaxes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            transfer_syntaxes.push(SyntaxId::decode(cursor, order)?);
        }
        Ok(Self {
            context_id,
            abstract_syntax,
            transfer_syntaxes,
        })
    }
}

/// Bind PDU
#[derive(Debug, Clone)]
pub struct BindPdu {
    pub header: PduHeader,
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    pub assoc_group_id: u32,
    pub context_list: Vec<ContextElement>,
}

impl BindPdu {
    /// Bind offering `interface` over NDR in presentation context 0
    pub fn new(call_id: u32, interface: SyntaxId) -> Self {
        Self {
            header: PduHeader::new(PacketType::Bind, call_id),
            max_xmit_frag: DEFAULT_MAX_FRAG,
            max_recv_frag: DEFAULT_MAX_FRAG,
            assoc_group_id: 0,
            context_list: vec![ContextElement::new(0, interface, SyntaxId::ndr())],
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let order = self.header.data_rep.order();
        let mut body = BytesMut::with_capacity(128);
        order.put_u16(&mut body, self.max_xmit_frag);
        order.put_u16(&mut body, self.max_recv_frag);
        order.put_u32(&mut body, self.assoc_group_id);

        body.put_u8(self.context_list.len() as u8);
        body.put_u8(0);
        order.put_u16(&mut body, 0);
        for ctx in &self.context_list {
            ctx.encode(&mut body, order);
        }

        self.header.frame(&body)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        header.expect(PacketType::Bind)?;
        let order = header.data_rep.order();
        let mut cursor = Cursor::new(header.body(data));

        let max_xmit_frag = order.get_u16(&mut cursor, "bind")?;
        let max_recv_frag = order.get_u16(&mut cursor, "bind")?;
        let assoc_group_id = order.get_u32(&mut cursor, "bind")?;
        let count = order.get_u8(&mut cursor, "bind context list")?;
        let _reserved = order.get_u8(&mut cursor, "bind context list")?;
        let _reserved2 = order.get_u16(&mut cursor, "bind context list")?;

        let mut context_list = Vec::with_capacity(count as usize);
        for _ in 0..count {
            context_list.push(ContextElement::decode(&mut cursor, order)?);
        }

        Ok(Self {
            header,
            max_xmit_frag,
            max_recv_frag,
            assoc_group_id,
            context_list,
        })
    }
}

/// Presentation context negotiation result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ContextResult {
    Acceptance = 0,
    UserRejection = 1,
    ProviderRejection = 2,
}

/// Reason attached to a rejected presentation context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum RejectReason {
    NotSpecified = 0,
    AbstractSyntaxNotSupported = 1,
    TransferSyntaxesNotSupported = 2,
    LocalLimitExceeded = 3,
}

impl RejectReason {
    fn from_u16(value: u16) -> Self {
        match value {
            1 => Self::AbstractSyntaxNotSupported,
            2 => Self::TransferSyntaxesNotSupported,
            3 => Self::LocalLimitExceeded,
            _ => Self::NotSpecified,
        }
    }
}

/// One entry of a bind_ack result list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextOutcome {
    pub result: ContextResult,
    pub reason: RejectReason,
    pub transfer_syntax: SyntaxId,
}

impl ContextOutcome {
    pub fn accepted(transfer_syntax: SyntaxId) -> Self {
        Self {
            result: ContextResult::Acceptance,
            reason: RejectReason::NotSpecified,
            transfer_syntax,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            result: ContextResult::ProviderRejection,
            reason,
            transfer_syntax: SyntaxId::nil(),
        }
    }
}

/// Bind acknowledgment PDU
#[derive(Debug, Clone)]
pub struct BindAckPdu {
    pub header: PduHeader,
    pub max_xmit_frag: u16,
    pub max_recv_frag: u16,
    pub assoc_group_id: u32,
    /// Secondary address (the server port as a decimal string)
    pub secondary_addr: String,
    pub results: Vec<ContextOutcome>,
}

impl BindAckPdu {
    pub fn new(call_id: u32, assoc_group_id: u32, results: Vec<ContextOutcome>) -> Self {
        Self {
            header: PduHeader::new(PacketType::BindAck, call_id),
            max_xmit_frag: DEFAULT_MAX_FRAG,
            max_recv_frag: DEFAULT_MAX_FRAG,
            assoc_group_id,
            secondary_addr: String::new(),
            results,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let order = self.header.data_rep.order();
        let mut body = BytesMut::with_capacity(128);
        order.put_u16(&mut body, self.max_xmit_frag);
        order.put_u16(&mut body, self.max_recv_frag);
        order.put_u32(&mut body, self.assoc_group_id);

        let addr = self.secondary_addr.as_bytes();
        order.put_u16(&mut body, addr.len() as u16 + 1);
        body.put_slice(addr);
        body.put_u8(0);
        // body starts at offset 16, so 4-alignment of body == alignment of PDU
        pad_to_4(&mut body);

        body.put_u8(self.results.len() as u8);
        body.put_u8(0);
        order.put_u16(&mut body, 0);
        for outcome in &self.results {
            order.put_u16(&mut body, outcome.result as u16);
            order.put_u16(&mut body, outcome.reason as u16);
            outcome.transfer_syntax.encode(&mut body, order);
        }

        self.header.frame(&body)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        header.expect(PacketType::BindAck)?;
        let order = header.data_rep.order();
        let body = header.body(data);
        let mut cursor = Cursor::new(body);

        let max_xmit_frag = order.get_u16(&mut cursor, "bind_ack")?;
        let max_recv_frag = order.get_u16(&mut cursor, "bind_ack")?;
        let assoc_group_id = order.get_u32(&mut cursor, "bind_ack")?;

        let addr_len = order.get_u16(&mut cursor, "secondary address")? as usize;
        need(&cursor, addr_len, "secondary address")?;
        let mut addr = vec![0u8; addr_len];
        cursor.copy_to_slice(&mut addr);
        if addr.last() == Some(&0) {
            addr.pop();
        }
        let secondary_addr = String::from_utf8_lossy(&addr).into_owned();

        let pad = (4 - (cursor.position() as usize % 4)) % 4;
        need(&cursor, pad, "bind_ack padding")?;
        cursor.advance(pad);

        let count = order.get_u8(&mut cursor, "bind_ack results")?;
        let _reserved = order.get_u8(&mut cursor, "bind_ack results")?;
        let _reserved2 = order.get_u16(&mut cursor, "bind_ack results")?;

        let mut results = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let result = match order.get_u16(&mut cursor, "bind_ack result")? {
                0 => ContextResult::Acceptance,
                1 => ContextResult::UserRejection,
                _ => ContextResult::ProviderRejection,
            };
            let reason = RejectReason::from_u16(order.get_u16(&mut cursor, "bind_ack result")?);
            let transfer_syntax = SyntaxId::decode(&mut cursor, order)?;
            results.push(ContextOutcome {
                result,
                reason,
                transfer_syntax,
            });
        }

        Ok(Self {
            header,
            max_xmit_frag,
            max_recv_frag,
            assoc_group_id,
            secondary_addr,
            results,
        })
    }
}

/// Request PDU
#[derive(Debug, Clone)]
pub struct RequestPdu {
    pub header: PduHeader,
    pub alloc_hint: u32,
    pub context_id: u16,
    pub opnum: u16,
    pub object_uuid: Option<Uuid>,
    pub stub_data: Bytes,
}

impl RequestPdu {
    /// alloc_hint(4) + context_id(2) + opnum(2)
    pub const BODY_HEADER_SIZE: usize = 8;

    pub fn new(call_id: u32, opnum: u16, stub_data: Bytes) -> Self {
        Self {
            header: PduHeader::new(PacketType::Request, call_id),
            alloc_hint: stub_data.len() as u32,
            context_id: 0,
            opnum,
            object_uuid: None,
            stub_data,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let order = self.header.data_rep.order();
        let mut body =
            BytesMut::with_capacity(Self::BODY_HEADER_SIZE + Uuid::SIZE + self.stub_data.len());
        order.put_u32(&mut body, self.alloc_hint);
        order.put_u16(&mut body, self.context_id);
        order.put_u16(&mut body, self.opnum);
        if let Some(ref uuid) = self.object_uuid {
            uuid.encode(&mut body, order.little_endian);
        }
        body.put_slice(&self.stub_data);

        let mut header = self.header.clone();
        if self.object_uuid.is_some() {
            header.packet_flags = header.packet_flags.with(PacketFlags::OBJECT_UUID);
        }
        header.frame(&body)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        header.expect(PacketType::Request)?;
        let order = header.data_rep.order();
        let body = header.body(data);
        let mut cursor = Cursor::new(body);

        let alloc_hint = order.get_u32(&mut cursor, "request")?;
        let context_id = order.get_u16(&mut cursor, "request")?;
        let opnum = order.get_u16(&mut cursor, "request")?;
        let object_uuid = if header.packet_flags.has(PacketFlags::OBJECT_UUID) {
            Some(Uuid::decode(&mut cursor, order.little_endian)?)
        } else {
            None
        };

        let start = cursor.position() as usize;
        let stub_data = Bytes::copy_from_slice(&body[start..]);

        Ok(Self {
            header,
            alloc_hint,
            context_id,
            opnum,
            object_uuid,
            stub_data,
        })
    }
}

/// Response PDU
#[derive(Debug, Clone)]
pub struct ResponsePdu {
    pub header: PduHeader,
    pub alloc_hint: u32,
    pub context_id: u16,
    pub cancel_count: u8,
    pub stub_data: Bytes,
}

impl ResponsePdu {
    /// alloc_hint(4) + context_id(2) + cancel_count(1) + reserved(1)
    pub const BODY_HEADER_SIZE: usize = 8;

    pub fn new(call_id: u32, stub_data: Bytes) -> Self {
        Self {
            header: PduHeader::new(PacketType::Response, call_id),
            alloc_hint: stub_data.len() as u32,
            context_id: 0,
            cancel_count: 0,
            stub_data,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let order = self.header.data_rep.order();
        let mut body = BytesMut::with_capacity(Self::BODY_HEADER_SIZE + self.stub_data.len());
        order.put_u32(&mut body, self.alloc_hint);
        order.put_u16(&mut body, self.context_id);
        body.put_u8(self.cancel_count);
        body.put_u8(0);
        body.put_slice(&self.stub_data);
        self.header.frame(&body)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        header.expect(PacketType::Response)?;
        let order = header.data_rep.order();
        let body = header.body(data);
        let mut cursor = Cursor::new(body);

        let alloc_hint = order.get_u32(&mut cursor, "response")?;
        let context_id = order.get_u16(&mut cursor, "response")?;
        let cancel_count = order.get_u8(&mut cursor, "response")?;
        let _reserved = order.get_u8(&mut cursor, "response")?;

        let start = cursor.position() as usize;
        let stub_data = Bytes::copy_from_slice(&body[start..]);

        Ok(Self {
            header,
            alloc_hint,
            context_id,
            cancel_count,
            stub_data,
        })
    }
}

/// Fault status codes (C706 appendix E, MS-RPCE 3.1.1.5.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum FaultStatus {
    /// nca_s_op_rng_error: opnum not served by the interface
    OpRngError = 0x1c01_0002,
    /// nca_s_unk_if: interface not registered
    UnkIf = 0x1c01_0003,
    /// nca_s_proto_error
    ProtoError = 0x1c01_000b,
    /// nca_s_fault_ndr: stub could not unmarshal the arguments
    FaultNdr = 0x0000_06f7,
    /// nca_s_fault_context_mismatch
    ContextMismatch = 0x1c00_001a,
    /// nca_s_fault_remote_no_memory
    RemoteNoMemory = 0x1c00_001b,
    /// nca_s_fault_unspec
    Unspecified = 0x1c00_0012,
    /// ERROR_ACCESS_DENIED
    AccessDenied = 0x0000_0005,
}

impl FaultStatus {
    /// Human-readable name for a raw fault status
    pub fn describe(status: u32) -> &'static str {
        match status {
            0x1c01_0002 => "nca_s_op_rng_error",
            0x1c01_0003 => "nca_s_unk_if",
            0x1c01_000b => "nca_s_proto_error",
            0x0000_06f7 => "nca_s_fault_ndr",
            0x1c00_001a => "nca_s_fault_context_mismatch",
            0x1c00_001b => "nca_s_fault_remote_no_memory",
            0x1c00_0012 => "nca_s_fault_unspec",
            0x0000_0005 => "access denied",
            _ => "unknown fault",
        }
    }
}

/// Fault PDU
#[derive(Debug, Clone)]
pub struct FaultPdu {
    pub header: PduHeader,
    pub alloc_hint: u32,
    pub context_id: u16,
    pub cancel_count: u8,
    pub status: u32,
}

impl FaultPdu {
    pub fn new(call_id: u32, status: FaultStatus) -> Self {
        Self {
            header: PduHeader::new(PacketType::Fault, call_id),
            alloc_hint: 0,
            context_id: 0,
            cancel_count: 0,
            status: status as u32,
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        let order = self.header.data_rep.order();
        let mut body = BytesMut::with_capacity(16);
        order.put_u32(&mut body, self.alloc_hint);
        order.put_u16(&mut body, self.context_id);
        body.put_u8(self.cancel_count);
        body.put_u8(0);
        order.put_u32(&mut body, self.status);
        order.put_u32(&mut body, 0);
        self.header.frame(&body)
    }

    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        header.expect(PacketType::Fault)?;
        let order = header.data_rep.order();
        let mut cursor = Cursor::new(header.body(data));

        let alloc_hint = order.get_u32(&mut cursor, "fault")?;
        let context_id = order.get_u16(&mut cursor, "fault")?;
        let cancel_count = order.get_u8(&mut cursor, "fault")?;
        let _reserved = order.get_u8(&mut cursor, "fault")?;
        let status = order.get_u32(&mut cursor, "fault status")?;

        Ok(Self {
            header,
            alloc_hint,
            context_id,
            cancel_count,
            status,
        })
    }
}

/// Any connection-oriented PDU this crate understands
#[derive(Debug, Clone)]
pub enum Pdu {
    Bind(BindPdu),
    BindAck(BindAckPdu),
    Request(RequestPdu),
    Response(ResponsePdu),
    Fault(FaultPdu),
}

impl Pdu {
    pub fn decode(data: &[u8]) -> Result<Self> {
        let header = PduHeader::decode(data)?;
        match header.packet_type {
            PacketType::Bind => Ok(Pdu::Bind(BindPdu::decode(data)?)),
            PacketType::BindAck => Ok(Pdu::BindAck(BindAckPdu::decode(data)?)),
            PacketType::Request => Ok(Pdu::Request(RequestPdu::decode(data)?)),
            PacketType::Response => Ok(Pdu::Response(ResponsePdu::decode(data)?)),
            PacketType::Fault => Ok(Pdu::Fault(FaultPdu::decode(data)?)),
            other => Err(RpcError::UnsupportedPdu(other)),
        }
    }

    pub fn encode(&self) -> Result<Bytes> {
        match self {
            Pdu::Bind(pdu) => pdu.encode(),
            Pdu::BindAck(pdu) => pdu.encode(),
            Pdu::Request(pdu) => pdu.encode(),
            Pdu::Response(pdu) => pdu.encode(),
            Pdu::Fault(pdu) => pdu.encode(),
        }
    }

    pub fn call_id(&self) -> u32 {
        self.header().call_id
    }

    pub fn header(&self) -> &PduHeader {
        match self {
            Pdu::Bind(pdu) => &pdu.header,
            Pdu::BindAck(pdu) => &pdu.header,
            Pdu::Request(pdu) => &pdu.header,
            Pdu::Response(pdu) => &pdu.header,
            Pdu::Fault(pdu) => &pdu.header,
        }
    }
}
