//! Minimal BER codec for SNMPv2c GETNEXT/GETBULK requests and responses.
//!
//! Only the subset of X.690 that SNMP agents actually send is handled:
//! definite lengths (short and long form), universal INTEGER, OCTET STRING,
//! NULL, OBJECT IDENTIFIER and SEQUENCE, the SNMP application types and the
//! three v2 exception values.

use crate::error::SnmpError;

use super::oid::Oid;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_IP_ADDRESS: u8 = 0x40;
const TAG_COUNTER32: u8 = 0x41;
const TAG_GAUGE32: u8 = 0x42;
const TAG_TIMETICKS: u8 = 0x43;
const TAG_OPAQUE: u8 = 0x44;
const TAG_COUNTER64: u8 = 0x46;
const TAG_NO_SUCH_OBJECT: u8 = 0x80;
const TAG_NO_SUCH_INSTANCE: u8 = 0x81;
const TAG_END_OF_MIB_VIEW: u8 = 0x82;

const PDU_GET_NEXT: u8 = 0xA1;
const PDU_RESPONSE: u8 = 0xA2;
const PDU_GET_BULK: u8 = 0xA5;

/// SNMPv2c version field value.
const VERSION_2C: i64 = 1;

/// A decoded varbind value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Integer(i64),
    OctetString(Vec<u8>),
    Null,
    Oid(Oid),
    IpAddress([u8; 4]),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Counter64(u64),
    Opaque(Vec<u8>),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl Value {
    /// Numeric view of integer-like values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => Some(i64::from(*v)),
            Value::Counter64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::OctetString(bytes) | Value::Opaque(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// `noSuchObject`, `noSuchInstance` or `endOfMibView`.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }
}

/// An (OID, value) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Varbind {
    pub oid: Oid,
    pub value: Value,
}

impl Varbind {
    pub fn new(oid: Oid, value: Value) -> Self {
        Self { oid, value }
    }
}

/// Request PDU kinds used for walking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduKind {
    GetNext,
    GetBulk { max_repetitions: u32 },
}

/// A decoded response PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub request_id: i32,
    pub error_status: i64,
    pub error_index: i64,
    pub varbinds: Vec<Varbind>,
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        let significant = &bytes[skip..];
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(significant);
    }
}

fn encode_tlv(tag: u8, content: &[u8], out: &mut Vec<u8>) {
    out.push(tag);
    encode_length(content.len(), out);
    out.extend_from_slice(content);
}

fn integer_content(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    // Drop redundant sign bytes, keeping the sign bit of the next byte intact.
    while start < 7 {
        let (b, next) = (bytes[start], bytes[start + 1]);
        if (b == 0x00 && next & 0x80 == 0) || (b == 0xFF && next & 0x80 != 0) {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

fn encode_integer(value: i64, out: &mut Vec<u8>) {
    encode_tlv(TAG_INTEGER, &integer_content(value), out);
}

fn encode_base128(mut value: u32, out: &mut Vec<u8>) {
    let mut stack = [0u8; 5];
    let mut n = 0;
    loop {
        stack[n] = (value & 0x7F) as u8;
        n += 1;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    for i in (0..n).rev() {
        let continuation = if i == 0 { 0 } else { 0x80 };
        out.push(stack[i] | continuation);
    }
}

fn oid_content(oid: &Oid) -> Vec<u8> {
    let components = oid.components();
    let mut out = Vec::with_capacity(components.len() + 4);
    match components {
        [] => out.push(0),
        [first] => encode_base128(first * 40, &mut out),
        [first, second, rest @ ..] => {
            encode_base128(first * 40 + second, &mut out);
            for c in rest {
                encode_base128(*c, &mut out);
            }
        }
    }
    out
}

fn encode_oid(oid: &Oid, out: &mut Vec<u8>) {
    encode_tlv(TAG_OID, &oid_content(oid), out);
}

/// Encode a v2c walk request for `oid`.
pub fn encode_request(community: &[u8], request_id: i32, kind: PduKind, oid: &Oid) -> Vec<u8> {
    let mut varbind = Vec::new();
    encode_oid(oid, &mut varbind);
    encode_tlv(TAG_NULL, &[], &mut varbind);

    let mut varbind_seq = Vec::new();
    encode_tlv(TAG_SEQUENCE, &varbind, &mut varbind_seq);

    let mut varbind_list = Vec::new();
    encode_tlv(TAG_SEQUENCE, &varbind_seq, &mut varbind_list);

    // GETBULK reuses error-status/error-index as non-repeaters/max-repetitions.
    let (tag, second, third) = match kind {
        PduKind::GetNext => (PDU_GET_NEXT, 0, 0),
        PduKind::GetBulk { max_repetitions } => (PDU_GET_BULK, 0, i64::from(max_repetitions)),
    };

    let mut pdu_body = Vec::new();
    encode_integer(i64::from(request_id), &mut pdu_body);
    encode_integer(second, &mut pdu_body);
    encode_integer(third, &mut pdu_body);
    pdu_body.extend_from_slice(&varbind_list);

    let mut message_body = Vec::new();
    encode_integer(VERSION_2C, &mut message_body);
    encode_tlv(TAG_OCTET_STRING, community, &mut message_body);
    encode_tlv(tag, &pdu_body, &mut message_body);

    let mut message = Vec::with_capacity(message_body.len() + 4);
    encode_tlv(TAG_SEQUENCE, &message_body, &mut message);
    message
}

fn decode_error(message: impl Into<String>) -> SnmpError {
    SnmpError::Decode(message.into())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn byte(&mut self) -> Result<u8, SnmpError> {
        let b = *self
            .data
            .get(self.pos)
            .ok_or_else(|| decode_error("unexpected end of data"))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), SnmpError> {
        let tag = self.byte()?;
        let first = self.byte()?;
        let len = if first & 0x80 == 0 {
            usize::from(first)
        } else {
            let count = usize::from(first & 0x7F);
            if count == 0 || count > 4 {
                return Err(decode_error(format!("unsupported length form 0x{:02x}", first)));
            }
            let mut len = 0usize;
            for _ in 0..count {
                len = (len << 8) | usize::from(self.byte()?);
            }
            len
        };

        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| decode_error(format!("length {} overruns buffer", len)))?;
        let content = &self.data[self.pos..end];
        self.pos = end;
        Ok((tag, content))
    }

    fn expect(&mut self, expected: u8) -> Result<&'a [u8], SnmpError> {
        let (tag, content) = self.read_tlv()?;
        if tag != expected {
            return Err(decode_error(format!(
                "expected tag 0x{:02x}, found 0x{:02x}",
                expected, tag
            )));
        }
        Ok(content)
    }
}

fn decode_integer(content: &[u8]) -> Result<i64, SnmpError> {
    if content.is_empty() || content.len() > 8 {
        return Err(decode_error(format!("integer of {} bytes", content.len())));
    }
    let negative = content[0] & 0x80 != 0;
    let mut value: i64 = if negative { -1 } else { 0 };
    for b in content {
        value = (value << 8) | i64::from(*b);
    }
    Ok(value)
}

fn decode_unsigned(content: &[u8]) -> Result<u64, SnmpError> {
    // Unsigned types carry a leading zero byte when the top bit is set.
    let content = match content {
        [0, rest @ ..] if !rest.is_empty() => rest,
        _ => content,
    };
    if content.len() > 8 {
        return Err(decode_error(format!("unsigned of {} bytes", content.len())));
    }
    Ok(content.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
}

fn decode_oid(content: &[u8]) -> Result<Oid, SnmpError> {
    let mut components = Vec::with_capacity(content.len() + 1);
    let mut current: u32 = 0;
    let mut first = true;
    for b in content {
        current = current
            .checked_mul(128)
            .ok_or_else(|| decode_error("oid component overflow"))?
            | u32::from(b & 0x7F);
        if b & 0x80 == 0 {
            if first {
                let head = (current / 40).min(2);
                components.push(head);
                components.push(current - head * 40);
                first = false;
            } else {
                components.push(current);
            }
            current = 0;
        }
    }
    if content.last().is_some_and(|b| b & 0x80 != 0) {
        return Err(decode_error("truncated oid"));
    }
    Ok(Oid(components))
}

fn decode_value(tag: u8, content: &[u8]) -> Result<Value, SnmpError> {
    let small = |v: u64| u32::try_from(v).map_err(|_| decode_error("32-bit value overflow"));
    Ok(match tag {
        TAG_INTEGER => Value::Integer(decode_integer(content)?),
        TAG_OCTET_STRING => Value::OctetString(content.to_vec()),
        TAG_NULL => Value::Null,
        TAG_OID => Value::Oid(decode_oid(content)?),
        TAG_IP_ADDRESS => {
            let octets: [u8; 4] = content
                .try_into()
                .map_err(|_| decode_error("ip address is not 4 bytes"))?;
            Value::IpAddress(octets)
        }
        TAG_COUNTER32 => Value::Counter32(small(decode_unsigned(content)?)?),
        TAG_GAUGE32 => Value::Gauge32(small(decode_unsigned(content)?)?),
        TAG_TIMETICKS => Value::TimeTicks(small(decode_unsigned(content)?)?),
        TAG_OPAQUE => Value::Opaque(content.to_vec()),
        TAG_COUNTER64 => Value::Counter64(decode_unsigned(content)?),
        TAG_NO_SUCH_OBJECT => Value::NoSuchObject,
        TAG_NO_SUCH_INSTANCE => Value::NoSuchInstance,
        TAG_END_OF_MIB_VIEW => Value::EndOfMibView,
        other => return Err(decode_error(format!("unknown value tag 0x{:02x}", other))),
    })
}

/// Decode an SNMP response message.
pub fn decode_response(data: &[u8]) -> Result<Response, SnmpError> {
    let mut outer = Reader::new(data);
    let mut message = Reader::new(outer.expect(TAG_SEQUENCE)?);

    let version = decode_integer(message.expect(TAG_INTEGER)?)?;
    if version != VERSION_2C {
        return Err(decode_error(format!("unexpected version {}", version)));
    }
    message.expect(TAG_OCTET_STRING)?;

    let mut pdu = Reader::new(message.expect(PDU_RESPONSE)?);
    let request_id = decode_integer(pdu.expect(TAG_INTEGER)?)?;
    let error_status = decode_integer(pdu.expect(TAG_INTEGER)?)?;
    let error_index = decode_integer(pdu.expect(TAG_INTEGER)?)?;

    let mut list = Reader::new(pdu.expect(TAG_SEQUENCE)?);
    let mut varbinds = Vec::new();
    while !list.is_empty() {
        let mut varbind = Reader::new(list.expect(TAG_SEQUENCE)?);
        let oid = decode_oid(varbind.expect(TAG_OID)?)?;
        let (tag, content) = varbind.read_tlv()?;
        varbinds.push(Varbind::new(oid, decode_value(tag, content)?));
    }

    Ok(Response {
        request_id: i32::try_from(request_id).map_err(|_| decode_error("request id out of range"))?,
        error_status,
        error_index,
        varbinds,
    })
}

/// Encode a response message. Used by agent fakes in tests.
#[cfg(test)]
pub(crate) fn encode_response(community: &[u8], response: &Response) -> Vec<u8> {
    let mut list = Vec::new();
    for vb in &response.varbinds {
        let mut body = Vec::new();
        encode_oid(&vb.oid, &mut body);
        match &vb.value {
            Value::Integer(v) => encode_integer(*v, &mut body),
            Value::OctetString(bytes) => encode_tlv(TAG_OCTET_STRING, bytes, &mut body),
            Value::Gauge32(v) => {
                let mut content = vec![0];
                content.extend_from_slice(&v.to_be_bytes());
                encode_tlv(TAG_GAUGE32, &content, &mut body)
            }
            Value::EndOfMibView => encode_tlv(TAG_END_OF_MIB_VIEW, &[], &mut body),
            _ => encode_tlv(TAG_NULL, &[], &mut body),
        }
        encode_tlv(TAG_SEQUENCE, &body, &mut list);
    }

    let mut pdu = Vec::new();
    encode_integer(i64::from(response.request_id), &mut pdu);
    encode_integer(response.error_status, &mut pdu);
    encode_integer(response.error_index, &mut pdu);
    encode_tlv(TAG_SEQUENCE, &list, &mut pdu);

    let mut body = Vec::new();
    encode_integer(VERSION_2C, &mut body);
    encode_tlv(TAG_OCTET_STRING, community, &mut body);
    encode_tlv(PDU_RESPONSE, &pdu, &mut body);

    let mut message = Vec::new();
    encode_tlv(TAG_SEQUENCE, &body, &mut message);
    message
}
