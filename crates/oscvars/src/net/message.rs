//! OSC 1.0 message codec.
//!
//! ```text
//! ┌──────────────────────┬─────────────────────┬──────────────────────┐
//! │ Address (OSC-string) │ Type tags ",fis..." │ Arguments (BE, pad4) │
//! └──────────────────────┴─────────────────────┴──────────────────────┘
//! ```
//!
//! Only float32, int32 and string arguments are ever encoded. Decoding also
//! accepts bundles, which are flattened in packet order.

use std::fmt;

pub const MAX_DATAGRAM_SIZE: usize = 65_507;

const BUNDLE_TAG: &[u8] = b"#bundle\0";
const BUNDLE_HEADER_LEN: usize = BUNDLE_TAG.len() + 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgType {
    Float,
    Int,
    Str,
    Unsupported(char),
}

impl ArgType {
    pub fn tag(self) -> char {
        match self {
            ArgType::Float => 'f',
            ArgType::Int => 'i',
            ArgType::Str => 's',
            ArgType::Unsupported(tag) => tag,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Float(f32),
    Int(i32),
    Str(String),
    Unsupported(char),
}

impl OscArg {
    pub fn arg_type(&self) -> ArgType {
        match self {
            OscArg::Float(_) => ArgType::Float,
            OscArg::Int(_) => ArgType::Int,
            OscArg::Str(_) => ArgType::Str,
            OscArg::Unsupported(tag) => ArgType::Unsupported(*tag),
        }
    }
}

impl fmt::Display for OscArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OscArg::Float(v) => write!(f, "{}", v),
            OscArg::Int(v) => write!(f, "{}", v),
            OscArg::Str(v) => write!(f, "\"{}\"", v),
            OscArg::Unsupported(tag) => write!(f, "<{}>", tag),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MessageError {
    #[error("packet truncated at byte {0}")]
    Truncated(usize),
    #[error("address must start with '/'")]
    InvalidAddress,
    #[error("string is not valid UTF-8")]
    InvalidUtf8,
    #[error("missing type tag string")]
    MissingTypeTags,
    #[error("unknown type tag '{0}'")]
    UnknownTypeTag(char),
    #[error("unsupported argument '{0}' cannot be encoded")]
    UnencodableArg(char),
    #[error("encoded message is {0} bytes, larger than a datagram")]
    Oversized(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Address with the leading path separator removed.
    pub fn stripped_address(&self) -> &str {
        self.address.strip_prefix('/').unwrap_or(&self.address)
    }

    pub fn encode(&self) -> Result<Vec<u8>, MessageError> {
        if !self.address.starts_with('/') {
            return Err(MessageError::InvalidAddress);
        }

        let mut buf = Vec::with_capacity(self.address.len() + 8 + self.args.len() * 8);
        write_string(&mut buf, &self.address);

        let mut tags = String::with_capacity(self.args.len() + 1);
        let mut body = Vec::with_capacity(self.args.len() * 4);
        tags.push(',');
        for arg in &self.args {
            match arg {
                OscArg::Float(v) => body.extend_from_slice(&v.to_be_bytes()),
                OscArg::Int(v) => body.extend_from_slice(&v.to_be_bytes()),
                OscArg::Str(v) => write_string(&mut body, v),
                OscArg::Unsupported(tag) => return Err(MessageError::UnencodableArg(*tag)),
            }
            tags.push(arg.arg_type().tag());
        }
        write_string(&mut buf, &tags);
        buf.extend_from_slice(&body);

        if buf.len() > MAX_DATAGRAM_SIZE {
            return Err(MessageError::Oversized(buf.len()));
        }
        Ok(buf)
    }

    /// Decodes one datagram. Bundles yield every contained message in order.
    pub fn decode_packet(data: &[u8]) -> Result<Vec<OscMessage>, MessageError> {
        let mut messages = Vec::new();
        decode_into(data, &mut messages)?;
        Ok(messages)
    }
}

impl fmt::Display for OscMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

fn decode_into(data: &[u8], out: &mut Vec<OscMessage>) -> Result<(), MessageError> {
    if data.starts_with(BUNDLE_TAG) {
        return decode_bundle(data, out);
    }
    out.push(decode_message(data)?);
    Ok(())
}

fn decode_bundle(data: &[u8], out: &mut Vec<OscMessage>) -> Result<(), MessageError> {
    if data.len() < BUNDLE_HEADER_LEN {
        return Err(MessageError::Truncated(data.len()));
    }

    let mut cursor = Cursor::new(data, BUNDLE_HEADER_LEN);
    while !cursor.is_empty() {
        let size = cursor.read_i32()?;
        let size = usize::try_from(size).map_err(|_| MessageError::Truncated(cursor.pos))?;
        let element = cursor.take(size)?;
        decode_into(element, out)?;
    }
    Ok(())
}

fn decode_message(data: &[u8]) -> Result<OscMessage, MessageError> {
    let mut cursor = Cursor::new(data, 0);

    let address = cursor.read_string()?;
    if !address.starts_with('/') {
        return Err(MessageError::InvalidAddress);
    }

    // Pre-1.0 senders may omit the tag string entirely.
    if cursor.is_empty() {
        return Ok(OscMessage::new(address));
    }

    let tags = cursor.read_string()?;
    let Some(tags) = tags.strip_prefix(',') else {
        return Err(MessageError::MissingTypeTags);
    };

    let mut args = Vec::with_capacity(tags.len());
    for tag in tags.chars() {
        let arg = match tag {
            'f' => OscArg::Float(f32::from_be_bytes(cursor.read_word()?)),
            'i' => OscArg::Int(i32::from_be_bytes(cursor.read_word()?)),
            's' => OscArg::Str(cursor.read_string()?),
            'c' | 'r' | 'm' => {
                cursor.take(4)?;
                OscArg::Unsupported(tag)
            }
            'h' | 't' | 'd' => {
                cursor.take(8)?;
                OscArg::Unsupported(tag)
            }
            'b' => {
                let len = cursor.read_i32()?;
                let len = usize::try_from(len).map_err(|_| MessageError::Truncated(cursor.pos))?;
                cursor.take(padded_len(len))?;
                OscArg::Unsupported(tag)
            }
            'T' | 'F' | 'N' | 'I' => OscArg::Unsupported(tag),
            other => return Err(MessageError::UnknownTypeTag(other)),
        };
        args.push(arg);
    }

    Ok(OscMessage::with_args(address, args))
}

fn padded_len(len: usize) -> usize {
    (len + 3) & !3
}

fn write_string(buf: &mut Vec<u8>, value: &str) {
    buf.extend_from_slice(value.as_bytes());
    let total = padded_len(value.len() + 1);
    buf.resize(buf.len() + total - value.len(), 0);
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8], pos: usize) -> Self {
        Self { data, pos }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], MessageError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(MessageError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_word(&mut self) -> Result<[u8; 4], MessageError> {
        let bytes = self.take(4)?;
        Ok([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn read_i32(&mut self) -> Result<i32, MessageError> {
        Ok(i32::from_be_bytes(self.read_word()?))
    }

    fn read_string(&mut self) -> Result<String, MessageError> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(MessageError::Truncated(self.data.len()))?;
        let raw = self.take(padded_len(nul + 1))?;
        std::str::from_utf8(&raw[..nul])
            .map(str::to_owned)
            .map_err(|_| MessageError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_known_layout() {
        let msg = OscMessage::with_args("/a", vec![OscArg::Int(1), OscArg::Str("hi".into())]);
        let bytes = msg.encode().unwrap();

        assert_eq!(
            bytes,
            vec![
                b'/', b'a', 0, 0, //
                b',', b'i', b's', 0, //
                0, 0, 0, 1, //
                b'h', b'i', 0, 0,
            ]
        );
    }

    #[test]
    fn string_on_word_boundary_gets_full_padding() {
        let msg = OscMessage::new("/abc");
        let bytes = msg.encode().unwrap();
        assert_eq!(&bytes[..8], b"/abc\0\0\0\0");
    }

    #[test]
    fn decodes_mixed_arguments() {
        let msg = OscMessage::with_args(
            "/synth/cutoff",
            vec![
                OscArg::Float(1.5),
                OscArg::Str("x".into()),
                OscArg::Int(-7),
            ],
        );
        let decoded = OscMessage::decode_packet(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, vec![msg]);
    }

    #[test]
    fn unsupported_tags_are_kept_as_placeholders() {
        let mut data = Vec::new();
        write_string(&mut data, "/v");
        write_string(&mut data, ",fdTf");
        data.extend_from_slice(&1.0f32.to_be_bytes());
        data.extend_from_slice(&2.0f64.to_be_bytes());
        data.extend_from_slice(&3.0f32.to_be_bytes());

        let decoded = OscMessage::decode_packet(&data).unwrap();
        assert_eq!(
            decoded[0].args,
            vec![
                OscArg::Float(1.0),
                OscArg::Unsupported('d'),
                OscArg::Unsupported('T'),
                OscArg::Float(3.0),
            ]
        );
    }

    #[test]
    fn bundle_is_flattened_in_order() {
        let first = OscMessage::with_args("/x", vec![OscArg::Float(1.0)]).encode().unwrap();
        let second = OscMessage::with_args("/x", vec![OscArg::Float(2.0)]).encode().unwrap();

        let mut data = BUNDLE_TAG.to_vec();
        data.extend_from_slice(&1u64.to_be_bytes());
        for element in [&first, &second] {
            data.extend_from_slice(&(element.len() as i32).to_be_bytes());
            data.extend_from_slice(element);
        }

        let decoded = OscMessage::decode_packet(&data).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[1].args, vec![OscArg::Float(2.0)]);
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            OscMessage::decode_packet(b"nope\0\0\0\0"),
            Err(MessageError::InvalidAddress)
        );
        assert!(OscMessage::decode_packet(b"/x\0\0,f\0\0\0\0").is_err());
        assert_eq!(
            OscMessage::decode_packet(b"/x\0\0,q\0\0"),
            Err(MessageError::UnknownTypeTag('q'))
        );
    }

    #[test]
    fn strips_leading_separator_once() {
        assert_eq!(OscMessage::new("/foo").stripped_address(), "foo");
        assert_eq!(OscMessage::new("/grp/foo").stripped_address(), "grp/foo");
    }

    #[test]
    fn refuses_to_encode_relative_address() {
        assert_eq!(
            OscMessage::new("foo").encode(),
            Err(MessageError::InvalidAddress)
        );
    }
}
