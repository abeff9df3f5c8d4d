//! Flutter's standard message codec and standard method codec.
//!
//! Values are tagged with a one-byte type, little-endian, with a variable
//! size prefix for strings, lists and maps:
//!
//! - `< 254`: the size itself, one byte
//! - `254`:   followed by a `u16`
//! - `255`:   followed by a `u32`
//!
//! Numeric lists and `float64` are padded so their payload starts on an
//! offset aligned to the element size.

use std::io::{self, Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

const TYPE_NULL: u8 = 0;
const TYPE_TRUE: u8 = 1;
const TYPE_FALSE: u8 = 2;
const TYPE_INT32: u8 = 3;
const TYPE_INT64: u8 = 4;
const TYPE_LARGE_INT: u8 = 5;
const TYPE_FLOAT64: u8 = 6;
const TYPE_STRING: u8 = 7;
const TYPE_UINT8_LIST: u8 = 8;
const TYPE_INT32_LIST: u8 = 9;
const TYPE_INT64_LIST: u8 = 10;
const TYPE_FLOAT64_LIST: u8 = 11;
const TYPE_LIST: u8 = 12;
const TYPE_MAP: u8 = 13;
const TYPE_FLOAT32_LIST: u8 = 14;

/// Lists and maps nested deeper than this are rejected instead of recursing.
pub const MAX_NESTING_DEPTH: usize = 128;

const ENVELOPE_SUCCESS: u8 = 0;
const ENVELOPE_ERROR: u8 = 1;

#[derive(Debug)]
pub enum CodecError {
    /// The message ended in the middle of a value.
    Truncated,
    UnknownType(u8),
    /// Arbitrary precision integers are not representable here.
    LargeIntUnsupported,
    MethodNameNotString,
    InvalidEnvelope(u8),
    /// A length does not fit the `u32` size prefix.
    TooLarge(usize),
    /// Lists and maps nest beyond [`MAX_NESTING_DEPTH`].
    TooDeep,
    Io(io::Error),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::Truncated => write!(f, "message truncated"),
            CodecError::UnknownType(t) => write!(f, "unknown value type {}", t),
            CodecError::LargeIntUnsupported => write!(f, "large integers are not supported"),
            CodecError::MethodNameNotString => write!(f, "method name is not a string"),
            CodecError::InvalidEnvelope(t) => write!(f, "invalid envelope tag {}", t),
            CodecError::TooLarge(n) => write!(f, "length {} exceeds the size prefix", n),
            CodecError::TooDeep => {
                write!(f, "values nested deeper than {} levels", MAX_NESTING_DEPTH)
            }
            CodecError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for CodecError {}

impl From<io::Error> for CodecError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            CodecError::Truncated
        } else {
            CodecError::Io(e)
        }
    }
}

/// A value as carried by the standard message codec.
///
/// Maps keep insertion order as key/value pairs, since keys may be any value
/// (including floats, which are neither `Hash` nor `Ord`).
#[derive(Debug, Clone, PartialEq)]
pub enum EncodableValue {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Uint8List(Vec<u8>),
    Int32List(Vec<i32>),
    Int64List(Vec<i64>),
    Float32List(Vec<f32>),
    Float64List(Vec<f64>),
    List(Vec<EncodableValue>),
    Map(Vec<(EncodableValue, EncodableValue)>),
}

impl EncodableValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EncodableValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(EncodableValue, EncodableValue)]> {
        match self {
            EncodableValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a string key in a map value. `None` for non-maps.
    pub fn lookup(&self, key: &str) -> Option<&EncodableValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }
}

impl From<&str> for EncodableValue {
    fn from(s: &str) -> Self {
        EncodableValue::String(s.to_owned())
    }
}

impl From<String> for EncodableValue {
    fn from(s: String) -> Self {
        EncodableValue::String(s)
    }
}

impl From<bool> for EncodableValue {
    fn from(b: bool) -> Self {
        EncodableValue::Bool(b)
    }
}

impl From<i32> for EncodableValue {
    fn from(v: i32) -> Self {
        EncodableValue::Int32(v)
    }
}

impl From<i64> for EncodableValue {
    fn from(v: i64) -> Self {
        EncodableValue::Int64(v)
    }
}

impl From<f64> for EncodableValue {
    fn from(v: f64) -> Self {
        EncodableValue::Float64(v)
    }
}

/// A decoded method invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub method: String,
    /// `Null` when the caller passed no arguments.
    pub arguments: EncodableValue,
}

impl MethodCall {
    pub fn new(method: impl Into<String>, arguments: EncodableValue) -> Self {
        Self {
            method: method.into(),
            arguments,
        }
    }
}

/// A decoded reply envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum MethodEnvelope {
    Success(EncodableValue),
    Error {
        code: String,
        message: Option<String>,
        details: EncodableValue,
    },
}

//---------------------------------------------------------------------------
// Writing
//---------------------------------------------------------------------------

struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    fn new() -> Self {
        Self { buf: Vec::new() }
    }

    fn align(&mut self, alignment: usize) {
        while self.buf.len() % alignment != 0 {
            self.buf.push(0);
        }
    }

    fn write_size(&mut self, size: usize) -> Result<(), CodecError> {
        if size < 254 {
            self.buf.write_u8(size as u8)?;
        } else if size <= u16::MAX as usize {
            self.buf.write_u8(254)?;
            self.buf.write_u16::<LittleEndian>(size as u16)?;
        } else if size <= u32::MAX as usize {
            self.buf.write_u8(255)?;
            self.buf.write_u32::<LittleEndian>(size as u32)?;
        } else {
            return Err(CodecError::TooLarge(size));
        }
        Ok(())
    }

    fn write_value(&mut self, value: &EncodableValue) -> Result<(), CodecError> {
        match value {
            EncodableValue::Null => self.buf.write_u8(TYPE_NULL)?,
            EncodableValue::Bool(true) => self.buf.write_u8(TYPE_TRUE)?,
            EncodableValue::Bool(false) => self.buf.write_u8(TYPE_FALSE)?,
            EncodableValue::Int32(v) => {
                self.buf.write_u8(TYPE_INT32)?;
                self.buf.write_i32::<LittleEndian>(*v)?;
            }
            EncodableValue::Int64(v) => {
                self.buf.write_u8(TYPE_INT64)?;
                self.buf.write_i64::<LittleEndian>(*v)?;
            }
            EncodableValue::Float64(v) => {
                self.buf.write_u8(TYPE_FLOAT64)?;
                self.align(8);
                self.buf.write_f64::<LittleEndian>(*v)?;
            }
            EncodableValue::String(s) => {
                self.buf.write_u8(TYPE_STRING)?;
                self.write_size(s.len())?;
                self.buf.extend_from_slice(s.as_bytes());
            }
            EncodableValue::Uint8List(bytes) => {
                self.buf.write_u8(TYPE_UINT8_LIST)?;
                self.write_size(bytes.len())?;
                self.buf.extend_from_slice(bytes);
            }
            EncodableValue::Int32List(items) => {
                self.buf.write_u8(TYPE_INT32_LIST)?;
                self.write_size(items.len())?;
                self.align(4);
                for v in items {
                    self.buf.write_i32::<LittleEndian>(*v)?;
                }
            }
            EncodableValue::Int64List(items) => {
                self.buf.write_u8(TYPE_INT64_LIST)?;
                self.write_size(items.len())?;
                self.align(8);
                for v in items {
                    self.buf.write_i64::<LittleEndian>(*v)?;
                }
            }
            EncodableValue::Float32List(items) => {
                self.buf.write_u8(TYPE_FLOAT32_LIST)?;
                self.write_size(items.len())?;
                self.align(4);
                for v in items {
                    self.buf.write_f32::<LittleEndian>(*v)?;
                }
            }
            EncodableValue::Float64List(items) => {
                self.buf.write_u8(TYPE_FLOAT64_LIST)?;
                self.write_size(items.len())?;
                self.align(8);
                for v in items {
                    self.buf.write_f64::<LittleEndian>(*v)?;
                }
            }
            EncodableValue::List(items) => {
                self.buf.write_u8(TYPE_LIST)?;
                self.write_size(items.len())?;
                for item in items {
                    self.write_value(item)?;
                }
            }
            EncodableValue::Map(entries) => {
                self.buf.write_u8(TYPE_MAP)?;
                self.write_size(entries.len())?;
                for (k, v) in entries {
                    self.write_value(k)?;
                    self.write_value(v)?;
                }
            }
        }
        Ok(())
    }
}

//---------------------------------------------------------------------------
// Reading
//---------------------------------------------------------------------------

struct Reader<'a> {
    cursor: Cursor<&'a [u8]>,
    depth: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self {
            cursor: Cursor::new(bytes),
            depth: 0,
        }
    }

    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len();
        len.saturating_sub(self.cursor.position() as usize)
    }

    fn has_remaining(&self) -> bool {
        self.remaining() > 0
    }

    fn align(&mut self, alignment: u64) {
        let pos = self.cursor.position();
        let pad = (alignment - pos % alignment) % alignment;
        self.cursor.set_position(pos + pad);
    }

    fn read_size(&mut self) -> Result<usize, CodecError> {
        let first = self.cursor.read_u8()?;
        let size = match first {
            254 => self.cursor.read_u16::<LittleEndian>()? as usize,
            255 => self.cursor.read_u32::<LittleEndian>()? as usize,
            n => n as usize,
        };
        Ok(size)
    }

    /// Reads `len` raw bytes, refusing lengths the buffer cannot hold.
    fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, CodecError> {
        if len > self.remaining() {
            return Err(CodecError::Truncated);
        }
        let mut out = vec![0u8; len];
        self.cursor.read_exact(&mut out)?;
        Ok(out)
    }

    fn enter(&mut self) -> Result<(), CodecError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(CodecError::TooDeep);
        }
        self.depth += 1;
        Ok(())
    }

    fn read_value(&mut self) -> Result<EncodableValue, CodecError> {
        let tag = self.cursor.read_u8()?;
        let value = match tag {
            TYPE_NULL => EncodableValue::Null,
            TYPE_TRUE => EncodableValue::Bool(true),
            TYPE_FALSE => EncodableValue::Bool(false),
            TYPE_INT32 => EncodableValue::Int32(self.cursor.read_i32::<LittleEndian>()?),
            TYPE_INT64 => EncodableValue::Int64(self.cursor.read_i64::<LittleEndian>()?),
            TYPE_LARGE_INT => return Err(CodecError::LargeIntUnsupported),
            TYPE_FLOAT64 => {
                self.align(8);
                EncodableValue::Float64(self.cursor.read_f64::<LittleEndian>()?)
            }
            TYPE_STRING => {
                let len = self.read_size()?;
                let bytes = self.read_bytes(len)?;
                // Invalid sequences become U+FFFD, as a lenient UTF-8 decoder would.
                EncodableValue::String(String::from_utf8_lossy(&bytes).into_owned())
            }
            TYPE_UINT8_LIST => {
                let len = self.read_size()?;
                EncodableValue::Uint8List(self.read_bytes(len)?)
            }
            TYPE_INT32_LIST => {
                let len = self.read_size()?;
                self.align(4);
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.cursor.read_i32::<LittleEndian>()?);
                }
                EncodableValue::Int32List(items)
            }
            TYPE_INT64_LIST => {
                let len = self.read_size()?;
                self.align(8);
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.cursor.read_i64::<LittleEndian>()?);
                }
                EncodableValue::Int64List(items)
            }
            TYPE_FLOAT32_LIST => {
                let len = self.read_size()?;
                self.align(4);
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.cursor.read_f32::<LittleEndian>()?);
                }
                EncodableValue::Float32List(items)
            }
            TYPE_FLOAT64_LIST => {
                let len = self.read_size()?;
                self.align(8);
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.cursor.read_f64::<LittleEndian>()?);
                }
                EncodableValue::Float64List(items)
            }
            TYPE_LIST => {
                let len = self.read_size()?;
                self.enter()?;
                let mut items = Vec::new();
                for _ in 0..len {
                    items.push(self.read_value()?);
                }
                self.depth -= 1;
                EncodableValue::List(items)
            }
            TYPE_MAP => {
                let len = self.read_size()?;
                self.enter()?;
                let mut entries = Vec::new();
                for _ in 0..len {
                    let key = self.read_value()?;
                    let value = self.read_value()?;
                    entries.push((key, value));
                }
                self.depth -= 1;
                EncodableValue::Map(entries)
            }
            other => return Err(CodecError::UnknownType(other)),
        };
        Ok(value)
    }
}

//---------------------------------------------------------------------------
// Message codec
//---------------------------------------------------------------------------

pub fn encode_value(value: &EncodableValue) -> Result<Vec<u8>, CodecError> {
    let mut writer = Writer::new();
    writer.write_value(value)?;
    Ok(writer.buf)
}

/// Decodes a single value. An empty message decodes to `Null`.
pub fn decode_value(bytes: &[u8]) -> Result<EncodableValue, CodecError> {
    if bytes.is_empty() {
        return Ok(EncodableValue::Null);
    }
    Reader::new(bytes).read_value()
}

//---------------------------------------------------------------------------
// Method codec
//---------------------------------------------------------------------------

pub fn encode_method_call(call: &MethodCall) -> Result<Vec<u8>, CodecError> {
    let mut writer = Writer::new();
    writer.write_value(&EncodableValue::String(call.method.clone()))?;
    writer.write_value(&call.arguments)?;
    Ok(writer.buf)
}

pub fn decode_method_call(bytes: &[u8]) -> Result<MethodCall, CodecError> {
    let mut reader = Reader::new(bytes);
    let method = match reader.read_value()? {
        EncodableValue::String(name) => name,
        _ => return Err(CodecError::MethodNameNotString),
    };
    let arguments = if reader.has_remaining() {
        reader.read_value()?
    } else {
        EncodableValue::Null
    };
    Ok(MethodCall { method, arguments })
}

pub fn encode_success_envelope(result: Option<&EncodableValue>) -> Result<Vec<u8>, CodecError> {
    let mut writer = Writer::new();
    writer.buf.write_u8(ENVELOPE_SUCCESS)?;
    writer.write_value(result.unwrap_or(&EncodableValue::Null))?;
    Ok(writer.buf)
}

pub fn encode_error_envelope(
    code: &str,
    message: Option<&str>,
    details: Option<&EncodableValue>,
) -> Result<Vec<u8>, CodecError> {
    let mut writer = Writer::new();
    writer.buf.write_u8(ENVELOPE_ERROR)?;
    writer.write_value(&EncodableValue::from(code))?;
    match message {
        Some(m) => writer.write_value(&EncodableValue::from(m))?,
        None => writer.write_value(&EncodableValue::Null)?,
    }
    writer.write_value(details.unwrap_or(&EncodableValue::Null))?;
    Ok(writer.buf)
}

pub fn decode_envelope(bytes: &[u8]) -> Result<MethodEnvelope, CodecError> {
    let mut reader = Reader::new(bytes);
    match reader.cursor.read_u8()? {
        ENVELOPE_SUCCESS => {
            let value = if reader.has_remaining() {
                reader.read_value()?
            } else {
                EncodableValue::Null
            };
            Ok(MethodEnvelope::Success(value))
        }
        ENVELOPE_ERROR => {
            let code = match reader.read_value()? {
                EncodableValue::String(code) => code,
                other => format!("{:?}", other),
            };
            let message = reader.read_value()?.as_str().map(str::to_owned);
            let details = if reader.has_remaining() {
                reader.read_value()?
            } else {
                EncodableValue::Null
            };
            Ok(MethodEnvelope::Error {
                code,
                message,
                details,
            })
        }
        other => Err(CodecError::InvalidEnvelope(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_title_call_matches_dart_encoding() {
        // What `invokeMethod('updateWindowTitle', {'title': 'Hi'})` puts on the wire.
        let mut expected = vec![TYPE_STRING, 17];
        expected.extend_from_slice(b"updateWindowTitle");
        expected.extend_from_slice(&[TYPE_MAP, 1, TYPE_STRING, 5]);
        expected.extend_from_slice(b"title");
        expected.extend_from_slice(&[TYPE_STRING, 2]);
        expected.extend_from_slice(b"Hi");

        let call = MethodCall::new(
            "updateWindowTitle",
            EncodableValue::Map(vec![("title".into(), "Hi".into())]),
        );
        assert_eq!(encode_method_call(&call).unwrap(), expected);
        assert_eq!(decode_method_call(&expected).unwrap(), call);
    }

    #[test]
    fn method_call_without_arguments_decodes_to_null() {
        let bytes = encode_value(&EncodableValue::from("ping")).unwrap();
        let call = decode_method_call(&bytes).unwrap();
        assert_eq!(call.method, "ping");
        assert_eq!(call.arguments, EncodableValue::Null);
    }

    #[test]
    fn method_name_must_be_a_string() {
        let bytes = encode_value(&EncodableValue::Int32(7)).unwrap();
        assert!(matches!(
            decode_method_call(&bytes),
            Err(CodecError::MethodNameNotString)
        ));
    }

    #[test]
    fn size_prefix_switches_to_u16_at_254() {
        let s = "a".repeat(300);
        let bytes = encode_value(&EncodableValue::String(s.clone())).unwrap();
        assert_eq!(&bytes[..4], &[TYPE_STRING, 254, 0x2c, 0x01]);
        assert_eq!(decode_value(&bytes).unwrap(), EncodableValue::String(s));
    }

    #[test]
    fn float64_is_aligned_to_eight_bytes() {
        let value = EncodableValue::List(vec![EncodableValue::Float64(1.5)]);
        let bytes = encode_value(&value).unwrap();
        // list tag, size, float tag, five bytes of padding, then the payload
        assert_eq!(bytes.len(), 16);
        assert_eq!(&bytes[3..8], &[0, 0, 0, 0, 0]);
        assert_eq!(decode_value(&bytes).unwrap(), value);
    }

    #[test]
    fn nested_values_survive_a_round_trip() {
        let value = EncodableValue::Map(vec![
            ("flags".into(), EncodableValue::List(vec![true.into(), false.into()])),
            ("big".into(), EncodableValue::Int64(1 << 40)),
            ("ints".into(), EncodableValue::Int32List(vec![1, -2, 3])),
            ("bytes".into(), EncodableValue::Uint8List(vec![9, 8, 7])),
            (EncodableValue::Int32(1), EncodableValue::Null),
        ]);
        let bytes = encode_value(&value).unwrap();
        assert_eq!(decode_value(&bytes).unwrap(), value);
    }

    #[test]
    fn truncated_string_is_rejected() {
        let bytes = [TYPE_STRING, 10, b'a', b'b'];
        assert!(matches!(decode_value(&bytes), Err(CodecError::Truncated)));
    }

    #[test]
    fn huge_declared_length_does_not_allocate() {
        let bytes = [TYPE_UINT8_LIST, 255, 0xff, 0xff, 0xff, 0xff];
        assert!(matches!(decode_value(&bytes), Err(CodecError::Truncated)));
    }

    fn nested_lists(depth: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(depth * 2 + 1);
        for _ in 0..depth {
            bytes.extend_from_slice(&[TYPE_LIST, 1]);
        }
        bytes.push(TYPE_NULL);
        bytes
    }

    #[test]
    fn nesting_up_to_the_limit_decodes() {
        let mut value = EncodableValue::Null;
        for _ in 0..MAX_NESTING_DEPTH {
            value = EncodableValue::List(vec![value]);
        }
        assert_eq!(decode_value(&nested_lists(MAX_NESTING_DEPTH)).unwrap(), value);
    }

    #[test]
    fn deeply_nested_arguments_are_rejected() {
        assert!(matches!(
            decode_value(&nested_lists(MAX_NESTING_DEPTH + 1)),
            Err(CodecError::TooDeep)
        ));

        let mut call = encode_value(&EncodableValue::from("updateWindowTitle")).unwrap();
        call.extend_from_slice(&nested_lists(2_000_000));
        assert!(matches!(decode_method_call(&call), Err(CodecError::TooDeep)));
    }

    #[test]
    fn sibling_lists_do_not_accumulate_depth() {
        let value = EncodableValue::List(
            (0..MAX_NESTING_DEPTH * 2)
                .map(|_| EncodableValue::List(vec![EncodableValue::Null]))
                .collect(),
        );
        let bytes = encode_value(&value).unwrap();
        assert_eq!(decode_value(&bytes).unwrap(), value);
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        assert!(matches!(decode_value(&[42]), Err(CodecError::UnknownType(42))));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let bytes = [TYPE_STRING, 2, b'o', 0xff];
        assert_eq!(
            decode_value(&bytes).unwrap(),
            EncodableValue::String("o\u{fffd}".to_string())
        );
    }

    #[test]
    fn empty_success_envelope_is_two_bytes() {
        let bytes = encode_success_envelope(None).unwrap();
        assert_eq!(bytes, vec![ENVELOPE_SUCCESS, TYPE_NULL]);
        assert_eq!(
            decode_envelope(&bytes).unwrap(),
            MethodEnvelope::Success(EncodableValue::Null)
        );
    }

    #[test]
    fn error_envelope_carries_code_and_message() {
        let bytes = encode_error_envelope("bad_args", Some("no title"), None).unwrap();
        assert_eq!(
            decode_envelope(&bytes).unwrap(),
            MethodEnvelope::Error {
                code: "bad_args".to_string(),
                message: Some("no title".to_string()),
                details: EncodableValue::Null,
            }
        );
    }

    #[test]
    fn lookup_only_matches_string_keys() {
        let map = EncodableValue::Map(vec![
            (EncodableValue::Int32(1), "one".into()),
            ("title".into(), "two".into()),
        ]);
        assert_eq!(map.lookup("title"), Some(&EncodableValue::from("two")));
        assert_eq!(map.lookup("missing"), None);
        assert_eq!(EncodableValue::Null.lookup("title"), None);
    }
}
