//! Fixed-width primitive codecs and the dynamic [`Value`] they produce.

use std::sync::Arc;

use byteorder::{BigEndian, ByteOrder, LittleEndian, NativeEndian, WriteBytesExt};
use winnow::Parser;
use winnow::binary::{self, Endianness};
use winnow::error::{ContextError, ErrMode};

use crate::binary::stream::{Sink, Source};
use crate::binary::structure::{Record, StructDef};
use crate::error::{ColError, ColResult};

type WResult<T> = Result<T, ErrMode<ContextError>>;

/// Fixed-width scalar kinds. Booleans occupy a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
    Str(String),
    Array(Vec<Value>),
    Record(Record),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::I8(_) => "i8",
            Value::U8(_) => "u8",
            Value::I16(_) => "i16",
            Value::U16(_) => "u16",
            Value::I32(_) => "i32",
            Value::U32(_) => "u32",
            Value::I64(_) => "i64",
            Value::U64(_) => "u64",
            Value::F32(_) => "f32",
            Value::F64(_) => "f64",
            Value::Bytes(_) => "bytes",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Record(_) => "record",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Value::U8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Value::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer value widened to `i128`.
    pub fn as_integer(&self) -> Option<i128> {
        Some(match self {
            Value::I8(v) => i128::from(*v),
            Value::U8(v) => i128::from(*v),
            Value::I16(v) => i128::from(*v),
            Value::U16(v) => i128::from(*v),
            Value::I32(v) => i128::from(*v),
            Value::U32(v) => i128::from(*v),
            Value::I64(v) => i128::from(*v),
            Value::U64(v) => i128::from(*v),
            _ => return None,
        })
    }

    /// Any numeric value widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        Some(match self {
            Value::I8(v) => *v as f64,
            Value::U8(v) => *v as f64,
            Value::I16(v) => *v as f64,
            Value::U16(v) => *v as f64,
            Value::I32(v) => *v as f64,
            Value::U32(v) => *v as f64,
            Value::I64(v) => *v as f64,
            Value::U64(v) => *v as f64,
            Value::F32(v) => *v as f64,
            Value::F64(v) => *v,
            _ => return None,
        })
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }
        )+
    };
}

value_from! {
    bool => Bool,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    Vec<u8> => Bytes,
    String => Str,
    Record => Record,
}

fn mismatch(expected: &str, value: &Value) -> ColError {
    ColError::format(format!("expected a {expected} value, got {}", value.kind()))
}

impl Primitive {
    pub const fn size(self) -> usize {
        match self {
            Primitive::Bool | Primitive::I8 | Primitive::U8 => 1,
            Primitive::I16 | Primitive::U16 => 2,
            Primitive::I32 | Primitive::U32 | Primitive::F32 => 4,
            Primitive::I64 | Primitive::U64 | Primitive::F64 => 8,
        }
    }

    pub fn pack<S: Sink + ?Sized>(
        self,
        sink: &mut S,
        endian: Endianness,
        value: &Value,
    ) -> ColResult<()> {
        let mut buf = Vec::with_capacity(self.size());
        match endian {
            Endianness::Big => self.encode::<BigEndian>(&mut buf, value)?,
            Endianness::Little => self.encode::<LittleEndian>(&mut buf, value)?,
            Endianness::Native => self.encode::<NativeEndian>(&mut buf, value)?,
        }
        sink.write_bytes(&buf)
    }

    pub fn unpack<S: Source + ?Sized>(self, source: &mut S, endian: Endianness) -> ColResult<Value> {
        let bytes = source.take_bytes(self.size())?;
        let input = &mut &bytes[..];
        Ok(self.decode(input, endian)?)
    }

    fn encode<B: ByteOrder>(self, buf: &mut Vec<u8>, value: &Value) -> ColResult<()> {
        match (self, value) {
            (Primitive::Bool, Value::Bool(v)) => buf.write_u8(u8::from(*v))?,
            (Primitive::I8, Value::I8(v)) => buf.write_i8(*v)?,
            (Primitive::U8, Value::U8(v)) => buf.write_u8(*v)?,
            (Primitive::I16, Value::I16(v)) => buf.write_i16::<B>(*v)?,
            (Primitive::U16, Value::U16(v)) => buf.write_u16::<B>(*v)?,
            (Primitive::I32, Value::I32(v)) => buf.write_i32::<B>(*v)?,
            (Primitive::U32, Value::U32(v)) => buf.write_u32::<B>(*v)?,
            (Primitive::I64, Value::I64(v)) => buf.write_i64::<B>(*v)?,
            (Primitive::U64, Value::U64(v)) => buf.write_u64::<B>(*v)?,
            (Primitive::F32, Value::F32(v)) => buf.write_f32::<B>(*v)?,
            (Primitive::F64, Value::F64(v)) => buf.write_f64::<B>(*v)?,
            (prim, value) => return Err(mismatch(prim.name(), value)),
        }
        Ok(())
    }

    fn decode(self, input: &mut &[u8], endian: Endianness) -> WResult<Value> {
        match self {
            Primitive::Bool => binary::u8.map(|v| Value::Bool(v != 0)).parse_next(input),
            Primitive::I8 => binary::i8.map(Value::I8).parse_next(input),
            Primitive::U8 => binary::u8.map(Value::U8).parse_next(input),
            Primitive::I16 => binary::i16(endian).map(Value::I16).parse_next(input),
            Primitive::U16 => binary::u16(endian).map(Value::U16).parse_next(input),
            Primitive::I32 => binary::i32(endian).map(Value::I32).parse_next(input),
            Primitive::U32 => binary::u32(endian).map(Value::U32).parse_next(input),
            Primitive::I64 => binary::i64(endian).map(Value::I64).parse_next(input),
            Primitive::U64 => binary::u64(endian).map(Value::U64).parse_next(input),
            Primitive::F32 => binary::f32(endian).map(Value::F32).parse_next(input),
            Primitive::F64 => binary::f64(endian).map(Value::F64).parse_next(input),
        }
    }

    fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::I8 => "i8",
            Primitive::U8 => "u8",
            Primitive::I16 => "i16",
            Primitive::U16 => "u16",
            Primitive::I32 => "i32",
            Primitive::U32 => "u32",
            Primitive::I64 => "i64",
            Primitive::U64 => "u64",
            Primitive::F32 => "f32",
            Primitive::F64 => "f64",
        }
    }

    fn is_integer(self) -> bool {
        !matches!(self, Primitive::Bool | Primitive::F32 | Primitive::F64)
    }

    /// Build an integer value of this kind, failing if `raw` does not fit.
    fn integer_value(self, raw: i128) -> ColResult<Value> {
        let out_of_range =
            || ColError::format(format!("{raw} does not fit in a {} field", self.name()));
        Ok(match self {
            Primitive::I8 => Value::I8(i8::try_from(raw).map_err(|_| out_of_range())?),
            Primitive::U8 => Value::U8(u8::try_from(raw).map_err(|_| out_of_range())?),
            Primitive::I16 => Value::I16(i16::try_from(raw).map_err(|_| out_of_range())?),
            Primitive::U16 => Value::U16(u16::try_from(raw).map_err(|_| out_of_range())?),
            Primitive::I32 => Value::I32(i32::try_from(raw).map_err(|_| out_of_range())?),
            Primitive::U32 => Value::U32(u32::try_from(raw).map_err(|_| out_of_range())?),
            Primitive::I64 => Value::I64(i64::try_from(raw).map_err(|_| out_of_range())?),
            Primitive::U64 => Value::U64(u64::try_from(raw).map_err(|_| out_of_range())?),
            _ => return Err(ColError::format(format!("{} is not an integer kind", self.name()))),
        })
    }
}

/// The type of a single struct field.
#[derive(Debug, Clone)]
pub enum FieldType {
    Primitive(Primitive),
    /// An integer stored on disk, exposed as `raw * scale`. Packing truncates
    /// toward zero.
    FixedPoint { raw: Primitive, scale: f64 },
    /// Exactly `len` raw bytes.
    ByteString(usize),
    /// Exactly `len` elements of `element`.
    Array { element: Box<FieldType>, len: usize },
    /// ASCII text followed by a NUL byte. No fixed size.
    CString,
    /// ASCII text preceded by its byte length. No fixed size.
    PString { length: Primitive },
    Struct(Arc<StructDef>),
}

impl From<Primitive> for FieldType {
    fn from(p: Primitive) -> Self {
        FieldType::Primitive(p)
    }
}

impl FieldType {
    pub fn array(element: impl Into<FieldType>, len: usize) -> Self {
        FieldType::Array {
            element: Box::new(element.into()),
            len,
        }
    }

    /// Encoded size, or `None` for variable-length types.
    pub fn size(&self) -> Option<usize> {
        match self {
            FieldType::Primitive(p) => Some(p.size()),
            FieldType::FixedPoint { raw, .. } => Some(raw.size()),
            FieldType::ByteString(len) => Some(*len),
            FieldType::Array { element, len } => element.size().map(|size| size * len),
            FieldType::CString | FieldType::PString { .. } => None,
            FieldType::Struct(def) => def.size(),
        }
    }

    pub fn pack<S: Sink + ?Sized>(
        &self,
        sink: &mut S,
        endian: Endianness,
        value: &Value,
    ) -> ColResult<()> {
        match self {
            FieldType::Primitive(p) => p.pack(sink, endian, value),
            FieldType::FixedPoint { raw, scale } => {
                if !raw.is_integer() {
                    return Err(ColError::format("fixed-point fields need an integer base"));
                }
                let real = value.as_f64().ok_or_else(|| mismatch("numeric", value))?;
                let scaled = real / scale;
                if !scaled.is_finite() {
                    return Err(ColError::format(format!(
                        "{real} / {scale} is not a finite fixed-point value"
                    )));
                }
                let stored = raw.integer_value(scaled.trunc() as i128)?;
                raw.pack(sink, endian, &stored)
            }
            FieldType::ByteString(len) => {
                let Value::Bytes(bytes) = value else {
                    return Err(mismatch("bytes", value));
                };
                if bytes.len() != *len {
                    return Err(ColError::format(format!(
                        "wrong byte string length: expected {len}, got {}",
                        bytes.len()
                    )));
                }
                sink.write_bytes(bytes)
            }
            FieldType::Array { element, len } => {
                let Value::Array(items) = value else {
                    return Err(mismatch("array", value));
                };
                if items.len() != *len {
                    return Err(ColError::format(format!(
                        "wrong array length: expected {len}, got {}",
                        items.len()
                    )));
                }
                for item in items {
                    element.pack(sink, endian, item)?;
                }
                Ok(())
            }
            FieldType::CString => {
                let text = ascii_text(value)?;
                if text.as_bytes().contains(&0) {
                    return Err(ColError::format("NUL byte inside a NUL-terminated string"));
                }
                sink.write_bytes(text.as_bytes())?;
                sink.write_bytes(&[0])
            }
            FieldType::PString { length } => {
                let text = ascii_text(value)?;
                let len = length.integer_value(text.len() as i128)?;
                length.pack(sink, endian, &len)?;
                sink.write_bytes(text.as_bytes())
            }
            FieldType::Struct(def) => {
                let Value::Record(record) = value else {
                    return Err(mismatch("record", value));
                };
                def.pack(sink, record)
            }
        }
    }

    pub fn unpack<S: Source + ?Sized>(&self, source: &mut S, endian: Endianness) -> ColResult<Value> {
        match self {
            FieldType::Primitive(p) => p.unpack(source, endian),
            FieldType::FixedPoint { raw, scale } => {
                let stored = raw.unpack(source, endian)?;
                let stored = stored.as_f64().ok_or_else(|| mismatch("numeric", &stored))?;
                Ok(Value::F64(stored * scale))
            }
            FieldType::ByteString(len) => Ok(Value::Bytes(source.take_bytes(*len)?)),
            FieldType::Array { element, len } => {
                let items = (0..*len)
                    .map(|_| element.unpack(source, endian))
                    .collect::<ColResult<Vec<_>>>()?;
                Ok(Value::Array(items))
            }
            FieldType::CString => {
                let mut bytes = Vec::new();
                loop {
                    let byte = source.take_bytes(1)?[0];
                    if byte == 0 {
                        break;
                    }
                    bytes.push(byte);
                }
                decode_ascii(bytes)
            }
            FieldType::PString { length } => {
                let len = length.unpack(source, endian)?;
                let len = len.as_integer().ok_or_else(|| mismatch("integer", &len))?;
                let len = usize::try_from(len)
                    .map_err(|_| ColError::format(format!("invalid string length {len}")))?;
                decode_ascii(source.take_bytes(len)?)
            }
            FieldType::Struct(def) => Ok(Value::Record(def.unpack(source)?)),
        }
    }
}

fn ascii_text(value: &Value) -> ColResult<&str> {
    let Value::Str(text) = value else {
        return Err(mismatch("string", value));
    };
    if !text.is_ascii() {
        return Err(ColError::format(format!("non-ASCII text {text:?}")));
    }
    Ok(text)
}

fn decode_ascii(bytes: Vec<u8>) -> ColResult<Value> {
    if !bytes.is_ascii() {
        return Err(ColError::format("non-ASCII bytes in string field"));
    }
    String::from_utf8(bytes)
        .map(Value::Str)
        .map_err(|e| ColError::format(format!("{e}")))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn packed(ty: &FieldType, endian: Endianness, value: Value) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        ty.pack(&mut cursor, endian, &value).unwrap();
        cursor.into_inner()
    }

    #[test]
    fn big_endian_layout() {
        assert_eq!(
            packed(&Primitive::U32.into(), Endianness::Big, Value::U32(0x0102_0304)),
            [1, 2, 3, 4]
        );
        assert_eq!(
            packed(&Primitive::U16.into(), Endianness::Little, Value::U16(0x0102)),
            [2, 1]
        );
        assert_eq!(
            packed(&Primitive::F32.into(), Endianness::Big, Value::F32(1.0)),
            [0x3F, 0x80, 0, 0]
        );
        assert_eq!(
            packed(&Primitive::Bool.into(), Endianness::Big, Value::Bool(true)),
            [1]
        );
    }

    #[test]
    fn unpack_signed() {
        let data = [0xFF, 0xFE];
        let mut cursor = Cursor::new(&data[..]);
        let value = Primitive::I16.unpack(&mut cursor, Endianness::Big).unwrap();
        assert_eq!(value, Value::I16(-2));
    }

    #[test]
    fn kind_mismatch_is_format_error() {
        let mut cursor = Cursor::new(Vec::new());
        let err = Primitive::U16
            .pack(&mut cursor, Endianness::Big, &Value::U32(1))
            .unwrap_err();
        assert!(matches!(err, ColError::Format { .. }));
    }

    #[test]
    fn byte_string_length_checked() {
        let mut cursor = Cursor::new(Vec::new());
        let err = FieldType::ByteString(4)
            .pack(&mut cursor, Endianness::Big, &Value::Bytes(vec![1, 2, 3]))
            .unwrap_err();
        assert!(matches!(err, ColError::Format { .. }));

        let err = FieldType::array(Primitive::U8, 2)
            .pack(&mut cursor, Endianness::Big, &Value::Array(vec![Value::U8(1)]))
            .unwrap_err();
        assert!(matches!(err, ColError::Format { .. }));
    }

    #[test]
    fn strings() {
        let bytes = packed(&FieldType::CString, Endianness::Big, Value::Str("abc".into()));
        assert_eq!(bytes, b"abc\0");
        let value = FieldType::CString
            .unpack(&mut Cursor::new(&bytes[..]), Endianness::Big)
            .unwrap();
        assert_eq!(value, Value::Str("abc".into()));

        let pstring = FieldType::PString {
            length: Primitive::U8,
        };
        let bytes = packed(&pstring, Endianness::Big, Value::Str("hi".into()));
        assert_eq!(bytes, [2, b'h', b'i']);
        assert_eq!(pstring.size(), None);
    }

    #[test]
    fn pstring_length_prefix_is_checked() {
        let huge = FieldType::PString {
            length: Primitive::U64,
        }
        .unpack(&mut Cursor::new(&[0xFF; 8][..]), Endianness::Big)
        .unwrap_err();
        assert!(matches!(huge, ColError::EndOfStream { offset: 8, .. }));

        let long = FieldType::PString {
            length: Primitive::U32,
        }
        .unpack(&mut Cursor::new(&[0xFF, 0xFF, 0xFF, 0xFF, b'a'][..]), Endianness::Big)
        .unwrap_err();
        assert!(matches!(
            long,
            ColError::EndOfStream {
                offset: 4,
                needed: 0xFFFF_FFFF
            }
        ));

        let negative = FieldType::PString {
            length: Primitive::I8,
        }
        .unpack(&mut Cursor::new(&[0xFF, b'a'][..]), Endianness::Big)
        .unwrap_err();
        assert!(matches!(negative, ColError::Format { .. }));
    }

    #[test]
    fn unterminated_cstring() {
        let err = FieldType::CString
            .unpack(&mut Cursor::new(&b"abc"[..]), Endianness::Big)
            .unwrap_err();
        assert!(matches!(err, ColError::EndOfStream { offset: 3, .. }));
    }

    #[test]
    fn fixed_point() {
        let ty = FieldType::FixedPoint {
            raw: Primitive::I16,
            scale: 0.5,
        };
        let bytes = packed(&ty, Endianness::Big, Value::F64(-3.0));
        assert_eq!(bytes, (-6i16).to_be_bytes());
        let value = ty.unpack(&mut Cursor::new(&bytes[..]), Endianness::Big).unwrap();
        assert_eq!(value, Value::F64(-3.0));

        let mut cursor = Cursor::new(Vec::new());
        let err = FieldType::FixedPoint {
            raw: Primitive::U8,
            scale: 1.0,
        }
        .pack(&mut cursor, Endianness::Big, &Value::F64(300.0))
        .unwrap_err();
        assert!(matches!(err, ColError::Format { .. }));

        for real in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = ty
                .pack(&mut cursor, Endianness::Big, &Value::F64(real))
                .unwrap_err();
            assert!(matches!(err, ColError::Format { .. }));
        }
        let zero_scale = FieldType::FixedPoint {
            raw: Primitive::I32,
            scale: 0.0,
        };
        assert!(zero_scale.pack(&mut cursor, Endianness::Big, &Value::F64(1.0)).is_err());
        assert!(cursor.get_ref().is_empty());
    }

    #[test]
    fn array_size() {
        let ty = FieldType::array(Primitive::U16, 3);
        assert_eq!(ty.size(), Some(6));
        assert_eq!(FieldType::array(FieldType::CString, 3).size(), None);
    }
}
