//! Declarative struct layouts.
//!
//! A [`StructDef`] is an ordered list of named fields and anonymous padding
//! runs. Fields are packed and unpacked strictly in declaration order, so the
//! on-disk layout is exactly the sum of the members with no implicit
//! alignment. Decoded values live in a [`Record`], which never stores padding.

use winnow::binary::Endianness;

use crate::binary::primitive::{FieldType, Value};
use crate::binary::stream::{Sink, Source};
use crate::error::{ColError, ColResult};

/// Fill byte used for padding runs that do not specify one.
pub const DEFAULT_PADDING_FILL: u8 = 0xFF;

/// Pattern repeated by [`align`] when no other pattern is supplied.
pub const ALIGNMENT_PATTERN: &[u8] = b"This is padding data to alignment.";

#[derive(Debug, Clone)]
pub enum Member {
    Field { name: String, ty: FieldType },
    /// Written verbatim as `len` copies of `fill`; skipped on unpack.
    Padding { len: usize, fill: u8 },
}

impl Member {
    fn size(&self) -> Option<usize> {
        match self {
            Member::Field { ty, .. } => ty.size(),
            Member::Padding { len, .. } => Some(*len),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StructDef {
    name: String,
    endian: Endianness,
    members: Vec<Member>,
    size: Option<usize>,
}

#[derive(Debug)]
pub struct StructBuilder {
    name: String,
    endian: Endianness,
    members: Vec<Member>,
}

impl StructBuilder {
    pub fn field(mut self, name: impl Into<String>, ty: impl Into<FieldType>) -> Self {
        self.members.push(Member::Field {
            name: name.into(),
            ty: ty.into(),
        });
        self
    }

    pub fn padding(self, len: usize) -> Self {
        self.padding_with(len, DEFAULT_PADDING_FILL)
    }

    pub fn padding_with(mut self, len: usize, fill: u8) -> Self {
        self.members.push(Member::Padding { len, fill });
        self
    }

    pub fn build(self) -> StructDef {
        let size = self
            .members
            .iter()
            .map(Member::size)
            .sum::<Option<usize>>();
        StructDef {
            name: self.name,
            endian: self.endian,
            members: self.members,
            size,
        }
    }
}

impl StructDef {
    pub fn builder(name: impl Into<String>, endian: Endianness) -> StructBuilder {
        StructBuilder {
            name: name.into(),
            endian,
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endian(&self) -> Endianness {
        self.endian
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Total encoded size, or `None` if any member is variable-length.
    pub fn size(&self) -> Option<usize> {
        self.size
    }

    /// Like [`size`](Self::size), but an error for variable-length structs.
    /// Tables of records must go through this.
    pub fn fixed_size(&self) -> ColResult<usize> {
        self.size.ok_or_else(|| {
            ColError::format(format!("struct {} has no fixed size", self.name))
        })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.members.iter().filter_map(|member| match member {
            Member::Field { name, .. } => Some(name.as_str()),
            Member::Padding { .. } => None,
        })
    }

    pub fn pack<S: Sink + ?Sized>(&self, sink: &mut S, record: &Record) -> ColResult<()> {
        for member in &self.members {
            match member {
                Member::Field { name, ty } => {
                    let value = record.get(name).ok_or_else(|| {
                        ColError::format(format!("{} record is missing field {name}", self.name))
                    })?;
                    ty.pack(sink, self.endian, value)?;
                }
                Member::Padding { len, fill } => sink.write_bytes(&vec![*fill; *len])?,
            }
        }
        Ok(())
    }

    pub fn unpack<S: Source + ?Sized>(&self, source: &mut S) -> ColResult<Record> {
        let mut record = Record::default();
        for member in &self.members {
            match member {
                Member::Field { name, ty } => {
                    let value = ty.unpack(source, self.endian)?;
                    record.fields.push((name.clone(), value));
                }
                Member::Padding { len, .. } => {
                    source.take_bytes(*len)?;
                }
            }
        }
        Ok(record)
    }

    /// Unpack `count` consecutive records. Stops at the first failure, so a
    /// truncated table never yields a partial list.
    pub fn unpack_table<S: Source + ?Sized>(
        &self,
        source: &mut S,
        count: usize,
    ) -> ColResult<Vec<Record>> {
        self.fixed_size()?;
        (0..count).map(|_| self.unpack(source)).collect()
    }
}

/// Field values of one struct instance, in declaration order.
///
/// Equality compares every field; padding is not part of a record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Set `name`, replacing any existing value.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    fn require(&self, name: &str) -> ColResult<&Value> {
        self.get(name)
            .ok_or_else(|| ColError::format(format!("record has no field {name}")))
    }

    pub fn u8(&self, name: &str) -> ColResult<u8> {
        let value = self.require(name)?;
        value
            .as_u8()
            .ok_or_else(|| ColError::format(format!("field {name} is {}, not u8", value.kind())))
    }

    pub fn u16(&self, name: &str) -> ColResult<u16> {
        let value = self.require(name)?;
        value
            .as_u16()
            .ok_or_else(|| ColError::format(format!("field {name} is {}, not u16", value.kind())))
    }

    pub fn u32(&self, name: &str) -> ColResult<u32> {
        let value = self.require(name)?;
        value
            .as_u32()
            .ok_or_else(|| ColError::format(format!("field {name} is {}, not u32", value.kind())))
    }

    pub fn f32(&self, name: &str) -> ColResult<f32> {
        let value = self.require(name)?;
        value
            .as_f32()
            .ok_or_else(|| ColError::format(format!("field {name} is {}, not f32", value.kind())))
    }

    pub fn bool(&self, name: &str) -> ColResult<bool> {
        let value = self.require(name)?;
        value
            .as_bool()
            .ok_or_else(|| ColError::format(format!("field {name} is {}, not bool", value.kind())))
    }
}

/// Pad the stream up to the next multiple of `boundary` by repeating
/// `pattern` (truncated on the last repetition).
pub fn align<S: Sink + ?Sized>(sink: &mut S, boundary: u64, pattern: &[u8]) -> ColResult<()> {
    if boundary == 0 || pattern.is_empty() {
        return Err(ColError::format("alignment needs a non-zero boundary and pattern"));
    }
    let remainder = sink.tell()? % boundary;
    if remainder == 0 {
        return Ok(());
    }
    let fill: Vec<u8> = pattern
        .iter()
        .copied()
        .cycle()
        .take((boundary - remainder) as usize)
        .collect();
    sink.write_bytes(&fill)
}
