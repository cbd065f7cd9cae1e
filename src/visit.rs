//! Event-driven decoding of compact-form messages.
//!
//! [`decode_message`] walks one length-prefixed dynamic group from a
//! stream, using the schema to interpret the payload, and fires
//! [`MessageVisitor`] callbacks as groups, fields, and values are
//! encountered. The object model's decoder is a visitor that collects
//! the events into a tree.

use crate::compact::{self, Decimal};
use crate::schema::{FieldView, GroupView, Schema, TypeTag, UNBOUNDED_SIZE};
use crate::stream::{self, InputBuffer, MAX_IO_LEN, Stream};
use crate::vlc;
use log::debug;
use std::{error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Compact(compact::Error),
    Stream(stream::Error),
    /// Null where a group frame is required.
    NullGroup,
    UnknownGroupId(u64),
    /// Received group has no kind-of relation to the declared one.
    UnexpectedGroup { want: String, got: String },
    /// Null in a required field.
    NullField { field: String },
    /// Decoded string or binary exceeds the declared maximum.
    SizeExceeded { field: String },
    /// Decoded enum value matches no symbol.
    BadEnumValue { field: String, value: i32 },
    /// Fields ran past the declared payload length.
    PayloadOverrun,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compact(err) => err.fmt(f),
            Self::Stream(err) => err.fmt(f),
            Self::NullGroup => f.write_str("group cannot be null here"),
            Self::UnknownGroupId(id) => write!(f, "unknown group id {id}"),
            Self::UnexpectedGroup { want, got } => {
                write!(f, "group '{got}' is not a kind of '{want}'")
            }
            Self::NullField { field } => write!(f, "field '{field}' cannot be null"),
            Self::SizeExceeded { field } => {
                write!(f, "field '{field}' exceeds its declared size")
            }
            Self::BadEnumValue { field, value } => {
                write!(f, "value {value} of field '{field}' matches no enum symbol")
            }
            Self::PayloadOverrun => f.write_str("group payload is shorter than its fields"),
        }
    }
}

impl error::Error for Error {}

impl From<compact::Error> for Error {
    fn from(err: compact::Error) -> Self {
        Self::Compact(err)
    }
}

impl From<stream::Error> for Error {
    fn from(err: stream::Error) -> Self {
        Self::Stream(err)
    }
}

impl From<vlc::Error> for Error {
    fn from(err: vlc::Error) -> Self {
        Self::Compact(err.into())
    }
}

/// A single decoded value. Byte slices borrow decoder scratch space and
/// are only valid for the duration of the callback; the enum symbol
/// name borrows the schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WireValue<'a, 's> {
    Bool(bool),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    F64(f64),
    Decimal(Decimal),
    Date(i32),
    TimeOfDayMilli(u32),
    TimeOfDayNano(u64),
    MilliTime(i64),
    NanoTime(i64),
    String(&'a [u8]),
    Binary(&'a [u8]),
    Fixed(&'a [u8]),
    Enum(&'s str, i32),
}

/// A visitor which receives callbacks while decoding a compact-form
/// message.
pub trait MessageVisitor<'s> {
    /// A group frame opened: the top-level group, a nested dynamic
    /// group (`dynamic`), or an embedded static group.
    fn begin_group(&mut self, _group: GroupView<'s>, _dynamic: bool) {}
    fn end_group(&mut self, _group: GroupView<'s>) {}
    /// Called before the wire content of every visible field.
    fn begin_field(&mut self, _field: FieldView<'s>) {}
    fn end_field(&mut self, _field: FieldView<'s>) {}
    fn begin_sequence(&mut self, _count: u32) {}
    fn end_sequence(&mut self) {}
    /// An optional field or sequence was absent.
    fn null(&mut self) {}
    fn value(&mut self, _value: WireValue<'_, 's>) {}
}

/// Decode one dynamic-group message from `input`, firing `visitor`
/// callbacks. Unconsumed bytes inside the declared payload length are
/// skipped to honour forward extension.
pub fn decode_message<'s, V: MessageVisitor<'s>>(
    schema: &'s Schema,
    input: &mut dyn Stream,
    visitor: &mut V,
) -> Result<(), Error> {
    match decode_dynamic_group(schema, input, None, visitor)? {
        Some(()) => Ok(()),
        None => Err(Error::NullGroup),
    }
}

/// Returns `None` when the frame's length prefix carries null.
fn decode_dynamic_group<'s, V: MessageVisitor<'s>>(
    schema: &'s Schema,
    input: &mut dyn Stream,
    expect: Option<GroupView<'s>>,
    visitor: &mut V,
) -> Result<Option<()>, Error> {
    let Some(len) = vlc::decode_unsigned(input)? else {
        return Ok(None);
    };
    if len > MAX_IO_LEN as u64 {
        return Err(Error::Stream(stream::Error::Overflow));
    }
    let mut payload = vec![0u8; len as usize];
    input.read(&mut payload)?;
    let mut frame = InputBuffer::new(&payload);

    let result = decode_frame(schema, &mut frame, expect, visitor);
    // an EOF inside the frame means the declared length was too short
    // for the fields, not that the outer stream ended
    result.map_err(|err| match err {
        Error::Stream(stream::Error::Eof) => Error::PayloadOverrun,
        err => err,
    })?;
    Ok(Some(()))
}

fn decode_frame<'s, V: MessageVisitor<'s>>(
    schema: &'s Schema,
    frame: &mut InputBuffer<'_>,
    expect: Option<GroupView<'s>>,
    visitor: &mut V,
) -> Result<(), Error> {
    let Some(id) = vlc::decode_unsigned(frame)? else {
        return Err(Error::NullGroup);
    };
    let group = schema.group_by_id(id).ok_or_else(|| {
        debug!("W2: group id {id} is unknown");
        Error::UnknownGroupId(id)
    })?;
    if let Some(want) = expect {
        if !group.is_kind_of(want) {
            debug!("W19: group '{}' is not a kind of '{}'", group.name(), want.name());
            return Err(Error::UnexpectedGroup {
                want: want.name().to_owned(),
                got: group.name().to_owned(),
            });
        }
    }

    visitor.begin_group(group, true);
    decode_fields(schema, group, frame, visitor)?;
    visitor.end_group(group);
    Ok(())
}

fn decode_fields<'s, V: MessageVisitor<'s>>(
    schema: &'s Schema,
    group: GroupView<'s>,
    input: &mut dyn Stream,
    visitor: &mut V,
) -> Result<(), Error> {
    for field in group.fields() {
        visitor.begin_field(field);
        if field.is_sequence() {
            match compact::decode_u32(input)? {
                None => absent(field, field.is_optional(), visitor)?,
                Some(count) => {
                    visitor.begin_sequence(count);
                    for _ in 0..count {
                        decode_item(schema, field, input, false, visitor)?;
                    }
                    visitor.end_sequence();
                }
            }
        } else {
            decode_item(schema, field, input, field.is_optional(), visitor)?;
        }
        visitor.end_field(field);
    }
    Ok(())
}

fn absent<'s, V: MessageVisitor<'s>>(
    field: FieldView<'s>,
    optional: bool,
    visitor: &mut V,
) -> Result<(), Error> {
    if optional {
        visitor.null();
        Ok(())
    } else {
        debug!("W5: field '{}' cannot be null", field.name());
        Err(Error::NullField {
            field: field.name().to_owned(),
        })
    }
}

fn check_size(field: FieldView<'_>, len: usize) -> Result<(), Error> {
    let size = field.size();
    if size != UNBOUNDED_SIZE && len as u64 > u64::from(size) {
        debug!("W4: field '{}' exceeds its declared size", field.name());
        return Err(Error::SizeExceeded {
            field: field.name().to_owned(),
        });
    }
    Ok(())
}

/// Decode one value of a field. `optional` enables the null forms;
/// sequence elements pass `false` because absence is expressed by the
/// element count alone.
fn decode_item<'s, V: MessageVisitor<'s>>(
    schema: &'s Schema,
    field: FieldView<'s>,
    input: &mut dyn Stream,
    optional: bool,
    visitor: &mut V,
) -> Result<(), Error> {
    match field.type_tag() {
        TypeTag::Bool => match compact::decode_bool(input)? {
            Some(v) => visitor.value(WireValue::Bool(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::U8 => match compact::decode_u8(input)? {
            Some(v) => visitor.value(WireValue::U8(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::U16 => match compact::decode_u16(input)? {
            Some(v) => visitor.value(WireValue::U16(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::U32 => match compact::decode_u32(input)? {
            Some(v) => visitor.value(WireValue::U32(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::U64 => match compact::decode_u64(input)? {
            Some(v) => visitor.value(WireValue::U64(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::I8 => match compact::decode_i8(input)? {
            Some(v) => visitor.value(WireValue::I8(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::I16 => match compact::decode_i16(input)? {
            Some(v) => visitor.value(WireValue::I16(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::I32 => match compact::decode_i32(input)? {
            Some(v) => visitor.value(WireValue::I32(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::I64 => match compact::decode_i64(input)? {
            Some(v) => visitor.value(WireValue::I64(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::F64 => match compact::decode_f64(input)? {
            Some(v) => visitor.value(WireValue::F64(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::Decimal => match compact::decode_decimal(input)? {
            Some(v) => visitor.value(WireValue::Decimal(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::Date => match compact::decode_i32(input)? {
            Some(v) => visitor.value(WireValue::Date(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::TimeOfDayMilli => match compact::decode_u32(input)? {
            Some(v) => visitor.value(WireValue::TimeOfDayMilli(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::TimeOfDayNano => match compact::decode_u64(input)? {
            Some(v) => visitor.value(WireValue::TimeOfDayNano(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::MilliTime => match compact::decode_i64(input)? {
            Some(v) => visitor.value(WireValue::MilliTime(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::NanoTime => match compact::decode_i64(input)? {
            Some(v) => visitor.value(WireValue::NanoTime(v)),
            None => return absent(field, optional, visitor),
        },
        TypeTag::String => match compact::decode_string(input)? {
            Some(v) => {
                check_size(field, v.len())?;
                visitor.value(WireValue::String(&v));
            }
            None => return absent(field, optional, visitor),
        },
        TypeTag::Binary => match compact::decode_binary(input)? {
            Some(v) => {
                check_size(field, v.len())?;
                visitor.value(WireValue::Binary(&v));
            }
            None => return absent(field, optional, visitor),
        },
        TypeTag::Fixed => {
            let value = if optional {
                compact::decode_optional_fixed(input, field.size())?
            } else {
                Some(compact::decode_fixed(input, field.size())?)
            };
            match value {
                Some(v) => visitor.value(WireValue::Fixed(&v)),
                None => {
                    visitor.null();
                }
            }
        }
        TypeTag::Enum => match compact::decode_i32(input)? {
            Some(v) => {
                let symbol = field
                    .enumeration()
                    .and_then(|e| e.symbol_by_value(v))
                    .ok_or_else(|| {
                        debug!("W10: value {v} of '{}' matches no symbol", field.name());
                        Error::BadEnumValue {
                            field: field.name().to_owned(),
                            value: v,
                        }
                    })?;
                visitor.value(WireValue::Enum(symbol.name(), v));
            }
            None => return absent(field, optional, visitor),
        },
        TypeTag::StaticGroup => {
            if optional && !compact::decode_present(input)? {
                visitor.null();
                return Ok(());
            }
            let Some(nested) = field.group() else {
                return Err(Error::NullGroup);
            };
            visitor.begin_group(nested, false);
            decode_fields(schema, nested, input, visitor)?;
            visitor.end_group(nested);
        }
        TypeTag::DynamicGroup => {
            let expect = field.group();
            if decode_dynamic_group(schema, input, expect, visitor)?.is_none() {
                return absent(field, optional, visitor);
            }
        }
        TypeTag::Object => {
            if decode_dynamic_group(schema, input, None, visitor)?.is_none() {
                return absent(field, optional, visitor);
            }
        }
    }
    Ok(())
}
