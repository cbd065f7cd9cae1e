//! Runtime group instances.
//!
//! An [`Object`] is created for a group definition and carries one slot
//! per field visible through inheritance. Slots are populated by name
//! through the typed setters or by [`Object::decode_compact`]; an
//! uninitialised slot is the null value of an optional field.

use crate::compact::{self, Decimal};
use crate::schema::{FieldView, GroupView, Schema, TypeTag, UNBOUNDED_SIZE};
use crate::stream::{self, Stream, VecStream};
use crate::vlc;
use crate::visit::{self, MessageVisitor, WireValue};
use log::debug;
use std::collections::HashMap;
use std::{error, fmt};

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    UnknownField { field: String },
    TypeMismatch { field: String },
    /// String or binary over the declared maximum, or fixed of the
    /// wrong length.
    SizeViolation { field: String },
    UnknownSymbol { field: String, symbol: String },
    /// A dynamic-group slot only accepts a group with an id.
    GroupWithoutId { field: String },
    /// The value's group has no kind-of relation to the declared one.
    WrongGroup { field: String },
    /// Required field left uninitialised at encode time.
    NullField { field: String },
    InvalidUtf8 { field: String },
    Encode(stream::Error),
    Decode(visit::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField { field } => write!(f, "no field named '{field}'"),
            Self::TypeMismatch { field } => {
                write!(f, "value does not match the type of field '{field}'")
            }
            Self::SizeViolation { field } => {
                write!(f, "value violates the declared size of field '{field}'")
            }
            Self::UnknownSymbol { field, symbol } => {
                write!(f, "enum of field '{field}' has no symbol '{symbol}'")
            }
            Self::GroupWithoutId { field } => {
                write!(f, "field '{field}' needs a group with an id")
            }
            Self::WrongGroup { field } => {
                write!(f, "group value does not fit field '{field}'")
            }
            Self::NullField { field } => {
                write!(f, "required field '{field}' is not initialised")
            }
            Self::InvalidUtf8 { field } => {
                write!(f, "field '{field}' does not hold valid utf-8")
            }
            Self::Encode(err) => err.fmt(f),
            Self::Decode(err) => err.fmt(f),
        }
    }
}

impl error::Error for Error {}

impl From<stream::Error> for Error {
    fn from(err: stream::Error) -> Self {
        Self::Encode(err)
    }
}

impl From<visit::Error> for Error {
    fn from(err: visit::Error) -> Self {
        Self::Decode(err)
    }
}

/// A field value held by an object.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'s> {
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
    /// `string`, `binary`, and `fixed` fields.
    Bytes(Vec<u8>),
    /// Resolved enum symbol value.
    Enum(i32),
    Group(Box<Object<'s>>),
    Sequence(Vec<Value<'s>>),
}

#[derive(Debug, Clone)]
struct Slot<'s> {
    field: FieldView<'s>,
    value: Option<Value<'s>>,
}

/// A runtime instance of a group.
#[derive(Debug, Clone)]
pub struct Object<'s> {
    group: GroupView<'s>,
    slots: Vec<Slot<'s>>,
    index: HashMap<String, usize>,
}

impl PartialEq for Object<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.group == other.group
            && self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .zip(&other.slots)
                .all(|(a, b)| a.value == b.value)
    }
}

impl<'s> Object<'s> {
    /// Create an empty instance of `group` with one slot per field
    /// visible through inheritance.
    #[must_use]
    pub fn new_group(group: GroupView<'s>) -> Self {
        let mut slots = Vec::new();
        let mut index = HashMap::new();
        for field in group.fields() {
            index.insert(field.name().to_owned(), slots.len());
            slots.push(Slot { field, value: None });
        }
        Self {
            group,
            slots,
            index,
        }
    }

    #[must_use]
    pub fn group(&self) -> GroupView<'s> {
        self.group
    }

    #[must_use]
    pub fn schema(&self) -> &'s Schema {
        self.group.schema()
    }

    fn slot_at(&self, name: &str) -> Result<usize, Error> {
        self.index.get(name).copied().ok_or_else(|| {
            debug!(
                "field '{name}' does not exist in group '{}'",
                self.group.name()
            );
            Error::UnknownField {
                field: name.to_owned(),
            }
        })
    }

    /// Store a value, checked against the field's declared type.
    pub fn set(&mut self, name: &str, value: Value<'s>) -> Result<(), Error> {
        let at = self.slot_at(name)?;
        let field = self.slots[at].field;
        check_value(field, &value)?;
        self.slots[at].value = Some(value);
        Ok(())
    }

    /// The stored value; `None` when the slot is uninitialised.
    pub fn get(&self, name: &str) -> Result<Option<&Value<'s>>, Error> {
        let at = self.slot_at(name)?;
        Ok(self.slots[at].value.as_ref())
    }

    /// Mark a field uninitialised.
    pub fn clear(&mut self, name: &str) -> Result<(), Error> {
        let at = self.slot_at(name)?;
        self.slots[at].value = None;
        Ok(())
    }

    pub fn field_is_null(&self, name: &str) -> Result<bool, Error> {
        let at = self.slot_at(name)?;
        Ok(self.slots[at].value.is_none())
    }

    pub fn set_bool(&mut self, name: &str, value: bool) -> Result<(), Error> {
        self.set(name, Value::Bool(value))
    }

    pub fn set_u8(&mut self, name: &str, value: u8) -> Result<(), Error> {
        self.set(name, Value::U8(value))
    }

    pub fn set_u16(&mut self, name: &str, value: u16) -> Result<(), Error> {
        self.set(name, Value::U16(value))
    }

    pub fn set_u32(&mut self, name: &str, value: u32) -> Result<(), Error> {
        self.set(name, Value::U32(value))
    }

    pub fn set_u64(&mut self, name: &str, value: u64) -> Result<(), Error> {
        self.set(name, Value::U64(value))
    }

    pub fn set_i8(&mut self, name: &str, value: i8) -> Result<(), Error> {
        self.set(name, Value::I8(value))
    }

    pub fn set_i16(&mut self, name: &str, value: i16) -> Result<(), Error> {
        self.set(name, Value::I16(value))
    }

    pub fn set_i32(&mut self, name: &str, value: i32) -> Result<(), Error> {
        self.set(name, Value::I32(value))
    }

    pub fn set_i64(&mut self, name: &str, value: i64) -> Result<(), Error> {
        self.set(name, Value::I64(value))
    }

    pub fn set_f64(&mut self, name: &str, value: f64) -> Result<(), Error> {
        self.set(name, Value::F64(value))
    }

    pub fn set_decimal(&mut self, name: &str, value: Decimal) -> Result<(), Error> {
        self.set(name, Value::Decimal(value))
    }

    pub fn set_string(&mut self, name: &str, value: &str) -> Result<(), Error> {
        self.set(name, Value::Bytes(value.as_bytes().to_vec()))
    }

    pub fn set_binary(&mut self, name: &str, value: &[u8]) -> Result<(), Error> {
        self.set(name, Value::Bytes(value.to_vec()))
    }

    pub fn set_fixed(&mut self, name: &str, value: &[u8]) -> Result<(), Error> {
        self.set(name, Value::Bytes(value.to_vec()))
    }

    /// Store an enum field by symbol name.
    pub fn set_enum(&mut self, name: &str, symbol: &str) -> Result<(), Error> {
        let at = self.slot_at(name)?;
        let field = self.slots[at].field;
        let Some(enumeration) = field.enumeration() else {
            return Err(Error::TypeMismatch {
                field: name.to_owned(),
            });
        };
        let Some(symbol) = enumeration.symbol_by_name(symbol) else {
            debug!("enum '{}' has no symbol '{symbol}'", enumeration.name());
            return Err(Error::UnknownSymbol {
                field: name.to_owned(),
                symbol: symbol.to_owned(),
            });
        };
        self.slots[at].value = Some(Value::Enum(symbol.value()));
        Ok(())
    }

    pub fn set_group(&mut self, name: &str, value: Object<'s>) -> Result<(), Error> {
        self.set(name, Value::Group(Box::new(value)))
    }

    pub fn get_bool(&self, name: &str) -> Result<Option<bool>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::Bool(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_u8(&self, name: &str) -> Result<Option<u8>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::U8(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_u16(&self, name: &str) -> Result<Option<u16>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::U16(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_u32(&self, name: &str) -> Result<Option<u32>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::U32(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_u64(&self, name: &str) -> Result<Option<u64>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::U64(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_i8(&self, name: &str) -> Result<Option<i8>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::I8(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_i16(&self, name: &str) -> Result<Option<i16>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::I16(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_i32(&self, name: &str) -> Result<Option<i32>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::I32(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_i64(&self, name: &str) -> Result<Option<i64>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::I64(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_f64(&self, name: &str) -> Result<Option<f64>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::F64(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_decimal(&self, name: &str) -> Result<Option<Decimal>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::Decimal(v)) => Ok(Some(*v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_string(&self, name: &str) -> Result<Option<&str>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::Bytes(v)) => std::str::from_utf8(v).map(Some).map_err(|_| {
                Error::InvalidUtf8 {
                    field: name.to_owned(),
                }
            }),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_binary(&self, name: &str) -> Result<Option<&[u8]>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::Bytes(v)) => Ok(Some(v.as_slice())),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_fixed(&self, name: &str) -> Result<Option<&[u8]>, Error> {
        self.get_binary(name)
    }

    /// Symbol name of a stored enum value.
    pub fn get_enum(&self, name: &str) -> Result<Option<&'s str>, Error> {
        let at = self.slot_at(name)?;
        let slot = &self.slots[at];
        match &slot.value {
            None => Ok(None),
            Some(Value::Enum(v)) => {
                let symbol = slot
                    .field
                    .enumeration()
                    .and_then(|e| e.symbol_by_value(*v))
                    .ok_or_else(|| self.mismatch(name))?;
                Ok(Some(symbol.name()))
            }
            Some(_) => Err(self.mismatch(name)),
        }
    }

    pub fn get_group(&self, name: &str) -> Result<Option<&Object<'s>>, Error> {
        match self.get(name)? {
            None => Ok(None),
            Some(Value::Group(v)) => Ok(Some(v)),
            Some(_) => Err(self.mismatch(name)),
        }
    }

    fn mismatch(&self, name: &str) -> Error {
        debug!(
            "stored value of '{name}' in group '{}' has another type",
            self.group.name()
        );
        Error::TypeMismatch {
            field: name.to_owned(),
        }
    }

    /// Encode this object. A group with an id is written as a
    /// length-prefixed dynamic-group frame; one without is written as
    /// its bare field sequence.
    pub fn encode_compact(&self, out: &mut dyn Stream) -> Result<(), Error> {
        match self.group.id() {
            Some(_) => self.encode_dynamic(out),
            None => self.encode_fields(out),
        }
    }

    fn encode_dynamic(&self, out: &mut dyn Stream) -> Result<(), Error> {
        let Some(id) = self.group.id() else {
            return Err(Error::GroupWithoutId {
                field: self.group.name().to_owned(),
            });
        };
        let mut payload = VecStream::new();
        vlc::encode_unsigned(id, &mut payload)?;
        self.encode_fields(&mut payload)?;
        vlc::encode_unsigned(payload.as_slice().len() as u64, out)?;
        out.write(payload.as_slice())?;
        Ok(())
    }

    fn encode_fields(&self, out: &mut dyn Stream) -> Result<(), Error> {
        for slot in &self.slots {
            let field = slot.field;
            match &slot.value {
                None => {
                    if !field.is_optional() {
                        debug!("required field '{}' is not initialised", field.name());
                        return Err(Error::NullField {
                            field: field.name().to_owned(),
                        });
                    }
                    compact::encode_null(out)?;
                }
                Some(Value::Sequence(items)) => {
                    vlc::encode_unsigned(items.len() as u64, out)?;
                    for item in items {
                        encode_value(field, item, false, out)?;
                    }
                }
                Some(value) => encode_value(field, value, field.is_optional(), out)?,
            }
        }
        Ok(())
    }

    /// Decode one dynamic-group message against `schema`, returning a
    /// freshly populated object.
    pub fn decode_compact(schema: &'s Schema, input: &mut dyn Stream) -> Result<Self, Error> {
        let mut builder = Builder {
            stack: Vec::new(),
            finished: None,
        };
        visit::decode_message(schema, input, &mut builder)?;
        builder.finished.ok_or(Error::Decode(visit::Error::NullGroup))
    }
}

/// Setter-side validation against the declared field type.
fn check_value(field: FieldView<'_>, value: &Value<'_>) -> Result<(), Error> {
    if field.is_sequence() {
        let Value::Sequence(items) = value else {
            return Err(Error::TypeMismatch {
                field: field.name().to_owned(),
            });
        };
        for item in items {
            check_element(field, item)?;
        }
        Ok(())
    } else {
        if matches!(value, Value::Sequence(_)) {
            return Err(Error::TypeMismatch {
                field: field.name().to_owned(),
            });
        }
        check_element(field, value)
    }
}

fn check_element(field: FieldView<'_>, value: &Value<'_>) -> Result<(), Error> {
    let field_name = || field.name().to_owned();
    match (field.type_tag(), value) {
        (TypeTag::Bool, Value::Bool(_))
        | (TypeTag::U8, Value::U8(_))
        | (TypeTag::U16, Value::U16(_))
        | (TypeTag::U32, Value::U32(_))
        | (TypeTag::U64, Value::U64(_))
        | (TypeTag::I8, Value::I8(_))
        | (TypeTag::I16, Value::I16(_))
        | (TypeTag::I32, Value::I32(_))
        | (TypeTag::I64, Value::I64(_))
        | (TypeTag::F64, Value::F64(_))
        | (TypeTag::Decimal, Value::Decimal(_))
        | (TypeTag::Date, Value::I32(_))
        | (TypeTag::TimeOfDayMilli, Value::U32(_))
        | (TypeTag::TimeOfDayNano, Value::U64(_))
        | (TypeTag::MilliTime, Value::I64(_))
        | (TypeTag::NanoTime, Value::I64(_)) => Ok(()),
        (TypeTag::String | TypeTag::Binary, Value::Bytes(bytes)) => {
            let size = field.size();
            if size != UNBOUNDED_SIZE && bytes.len() as u64 > u64::from(size) {
                debug!("value too large for field '{}'", field.name());
                return Err(Error::SizeViolation { field: field_name() });
            }
            Ok(())
        }
        (TypeTag::Fixed, Value::Bytes(bytes)) => {
            if bytes.len() as u64 != u64::from(field.size()) {
                debug!("wrong length for fixed field '{}'", field.name());
                return Err(Error::SizeViolation { field: field_name() });
            }
            Ok(())
        }
        (TypeTag::Enum, Value::Enum(value)) => {
            if field
                .enumeration()
                .and_then(|e| e.symbol_by_value(*value))
                .is_none()
            {
                return Err(Error::UnknownSymbol {
                    field: field_name(),
                    symbol: value.to_string(),
                });
            }
            Ok(())
        }
        (TypeTag::StaticGroup, Value::Group(object)) => {
            let declared = field.group();
            if declared != Some(object.group()) {
                return Err(Error::WrongGroup { field: field_name() });
            }
            Ok(())
        }
        (TypeTag::DynamicGroup, Value::Group(object)) => {
            if object.group().id().is_none() {
                return Err(Error::GroupWithoutId { field: field_name() });
            }
            let Some(declared) = field.group() else {
                return Err(Error::WrongGroup { field: field_name() });
            };
            if !object.group().is_kind_of(declared) {
                debug!(
                    "group '{}' is not a kind of '{}'",
                    object.group().name(),
                    declared.name()
                );
                return Err(Error::WrongGroup { field: field_name() });
            }
            Ok(())
        }
        (TypeTag::Object, Value::Group(object)) => {
            if object.group().id().is_none() {
                return Err(Error::GroupWithoutId { field: field_name() });
            }
            Ok(())
        }
        _ => Err(Error::TypeMismatch { field: field_name() }),
    }
}

/// `optional` adds presence framing for fixed values and embedded
/// static groups; sequence elements never carry it.
fn encode_value(
    field: FieldView<'_>,
    value: &Value<'_>,
    optional: bool,
    out: &mut dyn Stream,
) -> Result<(), Error> {
    match value {
        Value::Bool(v) => compact::encode_bool(*v, out)?,
        Value::U8(v) => compact::encode_u8(*v, out)?,
        Value::U16(v) => compact::encode_u16(*v, out)?,
        Value::U32(v) => compact::encode_u32(*v, out)?,
        Value::U64(v) => compact::encode_u64(*v, out)?,
        Value::I8(v) => compact::encode_i8(*v, out)?,
        Value::I16(v) => compact::encode_i16(*v, out)?,
        Value::I32(v) => compact::encode_i32(*v, out)?,
        Value::I64(v) => compact::encode_i64(*v, out)?,
        Value::F64(v) => compact::encode_f64(*v, out)?,
        Value::Decimal(v) => compact::encode_decimal(*v, out)?,
        Value::Enum(v) => compact::encode_i32(*v, out)?,
        Value::Bytes(bytes) => {
            if field.type_tag() == TypeTag::Fixed {
                if optional {
                    compact::encode_optional_fixed(bytes, out)?;
                } else {
                    compact::encode_fixed(bytes, out)?;
                }
            } else {
                compact::encode_binary(bytes, out)?;
            }
        }
        Value::Group(object) => match field.type_tag() {
            TypeTag::StaticGroup => {
                if optional {
                    compact::encode_present(out)?;
                }
                object.encode_fields(out)?;
            }
            _ => object.encode_dynamic(out)?,
        },
        Value::Sequence(_) => {
            return Err(Error::TypeMismatch {
                field: field.name().to_owned(),
            });
        }
    }
    Ok(())
}

/// Collects walker events into an object tree.
struct Builder<'s> {
    stack: Vec<Frame<'s>>,
    finished: Option<Object<'s>>,
}

struct Frame<'s> {
    object: Object<'s>,
    slot_at: Option<usize>,
    sequence: Option<Vec<Value<'s>>>,
}

impl<'s> Frame<'s> {
    fn store(&mut self, value: Value<'s>) {
        if let Some(items) = &mut self.sequence {
            items.push(value);
        } else if let Some(at) = self.slot_at {
            self.object.slots[at].value = Some(value);
        }
    }
}

fn to_value<'s>(value: WireValue<'_, 's>) -> Value<'s> {
    match value {
        WireValue::Bool(v) => Value::Bool(v),
        WireValue::U8(v) => Value::U8(v),
        WireValue::U16(v) => Value::U16(v),
        WireValue::U32(v) => Value::U32(v),
        WireValue::U64(v) => Value::U64(v),
        WireValue::I8(v) => Value::I8(v),
        WireValue::I16(v) => Value::I16(v),
        WireValue::I32(v) => Value::I32(v),
        WireValue::I64(v) => Value::I64(v),
        WireValue::F64(v) => Value::F64(v),
        WireValue::Decimal(v) => Value::Decimal(v),
        WireValue::Date(v) => Value::I32(v),
        WireValue::TimeOfDayMilli(v) => Value::U32(v),
        WireValue::TimeOfDayNano(v) => Value::U64(v),
        WireValue::MilliTime(v) | WireValue::NanoTime(v) => Value::I64(v),
        WireValue::String(v) | WireValue::Binary(v) | WireValue::Fixed(v) => {
            Value::Bytes(v.to_vec())
        }
        WireValue::Enum(_, v) => Value::Enum(v),
    }
}

impl<'s> MessageVisitor<'s> for Builder<'s> {
    fn begin_group(&mut self, group: GroupView<'s>, _dynamic: bool) {
        self.stack.push(Frame {
            object: Object::new_group(group),
            slot_at: None,
            sequence: None,
        });
    }

    fn end_group(&mut self, _group: GroupView<'s>) {
        let Some(frame) = self.stack.pop() else {
            return;
        };
        match self.stack.last_mut() {
            None => self.finished = Some(frame.object),
            Some(parent) => parent.store(Value::Group(Box::new(frame.object))),
        }
    }

    fn begin_field(&mut self, _field: FieldView<'s>) {
        if let Some(frame) = self.stack.last_mut() {
            frame.slot_at = Some(frame.slot_at.map_or(0, |at| at + 1));
        }
    }

    fn begin_sequence(&mut self, _count: u32) {
        if let Some(frame) = self.stack.last_mut() {
            frame.sequence = Some(Vec::new());
        }
    }

    fn end_sequence(&mut self) {
        if let Some(frame) = self.stack.last_mut() {
            if let Some(items) = frame.sequence.take() {
                frame.store(Value::Sequence(items));
            }
        }
    }

    fn value(&mut self, value: WireValue<'_, 's>) {
        if let Some(frame) = self.stack.last_mut() {
            frame.store(to_value(value));
        }
    }
}
