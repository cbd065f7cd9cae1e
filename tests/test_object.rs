//! End-to-end object model encode/decode scenarios.

use blink_compact::compact::Decimal;
use blink_compact::object::{self, Object, Value};
use blink_compact::schema::{FieldView, GroupView, Schema};
use blink_compact::stream::{InputBuffer, VecStream};
use blink_compact::visit::{self, MessageVisitor, WireValue, decode_message};

const INSERT_ORDER: &[u8] = &[
    0x0f, 0x01, 0x03, 0x49, 0x42, 0x4d, 0x06, 0x41, 0x42, 0x43, 0x31, 0x32, 0x33, 0x7d, 0xa8,
    0x0f,
];

fn order_schema() -> Schema {
    Schema::new(
        "InsertOrder/1 ->\n\
         \x20  string Symbol,\n\
         \x20  string OrderId,\n\
         \x20  u32 Price,\n\
         \x20  u32 Quantity\n\
         CancelOrder/2 -> string OrderId\n\
         OrderInserted/3 -> string OrderId\n\
         OrderCanceled/4 -> string OrderId\n",
    )
    .unwrap()
}

fn encode(object: &Object<'_>) -> Vec<u8> {
    let mut out = VecStream::new();
    object.encode_compact(&mut out).unwrap();
    out.into_inner()
}

fn decode<'s>(schema: &'s Schema, bytes: &[u8]) -> Result<Object<'s>, object::Error> {
    Object::decode_compact(schema, &mut InputBuffer::new(bytes))
}

#[test]
fn test_insert_order_encode() {
    let schema = order_schema();
    let group = schema.group_by_name("InsertOrder").unwrap();

    let mut order = Object::new_group(group);
    order.set_string("Symbol", "IBM").unwrap();
    order.set_string("OrderId", "ABC123").unwrap();
    order.set_u32("Price", 125).unwrap();
    order.set_u32("Quantity", 1000).unwrap();

    assert_eq!(INSERT_ORDER, encode(&order).as_slice());
}

#[test]
fn test_insert_order_decode() {
    let schema = order_schema();
    let order = decode(&schema, INSERT_ORDER).unwrap();

    assert_eq!("InsertOrder", order.group().name());
    for field in ["Symbol", "OrderId", "Price", "Quantity"] {
        assert!(!order.field_is_null(field).unwrap(), "{field}");
    }
    assert_eq!(Some("IBM"), order.get_string("Symbol").unwrap());
    assert_eq!(Some("ABC123"), order.get_string("OrderId").unwrap());
    assert_eq!(Some(125), order.get_u32("Price").unwrap());
    assert_eq!(Some(1000), order.get_u32("Quantity").unwrap());
}

#[test]
fn test_insert_order_round_trip() {
    let schema = order_schema();
    let first = decode(&schema, INSERT_ORDER).unwrap();
    let again = decode(&schema, &encode(&first)).unwrap();
    assert_eq!(first, again);
}

#[test]
fn test_unknown_group_id_rejected() {
    let schema = Schema::new("Msg/7 -> u8 x").unwrap();
    let err = decode(&schema, &[0x02, 0x01, 0x00]).unwrap_err();
    assert_eq!(
        object::Error::Decode(visit::Error::UnknownGroupId(1)),
        err
    );
}

#[test]
fn test_top_level_null_rejected() {
    let schema = Schema::new("Msg/7 -> u8 x").unwrap();
    let err = decode(&schema, &[0xc0]).unwrap_err();
    assert_eq!(object::Error::Decode(visit::Error::NullGroup), err);
}

#[test]
fn test_optional_field_null() {
    let schema = Schema::new("Msg/1 -> u8 a?").unwrap();
    let object = Object::new_group(schema.group_by_name("Msg").unwrap());

    // an unset optional field costs exactly one null byte
    assert_eq!(vec![0x02, 0x01, 0xc0], encode(&object));

    let decoded = decode(&schema, &[0x02, 0x01, 0xc0]).unwrap();
    assert!(decoded.field_is_null("a").unwrap());
    assert_eq!(None, decoded.get_u8("a").unwrap());
}

#[test]
fn test_required_field_unset_fails() {
    let schema = Schema::new("Msg/1 -> u8 a").unwrap();
    let object = Object::new_group(schema.group_by_name("Msg").unwrap());
    let mut out = VecStream::new();
    assert!(matches!(
        object.encode_compact(&mut out).unwrap_err(),
        object::Error::NullField { .. }
    ));
}

#[test]
fn test_required_null_on_wire_fails() {
    let schema = Schema::new("Msg/1 -> u8 a").unwrap();
    let err = decode(&schema, &[0x02, 0x01, 0xc0]).unwrap_err();
    assert!(matches!(
        err,
        object::Error::Decode(visit::Error::NullField { .. })
    ));
}

#[test]
fn test_clear_and_set_again() {
    let schema = Schema::new("Msg/1 -> u8 a?").unwrap();
    let mut object = Object::new_group(schema.group_by_name("Msg").unwrap());

    object.set_u8("a", 7).unwrap();
    assert!(!object.field_is_null("a").unwrap());
    object.clear("a").unwrap();
    assert!(object.field_is_null("a").unwrap());
    object.set_u8("a", 9).unwrap();
    assert_eq!(Some(9), object.get_u8("a").unwrap());
}

#[test]
fn test_accessor_failures() {
    let schema = Schema::new("Msg/1 -> string (3) s, fixed (2) f?, u8 n").unwrap();
    let mut object = Object::new_group(schema.group_by_name("Msg").unwrap());

    assert!(matches!(
        object.set_u8("missing", 1).unwrap_err(),
        object::Error::UnknownField { .. }
    ));
    assert!(matches!(
        object.set_u8("s", 1).unwrap_err(),
        object::Error::TypeMismatch { .. }
    ));
    assert!(matches!(
        object.set_string("s", "toolong").unwrap_err(),
        object::Error::SizeViolation { .. }
    ));
    assert!(matches!(
        object.set_fixed("f", b"x").unwrap_err(),
        object::Error::SizeViolation { .. }
    ));

    object.set_string("s", "ok").unwrap();
    assert!(matches!(
        object.get_u8("s").unwrap_err(),
        object::Error::TypeMismatch { .. }
    ));
}

#[test]
fn test_scalar_round_trip() {
    let schema = Schema::new(
        "Msg/1 -> bool b, f64 x, decimal d, i64 big?, i8 small, date day, u64 stamp",
    )
    .unwrap();
    let mut object = Object::new_group(schema.group_by_name("Msg").unwrap());
    object.set_bool("b", true).unwrap();
    object.set_f64("x", -2.5).unwrap();
    object
        .set_decimal(
            "d",
            Decimal {
                mantissa: 1299,
                exponent: -2,
            },
        )
        .unwrap();
    object.set_i64("big", i64::MIN).unwrap();
    object.set_i8("small", -64).unwrap();
    object.set_i32("day", 17_000).unwrap();
    object.set_u64("stamp", u64::MAX).unwrap();

    let decoded = decode(&schema, &encode(&object)).unwrap();
    assert_eq!(object, decoded);
    assert_eq!(Some(true), decoded.get_bool("b").unwrap());
    assert_eq!(Some(-2.5), decoded.get_f64("x").unwrap());
    assert_eq!(
        Some(Decimal {
            mantissa: 1299,
            exponent: -2
        }),
        decoded.get_decimal("d").unwrap()
    );
    assert_eq!(Some(i64::MIN), decoded.get_i64("big").unwrap());
    assert_eq!(Some(-64), decoded.get_i8("small").unwrap());
    assert_eq!(Some(17_000), decoded.get_i32("day").unwrap());
    assert_eq!(Some(u64::MAX), decoded.get_u64("stamp").unwrap());
}

#[test]
fn test_enum_field() {
    let schema = Schema::new("Color = Red | Green/5 | Blue\nMsg/1 -> Color c").unwrap();
    let mut object = Object::new_group(schema.group_by_name("Msg").unwrap());

    assert!(matches!(
        object.set_enum("c", "Purple").unwrap_err(),
        object::Error::UnknownSymbol { .. }
    ));
    object.set_enum("c", "Green").unwrap();

    let bytes = encode(&object);
    assert_eq!(vec![0x02, 0x01, 0x05], bytes);

    let decoded = decode(&schema, &bytes).unwrap();
    assert_eq!(Some("Green"), decoded.get_enum("c").unwrap());
}

#[test]
fn test_enum_value_without_symbol_rejected() {
    let schema = Schema::new("Color = Red | Green/5 | Blue\nMsg/1 -> Color c").unwrap();
    let err = decode(&schema, &[0x02, 0x01, 0x03]).unwrap_err();
    assert!(matches!(
        err,
        object::Error::Decode(visit::Error::BadEnumValue { value: 3, .. })
    ));
}

#[test]
fn test_sequence_round_trip() {
    let schema = Schema::new("Msg/1 -> u32[] xs").unwrap();
    let mut object = Object::new_group(schema.group_by_name("Msg").unwrap());
    object
        .set(
            "xs",
            Value::Sequence(vec![Value::U32(1), Value::U32(2), Value::U32(300)]),
        )
        .unwrap();

    let bytes = encode(&object);
    assert_eq!(vec![0x06, 0x01, 0x03, 0x01, 0x02, 0xac, 0x04], bytes);

    let decoded = decode(&schema, &bytes).unwrap();
    assert_eq!(
        Some(&Value::Sequence(vec![
            Value::U32(1),
            Value::U32(2),
            Value::U32(300)
        ])),
        decoded.get("xs").unwrap()
    );
}

#[test]
fn test_empty_sequence_is_not_null() {
    let schema = Schema::new("Msg/1 -> u32[] xs").unwrap();
    let mut object = Object::new_group(schema.group_by_name("Msg").unwrap());
    object.set("xs", Value::Sequence(Vec::new())).unwrap();

    let bytes = encode(&object);
    assert_eq!(vec![0x02, 0x01, 0x00], bytes);

    let decoded = decode(&schema, &bytes).unwrap();
    assert!(!decoded.field_is_null("xs").unwrap());
}

#[test]
fn test_optional_sequence_null() {
    let schema = Schema::new("Msg/1 -> u32[] xs?").unwrap();
    let object = Object::new_group(schema.group_by_name("Msg").unwrap());
    assert_eq!(vec![0x02, 0x01, 0xc0], encode(&object));

    let decoded = decode(&schema, &[0x02, 0x01, 0xc0]).unwrap();
    assert!(decoded.field_is_null("xs").unwrap());
}

#[test]
fn test_required_sequence_null_on_wire_fails() {
    let schema = Schema::new("Msg/1 -> u32[] xs").unwrap();
    let err = decode(&schema, &[0x02, 0x01, 0xc0]).unwrap_err();
    assert!(matches!(
        err,
        object::Error::Decode(visit::Error::NullField { .. })
    ));
}

#[test]
fn test_static_group_embedding() {
    let schema = Schema::new("Inner -> u8 a\nOuter/1 -> Inner body").unwrap();
    let inner_group = schema.group_by_name("Inner").unwrap();
    let outer_group = schema.group_by_name("Outer").unwrap();

    let mut inner = Object::new_group(inner_group);
    inner.set_u8("a", 9).unwrap();
    let mut outer = Object::new_group(outer_group);
    outer.set_group("body", inner).unwrap();

    // embedded with no frame: just the nested field sequence
    let bytes = encode(&outer);
    assert_eq!(vec![0x02, 0x01, 0x09], bytes);

    let decoded = decode(&schema, &bytes).unwrap();
    let body = decoded.get_group("body").unwrap().unwrap();
    assert_eq!("Inner", body.group().name());
    assert_eq!(Some(9), body.get_u8("a").unwrap());
}

#[test]
fn test_optional_static_group_presence() {
    let schema = Schema::new("Inner -> u8 a\nOuter/1 -> Inner body?").unwrap();
    let outer_group = schema.group_by_name("Outer").unwrap();

    let empty = Object::new_group(outer_group);
    assert_eq!(vec![0x02, 0x01, 0xc0], encode(&empty));

    let mut inner = Object::new_group(schema.group_by_name("Inner").unwrap());
    inner.set_u8("a", 3).unwrap();
    let mut outer = Object::new_group(outer_group);
    outer.set_group("body", inner).unwrap();
    let bytes = encode(&outer);
    assert_eq!(vec![0x03, 0x01, 0x01, 0x03], bytes);

    let decoded = decode(&schema, &bytes).unwrap();
    assert_eq!(
        Some(3),
        decoded
            .get_group("body")
            .unwrap()
            .unwrap()
            .get_u8("a")
            .unwrap()
    );

    // presence flag must be 0x01 or null
    let err = decode(&schema, &[0x03, 0x01, 0x02, 0x03]).unwrap_err();
    assert!(matches!(
        err,
        object::Error::Decode(visit::Error::Compact(_))
    ));
}

#[test]
fn test_dynamic_group_dispatch() {
    let schema = Schema::new(
        "Base/1 -> u8 a\n\
         Sub/2 : Base -> u8 b\n\
         Holder/3 -> Base* d",
    )
    .unwrap();

    let mut sub = Object::new_group(schema.group_by_name("Sub").unwrap());
    sub.set_u8("a", 1).unwrap();
    sub.set_u8("b", 2).unwrap();

    let mut holder = Object::new_group(schema.group_by_name("Holder").unwrap());
    holder.set_group("d", sub).unwrap();

    let bytes = encode(&holder);
    // outer frame id 3, nested frame id 2 with inherited field first
    assert_eq!(vec![0x05, 0x03, 0x03, 0x02, 0x01, 0x02], bytes);

    let decoded = decode(&schema, &bytes).unwrap();
    let nested = decoded.get_group("d").unwrap().unwrap();
    assert_eq!("Sub", nested.group().name());
    assert_eq!(Some(1), nested.get_u8("a").unwrap());
    assert_eq!(Some(2), nested.get_u8("b").unwrap());
}

#[test]
fn test_dynamic_group_set_constraints() {
    let schema = Schema::new(
        "Base/1 -> u8 a\n\
         Other/4 -> u8 x\n\
         NoId -> u8 y\n\
         Holder/3 -> Base* d",
    )
    .unwrap();
    let mut holder = Object::new_group(schema.group_by_name("Holder").unwrap());

    let other = Object::new_group(schema.group_by_name("Other").unwrap());
    assert!(matches!(
        holder.set_group("d", other).unwrap_err(),
        object::Error::WrongGroup { .. }
    ));

    let no_id = Object::new_group(schema.group_by_name("NoId").unwrap());
    assert!(matches!(
        holder.set_group("d", no_id).unwrap_err(),
        object::Error::GroupWithoutId { .. }
    ));
}

#[test]
fn test_dynamic_group_kind_mismatch_on_wire() {
    let schema = Schema::new(
        "Base/1 -> u8 a\n\
         Other/4 -> u8 x\n\
         Holder/3 -> Base* d",
    )
    .unwrap();
    // nested frame carries Other, which is no kind of Base
    let err = decode(&schema, &[0x04, 0x03, 0x02, 0x04, 0x00]).unwrap_err();
    assert!(matches!(
        err,
        object::Error::Decode(visit::Error::UnexpectedGroup { .. })
    ));
}

#[test]
fn test_object_field_takes_any_group_with_id() {
    let schema = Schema::new("Any/9 -> u8 v\nMsg/1 -> object o?").unwrap();

    let mut any = Object::new_group(schema.group_by_name("Any").unwrap());
    any.set_u8("v", 5).unwrap();
    let mut msg = Object::new_group(schema.group_by_name("Msg").unwrap());
    msg.set_group("o", any).unwrap();

    let bytes = encode(&msg);
    assert_eq!(vec![0x04, 0x01, 0x02, 0x09, 0x05], bytes);

    let decoded = decode(&schema, &bytes).unwrap();
    let nested = decoded.get_group("o").unwrap().unwrap();
    assert_eq!("Any", nested.group().name());
    assert_eq!(Some(9), nested.group().id());
}

#[test]
fn test_forward_extension_skipped() {
    let schema = Schema::new("Msg/1 -> u8 x").unwrap();
    let decoded = decode(&schema, &[0x04, 0x01, 0x05, 0xff, 0xff]).unwrap();
    assert_eq!(Some(5), decoded.get_u8("x").unwrap());
}

#[test]
fn test_payload_shorter_than_fields_fails() {
    let schema = Schema::new("Msg/1 -> u8 x").unwrap();
    let err = decode(&schema, &[0x01, 0x01]).unwrap_err();
    assert_eq!(object::Error::Decode(visit::Error::PayloadOverrun), err);
}

#[test]
fn test_group_without_id_encodes_bare_fields() {
    let schema = Schema::new("Bare -> u8 x").unwrap();
    let mut object = Object::new_group(schema.group_by_name("Bare").unwrap());
    object.set_u8("x", 5).unwrap();
    assert_eq!(vec![0x05], encode(&object));
}

#[test]
fn test_inherited_fields_populate_through_decode() {
    let schema = Schema::new(
        "Header -> u64 seq, string src?\n\
         Tick/1 : Header -> u32 px",
    )
    .unwrap();
    let mut tick = Object::new_group(schema.group_by_name("Tick").unwrap());
    tick.set_u64("seq", 42).unwrap();
    tick.set_u32("px", 100).unwrap();

    let decoded = decode(&schema, &encode(&tick)).unwrap();
    assert_eq!(Some(42), decoded.get_u64("seq").unwrap());
    assert!(decoded.field_is_null("src").unwrap());
    assert_eq!(Some(100), decoded.get_u32("px").unwrap());
}

#[test]
fn test_visitor_event_stream() {
    struct Log(Vec<String>);

    impl<'s> MessageVisitor<'s> for Log {
        fn begin_group(&mut self, group: GroupView<'s>, dynamic: bool) {
            self.0.push(format!("begin {} dynamic={dynamic}", group.name()));
        }

        fn end_group(&mut self, group: GroupView<'s>) {
            self.0.push(format!("end {}", group.name()));
        }

        fn begin_field(&mut self, field: FieldView<'s>) {
            self.0.push(format!("field {}", field.name()));
        }

        fn value(&mut self, value: WireValue<'_, 's>) {
            let rendered = match value {
                WireValue::String(bytes) => {
                    format!("string {}", String::from_utf8_lossy(bytes))
                }
                WireValue::U32(v) => format!("u32 {v}"),
                other => format!("{other:?}"),
            };
            self.0.push(rendered);
        }
    }

    let schema = order_schema();
    let mut log = Log(Vec::new());
    decode_message(&schema, &mut InputBuffer::new(INSERT_ORDER), &mut log).unwrap();
    assert_eq!(
        vec![
            "begin InsertOrder dynamic=true",
            "field Symbol",
            "string IBM",
            "field OrderId",
            "string ABC123",
            "field Price",
            "u32 125",
            "field Quantity",
            "u32 1000",
            "end InsertOrder",
        ],
        log.0
    );
}
