//! Schema parsing, resolution, and finalisation scenarios.

use blink_compact::schema::{Config, Error, Schema, TypeTag, UNBOUNDED_SIZE};

#[test]
fn test_greeting_smoke() {
    let schema = Schema::new("Message/0 -> string Greeting").unwrap();
    assert!(schema.is_finalised());

    let group = schema.group_by_name("Message").unwrap();
    assert_eq!("Message", group.name());
    assert_eq!(Some(0), group.id());

    let fields: Vec<_> = group.fields().collect();
    assert_eq!(1, fields.len());
    assert_eq!("Greeting", fields[0].name());
    assert_eq!(TypeTag::String, fields[0].type_tag());
    assert_eq!(UNBOUNDED_SIZE, fields[0].size());
    assert!(!fields[0].is_optional());
    assert!(!fields[0].is_sequence());
}

#[test]
fn test_group_lookup() {
    let schema = Schema::new(
        "InsertOrder/1 -> string Symbol, string OrderId, u32 Price, u32 Quantity\n\
         CancelOrder/2 -> string OrderId\n\
         OrderInserted/3 -> string OrderId\n\
         OrderCanceled/4 -> string OrderId\n",
    )
    .unwrap();

    assert_eq!(
        "InsertOrder",
        schema.group_by_name("InsertOrder").unwrap().name()
    );
    assert_eq!("CancelOrder", schema.group_by_id(2).unwrap().name());
    assert!(schema.group_by_name("Missing").is_none());
    assert!(schema.group_by_id(9).is_none());
    assert_eq!(4, schema.groups().count());
}

#[test]
fn test_namespace_lookup() {
    let schema = Schema::new("namespace market\nOrder/1 -> u64 id").unwrap();
    assert!(schema.group_by_name("market:Order").is_some());
    assert!(schema.group_by_name("Order").is_none());
}

#[test]
fn test_namespace_reopen() {
    let schema = Schema::new(
        "namespace a\nFirst -> u8 x\nnamespace b\nOther -> u8 x\nnamespace a\nSecond -> u8 x",
    )
    .unwrap();
    assert!(schema.group_by_name("a:First").is_some());
    assert!(schema.group_by_name("a:Second").is_some());
    assert!(schema.group_by_name("b:Other").is_some());
}

#[test]
fn test_field_iteration_through_inheritance() {
    let schema = Schema::new(
        "Base -> u8 a, u8 b\n\
         Middle : Base -> u8 c\n\
         Top : Middle -> u8 d",
    )
    .unwrap();

    let top = schema.group_by_name("Top").unwrap();
    let names: Vec<_> = top.fields().map(|f| f.name().to_owned()).collect();
    assert_eq!(vec!["a", "b", "c", "d"], names);
    assert_eq!(2, top.ancestor_count());
    assert_eq!("Middle", top.super_group().unwrap().name());
}

#[test]
fn test_is_kind_of() {
    let schema = Schema::new(
        "Base/1 -> u8 a\n\
         Middle/2 : Base -> u8 b\n\
         Top/3 : Middle -> u8 c\n\
         Other/4 -> u8 d",
    )
    .unwrap();

    let base = schema.group_by_name("Base").unwrap();
    let middle = schema.group_by_name("Middle").unwrap();
    let top = schema.group_by_name("Top").unwrap();
    let other = schema.group_by_name("Other").unwrap();

    assert!(top.is_kind_of(top));
    assert!(top.is_kind_of(middle));
    assert!(top.is_kind_of(base));
    assert!(!base.is_kind_of(top));
    assert!(!other.is_kind_of(base));
    assert!(!base.is_kind_of(other));
}

#[test]
fn test_super_group_through_typedef() {
    let schema = Schema::new(
        "Base -> u8 a\n\
         alias = Base\n\
         Sub : alias -> u8 b",
    )
    .unwrap();
    let sub = schema.group_by_name("Sub").unwrap();
    assert_eq!("Base", sub.super_group().unwrap().name());
    let names: Vec<_> = sub.fields().map(|f| f.name().to_owned()).collect();
    assert_eq!(vec!["a", "b"], names);
}

#[test]
fn test_typedef_chain_resolution() {
    let schema = Schema::new(
        "short = string (20)\n\
         id = short\n\
         Msg/1 -> id ref",
    )
    .unwrap();
    let field = schema.group_by_name("Msg").unwrap().field("ref").unwrap();
    assert_eq!(TypeTag::String, field.type_tag());
    assert_eq!(20, field.size());
}

#[test]
fn test_dynamic_and_static_group_fields() {
    let schema = Schema::new(
        "Quote/1 -> u32 bid\n\
         Holder/2 -> Quote static, Quote* dynamic, object any?",
    )
    .unwrap();
    let holder = schema.group_by_name("Holder").unwrap();
    assert_eq!(
        TypeTag::StaticGroup,
        holder.field("static").unwrap().type_tag()
    );
    assert_eq!(
        TypeTag::DynamicGroup,
        holder.field("dynamic").unwrap().type_tag()
    );
    assert_eq!(TypeTag::Object, holder.field("any").unwrap().type_tag());
    assert_eq!(
        "Quote",
        holder.field("dynamic").unwrap().group().unwrap().name()
    );
}

#[test]
fn test_sequence_through_typedef() {
    let schema = Schema::new("bytes = u8[]\nMsg/1 -> bytes data").unwrap();
    let field = schema.group_by_name("Msg").unwrap().field("data").unwrap();
    assert!(field.is_sequence());
    assert_eq!(TypeTag::U8, field.type_tag());
}

#[test]
fn test_enum_model() {
    let schema = Schema::new("Color = Red | Green/5 | Blue\nMsg/1 -> Color c").unwrap();
    let field = schema.group_by_name("Msg").unwrap().field("c").unwrap();
    assert_eq!(TypeTag::Enum, field.type_tag());

    let e = field.enumeration().unwrap();
    let values: Vec<_> = e.symbols().map(|s| (s.name().to_owned(), s.value())).collect();
    assert_eq!(
        vec![
            ("Red".to_owned(), 0),
            ("Green".to_owned(), 5),
            ("Blue".to_owned(), 6)
        ],
        values
    );
    assert!(e.symbol_by_name("Red").unwrap().is_implicit());
    assert!(!e.symbol_by_name("Green").unwrap().is_implicit());
    assert_eq!("Blue", e.symbol_by_value(6).unwrap().name());
    assert!(e.symbol_by_value(1).is_none());
}

#[test]
fn test_singleton_enum() {
    let schema = Schema::new("lonely = | alone").unwrap();
    let schema2 = Schema::new(&schema.to_string()).unwrap();
    assert_eq!(schema, schema2);
}

#[test]
fn test_negative_enum_values() {
    let schema = Schema::new("E = A/-3 | B | C/10\nMsg/1 -> E e").unwrap();
    let e = schema.group_by_name("Msg").unwrap().field("e").unwrap().enumeration().unwrap();
    assert_eq!(-3, e.symbol_by_name("A").unwrap().value());
    assert_eq!(-2, e.symbol_by_name("B").unwrap().value());
    assert_eq!(10, e.symbol_by_name("C").unwrap().value());
}

#[test]
fn test_shadowed_field_rejected() {
    let err = Schema::new("super -> u8 field\ntest : super -> u16 field").unwrap_err();
    assert!(matches!(err, Error::ShadowedField { .. }), "{err:?}");
}

#[test]
fn test_ambiguous_enum_rejected() {
    let err = Schema::new("Month = Jan/1 | Feb | Mar/2").unwrap_err();
    assert!(matches!(err, Error::AmbiguousEnumValue { .. }), "{err:?}");
}

#[test]
fn test_enum_value_range() {
    assert!(matches!(
        Schema::new("E = A/2147483648").unwrap_err(),
        Error::EnumValueOutOfRange { .. }
    ));
    assert!(matches!(
        Schema::new("E = A/-2147483649 | B").unwrap_err(),
        Error::EnumValueOutOfRange { .. }
    ));
    assert!(matches!(
        Schema::new("E = A/2147483647 | B").unwrap_err(),
        Error::EnumValueOverflow { .. }
    ));
}

#[test]
fn test_duplicate_names_rejected() {
    assert!(matches!(
        Schema::new("A -> u8 x\nA -> u8 y").unwrap_err(),
        Error::DuplicateDefinition { .. }
    ));
    assert!(matches!(
        Schema::new("A -> u8 x, u16 x").unwrap_err(),
        Error::DuplicateField { .. }
    ));
    assert!(matches!(
        Schema::new("E = A | A").unwrap_err(),
        Error::DuplicateSymbol { .. }
    ));
}

#[test]
fn test_cyclic_typedef_rejected() {
    let err = Schema::new("a = b\nb = a").unwrap_err();
    assert!(matches!(err, Error::ReferenceCycle { .. }), "{err:?}");

    let err = Schema::new("a = a").unwrap_err();
    assert!(matches!(err, Error::ReferenceCycle { .. }), "{err:?}");
}

#[test]
fn test_reference_depth_limit() {
    let mut src = String::from("t0 = u8\n");
    for at in 1..=12 {
        src.push_str(&format!("t{at} = t{}\n", at - 1));
    }
    src.push_str("Msg/1 -> t12 f");
    let err = Schema::new(&src).unwrap_err();
    assert!(matches!(err, Error::ReferenceDepth { .. }), "{err:?}");

    let schema = Schema::with_config(
        &src,
        Config {
            ref_chain_depth: 20,
            ..Config::default()
        },
    )
    .unwrap();
    assert_eq!(
        TypeTag::U8,
        schema.group_by_name("Msg").unwrap().field("f").unwrap().type_tag()
    );
}

#[test]
fn test_inheritance_depth_limit() {
    let mut src = String::from("g0 -> u8 f0\n");
    for at in 1..=11 {
        src.push_str(&format!("g{at} : g{} -> u8 f{at}\n", at - 1));
    }
    let err = Schema::new(&src).unwrap_err();
    assert!(matches!(err, Error::InheritanceDepth { .. }), "{err:?}");

    assert!(
        Schema::with_config(
            &src,
            Config {
                inheritance_depth: 20,
                ..Config::default()
            }
        )
        .is_ok()
    );
}

#[test]
fn test_unresolved_reference_rejected() {
    assert!(matches!(
        Schema::new("Msg/1 -> missing f").unwrap_err(),
        Error::Unresolved { .. }
    ));
    assert!(matches!(
        Schema::new("Msg : missing -> u8 f").unwrap_err(),
        Error::Unresolved { .. }
    ));
}

#[test]
fn test_sequence_of_sequence_rejected() {
    let err = Schema::new("s = u8[]\nMsg/1 -> s[] f").unwrap_err();
    assert!(matches!(err, Error::SequenceOfSequence { .. }), "{err:?}");

    let err = Schema::new("s = u8[]\nt = s[]").unwrap_err();
    assert!(matches!(err, Error::SequenceOfSequence { .. }), "{err:?}");
}

#[test]
fn test_dynamic_reference_must_reach_group() {
    let err = Schema::new("t = u8\nMsg/1 -> t* f").unwrap_err();
    assert!(matches!(err, Error::DynamicChain { .. }), "{err:?}");

    // two dynamic links in one chain
    let err = Schema::new("G/1 -> u8 x\nd = G*\nMsg/2 -> d* f").unwrap_err();
    assert!(matches!(err, Error::DynamicChain { .. }), "{err:?}");
}

#[test]
fn test_super_group_constraints() {
    assert!(matches!(
        Schema::new("E = | a\nG : E -> u8 f").unwrap_err(),
        Error::SuperGroupKind { .. }
    ));
    assert!(matches!(
        Schema::new("G : G -> u8 f").unwrap_err(),
        Error::SuperGroupCycle { .. }
    ));
    assert!(matches!(
        Schema::new("A : B -> u8 x\nB : A -> u8 y").unwrap_err(),
        Error::SuperGroupCycle { .. }
    ));
    assert!(matches!(
        Schema::new("G -> u8 x\nd = G*\nSub : d -> u8 y").unwrap_err(),
        Error::SuperGroupDynamic { .. }
    ));
    assert!(matches!(
        Schema::new("G -> u8 x\ns = G[]\nSub : s -> u8 y").unwrap_err(),
        Error::SuperGroupSequence { .. }
    ));
}

#[test]
fn test_annotations_preserved() {
    let schema = Schema::new(
        "@doc=\"order entry\" InsertOrder/1 -> @unit=\"cents\" u32 @doc=\"limit\" Price",
    )
    .unwrap();
    let group = schema.group_by_name("InsertOrder").unwrap();
    assert_eq!(Some("order entry"), group.annotation("doc"));

    let field = group.field("Price").unwrap();
    assert_eq!(Some("limit"), field.annotation("doc"));
    assert_eq!(
        vec![("unit".to_owned(), "cents".to_owned())],
        field
            .type_annotations()
            .map(|a| (a.key.clone(), a.value.clone()))
            .collect::<Vec<_>>()
    );
}

#[test]
fn test_incremental_annotations() {
    let schema = Schema::new(
        "Msg/1 -> u8 f\n\
         schema <- @version=\"2\"\n\
         Msg <- @doc=\"message\"\n\
         Msg.f <- @doc=\"field\" <- 7",
    )
    .unwrap();
    assert_eq!(Some("2"), schema.annotation("version"));

    let group = schema.group_by_name("Msg").unwrap();
    assert_eq!(Some("message"), group.annotation("doc"));
    let field = group.field("f").unwrap();
    assert_eq!(Some("field"), field.annotation("doc"));
    assert_eq!(Some(7), field.id());
}

#[test]
fn test_incremental_annotation_renumbers_group() {
    let schema = Schema::new("Msg/1 -> u8 f\nMsg <- 9").unwrap();
    assert!(schema.group_by_id(1).is_none());
    assert_eq!("Msg", schema.group_by_id(9).unwrap().name());
}

#[test]
fn test_annotation_same_key_replaces() {
    let schema = Schema::new("@doc=\"a\" @doc=\"b\" Msg/1 -> u8 f").unwrap();
    assert_eq!(
        Some("b"),
        schema.group_by_name("Msg").unwrap().annotation("doc")
    );
}

#[test]
fn test_unknown_annotation_target_rejected() {
    assert!(matches!(
        Schema::new("Msg/1 -> u8 f\nOther <- @k=\"v\"").unwrap_err(),
        Error::Unresolved { .. }
    ));
    assert!(matches!(
        Schema::new("Msg/1 -> u8 f\nMsg.missing <- @k=\"v\"").unwrap_err(),
        Error::AnnotationTarget { .. }
    ));
}

#[test]
fn test_escaped_reserved_names() {
    let schema = Schema::new("\\u8 -> u8 \\string").unwrap();
    let group = schema.group_by_name("u8").unwrap();
    assert!(group.field("string").is_some());
}

#[test]
fn test_syntax_errors() {
    assert!(matches!(
        Schema::new("Msg/1 -> ").unwrap_err(),
        Error::Syntax { .. }
    ));
    assert!(matches!(
        Schema::new("Msg/x -> u8 f").unwrap_err(),
        Error::Syntax { .. }
    ));
    assert!(matches!(
        Schema::new("= u8").unwrap_err(),
        Error::Syntax { .. }
    ));
    // fixed requires a size
    assert!(matches!(
        Schema::new("Msg/1 -> fixed f").unwrap_err(),
        Error::Syntax { .. }
    ));
    assert!(Schema::new("Msg/1 -> fixed (4) f").is_ok());
}

#[test]
fn test_print_round_trip() {
    let src = "namespace market\n\
               schema <- @version=\"3\"\n\
               side = | buy\n\
               Color = Red/-1 | Green | Blue/7\n\
               qty = u32\n\
               @doc=\"entry\" Order/1 -> string (12) Symbol, qty Quantity, Color c?, u8 Flags/3?\n\
               Child/2 : Order -> fixed (2) Tag, decimal Px?, f64 Ratio, u64[] Stamps\n\
               Holder/3 -> Order* Any?, object Blob?, Child Inline\n\
               Order.Symbol <- @coding=\"ascii\"\n";
    let first = Schema::new(src).unwrap();
    let printed = first.to_string();
    let second = Schema::new(&printed).unwrap();
    assert_eq!(first, second, "printed form:\n{printed}");
}

#[test]
fn test_print_round_trip_default_namespace() {
    let src = "Base -> u8 a, timeOfDayMilli t?, millitime m\n\
               Sub/5 : Base -> binary (64) blob?, date d";
    let first = Schema::new(src).unwrap();
    let second = Schema::new(&first.to_string()).unwrap();
    assert_eq!(first, second);
}
