//! The Blink schema definition graph.
//!
//! A [`Schema`] owns every definition node in a single arena; links
//! between nodes (type references, super groups) are typed indices into
//! that arena, written during resolution. Once `Schema::new` returns
//! the graph is finalised: fully resolved, validated, and immutable.

mod parse;
mod resolve;

use crate::lexer::{self, Location};
use std::{error, fmt};

/// Limits applied while building a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Maximum super-group chain length.
    pub inheritance_depth: usize,
    /// Maximum type-reference chain length.
    pub ref_chain_depth: usize,
    /// Byte budget for a single name or quoted literal token.
    pub max_token_len: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inheritance_depth: 10,
            ref_chain_depth: 10,
            max_token_len: lexer::DEFAULT_MAX_TOKEN_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Lex(lexer::Error),
    Syntax {
        expected: &'static str,
        found: &'static str,
        loc: Location,
    },
    DuplicateDefinition { name: String, loc: Location },
    DuplicateField { name: String, loc: Location },
    DuplicateSymbol { name: String, loc: Location },
    SizeOutOfRange { loc: Location },
    EnumValueOutOfRange { symbol: String, loc: Location },
    AmbiguousEnumValue { symbol: String, loc: Location },
    EnumValueOverflow { symbol: String, loc: Location },
    Unresolved { name: String },
    ReferenceCycle { name: String },
    ReferenceDepth { name: String },
    DynamicChain { name: String },
    SequenceOfSequence { name: String },
    SuperGroupKind { group: String },
    SuperGroupDynamic { group: String },
    SuperGroupSequence { group: String },
    SuperGroupCycle { group: String },
    InheritanceDepth { group: String },
    ShadowedField { group: String, field: String },
    AnnotationTarget { name: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lex(err) => err.fmt(f),
            Self::Syntax {
                expected,
                found,
                loc,
            } => write!(f, "expecting {expected}, found {found} at {loc}"),
            Self::DuplicateDefinition { name, loc } => {
                write!(f, "duplicate definition name '{name}' at {loc}")
            }
            Self::DuplicateField { name, loc } => {
                write!(f, "duplicate field name '{name}' at {loc}")
            }
            Self::DuplicateSymbol { name, loc } => {
                write!(f, "duplicate enum symbol name '{name}' at {loc}")
            }
            Self::SizeOutOfRange { loc } => write!(f, "size out of range at {loc}"),
            Self::EnumValueOutOfRange { symbol, loc } => {
                write!(f, "enum symbol '{symbol}' value out of range at {loc}")
            }
            Self::AmbiguousEnumValue { symbol, loc } => {
                write!(f, "enum symbol '{symbol}' value is ambiguous at {loc}")
            }
            Self::EnumValueOverflow { symbol, loc } => {
                write!(f, "no implicit value possible for enum symbol '{symbol}' at {loc}")
            }
            Self::Unresolved { name } => write!(f, "cannot resolve reference '{name}'"),
            Self::ReferenceCycle { name } => write!(f, "reference cycle through '{name}'"),
            Self::ReferenceDepth { name } => {
                write!(f, "reference chain through '{name}' is too deep")
            }
            Self::DynamicChain { name } => {
                write!(f, "dynamic reference '{name}' must resolve to a group")
            }
            Self::SequenceOfSequence { name } => {
                write!(f, "'{name}' makes a sequence of a sequence")
            }
            Self::SuperGroupKind { group } => {
                write!(f, "super group of '{group}' must be a group")
            }
            Self::SuperGroupDynamic { group } => {
                write!(f, "super group of '{group}' cannot be dynamic")
            }
            Self::SuperGroupSequence { group } => {
                write!(f, "super group of '{group}' cannot be a sequence")
            }
            Self::SuperGroupCycle { group } => {
                write!(f, "group '{group}' inherits from itself")
            }
            Self::InheritanceDepth { group } => {
                write!(f, "inheritance chain of '{group}' is too deep")
            }
            Self::ShadowedField { group, field } => {
                write!(f, "field '{field}' of '{group}' shadows an inherited field")
            }
            Self::AnnotationTarget { name } => {
                write!(f, "invalid incremental annotation target '{name}'")
            }
        }
    }
}

impl error::Error for Error {}

impl From<lexer::Error> for Error {
    fn from(err: lexer::Error) -> Self {
        Self::Lex(err)
    }
}

/// Index of a definition in the schema arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefIndex(pub(crate) usize);

#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub key: String,
    pub value: String,
}

/// Inserts or replaces by key, preserving first-write order.
pub(crate) fn put_annotation(list: &mut Vec<Annotation>, key: String, value: String) {
    match list.iter_mut().find(|a| a.key == key) {
        Some(existing) => existing.value = value,
        None => list.push(Annotation { key, value }),
    }
}

/// Declared type of a field or type definition, before resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    String,
    Binary,
    Fixed,
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F64,
    Date,
    TimeOfDayMilli,
    TimeOfDayNano,
    NanoTime,
    MilliTime,
    Decimal,
    Object,
    Ref,
}

/// Wire-level type of a field, after every reference has been chased to
/// its terminal definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Binary,
    Fixed,
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F64,
    Date,
    TimeOfDayMilli,
    TimeOfDayNano,
    NanoTime,
    MilliTime,
    Decimal,
    Object,
    Enum,
    StaticGroup,
    DynamicGroup,
}

fn primitive_tag(kind: TypeKind) -> TypeTag {
    match kind {
        TypeKind::String => TypeTag::String,
        TypeKind::Binary => TypeTag::Binary,
        TypeKind::Fixed => TypeTag::Fixed,
        TypeKind::Bool => TypeTag::Bool,
        TypeKind::U8 => TypeTag::U8,
        TypeKind::U16 => TypeTag::U16,
        TypeKind::U32 => TypeTag::U32,
        TypeKind::U64 => TypeTag::U64,
        TypeKind::I8 => TypeTag::I8,
        TypeKind::I16 => TypeTag::I16,
        TypeKind::I32 => TypeTag::I32,
        TypeKind::I64 => TypeTag::I64,
        TypeKind::F64 => TypeTag::F64,
        TypeKind::Date => TypeTag::Date,
        TypeKind::TimeOfDayMilli => TypeTag::TimeOfDayMilli,
        TypeKind::TimeOfDayNano => TypeTag::TimeOfDayNano,
        TypeKind::NanoTime => TypeTag::NanoTime,
        TypeKind::MilliTime => TypeTag::MilliTime,
        TypeKind::Decimal => TypeTag::Decimal,
        TypeKind::Object => TypeTag::Object,
        TypeKind::Ref => unreachable!("ref is not a primitive"),
    }
}

/// Declared size when none is written in the schema: effectively
/// unbounded `string`/`binary`.
pub const UNBOUNDED_SIZE: u32 = 0xffff_ffff;

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDesc {
    pub(crate) kind: TypeKind,
    pub(crate) size: u32,
    pub(crate) sequence: bool,
    pub(crate) dynamic: bool,
    pub(crate) ref_name: Option<String>,
    pub(crate) resolved: Option<DefIndex>,
    pub(crate) annotes: Vec<Annotation>,
}

impl TypeDesc {
    pub(crate) fn primitive(kind: TypeKind) -> Self {
        Self {
            kind,
            size: 0,
            sequence: false,
            dynamic: false,
            ref_name: None,
            resolved: None,
            annotes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) id: Option<u64>,
    pub(crate) optional: bool,
    pub(crate) ty: TypeDesc,
    pub(crate) annotes: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub(crate) name: String,
    pub(crate) ns: usize,
    pub(crate) id: Option<u64>,
    pub(crate) super_name: Option<String>,
    pub(crate) super_def: Option<DefIndex>,
    pub(crate) fields: Vec<Field>,
    pub(crate) annotes: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub(crate) name: String,
    pub(crate) value: i32,
    pub(crate) implicit: bool,
    pub(crate) annotes: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub(crate) name: String,
    pub(crate) singleton: bool,
    pub(crate) symbols: Vec<Symbol>,
    pub(crate) annotes: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDef {
    pub(crate) name: String,
    pub(crate) ty: TypeDesc,
    pub(crate) annotes: Vec<Annotation>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Group(Group),
    Enum(EnumDef),
    TypeDef(TypeDef),
}

impl Definition {
    pub(crate) fn name(&self) -> &str {
        match self {
            Self::Group(g) => &g.name,
            Self::Enum(e) => &e.name,
            Self::TypeDef(t) => &t.name,
        }
    }
}

/// An incremental annotation directive, held only until finalisation
/// applies it to its target.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct IncrAnnote {
    /// Namespace the directive appeared in, for name resolution.
    pub(crate) ns: usize,
    /// `None` targets the schema itself.
    pub(crate) target: Option<String>,
    /// Field of a group, or symbol of an enum.
    pub(crate) component: Option<String>,
    /// Targets the type descriptor rather than the component.
    pub(crate) on_type: bool,
    pub(crate) annotes: Vec<Annotation>,
    pub(crate) id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Namespace {
    pub(crate) name: String,
    pub(crate) defs: Vec<DefIndex>,
}

/// A parsed, resolved, and validated Blink schema.
///
/// Definition graphs compare equal when they describe the same
/// definitions in the same order, which is what the canonical printer
/// (`Display`) round-trips through.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub(crate) namespaces: Vec<Namespace>,
    pub(crate) defs: Vec<Definition>,
    pub(crate) annotes: Vec<Annotation>,
    pub(crate) pending: Vec<IncrAnnote>,
    pub(crate) finalised: bool,
}

impl Schema {
    /// Parse, resolve, and finalise a schema from source text.
    pub fn new(src: &str) -> Result<Self, Error> {
        Self::with_config(src, Config::default())
    }

    pub fn with_config(src: &str, config: Config) -> Result<Self, Error> {
        let mut schema = parse::parse(src, &config)?;
        resolve::finalise(&mut schema, &config)?;
        Ok(schema)
    }

    #[must_use]
    pub fn is_finalised(&self) -> bool {
        self.finalised
    }

    /// Schema-wide annotation by key.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        find_annotation(&self.annotes, key)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &Annotation> {
        self.annotes.iter()
    }

    /// Look up a group by `name` or `namespace:name`.
    #[must_use]
    pub fn group_by_name(&self, name: &str) -> Option<GroupView<'_>> {
        let idx = self.resolve_name(name)?;
        match self.def(idx) {
            Definition::Group(_) => Some(GroupView { schema: self, idx }),
            _ => None,
        }
    }

    /// Look up a group by numeric id, scanning definitions in
    /// declaration order.
    #[must_use]
    pub fn group_by_id(&self, id: u64) -> Option<GroupView<'_>> {
        self.groups().find(|g| g.id() == Some(id))
    }

    /// Every group, in declaration order across all namespaces.
    pub fn groups(&self) -> impl Iterator<Item = GroupView<'_>> {
        self.namespaces
            .iter()
            .flat_map(|ns| ns.defs.iter().copied())
            .filter(|idx| matches!(self.def(*idx), Definition::Group(_)))
            .map(|idx| GroupView { schema: self, idx })
    }

    pub(crate) fn def(&self, idx: DefIndex) -> &Definition {
        &self.defs[idx.0]
    }

    pub(crate) fn find_in_namespace(&self, ns: &Namespace, name: &str) -> Option<DefIndex> {
        ns.defs
            .iter()
            .copied()
            .find(|idx| self.def(*idx).name() == name)
    }

    /// Split `ns:name` (an unqualified name searches the default
    /// namespace) and look the definition up.
    pub(crate) fn resolve_name(&self, qname: &str) -> Option<DefIndex> {
        let (ns_name, local) = split_qname(qname);
        let ns = self.namespaces.iter().find(|ns| ns.name == ns_name)?;
        self.find_in_namespace(ns, local)
    }

    /// Resolution as seen from inside namespace `ns_at`: an unqualified
    /// name searches the referring namespace first, then the default
    /// namespace.
    pub(crate) fn resolve_name_in(&self, ns_at: usize, qname: &str) -> Option<DefIndex> {
        match qname.split_once(':') {
            Some((ns_name, local)) => {
                let ns = self.namespaces.iter().find(|ns| ns.name == ns_name)?;
                self.find_in_namespace(ns, local)
            }
            None => {
                let home = self.namespaces.get(ns_at)?;
                self.find_in_namespace(home, qname).or_else(|| {
                    if home.name.is_empty() {
                        return None;
                    }
                    let default = self.namespaces.iter().find(|ns| ns.name.is_empty())?;
                    self.find_in_namespace(default, qname)
                })
            }
        }
    }

    /// Follow typedef reference links to the terminal definition,
    /// reporting whether any link was dynamic.
    pub(crate) fn terminal(&self, start: DefIndex) -> (DefIndex, bool) {
        let mut idx = start;
        let mut dynamic = false;
        loop {
            match self.def(idx) {
                Definition::TypeDef(t) if t.ty.kind == TypeKind::Ref => {
                    if t.ty.dynamic {
                        dynamic = true;
                    }
                    match t.ty.resolved {
                        Some(next) => idx = next,
                        None => return (idx, dynamic),
                    }
                }
                _ => return (idx, dynamic),
            }
        }
    }

    /// Wire-level view of a type descriptor with every reference
    /// chased: the terminal tag, the effective size, and whether any
    /// link in the chain made it a sequence.
    pub(crate) fn resolve_type(&self, ty: &TypeDesc) -> ResolvedType {
        let mut sequence = ty.sequence;
        if ty.kind != TypeKind::Ref {
            return ResolvedType {
                tag: primitive_tag(ty.kind),
                size: ty.size,
                sequence,
                target: None,
            };
        }

        let mut dynamic = ty.dynamic;
        let mut idx = match ty.resolved {
            Some(idx) => idx,
            None => {
                return ResolvedType {
                    tag: TypeTag::Object,
                    size: 0,
                    sequence,
                    target: None,
                }
            }
        };
        loop {
            match self.def(idx) {
                Definition::TypeDef(t) => {
                    if t.ty.sequence {
                        sequence = true;
                    }
                    if t.ty.kind == TypeKind::Ref {
                        if t.ty.dynamic {
                            dynamic = true;
                        }
                        match t.ty.resolved {
                            Some(next) => idx = next,
                            None => {
                                return ResolvedType {
                                    tag: TypeTag::Object,
                                    size: 0,
                                    sequence,
                                    target: None,
                                }
                            }
                        }
                    } else {
                        return ResolvedType {
                            tag: primitive_tag(t.ty.kind),
                            size: t.ty.size,
                            sequence,
                            target: None,
                        };
                    }
                }
                Definition::Enum(_) => {
                    return ResolvedType {
                        tag: TypeTag::Enum,
                        size: 0,
                        sequence,
                        target: Some(idx),
                    }
                }
                Definition::Group(_) => {
                    return ResolvedType {
                        tag: if dynamic {
                            TypeTag::DynamicGroup
                        } else {
                            TypeTag::StaticGroup
                        },
                        size: 0,
                        sequence,
                        target: Some(idx),
                    }
                }
            }
        }
    }

    /// Super-group chain of `group`, root ancestor first, `group` last.
    pub(crate) fn inheritance_chain(&self, group: DefIndex) -> Vec<DefIndex> {
        let mut chain = vec![group];
        let mut cur = group;
        while let Definition::Group(g) = self.def(cur) {
            let Some(sup) = g.super_def else {
                break;
            };
            let (term, _) = self.terminal(sup);
            if chain.contains(&term) {
                break;
            }
            chain.push(term);
            cur = term;
        }
        chain.reverse();
        chain
    }
}

pub(crate) fn split_qname(qname: &str) -> (&str, &str) {
    match qname.split_once(':') {
        Some((ns, local)) => (ns, local),
        None => ("", qname),
    }
}

fn find_annotation<'a>(list: &'a [Annotation], key: &str) -> Option<&'a str> {
    list.iter()
        .find(|a| a.key == key)
        .map(|a| a.value.as_str())
}

pub(crate) struct ResolvedType {
    pub(crate) tag: TypeTag,
    pub(crate) size: u32,
    pub(crate) sequence: bool,
    pub(crate) target: Option<DefIndex>,
}

/// Read-only handle on a group definition.
#[derive(Debug, Clone, Copy)]
pub struct GroupView<'s> {
    pub(crate) schema: &'s Schema,
    pub(crate) idx: DefIndex,
}

impl PartialEq for GroupView<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.schema, other.schema) && self.idx == other.idx
    }
}

impl<'s> GroupView<'s> {
    fn group(&self) -> &'s Group {
        match self.schema.def(self.idx) {
            Definition::Group(g) => g,
            _ => unreachable!("group index does not point at a group"),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &'s Schema {
        self.schema
    }

    #[must_use]
    pub fn name(&self) -> &'s str {
        &self.group().name
    }

    /// Name of the owning namespace; empty for the default namespace.
    #[must_use]
    pub fn namespace(&self) -> &'s str {
        &self.schema.namespaces[self.group().ns].name
    }

    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.group().id
    }

    #[must_use]
    pub fn super_group(&self) -> Option<GroupView<'s>> {
        let sup = self.group().super_def?;
        let (term, _) = self.schema.terminal(sup);
        match self.schema.def(term) {
            Definition::Group(_) => Some(GroupView {
                schema: self.schema,
                idx: term,
            }),
            _ => None,
        }
    }

    /// Number of ancestors in the super-group chain.
    #[must_use]
    pub fn ancestor_count(&self) -> usize {
        self.schema.inheritance_chain(self.idx).len() - 1
    }

    /// True when `self` is `other` or inherits from it.
    #[must_use]
    pub fn is_kind_of(&self, other: GroupView<'_>) -> bool {
        if !std::ptr::eq(self.schema, other.schema) {
            return false;
        }
        let mut cur = *self;
        loop {
            if cur.idx == other.idx {
                return true;
            }
            match cur.super_group() {
                Some(sup) => cur = sup,
                None => return false,
            }
        }
    }

    /// Fields visible through inheritance: deepest ancestor first,
    /// declaration order within each level, this group's own last.
    #[must_use]
    pub fn fields(&self) -> Fields<'s> {
        Fields {
            schema: self.schema,
            chain: self.schema.inheritance_chain(self.idx),
            group_at: 0,
            field_at: 0,
        }
    }

    /// Visible field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<FieldView<'s>> {
        self.fields().find(|f| f.name() == name)
    }

    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&'s str> {
        find_annotation(&self.group().annotes, key)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &'s Annotation> {
        self.group().annotes.iter()
    }
}

/// Iterator over the fields visible in a group.
#[derive(Debug, Clone)]
pub struct Fields<'s> {
    schema: &'s Schema,
    chain: Vec<DefIndex>,
    group_at: usize,
    field_at: usize,
}

impl<'s> Iterator for Fields<'s> {
    type Item = FieldView<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let group_idx = *self.chain.get(self.group_at)?;
            let Definition::Group(group) = self.schema.def(group_idx) else {
                return None;
            };
            match group.fields.get(self.field_at) {
                Some(field) => {
                    self.field_at += 1;
                    return Some(FieldView {
                        schema: self.schema,
                        field,
                    });
                }
                None => {
                    self.group_at += 1;
                    self.field_at = 0;
                }
            }
        }
    }
}

/// Read-only handle on a field definition.
#[derive(Debug, Clone, Copy)]
pub struct FieldView<'s> {
    pub(crate) schema: &'s Schema,
    pub(crate) field: &'s Field,
}

impl<'s> FieldView<'s> {
    #[must_use]
    pub fn name(&self) -> &'s str {
        &self.field.name
    }

    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.field.id
    }

    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.field.optional
    }

    /// True when the field carries a sequence, through any link of its
    /// reference chain.
    #[must_use]
    pub fn is_sequence(&self) -> bool {
        self.schema.resolve_type(&self.field.ty).sequence
    }

    /// Wire-level type with every reference chased to its terminal.
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        self.schema.resolve_type(&self.field.ty).tag
    }

    /// Declared byte size: maximum for `string`/`binary`, exact for
    /// `fixed`. [`UNBOUNDED_SIZE`] when the schema writes none.
    #[must_use]
    pub fn size(&self) -> u32 {
        self.schema.resolve_type(&self.field.ty).size
    }

    /// Target group for static and dynamic group fields.
    #[must_use]
    pub fn group(&self) -> Option<GroupView<'s>> {
        let resolved = self.schema.resolve_type(&self.field.ty);
        let idx = resolved.target?;
        match self.schema.def(idx) {
            Definition::Group(_) => Some(GroupView {
                schema: self.schema,
                idx,
            }),
            _ => None,
        }
    }

    /// Target enum for enum fields.
    #[must_use]
    pub fn enumeration(&self) -> Option<EnumView<'s>> {
        let resolved = self.schema.resolve_type(&self.field.ty);
        let idx = resolved.target?;
        match self.schema.def(idx) {
            Definition::Enum(_) => Some(EnumView {
                schema: self.schema,
                idx,
            }),
            _ => None,
        }
    }

    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&'s str> {
        find_annotation(&self.field.annotes, key)
    }

    pub fn annotations(&self) -> impl Iterator<Item = &'s Annotation> {
        self.field.annotes.iter()
    }

    /// Annotations attached to the field's type element.
    pub fn type_annotations(&self) -> impl Iterator<Item = &'s Annotation> {
        self.field.ty.annotes.iter()
    }
}

/// Read-only handle on an enum definition.
#[derive(Debug, Clone, Copy)]
pub struct EnumView<'s> {
    pub(crate) schema: &'s Schema,
    pub(crate) idx: DefIndex,
}

impl<'s> EnumView<'s> {
    fn enum_def(&self) -> &'s EnumDef {
        match self.schema.def(self.idx) {
            Definition::Enum(e) => e,
            _ => unreachable!("enum index does not point at an enum"),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'s str {
        &self.enum_def().name
    }

    pub fn symbols(&self) -> impl Iterator<Item = SymbolView<'s>> {
        self.enum_def().symbols.iter().map(|sym| SymbolView { sym })
    }

    #[must_use]
    pub fn symbol_by_name(&self, name: &str) -> Option<SymbolView<'s>> {
        self.symbols().find(|s| s.name() == name)
    }

    #[must_use]
    pub fn symbol_by_value(&self, value: i32) -> Option<SymbolView<'s>> {
        self.symbols().find(|s| s.value() == value)
    }

    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&'s str> {
        find_annotation(&self.enum_def().annotes, key)
    }
}

/// Read-only handle on an enum symbol.
#[derive(Debug, Clone, Copy)]
pub struct SymbolView<'s> {
    sym: &'s Symbol,
}

impl<'s> SymbolView<'s> {
    #[must_use]
    pub fn name(&self) -> &'s str {
        &self.sym.name
    }

    #[must_use]
    pub fn value(&self) -> i32 {
        self.sym.value
    }

    /// True when the value was not written in the schema.
    #[must_use]
    pub fn is_implicit(&self) -> bool {
        self.sym.implicit
    }

    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&'s str> {
        find_annotation(&self.sym.annotes, key)
    }
}

// canonical printing ///////////////////////////////////////////////////

fn write_name(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    // escape names that collide with reserved words
    if lexer::is_reserved(name) {
        write!(f, "\\{name}")
    } else {
        f.write_str(name)
    }
}

fn write_annotes(f: &mut fmt::Formatter<'_>, annotes: &[Annotation]) -> fmt::Result {
    for a in annotes {
        f.write_str("@")?;
        write_name(f, &a.key)?;
        if a.value.contains('"') {
            write!(f, "='{}' ", a.value)?;
        } else {
            write!(f, "=\"{}\" ", a.value)?;
        }
    }
    Ok(())
}

fn write_type(f: &mut fmt::Formatter<'_>, ty: &TypeDesc) -> fmt::Result {
    match ty.kind {
        TypeKind::Ref => {
            write_name(f, ty.ref_name.as_deref().unwrap_or(""))?;
            if ty.dynamic {
                f.write_str("*")?;
            }
        }
        TypeKind::String | TypeKind::Binary => {
            f.write_str(if ty.kind == TypeKind::String {
                "string"
            } else {
                "binary"
            })?;
            if ty.size != UNBOUNDED_SIZE {
                write!(f, " ({})", ty.size)?;
            }
        }
        TypeKind::Fixed => write!(f, "fixed ({})", ty.size)?,
        TypeKind::Bool => f.write_str("bool")?,
        TypeKind::U8 => f.write_str("u8")?,
        TypeKind::U16 => f.write_str("u16")?,
        TypeKind::U32 => f.write_str("u32")?,
        TypeKind::U64 => f.write_str("u64")?,
        TypeKind::I8 => f.write_str("i8")?,
        TypeKind::I16 => f.write_str("i16")?,
        TypeKind::I32 => f.write_str("i32")?,
        TypeKind::I64 => f.write_str("i64")?,
        TypeKind::F64 => f.write_str("f64")?,
        TypeKind::Date => f.write_str("date")?,
        TypeKind::TimeOfDayMilli => f.write_str("timeOfDayMilli")?,
        TypeKind::TimeOfDayNano => f.write_str("timeOfDayNano")?,
        TypeKind::NanoTime => f.write_str("nanotime")?,
        TypeKind::MilliTime => f.write_str("millitime")?,
        TypeKind::Decimal => f.write_str("decimal")?,
        TypeKind::Object => f.write_str("object")?,
    }
    if ty.sequence {
        f.write_str(" []")?;
    }
    Ok(())
}

impl fmt::Display for Schema {
    /// Canonical schema text: parsing the output reproduces an equal
    /// definition graph.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ns_at, ns) in self.namespaces.iter().enumerate() {
            if !ns.name.is_empty() {
                writeln!(f, "namespace {}", ns.name)?;
            }
            if ns_at == 0 {
                for a in &self.annotes {
                    f.write_str("schema <- ")?;
                    write_annotes(f, std::slice::from_ref(a))?;
                    writeln!(f)?;
                }
            }
            for idx in &ns.defs {
                match self.def(*idx) {
                    Definition::Group(g) => {
                        write_annotes(f, &g.annotes)?;
                        write_name(f, &g.name)?;
                        if let Some(id) = g.id {
                            write!(f, "/{id}")?;
                        }
                        if let Some(sup) = &g.super_name {
                            f.write_str(" : ")?;
                            write_name(f, sup)?;
                        }
                        for (at, field) in g.fields.iter().enumerate() {
                            f.write_str(if at == 0 { " -> " } else { ", " })?;
                            write_annotes(f, &field.ty.annotes)?;
                            write_type(f, &field.ty)?;
                            f.write_str(" ")?;
                            write_annotes(f, &field.annotes)?;
                            write_name(f, &field.name)?;
                            if let Some(id) = field.id {
                                write!(f, "/{id}")?;
                            }
                            if field.optional {
                                f.write_str("?")?;
                            }
                        }
                        writeln!(f)?;
                    }
                    Definition::Enum(e) => {
                        write_annotes(f, &e.annotes)?;
                        write_name(f, &e.name)?;
                        f.write_str(" = ")?;
                        if e.singleton {
                            f.write_str("| ")?;
                        }
                        for (at, sym) in e.symbols.iter().enumerate() {
                            if at > 0 {
                                f.write_str(" | ")?;
                            }
                            write_annotes(f, &sym.annotes)?;
                            write_name(f, &sym.name)?;
                            if !sym.implicit {
                                write!(f, "/{}", sym.value)?;
                            }
                        }
                        writeln!(f)?;
                    }
                    Definition::TypeDef(t) => {
                        write_annotes(f, &t.annotes)?;
                        write_name(f, &t.name)?;
                        f.write_str(" = ")?;
                        write_annotes(f, &t.ty.annotes)?;
                        write_type(f, &t.ty)?;
                        writeln!(f)?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[test]
fn test_split_qname() {
    assert_eq!(("", "Msg"), split_qname("Msg"));
    assert_eq!(("ns", "Msg"), split_qname("ns:Msg"));
    assert_eq!(("", ""), split_qname(""));
}
