//! Recursive-descent parser for the Blink schema language.
//!
//! The parser builds the unresolved definition graph; name resolution
//! and constraint checking happen afterwards in `resolve`. The first
//! malformed construct wins and nothing of the partial parse escapes.

use super::{
    Annotation, Config, DefIndex, Definition, EnumDef, Error, Field, Group, IncrAnnote, Namespace,
    Schema, Symbol, TypeDef, TypeDesc, TypeKind, UNBOUNDED_SIZE, put_annotation,
};
use crate::lexer::{Lexer, Location, Token, TokenKind};
use log::debug;

pub(super) fn parse(src: &str, config: &Config) -> Result<Schema, Error> {
    Parser {
        lexer: Lexer::with_limit(src, config.max_token_len),
        lookahead: Vec::new(),
        schema: Schema {
            namespaces: Vec::new(),
            defs: Vec::new(),
            annotes: Vec::new(),
            pending: Vec::new(),
            finalised: false,
        },
        ns: 0,
    }
    .run()
}

fn type_kind_of(kind: TokenKind<'_>) -> Option<TypeKind> {
    Some(match kind {
        TokenKind::String => TypeKind::String,
        TokenKind::Binary => TypeKind::Binary,
        TokenKind::Fixed => TypeKind::Fixed,
        TokenKind::Bool => TypeKind::Bool,
        TokenKind::U8 => TypeKind::U8,
        TokenKind::U16 => TypeKind::U16,
        TokenKind::U32 => TypeKind::U32,
        TokenKind::U64 => TypeKind::U64,
        TokenKind::I8 => TypeKind::I8,
        TokenKind::I16 => TypeKind::I16,
        TokenKind::I32 => TypeKind::I32,
        TokenKind::I64 => TypeKind::I64,
        TokenKind::F64 => TypeKind::F64,
        TokenKind::Date => TypeKind::Date,
        TokenKind::TimeOfDayMilli => TypeKind::TimeOfDayMilli,
        TokenKind::TimeOfDayNano => TypeKind::TimeOfDayNano,
        TokenKind::NanoTime => TypeKind::NanoTime,
        TokenKind::MilliTime => TypeKind::MilliTime,
        TokenKind::Decimal => TypeKind::Decimal,
        TokenKind::Object => TypeKind::Object,
        _ => return None,
    })
}

struct Parser<'src> {
    lexer: Lexer<'src>,
    lookahead: Vec<Token<'src>>,
    schema: Schema,
    ns: usize,
}

impl<'src> Parser<'src> {
    fn peek(&mut self) -> Result<Token<'src>, Error> {
        if self.lookahead.is_empty() {
            let token = self.lexer.next_token()?;
            self.lookahead.push(token);
        }
        Ok(self.lookahead[0])
    }

    fn peek2(&mut self) -> Result<Token<'src>, Error> {
        while self.lookahead.len() < 2 {
            let token = self.lexer.next_token()?;
            self.lookahead.push(token);
        }
        Ok(self.lookahead[1])
    }

    fn advance(&mut self) -> Result<Token<'src>, Error> {
        if self.lookahead.is_empty() {
            Ok(self.lexer.next_token()?)
        } else {
            Ok(self.lookahead.remove(0))
        }
    }

    fn eat(&mut self, kind: TokenKind<'static>) -> Result<bool, Error> {
        if self.peek()?.kind == kind {
            self.advance()?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn unexpected(&self, expected: &'static str, token: Token<'_>) -> Error {
        debug!(
            "expecting {expected}, found {} at {}",
            token.kind.describe(),
            token.loc
        );
        Error::Syntax {
            expected,
            found: token.kind.describe(),
            loc: token.loc,
        }
    }

    fn expect(&mut self, kind: TokenKind<'static>, expected: &'static str) -> Result<(), Error> {
        let token = self.advance()?;
        if token.kind == kind {
            Ok(())
        } else {
            Err(self.unexpected(expected, token))
        }
    }

    fn expect_name(&mut self) -> Result<(&'src str, Location), Error> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Name(name) => Ok((name, token.loc)),
            _ => Err(self.unexpected("a name", token)),
        }
    }

    fn expect_uint(&mut self) -> Result<(u64, Location), Error> {
        let token = self.advance()?;
        match token.kind {
            TokenKind::Uint(value) => Ok((value, token.loc)),
            _ => Err(self.unexpected("a number", token)),
        }
    }

    fn expect_size(&mut self) -> Result<u32, Error> {
        let (value, loc) = self.expect_uint()?;
        u32::try_from(value).map_err(|_| Error::SizeOutOfRange { loc })
    }

    fn open_namespace(&mut self, name: &str) -> usize {
        match self.schema.namespaces.iter().position(|ns| ns.name == name) {
            Some(at) => at,
            None => {
                self.schema.namespaces.push(Namespace {
                    name: name.to_owned(),
                    defs: Vec::new(),
                });
                self.schema.namespaces.len() - 1
            }
        }
    }

    fn push_def(&mut self, def: Definition) {
        let idx = DefIndex(self.schema.defs.len());
        self.schema.defs.push(def);
        self.schema.namespaces[self.ns].defs.push(idx);
    }

    fn check_duplicate(&self, name: &str, loc: Location) -> Result<(), Error> {
        let ns = &self.schema.namespaces[self.ns];
        if self.schema.find_in_namespace(ns, name).is_some() {
            debug!("duplicate definition name '{name}' at {loc}");
            Err(Error::DuplicateDefinition {
                name: name.to_owned(),
                loc,
            })
        } else {
            Ok(())
        }
    }

    fn run(mut self) -> Result<Schema, Error> {
        if self.peek()?.kind == TokenKind::Namespace {
            self.advance()?;
            let (name, _) = self.expect_name()?;
            self.ns = self.open_namespace(name);
        } else {
            self.ns = self.open_namespace("");
        }

        loop {
            let def_annotes = self.parse_annotes()?;
            let token = self.peek()?;
            match token.kind {
                TokenKind::Eof => {
                    if !def_annotes.is_empty() {
                        return Err(self.unexpected("a group, enum, or type definition", token));
                    }
                    return Ok(self.schema);
                }
                // a repeated declaration re-opens the namespace
                TokenKind::Namespace => {
                    if !def_annotes.is_empty() {
                        return Err(self.unexpected("a group, enum, or type definition", token));
                    }
                    self.advance()?;
                    let (name, _) = self.expect_name()?;
                    self.ns = self.open_namespace(name);
                }
                TokenKind::Schema | TokenKind::CName(_) => {
                    if !def_annotes.is_empty() {
                        return Err(self.unexpected("a group, enum, or type definition", token));
                    }
                    self.parse_incr_annote()?;
                }
                TokenKind::Name(_) => match self.peek2()?.kind {
                    TokenKind::Period | TokenKind::LArrow => {
                        if !def_annotes.is_empty() {
                            return Err(
                                self.unexpected("a group, enum, or type definition", token)
                            );
                        }
                        self.parse_incr_annote()?;
                    }
                    TokenKind::Equal => self.parse_enum_or_typedef(def_annotes)?,
                    _ => self.parse_group(def_annotes)?,
                },
                _ => return Err(self.unexpected("a group, enum, or type definition", token)),
            }
        }
    }

    fn parse_annotes(&mut self) -> Result<Vec<Annotation>, Error> {
        let mut out = Vec::new();
        while self.eat(TokenKind::At)? {
            let (key, value) = self.parse_annote()?;
            put_annotation(&mut out, key, value);
        }
        Ok(out)
    }

    fn parse_annote(&mut self) -> Result<(String, String), Error> {
        let token = self.advance()?;
        let key = match token.kind {
            TokenKind::Name(name) | TokenKind::CName(name) => name.to_owned(),
            kind if type_kind_of(kind).is_some() => kind.describe().to_owned(),
            _ => return Err(self.unexpected("an annotation name", token)),
        };
        self.expect(TokenKind::Equal, "'='")?;
        let token = self.advance()?;
        match token.kind {
            TokenKind::Literal(value) => Ok((key, value.to_owned())),
            _ => Err(self.unexpected("a literal", token)),
        }
    }

    fn parse_incr_annote(&mut self) -> Result<(), Error> {
        let token = self.advance()?;
        let mut incr = IncrAnnote {
            ns: self.ns,
            target: None,
            component: None,
            on_type: false,
            annotes: Vec::new(),
            id: None,
        };
        match token.kind {
            TokenKind::Schema => {}
            TokenKind::Name(name) | TokenKind::CName(name) => {
                incr.target = Some(name.to_owned());
            }
            _ => return Err(self.unexpected("'schema' or a definition name", token)),
        }

        if incr.target.is_some() && self.eat(TokenKind::Period)? {
            let token = self.advance()?;
            match token.kind {
                TokenKind::Name(name) => {
                    incr.component = Some(name.to_owned());
                    if self.eat(TokenKind::Period)? {
                        self.expect(TokenKind::Type, "'type'")?;
                        incr.on_type = true;
                    }
                }
                TokenKind::Type => incr.on_type = true,
                _ => return Err(self.unexpected("a name or 'type'", token)),
            }
        }

        self.expect(TokenKind::LArrow, "'<-'")?;
        loop {
            let token = self.advance()?;
            match token.kind {
                TokenKind::At => {
                    let (key, value) = self.parse_annote()?;
                    put_annotation(&mut incr.annotes, key, value);
                }
                TokenKind::Uint(value) => incr.id = Some(value),
                _ => return Err(self.unexpected("a number or '@'", token)),
            }
            if !self.eat(TokenKind::LArrow)? {
                break;
            }
        }

        self.schema.pending.push(incr);
        Ok(())
    }

    fn parse_enum_or_typedef(&mut self, def_annotes: Vec<Annotation>) -> Result<(), Error> {
        let (name, loc) = self.expect_name()?;
        self.check_duplicate(name, loc)?;
        self.expect(TokenKind::Equal, "'='")?;

        let singleton = self.eat(TokenKind::Bar)?;
        // these annotations belong to the first symbol of an enum, or
        // to the type element of a type definition
        let first_annotes = self.parse_annotes()?;

        let is_enum = singleton
            || (matches!(self.peek()?.kind, TokenKind::Name(_))
                && matches!(self.peek2()?.kind, TokenKind::Slash | TokenKind::Bar));

        if is_enum {
            self.parse_enum(name, def_annotes, first_annotes, singleton)
        } else {
            let mut ty = self.parse_type()?;
            ty.annotes = first_annotes;
            self.push_def(Definition::TypeDef(TypeDef {
                name: name.to_owned(),
                ty,
                annotes: def_annotes,
            }));
            Ok(())
        }
    }

    fn parse_enum(
        &mut self,
        name: &str,
        def_annotes: Vec<Annotation>,
        first_annotes: Vec<Annotation>,
        singleton: bool,
    ) -> Result<(), Error> {
        let mut symbols: Vec<Symbol> = Vec::new();
        let mut annotes = first_annotes;
        loop {
            if !symbols.is_empty() {
                annotes = self.parse_annotes()?;
            }
            let (sym_name, loc) = self.expect_name()?;
            if symbols.iter().any(|s| s.name == sym_name) {
                debug!("duplicate enum symbol name '{sym_name}' at {loc}");
                return Err(Error::DuplicateSymbol {
                    name: sym_name.to_owned(),
                    loc,
                });
            }

            let mut explicit = None;
            if self.eat(TokenKind::Slash)? {
                let token = self.advance()?;
                let value = match token.kind {
                    TokenKind::Uint(value) => {
                        if value > i32::MAX as u64 {
                            return Err(Error::EnumValueOutOfRange {
                                symbol: sym_name.to_owned(),
                                loc: token.loc,
                            });
                        }
                        value as i32
                    }
                    TokenKind::Int(value) => {
                        if value < i64::from(i32::MIN) {
                            return Err(Error::EnumValueOutOfRange {
                                symbol: sym_name.to_owned(),
                                loc: token.loc,
                            });
                        }
                        value as i32
                    }
                    _ => return Err(self.unexpected("an enum symbol value", token)),
                };
                explicit = Some(value);
            }

            let (value, implicit) = match (explicit, symbols.last()) {
                (Some(value), Some(prev)) => {
                    if value <= prev.value {
                        debug!("enum value {value} of '{sym_name}' is ambiguous");
                        return Err(Error::AmbiguousEnumValue {
                            symbol: sym_name.to_owned(),
                            loc,
                        });
                    }
                    (value, false)
                }
                (Some(value), None) => (value, false),
                (None, Some(prev)) => {
                    if prev.value == i32::MAX {
                        return Err(Error::EnumValueOverflow {
                            symbol: sym_name.to_owned(),
                            loc,
                        });
                    }
                    (prev.value + 1, true)
                }
                (None, None) => (0, true),
            };

            symbols.push(Symbol {
                name: sym_name.to_owned(),
                value,
                implicit,
                annotes: std::mem::take(&mut annotes),
            });

            if singleton || !self.eat(TokenKind::Bar)? {
                break;
            }
        }

        self.push_def(Definition::Enum(EnumDef {
            name: name.to_owned(),
            singleton,
            symbols,
            annotes: def_annotes,
        }));
        Ok(())
    }

    fn parse_group(&mut self, def_annotes: Vec<Annotation>) -> Result<(), Error> {
        let (name, loc) = self.expect_name()?;
        self.check_duplicate(name, loc)?;

        let mut group = Group {
            name: name.to_owned(),
            ns: self.ns,
            id: None,
            super_name: None,
            super_def: None,
            fields: Vec::new(),
            annotes: def_annotes,
        };

        if self.eat(TokenKind::Slash)? {
            group.id = Some(self.expect_uint()?.0);
        }

        if self.eat(TokenKind::Colon)? {
            let token = self.advance()?;
            match token.kind {
                TokenKind::Name(sup) | TokenKind::CName(sup) => {
                    group.super_name = Some(sup.to_owned());
                }
                _ => return Err(self.unexpected("a super group name", token)),
            }
        }

        if self.eat(TokenKind::RArrow)? {
            loop {
                let type_annotes = self.parse_annotes()?;
                let mut ty = self.parse_type()?;
                ty.annotes = type_annotes;
                let field_annotes = self.parse_annotes()?;

                let (field_name, field_loc) = self.expect_name()?;
                if group.fields.iter().any(|f| f.name == field_name) {
                    debug!("duplicate field name '{field_name}' at {field_loc}");
                    return Err(Error::DuplicateField {
                        name: field_name.to_owned(),
                        loc: field_loc,
                    });
                }

                let id = if self.eat(TokenKind::Slash)? {
                    Some(self.expect_uint()?.0)
                } else {
                    None
                };
                let optional = self.eat(TokenKind::Question)?;

                group.fields.push(Field {
                    name: field_name.to_owned(),
                    id,
                    optional,
                    ty,
                    annotes: field_annotes,
                });

                if !self.eat(TokenKind::Comma)? {
                    break;
                }
            }
        }

        self.push_def(Definition::Group(group));
        Ok(())
    }

    fn parse_type(&mut self) -> Result<TypeDesc, Error> {
        let token = self.advance()?;
        let mut ty = match type_kind_of(token.kind) {
            Some(kind) => {
                let mut ty = TypeDesc::primitive(kind);
                match kind {
                    TypeKind::String | TypeKind::Binary => {
                        if self.eat(TokenKind::LParen)? {
                            ty.size = self.expect_size()?;
                            self.expect(TokenKind::RParen, "')'")?;
                        } else {
                            ty.size = UNBOUNDED_SIZE;
                        }
                    }
                    TypeKind::Fixed => {
                        self.expect(TokenKind::LParen, "'('")?;
                        ty.size = self.expect_size()?;
                        self.expect(TokenKind::RParen, "')'")?;
                    }
                    _ => {}
                }
                ty
            }
            None => match token.kind {
                TokenKind::Name(name) | TokenKind::CName(name) => {
                    let mut ty = TypeDesc::primitive(TypeKind::Ref);
                    ty.ref_name = Some(name.to_owned());
                    if self.eat(TokenKind::Star)? {
                        ty.dynamic = true;
                    }
                    ty
                }
                _ => return Err(self.unexpected("a type", token)),
            },
        };

        if self.eat(TokenKind::LBracket)? {
            self.expect(TokenKind::RBracket, "']'")?;
            ty.sequence = true;
        }
        Ok(ty)
    }
}
