//! Tokeniser for the Blink schema language.
//!
//! Whitespace separates tokens and `#` starts a comment running to the
//! end of the line. A leading `\` escapes a reserved word so it can be
//! used as an ordinary name.

use std::{error, fmt};

/// Default byte budget for a single name or quoted literal.
pub const DEFAULT_MAX_TOKEN_LEN: usize = 4096;

/// Position of a token in the source, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub line: u32,
    pub col: u32,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TokenKind<'src> {
    // reserved type words
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
    // keywords
    Namespace,
    Schema,
    Type,
    // carriers
    Name(&'src str),
    /// A name pair with exactly one embedded colon.
    CName(&'src str),
    Uint(u64),
    Int(i64),
    Literal(&'src str),
    // punctuators
    Equal,
    Comma,
    Period,
    Question,
    LBracket,
    RBracket,
    LParen,
    RParen,
    Star,
    Bar,
    Slash,
    At,
    Colon,
    RArrow,
    LArrow,
    Eof,
}

impl TokenKind<'_> {
    /// Printable form used in error messages.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Binary => "binary",
            Self::Fixed => "fixed",
            Self::Bool => "bool",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F64 => "f64",
            Self::Date => "date",
            Self::TimeOfDayMilli => "timeOfDayMilli",
            Self::TimeOfDayNano => "timeOfDayNano",
            Self::NanoTime => "nanotime",
            Self::MilliTime => "millitime",
            Self::Decimal => "decimal",
            Self::Object => "object",
            Self::Namespace => "namespace",
            Self::Schema => "schema",
            Self::Type => "type",
            Self::Name(_) => "<name>",
            Self::CName(_) => "<cname>",
            Self::Uint(_) => "<uint>",
            Self::Int(_) => "<int>",
            Self::Literal(_) => "<literal>",
            Self::Equal => "=",
            Self::Comma => ",",
            Self::Period => ".",
            Self::Question => "?",
            Self::LBracket => "[",
            Self::RBracket => "]",
            Self::LParen => "(",
            Self::RParen => ")",
            Self::Star => "*",
            Self::Bar => "|",
            Self::Slash => "/",
            Self::At => "@",
            Self::Colon => ":",
            Self::RArrow => "->",
            Self::LArrow => "<-",
            Self::Eof => "<eof>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'src> {
    pub kind: TokenKind<'src>,
    pub loc: Location,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErrorKind {
    UnknownChar(char),
    UnterminatedLiteral,
    TokenTooLong,
    IntegerOverflow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Error {
    pub kind: ErrorKind,
    pub loc: Location,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::UnknownChar(c) => write!(f, "unknown character {c:?} at {}", self.loc),
            ErrorKind::UnterminatedLiteral => write!(f, "unterminated literal at {}", self.loc),
            ErrorKind::TokenTooLong => write!(f, "token too long at {}", self.loc),
            ErrorKind::IntegerOverflow => write!(f, "integer literal overflow at {}", self.loc),
        }
    }
}

impl error::Error for Error {}

fn is_name_start(byte: u8) -> bool {
    byte == b'_' || byte.is_ascii_alphabetic()
}

fn is_name_char(byte: u8) -> bool {
    byte == b'_' || byte.is_ascii_alphanumeric()
}

fn keyword(word: &str) -> Option<TokenKind<'static>> {
    Some(match word {
        "string" => TokenKind::String,
        "binary" => TokenKind::Binary,
        "fixed" => TokenKind::Fixed,
        "bool" => TokenKind::Bool,
        "u8" => TokenKind::U8,
        "u16" => TokenKind::U16,
        "u32" => TokenKind::U32,
        "u64" => TokenKind::U64,
        "i8" => TokenKind::I8,
        "i16" => TokenKind::I16,
        "i32" => TokenKind::I32,
        "i64" => TokenKind::I64,
        "f64" => TokenKind::F64,
        "date" => TokenKind::Date,
        "timeOfDayMilli" => TokenKind::TimeOfDayMilli,
        "timeOfDayNano" => TokenKind::TimeOfDayNano,
        "nanotime" => TokenKind::NanoTime,
        "millitime" => TokenKind::MilliTime,
        "decimal" => TokenKind::Decimal,
        "object" => TokenKind::Object,
        "namespace" => TokenKind::Namespace,
        "schema" => TokenKind::Schema,
        "type" => TokenKind::Type,
        _ => return None,
    })
}

/// True when `word` is a reserved word and needs a `\` escape to be
/// used as a name.
pub(crate) fn is_reserved(word: &str) -> bool {
    keyword(word).is_some()
}

#[derive(Debug, Clone)]
pub struct Lexer<'src> {
    src: &'src str,
    pos: usize,
    line: u32,
    col: u32,
    max_token_len: usize,
}

impl<'src> Lexer<'src> {
    #[must_use]
    pub fn new(src: &'src str) -> Self {
        Self::with_limit(src, DEFAULT_MAX_TOKEN_LEN)
    }

    #[must_use]
    pub fn with_limit(src: &'src str, max_token_len: usize) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            col: 1,
            max_token_len,
        }
    }

    fn byte(&self, at: usize) -> Option<u8> {
        self.src.as_bytes().get(at).copied()
    }

    fn bump(&mut self) {
        if self.byte(self.pos) == Some(b'\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
    }

    fn location(&self) -> Location {
        Location {
            line: self.line,
            col: self.col,
        }
    }

    fn skip_separators(&mut self) {
        while let Some(byte) = self.byte(self.pos) {
            match byte {
                b' ' | b'\t' | b'\r' | b'\n' => self.bump(),
                b'#' => {
                    while let Some(byte) = self.byte(self.pos) {
                        self.bump();
                        if byte == b'\n' {
                            break;
                        }
                    }
                }
                _ => break,
            }
        }
    }

    fn take_word(&mut self) -> &'src str {
        let start = self.pos;
        while self.byte(self.pos).is_some_and(is_name_char) {
            self.bump();
        }
        &self.src[start..self.pos]
    }

    fn fail(&self, kind: ErrorKind, loc: Location) -> Error {
        Error { kind, loc }
    }

    /// Next token. `Eof` repeats indefinitely once the input is drained.
    pub fn next_token(&mut self) -> Result<Token<'src>, Error> {
        self.skip_separators();

        let loc = self.location();
        let Some(byte) = self.byte(self.pos) else {
            return Ok(Token {
                kind: TokenKind::Eof,
                loc,
            });
        };

        let kind = match byte {
            b'=' => self.punctuator(TokenKind::Equal),
            b',' => self.punctuator(TokenKind::Comma),
            b'.' => self.punctuator(TokenKind::Period),
            b'?' => self.punctuator(TokenKind::Question),
            b'[' => self.punctuator(TokenKind::LBracket),
            b']' => self.punctuator(TokenKind::RBracket),
            b'(' => self.punctuator(TokenKind::LParen),
            b')' => self.punctuator(TokenKind::RParen),
            b'*' => self.punctuator(TokenKind::Star),
            b'|' => self.punctuator(TokenKind::Bar),
            b'/' => self.punctuator(TokenKind::Slash),
            b'@' => self.punctuator(TokenKind::At),
            b':' => self.punctuator(TokenKind::Colon),
            b'<' => {
                if self.byte(self.pos + 1) == Some(b'-') {
                    self.bump();
                    self.bump();
                    TokenKind::LArrow
                } else {
                    return Err(self.fail(ErrorKind::UnknownChar('<'), loc));
                }
            }
            b'-' => match self.byte(self.pos + 1) {
                Some(b'>') => {
                    self.bump();
                    self.bump();
                    TokenKind::RArrow
                }
                Some(digit) if digit.is_ascii_digit() => {
                    self.bump();
                    self.signed_number(loc)?
                }
                _ => return Err(self.fail(ErrorKind::UnknownChar('-'), loc)),
            },
            b'\\' => {
                self.bump();
                if !self.byte(self.pos).is_some_and(is_name_start) {
                    return Err(self.fail(ErrorKind::UnknownChar('\\'), loc));
                }
                let word = self.take_word();
                self.check_len(word, loc)?;
                TokenKind::Name(word)
            }
            b'\'' | b'"' => self.literal(byte, loc)?,
            digit if digit.is_ascii_digit() => self.unsigned_number(loc)?,
            start if is_name_start(start) => self.word_or_cname(loc)?,
            _ => {
                let c = self.src[self.pos..].chars().next().unwrap_or('\u{fffd}');
                return Err(self.fail(ErrorKind::UnknownChar(c), loc));
            }
        };

        Ok(Token { kind, loc })
    }

    fn punctuator(&mut self, kind: TokenKind<'src>) -> TokenKind<'src> {
        self.bump();
        kind
    }

    fn check_len(&self, token: &str, loc: Location) -> Result<(), Error> {
        if token.len() > self.max_token_len {
            Err(self.fail(ErrorKind::TokenTooLong, loc))
        } else {
            Ok(())
        }
    }

    fn word_or_cname(&mut self, loc: Location) -> Result<TokenKind<'src>, Error> {
        let start = self.pos;
        self.take_word();

        // one embedded colon makes a cname
        if self.byte(self.pos) == Some(b':') && self.byte(self.pos + 1).is_some_and(is_name_char) {
            self.bump();
            self.take_word();
            let cname = &self.src[start..self.pos];
            self.check_len(cname, loc)?;
            return Ok(TokenKind::CName(cname));
        }

        let word = &self.src[start..self.pos];
        self.check_len(word, loc)?;
        Ok(keyword(word).unwrap_or(TokenKind::Name(word)))
    }

    fn unsigned_number(&mut self, loc: Location) -> Result<TokenKind<'src>, Error> {
        if self.byte(self.pos) == Some(b'0')
            && self.byte(self.pos + 1) == Some(b'x')
            && self.byte(self.pos + 2).is_some_and(|b| b.is_ascii_hexdigit())
        {
            self.bump();
            self.bump();
            let mut value = 0u64;
            while let Some(byte) = self.byte(self.pos) {
                let Some(digit) = (byte as char).to_digit(16) else {
                    break;
                };
                value = value
                    .checked_mul(16)
                    .and_then(|v| v.checked_add(u64::from(digit)))
                    .ok_or_else(|| self.fail(ErrorKind::IntegerOverflow, loc))?;
                self.bump();
            }
            return Ok(TokenKind::Uint(value));
        }

        let mut value = 0u64;
        while let Some(byte) = self.byte(self.pos) {
            if !byte.is_ascii_digit() {
                break;
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_add(u64::from(byte - b'0')))
                .ok_or_else(|| self.fail(ErrorKind::IntegerOverflow, loc))?;
            self.bump();
        }
        Ok(TokenKind::Uint(value))
    }

    /// Digits after a consumed `-`.
    fn signed_number(&mut self, loc: Location) -> Result<TokenKind<'src>, Error> {
        let mut value = 0i64;
        while let Some(byte) = self.byte(self.pos) {
            if !byte.is_ascii_digit() {
                break;
            }
            value = value
                .checked_mul(10)
                .and_then(|v| v.checked_sub(i64::from(byte - b'0')))
                .ok_or_else(|| self.fail(ErrorKind::IntegerOverflow, loc))?;
            self.bump();
        }
        Ok(TokenKind::Int(value))
    }

    fn literal(&mut self, quote: u8, loc: Location) -> Result<TokenKind<'src>, Error> {
        self.bump();
        let start = self.pos;
        loop {
            match self.byte(self.pos) {
                None | Some(b'\n') => return Err(self.fail(ErrorKind::UnterminatedLiteral, loc)),
                Some(byte) if byte == quote => {
                    let literal = &self.src[start..self.pos];
                    self.bump();
                    self.check_len(literal, loc)?;
                    return Ok(TokenKind::Literal(literal));
                }
                Some(_) => self.bump(),
            }
        }
    }
}

#[cfg(test)]
fn kinds(src: &str) -> Vec<TokenKind<'_>> {
    let mut lexer = Lexer::new(src);
    let mut out = Vec::new();
    loop {
        let token = lexer.next_token().unwrap();
        let done = token.kind == TokenKind::Eof;
        out.push(token.kind);
        if done {
            return out;
        }
    }
}

#[test]
fn test_empty_input() {
    assert_eq!(vec![TokenKind::Eof], kinds(""));
    assert_eq!(vec![TokenKind::Eof], kinds("   \r\n\t"));
    assert_eq!(vec![TokenKind::Eof], kinds("# comment only\n# another\n"));
}

#[test]
fn test_reserved_words() {
    use TokenKind::*;
    assert_eq!(
        vec![
            String, Binary, Fixed, Bool, U8, U16, U32, U64, I8, I16, I32, I64, F64, Date,
            TimeOfDayMilli, TimeOfDayNano, NanoTime, MilliTime, Decimal, Object, Namespace,
            Schema, Type, Eof
        ],
        kinds(
            "string binary fixed bool u8 u16 u32 u64 i8 i16 i32 i64 f64 date \
             timeOfDayMilli timeOfDayNano nanotime millitime decimal object \
             namespace schema type"
        )
    );
}

#[test]
fn test_punctuators() {
    use TokenKind::*;
    assert_eq!(
        vec![
            Equal, Comma, Period, Question, LBracket, RBracket, LParen, RParen, Star, Bar,
            Slash, At, Colon, RArrow, LArrow, Eof
        ],
        kinds("= , . ? [ ] ( ) * | / @ : -> <-")
    );
}

#[test]
fn test_names() {
    assert_eq!(
        vec![TokenKind::Name("emptyGroup"), TokenKind::Eof],
        kinds("emptyGroup")
    );
    assert_eq!(
        vec![TokenKind::Name("_leading"), TokenKind::Name("trailing9"), TokenKind::Eof],
        kinds("_leading trailing9")
    );
    // a reserved word continued makes a plain name
    assert_eq!(vec![TokenKind::Name("u8x"), TokenKind::Eof], kinds("u8x"));
}

#[test]
fn test_escaped_names() {
    assert_eq!(vec![TokenKind::Name("u8"), TokenKind::Eof], kinds("\\u8"));
    assert_eq!(
        vec![TokenKind::Name("namespace"), TokenKind::Eof],
        kinds("\\namespace")
    );
}

#[test]
fn test_cname() {
    assert_eq!(
        vec![TokenKind::CName("ns:local"), TokenKind::Eof],
        kinds("ns:local")
    );
    // only one embedded colon is consumed
    assert_eq!(
        vec![
            TokenKind::CName("a:b"),
            TokenKind::Colon,
            TokenKind::Name("c"),
            TokenKind::Eof
        ],
        kinds("a:b:c")
    );
    // a trailing colon stays a separate token
    assert_eq!(
        vec![TokenKind::Name("a"), TokenKind::Colon, TokenKind::Eof],
        kinds("a:")
    );
}

#[test]
fn test_numbers() {
    assert_eq!(vec![TokenKind::Uint(0), TokenKind::Eof], kinds("0"));
    assert_eq!(vec![TokenKind::Uint(42), TokenKind::Eof], kinds("42"));
    assert_eq!(
        vec![TokenKind::Uint(0xdeadbeef), TokenKind::Eof],
        kinds("0xdeadBEEF")
    );
    assert_eq!(vec![TokenKind::Int(-42), TokenKind::Eof], kinds("-42"));
    assert_eq!(
        vec![TokenKind::Uint(u64::MAX), TokenKind::Eof],
        kinds("18446744073709551615")
    );
    assert_eq!(
        vec![TokenKind::Int(i64::MIN), TokenKind::Eof],
        kinds("-9223372036854775808")
    );
}

#[test]
fn test_number_overflow() {
    let mut lexer = Lexer::new("18446744073709551616");
    assert_eq!(
        ErrorKind::IntegerOverflow,
        lexer.next_token().unwrap_err().kind
    );
}

#[test]
fn test_literals() {
    assert_eq!(
        vec![TokenKind::Literal("hello world"), TokenKind::Eof],
        kinds("\"hello world\"")
    );
    assert_eq!(
        vec![TokenKind::Literal("single"), TokenKind::Eof],
        kinds("'single'")
    );
    assert_eq!(vec![TokenKind::Literal(""), TokenKind::Eof], kinds("''"));

    let mut lexer = Lexer::new("\"no end");
    assert_eq!(
        ErrorKind::UnterminatedLiteral,
        lexer.next_token().unwrap_err().kind
    );
    let mut lexer = Lexer::new("\"line\nbreak\"");
    assert_eq!(
        ErrorKind::UnterminatedLiteral,
        lexer.next_token().unwrap_err().kind
    );
}

#[test]
fn test_comments_between_tokens() {
    assert_eq!(
        vec![TokenKind::Name("a"), TokenKind::Name("b"), TokenKind::Eof],
        kinds("a # trailing comment\n# full line\nb")
    );
}

#[test]
fn test_unknown_characters() {
    let mut lexer = Lexer::new("%");
    assert_eq!(
        ErrorKind::UnknownChar('%'),
        lexer.next_token().unwrap_err().kind
    );
    let mut lexer = Lexer::new("<x");
    assert_eq!(
        ErrorKind::UnknownChar('<'),
        lexer.next_token().unwrap_err().kind
    );
}

#[test]
fn test_token_budget() {
    let mut lexer = Lexer::with_limit("abcdefgh", 4);
    assert_eq!(ErrorKind::TokenTooLong, lexer.next_token().unwrap_err().kind);
    let mut lexer = Lexer::with_limit("abcd", 4);
    assert_eq!(
        TokenKind::Name("abcd"),
        lexer.next_token().unwrap().kind
    );
}

#[test]
fn test_locations() {
    let mut lexer = Lexer::new("a\n  bb\n");
    let a = lexer.next_token().unwrap();
    let b = lexer.next_token().unwrap();
    assert_eq!(Location { line: 1, col: 1 }, a.loc);
    assert_eq!(Location { line: 2, col: 3 }, b.loc);
}

#[test]
fn test_group_definition_stream() {
    use TokenKind::*;
    assert_eq!(
        vec![
            Name("InsertOrder"),
            Slash,
            Uint(1),
            RArrow,
            String,
            Name("Symbol"),
            Comma,
            U32,
            Name("Price"),
            Question,
            Eof
        ],
        kinds("InsertOrder/1 -> string Symbol, u32 Price?")
    );
}
