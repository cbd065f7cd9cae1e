//! Blink protocol schema parser and compact-form codec in Rust

/// Typed compact-form primitives
pub mod compact;
/// Schema language tokeniser
pub mod lexer;
/// Runtime object model and schema-driven codec
pub mod object;
/// Schema model, parser, and resolver
pub mod schema;
/// Byte-stream abstraction
pub mod stream;
/// Variable-length-code integer codec
pub mod vlc;
/// Event-driven message decoding
pub mod visit;

pub use self::compact::Decimal;
pub use self::object::{Object, Value};
pub use self::schema::{Config, FieldView, GroupView, Schema, TypeTag};
pub use self::stream::{InputBuffer, OutputBuffer, Stream, VecStream};
pub use self::visit::{MessageVisitor, WireValue, decode_message};
