//! Turns a stream of grammar-rule enter/exit events into a [`crate::ir`]
//! tree.
//!
//! This module owns the adapter-stack rework of the source's
//! inheritance-based antlr4 listener: [`frame::Frame`] is a stack of tagged
//! builder variants instead of a stack of polymorphic adapter objects
//! holding weak pointers to their parents, and [`driver::ParseDriver`] is
//! the loop that used to live in the antlr4-generated walker. Lexing and
//! grammar recognition themselves are out of scope; callers are expected to
//! drive [`driver::ParseDriver`] from whatever front end produces
//! [`event::EnterPayload`] events.

pub mod driver;
pub mod error;
pub mod event;
pub mod frame;

pub use driver::ParseDriver;
pub use error::{ParseError, ParseResult};
pub use event::{EnterPayload, Span};
