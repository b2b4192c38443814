//! # Setlang: a typesetting macro language interpreter.
//!
//! This crate implements the core of a typesetting macro language: the
//! token scanner, the scoped interpreter state, the macro expansion engine,
//! and the value parsers.
//! It contains no typesetting primitives of its own; those are provided by
//! the `setlang-stdlib` crate, and the node model they build lives in the
//! `galley` crate.

extern crate galley_stdext;

pub mod command;
pub mod error;
pub mod parse;
pub mod texmacro;
pub mod token;
pub mod variable;
pub mod vm;

/// Module that re-exports the crate's most common types.
pub mod prelude {
    /// Result type used throughout the interpreter.
    pub type Result<T> = std::result::Result<T, Box<crate::error::Error>>;
}

/// Module that re-exports all of the crate's traits.
///
/// This is useful for getting all of the traits in scope in a Rust module:
/// ```
/// use setlang::traits::*;
/// ```
pub mod traits {
    pub use super::parse::Parsable;
    pub use super::vm::HasComponent;
    pub use super::vm::SetlangState;
    pub use super::vm::TokenStream;
}
