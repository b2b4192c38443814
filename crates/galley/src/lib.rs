//! # Galley
//!
//! Galley is the typesetting engine behind the Setlang interpreter.
//! It is independent of the macro language: the interpreter's typesetting
//! primitives build Galley data structures, and Galley knows nothing about
//! tokens or macros.
//!
//! The crate contains the box/glue/node data model ([node]), the list
//! builders and mode stack that accumulate nodes ([list]), font metrics
//! interfaces ([font]), the hyphenation helper ([hyphen]), and the document
//! writer interface with a plain-text implementation ([writer]).

pub mod font;
pub mod hyphen;
pub mod list;
pub mod node;
pub mod writer;
