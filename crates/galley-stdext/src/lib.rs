//! # Galley standard library extensions
//!
//! This crate contains general purpose data structures and algorithms
//! that are used in the Galley project but that don't depend on anything
//! specific to the typesetting domain.

pub mod algorithms {
    pub mod substringsearch;
}

pub mod collections {
    pub mod interner;
    pub mod scopedmap;
}
