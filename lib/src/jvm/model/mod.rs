//! Semantic representations of finished classes
//!
//! This sits between the builders and the binary class file: declarations and verified code are
//! kept around (so the module verifier can inspect them) until the class is serialized.
//!
//!   - __Class__ is represented using [`Class`]
//!   - __Method__ is represented using [`Method`]
//!   - __Field__ is represented using [`Field`]
//!
//! Each of these holds the declaration it was built from, in a `decl` field.

mod class;
mod field;
mod method;

pub use class::*;
pub use field::*;
pub use method::*;
