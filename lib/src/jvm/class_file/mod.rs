//! In-memory form of the binary class file format
//!
//! Everything in here is close to the bytes: indices into the constant pool instead of names,
//! attributes as opaque blobs. The builders produce a [`ClassFile`] and [`Serialize`] turns it
//! into bytes.

mod attribute;
mod class;
mod constants;
mod member;
mod serialize;
mod version;

pub use attribute::*;
pub use class::*;
pub use constants::*;
pub use member::*;
pub use serialize::*;
pub use version::*;
