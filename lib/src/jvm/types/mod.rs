//! Type model: erased descriptors, generic types, and signatures

mod constant;
mod descriptors;
mod generics;
mod instantiate;

pub use constant::*;
pub use descriptors::*;
pub use generics::*;
pub use instantiate::*;
