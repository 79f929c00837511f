//! Declarations and references
//!
//! A declaration describes the full shape of a symbol where it is defined (the generic
//! parameters, the modifiers, the enclosing class). A reference is the small value used at a use
//! site: it carries only what is needed to emit a constant pool entry and to type-check the
//! instruction using it.
//!
//!   - __Packages__ are [`PackageDecl`] and [`PackageRef`]
//!   - __Classes__ are [`ClassDecl`] and [`ClassRef`]
//!   - __Methods__ are [`MethodDecl`] and [`MethodRef`]
//!   - __Fields__ are [`FieldDecl`] and [`FieldRef`]

mod class;
mod field;
mod method;
mod package;

pub use class::*;
pub use field::*;
pub use method::*;
pub use package::*;
