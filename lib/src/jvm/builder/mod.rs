//! Scoped builders for modules, classes, methods, and code
//!
//! Building goes top-down through a hierarchy of builders:
//!
//!   - [`ModuleBuilder`] owns every class being generated together
//!   - [`ClassBuilder`] declares fields and methods on one class
//!   - [`MethodBuilder`] starts (at most) one body for a method
//!   - [`ScopeBuilder`] emits instructions and owns a run of local variables
//!
//! Children borrow their module, never each other, so a method can still be declared on a class
//! while another method's code is open. The builders are all views into state held by the module:
//! closing one seals that state and dropping an unclosed one abandons it. An abandoned class is
//! left out of the module, and an abandoned scope takes its method's whole body down with it.
//!
//! Every builder call either succeeds or leaves the builder exactly as it was before the call.

mod class;
mod method;
mod module;
mod scope;

pub use class::*;
pub use method::*;
pub use module::*;
pub use scope::*;

use crate::jvm::class_file::ConstantsPool;
use crate::jvm::code::{Code, CodeBuilder};
use crate::jvm::decls::{ClassDecl, FieldDecl, MethodDecl};
use crate::jvm::model::Class;
use crate::jvm::{ClassModifiers, UnqualifiedName};
use crate::util::Offset;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum SlotState {
    Open,
    Closed,

    /// Dropped while still open
    Abandoned,
}

struct ClassSlot<'g> {
    decl: ClassDecl,
    modifiers: ClassModifiers,
    state: SlotState,

    /// Shared by all of the method bodies of the class
    constants_pool: ConstantsPool,

    fields: Vec<FieldDecl>,
    methods: Vec<MethodSlot<'g>>,

    /// Set when the class is closed
    built: Option<Class>,
}

impl<'g> ClassSlot<'g> {
    fn resource(&self) -> String {
        format!("class {}", self.decl.binary_name())
    }
}

struct MethodSlot<'g> {
    decl: MethodDecl,
    state: SlotState,
    body: Body<'g>,
}

impl<'g> MethodSlot<'g> {
    fn resource(&self) -> String {
        format!("method {}", self.decl)
    }
}

enum Body<'g> {
    /// No code was started
    None,

    /// Code is being emitted (the first scope is the root scope)
    Open {
        code: CodeBuilder<'g>,
        scopes: Vec<ScopeSlot>,
    },

    /// Root scope was closed
    Done(Code),

    /// Some scope was dropped without being closed
    Abandoned,
}

struct ScopeSlot {
    parent: Option<usize>,
    state: SlotState,

    /// First local variable slot owned by the scope
    locals_start: Offset,

    /// Next free local variable slot
    next_local: Offset,

    /// Names declared directly in this scope
    local_names: Vec<UnqualifiedName>,
}
