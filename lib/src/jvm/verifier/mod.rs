//! Bytecode verification utilities
//!
//! For any specific instruction inside a method body, the stack and locals should have the same
//! structure, regardless of which control flow was used to reach that instruction. in other words:
//! although the values on the stack and in the locals may obviously be different, the types and
//! order of the stack and local variables cannot. This information is referred to as the _stack
//! map frame_ (represented using [`VerifierFrame`]) and the set of stack map frames for all
//! possible jump targets in a method is the _stack map table_.
//!
//! Knowing the stack map frame at a point in the code makes it possible to verify that the next
//! instruction makes sense (eg. `dadd` only makes sense if the top two elements on the stack are
//! of type `double`). The "types" used in verification (represented using [`VerificationType`])
//! are slightly augumented to take into account initialization and null.
//!
//! The process of verifying a program is referred to as [verification by type-checking][0], and it
//! is something that the JVM itself does when loading a class. Verifying straight-line
//! instructions is simple (see [`Frame::verify_instruction`]). Instructions reachable from
//! several places (jump targets) are handled by requiring that every edge into a label arrives
//! with exactly the same frame, so no unification is ever needed. Those frames are recorded in a
//! [`crate::jvm::class_file::StackMapTable`] attribute, which the JVM checks instead of inferring.
//!
//! Once a class is finished, [`check_class`] looks over its declarations as a whole (modifiers,
//! duplicates, missing bodies, unresolved classes).
//!
//! [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.10.1

mod frame;
mod module_check;
mod types;

pub use frame::*;
pub use module_check::*;
pub use types::*;
