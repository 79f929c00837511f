//! Method bodies: instructions, basic blocks, and the incremental code builder
//!
//! A method body is kept as an ordered list of [`BasicBlock`]s. Each block is a run of
//! straight-line [`Instruction`]s (loads, arithmetic, field access, calls, ...) closed off by a single
//! [`BranchInstruction`] (`goto`, conditional jumps, returns, `athrow`, or falling through into the next
//! block). Jump targets are [`SynLabel`]s until the body is finished, at which point blocks are
//! laid out and labels become byte offsets.
//!
//! [`CodeBuilder`] appends instructions one at a time and runs each one through the verifier's
//! frame transition before accepting it, so a rejected instruction never makes it into the block.
//! Finishing the builder produces the [`Code`] attribute along with its `StackMapTable` and
//! `LineNumberTable`.

mod basic_block;
mod code;
mod code_builder;
mod instructions;
mod label;

pub use basic_block::*;
pub use code::*;
pub use code_builder::*;
pub use instructions::*;
pub use label::*;
