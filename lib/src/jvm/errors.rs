use crate::jvm::class_file::{Constant, ConstantPoolOverflow};
use crate::jvm::code::SynLabel;
use crate::util::Offset;
use std::fmt;

/// Everything that can go wrong while declaring, building, verifying, or writing classes
///
/// Errors from a single builder call abort only that call: the builder is left as it was before
/// the call and can still be used.
#[derive(Debug)]
pub enum Error {
    /// A class, method, or field with the same identity was already registered in this scope
    DuplicateDeclaration { kind: DeclarationKind, name: String },

    /// A builder was closed while some of its children were still open
    UnclosedChildResource {
        resource: String,
        open_children: Vec<String>,
    },

    /// A builder was used after it was closed
    UseAfterClose { resource: String },

    /// `begin_code` on a method which can't (or can't again) have a body
    InvalidMethodBody { method: String, reason: String },

    /// A method that needs a body never got one
    MissingMethodBody { method: String },

    /// An instruction doesn't fit the current operand stack or locals
    StackTypeError {
        /// Number of instructions already in the method when this one was emitted
        position: usize,
        instruction: String,
        kind: VerifierErrorKind,
    },

    /// A return instruction doesn't match the method's return type or leaves extra values
    ReturnTypeMismatch {
        position: usize,
        expected: String,
        found: String,
    },

    /// A class name that is neither being built nor known to the class graph
    UnresolvedReference(String),

    /// Every problem found while verifying a module
    VerificationError(Vec<Error>),

    /// Modifier combination not allowed on the declaration
    IllegalModifiers { declaration: String, reason: String },

    /// Malformed name or descriptor
    InvalidName(String),

    /// Type arguments don't match the type parameters
    TypeArgumentArity {
        class: String,
        expected: usize,
        found: usize,
    },

    /// The class file loader rejected the class or failed to run it
    LoaderError(String),

    ConstantPoolOverflow { constant: Constant, offset: u16 },
    IoError(std::io::Error),
    MethodCodeMaxStackOverflow(Offset),
    MethodCodeMaxLocalsOverflow(Offset),
    MethodCodeOverflow(Offset),

    /// Code doesn't end with a return, jump, or throw, or has labels that were never placed
    MethodCodeNotFinished {
        pending_block: Option<SynLabel>,
        unplaced_labels: Vec<SynLabel>,
    },

    /// A label is placed before it was ever jumped to and without falling through to it
    PlacingLabelBeforeReference(SynLabel),

    /// A label was placed twice
    DuplicateLabel(SynLabel),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeclarationKind {
    Class,
    Method,
    Field,
    LocalVariable,
}

/// Why an instruction was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifierErrorKind {
    /// Popped from an empty stack
    EmptyStack,

    /// Expected a value of a different width (one or two slots)
    InvalidWidth(usize),

    /// Expected an array on the stack
    NotArrayType,

    /// Local variable slot is out of range or unset
    InvalidIndex,

    /// Wrong kind of value (eg. an `int` where a reference is expected)
    InvalidType,

    /// Value isn't assignable to the type expected
    IncompatibleTypes { expected: String, found: String },

    /// Jumping to a label whose frame differs from the current one
    IncompatibleFrames {
        label: SynLabel,
        expected: String,
        found: String,
    },

    /// No instruction can reach this point
    UnreachableCode,

    /// The class isn't known to the class graph
    Unresolved(String),

    /// A return instruction which doesn't fit the method
    BadReturn { expected: String, found: String },
}

impl Error {
    /// Flatten nested verification errors
    pub fn into_errors(self) -> Vec<Error> {
        match self {
            Error::VerificationError(errors) => {
                errors.into_iter().flat_map(Error::into_errors).collect()
            }
            other => vec![other],
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::IoError(err)
    }
}

impl From<ConstantPoolOverflow> for Error {
    fn from(overflow: ConstantPoolOverflow) -> Error {
        Error::ConstantPoolOverflow {
            constant: overflow.constant,
            offset: overflow.offset,
        }
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeclarationKind::Class => "class",
            DeclarationKind::Method => "method",
            DeclarationKind::Field => "field",
            DeclarationKind::LocalVariable => "local variable",
        })
    }
}

impl fmt::Display for VerifierErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifierErrorKind::EmptyStack => f.write_str("operand stack is empty"),
            VerifierErrorKind::InvalidWidth(w) => write!(f, "expected a value of width {}", w),
            VerifierErrorKind::NotArrayType => f.write_str("expected an array"),
            VerifierErrorKind::InvalidIndex => f.write_str("invalid local variable"),
            VerifierErrorKind::InvalidType => f.write_str("wrong kind of value"),
            VerifierErrorKind::IncompatibleTypes { expected, found } => {
                write!(f, "expected {} but found {}", expected, found)
            }
            VerifierErrorKind::IncompatibleFrames {
                label,
                expected,
                found,
            } => write!(
                f,
                "frame at {:?} is {} but jumping with {}",
                label, expected, found
            ),
            VerifierErrorKind::UnreachableCode => f.write_str("code is unreachable"),
            VerifierErrorKind::Unresolved(name) => write!(f, "unknown class {}", name),
            VerifierErrorKind::BadReturn { expected, found } => {
                write!(f, "returning {} from a method returning {}", found, expected)
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::DuplicateDeclaration { kind, name } => {
                write!(f, "duplicate {} declaration {}", kind, name)
            }
            Error::UnclosedChildResource {
                resource,
                open_children,
            } => write!(
                f,
                "cannot close {} while {} still open",
                resource,
                open_children.join(", ")
            ),
            Error::UseAfterClose { resource } => write!(f, "{} is already closed", resource),
            Error::InvalidMethodBody { method, reason } => {
                write!(f, "method {} cannot have a body: {}", method, reason)
            }
            Error::MissingMethodBody { method } => write!(f, "method {} has no body", method),
            Error::StackTypeError {
                position,
                instruction,
                kind,
            } => write!(
                f,
                "instruction #{} ({}) rejected: {}",
                position, instruction, kind
            ),
            Error::ReturnTypeMismatch {
                position,
                expected,
                found,
            } => write!(
                f,
                "instruction #{} returns {} but the method returns {}",
                position, found, expected
            ),
            Error::UnresolvedReference(name) => write!(f, "unresolved reference to {}", name),
            Error::VerificationError(errors) => {
                write!(f, "verification failed with {} error(s)", errors.len())?;
                for error in errors {
                    write!(f, "\n  {}", error)?;
                }
                Ok(())
            }
            Error::IllegalModifiers {
                declaration,
                reason,
            } => write!(f, "illegal modifiers on {}: {}", declaration, reason),
            Error::InvalidName(msg) => f.write_str(msg),
            Error::TypeArgumentArity {
                class,
                expected,
                found,
            } => write!(
                f,
                "{} takes {} type argument(s) but got {}",
                class, expected, found
            ),
            Error::LoaderError(msg) => write!(f, "loader failed: {}", msg),
            Error::ConstantPoolOverflow { offset, .. } => {
                write!(f, "constant pool overflow at {}", offset)
            }
            Error::IoError(err) => err.fmt(f),
            Error::MethodCodeMaxStackOverflow(off) => {
                write!(f, "operand stack too deep ({})", off.0)
            }
            Error::MethodCodeMaxLocalsOverflow(off) => {
                write!(f, "too many local variables ({})", off.0)
            }
            Error::MethodCodeOverflow(off) => write!(f, "method code too long ({})", off.0),
            Error::MethodCodeNotFinished {
                pending_block,
                unplaced_labels,
            } => write!(
                f,
                "method code not finished (open block {:?}, unplaced labels {:?})",
                pending_block, unplaced_labels
            ),
            Error::PlacingLabelBeforeReference(label) => {
                write!(f, "label {:?} placed before any jump to it", label)
            }
            Error::DuplicateLabel(label) => write!(f, "label {:?} placed twice", label),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}
