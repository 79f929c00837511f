//! Modifier sets for classes, methods, and fields
//!
//! Modifiers are accumulated freely while building. Whether a combination makes sense for the
//! declaration it is attached to is only decided during module verification, using the
//! `check_*` functions below.

use crate::jvm::class_file::Serialize;
use bitflags::bitflags;
use byteorder::WriteBytesExt;
use std::fmt;

bitflags! {
    /// Modifiers on classes and interfaces
    ///
    /// `PRIVATE`, `PROTECTED`, and `STATIC` only make sense on nested classes: they end up in the
    /// `InnerClasses` attribute rather than in the class access flags.
    pub struct ClassModifiers: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Modifiers on methods
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.6-200-A.1
    pub struct MethodModifiers: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
    }
}

bitflags! {
    /// Modifiers on fields
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.5-200-A.1
    pub struct FieldModifiers: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Access flags written in the class file header
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.1-200-E.1
    pub struct ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const FINAL = 0x0010;
        const SUPER = 0x0020;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Access flags written in an `InnerClasses` entry
    ///
    /// [0]: https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.6-300-D.1-D.1
    pub struct InnerClassAccessFlags: u16 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

/// Which sort of method a modifier set is attached to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MethodKind {
    /// `<init>`
    Constructor,

    /// `<clinit>`
    StaticInitializer,

    /// Everything else
    Regular,
}

/// Where the class being checked sits
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassNesting {
    TopLevel,
    Nested,
    Inner,
}

fn at_most_one_visibility(bits: u16) -> Result<(), String> {
    if (bits & 0x0007).count_ones() > 1 {
        Err(String::from("more than one of public, private, protected"))
    } else {
        Ok(())
    }
}

impl ClassModifiers {
    /// Check the modifiers are legal for a class or interface in the given position
    pub fn check_legal(&self, is_interface: bool, nesting: ClassNesting) -> Result<(), String> {
        at_most_one_visibility(self.bits())?;
        let nested_only = ClassModifiers::PRIVATE | ClassModifiers::PROTECTED | ClassModifiers::STATIC;
        match nesting {
            ClassNesting::TopLevel if self.intersects(nested_only) => {
                return Err(String::from(
                    "private, protected, and static are only allowed on nested classes",
                ));
            }
            ClassNesting::Inner if self.contains(ClassModifiers::STATIC) => {
                return Err(String::from("inner classes cannot be static"));
            }
            _ => (),
        }
        if is_interface {
            if self.intersects(ClassModifiers::FINAL | ClassModifiers::ENUM) {
                return Err(String::from("interfaces cannot be final or enums"));
            }
            if nesting == ClassNesting::Inner {
                return Err(String::from("interfaces cannot be inner classes"));
            }
        } else {
            if self.contains(ClassModifiers::ANNOTATION) {
                return Err(String::from("only interfaces can be annotations"));
            }
            if self.contains(ClassModifiers::FINAL | ClassModifiers::ABSTRACT) {
                return Err(String::from("classes cannot be both final and abstract"));
            }
        }
        Ok(())
    }

    /// Can this class declare abstract methods?
    pub fn allows_abstract_methods(&self, is_interface: bool) -> bool {
        is_interface || self.contains(ClassModifiers::ABSTRACT)
    }

    /// Flags for the class file header
    ///
    /// Protected nested classes are public at the class file level and private nested classes
    /// are package-private (the source visibility goes in `InnerClasses`).
    pub fn class_access_flags(&self, is_interface: bool) -> ClassAccessFlags {
        let mut flags = ClassAccessFlags::from_bits_truncate(
            self.bits()
                & (ClassModifiers::PUBLIC
                    | ClassModifiers::FINAL
                    | ClassModifiers::ABSTRACT
                    | ClassModifiers::SYNTHETIC
                    | ClassModifiers::ANNOTATION
                    | ClassModifiers::ENUM)
                    .bits(),
        );
        if self.contains(ClassModifiers::PROTECTED) {
            flags |= ClassAccessFlags::PUBLIC;
        }
        if is_interface {
            flags |= ClassAccessFlags::INTERFACE | ClassAccessFlags::ABSTRACT;
        } else {
            flags |= ClassAccessFlags::SUPER;
        }
        flags
    }

    /// Flags for an `InnerClasses` entry
    pub fn inner_class_access_flags(
        &self,
        is_interface: bool,
        nesting: ClassNesting,
    ) -> InnerClassAccessFlags {
        let mut flags = InnerClassAccessFlags::from_bits_truncate(self.bits());
        if nesting == ClassNesting::Nested || is_interface {
            flags |= InnerClassAccessFlags::STATIC;
        }
        if is_interface {
            flags |= InnerClassAccessFlags::INTERFACE | InnerClassAccessFlags::ABSTRACT;
        }
        flags
    }
}

impl MethodModifiers {
    /// Check the modifiers are legal for a method of the given kind
    pub fn check_legal(&self, kind: MethodKind, in_interface: bool) -> Result<(), String> {
        at_most_one_visibility(self.bits())?;
        match kind {
            MethodKind::Constructor => {
                if in_interface {
                    return Err(String::from("interfaces cannot have constructors"));
                }
                let allowed = MethodModifiers::PUBLIC
                    | MethodModifiers::PRIVATE
                    | MethodModifiers::PROTECTED
                    | MethodModifiers::VARARGS
                    | MethodModifiers::STRICT
                    | MethodModifiers::SYNTHETIC;
                if !allowed.contains(*self) {
                    return Err(format!("constructors cannot be {}", *self - allowed));
                }
            }
            MethodKind::StaticInitializer => {
                let allowed =
                    MethodModifiers::STATIC | MethodModifiers::STRICT | MethodModifiers::SYNTHETIC;
                if !allowed.contains(*self) {
                    return Err(format!("static initializers cannot be {}", *self - allowed));
                }
            }
            MethodKind::Regular => {
                if in_interface {
                    let banned = MethodModifiers::PROTECTED
                        | MethodModifiers::FINAL
                        | MethodModifiers::SYNCHRONIZED
                        | MethodModifiers::NATIVE;
                    if self.intersects(banned) {
                        return Err(format!(
                            "interface methods cannot be {}",
                            *self & banned
                        ));
                    }
                    if !self.intersects(MethodModifiers::PUBLIC | MethodModifiers::PRIVATE) {
                        return Err(String::from(
                            "interface methods must be public or private",
                        ));
                    }
                }
                if self.contains(MethodModifiers::ABSTRACT) {
                    let banned = MethodModifiers::PRIVATE
                        | MethodModifiers::STATIC
                        | MethodModifiers::FINAL
                        | MethodModifiers::SYNCHRONIZED
                        | MethodModifiers::NATIVE
                        | MethodModifiers::STRICT;
                    if self.intersects(banned) {
                        return Err(format!("abstract methods cannot be {}", *self & banned));
                    }
                }
            }
        }
        Ok(())
    }

    /// Methods which are abstract or native have no code
    pub fn requires_body(&self) -> bool {
        !self.intersects(MethodModifiers::ABSTRACT | MethodModifiers::NATIVE)
    }
}

impl FieldModifiers {
    /// Check the modifiers are legal for a field
    pub fn check_legal(&self, in_interface: bool) -> Result<(), String> {
        at_most_one_visibility(self.bits())?;
        if self.contains(FieldModifiers::FINAL | FieldModifiers::VOLATILE) {
            return Err(String::from("fields cannot be both final and volatile"));
        }
        if in_interface {
            let required = FieldModifiers::PUBLIC | FieldModifiers::STATIC | FieldModifiers::FINAL;
            if !self.contains(required) {
                return Err(String::from(
                    "interface fields must be public, static, and final",
                ));
            }
            if !(required | FieldModifiers::SYNTHETIC).contains(*self) {
                return Err(String::from("interface fields have extra modifiers"));
            }
        }
        Ok(())
    }
}

macro_rules! display_modifiers {
    ($flags:ty, $($flag:ident => $name:literal),* $(,)?) => {
        impl fmt::Display for $flags {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let mut first = true;
                $(
                    if self.contains(<$flags>::$flag) {
                        if !first {
                            f.write_str(" ")?;
                        }
                        f.write_str($name)?;
                        first = false;
                    }
                )*
                if first {
                    f.write_str("(none)")?;
                }
                Ok(())
            }
        }
    };
}

display_modifiers!(ClassModifiers,
    PUBLIC => "public", PRIVATE => "private", PROTECTED => "protected", STATIC => "static",
    FINAL => "final", ABSTRACT => "abstract", SYNTHETIC => "synthetic",
    ANNOTATION => "annotation", ENUM => "enum",
);
display_modifiers!(MethodModifiers,
    PUBLIC => "public", PRIVATE => "private", PROTECTED => "protected", STATIC => "static",
    FINAL => "final", SYNCHRONIZED => "synchronized", BRIDGE => "bridge", VARARGS => "varargs",
    NATIVE => "native", ABSTRACT => "abstract", STRICT => "strictfp", SYNTHETIC => "synthetic",
);
display_modifiers!(FieldModifiers,
    PUBLIC => "public", PRIVATE => "private", PROTECTED => "protected", STATIC => "static",
    FINAL => "final", VOLATILE => "volatile", TRANSIENT => "transient",
    SYNTHETIC => "synthetic", ENUM => "enum",
);

impl Serialize for ClassAccessFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.bits().serialize(writer)
    }
}

impl Serialize for InnerClassAccessFlags {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.bits().serialize(writer)
    }
}

impl Serialize for MethodModifiers {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.bits().serialize(writer)
    }
}

impl Serialize for FieldModifiers {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        self.bits().serialize(writer)
    }
}
