use crate::jvm::class_file::{
    ClassConstantIndex, ConstantPoolOverflow, ConstantsPool, ConstantsWriter, Serialize,
};
use crate::jvm::class_graph::ClassGraph;
use crate::jvm::types::{BaseType, FieldType, RefType, RenderDescriptor};
use crate::jvm::BinaryName;
use crate::util::{Offset, Width};
use byteorder::WriteBytesExt;
use std::fmt;

/// These types are from [this hierarchy][0]
///
/// [0]: https://docs.oracle.com/javase/specs/jvms/se7/html/jvms-4.html#jvms-4.10.1.2
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum VerificationType<Cls, U> {
    /// Local variable slot which holds nothing usable (declared but not yet assigned)
    Top,

    Integer,
    Float,
    Double,
    Long,
    Null,

    /// In the constructor, the `this` parameter starts with this type then turns into an object
    /// type after `<init>` is called
    UninitializedThis,

    /// Object type
    Object(Cls),

    /// State of an object after `new` has been called but `<init>` has not been called
    ///
    ///   - while building code, `U` is [`UninitializedRefType`], which also remembers the type
    ///     the object will have once initialized
    ///   - when serializing into a classfile, `U` is `u16`: the offset of the `new` instruction
    ///     from the start of the method body
    Uninitialized(U),
}

/// Verification type used while building code
pub type VType = VerificationType<RefType<BinaryName>, UninitializedRefType>;

/// Uninitialized object, as created by a `new` instruction
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct UninitializedRefType {
    /// Once the type is initialized, what will it be?
    pub verification_type: RefType<BinaryName>,

    /// Offset of the `new` instruction from the start of the method body
    pub new_offset: Offset,
}

impl<Cls, U> VerificationType<Cls, U> {
    /// Is this type is a reference type?
    pub fn is_reference(&self) -> bool {
        match self {
            VerificationType::Top
            | VerificationType::Integer
            | VerificationType::Float
            | VerificationType::Double
            | VerificationType::Long => false,

            VerificationType::Null
            | VerificationType::UninitializedThis
            | VerificationType::Object(_)
            | VerificationType::Uninitialized(_) => true,
        }
    }

    pub fn map<C2, U2>(
        &self,
        map_class: impl Fn(&Cls) -> C2,
        map_uninitialized: impl Fn(&U) -> U2,
    ) -> VerificationType<C2, U2> {
        match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(cls) => VerificationType::Object(map_class(cls)),
            VerificationType::Uninitialized(uninit) => {
                VerificationType::Uninitialized(map_uninitialized(uninit))
            }
        }
    }
}

impl<C, U> From<FieldType<C>> for VerificationType<RefType<C>, U> {
    fn from(field_type: FieldType<C>) -> Self {
        match field_type {
            FieldType::Base(BaseType::Int)
            | FieldType::Base(BaseType::Char)
            | FieldType::Base(BaseType::Short)
            | FieldType::Base(BaseType::Byte)
            | FieldType::Base(BaseType::Boolean) => VerificationType::Integer,
            FieldType::Base(BaseType::Float) => VerificationType::Float,
            FieldType::Base(BaseType::Long) => VerificationType::Long,
            FieldType::Base(BaseType::Double) => VerificationType::Double,
            FieldType::Ref(ref_type) => VerificationType::Object(ref_type),
        }
    }
}

impl Serialize for VerificationType<ClassConstantIndex, u16> {
    fn serialize<W: WriteBytesExt>(&self, writer: &mut W) -> std::io::Result<()> {
        match self {
            VerificationType::Top => 0u8.serialize(writer)?,
            VerificationType::Integer => 1u8.serialize(writer)?,
            VerificationType::Float => 2u8.serialize(writer)?,
            VerificationType::Double => 3u8.serialize(writer)?,
            VerificationType::Long => 4u8.serialize(writer)?,
            VerificationType::Null => 5u8.serialize(writer)?,
            VerificationType::UninitializedThis => 6u8.serialize(writer)?,
            VerificationType::Object(cls) => {
                7u8.serialize(writer)?;
                cls.serialize(writer)?;
            }
            VerificationType::Uninitialized(off) => {
                8u8.serialize(writer)?;
                off.serialize(writer)?;
            }
        };
        Ok(())
    }
}

impl<Cls, A> Width for VerificationType<Cls, A> {
    fn width(&self) -> usize {
        match self {
            VerificationType::Double | VerificationType::Long => 2,
            _ => 1,
        }
    }
}

impl VType {
    /// Check if one verification type is assignable to another
    ///
    /// Fails with the name of a class the answer depends on but which isn't in the class graph.
    pub fn is_assignable<'g>(
        &self,
        super_type: &VType,
        class_graph: &'g ClassGraph<'g>,
    ) -> Result<bool, BinaryName> {
        match (self, super_type) {
            (_, Self::Top) => Ok(true),
            (Self::Integer, Self::Integer) => Ok(true),
            (Self::Float, Self::Float) => Ok(true),
            (Self::Long, Self::Long) => Ok(true),
            (Self::Double, Self::Double) => Ok(true),
            (Self::Null, Self::Null) => Ok(true),
            (Self::Null, Self::Object(_)) => Ok(true),
            (Self::UninitializedThis, Self::UninitializedThis) => Ok(true),
            (Self::Uninitialized(u1), Self::Uninitialized(u2)) => Ok(u1 == u2),
            (Self::Object(t1), Self::Object(t2)) => class_graph.is_java_assignable(t1, t2),
            _ => Ok(false),
        }
    }

    /// Resolve the type into its serializable form
    pub fn into_serializable(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<VerificationType<ClassConstantIndex, u16>, ConstantPoolOverflow> {
        Ok(match self {
            VerificationType::Top => VerificationType::Top,
            VerificationType::Integer => VerificationType::Integer,
            VerificationType::Float => VerificationType::Float,
            VerificationType::Long => VerificationType::Long,
            VerificationType::Double => VerificationType::Double,
            VerificationType::Null => VerificationType::Null,
            VerificationType::UninitializedThis => VerificationType::UninitializedThis,
            VerificationType::Object(ref_type) => {
                VerificationType::Object(ref_type.constant_index(constants)?)
            }
            VerificationType::Uninitialized(uninitialized) => {
                VerificationType::Uninitialized(uninitialized.new_offset.0 as u16)
            }
        })
    }
}

impl fmt::Display for VType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationType::Top => f.write_str("top"),
            VerificationType::Integer => f.write_str("int"),
            VerificationType::Float => f.write_str("float"),
            VerificationType::Long => f.write_str("long"),
            VerificationType::Double => f.write_str("double"),
            VerificationType::Null => f.write_str("null"),
            VerificationType::UninitializedThis => f.write_str("uninitializedThis"),
            VerificationType::Object(RefType::Object(name)) => f.write_str(name.as_ref()),
            VerificationType::Object(ref_type) => f.write_str(&ref_type.render()),
            VerificationType::Uninitialized(uninitialized) => write!(
                f,
                "uninitialized({}@{})",
                uninitialized.verification_type.render(),
                uninitialized.new_offset.0
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassGraphArenas;

    #[test]
    fn assignability() {
        let arenas = ClassGraphArenas::new();
        let graph = ClassGraph::new(&arenas);
        graph.insert_java_library_types().unwrap();

        let string = VType::Object(RefType::Object(BinaryName::STRING));
        let char_sequence = VType::Object(RefType::Object(BinaryName::CHARSEQUENCE));

        assert_eq!(string.is_assignable(&char_sequence, &graph), Ok(true));
        assert_eq!(char_sequence.is_assignable(&string, &graph), Ok(false));
        assert_eq!(VType::Null.is_assignable(&string, &graph), Ok(true));
        assert_eq!(VType::Integer.is_assignable(&string, &graph), Ok(false));
        assert_eq!(VType::Long.is_assignable(&VType::Top, &graph), Ok(true));
        assert_eq!(VType::Top.is_assignable(&VType::Integer, &graph), Ok(false));
    }

    #[test]
    fn display() {
        let uninit = VType::Uninitialized(UninitializedRefType {
            verification_type: RefType::Object(BinaryName::OBJECT),
            new_offset: Offset(4),
        });
        assert_eq!(uninit.to_string(), "uninitialized(Ljava/lang/Object;@4)");
        assert_eq!(
            VType::Object(RefType::Object(BinaryName::STRING)).to_string(),
            "java/lang/String"
        );
        assert_eq!(
            VType::from(FieldType::array(FieldType::int())).to_string(),
            "[I"
        );
    }
}
