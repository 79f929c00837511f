use crate::jvm::decls::{ClassDecl, ClassRef};
use crate::jvm::types::{ConstantValue, FieldType, JvmType, RenderDescriptor, TypeEnv};
use crate::jvm::{BinaryName, Error, FieldModifiers, Name, UnqualifiedName};
use std::fmt;

/// Field as declared on a class of the module
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldDecl {
    pub name: UnqualifiedName,
    pub owner: ClassDecl,
    pub modifiers: FieldModifiers,
    pub ty: JvmType,

    /// Compile-time constant (`ConstantValue` attribute)
    pub constant: Option<ConstantValue>,
    descriptor: FieldType<BinaryName>,
}

impl FieldDecl {
    pub fn new(
        owner: &ClassDecl,
        name: &str,
        modifiers: FieldModifiers,
        ty: impl Into<JvmType>,
    ) -> Result<FieldDecl, Error> {
        let name = UnqualifiedName::from_str(name).map_err(Error::InvalidName)?;
        let ty = ty.into();
        let descriptor = {
            let env = FieldDecl::env_for(owner, modifiers);
            env.check_in_scope(&ty)?;
            env.erase(&ty)?
        };
        Ok(FieldDecl {
            name,
            owner: owner.clone(),
            modifiers,
            ty,
            constant: None,
            descriptor,
        })
    }

    fn env_for(owner: &ClassDecl, modifiers: FieldModifiers) -> TypeEnv<'_> {
        if modifiers.contains(FieldModifiers::STATIC) {
            TypeEnv::new()
        } else {
            owner.type_env()
        }
    }

    /// Attach a compile-time constant value
    ///
    /// Whether the value suits the field (static, final, matching type) is checked when the module
    /// is verified.
    pub fn with_constant(mut self, value: ConstantValue) -> FieldDecl {
        self.constant = Some(value);
        self
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.contains(FieldModifiers::STATIC)
    }

    pub fn descriptor(&self) -> &FieldType<BinaryName> {
        &self.descriptor
    }

    pub fn reference(&self) -> FieldRef {
        FieldRef {
            owner: self.owner.reference(),
            name: self.name.clone(),
            is_static: self.is_static(),
            ty: self.ty.clone(),
            descriptor: self.descriptor.clone(),
        }
    }

    /// Reference to the field through a specific instantiation of its class
    pub fn reference_via(&self, receiver: ClassRef) -> Result<FieldRef, Error> {
        if &receiver.name != self.owner.binary_name() {
            return Err(Error::UnresolvedReference(format!(
                "field {} is declared on {}, not {}",
                self.name,
                self.owner.binary_name(),
                receiver.name
            )));
        }
        Ok(FieldRef {
            owner: receiver,
            ..self.reference()
        })
    }
}

impl fmt::Display for FieldDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.owner.binary_name(), self.name)
    }
}

/// Reference to a field, enough to emit a field access
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct FieldRef {
    pub owner: ClassRef,
    pub name: UnqualifiedName,
    pub is_static: bool,
    pub ty: JvmType,
    pub descriptor: FieldType<BinaryName>,
}

impl FieldRef {
    /// Reference to a field declared outside of the module
    pub fn new(
        owner: ClassRef,
        name: &str,
        is_static: bool,
        ty: impl Into<JvmType>,
    ) -> Result<FieldRef, Error> {
        let name = UnqualifiedName::from_str(name).map_err(Error::InvalidName)?;
        let ty = ty.into();
        let descriptor = if is_static {
            TypeEnv::new().erase(&ty)?
        } else {
            owner.type_env().erase(&ty)?
        };
        Ok(FieldRef {
            owner,
            name,
            is_static,
            ty,
            descriptor,
        })
    }

    /// `System.out`
    pub fn system_out() -> FieldRef {
        FieldRef {
            owner: ClassRef::raw(BinaryName::SYSTEM),
            name: UnqualifiedName::OUT,
            is_static: true,
            ty: JvmType::object(BinaryName::PRINTSTREAM),
            descriptor: FieldType::object(BinaryName::PRINTSTREAM),
        }
    }

    pub fn member_env(&self) -> TypeEnv<'_> {
        if self.is_static {
            TypeEnv::new()
        } else {
            self.owner.type_env()
        }
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}:{}",
            self.owner.name,
            self.name,
            self.descriptor.render()
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::decls::PackageRef;
    use crate::jvm::types::TypeParam;

    #[test]
    fn field_descriptors() {
        let class = ClassDecl::new(&PackageRef::DEFAULT, "Holder")
            .unwrap()
            .with_type_param(
                TypeParam::new("T")
                    .unwrap()
                    .implements(JvmType::object(BinaryName::CHARSEQUENCE)),
            );
        let value_ty = class.type_var("T").unwrap();
        let field = FieldDecl::new(&class, "value", FieldModifiers::PRIVATE, value_ty.clone())
            .unwrap();
        assert_eq!(field.descriptor().render(), "Ljava/lang/CharSequence;");
        assert_eq!(field.to_string(), "Holder.value");

        let static_modifiers = FieldModifiers::PRIVATE | FieldModifiers::STATIC;
        assert!(FieldDecl::new(&class, "shared", static_modifiers, value_ty).is_err());
    }

    #[test]
    fn system_out() {
        let out = FieldRef::system_out();
        assert_eq!(
            out,
            FieldRef::new(
                ClassRef::raw(BinaryName::SYSTEM),
                "out",
                true,
                JvmType::object(BinaryName::PRINTSTREAM)
            )
            .unwrap()
        );
        assert_eq!(out.to_string(), "java/lang/System.out:Ljava/io/PrintStream;");
    }
}
