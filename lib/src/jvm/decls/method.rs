use crate::jvm::code::InvokeType;
use crate::jvm::decls::{ClassDecl, ClassRef};
use crate::jvm::types::{
    FieldType, JvmType, MethodDescriptor, RenderDescriptor, RenderSignature, TypeEnv, TypeParam,
};
use crate::jvm::{BinaryName, Error, MethodKind, MethodModifiers, Name, UnqualifiedName};
use std::fmt;

/// Named method parameter
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Param {
    pub name: String,
    pub ty: JvmType,
}

impl Param {
    pub fn new(name: &str, ty: impl Into<JvmType>) -> Param {
        Param {
            name: name.to_owned(),
            ty: ty.into(),
        }
    }
}

/// Generic signature of a method
///
/// The method's own type parameters are distinct from its class's: they are referenced with
/// [`crate::jvm::types::TypeVar::method`] and are only in scope in this signature and the
/// method body.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct MethodSignature {
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Param>,

    /// Return type (`None` for `void`)
    pub return_type: Option<JvmType>,

    /// Declared checked exceptions
    pub throws: Vec<JvmType>,
}

impl MethodSignature {
    /// Signature of a `void` method with no parameters
    pub fn new() -> MethodSignature {
        MethodSignature::default()
    }

    pub fn with_type_param(mut self, param: TypeParam) -> MethodSignature {
        self.type_params.push(param);
        self
    }

    pub fn param(mut self, name: &str, ty: impl Into<JvmType>) -> MethodSignature {
        self.params.push(Param::new(name, ty));
        self
    }

    pub fn returns(mut self, ty: impl Into<JvmType>) -> MethodSignature {
        self.return_type = Some(ty.into());
        self
    }

    pub fn throws(mut self, ty: impl Into<JvmType>) -> MethodSignature {
        self.throws.push(ty.into());
        self
    }

    /// Does the method need a `Signature` attribute?
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
            || self.params.iter().any(|param| param.ty.is_generic())
            || self.return_type.as_ref().map_or(false, JvmType::is_generic)
            || self.throws.iter().any(JvmType::is_generic)
    }

    /// Erased descriptor, resolving type variables in the environment
    pub fn erase(&self, env: &TypeEnv) -> Result<MethodDescriptor<BinaryName>, Error> {
        let parameters = self
            .params
            .iter()
            .map(|param| env.erase(&param.ty))
            .collect::<Result<Vec<_>, Error>>()?;
        let return_type = self
            .return_type
            .as_ref()
            .map(|ty| env.erase(ty))
            .transpose()?;
        Ok(MethodDescriptor {
            parameters,
            return_type,
        })
    }

    /// Check that every type variable in the signature is in scope
    pub fn check_in_scope(&self, env: &TypeEnv) -> Result<(), Error> {
        env.check_params_in_scope(&self.type_params)?;
        for param in &self.params {
            env.check_in_scope(&param.ty)?;
        }
        if let Some(ty) = &self.return_type {
            env.check_in_scope(ty)?;
        }
        for ty in &self.throws {
            env.check_in_scope(ty)?;
        }
        Ok(())
    }
}

impl RenderSignature for MethodSignature {
    fn render_signature_to(&self, write_to: &mut String) {
        self.type_params.render_signature_to(write_to);
        write_to.push('(');
        for param in &self.params {
            param.ty.render_signature_to(write_to);
        }
        write_to.push(')');
        match &self.return_type {
            None => write_to.push('V'),
            Some(ty) => ty.render_signature_to(write_to),
        }
        if self.throws.iter().any(JvmType::is_generic) {
            for ty in &self.throws {
                write_to.push('^');
                ty.render_signature_to(write_to);
            }
        }
    }
}

/// Method as declared on a class of the module
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodDecl {
    pub name: UnqualifiedName,
    pub owner: ClassDecl,
    pub modifiers: MethodModifiers,
    pub signature: MethodSignature,
    descriptor: MethodDescriptor<BinaryName>,
}

impl MethodDecl {
    /// Declare a regular method
    ///
    /// Fails if the name is invalid or if the signature mentions type variables which are not in
    /// scope (static methods don't see their class's type parameters).
    pub fn new(
        owner: &ClassDecl,
        name: &str,
        modifiers: MethodModifiers,
        signature: MethodSignature,
    ) -> Result<MethodDecl, Error> {
        let name = UnqualifiedName::from_str(name).map_err(Error::InvalidName)?;
        name.check_valid_method().map_err(Error::InvalidName)?;
        if name.is_special_method() {
            return Err(Error::InvalidName(format!(
                "{} is reserved for constructors and static initializers",
                name
            )));
        }
        MethodDecl::declare(owner, name, modifiers, signature)
    }

    /// Declare a constructor (`<init>`)
    pub fn constructor(
        owner: &ClassDecl,
        modifiers: MethodModifiers,
        params: Vec<Param>,
    ) -> Result<MethodDecl, Error> {
        let signature = MethodSignature {
            params,
            ..MethodSignature::default()
        };
        MethodDecl::declare(owner, UnqualifiedName::INIT, modifiers, signature)
    }

    /// Declare the static initializer (`<clinit>`)
    pub fn static_initializer(owner: &ClassDecl) -> Result<MethodDecl, Error> {
        MethodDecl::declare(
            owner,
            UnqualifiedName::CLINIT,
            MethodModifiers::STATIC,
            MethodSignature::new(),
        )
    }

    fn declare(
        owner: &ClassDecl,
        name: UnqualifiedName,
        modifiers: MethodModifiers,
        signature: MethodSignature,
    ) -> Result<MethodDecl, Error> {
        let mut decl = MethodDecl {
            name,
            owner: owner.clone(),
            modifiers,
            signature,
            descriptor: MethodDescriptor {
                parameters: vec![],
                return_type: None,
            },
        };
        let env = decl.type_env();
        decl.signature.check_in_scope(&env)?;
        let descriptor = decl.signature.erase(&env)?;
        decl.descriptor = descriptor;
        Ok(decl)
    }

    pub fn kind(&self) -> MethodKind {
        if self.name == UnqualifiedName::INIT {
            MethodKind::Constructor
        } else if self.name == UnqualifiedName::CLINIT {
            MethodKind::StaticInitializer
        } else {
            MethodKind::Regular
        }
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.contains(MethodModifiers::STATIC)
    }

    pub fn descriptor(&self) -> &MethodDescriptor<BinaryName> {
        &self.descriptor
    }

    /// Type parameters in scope in the signature and the body
    pub fn type_env(&self) -> TypeEnv<'_> {
        let env = if self.is_static() {
            TypeEnv::new()
        } else {
            self.owner.type_env()
        };
        env.with_method_params(&self.signature.type_params)
    }

    /// Name and erased parameters: what overloads are distinguished by
    pub fn overload_key(&self) -> (&UnqualifiedName, &[FieldType<BinaryName>]) {
        (&self.name, &self.descriptor.parameters)
    }

    /// Reference to the method through the class's own generic reference
    pub fn reference(&self) -> MethodRef {
        MethodRef {
            owner: self.owner.reference(),
            name: self.name.clone(),
            is_static: self.is_static(),
            signature: self.signature.clone(),
            descriptor: self.descriptor.clone(),
        }
    }

    /// Reference to the method through a specific instantiation of its class
    pub fn reference_via(&self, receiver: ClassRef) -> Result<MethodRef, Error> {
        if &receiver.name != self.owner.binary_name() {
            return Err(Error::UnresolvedReference(format!(
                "method {} is declared on {}, not {}",
                self.name,
                self.owner.binary_name(),
                receiver.name
            )));
        }
        Ok(MethodRef {
            owner: receiver,
            ..self.reference()
        })
    }
}

impl fmt::Display for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}{}",
            self.owner.binary_name(),
            self.name,
            self.descriptor.render()
        )
    }
}

/// Reference to a method, enough to emit an invocation
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct MethodRef {
    /// Class through which the method is accessed (possibly instantiated)
    pub owner: ClassRef,
    pub name: UnqualifiedName,
    pub is_static: bool,
    pub signature: MethodSignature,
    pub descriptor: MethodDescriptor<BinaryName>,
}

impl MethodRef {
    /// Reference to a method declared outside of the module
    pub fn new(
        owner: ClassRef,
        name: &str,
        is_static: bool,
        signature: MethodSignature,
    ) -> Result<MethodRef, Error> {
        let name = UnqualifiedName::from_str(name).map_err(Error::InvalidName)?;
        name.check_valid_method().map_err(Error::InvalidName)?;
        MethodRef::with_name(owner, name, is_static, signature)
    }

    /// Reference to a constructor declared outside of the module
    pub fn constructor(owner: ClassRef, params: Vec<JvmType>) -> Result<MethodRef, Error> {
        let signature = MethodSignature {
            params: params
                .into_iter()
                .enumerate()
                .map(|(idx, ty)| Param {
                    name: format!("arg{}", idx),
                    ty,
                })
                .collect(),
            ..MethodSignature::default()
        };
        MethodRef::with_name(owner, UnqualifiedName::INIT, false, signature)
    }

    fn with_name(
        owner: ClassRef,
        name: UnqualifiedName,
        is_static: bool,
        signature: MethodSignature,
    ) -> Result<MethodRef, Error> {
        let descriptor = {
            let class_env = if is_static {
                TypeEnv::new()
            } else {
                owner.type_env()
            };
            signature.erase(&class_env.with_method_params(&signature.type_params))?
        };
        Ok(MethodRef {
            owner,
            name,
            is_static,
            signature,
            descriptor,
        })
    }

    pub fn is_constructor(&self) -> bool {
        self.name == UnqualifiedName::INIT
    }

    /// Type parameters in scope for the method's signature
    pub fn member_env(&self) -> TypeEnv<'_> {
        let env = if self.is_static {
            TypeEnv::new()
        } else {
            self.owner.type_env()
        };
        env.with_method_params(&self.signature.type_params)
    }

    /// Which `invoke*` instruction calls this method
    pub fn invoke_type(&self) -> InvokeType {
        if self.is_constructor() {
            InvokeType::Special
        } else if self.is_static {
            InvokeType::Static
        } else if self.owner.is_interface {
            let count = self.descriptor.parameter_length(true) as u8;
            InvokeType::Interface(count)
        } else {
            InvokeType::Virtual
        }
    }
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}{}",
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
    use crate::jvm::types::{TypeArg, TypeVar};

    fn generic_class() -> ClassDecl {
        ClassDecl::new(&PackageRef::from_java_name("examples").unwrap(), "C")
            .unwrap()
            .with_type_param(TypeParam::new("R").unwrap())
    }

    #[test]
    fn generic_method_signature() {
        let class = generic_class();
        let signature = MethodSignature::new()
            .with_type_param(
                TypeParam::new("T")
                    .unwrap()
                    .extends(JvmType::object(BinaryName::NUMBER)),
            )
            .param("input", TypeVar::method("T").unwrap())
            .returns(class.type_var("R").unwrap());
        let method = MethodDecl::new(&class, "foo", MethodModifiers::PUBLIC, signature).unwrap();

        assert_eq!(
            method.descriptor().render(),
            "(Ljava/lang/Number;)Ljava/lang/Object;"
        );
        assert_eq!(
            method.signature.render_signature(),
            "<T:Ljava/lang/Number;>(TT;)TR;"
        );
        assert_eq!(method.to_string(), "examples/C.foo(Ljava/lang/Number;)Ljava/lang/Object;");
    }

    #[test]
    fn static_methods_do_not_see_class_variables() {
        let class = generic_class();
        let signature = MethodSignature::new().returns(class.type_var("R").unwrap());
        let modifiers = MethodModifiers::PUBLIC | MethodModifiers::STATIC;
        assert!(matches!(
            MethodDecl::new(&class, "bar", modifiers, signature),
            Err(Error::UnresolvedReference(_))
        ));
    }

    #[test]
    fn reserved_names() {
        let class = generic_class();
        assert!(MethodDecl::new(&class, "<init>", MethodModifiers::PUBLIC, MethodSignature::new()).is_err());
        assert!(MethodDecl::new(&class, "a.b", MethodModifiers::PUBLIC, MethodSignature::new()).is_err());

        let init = MethodDecl::constructor(&class, MethodModifiers::PUBLIC, vec![]).unwrap();
        assert_eq!(init.kind(), MethodKind::Constructor);
        assert_eq!(init.descriptor().render(), "()V");
        let clinit = MethodDecl::static_initializer(&class).unwrap();
        assert_eq!(clinit.kind(), MethodKind::StaticInitializer);
    }

    #[test]
    fn invoke_types() {
        let println = MethodRef::new(
            ClassRef::raw(BinaryName::PRINTSTREAM),
            "println",
            false,
            MethodSignature::new().param("x", JvmType::string()),
        )
        .unwrap();
        assert_eq!(println.invoke_type(), InvokeType::Virtual);
        assert_eq!(println.descriptor.render(), "(Ljava/lang/String;)V");

        let length = MethodRef::new(
            ClassRef::raw_interface(BinaryName::CHARSEQUENCE),
            "length",
            false,
            MethodSignature::new().returns(JvmType::INT),
        )
        .unwrap();
        assert_eq!(length.invoke_type(), InvokeType::Interface(1));

        let value_of = MethodRef::new(
            ClassRef::raw(BinaryName::INTEGER),
            "valueOf",
            true,
            MethodSignature::new()
                .param("i", JvmType::INT)
                .returns(JvmType::object(BinaryName::INTEGER)),
        )
        .unwrap();
        assert_eq!(value_of.invoke_type(), InvokeType::Static);

        let init = MethodRef::constructor(ClassRef::raw(BinaryName::OBJECT), vec![]).unwrap();
        assert_eq!(init.invoke_type(), InvokeType::Special);
    }

    #[test]
    fn references_through_instantiations() {
        let class = generic_class();
        let method = MethodDecl::new(
            &class,
            "get",
            MethodModifiers::PUBLIC,
            MethodSignature::new().returns(class.type_var("R").unwrap()),
        )
        .unwrap();

        let receiver = class
            .instantiate(vec![TypeArg::Super(JvmType::object(BinaryName::CHARSEQUENCE))])
            .unwrap();
        let method_ref = method.reference_via(receiver.clone()).unwrap();
        assert_eq!(method_ref.owner, receiver);
        assert_eq!(&method_ref.descriptor, method.descriptor());

        let other = ClassRef::raw(BinaryName::OBJECT);
        assert!(method.reference_via(other).is_err());
    }
}
