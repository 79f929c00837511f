use crate::jvm::decls::PackageRef;
use crate::jvm::types::{RenderSignature, TypeArg, TypeEnv, TypeParam, TypeVar};
use crate::jvm::{BinaryName, ClassNesting, Error, Name, UnqualifiedName};

/// Class or interface as declared
///
/// Declarations are assembled with the builder-style methods and are then treated as immutable.
/// A nested or inner class keeps a copy of its enclosing declaration, so the enclosing class
/// should be fully declared (type parameters included) before nesting classes in it.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClassDecl {
    pub name: UnqualifiedName,
    pub container: ClassContainer,
    pub is_interface: bool,

    /// Type parameters, in declaration order
    pub type_params: Vec<TypeParam>,

    /// Superclass (`java/lang/Object` unless overridden)
    pub superclass: ClassRef,

    /// Direct super interfaces
    pub interfaces: Vec<ClassRef>,

    binary_name: BinaryName,
}

/// Where a class is declared
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ClassContainer {
    /// Top-level class in a package
    Package(PackageRef),

    /// Static nested class: has its own independent type parameter scope
    Nested(Box<ClassDecl>),

    /// Inner (non-static) class: also sees the type parameters of the enclosing instance
    Inner(Box<ClassDecl>),
}

impl ClassDecl {
    /// Top-level class
    pub fn new(package: &PackageRef, name: &str) -> Result<ClassDecl, Error> {
        let name = UnqualifiedName::from_str(name).map_err(Error::InvalidName)?;
        let binary_name = package.class_name(&name);
        Ok(ClassDecl::with_container(
            name,
            ClassContainer::Package(package.clone()),
            binary_name,
        ))
    }

    /// Static nested class
    pub fn nested_in(outer: &ClassDecl, name: &str) -> Result<ClassDecl, Error> {
        let name = UnqualifiedName::from_str(name).map_err(Error::InvalidName)?;
        let binary_name = outer.binary_name.nested(&name);
        Ok(ClassDecl::with_container(
            name,
            ClassContainer::Nested(Box::new(outer.clone())),
            binary_name,
        ))
    }

    /// Inner class
    pub fn inner_of(outer: &ClassDecl, name: &str) -> Result<ClassDecl, Error> {
        let name = UnqualifiedName::from_str(name).map_err(Error::InvalidName)?;
        let binary_name = outer.binary_name.nested(&name);
        Ok(ClassDecl::with_container(
            name,
            ClassContainer::Inner(Box::new(outer.clone())),
            binary_name,
        ))
    }

    fn with_container(
        name: UnqualifiedName,
        container: ClassContainer,
        binary_name: BinaryName,
    ) -> ClassDecl {
        ClassDecl {
            name,
            container,
            is_interface: false,
            type_params: vec![],
            superclass: ClassRef::raw(BinaryName::OBJECT),
            interfaces: vec![],
            binary_name,
        }
    }

    /// Make this an interface
    pub fn interface(mut self) -> ClassDecl {
        self.is_interface = true;
        self
    }

    pub fn with_type_param(mut self, param: TypeParam) -> ClassDecl {
        self.type_params.push(param);
        self
    }

    pub fn extends(mut self, superclass: ClassRef) -> ClassDecl {
        self.superclass = superclass;
        self
    }

    pub fn implements(mut self, interface: ClassRef) -> ClassDecl {
        self.interfaces.push(interface);
        self
    }

    pub fn binary_name(&self) -> &BinaryName {
        &self.binary_name
    }

    pub fn nesting(&self) -> ClassNesting {
        match &self.container {
            ClassContainer::Package(_) => ClassNesting::TopLevel,
            ClassContainer::Nested(_) => ClassNesting::Nested,
            ClassContainer::Inner(_) => ClassNesting::Inner,
        }
    }

    /// Enclosing class, for nested and inner classes
    pub fn outer(&self) -> Option<&ClassDecl> {
        match &self.container {
            ClassContainer::Package(_) => None,
            ClassContainer::Nested(outer) | ClassContainer::Inner(outer) => Some(outer),
        }
    }

    /// Outermost enclosing class (possibly this class)
    pub fn nest_host(&self) -> &ClassDecl {
        match self.outer() {
            None => self,
            Some(outer) => outer.nest_host(),
        }
    }

    pub fn package(&self) -> &PackageRef {
        match &self.container {
            ClassContainer::Package(package) => package,
            ClassContainer::Nested(outer) | ClassContainer::Inner(outer) => outer.package(),
        }
    }

    /// Variable for one of this class's type parameters
    pub fn type_var(&self, name: &str) -> Result<TypeVar, Error> {
        let var = TypeVar::class(&self.binary_name, name)?;
        if self.type_params.iter().any(|param| param.name == var.name) {
            Ok(var)
        } else {
            Err(Error::UnresolvedReference(format!(
                "{} has no type parameter {}",
                self.binary_name, name
            )))
        }
    }

    /// Type parameters visible inside the class body
    ///
    /// This is the class's own parameters, followed by those of the enclosing instances for as
    /// long as the chain of enclosing classes is made of inner classes.
    pub fn type_env(&self) -> TypeEnv<'_> {
        let mut env = TypeEnv::new().with_class_params(&self.binary_name, &self.type_params);
        let mut current = self;
        while let ClassContainer::Inner(outer) = &current.container {
            env = env.with_class_params(&outer.binary_name, &outer.type_params);
            current = outer;
        }
        env
    }

    /// Reference to this class as seen from inside its own body (`C<T>` inside `class C<T>`)
    pub fn reference(&self) -> ClassRef {
        let type_args = self
            .type_params
            .iter()
            .map(|param| {
                let var = TypeVar {
                    name: param.name.clone(),
                    scope: crate::jvm::types::TypeVarScope::Class(self.binary_name.clone()),
                };
                TypeArg::Invariant(var.into())
            })
            .collect();
        let enclosing = match &self.container {
            ClassContainer::Inner(outer) => Some(Box::new(outer.reference())),
            _ => None,
        };
        ClassRef {
            enclosing,
            type_args,
            ..self.raw_reference()
        }
    }

    /// Raw reference to this class
    pub fn raw_reference(&self) -> ClassRef {
        ClassRef {
            name: self.binary_name.clone(),
            is_interface: self.is_interface,
            type_params: self.type_params.clone(),
            type_args: vec![],
            enclosing: None,
        }
    }

    /// Reference to the class with its type parameters instantiated
    pub fn instantiate(&self, type_args: Vec<TypeArg>) -> Result<ClassRef, Error> {
        self.raw_reference().instantiate(type_args)
    }

    /// Reference to an inner class, through a reference to the enclosing class
    pub fn instantiate_inner(
        &self,
        enclosing: ClassRef,
        type_args: Vec<TypeArg>,
    ) -> Result<ClassRef, Error> {
        match self.outer() {
            Some(outer) if self.nesting() == ClassNesting::Inner => {
                if enclosing.name != outer.binary_name {
                    return Err(Error::UnresolvedReference(format!(
                        "{} is not enclosed by {}",
                        self.binary_name, enclosing.name
                    )));
                }
                let mut class_ref = self.instantiate(type_args)?;
                class_ref.enclosing = Some(Box::new(enclosing));
                Ok(class_ref)
            }
            _ => Err(Error::UnresolvedReference(format!(
                "{} is not an inner class",
                self.binary_name
            ))),
        }
    }

    /// Does the class need a `Signature` attribute?
    pub fn is_generic(&self) -> bool {
        !self.type_params.is_empty()
            || self.superclass.is_generic()
            || self.interfaces.iter().any(ClassRef::is_generic)
    }

    /// Class signature (type parameters, superclass, then super interfaces)
    pub fn signature(&self) -> String {
        let mut signature = self.type_params.render_signature();
        self.superclass.render_signature_to(&mut signature);
        for interface in &self.interfaces {
            interface.render_signature_to(&mut signature);
        }
        signature
    }
}

/// Reference to a class, possibly instantiated with type arguments
///
/// References to classes outside the module (the Java standard library, or other already
/// compiled code) are built directly with [`ClassRef::raw`] or [`ClassRef::external`].
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct ClassRef {
    pub name: BinaryName,
    pub is_interface: bool,

    /// Type parameters of the referenced class (empty if unknown or not generic)
    pub type_params: Vec<TypeParam>,

    /// Type arguments (empty for a raw reference)
    pub type_args: Vec<TypeArg>,

    /// Enclosing instance type, for references to inner classes of generic classes
    pub enclosing: Option<Box<ClassRef>>,
}

impl ClassRef {
    /// Raw reference to a class
    pub fn raw(name: BinaryName) -> ClassRef {
        ClassRef {
            name,
            is_interface: false,
            type_params: vec![],
            type_args: vec![],
            enclosing: None,
        }
    }

    /// Raw reference to an interface
    pub fn raw_interface(name: BinaryName) -> ClassRef {
        ClassRef {
            is_interface: true,
            ..ClassRef::raw(name)
        }
    }

    /// Reference to a generic class declared outside of the module
    pub fn external(name: BinaryName, is_interface: bool, type_params: Vec<TypeParam>) -> ClassRef {
        ClassRef {
            name,
            is_interface,
            type_params,
            type_args: vec![],
            enclosing: None,
        }
    }

    /// Replace the type arguments, without checking them against the parameters
    pub fn with_type_args(mut self, type_args: Vec<TypeArg>) -> ClassRef {
        self.type_args = type_args;
        self
    }

    /// Replace the type arguments, checking there is one for each type parameter
    pub fn instantiate(self, type_args: Vec<TypeArg>) -> Result<ClassRef, Error> {
        if !type_args.is_empty() && type_args.len() != self.type_params.len() {
            return Err(Error::TypeArgumentArity {
                class: self.name.to_string(),
                expected: self.type_params.len(),
                found: type_args.len(),
            });
        }
        Ok(self.with_type_args(type_args))
    }

    pub fn is_raw(&self) -> bool {
        self.type_args.is_empty()
    }

    /// Name of the class without package or enclosing classes
    pub fn simple_name(&self) -> &str {
        let last = self.name.last_segment();
        last.rsplit('$').next().unwrap_or(last)
    }

    /// Type parameters in scope for the members of the referenced class
    pub fn type_env(&self) -> TypeEnv<'_> {
        let mut env = TypeEnv::new();
        let mut current = Some(self);
        while let Some(class) = current {
            env = env.with_class_params(&class.name, &class.type_params);
            current = class.enclosing.as_deref();
        }
        env
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::types::JvmType;

    fn package() -> PackageRef {
        PackageRef::from_java_name("examples").unwrap()
    }

    #[test]
    fn nested_names() {
        let outer = ClassDecl::new(&package(), "Outer").unwrap();
        let nested = ClassDecl::nested_in(&outer, "Nested").unwrap();
        let inner = ClassDecl::inner_of(&nested, "Inner").unwrap();

        assert_eq!(outer.binary_name().as_str(), "examples/Outer");
        assert_eq!(nested.binary_name().as_str(), "examples/Outer$Nested");
        assert_eq!(inner.binary_name().as_str(), "examples/Outer$Nested$Inner");
        assert_eq!(inner.raw_reference().simple_name(), "Inner");
        assert_eq!(inner.nest_host().binary_name(), outer.binary_name());
        assert_eq!(inner.package(), &package());
    }

    #[test]
    fn inner_class_scopes() {
        let outer = ClassDecl::new(&package(), "Outer")
            .unwrap()
            .with_type_param(TypeParam::new("T").unwrap());
        let inner = ClassDecl::inner_of(&outer, "Inner")
            .unwrap()
            .with_type_param(TypeParam::new("T").unwrap());
        let nested = ClassDecl::nested_in(&outer, "Nested").unwrap();

        let outer_t: JvmType = outer.type_var("T").unwrap().into();
        let inner_t: JvmType = inner.type_var("T").unwrap().into();
        assert_ne!(outer_t, inner_t);

        // Inner classes see both variables, nested classes only their own
        assert!(inner.type_env().check_in_scope(&outer_t).is_ok());
        assert!(inner.type_env().check_in_scope(&inner_t).is_ok());
        assert!(nested.type_env().check_in_scope(&outer_t).is_err());
    }

    #[test]
    fn reference_signatures() {
        let outer = ClassDecl::new(&package(), "Outer")
            .unwrap()
            .with_type_param(TypeParam::new("T").unwrap());
        let inner = ClassDecl::inner_of(&outer, "Inner")
            .unwrap()
            .with_type_param(TypeParam::new("U").unwrap());

        assert_eq!(
            inner.reference().render_signature(),
            "Lexamples/Outer<TT;>.Inner<TU;>;"
        );
        let string = TypeArg::Invariant(JvmType::string());
        let outer_ref = outer.instantiate(vec![string.clone()]).unwrap();
        assert_eq!(
            inner
                .instantiate_inner(outer_ref, vec![TypeArg::Wildcard])
                .unwrap()
                .render_signature(),
            "Lexamples/Outer<Ljava/lang/String;>.Inner<*>;"
        );
    }

    #[test]
    fn type_argument_arity() {
        let class = ClassDecl::new(&package(), "C")
            .unwrap()
            .with_type_param(TypeParam::new("R").unwrap());
        assert!(class.instantiate(vec![]).unwrap().is_raw());
        assert!(class.instantiate(vec![TypeArg::Wildcard]).is_ok());
        assert!(matches!(
            class.instantiate(vec![TypeArg::Wildcard, TypeArg::Wildcard]),
            Err(Error::TypeArgumentArity {
                expected: 1,
                found: 2,
                ..
            })
        ));
        assert!(class.type_var("S").is_err());
    }

    #[test]
    fn class_signature() {
        let class = ClassDecl::new(&package(), "Box")
            .unwrap()
            .with_type_param(
                TypeParam::new("T")
                    .unwrap()
                    .extends(JvmType::object(BinaryName::NUMBER)),
            )
            .implements(
                ClassRef::raw_interface(BinaryName::COMPARABLE)
                    .with_type_args(vec![TypeArg::Wildcard]),
            );
        assert!(class.is_generic());
        assert_eq!(
            class.signature(),
            "<T:Ljava/lang/Number;>Ljava/lang/Object;Ljava/lang/Comparable<*>;"
        );
    }
}
