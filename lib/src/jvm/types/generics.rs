use crate::jvm::decls::ClassRef;
use crate::jvm::types::{BaseType, FieldType, RefType, RenderDescriptor};
use crate::jvm::{BinaryName, Error, Name, UnqualifiedName};
use crate::util::Width;

/// Type as it appears in a declaration: possibly generic, possibly a type variable
///
/// The class file stores two views of every such type: the erased [`FieldType`] in descriptors
/// and the full generic form in `Signature` attributes.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum JvmType {
    Primitive(BaseType),
    Class(ClassRef),
    Array(Box<JvmType>),
    TypeVar(TypeVar),
}

impl JvmType {
    pub const BOOLEAN: JvmType = JvmType::Primitive(BaseType::Boolean);
    pub const BYTE: JvmType = JvmType::Primitive(BaseType::Byte);
    pub const CHAR: JvmType = JvmType::Primitive(BaseType::Char);
    pub const SHORT: JvmType = JvmType::Primitive(BaseType::Short);
    pub const INT: JvmType = JvmType::Primitive(BaseType::Int);
    pub const LONG: JvmType = JvmType::Primitive(BaseType::Long);
    pub const FLOAT: JvmType = JvmType::Primitive(BaseType::Float);
    pub const DOUBLE: JvmType = JvmType::Primitive(BaseType::Double);

    /// Raw (non-generic) class type
    pub fn object(name: BinaryName) -> JvmType {
        JvmType::Class(ClassRef::raw(name))
    }

    pub fn string() -> JvmType {
        JvmType::object(BinaryName::STRING)
    }

    pub fn array(element: JvmType) -> JvmType {
        JvmType::Array(Box::new(element))
    }

    pub fn is_reference(&self) -> bool {
        !matches!(self, JvmType::Primitive(_))
    }

    /// Does this type mention any type variables or type arguments?
    pub fn is_generic(&self) -> bool {
        match self {
            JvmType::Primitive(_) => false,
            JvmType::Class(class) => class.is_generic(),
            JvmType::Array(elem) => elem.is_generic(),
            JvmType::TypeVar(_) => true,
        }
    }

    /// Build a type from an erased descriptor (eg. `[Ljava/lang/String;`)
    pub fn from_descriptor(descriptor: &str) -> Result<JvmType, Error> {
        use crate::jvm::types::ParseDescriptor;
        let field_type = FieldType::<BinaryName>::parse(descriptor)
            .map_err(|err| Error::InvalidName(err.to_string()))?;
        Ok(JvmType::from(field_type))
    }
}

impl Width for JvmType {
    fn width(&self) -> usize {
        match self {
            JvmType::Primitive(base) => base.width(),
            _ => 1,
        }
    }
}

impl From<BaseType> for JvmType {
    fn from(base: BaseType) -> JvmType {
        JvmType::Primitive(base)
    }
}

impl From<ClassRef> for JvmType {
    fn from(class: ClassRef) -> JvmType {
        JvmType::Class(class)
    }
}

impl From<TypeVar> for JvmType {
    fn from(var: TypeVar) -> JvmType {
        JvmType::TypeVar(var)
    }
}

impl From<FieldType<BinaryName>> for JvmType {
    fn from(field_type: FieldType<BinaryName>) -> JvmType {
        match field_type {
            FieldType::Base(base) => JvmType::Primitive(base),
            FieldType::Ref(RefType::Object(name)) => JvmType::object(name),
            FieldType::Ref(arr) => {
                let elem = arr.array_element().map(JvmType::from);
                JvmType::array(elem.unwrap_or_else(|| JvmType::object(BinaryName::OBJECT)))
            }
        }
    }
}

/// Which declaration introduces a type variable
///
/// Keeping the scope on the variable means that `T` declared on a method and `T` declared on its
/// class (or on an enclosing class) never get confused, even though they render identically.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeVarScope {
    /// Declared by the method whose signature mentions it
    Method,

    /// Declared by the class with this binary name
    Class(BinaryName),
}

/// Use of a type variable
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeVar {
    pub name: UnqualifiedName,
    pub scope: TypeVarScope,
}

impl TypeVar {
    /// Variable declared by the enclosing method's signature
    pub fn method(name: &str) -> Result<TypeVar, Error> {
        Ok(TypeVar {
            name: UnqualifiedName::from_str(name).map_err(Error::InvalidName)?,
            scope: TypeVarScope::Method,
        })
    }

    /// Variable declared by the class with the given name
    pub fn class(class: &BinaryName, name: &str) -> Result<TypeVar, Error> {
        Ok(TypeVar {
            name: UnqualifiedName::from_str(name).map_err(Error::InvalidName)?,
            scope: TypeVarScope::Class(class.clone()),
        })
    }
}

/// Declaration of a type parameter, along with its bounds
///
/// With no bounds the implicit bound is `java.lang.Object`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct TypeParam {
    pub name: UnqualifiedName,

    /// Bound in the class position (a class type or another type variable)
    pub class_bound: Option<JvmType>,

    pub interface_bounds: Vec<JvmType>,
}

impl TypeParam {
    pub fn new(name: &str) -> Result<TypeParam, Error> {
        Ok(TypeParam {
            name: UnqualifiedName::from_str(name).map_err(Error::InvalidName)?,
            class_bound: None,
            interface_bounds: vec![],
        })
    }

    /// `T extends Bound`, where `Bound` is a class or type variable
    pub fn extends(mut self, bound: impl Into<JvmType>) -> TypeParam {
        self.class_bound = Some(bound.into());
        self
    }

    /// `T extends ... & Bound`, where `Bound` is an interface
    pub fn implements(mut self, bound: impl Into<JvmType>) -> TypeParam {
        self.interface_bounds.push(bound.into());
        self
    }

    /// All of the explicit bounds
    pub fn bounds(&self) -> impl Iterator<Item = &JvmType> {
        self.class_bound.iter().chain(self.interface_bounds.iter())
    }

    /// Bound used for erasure: the leftmost bound, or `Object`
    pub fn erasure_bound(&self) -> Option<&JvmType> {
        self.bounds().next()
    }
}

/// Argument given to a type parameter at a use site
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeArg {
    /// `C<X>`
    Invariant(JvmType),

    /// `C<? extends X>`: values read out are at least `X`, nothing but `null` goes in
    Extends(JvmType),

    /// `C<? super X>`: `X` (or subtypes) can go in, values read out are only known by the bound
    Super(JvmType),

    /// `C<?>`
    Wildcard,
}

impl TypeArg {
    /// Type carried by the argument, if any
    pub fn bound(&self) -> Option<&JvmType> {
        match self {
            TypeArg::Invariant(ty) | TypeArg::Extends(ty) | TypeArg::Super(ty) => Some(ty),
            TypeArg::Wildcard => None,
        }
    }
}

impl ClassRef {
    /// Does this reference carry type arguments (here or on an enclosing class)?
    pub fn is_generic(&self) -> bool {
        !self.type_args.is_empty()
            || self.enclosing.as_ref().map_or(false, |outer| outer.is_generic())
    }
}

/// Guard against cyclic bounds like `<A extends B, B extends A>`
const MAX_BOUND_DEPTH: usize = 32;

/// Type parameters visible at some point
///
/// Method parameters come first. Class parameters are listed innermost first: a class's own
/// parameters, then those of its enclosing instance classes (only inner classes see these).
#[derive(Clone, Debug, Default)]
pub struct TypeEnv<'a> {
    method_params: &'a [TypeParam],
    class_params: Vec<(&'a BinaryName, &'a [TypeParam])>,
}

impl<'a> TypeEnv<'a> {
    pub fn new() -> TypeEnv<'a> {
        TypeEnv::default()
    }

    pub fn with_method_params(mut self, params: &'a [TypeParam]) -> TypeEnv<'a> {
        self.method_params = params;
        self
    }

    pub fn with_class_params(mut self, class: &'a BinaryName, params: &'a [TypeParam]) -> Self {
        self.class_params.push((class, params));
        self
    }

    /// Find the declaration of a type variable
    pub fn resolve(&self, var: &TypeVar) -> Result<&'a TypeParam, Error> {
        let found = match &var.scope {
            TypeVarScope::Method => self.method_params.iter().find(|p| p.name == var.name),
            TypeVarScope::Class(class) => self
                .class_params
                .iter()
                .find(|(name, _)| *name == class)
                .and_then(|(_, params)| params.iter().find(|p| p.name == var.name)),
        };
        found.ok_or_else(|| {
            let owner = match &var.scope {
                TypeVarScope::Method => String::from("the method"),
                TypeVarScope::Class(class) => class.to_string(),
            };
            Error::UnresolvedReference(format!(
                "type variable {} of {} is not in scope",
                var.name, owner
            ))
        })
    }

    /// Erase a type into what goes in descriptors
    pub fn erase(&self, ty: &JvmType) -> Result<FieldType<BinaryName>, Error> {
        self.erase_bounded(ty, 0)
    }

    fn erase_bounded(&self, ty: &JvmType, depth: usize) -> Result<FieldType<BinaryName>, Error> {
        match ty {
            JvmType::Primitive(base) => Ok(FieldType::Base(*base)),
            JvmType::Class(class) => Ok(FieldType::object(class.name.clone())),
            JvmType::Array(elem) => Ok(FieldType::array(self.erase_bounded(elem, depth)?)),
            JvmType::TypeVar(var) => {
                if depth > MAX_BOUND_DEPTH {
                    return Err(Error::UnresolvedReference(format!(
                        "type variable {} has a cyclic bound",
                        var.name
                    )));
                }
                match self.resolve(var)?.erasure_bound() {
                    None => Ok(FieldType::object(BinaryName::OBJECT)),
                    Some(bound) => self.erase_bounded(bound, depth + 1),
                }
            }
        }
    }

    /// Erase every bound of a type parameter
    pub fn erase_bounds(&self, param: &TypeParam) -> Result<Vec<FieldType<BinaryName>>, Error> {
        param.bounds().map(|bound| self.erase(bound)).collect()
    }

    /// Check that every type variable mentioned in the type is in scope
    pub fn check_in_scope(&self, ty: &JvmType) -> Result<(), Error> {
        match ty {
            JvmType::Primitive(_) => Ok(()),
            JvmType::Array(elem) => self.check_in_scope(elem),
            JvmType::TypeVar(var) => self.resolve(var).map(|_| ()),
            JvmType::Class(class) => {
                for arg in &class.type_args {
                    if let Some(bound) = arg.bound() {
                        self.check_in_scope(bound)?;
                    }
                }
                match &class.enclosing {
                    Some(outer) => self.check_in_scope(&JvmType::Class((**outer).clone())),
                    None => Ok(()),
                }
            }
        }
    }

    /// Check the bounds of some type parameters only mention variables in scope
    pub fn check_params_in_scope(&self, params: &[TypeParam]) -> Result<(), Error> {
        params
            .iter()
            .flat_map(TypeParam::bounds)
            .try_for_each(|bound| self.check_in_scope(bound))
    }
}

/// Render generic types in the format of `Signature` attributes
///
/// See <https://docs.oracle.com/javase/specs/jvms/se17/html/jvms-4.html#jvms-4.7.9.1>
pub trait RenderSignature {
    fn render_signature(&self) -> String {
        let mut string = String::new();
        self.render_signature_to(&mut string);
        string
    }

    fn render_signature_to(&self, write_to: &mut String);
}

impl RenderSignature for JvmType {
    fn render_signature_to(&self, write_to: &mut String) {
        match self {
            JvmType::Primitive(base) => base.render_to(write_to),
            JvmType::Class(class) => class.render_signature_to(write_to),
            JvmType::Array(elem) => {
                write_to.push('[');
                elem.render_signature_to(write_to);
            }
            JvmType::TypeVar(var) => {
                write_to.push('T');
                write_to.push_str(var.name.as_str());
                write_to.push(';');
            }
        }
    }
}

impl RenderSignature for TypeArg {
    fn render_signature_to(&self, write_to: &mut String) {
        match self {
            TypeArg::Invariant(ty) => ty.render_signature_to(write_to),
            TypeArg::Extends(ty) => {
                write_to.push('+');
                ty.render_signature_to(write_to);
            }
            TypeArg::Super(ty) => {
                write_to.push('-');
                ty.render_signature_to(write_to);
            }
            TypeArg::Wildcard => write_to.push('*'),
        }
    }
}

impl RenderSignature for TypeParam {
    fn render_signature_to(&self, write_to: &mut String) {
        write_to.push_str(self.name.as_str());
        write_to.push(':');
        match (&self.class_bound, self.interface_bounds.is_empty()) {
            (Some(bound), _) => bound.render_signature_to(write_to),
            (None, true) => BinaryName::OBJECT.render_to(write_to),
            (None, false) => (),
        }
        for bound in &self.interface_bounds {
            write_to.push(':');
            bound.render_signature_to(write_to);
        }
    }
}

impl RenderSignature for [TypeParam] {
    fn render_signature_to(&self, write_to: &mut String) {
        if !self.is_empty() {
            write_to.push('<');
            for param in self {
                param.render_signature_to(write_to);
            }
            write_to.push('>');
        }
    }
}

impl RenderSignature for ClassRef {
    fn render_signature_to(&self, write_to: &mut String) {
        match &self.enclosing {
            Some(outer) => {
                let mut outer_sig = outer.render_signature();
                outer_sig.pop();
                write_to.push_str(&outer_sig);
                write_to.push('.');
                write_to.push_str(self.simple_name());
            }
            None => {
                write_to.push('L');
                write_to.push_str(self.name.as_str());
            }
        }
        if !self.type_args.is_empty() {
            write_to.push('<');
            for arg in &self.type_args {
                arg.render_signature_to(write_to);
            }
            write_to.push('>');
        }
        write_to.push(';');
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn name(s: &'static str) -> BinaryName {
        BinaryName::from_str(s).unwrap()
    }

    #[test]
    fn erase_bounded_type_variables() {
        let number = TypeParam::new("T")
            .unwrap()
            .extends(JvmType::object(BinaryName::NUMBER));
        let comparable = TypeParam::new("U")
            .unwrap()
            .implements(JvmType::object(BinaryName::COMPARABLE));
        let unbounded = TypeParam::new("V").unwrap();
        let params = vec![number, comparable, unbounded];
        let env = TypeEnv::new().with_method_params(&params);

        let erase = |var: &str| env.erase(&TypeVar::method(var).unwrap().into()).unwrap();
        assert_eq!(erase("T"), FieldType::object(BinaryName::NUMBER));
        assert_eq!(erase("U"), FieldType::object(BinaryName::COMPARABLE));
        assert_eq!(erase("V"), FieldType::object(BinaryName::OBJECT));

        let array_of_t = JvmType::array(TypeVar::method("T").unwrap().into());
        assert_eq!(
            env.erase(&array_of_t).unwrap(),
            FieldType::array(FieldType::object(BinaryName::NUMBER))
        );
    }

    #[test]
    fn method_and_class_variables_are_distinct() {
        let class = name("examples/C");
        let class_params = vec![TypeParam::new("T").unwrap()];
        let method_params = vec![TypeParam::new("T")
            .unwrap()
            .extends(JvmType::object(BinaryName::NUMBER))];
        let env = TypeEnv::new()
            .with_method_params(&method_params)
            .with_class_params(&class, &class_params);

        let method_t: JvmType = TypeVar::method("T").unwrap().into();
        let class_t: JvmType = TypeVar::class(&class, "T").unwrap().into();
        assert_ne!(method_t, class_t);
        assert_eq!(
            env.erase(&method_t).unwrap(),
            FieldType::object(BinaryName::NUMBER)
        );
        assert_eq!(
            env.erase(&class_t).unwrap(),
            FieldType::object(BinaryName::OBJECT)
        );
        assert_eq!(method_t.render_signature(), class_t.render_signature());
    }

    #[test]
    fn out_of_scope_variables() {
        let env = TypeEnv::new();
        let var: JvmType = TypeVar::method("T").unwrap().into();
        assert!(matches!(
            env.erase(&var),
            Err(Error::UnresolvedReference(_))
        ));
        assert!(env.check_in_scope(&var).is_err());
    }

    #[test]
    fn cyclic_bounds() {
        let params = vec![
            TypeParam::new("A").unwrap().extends(TypeVar::method("B").unwrap()),
            TypeParam::new("B").unwrap().extends(TypeVar::method("A").unwrap()),
        ];
        let env = TypeEnv::new().with_method_params(&params);
        assert!(env.erase(&TypeVar::method("A").unwrap().into()).is_err());
    }

    #[test]
    fn render_type_params() {
        let params = vec![
            TypeParam::new("T")
                .unwrap()
                .extends(JvmType::object(BinaryName::NUMBER)),
            TypeParam::new("U")
                .unwrap()
                .implements(JvmType::object(BinaryName::CHARSEQUENCE)),
            TypeParam::new("V").unwrap(),
        ];
        assert_eq!(
            params[..].render_signature(),
            "<T:Ljava/lang/Number;U::Ljava/lang/CharSequence;V:Ljava/lang/Object;>"
        );
    }

    #[test]
    fn render_wildcards() {
        let list = name("java/util/List");
        let with = |arg: TypeArg| ClassRef::raw(list.clone()).with_type_args(vec![arg]);
        let string = JvmType::string();

        assert_eq!(
            with(TypeArg::Invariant(string.clone())).render_signature(),
            "Ljava/util/List<Ljava/lang/String;>;"
        );
        assert_eq!(
            with(TypeArg::Extends(string.clone())).render_signature(),
            "Ljava/util/List<+Ljava/lang/String;>;"
        );
        assert_eq!(
            with(TypeArg::Super(string)).render_signature(),
            "Ljava/util/List<-Ljava/lang/String;>;"
        );
        assert_eq!(
            with(TypeArg::Wildcard).render_signature(),
            "Ljava/util/List<*>;"
        );
    }
}
