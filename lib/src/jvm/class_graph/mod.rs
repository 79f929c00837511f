//! Graph of the classes known while building a module
//!
//! The graph holds every class declared in the module, plus the slice of the Java standard
//! library that generated code commonly touches. It only tracks the supertype edges: that is all
//! the verifier needs to answer assignability queries. Classes are allocated in an arena and
//! never removed, so handles to them can be shared freely.

use crate::jvm::decls::{ClassDecl, ClassRef};
use crate::jvm::types::{ArrayType, RefType};
use crate::jvm::{BinaryName, DeclarationKind, Error, Name};
use elsa::map::FrozenMap;
use elsa::FrozenVec;
use std::fmt;
use typed_arena::Arena;

mod assignable;
mod java_classes;

pub use assignable::*;
pub use java_classes::*;

pub struct ClassGraphArenas<'g> {
    class_arena: Arena<ClassData<'g>>,
}

impl<'g> ClassGraphArenas<'g> {
    pub fn new() -> Self {
        ClassGraphArenas {
            class_arena: Arena::new(),
        }
    }
}

impl<'g> Default for ClassGraphArenas<'g> {
    fn default() -> Self {
        ClassGraphArenas::new()
    }
}

/// Append-only graph of classes, keyed by binary name
pub struct ClassGraph<'g> {
    arenas: &'g ClassGraphArenas<'g>,
    classes: FrozenMap<&'g BinaryName, &'g ClassData<'g>>,
}

impl<'g> ClassGraph<'g> {
    /// New empty graph
    pub fn new(arenas: &'g ClassGraphArenas<'g>) -> Self {
        ClassGraph {
            arenas,
            classes: FrozenMap::new(),
        }
    }

    pub fn lookup_class(&'g self, name: &BinaryName) -> Option<&'g ClassData<'g>> {
        self.classes.get(name)
    }

    /// Look up a class, returning the name as the error if it isn't in the graph
    pub fn resolve(&'g self, name: &BinaryName) -> Result<&'g ClassData<'g>, BinaryName> {
        self.lookup_class(name).ok_or_else(|| name.clone())
    }

    /// Add a new class to the class graph
    pub fn add_class(&self, data: ClassData<'g>) -> Result<&'g ClassData<'g>, Error> {
        if self.classes.get(&data.name).is_some() {
            return Err(Error::DuplicateDeclaration {
                kind: DeclarationKind::Class,
                name: data.name.to_string(),
            });
        }
        let data = &*self.arenas.class_arena.alloc(data);
        self.classes.insert(&data.name, data);
        Ok(data)
    }

    /// Add a class from its declaration
    ///
    /// The superclass and interfaces must already be in the graph.
    pub fn declare_class(&'g self, decl: &ClassDecl) -> Result<&'g ClassData<'g>, Error> {
        let superclass = self.resolve_supertype(&decl.superclass)?;
        let data = ClassData::new(decl.binary_name().clone(), superclass, decl.is_interface);
        for interface in &decl.interfaces {
            data.interfaces.push(self.resolve_supertype(interface)?);
        }
        self.add_class(data)
    }

    /// Is the class already in the graph with the same supertypes and kind as the declaration?
    pub fn matches_declaration(&'g self, decl: &ClassDecl) -> bool {
        let class = match self.lookup_class(decl.binary_name()) {
            Some(class) => class,
            None => return false,
        };
        let interfaces: Vec<&BinaryName> = (&class.interfaces)
            .into_iter()
            .map(|interface| &interface.name)
            .collect();
        class.is_interface == decl.is_interface
            && class.superclass.map(|superclass| &superclass.name) == Some(&decl.superclass.name)
            && interfaces
                .into_iter()
                .eq(decl.interfaces.iter().map(|interface| &interface.name))
    }

    fn resolve_supertype(&'g self, class: &ClassRef) -> Result<&'g ClassData<'g>, Error> {
        self.resolve(&class.name).map_err(|name| {
            Error::UnresolvedReference(format!("supertype {} is not a known class", name))
        })
    }

    /// Resolve every class in a reference type
    pub fn resolve_ref_type(
        &'g self,
        ref_type: &RefType<BinaryName>,
    ) -> Result<RefType<&'g ClassData<'g>>, BinaryName> {
        Ok(match ref_type {
            RefType::Object(name) => RefType::Object(self.resolve(name)?),
            RefType::ObjectArray(arr) => RefType::ObjectArray(ArrayType {
                additional_dimensions: arr.additional_dimensions,
                element_type: self.resolve(&arr.element_type)?,
            }),
            RefType::PrimitiveArray(arr) => RefType::PrimitiveArray(*arr),
        })
    }

    /// Query if one type is assignable to another
    ///
    /// This matches the semantics of the prolog predicate `isJavaAssignable(sub_type, super_type)`
    /// in the JVM verifier specification. Fails with the name of the first class that isn't in the
    /// graph, unless the answer doesn't depend on it.
    pub fn is_java_assignable(
        &'g self,
        sub_type: &RefType<BinaryName>,
        super_type: &RefType<BinaryName>,
    ) -> Result<bool, BinaryName> {
        if sub_type == super_type || super_type == &RefType::Object(BinaryName::OBJECT) {
            return Ok(true);
        }
        let sub_type = self.resolve_ref_type(sub_type)?;
        let super_type = self.resolve_ref_type(super_type)?;
        Ok(sub_type.is_assignable(&super_type))
    }

    /// Is this class known to be an interface?
    pub fn is_interface(&'g self, name: &BinaryName) -> Option<bool> {
        self.lookup_class(name).map(|class| class.is_interface)
    }

    /// Add standard types to the class graph
    pub fn insert_java_library_types(&'g self) -> Result<JavaClasses<'g>, Error> {
        JavaClasses::add_to_graph(self)
    }
}

pub struct ClassData<'g> {
    /// Name of the class
    pub name: BinaryName,

    /// Superclass is only ever missing for `java/lang/Object` itself
    pub superclass: Option<&'g ClassData<'g>>,

    /// Interfaces implemented (or super-interfaces)
    pub interfaces: FrozenVec<&'g ClassData<'g>>,

    /// Is this an interface?
    pub is_interface: bool,
}

impl<'g> ClassData<'g> {
    pub fn new(name: BinaryName, superclass: &'g ClassData<'g>, is_interface: bool) -> Self {
        ClassData {
            name,
            superclass: Some(superclass),
            interfaces: FrozenVec::new(),
            is_interface,
        }
    }

    /// Is this object type throwable?
    pub fn is_throwable(&self) -> bool {
        let mut next_class = Some(self);
        while let Some(class) = next_class {
            if class.name == BinaryName::THROWABLE {
                return true;
            }
            next_class = class.superclass;
        }
        false
    }
}

impl<'g> PartialEq for ClassData<'g> {
    fn eq(&self, other: &ClassData<'g>) -> bool {
        self.name == other.name
    }
}

impl<'g> Eq for ClassData<'g> {}

impl<'g> fmt::Debug for ClassData<'g> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::decls::PackageRef;

    #[test]
    fn declare_module_classes() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        class_graph.insert_java_library_types().unwrap();

        let package = PackageRef::from_java_name("examples").unwrap();
        let shape = ClassDecl::new(&package, "Shape").unwrap().interface();
        let square = ClassDecl::new(&package, "Square")
            .unwrap()
            .implements(shape.raw_reference());

        // Supertypes need to be declared first
        assert!(matches!(
            class_graph.declare_class(&square),
            Err(Error::UnresolvedReference(_))
        ));
        class_graph.declare_class(&shape).unwrap();
        class_graph.declare_class(&square).unwrap();
        assert!(matches!(
            class_graph.declare_class(&square),
            Err(Error::DuplicateDeclaration { .. })
        ));

        let square_ty = RefType::Object(square.binary_name().clone());
        let shape_ty = RefType::Object(shape.binary_name().clone());
        assert_eq!(class_graph.is_java_assignable(&square_ty, &shape_ty), Ok(true));
        assert_eq!(class_graph.is_java_assignable(&shape_ty, &square_ty), Ok(false));
        assert_eq!(class_graph.is_interface(shape.binary_name()), Some(true));

        assert!(class_graph.matches_declaration(&square));
        let other_square = ClassDecl::new(&package, "Square").unwrap();
        assert!(!class_graph.matches_declaration(&other_square));
        assert!(!class_graph.matches_declaration(&other_square.interface()));
        let circle = ClassDecl::new(&package, "Circle").unwrap();
        assert!(!class_graph.matches_declaration(&circle));
    }

    #[test]
    fn unknown_classes() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        class_graph.insert_java_library_types().unwrap();

        let unknown = BinaryName::from_str("com/example/Missing").unwrap();
        let unknown_ty = RefType::Object(unknown.clone());
        let string_ty = RefType::Object(BinaryName::STRING);
        let object_ty = RefType::Object(BinaryName::OBJECT);

        assert_eq!(class_graph.is_java_assignable(&unknown_ty, &object_ty), Ok(true));
        assert_eq!(class_graph.is_java_assignable(&unknown_ty, &unknown_ty), Ok(true));
        assert_eq!(
            class_graph.is_java_assignable(&unknown_ty, &string_ty),
            Err(unknown)
        );
    }

    #[test]
    fn throwables() {
        let arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&arenas);
        let java = class_graph.insert_java_library_types().unwrap();

        assert!(java.lang.illegal_argument_exception.is_throwable());
        assert!(java.lang.error.is_throwable());
        assert!(!java.lang.string.is_throwable());
    }
}
