mod common;

use classforge::jvm::builder::{CompiledClass, ModuleBuilder};
use classforge::jvm::class_graph::{ClassGraph, ClassGraphArenas};
use classforge::jvm::decls::{ClassDecl, ClassRef, MethodDecl, MethodRef, MethodSignature};
use classforge::jvm::types::{JvmType, TypeArg, TypeParam, TypeVar};
use classforge::jvm::*;
use common::*;

fn integer_value_of() -> MethodRef {
    MethodRef::new(
        ClassRef::raw(BinaryName::INTEGER),
        "valueOf",
        true,
        MethodSignature::new()
            .param("i", JvmType::INT)
            .returns(JvmType::object(BinaryName::INTEGER)),
    )
    .unwrap()
}

fn char_sequence() -> JvmType {
    JvmType::object(BinaryName::CHARSEQUENCE)
}

/// Module with `class Box<R>`, which has a field `R value`, a getter `R get()` and
/// `<T extends Number> void foo(T t, R r)`. `callers` then adds code that uses it.
fn with_box_class(
    callers: impl FnOnce(&ModuleBuilder, &ClassDecl, &MethodDecl, &MethodDecl),
) -> Vec<CompiledClass> {
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let decl = ClassDecl::new(&package(), "Box")
        .unwrap()
        .with_type_param(TypeParam::new("R").unwrap());
    let r = decl.type_var("R").unwrap();
    let class = module
        .create_class(decl.clone(), ClassModifiers::PUBLIC)
        .unwrap();
    let value = class
        .create_field("value", FieldModifiers::PRIVATE, r.clone())
        .unwrap();

    let foo_signature = MethodSignature::new()
        .with_type_param(
            TypeParam::new("T")
                .unwrap()
                .extends(JvmType::object(BinaryName::NUMBER)),
        )
        .param("t", TypeVar::method("T").unwrap())
        .param("r", r.clone());
    let foo = class
        .create_method("foo", MethodModifiers::PUBLIC, foo_signature)
        .unwrap();
    let code = foo.begin_code().unwrap();
    code.ret().unwrap();
    code.close().unwrap();
    foo.close().unwrap();

    let get = class
        .create_method(
            "get",
            MethodModifiers::PUBLIC,
            MethodSignature::new().returns(r),
        )
        .unwrap();
    let code = get.begin_code().unwrap();
    code.load(&code.this_var().unwrap()).unwrap();
    code.get_field(&value).unwrap();
    code.ret().unwrap();
    code.close().unwrap();
    get.close().unwrap();
    class.close().unwrap();

    callers(&module, &decl, &foo.decl(), &get.decl());
    module.close().unwrap().check().unwrap()
}

#[test]
fn generic_declarations_get_signatures() {
    init_logging();
    let classes = with_box_class(|_, _, _, _| ());
    let utf8s = utf8_constants(classes[0].class_file());
    for expected in [
        "Signature",
        "<R:Ljava/lang/Object;>Ljava/lang/Object;",
        "TR;",
        "(Ljava/lang/Number;Ljava/lang/Object;)V",
        "<T:Ljava/lang/Number;>(TT;TR;)V",
        "()TR;",
    ] {
        assert!(utf8s.iter().any(|s| s == expected), "missing {}", expected);
    }
}

#[test]
fn arguments_through_super_wildcard() {
    init_logging();
    with_box_class(|module, box_decl, foo, _| {
        let receiver = box_decl
            .instantiate(vec![TypeArg::Super(char_sequence())])
            .unwrap();
        let foo = foo.reference_via(receiver.clone()).unwrap();

        let class = module
            .create_class(ClassDecl::new(&package(), "SuperUser").unwrap(), ClassModifiers::PUBLIC)
            .unwrap();
        let method = class
            .create_method(
                "run",
                MethodModifiers::PUBLIC | MethodModifiers::STATIC,
                MethodSignature::new().param("box", receiver),
            )
            .unwrap();
        let code = method.begin_code().unwrap();
        let boxed = code.argument(0).unwrap();

        // `T extends Number` rejects a string
        code.load(&boxed).unwrap();
        code.ldc("not a number").unwrap();
        code.ldc("hi").unwrap();
        assert!(matches!(
            code.invoke(&foo),
            Err(Error::StackTypeError {
                kind: VerifierErrorKind::IncompatibleTypes { .. },
                ..
            })
        ));
        code.pop().unwrap();
        code.pop().unwrap();

        // `R` is only known to be a supertype of `CharSequence`, so it takes `CharSequence`s
        code.i_const(42).unwrap();
        code.invoke(&integer_value_of()).unwrap();
        code.i_const(7).unwrap();
        code.invoke(&integer_value_of()).unwrap();
        assert!(matches!(
            code.invoke(&foo),
            Err(Error::StackTypeError {
                kind: VerifierErrorKind::IncompatibleTypes { .. },
                ..
            })
        ));
        code.pop().unwrap();

        let count = code.instruction_count().unwrap();
        code.ldc("hi").unwrap();
        code.invoke(&foo).unwrap();
        assert_eq!(code.instruction_count().unwrap(), count + 2);
        code.ret().unwrap();
        code.close().unwrap();
        method.close().unwrap();
        class.close().unwrap();
    });
}

#[test]
fn arguments_through_extends_wildcard() {
    init_logging();
    with_box_class(|module, box_decl, foo, _| {
        let receiver = box_decl
            .instantiate(vec![TypeArg::Extends(char_sequence())])
            .unwrap();
        let foo = foo.reference_via(receiver.clone()).unwrap();

        let class = module
            .create_class(ClassDecl::new(&package(), "ExtendsUser").unwrap(), ClassModifiers::PUBLIC)
            .unwrap();
        let method = class
            .create_method(
                "run",
                MethodModifiers::PUBLIC | MethodModifiers::STATIC,
                MethodSignature::new().param("box", receiver),
            )
            .unwrap();
        let code = method.begin_code().unwrap();
        let boxed = code.argument(0).unwrap();

        // Nothing is known to fit `R`, not even a `CharSequence`...
        code.load(&boxed).unwrap();
        code.i_const(1).unwrap();
        code.invoke(&integer_value_of()).unwrap();
        code.ldc("hi").unwrap();
        assert!(matches!(
            code.invoke(&foo),
            Err(Error::StackTypeError {
                kind: VerifierErrorKind::IncompatibleTypes { .. },
                ..
            })
        ));
        code.pop().unwrap();

        // ...except for `null`
        code.a_const_null().unwrap();
        code.invoke(&foo).unwrap();
        code.ret().unwrap();
        code.close().unwrap();
        method.close().unwrap();
        class.close().unwrap();
    });
}

#[test]
fn reads_are_cast_to_the_type_argument() {
    init_logging();
    let classes = with_box_class(|module, box_decl, _, get| {
        let receiver = box_decl
            .instantiate(vec![TypeArg::Invariant(JvmType::string())])
            .unwrap();
        let get = get.reference_via(receiver.clone()).unwrap();

        let class = module
            .create_class(ClassDecl::new(&package(), "Reader").unwrap(), ClassModifiers::PUBLIC)
            .unwrap();
        let method = class
            .create_method(
                "first",
                MethodModifiers::PUBLIC | MethodModifiers::STATIC,
                MethodSignature::new()
                    .param("box", receiver)
                    .returns(JvmType::string()),
            )
            .unwrap();
        let code = method.begin_code().unwrap();
        code.load(&code.argument(0).unwrap()).unwrap();

        // `invokevirtual` then a `checkcast` to `String`
        code.invoke(&get).unwrap();
        assert_eq!(code.instruction_count().unwrap(), 3);
        code.ret().unwrap();
        code.close().unwrap();
        method.close().unwrap();
        class.close().unwrap();
    });

    // Through the raw class, `get` just returns an `Object`
    assert_eq!(classes.len(), 2);
    let utf8s = utf8_constants(classes[1].class_file());
    assert!(utf8s.iter().any(|s| s == "(Lexamples/Box<Ljava/lang/String;>;)Ljava/lang/String;"));
}

#[test]
fn type_arguments_must_match_parameters() {
    init_logging();
    with_box_class(|_, box_decl, _, _| {
        // No type arguments at all is the raw type
        assert!(box_decl.instantiate(vec![]).unwrap().is_raw());
        assert!(matches!(
            box_decl.instantiate(vec![TypeArg::Wildcard, TypeArg::Wildcard]),
            Err(Error::TypeArgumentArity {
                expected: 1,
                found: 2,
                ..
            })
        ));
    });
}

#[test]
fn method_type_params_are_independent_of_class_type_params() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    // class C<R> { R value; <T extends Number> R foo(T input) { return value; } }
    let decl = ClassDecl::new(&package(), "C")
        .unwrap()
        .with_type_param(TypeParam::new("R").unwrap());
    let r = decl.type_var("R").unwrap();
    let class = module
        .create_class(decl.clone(), ClassModifiers::PUBLIC)
        .unwrap();
    let value = class
        .create_field("value", FieldModifiers::PRIVATE, r.clone())
        .unwrap();
    let signature = MethodSignature::new()
        .with_type_param(
            TypeParam::new("T")
                .unwrap()
                .extends(JvmType::object(BinaryName::NUMBER)),
        )
        .param("input", TypeVar::method("T").unwrap())
        .returns(r);
    let foo = class
        .create_method("foo", MethodModifiers::PUBLIC, signature)
        .unwrap();
    let code = foo.begin_code().unwrap();
    code.load(&code.this_var().unwrap()).unwrap();
    code.get_field(&value).unwrap();
    code.ret().unwrap();
    code.close().unwrap();
    let foo_decl = foo.decl();
    foo.close().unwrap();
    class.close().unwrap();

    // Calling `foo(42)` through a `C<? super CharSequence>`
    let receiver = decl
        .instantiate(vec![TypeArg::Super(char_sequence())])
        .unwrap();
    let foo = foo_decl.reference_via(receiver.clone()).unwrap();
    let caller = module
        .create_class(ClassDecl::new(&package(), "Caller").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    let method = caller
        .create_method(
            "call",
            MethodModifiers::PUBLIC | MethodModifiers::STATIC,
            MethodSignature::new().param("c", receiver),
        )
        .unwrap();
    let code = method.begin_code().unwrap();
    code.load(&code.argument(0).unwrap()).unwrap();
    code.i_const(42).unwrap();
    code.invoke(&integer_value_of()).unwrap();
    code.invoke(&foo).unwrap();

    // `? super CharSequence` only promises an `Object` back
    let frame = code.current_frame().unwrap().unwrap();
    assert_eq!(frame.stack.len(), 1);
    code.pop().unwrap();
    code.ret().unwrap();
    code.close().unwrap();
    method.close().unwrap();
    caller.close().unwrap();

    let classes = module.close().unwrap().check().unwrap();
    assert_eq!(classes.len(), 2);
}

#[test]
fn inner_and_nested_classes_see_different_type_params() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let outer = ClassDecl::new(&package(), "Outer")
        .unwrap()
        .with_type_param(TypeParam::new("T").unwrap());
    let outer_t = outer.type_var("T").unwrap();
    module
        .create_class(outer.clone(), ClassModifiers::PUBLIC)
        .unwrap()
        .close()
        .unwrap();

    // `class Inner<T>` inside `Outer<T>`: both `T`s are in scope, told apart by their owner
    let inner = ClassDecl::inner_of(&outer, "Inner")
        .unwrap()
        .with_type_param(TypeParam::new("T").unwrap());
    let inner_t = inner.type_var("T").unwrap();
    let inner_class = module
        .create_class(inner.clone(), ClassModifiers::PUBLIC)
        .unwrap();
    let signature = MethodSignature::new()
        .param("mine", inner_t)
        .param("theirs", outer_t.clone())
        .returns(outer_t.clone());
    let pick = inner_class
        .create_method("pick", MethodModifiers::PUBLIC, signature)
        .unwrap();
    let code = pick.begin_code().unwrap();
    code.load(&code.argument(1).unwrap()).unwrap();
    code.ret().unwrap();
    code.close().unwrap();
    pick.close().unwrap();
    inner_class.close().unwrap();

    // A static nested class has no enclosing instance, so the outer `T` is out of scope
    let nested = ClassDecl::nested_in(&outer, "Nested").unwrap();
    let nested_class = module
        .create_class(nested, ClassModifiers::PUBLIC | ClassModifiers::STATIC)
        .unwrap();
    assert!(matches!(
        nested_class.create_method(
            "leak",
            MethodModifiers::PUBLIC,
            MethodSignature::new().returns(outer_t.clone()),
        ),
        Err(Error::UnresolvedReference(_))
    ));
    nested_class.close().unwrap();

    // Supertypes are only checked once the module is verified
    let comparable = ClassRef::external(
        BinaryName::COMPARABLE,
        true,
        vec![TypeParam::new("T").unwrap()],
    )
    .instantiate(vec![TypeArg::Invariant(outer_t.into())])
    .unwrap();
    let sorted = ClassDecl::nested_in(&outer, "Sorted")
        .unwrap()
        .implements(comparable);
    module
        .create_class(sorted, ClassModifiers::PUBLIC | ClassModifiers::STATIC)
        .unwrap()
        .close()
        .unwrap();

    let compiled = module.close().unwrap();
    let verified: Vec<&str> = compiled
        .classes()
        .iter()
        .map(|class| class.name().as_str())
        .collect();
    assert_eq!(
        verified,
        vec!["examples/Outer", "examples/Outer$Inner", "examples/Outer$Nested"]
    );
    let rejected: Vec<_> = compiled.rejected().collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].0.as_str(), "examples/Outer$Sorted");
    assert!(matches!(
        rejected[0].1,
        [Error::UnresolvedReference(_)]
    ));
}
