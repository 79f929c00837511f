mod common;

use classforge::jvm::builder::ModuleBuilder;
use classforge::jvm::class_graph::{ClassGraph, ClassGraphArenas};
use classforge::jvm::decls::{ClassDecl, ClassRef, MethodRef, MethodSignature};
use classforge::jvm::types::JvmType;
use classforge::jvm::*;
use common::*;

fn public_static() -> MethodModifiers {
    MethodModifiers::PUBLIC | MethodModifiers::STATIC
}

#[test]
fn duplicate_method() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let class = module
        .create_class(ClassDecl::new(&package(), "Dup").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    let first = class
        .create_method("foo", public_static(), MethodSignature::new())
        .unwrap();

    // Return type doesn't distinguish overloads
    let second = class.create_method(
        "foo",
        public_static(),
        MethodSignature::new().returns(JvmType::INT),
    );
    assert!(matches!(
        second,
        Err(Error::DuplicateDeclaration {
            kind: DeclarationKind::Method,
            ..
        })
    ));

    // ...but parameter types do
    let overload = class
        .create_method(
            "foo",
            public_static(),
            MethodSignature::new().param("x", JvmType::INT),
        )
        .unwrap();

    for method in [&first, &overload] {
        let code = method.begin_code().unwrap();
        code.ret().unwrap();
        code.close().unwrap();
        method.close().unwrap();
    }
    class.close().unwrap();

    let classes = module.close().unwrap().check().unwrap();
    assert_eq!(classes[0].class_file().methods.len(), 2);
}

#[test]
fn duplicate_class_and_field() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let decl = ClassDecl::new(&package(), "Twice").unwrap();
    let class = module
        .create_class(decl.clone(), ClassModifiers::PUBLIC)
        .unwrap();
    assert!(matches!(
        module.create_class(decl, ClassModifiers::PUBLIC),
        Err(Error::DuplicateDeclaration {
            kind: DeclarationKind::Class,
            ..
        })
    ));

    class
        .create_field("x", FieldModifiers::PRIVATE, JvmType::INT)
        .unwrap();
    assert!(matches!(
        class.create_field("x", FieldModifiers::PRIVATE, JvmType::LONG),
        Err(Error::DuplicateDeclaration {
            kind: DeclarationKind::Field,
            ..
        })
    ));
    class.close().unwrap();

    let classes = module.close().unwrap().check().unwrap();
    assert_eq!(classes[0].class_file().fields.len(), 1);
}

#[test]
fn unclosed_children() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let class = module
        .create_class(ClassDecl::new(&package(), "Open").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    let method = class
        .create_method("run", public_static(), MethodSignature::new())
        .unwrap();
    let code = method.begin_code().unwrap();

    assert!(matches!(
        module.close(),
        Err(Error::UnclosedChildResource { .. })
    ));
    assert!(matches!(
        class.close(),
        Err(Error::UnclosedChildResource { .. })
    ));
    assert!(matches!(
        method.close(),
        Err(Error::UnclosedChildResource { .. })
    ));

    // Failed closes change nothing: finishing in order works
    code.ret().unwrap();
    code.close().unwrap();
    method.close().unwrap();
    class.close().unwrap();
    assert!(module.close().unwrap().is_verified());
}

#[test]
fn use_after_close() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let class = module
        .create_class(ClassDecl::new(&package(), "Closed").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    let method = class
        .create_method("run", public_static(), MethodSignature::new())
        .unwrap();
    let code = method.begin_code().unwrap();
    code.ret().unwrap();
    code.close().unwrap();

    assert!(matches!(code.ret(), Err(Error::UseAfterClose { .. })));
    assert!(matches!(code.close(), Err(Error::UseAfterClose { .. })));
    assert!(matches!(
        method.begin_code(),
        Err(Error::InvalidMethodBody { .. })
    ));

    method.close().unwrap();
    assert!(matches!(method.close(), Err(Error::UseAfterClose { .. })));
    assert!(matches!(
        method.begin_code(),
        Err(Error::UseAfterClose { .. })
    ));

    class.close().unwrap();
    assert!(matches!(class.close(), Err(Error::UseAfterClose { .. })));
    assert!(matches!(
        class.create_field("x", FieldModifiers::PUBLIC, JvmType::INT),
        Err(Error::UseAfterClose { .. })
    ));

    module.close().unwrap();
    assert!(matches!(module.close(), Err(Error::UseAfterClose { .. })));
    assert!(matches!(
        module.create_class(ClassDecl::new(&package(), "Late").unwrap(), ClassModifiers::PUBLIC),
        Err(Error::UseAfterClose { .. })
    ));
}

#[test]
fn abandoned_scope_drops_the_body() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let class = module
        .create_class(ClassDecl::new(&package(), "Partial").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    class
        .create_default_constructor(MethodModifiers::PUBLIC)
        .unwrap();

    {
        let method = class
            .create_method("broken", public_static(), MethodSignature::new())
            .unwrap();
        {
            let code = method.begin_code().unwrap();
            code.i_const(1).unwrap();
        }
        assert!(matches!(
            method.close(),
            Err(Error::InvalidMethodBody { .. })
        ));
    }

    // The abandoned method doesn't block a new one with the same signature
    let method = class
        .create_method("broken", public_static(), MethodSignature::new())
        .unwrap();
    let code = method.begin_code().unwrap();
    code.ret().unwrap();
    code.close().unwrap();
    method.close().unwrap();
    class.close().unwrap();

    let classes = module.close().unwrap().check().unwrap();
    assert_eq!(classes[0].class_file().methods.len(), 2);
}

#[test]
fn abandoned_class_is_left_out() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let decl = ClassDecl::new(&package(), "Gone").unwrap();
    {
        let _class = module
            .create_class(decl.clone(), ClassModifiers::PUBLIC)
            .unwrap();
    }
    let kept = module
        .create_class(ClassDecl::new(&package(), "Kept").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    kept.close().unwrap();

    let compiled = module.close().unwrap();
    assert!(compiled.is_verified());
    assert_eq!(compiled.classes().len(), 1);
    assert_eq!(compiled.classes()[0].name().as_str(), "examples/Kept");
}

#[test]
fn abandoned_class_can_be_recreated() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let decl = ClassDecl::new(&package(), "Retry").unwrap();
    {
        let first = module
            .create_class(decl.clone(), ClassModifiers::PUBLIC)
            .unwrap();
        first
            .create_field("x", FieldModifiers::PUBLIC, JvmType::INT)
            .unwrap();
    }

    let second = module.create_class(decl, ClassModifiers::PUBLIC).unwrap();
    assert!(matches!(
        module.create_class(
            ClassDecl::new(&package(), "Retry").unwrap(),
            ClassModifiers::PUBLIC
        ),
        Err(Error::DuplicateDeclaration { .. })
    ));
    second.close().unwrap();

    let classes = module.close().unwrap().check().unwrap();
    assert_eq!(classes.len(), 1);
    assert!(classes[0].class_file().fields.is_empty());
}

#[test]
fn missing_body_is_reported_at_module_close() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let good = module
        .create_class(ClassDecl::new(&package(), "Good").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    good.close().unwrap();

    let bad = module
        .create_class(ClassDecl::new(&package(), "Bad").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    let method = bad
        .create_method("run", public_static(), MethodSignature::new())
        .unwrap();
    method.close().unwrap();

    // Abstract methods have no body to begin
    let abstract_method = bad
        .create_method(
            "todo",
            MethodModifiers::PUBLIC | MethodModifiers::ABSTRACT,
            MethodSignature::new(),
        )
        .unwrap();
    assert!(matches!(
        abstract_method.begin_code(),
        Err(Error::InvalidMethodBody { .. })
    ));
    abstract_method.close().unwrap();
    bad.close().unwrap();

    // Classes are verified independently
    let compiled = module.close().unwrap();
    assert_eq!(compiled.classes().len(), 1);
    let rejected: Vec<_> = compiled.rejected().collect();
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].0.as_str(), "examples/Bad");
    let errors = rejected[0].1;
    assert_eq!(errors.len(), 2);
    assert!(errors
        .iter()
        .any(|err| matches!(err, Error::MissingMethodBody { .. })));
    assert!(errors
        .iter()
        .any(|err| matches!(err, Error::IllegalModifiers { .. })));

    match compiled.check() {
        Err(Error::VerificationError(errors)) => assert_eq!(errors.len(), 2),
        other => panic!("expected a verification error, got {:?}", other),
    }
}

#[test]
fn unverified_classes_are_not_loaded() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let class = module
        .create_class(ClassDecl::new(&package(), "Draft").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    class
        .create_default_constructor(MethodModifiers::PUBLIC)
        .unwrap();

    // Only closed classes can be built
    assert!(matches!(
        class.build(),
        Err(Error::UnclosedChildResource { .. })
    ));
    class
        .create_field("x", FieldModifiers::PUBLIC, JvmType::INT)
        .unwrap();
    class.close().unwrap();

    let draft = class.build().unwrap();
    assert!(!draft.is_verified());

    let mut loader = RecordingLoader::default();
    assert!(matches!(draft.load(&mut loader), Err(Error::LoaderError(_))));
    assert!(loader.loaded.is_empty());

    // Once the module is verified, the same class loads fine
    let classes = module.close().unwrap().check().unwrap();
    classes[0].load(&mut loader).unwrap();
    assert_eq!(draft.bytes().unwrap(), classes[0].bytes().unwrap());
}

#[test]
fn abandoned_body_leaves_no_constants() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let class = module
        .create_class(ClassDecl::new(&package(), "Forgetful").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    {
        let method = class
            .create_method("run", public_static(), MethodSignature::new())
            .unwrap();
        let code = method.begin_code().unwrap();
        code.ldc("ABANDONED-CONSTANT").unwrap();
        code.pop().unwrap();
    }

    let method = class
        .create_method("run", public_static(), MethodSignature::new())
        .unwrap();
    let code = method.begin_code().unwrap();
    code.ret().unwrap();
    code.close().unwrap();
    method.close().unwrap();
    class.close().unwrap();

    let classes = module.close().unwrap().check().unwrap();
    let utf8s = utf8_constants(classes[0].class_file());
    assert!(utf8s.iter().any(|s| s == "run"));
    assert!(!utf8s.iter().any(|s| s == "ABANDONED-CONSTANT"));
}

#[test]
fn abandoned_body_may_mention_abandoned_class() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let gone = ClassDecl::new(&package(), "Gone").unwrap();
    {
        let _class = module
            .create_class(gone.clone(), ClassModifiers::PUBLIC)
            .unwrap();
    }

    let user = module
        .create_class(ClassDecl::new(&package(), "User").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    {
        let method = user
            .create_method("run", public_static(), MethodSignature::new())
            .unwrap();
        let code = method.begin_code().unwrap();
        code.a_const_null().unwrap();
        code.check_cast(gone.raw_reference()).unwrap();
        code.pop().unwrap();
    }

    let method = user
        .create_method("run", public_static(), MethodSignature::new())
        .unwrap();
    let code = method.begin_code().unwrap();
    code.ret().unwrap();
    code.close().unwrap();
    method.close().unwrap();
    user.close().unwrap();

    let classes = module.close().unwrap().check().unwrap();
    assert_eq!(classes.len(), 1);
    assert!(!utf8_constants(classes[0].class_file())
        .iter()
        .any(|s| s == "examples/Gone"));
}

#[test]
fn recreated_class_keeps_its_supertypes() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    let oops = ClassDecl::new(&package(), "Oops").unwrap();
    {
        let _class = module
            .create_class(oops.clone(), ClassModifiers::PUBLIC)
            .unwrap();
    }

    // The class graph still has `Oops` as a plain `Object` subclass
    let exception = ClassRef::raw(BinaryName::RUNTIMEEXCEPTION);
    assert!(matches!(
        module.create_class(oops.extends(exception.clone()), ClassModifiers::PUBLIC),
        Err(Error::DuplicateDeclaration {
            kind: DeclarationKind::Class,
            ..
        })
    ));

    // Same supertypes the second time around is fine
    let failure = ClassDecl::new(&package(), "Failure")
        .unwrap()
        .extends(exception);
    {
        let _class = module
            .create_class(failure.clone(), ClassModifiers::PUBLIC)
            .unwrap();
    }
    let class = module
        .create_class(failure.clone(), ClassModifiers::PUBLIC)
        .unwrap();
    class
        .create_default_constructor(MethodModifiers::PUBLIC)
        .unwrap();
    let method = class
        .create_method("fail", public_static(), MethodSignature::new())
        .unwrap();
    let constructor = MethodRef::constructor(failure.raw_reference(), vec![]).unwrap();
    let code = method.begin_code().unwrap();
    code.new_inst(&failure.raw_reference()).unwrap();
    code.dup().unwrap();
    code.invoke_constructor(&constructor).unwrap();
    code.a_throw().unwrap();
    code.close().unwrap();
    method.close().unwrap();
    class.close().unwrap();

    let classes = module.close().unwrap().check().unwrap();
    assert_eq!(classes.len(), 1);
    assert_eq!(classes[0].name().as_str(), "examples/Failure");
}

#[test]
fn class_dropped_after_failed_close_is_left_out() {
    init_logging();
    let arenas = ClassGraphArenas::new();
    let class_graph = ClassGraph::new(&arenas);
    class_graph.insert_java_library_types().unwrap();
    let module = ModuleBuilder::new(&class_graph);

    {
        let class = module
            .create_class(ClassDecl::new(&package(), "Halfway").unwrap(), ClassModifiers::PUBLIC)
            .unwrap();
        let _method = class
            .create_method("run", public_static(), MethodSignature::new())
            .unwrap();
        assert!(matches!(
            class.close(),
            Err(Error::UnclosedChildResource { .. })
        ));
    }

    let survivor = module
        .create_class(ClassDecl::new(&package(), "Survivor").unwrap(), ClassModifiers::PUBLIC)
        .unwrap();
    survivor.close().unwrap();

    let compiled = module.close().unwrap();
    assert!(compiled.is_verified());
    let names: Vec<&str> = compiled
        .classes()
        .iter()
        .map(|class| class.name().as_str())
        .collect();
    assert_eq!(names, vec!["examples/Survivor"]);
}
