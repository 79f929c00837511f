use crate::jvm::class_graph::ClassGraph;
use crate::jvm::model::Class;
use crate::jvm::types::{FieldType, JvmType, RenderDescriptor, TypeEnv};
use crate::jvm::{BinaryName, DeclarationKind, Error, MethodModifiers, UnqualifiedName};
use std::collections::HashSet;

/// Check the parts of a finished class which aren't already checked while its code is built
///
/// Method bodies were verified instruction by instruction, so this is about the declarations:
///
///   - modifiers are legal for what they are attached to
///   - no two fields share a name and no two methods share a name and erased parameter types
///   - methods have a body exactly when their modifiers call for one
///   - constant values are on static fields of a matching type
///   - type variables are only used where they are in scope
///   - every class in the constant pool is known to the class graph
///
/// Every problem is reported, not just the first one.
pub fn check_class<'g>(class: &Class, class_graph: &'g ClassGraph<'g>) -> Vec<Error> {
    let mut errors = vec![];
    let decl = &class.decl;
    let is_interface = decl.is_interface;

    if let Err(reason) = class.modifiers.check_legal(is_interface, decl.nesting()) {
        errors.push(Error::IllegalModifiers {
            declaration: format!("class {}", decl.binary_name()),
            reason,
        });
    }

    let class_env = decl.type_env();
    if let Err(err) = class_env.check_params_in_scope(&decl.type_params) {
        errors.push(err);
    }
    for supertype in std::iter::once(&decl.superclass).chain(&decl.interfaces) {
        if let Err(err) = class_env.check_in_scope(&JvmType::Class(supertype.clone())) {
            errors.push(err);
        }
    }

    let mut field_names: HashSet<&UnqualifiedName> = HashSet::new();
    for field in &class.fields {
        let field = &field.decl;
        if !field_names.insert(&field.name) {
            errors.push(Error::DuplicateDeclaration {
                kind: DeclarationKind::Field,
                name: field.to_string(),
            });
        }
        if let Err(reason) = field.modifiers.check_legal(is_interface) {
            errors.push(Error::IllegalModifiers {
                declaration: format!("field {}", field),
                reason,
            });
        }
        let env = if field.is_static() {
            TypeEnv::new()
        } else {
            decl.type_env()
        };
        if let Err(err) = env.check_in_scope(&field.ty) {
            errors.push(err);
        }
        if let Some(constant) = &field.constant {
            let reason = if !field.is_static() {
                Some(String::from("only static fields have constant values"))
            } else if !constant.fits_field(field.descriptor()) {
                Some(format!(
                    "constant {} does not fit type {}",
                    constant,
                    field.descriptor().render()
                ))
            } else {
                None
            };
            if let Some(reason) = reason {
                errors.push(Error::IllegalModifiers {
                    declaration: format!("field {}", field),
                    reason,
                });
            }
        }
    }

    let mut overloads: HashSet<(&UnqualifiedName, &[FieldType<BinaryName>])> = HashSet::new();
    for method in &class.methods {
        let method_decl = &method.decl;
        if !overloads.insert(method_decl.overload_key()) {
            errors.push(Error::DuplicateDeclaration {
                kind: DeclarationKind::Method,
                name: method_decl.to_string(),
            });
        }

        let modifiers = method_decl.modifiers;
        let legal = modifiers
            .check_legal(method_decl.kind(), is_interface)
            .and_then(|()| {
                if modifiers.contains(MethodModifiers::ABSTRACT)
                    && !class.modifiers.allows_abstract_methods(is_interface)
                {
                    Err(String::from("only abstract classes and interfaces have abstract methods"))
                } else {
                    Ok(())
                }
            });
        if let Err(reason) = legal {
            errors.push(Error::IllegalModifiers {
                declaration: format!("method {}", method_decl),
                reason,
            });
        }

        match (modifiers.requires_body(), &method.code_impl) {
            (true, None) => errors.push(Error::MissingMethodBody {
                method: method_decl.to_string(),
            }),
            (false, Some(_)) => errors.push(Error::InvalidMethodBody {
                method: method_decl.to_string(),
                reason: format!("{} methods have no code", modifiers),
            }),
            _ => (),
        }

        if let Err(err) = method_decl.signature.check_in_scope(&method_decl.type_env()) {
            errors.push(err);
        }
    }

    let mut referenced: Vec<&BinaryName> = class.constants_pool.referenced_classes().collect();
    referenced.sort();
    for name in referenced {
        if class_graph.lookup_class(name).is_none() {
            errors.push(Error::UnresolvedReference(format!(
                "{} (used in {})",
                name,
                decl.binary_name()
            )));
        }
    }

    errors
}
