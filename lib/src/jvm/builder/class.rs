use crate::jvm::builder::{
    Body, ClassSlot, CompiledClass, MethodBuilder, MethodSlot, ModuleBuilder, SlotState,
};
use crate::jvm::class_file::ConstantIndex;
use crate::jvm::code::Code;
use crate::jvm::decls::{
    ClassDecl, ClassRef, FieldDecl, FieldRef, MethodDecl, MethodRef, MethodSignature, Param,
};
use crate::jvm::model::{Class, ClassSummary, Field, Method};
use crate::jvm::types::{ConstantValue, JvmType};
use crate::jvm::{BinaryName, DeclarationKind, Error, FieldModifiers, MethodModifiers};
use log::debug;

/// Builder for one class of a module
///
/// Fields are declared in a single call. Methods get their own [`MethodBuilder`], which must be
/// closed before the class is.
pub struct ClassBuilder<'m, 'g> {
    pub(super) module: &'m ModuleBuilder<'g>,
    pub(super) class: usize,
}

impl<'g> ClassSlot<'g> {
    fn add_method(&mut self, decl: MethodDecl) -> Result<usize, Error> {
        let duplicate = self.methods.iter().any(|method| {
            method.state != SlotState::Abandoned && method.decl.overload_key() == decl.overload_key()
        });
        if duplicate {
            return Err(Error::DuplicateDeclaration {
                kind: DeclarationKind::Method,
                name: decl.to_string(),
            });
        }

        debug!("Created method {}", decl);
        self.methods.push(MethodSlot {
            decl,
            state: SlotState::Open,
            body: Body::None,
        });
        Ok(self.methods.len() - 1)
    }

    fn add_field(&mut self, decl: FieldDecl) -> Result<FieldRef, Error> {
        if self.fields.iter().any(|field| field.name == decl.name) {
            return Err(Error::DuplicateDeclaration {
                kind: DeclarationKind::Field,
                name: decl.to_string(),
            });
        }

        debug!("Created field {}", decl);
        let field_ref = decl.reference();
        self.fields.push(decl);
        Ok(field_ref)
    }
}

impl<'m, 'g> ClassBuilder<'m, 'g> {
    fn with_open_class<T>(
        &self,
        action: impl FnOnce(&mut ClassSlot<'g>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut classes = self.module.classes.borrow_mut();
        let slot = &mut classes[self.class];
        if slot.state != SlotState::Open {
            return Err(Error::UseAfterClose {
                resource: slot.resource(),
            });
        }
        action(slot)
    }

    pub fn decl(&self) -> ClassDecl {
        self.module.classes.borrow()[self.class].decl.clone()
    }

    pub fn name(&self) -> BinaryName {
        self.module.classes.borrow()[self.class]
            .decl
            .binary_name()
            .clone()
    }

    /// Generic reference to the class, from inside its own body
    pub fn reference(&self) -> ClassRef {
        self.module.classes.borrow()[self.class].decl.reference()
    }

    /// Start a new method
    ///
    /// Fails if a method with the same name and erased parameter types already exists.
    pub fn create_method(
        &self,
        name: &str,
        modifiers: MethodModifiers,
        signature: MethodSignature,
    ) -> Result<MethodBuilder<'m, 'g>, Error> {
        let method = self.with_open_class(|slot| {
            let decl = MethodDecl::new(&slot.decl, name, modifiers, signature)?;
            slot.add_method(decl)
        })?;
        Ok(self.method_builder(method))
    }

    pub fn create_constructor(
        &self,
        modifiers: MethodModifiers,
        params: Vec<Param>,
    ) -> Result<MethodBuilder<'m, 'g>, Error> {
        let method = self.with_open_class(|slot| {
            let decl = MethodDecl::constructor(&slot.decl, modifiers, params)?;
            slot.add_method(decl)
        })?;
        Ok(self.method_builder(method))
    }

    /// Start the static initializer (`<clinit>`)
    pub fn create_static_constructor(&self) -> Result<MethodBuilder<'m, 'g>, Error> {
        let method = self.with_open_class(|slot| {
            let decl = MethodDecl::static_initializer(&slot.decl)?;
            slot.add_method(decl)
        })?;
        Ok(self.method_builder(method))
    }

    /// Add a finished constructor that takes no arguments and just calls the superclass's
    /// no-argument constructor
    pub fn create_default_constructor(
        &self,
        modifiers: MethodModifiers,
    ) -> Result<MethodRef, Error> {
        let super_init = MethodRef::constructor(self.decl().superclass, vec![])?;
        let constructor = self.create_constructor(modifiers, vec![])?;

        let code = constructor.begin_code()?;
        code.load(&code.this_var()?)?;
        code.invoke_constructor(&super_init)?;
        code.ret()?;
        code.close()?;

        constructor.close()?;
        Ok(constructor.reference())
    }

    fn method_builder(&self, method: usize) -> MethodBuilder<'m, 'g> {
        MethodBuilder {
            module: self.module,
            class: self.class,
            method,
        }
    }

    pub fn create_field(
        &self,
        name: &str,
        modifiers: FieldModifiers,
        ty: impl Into<JvmType>,
    ) -> Result<FieldRef, Error> {
        self.with_open_class(|slot| {
            let decl = FieldDecl::new(&slot.decl, name, modifiers, ty)?;
            slot.add_field(decl)
        })
    }

    /// Add a field with a `ConstantValue` attribute
    pub fn create_constant_field(
        &self,
        name: &str,
        modifiers: FieldModifiers,
        ty: impl Into<JvmType>,
        value: impl Into<ConstantValue>,
    ) -> Result<FieldRef, Error> {
        self.with_open_class(|slot| {
            let decl = FieldDecl::new(&slot.decl, name, modifiers, ty)?.with_constant(value.into());
            slot.add_field(decl)
        })
    }

    /// Seal the class
    ///
    /// Every method created on the class must already be closed (or abandoned).
    pub fn close(&self) -> Result<(), Error> {
        self.with_open_class(|slot| {
            let open_children: Vec<String> = slot
                .methods
                .iter()
                .filter(|method| method.state == SlotState::Open)
                .map(|method| method.decl.to_string())
                .collect();
            if !open_children.is_empty() {
                return Err(Error::UnclosedChildResource {
                    resource: slot.resource(),
                    open_children,
                });
            }

            let fields = slot.fields.iter().cloned().map(Field::new).collect();
            let mut methods: Vec<Method> = slot
                .methods
                .iter_mut()
                .filter(|method| method.state == SlotState::Closed)
                .map(|method| {
                    let code = match std::mem::replace(&mut method.body, Body::None) {
                        Body::Done(code) => Some(code),
                        _ => None,
                    };
                    Method::new(method.decl.clone(), code)
                })
                .collect();

            // Abandoned bodies interned constants too, but only kept code may show up in the class
            let mut constants_pool = std::mem::take(&mut slot.constants_pool);
            let operands: Vec<ConstantIndex> = methods
                .iter()
                .filter_map(|method| method.code_impl.as_ref())
                .flat_map(Code::constant_operands)
                .collect();
            if let Some(renumbered) = constants_pool.retain_reachable(operands) {
                for code in methods.iter_mut().filter_map(|method| method.code_impl.as_mut()) {
                    code.renumber_constants(&renumbered);
                }
            }

            slot.built = Some(Class {
                decl: slot.decl.clone(),
                modifiers: slot.modifiers,
                fields,
                methods,
                constants_pool,
            });
            slot.state = SlotState::Closed;
            debug!("Closed class {}", slot.decl.binary_name());
            Ok(())
        })
    }

    /// Serialize just this class, which must already be closed
    ///
    /// This skips module verification, so the result can't be handed to a loader. It is mostly
    /// useful for inspecting the output of a class before the rest of the module is done.
    pub fn build(&self) -> Result<CompiledClass, Error> {
        let classes = self.module.classes.borrow();
        let slot = &classes[self.class];
        let class = match (slot.state, &slot.built) {
            (SlotState::Closed, Some(class)) => class,
            (SlotState::Open, _) => {
                return Err(Error::UnclosedChildResource {
                    resource: String::from("module"),
                    open_children: vec![slot.decl.binary_name().to_string()],
                })
            }
            _ => {
                return Err(Error::UseAfterClose {
                    resource: slot.resource(),
                })
            }
        };
        let summaries: Vec<ClassSummary> = classes
            .iter()
            .filter_map(|slot| slot.built.as_ref())
            .map(Class::summary)
            .collect();
        let class_file = class.serialize(self.module.settings(), &summaries)?;
        Ok(CompiledClass::new(class.name().clone(), class_file, false))
    }
}

impl<'m, 'g> Drop for ClassBuilder<'m, 'g> {
    fn drop(&mut self) {
        if let Ok(mut classes) = self.module.classes.try_borrow_mut() {
            let slot = &mut classes[self.class];
            if slot.state == SlotState::Open {
                debug!("Abandoned class {}", slot.decl.binary_name());
                slot.state = SlotState::Abandoned;
            }
        }
    }
}
