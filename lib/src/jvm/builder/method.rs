use crate::jvm::builder::{Body, MethodSlot, ModuleBuilder, ScopeBuilder, ScopeSlot, SlotState};
use crate::jvm::code::CodeBuilder;
use crate::jvm::decls::{MethodDecl, MethodRef};
use crate::jvm::types::FieldType;
use crate::jvm::{Error, MethodKind, Name, UnqualifiedName};
use crate::util::{Offset, Width};
use log::debug;

/// Builder for one method of a class
///
/// A method has at most one body. Its code is built through the root [`ScopeBuilder`] returned
/// by [`MethodBuilder::begin_code`], which must be closed before the method is.
pub struct MethodBuilder<'m, 'g> {
    pub(super) module: &'m ModuleBuilder<'g>,
    pub(super) class: usize,
    pub(super) method: usize,
}

impl<'m, 'g> MethodBuilder<'m, 'g> {
    fn with_open_method<T>(
        &self,
        action: impl FnOnce(&mut MethodSlot<'g>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut classes = self.module.classes.borrow_mut();
        let slot = &mut classes[self.class].methods[self.method];
        if slot.state != SlotState::Open {
            return Err(Error::UseAfterClose {
                resource: slot.resource(),
            });
        }
        action(slot)
    }

    pub fn decl(&self) -> MethodDecl {
        self.module.classes.borrow()[self.class].methods[self.method]
            .decl
            .clone()
    }

    /// Reference for invoking this method from code in the module
    pub fn reference(&self) -> MethodRef {
        self.module.classes.borrow()[self.class].methods[self.method]
            .decl
            .reference()
    }

    /// Start the method body
    ///
    /// The returned scope starts out with just the arguments (and `this`, unless the method is
    /// static) in its locals.
    pub fn begin_code(&self) -> Result<ScopeBuilder<'m, 'g>, Error> {
        let class_graph = self.module.class_graph();
        self.with_open_method(|slot| {
            let decl = &slot.decl;
            let reason = if !decl.modifiers.requires_body() {
                Some(format!("{} methods have no code", decl.modifiers))
            } else if !matches!(slot.body, Body::None) {
                Some(String::from("code was already started"))
            } else {
                None
            };
            if let Some(reason) = reason {
                return Err(Error::InvalidMethodBody {
                    method: decl.to_string(),
                    reason,
                });
            }

            let mut code = CodeBuilder::new(
                class_graph,
                decl.owner.binary_name(),
                decl.descriptor(),
                decl.is_static(),
                decl.kind() == MethodKind::Constructor,
            );

            // `this` and the arguments are named for the whole body
            let mut next_slot = Offset(0);
            if !decl.is_static() {
                let this_type = FieldType::object(decl.owner.binary_name().clone());
                code.open_local_variable(UnqualifiedName::THIS, this_type, next_slot);
                next_slot.0 += 1;
            }
            let parameters = &decl.descriptor().parameters;
            for (param, descriptor) in decl.signature.params.iter().zip(parameters) {
                if let Ok(name) = UnqualifiedName::from_str(&param.name) {
                    code.open_local_variable(name, descriptor.clone(), next_slot);
                }
                next_slot.0 += descriptor.width();
            }
            let arguments = Offset(decl.descriptor().parameter_length(!decl.is_static()));
            debug!("Started code for {}", decl);

            slot.body = Body::Open {
                code,
                scopes: vec![ScopeSlot {
                    parent: None,
                    state: SlotState::Open,
                    locals_start: arguments,
                    next_local: arguments,
                    local_names: vec![],
                }],
            };
            Ok(())
        })?;

        Ok(ScopeBuilder {
            module: self.module,
            class: self.class,
            method: self.method,
            scope: 0,
        })
    }

    /// Seal the method
    ///
    /// A method without a body can be closed: if it needed one, that gets reported when the
    /// module is verified.
    pub fn close(&self) -> Result<(), Error> {
        self.with_open_method(|slot| {
            match slot.body {
                Body::Open { .. } => {
                    return Err(Error::UnclosedChildResource {
                        resource: slot.resource(),
                        open_children: vec![String::from("code")],
                    })
                }
                Body::Abandoned => {
                    return Err(Error::InvalidMethodBody {
                        method: slot.decl.to_string(),
                        reason: String::from("a code scope was dropped without being closed"),
                    })
                }
                Body::None | Body::Done(_) => (),
            }
            slot.state = SlotState::Closed;
            debug!("Closed method {}", slot.decl);
            Ok(())
        })
    }
}

impl<'m, 'g> Drop for MethodBuilder<'m, 'g> {
    fn drop(&mut self) {
        if let Ok(mut classes) = self.module.classes.try_borrow_mut() {
            let slot = &mut classes[self.class].methods[self.method];
            if slot.state == SlotState::Open {
                debug!("Abandoned method {}", slot.decl);
                slot.state = SlotState::Abandoned;
            }
        }
    }
}
