use crate::jvm::builder::{Body, MethodSlot, ModuleBuilder, ScopeSlot, SlotState};
use crate::jvm::class_file::ConstantsPool;
use crate::jvm::code::{
    BranchInstruction, CodeBuilder, CompareMode, EqComparison, Instruction, InvokeType,
    OrdComparison, ShiftType, SynLabel, VerifierInstruction,
};
use crate::jvm::decls::{ClassRef, FieldRef, MethodDecl, MethodRef};
use crate::jvm::types::{
    BaseType, ConstantValue, FieldType, Instantiation, JvmType, ParameterCheck, RefType, TypeEnv,
};
use crate::jvm::verifier::{VType, VerifierFrame};
use crate::jvm::{BinaryName, DeclarationKind, Error, Name, UnqualifiedName, VerifierErrorKind};
use crate::util::{Offset, Width};
use log::debug;

/// Local variable slot handed out by a [`ScopeBuilder`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalVar {
    pub name: UnqualifiedName,

    /// Index in the local variables
    pub index: u16,

    /// Declared type
    pub ty: JvmType,

    /// Erasure of the declared type
    pub descriptor: FieldType<BinaryName>,
}

/// Builder for a lexical scope of a method body
///
/// This is where instructions get emitted. Every instruction is checked against the current frame
/// before being accepted, and a rejected instruction leaves the code as it was. Scopes nest: a
/// child scope can declare its own local variables, which go away again when the child closes.
/// While a child is open, its parent can't be used.
///
/// Closing the root scope (the one returned by [`super::MethodBuilder::begin_code`]) finishes
/// the method body. At that point the code must end in a return, jump, or throw, and every label
/// must have been placed.
pub struct ScopeBuilder<'m, 'g> {
    pub(super) module: &'m ModuleBuilder<'g>,
    pub(super) class: usize,
    pub(super) method: usize,
    pub(super) scope: usize,
}

/// Code of a method, as borrowed out of the module for one emitting call
struct OpenCode<'a, 'g> {
    code: &'a mut CodeBuilder<'g>,
    constants: &'a mut ConstantsPool,
    method: &'a MethodDecl,
    scopes: &'a mut Vec<ScopeSlot>,
}

fn scope_resource(method: &MethodDecl, scope: usize) -> String {
    format!("scope #{} of {}", scope, method)
}

/// Check the scope can be used, then borrow out the method's code
fn open_code<'a, 'g>(
    slot: &'a mut MethodSlot<'g>,
    scope: usize,
) -> Result<(&'a MethodDecl, &'a mut CodeBuilder<'g>, &'a mut Vec<ScopeSlot>), Error> {
    let MethodSlot { decl, state, body } = slot;
    if *state != SlotState::Open {
        return Err(Error::UseAfterClose {
            resource: format!("method {}", decl),
        });
    }
    let (code, scopes) = match body {
        Body::Open { code, scopes } => (code, scopes),
        Body::Abandoned => {
            return Err(Error::InvalidMethodBody {
                method: decl.to_string(),
                reason: String::from("a code scope was dropped without being closed"),
            })
        }
        Body::None | Body::Done(_) => {
            return Err(Error::UseAfterClose {
                resource: scope_resource(decl, scope),
            })
        }
    };

    if scopes[scope].state != SlotState::Open {
        return Err(Error::UseAfterClose {
            resource: scope_resource(decl, scope),
        });
    }
    let open_children: Vec<String> = scopes
        .iter()
        .enumerate()
        .filter(|(_, child)| child.parent == Some(scope) && child.state == SlotState::Open)
        .map(|(idx, _)| format!("scope #{}", idx))
        .collect();
    if !open_children.is_empty() {
        return Err(Error::UnclosedChildResource {
            resource: scope_resource(decl, scope),
            open_children,
        });
    }

    Ok((decl, code, scopes))
}

fn erase_reference(env: &TypeEnv, ty: &JvmType) -> Result<RefType<BinaryName>, Error> {
    match env.erase(ty)? {
        FieldType::Ref(ref_type) => Ok(ref_type),
        FieldType::Base(base_type) => Err(Error::InvalidName(format!(
            "expected a reference type, but got {}",
            base_type.keyword()
        ))),
    }
}

impl<'a, 'g> OpenCode<'a, 'g> {
    fn push(&mut self, insn: VerifierInstruction) -> Result<(), Error> {
        self.code.push_instruction(insn, self.constants)
    }

    fn stack_error(&self, insn: &VerifierInstruction, kind: VerifierErrorKind) -> Error {
        Error::StackTypeError {
            position: self.code.instruction_count(),
            instruction: insn.to_string(),
            kind,
        }
    }

    /// Check the operand `depth` entries down from the top of the stack against the constraint
    /// generic signatures put on it (beyond what the erased descriptor says)
    ///
    /// Missing operands are left for the verifier to report when the instruction is pushed.
    fn check_operand(
        &self,
        insn: &VerifierInstruction,
        depth: usize,
        check: &ParameterCheck,
    ) -> Result<(), Error> {
        let stack = match self.code.current_frame() {
            Some(frame) => &frame.stack,
            None => return Ok(()),
        };
        let found = match stack
            .len()
            .checked_sub(depth + 1)
            .and_then(|idx| stack.get_index(idx))
        {
            Some((_, found)) => found,
            None => return Ok(()),
        };

        match check {
            ParameterCheck::Erased => Ok(()),
            ParameterCheck::NullOnly if found == &VType::Null => Ok(()),
            ParameterCheck::NullOnly => {
                let kind = VerifierErrorKind::IncompatibleTypes {
                    expected: String::from("null"),
                    found: found.to_string(),
                };
                Err(self.stack_error(insn, kind))
            }
            ParameterCheck::AssignableToAll(bounds) => {
                for bound in bounds {
                    let expected = VType::from(bound.clone());
                    let kind = match found.is_assignable(&expected, self.code.class_graph) {
                        Ok(true) => continue,
                        Ok(false) => VerifierErrorKind::IncompatibleTypes {
                            expected: expected.to_string(),
                            found: found.to_string(),
                        },
                        Err(name) => VerifierErrorKind::Unresolved(name.to_string()),
                    };
                    return Err(self.stack_error(insn, kind));
                }
                Ok(())
            }
        }
    }

    /// Narrow a value read out of a generic member down to what the use site knows it to be
    fn cast_yielded(
        &mut self,
        yielded: FieldType<BinaryName>,
        erased: &FieldType<BinaryName>,
    ) -> Result<(), Error> {
        if &yielded == erased {
            return Ok(());
        }
        match yielded {
            FieldType::Ref(ref_type) => self.push(Instruction::CheckCast(ref_type)),
            FieldType::Base(_) => Ok(()),
        }
    }

    fn invoke(&mut self, invoke_type: InvokeType, method: &MethodRef) -> Result<(), Error> {
        let caller = self.method;
        let caller_env = caller.type_env();
        let member_env = method.member_env();
        let instantiation = Instantiation::of(&method.owner);
        let insn = Instruction::Invoke(invoke_type, method.clone());

        let params = &method.signature.params;
        for (idx, param) in params.iter().enumerate() {
            let check = instantiation.parameter_check(&param.ty, &member_env, &caller_env)?;
            self.check_operand(&insn, params.len() - 1 - idx, &check)?;
        }
        let yielded = match &method.signature.return_type {
            Some(ty) => Some(instantiation.yielded_type(ty, &member_env, &caller_env)?),
            None => None,
        };

        self.push(insn)?;
        match (yielded, &method.descriptor.return_type) {
            (Some(yielded), Some(erased)) => self.cast_yielded(yielded, erased),
            _ => Ok(()),
        }
    }
}

macro_rules! simple_instructions {
    ($($(#[$doc:meta])* $name:ident => $insn:ident,)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&self) -> Result<(), Error> {
                self.emit(Instruction::$insn)
            }
        )*
    };
}

impl<'m, 'g> ScopeBuilder<'m, 'g> {
    fn with_code<T>(
        &self,
        action: impl FnOnce(OpenCode<'_, 'g>) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let mut classes = self.module.classes.borrow_mut();
        let class = &mut classes[self.class];
        let constants = &mut class.constants_pool;
        let (method, code, scopes) = open_code(&mut class.methods[self.method], self.scope)?;
        action(OpenCode {
            code,
            constants,
            method,
            scopes,
        })
    }

    /// Method this scope is part of
    pub fn method(&self) -> MethodDecl {
        self.module.classes.borrow()[self.class].methods[self.method]
            .decl
            .clone()
    }

    /// Number of instructions accepted so far in the method
    pub fn instruction_count(&self) -> Result<usize, Error> {
        self.with_code(|open| Ok(open.code.instruction_count()))
    }

    /// Frame after the last instruction, or `None` if the current position is unreachable
    pub fn current_frame(&self) -> Result<Option<VerifierFrame>, Error> {
        self.with_code(|open| Ok(open.code.current_frame().cloned()))
    }

    pub fn is_reachable(&self) -> Result<bool, Error> {
        self.with_code(|open| Ok(open.code.is_reachable()))
    }

    /// Emit a straight-line instruction
    pub fn emit(&self, insn: VerifierInstruction) -> Result<(), Error> {
        self.with_code(|mut open| open.push(insn))
    }

    /// Emit an instruction which ends the current basic block
    pub fn emit_branch(&self, insn: BranchInstruction<SynLabel, ()>) -> Result<(), Error> {
        self.with_code(|open| open.code.push_branch_instruction(insn))
    }

    // Local variables

    /// Declare a new local variable in this scope
    ///
    /// The variable has no value until something is stored into it.
    pub fn local_var(&self, name: &str, ty: impl Into<JvmType>) -> Result<LocalVar, Error> {
        let name = UnqualifiedName::from_str(name).map_err(Error::InvalidName)?;
        let ty = ty.into();
        self.with_code(|open| {
            let env = open.method.type_env();
            env.check_in_scope(&ty)?;
            let descriptor = env.erase(&ty)?;

            let scope = &mut open.scopes[self.scope];
            if scope.local_names.contains(&name) {
                return Err(Error::DuplicateDeclaration {
                    kind: DeclarationKind::LocalVariable,
                    name: name.to_string(),
                });
            }
            let index = scope.next_local;
            let next_local = Offset(index.0 + descriptor.width());
            if next_local.0 > u16::MAX as usize {
                return Err(Error::MethodCodeMaxLocalsOverflow(next_local));
            }

            scope.next_local = next_local;
            scope.local_names.push(name.clone());
            open.code.open_local_variable(name.clone(), descriptor.clone(), index);
            Ok(LocalVar {
                name,
                index: index.0 as u16,
                ty,
                descriptor,
            })
        })
    }

    /// Local variable holding one of the method arguments
    pub fn argument(&self, index: usize) -> Result<LocalVar, Error> {
        self.with_code(|open| {
            let method = open.method;
            let param = method.signature.params.get(index).ok_or_else(|| {
                Error::UnresolvedReference(format!("{} has no parameter #{}", method, index))
            })?;
            let parameters = &method.descriptor().parameters;
            let this_len = if method.is_static() { 0 } else { 1 };
            let slot = this_len + parameters[..index].iter().map(Width::width).sum::<usize>();
            Ok(LocalVar {
                name: UnqualifiedName::from_str(&param.name).map_err(Error::InvalidName)?,
                index: slot as u16,
                ty: param.ty.clone(),
                descriptor: parameters[index].clone(),
            })
        })
    }

    /// Local variable holding `this`
    pub fn this_var(&self) -> Result<LocalVar, Error> {
        self.with_code(|open| {
            let method = open.method;
            if method.is_static() {
                return Err(Error::UnresolvedReference(format!(
                    "static method {} has no `this`",
                    method
                )));
            }
            Ok(LocalVar {
                name: UnqualifiedName::THIS,
                index: 0,
                ty: JvmType::Class(method.owner.reference()),
                descriptor: FieldType::object(method.owner.binary_name().clone()),
            })
        })
    }

    pub fn load(&self, var: &LocalVar) -> Result<(), Error> {
        let insn = match &var.descriptor {
            FieldType::Base(BaseType::Long) => Instruction::LLoad(var.index),
            FieldType::Base(BaseType::Float) => Instruction::FLoad(var.index),
            FieldType::Base(BaseType::Double) => Instruction::DLoad(var.index),
            FieldType::Base(_) => Instruction::ILoad(var.index),
            FieldType::Ref(_) => Instruction::ALoad(var.index),
        };
        self.emit(insn)
    }

    /// Pop the top of the stack into a local variable
    ///
    /// For references, the value must be assignable to the variable's declared type.
    pub fn store(&self, var: &LocalVar) -> Result<(), Error> {
        let insn = match &var.descriptor {
            FieldType::Base(BaseType::Long) => Instruction::LStore(var.index),
            FieldType::Base(BaseType::Float) => Instruction::FStore(var.index),
            FieldType::Base(BaseType::Double) => Instruction::DStore(var.index),
            FieldType::Base(_) => Instruction::IStore(var.index),
            FieldType::Ref(_) => Instruction::AStore(var.index),
        };
        self.with_code(|mut open| {
            if let FieldType::Ref(_) = &var.descriptor {
                let check = ParameterCheck::AssignableToAll(vec![var.descriptor.clone()]);
                open.check_operand(&insn, 0, &check)?;
            }
            open.push(insn)
        })
    }

    pub fn i_inc(&self, var: &LocalVar, delta: i16) -> Result<(), Error> {
        self.emit(Instruction::IInc(var.index, delta))
    }

    // Constants

    /// Push an `int`, using the shortest encoding
    pub fn i_const(&self, value: i32) -> Result<(), Error> {
        let insn = match value {
            -1 => Instruction::IConstM1,
            0 => Instruction::IConst0,
            1 => Instruction::IConst1,
            2 => Instruction::IConst2,
            3 => Instruction::IConst3,
            4 => Instruction::IConst4,
            5 => Instruction::IConst5,
            _ => match (i8::try_from(value), i16::try_from(value)) {
                (Ok(byte), _) => Instruction::BiPush(byte),
                (_, Ok(short)) => Instruction::SiPush(short),
                _ => Instruction::Ldc(ConstantValue::Int(value)),
            },
        };
        self.emit(insn)
    }

    pub fn l_const(&self, value: i64) -> Result<(), Error> {
        let insn = match value {
            0 => Instruction::LConst0,
            1 => Instruction::LConst1,
            _ => Instruction::Ldc2(ConstantValue::Long(value)),
        };
        self.emit(insn)
    }

    pub fn f_const(&self, value: f32) -> Result<(), Error> {
        // Compare bits, so `-0.0` doesn't become `fconst_0`
        let insn = match value.to_bits() {
            bits if bits == 0f32.to_bits() => Instruction::FConst0,
            bits if bits == 1f32.to_bits() => Instruction::FConst1,
            bits if bits == 2f32.to_bits() => Instruction::FConst2,
            _ => Instruction::Ldc(ConstantValue::Float(value)),
        };
        self.emit(insn)
    }

    pub fn d_const(&self, value: f64) -> Result<(), Error> {
        let insn = match value.to_bits() {
            bits if bits == 0f64.to_bits() => Instruction::DConst0,
            bits if bits == 1f64.to_bits() => Instruction::DConst1,
            _ => Instruction::Ldc2(ConstantValue::Double(value)),
        };
        self.emit(insn)
    }

    /// Push a constant from the constant pool
    pub fn ldc(&self, value: impl Into<ConstantValue>) -> Result<(), Error> {
        let value = value.into();
        if value.is_wide() {
            self.emit(Instruction::Ldc2(value))
        } else {
            self.emit(Instruction::Ldc(value))
        }
    }

    simple_instructions! {
        a_const_null => AConstNull,
        pop => Pop,
        pop2 => Pop2,
        dup => Dup,
        dup_x1 => DupX1,
        dup_x2 => DupX2,
        dup2 => Dup2,
        swap => Swap,
        i_add => IAdd,
        l_add => LAdd,
        f_add => FAdd,
        d_add => DAdd,
        i_sub => ISub,
        l_sub => LSub,
        f_sub => FSub,
        d_sub => DSub,
        i_mul => IMul,
        l_mul => LMul,
        f_mul => FMul,
        d_mul => DMul,
        i_div => IDiv,
        l_div => LDiv,
        f_div => FDiv,
        d_div => DDiv,
        i_rem => IRem,
        l_rem => LRem,
        f_rem => FRem,
        d_rem => DRem,
        i_neg => INeg,
        l_neg => LNeg,
        f_neg => FNeg,
        d_neg => DNeg,
        i_and => IAnd,
        l_and => LAnd,
        i_or => IOr,
        l_or => LOr,
        i_xor => IXor,
        l_xor => LXor,
        i2l => I2L,
        i2f => I2F,
        i2d => I2D,
        l2i => L2I,
        l2f => L2F,
        l2d => L2D,
        f2i => F2I,
        f2l => F2L,
        f2d => F2D,
        d2i => D2I,
        d2l => D2L,
        d2f => D2F,
        i2b => I2B,
        i2c => I2C,
        i2s => I2S,
        l_cmp => LCmp,
        /// Length of the array on top of the stack
        array_length => ArrayLength,
    }

    pub fn i_shift(&self, shift: ShiftType) -> Result<(), Error> {
        self.emit(Instruction::ISh(shift))
    }

    pub fn l_shift(&self, shift: ShiftType) -> Result<(), Error> {
        self.emit(Instruction::LSh(shift))
    }

    pub fn f_cmp(&self, mode: CompareMode) -> Result<(), Error> {
        self.emit(Instruction::FCmp(mode))
    }

    pub fn d_cmp(&self, mode: CompareMode) -> Result<(), Error> {
        self.emit(Instruction::DCmp(mode))
    }

    // Objects and arrays

    /// Allocate an uninitialized object (to be followed by [`Self::invoke_constructor`])
    pub fn new_inst(&self, class: &ClassRef) -> Result<(), Error> {
        self.emit(Instruction::New(RefType::Object(class.name.clone())))
    }

    pub fn check_cast(&self, ty: impl Into<JvmType>) -> Result<(), Error> {
        let ty = ty.into();
        self.with_code(|mut open| {
            let ref_type = erase_reference(&open.method.type_env(), &ty)?;
            open.push(Instruction::CheckCast(ref_type))
        })
    }

    pub fn instance_of(&self, ty: impl Into<JvmType>) -> Result<(), Error> {
        let ty = ty.into();
        self.with_code(|mut open| {
            let ref_type = erase_reference(&open.method.type_env(), &ty)?;
            open.push(Instruction::InstanceOf(ref_type))
        })
    }

    /// Allocate a one-dimensional array whose length is on top of the stack
    pub fn new_array(&self, element: impl Into<JvmType>) -> Result<(), Error> {
        let element = element.into();
        self.with_code(|mut open| {
            let insn = match open.method.type_env().erase(&element)? {
                FieldType::Base(base_type) => Instruction::NewArray(base_type),
                FieldType::Ref(ref_type) => Instruction::ANewArray(ref_type),
            };
            open.push(insn)
        })
    }

    pub fn array_load(&self, element: impl Into<JvmType>) -> Result<(), Error> {
        let element = element.into();
        self.with_code(|mut open| {
            let insn = match open.method.type_env().erase(&element)? {
                FieldType::Base(BaseType::Int) => Instruction::IALoad,
                FieldType::Base(BaseType::Long) => Instruction::LALoad,
                FieldType::Base(BaseType::Float) => Instruction::FALoad,
                FieldType::Base(BaseType::Double) => Instruction::DALoad,
                FieldType::Base(BaseType::Byte | BaseType::Boolean) => Instruction::BALoad,
                FieldType::Base(BaseType::Char) => Instruction::CALoad,
                FieldType::Base(BaseType::Short) => Instruction::SALoad,
                FieldType::Ref(_) => Instruction::AALoad,
            };
            open.push(insn)
        })
    }

    pub fn array_store(&self, element: impl Into<JvmType>) -> Result<(), Error> {
        let element = element.into();
        self.with_code(|mut open| {
            let insn = match open.method.type_env().erase(&element)? {
                FieldType::Base(BaseType::Int) => Instruction::IAStore,
                FieldType::Base(BaseType::Long) => Instruction::LAStore,
                FieldType::Base(BaseType::Float) => Instruction::FAStore,
                FieldType::Base(BaseType::Double) => Instruction::DAStore,
                FieldType::Base(BaseType::Byte | BaseType::Boolean) => Instruction::BAStore,
                FieldType::Base(BaseType::Char) => Instruction::CAStore,
                FieldType::Base(BaseType::Short) => Instruction::SAStore,
                FieldType::Ref(_) => Instruction::AAStore,
            };
            open.push(insn)
        })
    }

    // Fields and methods

    /// Read a field (static or instance)
    ///
    /// If the field's type is a type variable bound more precisely by the receiver type, the
    /// value is cast to that more precise type.
    pub fn get_field(&self, field: &FieldRef) -> Result<(), Error> {
        self.with_code(|mut open| {
            let caller = open.method;
            let yielded = Instantiation::of(&field.owner).yielded_type(
                &field.ty,
                &field.member_env(),
                &caller.type_env(),
            )?;
            let insn = if field.is_static {
                Instruction::GetStatic(field.clone())
            } else {
                Instruction::GetField(field.clone())
            };
            open.push(insn)?;
            open.cast_yielded(yielded, &field.descriptor)
        })
    }

    /// Write a field (static or instance)
    pub fn put_field(&self, field: &FieldRef) -> Result<(), Error> {
        self.with_code(|mut open| {
            let caller = open.method;
            let check = Instantiation::of(&field.owner).parameter_check(
                &field.ty,
                &field.member_env(),
                &caller.type_env(),
            )?;
            let insn = if field.is_static {
                Instruction::PutStatic(field.clone())
            } else {
                Instruction::PutField(field.clone())
            };
            open.check_operand(&insn, 0, &check)?;
            open.push(insn)
        })
    }

    /// Call a method, with the arguments (and receiver) already on the stack
    ///
    /// Beyond the checks on the erased descriptor, arguments for generic parameters are checked
    /// against what the receiver type's type arguments say about them. For instance, calling
    /// `void foo(R r)` through a `C<? super CharSequence>` requires a `CharSequence`, even
    /// though the descriptor only asks for an `Object`.
    pub fn invoke(&self, method: &MethodRef) -> Result<(), Error> {
        self.with_code(|mut open| open.invoke(method.invoke_type(), method))
    }

    /// Call an instance method without virtual dispatch (eg. a superclass implementation)
    pub fn invoke_special(&self, method: &MethodRef) -> Result<(), Error> {
        self.with_code(|mut open| open.invoke(InvokeType::Special, method))
    }

    /// Initialize the uninitialized object below the arguments on the stack
    pub fn invoke_constructor(&self, constructor: &MethodRef) -> Result<(), Error> {
        if !constructor.is_constructor() {
            return Err(Error::UnresolvedReference(format!(
                "{}.{} is not a constructor",
                constructor.owner.name, constructor.name
            )));
        }
        self.invoke(constructor)
    }

    // Control flow

    pub fn new_label(&self) -> Result<SynLabel, Error> {
        self.with_code(|open| Ok(open.code.fresh_label()))
    }

    /// Place a label at the current position
    ///
    /// The label must be reachable: either the code above falls through, or something already
    /// jumped to it.
    pub fn place_label(&self, label: SynLabel) -> Result<(), Error> {
        self.with_code(|open| open.code.place_label(label))
    }

    /// Place a label that nothing has jumped to yet, after code that doesn't fall through
    ///
    /// This is for blocks only reached by a backward jump, such as the body of a loop whose
    /// condition is tested at the bottom. The frame is usually one saved with
    /// [`Self::current_frame`] before the jump to the condition.
    pub fn place_label_with_frame(
        &self,
        label: SynLabel,
        frame: &VerifierFrame,
    ) -> Result<(), Error> {
        self.with_code(|open| open.code.place_label_with_frame(label, frame))
    }

    pub fn jump(&self, label: SynLabel) -> Result<(), Error> {
        self.emit_branch(BranchInstruction::Goto(label))
    }

    /// Compare the `int` on top of the stack against zero
    pub fn if_cond(&self, comparison: OrdComparison, label: SynLabel) -> Result<(), Error> {
        self.emit_branch(BranchInstruction::If(comparison, label, ()))
    }

    pub fn if_icmp(&self, comparison: OrdComparison, label: SynLabel) -> Result<(), Error> {
        self.emit_branch(BranchInstruction::IfICmp(comparison, label, ()))
    }

    pub fn if_acmp(&self, comparison: EqComparison, label: SynLabel) -> Result<(), Error> {
        self.emit_branch(BranchInstruction::IfACmp(comparison, label, ()))
    }

    pub fn if_null(&self, label: SynLabel) -> Result<(), Error> {
        self.emit_branch(BranchInstruction::IfNull(EqComparison::EQ, label, ()))
    }

    pub fn if_non_null(&self, label: SynLabel) -> Result<(), Error> {
        self.emit_branch(BranchInstruction::IfNull(EqComparison::NE, label, ()))
    }

    /// Return from the method, picking the return instruction from its return type
    pub fn ret(&self) -> Result<(), Error> {
        self.with_code(|open| {
            let insn = match &open.method.descriptor().return_type {
                None => BranchInstruction::Return,
                Some(FieldType::Base(BaseType::Long)) => BranchInstruction::LReturn,
                Some(FieldType::Base(BaseType::Float)) => BranchInstruction::FReturn,
                Some(FieldType::Base(BaseType::Double)) => BranchInstruction::DReturn,
                Some(FieldType::Base(_)) => BranchInstruction::IReturn,
                Some(FieldType::Ref(_)) => BranchInstruction::AReturn,
            };
            open.code.push_branch_instruction(insn)
        })
    }

    pub fn a_throw(&self) -> Result<(), Error> {
        self.emit_branch(BranchInstruction::AThrow)
    }

    /// Attribute the following instructions to a source line
    pub fn line_number(&self, line: u16) -> Result<(), Error> {
        self.with_code(|open| {
            open.code.line_number(line);
            Ok(())
        })
    }

    // Scopes

    /// Open a nested scope
    ///
    /// This scope can't be used again until the child is closed.
    pub fn child_scope(&self) -> Result<ScopeBuilder<'m, 'g>, Error> {
        let scope = self.with_code(|open| {
            let start = open.scopes[self.scope].next_local;
            open.scopes.push(ScopeSlot {
                parent: Some(self.scope),
                state: SlotState::Open,
                locals_start: start,
                next_local: start,
                local_names: vec![],
            });
            Ok(open.scopes.len() - 1)
        })?;
        Ok(ScopeBuilder {
            module: self.module,
            class: self.class,
            method: self.method,
            scope,
        })
    }

    /// Close the scope
    ///
    /// Closing a child scope drops its local variables from the frame. Closing the root scope
    /// finishes the method body.
    pub fn close(&self) -> Result<(), Error> {
        let mut classes = self.module.classes.borrow_mut();
        let slot = &mut classes[self.class].methods[self.method];
        let (decl, code, scopes) = open_code(slot, self.scope)?;

        if scopes[self.scope].parent.is_some() {
            code.truncate_locals(scopes[self.scope].locals_start);
            scopes[self.scope].state = SlotState::Closed;
            debug!("Closed {}", scope_resource(decl, self.scope));
            return Ok(());
        }

        code.check_finished()?;
        debug!("Finished code for {}", decl);
        if let Body::Open { code, .. } = std::mem::replace(&mut slot.body, Body::Abandoned) {
            slot.body = Body::Done(code.result()?);
        }
        Ok(())
    }
}

impl<'m, 'g> Drop for ScopeBuilder<'m, 'g> {
    fn drop(&mut self) {
        if let Ok(mut classes) = self.module.classes.try_borrow_mut() {
            let slot = &mut classes[self.class].methods[self.method];
            let abandoned = matches!(
                &slot.body,
                Body::Open { scopes, .. } if scopes[self.scope].state == SlotState::Open
            );
            if abandoned {
                debug!("Abandoned {}", scope_resource(&slot.decl, self.scope));
                slot.body = Body::Abandoned;
            }
        }
    }
}
