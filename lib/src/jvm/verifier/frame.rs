use super::*;
use crate::jvm::class_file::{ClassConstantIndex, ConstantPoolOverflow, ConstantsPool, StackMapFrame};
use crate::jvm::class_graph::ClassGraph;
use crate::jvm::code::{BranchInstruction, Instruction, InvokeType, VerifierInstruction};
use crate::jvm::types::{ArrayType, ConstantValue, FieldType, RefType};
use crate::jvm::{BinaryName, VerifierErrorKind};
use crate::util::{Offset, OffsetVec, Width};
use std::fmt;

/// Snapshot of the stack and local variables at a point in the bytecode
///
/// Besides just being able to produce stack map entries, tracking frames lets every instruction
/// be checked the moment it is emitted.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Frame<Cls, U> {
    /// Local variables in scope
    pub locals: OffsetVec<VerificationType<Cls, U>>,

    /// Types of values on the stack
    pub stack: OffsetVec<VerificationType<Cls, U>>,
}

/// Frame tracked while code is being built
pub type VerifierFrame = Frame<RefType<BinaryName>, UninitializedRefType>;

/// Frame with classes interned, ready to go into a `StackMapTable`
pub type SerializableFrame = Frame<ClassConstantIndex, u16>;

impl<Cls, U> Default for Frame<Cls, U> {
    fn default() -> Self {
        Frame {
            locals: OffsetVec::new(),
            stack: OffsetVec::new(),
        }
    }
}

impl VerifierFrame {
    /// Update the frame to reflect the effects of the given (non-branching) instruction
    ///
    /// `insn_offset` is the offset of the instruction from the start of the method. On failure,
    /// the frame may be partially updated: callers verify against a copy.
    pub fn verify_instruction<'g>(
        &mut self,
        insn: &VerifierInstruction,
        insn_offset: Offset,
        class_graph: &'g ClassGraph<'g>,
        this_class: &RefType<BinaryName>,
    ) -> Result<(), VerifierErrorKind> {
        verify_instruction(self, class_graph, this_class, insn, insn_offset)
    }

    /// Update the frame to reflect the effects of the given branching instruction
    pub fn verify_branch_instruction<'g, Lbl, LblNext>(
        &mut self,
        insn: &BranchInstruction<Lbl, LblNext>,
        this_method_return_type: &Option<FieldType<BinaryName>>,
        class_graph: &'g ClassGraph<'g>,
    ) -> Result<(), VerifierErrorKind> {
        verify_branch_instruction(self, this_method_return_type, insn, class_graph)
    }

    /// Update the maximum locals and stack
    ///
    /// Only has an effect if the size of the locals or the size of the stack is greater than the
    /// previous maximum values.
    pub fn update_maximums(&self, max_locals: &mut Offset, max_stack: &mut Offset) {
        max_locals.0 = max_locals.0.max(self.locals.offset_len().0);
        max_stack.0 = max_stack.0.max(self.stack.offset_len().0);
    }

    /// Forget every local variable starting at `offset`
    pub fn truncate_locals(&mut self, offset: Offset) {
        self.locals.truncate_to(offset);
    }

    /// Resolve the frame into its serializable form
    pub fn into_serializable(
        &self,
        constants: &mut ConstantsPool,
    ) -> Result<SerializableFrame, ConstantPoolOverflow> {
        Ok(Frame {
            stack: self
                .stack
                .values()
                .map(|t| t.into_serializable(constants))
                .collect::<Result<_, _>>()?,
            locals: self
                .locals
                .values()
                .map(|t| t.into_serializable(constants))
                .collect::<Result<_, _>>()?,
        })
    }
}

impl fmt::Display for VerifierFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "locals {} stack {}",
            render_types(&self.locals),
            render_types(&self.stack)
        )
    }
}

/// Render a sequence of types as `[int, java/lang/String]`
pub fn render_types(types: &OffsetVec<VType>) -> String {
    let rendered: Vec<String> = types.values().map(VType::to_string).collect();
    format!("[{}]", rendered.join(", "))
}

impl SerializableFrame {
    /// Compute a stack map frame for this frame, given the previous frame
    ///
    /// This will fall back to the `Full` option using [`Self::full_stack_map_frame`] only if none
    /// of the other stack map frame variants are enough to encode the transition.
    pub fn stack_map_frame(&self, offset_delta: u16, previous_frame: &Self) -> StackMapFrame {
        let this_locals: Vec<_> = self.locals.values().copied().collect();
        let prev_locals: Vec<_> = previous_frame.locals.values().copied().collect();

        match self.stack.len() {
            0 if this_locals.len() <= prev_locals.len() => {
                let chopped = prev_locals.len() - this_locals.len();
                if chopped < 4 && prev_locals.starts_with(&this_locals) {
                    return if chopped == 0 {
                        StackMapFrame::SameLocalsNoStack { offset_delta }
                    } else {
                        StackMapFrame::ChopLocalsNoStack {
                            offset_delta,
                            chopped_k: chopped as u8,
                        }
                    };
                }
            }
            0 => {
                let appended = this_locals.len() - prev_locals.len();
                if appended < 4 && this_locals.starts_with(&prev_locals) {
                    return StackMapFrame::AppendLocalsNoStack {
                        offset_delta,
                        locals: this_locals[prev_locals.len()..].to_vec(),
                    };
                }
            }
            1 if this_locals == prev_locals => {
                if let Some(stack) = self.stack.values().next() {
                    return StackMapFrame::SameLocalsOneStack {
                        offset_delta,
                        stack: *stack,
                    };
                }
            }
            _ => (),
        }

        self.full_stack_map_frame(offset_delta)
    }

    /// Compute a `Full` stack map frame
    pub fn full_stack_map_frame(&self, offset_delta: u16) -> StackMapFrame {
        StackMapFrame::Full {
            offset_delta,
            stack: self.stack.values().copied().collect(),
            locals: self.locals.values().copied().collect(),
        }
    }
}

fn verify_instruction<'g>(
    frame: &mut VerifierFrame,
    class_graph: &'g ClassGraph<'g>,
    this_class: &RefType<BinaryName>,
    insn: &VerifierInstruction,
    insn_offset: Offset,
) -> Result<(), VerifierErrorKind> {
    use Instruction::*;
    use VerificationType::*;

    let Frame {
        ref mut stack,
        ref mut locals,
    } = frame;

    match insn {
        Nop => (),
        AConstNull => {
            stack.push(Null);
        }
        IConstM1 | IConst0 | IConst1 | IConst2 | IConst3 | IConst4 | IConst5 => {
            stack.push(Integer);
        }
        LConst0 | LConst1 => {
            stack.push(Long);
        }
        FConst0 | FConst1 | FConst2 => {
            stack.push(Float);
        }
        DConst0 | DConst1 => {
            stack.push(Double);
        }
        BiPush(_) | SiPush(_) => {
            stack.push(Integer);
        }
        Ldc(constant) | LdcW(constant) => {
            if constant.is_wide() {
                return Err(VerifierErrorKind::InvalidWidth(2));
            }
            stack.push(VType::from(constant.field_type()));
        }
        Ldc2(constant) => {
            if !constant.is_wide() {
                return Err(VerifierErrorKind::InvalidWidth(1));
            }
            stack.push(match constant {
                ConstantValue::Long(_) => Long,
                _ => Double,
            });
        }

        ILoad(offset) => {
            get_local_expecting_type(locals, *offset, Integer)?;
            stack.push(Integer);
        }
        LLoad(offset) => {
            get_local_expecting_type(locals, *offset, Long)?;
            stack.push(Long);
        }
        FLoad(offset) => {
            get_local_expecting_type(locals, *offset, Float)?;
            stack.push(Float);
        }
        DLoad(offset) => {
            get_local_expecting_type(locals, *offset, Double)?;
            stack.push(Double);
        }
        ALoad(offset) => {
            let typ = get_local(locals, *offset)?;
            if !typ.is_reference() {
                return Err(VerifierErrorKind::InvalidType);
            }
            stack.push(typ);
        }

        IALoad | BALoad | CALoad | SALoad => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            let element = pop_primitive_array(stack, insn)?;
            stack.push(element);
        }
        LALoad => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            let element = pop_primitive_array(stack, insn)?;
            stack.push(element);
        }
        FALoad | DALoad => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            let element = pop_primitive_array(stack, insn)?;
            stack.push(element);
        }
        AALoad => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            match pop_offset_vec(stack)? {
                Null => stack.push(Null),
                Object(RefType::ObjectArray(arr)) => stack.push(Object(match arr.additional_dimensions {
                    0 => RefType::Object(arr.element_type),
                    n => RefType::ObjectArray(ArrayType {
                        additional_dimensions: n - 1,
                        element_type: arr.element_type,
                    }),
                })),
                Object(RefType::PrimitiveArray(arr)) if arr.additional_dimensions > 0 => {
                    stack.push(Object(RefType::PrimitiveArray(ArrayType {
                        additional_dimensions: arr.additional_dimensions - 1,
                        element_type: arr.element_type,
                    })))
                }
                _ => return Err(VerifierErrorKind::NotArrayType),
            };
        }

        IStore(offset) => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            assign_local(locals, *offset, Integer);
        }
        FStore(offset) => {
            pop_offset_vec_expecting_type(stack, Float, class_graph)?;
            assign_local(locals, *offset, Float);
        }
        LStore(offset) => {
            pop_offset_vec_expecting_type(stack, Long, class_graph)?;
            assign_local(locals, *offset, Long);
        }
        DStore(offset) => {
            pop_offset_vec_expecting_type(stack, Double, class_graph)?;
            assign_local(locals, *offset, Double);
        }
        AStore(offset) => {
            let popped_type = pop_offset_vec(stack)?;
            if !popped_type.is_reference() {
                return Err(VerifierErrorKind::InvalidType);
            }
            assign_local(locals, *offset, popped_type);
        }

        IAStore | BAStore | CAStore | SAStore => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            pop_primitive_array(stack, insn)?;
        }
        LAStore => {
            pop_offset_vec_expecting_type(stack, Long, class_graph)?;
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            pop_primitive_array(stack, insn)?;
        }
        FAStore => {
            pop_offset_vec_expecting_type(stack, Float, class_graph)?;
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            pop_primitive_array(stack, insn)?;
        }
        DAStore => {
            pop_offset_vec_expecting_type(stack, Double, class_graph)?;
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            pop_primitive_array(stack, insn)?;
        }
        AAStore => {
            let elem_type = pop_offset_vec(stack)?;
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            match pop_offset_vec(stack)? {
                Null => (),
                Object(RefType::ObjectArray(arr)) => {
                    let expected_elem_type = Object(match arr.additional_dimensions {
                        0 => RefType::Object(arr.element_type),
                        n => RefType::ObjectArray(ArrayType {
                            additional_dimensions: n - 1,
                            element_type: arr.element_type,
                        }),
                    });
                    check_assignable(&elem_type, &expected_elem_type, class_graph)?;
                }
                Object(RefType::PrimitiveArray(arr)) if arr.additional_dimensions > 0 => {
                    let expected_elem_type = Object(RefType::PrimitiveArray(ArrayType {
                        additional_dimensions: arr.additional_dimensions - 1,
                        element_type: arr.element_type,
                    }));
                    check_assignable(&elem_type, &expected_elem_type, class_graph)?;
                }
                _ => return Err(VerifierErrorKind::NotArrayType),
            }
        }

        Pop => {
            let _ = pop_offset_vec_expecting_width(stack, 1)?;
        }

        Pop2 => {
            let arg1 = pop_offset_vec(stack)?;
            if arg1.width() == 1 {
                let _ = pop_offset_vec_expecting_width(stack, 1)?;
            }
        }

        Dup => {
            let arg1 = pop_offset_vec_expecting_width(stack, 1)?;
            stack.push(arg1.clone());
            stack.push(arg1);
        }

        DupX1 => {
            let arg1 = pop_offset_vec_expecting_width(stack, 1)?;
            let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
            stack.push(arg1.clone());
            stack.push(arg2);
            stack.push(arg1);
        }

        DupX2 => {
            let arg1 = pop_offset_vec_expecting_width(stack, 1)?;
            let arg2 = pop_offset_vec(stack)?;
            if arg2.width() == 1 {
                let arg3 = pop_offset_vec_expecting_width(stack, 1)?;
                stack.push(arg1.clone());
                stack.push(arg3);
                stack.push(arg2);
                stack.push(arg1);
            } else {
                stack.push(arg1.clone());
                stack.push(arg2);
                stack.push(arg1);
            }
        }

        Dup2 => {
            let arg1 = pop_offset_vec(stack)?;
            if arg1.width() == 1 {
                let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
                stack.push(arg2.clone());
                stack.push(arg1.clone());
                stack.push(arg2);
                stack.push(arg1);
            } else {
                stack.push(arg1.clone());
                stack.push(arg1);
            }
        }

        Dup2X1 => {
            let arg1 = pop_offset_vec(stack)?;
            if arg1.width() == 1 {
                let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
                let arg3 = pop_offset_vec_expecting_width(stack, 1)?;
                stack.push(arg2.clone());
                stack.push(arg1.clone());
                stack.push(arg3);
                stack.push(arg2);
                stack.push(arg1);
            } else {
                let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
                stack.push(arg1.clone());
                stack.push(arg2);
                stack.push(arg1);
            }
        }

        Dup2X2 => {
            let arg1 = pop_offset_vec(stack)?;
            if arg1.width() == 1 {
                let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
                let arg3 = pop_offset_vec(stack)?;
                if arg3.width() == 1 {
                    let arg4 = pop_offset_vec_expecting_width(stack, 1)?;
                    stack.push(arg2.clone());
                    stack.push(arg1.clone());
                    stack.push(arg4);
                } else {
                    stack.push(arg2.clone());
                    stack.push(arg1.clone());
                }
                stack.push(arg3);
                stack.push(arg2);
                stack.push(arg1);
            } else {
                let arg2 = pop_offset_vec(stack)?;
                if arg2.width() == 1 {
                    let arg3 = pop_offset_vec_expecting_width(stack, 1)?;
                    stack.push(arg1.clone());
                    stack.push(arg3);
                } else {
                    stack.push(arg1.clone());
                }
                stack.push(arg2);
                stack.push(arg1);
            }
        }

        Swap => {
            let arg1 = pop_offset_vec_expecting_width(stack, 1)?;
            let arg2 = pop_offset_vec_expecting_width(stack, 1)?;
            stack.push(arg1);
            stack.push(arg2);
        }

        IAdd | ISub | IDiv | IMul | IRem | IAnd | IOr | IXor | ISh(_) => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            stack.push(Integer);
        }

        LAdd | LSub | LDiv | LMul | LRem | LAnd | LOr | LXor => {
            pop_offset_vec_expecting_type(stack, Long, class_graph)?;
            pop_offset_vec_expecting_type(stack, Long, class_graph)?;
            stack.push(Long);
        }

        FAdd | FSub | FDiv | FMul | FRem => {
            pop_offset_vec_expecting_type(stack, Float, class_graph)?;
            pop_offset_vec_expecting_type(stack, Float, class_graph)?;
            stack.push(Float);
        }

        DAdd | DSub | DDiv | DMul | DRem => {
            pop_offset_vec_expecting_type(stack, Double, class_graph)?;
            pop_offset_vec_expecting_type(stack, Double, class_graph)?;
            stack.push(Double);
        }

        INeg | I2B | I2C | I2S => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            stack.push(Integer);
        }

        LNeg => {
            pop_offset_vec_expecting_type(stack, Long, class_graph)?;
            stack.push(Long);
        }

        FNeg => {
            pop_offset_vec_expecting_type(stack, Float, class_graph)?;
            stack.push(Float);
        }

        DNeg => {
            pop_offset_vec_expecting_type(stack, Double, class_graph)?;
            stack.push(Double);
        }

        LSh(_) => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            pop_offset_vec_expecting_type(stack, Long, class_graph)?;
            stack.push(Long);
        }

        IInc(offset, _) => {
            get_local_expecting_type(locals, *offset, Integer)?;
        }

        I2L | I2F | I2D | L2I | L2F | L2D | F2I | F2L | F2D | D2I | D2L | D2F => {
            let (from, to) = match insn {
                I2L => (Integer, Long),
                I2F => (Integer, Float),
                I2D => (Integer, Double),
                L2I => (Long, Integer),
                L2F => (Long, Float),
                L2D => (Long, Double),
                F2I => (Float, Integer),
                F2L => (Float, Long),
                F2D => (Float, Double),
                D2I => (Double, Integer),
                D2L => (Double, Long),
                _ => (Double, Float),
            };
            pop_offset_vec_expecting_type(stack, from, class_graph)?;
            stack.push(to);
        }

        LCmp => {
            pop_offset_vec_expecting_type(stack, Long, class_graph)?;
            pop_offset_vec_expecting_type(stack, Long, class_graph)?;
            stack.push(Integer);
        }
        FCmp(_) => {
            pop_offset_vec_expecting_type(stack, Float, class_graph)?;
            pop_offset_vec_expecting_type(stack, Float, class_graph)?;
            stack.push(Integer);
        }
        DCmp(_) => {
            pop_offset_vec_expecting_type(stack, Double, class_graph)?;
            pop_offset_vec_expecting_type(stack, Double, class_graph)?;
            stack.push(Integer);
        }

        GetStatic(field) => {
            stack.push(VType::from(field.descriptor.clone()));
        }
        PutStatic(field) => {
            let arg_type = pop_offset_vec(stack)?;
            check_assignable(&arg_type, &VType::from(field.descriptor.clone()), class_graph)?;
        }

        GetField(field) => {
            let object_type = Object(RefType::Object(field.owner.name.clone()));
            let object_type_found = pop_offset_vec(stack)?;
            check_assignable(&object_type_found, &object_type, class_graph)?;
            stack.push(VType::from(field.descriptor.clone()));
        }
        PutField(field) => {
            let owner = RefType::Object(field.owner.name.clone());
            let arg_type = pop_offset_vec(stack)?;
            check_assignable(&arg_type, &VType::from(field.descriptor.clone()), class_graph)?;

            // Constructors may set their own fields before calling the super constructor
            let object_type_found = pop_offset_vec(stack)?;
            if !(object_type_found == UninitializedThis && &owner == this_class) {
                check_assignable(&object_type_found, &Object(owner), class_graph)?;
            }
        }

        Invoke(invoke_type, method) => {
            let is_interface = method.owner.is_interface;
            let desc = &method.descriptor;
            let owner = RefType::Object(method.owner.name.clone());

            // `Methodref` vs. `InterfaceMethodref` has to agree with the class graph
            if let Some(owner_is_interface) = class_graph.is_interface(&method.owner.name) {
                if owner_is_interface != is_interface {
                    return Err(VerifierErrorKind::IncompatibleTypes {
                        expected: class_kind(owner_is_interface, &method.owner.name),
                        found: class_kind(is_interface, &method.owner.name),
                    });
                }
            }

            // Check that all the arguments match
            for expected_arg_type in desc.parameters.iter().rev() {
                let found_arg_type = pop_offset_vec(stack)?;
                let expected_arg_type = VType::from(expected_arg_type.clone());
                check_assignable(&found_arg_type, &expected_arg_type, class_graph)?;
            }

            if let (InvokeType::Special, true) = (invoke_type, method.is_constructor()) {
                // Initialize
                match pop_offset_vec(stack)? {
                    UninitializedThis => {
                        let initialized = Object(this_class.clone());
                        replace_all(stack, &UninitializedThis, &initialized);
                        replace_all(locals, &UninitializedThis, &initialized);
                    }

                    uninitialized @ Uninitialized(_) => {
                        let initialized = match &uninitialized {
                            Uninitialized(uninit) if uninit.verification_type == owner => {
                                Object(owner)
                            }
                            _ => {
                                return Err(VerifierErrorKind::IncompatibleTypes {
                                    expected: format!("uninitialized({})", method.owner.name),
                                    found: uninitialized.to_string(),
                                })
                            }
                        };
                        replace_all(stack, &uninitialized, &initialized);
                        replace_all(locals, &uninitialized, &initialized);
                    }

                    other => {
                        return Err(VerifierErrorKind::IncompatibleTypes {
                            expected: format!("uninitialized({})", method.owner.name),
                            found: other.to_string(),
                        })
                    }
                }

                if is_interface || desc.return_type.is_some() {
                    return Err(VerifierErrorKind::InvalidType);
                }
            } else {
                let needs_receiver = match invoke_type {
                    InvokeType::Static => false,
                    InvokeType::Virtual | InvokeType::Special => {
                        if is_interface && *invoke_type == InvokeType::Virtual {
                            return Err(VerifierErrorKind::InvalidType);
                        }
                        true
                    }
                    InvokeType::Interface(_) => {
                        if !is_interface {
                            return Err(VerifierErrorKind::InvalidType);
                        }
                        true
                    }
                };

                // Pop off the receiver type
                if needs_receiver {
                    let found_receiver = pop_offset_vec(stack)?;
                    check_assignable(&found_receiver, &Object(owner), class_graph)?;
                }

                // Push the return type
                if let Some(return_type) = &desc.return_type {
                    stack.push(VType::from(return_type.clone()));
                }
            }
        }

        New(ref_type) => {
            if let RefType::Object(_) = ref_type {
                stack.push(Uninitialized(UninitializedRefType {
                    verification_type: ref_type.clone(),
                    new_offset: insn_offset,
                }));
            } else {
                return Err(VerifierErrorKind::InvalidType);
            }
        }
        NewArray(base_type) => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            stack.push(Object(RefType::array(FieldType::Base(*base_type))));
        }
        ANewArray(ref_type) => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            stack.push(Object(RefType::array(FieldType::Ref(ref_type.clone()))));
        }
        ArrayLength => {
            match pop_offset_vec(stack)? {
                Null | Object(RefType::PrimitiveArray(_) | RefType::ObjectArray(_)) => (),
                _ => return Err(VerifierErrorKind::NotArrayType),
            }
            stack.push(Integer);
        }

        CheckCast(ref_type) => {
            match pop_offset_vec(stack)? {
                Object(_) | Null => (),
                _ => return Err(VerifierErrorKind::InvalidType),
            }
            stack.push(Object(ref_type.clone()));
        }
        InstanceOf(_) => {
            match pop_offset_vec(stack)? {
                Object(_) | Null => (),
                _ => return Err(VerifierErrorKind::InvalidType),
            }
            stack.push(Integer);
        }
    }

    Ok(())
}

fn verify_branch_instruction<'g, Lbl, LblNext>(
    frame: &mut VerifierFrame,
    this_method_return_type: &Option<FieldType<BinaryName>>,
    insn: &BranchInstruction<Lbl, LblNext>,
    class_graph: &'g ClassGraph<'g>,
) -> Result<(), VerifierErrorKind> {
    use BranchInstruction::*;
    use VerificationType::*;

    let Frame {
        ref mut stack,
        locals: _,
    } = frame;

    match insn {
        If(_, _, _) => pop_offset_vec_expecting_type(stack, Integer, class_graph)?,
        IfICmp(_, _, _) => {
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
            pop_offset_vec_expecting_type(stack, Integer, class_graph)?;
        }
        IfACmp(_, _, _) => {
            let atype_1 = pop_offset_vec(stack)?;
            let atype_2 = pop_offset_vec(stack)?;
            if !atype_1.is_reference() || !atype_2.is_reference() {
                return Err(VerifierErrorKind::InvalidType);
            }
        }
        Goto(_) => (),
        IReturn | LReturn | FReturn | DReturn | AReturn | Return => {
            let expected = this_method_return_type.clone().map(VType::from);
            let fits_instruction = matches!(
                (insn, &expected),
                (Return, None)
                    | (IReturn, Some(Integer))
                    | (LReturn, Some(Long))
                    | (FReturn, Some(Float))
                    | (DReturn, Some(Double))
                    | (AReturn, Some(Object(_)))
            );
            if !fits_instruction {
                return Err(bad_return(&expected, stack));
            }
            match &expected {
                None if stack.is_empty() => (),
                Some(expected_type) if stack.len() == 1 => {
                    let found = pop_offset_vec(stack)?;
                    match found.is_assignable(expected_type, class_graph) {
                        Ok(true) => (),
                        Ok(false) => {
                            stack.push(found);
                            return Err(bad_return(&expected, stack));
                        }
                        Err(name) => return Err(VerifierErrorKind::Unresolved(name.to_string())),
                    }
                }
                _ => return Err(bad_return(&expected, stack)),
            }
        }
        AThrow => {
            let atype = pop_offset_vec(stack)?;
            let throwable = Object(RefType::Object(BinaryName::THROWABLE));
            check_assignable(&atype, &throwable, class_graph)?;
            stack.clear();
        }
        IfNull(_, _, _) => {
            let atype = pop_offset_vec(stack)?;
            if !atype.is_reference() {
                return Err(VerifierErrorKind::InvalidType);
            }
        }
        FallThrough(_) => (),
    }

    Ok(())
}

fn bad_return(expected: &Option<VType>, stack: &OffsetVec<VType>) -> VerifierErrorKind {
    VerifierErrorKind::BadReturn {
        expected: expected
            .as_ref()
            .map_or_else(|| String::from("void"), VType::to_string),
        found: render_types(stack),
    }
}

fn class_kind(is_interface: bool, name: &BinaryName) -> String {
    if is_interface {
        format!("interface {}", name)
    } else {
        format!("class {}", name)
    }
}

fn check_assignable<'g>(
    found: &VType,
    expected: &VType,
    class_graph: &'g ClassGraph<'g>,
) -> Result<(), VerifierErrorKind> {
    match found.is_assignable(expected, class_graph) {
        Ok(true) => Ok(()),
        Ok(false) => {
            log::error!("Incompatible types: found {} but expected {}", found, expected);
            Err(VerifierErrorKind::IncompatibleTypes {
                expected: expected.to_string(),
                found: found.to_string(),
            })
        }
        Err(name) => Err(VerifierErrorKind::Unresolved(name.to_string())),
    }
}

/// Pop a primitive array matching the element type of an array load or store
fn pop_primitive_array(
    stack: &mut OffsetVec<VType>,
    insn: &VerifierInstruction,
) -> Result<VType, VerifierErrorKind> {
    use crate::jvm::types::BaseType;
    use Instruction::*;

    let accepts: &[BaseType] = match insn {
        IALoad | IAStore => &[BaseType::Int],
        LALoad | LAStore => &[BaseType::Long],
        FALoad | FAStore => &[BaseType::Float],
        DALoad | DAStore => &[BaseType::Double],
        BALoad | BAStore => &[BaseType::Byte, BaseType::Boolean],
        CALoad | CAStore => &[BaseType::Char],
        _ => &[BaseType::Short],
    };
    let element = VType::from(FieldType::<BinaryName>::Base(accepts[0]));
    match pop_offset_vec(stack)? {
        VerificationType::Null => Ok(element),
        VerificationType::Object(RefType::PrimitiveArray(ArrayType {
            additional_dimensions: 0,
            element_type,
        })) if accepts.contains(&element_type) => Ok(element),
        VerificationType::Object(_) => Err(VerifierErrorKind::InvalidType),
        _ => Err(VerifierErrorKind::NotArrayType),
    }
}

fn replace_all<C: Eq + Clone, U: Eq + Clone>(
    offset_vec: &mut OffsetVec<VerificationType<C, U>>,
    original: &VerificationType<C, U>,
    updated: &VerificationType<C, U>,
) {
    let mut replaced: OffsetVec<VerificationType<C, U>> = offset_vec
        .values()
        .map(|ty| if ty == original { updated.clone() } else { ty.clone() })
        .collect();

    std::mem::swap(offset_vec, &mut replaced);
}

fn get_local(locals: &OffsetVec<VType>, offset: u16) -> Result<VType, VerifierErrorKind> {
    locals
        .get_offset(Offset(offset as usize))
        .ok()
        .cloned()
        .ok_or(VerifierErrorKind::InvalidIndex)
}

fn get_local_expecting_type(
    locals: &OffsetVec<VType>,
    offset: u16,
    expected_type: VType,
) -> Result<(), VerifierErrorKind> {
    if get_local(locals, offset)? == expected_type {
        Ok(())
    } else {
        Err(VerifierErrorKind::InvalidType)
    }
}

/// Store a new type into a local variable slot
///
/// Slots between the current end of the locals and `offset` are padded with `Top`. Overwriting
/// either half of a `long` or `double` leaves the other half as `Top`.
fn assign_local(locals: &mut OffsetVec<VType>, offset: u16, new_type: VType) {
    let offset = offset as usize;
    let width = new_type.width();

    // One entry per slot, `None` for the second half of a wide value
    let mut slots: Vec<Option<VType>> = vec![];
    for ty in locals.values() {
        slots.push(Some(ty.clone()));
        if ty.width() == 2 {
            slots.push(None);
        }
    }
    while slots.len() < offset + width {
        slots.push(Some(VerificationType::Top));
    }

    if offset > 0 && slots[offset].is_none() {
        slots[offset - 1] = Some(VerificationType::Top);
    }
    let last = offset + width - 1;
    if matches!(&slots[last], Some(ty) if ty.width() == 2) {
        slots[last + 1] = Some(VerificationType::Top);
    }

    slots[offset] = Some(new_type);
    if width == 2 {
        slots[offset + 1] = None;
    }

    *locals = slots.into_iter().flatten().collect();
}

fn pop_offset_vec(stack: &mut OffsetVec<VType>) -> Result<VType, VerifierErrorKind> {
    stack
        .pop()
        .map(|(_, _, typ)| typ)
        .ok_or(VerifierErrorKind::EmptyStack)
}

fn pop_offset_vec_expecting_width(
    stack: &mut OffsetVec<VType>,
    expected_width: usize,
) -> Result<VType, VerifierErrorKind> {
    let typ = pop_offset_vec(stack)?;
    let found_width = typ.width();
    if found_width == expected_width {
        Ok(typ)
    } else {
        Err(VerifierErrorKind::InvalidWidth(found_width))
    }
}

fn pop_offset_vec_expecting_type<'g>(
    stack: &mut OffsetVec<VType>,
    expected_type: VType,
    class_graph: &'g ClassGraph<'g>,
) -> Result<(), VerifierErrorKind> {
    let typ = pop_offset_vec(stack)?;
    if expected_type.is_reference() {
        check_assignable(&typ, &expected_type, class_graph)
    } else if typ == expected_type {
        Ok(())
    } else {
        Err(VerifierErrorKind::InvalidType)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_graph::ClassGraphArenas;
    use crate::jvm::code::Instruction::*;
    use crate::jvm::decls::{ClassRef, MethodRef};
    use crate::jvm::class_file::{ConstantIndex, SerializableVerificationType};
    use crate::jvm::types::JvmType;
    use crate::jvm::Name;
    use VerificationType::*;

    fn new_frame(locals: Vec<VType>, stack: Vec<VType>) -> VerifierFrame {
        Frame {
            locals: locals.into_iter().collect(),
            stack: stack.into_iter().collect(),
        }
    }

    fn string() -> VType {
        Object(RefType::Object(BinaryName::STRING))
    }

    #[test]
    fn arithmetic() {
        let class_graph_arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&class_graph_arenas);
        class_graph.insert_java_library_types().unwrap();
        let my_class = RefType::Object(BinaryName::from_str("MyClass").unwrap());

        let binops = [
            (Integer, vec![IAdd, ISub, IDiv, IMul, IRem, IAnd, IOr, IXor]),
            (Long, vec![LAdd, LSub, LDiv, LMul, LRem, LAnd, LOr, LXor]),
            (Float, vec![FAdd, FSub, FDiv, FMul, FRem]),
            (Double, vec![DAdd, DSub, DDiv, DMul, DRem]),
        ];

        for (good_typ, instructions) in binops {
            for instruction in instructions {
                for typ in [Integer, Long, Float, Double, Null, UninitializedThis] {
                    let mut frame_in = new_frame(vec![], vec![typ.clone(), typ.clone()]);
                    let result = frame_in.verify_instruction(
                        &instruction,
                        Offset(0),
                        &class_graph,
                        &my_class,
                    );
                    if typ == good_typ {
                        assert!(result.is_ok(), "Verification of {}", instruction);
                        assert_eq!(frame_in, new_frame(vec![], vec![typ]));
                    } else {
                        assert_eq!(
                            result,
                            Err(VerifierErrorKind::InvalidType),
                            "Verification of {}",
                            instruction
                        );
                    }
                }

                // Try with a stack that is too small
                let mut frame_in = new_frame(vec![], vec![good_typ.clone()]);
                assert_eq!(
                    frame_in.verify_instruction(&instruction, Offset(0), &class_graph, &my_class),
                    Err(VerifierErrorKind::EmptyStack),
                    "Verification of {}",
                    instruction
                );
            }
        }
    }

    #[test]
    fn locals_are_assigned_on_store() {
        let class_graph_arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&class_graph_arenas);
        class_graph.insert_java_library_types().unwrap();
        let my_class = RefType::Object(BinaryName::from_str("MyClass").unwrap());

        // Storing past the end pads with `Top`
        let mut frame = new_frame(vec![], vec![Long]);
        frame
            .verify_instruction(&LStore(1), Offset(0), &class_graph, &my_class)
            .unwrap();
        assert_eq!(frame, new_frame(vec![Top, Long], vec![]));

        // `Top` can't be loaded
        let mut copy = frame.clone();
        assert_eq!(
            copy.verify_instruction(&ALoad(0), Offset(0), &class_graph, &my_class),
            Err(VerifierErrorKind::InvalidType)
        );

        // Clobbering the second half of the `long` kills it
        frame.stack.push(Integer);
        frame
            .verify_instruction(&IStore(2), Offset(0), &class_graph, &my_class)
            .unwrap();
        assert_eq!(frame, new_frame(vec![Top, Top, Integer], vec![]));

        frame
            .verify_instruction(&IInc(2, 1), Offset(0), &class_graph, &my_class)
            .unwrap();
        assert_eq!(
            frame.verify_instruction(&IInc(1, 1), Offset(0), &class_graph, &my_class),
            Err(VerifierErrorKind::InvalidType)
        );
        assert_eq!(
            frame.verify_instruction(&ILoad(7), Offset(0), &class_graph, &my_class),
            Err(VerifierErrorKind::InvalidIndex)
        );
    }

    #[test]
    fn invocations() {
        let class_graph_arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&class_graph_arenas);
        class_graph.insert_java_library_types().unwrap();
        let my_class = RefType::Object(BinaryName::from_str("MyClass").unwrap());

        let length = MethodRef::new(
            ClassRef::raw_interface(BinaryName::CHARSEQUENCE),
            "length",
            false,
            crate::jvm::decls::MethodSignature::new().returns(JvmType::INT),
        )
        .unwrap();
        let invoke = Invoke(length.invoke_type(), length.clone());

        // `String` implements `CharSequence`
        let mut frame = new_frame(vec![], vec![string()]);
        frame
            .verify_instruction(&invoke, Offset(0), &class_graph, &my_class)
            .unwrap();
        assert_eq!(frame, new_frame(vec![], vec![Integer]));

        // `Integer` does not
        let mut frame = new_frame(vec![], vec![Object(RefType::Object(BinaryName::INTEGER))]);
        assert!(matches!(
            frame.verify_instruction(&invoke, Offset(0), &class_graph, &my_class),
            Err(VerifierErrorKind::IncompatibleTypes { .. })
        ));

        // Missing receiver
        let mut frame = new_frame(vec![], vec![]);
        assert_eq!(
            frame.verify_instruction(&invoke, Offset(0), &class_graph, &my_class),
            Err(VerifierErrorKind::EmptyStack)
        );
    }

    #[test]
    fn constructors_initialize_every_copy() {
        let class_graph_arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&class_graph_arenas);
        class_graph.insert_java_library_types().unwrap();
        let my_class = RefType::Object(BinaryName::from_str("MyClass").unwrap());
        let object = RefType::Object(BinaryName::OBJECT);

        let mut frame = new_frame(vec![], vec![]);
        frame
            .verify_instruction(&New(object.clone()), Offset(3), &class_graph, &my_class)
            .unwrap();
        frame
            .verify_instruction(&Dup, Offset(6), &class_graph, &my_class)
            .unwrap();
        let uninit = Uninitialized(UninitializedRefType {
            verification_type: object.clone(),
            new_offset: Offset(3),
        });
        assert_eq!(frame, new_frame(vec![], vec![uninit.clone(), uninit]));

        let init = MethodRef::constructor(ClassRef::raw(BinaryName::OBJECT), vec![]).unwrap();
        frame
            .verify_instruction(
                &Invoke(InvokeType::Special, init),
                Offset(7),
                &class_graph,
                &my_class,
            )
            .unwrap();
        assert_eq!(frame, new_frame(vec![], vec![Object(object)]));
    }

    #[test]
    fn returns() {
        let class_graph_arenas = ClassGraphArenas::new();
        let class_graph = ClassGraph::new(&class_graph_arenas);
        class_graph.insert_java_library_types().unwrap();
        let returns_char_sequence = Some(FieldType::object(BinaryName::CHARSEQUENCE));
        let areturn: BranchInstruction<(), ()> = BranchInstruction::AReturn;
        let ret: BranchInstruction<(), ()> = BranchInstruction::Return;

        let mut frame = new_frame(vec![], vec![string()]);
        frame
            .verify_branch_instruction(&areturn, &returns_char_sequence, &class_graph)
            .unwrap();

        // Extra values left on the stack
        let mut frame = new_frame(vec![], vec![Integer, string()]);
        assert!(matches!(
            frame.verify_branch_instruction(&areturn, &returns_char_sequence, &class_graph),
            Err(VerifierErrorKind::BadReturn { .. })
        ));

        // Wrong kind of return
        let mut frame = new_frame(vec![], vec![]);
        assert_eq!(
            frame.verify_branch_instruction(&ret, &returns_char_sequence, &class_graph),
            Err(VerifierErrorKind::BadReturn {
                expected: String::from("java/lang/CharSequence"),
                found: String::from("[]"),
            })
        );

        let mut frame = new_frame(vec![], vec![Integer]);
        assert_eq!(
            frame.verify_branch_instruction(&ret, &None, &class_graph),
            Err(VerifierErrorKind::BadReturn {
                expected: String::from("void"),
                found: String::from("[int]"),
            })
        );
    }

    #[test]
    fn compact_frames() {
        let object = VerificationType::Object(ClassConstantIndex(ConstantIndex(3)));
        let frame = |locals: Vec<SerializableVerificationType>,
                     stack: Vec<SerializableVerificationType>| SerializableFrame {
            locals: locals.into_iter().collect(),
            stack: stack.into_iter().collect(),
        };
        let base = frame(vec![object, Integer], vec![]);

        assert_eq!(
            base.stack_map_frame(4, &base),
            StackMapFrame::SameLocalsNoStack { offset_delta: 4 }
        );
        assert_eq!(
            frame(vec![object], vec![]).stack_map_frame(4, &base),
            StackMapFrame::ChopLocalsNoStack {
                offset_delta: 4,
                chopped_k: 1
            }
        );
        assert_eq!(
            frame(vec![object, Integer, Long], vec![]).stack_map_frame(4, &base),
            StackMapFrame::AppendLocalsNoStack {
                offset_delta: 4,
                locals: vec![Long]
            }
        );
        assert_eq!(
            frame(vec![object, Integer], vec![Float]).stack_map_frame(4, &base),
            StackMapFrame::SameLocalsOneStack {
                offset_delta: 4,
                stack: Float
            }
        );
        assert_eq!(
            frame(vec![Integer], vec![Float]).stack_map_frame(4, &base),
            StackMapFrame::Full {
                offset_delta: 4,
                locals: vec![Integer],
                stack: vec![Float]
            }
        );
    }

    #[test]
    fn display() {
        let frame = new_frame(vec![string(), Long], vec![Null]);
        assert_eq!(frame.to_string(), "locals [java/lang/String, long] stack [null]");
    }
}
