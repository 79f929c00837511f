use crate::jvm::class_file::{ConstantsPool, ConstantsWriter};
use crate::jvm::class_graph::ClassGraph;
use crate::jvm::code::{
    BasicBlock, BranchInstruction, BuiltBasicBlock, Code, Instruction, LabelGenerator,
    LocalVariableRange, SerializableInstruction, SynLabel, SynLabelGenerator, VerifierInstruction,
};
use crate::jvm::types::{FieldType, MethodDescriptor, RefType};
use crate::jvm::verifier::*;
use crate::jvm::{BinaryName, Error, UnqualifiedName, VerifierErrorKind};
use crate::util::{Offset, OffsetVec, Width};
use std::collections::HashMap;
use std::convert::Infallible;

/// This provides a very slightly simplified interface for building up method bodies. It does
/// internal bookeeping to track frames, labels, reachability, etc.
///
/// Every instruction is verified against the current frame before it is accepted, and its
/// constant pool operands are interned immediately. An instruction that fails verification leaves
/// the builder exactly as it was.
///
/// ### Constructing verification frames
///
/// Normally, figuring out what the right frame types are is a fixpoint iterative process, since
/// blocks jumping to the same frame need to have their output frames merged and then that
/// information must be propagated further backwards through the CFG. We avoid this and instead
/// compute our final frames right from the start. The tradeoff here is that instead of merging
/// frames, we require the frames be completely identical. Code that needs a more general type at
/// a join point can `checkcast` before jumping.
///
/// ### Tracking reachability
///
/// The JVM verifier doesn't detect and ignore dead bytecode; it still wants stackmaps for it. We
/// enforce that labels cannot be placed unless they are reachable (either with a fall-through
/// from above, or there has already been a jump to the label). This is also important for the
/// sake of always being able to find the initial frame of the block.
pub struct CodeBuilder<'g> {
    /// Closed blocks, in layout order
    blocks: Vec<(SynLabel, BuiltBasicBlock)>,

    /// Index in `blocks` of every placed label
    placed_labels: HashMap<SynLabel, usize>,

    /// Labels which have been referenced in blocks so far, but not placed yet (keys do not overlap
    /// with keys of `placed_labels`)
    unplaced_labels: HashMap<SynLabel, VerifierFrame>,

    /// Block currently under construction (label is not in `placed_labels` _or_ `unplaced_labels`)
    current_block: Option<CurrentBlock>,

    label_generator: SynLabelGenerator,

    /// Offset of the current block from the start of the method
    block_start: Offset,

    max_locals: Offset,
    max_stack: Offset,

    /// Instructions accepted so far (branches included)
    instruction_count: usize,

    line_numbers: Vec<(Offset, u16)>,

    /// Named locals whose scope is still open (their `end` isn't meaningful yet)
    open_local_variables: Vec<LocalVariableRange>,

    /// Named locals whose scope has ended
    local_variables: Vec<LocalVariableRange>,

    /// Class graph
    pub class_graph: &'g ClassGraph<'g>,

    /// Class declaring the method
    this_class: RefType<BinaryName>,

    /// Return type of the method
    return_type: Option<FieldType<BinaryName>>,
}

impl<'g> CodeBuilder<'g> {
    /// Create a builder for a new method
    pub fn new(
        class_graph: &'g ClassGraph<'g>,
        this_class: &BinaryName,
        descriptor: &MethodDescriptor<BinaryName>,
        is_static: bool,
        is_constructor: bool,
    ) -> Self {
        let this_class = RefType::Object(this_class.clone());

        // The initial local variables are just the parameters (including maybe "this")
        let mut locals = OffsetVec::new();
        if is_constructor {
            locals.push(VerificationType::UninitializedThis);
        } else if !is_static {
            locals.push(VerificationType::Object(this_class.clone()));
        }
        for arg_type in &descriptor.parameters {
            locals.push(VerificationType::from(arg_type.clone()));
        }

        let max_locals = locals.offset_len();
        let entry_frame = Frame {
            locals,
            stack: OffsetVec::new(),
        };

        let mut label_generator = SynLabelGenerator::new(SynLabel::START);
        let current_block = Some(CurrentBlock::new(
            label_generator.fresh_label(),
            entry_frame,
        ));

        CodeBuilder {
            blocks: vec![],
            placed_labels: HashMap::new(),
            unplaced_labels: HashMap::new(),
            current_block,
            label_generator,
            block_start: Offset(0),
            max_locals,
            max_stack: Offset(0),
            instruction_count: 0,
            line_numbers: vec![],
            open_local_variables: vec![],
            local_variables: vec![],
            class_graph,
            this_class,
            return_type: descriptor.return_type.clone(),
        }
    }

    /// Check that the code ends with a return, jump, or throw, and that every label referenced
    /// was placed
    pub fn check_finished(&self) -> Result<(), Error> {
        if self.current_block.is_some() || !self.unplaced_labels.is_empty() {
            let mut unplaced_labels: Vec<SynLabel> =
                self.unplaced_labels.keys().cloned().collect();
            unplaced_labels.sort();
            return Err(Error::MethodCodeNotFinished {
                pending_block: self
                    .current_block
                    .as_ref()
                    .map(|current_block| current_block.label),
                unplaced_labels,
            });
        }
        Ok(())
    }

    /// Turn the builder into the method code
    pub fn result(mut self) -> Result<Code, Error> {
        self.check_finished()?;
        self.close_local_variables(Offset(0));
        Ok(Code {
            max_locals: self.max_locals,
            max_stack: self.max_stack,
            blocks: self.blocks,
            line_numbers: self.line_numbers,
            local_variables: self.local_variables,
        })
    }

    /// Number of instructions accepted so far
    pub fn instruction_count(&self) -> usize {
        self.instruction_count
    }

    /// Is there a block open for new instructions?
    pub fn is_reachable(&self) -> bool {
        self.current_block.is_some()
    }

    /// Get the current frame
    pub fn current_frame(&self) -> Option<&VerifierFrame> {
        self.current_block
            .as_ref()
            .map(|current_block| &current_block.latest_frame)
    }

    /// Offset of the next instruction from the start of the method
    fn current_offset(&self) -> Option<Offset> {
        self.current_block
            .as_ref()
            .map(|block| Offset(self.block_start.0 + block.instructions.offset_len().0))
    }

    /// Offset the next instruction will get, even if it has to wait for a label
    fn next_offset(&self) -> Offset {
        self.current_offset().unwrap_or(self.block_start)
    }

    /// Query the expected frame for a label that has already been referred to and possibly even
    /// jumped to
    pub fn lookup_frame(&self, label: SynLabel) -> Option<&VerifierFrame> {
        // The block is already placed
        if let Some(idx) = self.placed_labels.get(&label) {
            return self.blocks.get(*idx).map(|(_, block)| &block.frame);
        }

        // The block is only referred to
        if let Some(frame) = self.unplaced_labels.get(&label) {
            return Some(frame);
        }

        // The block is the one we are currently processing
        if let Some(current_block) = self.current_block.as_ref().filter(|b| b.label == label) {
            return Some(&current_block.entry_frame);
        }

        None
    }

    /// Check that a label either has no frame yet or has exactly the given frame
    fn check_frame_for_label(
        &self,
        label: SynLabel,
        found: &VerifierFrame,
    ) -> Result<(), VerifierErrorKind> {
        match self.lookup_frame(label) {
            Some(expected) if expected != found => Err(VerifierErrorKind::IncompatibleFrames {
                label,
                expected: expected.to_string(),
                found: found.to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Start tracking the frame of a label if it isn't already known
    fn record_frame_for_label(&mut self, label: SynLabel, frame: &VerifierFrame) {
        if self.lookup_frame(label).is_none() {
            self.unplaced_labels.insert(label, frame.clone());
        }
    }

    /// Generate a fresh label
    pub fn fresh_label(&mut self) -> SynLabel {
        self.label_generator.fresh_label()
    }

    /// Record that the next instruction starts a new source line
    pub fn line_number(&mut self, line: u16) {
        if let Some(offset) = self.current_offset() {
            match self.line_numbers.last_mut() {
                Some((last_offset, last_line)) if *last_offset == offset => *last_line = line,
                _ => self.line_numbers.push((offset, line)),
            }
        }
    }

    /// Push a new instruction to the current block
    pub fn push_instruction(
        &mut self,
        insn: VerifierInstruction,
        constants: &mut ConstantsPool,
    ) -> Result<(), Error> {
        let position = self.instruction_count;
        let insn_offset = self.current_offset();
        let (current_block, insn_offset) = match (self.current_block.as_mut(), insn_offset) {
            (Some(current_block), Some(insn_offset)) => (current_block, insn_offset),
            _ => {
                return Err(Error::StackTypeError {
                    position,
                    instruction: insn.to_string(),
                    kind: VerifierErrorKind::UnreachableCode,
                })
            }
        };

        let mut frame = current_block.latest_frame.clone();
        frame
            .verify_instruction(&insn, insn_offset, self.class_graph, &self.this_class)
            .map_err(|kind| Error::StackTypeError {
                position,
                instruction: insn.to_string(),
                kind,
            })?;

        let serializable: SerializableInstruction = insn.map(
            constants,
            |constants, class| class.constant_index(constants),
            |constants, constant| constant.constant_index(constants),
            |constants, field| field.constant_index(constants),
            |constants, method| method.constant_index(constants),
        )?;

        // The width must not change if the pool is compacted later
        let serializable = match serializable {
            Instruction::Ldc(index) if index.0 > u8::MAX as u16 => Instruction::LdcW(index),
            other => other,
        };

        log::trace!("#{} {} -> {}", position, insn, frame);
        frame.update_maximums(&mut self.max_locals, &mut self.max_stack);
        current_block.latest_frame = frame;
        current_block.instructions.push(serializable);
        self.instruction_count += 1;
        Ok(())
    }

    /// Push a new branch instruction to close the current block and possibly open a new one
    pub fn push_branch_instruction(
        &mut self,
        insn: BranchInstruction<SynLabel, ()>,
    ) -> Result<(), Error> {
        let position = self.instruction_count;
        let mut frame = match self.current_frame() {
            Some(frame) => frame.clone(),
            None => {
                return Err(Error::StackTypeError {
                    position,
                    instruction: insn.to_string(),
                    kind: VerifierErrorKind::UnreachableCode,
                })
            }
        };

        frame
            .verify_branch_instruction(&insn, &self.return_type, self.class_graph)
            .map_err(|kind| match kind {
                VerifierErrorKind::BadReturn { expected, found } => Error::ReturnTypeMismatch {
                    position,
                    expected,
                    found,
                },
                kind => Error::StackTypeError {
                    position,
                    instruction: insn.to_string(),
                    kind,
                },
            })?;

        // Check that the jump target (if there is one) has a compatible frame
        if let Some(jump_label) = insn.jump_target() {
            self.check_frame_for_label(jump_label, &frame)
                .map_err(|kind| Error::StackTypeError {
                    position,
                    instruction: insn.to_string(),
                    kind,
                })?;
            self.record_frame_for_label(jump_label, &frame);
        }

        log::trace!("#{} {} -> {}", position, insn, frame);
        frame.update_maximums(&mut self.max_locals, &mut self.max_stack);
        let next_label = self.fresh_label();
        let branch_end: BranchInstruction<SynLabel, SynLabel> = insn
            .map_labels(|lbl| Ok(*lbl), |_| Ok(next_label))
            .unwrap_or_else(|never: Infallible| match never {});
        self.close_current_block(branch_end, frame)?;
        self.instruction_count += 1;
        Ok(())
    }

    /// Start a new block with the given label, ending the current block (if there is one) with a
    /// fallthrough. This can fail if:
    ///
    ///   * the label was already placed
    ///   * the label was already jumped to from elsewhere, and the frames don't match
    ///   * the label was not ever been jumped to and there is no fallthrough (so we have no way of
    ///     inferring the expected frame)
    ///
    pub fn place_label(&mut self, label: SynLabel) -> Result<(), Error> {
        let is_current = matches!(&self.current_block, Some(block) if block.label == label);
        if self.placed_labels.contains_key(&label) || is_current {
            return Err(Error::DuplicateLabel(label));
        }

        if let Some(frame) = self.current_frame().cloned() {
            self.check_frame_for_label(label, &frame)
                .map_err(|kind| Error::StackTypeError {
                    position: self.instruction_count,
                    instruction: format!("{:?}:", label),
                    kind,
                })?;
            let _ = self.unplaced_labels.remove(&label);
            self.close_current_block(BranchInstruction::FallThrough(label), frame)?;
        } else {
            // Find the frame
            let frame: VerifierFrame = self
                .unplaced_labels
                .remove(&label)
                .ok_or(Error::PlacingLabelBeforeReference(label))?;

            self.current_block = Some(CurrentBlock::new(label, frame));
        }

        Ok(())
    }

    /// Like `place_label`, but specifies an explicit frame. This rules out the failure mode of
    /// `place_label` for when there is no way of inferring the expected frame.
    pub fn place_label_with_frame(
        &mut self,
        label: SynLabel,
        frame: &VerifierFrame,
    ) -> Result<(), Error> {
        self.check_frame_for_label(label, frame)
            .map_err(|kind| Error::StackTypeError {
                position: self.instruction_count,
                instruction: format!("{:?}:", label),
                kind,
            })?;
        let inserted = self.lookup_frame(label).is_none();
        self.record_frame_for_label(label, frame);
        let result = self.place_label(label);
        if result.is_err() && inserted {
            let _ = self.unplaced_labels.remove(&label);
        }
        result
    }

    /// Forget local variables from `offset` onwards (eg. when a scope ends)
    pub fn truncate_locals(&mut self, offset: Offset) {
        if let Some(current_block) = self.current_block.as_mut() {
            current_block.latest_frame.truncate_locals(offset);
        }
        self.close_local_variables(offset);
    }

    /// Name the local at `index` from the next instruction onwards, until the locals are
    /// truncated below it or the code ends
    pub fn open_local_variable(
        &mut self,
        name: UnqualifiedName,
        descriptor: FieldType<BinaryName>,
        index: Offset,
    ) {
        let start = self.next_offset();
        self.open_local_variables.push(LocalVariableRange {
            name,
            descriptor,
            index,
            start,
            end: start,
        });
    }

    /// End the range of every named local from `offset` onwards at the next instruction
    fn close_local_variables(&mut self, offset: Offset) {
        let end = self.next_offset();
        let (closed, open): (Vec<_>, Vec<_>) = std::mem::take(&mut self.open_local_variables)
            .into_iter()
            .partition(|local| local.index >= offset);
        self.open_local_variables = open;

        // Locals that never covered an instruction are left out
        for mut local in closed.into_iter().rev() {
            if end > local.start {
                local.end = end;
                self.local_variables.push(local);
            }
        }
    }

    /// Seal the current block, opening the next one if the branch falls through
    fn close_current_block(
        &mut self,
        branch_end: BranchInstruction<SynLabel, SynLabel>,
        latest_frame: VerifierFrame,
    ) -> Result<(), Error> {
        let current_block = match self.current_block.take() {
            Some(current_block) => current_block,
            None => return Ok(()),
        };
        let fallthrough_target = branch_end.fallthrough_target();

        let basic_block = BasicBlock {
            frame: current_block.entry_frame,
            instructions: current_block.instructions,
            branch_end,
        };
        self.block_start.0 += basic_block.width();
        if self
            .placed_labels
            .insert(current_block.label, self.blocks.len())
            .is_some()
        {
            return Err(Error::DuplicateLabel(current_block.label));
        }
        self.blocks.push((current_block.label, basic_block));

        // Construct a next current block only if there is a fall-through
        self.current_block =
            fallthrough_target.map(|label| CurrentBlock::new(label, latest_frame));
        Ok(())
    }
}

/// Just like `BasicBlock`, but not closed off yet
struct CurrentBlock {
    label: SynLabel,

    /// State of the frame at the start of `instructions`
    entry_frame: VerifierFrame,

    /// Tracks the state of the frame at the end of `instructions`
    latest_frame: VerifierFrame,

    /// Accumulated instructions
    instructions: OffsetVec<SerializableInstruction>,
}

impl CurrentBlock {
    /// New block starting with a given frame
    fn new(label: SynLabel, entry_frame: VerifierFrame) -> CurrentBlock {
        CurrentBlock {
            label,
            latest_frame: entry_frame.clone(),
            entry_frame,
            instructions: OffsetVec::new(),
        }
    }
}
