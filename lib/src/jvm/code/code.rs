use crate::jvm::class_file;
use crate::jvm::class_file::{
    ClassConstantIndex, ConstantIndex, ConstantsPool, FieldRefConstantIndex, LineNumber,
    LocalVariable, MethodRefConstantIndex, Serialize,
};
use crate::jvm::code::{BasicBlock, BuiltBasicBlock, SynLabel};
use crate::jvm::types::{FieldType, RenderDescriptor};
use crate::jvm::verifier::SerializableFrame;
use crate::jvm::{BinaryName, Error, Name, Settings, UnqualifiedName};
use crate::util::{Offset, Width};
use std::collections::{HashMap, HashSet};
use std::convert::{Infallible, TryFrom};

/// Method body produced by [`super::CodeBuilder`]
///
/// Everything has already been verified, so all that is left is laying out the bytes and
/// computing the stack map table.
#[derive(Debug, Clone)]
pub struct Code {
    /// Maximum size of locals through the method
    pub max_locals: Offset,

    /// Maximum size of stack through the method
    pub max_stack: Offset,

    /// Basic blocks in layout order, the first one being [`SynLabel::START`]
    pub blocks: Vec<(SynLabel, BuiltBasicBlock)>,

    /// Source line numbers, keyed by the offset of the first instruction on the line
    pub line_numbers: Vec<(Offset, u16)>,

    /// Named locals, in the order their scopes ended
    pub local_variables: Vec<LocalVariableRange>,
}

/// Where in the code a named local variable is live
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalVariableRange {
    pub name: UnqualifiedName,
    pub descriptor: FieldType<BinaryName>,
    pub index: Offset,

    /// Offset of the first instruction in scope
    pub start: Offset,

    /// Offset just past the last instruction in scope
    pub end: Offset,
}

impl Code {
    /// Number of bytes the code array will take
    pub fn code_length(&self) -> usize {
        self.blocks.iter().map(|(_, block)| block.width()).sum()
    }

    /// Every constant pool index used as an instruction operand
    pub fn constant_operands(&self) -> Vec<ConstantIndex> {
        fn record<I: Into<ConstantIndex> + Copy>(
            operands: &mut Vec<ConstantIndex>,
            index: &I,
        ) -> Result<(), Infallible> {
            operands.push((*index).into());
            Ok(())
        }

        let mut operands = vec![];
        for (_, block) in &self.blocks {
            for insn in block.instructions.values() {
                let _ = insn
                    .map(&mut operands, record, record, record, record)
                    .unwrap_or_else(|never| match never {});
            }
        }
        operands
    }

    /// Point instruction operands at the new indices after the constant pool was compacted
    ///
    /// Compaction only moves constants down and `ldc_w` stays wide, so no instruction changes
    /// width and every offset recorded so far stays valid.
    pub fn renumber_constants(&mut self, renumbered: &HashMap<ConstantIndex, ConstantIndex>) {
        let get = |index: ConstantIndex| renumbered.get(&index).copied().unwrap_or(index);
        for (_, block) in &mut self.blocks {
            block.instructions = block
                .instructions
                .values()
                .map(|insn| {
                    insn.map(
                        &mut (),
                        |_, class| Ok(ClassConstantIndex(get(class.0))),
                        |_, constant| Ok(get(*constant)),
                        |_, field| Ok(FieldRefConstantIndex(get(field.0))),
                        |_, method| Ok(MethodRefConstantIndex(get(method.0))),
                    )
                    .unwrap_or_else(|never: Infallible| match never {})
                })
                .collect();
        }
    }

    /// Lay out the code array and attach a `StackMapTable` (plus `LineNumberTable` and
    /// `LocalVariableTable`, if the settings ask for them)
    pub fn serialize_code(
        &self,
        constants_pool: &mut ConstantsPool,
        settings: &Settings,
    ) -> Result<class_file::Code, Error> {
        let max_locals = u16::try_from(self.max_locals.0)
            .map_err(|_| Error::MethodCodeMaxLocalsOverflow(self.max_locals))?;
        let max_stack = u16::try_from(self.max_stack.0)
            .map_err(|_| Error::MethodCodeMaxStackOverflow(self.max_stack))?;

        let label_offsets: HashMap<SynLabel, Offset> =
            BasicBlock::compute_block_offsets(&self.blocks);
        let jump_targets: HashSet<SynLabel> = self
            .blocks
            .iter()
            .filter_map(|(_, block)| block.branch_end.jump_target())
            .collect();

        let code_length = self.code_length();
        if code_length == 0 || code_length > u16::MAX as usize {
            return Err(Error::MethodCodeOverflow(Offset(code_length)));
        }

        let mut code_array = class_file::BytecodeArray(Vec::with_capacity(code_length));
        let mut frames: Vec<(Offset, SerializableFrame)> = vec![];
        let mut implicit_frame: Option<SerializableFrame> = None;

        for (block_label, block) in &self.blocks {
            let block_offset = label_offsets[block_label];

            if implicit_frame.is_none() {
                implicit_frame = Some(block.frame.into_serializable(constants_pool)?);
            }

            // If this block is ever jumped to, construct a stack map frame for it
            if jump_targets.contains(block_label) {
                frames.push((block_offset, block.frame.into_serializable(constants_pool)?));
            }

            for insn in block.instructions.values() {
                insn.serialize(&mut code_array.0)?;
            }

            let branch_offset = block_offset.0 + block.instructions.offset_len().0;
            let end_insn = block.branch_end.map_labels(
                |lbl: &SynLabel| {
                    let target = label_offsets
                        .get(lbl)
                        .ok_or(Error::PlacingLabelBeforeReference(*lbl))?;
                    i16::try_from(target.0 as i64 - branch_offset as i64)
                        .map_err(|_| Error::MethodCodeOverflow(Offset(code_length)))
                },
                |_| Ok(()),
            )?;
            end_insn.serialize(&mut code_array.0)?;
        }

        let mut attributes = vec![];

        // Add `StackMapTable` attribute only if there are frames
        if let Some(implicit_frame) = implicit_frame {
            let stack_map_frames = stack_map_frames(implicit_frame, frames);
            if !stack_map_frames.is_empty() {
                let stack_map_table = class_file::StackMapTable(stack_map_frames);
                attributes.push(constants_pool.get_attribute(stack_map_table)?);
            }
        }

        if settings.emit_line_numbers && !self.line_numbers.is_empty() {
            let line_numbers = self
                .line_numbers
                .iter()
                .map(|(offset, line_number)| LineNumber {
                    start_pc: offset.0 as u16,
                    line_number: *line_number,
                })
                .collect();
            let table = class_file::LineNumberTable(line_numbers);
            attributes.push(constants_pool.get_attribute(table)?);
        }

        if settings.emit_local_variables && !self.local_variables.is_empty() {
            let mut local_variables = vec![];
            for local in &self.local_variables {
                local_variables.push(LocalVariable {
                    start_pc: local.start.0 as u16,
                    length: (local.end.0 - local.start.0) as u16,
                    name_index: constants_pool.get_utf8(local.name.as_str())?,
                    descriptor_index: constants_pool.get_utf8(local.descriptor.render())?,
                    index: local.index.0 as u16,
                });
            }
            let table = class_file::LocalVariableTable(local_variables);
            attributes.push(constants_pool.get_attribute(table)?);
        }

        Ok(class_file::Code {
            max_stack,
            max_locals,
            code_array,
            attributes,
        })
    }
}

/// Delta-encode frames (sorted by offset) against the frame before them
fn stack_map_frames(
    implicit_frame: SerializableFrame,
    frames: Vec<(Offset, SerializableFrame)>,
) -> Vec<class_file::StackMapFrame> {
    let mut previous_frame = implicit_frame;
    let mut previous_offset: Option<Offset> = None;
    let mut stack_map_frames = vec![];

    for (offset, frame) in frames {
        let offset_delta = match previous_offset {
            None => offset.0,

            // Empty blocks share their offset with the block they fall into
            Some(previous) if previous == offset => continue,
            Some(previous) => offset.0 - previous.0 - 1,
        };
        stack_map_frames.push(frame.stack_map_frame(offset_delta as u16, &previous_frame));
        previous_frame = frame;
        previous_offset = Some(offset);
    }

    stack_map_frames
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::class_file::{SerializableVerificationType, StackMapFrame};
    use crate::jvm::verifier::VerificationType;
    use crate::util::OffsetVec;

    #[test]
    fn frame_offsets_are_delta_encoded() {
        let frame = |locals: Vec<SerializableVerificationType>| SerializableFrame {
            locals: locals.into_iter().collect(),
            stack: OffsetVec::new(),
        };
        let implicit = frame(vec![VerificationType::Integer]);
        let frames = vec![
            (Offset(5), frame(vec![VerificationType::Integer])),
            (Offset(5), frame(vec![VerificationType::Integer])),
            (Offset(9), frame(vec![])),
        ];

        assert_eq!(
            stack_map_frames(implicit, frames),
            vec![
                StackMapFrame::SameLocalsNoStack { offset_delta: 5 },
                StackMapFrame::ChopLocalsNoStack {
                    offset_delta: 3,
                    chopped_k: 1
                },
            ]
        );
    }
}
