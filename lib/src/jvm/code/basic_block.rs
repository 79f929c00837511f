use crate::jvm::code::{BranchInstruction, SerializableInstruction, SynLabel};
use crate::jvm::verifier::VerifierFrame;
use crate::util::{Offset, OffsetVec, Width};
use std::collections::HashMap;

/// Block as recorded by the code builder: operands are already interned, but the entry frame is
/// kept symbolic so that frames at labels can be compared
pub type BuiltBasicBlock =
    BasicBlock<VerifierFrame, SerializableInstruction, BranchInstruction<SynLabel, SynLabel>>;

/// A JVM method code body is made up of a linear sequence of basic blocks.
///
/// We also store some extra information that ultimately allows us to compute things like: the
/// maximum height of the locals, the maximum height of the stack, and the stack map frames.
#[derive(Debug, Clone)]
pub struct BasicBlock<Frame, Insn, BrInsn> {
    /// Frame at the start of the block
    pub frame: Frame,

    /// Straight-line instructions in the block
    pub instructions: OffsetVec<Insn>,

    /// Branch instruction to close the block
    pub branch_end: BrInsn,
}

impl<Frame, Insn: Width, BrInsn: Width> Width for BasicBlock<Frame, Insn, BrInsn> {
    fn width(&self) -> usize {
        self.instructions.offset_len().0 + self.branch_end.width()
    }
}

impl<Frame, Insn: Width, BrInsn: Width> BasicBlock<Frame, Insn, BrInsn> {
    /// Given blocks in layout order, compute the offset of every basic block with respect to the
    /// start of the method.
    pub fn compute_block_offsets(
        blocks: &[(SynLabel, BasicBlock<Frame, Insn, BrInsn>)],
    ) -> HashMap<SynLabel, Offset> {
        let mut block_offsets: HashMap<SynLabel, Offset> = HashMap::new();
        let mut offset = Offset(0);
        for (block_lbl, block) in blocks {
            block_offsets.insert(*block_lbl, offset);
            offset.0 += block.width();
        }
        block_offsets
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::jvm::code::{Instruction, LabelGenerator, SynLabelGenerator};

    #[test]
    fn offsets_follow_layout() {
        let mut labels = SynLabelGenerator::new(SynLabel::START);
        let (l0, l1, l2) = (
            labels.fresh_label(),
            labels.fresh_label(),
            labels.fresh_label(),
        );

        let block = |insns: Vec<SerializableInstruction>, end| BasicBlock {
            frame: (),
            instructions: insns.into_iter().collect(),
            branch_end: end,
        };
        let blocks = vec![
            (
                l0,
                block(
                    vec![Instruction::IConst0, Instruction::BiPush(9)],
                    BranchInstruction::FallThrough(l1),
                ),
            ),
            (
                l1,
                block(vec![Instruction::ILoad(300)], BranchInstruction::Goto(l0)),
            ),
            (l2, block(vec![], BranchInstruction::Return)),
        ];

        let offsets = BasicBlock::compute_block_offsets(&blocks);
        assert_eq!(offsets[&l0], Offset(0));
        assert_eq!(offsets[&l1], Offset(3));
        assert_eq!(offsets[&l2], Offset(3 + 4 + 3));
    }
}
