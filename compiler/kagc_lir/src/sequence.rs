// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

//! The flattened instruction stream of one compilation unit.

use std::collections::BTreeSet;
use std::fmt;

use indexmap::IndexMap;
use itertools::Itertools;
use kagc_errors::{InternalResult, InvariantViolation};
use kagc_graph::{Graph, NodeId};
use kagc_schedule::{BasicBlock, BlockId, Schedule};
use kagc_target::linkage::Linkage;
use log::{debug, trace};

use crate::constant::Constant;
use crate::frame_state::{FrameStateDescriptor, StateId};
use crate::instruction::{GapPosition, Instruction};
use crate::operand::Operand;
use crate::pointer_map::PointerMap;
use crate::vreg::{VReg, VRegMapper};

/// Instructions of every block of a schedule, in RPO order, together with
/// the pools and tables the code emitter needs.
///
/// Every instruction added through [`InstructionSequence::add_instruction`]
/// comes with a gap: before it for control instructions, after it for
/// everything else.
#[derive(Debug)]
pub struct InstructionSequence<'g> {
    graph: &'g Graph,
    linkage: Linkage,
    schedule: Schedule,
    vregs: VRegMapper,

    /// Constant pool, keyed by the virtual register that holds the constant.
    constants: IndexMap<VReg, Constant>,
    immediates: Vec<Constant>,
    instructions: Vec<Instruction>,

    /// Positions of the instructions that own a pointer map.
    pointer_map_positions: Vec<usize>,

    references: BTreeSet<VReg>,
    doubles: BTreeSet<VReg>,
    frame_states: Vec<FrameStateDescriptor>
}

impl<'g> InstructionSequence<'g> {
    pub fn new(linkage: Linkage, graph: &'g Graph, schedule: Schedule) -> Self {
        Self {
            graph,
            linkage,
            schedule,
            vregs: VRegMapper::default(),
            constants: IndexMap::new(),
            immediates: vec![],
            instructions: Vec::with_capacity(graph.node_count() * 2),
            pointer_map_positions: vec![],
            references: BTreeSet::new(),
            doubles: BTreeSet::new(),
            frame_states: vec![]
        }
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn linkage(&self) -> &Linkage {
        &self.linkage
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Virtual register of `node`. The first call allocates it, later calls
    /// return the same register.
    pub fn get_virtual_register(&mut self, node: NodeId) -> VReg {
        self.vregs.get_or_create(node)
    }

    /// A register owned by no node.
    pub fn next_virtual_register(&mut self) -> VReg {
        self.vregs.next()
    }

    pub fn virtual_register_count(&self) -> usize {
        self.vregs.count()
    }

    pub fn basic_block_count(&self) -> usize {
        self.schedule.rpo_block_count()
    }

    /// Block at position `rpo` of the reverse post-order.
    pub fn block_at(&self, rpo: usize) -> Option<&BasicBlock> {
        self.schedule.rpo_order().get(rpo).map(|id| &self.schedule[*id])
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn instruction_count(&self) -> usize {
        self.instructions.len()
    }

    pub fn instruction_at(&self, index: usize) -> Option<&Instruction> {
        self.instructions.get(index)
    }

    pub fn instruction_at_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.instructions.get_mut(index)
    }

    pub fn is_gap_at(&self, index: usize) -> bool {
        self.instructions.get(index).is_some_and(Instruction::is_gap_moves)
    }

    fn block_mut(&mut self, block: BlockId) -> InternalResult<&mut BasicBlock> {
        self.schedule
            .get_block_by_id_mut(block)
            .ok_or(InvariantViolation::UnknownBlock { block: block.index() })
    }

    pub fn start_block(&mut self, block: BlockId) -> InternalResult<()> {
        let start = self.instructions.len();
        self.block_mut(block)?.set_code_start(start);
        self.add_instruction(Instruction::block_start(block))?;
        trace!("sequence: {block} starts at {start}");
        Ok(())
    }

    pub fn end_block(&mut self, block: BlockId) -> InternalResult<()> {
        let end = self.instructions.len();
        let basic_block = self.block_mut(block)?;
        match basic_block.code_start() {
            Some(start) if start < end => {
                basic_block.set_code_end(end);
                debug!("sequence: lowered {block} into [{start}, {end})");
                Ok(())
            },
            _ => Err(InvariantViolation::BlockNotStarted { block: block.index() })
        }
    }

    /// Appends `instr` with its gap and returns the position of `instr`.
    /// Instructions that need a pointer map get a fresh one stamped with
    /// that position.
    pub fn add_instruction(&mut self, mut instr: Instruction) -> InternalResult<usize> {
        let needs_pointer_map = instr.needs_pointer_map();
        if needs_pointer_map {
            let index = self.instructions.len() + usize::from(instr.is_control());
            let mut map = PointerMap::new();
            map.set_instruction_position(index);
            instr.set_pointer_map(map)?;
        }

        let is_control = instr.is_control();
        if is_control {
            self.instructions.push(Instruction::gap());
        }
        let index = self.instructions.len();
        trace!("sequence: {index:5}: {:?}", instr.kind());
        self.instructions.push(instr);
        if !is_control {
            self.instructions.push(Instruction::gap());
        }

        if needs_pointer_map {
            self.pointer_map_positions.push(index);
        }
        Ok(index)
    }

    /// Block whose instructions include `index`, found by walking back to
    /// the nearest block-start marker.
    pub fn get_basic_block(&self, index: usize) -> InternalResult<BlockId> {
        if index >= self.instructions.len() {
            return Err(InvariantViolation::InstructionOutOfRange {
                index,
                count: self.instructions.len()
            });
        }
        self.instructions[..=index]
            .iter()
            .rev()
            .find_map(Instruction::block)
            .ok_or(InvariantViolation::NoBlockStart { index })
    }

    pub fn get_block_start(&self, block: BlockId) -> Option<&Instruction> {
        let start = self.schedule.get_block_by_id(block)?.code_start()?;
        self.instructions.get(start).filter(|instr| instr.block() == Some(block))
    }

    pub fn is_reference(&self, vreg: VReg) -> bool {
        self.references.contains(&vreg)
    }

    pub fn is_double(&self, vreg: VReg) -> bool {
        self.doubles.contains(&vreg)
    }

    pub fn mark_as_reference(&mut self, vreg: VReg) -> InternalResult<()> {
        if self.doubles.contains(&vreg) {
            return Err(InvariantViolation::ConflictingValueClass {
                vreg: vreg.index(),
                existing: "double"
            });
        }
        self.references.insert(vreg);
        Ok(())
    }

    pub fn mark_as_double(&mut self, vreg: VReg) -> InternalResult<()> {
        if self.references.contains(&vreg) {
            return Err(InvariantViolation::ConflictingValueClass {
                vreg: vreg.index(),
                existing: "reference"
            });
        }
        self.doubles.insert(vreg);
        Ok(())
    }

    pub fn references(&self) -> impl Iterator<Item = VReg> + '_ {
        self.references.iter().copied()
    }

    pub fn doubles(&self) -> impl Iterator<Item = VReg> + '_ {
        self.doubles.iter().copied()
    }

    /// Adds `destination = source` to the start slot of the gap at `index`,
    /// or of the gap right before it.
    pub fn add_gap_move(&mut self, index: usize, source: Operand, destination: Operand) -> InternalResult<()> {
        let gap_index = match self.instructions.get(index) {
            None => {
                return Err(InvariantViolation::InstructionOutOfRange {
                    index,
                    count: self.instructions.len()
                })
            },
            Some(instr) if instr.is_gap_moves() => index,
            Some(_) => index.checked_sub(1).ok_or(InvariantViolation::NotAGap { index })?
        };

        let moves = self.instructions[gap_index]
            .gap_moves_mut()
            .ok_or(InvariantViolation::NotAGap { index: gap_index })?;
        moves
            .get_or_create_parallel_move(GapPosition::Start)
            .add_move(source, destination);
        trace!("sequence: gap move at {gap_index}");
        Ok(())
    }

    /// Pointer maps in the order their instructions were added.
    pub fn pointer_maps(&self) -> impl Iterator<Item = &PointerMap> + '_ {
        self.pointer_map_positions
            .iter()
            .filter_map(|index| self.instructions[*index].pointer_map())
    }

    pub fn pointer_map_mut(&mut self, index: usize) -> Option<&mut PointerMap> {
        self.instructions.get_mut(index)?.pointer_map_mut()
    }

    /// Places `constant` in the pool under `vreg` and returns the operand
    /// referring to it.
    pub fn add_constant(&mut self, vreg: VReg, constant: Constant) -> Operand {
        self.constants.insert(vreg, constant);
        Operand::Constant(vreg.index())
    }

    pub fn get_constant(&self, vreg: VReg) -> Option<&Constant> {
        self.constants.get(&vreg)
    }

    pub fn add_immediate(&mut self, constant: Constant) -> Operand {
        let index = self.immediates.len();
        self.immediates.push(constant);
        Operand::Immediate(index)
    }

    pub fn get_immediate(&self, index: usize) -> Option<&Constant> {
        self.immediates.get(index)
    }

    pub fn add_frame_state_descriptor(&mut self, descriptor: FrameStateDescriptor) -> StateId {
        let id = StateId(self.frame_states.len());
        debug!("sequence: frame state {id} for bailout {}", descriptor.bailout_id);
        self.frame_states.push(descriptor);
        id
    }

    pub fn get_frame_state_descriptor(&self, id: StateId) -> InternalResult<&FrameStateDescriptor> {
        self.frame_states
            .get(id.to_index())
            .ok_or(InvariantViolation::UnknownFrameState {
                id: id.to_index(),
                count: self.frame_states.len()
            })
    }

    pub fn frame_state_descriptor_count(&self) -> usize {
        self.frame_states.len()
    }
}

fn index_or_unset(index: Option<usize>) -> String {
    index.map_or_else(|| "-1".to_string(), |index| index.to_string())
}

impl fmt::Display for InstructionSequence<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let config = self.linkage.registers();

        for (i, constant) in self.immediates.iter().enumerate() {
            writeln!(f, "IMM#{i}: {constant}")?;
        }
        for (i, (vreg, constant)) in self.constants.iter().sorted_by_key(|(vreg, _)| **vreg).enumerate() {
            writeln!(f, "CST#{i}: {vreg} = {constant}")?;
        }

        for (rpo, id) in self.schedule.rpo_order().iter().enumerate() {
            let block = &self.schedule[*id];
            write!(f, "RPO#{rpo}: {}", block.id())?;
            if let Some(loop_end) = block.loop_end() {
                write!(f, " loop blocks: [{rpo}, {loop_end})")?;
            }
            writeln!(
                f,
                "  instructions: [{}, {})",
                index_or_unset(block.code_start()),
                index_or_unset(block.code_end())
            )?;

            write!(f, "  predecessors:")?;
            for pred in block.predecessors() {
                write!(f, " {pred}")?;
            }
            writeln!(f)?;

            for phi in block.nodes().iter().filter_map(|node| self.graph.node(*node)) {
                if !phi.op.is_phi() {
                    continue;
                }
                write!(f, "     phi: v{} =", phi.id.index())?;
                for input in &phi.inputs {
                    write!(f, " v{}", input.index())?;
                }
                writeln!(f)?;
            }

            if let (Some(first), Some(last)) = (block.first_instruction_index(), block.last_instruction_index()) {
                for index in first..=last {
                    if let Some(instr) = self.instructions.get(index) {
                        write!(f, "   {index:5}: {}", instr.display(config))?;
                    }
                }
            }

            write!(f, "  {}", block.control())?;
            if let Some(input) = block.control_input() {
                write!(f, " v{}", input.index())?;
            }
            for succ in block.successors() {
                write!(f, " {succ}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
