// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use std::fmt;

use itertools::Itertools;
use kagc_errors::{InternalResult, InvariantViolation};
use kagc_schedule::BlockId;
use kagc_target::reg::RegisterConfig;

use crate::moves::ParallelMove;
use crate::opcode::{ArchOpcode, InstructionCode};
use crate::operand::Operand;
use crate::pointer_map::PointerMap;

/// Slot of a gap, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GapPosition {
    Before,
    Start,
    End,
    After
}

impl GapPosition {
    pub const ALL: [GapPosition; 4] = [Self::Before, Self::Start, Self::End, Self::After];
}

/// Up to one parallel move per [`GapPosition`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GapMoves {
    moves: [Option<ParallelMove>; 4]
}

impl GapMoves {
    pub fn parallel_move(&self, position: GapPosition) -> Option<&ParallelMove> {
        self.moves[position as usize].as_ref()
    }

    pub fn parallel_move_mut(&mut self, position: GapPosition) -> Option<&mut ParallelMove> {
        self.moves[position as usize].as_mut()
    }

    pub fn get_or_create_parallel_move(&mut self, position: GapPosition) -> &mut ParallelMove {
        self.moves[position as usize].get_or_insert_with(ParallelMove::new)
    }

    /// True when no slot holds a move that does anything.
    pub fn is_redundant(&self) -> bool {
        self.moves.iter().flatten().all(ParallelMove::is_redundant)
    }
}

/// Raw source position attached to a marker instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition(i32);

impl SourcePosition {
    const UNKNOWN: i32 = -1;

    pub fn new(raw: i32) -> Self {
        Self(raw)
    }

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN)
    }

    pub fn is_unknown(self) -> bool {
        self.0 == Self::UNKNOWN
    }

    pub fn raw(self) -> i32 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    Regular,

    /// Holds moves inserted by the register allocator.
    Gap(GapMoves),

    /// First instruction of `block`. Doubles as a gap.
    BlockStart {
        block: BlockId,
        moves: GapMoves
    },

    SourcePosition(SourcePosition)
}

/// One machine operation.
///
/// Operand counts are fixed when the instruction is built; the allocator
/// rewrites operands in place through the `*_mut` accessors.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    code: InstructionCode,
    outputs: Box<[Operand]>,
    inputs: Box<[Operand]>,
    temps: Box<[Operand]>,
    is_call: bool,
    pointer_map: Option<PointerMap>,
    kind: InstructionKind
}

impl Instruction {
    pub fn new(
        code: impl Into<InstructionCode>,
        outputs: &[Operand],
        inputs: &[Operand],
        temps: &[Operand]
    ) -> Self {
        Self::with_kind(code.into(), outputs, inputs, temps, InstructionKind::Regular)
    }

    pub fn gap() -> Self {
        Self::marker(InstructionKind::Gap(GapMoves::default()))
    }

    pub fn block_start(block: BlockId) -> Self {
        Self::marker(InstructionKind::BlockStart {
            block,
            moves: GapMoves::default()
        })
    }

    pub fn source_position(position: SourcePosition) -> Self {
        Self::marker(InstructionKind::SourcePosition(position))
    }

    fn marker(kind: InstructionKind) -> Self {
        Self::with_kind(InstructionCode::new(ArchOpcode::ArchNop), &[], &[], &[], kind)
    }

    fn with_kind(
        code: InstructionCode,
        outputs: &[Operand],
        inputs: &[Operand],
        temps: &[Operand],
        kind: InstructionKind
    ) -> Self {
        Self {
            code,
            outputs: outputs.into(),
            inputs: inputs.into(),
            temps: temps.into(),
            is_call: false,
            pointer_map: None,
            kind
        }
    }

    /// Flags the instruction as a call site, which clobbers registers and
    /// needs a pointer map.
    pub fn mark_as_call(mut self) -> Self {
        self.is_call = true;
        self
    }

    pub fn code(&self) -> InstructionCode {
        self.code
    }

    pub fn arch_opcode(&self) -> ArchOpcode {
        self.code.arch_opcode()
    }

    pub fn kind(&self) -> &InstructionKind {
        &self.kind
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn temp_count(&self) -> usize {
        self.temps.len()
    }

    pub fn output_at(&self, index: usize) -> Option<&Operand> {
        self.outputs.get(index)
    }

    pub fn input_at(&self, index: usize) -> Option<&Operand> {
        self.inputs.get(index)
    }

    pub fn temp_at(&self, index: usize) -> Option<&Operand> {
        self.temps.get(index)
    }

    pub fn outputs(&self) -> &[Operand] {
        &self.outputs
    }

    pub fn inputs(&self) -> &[Operand] {
        &self.inputs
    }

    pub fn temps(&self) -> &[Operand] {
        &self.temps
    }

    pub fn outputs_mut(&mut self) -> &mut [Operand] {
        &mut self.outputs
    }

    pub fn inputs_mut(&mut self) -> &mut [Operand] {
        &mut self.inputs
    }

    pub fn temps_mut(&mut self) -> &mut [Operand] {
        &mut self.temps
    }

    pub fn is_call(&self) -> bool {
        self.is_call || self.arch_opcode().is_call()
    }

    pub fn is_control(&self) -> bool {
        matches!(self.kind, InstructionKind::Regular) && self.arch_opcode().is_control()
    }

    pub fn needs_pointer_map(&self) -> bool {
        self.is_call()
    }

    pub fn is_gap_moves(&self) -> bool {
        matches!(self.kind, InstructionKind::Gap(_) | InstructionKind::BlockStart { .. })
    }

    pub fn is_block_start(&self) -> bool {
        matches!(self.kind, InstructionKind::BlockStart { .. })
    }

    pub fn is_source_position(&self) -> bool {
        matches!(self.kind, InstructionKind::SourcePosition(_))
    }

    /// Block started by this instruction, if it is a block-start marker.
    pub fn block(&self) -> Option<BlockId> {
        match self.kind {
            InstructionKind::BlockStart { block, .. } => Some(block),
            _ => None
        }
    }

    pub fn gap_moves(&self) -> Option<&GapMoves> {
        match &self.kind {
            InstructionKind::Gap(moves) | InstructionKind::BlockStart { moves, .. } => Some(moves),
            _ => None
        }
    }

    pub fn gap_moves_mut(&mut self) -> Option<&mut GapMoves> {
        match &mut self.kind {
            InstructionKind::Gap(moves) | InstructionKind::BlockStart { moves, .. } => Some(moves),
            _ => None
        }
    }

    pub fn pointer_map(&self) -> Option<&PointerMap> {
        self.pointer_map.as_ref()
    }

    pub fn pointer_map_mut(&mut self) -> Option<&mut PointerMap> {
        self.pointer_map.as_mut()
    }

    pub fn set_pointer_map(&mut self, map: PointerMap) -> InternalResult<()> {
        if let Some(existing) = &self.pointer_map {
            return Err(InvariantViolation::PointerMapAlreadySet {
                position: existing.instruction_position()
            });
        }
        self.pointer_map = Some(map);
        Ok(())
    }

    pub fn display<'a>(&'a self, config: &'a RegisterConfig) -> InstructionDisplay<'a> {
        InstructionDisplay { instr: self, config }
    }
}

/// Renders one instruction followed by a newline.
pub struct InstructionDisplay<'a> {
    instr: &'a Instruction,
    config: &'a RegisterConfig
}

impl fmt::Display for InstructionDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instr = self.instr;
        let outputs = instr.outputs.iter().map(|op| op.display(self.config)).join(", ");
        match instr.output_count() {
            0 => (),
            1 => write!(f, "{outputs} = ")?,
            _ => write!(f, "({outputs}) = ")?,
        }

        match &instr.kind {
            InstructionKind::Gap(moves) | InstructionKind::BlockStart { moves, .. } => {
                write!(f, "{}", if instr.is_block_start() { " block-start" } else { "gap " })?;
                for position in GapPosition::ALL {
                    write!(f, "(")?;
                    if let Some(pm) = moves.parallel_move(position) {
                        write!(f, "{}", pm.display(self.config))?;
                    }
                    write!(f, ") ")?;
                }
            },
            InstructionKind::SourcePosition(position) => {
                write!(f, "position ({})", position.raw())?;
            },
            InstructionKind::Regular => write!(f, "{}", instr.code)?,
        }

        for input in instr.inputs.iter() {
            write!(f, " {}", input.display(self.config))?;
        }
        writeln!(f)
    }
}
