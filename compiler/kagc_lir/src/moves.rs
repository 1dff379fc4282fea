// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use std::fmt;

use itertools::Itertools;
use kagc_target::reg::RegisterConfig;
use log::trace;

use crate::operand::Operand;

/// One `destination = source` move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOperands {
    source: Operand,
    destination: Operand,
    eliminated: bool
}

impl MoveOperands {
    pub fn new(source: Operand, destination: Operand) -> Self {
        Self {
            source,
            destination,
            eliminated: false
        }
    }

    pub fn source(&self) -> &Operand {
        &self.source
    }

    pub fn destination(&self) -> &Operand {
        &self.destination
    }

    pub fn set_source(&mut self, source: Operand) {
        self.source = source;
    }

    pub fn set_destination(&mut self, destination: Operand) {
        self.destination = destination;
    }

    /// Marks the move as absorbed by another move of the same group.
    pub fn eliminate(&mut self) {
        self.eliminated = true;
    }

    pub fn is_eliminated(&self) -> bool {
        self.eliminated
    }

    pub fn is_redundant(&self) -> bool {
        self.eliminated || self.source == self.destination
    }

    /// Whether performing this move first would clobber a read of `operand`.
    pub fn blocks(&self, operand: &Operand) -> bool {
        !self.eliminated && self.source == *operand
    }

    pub fn display<'a>(&'a self, config: &'a RegisterConfig) -> MoveDisplay<'a> {
        MoveDisplay { mv: self, config }
    }
}

pub struct MoveDisplay<'a> {
    mv: &'a MoveOperands,
    config: &'a RegisterConfig
}

impl fmt::Display for MoveDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mv.destination.display(self.config))?;
        if self.mv.source != self.mv.destination {
            write!(f, " = {}", self.mv.source.display(self.config))?;
        }
        write!(f, ";")
    }
}

/// Moves that happen all at once.
///
/// The members behave like a permutation: every source is read before any
/// destination is written, so `r0 = r1; r1 = r0;` is a swap and not two
/// copies of `r1`.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ParallelMove {
    moves: Vec<MoveOperands>
}

impl ParallelMove {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `destination = source`.
    ///
    /// A destination that is already written by another member is not
    /// rejected. Both moves are kept and the resolver that sequentializes
    /// the group has to cope with them, usually by eliminating one.
    pub fn add_move(&mut self, source: Operand, destination: Operand) {
        trace!("parallel move: adding {destination:?} = {source:?}");
        self.moves.push(MoveOperands::new(source, destination));
    }

    pub fn moves(&self) -> &[MoveOperands] {
        &self.moves
    }

    pub fn moves_mut(&mut self) -> &mut [MoveOperands] {
        &mut self.moves
    }

    pub fn len(&self) -> usize {
        self.moves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn is_redundant(&self) -> bool {
        self.moves.iter().all(MoveOperands::is_redundant)
    }

    pub fn display<'a>(&'a self, config: &'a RegisterConfig) -> ParallelMoveDisplay<'a> {
        ParallelMoveDisplay { pm: self, config }
    }
}

pub struct ParallelMoveDisplay<'a> {
    pm: &'a ParallelMove,
    config: &'a RegisterConfig
}

impl fmt::Display for ParallelMoveDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self.pm.moves
            .iter()
            .filter(|mv| !mv.is_eliminated())
            .map(|mv| mv.display(self.config))
            .join(" ");
        write!(f, "{rendered}")
    }
}

#[cfg(test)]
mod tests {
    use kagc_target::TargetArch;

    use super::*;
    use crate::operand::AllocationPolicy;
    use crate::vreg::VReg;

    fn config() -> &'static RegisterConfig {
        TargetArch::Aarch64.registers()
    }

    #[test]
    fn test_move_rendering() {
        let mv = MoveOperands::new(Operand::Register(1), Operand::StackSlot(0));
        assert_eq!(mv.display(config()).to_string(), "[stack:0] = [x1|R];");

        let nop = MoveOperands::new(Operand::Register(1), Operand::Register(1));
        assert_eq!(nop.display(config()).to_string(), "[x1|R];");
    }

    #[test]
    fn test_redundancy() {
        let mut mv = MoveOperands::new(Operand::Register(0), Operand::Register(1));
        assert!(!mv.is_redundant());
        assert!(mv.blocks(&Operand::Register(0)));
        mv.eliminate();
        assert!(mv.is_redundant());
        assert!(!mv.blocks(&Operand::Register(0)));
        assert!(MoveOperands::new(Operand::StackSlot(3), Operand::StackSlot(3)).is_redundant());
    }

    #[test]
    fn test_swap_is_not_redundant() {
        let mut pm = ParallelMove::new();
        pm.add_move(Operand::Register(1), Operand::Register(0));
        pm.add_move(Operand::Register(0), Operand::Register(1));
        assert!(!pm.is_redundant());
        assert_eq!(pm.len(), 2);
        assert_eq!(pm.display(config()).to_string(), "[x0|R] = [x1|R]; [x1|R] = [x0|R];");
    }

    #[test]
    fn test_duplicate_destinations_are_kept() {
        let mut pm = ParallelMove::new();
        let dest = Operand::unallocated(VReg(2), AllocationPolicy::None);
        pm.add_move(Operand::Constant(0), dest);
        pm.add_move(Operand::Constant(1), dest);
        assert_eq!(pm.moves().len(), 2);
        assert!(pm.moves().iter().all(|mv| *mv.destination() == dest));
    }

    #[test]
    fn test_eliminated_moves_are_not_rendered() {
        let mut pm = ParallelMove::new();
        pm.add_move(Operand::Register(1), Operand::Register(0));
        pm.add_move(Operand::Register(2), Operand::Register(3));
        pm.moves_mut()[0].eliminate();
        assert_eq!(pm.display(config()).to_string(), "[x3|R] = [x2|R];");
        assert!(!pm.is_redundant());

        pm.moves_mut()[1].eliminate();
        assert!(pm.is_redundant());
        assert_eq!(pm.display(config()).to_string(), "");
        assert!(ParallelMove::new().is_redundant());
    }
}
