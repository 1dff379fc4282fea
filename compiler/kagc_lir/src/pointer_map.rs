// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use std::fmt;

use itertools::Itertools;
use kagc_errors::{InternalResult, InvariantViolation};
use kagc_target::reg::RegisterConfig;

use crate::operand::Operand;

/// Locations that are live across a safepoint, split into tagged heap
/// references and raw untagged values.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PointerMap {
    pointer_operands: Vec<Operand>,
    untagged_operands: Vec<Operand>,
    instruction_position: Option<usize>
}

impl PointerMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pointer_operands(&self) -> &[Operand] {
        &self.pointer_operands
    }

    pub fn untagged_operands(&self) -> &[Operand] {
        &self.untagged_operands
    }

    pub fn instruction_position(&self) -> Option<usize> {
        self.instruction_position
    }

    pub fn set_instruction_position(&mut self, position: usize) {
        self.instruction_position = Some(position);
    }

    pub fn record_pointer(&mut self, operand: Operand) -> InternalResult<()> {
        if Self::check_recordable(&operand)? {
            self.pointer_operands.push(operand);
        }
        Ok(())
    }

    pub fn record_untagged(&mut self, operand: Operand) -> InternalResult<()> {
        if Self::check_recordable(&operand)? {
            self.untagged_operands.push(operand);
        }
        Ok(())
    }

    /// Drops every recorded pointer equal to `operand`.
    pub fn remove_pointer(&mut self, operand: &Operand) -> InternalResult<()> {
        if Self::check_recordable(operand)? {
            self.pointer_operands.retain(|recorded| recorded != operand);
        }
        Ok(())
    }

    /// `Ok(false)` for incoming arguments, which are never recorded. Double
    /// width operands are rejected.
    fn check_recordable(operand: &Operand) -> InternalResult<bool> {
        if operand.is_argument_slot() {
            return Ok(false);
        }
        if operand.is_double() {
            return Err(InvariantViolation::DoubleOperandInPointerMap {
                operand: format!("{operand:?}")
            });
        }
        Ok(true)
    }

    pub fn display<'a>(&'a self, config: &'a RegisterConfig) -> PointerMapDisplay<'a> {
        PointerMapDisplay { map: self, config }
    }
}

pub struct PointerMapDisplay<'a> {
    map: &'a PointerMap,
    config: &'a RegisterConfig
}

impl fmt::Display for PointerMapDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}}}",
            self.map.pointer_operands.iter().map(|op| op.display(self.config)).join(";")
        )
    }
}

#[cfg(test)]
mod tests {
    use kagc_target::TargetArch;

    use super::*;

    #[test]
    fn test_incoming_arguments_are_skipped() {
        let mut map = PointerMap::new();
        map.record_pointer(Operand::StackSlot(-1)).unwrap();
        map.record_untagged(Operand::StackSlot(-3)).unwrap();
        map.remove_pointer(&Operand::StackSlot(-1)).unwrap();
        assert!(map.pointer_operands().is_empty());
        assert!(map.untagged_operands().is_empty());
    }

    #[test]
    fn test_double_operands_are_rejected() {
        let mut map = PointerMap::new();
        assert!(matches!(
            map.record_pointer(Operand::DoubleRegister(0)),
            Err(InvariantViolation::DoubleOperandInPointerMap { .. })
        ));
        assert!(map.record_untagged(Operand::DoubleStackSlot(2)).is_err());
        assert!(map.remove_pointer(&Operand::DoubleStackSlot(2)).is_err());
        assert!(map.pointer_operands().is_empty());
    }

    #[test]
    fn test_remove_pointer_removes_every_copy() {
        let mut map = PointerMap::new();
        map.record_pointer(Operand::StackSlot(1)).unwrap();
        map.record_pointer(Operand::Register(4)).unwrap();
        map.record_pointer(Operand::StackSlot(1)).unwrap();
        map.remove_pointer(&Operand::StackSlot(1)).unwrap();
        assert_eq!(map.pointer_operands(), &[Operand::Register(4)]);
    }

    #[test]
    fn test_rendering_lists_pointers_only() {
        let mut map = PointerMap::new();
        map.set_instruction_position(3);
        map.record_pointer(Operand::StackSlot(0)).unwrap();
        map.record_pointer(Operand::Register(2)).unwrap();
        map.record_untagged(Operand::Register(1)).unwrap();

        let config = TargetArch::Aarch64.registers();
        assert_eq!(map.display(config).to_string(), "{[stack:0];[x2|R]}");
        assert_eq!(PointerMap::new().display(config).to_string(), "{}");
        assert_eq!(map.instruction_position(), Some(3));
    }
}
