// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

//! Internal compiler errors.
//!
//! These are raised by the backend data structures when a caller breaks one
//! of their contracts. None of them is recoverable: the compilation unit that
//! produced one has to be thrown away.

use std::fmt;

/// Broken contract inside the backend.
///
/// Block ids, node ids and instruction indices are carried as plain numbers
/// so that this crate stays at the bottom of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    /// A block already has a terminating control.
    ControlAlreadySet {
        block: usize,
        control: &'static str
    },

    /// An instruction already owns a pointer map.
    PointerMapAlreadySet {
        position: Option<usize>
    },

    /// Floating point values never hold tagged pointers.
    DoubleOperandInPointerMap {
        operand: String
    },

    /// The frame state id was not issued by this sequence.
    UnknownFrameState {
        id: usize,
        count: usize
    },

    InstructionOutOfRange {
        index: usize,
        count: usize
    },

    /// Gap moves can only be attached to gap instructions.
    NotAGap {
        index: usize
    },

    /// Walked past the start of the instruction stream without meeting a
    /// block-start marker.
    NoBlockStart {
        index: usize
    },

    BlockNotStarted {
        block: usize
    },

    /// A virtual register is either a tagged reference or a double, never both.
    ConflictingValueClass {
        vreg: usize,
        existing: &'static str
    },

    NodeNotScheduled {
        node: usize
    },

    /// The block id was not issued by the schedule in use.
    UnknownBlock {
        block: usize
    },

    /// A cycle can be entered without passing through `header`.
    IrreducibleControlFlow {
        header: usize
    }
}

pub type InternalResult<T> = Result<T, InvariantViolation>;

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ControlAlreadySet { block, control } => {
                write!(f, "internal error: block B{block} already ends with `{control}`")
            },
            Self::PointerMapAlreadySet { position } => {
                match position {
                    Some(pos) => write!(f, "internal error: instruction {pos} already has a pointer map"),
                    None => write!(f, "internal error: instruction already has a pointer map")
                }
            },
            Self::DoubleOperandInPointerMap { operand } => {
                write!(f, "internal error: cannot record double operand `{operand}` in a pointer map")
            },
            Self::UnknownFrameState { id, count } => {
                write!(f, "internal error: frame state #{id} does not exist ({count} registered)")
            },
            Self::InstructionOutOfRange { index, count } => {
                write!(f, "internal error: instruction index {index} out of range ({count} instructions)")
            },
            Self::NotAGap { index } => {
                write!(f, "internal error: instruction {index} is not a gap")
            },
            Self::NoBlockStart { index } => {
                write!(f, "internal error: no block-start found before instruction {index}")
            },
            Self::BlockNotStarted { block } => {
                write!(f, "internal error: block B{block} ended before it was started")
            },
            Self::ConflictingValueClass { vreg, existing } => {
                write!(f, "internal error: v{vreg} is already marked as {existing}")
            },
            Self::NodeNotScheduled { node } => {
                write!(f, "internal error: node #{node} is not scheduled")
            },
            Self::UnknownBlock { block } => {
                write!(f, "internal error: block B{block} does not belong to this schedule")
            },
            Self::IrreducibleControlFlow { header } => {
                write!(f, "internal error: loop at B{header} has more than one entry")
            }
        }
    }
}

impl std::error::Error for InvariantViolation {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_mentions_offending_ids() {
        let err = InvariantViolation::ControlAlreadySet { block: 3, control: "goto" };
        assert_eq!(err.to_string(), "internal error: block B3 already ends with `goto`");

        let err = InvariantViolation::UnknownFrameState { id: 7, count: 2 };
        assert_eq!(err.to_string(), "internal error: frame state #7 does not exist (2 registered)");
    }

    #[test]
    fn test_block_messages() {
        let err = InvariantViolation::IrreducibleControlFlow { header: 2 };
        assert_eq!(err.to_string(), "internal error: loop at B2 has more than one entry");

        let err = InvariantViolation::UnknownBlock { block: 9 };
        assert_eq!(err.to_string(), "internal error: block B9 does not belong to this schedule");
    }

    #[test]
    fn test_pointer_map_message_without_position() {
        let err = InvariantViolation::PointerMapAlreadySet { position: None };
        assert_eq!(err.to_string(), "internal error: instruction already has a pointer map");
    }

    #[test]
    fn test_propagates_through_question_mark() {
        fn inner() -> InternalResult<usize> {
            Err(InvariantViolation::NotAGap { index: 4 })
        }

        fn outer() -> InternalResult<usize> {
            let value = inner()?;
            Ok(value + 1)
        }

        assert_eq!(outer(), Err(InvariantViolation::NotAGap { index: 4 }));
    }
}
