// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

pub mod vreg;
pub mod operand;
pub mod moves;
pub mod pointer_map;
pub mod opcode;
pub mod instruction;
pub mod constant;
pub mod frame_state;
pub mod sequence;

pub use constant::Constant;
pub use instruction::{GapPosition, Instruction, InstructionKind};
pub use moves::{MoveOperands, ParallelMove};
pub use opcode::{AddressingMode, ArchOpcode, FlagsCondition, FlagsMode, InstructionCode};
pub use operand::{AllocationPolicy, Operand, UnallocatedOperand};
pub use pointer_map::PointerMap;
pub use sequence::InstructionSequence;
pub use vreg::VReg;
