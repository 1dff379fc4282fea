// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

//! Instruction operands.
//!
//! An operand starts out as [`Operand::Unallocated`], naming a virtual
//! register and the constraint the register allocator has to satisfy, and
//! is rewritten in place into one of the allocated forms once a location
//! has been picked.

use std::fmt;

use kagc_target::reg::{RegIdx, RegisterConfig};

use crate::vreg::VReg;

/// Constraint on where an unallocated operand may live.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocationPolicy {
    #[default]
    None,
    FixedRegister(RegIdx),
    FixedDoubleRegister(RegIdx),

    /// Frame slot fixed by the calling convention.
    FixedSlot(i32),
    MustHaveRegister,

    /// Shares the location of the instruction's first input.
    SameAsFirstInput,
    Any
}

/// Whether the operand is live only at the start of its instruction or
/// until its end.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    UsedAtStart,

    #[default]
    UsedAtEnd
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnallocatedOperand {
    pub vreg: VReg,
    pub policy: AllocationPolicy,
    pub lifetime: Lifetime
}

impl UnallocatedOperand {
    pub fn new(vreg: VReg, policy: AllocationPolicy) -> Self {
        Self {
            vreg,
            policy,
            lifetime: Lifetime::default()
        }
    }

    pub fn used_at_start(mut self) -> Self {
        self.lifetime = Lifetime::UsedAtStart;
        self
    }

    pub fn has_fixed_policy(&self) -> bool {
        matches!(
            self.policy,
            AllocationPolicy::FixedRegister(_)
                | AllocationPolicy::FixedDoubleRegister(_)
                | AllocationPolicy::FixedSlot(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Invalid,
    Unallocated,
    Constant,
    Immediate,
    StackSlot,
    DoubleStackSlot,
    Register,
    DoubleRegister
}

/// Storage location or allocation state of a value.
///
/// Equality compares the variant and its payload. For unallocated operands
/// that includes the policy and the lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    #[default]
    Invalid,
    Unallocated(UnallocatedOperand),

    /// Index into the sequence's constant pool, keyed by virtual register.
    Constant(usize),

    /// Index into the sequence's immediate pool.
    Immediate(usize),

    /// Frame slot. Negative indices are incoming arguments.
    StackSlot(i32),
    DoubleStackSlot(i32),
    Register(RegIdx),
    DoubleRegister(RegIdx)
}

macro_rules! check_operand_kind {
    ($fn_name:ident, $variant:ident) => {
        pub fn $fn_name(&self) -> bool {
            matches!(self, Self::$variant(..))
        }
    };
}

impl Operand {
    pub fn unallocated(vreg: VReg, policy: AllocationPolicy) -> Self {
        Self::Unallocated(UnallocatedOperand::new(vreg, policy))
    }

    pub fn kind(&self) -> OperandKind {
        match self {
            Self::Invalid => OperandKind::Invalid,
            Self::Unallocated(_) => OperandKind::Unallocated,
            Self::Constant(_) => OperandKind::Constant,
            Self::Immediate(_) => OperandKind::Immediate,
            Self::StackSlot(_) => OperandKind::StackSlot,
            Self::DoubleStackSlot(_) => OperandKind::DoubleStackSlot,
            Self::Register(_) => OperandKind::Register,
            Self::DoubleRegister(_) => OperandKind::DoubleRegister,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }

    check_operand_kind!(is_unallocated, Unallocated);
    check_operand_kind!(is_constant, Constant);
    check_operand_kind!(is_immediate, Immediate);
    check_operand_kind!(is_stack_slot, StackSlot);
    check_operand_kind!(is_double_stack_slot, DoubleStackSlot);
    check_operand_kind!(is_register, Register);
    check_operand_kind!(is_double_register, DoubleRegister);

    /// Double width operands are never tagged pointers.
    pub fn is_double(&self) -> bool {
        self.is_double_register() || self.is_double_stack_slot()
    }

    /// Stack slot holding an incoming argument.
    pub fn is_argument_slot(&self) -> bool {
        matches!(self, Self::StackSlot(index) if *index < 0)
    }

    /// Index payload of an allocated operand. `None` for invalid and
    /// unallocated operands.
    pub fn index(&self) -> Option<i64> {
        match *self {
            Self::Invalid | Self::Unallocated(_) => None,
            Self::Constant(index)
            | Self::Immediate(index)
            | Self::Register(index)
            | Self::DoubleRegister(index) => Some(index as i64),
            Self::StackSlot(index) | Self::DoubleStackSlot(index) => Some(index as i64),
        }
    }

    pub fn vreg(&self) -> Option<VReg> {
        self.as_unallocated().map(|unalloc| unalloc.vreg)
    }

    pub fn policy(&self) -> Option<AllocationPolicy> {
        self.as_unallocated().map(|unalloc| unalloc.policy)
    }

    pub fn as_unallocated(&self) -> Option<&UnallocatedOperand> {
        match self {
            Self::Unallocated(unalloc) => Some(unalloc),
            _ => None
        }
    }

    /// Rewrites this operand slot in place and hands back what was there.
    pub fn convert_to(&mut self, operand: Operand) -> Operand {
        std::mem::replace(self, operand)
    }

    pub fn display<'a>(&'a self, config: &'a RegisterConfig) -> OperandDisplay<'a> {
        OperandDisplay { operand: self, config }
    }
}

impl From<UnallocatedOperand> for Operand {
    fn from(value: UnallocatedOperand) -> Self {
        Self::Unallocated(value)
    }
}

/// Renders an operand, naming physical registers after `config`.
pub struct OperandDisplay<'a> {
    operand: &'a Operand,
    config: &'a RegisterConfig
}

impl fmt::Display for OperandDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::Invalid => write!(f, "(0)"),
            Operand::Unallocated(unalloc) => {
                write!(f, "{}", unalloc.vreg)?;
                match unalloc.policy {
                    AllocationPolicy::None => Ok(()),
                    AllocationPolicy::FixedSlot(slot) => write!(f, "(={slot}S)"),
                    AllocationPolicy::FixedRegister(idx) => {
                        write!(f, "(={})", self.config.general_name(idx))
                    },
                    AllocationPolicy::FixedDoubleRegister(idx) => {
                        write!(f, "(={})", self.config.double_name(idx))
                    },
                    AllocationPolicy::MustHaveRegister => write!(f, "(R)"),
                    AllocationPolicy::SameAsFirstInput => write!(f, "(1)"),
                    AllocationPolicy::Any => write!(f, "(-)"),
                }
            },
            Operand::Constant(index) => write!(f, "[constant:{index}]"),
            Operand::Immediate(index) => write!(f, "[immediate:{index}]"),
            Operand::StackSlot(index) => write!(f, "[stack:{index}]"),
            Operand::DoubleStackSlot(index) => write!(f, "[double_stack:{index}]"),
            Operand::Register(idx) => write!(f, "[{}|R]", self.config.general_name(*idx)),
            Operand::DoubleRegister(idx) => write!(f, "[{}|R]", self.config.double_name(*idx)),
        }
    }
}
