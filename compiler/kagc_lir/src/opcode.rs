// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

//! Opcodes and their packed encoding.
//!
//! Bit layout of an [`InstructionCode`]:
//!
//! ```text
//!  31        20 19       15 14  13 12       8 7          0
//! +------------+-----------+------+----------+------------+
//! |    misc    | condition | mode | address  |   opcode   |
//! +------------+-----------+------+----------+------------+
//! ```

use std::fmt;

macro_rules! code_enum {
    ($(#[$meta:meta])* $enum_name:ident { $($variant:ident => $text:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $enum_name {
            $($variant),*
        }

        impl $enum_name {
            pub const ALL: &'static [$enum_name] = &[$($enum_name::$variant),*];

            pub fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),*
                }
            }

            fn from_bits(bits: u32) -> Option<Self> {
                Self::ALL.get(bits as usize).copied()
            }
        }

        impl fmt::Display for $enum_name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.name())
            }
        }
    };
}

code_enum!(
    /// Machine operation. The `Arch` opcodes exist on every target.
    ArchOpcode {
        ArchCallCodeObject => "ArchCallCodeObject",
        ArchCallJSFunction => "ArchCallJSFunction",
        ArchJmp => "ArchJmp",
        ArchNop => "ArchNop",
        ArchRet => "ArchRet",
        ArchDeoptimize => "ArchDeoptimize",
        ArchTruncateDoubleToI => "ArchTruncateDoubleToI",
        Arm64Add => "Arm64Add",
        Arm64Add32 => "Arm64Add32",
        Arm64And => "Arm64And",
        Arm64And32 => "Arm64And32",
        Arm64Or => "Arm64Or",
        Arm64Or32 => "Arm64Or32",
        Arm64Sub => "Arm64Sub",
        Arm64Sub32 => "Arm64Sub32",
        Arm64Mul => "Arm64Mul",
        Arm64Mul32 => "Arm64Mul32",
        Arm64Idiv => "Arm64Idiv",
        Arm64Idiv32 => "Arm64Idiv32",
        Arm64Neg => "Arm64Neg",
        Arm64Lsl => "Arm64Lsl",
        Arm64Lsr => "Arm64Lsr",
        Arm64Asr => "Arm64Asr",
        Arm64Mov32 => "Arm64Mov32",
        Arm64Sxtw => "Arm64Sxtw",
        Arm64Cmp => "Arm64Cmp",
        Arm64Cmp32 => "Arm64Cmp32",
        Arm64Tst => "Arm64Tst",
        Arm64Tst32 => "Arm64Tst32",
        Arm64CallCodeObject => "Arm64CallCodeObject",
        Arm64Claim => "Arm64Claim",
        Arm64Poke => "Arm64Poke",
        Arm64Float64Cmp => "Arm64Float64Cmp",
        Arm64Float64Add => "Arm64Float64Add",
        Arm64Float64Sub => "Arm64Float64Sub",
        Arm64Float64Mul => "Arm64Float64Mul",
        Arm64Float64Div => "Arm64Float64Div",
        Arm64Int32ToFloat64 => "Arm64Int32ToFloat64",
        Arm64Float64ToInt32 => "Arm64Float64ToInt32",
        Arm64Ldr => "Arm64Ldr",
        Arm64LdrW => "Arm64LdrW",
        Arm64LdrD => "Arm64LdrD",
        Arm64Str => "Arm64Str",
        Arm64StrW => "Arm64StrW",
        Arm64StrD => "Arm64StrD",
        Arm64StoreWriteBarrier => "Arm64StoreWriteBarrier",
    }
);

code_enum!(
    /// How memory operands of an instruction are formed.
    AddressingMode {
        None => "",
        MRI => "MRI",
        MRR => "MRR",
        Operand2RLslI => "Operand2_R_LSL_I",
        Operand2RLsrI => "Operand2_R_LSR_I",
        Operand2RAsrI => "Operand2_R_ASR_I",
        Operand2RRorI => "Operand2_R_ROR_I",
    }
);

code_enum!(
    /// What an instruction does with the condition flags it produces.
    FlagsMode {
        None => "",
        Branch => "branch",
        Set => "set",
    }
);

code_enum!(
    /// Conditions come in negated pairs: `x` and `x ^ 1` are each
    /// other's negation.
    FlagsCondition {
        Equal => "equal",
        NotEqual => "not equal",
        SignedLessThan => "signed less than",
        SignedGreaterThanOrEqual => "signed greater than or equal",
        SignedLessThanOrEqual => "signed less than or equal",
        SignedGreaterThan => "signed greater than",
        UnsignedLessThan => "unsigned less than",
        UnsignedGreaterThanOrEqual => "unsigned greater than or equal",
        UnsignedLessThanOrEqual => "unsigned less than or equal",
        UnsignedGreaterThan => "unsigned greater than",
        UnorderedEqual => "unordered equal",
        UnorderedNotEqual => "unordered not equal",
        UnorderedLessThan => "unordered less than",
        UnorderedGreaterThanOrEqual => "unordered greater than or equal",
        UnorderedLessThanOrEqual => "unordered less than or equal",
        UnorderedGreaterThan => "unordered greater than",
        Overflow => "overflow",
        NotOverflow => "not overflow",
    }
);

impl ArchOpcode {
    pub fn is_control(self) -> bool {
        matches!(self, Self::ArchJmp | Self::ArchRet)
    }

    pub fn is_call(self) -> bool {
        matches!(
            self,
            Self::ArchCallCodeObject | Self::ArchCallJSFunction | Self::Arm64CallCodeObject
        )
    }
}

impl FlagsCondition {
    pub fn negate(self) -> Self {
        Self::ALL[self as usize ^ 1]
    }

    /// Condition that holds for swapped operands: `a < b` iff `b > a`.
    pub fn commute(self) -> Self {
        use FlagsCondition::*;
        match self {
            SignedLessThan => SignedGreaterThan,
            SignedGreaterThanOrEqual => SignedLessThanOrEqual,
            SignedLessThanOrEqual => SignedGreaterThanOrEqual,
            SignedGreaterThan => SignedLessThan,
            UnsignedLessThan => UnsignedGreaterThan,
            UnsignedGreaterThanOrEqual => UnsignedLessThanOrEqual,
            UnsignedLessThanOrEqual => UnsignedGreaterThanOrEqual,
            UnsignedGreaterThan => UnsignedLessThan,
            UnorderedLessThan => UnorderedGreaterThan,
            UnorderedGreaterThanOrEqual => UnorderedLessThanOrEqual,
            UnorderedLessThanOrEqual => UnorderedGreaterThanOrEqual,
            UnorderedGreaterThan => UnorderedLessThan,
            Equal | NotEqual | UnorderedEqual | UnorderedNotEqual | Overflow | NotOverflow => self,
        }
    }
}

const OPCODE_SHIFT: u32 = 0;
const OPCODE_BITS: u32 = 8;
const MODE_SHIFT: u32 = 8;
const MODE_BITS: u32 = 5;
const FLAGS_MODE_SHIFT: u32 = 13;
const FLAGS_MODE_BITS: u32 = 2;
const CONDITION_SHIFT: u32 = 15;
const CONDITION_BITS: u32 = 5;
const MISC_SHIFT: u32 = 20;
const MISC_BITS: u32 = 12;

fn field(bits: u32, shift: u32, width: u32) -> u32 {
    (bits >> shift) & ((1 << width) - 1)
}

fn with_field(bits: u32, shift: u32, width: u32, value: u32) -> u32 {
    let mask = ((1 << width) - 1) << shift;
    (bits & !mask) | ((value << shift) & mask)
}

/// Opcode, addressing mode, flags mode, flags condition and a free misc
/// field packed into one word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InstructionCode(u32);

impl InstructionCode {
    pub fn new(opcode: ArchOpcode) -> Self {
        Self(with_field(0, OPCODE_SHIFT, OPCODE_BITS, opcode as u32))
    }

    /// Checks every field of a raw word before accepting it.
    pub fn from_bits(bits: u32) -> Option<Self> {
        ArchOpcode::from_bits(field(bits, OPCODE_SHIFT, OPCODE_BITS))?;
        AddressingMode::from_bits(field(bits, MODE_SHIFT, MODE_BITS))?;
        FlagsMode::from_bits(field(bits, FLAGS_MODE_SHIFT, FLAGS_MODE_BITS))?;
        FlagsCondition::from_bits(field(bits, CONDITION_SHIFT, CONDITION_BITS))?;
        Some(Self(bits))
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn with_addressing_mode(self, mode: AddressingMode) -> Self {
        Self(with_field(self.0, MODE_SHIFT, MODE_BITS, mode as u32))
    }

    pub fn with_flags(self, mode: FlagsMode, condition: FlagsCondition) -> Self {
        let bits = with_field(self.0, FLAGS_MODE_SHIFT, FLAGS_MODE_BITS, mode as u32);
        Self(with_field(bits, CONDITION_SHIFT, CONDITION_BITS, condition as u32))
    }

    /// Stores the low 12 bits of `value`.
    pub fn with_misc(self, value: u32) -> Self {
        Self(with_field(self.0, MISC_SHIFT, MISC_BITS, value))
    }

    // Fields always hold a valid discriminant: words only come from the
    // typed setters or from a checked `from_bits`.

    pub fn arch_opcode(self) -> ArchOpcode {
        ArchOpcode::ALL[field(self.0, OPCODE_SHIFT, OPCODE_BITS) as usize]
    }

    pub fn addressing_mode(self) -> AddressingMode {
        AddressingMode::ALL[field(self.0, MODE_SHIFT, MODE_BITS) as usize]
    }

    pub fn flags_mode(self) -> FlagsMode {
        FlagsMode::ALL[field(self.0, FLAGS_MODE_SHIFT, FLAGS_MODE_BITS) as usize]
    }

    pub fn flags_condition(self) -> FlagsCondition {
        FlagsCondition::ALL[field(self.0, CONDITION_SHIFT, CONDITION_BITS) as usize]
    }

    pub fn misc(self) -> u32 {
        field(self.0, MISC_SHIFT, MISC_BITS)
    }
}

impl From<ArchOpcode> for InstructionCode {
    fn from(value: ArchOpcode) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for InstructionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.arch_opcode())?;
        let mode = self.addressing_mode();
        if mode != AddressingMode::None {
            write!(f, " : {mode}")?;
        }
        let flags = self.flags_mode();
        if flags != FlagsMode::None {
            write!(f, " && {flags} if {}", self.flags_condition())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_pack_independently() {
        let code = InstructionCode::new(ArchOpcode::Arm64Cmp32)
            .with_addressing_mode(AddressingMode::MRR)
            .with_flags(FlagsMode::Branch, FlagsCondition::UnsignedLessThan)
            .with_misc(0xabc);

        assert_eq!(code.arch_opcode(), ArchOpcode::Arm64Cmp32);
        assert_eq!(code.addressing_mode(), AddressingMode::MRR);
        assert_eq!(code.flags_mode(), FlagsMode::Branch);
        assert_eq!(code.flags_condition(), FlagsCondition::UnsignedLessThan);
        assert_eq!(code.misc(), 0xabc);
        assert_eq!(InstructionCode::from_bits(code.bits()), Some(code));
    }

    #[test]
    fn test_misc_is_truncated_to_its_field() {
        let code = InstructionCode::new(ArchOpcode::ArchNop).with_misc(0x1fff);
        assert_eq!(code.misc(), 0xfff);
        assert_eq!(code.arch_opcode(), ArchOpcode::ArchNop);
    }

    #[test]
    fn test_from_bits_rejects_unknown_opcodes() {
        assert_eq!(InstructionCode::from_bits(0xff), None);
        assert_eq!(InstructionCode::from_bits(31 << 8), None);
        assert!(InstructionCode::from_bits(0).is_some());
    }

    #[test]
    fn test_code_rendering() {
        assert_eq!(InstructionCode::new(ArchOpcode::ArchJmp).to_string(), "ArchJmp");
        let load = InstructionCode::new(ArchOpcode::Arm64Ldr)
            .with_addressing_mode(AddressingMode::MRI);
        assert_eq!(load.to_string(), "Arm64Ldr : MRI");
        let cmp = InstructionCode::new(ArchOpcode::Arm64Cmp)
            .with_flags(FlagsMode::Set, FlagsCondition::SignedLessThanOrEqual);
        assert_eq!(cmp.to_string(), "Arm64Cmp && set if signed less than or equal");
    }

    #[test]
    fn test_negate_and_commute() {
        assert_eq!(FlagsCondition::Equal.negate(), FlagsCondition::NotEqual);
        assert_eq!(FlagsCondition::Overflow.negate(), FlagsCondition::NotOverflow);
        assert_eq!(
            FlagsCondition::UnsignedGreaterThan.negate(),
            FlagsCondition::UnsignedLessThanOrEqual
        );
        for cond in FlagsCondition::ALL {
            assert_eq!(cond.negate().negate(), *cond);
            assert_eq!(cond.commute().commute(), *cond);
        }
        assert_eq!(FlagsCondition::SignedLessThan.commute(), FlagsCondition::SignedGreaterThan);
        assert_eq!(FlagsCondition::Equal.commute(), FlagsCondition::Equal);
    }

    #[test]
    fn test_opcode_classes() {
        assert!(ArchOpcode::ArchJmp.is_control());
        assert!(ArchOpcode::ArchRet.is_control());
        assert!(!ArchOpcode::ArchCallCodeObject.is_control());
        assert!(ArchOpcode::ArchCallJSFunction.is_call());
        assert!(!ArchOpcode::Arm64Add.is_call());
        assert!(ArchOpcode::ALL.len() <= 1 << OPCODE_BITS);
    }
}
