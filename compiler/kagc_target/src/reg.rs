/*
MIT License

Copyright (c) 2023 Kagati Foundation

Permission is hereby granted, free of charge, to any person obtaining a copy
of this software and associated documentation files (the "Software"), to deal
in the Software without restriction, including without limitation the rights
to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
copies of the Software, and to permit persons to whom the Software is
furnished to do so, subject to the following conditions:

The above copyright notice and this permission notice shall be included in all
copies or substantial portions of the Software.

THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
SOFTWARE.
*/

use lazy_static::lazy_static;

use crate::TargetArch;

/// Register index. This is the allocation index of a register, not its
/// hardware encoding.
pub type RegIdx = usize;

pub const INVALID_REG_NAME: &str = "invalid";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RegClass {
    /// General purpose register
    GPR,

    /// Floating-point register
    FPR
}

/// Allocatable registers of one target, in allocation-index order.
#[derive(Debug, Clone)]
pub struct RegisterConfig {
    pub arch: TargetArch,

    /// Names of the general purpose registers.
    pub general: Vec<String>,

    /// Names of the double precision registers.
    pub double: Vec<String>
}

lazy_static! {
    // x16/x17 are intra-procedure-call scratch registers, x18 is the
    // platform register.
    static ref AARCH64_REGISTERS: RegisterConfig = RegisterConfig {
        arch: TargetArch::Aarch64,
        general: (0..=15)
            .chain(19..=28)
            .map(|idx| format!("x{idx}"))
            .collect(),
        double: (0..=31)
            .map(|idx| format!("d{idx}"))
            .collect()
    };

    static ref X86_64_REGISTERS: RegisterConfig = RegisterConfig {
        arch: TargetArch::X86_64,
        general: ["rax", "rbx", "rdx", "rcx", "rsi", "rdi", "r8", "r9", "r11", "r14", "r15"]
            .iter()
            .map(|name| name.to_string())
            .collect(),
        double: (0..=15)
            .map(|idx| format!("xmm{idx}"))
            .collect()
    };
}

impl RegisterConfig {
    pub fn for_arch(arch: TargetArch) -> &'static RegisterConfig {
        match arch {
            TargetArch::Aarch64 => &*AARCH64_REGISTERS,
            TargetArch::X86_64 => &*X86_64_REGISTERS,
        }
    }

    pub fn num_registers(&self, class: RegClass) -> usize {
        match class {
            RegClass::GPR => self.general.len(),
            RegClass::FPR => self.double.len(),
        }
    }

    /// Name of the general purpose register with allocation index `idx`.
    pub fn general_name(&self, idx: RegIdx) -> &str {
        self.general.get(idx).map_or(INVALID_REG_NAME, |name| name.as_str())
    }

    /// Name of the double register with allocation index `idx`.
    pub fn double_name(&self, idx: RegIdx) -> &str {
        self.double.get(idx).map_or(INVALID_REG_NAME, |name| name.as_str())
    }

    pub fn name(&self, class: RegClass, idx: RegIdx) -> &str {
        match class {
            RegClass::GPR => self.general_name(idx),
            RegClass::FPR => self.double_name(idx),
        }
    }
}
