// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

pub mod reg;
pub mod linkage;

use std::fmt;

pub use linkage::{CallKind, Linkage, LinkageBuilder};
pub use reg::{RegClass, RegIdx, RegisterConfig};

/// Architectures the backend knows register files for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetArch {
    #[default]
    Aarch64,
    X86_64
}

impl TargetArch {
    pub fn registers(self) -> &'static RegisterConfig {
        RegisterConfig::for_arch(self)
    }
}

impl fmt::Display for TargetArch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aarch64 => write!(f, "aarch64"),
            Self::X86_64 => write!(f, "x86_64"),
        }
    }
}
