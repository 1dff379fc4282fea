// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use crate::reg::RegisterConfig;
use crate::TargetArch;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Call to a compiled code object.
    #[default]
    Code,

    /// Call to a function of the source language.
    Function,

    /// Call into the runtime.
    Runtime
}

/// Calling convention of the unit being compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Linkage {
    pub arch: TargetArch,
    pub kind: CallKind,
    pub parameter_count: usize,
    pub return_count: usize
}

impl Linkage {
    pub fn registers(&self) -> &'static RegisterConfig {
        self.arch.registers()
    }
}

impl Default for Linkage {
    fn default() -> Self {
        LinkageBuilder::new(TargetArch::default()).build()
    }
}

pub struct LinkageBuilder {
    arch: TargetArch,
    kind: Option<CallKind>,
    parameter_count: Option<usize>,
    return_count: Option<usize>
}

impl LinkageBuilder {
    pub fn new(arch: TargetArch) -> Self {
        Self {
            arch,
            kind: None,
            parameter_count: None,
            return_count: None
        }
    }

    pub fn call_kind(mut self, kind: CallKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn parameter_count(mut self, count: usize) -> Self {
        self.parameter_count = Some(count);
        self
    }

    pub fn return_count(mut self, count: usize) -> Self {
        self.return_count = Some(count);
        self
    }

    pub fn build(self) -> Linkage {
        Linkage {
            arch: self.arch,
            kind: self.kind.unwrap_or_default(),
            parameter_count: self.parameter_count.unwrap_or(0),
            // single return value unless told otherwise
            return_count: self.return_count.unwrap_or(1)
        }
    }
}
