// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use std::fmt;

/// Opaque id of a registered [`FrameStateDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateId(pub(crate) usize);

impl StateId {
    pub fn to_index(self) -> usize {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How the values produced by the deoptimizing node combine with the
/// frame state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputFrameStateCombine {
    /// Push the node's outputs onto the operand stack.
    #[default]
    Push,

    /// Ignore the node's outputs.
    Ignore
}

/// Shape of an interpreter frame to rebuild on deoptimization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameStateDescriptor {
    pub bailout_id: usize,
    pub state_combine: OutputFrameStateCombine,
    pub parameters_count: usize,
    pub locals_count: usize,
    pub stack_count: usize
}

impl FrameStateDescriptor {
    pub fn new(bailout_id: usize, parameters_count: usize, locals_count: usize, stack_count: usize) -> Self {
        Self {
            bailout_id,
            state_combine: OutputFrameStateCombine::default(),
            parameters_count,
            locals_count,
            stack_count
        }
    }

    pub fn with_state_combine(mut self, combine: OutputFrameStateCombine) -> Self {
        self.state_combine = combine;
        self
    }

    /// Number of values in the frame, counting the context.
    pub fn size(&self) -> usize {
        1 + self.parameters_count + self.locals_count + self.stack_count
    }
}
