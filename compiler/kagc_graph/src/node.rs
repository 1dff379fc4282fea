// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use std::fmt;

use itertools::Itertools;

/// Dense node identifier. Ids are handed out by [`crate::Graph`] in
/// creation order, starting at zero.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeOp {
    Start,
    End,

    /// Incoming parameter at the given position.
    Parameter(usize),

    Int32Constant(i32),
    Int64Constant(i64),
    Float64Constant(f64),

    /// Value merge at a control-flow join. Inputs are the merged values in
    /// predecessor order.
    Phi,
    Merge,
    Loop,

    Branch,
    IfTrue,
    IfFalse,

    Return,
    Throw,
    Call,

    /// Any other pure or effectful operation, identified by name.
    Operation(&'static str)
}

impl NodeOp {
    pub fn is_phi(&self) -> bool {
        matches!(self, Self::Phi)
    }

    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Self::Start
            | Self::End
            | Self::Merge
            | Self::Loop
            | Self::Branch
            | Self::IfTrue
            | Self::IfFalse
            | Self::Return
            | Self::Throw
        )
    }
}

impl fmt::Display for NodeOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "Start"),
            Self::End => write!(f, "End"),
            Self::Parameter(pos) => write!(f, "Parameter[{pos}]"),
            Self::Int32Constant(value) => write!(f, "Int32Constant[{value}]"),
            Self::Int64Constant(value) => write!(f, "Int64Constant[{value}]"),
            Self::Float64Constant(value) => write!(f, "Float64Constant[{value}]"),
            Self::Phi => write!(f, "Phi"),
            Self::Merge => write!(f, "Merge"),
            Self::Loop => write!(f, "Loop"),
            Self::Branch => write!(f, "Branch"),
            Self::IfTrue => write!(f, "IfTrue"),
            Self::IfFalse => write!(f, "IfFalse"),
            Self::Return => write!(f, "Return"),
            Self::Throw => write!(f, "Throw"),
            Self::Call => write!(f, "Call"),
            Self::Operation(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: NodeId,
    pub op: NodeOp,
    pub inputs: Vec<NodeId>
}

impl Node {
    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn input_at(&self, index: usize) -> Option<NodeId> {
        self.inputs.get(index).copied()
    }
}

/// `#3:Phi(#1, #2)`
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.id, self.op)?;
        if !self.inputs.is_empty() {
            write!(f, "({})", self.inputs.iter().join(", "))?;
        }
        Ok(())
    }
}
