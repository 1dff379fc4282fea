// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

pub mod node;
pub mod graph;

pub use graph::Graph;
pub use node::{Node, NodeId, NodeOp};
