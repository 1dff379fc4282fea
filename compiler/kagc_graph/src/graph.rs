// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use crate::node::{Node, NodeId, NodeOp};

/// Arena of program graph nodes.
///
/// The backend only needs node identity, the operation of a node and its
/// inputs. Building the graph is up to the frontend.
#[derive(Debug, Default, Clone)]
pub struct Graph {
    nodes: Vec<Node>
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_node(&mut self, op: NodeOp, inputs: &[NodeId]) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            op,
            inputs: inputs.to_vec()
        });
        id
    }

    /// Appends an input to an existing node. Phis of loop headers get their
    /// back-edge input after the loop body is built.
    pub fn append_input(&mut self, node: NodeId, input: NodeId) {
        if let Some(node) = self.nodes.get_mut(node.0) {
            node.inputs.push(input);
        }
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }
}
