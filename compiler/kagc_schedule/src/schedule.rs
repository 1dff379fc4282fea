// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use std::fmt;
use std::ops::{Index, IndexMut};

use itertools::Itertools;
use kagc_errors::{InternalResult, InvariantViolation};
use kagc_graph::{Graph, NodeId};
use log::{debug, trace};

use crate::block::{BasicBlock, BlockId, Control};

/// Result of assigning graph nodes to basic blocks and ordering the blocks.
///
/// The schedule is the arena for its blocks: `BlockId(n)` is the n-th block
/// ever created, and blocks are never removed.
#[derive(Debug, Clone)]
pub struct Schedule {
    all_blocks: Vec<BasicBlock>,

    /// Node id -> containing block.
    nodeid_to_block: Vec<Option<BlockId>>,

    rpo_order: Vec<BlockId>,
    start: BlockId,
    end: BlockId
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Schedule {
    /// Creates a schedule holding just the start and end blocks.
    pub fn new(node_count_hint: usize) -> Self {
        let mut schedule = Self {
            all_blocks: vec![],
            nodeid_to_block: Vec::with_capacity(node_count_hint),
            rpo_order: vec![],
            start: BlockId(0),
            end: BlockId(0)
        };
        schedule.start = schedule.new_basic_block();
        schedule.end = schedule.new_basic_block();
        schedule
    }

    /// Block containing `node`, if it was planned or added anywhere.
    pub fn block(&self, node: NodeId) -> Option<BlockId> {
        self.nodeid_to_block.get(node.0).copied().flatten()
    }

    /// Like [`Schedule::block`], for callers that rely on `node` having
    /// been scheduled.
    pub fn required_block(&self, node: NodeId) -> InternalResult<BlockId> {
        self.block(node).ok_or(InvariantViolation::NodeNotScheduled { node: node.0 })
    }

    pub fn is_scheduled(&self, node: NodeId) -> bool {
        self.block(node).is_some()
    }

    pub fn get_block_by_id(&self, id: BlockId) -> Option<&BasicBlock> {
        self.all_blocks.get(id.0)
    }

    pub fn get_block_by_id_mut(&mut self, id: BlockId) -> Option<&mut BasicBlock> {
        self.all_blocks.get_mut(id.0)
    }

    pub fn basic_block_count(&self) -> usize {
        self.all_blocks.len()
    }

    pub fn rpo_block_count(&self) -> usize {
        self.rpo_order.len()
    }

    /// Whether `a` and `b` are scheduled into the same block.
    pub fn same_basic_block(&self, a: NodeId, b: NodeId) -> bool {
        match (self.block(a), self.block(b)) {
            (Some(block_a), Some(block_b)) => block_a == block_b,
            _ => false
        }
    }

    pub fn new_basic_block(&mut self) -> BlockId {
        let id = BlockId(self.all_blocks.len());
        self.all_blocks.push(BasicBlock::new(id));
        debug!("schedule: created block {id}");
        id
    }

    /// Records that `node` will be placed in `block` without appending it to
    /// the block's node list yet.
    pub fn plan_node(&mut self, block: BlockId, node: NodeId) {
        trace!("schedule: planning {node} for {block}");
        self.set_block_for_node(block, node);
    }

    /// Appends `node` to the end of `block`.
    /// Appends `node` to `block`. A node already placed elsewhere is moved,
    /// so it never shows up in two node lists.
    pub fn add_node(&mut self, block: BlockId, node: NodeId) {
        trace!("schedule: adding {node} to {block}");
        if let Some(previous) = self.block(node) {
            self[previous].remove_node(node);
        }
        self.set_block_for_node(block, node);
        self[block].add_node(node);
    }

    pub fn add_goto(&mut self, block: BlockId, succ: BlockId) -> InternalResult<()> {
        self[block].set_control(Control::Goto)?;
        self.add_successor(block, succ);
        debug!("schedule: {block} goto {succ}");
        Ok(())
    }

    /// Ends `block` with `branch`: `tblock` is taken when the condition
    /// holds, `fblock` otherwise.
    pub fn add_branch(
        &mut self,
        block: BlockId,
        branch: NodeId,
        tblock: BlockId,
        fblock: BlockId
    ) -> InternalResult<()> {
        self[block].set_control(Control::Branch)?;
        self.add_successor(block, tblock);
        self.add_successor(block, fblock);
        self.set_control_input(block, branch);
        debug!("schedule: {block} branch on {branch} to {tblock}, {fblock}");
        Ok(())
    }

    pub fn add_return(&mut self, block: BlockId, input: NodeId) -> InternalResult<()> {
        self[block].set_control(Control::Return)?;
        self.set_control_input(block, input);
        if block != self.end {
            self.add_successor(block, self.end);
        }
        debug!("schedule: {block} returns {input}");
        Ok(())
    }

    pub fn add_throw(&mut self, block: BlockId, input: NodeId) -> InternalResult<()> {
        self[block].set_control(Control::Throw)?;
        self.set_control_input(block, input);
        if block != self.end {
            self.add_successor(block, self.end);
        }
        debug!("schedule: {block} throws {input}");
        Ok(())
    }

    /// Adds the edge `block -> succ` on both ends.
    pub fn add_successor(&mut self, block: BlockId, succ: BlockId) {
        self[block].add_successor(succ);
        self[succ].add_predecessor(block);
    }

    pub fn rpo_order(&self) -> &[BlockId] {
        &self.rpo_order
    }

    /// Installs `order` as the reverse post-order and numbers the blocks
    /// accordingly. Blocks left out of `order` lose their RPO number and
    /// loop information.
    pub fn set_rpo_order(&mut self, order: Vec<BlockId>) {
        for block in self.all_blocks.iter_mut() {
            block.clear_order_info();
        }
        for (rpo, id) in order.iter().enumerate() {
            self[*id].set_rpo_number(Some(rpo));
        }
        self.rpo_order = order;
    }

    pub fn start(&self) -> BlockId {
        self.start
    }

    pub fn end(&self) -> BlockId {
        self.end
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.all_blocks.iter()
    }

    /// Blocks in reverse post-order.
    pub fn rpo_blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.rpo_order.iter().map(|id| &self[*id])
    }

    /// Innermost loop around `block`: the block itself when it heads a
    /// loop, else its loop header.
    pub fn containing_loop(&self, block: BlockId) -> Option<BlockId> {
        let block = &self[block];
        if block.is_loop_header() {
            Some(block.id())
        } else {
            block.loop_header()
        }
    }

    /// Outermost loop around `block`, found by following loop header links
    /// until there are none left.
    pub fn outermost_loop(&self, block: BlockId) -> Option<BlockId> {
        let mut current = self.containing_loop(block)?;
        while let Some(outer) = self[current].loop_header() {
            current = outer;
        }
        Some(current)
    }

    pub fn display<'a>(&'a self, graph: &'a Graph) -> ScheduleDisplay<'a> {
        ScheduleDisplay { schedule: self, graph }
    }

    fn set_control_input(&mut self, block: BlockId, node: NodeId) {
        self[block].set_control_input(node);
        self.set_block_for_node(block, node);
    }

    fn set_block_for_node(&mut self, block: BlockId, node: NodeId) {
        if node.0 >= self.nodeid_to_block.len() {
            self.nodeid_to_block.resize(node.0 + 1, None);
        }
        self.nodeid_to_block[node.0] = Some(block);
    }
}

impl Index<BlockId> for Schedule {
    type Output = BasicBlock;

    fn index(&self, id: BlockId) -> &Self::Output {
        &self.all_blocks[id.0]
    }
}

impl IndexMut<BlockId> for Schedule {
    fn index_mut(&mut self, id: BlockId) -> &mut Self::Output {
        &mut self.all_blocks[id.0]
    }
}

/// Text form of a schedule. Needs the graph to print the nodes.
pub struct ScheduleDisplay<'a> {
    schedule: &'a Schedule,
    graph: &'a Graph
}

impl ScheduleDisplay<'_> {
    fn write_node(&self, f: &mut fmt::Formatter<'_>, node: NodeId) -> fmt::Result {
        match self.graph.node(node) {
            Some(node) => write!(f, "{node}"),
            None => write!(f, "{node}:?"),
        }
    }
}

impl fmt::Display for ScheduleDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let schedule = self.schedule;
        let blocks: Vec<&BasicBlock> = if schedule.rpo_order.is_empty() {
            schedule.blocks().collect()
        } else {
            schedule.rpo_blocks().collect()
        };

        for block in blocks {
            write!(f, "--- BLOCK {}", block.id())?;
            if block.deferred() {
                write!(f, " (deferred)")?;
            }
            if block.predecessor_count() != 0 {
                write!(f, " <- {}", block.predecessors().iter().join(", "))?;
            }
            writeln!(f, " ---")?;

            for node in block.nodes() {
                write!(f, "  ")?;
                self.write_node(f, *node)?;
                writeln!(f)?;
            }

            if block.control() != Control::None {
                write!(f, "  ")?;
                match block.control_input() {
                    Some(input) => self.write_node(f, input)?,
                    None => write!(f, "Goto")?,
                }
                writeln!(f, " -> {}", block.successors().iter().join(", "))?;
            }
        }
        Ok(())
    }
}
