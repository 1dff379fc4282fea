// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use std::fmt;

use kagc_errors::{InternalResult, InvariantViolation};
use kagc_graph::NodeId;

/// Dense block identifier; doubles as the index into the owning
/// schedule's block arena.
#[derive(Default, Debug, Hash, Eq, PartialEq, PartialOrd, Ord, Clone, Copy)]
pub struct BlockId(pub usize);

impl BlockId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "B{}", self.0)
    }
}

/// Control transfer that ends a block.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// Not terminated yet.
    #[default]
    None,

    /// Jump to the single successor.
    Goto,

    /// Go to the first successor if the condition holds, otherwise to the
    /// second one.
    Branch,

    Return,
    Throw
}

impl Control {
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Goto => "goto",
            Self::Branch => "branch",
            Self::Return => "return",
            Self::Throw => "throw",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A basic block: an ordered list of graph nodes ended by one control.
///
/// Phi nodes, when present, occupy the front of the node list. Blocks never
/// own each other; predecessors, successors, the dominator and the loop
/// header are ids into the schedule's arena.
#[derive(Debug, Clone)]
pub struct BasicBlock {
    id: BlockId,

    /// Position in the special reverse post-order, `None` until ordered.
    rpo_number: Option<usize>,

    dominator: Option<BlockId>,

    /// Innermost loop header enclosing this block. For a loop header this is
    /// the header of the enclosing loop, not the block itself.
    loop_header: Option<BlockId>,

    /// 0 means not inside any loop.
    loop_depth: u32,

    /// Exclusive RPO bound of the loop body. Only loop headers have one.
    loop_end: Option<usize>,

    /// Instruction range `[code_start, code_end)` once lowered.
    code_start: Option<usize>,
    code_end: Option<usize>,

    /// Slow path, laid out out of line.
    deferred: bool,

    control: Control,
    control_input: Option<NodeId>,

    nodes: Vec<NodeId>,
    successors: Vec<BlockId>,
    predecessors: Vec<BlockId>
}

impl BasicBlock {
    pub fn new(id: BlockId) -> Self {
        Self {
            id,
            rpo_number: None,
            dominator: None,
            loop_header: None,
            loop_depth: 0,
            loop_end: None,
            code_start: None,
            code_end: None,
            deferred: false,
            control: Control::None,
            control_input: None,
            nodes: vec![],
            successors: vec![],
            predecessors: vec![]
        }
    }

    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn first_instruction_index(&self) -> Option<usize> {
        self.code_start
    }

    pub fn last_instruction_index(&self) -> Option<usize> {
        match (self.code_start, self.code_end) {
            (Some(start), Some(end)) if end > start => Some(end - 1),
            _ => None
        }
    }

    pub fn predecessors(&self) -> &[BlockId] {
        &self.predecessors
    }

    pub fn predecessor_count(&self) -> usize {
        self.predecessors.len()
    }

    pub fn predecessor_at(&self, index: usize) -> Option<BlockId> {
        self.predecessors.get(index).copied()
    }

    /// Position of `predecessor` in the predecessor list. Phi inputs are
    /// indexed the same way.
    pub fn predecessor_index_of(&self, predecessor: BlockId) -> Option<usize> {
        self.predecessors.iter().position(|pred| *pred == predecessor)
    }

    /// No de-duplication: a block can reach another through several edges.
    pub fn add_predecessor(&mut self, predecessor: BlockId) {
        self.predecessors.push(predecessor);
    }

    pub fn successors(&self) -> &[BlockId] {
        &self.successors
    }

    pub fn successor_count(&self) -> usize {
        self.successors.len()
    }

    pub fn successor_at(&self, index: usize) -> Option<BlockId> {
        self.successors.get(index).copied()
    }

    pub fn add_successor(&mut self, successor: BlockId) {
        self.successors.push(successor);
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn node_at(&self, index: usize) -> Option<NodeId> {
        self.nodes.get(index).copied()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn add_node(&mut self, node: NodeId) {
        self.nodes.push(node);
    }

    pub(crate) fn remove_node(&mut self, node: NodeId) {
        self.nodes.retain(|n| *n != node);
    }

    /// Inserts `nodes` before position `at`.
    pub fn insert_nodes<I>(&mut self, at: usize, nodes: I)
    where
        I: IntoIterator<Item = NodeId>
    {
        let at = at.min(self.nodes.len());
        self.nodes.splice(at..at, nodes);
    }

    pub fn control(&self) -> Control {
        self.control
    }

    pub fn set_control(&mut self, control: Control) -> InternalResult<()> {
        if self.control != Control::None {
            return Err(InvariantViolation::ControlAlreadySet {
                block: self.id.0,
                control: self.control.name()
            });
        }
        self.control = control;
        Ok(())
    }

    /// Forgets the terminating control so that a new one can be set.
    /// Successor edges stay in place.
    pub fn reset_control(&mut self) {
        self.control = Control::None;
        self.control_input = None;
    }

    pub fn control_input(&self) -> Option<NodeId> {
        self.control_input
    }

    pub fn set_control_input(&mut self, input: NodeId) {
        self.control_input = Some(input);
    }

    pub fn dominator(&self) -> Option<BlockId> {
        self.dominator
    }

    pub fn set_dominator(&mut self, dominator: Option<BlockId>) {
        self.dominator = dominator;
    }

    pub fn loop_header(&self) -> Option<BlockId> {
        self.loop_header
    }

    pub fn set_loop_header(&mut self, header: Option<BlockId>) {
        self.loop_header = header;
    }

    pub fn loop_depth(&self) -> u32 {
        self.loop_depth
    }

    pub fn set_loop_depth(&mut self, depth: u32) {
        self.loop_depth = depth;
    }

    pub fn loop_end(&self) -> Option<usize> {
        self.loop_end
    }

    pub fn set_loop_end(&mut self, end: Option<usize>) {
        self.loop_end = end;
    }

    pub fn rpo_number(&self) -> Option<usize> {
        self.rpo_number
    }

    pub fn set_rpo_number(&mut self, number: Option<usize>) {
        self.rpo_number = number;
    }

    pub fn code_start(&self) -> Option<usize> {
        self.code_start
    }

    pub fn set_code_start(&mut self, start: usize) {
        self.code_start = Some(start);
    }

    pub fn code_end(&self) -> Option<usize> {
        self.code_end
    }

    pub fn set_code_end(&mut self, end: usize) {
        self.code_end = Some(end);
    }

    pub fn deferred(&self) -> bool {
        self.deferred
    }

    pub fn set_deferred(&mut self, deferred: bool) {
        self.deferred = deferred;
    }

    pub fn is_loop_header(&self) -> bool {
        self.loop_end.is_some()
    }

    /// Whether `other` lies in the loop headed by this block, i.e. its RPO
    /// number is in `[self.rpo_number, self.loop_end)`.
    pub fn loop_contains(&self, other: &BasicBlock) -> bool {
        match (self.rpo_number, self.loop_end, other.rpo_number) {
            (Some(start), Some(end), Some(rpo)) => start <= rpo && rpo < end,
            _ => false
        }
    }

    pub(crate) fn clear_order_info(&mut self) {
        self.rpo_number = None;
        self.dominator = None;
        self.loop_header = None;
        self.loop_depth = 0;
        self.loop_end = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_at(id: usize, rpo: usize) -> BasicBlock {
        let mut block = BasicBlock::new(BlockId(id));
        block.set_rpo_number(Some(rpo));
        block
    }

    #[test]
    fn test_new_block_is_unscheduled() {
        let block = BasicBlock::new(BlockId(4));
        assert_eq!(block.id(), BlockId(4));
        assert_eq!(block.rpo_number(), None);
        assert_eq!(block.control(), Control::None);
        assert_eq!(block.loop_depth(), 0);
        assert!(!block.is_loop_header());
        assert!(!block.deferred());
    }

    #[test]
    fn test_set_control_twice_is_rejected() {
        let mut block = BasicBlock::new(BlockId(2));
        assert!(block.set_control(Control::Goto).is_ok());

        let err = block.set_control(Control::Return).unwrap_err();
        assert_eq!(err, InvariantViolation::ControlAlreadySet { block: 2, control: "goto" });
        assert_eq!(block.control(), Control::Goto);

        block.reset_control();
        assert!(block.set_control(Control::Return).is_ok());
    }

    #[test]
    fn test_loop_contains_uses_half_open_rpo_range() {
        let mut header = block_at(1, 2);
        header.set_loop_end(Some(5));
        assert!(header.is_loop_header());

        let inside: Vec<BasicBlock> = (2..5).map(|rpo| block_at(10 + rpo, rpo)).collect();
        for block in &inside {
            assert!(header.loop_contains(block));
        }

        assert!(!header.loop_contains(&block_at(20, 1)));
        assert!(!header.loop_contains(&block_at(21, 5)));
        assert!(!header.loop_contains(&BasicBlock::new(BlockId(22))));
    }

    #[test]
    fn test_non_header_contains_nothing() {
        let block = block_at(0, 0);
        assert!(!block.loop_contains(&block_at(1, 0)));
    }

    #[test]
    fn test_duplicate_predecessors_are_kept() {
        let mut block = BasicBlock::new(BlockId(3));
        block.add_predecessor(BlockId(1));
        block.add_predecessor(BlockId(1));
        block.add_predecessor(BlockId(2));

        assert_eq!(block.predecessor_count(), 3);
        assert_eq!(block.predecessor_index_of(BlockId(1)), Some(0));
        assert_eq!(block.predecessor_index_of(BlockId(2)), Some(2));
        assert_eq!(block.predecessor_index_of(BlockId(9)), None);
    }

    #[test]
    fn test_insert_nodes_keeps_phis_in_front() {
        let mut block = BasicBlock::new(BlockId(0));
        block.add_node(NodeId(7));
        block.add_node(NodeId(8));
        block.insert_nodes(0, [NodeId(3), NodeId(4)]);

        assert_eq!(block.nodes(), &[NodeId(3), NodeId(4), NodeId(7), NodeId(8)]);
    }

    #[test]
    fn test_instruction_range() {
        let mut block = BasicBlock::new(BlockId(0));
        assert_eq!(block.last_instruction_index(), None);

        block.set_code_start(4);
        block.set_code_end(9);
        assert_eq!(block.first_instruction_index(), Some(4));
        assert_eq!(block.last_instruction_index(), Some(8));
    }

    #[test]
    fn test_control_names() {
        assert_eq!(Control::None.to_string(), "none");
        assert_eq!(Control::Goto.to_string(), "goto");
        assert_eq!(Control::Branch.to_string(), "branch");
        assert_eq!(Control::Return.to_string(), "return");
        assert_eq!(Control::Throw.to_string(), "throw");
        assert_eq!(BlockId(12).to_string(), "B12");
    }
}
