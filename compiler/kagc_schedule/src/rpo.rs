// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

//! Special reverse post-order.
//!
//! A plain reverse post-order can interleave a loop body with blocks that
//! are only reached after the loop exits. The register allocator and the
//! loop queries on [`BasicBlock`](crate::BasicBlock) expect every loop body
//! to be one contiguous RPO range `[header, loop_end)`, so the order here is
//! computed region by region: inside a loop every nested loop is treated as
//! a single node until the enclosing body has been ordered.

use indexmap::IndexMap;
use kagc_errors::{InternalResult, InvariantViolation};
use log::debug;

use crate::block::BlockId;
use crate::schedule::Schedule;

#[derive(Debug)]
struct LoopInfo {
    header: usize,
    members: Vec<bool>,
    size: usize,
    parent: Option<usize>
}

impl LoopInfo {
    fn contains(&self, block: usize) -> bool {
        self.members[block]
    }
}

/// Loop forest of the reachable part of a schedule.
struct LoopForest {
    loops: Vec<LoopInfo>,

    /// Innermost loop of every block.
    innermost: Vec<Option<usize>>,

    /// Loop headed by a block.
    headed_by: Vec<Option<usize>>
}

impl LoopForest {
    /// Nested loop directly inside `region` that contains `block`, if any.
    fn child_loop(&self, block: usize, region: Option<usize>) -> Option<usize> {
        let mut current = self.innermost[block];
        while let Some(lp) = current {
            if Some(lp) == region {
                return None;
            }
            if self.loops[lp].parent == region {
                return Some(lp);
            }
            current = self.loops[lp].parent;
        }
        None
    }

    fn depth(&self, block: usize) -> u32 {
        let mut depth = 0;
        let mut current = self.innermost[block];
        while let Some(lp) = current {
            depth += 1;
            current = self.loops[lp].parent;
        }
        depth
    }
}

/// Node of the condensed graph of one region: a plain block, or a nested
/// loop standing in for all of its blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegionItem {
    Block(usize),
    Loop(usize)
}

impl Schedule {
    /// Orders the blocks reachable from the start block so that loop bodies
    /// are contiguous, then fills in RPO numbers, loop headers, loop depths,
    /// loop ends and immediate dominators.
    ///
    /// Fails on irreducible control flow, leaving the schedule untouched.
    pub fn compute_special_rpo(&mut self) -> InternalResult<()> {
        let count = self.basic_block_count();
        let start = self.start().index();

        let (reachable, back_edges) = self.find_back_edges(start);
        let forest = self.build_loop_forest(&reachable, back_edges)?;

        let mut order = Vec::with_capacity(count);
        self.order_region(&forest, &reachable, None, start, &mut order);

        self.set_rpo_order(order.iter().map(|idx| BlockId(*idx)).collect());

        for lp in &forest.loops {
            let loop_end = (0..count)
                .filter(|block| lp.contains(*block))
                .filter_map(|block| self[BlockId(block)].rpo_number())
                .max()
                .map(|last| last + 1);
            self[BlockId(lp.header)].set_loop_end(loop_end);
        }

        for block in order.iter().copied() {
            let header = match forest.innermost[block] {
                Some(lp) if forest.loops[lp].header == block => {
                    forest.loops[lp].parent.map(|parent| forest.loops[parent].header)
                },
                Some(lp) => Some(forest.loops[lp].header),
                None => None
            };
            let depth = forest.depth(block);
            let block = &mut self[BlockId(block)];
            block.set_loop_header(header.map(BlockId));
            block.set_loop_depth(depth);
        }

        self.compute_dominators(&order);

        debug!(
            "schedule: special RPO over {} of {} blocks, {} loop(s)",
            order.len(),
            count,
            forest.loops.len()
        );
        Ok(())
    }

    /// Depth-first walk from `start`. Returns the reachable set and the
    /// back edges `(from, header)` keyed by header in discovery order.
    fn find_back_edges(&self, start: usize) -> (Vec<bool>, IndexMap<usize, Vec<usize>>) {
        const UNVISITED: u8 = 0;
        const ON_STACK: u8 = 1;
        const DONE: u8 = 2;

        let count = self.basic_block_count();
        let mut state = vec![UNVISITED; count];
        let mut back_edges: IndexMap<usize, Vec<usize>> = IndexMap::new();
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        state[start] = ON_STACK;

        while let Some((block, next)) = stack.pop() {
            let successors = self[BlockId(block)].successors();
            if next < successors.len() {
                stack.push((block, next + 1));
                let succ = successors[next].index();
                match state[succ] {
                    UNVISITED => {
                        state[succ] = ON_STACK;
                        stack.push((succ, 0));
                    },
                    ON_STACK => back_edges.entry(succ).or_default().push(block),
                    _ => ()
                }
            } else {
                state[block] = DONE;
            }
        }

        let reachable = state.iter().map(|s| *s != UNVISITED).collect();
        (reachable, back_edges)
    }

    fn build_loop_forest(
        &self,
        reachable: &[bool],
        back_edges: IndexMap<usize, Vec<usize>>
    ) -> InternalResult<LoopForest> {
        let start = self.start().index();
        let count = self.basic_block_count();
        let mut loops = Vec::with_capacity(back_edges.len());

        for (header, sources) in back_edges {
            let mut members = vec![false; count];
            members[header] = true;
            let mut worklist = sources;
            while let Some(block) = worklist.pop() {
                if members[block] || !reachable[block] {
                    continue;
                }
                members[block] = true;
                worklist.extend(self[BlockId(block)].predecessors().iter().map(|p| p.index()));
            }
            // Walking back from a back edge source reaches the start block
            // only if the header does not dominate that source.
            if header != start && members[start] {
                return Err(InvariantViolation::IrreducibleControlFlow { header });
            }
            let size = members.iter().filter(|m| **m).count();
            loops.push(LoopInfo { header, members, size, parent: None });
        }

        // Parent = smallest strictly larger loop holding the header. Loops are
        // either nested or disjoint once every header dominates its body.
        for idx in 0..loops.len() {
            let header = loops[idx].header;
            let size = loops[idx].size;
            loops[idx].parent = (0..loops.len())
                .filter(|other| *other != idx)
                .filter(|other| loops[*other].contains(header) && loops[*other].size > size)
                .min_by_key(|other| loops[*other].size);
        }

        let mut innermost = vec![None; count];
        let mut headed_by = vec![None; count];
        for block in 0..count {
            innermost[block] = (0..loops.len())
                .filter(|lp| loops[*lp].contains(block))
                .min_by_key(|lp| loops[*lp].size);
        }
        for (idx, lp) in loops.iter().enumerate() {
            headed_by[lp.header] = Some(idx);
        }

        Ok(LoopForest { loops, innermost, headed_by })
    }

    fn in_region(&self, forest: &LoopForest, reachable: &[bool], region: Option<usize>, block: usize) -> bool {
        match region {
            Some(lp) => forest.loops[lp].contains(block),
            None => reachable[block]
        }
    }

    fn region_item(&self, forest: &LoopForest, region: Option<usize>, block: usize) -> RegionItem {
        match forest.child_loop(block, region) {
            Some(lp) => RegionItem::Loop(lp),
            None => RegionItem::Block(block)
        }
    }

    /// Successor items of `item` inside `region`, in successor order.
    fn region_successors(
        &self,
        forest: &LoopForest,
        reachable: &[bool],
        region: Option<usize>,
        entry: RegionItem,
        item: RegionItem
    ) -> Vec<RegionItem> {
        let sources: Vec<usize> = match item {
            RegionItem::Block(block) => vec![block],
            RegionItem::Loop(lp) => (0..self.basic_block_count())
                .filter(|block| forest.loops[lp].contains(*block))
                .collect()
        };

        let mut result = vec![];
        for source in sources {
            for succ in self[BlockId(source)].successors() {
                let succ = succ.index();
                if !self.in_region(forest, reachable, region, succ) {
                    continue;
                }
                let target = self.region_item(forest, region, succ);
                if target == item || target == entry || result.contains(&target) {
                    continue;
                }
                result.push(target);
            }
        }
        result
    }

    fn order_region(
        &self,
        forest: &LoopForest,
        reachable: &[bool],
        region: Option<usize>,
        entry: usize,
        out: &mut Vec<usize>
    ) {
        let entry_item = self.region_item(forest, region, entry);

        let mut postorder: Vec<RegionItem> = vec![];
        let mut visited: Vec<RegionItem> = vec![entry_item];
        let mut stack: Vec<(RegionItem, Vec<RegionItem>, usize)> = vec![(
            entry_item,
            self.region_successors(forest, reachable, region, entry_item, entry_item),
            0
        )];

        while let Some((item, successors, next)) = stack.pop() {
            if next < successors.len() {
                let succ = successors[next];
                stack.push((item, successors, next + 1));
                if !visited.contains(&succ) {
                    visited.push(succ);
                    let succ_successors = self.region_successors(forest, reachable, region, entry_item, succ);
                    stack.push((succ, succ_successors, 0));
                }
            } else {
                postorder.push(item);
            }
        }

        for item in postorder.into_iter().rev() {
            match item {
                RegionItem::Block(block) => out.push(block),
                RegionItem::Loop(lp) => {
                    let header = forest.loops[lp].header;
                    debug_assert_eq!(forest.headed_by[header], Some(lp));
                    self.order_region(forest, reachable, Some(lp), header, out);
                }
            }
        }
    }

    /// Cooper, Harvey and Kennedy's iterative dominator algorithm over the
    /// freshly computed order.
    fn compute_dominators(&mut self, order: &[usize]) {
        let Some(&root) = order.first() else {
            return;
        };

        let count = self.basic_block_count();
        let mut idom: Vec<Option<usize>> = vec![None; count];
        idom[root] = Some(root);

        let rpo = |schedule: &Schedule, block: usize| {
            schedule[BlockId(block)].rpo_number().unwrap_or(usize::MAX)
        };

        let mut changed = true;
        while changed {
            changed = false;
            for &block in order.iter().skip(1) {
                let mut new_idom: Option<usize> = None;
                for pred in self[BlockId(block)].predecessors() {
                    let pred = pred.index();
                    if idom[pred].is_none() {
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => {
                            let (mut a, mut b) = (pred, current);
                            while a != b {
                                while rpo(self, a) > rpo(self, b) {
                                    a = idom[a].unwrap_or(root);
                                }
                                while rpo(self, b) > rpo(self, a) {
                                    b = idom[b].unwrap_or(root);
                                }
                            }
                            a
                        }
                    });
                }
                if new_idom.is_some() && idom[block] != new_idom {
                    idom[block] = new_idom;
                    changed = true;
                }
            }
        }

        for &block in order {
            let dominator = if block == root { None } else { idom[block].map(BlockId) };
            self[BlockId(block)].set_dominator(dominator);
        }
    }
}
