// SPDX-License-Identifier: MIT
// Copyright (c) 2023 Kagati Foundation

use std::collections::HashMap;
use std::fmt;

use kagc_graph::NodeId;

/// Virtual register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VReg(pub usize);

impl VReg {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for VReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Hands out virtual registers and remembers which graph node got which.
#[derive(Debug, Default)]
pub struct VRegMapper {
    pub(crate) vreg_id: usize,
    pub(crate) mapping: HashMap<NodeId, VReg>
}

impl VRegMapper {
    pub fn get_or_create(&mut self, node: NodeId) -> VReg {
        if let Some(&vreg) = self.mapping.get(&node) {
            vreg
        } else {
            let vreg = self.next();
            self.mapping.insert(node, vreg);
            vreg
        }
    }

    /// A fresh register that no node owns, e.g. for a temporary.
    pub fn next(&mut self) -> VReg {
        let vreg = VReg(self.vreg_id);
        self.vreg_id += 1;
        vreg
    }

    pub fn get(&self, node: NodeId) -> Option<VReg> {
        self.mapping.get(&node).copied()
    }

    /// Number of registers handed out so far.
    pub fn count(&self) -> usize {
        self.vreg_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_memoized() {
        let mut mapper = VRegMapper::default();
        let a = mapper.get_or_create(NodeId(4));
        let b = mapper.get_or_create(NodeId(9));
        assert_eq!(a, VReg(0));
        assert_eq!(b, VReg(1));
        assert_eq!(mapper.get_or_create(NodeId(4)), a);
        assert_eq!(mapper.count(), 2);
    }

    #[test]
    fn test_next_skips_the_node_mapping() {
        let mut mapper = VRegMapper::default();
        let temp = mapper.next();
        let owned = mapper.get_or_create(NodeId(0));
        assert_ne!(temp, owned);
        assert_eq!(mapper.get(NodeId(0)), Some(owned));
        assert_eq!(mapper.get(NodeId(1)), None);
        assert_eq!(VReg(12).to_string(), "v12");
    }
}
