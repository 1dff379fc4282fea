#[cfg(test)]
mod tests {
    use kagc_graph::{Graph, NodeId, NodeOp};
    use kagc_lir::instruction::GapPosition;
    use kagc_lir::{
        AllocationPolicy, ArchOpcode, Constant, Instruction, InstructionSequence, Operand, VReg
    };
    use kagc_schedule::{BlockId, Schedule};
    use kagc_target::linkage::{Linkage, LinkageBuilder};
    use kagc_target::TargetArch;

    fn in_register(vreg: VReg) -> Operand {
        Operand::unallocated(vreg, AllocationPolicy::MustHaveRegister)
    }

    /// `entry` defines a constant and jumps to `exit`, which returns it.
    fn two_blocks() -> (Graph, Schedule) {
        let mut graph = Graph::new();
        let start = graph.new_node(NodeOp::Start, &[]);
        let value = graph.new_node(NodeOp::Int32Constant(42), &[]);
        let ret = graph.new_node(NodeOp::Return, &[value]);

        let mut schedule = Schedule::new(graph.node_count());
        let (entry, exit) = (schedule.start(), schedule.end());
        schedule.add_node(entry, start);
        schedule.add_node(entry, value);
        schedule.add_goto(entry, exit).unwrap();
        schedule.add_return(exit, ret).unwrap();
        schedule.compute_special_rpo().unwrap();
        (graph, schedule)
    }

    /// Branch in the start block, two arms joining in a block with a phi.
    fn diamond() -> (Graph, Schedule, [BlockId; 3]) {
        let mut graph = Graph::new();
        let start = graph.new_node(NodeOp::Start, &[]);
        let cond = graph.new_node(NodeOp::Parameter(0), &[start]);
        let branch = graph.new_node(NodeOp::Branch, &[cond]);
        let one = graph.new_node(NodeOp::Int32Constant(1), &[]);
        let two = graph.new_node(NodeOp::Int32Constant(2), &[]);
        let phi = graph.new_node(NodeOp::Phi, &[one, two]);
        let ret = graph.new_node(NodeOp::Return, &[phi]);

        let mut schedule = Schedule::new(graph.node_count());
        let entry = schedule.start();
        let left = schedule.new_basic_block();
        let right = schedule.new_basic_block();
        let join = schedule.new_basic_block();
        schedule.add_node(entry, start);
        schedule.add_node(entry, cond);
        schedule.add_branch(entry, branch, left, right).unwrap();
        schedule.add_node(left, one);
        schedule.add_goto(left, join).unwrap();
        schedule.add_node(right, two);
        schedule.add_goto(right, join).unwrap();
        schedule.add_node(join, phi);
        schedule.add_return(join, ret).unwrap();
        schedule.compute_special_rpo().unwrap();
        (graph, schedule, [left, right, join])
    }

    /// One move per non-terminal node and a jump or return per block.
    fn lower(seq: &mut InstructionSequence<'_>) {
        let graph = seq.graph();
        let order: Vec<BlockId> = seq.schedule().rpo_order().to_vec();
        for block in order {
            seq.start_block(block).unwrap();
            let nodes: Vec<NodeId> = seq.schedule()[block].nodes().to_vec();
            for node in nodes {
                let op = graph.node(node).map(|n| n.op.clone());
                if let Some(NodeOp::Int32Constant(value)) = op {
                    let vreg = seq.get_virtual_register(node);
                    let operand = seq.add_constant(vreg, Constant::Int32(value));
                    let mov = Instruction::new(ArchOpcode::Arm64Mov32, &[in_register(vreg)], &[operand], &[]);
                    seq.add_instruction(mov).unwrap();
                }
            }
            let last = if seq.schedule()[block].successor_count() == 0 {
                Instruction::new(ArchOpcode::ArchRet, &[], &[], &[])
            } else {
                Instruction::new(ArchOpcode::ArchJmp, &[], &[], &[])
            };
            seq.add_instruction(last).unwrap();
            seq.end_block(block).unwrap();
        }
    }

    #[test]
    fn test_two_block_function() {
        let (graph, schedule) = two_blocks();
        let (entry, exit) = (schedule.start(), schedule.end());
        assert_eq!(schedule[entry].rpo_number(), Some(0));
        assert_eq!(schedule[exit].rpo_number(), Some(1));
        assert_eq!(schedule[entry].successors(), &[exit]);
        assert_eq!(schedule[exit].predecessors(), &[entry]);

        let mut seq = InstructionSequence::new(Linkage::default(), &graph, schedule);
        seq.start_block(entry).unwrap();
        let v0 = seq.get_virtual_register(NodeId(1));
        let value = seq.add_immediate(Constant::Int32(42));
        seq.add_instruction(Instruction::new(ArchOpcode::Arm64Mov32, &[in_register(v0)], &[value], &[]))
            .unwrap();
        let target = seq.add_immediate(Constant::Int32(1));
        seq.add_instruction(Instruction::new(ArchOpcode::ArchJmp, &[], &[target], &[])).unwrap();
        seq.end_block(entry).unwrap();

        seq.start_block(exit).unwrap();
        let result = Operand::unallocated(v0, AllocationPolicy::FixedRegister(0));
        seq.add_instruction(Instruction::new(ArchOpcode::ArchRet, &[], &[result], &[])).unwrap();
        seq.end_block(exit).unwrap();

        let expected = concat!(
            "IMM#0: 42\n",
            "IMM#1: 1\n",
            "RPO#0: B0  instructions: [0, 6)\n",
            "  predecessors:\n",
            "       0:  block-start() () () () \n",
            "       1: gap () () () () \n",
            "       2: v0(R) = Arm64Mov32 [immediate:0]\n",
            "       3: gap () () () () \n",
            "       4: gap () () () () \n",
            "       5: ArchJmp [immediate:1]\n",
            "  goto B1\n",
            "RPO#1: B1  instructions: [6, 10)\n",
            "  predecessors: B0\n",
            "       6:  block-start() () () () \n",
            "       7: gap () () () () \n",
            "       8: gap () () () () \n",
            "       9: ArchRet v0(=x0)\n",
            "  return v2\n",
        );
        assert_eq!(seq.to_string(), expected);
    }

    #[test]
    fn test_swap_at_join_is_kept() {
        let (graph, schedule, [_, _, join]) = diamond();
        let mut seq = InstructionSequence::new(Linkage::default(), &graph, schedule);
        lower(&mut seq);

        let gap = seq.schedule()[join].code_start().unwrap() + 1;
        assert!(seq.is_gap_at(gap));
        seq.add_gap_move(gap, Operand::Register(1), Operand::Register(0)).unwrap();
        seq.add_gap_move(gap, Operand::Register(0), Operand::Register(1)).unwrap();

        let moves = seq
            .instruction_at(gap)
            .and_then(Instruction::gap_moves)
            .and_then(|moves| moves.parallel_move(GapPosition::Start))
            .unwrap();
        assert_eq!(moves.len(), 2);
        assert!(!moves.is_redundant());

        let rendered = seq.to_string();
        assert!(rendered.contains(&format!(
            "{gap:5}: gap () ([x0|R] = [x1|R]; [x1|R] = [x0|R];) () () \n"
        )));
        assert!(rendered.contains("     phi: v5 = v3 v4\n"));
    }

    #[test]
    fn test_rendered_markers_match_structure() {
        let (graph, schedule, _) = diamond();
        let linkage = LinkageBuilder::new(TargetArch::X86_64).parameter_count(1).build();
        let mut seq = InstructionSequence::new(linkage, &graph, schedule);
        lower(&mut seq);
        seq.add_immediate(Constant::Int64(-3));

        let text = seq.to_string();
        let lines: Vec<&str> = text.lines().collect();

        let immediates = lines.iter().filter(|l| l.starts_with("IMM#")).count();
        let constants = lines.iter().filter(|l| l.starts_with("CST#")).count();
        assert_eq!(immediates, 1);
        assert_eq!(constants, 2);

        let headers: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.starts_with("RPO#"))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(headers.len(), seq.basic_block_count());

        for (rpo, line_no) in headers.into_iter().enumerate() {
            let block = seq.block_at(rpo).unwrap();
            let header = lines[line_no];
            assert!(header.starts_with(&format!("RPO#{rpo}: {}", block.id())));

            let range = header.split("instructions: [").nth(1).unwrap().trim_end_matches(')');
            let (start, end) = range.split_once(", ").unwrap();
            assert_eq!(start.parse::<usize>().ok(), block.code_start());
            assert_eq!(end.parse::<usize>().ok(), block.code_end());

            let preds: Vec<String> = lines[line_no + 1]
                .trim_start_matches("  predecessors:")
                .split_whitespace()
                .map(str::to_string)
                .collect();
            let expected: Vec<String> = block.predecessors().iter().map(|p| p.to_string()).collect();
            assert_eq!(preds, expected);
        }
    }

    #[test]
    fn test_every_call_has_exactly_one_listed_pointer_map() {
        let (graph, schedule) = two_blocks();
        let entry = schedule.start();
        let mut seq = InstructionSequence::new(Linkage::default(), &graph, schedule);
        seq.start_block(entry).unwrap();

        let mut calls = vec![];
        for opcode in [ArchOpcode::ArchCallCodeObject, ArchOpcode::Arm64Add, ArchOpcode::ArchCallJSFunction] {
            let index = seq.add_instruction(Instruction::new(opcode, &[], &[], &[])).unwrap();
            if seq.instruction_at(index).unwrap().needs_pointer_map() {
                calls.push(index);
            }
        }

        let positions: Vec<Option<usize>> = seq.pointer_maps().map(|m| m.instruction_position()).collect();
        assert_eq!(positions, calls.iter().copied().map(Some).collect::<Vec<_>>());
        for index in calls {
            assert!(seq.instruction_at(index).unwrap().pointer_map().is_some());
        }
    }

    #[test]
    fn test_distinct_nodes_get_distinct_registers() {
        let (graph, schedule, _) = diamond();
        let mut seq = InstructionSequence::new(Linkage::default(), &graph, schedule);

        let first: Vec<VReg> = graph.iter().map(|n| seq.get_virtual_register(n.id)).collect();
        let again: Vec<VReg> = graph.iter().map(|n| seq.get_virtual_register(n.id)).collect();
        assert_eq!(first, again);

        let mut unique = first.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), graph.node_count());
        assert_eq!(seq.virtual_register_count(), graph.node_count());
    }
}
