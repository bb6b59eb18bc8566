//! CFG parser: interprets the generic graph into functions and blocks.
//!
//! Node labels follow the disassembler's conventions: a function-entry node
//! carries just the (mangled) function name, while a block node carries a
//! `name:` line followed by `/*offset*/ instruction ;` lines separated by
//! `\l`. One graph holds the requested outer function plus any
//! locally-scoped inner functions, partitioned here by entry nodes in node
//! order. All offsets are local to the invocation; relocation happens later.

use std::sync::OnceLock;

use regex::Regex;
use rustc_hash::FxHashMap;

use nvcfg_dot::Graph;
use nvcfg_ir::{Block, BlockId, FunctionTable, Inst, Target, TargetKind};

use crate::{Error, Result};
use tracing::debug;

/// Base mnemonics whose outgoing transfer is computed rather than encoded:
/// returns, kernel exits, and the indirect branch/jump families.
const INDIRECT_MNEMONICS: &[&str] = &[
    "RET", "EXIT", "BRX", "JMX", "BRXU", "JMXU", "BREAK", "BRK",
];

static INST_PATTERN: OnceLock<Regex> = OnceLock::new();

fn inst_pattern() -> &'static Regex {
    INST_PATTERN.get_or_init(|| {
        Regex::new(r"^/\*\s*([0-9a-fA-F]+)\s*\*/\s*(?:@(!?\w+)\s+)?([A-Za-z][\w.]*)\s*(.*)$")
            .unwrap()
    })
}

/// One function as parsed from a single graph: a name plus blocks whose
/// targets still use function-local block indices. [`FunctionTable::insert`]
/// rebases them onto the arena.
#[derive(Clone, Debug)]
pub struct ParsedFunction {
    pub name: String,
    pub blocks: Vec<Block>,
}

/// Role of a graph node after label classification.
#[derive(Clone, Copy, Debug)]
enum NodeRole {
    /// Function-entry marker; the value indexes the output function.
    Entry(usize),
    /// Ordinary block: (function index, local block index).
    Block(usize, usize),
    /// Unlabeled helper node; carries no CFG content.
    Skip,
}

/// Whether a label marks a function-entry node (a bare name, no
/// instruction lines).
fn is_entry_label(label: &str) -> bool {
    !label.is_empty() && !label.contains("\\l") && !label.contains("/*")
}

/// Parse one instruction line: `/*0008*/ @!P0 BRA `(.L_1) ;`.
fn parse_inst_line(line: &str) -> Option<Inst> {
    let captures = inst_pattern().captures(line)?;
    let offset = u64::from_str_radix(&captures[1], 16).ok()?;
    let predicate = captures.get(2).map(|m| m.as_str().to_string());
    let opcode = captures[3].to_string();
    let operands = captures[4]
        .trim()
        .trim_end_matches(';')
        .trim()
        .split(',')
        .map(str::trim)
        .filter(|op| !op.is_empty())
        .map(str::to_string)
        .collect();
    Some(Inst::new(offset, predicate, opcode, operands))
}

/// Build a block from a block-node label.
fn parse_block_label(label: &str) -> Block {
    let trimmed = label
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .trim();

    let mut name = String::new();
    let mut insts = Vec::new();
    for (i, segment) in trimmed.split("\\l").enumerate() {
        let segment = segment.trim().trim_matches('|').trim();
        if segment.is_empty() {
            continue;
        }
        if i == 0 && !segment.starts_with("/*") {
            name = segment.trim_end_matches(':').to_string();
            continue;
        }
        if let Some(inst) = parse_inst_line(segment) {
            insts.push(inst);
        }
    }

    let mut block = Block::new(name);
    if let Some(first) = insts.first() {
        block.begin_offset = first.offset;
        block.address = first.offset;
    }
    block.insts = insts;
    block
}

/// Partition a graph's nodes into functions and type its edges.
///
/// # Errors
/// Fails if a block node appears before any entry node; the caller treats
/// this like any other unparsable output for the symbol.
pub fn parse(graph: &Graph) -> Result<Vec<ParsedFunction>> {
    let mut functions: Vec<ParsedFunction> = Vec::new();
    let mut roles = Vec::with_capacity(graph.len());

    for node in graph.nodes() {
        if node.label.is_empty() {
            roles.push(NodeRole::Skip);
        } else if is_entry_label(&node.label) {
            functions.push(ParsedFunction {
                name: node.label.trim().to_string(),
                blocks: Vec::new(),
            });
            roles.push(NodeRole::Entry(functions.len() - 1));
        } else {
            let Some(function) = functions.last_mut() else {
                return Err(Error::OrphanBlock {
                    node: node.id.clone(),
                });
            };
            function.blocks.push(parse_block_label(&node.label));
            let block_index = function.blocks.len() - 1;
            roles.push(NodeRole::Block(functions.len() - 1, block_index));
        }
    }

    for &(from, to) in graph.edges() {
        let (NodeRole::Block(fu, bu), NodeRole::Block(fv, bv)) = (roles[from], roles[to]) else {
            // Entry-node edges mark the entry block; helper-node edges carry
            // nothing the model keeps.
            continue;
        };
        if fu != fv {
            debug!(
                from = %graph.node(from).id,
                to = %graph.node(to).id,
                "dropping edge crossing function partitions"
            );
            continue;
        }

        let source = &mut functions[fu].blocks[bu];
        if source.is_empty() {
            continue;
        }
        let kind = if source
            .insts
            .last()
            .is_some_and(|inst| INDIRECT_MNEMONICS.contains(&inst.base_opcode()))
        {
            TargetKind::Indirect
        } else {
            TargetKind::Direct
        };
        source.targets.push(Target {
            inst: source.insts.len() - 1,
            block: BlockId(bv),
            kind,
        });
    }

    Ok(functions)
}

/// Extract a callee name from a call operand (`` `(_Z3barv) `` -> `_Z3barv`).
fn callee_name(operand: &str) -> Option<&str> {
    let token = operand
        .trim()
        .trim_start_matches('`')
        .trim_start_matches('(')
        .trim_end_matches(')');
    let mut chars = token.chars();
    let first = chars.next()?;
    if (first.is_ascii_alphabetic() || matches!(first, '_' | '$' | '.'))
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
    {
        Some(token)
    } else {
        None
    }
}

/// Parse a hex call operand (`0x1000`).
fn callee_address(operand: &str) -> Option<u64> {
    let hex = operand.trim().strip_prefix("0x")?;
    u64::from_str_radix(hex, 16).ok()
}

/// Second pass: add call edges across the completed function collection.
///
/// Call targets may name a function parsed from a different invocation, or
/// one that was synthesized, so this only runs once the table's membership
/// and addresses are final. Callees resolve by operand name first, then by
/// relocated address; operands resolving to nothing (indirect calls) are
/// skipped.
///
/// # Errors
/// Only on an internal invariant violation (a resolved destination outside
/// the arena); a correct table never produces one.
pub fn parse_calls(table: &mut FunctionTable) -> Result<()> {
    let by_address: FxHashMap<u64, usize> = table
        .functions()
        .iter()
        .enumerate()
        .map(|(i, f)| (f.address, i))
        .collect();

    let mut additions: Vec<(BlockId, Target)> = Vec::new();
    for function in table.functions() {
        for &block_id in &function.blocks {
            let block = table.block(block_id);
            for (inst_idx, inst) in block.insts.iter().enumerate() {
                if !inst.is_call() {
                    continue;
                }
                let callee = inst.operands.iter().find_map(|op| {
                    callee_name(op)
                        .and_then(|name| table.index_of(name))
                        .or_else(|| {
                            callee_address(op).and_then(|addr| by_address.get(&addr).copied())
                        })
                });
                let Some(callee) = callee else { continue };
                let Some(entry) = table.entry_of(callee) else {
                    continue;
                };
                additions.push((
                    block_id,
                    Target {
                        inst: inst_idx,
                        block: entry,
                        kind: TargetKind::Call,
                    },
                ));
            }
        }
    }

    for (block_id, target) in additions {
        table.add_target(block_id, target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with_chain() -> Graph {
        let mut graph = Graph::new();
        graph.add_node("foo", "foo");
        graph.add_node(
            ".L_0",
            "{.L_0:\\l/*0000*/ MOV R1, c[0x0][0x28] ;\\l/*0010*/ @!P0 BRA `(.L_1) ;\\l}",
        );
        graph.add_node(".L_1", "{.L_1:\\l/*0020*/ EXIT ;\\l}");
        graph.add_edge(0, 1);
        graph.add_edge(1, 2);
        graph
    }

    #[test]
    fn test_parse_single_function() {
        let functions = parse(&graph_with_chain()).unwrap();
        assert_eq!(functions.len(), 1);
        assert_eq!(functions[0].name, "foo");
        assert_eq!(functions[0].blocks.len(), 2);

        let entry = &functions[0].blocks[0];
        assert_eq!(entry.name, ".L_0");
        assert_eq!(entry.begin_offset, 0);
        assert_eq!(entry.insts.len(), 2);
        assert_eq!(entry.insts[1].offset, 0x10);
        assert_eq!(entry.insts[1].predicate.as_deref(), Some("!P0"));
        assert_eq!(entry.insts[1].opcode, "BRA");

        // Entry -> .L_0 is structural; .L_0 -> .L_1 is a direct edge from
        // the last instruction.
        assert_eq!(entry.targets.len(), 1);
        assert_eq!(entry.targets[0].block, BlockId(1));
        assert_eq!(entry.targets[0].inst, 1);
        assert_eq!(entry.targets[0].kind, TargetKind::Direct);
    }

    #[test]
    fn test_indirect_edge_from_exit() {
        let mut graph = Graph::new();
        graph.add_node("f", "f");
        graph.add_node(".L_0", "{.L_0:\\l/*0000*/ EXIT ;\\l}");
        graph.add_node(".L_1", "{.L_1:\\l/*0010*/ NOP ;\\l}");
        graph.add_edge(1, 2);
        let functions = parse(&graph).unwrap();
        assert_eq!(functions[0].blocks[0].targets[0].kind, TargetKind::Indirect);
    }

    #[test]
    fn test_inner_function_partitions_nodes() {
        let mut graph = Graph::new();
        graph.add_node("outer", "outer");
        graph.add_node(".L_0", "{.L_0:\\l/*0000*/ CAL `(inner) ;\\l}");
        graph.add_node("inner", "inner");
        graph.add_node(".L_1", "{.L_1:\\l/*0000*/ RET ;\\l}");
        let functions = parse(&graph).unwrap();
        assert_eq!(functions.len(), 2);
        assert_eq!(functions[0].name, "outer");
        assert_eq!(functions[0].blocks.len(), 1);
        assert_eq!(functions[1].name, "inner");
        assert_eq!(functions[1].blocks.len(), 1);
    }

    #[test]
    fn test_block_before_entry_is_an_error() {
        let mut graph = Graph::new();
        graph.add_node(".L_0", "{.L_0:\\l/*0000*/ NOP ;\\l}");
        assert!(matches!(parse(&graph), Err(Error::OrphanBlock { .. })));
    }

    #[test]
    fn test_cross_function_edge_is_dropped() {
        let mut graph = Graph::new();
        graph.add_node("a", "a");
        graph.add_node(".L_0", "{.L_0:\\l/*0000*/ BRA `(.L_1) ;\\l}");
        graph.add_node("b", "b");
        graph.add_node(".L_1", "{.L_1:\\l/*0000*/ EXIT ;\\l}");
        graph.add_edge(1, 3);
        let functions = parse(&graph).unwrap();
        assert!(functions[0].blocks[0].targets.is_empty());
    }

    fn block_with_inst(name: &str, inst: Inst) -> Block {
        let mut block = Block::new(name.to_string());
        block.begin_offset = inst.offset;
        block.address = inst.offset;
        block.insts = vec![inst];
        block
    }

    #[test]
    fn test_parse_calls_by_name() {
        let mut table = FunctionTable::new();
        table.insert(
            "caller",
            vec![block_with_inst(
                ".L_0",
                Inst::new(
                    0x0,
                    None,
                    "CALL.REL.NOINC".to_string(),
                    vec!["R6".to_string(), "`(callee)".to_string()],
                ),
            )],
        )
        .unwrap();
        table.insert(
            "callee",
            vec![block_with_inst(".L_1", Inst::placeholder(0x100))],
        )
        .unwrap();

        parse_calls(&mut table).unwrap();

        let caller_entry = table.entry_of(0).unwrap();
        let callee_entry = table.entry_of(1).unwrap();
        let targets = &table.block(caller_entry).targets;
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].block, callee_entry);
        assert_eq!(targets[0].kind, TargetKind::Call);
        assert_eq!(targets[0].inst, 0);
    }

    #[test]
    fn test_parse_calls_by_address() {
        let mut table = FunctionTable::new();
        table.insert(
            "caller",
            vec![block_with_inst(
                ".L_0",
                Inst::new(0x0, None, "CAL".to_string(), vec!["0x2000".to_string()]),
            )],
        )
        .unwrap();
        let callee =
            table.insert("callee", vec![block_with_inst(".L_1", Inst::placeholder(0x2000))]);
        table.function_mut(callee.unwrap()).address = 0x2000;

        parse_calls(&mut table).unwrap();

        let caller_entry = table.entry_of(0).unwrap();
        assert_eq!(table.block(caller_entry).targets.len(), 1);
    }

    #[test]
    fn test_unresolvable_call_is_skipped() {
        let mut table = FunctionTable::new();
        table.insert(
            "caller",
            vec![block_with_inst(
                ".L_0",
                Inst::new(0x0, None, "CALL.ABS.NOINC".to_string(), vec!["R20".to_string()]),
            )],
        )
        .unwrap();
        parse_calls(&mut table).unwrap();
        assert!(table.block(BlockId(0)).targets.is_empty());
    }
}
