//! Line-oriented dot parser.
//!
//! Accepts the statement-per-line subset the disassembler emits: node
//! statements with attribute lists, edge statements, and structural lines
//! (graph headers, subgraph clusters, attribute defaults) which carry no
//! graph content. Anything else fails the parse; the caller treats that the
//! same as a disassembler failure for the symbol in question.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::{DotError, Graph, Result};

static EDGE_PATTERN: OnceLock<Regex> = OnceLock::new();
static NODE_PATTERN: OnceLock<Regex> = OnceLock::new();
static LABEL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn edge_pattern() -> &'static Regex {
    EDGE_PATTERN.get_or_init(|| {
        Regex::new(
            r#"^("(?:[^"\\]|\\.)*"|[\w.$]+)\s*->\s*("(?:[^"\\]|\\.)*"|[\w.$]+)\s*(?:\[.*\])?\s*;?$"#,
        )
        .unwrap()
    })
}

fn node_pattern() -> &'static Regex {
    NODE_PATTERN.get_or_init(|| {
        Regex::new(r#"^("(?:[^"\\]|\\.)*"|[\w.$]+)\s*(?:\[(.*)\])?\s*;?$"#).unwrap()
    })
}

fn label_pattern() -> &'static Regex {
    LABEL_PATTERN
        .get_or_init(|| Regex::new(r#"label\s*=\s*"((?:[^"\\]|\\.)*)""#).unwrap())
}

/// Strip surrounding quotes and resolve `\"` escapes; other backslash
/// sequences (notably `\l` line separators) are kept verbatim for the
/// label's consumer.
fn unquote(token: &str) -> String {
    let inner = token
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(token);
    inner.replace("\\\"", "\"")
}

/// Whether a line is graph structure with no node/edge content.
fn is_structural(line: &str) -> bool {
    if line.is_empty() || line == "{" || line == "}" || line.ends_with('{') {
        return true;
    }
    if line.starts_with("//") || line.starts_with('#') {
        return true;
    }
    let keyword = line.split([' ', '\t', '[']).next().unwrap_or("");
    if matches!(keyword, "digraph" | "graph" | "subgraph" | "node" | "edge") {
        return true;
    }
    // Bare attribute assignment such as `rankdir=TB;` or `label = "...";`.
    !line.contains("->") && !line.contains('[') && line.contains('=')
}

/// Read a graph from a file.
///
/// # Errors
/// Fails on I/O errors and on unparsable graph syntax.
pub fn read_graph(path: &Path) -> Result<Graph> {
    let text = std::fs::read_to_string(path)?;
    parse_graph(&text)
}

/// Parse a graph from dot text.
///
/// # Errors
/// Fails on unparsable graph syntax or edges between undeclared nodes.
pub fn parse_graph(text: &str) -> Result<Graph> {
    let mut graph = Graph::new();

    for (number, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if is_structural(line) {
            continue;
        }

        if line.contains("->") {
            let captures = edge_pattern().captures(line).ok_or_else(|| DotError::Syntax {
                line: number + 1,
                text: line.to_string(),
            })?;
            let from_id = unquote(&captures[1]);
            let to_id = unquote(&captures[2]);
            let from = graph
                .index_of(&from_id)
                .ok_or_else(|| DotError::UnknownNode {
                    line: number + 1,
                    id: from_id.clone(),
                })?;
            let to = graph.index_of(&to_id).ok_or_else(|| DotError::UnknownNode {
                line: number + 1,
                id: to_id.clone(),
            })?;
            graph.add_edge(from, to);
            continue;
        }

        let captures = node_pattern().captures(line).ok_or_else(|| DotError::Syntax {
            line: number + 1,
            text: line.to_string(),
        })?;
        let id = unquote(&captures[1]);
        let label = captures
            .get(2)
            .and_then(|attrs| label_pattern().captures(attrs.as_str()))
            .map(|c| unquote(&format!("\"{}\"", &c[1])))
            .unwrap_or_default();
        graph.add_node(&id, &label);
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"digraph "foo" {
	rankdir = TB;
	node [shape=record];
	"foo" [shape=plaintext, label="foo"];
	".L_0" [label="{.L_0:\l/*0000*/ MOV R1, c[0x0][0x28] ;\l/*0010*/ BRA `(.L_1) ;\l}"];
	".L_1" [label="{.L_1:\l/*0020*/ EXIT ;\l}"];
	"foo" -> ".L_0" [style=dotted];
	".L_0" -> ".L_1";
}
"#;

    #[test]
    fn test_parse_sample() {
        let graph = parse_graph(SAMPLE).unwrap();
        assert_eq!(graph.len(), 3);
        assert_eq!(graph.node(0).id, "foo");
        assert_eq!(graph.node(0).label, "foo");
        assert_eq!(graph.node(1).id, ".L_0");
        assert!(graph.node(1).label.contains("/*0010*/ BRA `(.L_1) ;"));
        assert_eq!(graph.edges(), &[(0, 1), (1, 2)]);
    }

    #[test]
    fn test_escaped_quotes_in_label() {
        let text = "\"n\" [label=\"say \\\"hi\\\"\"];\n";
        let graph = parse_graph(text).unwrap();
        assert_eq!(graph.node(0).label, "say \"hi\"");
    }

    #[test]
    fn test_node_without_label() {
        let graph = parse_graph("\"n\" [shape=point];\n").unwrap();
        assert_eq!(graph.node(0).label, "");
    }

    #[test]
    fn test_edge_to_undeclared_node() {
        let err = parse_graph("\"a\" [label=\"a\"];\n\"a\" -> \"b\";\n");
        assert!(matches!(err, Err(DotError::UnknownNode { .. })));
    }

    #[test]
    fn test_malformed_line_fails() {
        let err = parse_graph("!!! not a statement\n");
        assert!(matches!(err, Err(DotError::Syntax { .. })));
    }

    #[test]
    fn test_structural_lines_skipped() {
        let text = "digraph x {\nsubgraph cluster_0 {\nrankdir=TB;\n}\n}\n";
        let graph = parse_graph(text).unwrap();
        assert!(graph.is_empty());
    }
}
