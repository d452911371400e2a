//! Indented-text export of a render tree.
//!
//! Nested levels are prefixed with `"| "`; internal nodes close with a
//! summary line carrying the result, the duration, and the call multiset.

use std::collections::BTreeMap;

use crate::render::RenderNode;

/// Renders a render tree as an indented text block. `ignore_args` drops the
/// recorded arguments and results from the output.
pub fn render_text(node: &RenderNode, ignore_args: bool) -> String {
    let mut lines = Vec::new();
    write_node(node, ignore_args, &mut lines);
    lines.join("\n")
}

fn write_node(node: &RenderNode, ignore_args: bool, lines: &mut Vec<String>) {
    let label = text_label(node, ignore_args);

    if node.children().is_empty() {
        lines.push(format!("{label} {:.2}ms", node.length_ms()));
        return;
    }

    lines.push(label);
    for child in node.children() {
        let mut child_lines = Vec::new();
        write_node(child, ignore_args, &mut child_lines);
        for line in child_lines {
            lines.push(format!("| {line}"));
        }
    }

    let result = if ignore_args {
        String::new()
    } else {
        format!(" {}", node.result_display)
    };
    lines.push(format!(
        "\\ ->{result} {:.2}ms {}",
        node.length_ms(),
        format_calls(node.calls())
    ));
}

fn text_label(node: &RenderNode, ignore_args: bool) -> String {
    if node.group_size() > 1 {
        format!("{} x{}", node.group(), node.group_size())
    } else if ignore_args {
        node.group().to_string()
    } else {
        format!("{}{}", node.group(), node.args_display)
    }
}

// Keys are single-quoted, matching the repr layout of recorded strings.
fn format_calls(calls: &BTreeMap<String, u64>) -> String {
    let entries: Vec<String> = calls
        .iter()
        .map(|(name, count)| format!("'{name}': {count}"))
        .collect();
    format!("{{{}}}", entries.join(", "))
}
