//! ADF (Atlassian Document Format) -> Markdown / plaintext rendering
//! (spec.md §4.5). ADF trees can be hundreds of levels deep on degenerate
//! input (spec.md §9), so every recursive renderer here is depth-guarded:
//! past `MAX_DEPTH` a node's children stop being descended into instead of
//! overflowing the stack.

use serde_json::Value;

const MAX_DEPTH: usize = 256;

/// Render an ADF document to Markdown (spec.md §4.5 "ADF -> Markdown").
/// Returns `None` when the document has no text content.
pub fn to_markdown(doc: &Value) -> Option<String> {
    let rendered = render_node(doc, 0);
    let collapsed = collapse_blank_lines(&rendered);
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Last-resort renderer: DFS over `text`/`content`, inserting `\n` per
/// content array entry (spec.md §4.5 "ADF -> plaintext").
pub fn to_plaintext(doc: &Value) -> Option<String> {
    let mut out = String::new();
    plaintext_walk(doc, 0, &mut out);
    let collapsed = collapse_blank_lines(&out);
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn plaintext_walk(node: &Value, depth: usize, out: &mut String) {
    if depth > MAX_DEPTH {
        return;
    }
    let Some(obj) = node.as_object() else { return };
    if let Some(text) = obj.get("text").and_then(Value::as_str) {
        out.push_str(text);
    }
    if let Some(content) = obj.get("content").and_then(Value::as_array) {
        for child in content {
            plaintext_walk(child, depth + 1, out);
            out.push('\n');
        }
    }
}

fn node_type(node: &Value) -> &str {
    node.get("type").and_then(Value::as_str).unwrap_or("")
}

fn children(node: &Value) -> &[Value] {
    node.get("content")
        .and_then(Value::as_array)
        .map(|v| v.as_slice())
        .unwrap_or(&[])
}

fn render_children(node: &Value, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return String::new();
    }
    children(node)
        .iter()
        .map(|child| render_node(child, depth + 1))
        .collect::<Vec<_>>()
        .concat()
}

fn render_node(node: &Value, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return String::new();
    }
    match node_type(node) {
        "doc" => render_children(node, depth),
        "paragraph" => {
            let inner = render_children(node, depth);
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                "\n".to_string()
            } else {
                format!("{trimmed}\n\n")
            }
        }
        "text" => node.get("text").and_then(Value::as_str).unwrap_or("").to_string(),
        "hardBreak" => "\n".to_string(),
        "heading" => {
            let level = node
                .get("attrs")
                .and_then(|a| a.get("level"))
                .and_then(Value::as_u64)
                .unwrap_or(1)
                .clamp(1, 6);
            let hashes = "#".repeat(level as usize);
            let inner = render_children(node, depth);
            format!("{hashes} {}\n\n", inner.trim())
        }
        "bulletList" => render_list(node, depth, "- "),
        "orderedList" => render_list(node, depth, "1. "),
        "listItem" => render_children(node, depth),
        "blockquote" => {
            let inner = render_children(node, depth);
            let trimmed = inner.trim();
            trimmed
                .lines()
                .map(|line| format!("> {line}").trim_end().to_string())
                .collect::<Vec<_>>()
                .join("\n")
                + "\n\n"
        }
        "rule" => "---\n\n".to_string(),
        "codeBlock" => {
            let inner = render_children(node, depth);
            format!("```\n{}\n```\n\n", inner.trim_end_matches('\n'))
        }
        "table" => render_table(node, depth),
        _ => render_children(node, depth),
    }
}

fn render_list(node: &Value, depth: usize, prefix: &str) -> String {
    if depth > MAX_DEPTH {
        return String::new();
    }
    let mut out = String::new();
    for item in children(node) {
        let rendered = render_children(item, depth + 1);
        let trimmed = rendered.trim();
        let mut lines = trimmed.lines();
        if let Some(first) = lines.next() {
            out.push_str(prefix);
            out.push_str(first);
            out.push('\n');
        }
        for line in lines {
            out.push_str("  ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push('\n');
    out
}

/// Render an ADF table into a GFM table (spec.md §4.5): colspan expansion
/// (duplicate the cell, then pad with empty cells), column-width
/// normalization, `|` escaping, and a synthesized blank header row when
/// the first row carries no text. No `rowspan` support.
fn render_table(node: &Value, depth: usize) -> String {
    if depth > MAX_DEPTH {
        return String::new();
    }
    let rows: Vec<Vec<String>> = children(node)
        .iter()
        .filter(|row| node_type(row) == "tableRow")
        .map(|row| render_table_row(row, depth + 1))
        .collect();

    if rows.is_empty() {
        return String::new();
    }

    let width = rows.iter().map(|r| r.len()).max().unwrap_or(0);
    let normalized: Vec<Vec<String>> = rows
        .into_iter()
        .map(|mut r| {
            while r.len() < width {
                r.push(String::new());
            }
            r
        })
        .collect();

    let first_row_has_text = normalized
        .first()
        .map(|r| r.iter().any(|c| !c.trim().is_empty()))
        .unwrap_or(false);

    let mut out = String::new();
    let mut iter = normalized.into_iter();
    let header = if first_row_has_text {
        iter.next().unwrap_or_default()
    } else {
        vec![String::new(); width]
    };
    out.push_str(&format_table_row(&header));
    out.push('\n');
    out.push_str(&format!("|{}\n", "---|".repeat(width.max(1))));
    for row in iter {
        out.push_str(&format_table_row(&row));
        out.push('\n');
    }
    out.push('\n');
    out
}

fn format_table_row(cells: &[String]) -> String {
    let escaped: Vec<String> = cells.iter().map(|c| c.replace('|', "\\|").trim().to_string()).collect();
    format!("| {} |", escaped.join(" | "))
}

fn render_table_row(row: &Value, depth: usize) -> Vec<String> {
    let mut cells = Vec::new();
    for cell in children(row) {
        let ty = node_type(cell);
        if ty != "tableCell" && ty != "tableHeader" {
            continue;
        }
        let colspan = cell
            .get("attrs")
            .and_then(|a| a.get("colspan"))
            .and_then(Value::as_u64)
            .unwrap_or(1)
            .max(1);
        let text = render_children(cell, depth + 1).trim().replace('\n', " ");
        cells.push(text);
        for _ in 1..colspan {
            cells.push(String::new());
        }
    }
    cells
}

fn collapse_blank_lines(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut newline_run = 0;
    for c in input.chars() {
        if c == '\n' {
            newline_run += 1;
            if newline_run <= 2 {
                out.push(c);
            }
        } else {
            newline_run = 0;
            out.push(c);
        }
    }
    out
}
