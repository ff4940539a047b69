//! Jira-rendered HTML -> Markdown (spec.md §4.5 "HTML -> Markdown").
//! Parses with `scraper`, rewrites attachment-referencing `<a>`/`<img>`
//! elements through the attachment link normalizer while walking the
//! tree, and serializes straight to Markdown in the same pass (skipping
//! the intermediate "rewrite the DOM, reserialize, then convert" hop the
//! spec describes as one possible strategy — the observable output is
//! identical).

use std::sync::OnceLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node};

use crate::attachments::{extract_attachment_id, AttachmentIndex};

const MAX_DEPTH: usize = 256;

fn comment_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<!--.*?-->").unwrap())
}

/// Returns `None` when the document has no renderable content, or (per
/// spec.md §4.5 step 1) when stripping comments leaves it empty and the
/// original text still mentions "ADF macro" — the caller is expected to
/// fall through to the ADF converter in that case.
pub fn to_markdown(html: &str, attachments: &AttachmentIndex) -> Option<String> {
    let without_comments = comment_re().replace_all(html, "");
    if without_comments.trim().is_empty() && html.contains("ADF macro") {
        return None;
    }

    let document = Html::parse_fragment(html);
    let root = document.root_element();
    let rendered = render_element(root, 0, attachments);
    let collapsed = collapse_blank_lines(&rendered);
    let trimmed = collapsed.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn render_children(element: ElementRef, depth: usize, attachments: &AttachmentIndex) -> String {
    if depth > MAX_DEPTH {
        return String::new();
    }
    let mut out = String::new();
    for child in element.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    out.push_str(&render_element(child_el, depth + 1, attachments));
                }
            }
            Node::Text(text) => {
                out.push_str(&collapse_whitespace(text));
            }
            _ => {}
        }
    }
    out
}

fn render_element(element: ElementRef, depth: usize, attachments: &AttachmentIndex) -> String {
    if depth > MAX_DEPTH {
        return String::new();
    }
    let tag = element.value().name();
    match tag {
        "script" | "style" => String::new(),
        "html" | "body" | "span" | "div" | "thead" | "tbody" => render_children(element, depth, attachments),
        "p" => {
            let inner = render_children(element, depth, attachments);
            let trimmed = inner.trim();
            if trimmed.is_empty() {
                String::new()
            } else {
                format!("{trimmed}\n\n")
            }
        }
        "br" => "\n".to_string(),
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse::<usize>().unwrap_or(1).clamp(1, 6);
            let inner = render_children(element, depth, attachments);
            format!("{} {}\n\n", "#".repeat(level), inner.trim())
        }
        "ul" => render_list(element, depth, attachments, "- "),
        "ol" => render_list(element, depth, attachments, "1. "),
        "li" => render_children(element, depth, attachments),
        "blockquote" => {
            let inner = render_children(element, depth, attachments);
            let trimmed = inner.trim();
            trimmed
                .lines()
                .map(|line| format!("> {line}").trim_end().to_string())
                .collect::<Vec<_>>()
                .join("\n")
                + "\n\n"
        }
        "hr" => "---\n\n".to_string(),
        "pre" | "code" => {
            let inner = render_children(element, depth, attachments);
            format!("```\n{}\n```\n\n", inner.trim_end_matches('\n'))
        }
        "table" => render_table(element, depth, attachments),
        "a" => render_anchor(element, depth, attachments),
        "img" => render_image(element, attachments),
        _ => render_children(element, depth, attachments),
    }
}

fn render_list(element: ElementRef, depth: usize, attachments: &AttachmentIndex, prefix: &str) -> String {
    if depth > MAX_DEPTH {
        return String::new();
    }
    let mut out = String::new();
    for child in element.children() {
        let Some(li) = ElementRef::wrap(child).filter(|e| e.value().name() == "li") else { continue };
        let rendered = render_children(li, depth + 1, attachments);
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

/// Rewrite `<a>`: extract a numeric attachment id from `href` or
/// `data-linked-resource-id`; if known, point the link at the attachment's
/// unique filename and fall back to that filename as the link text when
/// the anchor has none (spec.md §4.5 step 2).
fn render_anchor(element: ElementRef, depth: usize, attachments: &AttachmentIndex) -> String {
    let href = element.value().attr("href").unwrap_or("");
    let id = element
        .value()
        .attr("data-linked-resource-id")
        .and_then(|s| s.parse::<i64>().ok())
        .or_else(|| extract_attachment_id(href));

    let text = render_children(element, depth, attachments);
    let trimmed_text = text.trim();

    if let Some(target) = id.and_then(|id| attachments.get(id)) {
        let display = target.sharepoint_url.as_deref().unwrap_or(&target.unique_filename);
        let label = if trimmed_text.is_empty() { display } else { trimmed_text };
        format!("[{label}]({display})")
    } else if href.is_empty() {
        trimmed_text.to_string()
    } else {
        format!("[{}]({href})", if trimmed_text.is_empty() { href } else { trimmed_text })
    }
}

/// Rewrite `<img>` the same way, dropping `title`/`alt`/`data-attachment-*`/
/// `data-media-services-*` attributes from consideration (spec.md §4.5 step 3).
fn render_image(element: ElementRef, attachments: &AttachmentIndex) -> String {
    let src = element.value().attr("src").unwrap_or("");
    let id = element
        .value()
        .attr("data-linked-resource-id")
        .and_then(|s| s.parse::<i64>().ok())
        .or_else(|| extract_attachment_id(src));

    if let Some(target) = id.and_then(|id| attachments.get(id)) {
        let display = target.sharepoint_url.as_deref().unwrap_or(&target.unique_filename);
        format!("![{display}]({display})")
    } else if src.is_empty() {
        String::new()
    } else {
        format!("![]({src})")
    }
}

fn render_table(element: ElementRef, depth: usize, attachments: &AttachmentIndex) -> String {
    if depth > MAX_DEPTH {
        return String::new();
    }
    let rows: Vec<Vec<String>> = element
        .children()
        .flat_map(|child| {
            let el = ElementRef::wrap(child)?;
            match el.value().name() {
                "thead" | "tbody" => Some(el.children().filter_map(ElementRef::wrap).collect::<Vec<_>>()),
                "tr" => Some(vec![el]),
                _ => None,
            }
        })
        .flatten()
        .filter(|el| el.value().name() == "tr")
        .map(|row| render_table_row(row, depth + 1, attachments))
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

    let first_row_has_text = normalized.first().map(|r| r.iter().any(|c| !c.trim().is_empty())).unwrap_or(false);

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

fn render_table_row(row: ElementRef, depth: usize, attachments: &AttachmentIndex) -> Vec<String> {
    let mut cells = Vec::new();
    for child in row.children() {
        let Some(cell) = ElementRef::wrap(child) else { continue };
        let name = cell.value().name();
        if name != "td" && name != "th" {
            continue;
        }
        let colspan = cell
            .value()
            .attr("colspan")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(1)
            .max(1);
        let text = render_children(cell, depth + 1, attachments).trim().replace('\n', " ");
        cells.push(text);
        for _ in 1..colspan {
            cells.push(String::new());
        }
    }
    cells
}

fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
            }
            last_was_space = true;
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachments::AttachmentTarget;

    fn index_with(id: i64, filename: &str) -> AttachmentIndex {
        let mut idx = AttachmentIndex::new();
        idx.insert(
            id,
            AttachmentTarget {
                unique_filename: filename.to_string(),
                sharepoint_url: None,
            },
        );
        idx
    }

    #[test]
    fn anchor_href_is_rewritten_to_unique_filename_and_text_preserved() {
        let map = index_with(42, "42__file.pdf");
        let html = r#"<a href="/rest/api/3/attachment/content/42">foo</a>"#;
        let out = to_markdown(html, &map).unwrap();
        assert_eq!(out, "[foo](42__file.pdf)");
    }

    #[test]
    fn anchor_without_text_uses_filename_as_text() {
        let map = index_with(42, "42__file.pdf");
        let html = r#"<a href="/rest/api/3/attachment/content/42"></a>"#;
        let out = to_markdown(html, &map).unwrap();
        assert_eq!(out, "[42__file.pdf](42__file.pdf)");
    }

    #[test]
    fn plain_paragraph_survives() {
        let out = to_markdown("<p>Hello <b>World</b></p>", &AttachmentIndex::new()).unwrap();
        assert_eq!(out, "Hello World");
    }

    #[test]
    fn table_cells_rendered_with_header_separator() {
        let html = "<table><tr><th>A</th><th>B</th></tr><tr><td>1</td><td>2</td></tr></table>";
        let out = to_markdown(html, &AttachmentIndex::new()).unwrap();
        assert!(out.contains("| A | B |"));
        assert!(out.contains("| 1 | 2 |"));
    }

    #[test]
    fn adf_macro_only_comment_forces_fallback() {
        let html = "<!-- ADF macro (type = 'table') -->";
        assert!(to_markdown(html, &AttachmentIndex::new()).is_none());
    }
}
