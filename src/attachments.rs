//! Attachment link normalizer (spec.md §4.6): rewrites references to Jira
//! attachments inside a Markdown/HTML text blob into either a Redmine
//! unique upload filename or a SharePoint URL.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

/// What a Jira attachment id resolves to for the *current issue*. Building
/// this index from `staging_jira_attachments WHERE issue_id = ?` doubles
/// as the existence check spec.md §9's open question #3 requires before
/// the last-resort numeric pattern is allowed to substitute: an id that
/// isn't in this map for this issue is never replaced, no matter which
/// pattern matched it.
#[derive(Debug, Clone, Default)]
pub struct AttachmentIndex {
    entries: HashMap<i64, AttachmentTarget>,
}

#[derive(Debug, Clone)]
pub struct AttachmentTarget {
    pub unique_filename: String,
    pub sharepoint_url: Option<String>,
}

impl AttachmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, jira_attachment_id: i64, target: AttachmentTarget) {
        self.entries.insert(jira_attachment_id, target);
    }

    pub fn get(&self, jira_attachment_id: i64) -> Option<&AttachmentTarget> {
        self.entries.get(&jira_attachment_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The ordered pattern list of spec.md §4.6. The last, purely numeric,
/// pattern is deliberately probabilistic and MUST only ever be reached
/// when none of the specific patterns matched.
fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"/rest/api/\d+/attachment/content/(\d+)",
            r"/rest/api/\d+/attachment/thumbnail/(\d+)",
            r"/attachment/content/(\d+)",
            r"/attachment/(\d+)",
            r"attachment/content/(\d+)",
            r"/attachments/(\d+)",
            r"/secure/attachment/(\d+)",
            r"(\d+)(?:[^\d]|$)",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static attachment pattern must compile"))
        .collect()
    })
}

/// `map_attachment_url` (spec.md §4.6): scan `url` against the ordered
/// pattern list; for the first match, substitute if the captured id is
/// known to `map`, else leave the url unchanged.
pub fn map_attachment_url(url: &str, map: &AttachmentIndex) -> String {
    for pattern in patterns() {
        let Some(captures) = pattern.captures(url) else { continue };
        let Some(id_str) = captures.get(1) else { continue };
        let Ok(id) = id_str.as_str().parse::<i64>() else { continue };
        return match map.get(id) {
            Some(target) => target.sharepoint_url.clone().unwrap_or_else(|| target.unique_filename.clone()),
            None => url.to_string(),
        };
    }
    url.to_string()
}

/// Extract a numeric attachment id from a URL-like string using the same
/// ordered pattern list, without requiring a map lookup. Used when the
/// caller already has the id from a non-URL attribute (e.g.
/// `data-linked-resource-id`) and only needs the generic extraction for
/// `href`/`src`.
pub fn extract_attachment_id(url: &str) -> Option<i64> {
    for pattern in patterns() {
        let Some(captures) = pattern.captures(url) else { continue };
        let Some(id_str) = captures.get(1) else { continue };
        if let Ok(id) = id_str.as_str().parse::<i64>() {
            return Some(id);
        }
    }
    None
}

/// `"<jira_id>__<sanitized>"` (spec.md §4.6 "Unique filename construction").
pub fn unique_filename(jira_attachment_id: i64, original_filename: &str) -> String {
    let sanitized = sanitize_filename(original_filename);
    format!("{jira_attachment_id}__{sanitized}")
}

fn sanitize_filename(original: &str) -> String {
    static SANITIZER: OnceLock<Regex> = OnceLock::new();
    let re = SANITIZER.get_or_init(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());
    let replaced = re.replace_all(original, "_");
    let trimmed = replaced.trim_matches('_');
    if trimmed.is_empty() {
        "attachment".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Regex pass over Markdown-style `![alt](URL)` / `[label](URL)` links
/// (spec.md §4.6 step 2): rewrite `URL` via `map_attachment_url` unless it
/// already points at SharePoint.
pub fn rewrite_markdown_links(text: &str, map: &AttachmentIndex) -> String {
    static LINK_RE: OnceLock<Regex> = OnceLock::new();
    let re = LINK_RE.get_or_init(|| Regex::new(r#"(!?\[[^\]]*\]\()([^)\s]+)((?:\s+"[^"]*")?\))"#).unwrap());
    re.replace_all(text, |caps: &regex::Captures| {
        let prefix = &caps[1];
        let url = &caps[2];
        let suffix = &caps[3];
        if is_sharepoint_url(url) {
            format!("{prefix}{url}{suffix}")
        } else {
            let rewritten = map_attachment_url(url, map);
            format!("{prefix}{rewritten}{suffix}")
        }
    })
    .into_owned()
}

fn is_sharepoint_url(url: &str) -> bool {
    url.contains("sharepoint.com") || url.contains("/sites/")
}

/// Does this text reference any attachment in `map` at all? Used to gate
/// whether the (more expensive) rewriting pass runs (spec.md §4.2 step f).
pub fn references_any_attachment(text: &str, map: &AttachmentIndex) -> bool {
    if map.is_empty() {
        return false;
    }
    static TAG_RE: OnceLock<Regex> = OnceLock::new();
    let has_html = TAG_RE
        .get_or_init(|| Regex::new(r"(?i)<img\b|<a\b|<div\b").unwrap())
        .is_match(text);
    has_html || extract_attachment_id(text).is_some()
}

/// Strip a Markdown link-title that merely repeats the filename:
/// `](unique "filename")` -> `](unique)` (spec.md §4.2 step f, closing
/// sentence).
pub fn strip_redundant_link_titles(text: &str) -> String {
    static TITLE_RE: OnceLock<Regex> = OnceLock::new();
    let re = TITLE_RE.get_or_init(|| Regex::new(r#"\]\(([^)\s"]+)\s+"([^"]*)"\)"#).unwrap());
    re.replace_all(text, |caps: &regex::Captures| {
        let target = &caps[1];
        let title = &caps[2];
        if target.ends_with(title) || title == target {
            format!("]({target})")
        } else {
            caps[0].to_string()
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_with(id: i64, filename: &str, sharepoint: Option<&str>) -> AttachmentIndex {
        let mut idx = AttachmentIndex::new();
        idx.insert(
            id,
            AttachmentTarget {
                unique_filename: filename.to_string(),
                sharepoint_url: sharepoint.map(str::to_string),
            },
        );
        idx
    }

    #[test]
    fn rewrites_rest_api_content_url_to_unique_filename() {
        let map = index_with(42, "42__file.pdf", None);
        let out = map_attachment_url("https://jira.example.com/rest/api/3/attachment/content/42", &map);
        assert_eq!(out, "42__file.pdf");
    }

    #[test]
    fn unknown_attachment_id_leaves_url_unchanged() {
        let map = AttachmentIndex::new();
        let url = "https://jira.example.com/rest/api/3/attachment/content/999";
        assert_eq!(map_attachment_url(url, &map), url);
    }

    #[test]
    fn last_resort_numeric_pattern_only_applies_when_id_known() {
        let map = index_with(7, "7__x.png", None);
        assert_eq!(map_attachment_url("see item 7 for details", &map), "7__x.png");
        assert_eq!(map_attachment_url("see item 8 for details", &map), "see item 8 for details");
    }

    #[test]
    fn sharepoint_takes_precedence_over_unique_filename() {
        let map = index_with(5, "5__doc.docx", Some("https://contoso.sharepoint.com/x.docx"));
        let out = map_attachment_url("/attachment/5", &map);
        assert_eq!(out, "https://contoso.sharepoint.com/x.docx");
    }

    #[test]
    fn unique_filename_sanitizes_and_trims_underscores() {
        assert_eq!(unique_filename(42, "  weird name!!.pdf  "), "42__weird_name__.pdf");
        assert_eq!(unique_filename(1, "###"), "1__attachment");
    }

    #[test]
    fn markdown_links_are_rewritten_unless_sharepoint() {
        let map = index_with(42, "42__file.pdf", None);
        let out = rewrite_markdown_links(
            "[foo](https://jira.example.com/rest/api/3/attachment/content/42)",
            &map,
        );
        assert_eq!(out, "[foo](42__file.pdf)");
    }

    #[test]
    fn strip_redundant_link_titles_removes_filename_echo() {
        let out = strip_redundant_link_titles(r#"[foo](42__file.pdf "file.pdf")"#);
        assert_eq!(out, "[foo](42__file.pdf)");
    }
}
