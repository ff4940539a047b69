pub mod adf;
pub mod html;

use serde_json::Value;

use crate::attachments::AttachmentIndex;

const ADF_TABLE_MACRO_SENTINEL: &str = "<!-- ADF macro (type = 'table') -->";

/// Build `proposed_description` following the converter cascade of
/// spec.md §4.2(e): rendered HTML (unless it only contains the ADF table
/// macro sentinel) -> ADF Markdown -> ADF plaintext -> `None`.
pub fn build_description(
    rendered_html: Option<&str>,
    description_adf: Option<&Value>,
    attachments: &AttachmentIndex,
) -> Option<String> {
    if let Some(html) = rendered_html {
        if !html.contains(ADF_TABLE_MACRO_SENTINEL) {
            if let Some(markdown) = html::to_markdown(html, attachments) {
                return Some(markdown);
            }
        }
    }
    if let Some(adf) = description_adf {
        if let Some(markdown) = adf::to_markdown(adf) {
            return Some(markdown);
        }
        return adf::to_plaintext(adf);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn falls_back_to_adf_when_html_only_has_table_macro_sentinel() {
        let html = ADF_TABLE_MACRO_SENTINEL.to_string();
        let adf = json!({"type":"doc","content":[{"type":"table","content":[
            {"type":"tableRow","content":[
                {"type":"tableCell","content":[{"type":"paragraph","content":[{"type":"text","text":"a"}]}]},
                {"type":"tableCell","content":[{"type":"paragraph","content":[{"type":"text","text":"b"}]}]}
            ]}
        ]}]});
        let out = build_description(Some(&html), Some(&adf), &AttachmentIndex::new()).unwrap();
        assert_eq!(out.lines().next().unwrap().matches('|').count(), out.lines().nth(1).unwrap().matches('|').count());
    }

    #[test]
    fn prefers_rendered_html_when_present() {
        let html = "<p>from html</p>";
        let adf = json!({"type":"doc","content":[{"type":"paragraph","content":[{"type":"text","text":"from adf"}]}]});
        let out = build_description(Some(html), Some(&adf), &AttachmentIndex::new()).unwrap();
        assert_eq!(out, "from html");
    }

    #[test]
    fn falls_back_to_adf_plaintext_when_markdown_empty() {
        let adf = json!({"type":"doc","content":[]});
        let out = build_description(None, Some(&adf), &AttachmentIndex::new());
        assert!(out.is_none());
    }

    #[test]
    fn no_description_sources_yields_none() {
        assert!(build_description(None, None, &AttachmentIndex::new()).is_none());
    }
}
