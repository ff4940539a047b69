use serde::Deserialize;
use serde_json::Value;

/// One page of `GET /rest/api/3/search/jql` (spec.md §6).
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub issues: Vec<RawIssue>,
    #[serde(default, rename = "maxResults")]
    pub max_results: Option<u32>,
}

/// A single search result, before normalization. `fields` and
/// `renderedFields` stay as `serde_json::Value` because Jira's custom
/// field shapes are only known at mapping time (spec.md §9 "Dynamic JSON
/// decoding" design note); the well-known fields are extracted through
/// typed accessors below rather than a second struct per field.
#[derive(Debug, Clone, Deserialize)]
pub struct RawIssue {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub fields: Value,
    #[serde(default, rename = "renderedFields")]
    pub rendered_fields: Value,
}

/// A typed, explicit accessor set over the common Jira value shapes
/// (spec.md §9): `{id,value,name,label}` scalar objects, the "label
/// manager" `{labels:[...]}` object, and ADF documents. Wrapping a
/// `&Value` instead of re-parsing into an enum keeps every accessor a
/// one-line lookup while still giving call sites an explicit,
/// discoverable capability set instead of ad-hoc `.get("x").or(...)`
/// chains scattered through the codebase.
pub struct JiraValue<'a>(pub &'a Value);

impl<'a> JiraValue<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self(value)
    }

    pub fn is_empty(&self) -> bool {
        match self.0 {
            Value::Null => true,
            Value::String(s) => s.is_empty() || s.eq_ignore_ascii_case("none"),
            Value::Array(a) => a.is_empty(),
            Value::Object(o) => {
                if let Some(doc_type) = o.get("type").and_then(Value::as_str) {
                    if doc_type == "doc" {
                        return o
                            .get("content")
                            .and_then(Value::as_array)
                            .map(|c| c.is_empty())
                            .unwrap_or(true);
                    }
                }
                false
            }
            _ => false,
        }
    }

    /// Extract the Jira "label manager" object `{labels: [...]}`: non-empty,
    /// non-"none" strings, deduped order-preserving (spec.md §4.4).
    pub fn as_label_list(&self) -> Option<Vec<String>> {
        let labels = self.0.as_object()?.get("labels")?.as_array()?;
        let mut seen = std::collections::HashSet::new();
        let mut out = Vec::new();
        for label in labels {
            let Some(s) = label.as_str() else { continue };
            let trimmed = s.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
                continue;
            }
            if seen.insert(trimmed.to_string()) {
                out.push(trimmed.to_string());
            }
        }
        Some(out)
    }

    /// Extract a scalar string representation, preferring `value`, `name`,
    /// `label`, `id` in that order from object form (spec.md §4.4 default
    /// format normalization).
    pub fn as_scalar_repr(&self) -> Option<String> {
        match self.0 {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Object(o) => {
                for key in ["value", "name", "label", "id"] {
                    if let Some(s) = o.get(key).and_then(Value::as_str) {
                        return Some(s.to_string());
                    }
                }
                None
            }
            _ => None,
        }
    }

    pub fn is_adf_doc(&self) -> bool {
        self.0
            .as_object()
            .and_then(|o| o.get("type"))
            .and_then(Value::as_str)
            == Some("doc")
    }

    pub fn as_array(&self) -> Option<&'a Vec<Value>> {
        self.0.as_array()
    }
}

/// Parse a Jira timestamp (`created`/`updated`/`resolutiondate`, either
/// full RFC3339 or Jira Cloud's zoned-offset-with-millis form) into UTC.
pub fn parse_timestamp(s: &str) -> Option<chrono::NaiveDateTime> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&chrono::Utc).naive_utc());
    }
    if let Ok(dt) = chrono::DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&chrono::Utc).naive_utc());
    }
    None
}

/// Format a parsed timestamp as the UTC `YYYY-MM-DDTHH:MM:SSZ` form the
/// Redmine Extended API expects for `created_on`/`updated_on`/`closed_on`.
pub fn format_extended_timestamp(dt: chrono::NaiveDateTime) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

pub fn truthy_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}
