//! Custom Field Normalizer (spec.md §4.4): turns a Jira issue's `fields`
//! object into the `[{id: redmine_cf_id, value}, ...]` payload stored in
//! `proposed_custom_field_payload`.

use std::collections::HashSet;

use serde_json::Value;

use crate::db::lookups::Lookups;
use crate::db::models::CustomFieldMappingRow;
use crate::doc::adf;
use crate::jira::model::JiraValue;

#[derive(Debug, Clone, serde::Serialize)]
pub struct CustomFieldPayloadEntry {
    pub id: i64,
    pub value: CustomFieldPayloadValue,
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(untagged)]
pub enum CustomFieldPayloadValue {
    Scalar(String),
    List(Vec<String>),
}

/// Build the full custom-field payload for one issue's `fields` object
/// against every mapped field present in `lookups`.
pub fn build_payload(fields: &Value, lookups: &Lookups) -> Vec<CustomFieldPayloadEntry> {
    let mut entries = Vec::new();
    for mapping in &lookups.custom_fields {
        if mapping.field_format.eq_ignore_ascii_case("depending_list") {
            if let Some(raw) = fields.get(&mapping.jira_field_id) {
                if let Some((parent, child)) = resolve_cascading(raw, mapping, lookups) {
                    entries.push(parent);
                    entries.push(child);
                }
            }
            continue;
        }
        let Some(raw) = fields.get(&mapping.jira_field_id) else { continue };
        if JiraValue::new(raw).is_empty() {
            continue;
        }
        if let Some(value) = normalize_field(raw, mapping, lookups) {
            entries.push(CustomFieldPayloadEntry {
                id: mapping.redmine_custom_field_id,
                value,
            });
        }
    }
    entries
}

fn normalize_field(
    raw: &Value,
    mapping: &CustomFieldMappingRow,
    lookups: &Lookups,
) -> Option<CustomFieldPayloadValue> {
    let values = raw_values(raw, mapping.is_multiple);
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    for value in &values {
        if let Some(s) = normalize_one(value, mapping, lookups) {
            if seen.insert(s.clone()) {
                out.push(s);
            }
        }
    }
    if out.is_empty() {
        return None;
    }
    if mapping.is_multiple {
        Some(CustomFieldPayloadValue::List(out))
    } else {
        Some(CustomFieldPayloadValue::Scalar(out.into_iter().next().unwrap()))
    }
}

/// Spec.md §4.4 "Multi-value handling": a label-manager object is expanded
/// to its label list regardless of `is_multiple`; otherwise an array is
/// iterated only when `is_multiple`, else the raw value is a 1-element list.
fn raw_values(raw: &Value, is_multiple: bool) -> Vec<Value> {
    if let Some(labels) = JiraValue::new(raw).as_label_list() {
        return labels.into_iter().map(Value::String).collect();
    }
    if is_multiple {
        if let Some(arr) = raw.as_array() {
            return arr.clone();
        }
    }
    vec![raw.clone()]
}

fn normalize_one(value: &Value, mapping: &CustomFieldMappingRow, lookups: &Lookups) -> Option<String> {
    match mapping.field_format.to_lowercase().as_str() {
        "bool" | "boolean" => crate::jira::model::truthy_bool(value).map(|b| if b { "1".to_string() } else { "0".to_string() }),
        "int" | "integer" => {
            let s = JiraValue::new(value).as_scalar_repr()?;
            s.trim().parse::<i64>().ok().map(|n| n.to_string())
        }
        "float" | "decimal" => {
            let s = JiraValue::new(value).as_scalar_repr()?;
            let f: f64 = s.trim().parse().ok()?;
            if !f.is_finite() {
                return None;
            }
            Some(trim_trailing_zeros(f))
        }
        "date" => normalize_date(value),
        _ => normalize_default(value, mapping, lookups),
    }
}

fn trim_trailing_zeros(f: f64) -> String {
    let s = format!("{f:.6}");
    let trimmed = s.trim_end_matches('0');
    let trimmed = trimmed.trim_end_matches('.');
    trimmed.to_string()
}

fn normalize_date(value: &Value) -> Option<String> {
    let s = JiraValue::new(value).as_scalar_repr()?;
    let trimmed = s.trim();
    if trimmed.chars().count() >= 10 {
        return Some(trimmed.chars().take(10).collect());
    }
    trimmed.parse::<i64>().ok().and_then(|millis| {
        chrono::DateTime::from_timestamp_millis(millis).map(|dt| dt.format("%Y-%m-%d").to_string())
    })
}

fn normalize_default(value: &Value, mapping: &CustomFieldMappingRow, lookups: &Lookups) -> Option<String> {
    let raw_scalar = if JiraValue::new(value).is_adf_doc() {
        adf::to_plaintext(value)
    } else {
        JiraValue::new(value).as_scalar_repr()
    }?;
    let trimmed = raw_scalar.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return None;
    }
    let key = (mapping.jira_field_id.clone(), trimmed.to_lowercase());
    if let Some(label) = lookups.custom_field_enumerations.get(&key) {
        Some(label.clone())
    } else {
        Some(trimmed.to_string())
    }
}

/// Spec.md §4.4 "Cascading fields". `raw` is expected to be `{id,value}` or
/// `{child:{id,value}}`; resolve the child option id against
/// `cascading_options`, falling back to `cascading_options_by_label` when
/// exactly one candidate shares the label.
fn resolve_cascading(
    raw: &Value,
    mapping: &CustomFieldMappingRow,
    lookups: &Lookups,
) -> Option<(CustomFieldPayloadEntry, CustomFieldPayloadEntry)> {
    let selection = raw.get("child").unwrap_or(raw);
    let child_id = selection.get("id").and_then(Value::as_str);
    let child_label = selection.get("value").and_then(Value::as_str);

    let resolved = child_id
        .and_then(|id| lookups.cascading_options.get(id))
        .or_else(|| {
            // `redmine_custom_field_id` on a depending_list mapping row names the
            // *parent* custom field (see `CascadingOptionRow::parent_field_id`,
            // keyed the same way in `db::lookups::Lookups::load`).
            let label = child_label?;
            let parent_field_id = mapping.redmine_custom_field_id.to_string();
            let key = (parent_field_id, label.to_lowercase());
            let candidates = lookups.cascading_options_by_label.get(&key)?;
            if candidates.len() == 1 {
                candidates.first()
            } else {
                None
            }
        })?;

    Some((
        CustomFieldPayloadEntry {
            id: resolved.parent_field_id,
            value: CustomFieldPayloadValue::Scalar(resolved.parent_label.clone()),
        },
        CustomFieldPayloadEntry {
            id: resolved.child_field_id,
            value: CustomFieldPayloadValue::Scalar(resolved.child_label.clone()),
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{CascadingOptionRow, CustomFieldEnumerationRow};
    use serde_json::json;
    use std::collections::HashMap;

    fn lookups_with(fields: Vec<CustomFieldMappingRow>) -> Lookups {
        Lookups {
            projects: Default::default(),
            trackers: Default::default(),
            statuses: Default::default(),
            priorities: Default::default(),
            users: Default::default(),
            custom_fields: fields,
            custom_field_enumerations: HashMap::new(),
            cascading_options: HashMap::new(),
            cascading_options_by_label: HashMap::new(),
        }
    }

    fn field(id: &str, cf: i64, format: &str, is_multiple: bool) -> CustomFieldMappingRow {
        CustomFieldMappingRow {
            jira_field_id: id.to_string(),
            redmine_custom_field_id: cf,
            field_format: format.to_string(),
            is_multiple,
            mapping_parent_custom_field_id: None,
        }
    }

    #[test]
    fn boolean_field_normalizes_truthy_forms() {
        let lookups = lookups_with(vec![field("customfield_1", 10, "bool", false)]);
        let fields = json!({"customfield_1": "yes"});
        let out = build_payload(&fields, &lookups);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, 10);
        match &out[0].value {
            CustomFieldPayloadValue::Scalar(s) => assert_eq!(s, "1"),
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn empty_string_field_is_omitted() {
        let lookups = lookups_with(vec![field("customfield_1", 10, "string", false)]);
        let fields = json!({"customfield_1": ""});
        assert!(build_payload(&fields, &lookups).is_empty());
    }

    #[test]
    fn label_manager_object_expands_to_list_when_multiple() {
        let lookups = lookups_with(vec![field("customfield_1", 10, "list", true)]);
        let fields = json!({"customfield_1": {"labels": ["A", "none", "B", "A"]}});
        let out = build_payload(&fields, &lookups);
        match &out[0].value {
            CustomFieldPayloadValue::List(v) => assert_eq!(v, &vec!["A".to_string(), "B".to_string()]),
            _ => panic!("expected list"),
        }
    }

    #[test]
    fn default_format_substitutes_enumeration_label() {
        let mut lookups = lookups_with(vec![field("customfield_2", 20, "enumeration", false)]);
        lookups.custom_field_enumerations.insert(
            ("customfield_2".to_string(), "hi".to_string()),
            "High".to_string(),
        );
        let fields = json!({"customfield_2": {"value": "hi"}});
        let out = build_payload(&fields, &lookups);
        match &out[0].value {
            CustomFieldPayloadValue::Scalar(s) => assert_eq!(s, "High"),
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn date_field_takes_first_ten_chars() {
        let lookups = lookups_with(vec![field("customfield_3", 30, "date", false)]);
        let fields = json!({"customfield_3": "2024-05-01T10:00:00.000+0000"});
        let out = build_payload(&fields, &lookups);
        match &out[0].value {
            CustomFieldPayloadValue::Scalar(s) => assert_eq!(s, "2024-05-01"),
            _ => panic!("expected scalar"),
        }
    }

    #[test]
    fn cascading_field_emits_parent_and_child_entries_in_order() {
        let mut lookups = lookups_with(vec![field("customfield_4", 11, "depending_list", false)]);
        lookups.cascading_options.insert(
            "7".to_string(),
            CascadingOptionRow {
                jira_child_option_id: "7".to_string(),
                jira_child_label: Some("Child A".to_string()),
                parent_field_id: 11,
                child_field_id: 12,
                parent_label: "Parent P".to_string(),
                child_label: "Child A".to_string(),
            },
        );
        let fields = json!({"customfield_4": {"child": {"id": "7", "value": "Child A"}}});
        let out = build_payload(&fields, &lookups);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, 11);
        assert_eq!(out[1].id, 12);
    }

    #[test]
    fn unresolvable_cascading_field_emits_nothing() {
        let lookups = lookups_with(vec![field("customfield_4", 11, "depending_list", false)]);
        let fields = json!({"customfield_4": {"child": {"id": "999", "value": "Unknown"}}});
        assert!(build_payload(&fields, &lookups).is_empty());
    }

    #[test]
    fn cascading_field_falls_back_to_label_when_child_id_unknown() {
        let mut lookups = lookups_with(vec![field("customfield_4", 11, "depending_list", false)]);
        let option = CascadingOptionRow {
            jira_child_option_id: "7".to_string(),
            jira_child_label: Some("Child A".to_string()),
            parent_field_id: 11,
            child_field_id: 12,
            parent_label: "Parent P".to_string(),
            child_label: "Child A".to_string(),
        };
        lookups
            .cascading_options_by_label
            .insert((11.to_string(), "child a".to_string()), vec![option]);
        let fields = json!({"customfield_4": {"child": {"value": "Child A"}}});
        let out = build_payload(&fields, &lookups);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, 11);
        assert_eq!(out[1].id, 12);
    }

    #[test]
    fn cascading_field_label_fallback_declines_ambiguous_candidates() {
        let mut lookups = lookups_with(vec![field("customfield_4", 11, "depending_list", false)]);
        let make = |child_field_id: i64| CascadingOptionRow {
            jira_child_option_id: child_field_id.to_string(),
            jira_child_label: Some("Child A".to_string()),
            parent_field_id: 11,
            child_field_id,
            parent_label: "Parent P".to_string(),
            child_label: "Child A".to_string(),
        };
        lookups
            .cascading_options_by_label
            .insert((11.to_string(), "child a".to_string()), vec![make(12), make(13)]);
        let fields = json!({"customfield_4": {"child": {"value": "Child A"}}});
        assert!(build_payload(&fields, &lookups).is_empty());
    }
}
