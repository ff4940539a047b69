//! Custom Field Normalizer integration coverage (spec.md §8 property 10:
//! per-format normalization matrix, plus scenario S6's cascading field).

use std::collections::HashMap;

use jira2redmine_issues::customfield::{build_payload, CustomFieldPayloadValue};
use jira2redmine_issues::db::lookups::Lookups;
use jira2redmine_issues::db::models::{CascadingOptionRow, CustomFieldMappingRow};
use serde_json::json;

fn field(jira_field_id: &str, redmine_custom_field_id: i64, format: &str, is_multiple: bool) -> CustomFieldMappingRow {
    CustomFieldMappingRow {
        jira_field_id: jira_field_id.to_string(),
        redmine_custom_field_id,
        field_format: format.to_string(),
        is_multiple,
        mapping_parent_custom_field_id: None,
    }
}

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

fn scalar(value: &CustomFieldPayloadValue) -> &str {
    match value {
        CustomFieldPayloadValue::Scalar(s) => s,
        CustomFieldPayloadValue::List(_) => panic!("expected scalar value"),
    }
}

#[test]
fn per_format_normalization_matrix() {
    let cases: &[(&str, &str, serde_json::Value, &str)] = &[
        ("bool", "customfield_1", json!("yes"), "1"),
        ("bool", "customfield_1", json!(false), "0"),
        ("int", "customfield_2", json!("42"), "42"),
        ("float", "customfield_3", json!("3.140000"), "3.14"),
        ("date", "customfield_4", json!("2024-05-01T10:00:00.000+0000"), "2024-05-01"),
        ("string", "customfield_5", json!("  plain text  "), "plain text"),
    ];

    for (format, jira_field_id, raw_value, expected) in cases {
        let lookups = lookups_with(vec![field(jira_field_id, 1, format, false)]);
        let fields = json!({ *jira_field_id: raw_value.clone() });
        let out = build_payload(&fields, &lookups);
        assert_eq!(out.len(), 1, "format {format} should produce one entry");
        assert_eq!(scalar(&out[0].value), *expected, "format {format} mismatch");
    }
}

#[test]
fn multi_value_field_collects_into_a_deduplicated_list() {
    let lookups = lookups_with(vec![field("customfield_6", 7, "list", true)]);
    let fields = json!({"customfield_6": ["A", "B", "A"]});
    let out = build_payload(&fields, &lookups);
    match &out[0].value {
        CustomFieldPayloadValue::List(values) => assert_eq!(values, &vec!["A".to_string(), "B".to_string()]),
        CustomFieldPayloadValue::Scalar(_) => panic!("expected list"),
    }
}

#[test]
fn enumeration_format_substitutes_the_mapped_redmine_label() {
    let mut lookups = lookups_with(vec![field("customfield_7", 8, "enumeration", false)]);
    lookups
        .custom_field_enumerations
        .insert(("customfield_7".to_string(), "urgent".to_string()), "Critical".to_string());
    let fields = json!({"customfield_7": {"value": "Urgent"}});
    let out = build_payload(&fields, &lookups);
    assert_eq!(scalar(&out[0].value), "Critical");
}

// Scenario S6: customfieldX = {child:{id:"7", value:"Child A"}} resolves
// via `cascading_options` to parent_field_id=11 / child_field_id=12 and
// emits both payload entries, parent first.
#[test]
fn cascading_field_resolves_by_child_option_id() {
    let mut lookups = lookups_with(vec![field("customfield_8", 11, "depending_list", false)]);
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
    let fields = json!({"customfield_8": {"child": {"id": "7", "value": "Child A"}}});
    let out = build_payload(&fields, &lookups);
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].id, 11);
    assert_eq!(scalar(&out[0].value), "Parent P");
    assert_eq!(out[1].id, 12);
    assert_eq!(scalar(&out[1].value), "Child A");
}
