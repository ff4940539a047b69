//! Extractor (spec.md §4.1): Phase "jira". Populates `staging_jira_issues`
//! and its satellite tables for every project whose mapping row has
//! `issues_extracted_at IS NULL`.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;
use sqlx::MySqlPool;
use thiserror::Error;

use crate::db::staging::{NormalizedIssue, StagingStore};
use crate::error::JiraSearchError;
use crate::jira::client::JiraClient;
use crate::jira::model::{parse_timestamp, JiraValue, RawIssue};
use crate::textutil::truncate_unicode;

/// Fields already normalized into dedicated `staging_jira_issues` columns.
/// Every other composite (object/array) field under `fields` is sampled
/// into `staging_jira_object_samples`/`_kv` instead — spec.md §4.1 step 5's
/// "configured object schema field definitions" map, in this
/// implementation, onto "every remaining non-scalar field".
const NORMALIZED_FIELD_KEYS: &[&str] = &[
    "summary", "description", "project", "issuetype", "status", "priority", "reporter",
    "assignee", "parent", "duedate", "created", "updated", "timeoriginalestimate",
    "timeestimate", "timespent", "labels", "fixVersions", "components", "issuelinks",
    "security",
];

const FLATTEN_MAX_DEPTH: usize = 64;

#[derive(Debug, Default)]
pub struct ExtractSummary {
    pub projects_extracted: usize,
    pub projects_failed: usize,
    pub issues_upserted: usize,
}

#[derive(Debug, Error)]
enum ProjectExtractError {
    #[error(transparent)]
    Jira(#[from] JiraSearchError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Run the Extractor over every pending project (spec.md §4.1). Per-project
/// transport failures are logged and skipped; a database error aborts the
/// whole run (spec.md §7).
pub async fn run(
    pool: &MySqlPool,
    jira: &JiraClient,
    configured_jql: Option<&str>,
    batch_size: u32,
) -> anyhow::Result<ExtractSummary> {
    let staging = StagingStore::new(pool);
    let projects = staging.projects_pending_extraction().await?;

    let mut summary = ExtractSummary::default();

    for project in projects {
        if project.jira_project_key.trim().is_empty() {
            tracing::warn!("[skipped] project {} has no Jira key", project.jira_project_id);
            continue;
        }
        match extract_project(&staging, jira, &project.jira_project_key, configured_jql, batch_size).await {
            Ok(count) => {
                staging.stamp_project_extracted(&project.jira_project_id).await?;
                summary.projects_extracted += 1;
                summary.issues_upserted += count;
                tracing::info!("[extracted] {} ({count} issues)", project.jira_project_key);
            }
            Err(ProjectExtractError::Jira(e)) => {
                summary.projects_failed += 1;
                tracing::error!("[error] project {} extraction failed: {e}", project.jira_project_key);
            }
            Err(ProjectExtractError::Database(e)) => return Err(e.into()),
        }
    }

    Ok(summary)
}

async fn extract_project(
    staging: &StagingStore<'_>,
    jira: &JiraClient,
    project_key: &str,
    configured_jql: Option<&str>,
    batch_size: u32,
) -> Result<usize, ProjectExtractError> {
    let mut last_seen_id: Option<i64> = None;
    let mut total = 0usize;

    loop {
        let jql = build_jql(project_key, configured_jql, last_seen_id);
        let page = jira.search(&jql, batch_size).await?;
        let page_len = page.issues.len();
        if page_len == 0 {
            break;
        }

        for raw in &page.issues {
            let id: i64 = raw.id.parse().unwrap_or_default();
            last_seen_id = Some(last_seen_id.map_or(id, |prev| prev.max(id)));
            ingest_issue(staging, raw).await?;
            total += 1;
        }

        let effective_page_size = page.max_results.unwrap_or(batch_size);
        if (page_len as u32) < effective_page_size {
            break;
        }
    }

    Ok(total)
}

fn build_jql(project_key: &str, configured: Option<&str>, last_seen_id: Option<i64>) -> String {
    let escaped_key = project_key.replace('"', "\\\"");
    let mut clauses = vec![format!("project = \"{escaped_key}\"")];
    if let Some(extra) = configured {
        let stripped = strip_order_by(extra);
        let trimmed = stripped.trim();
        if !trimmed.is_empty() {
            clauses.push(format!("({trimmed})"));
        }
    }
    if let Some(id) = last_seen_id {
        clauses.push(format!("id > {id}"));
    }
    format!("{} ORDER BY id ASC", clauses.join(" AND "))
}

fn strip_order_by(jql: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(?i)\s*order\s+by\s+.*$").unwrap());
    re.replace(jql, "").to_string()
}

async fn ingest_issue(staging: &StagingStore<'_>, raw: &RawIssue) -> Result<(), sqlx::Error> {
    let fields = &raw.fields;
    let rendered = &raw.rendered_fields;
    let id: i64 = raw.id.parse().unwrap_or_default();

    let summary_raw = fields.get("summary").and_then(Value::as_str).unwrap_or("").trim();
    let summary = if summary_raw.is_empty() {
        format!("[No summary] {}", raw.key)
    } else {
        truncate_unicode(summary_raw, 255)
    };

    let project_id = scalar_id(fields.get("project")).unwrap_or_default();
    let issue_type_id = scalar_id(fields.get("issuetype")).unwrap_or_default();
    let status_id = scalar_id(fields.get("status")).unwrap_or_default();
    let status_category_key = fields
        .get("status")
        .and_then(|s| s.get("statusCategory"))
        .and_then(|c| c.get("key"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let priority_id = scalar_id(fields.get("priority"));
    let reporter_account_id = fields.get("reporter").and_then(|p| p.get("accountId")).and_then(Value::as_str).map(str::to_string);
    let assignee_account_id = fields.get("assignee").and_then(|p| p.get("accountId")).and_then(Value::as_str).map(str::to_string);
    let parent_account_id = fields.get("parent").and_then(|p| p.get("key")).and_then(Value::as_str).map(str::to_string);

    let description_adf = fields
        .get("description")
        .filter(|d| !JiraValue::new(d).is_empty())
        .map(|d| d.to_string());
    let description_html = rendered
        .get("description")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let due_date = fields.get("duedate").and_then(Value::as_str).map(str::to_string);

    let time_original_estimate = fields.get("timeoriginalestimate").and_then(normalize_int_field);
    let time_remaining_estimate = fields.get("timeestimate").and_then(normalize_int_field);
    let time_spent = fields.get("timespent").and_then(normalize_int_field);

    let labels = fields
        .get("labels")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>())
        .filter(|v| !v.is_empty());
    let labels_json = labels.as_ref().and_then(|v| serde_json::to_string(v).ok());

    let fix_versions = extract_ids(fields.get("fixVersions"));
    let components = extract_ids(fields.get("components"));

    let created_at = fields.get("created").and_then(Value::as_str).and_then(parse_timestamp);
    let updated_at = fields.get("updated").and_then(Value::as_str).and_then(parse_timestamp);

    let raw_payload = serde_json::to_string(fields).unwrap_or_else(|_| "{}".to_string());

    let normalized = NormalizedIssue {
        id,
        issue_key: raw.key.clone(),
        project_id,
        issue_type_id,
        status_id,
        status_category_key,
        priority_id,
        reporter_account_id,
        assignee_account_id,
        parent_account_id,
        summary,
        description_adf,
        description_html,
        due_date,
        time_original_estimate,
        time_remaining_estimate,
        time_spent,
        labels: labels_json,
        fix_versions,
        components,
        created_at,
        updated_at,
        raw_payload,
    };

    staging.upsert_issue(&normalized).await?;

    if let Some(labels) = &labels {
        for label in labels {
            staging.upsert_label(label).await?;
        }
    }

    if let Some(links) = fields.get("issuelinks").and_then(Value::as_array) {
        for link in links {
            if let Some((link_id, source, target, link_type)) = canonicalize_link(&raw.key, link) {
                staging.upsert_issue_link(link_id, &source, &target, &link_type).await?;
            }
        }
    }

    ingest_object_schema_samples(staging, &raw.key, fields).await?;

    Ok(())
}

fn scalar_id(value: Option<&Value>) -> Option<String> {
    value?.get("id").and_then(Value::as_str).map(str::to_string)
}

fn normalize_int_field(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i)
            } else {
                n.as_f64().filter(|f| f.is_finite() && f.fract() == 0.0).map(|f| f as i64)
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

fn extract_ids(value: Option<&Value>) -> Option<String> {
    let arr = value?.as_array()?;
    let ids: Vec<String> = arr.iter().filter_map(|v| v.get("id")).filter_map(Value::as_str).map(str::to_string).collect();
    if ids.is_empty() {
        None
    } else {
        serde_json::to_string(&ids).ok()
    }
}

fn canonicalize_link(this_key: &str, link: &Value) -> Option<(i64, String, String, String)> {
    let link_id: i64 = link.get("id").and_then(Value::as_str)?.parse().ok()?;
    let link_type = link.get("type").and_then(|t| t.get("name")).and_then(Value::as_str)?.to_string();
    if let Some(outward) = link.get("outwardIssue").and_then(|i| i.get("key")).and_then(Value::as_str) {
        Some((link_id, this_key.to_string(), outward.to_string(), link_type))
    } else {
        let inward = link.get("inwardIssue").and_then(|i| i.get("key")).and_then(Value::as_str)?;
        Some((link_id, inward.to_string(), this_key.to_string(), link_type))
    }
}

async fn ingest_object_schema_samples(staging: &StagingStore<'_>, issue_key: &str, fields: &Value) -> Result<(), sqlx::Error> {
    let Some(obj) = fields.as_object() else { return Ok(()) };
    for (field_id, value) in obj {
        if NORMALIZED_FIELD_KEYS.contains(&field_id.as_str()) {
            continue;
        }
        if JiraValue::new(value).is_empty() || !matches!(value, Value::Object(_) | Value::Array(_)) {
            continue;
        }
        let samples: Vec<Value> = match value {
            Value::Array(arr) => arr.clone(),
            other => vec![other.clone()],
        };
        let mut kv = Vec::new();
        for (ordinal, sample) in samples.iter().enumerate() {
            flatten_into(sample, "", ordinal as i32, 0, &mut kv);
        }
        staging.replace_object_samples(field_id, issue_key, &samples, &kv).await?;
    }
    Ok(())
}

fn flatten_into(value: &Value, prefix: &str, ordinal: i32, depth: usize, out: &mut Vec<(String, i32, String)>) {
    if depth > FLATTEN_MAX_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let path = if prefix.is_empty() { k.clone() } else { format!("{prefix}.{k}") };
                flatten_into(v, &path, ordinal, depth + 1, out);
            }
        }
        Value::Array(arr) => {
            for (i, v) in arr.iter().enumerate() {
                let path = format!("{prefix}[{i}]");
                flatten_into(v, &path, ordinal, depth + 1, out);
            }
        }
        Value::Null => {}
        Value::String(s) => out.push((prefix.to_string(), ordinal, s.clone())),
        Value::Bool(b) => out.push((prefix.to_string(), ordinal, b.to_string())),
        Value::Number(n) => out.push((prefix.to_string(), ordinal, n.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_jql_includes_project_and_last_seen_id() {
        let jql = build_jql("PRJ", None, Some(42));
        assert_eq!(jql, r#"project = "PRJ" AND id > 42 ORDER BY id ASC"#);
    }

    #[test]
    fn build_jql_strips_configured_order_by() {
        let jql = build_jql("PRJ", Some("status != Done ORDER BY created DESC"), None);
        assert_eq!(jql, r#"project = "PRJ" AND (status != Done) ORDER BY id ASC"#);
    }

    #[test]
    fn normalize_int_field_accepts_whole_float_and_rejects_fractional() {
        assert_eq!(normalize_int_field(&serde_json::json!(7200)), Some(7200));
        assert_eq!(normalize_int_field(&serde_json::json!(7200.0)), Some(7200));
        assert_eq!(normalize_int_field(&serde_json::json!(7200.5)), None);
        assert_eq!(normalize_int_field(&serde_json::json!("7200")), Some(7200));
    }

    #[test]
    fn canonicalize_link_picks_direction_from_outward_or_inward() {
        let outward = serde_json::json!({"id": "10", "type": {"name": "Blocks"}, "outwardIssue": {"key": "PRJ-2"}});
        assert_eq!(
            canonicalize_link("PRJ-1", &outward),
            Some((10, "PRJ-1".to_string(), "PRJ-2".to_string(), "Blocks".to_string()))
        );

        let inward = serde_json::json!({"id": "11", "type": {"name": "Blocks"}, "inwardIssue": {"key": "PRJ-3"}});
        assert_eq!(
            canonicalize_link("PRJ-1", &inward),
            Some((11, "PRJ-3".to_string(), "PRJ-1".to_string(), "Blocks".to_string()))
        );
    }

    #[test]
    fn flatten_into_produces_dotted_paths() {
        let mut out = Vec::new();
        let value = serde_json::json!({"a": {"b": "c"}, "d": [1, 2]});
        flatten_into(&value, "", 0, 0, &mut out);
        assert!(out.contains(&("a.b".to_string(), 0, "c".to_string())));
        assert!(out.contains(&("d[0]".to_string(), 0, "1".to_string())));
        assert!(out.contains(&("d[1]".to_string(), 0, "2".to_string())));
    }
}
