//! Transformer (spec.md §4.2): Phase "transform". Computes the Redmine
//! proposal for every rerun-eligible mapping row while preserving manual
//! operator edits behind the automation-hash optimistic lock.

use std::collections::HashMap;

use serde_json::Value;
use sqlx::MySqlPool;

use crate::attachments::{self, AttachmentIndex, AttachmentTarget};
use crate::config::IssuesMigrationConfig;
use crate::customfield;
use crate::db::mapping::MappingStore;
use crate::db::models::{AttachmentMappingRow, IssueMappingRow, JiraIssueRow};
use crate::db::staging::StagingStore;
use crate::db::lookups::Lookups;
use crate::doc;
use crate::hash::{self, AutomationHashPayload};
use crate::textutil::truncate_unicode;

#[derive(Debug, Default)]
pub struct TransformSummary {
    pub matched: usize,
    pub ready_for_creation: usize,
    pub manual_review: usize,
    pub manual_overrides: usize,
    pub skipped: usize,
    pub unchanged: usize,
    pub status_counts: HashMap<String, usize>,
}

struct TransformOutcome {
    redmine_project_id: Option<i64>,
    redmine_tracker_id: Option<i64>,
    redmine_status_id: Option<i64>,
    redmine_priority_id: Option<i64>,
    redmine_author_id: Option<i64>,
    redmine_assignee_id: Option<i64>,
    proposed_project_id: Option<i64>,
    proposed_tracker_id: Option<i64>,
    proposed_status_id: Option<i64>,
    proposed_priority_id: Option<i64>,
    proposed_author_id: Option<i64>,
    proposed_assignee_id: Option<i64>,
    proposed_subject: Option<String>,
    proposed_description: Option<String>,
    proposed_start_date: Option<String>,
    proposed_due_date: Option<String>,
    proposed_done_ratio: Option<i32>,
    proposed_estimated_hours: Option<f64>,
    proposed_is_private: Option<bool>,
    proposed_custom_field_payload: Option<String>,
    migration_status: String,
    notes: Option<String>,
}

pub async fn run(pool: &MySqlPool, config: &IssuesMigrationConfig) -> anyhow::Result<TransformSummary> {
    let mapping_store = MappingStore::new(pool);
    let staging_store = StagingStore::new(pool);

    let synced = mapping_store.sync_from_staging().await?;
    if synced > 0 {
        tracing::info!("[synced] {synced} new mapping row(s) created from staging");
    }

    let lookups = Lookups::load(pool).await?;
    let rows = mapping_store.fetch_transformable().await?;

    let mut summary = TransformSummary::default();

    for mut row in rows {
        let Some(issue) = staging_store.fetch_issue_by_key(&row.jira_issue_key).await? else {
            summary.skipped += 1;
            tracing::warn!("[skipped] mapping {} has no staged Jira issue {}", row.id, row.jira_issue_key);
            continue;
        };

        if let Some(stored_hash) = row.automation_hash.clone() {
            let current_hash = hash::compute(&AutomationHashPayload::from_mapping_row(&row));
            if current_hash != stored_hash {
                tracing::info!("[preserved] mapping {} has manual edits; leaving untouched", row.id);
                summary.manual_overrides += 1;
                continue;
            }
        }

        let attachment_rows = mapping_store.attachments_for_issue(row.jira_issue_id).await?;
        let attachment_index = build_attachment_index(&attachment_rows);

        let previous_hash = row.automation_hash.clone();
        let outcome = transform_one(&row, &issue, &lookups, config, &attachment_index);
        apply_outcome(&mut row, outcome);

        let new_hash = hash::compute(&AutomationHashPayload::from_mapping_row(&row));
        row.automation_hash = Some(new_hash.clone());

        mapping_store.update_transform_result(&row).await?;

        *summary.status_counts.entry(row.migration_status.clone()).or_insert(0) += 1;
        if previous_hash.as_deref() == Some(new_hash.as_str()) {
            summary.unchanged += 1;
        } else {
            match row.migration_status.as_str() {
                "MATCH_FOUND" => summary.matched += 1,
                "READY_FOR_CREATION" => summary.ready_for_creation += 1,
                "MANUAL_INTERVENTION_REQUIRED" => summary.manual_review += 1,
                _ => {}
            }
        }
    }

    Ok(summary)
}

fn build_attachment_index(rows: &[AttachmentMappingRow]) -> AttachmentIndex {
    let mut index = AttachmentIndex::new();
    for row in rows {
        index.insert(
            row.jira_attachment_id,
            AttachmentTarget {
                unique_filename: attachments::unique_filename(row.jira_attachment_id, &row.original_filename),
                sharepoint_url: row.sharepoint_url.clone(),
            },
        );
    }
    index
}

fn apply_outcome(row: &mut IssueMappingRow, outcome: TransformOutcome) {
    row.redmine_project_id = outcome.redmine_project_id;
    row.redmine_tracker_id = outcome.redmine_tracker_id;
    row.redmine_status_id = outcome.redmine_status_id;
    row.redmine_priority_id = outcome.redmine_priority_id;
    row.redmine_author_id = outcome.redmine_author_id;
    row.redmine_assignee_id = outcome.redmine_assignee_id;
    row.proposed_project_id = outcome.proposed_project_id;
    row.proposed_tracker_id = outcome.proposed_tracker_id;
    row.proposed_status_id = outcome.proposed_status_id;
    row.proposed_priority_id = outcome.proposed_priority_id;
    row.proposed_author_id = outcome.proposed_author_id;
    row.proposed_assignee_id = outcome.proposed_assignee_id;
    row.proposed_subject = outcome.proposed_subject;
    row.proposed_description = outcome.proposed_description;
    row.proposed_start_date = outcome.proposed_start_date;
    row.proposed_due_date = outcome.proposed_due_date;
    row.proposed_done_ratio = outcome.proposed_done_ratio;
    row.proposed_estimated_hours = outcome.proposed_estimated_hours;
    row.proposed_is_private = outcome.proposed_is_private;
    row.proposed_custom_field_payload = outcome.proposed_custom_field_payload;
    row.migration_status = outcome.migration_status;
    row.notes = outcome.notes;
}

fn transform_one(
    row: &IssueMappingRow,
    issue: &JiraIssueRow,
    lookups: &Lookups,
    config: &IssuesMigrationConfig,
    attachment_index: &AttachmentIndex,
) -> TransformOutcome {
    let fields: Value = serde_json::from_str(&issue.raw_payload).unwrap_or(Value::Null);

    let redmine_project_id = lookups.projects.resolve_usable(&issue.project_id);
    let redmine_tracker_id = lookups.trackers.resolve_usable(&issue.issue_type_id);
    let redmine_status_id = lookups.statuses.resolve_usable(&issue.status_id);
    let redmine_priority_id = issue.priority_id.as_deref().and_then(|id| lookups.priorities.resolve_usable(id));
    let redmine_author_id = issue.reporter_account_id.as_deref().and_then(|id| lookups.users.resolve_usable(id));
    let redmine_assignee_id = issue.assignee_account_id.as_deref().and_then(|id| lookups.users.resolve_usable(id));

    let proposed_project_id = redmine_project_id.or(config.default_redmine_project_id.map(|v| v as i64));
    let proposed_tracker_id = redmine_tracker_id.or(config.default_redmine_tracker_id.map(|v| v as i64));
    let proposed_status_id = redmine_status_id.or(config.default_redmine_status_id.map(|v| v as i64));
    let proposed_priority_id = redmine_priority_id.or(config.default_redmine_priority_id.map(|v| v as i64));
    // redmine_author_id doubles as the proposed author: the Pusher omits
    // `author_id` from the default payload regardless (spec.md §9 open
    // question #2), but the resolved/defaulted value is still recorded here.
    let proposed_author_id = redmine_author_id.or(config.default_redmine_author_id.map(|v| v as i64));
    let proposed_assignee_id = redmine_assignee_id.or(config.default_redmine_assignee_id.map(|v| v as i64));

    let description_adf: Option<Value> = issue.description_adf.as_deref().and_then(|s| serde_json::from_str(s).ok());
    let mut proposed_description = doc::build_description(issue.description_html.as_deref(), description_adf.as_ref(), attachment_index);
    if let Some(desc) = &proposed_description {
        if attachments::references_any_attachment(desc, attachment_index) {
            let rewritten = attachments::rewrite_markdown_links(desc, attachment_index);
            proposed_description = Some(attachments::strip_redundant_link_titles(&rewritten));
        }
    }

    let proposed_subject = Some(truncate_unicode(&issue.summary, 255));
    let proposed_start_date = issue.created_at.map(|dt| dt.format("%Y-%m-%d").to_string());
    let proposed_due_date = issue.due_date.clone();
    let proposed_done_ratio = issue
        .status_category_key
        .as_deref()
        .filter(|k| k.eq_ignore_ascii_case("done"))
        .map(|_| 100);
    let proposed_estimated_hours = issue
        .time_original_estimate
        .map(|secs| (secs as f64 / 3600.0 * 100.0).round() / 100.0);
    let proposed_is_private = match fields.get("security") {
        None | Some(Value::Null) => config.default_is_private,
        Some(_) => true,
    };

    let custom_entries = customfield::build_payload(&fields, lookups);
    let proposed_custom_field_payload = if custom_entries.is_empty() {
        None
    } else {
        serde_json::to_string(&custom_entries).ok()
    };

    let (migration_status, notes) = if row.redmine_issue_id.is_some() {
        ("MATCH_FOUND".to_string(), None)
    } else {
        let mut missing = Vec::new();
        if proposed_project_id.is_none() {
            missing.push("Project not mapped");
        }
        if proposed_tracker_id.is_none() {
            missing.push("Tracker not mapped");
        }
        if proposed_status_id.is_none() {
            missing.push("Status not mapped");
        }
        if issue.priority_id.is_some() && proposed_priority_id.is_none() {
            missing.push("Priority not mapped");
        }
        if issue.reporter_account_id.is_some() && proposed_author_id.is_none() {
            missing.push("Reporter not mapped");
        }
        if issue.assignee_account_id.is_some() && proposed_assignee_id.is_none() {
            missing.push("Assignee not mapped");
        }
        if missing.is_empty() {
            ("READY_FOR_CREATION".to_string(), None)
        } else {
            ("MANUAL_INTERVENTION_REQUIRED".to_string(), Some(missing.join("; ")))
        }
    };

    TransformOutcome {
        redmine_project_id,
        redmine_tracker_id,
        redmine_status_id,
        redmine_priority_id,
        redmine_author_id,
        redmine_assignee_id,
        proposed_project_id,
        proposed_tracker_id,
        proposed_status_id,
        proposed_priority_id,
        proposed_author_id,
        proposed_assignee_id,
        proposed_subject,
        proposed_description,
        proposed_start_date,
        proposed_due_date,
        proposed_done_ratio,
        proposed_estimated_hours,
        proposed_is_private: Some(proposed_is_private),
        proposed_custom_field_payload,
        migration_status,
        notes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn base_config() -> IssuesMigrationConfig {
        IssuesMigrationConfig {
            jql: None,
            batch_size: 100,
            default_redmine_project_id: None,
            default_redmine_tracker_id: None,
            default_redmine_status_id: None,
            default_redmine_priority_id: None,
            default_redmine_author_id: None,
            default_redmine_assignee_id: None,
            default_is_private: false,
        }
    }

    fn base_issue() -> JiraIssueRow {
        JiraIssueRow {
            id: 1001,
            issue_key: "PRJ-1".to_string(),
            project_id: "10".to_string(),
            issue_type_id: "100".to_string(),
            status_id: "1".to_string(),
            status_category_key: Some("new".to_string()),
            priority_id: Some("3".to_string()),
            reporter_account_id: None,
            assignee_account_id: None,
            parent_account_id: None,
            summary: "Bug 1".to_string(),
            description_adf: None,
            description_html: None,
            due_date: None,
            time_original_estimate: Some(7200),
            time_remaining_estimate: None,
            time_spent: None,
            labels: None,
            fix_versions: None,
            components: None,
            created_at: Some(NaiveDateTime::parse_from_str("2024-01-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap()),
            updated_at: None,
            raw_payload: "{}".to_string(),
            extracted_at: NaiveDateTime::parse_from_str("2024-01-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    fn base_row() -> IssueMappingRow {
        IssueMappingRow {
            id: 1,
            jira_issue_id: 1001,
            jira_issue_key: "PRJ-1".to_string(),
            jira_project_id: "10".to_string(),
            jira_issue_type_id: "100".to_string(),
            jira_status_id: "1".to_string(),
            jira_priority_id: Some("3".to_string()),
            jira_reporter_account_id: None,
            jira_assignee_account_id: None,
            redmine_project_id: None,
            redmine_tracker_id: None,
            redmine_status_id: None,
            redmine_priority_id: None,
            redmine_author_id: None,
            redmine_assignee_id: None,
            redmine_issue_id: None,
            proposed_project_id: None,
            proposed_tracker_id: None,
            proposed_status_id: None,
            proposed_priority_id: None,
            proposed_author_id: None,
            proposed_assignee_id: None,
            proposed_subject: None,
            proposed_description: None,
            proposed_start_date: None,
            proposed_due_date: None,
            proposed_done_ratio: None,
            proposed_estimated_hours: None,
            proposed_is_private: None,
            proposed_custom_field_payload: None,
            migration_status: "PENDING_ANALYSIS".to_string(),
            notes: None,
            automation_hash: None,
            last_updated_at: NaiveDateTime::parse_from_str("2024-01-01 10:00:00", "%Y-%m-%d %H:%M:%S").unwrap(),
        }
    }

    fn empty_lookups() -> Lookups {
        Lookups {
            projects: Default::default(),
            trackers: Default::default(),
            statuses: Default::default(),
            priorities: Default::default(),
            users: Default::default(),
            custom_fields: Vec::new(),
            custom_field_enumerations: HashMap::new(),
            cascading_options: HashMap::new(),
            cascading_options_by_label: HashMap::new(),
        }
    }

    #[test]
    fn ready_for_creation_when_defaults_cover_every_dependency() {
        let mut config = base_config();
        config.default_redmine_project_id = Some(1);
        config.default_redmine_tracker_id = Some(2);
        config.default_redmine_status_id = Some(1);
        config.default_redmine_priority_id = Some(5);

        let row = base_row();
        let issue = base_issue();
        let lookups = empty_lookups();
        let index = AttachmentIndex::new();

        let outcome = transform_one(&row, &issue, &lookups, &config, &index);
        assert_eq!(outcome.migration_status, "READY_FOR_CREATION");
        assert_eq!(outcome.proposed_project_id, Some(1));
        assert_eq!(outcome.proposed_subject.as_deref(), Some("Bug 1"));
        assert_eq!(outcome.proposed_start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(outcome.proposed_estimated_hours, Some(2.0));
    }

    #[test]
    fn manual_intervention_when_status_unmapped() {
        let mut config = base_config();
        config.default_redmine_project_id = Some(1);
        config.default_redmine_tracker_id = Some(2);
        config.default_redmine_priority_id = Some(5);

        let row = base_row();
        let issue = base_issue();
        let lookups = empty_lookups();
        let index = AttachmentIndex::new();

        let outcome = transform_one(&row, &issue, &lookups, &config, &index);
        assert_eq!(outcome.migration_status, "MANUAL_INTERVENTION_REQUIRED");
        assert!(outcome.notes.unwrap().contains("Status not mapped"));
    }

    #[test]
    fn already_linked_issue_is_match_found_regardless_of_mapping_gaps() {
        let config = base_config();
        let mut row = base_row();
        row.redmine_issue_id = Some(777);
        let issue = base_issue();
        let lookups = empty_lookups();
        let index = AttachmentIndex::new();

        let outcome = transform_one(&row, &issue, &lookups, &config, &index);
        assert_eq!(outcome.migration_status, "MATCH_FOUND");
        assert!(outcome.notes.is_none());
    }

    #[test]
    fn done_status_category_sets_full_done_ratio() {
        let config = base_config();
        let row = base_row();
        let mut issue = base_issue();
        issue.status_category_key = Some("Done".to_string());
        let lookups = empty_lookups();
        let index = AttachmentIndex::new();

        let outcome = transform_one(&row, &issue, &lookups, &config, &index);
        assert_eq!(outcome.proposed_done_ratio, Some(100));
    }

    #[test]
    fn security_field_present_forces_private() {
        let config = base_config();
        let row = base_row();
        let mut issue = base_issue();
        issue.raw_payload = serde_json::json!({"security": {"id": "1"}}).to_string();
        let lookups = empty_lookups();
        let index = AttachmentIndex::new();

        let outcome = transform_one(&row, &issue, &lookups, &config, &index);
        assert_eq!(outcome.proposed_is_private, Some(true));
    }
}
