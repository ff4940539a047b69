use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// `staging_jira_issues` — a raw, idempotent copy of one Jira issue (spec.md §3).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JiraIssueRow {
    pub id: i64,
    pub issue_key: String,
    pub project_id: String,
    pub issue_type_id: String,
    pub status_id: String,
    pub status_category_key: Option<String>,
    pub priority_id: Option<String>,
    pub reporter_account_id: Option<String>,
    pub assignee_account_id: Option<String>,
    pub parent_account_id: Option<String>,
    pub summary: String,
    pub description_adf: Option<String>,
    pub description_html: Option<String>,
    pub due_date: Option<String>,
    pub time_original_estimate: Option<i64>,
    pub time_remaining_estimate: Option<i64>,
    pub time_spent: Option<i64>,
    pub labels: Option<String>,
    pub fix_versions: Option<String>,
    pub components: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub raw_payload: String,
    pub extracted_at: NaiveDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JiraAttachmentRow {
    pub id: i64,
    pub issue_id: i64,
    pub filename: String,
    pub size_bytes: Option<i64>,
    pub mime_type: Option<String>,
    pub content_url: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JiraIssueLinkRow {
    pub link_id: i64,
    pub source_issue_key: String,
    pub target_issue_key: String,
    pub link_type: String,
}

/// One row in `migration_mapping_issues` — the state machine (spec.md §3).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IssueMappingRow {
    pub id: i64,
    pub jira_issue_id: i64,
    pub jira_issue_key: String,
    pub jira_project_id: String,
    pub jira_issue_type_id: String,
    pub jira_status_id: String,
    pub jira_priority_id: Option<String>,
    pub jira_reporter_account_id: Option<String>,
    pub jira_assignee_account_id: Option<String>,

    pub redmine_project_id: Option<i64>,
    pub redmine_tracker_id: Option<i64>,
    pub redmine_status_id: Option<i64>,
    pub redmine_priority_id: Option<i64>,
    pub redmine_author_id: Option<i64>,
    pub redmine_assignee_id: Option<i64>,
    pub redmine_issue_id: Option<i64>,

    pub proposed_project_id: Option<i64>,
    pub proposed_tracker_id: Option<i64>,
    pub proposed_status_id: Option<i64>,
    pub proposed_priority_id: Option<i64>,
    pub proposed_author_id: Option<i64>,
    pub proposed_assignee_id: Option<i64>,
    pub proposed_subject: Option<String>,
    pub proposed_description: Option<String>,
    pub proposed_start_date: Option<String>,
    pub proposed_due_date: Option<String>,
    pub proposed_done_ratio: Option<i32>,
    pub proposed_estimated_hours: Option<f64>,
    pub proposed_is_private: Option<bool>,
    pub proposed_custom_field_payload: Option<String>,

    pub migration_status: String,
    pub notes: Option<String>,
    pub automation_hash: Option<String>,
    pub last_updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MigrationStatus {
    PendingAnalysis,
    MatchFound,
    ReadyForCreation,
    CreationSuccess,
    CreationFailed,
    ManualInterventionRequired,
    Ignored,
}

impl MigrationStatus {
    pub fn as_db_str(self) -> &'static str {
        match self {
            MigrationStatus::PendingAnalysis => "PENDING_ANALYSIS",
            MigrationStatus::MatchFound => "MATCH_FOUND",
            MigrationStatus::ReadyForCreation => "READY_FOR_CREATION",
            MigrationStatus::CreationSuccess => "CREATION_SUCCESS",
            MigrationStatus::CreationFailed => "CREATION_FAILED",
            MigrationStatus::ManualInterventionRequired => "MANUAL_INTERVENTION_REQUIRED",
            MigrationStatus::Ignored => "IGNORED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        Some(match s {
            "PENDING_ANALYSIS" => MigrationStatus::PendingAnalysis,
            "MATCH_FOUND" => MigrationStatus::MatchFound,
            "READY_FOR_CREATION" => MigrationStatus::ReadyForCreation,
            "CREATION_SUCCESS" => MigrationStatus::CreationSuccess,
            "CREATION_FAILED" => MigrationStatus::CreationFailed,
            "MANUAL_INTERVENTION_REQUIRED" => MigrationStatus::ManualInterventionRequired,
            "IGNORED" => MigrationStatus::Ignored,
            _ => return None,
        })
    }

    /// Resolved-dependency statuses accepted by the Mapping Resolvers (spec.md §3).
    pub fn is_resolved(self) -> bool {
        matches!(self, MigrationStatus::MatchFound | MigrationStatus::CreationSuccess)
    }
}

/// `migration_mapping_attachments` (spec.md §3).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AttachmentMappingRow {
    pub id: i64,
    pub jira_attachment_id: i64,
    pub jira_issue_id: i64,
    pub original_filename: String,
    pub redmine_upload_token: Option<String>,
    pub sharepoint_url: Option<String>,
    pub status: String,
    pub association_hint: String,
}

/// A resolved entry from a per-entity lookup table (project/tracker/status/
/// priority/user): the Redmine numeric id plus the migration_status gating
/// whether it is usable yet (spec.md §3).
#[derive(Debug, Clone, Copy)]
pub struct ResolvedId {
    pub redmine_id: i64,
    pub resolved: bool,
}

/// `migration_mapping_custom_fields` (spec.md §3).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomFieldMappingRow {
    pub jira_field_id: String,
    pub redmine_custom_field_id: i64,
    pub field_format: String,
    pub is_multiple: bool,
    pub mapping_parent_custom_field_id: Option<String>,
}

/// One enumeration entry for a custom field: Jira value/label/option id -> Redmine label.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CustomFieldEnumerationRow {
    pub jira_field_id: String,
    pub jira_value: String,
    pub redmine_label: String,
}

/// One cascading child entry: Jira child option id -> parent/child Redmine labels.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CascadingOptionRow {
    pub jira_child_option_id: String,
    pub jira_child_label: Option<String>,
    pub parent_field_id: i64,
    pub child_field_id: i64,
    pub parent_label: String,
    pub child_label: String,
}
