//! Automation-Hash Oracle (spec.md §4.7): a SHA-256 digest over the
//! canonical JSON of an IssueMapping's automation-managed fields, used as
//! an optimistic-locking token against manual edits (spec.md §8 property 5).

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::db::models::IssueMappingRow;

/// The exact, ordered field set spec.md §4.7 requires ("§3 IssueMapping's
/// Redmine-side and proposed-* fields, plus `proposed_custom_field_payload`").
/// Field order here IS the canonical order: this is a plain struct, not a
/// sorted map, so `serde_json::to_string` preserves it across runs and
/// process restarts.
#[derive(Debug, Clone, Serialize)]
pub struct AutomationHashPayload {
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
}

impl AutomationHashPayload {
    pub fn from_mapping_row(row: &IssueMappingRow) -> Self {
        Self {
            redmine_project_id: row.redmine_project_id,
            redmine_tracker_id: row.redmine_tracker_id,
            redmine_status_id: row.redmine_status_id,
            redmine_priority_id: row.redmine_priority_id,
            redmine_author_id: row.redmine_author_id,
            redmine_assignee_id: row.redmine_assignee_id,
            redmine_issue_id: row.redmine_issue_id,
            proposed_project_id: row.proposed_project_id,
            proposed_tracker_id: row.proposed_tracker_id,
            proposed_status_id: row.proposed_status_id,
            proposed_priority_id: row.proposed_priority_id,
            proposed_author_id: row.proposed_author_id,
            proposed_assignee_id: row.proposed_assignee_id,
            proposed_subject: row.proposed_subject.clone(),
            proposed_description: row.proposed_description.clone(),
            proposed_start_date: row.proposed_start_date.clone(),
            proposed_due_date: row.proposed_due_date.clone(),
            proposed_done_ratio: row.proposed_done_ratio,
            proposed_estimated_hours: row.proposed_estimated_hours,
            proposed_is_private: row.proposed_is_private,
            proposed_custom_field_payload: row.proposed_custom_field_payload.clone(),
        }
    }
}

/// `automation_hash = SHA-256(canonical_json(payload))`, lowercase hex.
/// `serde_json` doesn't escape non-ASCII or `/` by default, matching the
/// "unescaped Unicode and unescaped slashes" requirement.
pub fn compute(payload: &AutomationHashPayload) -> String {
    let canonical = serde_json::to_string(payload).expect("AutomationHashPayload always serializes");
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AutomationHashPayload {
        AutomationHashPayload {
            redmine_project_id: Some(1),
            redmine_tracker_id: Some(2),
            redmine_status_id: Some(1),
            redmine_priority_id: Some(5),
            redmine_author_id: None,
            redmine_assignee_id: None,
            redmine_issue_id: Some(777),
            proposed_project_id: Some(1),
            proposed_tracker_id: Some(2),
            proposed_status_id: Some(1),
            proposed_priority_id: Some(5),
            proposed_author_id: None,
            proposed_assignee_id: None,
            proposed_subject: Some("Bug 1".to_string()),
            proposed_description: None,
            proposed_start_date: Some("2024-01-01".to_string()),
            proposed_due_date: None,
            proposed_done_ratio: None,
            proposed_estimated_hours: Some(2.0),
            proposed_is_private: Some(false),
            proposed_custom_field_payload: Some("[]".to_string()),
        }
    }

    #[test]
    fn hash_is_deterministic_across_many_computations() {
        let payload = sample();
        let first = compute(&payload);
        for _ in 0..1000 {
            assert_eq!(compute(&payload), first);
        }
    }

    #[test]
    fn hash_is_lowercase_hex_of_sha256_length() {
        let hash = compute(&sample());
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn differing_fields_yield_differing_hashes() {
        let mut payload = sample();
        let base = compute(&payload);
        payload.proposed_subject = Some("Different subject".to_string());
        assert_ne!(compute(&payload), base);
    }

    #[test]
    fn unicode_and_slashes_are_not_escaped() {
        let mut payload = sample();
        payload.proposed_subject = Some("café / naïve".to_string());
        let canonical = serde_json::to_string(&payload).unwrap();
        assert!(canonical.contains("café / naïve"));
    }
}
