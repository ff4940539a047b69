//! Pusher (spec.md §4.3): Phase "push". Creates Redmine issues for every
//! `READY_FOR_CREATION` mapping row, carrying attachment associations and
//! SharePoint links forward, and never double-creating.

use serde_json::Value;
use sqlx::MySqlPool;

use crate::attachments;
use crate::db::mapping::MappingStore;
use crate::db::models::{AttachmentMappingRow, IssueMappingRow};
use crate::db::staging::StagingStore;
use crate::jira::model::{format_extended_timestamp, parse_timestamp};
use crate::redmine::client::RedmineClient;
use crate::redmine::model::{CustomFieldValue, IssueCreatePayload, IssueCreateRequest};

#[derive(Debug, Default)]
pub struct PushSummary {
    pub created: usize,
    pub blocked: usize,
    pub previewed: usize,
    pub failed: usize,
}

enum PushOutcome {
    Created(i64),
    Blocked(String),
    Previewed,
    Failed(String),
}

pub async fn run(
    pool: &MySqlPool,
    redmine: &RedmineClient,
    dry_run: bool,
    confirm_push: bool,
    use_extended_api: bool,
) -> anyhow::Result<PushSummary> {
    let mapping_store = MappingStore::new(pool);
    let staging_store = StagingStore::new(pool);

    if use_extended_api {
        redmine.probe_extended_api().await?;
    }

    let candidates = mapping_store.fetch_ready_for_creation().await?;
    let mut summary = PushSummary::default();
    let perform_writes = confirm_push && !dry_run;

    for row in candidates {
        let outcome =
            push_one(&mapping_store, &staging_store, redmine, &row, perform_writes, dry_run, use_extended_api).await?;
        match outcome {
            PushOutcome::Created(id) => {
                summary.created += 1;
                tracing::info!("[created] {} -> redmine #{id}", row.jira_issue_key);
            }
            PushOutcome::Blocked(reason) => {
                summary.blocked += 1;
                tracing::warn!("[blocked] {}: {reason}", row.jira_issue_key);
            }
            PushOutcome::Previewed => {
                summary.previewed += 1;
            }
            PushOutcome::Failed(reason) => {
                summary.failed += 1;
                tracing::error!("[error] {}: {reason}", row.jira_issue_key);
            }
        }
    }

    Ok(summary)
}

async fn push_one(
    mapping_store: &MappingStore<'_>,
    staging_store: &StagingStore<'_>,
    redmine: &RedmineClient,
    row: &IssueMappingRow,
    perform_writes: bool,
    dry_run: bool,
    use_extended_api: bool,
) -> anyhow::Result<PushOutcome> {
    let attachment_rows = mapping_store.attachments_for_issue(row.jira_issue_id).await?;

    let blocked_pending = attachment_rows
        .iter()
        .filter(|a| a.status == "PENDING_DOWNLOAD" || a.status == "PENDING_UPLOAD")
        .count();
    if blocked_pending > 0 {
        let note = format!("Blocked: {blocked_pending} attachment(s) still pending download/upload");
        mapping_store.mark_status(row.id, "MANUAL_INTERVENTION_REQUIRED", Some(&note)).await?;
        return Ok(PushOutcome::Blocked(note));
    }

    let pending_association: Vec<&AttachmentMappingRow> =
        attachment_rows.iter().filter(|a| a.status == "PENDING_ASSOCIATION").collect();
    let usable: Vec<&AttachmentMappingRow> = pending_association
        .iter()
        .copied()
        .filter(|a| is_present(&a.redmine_upload_token) || is_present(&a.sharepoint_url))
        .collect();
    if pending_association.len() != usable.len() {
        let note = "Blocked: attachment association count mismatch".to_string();
        mapping_store.mark_status(row.id, "MANUAL_INTERVENTION_REQUIRED", Some(&note)).await?;
        return Ok(PushOutcome::Blocked(note));
    }

    let (Some(project_id), Some(tracker_id), Some(status_id)) =
        (row.proposed_project_id, row.proposed_tracker_id, row.proposed_status_id)
    else {
        let note = "Missing mandatory proposed attributes".to_string();
        mapping_store.mark_status(row.id, "MANUAL_INTERVENTION_REQUIRED", Some(&note)).await?;
        return Ok(PushOutcome::Blocked(note));
    };

    let mut uploads = Vec::new();
    let mut sharepoint_links = Vec::new();
    for attachment in &usable {
        let has_token = is_present(&attachment.redmine_upload_token);
        let has_sharepoint = is_present(&attachment.sharepoint_url);
        let unique = attachments::unique_filename(attachment.jira_attachment_id, &attachment.original_filename);
        if has_sharepoint {
            if has_token {
                tracing::warn!(
                    "attachment {} has both a Redmine token and a SharePoint URL; preferring SharePoint",
                    attachment.jira_attachment_id
                );
            }
            sharepoint_links.push((unique, attachment.sharepoint_url.clone().unwrap()));
        } else if has_token {
            uploads.push(crate::redmine::model::UploadRef {
                token: attachment.redmine_upload_token.clone().unwrap(),
                filename: unique,
                description: attachment.original_filename.clone(),
                content_type: None,
            });
        }
    }

    let description = append_sharepoint_links(row.proposed_description.as_deref(), &sharepoint_links);

    let custom_fields = row
        .proposed_custom_field_payload
        .as_deref()
        .and_then(|s| serde_json::from_str::<Vec<CustomFieldValue>>(s).ok());

    let mut payload = IssueCreatePayload {
        project_id,
        tracker_id,
        status_id,
        priority_id: row.proposed_priority_id,
        subject: row.proposed_subject.clone().unwrap_or_default(),
        description,
        start_date: row.proposed_start_date.clone(),
        due_date: row.proposed_due_date.clone(),
        assigned_to_id: row.proposed_assignee_id,
        done_ratio: row.proposed_done_ratio,
        estimated_hours: row.proposed_estimated_hours,
        is_private: row.proposed_is_private.map(|p| if p { 1 } else { 0 }),
        custom_fields,
        uploads: if uploads.is_empty() { None } else { Some(uploads) },
        ..IssueCreatePayload::default()
    };

    // Extended-API overrides (spec.md §9 open question #2): `author_id` is
    // omitted from the default payload even when resolved, and only
    // included once the extended API path is in use. `created_on`/
    // `updated_on`/`closed_on` mirror the original Jira timestamps
    // (spec.md §4.3 step 2) so the Redmine copy doesn't read as created
    // "now" by the migration run.
    if use_extended_api {
        payload.author_id = row.proposed_author_id;
        if let Some(issue) = staging_store.fetch_issue_by_key(&row.jira_issue_key).await? {
            payload.created_on = issue.created_at.map(format_extended_timestamp);
            payload.updated_on = issue.updated_at.map(format_extended_timestamp);
            let fields: Value = serde_json::from_str(&issue.raw_payload).unwrap_or(Value::Null);
            payload.closed_on = fields
                .get("resolutiondate")
                .and_then(Value::as_str)
                .and_then(parse_timestamp)
                .map(format_extended_timestamp);
        }
    }

    let request = IssueCreateRequest { issue: payload };
    let endpoint = if use_extended_api { "extended_api/issues.json" } else { "issues.json" };

    if dry_run || !perform_writes {
        let pretty = serde_json::to_string_pretty(&request).unwrap_or_default();
        tracing::info!("[dry-run] POST {endpoint}\n{pretty}");
        return Ok(PushOutcome::Previewed);
    }

    match redmine.create_issue(&request, use_extended_api).await {
        Ok(issue_id) => {
            mapping_store.mark_created(row.id, issue_id).await?;
            for attachment in &usable {
                if is_present(&attachment.sharepoint_url) {
                    let url = attachment.sharepoint_url.as_deref().unwrap();
                    mapping_store
                        .mark_attachment_success(attachment.id, Some(&format!("Attachment stored on SharePoint: {url}")))
                        .await?;
                } else {
                    mapping_store.mark_attachment_success(attachment.id, None).await?;
                }
            }
            Ok(PushOutcome::Created(issue_id))
        }
        Err(e) => {
            let note = e.to_string();
            mapping_store.mark_status(row.id, "CREATION_FAILED", Some(&note)).await?;
            Ok(PushOutcome::Failed(note))
        }
    }
}

fn is_present(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

/// `append_sharepoint_links` (spec.md §4.3): skip any link already
/// referenced in the description by URL, by unique name, or by
/// `attachment:<unique>`.
fn append_sharepoint_links(description: Option<&str>, links: &[(String, String)]) -> Option<String> {
    if links.is_empty() {
        return description.map(str::to_string);
    }
    let base = description.unwrap_or("");
    let mut block = String::from("\n\n---\n**Attachments stored on SharePoint:**\n");
    let mut any = false;
    for (unique, url) in links {
        if base.contains(url.as_str()) || base.contains(unique.as_str()) || base.contains(&format!("attachment:{unique}")) {
            continue;
        }
        block.push_str(&format!("- {unique}: {url}\n"));
        any = true;
    }
    if !any {
        return if base.is_empty() { None } else { Some(base.to_string()) };
    }
    Some(format!("{base}{block}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_sharepoint_links_skips_already_referenced_urls() {
        let description = Some("see attachment:42__file.pdf for details");
        let links = vec![("42__file.pdf".to_string(), "https://contoso.sharepoint.com/x.pdf".to_string())];
        let out = append_sharepoint_links(description, &links);
        assert_eq!(out.as_deref(), description);
    }

    #[test]
    fn append_sharepoint_links_appends_block_for_new_links() {
        let out = append_sharepoint_links(
            Some("body text"),
            &[("7__x.png".to_string(), "https://contoso.sharepoint.com/x.png".to_string())],
        );
        let out = out.unwrap();
        assert!(out.starts_with("body text"));
        assert!(out.contains("**Attachments stored on SharePoint:**"));
        assert!(out.contains("7__x.png: https://contoso.sharepoint.com/x.png"));
    }

    #[test]
    fn append_sharepoint_links_is_noop_without_links() {
        assert_eq!(append_sharepoint_links(Some("body"), &[]).as_deref(), Some("body"));
        assert_eq!(append_sharepoint_links(None, &[]), None);
    }
}
