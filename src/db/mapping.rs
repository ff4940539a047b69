use sqlx::MySqlPool;

use super::models::{AttachmentMappingRow, IssueMappingRow};

pub struct MappingStore<'a> {
    pool: &'a MySqlPool,
}

impl<'a> MappingStore<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    /// Step 1 of the Transformer (spec.md §4.2): ensure every Jira issue
    /// currently in staging has exactly one mapping row, copying the
    /// Jira-side identity columns. No-op for issues already present.
    pub async fn sync_from_staging(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            r#"INSERT INTO migration_mapping_issues (
                jira_issue_id, jira_issue_key, jira_project_id, jira_issue_type_id,
                jira_status_id, jira_priority_id, jira_reporter_account_id, jira_assignee_account_id,
                migration_status
            )
            SELECT s.id, s.issue_key, s.project_id, s.issue_type_id, s.status_id,
                   s.priority_id, s.reporter_account_id, s.assignee_account_id,
                   'PENDING_ANALYSIS'
            FROM staging_jira_issues s
            LEFT JOIN migration_mapping_issues m ON m.jira_issue_id = s.id
            WHERE m.id IS NULL"#,
        )
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Rows eligible for a transform rerun (spec.md §4.2 step 3a), in
    /// ascending mapping_id order (spec.md §5).
    pub async fn fetch_transformable(&self) -> Result<Vec<IssueMappingRow>, sqlx::Error> {
        sqlx::query_as::<_, IssueMappingRow>(
            r#"SELECT * FROM migration_mapping_issues
               WHERE migration_status IN ('PENDING_ANALYSIS', 'READY_FOR_CREATION', 'MATCH_FOUND', 'CREATION_FAILED')
               ORDER BY id ASC"#,
        )
        .fetch_all(self.pool)
        .await
    }

    /// Rows ready for the Pusher (spec.md §4.3 step 1), ascending mapping_id.
    pub async fn fetch_ready_for_creation(&self) -> Result<Vec<IssueMappingRow>, sqlx::Error> {
        sqlx::query_as::<_, IssueMappingRow>(
            "SELECT * FROM migration_mapping_issues WHERE migration_status = 'READY_FOR_CREATION' ORDER BY id ASC",
        )
        .fetch_all(self.pool)
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn update_transform_result(&self, row: &IssueMappingRow) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"UPDATE migration_mapping_issues SET
                redmine_project_id = ?, redmine_tracker_id = ?, redmine_status_id = ?,
                redmine_priority_id = ?, redmine_author_id = ?, redmine_assignee_id = ?,
                proposed_project_id = ?, proposed_tracker_id = ?, proposed_status_id = ?,
                proposed_priority_id = ?, proposed_author_id = ?, proposed_assignee_id = ?,
                proposed_subject = ?, proposed_description = ?, proposed_start_date = ?,
                proposed_due_date = ?, proposed_done_ratio = ?, proposed_estimated_hours = ?,
                proposed_is_private = ?, proposed_custom_field_payload = ?,
                migration_status = ?, notes = ?, automation_hash = ?
            WHERE id = ?"#,
        )
        .bind(row.redmine_project_id)
        .bind(row.redmine_tracker_id)
        .bind(row.redmine_status_id)
        .bind(row.redmine_priority_id)
        .bind(row.redmine_author_id)
        .bind(row.redmine_assignee_id)
        .bind(row.proposed_project_id)
        .bind(row.proposed_tracker_id)
        .bind(row.proposed_status_id)
        .bind(row.proposed_priority_id)
        .bind(row.proposed_author_id)
        .bind(row.proposed_assignee_id)
        .bind(&row.proposed_subject)
        .bind(&row.proposed_description)
        .bind(&row.proposed_start_date)
        .bind(&row.proposed_due_date)
        .bind(row.proposed_done_ratio)
        .bind(row.proposed_estimated_hours)
        .bind(row.proposed_is_private)
        .bind(&row.proposed_custom_field_payload)
        .bind(&row.migration_status)
        .bind(&row.notes)
        .bind(&row.automation_hash)
        .bind(row.id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_status(&self, id: i64, status: &str, notes: Option<&str>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE migration_mapping_issues SET migration_status = ?, notes = ? WHERE id = ?")
            .bind(status)
            .bind(notes)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_created(&self, id: i64, redmine_issue_id: i64) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE migration_mapping_issues SET migration_status = 'CREATION_SUCCESS', redmine_issue_id = ?, notes = NULL WHERE id = ?",
        )
        .bind(redmine_issue_id)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn attachments_for_issue(&self, jira_issue_id: i64) -> Result<Vec<AttachmentMappingRow>, sqlx::Error> {
        sqlx::query_as::<_, AttachmentMappingRow>(
            "SELECT * FROM migration_mapping_attachments WHERE jira_issue_id = ? ORDER BY id ASC",
        )
        .bind(jira_issue_id)
        .fetch_all(self.pool)
        .await
    }

    pub async fn mark_attachment_success(&self, id: i64, note: Option<&str>) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE migration_mapping_attachments SET status = 'SUCCESS' WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        if let Some(note) = note {
            tracing::debug!("attachment {id} marked SUCCESS: {note}");
        }
        Ok(())
    }
}
