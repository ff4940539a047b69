use chrono::NaiveDateTime;
use sqlx::MySqlPool;

use super::models::JiraIssueRow;

/// A Jira project whose issues have not yet been extracted (spec.md §4.1).
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PendingProject {
    pub jira_project_id: String,
    pub jira_project_key: String,
}

/// Read/write access to `staging_jira_*` and the project mapping's
/// extraction stamp. Owns no state beyond the pool (spec.md §9
/// "Ambient state for prepared statements" design note: statements are
/// scoped per call, the pool itself is the long-lived resource).
pub struct StagingStore<'a> {
    pool: &'a MySqlPool,
}

impl<'a> StagingStore<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }

    pub async fn projects_pending_extraction(&self) -> Result<Vec<PendingProject>, sqlx::Error> {
        sqlx::query_as::<_, PendingProject>(
            "SELECT jira_project_id, jira_project_key FROM migration_mapping_projects \
             WHERE issues_extracted_at IS NULL ORDER BY jira_project_key ASC",
        )
        .fetch_all(self.pool)
        .await
    }

    pub async fn stamp_project_extracted(&self, jira_project_id: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE migration_mapping_projects SET issues_extracted_at = NOW() WHERE jira_project_id = ?",
        )
        .bind(jira_project_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Idempotent upsert keyed by `id`, updating every column on conflict
    /// (spec.md §4.1 step 4).
    #[allow(clippy::too_many_arguments)]
    pub async fn upsert_issue(&self, issue: &NormalizedIssue) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO staging_jira_issues (
                id, issue_key, project_id, issue_type_id, status_id, status_category_key,
                priority_id, reporter_account_id, assignee_account_id, parent_account_id,
                summary, description_adf, description_html, due_date,
                time_original_estimate, time_remaining_estimate, time_spent,
                labels, fix_versions, components, created_at, updated_at,
                raw_payload, extracted_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NOW())
            ON DUPLICATE KEY UPDATE
                issue_key = VALUES(issue_key),
                project_id = VALUES(project_id),
                issue_type_id = VALUES(issue_type_id),
                status_id = VALUES(status_id),
                status_category_key = VALUES(status_category_key),
                priority_id = VALUES(priority_id),
                reporter_account_id = VALUES(reporter_account_id),
                assignee_account_id = VALUES(assignee_account_id),
                parent_account_id = VALUES(parent_account_id),
                summary = VALUES(summary),
                description_adf = VALUES(description_adf),
                description_html = VALUES(description_html),
                due_date = VALUES(due_date),
                time_original_estimate = VALUES(time_original_estimate),
                time_remaining_estimate = VALUES(time_remaining_estimate),
                time_spent = VALUES(time_spent),
                labels = VALUES(labels),
                fix_versions = VALUES(fix_versions),
                components = VALUES(components),
                created_at = VALUES(created_at),
                updated_at = VALUES(updated_at),
                raw_payload = VALUES(raw_payload),
                extracted_at = NOW()
            "#,
        )
        .bind(issue.id)
        .bind(&issue.issue_key)
        .bind(&issue.project_id)
        .bind(&issue.issue_type_id)
        .bind(&issue.status_id)
        .bind(&issue.status_category_key)
        .bind(&issue.priority_id)
        .bind(&issue.reporter_account_id)
        .bind(&issue.assignee_account_id)
        .bind(&issue.parent_account_id)
        .bind(&issue.summary)
        .bind(&issue.description_adf)
        .bind(&issue.description_html)
        .bind(&issue.due_date)
        .bind(issue.time_original_estimate)
        .bind(issue.time_remaining_estimate)
        .bind(issue.time_spent)
        .bind(&issue.labels)
        .bind(&issue.fix_versions)
        .bind(&issue.components)
        .bind(issue.created_at)
        .bind(issue.updated_at)
        .bind(&issue.raw_payload)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn upsert_label(&self, name: &str) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT IGNORE INTO staging_jira_labels (name) VALUES (?)")
            .bind(name)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    /// Canonicalize and upsert a Jira issue link. `source`/`target` must
    /// already be in outward direction (spec.md §3 JiraIssueLink).
    pub async fn upsert_issue_link(
        &self,
        link_id: i64,
        source_issue_key: &str,
        target_issue_key: &str,
        link_type: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO staging_jira_issue_links (link_id, source_issue_key, target_issue_key, link_type)
               VALUES (?, ?, ?, ?)
               ON DUPLICATE KEY UPDATE
                   source_issue_key = VALUES(source_issue_key),
                   target_issue_key = VALUES(target_issue_key),
                   link_type = VALUES(link_type)"#,
        )
        .bind(link_id)
        .bind(source_issue_key)
        .bind(target_issue_key)
        .bind(link_type)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Delete the previous samples for this (field, issue) pair before
    /// inserting the fresh ones (spec.md §4.1 step 5).
    pub async fn replace_object_samples(
        &self,
        field_id: &str,
        issue_key: &str,
        samples: &[serde_json::Value],
        kv: &[(String, i32, String)],
    ) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM staging_jira_object_samples WHERE field_id = ? AND issue_key = ?")
            .bind(field_id)
            .bind(issue_key)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM staging_jira_object_kv WHERE field_id = ? AND issue_key = ?")
            .bind(field_id)
            .bind(issue_key)
            .execute(&mut *tx)
            .await?;
        for (ordinal, sample) in samples.iter().enumerate() {
            sqlx::query(
                "INSERT INTO staging_jira_object_samples (field_id, issue_key, ordinal, sample) VALUES (?, ?, ?, ?)",
            )
            .bind(field_id)
            .bind(issue_key)
            .bind(ordinal as i32)
            .bind(sample)
            .execute(&mut *tx)
            .await?;
        }
        for (path, ordinal, value) in kv {
            sqlx::query(
                "INSERT INTO staging_jira_object_kv (field_id, issue_key, path, ordinal, value) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(field_id)
            .bind(issue_key)
            .bind(path)
            .bind(ordinal)
            .bind(value)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await
    }

    pub async fn fetch_issue_by_key(&self, issue_key: &str) -> Result<Option<JiraIssueRow>, sqlx::Error> {
        sqlx::query_as::<_, JiraIssueRow>("SELECT * FROM staging_jira_issues WHERE issue_key = ?")
            .bind(issue_key)
            .fetch_optional(self.pool)
            .await
    }
}

/// The normalized column set written by `upsert_issue` (spec.md §4.1
/// "Normalization rules applied during extract").
#[derive(Debug, Clone, Default)]
pub struct NormalizedIssue {
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
}
