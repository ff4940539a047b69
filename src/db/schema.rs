use sqlx::MySqlPool;

/// Idempotent `CREATE TABLE IF NOT EXISTS` statements for every table this
/// crate reads or writes, per spec.md §3/§6. The sibling pre-requisite
/// scripts (users, projects, trackers, statuses, priorities, custom
/// fields, attachments) own the *rows* of the `migration_mapping_*`
/// lookup tables; this crate only needs the tables to exist so it can run
/// standalone against a fresh database.
const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS staging_jira_issues (
        id BIGINT PRIMARY KEY,
        issue_key VARCHAR(64) NOT NULL UNIQUE,
        project_id VARCHAR(64) NOT NULL,
        issue_type_id VARCHAR(64) NOT NULL,
        status_id VARCHAR(64) NOT NULL,
        status_category_key VARCHAR(32),
        priority_id VARCHAR(64),
        reporter_account_id VARCHAR(128),
        assignee_account_id VARCHAR(128),
        parent_account_id VARCHAR(128),
        summary VARCHAR(255) NOT NULL,
        description_adf JSON,
        description_html TEXT,
        due_date VARCHAR(10),
        time_original_estimate BIGINT,
        time_remaining_estimate BIGINT,
        time_spent BIGINT,
        labels JSON,
        fix_versions JSON,
        components JSON,
        created_at DATETIME,
        updated_at DATETIME,
        raw_payload JSON NOT NULL,
        extracted_at DATETIME NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS staging_jira_labels (
        name VARCHAR(255) PRIMARY KEY
    )"#,
    r#"CREATE TABLE IF NOT EXISTS staging_jira_attachments (
        id BIGINT PRIMARY KEY,
        issue_id BIGINT NOT NULL,
        filename VARCHAR(512) NOT NULL,
        size_bytes BIGINT,
        mime_type VARCHAR(255),
        content_url VARCHAR(2048),
        created_at DATETIME
    )"#,
    r#"CREATE TABLE IF NOT EXISTS staging_jira_issue_links (
        link_id BIGINT PRIMARY KEY,
        source_issue_key VARCHAR(64) NOT NULL,
        target_issue_key VARCHAR(64) NOT NULL,
        link_type VARCHAR(64) NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS staging_jira_object_samples (
        field_id VARCHAR(64) NOT NULL,
        issue_key VARCHAR(64) NOT NULL,
        ordinal INT NOT NULL,
        sample JSON NOT NULL,
        PRIMARY KEY (field_id, issue_key, ordinal)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS staging_jira_object_kv (
        field_id VARCHAR(64) NOT NULL,
        issue_key VARCHAR(64) NOT NULL,
        path VARCHAR(512) NOT NULL,
        ordinal INT NOT NULL,
        value TEXT,
        PRIMARY KEY (field_id, issue_key, path, ordinal)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS migration_mapping_projects (
        jira_project_id VARCHAR(64) PRIMARY KEY,
        jira_project_key VARCHAR(64) NOT NULL,
        redmine_project_id BIGINT,
        migration_status VARCHAR(64) NOT NULL,
        issues_extracted_at DATETIME
    )"#,
    r#"CREATE TABLE IF NOT EXISTS migration_mapping_trackers (
        jira_issue_type_id VARCHAR(64) PRIMARY KEY,
        redmine_tracker_id BIGINT,
        migration_status VARCHAR(64) NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS migration_mapping_statuses (
        jira_status_id VARCHAR(64) PRIMARY KEY,
        redmine_status_id BIGINT,
        migration_status VARCHAR(64) NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS migration_mapping_priorities (
        jira_priority_id VARCHAR(64) PRIMARY KEY,
        redmine_priority_id BIGINT,
        migration_status VARCHAR(64) NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS migration_mapping_users (
        jira_account_id VARCHAR(128) PRIMARY KEY,
        redmine_user_id BIGINT,
        migration_status VARCHAR(64) NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS migration_mapping_custom_fields (
        jira_field_id VARCHAR(64) PRIMARY KEY,
        redmine_custom_field_id BIGINT NOT NULL,
        field_format VARCHAR(32) NOT NULL,
        is_multiple BOOLEAN NOT NULL DEFAULT FALSE,
        mapping_parent_custom_field_id VARCHAR(64)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS migration_mapping_custom_field_enumerations (
        jira_field_id VARCHAR(64) NOT NULL,
        jira_value VARCHAR(255) NOT NULL,
        redmine_label VARCHAR(255) NOT NULL,
        PRIMARY KEY (jira_field_id, jira_value)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS migration_mapping_cascading_options (
        jira_child_option_id VARCHAR(64) PRIMARY KEY,
        jira_child_label VARCHAR(255),
        parent_field_id BIGINT NOT NULL,
        child_field_id BIGINT NOT NULL,
        parent_label VARCHAR(255) NOT NULL,
        child_label VARCHAR(255) NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS migration_mapping_attachments (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        jira_attachment_id BIGINT NOT NULL,
        jira_issue_id BIGINT NOT NULL,
        original_filename VARCHAR(512) NOT NULL,
        redmine_upload_token VARCHAR(255),
        sharepoint_url VARCHAR(2048),
        status VARCHAR(32) NOT NULL,
        association_hint VARCHAR(16) NOT NULL DEFAULT 'ISSUE',
        UNIQUE KEY uq_jira_attachment (jira_attachment_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS migration_mapping_issues (
        id BIGINT AUTO_INCREMENT PRIMARY KEY,
        jira_issue_id BIGINT NOT NULL UNIQUE,
        jira_issue_key VARCHAR(64) NOT NULL UNIQUE,
        jira_project_id VARCHAR(64) NOT NULL,
        jira_issue_type_id VARCHAR(64) NOT NULL,
        jira_status_id VARCHAR(64) NOT NULL,
        jira_priority_id VARCHAR(64),
        jira_reporter_account_id VARCHAR(128),
        jira_assignee_account_id VARCHAR(128),

        redmine_project_id BIGINT,
        redmine_tracker_id BIGINT,
        redmine_status_id BIGINT,
        redmine_priority_id BIGINT,
        redmine_author_id BIGINT,
        redmine_assignee_id BIGINT,
        redmine_issue_id BIGINT,

        proposed_project_id BIGINT,
        proposed_tracker_id BIGINT,
        proposed_status_id BIGINT,
        proposed_priority_id BIGINT,
        proposed_author_id BIGINT,
        proposed_assignee_id BIGINT,
        proposed_subject VARCHAR(255),
        proposed_description LONGTEXT,
        proposed_start_date VARCHAR(10),
        proposed_due_date VARCHAR(10),
        proposed_done_ratio INT,
        proposed_estimated_hours DOUBLE,
        proposed_is_private BOOLEAN,
        proposed_custom_field_payload JSON,

        migration_status VARCHAR(64) NOT NULL DEFAULT 'PENDING_ANALYSIS',
        notes TEXT,
        automation_hash CHAR(64),
        last_updated_at DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP
    )"#,
];

/// Run every `CREATE TABLE IF NOT EXISTS` statement. Safe to call on every
/// startup; a prepare/execute failure here is fatal (spec.md §7).
pub async fn ensure_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
