use std::collections::HashMap;

use sqlx::MySqlPool;

use super::models::{CascadingOptionRow, CustomFieldEnumerationRow, CustomFieldMappingRow, ResolvedId};

/// An immutable, string-keyed lookup index loaded once per run (spec.md §9
/// "Global lookups" design note). `resolve` is the single pure accessor
/// every per-entity resolver shares.
#[derive(Debug, Default, Clone)]
pub struct Lookup {
    entries: HashMap<String, ResolvedId>,
}

impl Lookup {
    pub fn resolve(&self, jira_id: &str) -> Option<ResolvedId> {
        self.entries.get(jira_id).copied()
    }

    /// A resolved id usable by the Transformer, i.e. its migration_status
    /// is MATCH_FOUND or CREATION_SUCCESS (spec.md §3).
    pub fn resolve_usable(&self, jira_id: &str) -> Option<i64> {
        self.resolve(jira_id).filter(|r| r.resolved).map(|r| r.redmine_id)
    }
}

async fn load_simple_lookup(
    pool: &MySqlPool,
    table: &str,
    jira_key_column: &str,
    redmine_id_column: &str,
) -> Result<Lookup, sqlx::Error> {
    let sql = format!(
        "SELECT {jira_key_column} AS jira_key, {redmine_id_column} AS redmine_id, migration_status FROM {table}"
    );
    let rows: Vec<(String, Option<i64>, String)> = sqlx::query_as(&sql).fetch_all(pool).await?;
    let mut entries = HashMap::with_capacity(rows.len());
    for (jira_key, redmine_id, status) in rows {
        if let Some(redmine_id) = redmine_id {
            let resolved = super::models::MigrationStatus::from_db_str(&status)
                .map(|s| s.is_resolved())
                .unwrap_or(false);
            entries.insert(jira_key, ResolvedId { redmine_id, resolved });
        }
    }
    Ok(Lookup { entries })
}

/// The six per-entity Mapping Resolvers plus the custom-field and
/// cascading-field indices (spec.md §4.2 step 2).
pub struct Lookups {
    pub projects: Lookup,
    pub trackers: Lookup,
    pub statuses: Lookup,
    pub priorities: Lookup,
    pub users: Lookup,
    pub custom_fields: Vec<CustomFieldMappingRow>,
    pub custom_field_enumerations: HashMap<(String, String), String>,
    pub cascading_options: HashMap<String, CascadingOptionRow>,
    pub cascading_options_by_label: HashMap<(String, String), Vec<CascadingOptionRow>>,
}

impl Lookups {
    pub async fn load(pool: &MySqlPool) -> Result<Self, sqlx::Error> {
        let projects = load_simple_lookup(
            pool,
            "migration_mapping_projects",
            "jira_project_id",
            "redmine_project_id",
        )
        .await?;
        let trackers = load_simple_lookup(
            pool,
            "migration_mapping_trackers",
            "jira_issue_type_id",
            "redmine_tracker_id",
        )
        .await?;
        let statuses = load_simple_lookup(
            pool,
            "migration_mapping_statuses",
            "jira_status_id",
            "redmine_status_id",
        )
        .await?;
        let priorities = load_simple_lookup(
            pool,
            "migration_mapping_priorities",
            "jira_priority_id",
            "redmine_priority_id",
        )
        .await?;
        let users = load_simple_lookup(
            pool,
            "migration_mapping_users",
            "jira_account_id",
            "redmine_user_id",
        )
        .await?;

        let custom_fields: Vec<CustomFieldMappingRow> =
            sqlx::query_as("SELECT jira_field_id, redmine_custom_field_id, field_format, is_multiple, mapping_parent_custom_field_id FROM migration_mapping_custom_fields")
                .fetch_all(pool)
                .await?;

        let enum_rows: Vec<CustomFieldEnumerationRow> = sqlx::query_as(
            "SELECT jira_field_id, jira_value, redmine_label FROM migration_mapping_custom_field_enumerations",
        )
        .fetch_all(pool)
        .await?;
        let mut custom_field_enumerations = HashMap::with_capacity(enum_rows.len());
        for row in enum_rows {
            custom_field_enumerations.insert(
                (row.jira_field_id.clone(), row.jira_value.to_lowercase()),
                row.redmine_label,
            );
        }

        let cascading_rows: Vec<CascadingOptionRow> = sqlx::query_as(
            "SELECT jira_child_option_id, jira_child_label, parent_field_id, child_field_id, parent_label, child_label FROM migration_mapping_cascading_options",
        )
        .fetch_all(pool)
        .await?;
        let mut cascading_options = HashMap::with_capacity(cascading_rows.len());
        let mut cascading_options_by_label: HashMap<(String, String), Vec<CascadingOptionRow>> =
            HashMap::new();
        for row in cascading_rows {
            if let Some(label) = &row.jira_child_label {
                // Keyed by the *parent* field id: `CustomFieldMappingRow::redmine_custom_field_id`
                // for a depending_list mapping row names the parent custom field, which is
                // what `customfield::resolve_cascading`'s label-only fallback has on hand.
                let key = (row.parent_field_id.to_string(), label.to_lowercase());
                cascading_options_by_label.entry(key).or_default().push(row.clone());
            }
            cascading_options.insert(row.jira_child_option_id.clone(), row);
        }

        Ok(Self {
            projects,
            trackers,
            statuses,
            priorities,
            users,
            custom_fields,
            custom_field_enumerations,
            cascading_options,
            cascading_options_by_label,
        })
    }
}
