use serde::Serialize;

/// One `uploads[]` element of a Redmine issue-create payload (spec.md
/// §4.3): `filename` is always the `"<jira_id>__<sanitized>"` unique form
/// (spec.md §9 open question #1 — the `-` form is never produced here).
#[derive(Debug, Clone, Serialize)]
pub struct UploadRef {
    pub token: String,
    pub filename: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// One `{id, value}` custom field entry (spec.md §3 invariant on
/// `proposed_custom_field_payload`).
#[derive(Debug, Clone, Serialize, serde::Deserialize)]
pub struct CustomFieldValue {
    pub id: i64,
    pub value: CustomFieldScalarOrList,
}

#[derive(Debug, Clone, Serialize, serde::Deserialize)]
#[serde(untagged)]
pub enum CustomFieldScalarOrList {
    Scalar(String),
    List(Vec<String>),
}

/// The inner `issue` object of a Redmine issue-create request. Every
/// field is optional and omitted when `None` (spec.md §4.3 payload
/// building step).
#[derive(Debug, Clone, Serialize, Default)]
pub struct IssueCreatePayload {
    pub project_id: i64,
    pub tracker_id: i64,
    pub status_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<i64>,
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_ratio: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_hours: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_private: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<Vec<CustomFieldValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uploads: Option<Vec<UploadRef>>,

    // Extended-API overrides (spec.md §4.3, §9 open question #2).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_on: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_on: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueCreateRequest {
    pub issue: IssueCreatePayload,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct IssueCreateResponse {
    pub issue: Option<IssueCreateResponseIssue>,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct IssueCreateResponseIssue {
    pub id: i64,
}
