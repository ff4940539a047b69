use thiserror::Error;

/// Fatal errors that abort the whole run (spec.md §7, "No" in the
/// "Locally recovered?" column).
#[derive(Debug, Error)]
pub enum J2rError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("transport error talking to {service}: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("extended API probe failed: {0}")]
    ExtendedApiProbe(String),
}

/// Errors the Extractor treats as "skip this project only".
#[derive(Debug, Error)]
pub enum JiraSearchError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("jira returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode jira response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Errors the Pusher treats as "mark this mapping row CREATION_FAILED".
#[derive(Debug, Error)]
pub enum RedmineCreateError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("redmine returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("redmine accepted the issue but the response carried no issue.id")]
    MissingIssueId,
}
