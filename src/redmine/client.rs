use std::time::Duration;

use reqwest::StatusCode;

use crate::config::RedmineConfig;
use crate::error::RedmineCreateError;

use super::model::{IssueCreateRequest, IssueCreateResponse};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated HTTPS access to Redmine's issue-create endpoint and the
/// Extended API health probe (spec.md §4, "Redmine Client").
pub struct RedmineClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    extended_api_prefix: String,
}

impl RedmineClient {
    pub fn new(config: &RedmineConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            extended_api_prefix: config.extended_api.prefix.trim_matches('/').to_string(),
        })
    }

    fn issues_path(&self, use_extended_api: bool) -> String {
        if use_extended_api {
            format!("{}/issues.json", self.extended_api_prefix)
        } else {
            "issues.json".to_string()
        }
    }

    /// `POST /issues.json?notify=false` (spec.md §4.3 step 2, "Path
    /// selection"). Returns the created issue id on success, or a typed
    /// error the Pusher turns into `CREATION_FAILED`.
    pub async fn create_issue(
        &self,
        request: &IssueCreateRequest,
        use_extended_api: bool,
    ) -> Result<i64, RedmineCreateError> {
        let url = format!("{}/{}", self.base_url, self.issues_path(use_extended_api));

        let response = self
            .http
            .post(&url)
            .header("X-Redmine-API-Key", &self.api_key)
            .query(&[("notify", "false")])
            .json(request)
            .send()
            .await
            .map_err(RedmineCreateError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RedmineCreateError::Status {
                status: status.as_u16(),
                body: truncate_bytes(&body, 300),
            });
        }

        let body = response.text().await.map_err(RedmineCreateError::Transport)?;
        let parsed: IssueCreateResponse = serde_json::from_str(&body).map_err(|_| RedmineCreateError::MissingIssueId)?;
        parsed
            .issue
            .map(|i| i.id)
            .ok_or(RedmineCreateError::MissingIssueId)
    }

    /// Before any POSTs under the Extended API, require the
    /// `X-Redmine-Extended-API` response header (spec.md §4.3 "Extended-API
    /// health probe").
    pub async fn probe_extended_api(&self) -> anyhow::Result<()> {
        let url = format!("{}/{}/issues.json", self.base_url, self.extended_api_prefix);
        let response = self
            .http
            .get(&url)
            .header("X-Redmine-API-Key", &self.api_key)
            .send()
            .await?;
        if !response.headers().contains_key("X-Redmine-Extended-API") {
            anyhow::bail!("extended API probe at {url} did not return X-Redmine-Extended-API header");
        }
        Ok(())
    }
}

fn truncate_bytes(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        let mut end = max;
        while !s.is_char_boundary(end) {
            end -= 1;
        }
        s[..end].to_string()
    }
}
