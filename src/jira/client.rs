use std::time::Duration;

use reqwest::StatusCode;

use crate::config::JiraConfig;
use crate::error::JiraSearchError;

use super::model::SearchResponse;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Authenticated HTTPS access to the Jira search API (spec.md §4, "Jira
/// Client"). Bounded retries apply only to transport-level failures
/// (connect/timeout); a decoded 4xx/5xx body is returned to the caller so
/// the Extractor can apply its "skip this project only" rule.
pub struct JiraClient {
    http: reqwest::Client,
    base_url: String,
    username: String,
    api_token: String,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            api_token: config.api_token.clone(),
        })
    }

    /// `GET /rest/api/3/search/jql` for one page (spec.md §4.1 step 3).
    pub async fn search(
        &self,
        jql: &str,
        max_results: u32,
    ) -> Result<SearchResponse, JiraSearchError> {
        let url = format!("{}/rest/api/3/search/jql", self.base_url);

        let mut attempt = 0;
        let mut backoff = INITIAL_BACKOFF;
        loop {
            attempt += 1;
            let response = self
                .http
                .get(&url)
                .basic_auth(&self.username, Some(&self.api_token))
                .header("Accept", "application/json")
                .query(&[
                    ("jql", jql),
                    ("maxResults", &max_results.to_string()),
                    ("fields", "*all"),
                    ("expand", "renderedFields"),
                    ("fieldsByKeys", "false"),
                ])
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) if attempt < MAX_ATTEMPTS && (e.is_timeout() || e.is_connect()) => {
                    tracing::warn!("jira search transport error (attempt {attempt}/{MAX_ATTEMPTS}): {e}");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    continue;
                }
                Err(e) => return Err(JiraSearchError::Transport(e)),
            };

            if response.status() != StatusCode::OK {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                return Err(JiraSearchError::Status { status, body });
            }

            let body = response.text().await.map_err(JiraSearchError::Transport)?;
            return serde_json::from_str(&body).map_err(JiraSearchError::Decode);
        }
    }
}
