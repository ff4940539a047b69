use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub jira: JiraConfig,
    pub redmine: RedmineConfig,
    pub migration: MigrationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub dsn: String,
    pub username: Option<String>,
    pub password: Option<String>,
    #[serde(default)]
    pub options: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfig {
    pub base_url: String,
    pub username: String,
    pub api_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedmineConfig {
    pub base_url: String,
    pub api_key: String,
    #[serde(default)]
    pub extended_api: ExtendedApiConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExtendedApiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_extended_api_prefix")]
    pub prefix: String,
}

impl Default for ExtendedApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            prefix: default_extended_api_prefix(),
        }
    }
}

fn default_extended_api_prefix() -> String {
    "extended_api".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    pub issues: IssuesMigrationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssuesMigrationConfig {
    pub jql: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    pub default_redmine_project_id: Option<u64>,
    pub default_redmine_tracker_id: Option<u64>,
    pub default_redmine_status_id: Option<u64>,
    pub default_redmine_priority_id: Option<u64>,
    pub default_redmine_author_id: Option<u64>,
    pub default_redmine_assignee_id: Option<u64>,
    #[serde(default)]
    pub default_is_private: bool,
}

fn default_batch_size() -> u32 {
    100
}

impl IssuesMigrationConfig {
    /// Clamp the configured batch size into the 1..=100 range the Jira
    /// search endpoint accepts (spec.md §4.1 step 2).
    pub fn effective_batch_size(&self) -> u32 {
        self.batch_size.clamp(1, 100)
    }
}

impl Config {
    /// Load configuration from an optional TOML file overlaid with
    /// `J2R_`-prefixed environment variables. A `.env` file in the
    /// working directory, if present, is loaded first so its values feed
    /// the environment layer.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder();
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        } else {
            builder = builder.add_source(config::File::with_name("config").required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("J2R")
                .separator("__")
                .try_parsing(true),
        );

        let raw = builder.build()?;
        let cfg: Config = raw.try_deserialize()?;
        Ok(cfg)
    }
}
