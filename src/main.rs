use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use jira2redmine_issues::cli::{Cli, Phase};
use jira2redmine_issues::config::Config;
use jira2redmine_issues::jira::client::JiraClient;
use jira2redmine_issues::redmine::client::RedmineClient;
use jira2redmine_issues::{db, phases};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run(cli).await {
        tracing::error!("[error] {e:#}");
        eprintln!("[ERROR] {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let phases = cli.resolved_phases()?;

    let pool = db::connect(&config.database).await?;
    tracing::info!("connected to staging database");

    for phase in phases {
        match phase {
            Phase::Jira => {
                let jira = JiraClient::new(&config.jira)?;
                let summary = phases::extract::run(
                    &pool,
                    &jira,
                    config.migration.issues.jql.as_deref(),
                    config.migration.issues.effective_batch_size(),
                )
                .await?;
                tracing::info!(
                    "extract complete: {} project(s) extracted, {} failed, {} issue(s) upserted",
                    summary.projects_extracted,
                    summary.projects_failed,
                    summary.issues_upserted
                );
            }
            Phase::Transform => {
                let summary = phases::transform::run(&pool, &config.migration.issues).await?;
                tracing::info!(
                    "transform complete: {} matched, {} ready, {} manual review, {} manual override(s) preserved, {} skipped, {} unchanged",
                    summary.matched,
                    summary.ready_for_creation,
                    summary.manual_review,
                    summary.manual_overrides,
                    summary.skipped,
                    summary.unchanged
                );
            }
            Phase::Push => {
                let redmine = RedmineClient::new(&config.redmine)?;
                let use_extended_api = cli.use_extended_api || config.redmine.extended_api.enabled;
                let summary = phases::push::run(
                    &pool,
                    &redmine,
                    cli.dry_run,
                    cli.confirm_push,
                    use_extended_api,
                )
                .await?;
                tracing::info!(
                    "push complete: {} created, {} blocked, {} previewed, {} failed",
                    summary.created,
                    summary.blocked,
                    summary.previewed,
                    summary.failed
                );
            }
        }
    }

    Ok(())
}
