use clap::Parser;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Jira,
    Transform,
    Push,
}

impl Phase {
    const ALL: [Phase; 3] = [Phase::Jira, Phase::Transform, Phase::Push];

    fn parse_one(s: &str) -> anyhow::Result<Phase> {
        match s.trim() {
            "jira" => Ok(Phase::Jira),
            "transform" => Ok(Phase::Transform),
            "push" => Ok(Phase::Push),
            other => anyhow::bail!("unknown phase '{other}', expected one of jira,transform,push"),
        }
    }

    fn parse_csv(s: &str) -> anyhow::Result<Vec<Phase>> {
        s.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(Phase::parse_one)
            .collect()
    }
}

/// Migrate Jira Cloud issues into Redmine (Extract / Transform / Push).
#[derive(Debug, Parser)]
#[command(name = "j2r-issues", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    pub config: Option<String>,

    /// Comma-separated list of phases to run: jira,transform,push.
    #[arg(long)]
    pub phases: Option<String>,

    /// Comma-separated list of phases to subtract from the selected set.
    #[arg(long)]
    pub skip: Option<String>,

    /// Actually POST to Redmine during the push phase; otherwise a dry preview is logged.
    #[arg(long)]
    pub confirm_push: bool,

    /// Print the endpoint and pretty-printed payload for every push candidate; never call Redmine.
    #[arg(long)]
    pub dry_run: bool,

    /// Route push POSTs through the Redmine Extended API and require its health probe to succeed.
    #[arg(long)]
    pub use_extended_api: bool,
}

impl Cli {
    pub fn resolved_phases(&self) -> anyhow::Result<Vec<Phase>> {
        let mut selected: Vec<Phase> = match &self.phases {
            Some(csv) => Phase::parse_csv(csv)?,
            None => Phase::ALL.to_vec(),
        };
        if let Some(csv) = &self.skip {
            let skipped = Phase::parse_csv(csv)?;
            selected.retain(|p| !skipped.contains(p));
        }
        Ok(selected)
    }
}
