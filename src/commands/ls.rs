//! # Ls Command Implementation
//!
//! Lists the repositories the configuration selects, with the ref each would
//! be checked out at. Only the hosting API is consulted; nothing on disk is
//! read or written.

use anyhow::{bail, Result};
use clap::Args;

use polyrepo::github::GitHubApi;
use polyrepo::hosting::HostingConnection;
use polyrepo::output::emoji;
use polyrepo::repository::{self, ResolvedRepository};
use polyrepo::workspace::resolve;

use super::WorkspaceArgs;
use crate::cli::Globals;

/// List the repositories the configuration selects
#[derive(Args, Debug)]
pub struct LsArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Show only the number of repositories.
    #[arg(long)]
    pub count: bool,
}

/// Execute the `ls` command.
pub fn execute(args: LsArgs, globals: &Globals) -> Result<()> {
    let settings = args.workspace.load()?;
    let api = GitHubApi::new(&settings.token, &settings.config.api.url)?;
    let connection = HostingConnection::with_limits(
        Box::new(api),
        settings.config.api.concurrency,
        settings.config.api.page_size,
    );

    let (mut resolved, failed) =
        repository::partition(resolve::execute(&connection, &settings.patterns));
    resolved.sort_by_key(|r| r.full_name().to_lowercase());

    if args.count {
        println!("{}", resolved.len());
    } else {
        for repo in &resolved {
            println!("{}", line(repo));
        }
    }
    for (reference, error) in &failed {
        eprintln!(
            "{} {}: {}",
            emoji(&globals.output, "❌", "[FAILED]"),
            reference.full_name,
            error
        );
    }

    if resolved.is_empty() && !failed.is_empty() {
        bail!("No repository could be resolved");
    }
    Ok(())
}

fn line(repo: &ResolvedRepository) -> String {
    format!("{}  {}  {}", repo.full_name(), repo.target_ref(), repo.clone_url())
}
