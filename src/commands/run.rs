//! # Run Command Implementation
//!
//! Initializes the workspace, then runs one shell command in every repository
//! in full-name order. Separate arguments are quoted for the shell; a single
//! argument is used as a complete shell command line. A failing repository
//! does not stop the others; the command exits non-zero if any repository
//! failed.
//!
//! ```bash
//! polyrepo run -- npm test
//! polyrepo run -- "npm ci && npm test"
//! polyrepo run --commit "chore: bump lint config" --push -- npx prettier --write .
//! ```

use anyhow::{bail, Result};
use clap::Args;

use polyrepo::error::{Error, Result as LibResult};
use polyrepo::git::DEFAULT_REMOTE;
use polyrepo::output;
use polyrepo::tools;
use polyrepo::workspace::{InitOptions, WorkspaceRepo};

use super::init::initialize;
use super::WorkspaceArgs;
use crate::cli::Globals;

/// Run a shell command in every repository of the workspace
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Stage everything and commit with this message after the command succeeds.
    #[arg(long, value_name = "MESSAGE")]
    pub commit: Option<String>,

    /// Push the checked-out branch to origin afterwards.
    #[arg(long)]
    pub push: bool,

    /// The command to run, after `--`.
    #[arg(trailing_var_arg = true, required = true, value_name = "COMMAND")]
    pub command: Vec<String>,
}

/// Execute the `run` command.
pub fn execute(args: RunArgs, globals: &Globals) -> Result<()> {
    let settings = args.workspace.load()?;
    let options = InitOptions {
        fresh: false,
        verbose: globals.verbose,
    };
    let (workspace, init_report) = initialize(&settings, &options)?;
    for failure in &init_report.failures {
        eprintln!(
            "{} skipping {} ({}): {}",
            output::emoji(&globals.output, "⚠️", "[WARN]"),
            failure.full_name,
            failure.stage,
            failure.error
        );
    }

    let command_line = tools::command_line(&args.command);
    let report = workspace.run(|repo| {
        run_in(repo, &command_line, args.commit.as_deref(), args.push)
    })?;
    println!("{}", output::run_summary(&globals.output, &report));

    if !report.is_success() {
        bail!("{} of {} repositories failed", report.failed.len(), report.failed.len() + report.succeeded.len());
    }
    Ok(())
}

/// Run `command_line` in one repository, then optionally commit and push.
pub fn run_in(
    repo: &WorkspaceRepo,
    command_line: &str,
    commit: Option<&str>,
    push: bool,
) -> LibResult<()> {
    tools::run_shell(&repo.directory, command_line)?;

    let session = &repo.session;
    if let Some(message) = commit {
        if session.has_changes()? {
            session.stage_all()?;
            session.commit(message)?;
        } else {
            log::info!("{}: nothing to commit", repo.repository.full_name());
        }
    }

    if push {
        let branch = session.current_branch()?.ok_or_else(|| Error::CommandFailed {
            command: format!("git push {}", DEFAULT_REMOTE),
            stderr: "HEAD is detached; check out a branch to push".to_string(),
        })?;
        session.push(DEFAULT_REMOTE, &branch)?;
    }
    Ok(())
}
