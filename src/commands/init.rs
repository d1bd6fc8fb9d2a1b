//! # Init Command Implementation
//!
//! Builds the workspace: resolves the configured patterns, clones or updates
//! every repository, merges their manifests and runs the installer.
//!
//! `--fresh` discards the workspace root and all cached metadata first. On a
//! terminal it asks before deleting anything unless `--yes` is given; without
//! a terminal it refuses unless `--yes` is given.

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use dialoguer::{theme::ColorfulTheme, Confirm};

use polyrepo::output;
use polyrepo::workspace::{InitOptions, InitReport, Workspace};

use super::{Settings, WorkspaceArgs};
use crate::cli::Globals;

/// Clone or update every repository and install dependencies
#[derive(Args, Debug)]
pub struct InitArgs {
    #[command(flatten)]
    pub workspace: WorkspaceArgs,

    /// Delete the workspace root and cached metadata before initializing.
    #[arg(long)]
    pub fresh: bool,

    /// Do not ask for confirmation before deleting anything.
    #[arg(short, long)]
    pub yes: bool,
}

/// Execute the `init` command.
pub fn execute(args: InitArgs, globals: &Globals) -> Result<()> {
    let settings = args.workspace.load()?;

    if args.fresh && !args.yes && !confirm_fresh(&settings.root)? {
        println!("Aborted; nothing was changed");
        return Ok(());
    }

    let options = InitOptions {
        fresh: args.fresh,
        verbose: globals.verbose,
    };
    let (_, report) = initialize(&settings, &options)?;
    println!("{}", output::init_summary(&globals.output, &report));

    if report.repos.is_empty() && !report.failures.is_empty() {
        bail!("No repository could be initialized");
    }
    Ok(())
}

/// Build a workspace from `settings` and initialize it.
pub fn initialize(settings: &Settings, options: &InitOptions) -> Result<(Workspace, InitReport)> {
    let mut workspace = Workspace::from_config(&settings.token, &settings.root, &settings.config)?;
    let report = workspace
        .init(&settings.patterns, options)
        .with_context(|| format!("Failed to initialize workspace at {}", settings.root.display()))?;
    Ok((workspace, report))
}

fn confirm_fresh(root: &Path) -> Result<bool> {
    if !root.exists() {
        return Ok(true);
    }
    if !console::Term::stderr().is_term() {
        bail!(
            "Refusing to delete {} without confirmation\n  hint: pass --yes to skip the prompt",
            root.display()
        );
    }

    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!(
            "Delete {} and clone every repository again?",
            root.display()
        ))
        .default(false)
        .interact()?;
    Ok(confirmed)
}
