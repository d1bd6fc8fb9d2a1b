//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};

use polyrepo::output::OutputConfig;

use crate::commands;

/// polyrepo - Build a local workspace from many hosted repositories
#[derive(Parser, Debug)]
#[command(name = "polyrepo")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,

    /// Report progress: raises the default log level to info and shows a
    /// progress bar while synchronizing
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone or update every repository and install dependencies
    Init(commands::init::InitArgs),
    /// List the repositories the configuration selects
    Ls(commands::ls::LsArgs),
    /// Run a shell command in every repository of the workspace
    Run(commands::run::RunArgs),
    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

/// Options every command can see.
#[derive(Debug, Clone, Copy)]
pub struct Globals {
    pub output: OutputConfig,
    pub verbose: bool,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level, self.verbose);
        let globals = Globals {
            output: OutputConfig::from_env_and_flag(&self.color),
            verbose: self.verbose,
        };

        match self.command {
            Commands::Init(args) => commands::init::execute(args, &globals),
            Commands::Ls(args) => commands::ls::execute(args, &globals),
            Commands::Run(args) => commands::run::execute(args, &globals),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// `RUST_LOG` wins over `--log-level`, which wins over the `--verbose` default.
fn init_logging(log_level: &str, verbose: bool) {
    let level = if verbose && log_level.eq_ignore_ascii_case("warn") {
        "info"
    } else {
        log_level
    };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_with_trailing_command() {
        let cli = Cli::try_parse_from([
            "polyrepo", "run", "--include", "acme/api", "--commit", "msg", "--", "npm", "test", "--watch=false",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.command, vec!["npm", "test", "--watch=false"]);
                assert_eq!(args.commit.as_deref(), Some("msg"));
                assert_eq!(args.workspace.include, vec!["acme/api"]);
                assert!(!args.push);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["polyrepo", "init", "--fresh", "--yes", "--verbose", "--color", "never"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.color, "never");
        assert!(matches!(cli.command, Commands::Init(ref args) if args.fresh && args.yes));
    }

    #[test]
    fn test_run_requires_command() {
        assert!(Cli::try_parse_from(["polyrepo", "run"]).is_err());
    }
}
