//! # Terminal Output
//!
//! Rendering of workspace reports for the command line, with color and emoji
//! only where the terminal and the user allow them.
//!
//! ## Respecting User Preferences
//!
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals

use std::env;
use std::fmt::Write as _;

use console::style;

use crate::workspace::{InitReport, RunReport, WorkspaceRepo};

/// Whether colors and emoji should be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// `color_flag` is the value of `--color`: `always`, `never` or `auto`.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        // The presence of NO_COLOR (even if empty) disables colors.
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }
        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }
        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }
        console::Term::stdout().features().colors_supported()
    }

    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }

    fn ok(&self) -> String {
        if self.use_color {
            style("✅").green().to_string()
        } else {
            "[OK]".to_string()
        }
    }

    fn failed(&self) -> String {
        if self.use_color {
            style("❌").red().to_string()
        } else {
            "[FAILED]".to_string()
        }
    }

    fn warning(&self) -> String {
        if self.use_color {
            style("⚠️").yellow().to_string()
        } else {
            "[WARN]".to_string()
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// `emoji_str` when colors are enabled, `plain` otherwise.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

/// `full_name  ref  directory`, the listing format shared by `init` and `ls`.
pub fn repo_line(repo: &WorkspaceRepo) -> String {
    format!(
        "{}  {}  {}",
        repo.repository.full_name(),
        repo.repository.target_ref(),
        repo.directory.display()
    )
}

/// Summary printed after `init`.
pub fn init_summary(config: &OutputConfig, report: &InitReport) -> String {
    let mut out = String::new();
    for repo in &report.repos {
        let _ = writeln!(out, "{} {}", config.ok(), repo_line(repo));
    }
    for failure in &report.failures {
        let _ = writeln!(
            out,
            "{} {} ({}): {}",
            config.failed(),
            failure.full_name,
            failure.stage,
            failure.error
        );
    }
    for conflict in &report.conflicts {
        let _ = writeln!(
            out,
            "{} {}: using '{}' from {}, ignoring '{}' from {}",
            config.warning(),
            conflict.package,
            conflict.kept.0,
            conflict.kept.1,
            conflict.ignored.0,
            conflict.ignored.1
        );
    }
    let _ = write!(
        out,
        "{} synchronized, {} failed, {} dependency conflicts",
        report.repos.len(),
        report.failures.len(),
        report.conflicts.len()
    );
    out
}

/// Summary printed after `run`.
pub fn run_summary(config: &OutputConfig, report: &RunReport) -> String {
    let mut out = String::new();
    for repo in &report.succeeded {
        let _ = writeln!(out, "{} {}", config.ok(), repo.repository.full_name());
    }
    for (repo, error) in &report.failed {
        let _ = writeln!(
            out,
            "{} {}: {}",
            config.failed(),
            repo.repository.full_name(),
            error
        );
    }
    let _ = write!(
        out,
        "{} succeeded, {} failed",
        report.succeeded.len(),
        report.failed.len()
    );
    out
}
