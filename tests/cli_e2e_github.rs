//! End-to-end tests against the public GitHub API.
//!
//! These tests need network access and are ignored unless the
//! `integration-tests` feature is enabled:
//!
//! ```bash
//! cargo test --features integration-tests --test cli_e2e_github
//! ```
//!
//! Set `GITHUB_TOKEN` to avoid the anonymous rate limit.

#[allow(dead_code)]
mod common;
use common::prelude::*;

/// Installs nothing, so the tests do not need pnpm.
const CONFIG: &str = r#"
include:
  - octocat/Spoon-Knife
  - octocat/this-repository-does-not-exist
installer:
  program: git
  args: [--version]
"#;

fn polyrepo(fixture: &TestFixture) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("polyrepo");
    cmd.current_dir(fixture.path()).env_remove("POLYREPO_CONFIG");
    cmd
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_ls_resolves_public_repository() {
    if common::should_skip_network_tests() {
        return;
    }
    let fixture = TestFixture::new();
    polyrepo(&fixture)
        .args(["ls", "--include", "octocat/Hello-World"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "octocat/Hello-World  master  https://github.com/octocat/Hello-World.git",
        ));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_ls_reports_missing_repository() {
    if common::should_skip_network_tests() {
        return;
    }
    let fixture = TestFixture::new();
    polyrepo(&fixture)
        .args(["ls", "--include", "octocat/this-repository-does-not-exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("[FAILED]"))
        .stderr(predicate::str::contains("No repository could be resolved"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_init_then_run() {
    if common::should_skip_network_tests() {
        return;
    }
    let fixture = TestFixture::new().with_config(CONFIG);

    polyrepo(&fixture)
        .args(["--color", "never", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] octocat/Spoon-Knife  main"))
        .stdout(predicate::str::contains(
            "[FAILED] octocat/this-repository-does-not-exist (resolve)",
        ))
        .stdout(predicate::str::contains("1 synchronized, 1 failed"));
    fixture
        .child("workspace/Spoon-Knife/index.html")
        .assert(predicate::path::exists());
    fixture
        .child("workspace/package.json")
        .assert(predicate::str::contains("polyrepo-workspace"));

    polyrepo(&fixture)
        .args(["--color", "never", "run", "--", "git", "status", "--short"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] octocat/Spoon-Knife"))
        .stdout(predicate::str::contains("1 succeeded, 0 failed"));
}
