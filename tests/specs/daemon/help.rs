//! Daemon help and version specs
//!
//! Info flags answer without reading config or taking the lock.

use crate::prelude::*;

#[test]
fn version_flag_prints_package_version() {
    let project = Project::empty();
    project
        .wardend()
        .args(&["--version"])
        .passes()
        .stdout_eq("wardend 0.1.0\n");
}

#[test]
fn short_version_flag_matches_long() {
    let project = Project::empty();
    project
        .wardend()
        .args(&["-V"])
        .passes()
        .stdout_eq("wardend 0.1.0\n");
}

#[test]
fn help_shows_usage_and_options() {
    let project = Project::empty();
    project
        .wardend()
        .args(&["--help"])
        .passes()
        .stdout_has("USAGE:")
        .stdout_has("--config")
        .stdout_has("--version");
}

#[test]
fn info_flags_leave_state_dir_untouched() {
    let project = Project::empty();
    project.wardend().args(&["--help"]).passes();
    assert!(!project.path().join("wardend.pid").exists());
    assert!(!project.path().join("wardend.log").exists());
}

#[test]
fn unknown_argument_is_a_usage_error() {
    let project = Project::empty();
    project
        .wardend()
        .args(&["--daemonize"])
        .exits(2)
        .stderr_has("unexpected argument '--daemonize'")
        .stderr_has("Usage: wardend");
}

#[test]
fn config_flag_without_path_is_a_usage_error() {
    let project = Project::empty();
    project
        .wardend()
        .args(&["--config"])
        .exits(2)
        .stderr_has("'--config' requires a path");
}
