// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Version control manager
//!
//! Every operation is a composed remote command scoped to the agent's code
//! directory. Git commands address the tree with `git -C <dir>` so a missing
//! directory fails the command instead of running it somewhere else.

use crate::error::VcsError;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use wd_adapters::RemoteExecutor;
use wd_core::{
    stable_tag_number, CommandBuilder, CommitEntry, CommitInfo, CommitMessage, GitRef, Program,
    RemoteCommand, SafePath, Step,
};

const COMMITTER_NAME: &str = "Warden";
const COMMITTER_EMAIL: &str = "warden@localhost";
const NOTHING_TO_COMMIT: &str = "NOTHING_TO_COMMIT";
const WIPE_MESSAGE: &str = "nuclear rebirth: wiped code directory";

/// Paths and limits for the version control manager
#[derive(Debug, Clone)]
pub struct VcsConfig {
    pub code_dir: SafePath,
    pub backup_dir: SafePath,
    pub command_timeout: Duration,
}

/// What a rollback did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackReport {
    pub from: Option<String>,
    pub to: GitRef,
}

/// What a wipe did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WipeReport {
    pub had_repository: bool,
    /// Hash of the wipe commit, when one was made
    pub hash: Option<String>,
}

/// Git working tree of the agent, reached through a [`RemoteExecutor`].
#[derive(Clone)]
pub struct Vcs<E> {
    executor: E,
    config: VcsConfig,
}

impl<E: RemoteExecutor> Vcs<E> {
    pub fn new(executor: E, config: VcsConfig) -> Self {
        Self { executor, config }
    }

    pub fn code_dir(&self) -> &SafePath {
        &self.config.code_dir
    }

    /// `git -C <code_dir>`
    fn git(&self) -> Step {
        Step::new(Program::Git).flag("-C").path(&self.config.code_dir)
    }

    async fn run(
        &self,
        op: &'static str,
        target: &str,
        command: RemoteCommand,
    ) -> Result<String, VcsError> {
        self.executor
            .execute(&command, self.config.command_timeout)
            .await
            .map_err(|source| VcsError::Remote {
                op,
                target: target.to_string(),
                source,
            })
    }

    async fn run_trimmed(
        &self,
        op: &'static str,
        target: &str,
        command: RemoteCommand,
    ) -> Result<String, VcsError> {
        Ok(self.run(op, target, command).await?.trim().to_string())
    }

    fn dir_label(&self) -> String {
        self.config.code_dir.to_string()
    }

    /// Create the repository if absent and set the committer identity.
    pub async fn init(&self) -> Result<(), VcsError> {
        let cmd = CommandBuilder::new(Step::new(Program::Mkdir).flag("-p").path(&self.config.code_dir))
            .and(self.git().flag("init").flag("-q"))
            .and(self.git().flag("config").flag("user.name").arg(COMMITTER_NAME))
            .and(self.git().flag("config").flag("user.email").arg(COMMITTER_EMAIL))
            .build();
        self.run("init", &self.dir_label(), cmd).await?;
        Ok(())
    }

    pub async fn repo_exists(&self) -> Result<bool, VcsError> {
        let marker = format!("{}/.git", self.config.code_dir);
        let cmd = CommandBuilder::new(Step::new(Program::Test).flag("-d").arg(&marker))
            .and(Step::new(Program::Echo).flag("yes"))
            .or(Step::new(Program::Echo).flag("no"))
            .build();
        Ok(self.run_trimmed("repo_exists", &marker, cmd).await? == "yes")
    }

    /// Whether a regular file exists at `path`.
    pub async fn file_exists(&self, path: &SafePath) -> Result<bool, VcsError> {
        let cmd = CommandBuilder::new(Step::new(Program::Test).flag("-f").path(path))
            .and(Step::new(Program::Echo).flag("yes"))
            .or(Step::new(Program::Echo).flag("no"))
            .build();
        Ok(self.run_trimmed("file_exists", path.as_str(), cmd).await? == "yes")
    }

    async fn require_repo(&self) -> Result<(), VcsError> {
        if self.repo_exists().await? {
            Ok(())
        } else {
            Err(VcsError::NoRepository(self.dir_label()))
        }
    }

    /// Stage everything and commit. `None` when the tree is unchanged.
    pub async fn commit(&self, message: &CommitMessage) -> Result<Option<String>, VcsError> {
        self.require_repo().await?;
        let cmd = CommandBuilder::new(self.git().flag("add").flag("-A"))
            .and(self.git().flag("diff").flag("--cached").flag("--quiet"))
            .and(Step::new(Program::Echo).flag(NOTHING_TO_COMMIT))
            .or(self.git().flag("commit").flag("-q").flag("-m").message(message))
            .build();
        let output = self.run("commit", &self.dir_label(), cmd).await?;
        if output.contains(NOTHING_TO_COMMIT) {
            return Ok(None);
        }
        self.current_hash().await
    }

    /// Commit and report the new hash with its ISO-8601 author date.
    pub async fn commit_with_timestamp(
        &self,
        message: &CommitMessage,
    ) -> Result<Option<CommitInfo>, VcsError> {
        let Some(hash) = self.commit(message).await? else {
            return Ok(None);
        };
        let cmd = CommandBuilder::new(self.git().flag("log").flag("-1").flag("--format=%aI")).build();
        let timestamp = self.run_trimmed("commit_timestamp", &hash, cmd).await?;
        Ok(Some(CommitInfo { hash, timestamp }))
    }

    /// Lightweight tag at HEAD.
    pub async fn tag(&self, name: &GitRef) -> Result<(), VcsError> {
        let cmd = CommandBuilder::new(self.git().flag("tag").git_ref(name)).build();
        self.run("tag", name.as_str(), cmd).await?;
        Ok(())
    }

    /// Short hash of HEAD, `None` without a repository or commits.
    pub async fn current_hash(&self) -> Result<Option<String>, VcsError> {
        let cmd = CommandBuilder::new(self.git().flag("rev-parse").flag("--short").flag("HEAD").quiet())
            .or(Step::new(Program::Echo).flag("''"))
            .build();
        let hash = self.run_trimmed("current_hash", &self.dir_label(), cmd).await?;
        Ok(non_empty(hash))
    }

    /// Tag pointing at HEAD. A stable tag wins over other tags.
    pub async fn current_tag(&self) -> Result<Option<String>, VcsError> {
        let cmd = CommandBuilder::new(self.git().flag("tag").flag("--points-at").flag("HEAD").quiet())
            .or(Step::new(Program::Echo).flag("''"))
            .build();
        let output = self.run("current_tag", &self.dir_label(), cmd).await?;
        let tags: Vec<String> = output
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
        Ok(highest_stable_tag(&tags)
            .map(|t| t.as_str().to_string())
            .or_else(|| tags.into_iter().next()))
    }

    /// Most recent commits, newest first, annotated with their tags.
    pub async fn log(&self, limit: usize) -> Result<Vec<CommitEntry>, VcsError> {
        let cmd = CommandBuilder::new(
            self.git()
                .flag("log")
                .flag("--format=%h|||%s|||%aI")
                .flag("-n")
                .number(limit as u64)
                .quiet(),
        )
        .or(Step::new(Program::Echo).flag("''"))
        .build();
        let output = self.run("log", &self.dir_label(), cmd).await?;

        let tag_cmd = CommandBuilder::new(
            self.git()
                .flag("tag")
                .flag("-l")
                .flag("--format='%(objectname:short) %(*objectname:short) %(refname:short)'")
                .quiet(),
        )
        .or(Step::new(Program::Echo).flag("''"))
        .build();
        let tag_output = self.run("log_tags", &self.dir_label(), tag_cmd).await?;
        let tags = parse_tag_map(&tag_output);

        Ok(output
            .lines()
            .filter_map(CommitEntry::parse_log_line)
            .map(|mut entry| {
                entry.tag = tags.get(&entry.hash).cloned();
                entry
            })
            .collect())
    }

    /// All tags, version-sorted newest first.
    pub async fn list_tags(&self) -> Result<Vec<String>, VcsError> {
        let cmd = CommandBuilder::new(
            self.git()
                .flag("tag")
                .flag("-l")
                .flag("--sort=-version:refname")
                .quiet(),
        )
        .or(Step::new(Program::Echo).flag("''"))
        .build();
        let output = self.run("list_tags", &self.dir_label(), cmd).await?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect())
    }

    pub async fn last_stable_tag(&self) -> Result<Option<GitRef>, VcsError> {
        Ok(highest_stable_tag(&self.list_tags().await?))
    }

    /// `stable-v(N+1)` for the highest existing `stable-vN`.
    pub async fn next_stable_tag(&self) -> Result<GitRef, VcsError> {
        Ok(next_stable_after(&self.list_tags().await?))
    }

    /// Age of the HEAD commit relative to `now`.
    pub async fn last_modified_ago(&self, now: DateTime<Utc>) -> Result<Option<Duration>, VcsError> {
        let cmd = CommandBuilder::new(self.git().flag("log").flag("-1").flag("--format=%aI").quiet())
            .or(Step::new(Program::Echo).flag("''"))
            .build();
        let output = self.run_trimmed("last_modified", &self.dir_label(), cmd).await?;
        if output.is_empty() {
            return Ok(None);
        }
        let committed = DateTime::parse_from_rfc3339(&output).map_err(|_| VcsError::Parse {
            op: "last_modified",
            output: output.clone(),
        })?;
        let age = now.signed_duration_since(committed.with_timezone(&Utc));
        Ok(Some(age.to_std().unwrap_or_default()))
    }

    /// Move the tree to `target`: HEAD, index and working tree follow it and
    /// untracked files are discarded.
    ///
    /// The target is validated before any command runs, and the repository
    /// must exist.
    pub async fn rollback(&self, target: &str) -> Result<RollbackReport, VcsError> {
        let target = GitRef::parse(target)?;
        self.require_repo().await?;
        let from = self.current_hash().await?;
        let cmd = CommandBuilder::new(
            self.git()
                .flag("reset")
                .flag("-q")
                .flag("--hard")
                .git_ref(&target),
        )
        .and(self.git().flag("clean").flag("-fdq"))
        .build();
        self.run("rollback", target.as_str(), cmd).await?;
        Ok(RollbackReport { from, to: target })
    }

    /// Delete everything in the code directory.
    ///
    /// With a repository, the metadata is kept and the empty tree committed.
    /// Without one, the directory is recreated empty.
    pub async fn wipe(&self) -> Result<WipeReport, VcsError> {
        let dir = &self.config.code_dir;
        if !self.repo_exists().await? {
            let cmd = CommandBuilder::new(Step::new(Program::Rm).flag("-rf").path(dir))
                .and(Step::new(Program::Mkdir).flag("-p").path(dir))
                .build();
            self.run("wipe", dir.as_str(), cmd).await?;
            return Ok(WipeReport {
                had_repository: false,
                hash: None,
            });
        }

        let cmd = CommandBuilder::new(
            Step::new(Program::Find)
                .path(dir)
                .flag("-mindepth")
                .flag("1")
                .flag("-maxdepth")
                .flag("1")
                .flag("!")
                .flag("-name")
                .flag(".git")
                .flag("-exec")
                .flag("rm")
                .flag("-rf")
                .flag("{}")
                .flag("+"),
        )
        .build();
        self.run("wipe", dir.as_str(), cmd).await?;
        let message = CommitMessage::parse(WIPE_MESSAGE)?;
        let hash = self.commit(&message).await?;
        Ok(WipeReport {
            had_repository: true,
            hash,
        })
    }

    /// Size of the code directory in megabytes.
    pub async fn size_mb(&self) -> Result<u64, VcsError> {
        let dir = &self.config.code_dir;
        let cmd = CommandBuilder::new(Step::new(Program::Du).flag("-sm").path(dir).quiet())
            .pipe(Step::new(Program::Cut).flag("-f1"))
            .build();
        let output = self.run_trimmed("backup_size", dir.as_str(), cmd).await?;
        output.parse().map_err(|_| VcsError::Parse {
            op: "backup_size",
            output,
        })
    }

    /// Compressed snapshot `backup_dir/brain-YYYYMMDD-HHMMSS.tar.gz`.
    ///
    /// Refuses with [`VcsError::TooLarge`] above `max_mb`, before anything is written.
    pub async fn backup(&self, max_mb: u64, now: DateTime<Utc>) -> Result<SafePath, VcsError> {
        let size_mb = self.size_mb().await?;
        if size_mb > max_mb {
            return Err(VcsError::TooLarge { size_mb, max_mb });
        }
        let name = format!("brain-{}.tar.gz", now.format("%Y%m%d-%H%M%S"));
        let archive = self.config.backup_dir.join(&name)?;
        let cmd = CommandBuilder::new(Step::new(Program::Mkdir).flag("-p").path(&self.config.backup_dir))
            .and(
                Step::new(Program::Tar)
                    .flag("czf")
                    .path(&archive)
                    .flag("-C")
                    .path(&self.config.code_dir)
                    .flag("."),
            )
            .build();
        self.run("backup", archive.as_str(), cmd).await?;
        Ok(archive)
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Map commit hash -> tag name from `%(objectname:short) %(*objectname:short) %(refname:short)`.
///
/// Annotated tags list the tag object first and the peeled commit second, so
/// both hashes are keyed.
pub fn parse_tag_map(output: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for line in output.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some((name, hashes)) = fields.split_last() else {
            continue;
        };
        if hashes.is_empty() {
            continue;
        }
        for hash in hashes {
            tags.entry(hash.to_string()).or_insert_with(|| name.to_string());
        }
    }
    tags
}

/// Highest `stable-vN` among `tags`.
pub fn highest_stable_tag(tags: &[String]) -> Option<GitRef> {
    tags.iter()
        .filter_map(|t| stable_tag_number(t))
        .max()
        .map(GitRef::stable)
}

/// The stable tag that follows the highest one in `tags`.
pub fn next_stable_after(tags: &[String]) -> GitRef {
    let highest = tags.iter().filter_map(|t| stable_tag_number(t)).max().unwrap_or(0);
    GitRef::stable(highest.saturating_add(1))
}

#[cfg(test)]
#[path = "vcs_tests.rs"]
mod tests;
