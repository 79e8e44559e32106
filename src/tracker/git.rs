use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use git2::{DiffFormat, IndexAddOption, Repository, Signature};
use tracing::debug;

use crate::errors::CommitError;
use crate::orchestrator::CommitProvider;
use crate::review::CommitInfo;

/// Directory holding review state; never committed.
const STATE_DIR: &str = ".forge";

pub struct GitTracker {
    repo: Repository,
}

impl GitTracker {
    pub fn new(project_dir: &Path) -> Result<Self> {
        let repo = Repository::open(project_dir).context("Failed to open git repository")?;
        Ok(Self { repo })
    }

    /// Stage every change (additions, modifications, deletions) and commit.
    ///
    /// Returns `None` when the staged tree equals HEAD's tree.
    pub fn commit_all(&self, message: &str) -> Result<Option<CommitInfo>> {
        let mut index = self.repo.index()?;

        let mut skip_state_dir = |path: &Path, _spec: &[u8]| -> i32 {
            if path.starts_with(STATE_DIR) { 1 } else { 0 }
        };
        index.add_all(
            ["*"].iter(),
            IndexAddOption::DEFAULT,
            Some(&mut skip_state_dir),
        )?;
        index.update_all(["*"].iter(), None)?;
        index.write()?;

        let tree_id = index.write_tree()?;
        let tree = self.repo.find_tree(tree_id)?;
        let parent = self.get_head_commit();

        // Nothing staged relative to HEAD (or an empty tree on an unborn branch).
        let unchanged = match parent {
            Some(ref parent) => parent.tree_id() == tree_id,
            None => tree.is_empty(),
        };
        if unchanged {
            return Ok(None);
        }

        let sig = self
            .repo
            .signature()
            .or_else(|_| Signature::now("forge-review", "forge-review@localhost"))?;

        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        let commit_id = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;
        debug!(commit = %commit_id, "Created review commit");

        let diff = self.diff_for(&commit_id.to_string())?;
        Ok(Some(CommitInfo {
            hash: commit_id.to_string(),
            diff,
        }))
    }

    /// Unified patch text of `sha` against its first parent.
    pub fn diff_for(&self, sha: &str) -> Result<String> {
        let commit = self.find_commit(sha)?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };
        self.patch(parent_tree.as_ref(), &commit.tree()?)
    }

    /// HEAD and everything committed on top of `base`.
    ///
    /// Returns `None` when HEAD is `base`, or when both are unborn.
    pub fn changes_since(&self, base: Option<&str>) -> Result<Option<CommitInfo>> {
        let Some(head) = self.get_head_commit() else {
            return Ok(None);
        };
        let hash = head.id().to_string();
        if base == Some(hash.as_str()) {
            return Ok(None);
        }

        let base_tree = match base {
            Some(sha) => Some(self.find_commit(sha)?.tree()?),
            None => None,
        };
        let diff = self.patch(base_tree.as_ref(), &head.tree()?)?;
        Ok(Some(CommitInfo { hash, diff }))
    }

    fn find_commit(&self, sha: &str) -> Result<git2::Commit<'_>> {
        let oid = git2::Oid::from_str(sha)?;
        self.repo
            .find_commit(oid)
            .with_context(|| format!("Commit {} not found", sha))
    }

    fn patch(&self, old: Option<&git2::Tree<'_>>, new: &git2::Tree<'_>) -> Result<String> {
        let diff = self.repo.diff_tree_to_tree(old, Some(new), None)?;

        let mut buf = Vec::new();
        diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
            if matches!(line.origin(), '+' | '-' | ' ') {
                buf.push(line.origin() as u8);
            }
            buf.extend_from_slice(line.content());
            true
        })?;
        Ok(String::from_utf8_lossy(&buf).to_string())
    }

    /// Get the HEAD commit if it exists (returns None for unborn branches)
    fn get_head_commit(&self) -> Option<git2::Commit<'_>> {
        self.repo
            .head()
            .ok()
            .and_then(|head| head.peel_to_commit().ok())
    }

    /// Get current HEAD SHA (returns None for unborn branches)
    pub fn head_sha(&self) -> Option<String> {
        self.get_head_commit().map(|c| c.id().to_string())
    }
}

/// [`CommitProvider`] backed by libgit2.
///
/// git2 is synchronous, so each call opens the repository on the blocking
/// pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitCommitProvider;

impl GitCommitProvider {
    async fn with_tracker<T, F>(workdir: &Path, f: F) -> Result<T, CommitError>
    where
        T: Send + 'static,
        F: FnOnce(&GitTracker) -> Result<T> + Send + 'static,
    {
        let workdir: PathBuf = workdir.to_path_buf();
        tokio::task::spawn_blocking(move || f(&GitTracker::new(&workdir)?))
            .await
            .context("Git task panicked")
            .and_then(|r| r)
            .map_err(CommitError::Io)
    }
}

#[async_trait]
impl CommitProvider for GitCommitProvider {
    async fn commit_and_diff(
        &self,
        workdir: &Path,
        message: &str,
    ) -> Result<CommitInfo, CommitError> {
        let message = message.to_string();
        Self::with_tracker(workdir, move |tracker| tracker.commit_all(&message))
            .await?
            .ok_or(CommitError::NoChanges)
    }

    async fn head(&self, workdir: &Path) -> Result<Option<String>, CommitError> {
        Self::with_tracker(workdir, |tracker| Ok(tracker.head_sha())).await
    }

    async fn changes_since(
        &self,
        workdir: &Path,
        base: Option<&str>,
    ) -> Result<Option<CommitInfo>, CommitError> {
        let base = base.map(str::to_string);
        Self::with_tracker(workdir, move |tracker| tracker.changes_since(base.as_deref())).await
    }
}
