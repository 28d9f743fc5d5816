//! Branch to (head, parent) commit resolution.

use tracing::info;

use super::checkout::{CheckoutSession, Repo};
use crate::core::schema::CommitPair;
use crate::{BenchError, BenchResult};

/// Default remote the branch is fetched from
pub const DEFAULT_REMOTE: &str = "origin";

impl<R: Repo> CheckoutSession<'_, R> {
    /// Check out the remote tip of `branch`, then its parent, recording both ids.
    ///
    /// The working tree is left at the parent commit.
    pub fn resolve(&mut self, remote: &str, branch: &str) -> BenchResult<CommitPair> {
        if branch.trim().is_empty() {
            return Err(BenchError::Vcs("branch name is empty".into()));
        }

        let repo = self.repo();
        repo.checkout_remote_branch(remote, branch)?;
        let head = repo.head_hash()?;

        repo.checkout_parent()?;
        let parent = repo.head_hash()?;

        info!(%branch, %head, %parent, "resolved commits");
        Ok(CommitPair::new(head, parent))
    }
}
