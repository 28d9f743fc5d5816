//! Version-control working tree access.
//!
//! A working tree is one shared mutable resource. `Checkout` owns the `Repo`
//! and hands out at most one `CheckoutSession` at a time; the session also
//! holds a lock file so a comparison in another process is refused too.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Mutex, MutexGuard, TryLockError};

use crate::{BenchError, BenchResult};

/// Version-control operations needed to resolve a branch.
pub trait Repo {
    /// Fetch `branch` from `remote` and check out its tip.
    fn checkout_remote_branch(&mut self, remote: &str, branch: &str) -> BenchResult<()>;

    /// Check out the first parent of the current commit.
    fn checkout_parent(&mut self) -> BenchResult<()>;

    /// Commit id of the current checkout.
    fn head_hash(&self) -> BenchResult<String>;

    /// Lock file guarding the working tree across processes, if any.
    fn lock_path(&self) -> Option<PathBuf> {
        None
    }
}

/// `Repo` backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitRepo {
    path: PathBuf,
    git_bin: PathBuf,
    git_dir: PathBuf,
}

impl GitRepo {
    /// Open the working tree at `path` using `git` from PATH.
    pub fn open(path: impl Into<PathBuf>) -> BenchResult<Self> {
        Self::open_with_git(path, "git")
    }

    pub fn open_with_git(path: impl Into<PathBuf>, git_bin: impl Into<PathBuf>) -> BenchResult<Self> {
        let mut repo = GitRepo {
            path: path.into(),
            git_bin: git_bin.into(),
            git_dir: PathBuf::new(),
        };
        let git_dir = repo.git(&["rev-parse", "--absolute-git-dir"])?;
        repo.git_dir = PathBuf::from(git_dir);
        Ok(repo)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Fail if tracked files have uncommitted changes; checkouts never discard them.
    fn ensure_clean(&self) -> BenchResult<()> {
        let status = self.git(&["status", "--porcelain", "--untracked-files=no"])?;
        if !status.is_empty() {
            return Err(BenchError::Vcs(format!(
                "working tree {} has uncommitted changes; commit or stash them first",
                self.path.display()
            )));
        }
        Ok(())
    }

    fn git(&self, args: &[&str]) -> BenchResult<String> {
        tracing::debug!(repo = %self.path.display(), ?args, "git");
        let output = Command::new(&self.git_bin)
            .arg("-C")
            .arg(&self.path)
            .args(args)
            .output()
            .map_err(|e| BenchError::Vcs(format!("failed to spawn git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BenchError::Vcs(format!(
                "`git {}` failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

impl Repo for GitRepo {
    fn checkout_remote_branch(&mut self, remote: &str, branch: &str) -> BenchResult<()> {
        self.ensure_clean()?;
        self.git(&["fetch", "--quiet", remote, branch])?;
        self.git(&["checkout", "--quiet", "--detach", "FETCH_HEAD"])?;
        Ok(())
    }

    fn checkout_parent(&mut self) -> BenchResult<()> {
        let head = self.head_hash()?;
        if self.git(&["rev-parse", "--verify", "--quiet", "HEAD^"]).is_err() {
            return Err(BenchError::Vcs(format!("commit {head} has no parent")));
        }
        self.git(&["checkout", "--quiet", "--detach", "HEAD^"])?;
        Ok(())
    }

    fn head_hash(&self) -> BenchResult<String> {
        self.git(&["rev-parse", "HEAD"])
    }

    fn lock_path(&self) -> Option<PathBuf> {
        Some(self.git_dir.join("perf-gate.lock"))
    }
}

/// In-memory `Repo` with a linear history per branch, for tests.
///
/// Each branch maps to its commits oldest first.
#[derive(Debug, Clone, Default)]
pub struct MockRepo {
    branches: Vec<(String, Vec<String>)>,
    current: Option<(usize, usize)>,
    fetch_fails: bool,
    lock_path: Option<PathBuf>,
}

impl MockRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a branch whose history is `commits`, oldest first.
    pub fn with_branch(mut self, name: impl Into<String>, commits: &[&str]) -> Self {
        self.branches.push((
            name.into(),
            commits.iter().map(|c| c.to_string()).collect(),
        ));
        self
    }

    /// Make every fetch fail as if the remote were unreachable.
    pub fn fetch_fails(mut self) -> Self {
        self.fetch_fails = true;
        self
    }

    /// Use a lock file at `path` for sessions.
    pub fn with_lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }
}

impl Repo for MockRepo {
    fn checkout_remote_branch(&mut self, remote: &str, branch: &str) -> BenchResult<()> {
        if self.fetch_fails {
            return Err(BenchError::Vcs(format!("could not fetch {remote}/{branch}")));
        }
        let (index, (_, commits)) = self
            .branches
            .iter()
            .enumerate()
            .find(|(_, (name, _))| name == branch)
            .ok_or_else(|| BenchError::Vcs(format!("branch {remote}/{branch} not found")))?;
        if commits.is_empty() {
            return Err(BenchError::Vcs(format!("branch {remote}/{branch} has no commits")));
        }
        self.current = Some((index, commits.len() - 1));
        Ok(())
    }

    fn checkout_parent(&mut self) -> BenchResult<()> {
        match self.current {
            Some((branch, pos)) if pos > 0 => {
                self.current = Some((branch, pos - 1));
                Ok(())
            }
            Some(_) => Err(BenchError::Vcs(format!(
                "commit {} has no parent",
                self.head_hash()?
            ))),
            None => Err(BenchError::Vcs("nothing checked out".into())),
        }
    }

    fn head_hash(&self) -> BenchResult<String> {
        let (branch, pos) = self
            .current
            .ok_or_else(|| BenchError::Vcs("nothing checked out".into()))?;
        Ok(self.branches[branch].1[pos].clone())
    }

    fn lock_path(&self) -> Option<PathBuf> {
        self.lock_path.clone()
    }
}

/// Lock file removed on drop.
#[derive(Debug)]
struct LockFile {
    path: PathBuf,
}

impl LockFile {
    fn acquire(path: PathBuf) -> BenchResult<Self> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    BenchError::CheckoutBusy(format!(
                        "lock file {} exists; another comparison is running against this \
                         checkout (remove the file if that run is no longer alive)",
                        path.display()
                    ))
                } else {
                    BenchError::Message(format!(
                        "failed to create lock file {}: {e}",
                        path.display()
                    ))
                }
            })?;
        let lock = LockFile { path };
        writeln!(file, "{}", std::process::id()).map_err(|e| {
            BenchError::Message(format!(
                "failed to write lock file {}: {e}",
                lock.path.display()
            ))
        })?;
        Ok(lock)
    }
}

impl Drop for LockFile {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// Exclusive owner of a working tree.
#[derive(Debug)]
pub struct Checkout<R> {
    repo: Mutex<R>,
}

impl<R: Repo> Checkout<R> {
    pub fn new(repo: R) -> Self {
        Checkout {
            repo: Mutex::new(repo),
        }
    }

    /// Start an exclusive session.
    ///
    /// # Errors
    /// Returns `BenchError::CheckoutBusy` if another session is live in this
    /// process or another process holds the lock file.
    pub fn session(&self) -> BenchResult<CheckoutSession<'_, R>> {
        let guard = match self.repo.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(BenchError::CheckoutBusy(
                    "another session holds this checkout".into(),
                ));
            }
            // A panicked session leaves no lock file behind; the next
            // resolution checks out from scratch.
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };

        let lock = match guard.lock_path() {
            Some(path) => Some(LockFile::acquire(path)?),
            None => None,
        };

        Ok(CheckoutSession {
            repo: guard,
            _lock: lock,
        })
    }
}

/// Exclusive access to the working tree; released on drop.
pub struct CheckoutSession<'a, R> {
    repo: MutexGuard<'a, R>,
    _lock: Option<LockFile>,
}

impl<R: Repo> CheckoutSession<'_, R> {
    pub fn repo(&mut self) -> &mut R {
        &mut self.repo
    }
}
