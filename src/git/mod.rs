//! Version-control layer.
//!
//! The recorder talks to git only through the [`Vcs`] trait. The production
//! implementation ([`Git2Backend`]) is built on the `git2` crate; tests swap
//! in a scripted fake.

mod git2_backend;
mod remote;

use anyhow::Result;
use serde::Deserialize;
use std::fmt;
use std::path::Path;

pub use git2_backend::Git2Backend;
pub use remote::Remote;

/// Commit author written to the working copy's local git config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub email: String,
}

/// How the target branch is selected before committing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchMode {
    /// Create the branch at HEAD, or reset it there if it exists (`checkout -B`).
    Reset,
    /// Reuse a local branch, else track `origin/<branch>`, else create it fresh.
    Resolve,
}

/// Which strategy actually selected the branch.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BranchResolution {
    Reset,
    Existing,
    TrackingRemote,
    Fresh,
}

impl fmt::Display for BranchResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BranchResolution::Reset => "reset to HEAD",
            BranchResolution::Existing => "existing local branch",
            BranchResolution::TrackingRemote => "tracking remote branch",
            BranchResolution::Fresh => "new branch",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    /// The remote refused the update, typically because it moved ahead.
    Rejected(String),
}

/// Side whose content wins on conflicting hunks during a recovery merge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeFavor {
    #[default]
    Theirs,
    Ours,
}

impl fmt::Display for MergeFavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeFavor::Theirs => f.write_str("theirs"),
            MergeFavor::Ours => f.write_str("ours"),
        }
    }
}

/// The operations the recorder needs from a version-control client.
pub trait Vcs {
    fn configure_identity(&mut self, identity: &Identity) -> Result<()>;
    fn set_remote(&mut self, remote: Remote) -> Result<()>;
    fn fetch(&mut self, branch: &str) -> Result<()>;
    fn checkout_branch(&mut self, branch: &str, mode: BranchMode) -> Result<BranchResolution>;
    /// Stage a path relative to the working copy root.
    fn stage(&mut self, path: &Path) -> Result<()>;
    /// Commit the index; returns the new commit id.
    fn commit(&mut self, message: &str) -> Result<String>;
    fn push(&mut self, branch: &str) -> Result<PushOutcome>;
    fn pull_merge(&mut self, branch: &str, favor: MergeFavor) -> Result<()>;
}
