//! The activity recorder: writes markers, commits them and pushes the branch.
//!
//! Burst flow per run:
//! `identity → remote → fetch → branch → N × (write → stage → commit) → push → [pull-merge → push]`

mod clock;
mod mode;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::config::Settings;
use crate::git::{BranchResolution, PushOutcome, Remote, Vcs};
use crate::marker;
use crate::paths::Paths;

pub use clock::{Clock, SystemClock};
pub use mode::Mode;

/// Bounds (inclusive) of commits made per burst run.
pub const MIN_BURST_COMMITS: u32 = 2;
pub const MAX_BURST_COMMITS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCommit {
    pub path: PathBuf,
    pub message: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub branch: String,
    pub resolution: BranchResolution,
    pub commits: Vec<RecordedCommit>,
    /// True when the first push was rejected and the pull-merge retry succeeded.
    pub retried: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The ledger already had an entry for this UTC day.
    Skipped { last: DateTime<Utc> },
    Pushed(Report),
}

pub struct Recorder<V, C> {
    vcs: V,
    clock: C,
    paths: Paths,
    settings: Settings,
}

impl<V: Vcs, C: Clock> Recorder<V, C> {
    pub fn new(vcs: V, clock: C, paths: Paths, settings: Settings) -> Self {
        Self {
            vcs,
            clock,
            paths,
            settings,
        }
    }

    pub fn vcs(&self) -> &V {
        &self.vcs
    }

    /// Run once with the thread-local random source.
    pub fn run(&mut self) -> Result<Outcome> {
        self.run_with(&mut rand::rng())
    }

    /// Run once, drawing the burst commit count from `rng`.
    pub fn run_with<R: Rng>(&mut self, rng: &mut R) -> Result<Outcome> {
        match self.settings.mode {
            Mode::Daily => self.run_daily(),
            Mode::Single => self.run_single(),
            Mode::Burst => self.run_burst(rng),
        }
    }

    fn run_daily(&mut self) -> Result<Outcome> {
        let now = self.clock.now();
        let ledger = self.paths.ledger.clone();

        match fs::read_to_string(&ledger) {
            Ok(text) => {
                if let Some(last) = marker::last_entry(&text)
                    && last.date_naive() == now.date_naive()
                {
                    info!("no commit: already recorded today (UTC)");
                    return Ok(Outcome::Skipped { last });
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", ledger.display())),
        }

        marker::append_entry(&ledger, now)?;
        let message = format!("chore: daily contribution update {}", marker::timestamp(now));
        self.record_one(ledger, message)
    }

    fn run_single(&mut self) -> Result<Outcome> {
        let now = self.clock.now();
        let path = self.paths.marker(now, None);
        marker::write_marker(&path, now)?;
        let message = format!("chore: contribution update {}", marker::timestamp(now));
        self.record_one(path, message)
    }

    /// Shared tail of the single-file policies: commit one path on a
    /// reset branch and push once, without recovery.
    fn record_one(&mut self, path: PathBuf, message: String) -> Result<Outcome> {
        self.prepare()?;
        let resolution = self
            .vcs
            .checkout_branch(&self.settings.branch, self.settings.mode.branch_mode())?;
        let commit = self.commit_path(path, message)?;
        let retried = self.push()?;
        Ok(Outcome::Pushed(Report {
            branch: self.settings.branch.clone(),
            resolution,
            commits: vec![commit],
            retried,
        }))
    }

    fn run_burst<R: Rng>(&mut self, rng: &mut R) -> Result<Outcome> {
        self.prepare()?;
        let branch = self.settings.branch.clone();
        self.vcs.fetch(&branch)?;
        let resolution = self
            .vcs
            .checkout_branch(&branch, self.settings.mode.branch_mode())?;

        let n = rng.random_range(MIN_BURST_COMMITS..=MAX_BURST_COMMITS);
        info!("recording {} commits on {}", n, branch);

        let mut commits = Vec::with_capacity(n as usize);
        for seq in 1..=n {
            if seq > 1 {
                self.clock.sleep(self.settings.pause);
            }
            let now = self.clock.now();
            let path = self.paths.marker(now, Some(seq));
            marker::write_marker(&path, now)?;
            let message = format!(
                "chore: contribution {} ({}/{})",
                marker::timestamp(now),
                seq,
                n
            );
            commits.push(self.commit_path(path, message)?);
        }

        let retried = self.push()?;
        Ok(Outcome::Pushed(Report {
            branch,
            resolution,
            commits,
            retried,
        }))
    }

    fn prepare(&mut self) -> Result<()> {
        self.vcs.configure_identity(&self.settings.author)?;
        let token = self.settings.token.clone();
        let remote = match &self.settings.remote_url {
            Some(url) => Remote::at(url.clone(), token),
            None => Remote::github(&self.settings.host, &self.settings.repository, token),
        };
        self.vcs.set_remote(remote)
    }

    fn commit_path(&mut self, path: PathBuf, message: String) -> Result<RecordedCommit> {
        let rel = self.paths.relative(&path).to_path_buf();
        self.vcs.stage(&rel)?;
        let id = self.vcs.commit(&message)?;
        Ok(RecordedCommit {
            path: rel,
            message,
            id,
        })
    }

    /// Push the branch. Burst mode gets exactly one pull-merge and retry;
    /// returns whether that retry was needed.
    fn push(&mut self) -> Result<bool> {
        let branch = self.settings.branch.clone();
        let reason = match self.vcs.push(&branch)? {
            PushOutcome::Accepted => return Ok(false),
            PushOutcome::Rejected(reason) => reason,
        };

        if !self.settings.mode.retries_push() {
            bail!("push to {} rejected: {}", branch, reason);
        }

        warn!("push rejected ({}); pulling and retrying once", reason);
        self.vcs
            .pull_merge(&branch, self.settings.conflict_favor)
            .with_context(|| format!("recovering from rejected push to {}", branch))?;
        match self.vcs.push(&branch)? {
            PushOutcome::Accepted => Ok(true),
            PushOutcome::Rejected(reason) => {
                bail!("push to {} rejected after pull: {}", branch, reason)
            }
        }
    }
}

#[cfg(test)]
mod tests;
