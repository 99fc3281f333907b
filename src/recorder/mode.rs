use clap::ValueEnum;
use serde::Deserialize;
use std::fmt;

use crate::git::BranchMode;

/// Recording policy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Append one line per UTC day to `contributions/keep_alive.md`.
    Daily,
    /// One new date/time marker file per run.
    Single,
    /// Two or three marker files per run, each its own commit.
    #[default]
    Burst,
}

impl Mode {
    /// Branch used when `BOT_BRANCH` is not set.
    pub fn default_branch(self) -> &'static str {
        match self {
            Mode::Daily | Mode::Single => "contrib-bot",
            Mode::Burst => "master",
        }
    }

    pub fn branch_mode(self) -> BranchMode {
        match self {
            Mode::Daily | Mode::Single => BranchMode::Reset,
            Mode::Burst => BranchMode::Resolve,
        }
    }

    /// Whether a rejected push gets one pull-merge and a second attempt.
    pub fn retries_push(self) -> bool {
        matches!(self, Mode::Burst)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Mode::Daily => "daily",
            Mode::Single => "single",
            Mode::Burst => "burst",
        };
        f.write_str(s)
    }
}
