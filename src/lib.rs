//! Crate entry point for **contrib**.
//!
//! This library provides the implementation behind the `contrib` CLI, which
//! writes timestamped marker files into a git working copy, commits them and
//! pushes the target branch with a personal access token.
//! Each submodule owns one concern (settings, markers, git, recording policy).

pub mod config;
pub mod git;
pub mod logging;
pub mod marker;
pub mod paths;
pub mod recorder;
mod run;
pub mod secret;
pub mod status;

pub use config::{ConfigError, Overrides, Settings};
pub use recorder::{Mode, Outcome, Recorder};
pub use run::cmd_run;
pub use secret::Secret;
pub use status::cmd_status;
