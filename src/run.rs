use anyhow::Result;
use colored::Colorize;
use std::path::Path;
use tracing::info;

use crate::config::{Overrides, check_env, load_settings};
use crate::git::Git2Backend;
use crate::marker::timestamp;
use crate::paths::paths;
use crate::recorder::{Outcome, Recorder, SystemClock};

/// CLI command: record activity in the working copy containing `dir` and push it.
///
/// Settings are validated before anything is written, so a missing
/// variable leaves both the working tree and the remote untouched.
///
/// # Errors
/// - Configuration errors (missing environment values, malformed `contrib.toml`).
/// - Any git failure other than the single recoverable push rejection.
pub fn cmd_run(dir: &Path, overrides: &Overrides) -> Result<()> {
    check_env(|k| std::env::var(k).ok())?;
    let vcs = Git2Backend::discover(dir)?;
    let root = vcs.workdir()?;
    let p = paths(&root);
    let settings = load_settings(&p.settings, overrides)?;

    info!(
        "recording {} activity for {} on {}",
        settings.mode, settings.repository, settings.branch
    );
    let mut recorder = Recorder::new(vcs, SystemClock, p, settings);

    match recorder.run()? {
        Outcome::Skipped { last } => {
            println!(
                "{} already recorded today (last entry {})",
                "✔".green(),
                timestamp(last)
            );
        }
        Outcome::Pushed(report) => {
            for c in &report.commits {
                let short = c.id.get(..7).unwrap_or(&c.id);
                println!("  {} {}", short.yellow(), c.path.display());
            }
            let retry = if report.retried {
                " after pull-merge retry"
            } else {
                ""
            };
            println!(
                "{} pushed {} commit(s) to {} ({}){}",
                "✔".green(),
                report.commits.len(),
                report.branch.bold(),
                report.resolution,
                retry
            );
        }
    }
    Ok(())
}
