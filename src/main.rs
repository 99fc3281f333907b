//! # contrib
//!
//! **contrib** records contribution activity in a git working copy.
//!
//! Features:
//! - `contrib run` writes marker files, commits them and pushes the target branch
//! - `contrib status` shows the last ledger entry and the newest marker
//!
//! Required environment: `GITHUB_REPOSITORY`, `PAT`, `COMMIT_NAME`, `COMMIT_EMAIL`.
//! Optional: `BOT_BRANCH`, plus non-secret defaults in `contrib.toml`.

use anyhow::Result;
use clap::{Parser, Subcommand};
use contrib::{Mode, Overrides, cmd_run, cmd_status, logging};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "contrib",
    version,
    about = "contrib - record activity commits and push them with a PAT",
    arg_required_else_help = true
)]
struct Cli {
    /// Run as if started in this directory
    #[arg(short = 'C', long = "dir", global = true, default_value = ".")]
    dir: PathBuf,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Option<Cmd>,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Write marker files, commit them and push the target branch
    Run {
        /// Recording policy
        #[arg(long, value_enum)]
        mode: Option<Mode>,
        /// Target branch
        #[arg(long, env = "BOT_BRANCH", hide_env_values = true)]
        branch: Option<String>,
    },
    /// Show the last ledger entry and the newest marker
    Status,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.cmd {
        Some(Cmd::Run { mode, branch }) => {
            let branch = branch.filter(|b| !b.trim().is_empty());
            cmd_run(&cli.dir, &Overrides { mode, branch })
        }
        Some(Cmd::Status) | None => cmd_status(&cli.dir),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn branch_of(args: &[&str]) -> Option<String> {
        match Cli::try_parse_from(args).unwrap().cmd {
            Some(Cmd::Run { branch, .. }) => branch,
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn branch_comes_from_bot_branch_unless_flag_given() {
        // SAFETY: serialized with every other test that touches the environment.
        unsafe {
            std::env::set_var("BOT_BRANCH", "from-env");
        }
        assert_eq!(branch_of(&["contrib", "run"]).as_deref(), Some("from-env"));
        assert_eq!(
            branch_of(&["contrib", "run", "--branch", "from-flag"]).as_deref(),
            Some("from-flag")
        );

        unsafe {
            std::env::remove_var("BOT_BRANCH");
        }
        assert_eq!(branch_of(&["contrib", "run"]), None);
    }
}
