use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::git::Git2Backend;
use crate::marker;
use crate::paths::{Paths, paths};

/// Read-only summary of what has been recorded in a working copy.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Status {
    /// Last non-blank line of the daily ledger, verbatim.
    pub last_entry: Option<String>,
    pub latest_marker: Option<PathBuf>,
    pub markers: usize,
}

/// Collect all marker files below `dir` in chronological order.
///
/// The date tree uses zero-padded components, so lexicographic order of the
/// paths is also time order. The ledger is not a marker.
fn collect_markers(dir: &Path, ledger: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let rd = match fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("read {}", dir.display())),
    };
    let mut entries: Vec<PathBuf> = rd.flatten().map(|e| e.path()).collect();
    entries.sort();
    for p in entries {
        if p.is_dir() {
            collect_markers(&p, ledger, out)?;
        } else if p != ledger && p.extension().is_some_and(|ext| ext == "md") {
            out.push(p);
        }
    }
    Ok(())
}

pub fn status(paths: &Paths) -> Result<Status> {
    let last_entry = match fs::read_to_string(&paths.ledger) {
        Ok(text) => marker::last_line(&text).map(|l| l.trim().to_string()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => None,
        Err(e) => {
            return Err(e).with_context(|| format!("read {}", paths.ledger.display()));
        }
    };

    let mut markers = Vec::new();
    collect_markers(&paths.contributions, &paths.ledger, &mut markers)?;

    Ok(Status {
        last_entry,
        markers: markers.len(),
        latest_marker: markers
            .pop()
            .map(|p| paths.relative(&p).to_path_buf()),
    })
}

/// CLI command: print the last ledger entry and the newest marker of the
/// working copy containing `dir`.
///
/// Example output:
/// ```text
/// ledger:  - 2026-10-15T08:30:00.000000Z
/// latest:  contributions/2026/10/16/12-00-02-2.md
/// markers: 14
/// ```
pub fn cmd_status(dir: &Path) -> Result<()> {
    let vcs = Git2Backend::discover(dir)?;
    let st = status(&paths(&vcs.workdir()?))?;
    match &st.last_entry {
        Some(line) => println!("ledger:  {}", line),
        None => println!("ledger:  {}", "none".dimmed()),
    }
    match &st.latest_marker {
        Some(p) => println!("latest:  {}", p.display()),
        None => println!("latest:  {}", "none".dimmed()),
    }
    println!("markers: {}", st.markers);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn empty_working_copy_reports_nothing() {
        let td = tempdir().unwrap();
        assert_eq!(status(&paths(td.path())).unwrap(), Status::default());
    }

    #[test]
    fn finds_newest_marker_and_last_ledger_line() {
        let td = tempdir().unwrap();
        let p = paths(td.path());
        let c = &p.contributions;
        for rel in [
            "2025/12/31/23-59-59.md",
            "2026/01/02/08-00-00-1.md",
            "2026/01/02/08-00-02-2.md",
            "2026/01/01/10-00-00.md",
        ] {
            let f = c.join(rel);
            fs::create_dir_all(f.parent().unwrap()).unwrap();
            fs::write(&f, "x").unwrap();
        }
        fs::write(&p.ledger, "- 2026-01-01T00:00:00Z\n- 2026-01-02T00:00:00Z\n\n").unwrap();
        fs::write(c.join("notes.txt"), "ignored").unwrap();

        let st = status(&p).unwrap();
        assert_eq!(st.markers, 4);
        assert_eq!(
            st.latest_marker,
            Some(PathBuf::from("contributions/2026/01/02/08-00-02-2.md"))
        );
        assert_eq!(st.last_entry.as_deref(), Some("- 2026-01-02T00:00:00Z"));
    }
}
