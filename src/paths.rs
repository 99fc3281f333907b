use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Directory (relative to the working copy) holding every generated file.
pub const CONTRIBUTIONS_DIR: &str = "contributions";
/// Single-file ledger used by the daily mode.
pub const LEDGER_FILE: &str = "keep_alive.md";
/// Optional non-secret settings file at the working copy root.
pub const SETTINGS_FILE: &str = "contrib.toml";

#[derive(Clone, Debug)]
pub struct Paths {
    pub root: PathBuf,
    pub contributions: PathBuf,
    pub ledger: PathBuf,
    pub settings: PathBuf,
}

pub fn paths(root: &Path) -> Paths {
    let contributions = root.join(CONTRIBUTIONS_DIR);
    Paths {
        root: root.to_path_buf(),
        ledger: contributions.join(LEDGER_FILE),
        settings: root.join(SETTINGS_FILE),
        contributions,
    }
}

impl Paths {
    /// Marker path for `now`: `contributions/YYYY/MM/DD/HH-MM-SS[-seq].md`.
    pub fn marker(&self, now: DateTime<Utc>, seq: Option<u32>) -> PathBuf {
        let day = self.contributions.join(now.format("%Y/%m/%d").to_string());
        let stem = now.format("%H-%M-%S").to_string();
        match seq {
            Some(n) => day.join(format!("{}-{}.md", stem, n)),
            None => day.join(format!("{}.md", stem)),
        }
    }

    /// Path of `p` relative to the working copy root, as git expects it.
    pub fn relative<'a>(&self, p: &'a Path) -> &'a Path {
        p.strip_prefix(&self.root).unwrap_or(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 7, h, m, s).unwrap()
    }

    #[test]
    fn marker_uses_zero_padded_date_tree() {
        let p = paths(Path::new("/w"));
        assert_eq!(
            p.marker(at(9, 5, 1), None),
            PathBuf::from("/w/contributions/2026/03/07/09-05-01.md")
        );
        assert_eq!(
            p.marker(at(9, 5, 1), Some(2)),
            PathBuf::from("/w/contributions/2026/03/07/09-05-01-2.md")
        );
    }

    #[test]
    fn markers_differ_across_seconds_and_sequence() {
        let p = paths(Path::new("/w"));
        assert_ne!(p.marker(at(1, 2, 3), None), p.marker(at(1, 2, 4), None));
        assert_ne!(p.marker(at(1, 2, 3), Some(1)), p.marker(at(1, 2, 3), Some(2)));
    }

    #[test]
    fn relative_strips_root() {
        let p = paths(Path::new("/w"));
        assert_eq!(
            p.relative(Path::new("/w/contributions/keep_alive.md")),
            Path::new("contributions/keep_alive.md")
        );
        assert_eq!(p.ledger, PathBuf::from("/w/contributions/keep_alive.md"));
    }
}
