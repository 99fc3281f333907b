use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::git::{Identity, MergeFavor};
use crate::recorder::Mode;
use crate::secret::Secret;

pub const ENV_REPOSITORY: &str = "GITHUB_REPOSITORY";
pub const ENV_TOKEN: &str = "PAT";
pub const ENV_NAME: &str = "COMMIT_NAME";
pub const ENV_EMAIL: &str = "COMMIT_EMAIL";
pub const ENV_BRANCH: &str = "BOT_BRANCH";

const DEFAULT_HOST: &str = "github.com";
const DEFAULT_PAUSE_SECS: u64 = 2;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variables: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("failed to read {}: {source}", .path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Optional, non-secret settings loaded from `contrib.toml`.
///
/// Example TOML:
/// ```toml
/// mode = "burst"
/// branch = "master"
/// host = "github.com"
/// pause_secs = 2
/// conflict_favor = "theirs"
/// # push/fetch somewhere other than https://<host>/<repository>.git
/// remote_url = "https://git.example.com/mirror/repo.git"
/// ```
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub mode: Option<Mode>,
    pub branch: Option<String>,
    pub host: Option<String>,
    pub pause_secs: Option<u64>,
    pub conflict_favor: Option<MergeFavor>,
    pub remote_url: Option<String>,
}

/// Values given on the command line; they win over every other source.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub mode: Option<Mode>,
    pub branch: Option<String>,
}

/// Fully validated run configuration.
#[derive(Debug, Clone)]
pub struct Settings {
    pub repository: String,
    pub token: Secret,
    pub author: Identity,
    pub branch: String,
    pub mode: Mode,
    pub host: String,
    pub pause: Duration,
    pub conflict_favor: MergeFavor,
    pub remote_url: Option<String>,
}

impl Settings {
    /// Build settings from an environment lookup, the settings file and CLI overrides.
    ///
    /// Empty values count as absent. Every missing required variable is
    /// reported together in one [`ConfigError::Missing`].
    pub fn resolve<F>(lookup: F, file: FileConfig, overrides: &Overrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let repository = get(ENV_REPOSITORY);
        let token = get(ENV_TOKEN);
        let name = get(ENV_NAME);
        let email = get(ENV_EMAIL);

        let missing: Vec<&'static str> = [
            (ENV_REPOSITORY, repository.is_none()),
            (ENV_TOKEN, token.is_none()),
            (ENV_NAME, name.is_none()),
            (ENV_EMAIL, email.is_none()),
        ]
        .into_iter()
        .filter_map(|(key, absent)| absent.then_some(key))
        .collect();

        let (Some(repository), Some(token), Some(name), Some(email)) = (repository, token, name, email)
        else {
            return Err(ConfigError::Missing(missing));
        };

        let mode = overrides.mode.or(file.mode).unwrap_or_default();
        let branch = overrides
            .branch
            .clone()
            .or_else(|| get(ENV_BRANCH))
            .or(file.branch)
            .unwrap_or_else(|| mode.default_branch().to_string());

        Ok(Settings {
            repository,
            token: Secret::new(token),
            author: Identity { name, email },
            branch,
            mode,
            host: file.host.unwrap_or_else(|| DEFAULT_HOST.to_string()),
            pause: Duration::from_secs(file.pause_secs.unwrap_or(DEFAULT_PAUSE_SECS)),
            conflict_favor: file.conflict_favor.unwrap_or_default(),
            remote_url: file.remote_url,
        })
    }
}

/// Check only the required environment values, before any repository or
/// file is touched.
///
/// # Errors
/// Returns [`ConfigError::Missing`] listing every absent or empty variable.
pub fn check_env<F>(lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let missing: Vec<&'static str> = [ENV_REPOSITORY, ENV_TOKEN, ENV_NAME, ENV_EMAIL]
        .into_iter()
        .filter(|key| lookup(key).is_none_or(|v| v.trim().is_empty()))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Missing(missing))
    }
}

/// Load `contrib.toml`; a missing file yields the defaults.
///
/// # Errors
/// - Returns [`ConfigError::Read`] if the file exists but cannot be read.
/// - Returns [`ConfigError::Parse`] if the TOML is malformed or has unknown keys.
pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let txt = match fs::read_to_string(path) {
        Ok(txt) => txt,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    toml::from_str(&txt).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load settings from the process environment and `settings_file`.
pub fn load_settings(settings_file: &Path, overrides: &Overrides) -> Result<Settings, ConfigError> {
    let file = load_file(settings_file)?;
    Settings::resolve(|k| std::env::var(k).ok(), file, overrides)
}
