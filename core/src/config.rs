use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
    time::Duration,
};

use rust_embed::RustEmbed;
use serde::Deserialize;

use crate::serdable::{GlobPattern, Seconds};
use crate::str_interp::{CommandTemplate, InterpError, Placeholder};
use crate::testing::score::ScoreDict;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read config: {0}")]
    Read(#[from] fsutil::Error),

    #[error("Not in a judge project dir: cannot find '{0}'")]
    NotFound(&'static str),

    #[error("Invalid config TOML ({}): {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid `{key}`: {source}")]
    Template {
        key: &'static str,
        #[source]
        source: InterpError,
    },

    #[error("Invalid `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Either `ScoreDict` or `TotalScore` must be set")]
    NoScoring,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExitOrLog {
    /// The compare tool's exit status decides: 0 is identical.
    Exit,
    /// The compare tool always exits 0; empty stdout is identical.
    Log,
}

/// Settings as written in the `[Config]` table.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
struct RawConfig {
    build_command: String,
    executable: PathBuf,
    #[serde(default)]
    run_command: Option<String>,
    inputs: GlobPattern,
    temp_output_dir: PathBuf,
    diff_command: String,
    delete_temp_output: bool,
    answer_dir: PathBuf,
    answer_extension: String,
    exit_or_log: ExitOrLog,
    #[serde(default)]
    score_dict: Option<ScoreDict>,
    #[serde(default)]
    total_score: Option<i64>,
    #[serde(default)]
    timeout: Option<Seconds>,
    #[serde(default)]
    build_timeout: Option<Seconds>,
    #[serde(default)]
    shell: Option<PathBuf>,
    #[serde(default)]
    jobs: Option<NonZeroUsize>,
}

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    #[serde(rename = "Config")]
    config: RawConfig,
}

/// Validated judge settings. Relative paths are relative to `project_root`.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub source_config_file: Option<PathBuf>,
    pub project_root: PathBuf,
    pub build_command: String,
    pub executable: PathBuf,
    pub run_command: Option<CommandTemplate>,
    pub inputs: GlobPattern,
    pub temp_output_dir: PathBuf,
    pub diff_command: CommandTemplate,
    pub delete_temp_output: bool,
    pub answer_dir: PathBuf,
    pub answer_extension: String,
    pub exit_or_log: ExitOrLog,
    pub score_dict: Option<ScoreDict>,
    pub total_score: Option<i64>,
    pub timeout: Option<Duration>,
    pub build_timeout: Option<Duration>,
    pub shell: PathBuf,
    pub jobs: NonZeroUsize,
}

#[derive(RustEmbed)]
#[folder = "assets/"]
struct Asset;

impl Config {
    pub const FILENAME: &str = "judge.conf";
    pub const DEFAULT_SHELL: &str = "/bin/sh";

    pub fn example_toml() -> String {
        Asset::get(Self::FILENAME)
            .map(|f| String::from_utf8_lossy(f.data.as_ref()).into_owned())
            .unwrap_or_default()
    }

    pub fn from_toml(s: &str, project_root: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let project_root = project_root.into();
        let file: ConfigFile = toml::from_str(s).map_err(|source| ConfigError::Toml {
            path: project_root.join(Self::FILENAME),
            source,
        })?;
        Self::validate(file.config, project_root)
    }

    pub fn from_toml_file(filepath: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let filepath = fsutil::canonicalize_path(filepath)?;
        let toml = fsutil::read_to_string(&filepath)?;
        let project_root = filepath
            .parent()
            .map(Path::to_owned)
            .unwrap_or_else(|| PathBuf::from("."));
        let file: ConfigFile = toml::from_str(&toml).map_err(|source| ConfigError::Toml {
            path: filepath.clone(),
            source,
        })?;
        let mut cfg = Self::validate(file.config, project_root)?;
        cfg.source_config_file = Some(filepath);
        Ok(cfg)
    }

    /// Find config file in ancestor dirs, including current dir.
    pub fn find_file_in_ancestors(cur_dir: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
        cur_dir
            .as_ref()
            .ancestors()
            .map(|dir| dir.join(Self::FILENAME))
            .find(|path| path.is_file())
            .ok_or(ConfigError::NotFound(Self::FILENAME))
    }

    pub fn from_file_finding_in_ancestors(cur_dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_filepath = Self::find_file_in_ancestors(cur_dir)?;
        Self::from_toml_file(config_filepath)
    }

    fn validate(raw: RawConfig, project_root: PathBuf) -> Result<Self, ConfigError> {
        use Placeholder::*;

        let run_command = raw
            .run_command
            .filter(|s| !s.trim().is_empty())
            .map(|s| CommandTemplate::parse(&s))
            .transpose()
            .map_err(|source| ConfigError::Template {
                key: "RunCommand",
                source,
            })?;

        let diff_command = CommandTemplate::parse_requiring(&raw.diff_command, &[Answer, Output])
            .map_err(|source| ConfigError::Template {
                key: "DiffCommand",
                source,
            })?;

        if raw.executable.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "Executable",
                reason: "must not be empty".to_owned(),
            });
        }
        if raw.temp_output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                key: "TempOutputDir",
                reason: "must not be empty".to_owned(),
            });
        }
        if let Some(total) = raw.total_score.filter(|&t| t < 0) {
            return Err(ConfigError::Invalid {
                key: "TotalScore",
                reason: format!("must not be negative, got {}", total),
            });
        }

        let score_dict = raw.score_dict.filter(|d| !d.is_empty());
        if score_dict.is_none() && raw.total_score.is_none() {
            return Err(ConfigError::NoScoring);
        }

        let answer_extension = match raw.answer_extension.trim() {
            "" => String::new(),
            ext if ext.starts_with('.') => ext.to_owned(),
            ext => format!(".{}", ext),
        };

        Ok(Self {
            source_config_file: None,
            project_root,
            build_command: raw.build_command,
            executable: raw.executable,
            run_command,
            inputs: raw.inputs,
            temp_output_dir: raw.temp_output_dir,
            diff_command,
            delete_temp_output: raw.delete_temp_output,
            answer_dir: raw.answer_dir,
            answer_extension,
            exit_or_log: raw.exit_or_log,
            score_dict,
            total_score: raw.total_score,
            timeout: raw.timeout.map(Into::into),
            build_timeout: raw.build_timeout.or(raw.timeout).map(Into::into),
            shell: raw.shell.unwrap_or_else(|| Self::DEFAULT_SHELL.into()),
            jobs: raw.jobs.unwrap_or(NonZeroUsize::MIN),
        })
    }

    /// Resolve `path` against the project root (absolute paths are kept).
    pub fn resolve_path(&self, path: impl AsRef<Path>) -> PathBuf {
        fsutil::normalize_path(self.project_root.join(path))
    }

    pub fn executable_path(&self) -> PathBuf {
        self.resolve_path(&self.executable)
    }

    pub fn temp_output_dir(&self) -> PathBuf {
        self.resolve_path(&self.temp_output_dir)
    }

    pub fn answer_dir(&self) -> PathBuf {
        self.resolve_path(&self.answer_dir)
    }
}
