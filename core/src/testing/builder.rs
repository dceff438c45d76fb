use std::{io, path::PathBuf, time::Duration};

use crate::{config::Config, process};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to spawn build command '{cmd}': {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed in build stage (exitcode={}):\n\n{output}", .code.map_or("none".to_owned(), |c| c.to_string()))]
    Failed { code: Option<i32>, output: String },

    #[error("Build timed out after {limit:?}; killed '{cmd}'")]
    TimedOut { cmd: String, limit: Duration },

    #[error("Executable '{}' not found after build", .0.display())]
    MissingExecutable(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    /// Captured stdout followed by stderr. Empty when the build was skipped.
    pub log: String,
    pub elapsed: Duration,
    pub skipped: bool,
}

/// Runs `BuildCommand` once in the project root.
#[derive(Debug, Clone)]
pub struct Builder<'c> {
    cfg: &'c Config,
    skip: bool,
}

impl<'c> Builder<'c> {
    pub fn new(cfg: &'c Config) -> Self {
        Self { cfg, skip: false }
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub async fn build(&self) -> Result<BuildOutput, BuildError> {
        let cmd = self.cfg.build_command.trim();
        let output = if self.skip || cmd.is_empty() {
            log::info!("Skipping build");
            BuildOutput {
                log: String::new(),
                elapsed: Duration::ZERO,
                skipped: true,
            }
        } else {
            self.run_build_command(cmd).await?
        };

        let executable = self.cfg.executable_path();
        if !executable.is_file() {
            return Err(BuildError::MissingExecutable(executable));
        }
        Ok(output)
    }

    async fn run_build_command(&self, cmd: &str) -> Result<BuildOutput, BuildError> {
        log::info!("Building: {}", cmd);

        let mut proc = process::shell_command(&self.cfg.shell, cmd);
        proc.current_dir(&self.cfg.project_root);

        let out = process::run_in_group(proc, self.cfg.build_timeout)
            .await
            .map_err(|source| BuildError::Spawn {
                cmd: cmd.to_owned(),
                source,
            })?;

        if out.timed_out {
            return Err(BuildError::TimedOut {
                cmd: cmd.to_owned(),
                limit: self.cfg.build_timeout.unwrap_or_default(),
            });
        }

        let log = out.stdout_lossy() + &out.stderr_lossy();
        if !out.success() {
            return Err(BuildError::Failed {
                code: out.exit_code(),
                output: log,
            });
        }

        log::info!("Build finished in {}ms", out.elapsed.as_millis());
        Ok(BuildOutput {
            log,
            elapsed: out.elapsed,
            skipped: false,
        })
    }
}
