use std::{
    collections::HashMap,
    ffi::OsString,
    fs::File,
    io,
    path::{Path, PathBuf},
    process::Stdio,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};

use tokio::process::Command;

use super::testcase::TestCase;
use crate::{
    config::Config,
    process,
    str_interp::{InterpError, Placeholder},
};

/// Distinguishes temp outputs of one run from every other run, including
/// concurrent runs in this or other processes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunToken(String);

impl RunToken {
    pub fn generate() -> Self {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let now = chrono::Local::now().format("%Y%m%d%H%M%S%3f");
        Self(format!("{}-{}-{}", now, std::process::id(), seq))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub testcase: TestCase,
    /// `None` if the process timed out or was killed by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub wall_duration: Duration,
    pub output_path: PathBuf,
    pub stderr: String,
}

impl ExecutionResult {
    pub fn exited_normally(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Cannot open input '{}': {source}", .path.display())]
    OpenInput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot create output '{}': {source}", .path.display())]
    CreateOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Cannot render RunCommand: {0}")]
    Template(#[from] InterpError),

    #[error("Failed to spawn '{cmd}': {source}")]
    Spawn {
        cmd: String,
        #[source]
        source: io::Error,
    },
}

/// Runs the program under test for one testcase at a time.
#[derive(Debug)]
pub struct Executor<'c> {
    cfg: &'c Config,
    token: RunToken,
}

impl<'c> Executor<'c> {
    pub fn new(cfg: &'c Config) -> Self {
        Self::with_token(cfg, RunToken::generate())
    }

    pub fn with_token(cfg: &'c Config, token: RunToken) -> Self {
        Self { cfg, token }
    }

    pub fn token(&self) -> &RunToken {
        &self.token
    }

    /// `{TempOutputDir}/{id}_{token}.out`
    pub fn output_path_for(&self, t: &TestCase) -> PathBuf {
        self.cfg
            .temp_output_dir()
            .join(format!("{}_{}.out", t.id(), self.token.as_str()))
    }

    pub(crate) fn placeholder_values(
        cfg: &Config,
        t: &TestCase,
        output: &Path,
    ) -> HashMap<Placeholder, OsString> {
        use Placeholder::*;
        let mut m = HashMap::new();
        m.insert(Input, t.input_path().into());
        m.insert(Output, output.into());
        m.insert(Answer, t.answer_path().into());
        m.insert(Executable, cfg.executable_path().into());
        m.insert(Id, t.id().into());
        m
    }

    pub async fn run(&self, t: &TestCase) -> Result<ExecutionResult, ExecError> {
        let output_path = self.output_path_for(t);

        let open_input = || {
            File::open(t.input_path()).map_err(|source| ExecError::OpenInput {
                path: t.input_path().to_owned(),
                source,
            })
        };
        let create_output = || {
            File::create(&output_path).map_err(|source| ExecError::CreateOutput {
                path: output_path.clone(),
                source,
            })
        };

        let (mut cmd, cmd_str) = match &self.cfg.run_command {
            None => {
                let exe = self.cfg.executable_path();
                let mut cmd = Command::new(&exe);
                cmd.stdin(open_input()?).stdout(create_output()?);
                (cmd, exe.to_string_lossy().into_owned())
            }
            Some(template) => {
                let values = Self::placeholder_values(self.cfg, t, &output_path);
                let script = template.render(&values)?;
                let mut cmd = process::shell_command(&self.cfg.shell, &script);
                if template.contains(Placeholder::Input) {
                    cmd.stdin(Stdio::null());
                } else {
                    cmd.stdin(open_input()?);
                }
                if template.contains(Placeholder::Output) {
                    cmd.stdout(Stdio::null());
                } else {
                    cmd.stdout(create_output()?);
                }
                (cmd, script)
            }
        };
        cmd.current_dir(&self.cfg.project_root)
            .stderr(Stdio::piped());

        log::debug!("[{}] {}", t.id(), cmd_str);

        let out = process::run_in_group(cmd, self.cfg.timeout)
            .await
            .map_err(|source| ExecError::Spawn {
                cmd: cmd_str.clone(),
                source,
            })?;

        if out.timed_out {
            log::warn!("TLE at {}; killed `{}`", t.id(), cmd_str);
        }

        Ok(ExecutionResult {
            testcase: t.clone(),
            exit_code: out.exit_code(),
            timed_out: out.timed_out,
            wall_duration: out.elapsed,
            output_path,
            stderr: out.stderr_lossy(),
        })
    }
}
