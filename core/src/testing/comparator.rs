use std::process::Stdio;

use super::{executor::*, result::*, testcase::TestCase};
use crate::{
    config::{Config, ExitOrLog},
    process::{self, GroupOutput},
};

/// Uniform outcome of a compare tool, whichever strategy read it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffVerdict {
    pub passed: bool,
    pub diff_text: String,
}

/// Exit statuses a POSIX shell uses for "not executable" and "not found".
const SHELL_CANNOT_EXECUTE: i32 = 126;
const SHELL_NOT_FOUND: i32 = 127;

impl ExitOrLog {
    /// Read the compare tool's output. `Err` carries a description of a tool failure.
    pub fn interpret(self, out: &GroupOutput) -> Result<DiffVerdict, String> {
        let stdout = out.stdout_lossy();
        let stderr = out.stderr_lossy();

        let code = match out.exit_code() {
            Some(code) => code,
            None => return Err(format!("compare command was killed by a signal\n{}", stderr)),
        };
        if code == SHELL_CANNOT_EXECUTE || code == SHELL_NOT_FOUND {
            return Err(format!("compare command could not run (exitcode={})\n{}", code, stderr));
        }
        if code != 0 && stdout.trim().is_empty() && !stderr.trim().is_empty() {
            return Err(format!("compare command failed (exitcode={})\n{}", code, stderr));
        }

        match self {
            ExitOrLog::Exit => Ok(DiffVerdict {
                passed: code == 0,
                diff_text: stdout,
            }),
            ExitOrLog::Log if code != 0 && stdout.is_empty() => Err(format!(
                "compare command exited with {} without any output",
                code
            )),
            ExitOrLog::Log => Ok(DiffVerdict {
                passed: stdout.is_empty(),
                diff_text: stdout,
            }),
        }
    }
}

/// Judges one execution against its answer using `DiffCommand`.
#[derive(Debug, Clone)]
pub struct Comparator<'c> {
    cfg: &'c Config,
}

impl<'c> Comparator<'c> {
    pub fn new(cfg: &'c Config) -> Self {
        Self { cfg }
    }

    pub async fn compare(&self, t: &TestCase, exec: &ExecutionResult) -> ComparisonResult {
        let base = |judge| ComparisonResult::new(t.clone(), judge).with_execution(exec);

        if exec.timed_out {
            let limit = self.cfg.timeout.unwrap_or_default();
            return base(JudgeCode::TLE).with_note(format!("exceeded {:?}", limit));
        }
        if !exec.exited_normally() {
            let note = match exec.exit_code {
                Some(code) => format!("exited with code {}", code),
                None => "killed by a signal".to_owned(),
            };
            return base(JudgeCode::RE).with_note(note);
        }
        if !exec.output_path.is_file() {
            return base(JudgeCode::MO).with_note(format!(
                "no output at '{}'",
                exec.output_path.display()
            ));
        }
        if !t.has_answer() {
            return base(JudgeCode::MA).with_note(format!(
                "no answer at '{}'",
                t.answer_path().display()
            ));
        }

        if let Err(e) = fsutil::copy_permissions(t.answer_path(), &exec.output_path) {
            log::warn!("{}", e);
        }

        match self.run_diff(t, exec).await {
            Ok(DiffVerdict { passed: true, .. }) => base(JudgeCode::AC),
            Ok(DiffVerdict { diff_text, .. }) => base(JudgeCode::WA).with_diff(diff_text),
            Err(note) => base(JudgeCode::TE).with_note(note),
        }
    }

    async fn run_diff(&self, t: &TestCase, exec: &ExecutionResult) -> Result<DiffVerdict, String> {
        let values = Executor::placeholder_values(self.cfg, t, &exec.output_path);
        let script = self
            .cfg
            .diff_command
            .render(&values)
            .map_err(|e| e.to_string())?;

        log::debug!("[{}] {}", t.id(), script);

        let mut cmd = process::shell_command(&self.cfg.shell, &script);
        cmd.current_dir(&self.cfg.project_root).stdin(Stdio::null());

        let out = process::run_in_group(cmd, None)
            .await
            .map_err(|e| format!("failed to spawn '{}': {}", script, e))?;

        self.cfg.exit_or_log.interpret(&out)
    }
}

#[cfg(test)]
mod test {
    use std::{os::unix::process::ExitStatusExt, process::ExitStatus, time::Duration};

    use super::*;
    use crate::testing::test_util::ProjectDir;

    fn out(code: i32, stdout: &str, stderr: &str) -> GroupOutput {
        GroupOutput {
            status: Some(ExitStatus::from_raw(code << 8)),
            stdout: stdout.into(),
            stderr: stderr.into(),
            timed_out: false,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn exit_strategy() {
        let s = ExitOrLog::Exit;
        assert_eq!(
            s.interpret(&out(0, "", "")),
            Ok(DiffVerdict {
                passed: true,
                diff_text: "".into()
            })
        );
        assert_eq!(
            s.interpret(&out(1, "-a\n+b\n", "")),
            Ok(DiffVerdict {
                passed: false,
                diff_text: "-a\n+b\n".into()
            })
        );
        // `cmp -s` style: silent on difference
        assert_eq!(s.interpret(&out(1, "", "")).map(|v| v.passed), Ok(false));
        assert!(s.interpret(&out(127, "", "sh: nodiff: not found\n")).is_err());
        assert!(s.interpret(&out(2, "", "diff: missing operand\n")).is_err());
    }

    #[test]
    fn log_strategy() {
        let s = ExitOrLog::Log;
        assert_eq!(s.interpret(&out(0, "", "")).map(|v| v.passed), Ok(true));
        assert_eq!(
            s.interpret(&out(0, "line 1 differs\n", "")),
            Ok(DiffVerdict {
                passed: false,
                diff_text: "line 1 differs\n".into()
            })
        );
        assert_eq!(s.interpret(&out(1, "differs\n", "")).map(|v| v.passed), Ok(false));
        assert!(s.interpret(&out(1, "", "")).is_err());
    }

    #[test]
    fn killed_tool_is_tool_error() {
        let killed = GroupOutput {
            status: Some(ExitStatus::from_raw(nix::sys::signal::Signal::SIGKILL as i32)),
            ..out(0, "", "")
        };
        assert!(ExitOrLog::Exit.interpret(&killed).is_err());
    }

    fn exec_result(p: &ProjectDir, output: Option<&str>) -> ExecutionResult {
        let output_path = p.path().join("tmp/output/a_test.out");
        match output {
            Some(s) => {
                p.write("tmp/output/a_test.out", s);
            }
            None => {
                fsutil::remove_file_if_exists(&output_path).unwrap();
            }
        }
        ExecutionResult {
            testcase: TestCase::new(
                "a",
                p.path().join("tests/input/a.txt"),
                p.path().join("tests/answer/a.txt"),
            ),
            exit_code: Some(0),
            timed_out: false,
            wall_duration: Duration::from_millis(5),
            output_path,
            stderr: String::new(),
        }
    }

    async fn compare(p: &ProjectDir, extra: &str, exec: &ExecutionResult) -> ComparisonResult {
        let cfg = p.config(extra);
        let t = crate::testing::TestCaseResolver::new(&cfg)
            .resolve()
            .unwrap()
            .remove(0);
        Comparator::new(&cfg).compare(&t, exec).await
    }

    #[tokio::test]
    async fn identical_output_passes() {
        let p = ProjectDir::new();
        p.add_testcase("a", "1\n", "hello\n");
        let exec = exec_result(&p, Some("hello\n"));

        let r = compare(&p, "", &exec).await;
        assert_eq!(r.judge, JudgeCode::AC);
        assert_eq!(r.label, "1");
        assert!(r.diff_text.is_empty());
    }

    #[tokio::test]
    async fn differing_output_fails_with_diff() {
        let p = ProjectDir::new();
        p.add_testcase("a", "1\n", "hello\n");
        let exec = exec_result(&p, Some("world\n"));

        let r = compare(&p, "", &exec).await;
        assert_eq!(r.judge, JudgeCode::WA);
        assert_eq!(r.label, "0");
        assert!(r.diff_text.contains("world"));
        assert_eq!(r.note, None);
    }

    #[tokio::test]
    async fn log_mode_reads_text() {
        let p = ProjectDir::new();
        p.add_testcase("a", "1\n", "hello\n");

        let cfg = "ExitOrLog = \"log\"\nDiffCommand = \"diff {answer} {output} || true\"";
        let r = compare(&p, cfg, &exec_result(&p, Some("hello\n"))).await;
        assert_eq!(r.judge, JudgeCode::AC);

        let r = compare(&p, cfg, &exec_result(&p, Some("bye\n"))).await;
        assert_eq!(r.judge, JudgeCode::WA);
        assert!(r.diff_text.contains("bye"));
    }

    #[tokio::test]
    async fn missing_tool_is_tool_error() {
        let p = ProjectDir::new();
        p.add_testcase("a", "1\n", "hello\n");
        let exec = exec_result(&p, Some("hello\n"));

        let r = compare(&p, r#"DiffCommand = "no-such-diff-tool-xyz {answer} {output}""#, &exec).await;
        assert_eq!(r.judge, JudgeCode::TE);
        assert!(r.note.is_some());
    }

    #[tokio::test]
    async fn timeout_short_circuits() {
        let p = ProjectDir::new();
        p.add_testcase("a", "1\n", "hello\n");
        let mut exec = exec_result(&p, Some("hello\n"));
        exec.timed_out = true;
        exec.exit_code = None;

        // a diff command that would fail loudly if it were run
        let r = compare(&p, r#"DiffCommand = "exit 127 {answer} {output}""#, &exec).await;
        assert_eq!(r.judge, JudgeCode::TLE);
        assert_eq!(r.score, 0);
    }

    #[tokio::test]
    async fn runtime_error_and_missing_files() {
        let p = ProjectDir::new();
        p.add_testcase("a", "1\n", "hello\n");

        let mut exec = exec_result(&p, Some("hello\n"));
        exec.exit_code = Some(139);
        assert_eq!(compare(&p, "", &exec).await.judge, JudgeCode::RE);

        let exec = exec_result(&p, None);
        assert_eq!(compare(&p, "", &exec).await.judge, JudgeCode::MO);

        fsutil::remove_file(p.path().join("tests/answer/a.txt")).unwrap();
        let exec = exec_result(&p, Some("hello\n"));
        assert_eq!(compare(&p, "", &exec).await.judge, JudgeCode::MA);
    }
}
