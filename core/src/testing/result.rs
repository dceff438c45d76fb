use std::time::Duration;

use serde::Serialize;

use super::{executor::ExecutionResult, testcase::TestCase};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumString,
)]
pub enum JudgeCode {
    /// Output matched the answer.
    AC,
    /// Output differed from the answer.
    WA,
    /// Execution exceeded the time limit; the process group was killed.
    TLE,
    /// Program exited non-zero, was killed by a signal, or could not be spawned.
    RE,
    /// No answer file for this testcase.
    MA,
    /// Program produced no output file.
    MO,
    /// The compare command itself could not run.
    TE,
}

impl JudgeCode {
    pub fn is_accepted(self) -> bool {
        self == JudgeCode::AC
    }

    /// Binary result label: "1" when passed, "0" otherwise.
    pub fn label(self) -> &'static str {
        if self.is_accepted() {
            "1"
        } else {
            "0"
        }
    }

    pub fn description(self) -> &'static str {
        use JudgeCode::*;
        match self {
            AC => "accepted",
            WA => "wrong answer",
            TLE => "time limit exceeded",
            RE => "runtime error",
            MA => "missing answer file",
            MO => "missing output file",
            TE => "compare tool error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    pub testcase: TestCase,
    pub judge: JudgeCode,
    pub label: &'static str,
    pub diff_text: String,
    /// Why a testcase failed for a reason other than a content mismatch.
    pub note: Option<String>,
    pub exit_code: Option<i32>,
    pub execution_time: Option<Duration>,
    pub stderr: String,
    pub score: i64,
}

impl ComparisonResult {
    pub fn new(testcase: TestCase, judge: JudgeCode) -> Self {
        Self {
            testcase,
            judge,
            label: judge.label(),
            diff_text: String::new(),
            note: None,
            exit_code: None,
            execution_time: None,
            stderr: String::new(),
            score: 0,
        }
    }

    pub fn with_diff(mut self, diff_text: impl Into<String>) -> Self {
        self.diff_text = diff_text.into();
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_execution(mut self, exec: &ExecutionResult) -> Self {
        self.exit_code = exec.exit_code;
        self.execution_time = Some(exec.wall_duration);
        self.stderr = exec.stderr.clone();
        self
    }

    pub fn passed(&self) -> bool {
        self.judge.is_accepted()
    }
}

/// Final outcome of a run. Results are in resolver order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JudgeReport {
    results: Vec<ComparisonResult>,
    total_score: i64,
    max_score: i64,
    score_label: Option<String>,
    num_passed: usize,
    num_scored: usize,
}

impl JudgeReport {
    pub(crate) fn new(
        results: Vec<ComparisonResult>,
        total_score: i64,
        max_score: i64,
        score_label: Option<String>,
        num_passed: usize,
        num_scored: usize,
    ) -> Self {
        Self {
            results,
            total_score,
            max_score,
            score_label,
            num_passed,
            num_scored,
        }
    }

    pub fn results(&self) -> &[ComparisonResult] {
        &self.results
    }

    pub fn total_score(&self) -> i64 {
        self.total_score
    }

    pub fn max_score(&self) -> i64 {
        self.max_score
    }

    pub fn score_label(&self) -> Option<&str> {
        self.score_label.as_deref()
    }

    /// Number of passed testcases that count toward the score.
    pub fn num_passed(&self) -> usize {
        self.num_passed
    }

    pub fn num_scored(&self) -> usize {
        self.num_scored
    }

    pub fn all_passed(&self) -> bool {
        self.results.iter().all(ComparisonResult::passed)
    }
}
