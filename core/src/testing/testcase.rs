use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use serde::Serialize;

use crate::config::Config;

/// One (input, expected-answer) pair, identified by the input file stem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct TestCase {
    id: String,
    input_path: PathBuf,
    answer_path: PathBuf,
}

impl TestCase {
    /// Testcases whose id ends with this suffix are run and reported but not scored.
    pub const HIDDEN_SUFFIX: &str = "hide";

    pub fn new(
        id: impl Into<String>,
        input: impl Into<PathBuf>,
        answer: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            input_path: input.into(),
            answer_path: answer.into(),
        }
    }

    /// Returns `None` when `input` has no file stem.
    pub fn from_input_path(
        input: impl Into<PathBuf>,
        answer_dir: &Path,
        answer_ext: &str,
    ) -> Option<Self> {
        let input = input.into();
        let id = input.file_stem()?.to_string_lossy().into_owned();
        let answer = Self::answer_path_for(answer_dir, &id, answer_ext);
        Some(Self::new(id, input, answer))
    }

    pub fn answer_path_for(answer_dir: &Path, id: &str, answer_ext: &str) -> PathBuf {
        answer_dir.join(format!("{}{}", id, answer_ext))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn answer_path(&self) -> &Path {
        &self.answer_path
    }

    pub fn is_hidden(&self) -> bool {
        self.id.ends_with(Self::HIDDEN_SUFFIX)
    }

    pub fn has_answer(&self) -> bool {
        self.answer_path.is_file()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("Failed to expand inputs: {0}")]
    Glob(#[from] fsutil::Error),

    #[error("No input file matched '{0}'")]
    NoInputs(String),

    #[error("Input file not found: '{0}'")]
    InputNotFound(PathBuf),

    #[error("Cannot derive testcase id from '{0}'")]
    NoFileStem(PathBuf),

    #[error("Duplicate testcase id '{id}' ('{}' and '{}')", .first.display(), .second.display())]
    DuplicateId {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("No answer for testcase '{id}': '{}' does not exist", .path.display())]
    MissingAnswer { id: String, path: PathBuf },
}

/// Expands the configured inputs into an ordered, id-unique set of testcases.
#[derive(Debug, Clone)]
pub struct TestCaseResolver<'c> {
    cfg: &'c Config,
    strict_answers: bool,
    only_input: Option<PathBuf>,
}

impl<'c> TestCaseResolver<'c> {
    pub fn new(cfg: &'c Config) -> Self {
        Self {
            cfg,
            strict_answers: false,
            only_input: None,
        }
    }

    /// Fail on a missing answer file instead of recording the testcase as `MA`.
    pub fn strict_answers(mut self, strict: bool) -> Self {
        self.strict_answers = strict;
        self
    }

    /// Resolve exactly this input file instead of expanding `Inputs`.
    pub fn only_input(mut self, input: Option<PathBuf>) -> Self {
        self.only_input = input;
        self
    }

    pub fn resolve(&self) -> Result<Vec<TestCase>, ResolveError> {
        let inputs = match &self.only_input {
            Some(path) => {
                let path = self.cfg.resolve_path(path);
                if !path.is_file() {
                    return Err(ResolveError::InputNotFound(path));
                }
                vec![path]
            }
            None => fsutil::glob_files(&self.cfg.project_root, self.cfg.inputs.as_str())?,
        };
        if inputs.is_empty() {
            return Err(ResolveError::NoInputs(self.cfg.inputs.as_str().to_owned()));
        }

        let answer_dir = self.cfg.answer_dir();
        let mut seen: HashMap<String, PathBuf> = HashMap::with_capacity(inputs.len());
        let mut testcases = Vec::with_capacity(inputs.len());

        for input in inputs {
            let t = TestCase::from_input_path(&input, &answer_dir, &self.cfg.answer_extension)
                .ok_or_else(|| ResolveError::NoFileStem(input.clone()))?;

            if let Some(first) = seen.insert(t.id.clone(), input.clone()) {
                return Err(ResolveError::DuplicateId {
                    id: t.id,
                    first,
                    second: input,
                });
            }

            if !t.has_answer() {
                if self.strict_answers {
                    return Err(ResolveError::MissingAnswer {
                        id: t.id,
                        path: t.answer_path,
                    });
                }
                log::warn!(
                    "No answer for testcase '{}' (expected '{}')",
                    t.id,
                    t.answer_path.display()
                );
            }
            testcases.push(t);
        }

        log::debug!("Resolved {} testcases", testcases.len());
        Ok(testcases)
    }
}
