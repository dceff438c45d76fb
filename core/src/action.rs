use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use futures::{stream, StreamExt as _};

use crate::config::Config;
use crate::testing::{
    BuildError, Builder, Comparator, ComparisonResult, Executor, JudgeCode, JudgeReport,
    ResolveError, ScoreAggregator, ScoreError, ScorePolicy, TestCase, TestCaseResolver,
};

#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Score(#[from] ScoreError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Fs(#[from] fsutil::Error),
}

/// Per-invocation switches layered on top of [`Config`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JudgeOptions {
    /// Judge only this input file instead of everything `Inputs` matches.
    pub only_input: Option<PathBuf>,
    /// Abort on a missing answer file instead of recording `MA`.
    pub strict_answers: bool,
    pub skip_build: bool,
    /// Overrides `Jobs` from the config.
    pub jobs: Option<usize>,
}

impl JudgeOptions {
    fn jobs(&self, cfg: &Config) -> usize {
        self.jobs
            .and_then(NonZeroUsize::new)
            .unwrap_or(cfg.jobs)
            .get()
    }
}

fn resolve_testcases(cfg: &Config, opts: &JudgeOptions) -> Result<Vec<TestCase>, ResolveError> {
    TestCaseResolver::new(cfg)
        .strict_answers(opts.strict_answers)
        .only_input(opts.only_input.clone())
        .resolve()
}

fn remove_temp_output(path: &Path) {
    if let Err(e) = fsutil::remove_file_if_exists(path) {
        log::warn!("{}", e);
    }
}

async fn judge_one(
    cfg: &Config,
    executor: &Executor<'_>,
    comparator: &Comparator<'_>,
    t: TestCase,
) -> ComparisonResult {
    if !t.has_answer() {
        let note = format!("no answer at '{}'", t.answer_path().display());
        return ComparisonResult::new(t, JudgeCode::MA).with_note(note);
    }

    let res = match executor.run(&t).await {
        Ok(exec) => {
            let res = comparator.compare(&t, &exec).await;
            if cfg.delete_temp_output {
                remove_temp_output(&exec.output_path);
            }
            res
        }
        Err(e) => {
            log::warn!("[{}] {}", t.id(), e);
            if cfg.delete_temp_output {
                remove_temp_output(&executor.output_path_for(&t));
            }
            ComparisonResult::new(t, JudgeCode::RE).with_note(e.to_string())
        }
    };
    log::debug!("[{}] {}", res.testcase.id(), res.judge);
    res
}

/// Build once, run every testcase, compare, and aggregate scores.
///
/// `on_result` is called once per finished testcase, in resolver order.
pub async fn judge(
    cfg: &Config,
    opts: &JudgeOptions,
    mut on_result: impl FnMut(&ComparisonResult),
) -> Result<JudgeReport, JudgeError> {
    let testcases = resolve_testcases(cfg, opts)?;
    let policy = ScorePolicy::new(cfg.score_dict.as_ref(), cfg.total_score, &testcases)?;

    Builder::new(cfg).skip(opts.skip_build).build().await?;

    fsutil::mkdir_all(cfg.temp_output_dir())?;

    let jobs = opts.jobs(cfg);
    let executor = Executor::new(cfg);
    let comparator = Comparator::new(cfg);
    log::info!(
        "Running {} testcases (jobs={}, run={})",
        testcases.len(),
        jobs,
        executor.token().as_str()
    );

    let mut results = Vec::with_capacity(testcases.len());
    let mut stream = stream::iter(testcases)
        .map(|t| judge_one(cfg, &executor, &comparator, t))
        .buffered(jobs);

    while let Some(res) = stream.next().await {
        on_result(&res);
        results.push(res);
    }

    Ok(ScoreAggregator::new(policy).aggregate(results))
}

/// Build and run every input, then copy each output to `{out_dir}/{id}{AnswerExtension}`.
///
/// Nothing is judged. Returns the written paths in resolver order.
pub async fn export_outputs(
    cfg: &Config,
    opts: &JudgeOptions,
    out_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, JudgeError> {
    let opts = JudgeOptions {
        strict_answers: false,
        ..opts.clone()
    };
    let testcases = resolve_testcases(cfg, &opts)?;

    Builder::new(cfg).skip(opts.skip_build).build().await?;

    let out_dir = cfg.resolve_path(out_dir);
    fsutil::mkdir_all(cfg.temp_output_dir())?;
    fsutil::mkdir_all(&out_dir)?;

    let executor = Executor::new(cfg);
    let mut exported = Vec::with_capacity(testcases.len());

    for t in &testcases {
        let exec = match executor.run(t).await {
            Ok(exec) => exec,
            Err(e) => {
                log::warn!("[{}] {}", t.id(), e);
                continue;
            }
        };
        if exec.timed_out {
            log::warn!("[{}] timed out; partial output is not exported", t.id());
        } else if !exec.exited_normally() {
            log::warn!("[{}] exited with {:?}", t.id(), exec.exit_code);
        }

        if !exec.timed_out && exec.output_path.is_file() {
            let dest = TestCase::answer_path_for(&out_dir, t.id(), &cfg.answer_extension);
            fsutil::copy_file(&exec.output_path, &dest)?;
            log::info!("Exported {}", dest.display());
            exported.push(dest);
        }
        if cfg.delete_temp_output {
            remove_temp_output(&exec.output_path);
        }
    }

    Ok(exported)
}
