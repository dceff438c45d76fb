use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use indicatif::{ProgressBar, ProgressStyle};
use judge_core::{
    action::{self, JudgeOptions},
    config::Config,
    style,
    testing::ComparisonResult,
};

use crate::{report, util};

/// Build a program, run it against local inputs, compare with answers and print a score.
#[derive(Debug, clap::Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file. Searched from the current dir upwards when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 0: hide diff output, 1: show diff output of failed testcases
    #[arg(short, long, default_value_t = 0)]
    pub verbose: u8,

    /// Judge only this input file (implies `-v 1`)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Save outputs into this dir as answer files, without judging
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Number of testcases run concurrently. Overrides `Jobs` in the config.
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Skip `BuildCommand`
    #[arg(long)]
    pub no_build: bool,

    /// Fail when an answer file is missing
    #[arg(long)]
    pub strict: bool,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON report to this file
    #[arg(long)]
    pub report_file: Option<PathBuf>,

    /// Print an example config file and exit
    #[arg(long)]
    pub example_config: bool,
}

pub type CmdResult = anyhow::Result<()>;

impl Args {
    pub async fn exec(&self) -> CmdResult {
        if self.example_config {
            print!("{}", Config::example_toml());
            return Ok(());
        }

        let cfg = self.load_config()?;
        let opts = self.judge_options();

        if let Some(dir) = &self.output_dir {
            let dir = util::from_current_dir(dir);
            let written = action::export_outputs(&cfg, &opts, &dir)
                .await
                .context("Failed to export outputs")?;
            log::info!("Saved {} outputs to {}", written.len(), dir.display());
            return Ok(());
        }

        let bar = self.progress_bar();
        let report = action::judge(&cfg, &opts, |r: &ComparisonResult| {
            bar.inc(1);
            bar.set_message(format!("{} {}", r.testcase.id(), style::judge_icon(r.judge)));
        })
        .await;
        bar.finish_and_clear();
        let report = report.context("Failed to judge")?;

        if let Some(path) = &self.report_file {
            let path = util::from_current_dir(path);
            fsutil::write_json_with_mkdir(&path, &report)?;
            log::info!("Wrote report to {}", path.display());
        }

        if self.json {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        } else {
            report::print_report(&report, self.verbose_level());
        }
        Ok(())
    }

    fn load_config(&self) -> anyhow::Result<Config> {
        match &self.config {
            Some(path) => Config::from_toml_file(util::from_current_dir(path))
                .with_context(|| format!("Failed to load config '{}'", path.display())),
            None => Config::from_file_finding_in_ancestors(util::current_dir())
                .context("Failed to load config"),
        }
    }

    fn judge_options(&self) -> JudgeOptions {
        JudgeOptions {
            only_input: self.input.as_ref().map(util::from_current_dir),
            strict_answers: self.strict,
            skip_build: self.no_build,
            jobs: self.jobs,
        }
    }

    fn verbose_level(&self) -> u8 {
        if self.input.is_some() {
            self.verbose.max(1)
        } else {
            self.verbose
        }
    }

    fn progress_bar(&self) -> ProgressBar {
        if self.json {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} [{pos}] {msg}") {
            bar.set_style(style);
        }
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }
}
