use std::fmt::Write as _;

use colored::Colorize as _;
use crossterm::terminal;
use judge_core::{
    style,
    testing::{ComparisonResult, JudgeReport},
};

const MIN_COLS: usize = 20;

pub fn print_report(report: &JudgeReport, verbose: u8) {
    let (cols, _) = terminal::size().unwrap_or((80, 40));
    print!("{}", render(report, verbose, cols as usize));
}

/// A rule like `=====+==========` with the `+` under the column separator.
fn rule(ch: char, name_width: usize, cols: usize) -> String {
    let cols = cols.max(name_width + 2).max(MIN_COLS);
    (0..cols)
        .map(|i| if i == name_width + 1 { '+' } else { ch })
        .collect()
}

fn detail(r: &ComparisonResult) -> String {
    let mut s = String::new();
    if let Some(t) = r.execution_time {
        let _ = write!(s, " [{}ms]", t.as_millis());
    }
    if let Some(note) = &r.note {
        let _ = write!(s, " {}", note.lines().next().unwrap_or_default().dimmed());
    }
    s
}

pub fn render(report: &JudgeReport, verbose: u8, cols: usize) -> String {
    let mut out = String::new();
    let results = report.results();

    let name_width = results
        .iter()
        .map(|r| r.testcase.id().len())
        .chain(["Sample".len()])
        .max()
        .unwrap_or_default();
    let double = rule('=', name_width, cols);
    let single = rule('-', name_width, cols);

    let _ = writeln!(out, "{}", double);
    let _ = writeln!(out, "{:>w$} | {}", "Sample", "Accept", w = name_width);
    for r in results {
        let _ = writeln!(out, "{}", double);
        let mark = if r.passed() {
            "✔".green()
        } else {
            "✘".red()
        };
        let _ = writeln!(
            out,
            "{:>w$} | {} {}{}",
            r.testcase.id(),
            mark,
            style::judge_icon(r.judge),
            detail(r),
            w = name_width
        );

        if !r.passed() && verbose >= 1 {
            let _ = writeln!(out, "{}", single);
            if let Some(note) = &r.note {
                let _ = writeln!(out, "{}", note.trim_end());
            }
            if !r.diff_text.is_empty() {
                let _ = writeln!(out, "{}", r.diff_text.trim_end());
            }
            if !r.stderr.is_empty() {
                let _ = writeln!(out, "{}\n{}", "[stderr]".cyan().bold(), r.stderr.trim_end());
            }
        }
    }
    let _ = writeln!(out, "{}", double);

    let _ = writeln!(
        out,
        "Correct/Total problems:\t{}/{}",
        report.num_passed(),
        report.num_scored()
    );
    let _ = writeln!(
        out,
        "Obtained/Total scores:\t{}/{}",
        report.total_score(),
        report.max_score()
    );

    if report.total_score() < report.max_score() && verbose < 1 {
        let _ = writeln!(out, "\n[INFO] set `-v 1` to get diff result.");
        let _ = writeln!(out, "For example: `judge -v 1`");
    }
    out
}
