use std::{os::unix::fs::PermissionsExt, path::Path};

use judge_core::{
    action::{self, JudgeError, JudgeOptions},
    config::Config,
    testing::{BuildError, JudgeCode, JudgeReport},
};
use tempfile::TempDir;

const BASE_CONFIG: &[&str] = &[
    r#"BuildCommand = "cp hw.src hw && chmod +x hw""#,
    r#"Executable = "hw""#,
    r#"RunCommand = "{executable} < {input} > {output}""#,
    r#"Inputs = "tests/input/*.txt""#,
    r#"TempOutputDir = "tmp/output""#,
    r#"DiffCommand = "diff -u {answer} {output}""#,
    r#"DeleteTempOutput = true"#,
    r#"AnswerDir = "tests/answer""#,
    r#"AnswerExtension = "txt""#,
    r#"ExitOrLog = "exit""#,
    r#"TotalScore = 100"#,
    r#"Timeout = 3"#,
];

fn key_of(line: &str) -> &str {
    line.split('=').next().unwrap_or_default().trim()
}

/// A small project whose "build" produces `hw` from `hw.src`.
/// Lines of `conf_extra` replace base settings with the same key.
fn setup(conf_extra: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let overridden: Vec<&str> = conf_extra.lines().map(key_of).collect();
    let mut conf = String::from("[Config]\n");
    for line in BASE_CONFIG.iter().filter(|l| !overridden.contains(&key_of(l))) {
        conf.push_str(line);
        conf.push('\n');
    }
    conf.push_str(conf_extra);
    conf.push('\n');

    fsutil::write(root.join(Config::FILENAME), conf).unwrap();
    fsutil::write(
        root.join("hw.src"),
        "#!/bin/sh\nread a b\necho $((a + b))\n",
    )
    .unwrap();

    for (id, input, answer) in [
        ("1", "1 2\n", "3\n"),
        ("2", "10 20\n", "30\n"),
        ("3", "0 0\n", "0\n"),
        ("4_hide", "5 5\n", "10\n"),
    ] {
        fsutil::write_with_mkdir(root.join(format!("tests/input/{}.txt", id)), input).unwrap();
        fsutil::write_with_mkdir(root.join(format!("tests/answer/{}.txt", id)), answer).unwrap();
    }
    dir
}

fn load(root: &Path) -> Config {
    Config::from_file_finding_in_ancestors(root.join("tests/input")).unwrap()
}

async fn judge(cfg: &Config) -> Result<JudgeReport, JudgeError> {
    action::judge(cfg, &JudgeOptions::default(), |_| {}).await
}

#[tokio::test]
async fn all_accepted() {
    let dir = setup("");
    let cfg = load(dir.path());

    let report = judge(&cfg).await.unwrap();
    assert!(report.all_passed());
    assert_eq!(report.results().len(), 4);
    assert_eq!(report.num_passed(), 3);
    assert_eq!(report.num_scored(), 3);
    assert_eq!(report.total_score(), 100);
    assert!(dir.path().join("hw").is_file());
}

#[tokio::test]
async fn hidden_failure_does_not_cost_points() {
    let dir = setup("");
    fsutil::write(dir.path().join("tests/answer/4_hide.txt"), "11\n").unwrap();
    let cfg = load(dir.path());

    let report = judge(&cfg).await.unwrap();
    let hidden = &report.results()[3];
    assert_eq!(hidden.testcase.id(), "4_hide");
    assert_eq!(hidden.judge, JudgeCode::WA);
    assert!(hidden.diff_text.contains("+10"));
    assert_eq!(report.total_score(), 100);
    assert!(!report.all_passed());
}

#[tokio::test]
async fn score_dict_by_pass_count() {
    let dir = setup(r#"ScoreDict = { "0" = 0, "1" = 30, "2" = 60, "3" = 90 }"#);
    fsutil::write(dir.path().join("tests/answer/2.txt"), "31\n").unwrap();
    let cfg = load(dir.path());

    let report = judge(&cfg).await.unwrap();
    assert_eq!(report.score_label(), Some("2"));
    assert_eq!(report.total_score(), 60);
    assert_eq!(report.max_score(), 90);
    let scores: Vec<i64> = report.results().iter().map(|r| r.score).collect();
    assert_eq!(scores, [30, 0, 30, 0]);
}

#[tokio::test]
async fn log_mode_with_text_compare() {
    let dir = setup(
        "ExitOrLog = \"log\"\nDiffCommand = \"diff {answer} {output} >/dev/null || echo mismatch\"",
    );
    fsutil::write(dir.path().join("tests/answer/3.txt"), "1\n").unwrap();
    let cfg = load(dir.path());

    let report = judge(&cfg).await.unwrap();
    let judges: Vec<JudgeCode> = report.results().iter().map(|r| r.judge).collect();
    assert_eq!(judges, [JudgeCode::AC, JudgeCode::AC, JudgeCode::WA, JudgeCode::AC]);
    assert_eq!(report.results()[2].diff_text, "mismatch\n");
    assert_eq!(report.total_score(), 67);
}

#[tokio::test]
async fn runtime_error_is_recorded() {
    let dir = setup("");
    fsutil::write(dir.path().join("hw.src"), "#!/bin/sh\necho partial\nexit 3\n").unwrap();
    let cfg = load(dir.path());

    let report = judge(&cfg).await.unwrap();
    assert!(report.results().iter().all(|r| r.judge == JudgeCode::RE));
    assert_eq!(report.results()[0].exit_code, Some(3));
    assert_eq!(report.total_score(), 0);
}

#[tokio::test]
async fn broken_build_aborts() {
    let dir = setup(r#"BuildCommand = "echo 'hw.src:1: error' >&2 && false""#);
    let cfg = load(dir.path());

    let err = judge(&cfg).await.unwrap_err();
    match err {
        JudgeError::Build(BuildError::Failed { output, .. }) => {
            assert!(output.contains("hw.src:1: error"))
        }
        e => panic!("unexpected error: {:?}", e),
    }
    assert!(!dir.path().join("tmp/output").exists());
}

#[tokio::test]
async fn answer_permissions_are_copied_to_output() {
    let dir = setup("DeleteTempOutput = false");
    let answer = dir.path().join("tests/answer/1.txt");
    std::fs::set_permissions(&answer, std::fs::Permissions::from_mode(0o600)).unwrap();
    let cfg = load(dir.path());
    let opts = JudgeOptions {
        only_input: Some("tests/input/1.txt".into()),
        ..Default::default()
    };

    let report = action::judge(&cfg, &opts, |_| {}).await.unwrap();
    assert!(report.all_passed());

    let outputs = fsutil::glob_files(dir.path(), "tmp/output/1_*.out").unwrap();
    assert_eq!(outputs.len(), 1);
    let mode = std::fs::metadata(&outputs[0]).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
