use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{result::*, testcase::TestCase};

/// Mapping from a result label to the points it is worth.
///
/// Deserializes from either a table (`{ "0" = 0, "1" = 30 }`) or a JSON string
/// (`'{"0": "0", "1": "30"}'`); values may be integers or numeric strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawScoreDict")]
pub struct ScoreDict(BTreeMap<String, i64>);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScoreDict {
    Json(String),
    Table(BTreeMap<String, ScoreValue>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScoreValue {
    Int(i64),
    Str(String),
}

impl TryFrom<RawScoreDict> for ScoreDict {
    type Error = String;

    fn try_from(raw: RawScoreDict) -> Result<Self, Self::Error> {
        let table = match raw {
            RawScoreDict::Table(t) => t,
            RawScoreDict::Json(s) => serde_json::from_str::<BTreeMap<String, ScoreValue>>(&s)
                .map_err(|e| format!("ScoreDict is not a JSON object of scores: {}", e))?,
        };
        table
            .into_iter()
            .map(|(label, v)| {
                let score = match v {
                    ScoreValue::Int(n) => n,
                    ScoreValue::Str(s) => s.trim().parse().map_err(|_| {
                        format!("Score for label '{}' is not an integer: '{}'", label, s)
                    })?,
                };
                Ok((label.trim().to_owned(), score))
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

impl<L: Into<String>> FromIterator<(L, i64)> for ScoreDict {
    fn from_iter<I: IntoIterator<Item = (L, i64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(l, s)| (l.into(), s)).collect())
    }
}

impl ScoreDict {
    pub fn get(&self, label: &str) -> Option<i64> {
        self.0.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.0.contains_key(label)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ScoreError {
    #[error("ScoreDict has no entry for label '{label}' ({num_scored} scored testcases)")]
    MissingLabel { label: String, num_scored: usize },

    #[error("ScoreDict does not cover {0} scored testcases and TotalScore is not set")]
    UncoveredTestCount(usize),

    #[error("Either ScoreDict or TotalScore must be set")]
    NoScoring,
}

/// How per-test and total scores are derived. Chosen once per run, before any execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScorePolicy {
    /// Run label is the number of passed scored testcases; total is `dict[label]`.
    Table { dict: ScoreDict, num_scored: usize },
    /// `total` split evenly; the remainder goes to the earliest scored testcases.
    Even { total: i64, num_scored: usize },
}

impl ScorePolicy {
    pub fn new(
        score_dict: Option<&ScoreDict>,
        total_score: Option<i64>,
        testcases: &[TestCase],
    ) -> Result<Self, ScoreError> {
        let num_scored = testcases.iter().filter(|t| !t.is_hidden()).count();

        if let Some(dict) = score_dict {
            if dict.contains(&num_scored.to_string()) {
                if let Some(label) =
                    (0..num_scored).map(|k| k.to_string()).find(|l| !dict.contains(l))
                {
                    return Err(ScoreError::MissingLabel { label, num_scored });
                }
                return Ok(Self::Table {
                    dict: dict.clone(),
                    num_scored,
                });
            }
            if total_score.is_none() {
                return Err(ScoreError::UncoveredTestCount(num_scored));
            }
            log::info!(
                "ScoreDict does not cover {} testcases; falling back to TotalScore",
                num_scored
            );
        }

        match total_score {
            Some(total) => Ok(Self::Even { total, num_scored }),
            None => Err(ScoreError::NoScoring),
        }
    }

    pub fn num_scored(&self) -> usize {
        match self {
            Self::Table { num_scored, .. } | Self::Even { num_scored, .. } => *num_scored,
        }
    }

    pub fn max_score(&self) -> i64 {
        match self {
            Self::Table { dict, num_scored } => dict.get(&num_scored.to_string()).unwrap_or(0),
            Self::Even { num_scored: 0, .. } => 0,
            Self::Even { total, .. } => *total,
        }
    }

    /// Points for the scored testcase at `index` (0-based, among scored ones) if it passes.
    pub fn even_share(total: i64, num_scored: usize, index: usize) -> i64 {
        if num_scored == 0 {
            return 0;
        }
        let n = num_scored as i64;
        let bonus = (index as i64) < total % n;
        total / n + bonus as i64
    }
}

#[derive(Debug, Clone)]
pub struct ScoreAggregator {
    policy: ScorePolicy,
}

impl ScoreAggregator {
    pub fn new(policy: ScorePolicy) -> Self {
        Self { policy }
    }

    /// Assign per-test scores and produce the final report.
    /// `results` must be in resolver order.
    pub fn aggregate(&self, mut results: Vec<ComparisonResult>) -> JudgeReport {
        let max_score = self.policy.max_score();
        let mut num_passed = 0usize;
        let mut scored_index = 0usize;

        for r in results.iter_mut() {
            if r.testcase.is_hidden() {
                r.score = 0;
                continue;
            }
            r.score = match &self.policy {
                _ if !r.passed() => 0,
                ScorePolicy::Even { total, num_scored } => {
                    ScorePolicy::even_share(*total, *num_scored, scored_index)
                }
                ScorePolicy::Table { dict, .. } => {
                    let cur = dict.get(&(num_passed + 1).to_string()).unwrap_or(0);
                    let prev = dict.get(&num_passed.to_string()).unwrap_or(0);
                    cur - prev
                }
            };
            if r.passed() {
                num_passed += 1;
            }
            scored_index += 1;
        }

        let (mut total_score, score_label) = match &self.policy {
            ScorePolicy::Table { dict, .. } => {
                let label = num_passed.to_string();
                (dict.get(&label).unwrap_or(0), Some(label))
            }
            ScorePolicy::Even { .. } => (results.iter().map(|r| r.score).sum(), None),
        };
        let min_score = max_score.min(0);
        if !(min_score..=max_score).contains(&total_score) {
            log::warn!(
                "Obtained score {} is out of [{}, {}]; clamped",
                total_score,
                min_score,
                max_score
            );
            total_score = total_score.clamp(min_score, max_score);
        }

        JudgeReport::new(
            results,
            total_score,
            max_score,
            score_label,
            num_passed,
            self.policy.num_scored(),
        )
    }
}
