// Score history of a pipeline
// Author: Gabriel Demetrios Lafis

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;

use super::PipelineError;
use crate::comm::CommError;

/// Format of `date_time` in the score history
pub const SCORE_DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub const CLASSIFICATION_METRICS: [&str; 3] = ["accuracy", "auc", "cross_entropy"];
pub const REGRESSION_METRICS: [&str; 3] = ["mae", "rmse", "rsquared"];

/// Metrics of one scoring run for one target
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metrics {
    Classification { accuracy: f64, auc: f64, cross_entropy: f64 },
    Regression { mae: f64, rmse: f64, rsquared: f64 },
}

impl Metrics {
    /// Look a metric up by name; NaN when the problem type lacks it
    pub fn get(&self, metric: &str) -> f64 {
        match (self, metric) {
            (Metrics::Classification { accuracy, .. }, "accuracy") => *accuracy,
            (Metrics::Classification { auc, .. }, "auc") => *auc,
            (Metrics::Classification { cross_entropy, .. }, "cross_entropy") => *cross_entropy,
            (Metrics::Regression { mae, .. }, "mae") => *mae,
            (Metrics::Regression { rmse, .. }, "rmse") => *rmse,
            (Metrics::Regression { rsquared, .. }, "rsquared") => *rsquared,
            _ => f64::NAN,
        }
    }
}

/// One entry of the score history
#[derive(Debug, Clone, PartialEq)]
pub struct Score {
    pub date_time: NaiveDateTime,
    pub set_used: String,
    pub target: String,
    pub metrics: Metrics,
}

/// All scores a pipeline has produced, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct Scores {
    data: Vec<Score>,
    latest: BTreeMap<String, Vec<f64>>,
    is_classification: bool,
}

impl Scores {
    /// Build the history from the `scores` object of a pipeline refresh
    /// (keys already stripped of their trailing underscore)
    pub fn from_json(scores: &JsonValue, targets: &[String], is_classification: bool) -> Result<Self, PipelineError> {
        let history = match scores.get("history") {
            Some(JsonValue::Array(entries)) => entries.as_slice(),
            Some(_) => {
                return Err(CommError::Protocol("'history' of the scores is not a list".to_string()).into())
            }
            None => &[],
        };

        let mut data = Vec::with_capacity(history.len() * targets.len());

        for entry in history {
            let date_time = entry.get("date_time").and_then(JsonValue::as_str).unwrap_or_default();

            let date_time = NaiveDateTime::parse_from_str(date_time, SCORE_DATE_TIME_FORMAT).map_err(|e| {
                CommError::Protocol(format!("Could not parse score date '{}': {}", date_time, e))
            })?;

            let set_used = entry
                .get("set_used")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string();

            for (target_num, target) in targets.iter().enumerate() {
                let value = |metric: &str| metric_value(entry, metric, target_num);

                let metrics = if is_classification {
                    Metrics::Classification {
                        accuracy: value("accuracy"),
                        auc: value("auc"),
                        cross_entropy: value("cross_entropy"),
                    }
                } else {
                    Metrics::Regression {
                        mae: value("mae"),
                        rmse: value("rmse"),
                        rsquared: value("rsquared"),
                    }
                };

                data.push(Score {
                    date_time,
                    set_used: set_used.clone(),
                    target: target.clone(),
                    metrics,
                });
            }
        }

        // Only a scored pipeline carries metrics next to its history
        let scored = scores.as_object().map(|obj| obj.len() > 1).unwrap_or(false);
        let metrics = if is_classification {
            CLASSIFICATION_METRICS
        } else {
            REGRESSION_METRICS
        };

        let mut latest = BTreeMap::new();

        for metric in CLASSIFICATION_METRICS.iter().chain(REGRESSION_METRICS.iter()) {
            let values = if scored && metrics.contains(metric) {
                (0..targets.len())
                    .map(|target_num| metric_value(scores, metric, target_num))
                    .collect()
            } else {
                vec![f64::NAN; targets.len()]
            };
            latest.insert(metric.to_string(), values);
        }

        Ok(Scores {
            data,
            latest,
            is_classification,
        })
    }

    pub fn is_classification(&self) -> bool {
        self.is_classification
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Score> {
        self.data.iter()
    }

    /// The most recent entry
    pub fn last(&self) -> Option<&Score> {
        self.data.last()
    }

    /// Keep the scores matching `predicate`
    pub fn filter<F: Fn(&Score) -> bool>(&self, predicate: F) -> Scores {
        Scores {
            data: self.data.iter().filter(|score| predicate(score)).cloned().collect(),
            latest: self.latest.clone(),
            is_classification: self.is_classification,
        }
    }

    /// Sort by a metric, best first: ascending for the error metrics
    /// (`mae`, `rmse`, `cross_entropy`), descending for the others
    pub fn sort_by_metric(&self, metric: &str) -> Scores {
        let ascending = matches!(metric, "mae" | "rmse" | "cross_entropy");

        let mut data = self.data.clone();
        data.sort_by(|a, b| {
            let ordering = a.metrics.get(metric).total_cmp(&b.metrics.get(metric));
            if ascending {
                ordering
            } else {
                ordering.reverse()
            }
        });

        Scores {
            data,
            latest: self.latest.clone(),
            is_classification: self.is_classification,
        }
    }

    /// Values of the latest scoring run, one per target
    pub fn latest(&self, metric: &str) -> Vec<f64> {
        self.latest.get(metric).cloned().unwrap_or_default()
    }

    pub fn accuracy(&self) -> Vec<f64> {
        self.latest("accuracy")
    }

    pub fn auc(&self) -> Vec<f64> {
        self.latest("auc")
    }

    pub fn cross_entropy(&self) -> Vec<f64> {
        self.latest("cross_entropy")
    }

    pub fn mae(&self) -> Vec<f64> {
        self.latest("mae")
    }

    pub fn rmse(&self) -> Vec<f64> {
        self.latest("rmse")
    }

    pub fn rsquared(&self) -> Vec<f64> {
        self.latest("rsquared")
    }
}

impl<'a> IntoIterator for &'a Scores {
    type Item = &'a Score;
    type IntoIter = std::slice::Iter<'a, Score>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.iter()
    }
}

/// The engine marks missing values with -1
fn metric_value(obj: &JsonValue, metric: &str, target_num: usize) -> f64 {
    match obj.get(metric).and_then(|values| values.get(target_num)).and_then(JsonValue::as_f64) {
        Some(value) if value != -1.0 => value,
        _ => f64::NAN,
    }
}
