//! Aggregation of per-window predictions into a ranked activity report.

use crate::labels::{ActivityCode, ActivityLabelMap};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("report: no predictions to aggregate")]
    NoPredictions,
}

/// Windows predicted with one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityCount {
    pub label: ActivityCode,
    pub count: usize,
    /// Position of this label's first appearance among distinct labels.
    pub first_seen: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankingEntry {
    pub activity: String,
    #[serde(skip)]
    pub label: ActivityCode,
    pub count: usize,
    pub percentage: f64,
}

/// Ranking entries, highest share first. Only [`aggregate`] builds one, so
/// it always holds at least one entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    total_windows: usize,
    top: RankingEntry,
    rest: Vec<RankingEntry>,
}

impl Ranking {
    pub fn total_windows(&self) -> usize {
        self.total_windows
    }

    pub fn top(&self) -> &RankingEntry {
        &self.top
    }

    pub fn entries(&self) -> impl Iterator<Item = &RankingEntry> {
        std::iter::once(&self.top).chain(&self.rest)
    }

    pub fn into_entries(self) -> Vec<RankingEntry> {
        let mut entries = Vec::with_capacity(self.rest.len() + 1);
        entries.push(self.top);
        entries.extend(self.rest);
        entries
    }
}

/// Round to `decimals` places through the correctly rounded decimal
/// form, so exact ties go to the even digit (`0.25` -> `0.2`).
pub fn round_to(value: f64, decimals: usize) -> f64 {
    format!("{value:.decimals$}").parse().unwrap_or(value)
}

/// Count labels, preserving the order in which each was first seen.
pub fn count_predictions(predictions: &[ActivityCode]) -> Vec<ActivityCount> {
    let mut counts: Vec<ActivityCount> = Vec::new();
    for &label in predictions {
        match counts.iter_mut().find(|c| c.label == label) {
            Some(entry) => entry.count += 1,
            None => {
                let first_seen = counts.len();
                counts.push(ActivityCount {
                    label,
                    count: 1,
                    first_seen,
                });
            }
        }
    }
    counts
}

pub fn aggregate(
    predictions: &[ActivityCode],
    labels: &ActivityLabelMap,
) -> Result<Ranking, AggregateError> {
    let total_windows = predictions.len();
    if total_windows == 0 {
        return Err(AggregateError::NoPredictions);
    }

    let mut counts: Vec<(ActivityCount, f64)> = count_predictions(predictions)
        .into_iter()
        .map(|c| {
            let pct = round_to(c.count as f64 / total_windows as f64 * 100.0, 1);
            (c, pct)
        })
        .collect();

    counts.sort_by(|(a, pa), (b, pb)| {
        pb.partial_cmp(pa)
            .unwrap_or(Ordering::Equal)
            .then(a.first_seen.cmp(&b.first_seen))
    });

    let mut entries = counts.into_iter().map(|(c, percentage)| RankingEntry {
        activity: labels.name_of(c.label).to_string(),
        label: c.label,
        count: c.count,
        percentage,
    });
    let top = entries.next().ok_or(AggregateError::NoPredictions)?;

    Ok(Ranking {
        total_windows,
        top,
        rest: entries.collect(),
    })
}

/// Sampling constants needed to express a recording in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub sampling_rate_hz: f64,
    pub window_size: usize,
}

fn serialize_2dp<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(round_to(*value, 2))
}

/// Outcome of one detection run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
    pub top_activity: String,
    pub confidence: f64,
    pub total_samples: usize,
    #[serde(rename = "total_duration", serialize_with = "serialize_2dp")]
    pub total_duration_seconds: f64,
    #[serde(rename = "window_duration", serialize_with = "serialize_2dp")]
    pub window_duration_seconds: f64,
    pub ranking: Vec<RankingEntry>,
}

impl DetectionReport {
    pub fn new(ranking: Ranking, total_samples: usize, timing: Timing) -> Self {
        let top = ranking.top();
        Self {
            top_activity: top.activity.clone(),
            confidence: top.percentage,
            total_samples,
            total_duration_seconds: total_samples as f64 / timing.sampling_rate_hz,
            window_duration_seconds: timing.window_size as f64 / timing.sampling_rate_hz,
            ranking: ranking.into_entries(),
        }
    }

    pub fn total_windows(&self) -> usize {
        self.ranking.iter().map(|e| e.count).sum()
    }
}
