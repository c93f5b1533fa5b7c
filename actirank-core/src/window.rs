//! Fixed-length window segmentation and per-window label reduction.
//!
//! Windows are contiguous row slices of a [`SampleMatrix`]. The stride is
//! chosen by the caller: detection slices without overlap, training uses a
//! half-window stride.

use crate::labels::ActivityCode;
use crate::recording::SampleMatrix;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("window: window size must be positive")]
    ZeroWindowSize,
    #[error("window: step must be positive")]
    ZeroStep,
    #[error("window: window ends at row {end} but only {labels} labels were given")]
    MisalignedLabels { end: usize, labels: usize },
}

/// Which start offsets are admitted at the end of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryRule {
    /// `start < rows - window_size`. The window ending exactly on the last
    /// row is never produced, so `rows <= window_size` yields nothing.
    #[default]
    Exclusive,
    /// `start + window_size <= rows`.
    Inclusive,
}

/// Segmentation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub size: usize,
    pub step: usize,
    pub boundary: BoundaryRule,
}

impl WindowSpec {
    pub fn new(size: usize, step: usize, boundary: BoundaryRule) -> Result<Self, WindowError> {
        if size == 0 {
            return Err(WindowError::ZeroWindowSize);
        }
        if step == 0 {
            return Err(WindowError::ZeroStep);
        }
        Ok(Self {
            size,
            step,
            boundary,
        })
    }

    /// Start offsets admitted for a recording of `rows` samples.
    pub fn starts(&self, rows: usize) -> impl Iterator<Item = usize> {
        let end = match self.boundary {
            // Exclusive upper bound on the start offset.
            BoundaryRule::Exclusive => rows.saturating_sub(self.size),
            BoundaryRule::Inclusive => {
                if rows >= self.size {
                    rows - self.size + 1
                } else {
                    0
                }
            }
        };
        (0..end).step_by(self.step)
    }

    pub fn count(&self, rows: usize) -> usize {
        self.starts(rows).count()
    }
}

/// A contiguous run of exactly `len` rows.
#[derive(Debug, Clone, Copy)]
pub struct Window<'a> {
    start: usize,
    len: usize,
    channels: usize,
    data: &'a [f64],
}

impl<'a> Window<'a> {
    pub fn start(&self) -> usize {
        self.start
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Row range `[start, start + len)` in the source recording.
    pub fn range(&self) -> std::ops::Range<usize> {
        self.start..self.start + self.len
    }

    pub fn row(&self, index: usize) -> &'a [f64] {
        &self.data[index * self.channels..(index + 1) * self.channels]
    }

    /// Values of one channel, in row order.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = f64> + 'a {
        self.data
            .iter()
            .skip(channel)
            .step_by(self.channels)
            .copied()
    }
}

/// Slice `matrix` into windows according to `spec`.
pub fn segment<'a>(matrix: &'a SampleMatrix, spec: &WindowSpec) -> Vec<Window<'a>> {
    spec.starts(matrix.rows())
        .map(|start| Window {
            start,
            len: spec.size,
            channels: matrix.columns(),
            data: matrix.row_span(start, spec.size),
        })
        .collect()
}

/// Most frequent label in `labels`; ties go to the smallest code.
///
/// Returns `None` for an empty slice.
pub fn reduce_labels(labels: &[ActivityCode]) -> Option<ActivityCode> {
    let mut counts: BTreeMap<ActivityCode, usize> = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    // BTreeMap iterates ascending, so a strict comparison keeps the smallest.
    let mut best: Option<(ActivityCode, usize)> = None;
    for (label, count) in counts {
        match best {
            Some((_, top)) if count <= top => {}
            _ => best = Some((label, count)),
        }
    }
    best.map(|(label, _)| label)
}

/// Reduce the labels aligned with each window, one label per window.
///
/// `labels` must hold one entry per row of the segmented recording.
pub fn reduce_window_labels(
    windows: &[Window<'_>],
    labels: &[ActivityCode],
) -> Result<Vec<ActivityCode>, WindowError> {
    windows
        .iter()
        .map(|w| {
            labels
                .get(w.range())
                .and_then(reduce_labels)
                .ok_or(WindowError::MisalignedLabels {
                    end: w.range().end,
                    labels: labels.len(),
                })
        })
        .collect()
}
