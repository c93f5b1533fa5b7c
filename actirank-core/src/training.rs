//! Offline model training from labelled recordings.
//!
//! Training recordings carry the ground-truth activity code in their last
//! column. Rows labelled with the null activity are dropped, the remaining
//! sensor rows are windowed with the training stride, and each window takes
//! the most frequent label of its rows. The windows are shuffled, split into
//! fit and held-out parts, and a nearest-centroid model is fitted and scored.

use crate::classifier::{Classifier, ClassifierModel, ModelKind, NearestCentroid};
use crate::config::ActirankConfig;
use crate::features::{self, feature_len, FeatureVector};
use crate::labels::{ActivityCode, ActivityLabelMap, NULL_ACTIVITY};
use crate::recording::{RecordingError, SampleMatrix};
use crate::window::{self, WindowSpec};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Windowed examples ready for fitting.
#[derive(Debug, Clone, Default)]
pub struct TrainingSet {
    pub features: Vec<FeatureVector>,
    pub labels: Vec<ActivityCode>,
}

impl TrainingSet {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn extend(&mut self, other: TrainingSet) {
        self.features.extend(other.features);
        self.labels.extend(other.labels);
    }

    fn subset(&self, indices: &[usize]) -> TrainingSet {
        TrainingSet {
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Shuffle with `seed` and split off `test_fraction` of the examples
    /// (rounded up) as the held-out part. Returns `(fit, held_out)`.
    pub fn split(&self, test_fraction: f64, seed: u64) -> (TrainingSet, TrainingSet) {
        let mut indices: Vec<usize> = (0..self.len()).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);
        let n_test = ((self.len() as f64) * test_fraction).ceil() as usize;
        let n_test = n_test.min(self.len());
        let (test, fit) = indices.split_at(n_test);
        (self.subset(fit), self.subset(test))
    }
}

/// Window one labelled matrix (sensor columns plus trailing label column).
///
/// Returns `Ok(None)` when the recording has fewer than `channels` sensor
/// columns.
pub fn windows_from_labelled(
    matrix: &SampleMatrix,
    channels: usize,
    spec: &WindowSpec,
) -> Result<Option<TrainingSet>> {
    let (sensors, labels) = matrix.split_label_column()?;
    let sensors = match sensors.leading_columns(channels) {
        Ok(s) => s,
        Err(RecordingError::InsufficientColumns { .. }) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let keep: Vec<bool> = labels.iter().map(|&l| l != NULL_ACTIVITY).collect();
    let sensors = sensors.retain_rows(&keep);
    let labels: Vec<ActivityCode> = labels.into_iter().filter(|&l| l != NULL_ACTIVITY).collect();

    let windows = window::segment(&sensors, spec);
    let labels = window::reduce_window_labels(&windows, &labels)?;
    Ok(Some(TrainingSet {
        features: features::extract_all(&windows),
        labels,
    }))
}

/// Recordings in `dir` with the configured extension, sorted by name.
pub fn list_recordings(dir: &Path, config: &ActirankConfig) -> Result<Vec<PathBuf>> {
    let ext = config.training.extension.as_str();
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read training directory: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some(ext))
        .collect();
    files.sort();
    if let Some(max) = config.training.max_files {
        files.truncate(max);
    }
    Ok(files)
}

/// Load and window every usable recording in `dir`.
///
/// Unreadable or too-narrow recordings are skipped with a warning.
pub fn build_training_set(dir: &Path, config: &ActirankConfig) -> Result<(TrainingSet, usize)> {
    let spec = config.sampling.training_window()?;
    let files = list_recordings(dir, config)?;
    log::info!("{} recordings available for training", files.len());

    let mut set = TrainingSet::default();
    let mut used = 0;
    for path in &files {
        let matrix = match SampleMatrix::load(path) {
            Ok(m) => m,
            Err(e) => {
                log::warn!("Skipping {}: {e}", path.display());
                continue;
            }
        };
        match windows_from_labelled(&matrix, config.sampling.channels, &spec) {
            Ok(Some(part)) if !part.is_empty() => {
                log::debug!("{}: {} windows", path.display(), part.len());
                set.extend(part);
                used += 1;
            }
            Ok(Some(_)) => log::warn!("Skipping {}: no labelled windows", path.display()),
            Ok(None) => log::warn!(
                "Skipping {}: fewer than {} sensor columns",
                path.display(),
                config.sampling.channels
            ),
            Err(e) => log::warn!("Skipping {}: {e}", path.display()),
        }
    }
    Ok((set, used))
}

// =============================================================================
// Evaluation
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: ActivityCode,
    pub activity: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub support: usize,
}

impl ClassificationReport {
    /// Per-class precision/recall/F1 over every code seen in either input.
    /// Undefined ratios (zero denominators) are reported as 0.
    pub fn evaluate(truth: &[ActivityCode], predicted: &[ActivityCode]) -> Self {
        let names = ActivityLabelMap::standard();
        let codes: BTreeSet<ActivityCode> = truth.iter().chain(predicted).copied().collect();
        let pairs = || truth.iter().zip(predicted);

        let classes = codes
            .into_iter()
            .map(|code| {
                let tp = pairs().filter(|(t, p)| **t == code && **p == code).count();
                let predicted_n = pairs().filter(|(_, p)| **p == code).count();
                let support = pairs().filter(|(t, _)| **t == code).count();
                let precision = ratio(tp, predicted_n);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassMetrics {
                    label: code,
                    activity: names.name_of(code).to_string(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let total = truth.len().min(predicted.len());
        let correct = pairs().filter(|(t, p)| t == p).count();
        Self {
            classes,
            accuracy: ratio(correct, total),
            support: total,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>28} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for c in &self.classes {
            writeln!(
                f,
                "{:>28} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                format!("{} {}", c.label, c.activity),
                c.precision,
                c.recall,
                c.f1,
                c.support
            )?;
        }
        writeln!(f)?;
        write!(
            f,
            "{:>28} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.support
        )
    }
}

// =============================================================================
// Training
// =============================================================================

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: ClassifierModel,
    pub report: ClassificationReport,
    pub files_used: usize,
    pub total_windows: usize,
}

/// Fit a nearest-centroid model on `set` and score it on a held-out split.
pub fn fit_and_evaluate(
    set: &TrainingSet,
    config: &ActirankConfig,
) -> Result<(ClassifierModel, ClassificationReport)> {
    if set.len() < 2 {
        bail!("not enough labelled windows to train: {}", set.len());
    }
    let (fit, held_out) = set.split(config.training.test_fraction, config.training.seed);
    if fit.is_empty() {
        bail!("training split is empty");
    }
    log::info!(
        "Fitting on {} windows, evaluating on {}",
        fit.len(),
        held_out.len()
    );

    let centroids = NearestCentroid::fit(&fit.features, &fit.labels)?;
    let mut model = ClassifierModel::new(
        feature_len(config.sampling.channels),
        ModelKind::NearestCentroid(centroids),
    )?;
    model.trained_at = Some(Utc::now());
    model.training_windows = fit.len();

    let predicted = model.predict(&held_out.features)?;
    let report = ClassificationReport::evaluate(&held_out.labels, &predicted);
    Ok((model, report))
}

/// Train from every recording in `dir`.
pub fn train(dir: &Path, config: &ActirankConfig) -> Result<TrainingOutcome> {
    let (set, files_used) = build_training_set(dir, config)?;
    if set.is_empty() {
        bail!("no usable training data in {}", dir.display());
    }
    let (model, report) = fit_and_evaluate(&set, config)?;
    Ok(TrainingOutcome {
        model,
        report,
        files_used,
        total_windows: set.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::BoundaryRule;

    fn labelled_text(blocks: &[(f64, ActivityCode, usize)], sensors: usize) -> String {
        let mut lines = Vec::new();
        for &(value, label, rows) in blocks {
            for r in 0..rows {
                let jitter = (r % 4) as f64 * 0.25;
                let mut cells: Vec<String> =
                    (0..sensors).map(|_| (value + jitter).to_string()).collect();
                cells.push(label.to_string());
                lines.push(cells.join("\t"));
            }
        }
        lines.join("\n")
    }

    #[test]
    fn test_null_rows_dropped_and_labels_reduced() {
        let text = labelled_text(&[(1.0, 0, 100), (2.0, 4, 8), (5.0, 6, 8)], 3);
        let matrix = SampleMatrix::parse(&text).unwrap();
        let spec = WindowSpec::new(4, 2, BoundaryRule::Inclusive).unwrap();
        let set = windows_from_labelled(&matrix, 3, &spec).unwrap().unwrap();
        // 16 labelled rows -> starts 0,2,...,12
        assert_eq!(set.len(), 7);
        assert_eq!(set.labels, vec![4, 4, 4, 4, 6, 6, 6]);
        assert_eq!(set.features[0].len(), 6);
    }

    #[test]
    fn test_narrow_recording_skipped() {
        let text = labelled_text(&[(1.0, 1, 20)], 5);
        let matrix = SampleMatrix::parse(&text).unwrap();
        let spec = WindowSpec::new(4, 2, BoundaryRule::Exclusive).unwrap();
        assert!(windows_from_labelled(&matrix, 23, &spec).unwrap().is_none());
    }

    #[test]
    fn test_split_is_deterministic() {
        let set = TrainingSet {
            features: (0..10).map(|i| FeatureVector::new(vec![i as f64])).collect(),
            labels: (0..10).collect(),
        };
        let (fit_a, test_a) = set.split(0.2, 42);
        let (fit_b, test_b) = set.split(0.2, 42);
        assert_eq!(test_a.len(), 2);
        assert_eq!(fit_a.len(), 8);
        assert_eq!(test_a.labels, test_b.labels);
        assert_eq!(fit_a.labels, fit_b.labels);

        let mut all: Vec<_> = fit_a.labels.iter().chain(&test_a.labels).copied().collect();
        all.sort();
        assert_eq!(all, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_classification_report() {
        let truth = [1, 1, 2, 2];
        let predicted = [1, 2, 2, 2];
        let report = ClassificationReport::evaluate(&truth, &predicted);
        assert_eq!(report.accuracy, 0.75);
        assert_eq!(report.support, 4);
        let c1 = &report.classes[0];
        assert_eq!((c1.label, c1.precision, c1.recall, c1.support), (1, 1.0, 0.5, 2));
        let c2 = &report.classes[1];
        assert!((c2.precision - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(c2.recall, 1.0);
        assert!(report.to_string().contains("accuracy"));
    }

    #[test]
    fn test_train_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        for (i, (a, b)) in [(1.0, 20.0), (1.5, 21.0), (0.5, 19.0)].iter().enumerate() {
            let text = labelled_text(&[(*a, 4, 400), (0.0, 0, 50), (*b, 6, 400)], 23);
            fs::write(dir.path().join(format!("subject{i}.log")), text).unwrap();
        }
        fs::write(dir.path().join("README.txt"), "not a recording").unwrap();
        let narrow = labelled_text(&[(1.0, 4, 400)], 10);
        fs::write(dir.path().join("narrow.log"), narrow).unwrap();

        let config = ActirankConfig::default();
        let outcome = train(dir.path(), &config).unwrap();
        assert_eq!(outcome.files_used, 3);
        assert!(outcome.total_windows > 20);
        assert_eq!(outcome.model.feature_len, 46);
        assert!(outcome.report.accuracy >= 0.5);
        assert_eq!(
            outcome.model.training_windows + outcome.report.support,
            outcome.total_windows
        );

        let walking = FeatureVector::new([vec![1.0; 23], vec![0.3; 23]].concat());
        let bending = FeatureVector::new([vec![20.0; 23], vec![0.3; 23]].concat());
        assert_eq!(outcome.model.predict(&[walking, bending]).unwrap(), vec![4, 6]);

        let path = dir.path().join("model").join("classifier.json");
        outcome.model.save(&path).unwrap();
        assert!(ClassifierModel::load(&path).is_ok());
    }

    #[test]
    fn test_train_empty_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(train(dir.path(), &ActirankConfig::default()).is_err());
    }
}
