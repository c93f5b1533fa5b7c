//! Trained activity classifiers.
//!
//! A model is produced offline, stored as a JSON artifact, loaded once at
//! startup and then only read. Two representations are supported:
//!
//! - **NearestCentroid**: one mean feature vector per activity, fitted by
//!   the training module in this crate.
//! - **DecisionForest**: an ensemble of binary threshold trees exported by
//!   an external trainer, combined by majority vote.

use crate::features::FeatureVector;
use crate::labels::ActivityCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Artifact format understood by this build.
pub const MODEL_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("classifier: unsupported model format version {0}")]
    UnsupportedVersion(u32),
    #[error("classifier: model expects {expected} features, got {found}")]
    FeatureLength { expected: usize, found: usize },
    #[error("classifier: model has no classes")]
    EmptyModel,
    #[error("classifier: malformed model: {0}")]
    Malformed(String),
    #[error("classifier: io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("classifier: serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Read-only inference over feature vectors.
///
/// Implementations return one label per input, in input order, and must be
/// callable from several threads at once.
pub trait Classifier: Send + Sync {
    fn predict(&self, features: &[FeatureVector]) -> Result<Vec<ActivityCode>, ClassifierError>;

    /// Number of features each input vector must have.
    fn feature_len(&self) -> usize;
}

// =============================================================================
// Nearest centroid
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestCentroid {
    pub classes: Vec<ActivityCode>,
    pub centroids: Vec<Vec<f64>>,
}

impl NearestCentroid {
    /// Fit one centroid per distinct label. Classes are kept in ascending
    /// code order.
    pub fn fit(
        samples: &[FeatureVector],
        labels: &[ActivityCode],
    ) -> Result<Self, ClassifierError> {
        if samples.len() != labels.len() {
            return Err(ClassifierError::Malformed(format!(
                "{} samples but {} labels",
                samples.len(),
                labels.len()
            )));
        }
        let width = samples
            .first()
            .map(FeatureVector::len)
            .ok_or(ClassifierError::EmptyModel)?;

        let mut sums: BTreeMap<ActivityCode, (Vec<f64>, usize)> = BTreeMap::new();
        for (sample, &label) in samples.iter().zip(labels) {
            if sample.len() != width {
                return Err(ClassifierError::FeatureLength {
                    expected: width,
                    found: sample.len(),
                });
            }
            let (sum, count) = sums.entry(label).or_insert_with(|| (vec![0.0; width], 0));
            for (acc, v) in sum.iter_mut().zip(sample.as_slice()) {
                *acc += v;
            }
            *count += 1;
        }

        let mut classes = Vec::with_capacity(sums.len());
        let mut centroids = Vec::with_capacity(sums.len());
        for (label, (sum, count)) in sums {
            classes.push(label);
            centroids.push(sum.into_iter().map(|s| s / count as f64).collect());
        }
        Ok(Self { classes, centroids })
    }

    fn validate(&self, feature_len: usize) -> Result<(), ClassifierError> {
        if self.classes.is_empty() {
            return Err(ClassifierError::EmptyModel);
        }
        if self.classes.len() != self.centroids.len() {
            return Err(ClassifierError::Malformed(format!(
                "{} classes but {} centroids",
                self.classes.len(),
                self.centroids.len()
            )));
        }
        for centroid in &self.centroids {
            if centroid.len() != feature_len {
                return Err(ClassifierError::FeatureLength {
                    expected: feature_len,
                    found: centroid.len(),
                });
            }
        }
        Ok(())
    }

    /// Closest centroid by squared Euclidean distance; ties keep the earlier
    /// class.
    fn predict_one(&self, features: &[f64]) -> ActivityCode {
        let mut best = (self.classes[0], f64::INFINITY);
        for (&class, centroid) in self.classes.iter().zip(&self.centroids) {
            let dist: f64 = centroid
                .iter()
                .zip(features)
                .map(|(c, x)| (c - x).powi(2))
                .sum();
            if dist < best.1 {
                best = (class, dist);
            }
        }
        best.0
    }
}

// =============================================================================
// Decision forest
// =============================================================================

/// Node of a flattened decision tree. Index 0 is the root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNode {
    /// Go to `left` when `features[feature] <= threshold`, else `right`.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf { label: ActivityCode },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Children must point forward, which also rules out cycles.
    fn validate(&self, feature_len: usize) -> Result<(), ClassifierError> {
        if self.nodes.is_empty() {
            return Err(ClassifierError::Malformed("empty tree".into()));
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = *node
            {
                if feature >= feature_len {
                    return Err(ClassifierError::Malformed(format!(
                        "node {idx} splits on feature {feature} of {feature_len}"
                    )));
                }
                for child in [left, right] {
                    if child <= idx || child >= self.nodes.len() {
                        return Err(ClassifierError::Malformed(format!(
                            "node {idx} has invalid child {child}"
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn predict_one(&self, features: &[f64]) -> ActivityCode {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { label } => return label,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[feature] <= threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionForest {
    pub trees: Vec<DecisionTree>,
}

impl DecisionForest {
    fn validate(&self, feature_len: usize) -> Result<(), ClassifierError> {
        if self.trees.is_empty() {
            return Err(ClassifierError::EmptyModel);
        }
        self.trees.iter().try_for_each(|t| t.validate(feature_len))
    }

    /// Majority vote over trees; ties go to the smallest code.
    fn predict_one(&self, features: &[f64]) -> ActivityCode {
        let mut votes: BTreeMap<ActivityCode, usize> = BTreeMap::new();
        for tree in &self.trees {
            *votes.entry(tree.predict_one(features)).or_insert(0) += 1;
        }
        let mut best = (0, 0);
        for (label, count) in votes {
            if count > best.1 {
                best = (label, count);
            }
        }
        best.0
    }
}

// =============================================================================
// Artifact
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelKind {
    NearestCentroid(NearestCentroid),
    DecisionForest(DecisionForest),
}

/// Persisted classifier with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierModel {
    pub format_version: u32,
    pub feature_len: usize,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    /// Windows the model was fitted on.
    #[serde(default)]
    pub training_windows: usize,
    pub model: ModelKind,
}

impl ClassifierModel {
    pub fn new(feature_len: usize, model: ModelKind) -> Result<Self, ClassifierError> {
        let artifact = Self {
            format_version: MODEL_FORMAT_VERSION,
            feature_len,
            trained_at: None,
            training_windows: 0,
            model,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(ClassifierError::UnsupportedVersion(self.format_version));
        }
        match &self.model {
            ModelKind::NearestCentroid(m) => m.validate(self.feature_len),
            ModelKind::DecisionForest(m) => m.validate(self.feature_len),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ClassifierError> {
        let model: Self = serde_json::from_str(raw)?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let raw = fs::read_to_string(path)?;
        let model = Self::from_json(&raw)?;
        log::info!(
            "Loaded {} model from {} ({} features)",
            model.kind_name(),
            path.display(),
            model.feature_len
        );
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> Result<(), ClassifierError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    pub fn kind_name(&self) -> &'static str {
        match self.model {
            ModelKind::NearestCentroid(_) => "nearest_centroid",
            ModelKind::DecisionForest(_) => "decision_forest",
        }
    }
}

impl Classifier for ClassifierModel {
    fn predict(&self, features: &[FeatureVector]) -> Result<Vec<ActivityCode>, ClassifierError> {
        features
            .iter()
            .map(|fv| {
                if fv.len() != self.feature_len {
                    return Err(ClassifierError::FeatureLength {
                        expected: self.feature_len,
                        found: fv.len(),
                    });
                }
                Ok(match &self.model {
                    ModelKind::NearestCentroid(m) => m.predict_one(fv.as_slice()),
                    ModelKind::DecisionForest(m) => m.predict_one(fv.as_slice()),
                })
            })
            .collect()
    }

    fn feature_len(&self) -> usize {
        self.feature_len
    }
}
