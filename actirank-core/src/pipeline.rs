//! Detection pipeline for one buffered recording.
//!
//! A recording moves through parse → validate → segment → extract →
//! predict → aggregate. Every failure comes back as a [`DetectError`]; a run
//! either produces a complete [`DetectionReport`] or nothing.
//!
//! The classifier is part of the pipeline's immutable context. It is loaded
//! once when the pipeline is built and shared read-only afterwards, so one
//! `Pipeline` can serve concurrent requests without locking. A failed load
//! is kept as [`ModelState::Unavailable`] for the lifetime of the pipeline.

use crate::classifier::{Classifier, ClassifierModel};
use crate::config::{ActirankConfig, LimitsConfig, SamplingConfig};
use crate::error::DetectError;
use crate::features::{self, feature_len};
use crate::labels::ActivityLabelMap;
use crate::recording::{ParseLimits, SampleMatrix};
use crate::report::{self, DetectionReport, Timing};
use crate::window::{self, WindowError, WindowSpec};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Whether a classifier is available for detection.
#[derive(Clone)]
pub enum ModelState {
    Loaded(Arc<dyn Classifier>),
    Unavailable { reason: String },
}

impl ModelState {
    /// Load the artifact at `path`. Failure is logged and recorded, not
    /// returned; there is no retry.
    pub fn load(path: &Path) -> Self {
        match ClassifierModel::load(path) {
            Ok(model) => ModelState::Loaded(Arc::new(model)),
            Err(e) => {
                log::warn!("Classifier not loaded from {}: {e}", path.display());
                ModelState::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn loaded<C: Classifier + 'static>(classifier: C) -> Self {
        ModelState::Loaded(Arc::new(classifier))
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self, ModelState::Loaded(_))
    }
}

impl std::fmt::Debug for ModelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelState::Loaded(c) => write!(f, "Loaded({} features)", c.feature_len()),
            ModelState::Unavailable { reason } => write!(f, "Unavailable({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub model_loaded: bool,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    model: ModelState,
    labels: ActivityLabelMap,
    channels: usize,
    window: WindowSpec,
    timing: Timing,
    max_samples: usize,
}

impl Pipeline {
    pub fn new(
        sampling: &SamplingConfig,
        limits: &LimitsConfig,
        model: ModelState,
    ) -> Result<Self, WindowError> {
        let window = sampling.inference_window()?;
        if let ModelState::Loaded(c) = &model {
            let expected = feature_len(sampling.channels);
            if c.feature_len() != expected {
                log::warn!(
                    "Classifier expects {} features but {} channels give {expected}",
                    c.feature_len(),
                    sampling.channels
                );
            }
        }
        Ok(Self {
            model,
            labels: ActivityLabelMap::standard(),
            channels: sampling.channels,
            window,
            timing: Timing {
                sampling_rate_hz: sampling.rate_hz,
                window_size: sampling.window_size,
            },
            max_samples: limits.max_samples,
        })
    }

    /// Build from configuration, loading the model from `model.path`.
    pub fn from_config(config: &ActirankConfig) -> Result<Self, WindowError> {
        let model = ModelState::load(&config.model.path);
        Self::new(&config.sampling, &config.limits, model)
    }

    pub fn model_state(&self) -> &ModelState {
        &self.model
    }

    pub fn window_spec(&self) -> &WindowSpec {
        &self.window
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "ok",
            model_loaded: self.model.is_loaded(),
        }
    }

    pub fn detect_file(&self, path: &Path) -> Result<DetectionReport, DetectError> {
        let classifier = self.classifier()?;
        let matrix = SampleMatrix::load_with(path, &self.parse_limits()).map_err(|e| {
            log::warn!("Failed to read recording {}: {e}", path.display());
            DetectError::from(e)
        })?;
        self.run(classifier, &matrix)
    }

    pub fn detect_text(&self, text: &str) -> Result<DetectionReport, DetectError> {
        let classifier = self.classifier()?;
        let matrix = SampleMatrix::parse_with(text, &self.parse_limits()).map_err(|e| {
            log::warn!("Failed to parse recording: {e}");
            DetectError::from(e)
        })?;
        self.run(classifier, &matrix)
    }

    pub fn detect(&self, matrix: &SampleMatrix) -> Result<DetectionReport, DetectError> {
        let classifier = self.classifier()?;
        self.run(classifier, matrix)
    }

    /// Recordings are rejected while they are read, so an oversized input
    /// never has to be held in memory.
    fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            min_columns: self.channels,
            max_rows: Some(self.max_samples),
        }
    }

    fn classifier(&self) -> Result<&dyn Classifier, DetectError> {
        match &self.model {
            ModelState::Loaded(c) => Ok(c.as_ref()),
            ModelState::Unavailable { reason } => {
                Err(DetectError::ModelUnavailable(reason.clone()))
            }
        }
    }

    fn run(
        &self,
        classifier: &dyn Classifier,
        matrix: &SampleMatrix,
    ) -> Result<DetectionReport, DetectError> {
        let sensors = matrix.leading_columns(self.channels)?;
        let total_samples = matrix.rows();
        if total_samples > self.max_samples {
            return Err(DetectError::TooLarge {
                limit: self.max_samples,
            });
        }

        let windows = window::segment(&sensors, &self.window);
        if windows.is_empty() {
            return Err(DetectError::TooShort {
                rows: total_samples,
                window_size: self.window.size,
            });
        }
        log::debug!(
            "Segmented {total_samples} samples into {} windows",
            windows.len()
        );

        let feature_vectors = features::extract_all(&windows);
        let predictions = classifier.predict(&feature_vectors).map_err(|e| {
            log::error!("Prediction failed: {e}");
            DetectError::from(e)
        })?;
        if predictions.len() != windows.len() {
            log::error!(
                "Classifier returned {} labels for {} windows",
                predictions.len(),
                windows.len()
            );
            return Err(DetectError::Internal(
                "classifier output does not match window count".into(),
            ));
        }

        let ranking = report::aggregate(&predictions, &self.labels)?;
        let report = DetectionReport::new(ranking, total_samples, self.timing);
        log::debug!(
            "Top activity {} at {:.1}%",
            report.top_activity,
            report.confidence
        );
        Ok(report)
    }
}
