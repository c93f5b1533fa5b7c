pub mod classifier;
pub mod config;
pub mod error;
pub mod features;
pub mod labels;
pub mod pipeline;
pub mod recording;
pub mod report;
pub mod training;
pub mod window;

// Re-export common types
pub use crate::classifier::{Classifier, ClassifierError, ClassifierModel, ModelKind};
pub use crate::config::ActirankConfig;
pub use crate::error::{DetectError, ErrorKind, ErrorResponse};
pub use crate::features::FeatureVector;
pub use crate::labels::{ActivityCode, ActivityLabelMap};
pub use crate::pipeline::{HealthStatus, ModelState, Pipeline};
pub use crate::recording::{SampleMatrix, SENSOR_CHANNELS};
pub use crate::report::{DetectionReport, RankingEntry};
pub use crate::window::{BoundaryRule, WindowSpec};
