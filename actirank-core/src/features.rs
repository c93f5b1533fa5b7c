//! Per-window statistical features.
//!
//! Each window reduces to `2 * C` values: the mean of every channel followed
//! by its population standard deviation (divisor = window length). Values are
//! not scaled; models are fitted on the raw magnitudes.

use crate::window::Window;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Means of all channels, then standard deviations of all channels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(Vec<f64>);

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn means(&self) -> &[f64] {
        &self.0[..self.0.len() / 2]
    }

    pub fn std_devs(&self) -> &[f64] {
        &self.0[self.0.len() / 2..]
    }

    pub fn into_inner(self) -> Vec<f64> {
        self.0
    }
}

/// Length of the feature vector for `channels` input channels.
pub const fn feature_len(channels: usize) -> usize {
    2 * channels
}

pub fn extract(window: &Window<'_>) -> FeatureVector {
    let channels = window.channels();
    let mut values = Vec::with_capacity(feature_len(channels));
    for c in 0..channels {
        values.push(window.channel(c).mean());
    }
    for c in 0..channels {
        values.push(window.channel(c).population_std_dev());
    }
    FeatureVector(values)
}

pub fn extract_all(windows: &[Window<'_>]) -> Vec<FeatureVector> {
    windows.iter().map(extract).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::SampleMatrix;
    use crate::window::{segment, BoundaryRule, WindowSpec};

    fn single_window(rows: Vec<Vec<f64>>) -> FeatureVector {
        let len = rows.len();
        let m = SampleMatrix::from_rows(rows).unwrap();
        let spec = WindowSpec::new(len, len, BoundaryRule::Inclusive).unwrap();
        let windows = segment(&m, &spec);
        assert_eq!(windows.len(), 1);
        extract(&windows[0])
    }

    #[test]
    fn test_length_is_twice_channels() {
        let fv = single_window(vec![vec![1.0; 23]; 8]);
        assert_eq!(fv.len(), feature_len(23));
        assert_eq!(fv.means().len(), 23);
        assert_eq!(fv.std_devs().len(), 23);
    }

    #[test]
    fn test_constant_window() {
        let row = vec![1.5, -2.25, 0.0, 9.75];
        let fv = single_window(vec![row.clone(); 16]);
        assert_eq!(fv.means(), row.as_slice());
        assert!(fv.std_devs().iter().all(|s| s.abs() < 1e-12));
    }

    #[test]
    fn test_population_std_dev() {
        // Channel 0: 2,4,4,4,5,5,7,9 -> mean 5, population std 2.
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let rows = values.iter().map(|&v| vec![v, 1.0]).collect();
        let fv = single_window(rows);
        assert!((fv.means()[0] - 5.0).abs() < 1e-12);
        assert!((fv.std_devs()[0] - 2.0).abs() < 1e-12);
        assert!((fv.means()[1] - 1.0).abs() < 1e-12);
        assert!(fv.std_devs()[1].abs() < 1e-12);
    }
}
