//! Density-driven thresholding of the document-topic matrix
//!
//! The matrix is row-normalized, a cutoff τ is chosen on an evenly spaced
//! grid so that the fraction of entries above τ reaches a target density, and
//! the matrix is binarized with `value > τ`.

use crate::config::ThresholdConfig;
use crate::error::Result;
use crate::incidence::IncidenceMatrix;
use crate::metrics::METRICS;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

/// Matrix entry that can be compared against a threshold
pub trait IncidenceValue: Copy {
    fn magnitude(self) -> f64;
}

impl IncidenceValue for f64 {
    fn magnitude(self) -> f64 {
        self
    }
}

impl IncidenceValue for bool {
    fn magnitude(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }
}

/// Divide every row by its sum. Rows summing to zero stay all-zero.
pub fn row_normalize(matrix: &IncidenceMatrix<f64>) -> IncidenceMatrix<f64> {
    let mut normalized = matrix.clone();
    for r in 0..matrix.nrows() {
        let sum: f64 = matrix.row(r).iter().sum();
        if sum == 0.0 || !sum.is_finite() {
            if sum != 0.0 {
                warn!("Row {} has non-finite sum, left unnormalized", r);
            }
            continue;
        }
        for c in 0..matrix.ncols() {
            normalized.set(r, c, matrix.get(r, c) / sum);
        }
    }
    normalized
}

/// Fraction of entries strictly greater than `threshold`; 0 for an empty matrix
pub fn density<T: IncidenceValue>(matrix: &IncidenceMatrix<T>, threshold: f64) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    let above = matrix
        .values()
        .iter()
        .filter(|v| v.magnitude() > threshold)
        .count();
    above as f64 / matrix.len() as f64
}

/// `points` evenly spaced values from 0 to 1 inclusive
pub fn threshold_grid(points: usize) -> Vec<f64> {
    match points {
        0 => vec![],
        1 => vec![0.0],
        n => (0..n).map(|i| i as f64 / (n - 1) as f64).collect(),
    }
}

/// Binarize entrywise: `true` iff `value > threshold`
pub fn binarize<T: IncidenceValue>(matrix: &IncidenceMatrix<T>, threshold: f64) -> IncidenceMatrix<bool> {
    matrix.map(|v| v.magnitude() > threshold)
}

/// Density of a matrix at every grid threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityCurve {
    pub thresholds: Vec<f64>,
    pub densities: Vec<f64>,
}

impl DensityCurve {
    pub fn compute(matrix: &IncidenceMatrix<f64>, grid_points: usize) -> Self {
        let thresholds = threshold_grid(grid_points);

        // Sorting once turns every density into a binary search
        let mut values: Vec<f64> = matrix.values().iter().copied().filter(|v| !v.is_nan()).collect();
        values.sort_by(f64::total_cmp);
        let total = matrix.len();

        let densities = thresholds
            .iter()
            .map(|&t| {
                if total == 0 {
                    0.0
                } else {
                    let at_or_below = values.partition_point(|&v| v <= t);
                    (values.len() - at_or_below) as f64 / total as f64
                }
            })
            .collect();

        Self {
            thresholds,
            densities,
        }
    }

    /// Density never increases along the grid
    pub fn is_non_increasing(&self) -> bool {
        self.densities.windows(2).all(|w| w[1] <= w[0])
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// Outcome of a threshold search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSearch {
    pub threshold: f64,
    pub target_density: f64,
    /// Density achieved at the chosen threshold
    pub density: f64,
    /// No grid point reached the target and τ = 0 was used
    pub fell_back: bool,
    pub curve: DensityCurve,
}

/// Pick the largest grid threshold whose density is at least
/// `target_density`; fall back to 0 when none qualifies.
pub fn search_threshold(normalized: &IncidenceMatrix<f64>, target_density: f64, grid_points: usize) -> ThresholdSearch {
    let curve = DensityCurve::compute(normalized, grid_points);
    debug_assert!(curve.is_non_increasing(), "density must not increase with the threshold");

    let chosen = curve
        .densities
        .iter()
        .rposition(|&d| d >= target_density);

    let (threshold, density, fell_back) = match chosen {
        Some(idx) => (curve.thresholds[idx], curve.densities[idx], false),
        None => {
            warn!(
                "No threshold reaches density {}, keeping every non-zero entry (threshold 0)",
                target_density
            );
            METRICS.record_threshold_fallback();
            (0.0, curve.densities.first().copied().unwrap_or(0.0), true)
        }
    };

    debug!("Threshold {} gives density {}", threshold, density);

    ThresholdSearch {
        threshold,
        target_density,
        density,
        fell_back,
        curve,
    }
}

/// Row-normalizes and binarizes document-topic matrices
#[derive(Debug, Clone)]
pub struct ThresholdSelector {
    target_density: f64,
    grid_points: usize,
}

impl ThresholdSelector {
    pub fn new(target_density: f64, grid_points: usize) -> Self {
        Self {
            target_density,
            grid_points,
        }
    }

    pub fn from_config(config: &ThresholdConfig) -> Self {
        Self::new(config.opt_density, config.grid_points)
    }

    pub fn target_density(&self) -> f64 {
        self.target_density
    }

    /// Normalize rows and search the threshold; the input is not modified
    pub fn determine_threshold(&self, matrix: &IncidenceMatrix<f64>) -> (ThresholdSearch, IncidenceMatrix<f64>) {
        let normalized = row_normalize(matrix);
        let search = search_threshold(&normalized, self.target_density, self.grid_points);
        (search, normalized)
    }

    /// Normalize, search and binarize
    pub fn apply(&self, matrix: &IncidenceMatrix<f64>) -> (ThresholdSearch, IncidenceMatrix<f64>, IncidenceMatrix<bool>) {
        let (search, normalized) = self.determine_threshold(matrix);
        let binary = binarize(&normalized, search.threshold);
        info!(
            "Thresholded {}x{} matrix at {:.4}: {} of {} entries kept",
            binary.nrows(),
            binary.ncols(),
            search.threshold,
            binary.count_true(),
            binary.len()
        );
        (search, normalized, binary)
    }
}

impl Default for ThresholdSelector {
    fn default() -> Self {
        Self::from_config(&ThresholdConfig::default())
    }
}
