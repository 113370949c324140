//! Row-major raster grids.

use serde::{Deserialize, Serialize};

use crate::error::{PlumeError, PlumeResult};

/// Dimensions of a raster grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RasterShape {
    pub rows: usize,
    pub cols: usize,
}

impl RasterShape {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Flat row-major index of a cell.
    pub fn flat_index(&self, row: usize, col: usize) -> Option<usize> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(row * self.cols + col)
    }

    /// (row, col) of a flat row-major index.
    pub fn cell(&self, index: usize) -> Option<(usize, usize)> {
        if index >= self.len() {
            return None;
        }
        Some((index / self.cols, index % self.cols))
    }
}

impl std::fmt::Display for RasterShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Minimum and maximum over the valid cells of a raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    /// Range of the finite values in `data`, or `None` if there are none.
    pub fn of(data: &[f32]) -> Option<Self> {
        data.iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some(ValueRange { min: v, max: v }),
                Some(r) => Some(ValueRange {
                    min: r.min.min(v),
                    max: r.max.max(v),
                }),
            })
    }
}

/// A row-major grid of samples at a fixed ground resolution.
///
/// Masked or invalid cells are stored as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct Raster {
    pub shape: RasterShape,
    /// Ground sample distance in metres per pixel.
    pub resolution_m: f64,
    pub data: Vec<f32>,
}

impl Raster {
    /// Create a raster, checking that `data` matches `shape`.
    pub fn new(shape: RasterShape, resolution_m: f64, data: Vec<f32>) -> PlumeResult<Self> {
        if data.len() != shape.len() {
            return Err(PlumeError::invalid_input(
                "data",
                format!(
                    "{} samples do not fill a {} raster ({} cells)",
                    data.len(),
                    shape,
                    shape.len()
                ),
            ));
        }
        if !resolution_m.is_finite() || resolution_m <= 0.0 {
            return Err(PlumeError::invalid_input(
                "resolution_m",
                format!("must be positive, got {}", resolution_m),
            ));
        }

        Ok(Self {
            shape,
            resolution_m,
            data,
        })
    }

    /// A raster with every cell set to `value`.
    pub fn filled(shape: RasterShape, resolution_m: f64, value: f32) -> Self {
        Self {
            shape,
            resolution_m,
            data: vec![value; shape.len()],
        }
    }

    /// Value at (row, col).
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.shape.flat_index(row, col).map(|i| self.data[i])
    }

    /// Fail unless `other` has the same shape and resolution.
    pub fn ensure_same_grid(&self, other: &Raster) -> PlumeResult<()> {
        if self.shape != other.shape || self.resolution_m != other.resolution_m {
            return Err(PlumeError::ShapeMismatch {
                left: self.shape,
                left_resolution: self.resolution_m,
                right: other.shape,
                right_resolution: other.resolution_m,
            });
        }
        Ok(())
    }

    /// Number of finite (unmasked) cells.
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| v.is_finite()).count()
    }

    /// Range over the finite cells.
    pub fn value_range(&self) -> Option<ValueRange> {
        ValueRange::of(&self.data)
    }
}
