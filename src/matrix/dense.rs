//! Dense row-major matrix: source of truth for test data and results

use std::fmt;

use rand::Rng;

use crate::error::{Error, Result};

/// Largest accepted sparse rate for random generation, in percent.
pub const MAX_SPARSE_RATE: f32 = 99.9;

/// Row-major matrix of `f32`. Column vectors have width 1.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseMatrix {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl DenseMatrix {
    /// Create a zero-filled matrix
    pub fn zeros(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width * height],
        }
    }

    /// Create a matrix from a row-major buffer
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if `data.len() != width * height`.
    pub fn from_vec(width: usize, height: usize, data: Vec<f32>) -> Result<Self> {
        let expected = width
            .checked_mul(height)
            .ok_or_else(|| Error::invalid_argument("width", "width * height overflows"))?;
        if data.len() != expected {
            return Err(Error::shape_mismatch(
                "DenseMatrix::from_vec",
                expected,
                data.len(),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Create a matrix from nested rows
    ///
    /// # Errors
    ///
    /// Returns `ShapeMismatch` if the rows are ragged.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(width * height);
        for row in rows {
            let row = row.as_ref();
            if row.len() != width {
                return Err(Error::shape_mismatch(
                    "DenseMatrix::from_rows",
                    width,
                    row.len(),
                ));
            }
            data.extend_from_slice(row);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Create a column vector (width 1)
    pub fn column(values: Vec<f32>) -> Self {
        Self {
            width: 1,
            height: values.len(),
            data: values,
        }
    }

    /// Create a matrix of uniform values in `[-1, 1)` where each element is
    /// zero with probability `sparse_rate / 100`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `sparse_rate` is outside `[0, 99.9]`.
    pub fn random<G: Rng + ?Sized>(
        width: usize,
        height: usize,
        sparse_rate: f32,
        rng: &mut G,
    ) -> Result<Self> {
        if !(0.0..=MAX_SPARSE_RATE).contains(&sparse_rate) {
            return Err(Error::invalid_argument(
                "sparse_rate",
                format!("{sparse_rate} is outside [0.0, {MAX_SPARSE_RATE}]"),
            ));
        }
        let zero_probability = f64::from(sparse_rate) / 100.0;
        let data = (0..width * height)
            .map(|_| {
                if rng.random_bool(zero_probability) {
                    0.0
                } else {
                    rng.random_range(-1.0f32..1.0)
                }
            })
            .collect();
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Number of columns
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major values
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable row-major values
    #[inline]
    pub fn data_mut(&mut self) -> &mut [f32] {
        &mut self.data
    }

    /// Element at `(row, col)`
    ///
    /// # Panics
    ///
    /// Panics if the position is out of bounds.
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        assert!(row < self.height && col < self.width, "index out of bounds");
        self.data[row * self.width + col]
    }

    /// Set element at `(row, col)`
    ///
    /// # Panics
    ///
    /// Panics if the position is out of bounds.
    #[inline]
    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        assert!(row < self.height && col < self.width, "index out of bounds");
        self.data[row * self.width + col] = value;
    }

    /// One row as a slice
    #[inline]
    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.width..(row + 1) * self.width]
    }

    /// Iterator over rows
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on 0; a zero-width matrix has an empty buffer anyway
        self.data.chunks_exact(self.width.max(1))
    }

    /// Returns true for a column vector
    #[inline]
    pub fn is_column_vector(&self) -> bool {
        self.width == 1
    }

    /// Number of elements that are not exactly zero
    pub fn count_nonzeros(&self) -> usize {
        self.data.iter().filter(|&&x| x != 0.0).count()
    }

    /// Exact element-wise equality with the same shape
    pub fn are_equal(&self, other: &DenseMatrix) -> bool {
        self.width == other.width && self.height == other.height && self.data == other.data
    }
}

impl fmt::Display for DenseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}x{} matrix", self.width, self.height)?;
        for row in self.rows() {
            for value in row {
                write!(f, "{value:8.3} ")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
