//! Result verification against a reference SpMV
//!
//! GPU reductions sum in a different order than the CPU oracle, so results
//! are compared with a tolerance scaled by the magnitude of each row's terms:
//!
//! ```text
//! |result[r] - reference[r]| <= atol + rtol * sum_k |M[r,k] * V[k]|
//! ```
//!
//! Rounding error grows with the terms being summed, not with their sum, so a
//! row that cancels to nearly zero keeps a tolerance that fits its terms. A
//! [`Reference`] built from a bare matrix falls back to `|reference[r]|`.

use std::fmt;

use tracing::warn;

use crate::error::{Error, Result};
use crate::matrix::DenseMatrix;

/// Default relative tolerance
pub const DEFAULT_RTOL: f32 = 1e-5;

/// Default absolute tolerance, for reference values near zero
pub const DEFAULT_ATOL: f32 = 1e-6;

/// Element-wise comparison tolerance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    /// Relative tolerance
    pub rtol: f32,
    /// Absolute tolerance
    pub atol: f32,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            rtol: DEFAULT_RTOL,
            atol: DEFAULT_ATOL,
        }
    }
}

impl Tolerance {
    /// Create a tolerance
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for negative or non-finite values.
    pub fn new(rtol: f32, atol: f32) -> Result<Self> {
        if !rtol.is_finite() || rtol < 0.0 {
            return Err(Error::invalid_argument(
                "rtol",
                format!("{rtol} must be finite and >= 0"),
            ));
        }
        if !atol.is_finite() || atol < 0.0 {
            return Err(Error::invalid_argument(
                "atol",
                format!("{atol} must be finite and >= 0"),
            ));
        }
        Ok(Self { rtol, atol })
    }

    /// Bit-for-bit comparison
    pub fn exact() -> Self {
        Self {
            rtol: 0.0,
            atol: 0.0,
        }
    }

    /// Whether `value` matches `reference`
    #[inline]
    pub fn accepts(&self, reference: f32, value: f32) -> bool {
        self.accepts_scaled(reference, value, reference.abs())
    }

    /// Whether `value` matches `reference`, the relative term scaled by `magnitude`
    #[inline]
    pub fn accepts_scaled(&self, reference: f32, value: f32, magnitude: f32) -> bool {
        if reference == value {
            return true;
        }
        (value - reference).abs() <= self.atol + self.rtol * magnitude
    }
}

/// Reference result of an SpMV, with the magnitude of each element's terms
#[derive(Debug, Clone, PartialEq)]
pub struct Reference {
    values: DenseMatrix,
    magnitude: Vec<f32>,
}

impl Reference {
    /// Pair reference values with per-element magnitudes
    ///
    /// # Errors
    ///
    /// `ShapeMismatch` if `magnitude` has not one entry per value.
    pub fn new(values: DenseMatrix, magnitude: Vec<f32>) -> Result<Self> {
        if values.data().len() != magnitude.len() {
            return Err(Error::shape_mismatch(
                "Reference::new",
                values.data().len(),
                magnitude.len(),
            ));
        }
        Ok(Self { values, magnitude })
    }

    /// Reference values
    pub fn values(&self) -> &DenseMatrix {
        &self.values
    }

    /// Per-element magnitude scaling `rtol`
    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }
}

impl From<DenseMatrix> for Reference {
    fn from(values: DenseMatrix) -> Self {
        let magnitude = values.data().iter().map(|x| x.abs()).collect();
        Self { values, magnitude }
    }
}

/// Count of matching elements for one checked result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    title: String,
    correct: usize,
    total: usize,
}

impl Verification {
    /// Create a verification record
    pub fn new(title: impl Into<String>, correct: usize, total: usize) -> Self {
        Self {
            title: title.into(),
            correct,
            total,
        }
    }

    /// Title of the checked method
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Elements within tolerance
    pub fn correct(&self) -> usize {
        self.correct
    }

    /// Elements compared
    pub fn total(&self) -> usize {
        self.total
    }

    /// All elements matched
    pub fn passed(&self) -> bool {
        self.correct == self.total
    }
}

impl fmt::Display for Verification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{} correct values",
            self.title, self.correct, self.total
        )?;
        if !self.passed() {
            write!(f, " - FAILED")?;
        }
        Ok(())
    }
}

/// Compare `result` with `reference` element-wise.
///
/// A shape mismatch is a failed verification with no correct element, not an error.
pub fn check_result(
    title: &str,
    reference: &Reference,
    result: &DenseMatrix,
    tolerance: Tolerance,
) -> Verification {
    let magnitude = reference.magnitude();
    let reference = reference.values();
    let total = reference.data().len();
    if reference.width() != result.width() || reference.height() != result.height() {
        warn!(
            method = title,
            reference = ?(reference.width(), reference.height()),
            result = ?(result.width(), result.height()),
            "result shape differs from reference"
        );
        return Verification::new(title, 0, total);
    }

    let mut correct = 0;
    let mut first_mismatch = None;
    let values = reference.data().iter().zip(result.data()).zip(magnitude);
    for (i, ((&r, &x), &scale)) in values.enumerate() {
        if tolerance.accepts_scaled(r, x, scale) {
            correct += 1;
        } else if first_mismatch.is_none() {
            first_mismatch = Some((i, r, x));
        }
    }

    if let Some((index, expected, got)) = first_mismatch {
        warn!(
            method = title,
            index,
            expected,
            got,
            mismatches = total - correct,
            "result differs from reference"
        );
    }
    Verification::new(title, correct, total)
}
