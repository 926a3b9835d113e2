//! CPU reference engine
//!
//! The classical dense product is the correctness oracle for every GPU
//! method. It accumulates in `f32`, row-major then along the inner
//! dimension, so its summation order is fixed and reproducible.

use std::time::Instant;

use tracing::debug;

use crate::error::{Error, Result};
use crate::matrix::{CsrMatrix, DenseMatrix, EllMatrix, SparseStorage};
use crate::runtime::{SpmvMethod, SpmvRun, SpmvTiming, validate_spmv_operands};
use crate::verify::Reference;

/// Dense product `M1 x M2` with the classical triple loop.
///
/// # Errors
///
/// Returns `ShapeMismatch` if `m1.width() != m2.height()`.
pub fn matmul_classical(m1: &DenseMatrix, m2: &DenseMatrix) -> Result<DenseMatrix> {
    if m1.width() != m2.height() {
        return Err(Error::shape_mismatch(
            "matmul_classical",
            m1.width(),
            m2.height(),
        ));
    }

    let width = m2.width();
    let height = m1.height();
    let inner = m1.width();
    let (a, b) = (m1.data(), m2.data());
    let mut out = DenseMatrix::zeros(width, height);
    let c = out.data_mut();

    for r in 0..height {
        for col in 0..width {
            let mut tmp = 0.0f32;
            for k in 0..inner {
                tmp += a[r * inner + k] * b[k * width + col];
            }
            c[r * width + col] = tmp;
        }
    }
    Ok(out)
}

/// Reference SpMV `Y = M x V` on a dense matrix.
///
/// # Errors
///
/// Returns `ShapeMismatch` if `m.width() != v.height()` and
/// `NotColumnVector` if `v.width() != 1`.
pub fn spmv_classical(m: &DenseMatrix, v: &DenseMatrix) -> Result<DenseMatrix> {
    validate_spmv_operands("spmv_classical", m.width(), v)?;
    matmul_classical(m, v)
}

/// `sum_k |M[r,k] * V[k]|` for every row, the scale of each row's rounding error
///
/// # Errors
///
/// Same validation as [`spmv_classical`].
pub fn spmv_magnitude(m: &DenseMatrix, v: &DenseMatrix) -> Result<Vec<f32>> {
    validate_spmv_operands("spmv_magnitude", m.width(), v)?;
    let x = v.data();
    Ok(m.rows()
        .map(|row| row.iter().zip(x).map(|(&a, &b)| (a * b).abs()).sum::<f32>())
        .collect())
}

/// Reference for verification: the classical product and its row magnitudes
pub fn spmv_reference(m: &DenseMatrix, v: &DenseMatrix) -> Result<Reference> {
    Reference::new(spmv_classical(m, v)?, spmv_magnitude(m, v)?)
}

/// Run [`spmv_classical`] and time it.
pub fn run_classical(m: &DenseMatrix, v: &DenseMatrix) -> Result<SpmvRun> {
    let start = Instant::now();
    let result = spmv_classical(m, v)?;
    let elapsed = start.elapsed();
    debug!(
        width = m.width(),
        height = m.height(),
        ?elapsed,
        "classical spmv done"
    );
    Ok(SpmvRun {
        method: SpmvMethod::CpuClassical,
        result,
        matrix_shape: (m.width(), m.height()),
        timing: SpmvTiming::host(elapsed),
        verification: None,
    })
}

/// Host SpMV on a CSR matrix, same per-row arithmetic as the `spmvCSR` kernel.
///
/// # Errors
///
/// Same validation as [`spmv_classical`].
pub fn spmv_csr(m: &CsrMatrix, v: &DenseMatrix) -> Result<DenseMatrix> {
    validate_spmv_operands("spmv_csr", m.width(), v)?;
    let x = v.data();
    let y = (0..m.height())
        .map(|r| {
            let (cols, values) = m.row(r);
            cols.iter()
                .zip(values)
                .fold(0.0f32, |acc, (&c, &a)| acc + a * x[c as usize])
        })
        .collect();
    Ok(DenseMatrix::column(y))
}

/// Host SpMV on a CSR matrix in the `kernelSpmvCSRVect` summation order.
///
/// Lane `l` sums entries `l, l + lanes, ...` of the row, then the lane sums
/// are halved pairwise until lane 0 holds the result.
///
/// # Errors
///
/// Same validation as [`spmv_classical`], plus `InvalidArgument` if `lanes`
/// is not a power of two.
pub fn spmv_csr_vector(m: &CsrMatrix, v: &DenseMatrix, lanes: u32) -> Result<DenseMatrix> {
    validate_spmv_operands("spmv_csr_vector", m.width(), v)?;
    if !lanes.is_power_of_two() {
        return Err(Error::invalid_argument(
            "lanes",
            format!("{lanes} must be a power of two"),
        ));
    }
    let lanes = lanes as usize;
    let x = v.data();
    let mut dots = vec![0.0f32; lanes];
    let y = (0..m.height())
        .map(|r| {
            let (cols, values) = m.row(r);
            for (lane, dot) in dots.iter_mut().enumerate() {
                *dot = cols
                    .iter()
                    .zip(values)
                    .skip(lane)
                    .step_by(lanes)
                    .fold(0.0f32, |acc, (&c, &a)| acc + a * x[c as usize]);
            }
            let mut offset = lanes / 2;
            while offset > 0 {
                for lane in 0..offset {
                    dots[lane] += dots[lane + offset];
                }
                offset /= 2;
            }
            dots[0]
        })
        .collect();
    Ok(DenseMatrix::column(y))
}

/// Host SpMV on an ELL matrix. Zero slots, padding included, are skipped
/// like in the `spmvELL` kernel.
///
/// # Errors
///
/// Same validation as [`spmv_classical`].
pub fn spmv_ell(m: &EllMatrix, v: &DenseMatrix) -> Result<DenseMatrix> {
    validate_spmv_operands("spmv_ell", m.width(), v)?;
    let x = v.data();
    let y = (0..m.height())
        .map(|r| {
            let (cols, values) = m.row(r);
            cols.iter()
                .zip(values)
                .filter(|&(_, &a)| a != 0.0)
                .fold(0.0f32, |acc, (&c, &a)| acc + a * x[c as usize])
        })
        .collect();
    Ok(DenseMatrix::column(y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> (DenseMatrix, DenseMatrix) {
        let m = DenseMatrix::from_rows(&[
            [1.0, 0.0, 2.0],
            [0.0, 0.0, 0.0],
            [3.0, 4.0, 0.0],
            [0.0, 5.0, 6.0],
        ])
        .unwrap();
        (m, DenseMatrix::column(vec![1.0, 1.0, 1.0]))
    }

    #[test]
    fn test_spmv_classical_scenario() {
        let (m, v) = scenario();
        let y = spmv_classical(&m, &v).unwrap();
        assert_eq!(y.width(), 1);
        assert_eq!(y.height(), 4);
        assert_eq!(y.data(), &[3.0, 0.0, 7.0, 11.0]);
    }

    #[test]
    fn test_spmv_size_mismatch() {
        let (m, _) = scenario();
        let v = DenseMatrix::column(vec![1.0; 4]);
        let err = spmv_classical(&m, &v).unwrap_err();
        assert!(matches!(
            err,
            Error::ShapeMismatch {
                expected: 3,
                got: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_spmv_requires_column_vector() {
        let (m, _) = scenario();
        let v = DenseMatrix::zeros(2, 3);
        assert!(matches!(
            spmv_classical(&m, &v),
            Err(Error::NotColumnVector { width: 2, .. })
        ));
        // the general product accepts it
        assert_eq!(matmul_classical(&m, &v).unwrap().width(), 2);
    }

    #[test]
    fn test_matmul_square() {
        let a = DenseMatrix::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let b = DenseMatrix::from_rows(&[[5.0, 6.0], [7.0, 8.0]]).unwrap();
        let c = matmul_classical(&a, &b).unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_sparse_host_paths_match_oracle() {
        let (m, _) = scenario();
        let v = DenseMatrix::column(vec![0.5, -2.0, 3.0]);
        let reference = spmv_classical(&m, &v).unwrap();

        let csr = CsrMatrix::from_dense(&m).unwrap();
        assert!(spmv_csr(&csr, &v).unwrap().are_equal(&reference));

        let ell = EllMatrix::from_dense(&m).unwrap();
        assert!(spmv_ell(&ell, &v).unwrap().are_equal(&reference));
    }

    #[test]
    fn test_ell_padding_ignores_first_column() {
        // row 1 is padded; its padding slot points at the infinite v[0]
        let m = DenseMatrix::from_rows(&[[1.0, 0.0], [0.0, 2.0], [3.0, 4.0]]).unwrap();
        let v = DenseMatrix::column(vec![f32::INFINITY, 1.0]);
        let ell = EllMatrix::from_dense(&m).unwrap();
        assert_eq!(ell.nz_row_sz(), 2);

        let y = spmv_ell(&ell, &v).unwrap();
        let csr = spmv_csr(&CsrMatrix::from_dense(&m).unwrap(), &v).unwrap();
        assert_eq!(y.data(), &[f32::INFINITY, 2.0, f32::INFINITY]);
        assert!(y.are_equal(&csr));
    }

    #[test]
    fn test_csr_vector_order_matches_scenario() {
        let (m, v) = scenario();
        let csr = CsrMatrix::from_dense(&m).unwrap();
        for lanes in [1, 2, 32] {
            let y = spmv_csr_vector(&csr, &v, lanes).unwrap();
            assert_eq!(y.data(), &[3.0, 0.0, 7.0, 11.0], "lanes={lanes}");
        }
        assert!(spmv_csr_vector(&csr, &v, 3).is_err());
    }

    #[test]
    fn test_magnitude_and_reference() {
        let m = DenseMatrix::from_rows(&[[1.0, -1.0], [2.0, 0.5]]).unwrap();
        let v = DenseMatrix::column(vec![3.0, 3.0]);
        assert_eq!(spmv_magnitude(&m, &v).unwrap(), vec![6.0, 7.5]);

        let reference = spmv_reference(&m, &v).unwrap();
        assert_eq!(reference.values().data(), &[0.0, 7.5]);
        assert_eq!(reference.magnitude(), &[6.0, 7.5]);
    }

    #[test]
    fn test_all_zero_matrix() {
        let m = DenseMatrix::zeros(3, 5);
        let v = DenseMatrix::column(vec![1.0, 2.0, 3.0]);
        assert!(spmv_classical(&m, &v).unwrap().data().iter().all(|&y| y == 0.0));
        let ell = EllMatrix::from_dense(&m).unwrap();
        assert_eq!(spmv_ell(&ell, &v).unwrap().data(), &[0.0; 5]);
    }

    #[test]
    fn test_run_classical_reports() {
        let (m, v) = scenario();
        let run = run_classical(&m, &v).unwrap();
        assert_eq!(run.method, SpmvMethod::CpuClassical);
        assert_eq!(run.matrix_shape, (3, 4));
        assert!(run.timing_line().unwrap().starts_with("Classical method on cpu: M(3x4)xV"));
    }
}
