//! Compute backends and the reporting types shared by every SpMV method
//!
//! # Architecture
//!
//! ```text
//! cpu::run_classical ─────────────┐
//!                                 ├─> SpmvRun { result, timing, verification }
//! wgpu::SpmvDispatcher            │
//! ├── spmv_csr         (spmvCSR)  │
//! ├── spmv_csr_vector  (kernelSpmvCSRVect)
//! └── spmv_ell         (spmvELL) ─┘
//! ```

#[cfg(feature = "wgpu")]
pub mod wgpu;

use std::fmt;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::matrix::DenseMatrix;
use crate::verify::Verification;

/// SpMV strategy, used for titles in reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpmvMethod {
    /// Triple-loop dense product on the host
    CpuClassical,
    /// One work-item per CSR row
    GpuCsr,
    /// One warp per CSR row with a shared-memory reduction
    GpuCsrVector,
    /// One work-item per ELL row
    GpuEll,
}

impl SpmvMethod {
    /// Human-readable title
    pub fn title(&self) -> &'static str {
        match self {
            SpmvMethod::CpuClassical => "Classical method on cpu",
            SpmvMethod::GpuCsr => "CSR method on GPU",
            SpmvMethod::GpuCsrVector => "CSR-Vect method on GPU",
            SpmvMethod::GpuEll => "ELL method on GPU",
        }
    }
}

impl fmt::Display for SpmvMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

/// Durations measured for one SpMV.
///
/// `total` covers host-to-device transfers, the launch and the readback;
/// `compute` only the kernel execution. Host methods report the same
/// duration for both.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SpmvTiming {
    /// Transfers + kernel + readback
    pub total: Duration,
    /// Kernel execution alone
    pub compute: Duration,
}

impl SpmvTiming {
    /// Timing of a method without transfers
    pub fn host(elapsed: Duration) -> Self {
        Self {
            total: elapsed,
            compute: elapsed,
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1e3
}

/// Outcome of one SpMV method
#[derive(Debug, Clone)]
pub struct SpmvRun {
    /// Method that produced the result
    pub method: SpmvMethod,
    /// Result column vector, `(1, height)`
    pub result: DenseMatrix,
    /// Shape of the multiplied matrix, `(width, height)`
    pub matrix_shape: (usize, usize),
    /// Measured durations
    pub timing: SpmvTiming,
    /// Comparison against a reference, when one was supplied
    pub verification: Option<Verification>,
}

impl SpmvRun {
    /// Timing is reported unless a supplied reference disagreed
    pub fn should_report_timing(&self) -> bool {
        self.verification.as_ref().is_none_or(Verification::passed)
    }

    /// Timing summary line, `None` when verification failed
    pub fn timing_line(&self) -> Option<String> {
        if !self.should_report_timing() {
            return None;
        }
        let (w, h) = self.matrix_shape;
        Some(match self.method {
            SpmvMethod::CpuClassical => format!(
                "{}: M({w}x{h})xV computed in {:.6} ms.",
                self.method,
                millis(self.timing.total)
            ),
            _ => format!(
                "{}: M({w}x{h})xV computed in {:.6} ms ({:.6} ms of pure computation).",
                self.method,
                millis(self.timing.total),
                millis(self.timing.compute)
            ),
        })
    }
}

/// Validate `M x V` operands: `M.width == V.height` and `V.width == 1`.
///
/// Runs before any allocation or device work.
pub fn validate_spmv_operands(op: &'static str, m_width: usize, v: &DenseMatrix) -> Result<()> {
    if m_width != v.height() {
        return Err(Error::shape_mismatch(op, m_width, v.height()));
    }
    if !v.is_column_vector() {
        return Err(Error::NotColumnVector {
            op,
            width: v.width(),
        });
    }
    Ok(())
}
