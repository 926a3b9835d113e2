//! # spmvlab
//!
//! **Sparse matrix-vector products on the GPU, checked against a CPU oracle.**
//!
//! spmvlab converts a dense matrix to CSR and ELL, computes `Y = M x V` with
//! three WebGPU kernels and compares every result with a classical dense
//! product computed on the host.
//!
//! ## Methods
//!
//! | Method | Format | Parallelism |
//! |--------|--------|-------------|
//! | Classical (CPU) | dense | none, reference |
//! | `spmvCSR` | CSR | one invocation per row |
//! | `kernelSpmvCSRVect` | CSR | one warp of `lanes` invocations per row |
//! | `spmvELL` | ELL | one invocation per row, padded rows |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use spmvlab::prelude::*;
//!
//! let (m, v) = spmvlab::io::read_dataset("mat_1000x1500_0.50".as_ref())?;
//! let reference = cpu::spmv_reference(&m, &v)?;
//! let csr = CsrMatrix::from_dense(&m)?;
//!
//! let client = WgpuClient::new(WgpuDevice::new(0))?;
//! let kernels = KernelConfig::for_device(&KernelGeometry::default(), &client)?;
//! let gpu = SpmvDispatcher::new(client, kernels, Tolerance::default());
//! let run = gpu.spmv_csr(&csr, &v, Some(&reference))?;
//! println!("{}", run.verification.unwrap());
//! ```
//!
//! ## Feature Flags
//!
//! - `wgpu` (default): WebGPU backend and the `spmvlab` binary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod cpu;
pub mod error;
pub mod io;
pub mod matrix;
pub mod runtime;
pub mod verify;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{KernelGeometry, RunConfig};
    pub use crate::cpu;
    pub use crate::error::{DeviceError, Error, Result};
    pub use crate::matrix::{CsrMatrix, DenseMatrix, EllMatrix, SparseFormat, SparseStorage};
    pub use crate::runtime::{SpmvMethod, SpmvRun, SpmvTiming};
    pub use crate::verify::{Reference, Tolerance, Verification, check_result};

    #[cfg(feature = "wgpu")]
    pub use crate::runtime::wgpu::{KernelConfig, SpmvDispatcher, WgpuClient, WgpuDevice};
}
