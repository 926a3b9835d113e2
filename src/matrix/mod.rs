//! Matrix storage: dense container and the CSR / ELL sparse encodings
//!
//! # Formats
//!
//! - **Dense**: row-major `width * height` buffer. Column vectors have width 1.
//!
//! - **CSR** (Compressed Sparse Row): values, column indices and `height + 1`
//!   row offsets. Rows may have any length.
//!
//! - **ELL** (ELLPACK): every row padded to the longest row's length, giving a
//!   uniform stride at the cost of padding slots.
//!
//! ```
//! use spmvlab::matrix::{CsrMatrix, DenseMatrix, EllMatrix, SparseStorage};
//!
//! let m = DenseMatrix::from_rows(&[[1.0, 0.0, 2.0], [0.0, 0.0, 0.0]])?;
//! let csr = CsrMatrix::from_dense(&m)?;
//! assert_eq!(csr.row_ptr(), &[0, 2, 2]);
//!
//! let ell = EllMatrix::from_dense(&m)?;
//! assert_eq!(ell.nz_row_sz(), 2);
//! assert!(ell.to_dense().are_equal(&m));
//! # Ok::<(), spmvlab::error::Error>(())
//! ```

mod csr;
mod dense;
mod ell;
mod format;

pub use csr::CsrMatrix;
pub use dense::{DenseMatrix, MAX_SPARSE_RATE};
pub use ell::{ELL_PADDING_COLUMN, EllMatrix};
pub use format::{SparseFormat, SparseStorage};
