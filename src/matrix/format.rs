//! Sparse format definitions and traits

/// Sparse matrix storage format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SparseFormat {
    /// Compressed Sparse Row (CSR)
    ///
    /// Row pointers + column indices + values.
    /// Best for: SpMV with variable row lengths
    /// Storage: O(2 * nnz + nrows + 1)
    Csr,

    /// ELLPACK (ELL)
    ///
    /// Fixed number of slots per row, padded with zeros.
    /// Best for: uniform-stride GPU access when row lengths are similar
    /// Storage: O(2 * nrows * max_row_nnz)
    Ell,
}

impl SparseFormat {
    /// Returns the format name as a string
    pub fn name(&self) -> &'static str {
        match self {
            SparseFormat::Csr => "CSR",
            SparseFormat::Ell => "ELL",
        }
    }
}

impl std::fmt::Display for SparseFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Trait for sparse storage formats
///
/// Common read-only interface of [`CsrMatrix`](super::CsrMatrix) and
/// [`EllMatrix`](super::EllMatrix).
pub trait SparseStorage {
    /// Returns the sparse format type
    fn format(&self) -> SparseFormat;

    /// Number of columns
    fn width(&self) -> usize;

    /// Number of rows
    fn height(&self) -> usize;

    /// Number of stored non-zero elements (padding excluded)
    fn nnz(&self) -> usize;

    /// Returns the sparsity ratio (fraction of zeros)
    ///
    /// Sparsity = 1.0 - (nnz / total_elements)
    #[inline]
    fn sparsity(&self) -> f64 {
        let total = (self.width() * self.height()) as f64;
        if total == 0.0 {
            0.0
        } else {
            1.0 - (self.nnz() as f64 / total)
        }
    }

    /// Returns true if the matrix has no non-zeros
    #[inline]
    fn is_empty(&self) -> bool {
        self.nnz() == 0
    }

    /// Returns the memory usage of the stored arrays in bytes
    fn memory_usage(&self) -> usize;

    /// Expand back to a dense matrix
    fn to_dense(&self) -> super::DenseMatrix;
}
