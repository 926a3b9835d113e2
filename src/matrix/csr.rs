//! CSR (Compressed Sparse Row) matrix and the dense-to-CSR converter

use std::fmt;

use super::dense::DenseMatrix;
use super::format::{SparseFormat, SparseStorage};
use crate::error::{Error, Result};

/// CSR (Compressed Sparse Row) sparse matrix
///
/// `row_ptr[r]..row_ptr[r + 1]` is the range of `data`/`col_ind` holding row `r`.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    width: usize,
    height: usize,
    data: Vec<f32>,
    col_ind: Vec<u32>,
    row_ptr: Vec<u32>,
}

impl CsrMatrix {
    /// Convert a dense matrix, eliding elements exactly equal to zero.
    ///
    /// Two passes: per-row counts prefix-summed into `row_ptr`, then a
    /// row-major walk appending each non-zero to its row's next free slot.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the dimensions or non-zero count do not fit
    /// the 32-bit indices used on the device.
    pub fn from_dense(m: &DenseMatrix) -> Result<Self> {
        let (width, height) = (m.width(), m.height());
        check_index_range("CSR", "width", width)?;

        let mut row_ptr = Vec::with_capacity(height + 1);
        row_ptr.push(0u32);
        let mut nz_nbr = 0usize;
        for row in m.rows() {
            nz_nbr += row.iter().filter(|&&x| x != 0.0).count();
            row_ptr.push(check_index_range("CSR", "non-zero count", nz_nbr)?);
        }
        // A zero-width matrix has no rows to walk but still needs h + 1 pointers
        row_ptr.resize(height + 1, 0);

        let mut data = vec![0.0f32; nz_nbr];
        let mut col_ind = vec![0u32; nz_nbr];
        for (r, row) in m.rows().enumerate() {
            let mut slot = row_ptr[r] as usize;
            for (c, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    data[slot] = value;
                    col_ind[slot] = c as u32;
                    slot += 1;
                }
            }
            debug_assert_eq!(slot, row_ptr[r + 1] as usize);
        }

        Ok(Self {
            width,
            height,
            data,
            col_ind,
            row_ptr,
        })
    }

    /// Create a CSR matrix from its components
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if:
    /// - `row_ptr.len() != height + 1` or `row_ptr[0] != 0`
    /// - `row_ptr` decreases or its last entry differs from `data.len()`
    /// - `col_ind.len() != data.len()`
    /// - any column index is `>= width`
    pub fn from_raw_parts(
        width: usize,
        height: usize,
        data: Vec<f32>,
        col_ind: Vec<u32>,
        row_ptr: Vec<u32>,
    ) -> Result<Self> {
        if row_ptr.len() != height + 1 {
            return Err(Error::invalid_format(
                "CSR",
                format!(
                    "row_ptr has {} entries, expected {}",
                    row_ptr.len(),
                    height + 1
                ),
            ));
        }
        if row_ptr[0] != 0 {
            return Err(Error::invalid_format("CSR", "row_ptr[0] must be 0"));
        }
        if let Some(r) = row_ptr.windows(2).position(|w| w[1] < w[0]) {
            return Err(Error::invalid_format(
                "CSR",
                format!("row_ptr decreases at row {r}"),
            ));
        }
        if row_ptr[height] as usize != data.len() {
            return Err(Error::invalid_format(
                "CSR",
                format!(
                    "row_ptr[h] = {} but {} values are stored",
                    row_ptr[height],
                    data.len()
                ),
            ));
        }
        if col_ind.len() != data.len() {
            return Err(Error::invalid_format(
                "CSR",
                format!(
                    "{} column indices for {} values",
                    col_ind.len(),
                    data.len()
                ),
            ));
        }
        if let Some(&c) = col_ind.iter().find(|&&c| c as usize >= width) {
            return Err(Error::invalid_format(
                "CSR",
                format!("column index {c} out of range for width {width}"),
            ));
        }
        Ok(Self {
            width,
            height,
            data,
            col_ind,
            row_ptr,
        })
    }

    /// Number of stored non-zeros
    #[inline]
    pub fn nz_nbr(&self) -> usize {
        self.data.len()
    }

    /// Non-zero values in row-major order
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Column index of each non-zero
    #[inline]
    pub fn col_ind(&self) -> &[u32] {
        &self.col_ind
    }

    /// Row offsets into `data`/`col_ind`, `height + 1` entries
    #[inline]
    pub fn row_ptr(&self) -> &[u32] {
        &self.row_ptr
    }

    /// Number of non-zeros in `row`
    #[inline]
    pub fn row_nnz(&self, row: usize) -> usize {
        (self.row_ptr[row + 1] - self.row_ptr[row]) as usize
    }

    /// Column indices and values of one row
    pub fn row(&self, row: usize) -> (&[u32], &[f32]) {
        let range = self.row_ptr[row] as usize..self.row_ptr[row + 1] as usize;
        (&self.col_ind[range.clone()], &self.data[range])
    }

    /// Largest number of non-zeros in any row
    pub fn max_row_nnz(&self) -> usize {
        (0..self.height)
            .map(|r| self.row_nnz(r))
            .max()
            .unwrap_or(0)
    }
}

impl SparseStorage for CsrMatrix {
    fn format(&self) -> SparseFormat {
        SparseFormat::Csr
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn nnz(&self) -> usize {
        self.data.len()
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of_val(self.data.as_slice())
            + std::mem::size_of_val(self.col_ind.as_slice())
            + std::mem::size_of_val(self.row_ptr.as_slice())
    }

    fn to_dense(&self) -> DenseMatrix {
        let mut dense = DenseMatrix::zeros(self.width, self.height);
        for r in 0..self.height {
            let (cols, values) = self.row(r);
            for (&c, &value) in cols.iter().zip(values) {
                let current = dense.get(r, c as usize);
                dense.set(r, c as usize, current + value);
            }
        }
        dense
    }
}

impl fmt::Display for CsrMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}x{} CSR matrix, {} non-zeros",
            self.width,
            self.height,
            self.nz_nbr()
        )?;
        writeln!(f, "data    = {:?}", self.data)?;
        writeln!(f, "col_ind = {:?}", self.col_ind)?;
        writeln!(f, "row_ptr = {:?}", self.row_ptr)
    }
}

/// Ensure an extent fits the u32 indices of the device kernels
pub(super) fn check_index_range(format: &'static str, what: &str, value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| {
        Error::invalid_format(format, format!("{what} {value} does not fit 32-bit indices"))
    })
}
