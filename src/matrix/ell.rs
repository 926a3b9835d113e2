//! ELL (ELLPACK) matrix and the dense-to-ELL converter

use std::fmt;

use super::csr::check_index_range;
use super::dense::DenseMatrix;
use super::format::{SparseFormat, SparseStorage};
use crate::error::{Error, Result};

/// Column index stored in padding slots. Padding slots hold 0.0 and the
/// SpMV paths skip zero slots, so `v[ELL_PADDING_COLUMN]` is never read for them.
pub const ELL_PADDING_COLUMN: u32 = 0;

/// ELL sparse matrix: every row owns exactly `nz_row_sz` slots.
///
/// Row `r` occupies `data[r * nz_row_sz..(r + 1) * nz_row_sz]`, non-zeros
/// left-packed, remaining slots padded with `(0.0, ELL_PADDING_COLUMN)`.
#[derive(Debug, Clone, PartialEq)]
pub struct EllMatrix {
    width: usize,
    height: usize,
    nz_row_sz: usize,
    nnz: usize,
    data: Vec<f32>,
    col_ind: Vec<u32>,
}

impl EllMatrix {
    /// Convert a dense matrix, eliding elements exactly equal to zero.
    ///
    /// An all-zero matrix yields `nz_row_sz == 0` and empty storage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the padded storage does not fit 32-bit indices.
    pub fn from_dense(m: &DenseMatrix) -> Result<Self> {
        let (width, height) = (m.width(), m.height());
        check_index_range("ELL", "width", width)?;

        let mut nnz = 0;
        let mut nz_row_sz = 0;
        for row in m.rows() {
            let count = row.iter().filter(|&&x| x != 0.0).count();
            nnz += count;
            nz_row_sz = nz_row_sz.max(count);
        }

        let slots = height
            .checked_mul(nz_row_sz)
            .ok_or_else(|| Error::invalid_format("ELL", "padded storage size overflows"))?;
        check_index_range("ELL", "padded slot count", slots)?;

        let mut data = vec![0.0f32; slots];
        let mut col_ind = vec![ELL_PADDING_COLUMN; slots];
        for (r, row) in m.rows().enumerate() {
            let mut slot = r * nz_row_sz;
            for (c, &value) in row.iter().enumerate() {
                if value != 0.0 {
                    data[slot] = value;
                    col_ind[slot] = c as u32;
                    slot += 1;
                }
            }
        }

        Ok(Self {
            width,
            height,
            nz_row_sz,
            nnz,
            data,
            col_ind,
        })
    }

    /// Create an ELL matrix from padded components
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if either array is not `height * nz_row_sz` long
    /// or a column index is `>= width` (padding included; a matrix with
    /// padding must therefore have `width > 0`).
    pub fn from_raw_parts(
        width: usize,
        height: usize,
        nz_row_sz: usize,
        data: Vec<f32>,
        col_ind: Vec<u32>,
    ) -> Result<Self> {
        let slots = height * nz_row_sz;
        if data.len() != slots || col_ind.len() != slots {
            return Err(Error::invalid_format(
                "ELL",
                format!(
                    "expected {slots} slots, got {} values and {} column indices",
                    data.len(),
                    col_ind.len()
                ),
            ));
        }
        if let Some(&c) = col_ind.iter().find(|&&c| c as usize >= width) {
            return Err(Error::invalid_format(
                "ELL",
                format!("column index {c} out of range for width {width}"),
            ));
        }
        let nnz = data.iter().filter(|&&x| x != 0.0).count();
        Ok(Self {
            width,
            height,
            nz_row_sz,
            nnz,
            data,
            col_ind,
        })
    }

    /// Slots per row (maximum non-zeros in any row)
    #[inline]
    pub fn nz_row_sz(&self) -> usize {
        self.nz_row_sz
    }

    /// Padded values, `height * nz_row_sz` entries
    #[inline]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Padded column indices, `height * nz_row_sz` entries
    #[inline]
    pub fn col_ind(&self) -> &[u32] {
        &self.col_ind
    }

    /// Column indices and values of one row, padding included
    pub fn row(&self, row: usize) -> (&[u32], &[f32]) {
        let range = row * self.nz_row_sz..(row + 1) * self.nz_row_sz;
        (&self.col_ind[range.clone()], &self.data[range])
    }

    /// Number of padding slots
    pub fn padding(&self) -> usize {
        self.data.len() - self.nnz
    }
}

impl SparseStorage for EllMatrix {
    fn format(&self) -> SparseFormat {
        SparseFormat::Ell
    }

    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn nnz(&self) -> usize {
        self.nnz
    }

    fn memory_usage(&self) -> usize {
        std::mem::size_of_val(self.data.as_slice()) + std::mem::size_of_val(self.col_ind.as_slice())
    }

    fn to_dense(&self) -> DenseMatrix {
        let mut dense = DenseMatrix::zeros(self.width, self.height);
        for r in 0..self.height {
            let (cols, values) = self.row(r);
            for (&c, &value) in cols.iter().zip(values) {
                if value != 0.0 {
                    let current = dense.get(r, c as usize);
                    dense.set(r, c as usize, current + value);
                }
            }
        }
        dense
    }
}

impl fmt::Display for EllMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}x{} ELL matrix, {} slots per row",
            self.width, self.height, self.nz_row_sz
        )?;
        for r in 0..self.height {
            let (cols, values) = self.row(r);
            writeln!(f, "row {r}: data = {values:?} col_ind = {cols:?}")?;
        }
        Ok(())
    }
}
