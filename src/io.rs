//! Matrix files
//!
//! A dataset basename `X` names two files: `X.M` (matrix) and `X.V`
//! (column vector). Both use the same plain-text layout:
//!
//! ```text
//! # optional comment lines
//! <width> <height>
//! <width values of row 0>
//! ...
//! <width values of row height-1>
//! ```
//!
//! Values are whitespace-separated decimal floats.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::matrix::DenseMatrix;

/// Extension of the matrix file of a dataset
pub const MATRIX_EXTENSION: &str = "M";

/// Extension of the vector file of a dataset
pub const VECTOR_EXTENSION: &str = "V";

/// Matrix and vector paths of a dataset basename.
///
/// The extension is appended, never substituted, so `mat_10x10_0.50`
/// becomes `mat_10x10_0.50.M`.
pub fn dataset_paths(basename: &Path) -> (PathBuf, PathBuf) {
    let with_ext = |ext: &str| {
        let mut s = basename.as_os_str().to_owned();
        s.push(".");
        s.push(ext);
        PathBuf::from(s)
    };
    (with_ext(MATRIX_EXTENSION), with_ext(VECTOR_EXTENSION))
}

/// Read a dense matrix file
///
/// # Errors
///
/// - `Io` if the file cannot be opened or read
/// - `Parse` on a malformed header, a row with the wrong number of values,
///   an unparsable value, or a wrong number of rows
pub fn read_matrix(path: &Path) -> Result<DenseMatrix> {
    let file = File::open(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let parse_err = |line: usize, reason: String| Error::Parse {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let mut header: Option<(usize, usize)> = None;
    let mut data = Vec::new();
    let mut rows_read = 0;

    for (index, line) in reader.lines().enumerate() {
        let line_no = index + 1;
        let line = line.map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((width, height)) = header else {
            let mut fields = trimmed.split_whitespace();
            let dims = (fields.next(), fields.next(), fields.next());
            let (Some(w), Some(h), None) = dims else {
                return Err(parse_err(line_no, "expected header '<width> <height>'".into()));
            };
            let w = w
                .parse::<usize>()
                .map_err(|e| parse_err(line_no, format!("invalid width '{w}': {e}")))?;
            let h = h
                .parse::<usize>()
                .map_err(|e| parse_err(line_no, format!("invalid height '{h}': {e}")))?;
            // storage grows with the rows actually read, never with the header
            if w.checked_mul(h).is_none() {
                return Err(parse_err(line_no, format!("{w}x{h} is too large")));
            }
            header = Some((w, h));
            continue;
        };

        if rows_read == height {
            return Err(parse_err(
                line_no,
                format!("more than the {height} rows announced"),
            ));
        }
        let before = data.len();
        for field in trimmed.split_whitespace() {
            let value = field
                .parse::<f32>()
                .map_err(|e| parse_err(line_no, format!("invalid value '{field}': {e}")))?;
            data.push(value);
        }
        let count = data.len() - before;
        if count != width {
            return Err(parse_err(
                line_no,
                format!("row {rows_read} has {count} values, expected {width}"),
            ));
        }
        rows_read += 1;
    }

    let Some((width, height)) = header else {
        return Err(parse_err(0, "missing header".into()));
    };
    // zero-width rows are blank lines and therefore never counted
    if width > 0 && rows_read != height {
        return Err(parse_err(
            0,
            format!("found {rows_read} rows, expected {height}"),
        ));
    }
    if width == 0 {
        data.clear();
    }

    debug!(path = %path.display(), width, height, "matrix read");
    DenseMatrix::from_vec(width, height, data)
}

/// Write a dense matrix file readable by [`read_matrix`]
///
/// # Errors
///
/// Returns `Io` if the file cannot be created or written.
pub fn write_matrix(m: &DenseMatrix, path: &Path) -> Result<()> {
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(io_err)?;
    let mut out = BufWriter::new(file);

    writeln!(out, "{} {}", m.width(), m.height()).map_err(io_err)?;
    for row in m.rows() {
        let mut first = true;
        for value in row {
            if !first {
                out.write_all(b" ").map_err(io_err)?;
            }
            // `{}` prints the shortest representation that parses back exactly
            write!(out, "{value}").map_err(io_err)?;
            first = false;
        }
        out.write_all(b"\n").map_err(io_err)?;
    }
    out.flush().map_err(io_err)?;
    debug!(path = %path.display(), width = m.width(), height = m.height(), "matrix written");
    Ok(())
}

/// Read the matrix and vector of a dataset
pub fn read_dataset(basename: &Path) -> Result<(DenseMatrix, DenseMatrix)> {
    let (matrix_path, vector_path) = dataset_paths(basename);
    Ok((read_matrix(&matrix_path)?, read_matrix(&vector_path)?))
}

/// Write the matrix and vector of a dataset
pub fn write_dataset(basename: &Path, m: &DenseMatrix, v: &DenseMatrix) -> Result<()> {
    let (matrix_path, vector_path) = dataset_paths(basename);
    write_matrix(m, &matrix_path)?;
    write_matrix(v, &vector_path)
}
