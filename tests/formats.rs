//! Sparse encodings and host SpMV on random matrices.

mod common;

use common::{assert_allclose_f32, random_dataset};
use spmvlab::cpu;
use spmvlab::io;
use spmvlab::matrix::{CsrMatrix, DenseMatrix, EllMatrix, SparseFormat, SparseStorage};
use spmvlab::verify::{Tolerance, check_result};

#[test]
fn test_row_pointer_invariant_random() {
    for (seed, rate) in [0.0, 50.0, 90.0, 99.9].into_iter().enumerate() {
        let (m, _) = random_dataset(47, 61, rate, seed as u64);
        let csr = CsrMatrix::from_dense(&m).unwrap();
        let row_ptr = csr.row_ptr();

        assert_eq!(row_ptr.len(), m.height() + 1);
        assert_eq!(row_ptr[0], 0);
        assert_eq!(row_ptr[m.height()] as usize, csr.nz_nbr());
        assert_eq!(csr.nz_nbr(), m.count_nonzeros());
        assert!(row_ptr.windows(2).all(|w| w[0] <= w[1]));
        for r in 0..m.height() {
            let (cols, values) = csr.row(r);
            assert!(cols.windows(2).all(|w| w[0] < w[1]), "row {r} not sorted");
            assert!(values.iter().all(|&x| x != 0.0));
        }
    }
}

#[test]
fn test_ell_padding_invariant_random() {
    let (m, _) = random_dataset(40, 33, 70.0, 5);
    let ell = EllMatrix::from_dense(&m).unwrap();
    let csr = CsrMatrix::from_dense(&m).unwrap();

    assert_eq!(ell.nz_row_sz(), csr.max_row_nnz());
    assert_eq!(ell.data().len(), ell.nz_row_sz() * m.height());
    for r in 0..m.height() {
        let nnz = csr.row_nnz(r);
        let (cols, values) = ell.row(r);
        assert_eq!(&values[..nnz], csr.row(r).1);
        assert!(values[nnz..].iter().all(|&x| x == 0.0));
        assert!(cols[nnz..].iter().all(|&c| c == 0));
    }
    assert_eq!(ell.padding(), ell.data().len() - csr.nz_nbr());
}

#[test]
fn test_round_trip_random() {
    let (m, _) = random_dataset(29, 17, 60.0, 9);
    let csr = CsrMatrix::from_dense(&m).unwrap();
    let ell = EllMatrix::from_dense(&m).unwrap();

    assert_eq!(csr.format(), SparseFormat::Csr);
    assert_eq!(ell.format(), SparseFormat::Ell);
    assert!(csr.to_dense().are_equal(&m));
    assert!(ell.to_dense().are_equal(&m));
}

#[test]
fn test_host_formats_match_oracle() {
    let (m, v) = random_dataset(120, 80, 75.0, 21);
    let reference = cpu::spmv_classical(&m, &v).unwrap();

    let csr = CsrMatrix::from_dense(&m).unwrap();
    let ell = EllMatrix::from_dense(&m).unwrap();
    let csr_y = cpu::spmv_csr(&csr, &v).unwrap();
    let ell_y = cpu::spmv_ell(&ell, &v).unwrap();
    assert_allclose_f32(csr_y.data(), reference.data(), 1e-5, 1e-6, "csr");
    assert_allclose_f32(ell_y.data(), reference.data(), 1e-5, 1e-6, "ell");
}

#[test]
fn test_csr_vector_order_passes_default_tolerance() {
    // 1500 columns at 50%: many rows cancel to within 1e-5 of zero
    let (m, v) = random_dataset(1500, 1000, 50.0, 7);
    let reference = cpu::spmv_reference(&m, &v).unwrap();
    let csr = CsrMatrix::from_dense(&m).unwrap();

    for lanes in [1, 8, 32, 64] {
        let y = cpu::spmv_csr_vector(&csr, &v, lanes).unwrap();
        let verification = check_result("CSR-Vect", &reference, &y, Tolerance::default());
        assert!(verification.passed(), "lanes={lanes}: {verification}");
    }
}

#[test]
fn test_dataset_file_feeds_converters() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("mat_12x9_50.00");
    let (m, v) = random_dataset(12, 9, 50.0, 1);
    io::write_dataset(&base, &m, &v).unwrap();

    let (m2, v2) = io::read_dataset(&base).unwrap();
    assert!(m2.are_equal(&m));
    assert!(v2.are_equal(&v));
    assert_eq!(
        CsrMatrix::from_dense(&m2).unwrap().nz_nbr(),
        m.count_nonzeros()
    );
}

#[test]
fn test_random_rejects_bad_rate() {
    let mut rng = rand::rng();
    assert!(DenseMatrix::random(4, 4, -1.0, &mut rng).is_err());
    assert!(DenseMatrix::random(4, 4, 100.0, &mut rng).is_err());
    assert!(DenseMatrix::random(4, 4, 99.9, &mut rng).is_ok());
}
