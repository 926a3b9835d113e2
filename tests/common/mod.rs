//! Common test utilities
#![allow(dead_code)]

use rand::SeedableRng;
use rand::rngs::StdRng;
use spmvlab::matrix::DenseMatrix;
#[cfg(feature = "wgpu")]
use spmvlab::{
    config::KernelGeometry,
    runtime::wgpu::{KernelConfig, SpmvDispatcher, WgpuClient, WgpuDevice},
    verify::Tolerance,
};

/// The 4x3 matrix used throughout: `M x [1, 1, 1] = [3, 0, 7, 11]`
pub fn scenario_matrix() -> DenseMatrix {
    DenseMatrix::from_rows(&[
        [1.0, 0.0, 2.0],
        [0.0, 0.0, 0.0],
        [3.0, 4.0, 0.0],
        [0.0, 5.0, 6.0],
    ])
    .unwrap()
}

/// Seeded random matrix and vector
pub fn random_dataset(
    width: usize,
    height: usize,
    sparse_rate: f32,
    seed: u64,
) -> (DenseMatrix, DenseMatrix) {
    let mut rng = StdRng::seed_from_u64(seed);
    let m = DenseMatrix::random(width, height, sparse_rate, &mut rng).unwrap();
    let v = DenseMatrix::random(1, width, 0.0, &mut rng).unwrap();
    (m, v)
}

/// Create a dispatcher on the first adapter, returning None if WebGPU is unavailable
#[cfg(feature = "wgpu")]
pub fn create_dispatcher(geometry: KernelGeometry) -> Option<SpmvDispatcher> {
    if !spmvlab::runtime::wgpu::is_wgpu_available() {
        return None;
    }
    let client = WgpuClient::new(WgpuDevice::new(0)).ok()?;
    let kernels = KernelConfig::for_device(&geometry, &client).ok()?;
    Some(SpmvDispatcher::new(client, kernels, Tolerance::default()))
}

/// Assert two f32 slices are close within tolerance
///
/// Uses the formula: |a - b| <= atol + rtol * |b|
pub fn assert_allclose_f32(a: &[f32], b: &[f32], rtol: f32, atol: f32, msg: &str) {
    assert_eq!(a.len(), b.len(), "{}: length mismatch", msg);
    for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "{}: element {} differs: {} vs {} (diff={}, tol={})",
            msg,
            i,
            x,
            y,
            diff,
            tol
        );
    }
}
