use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::SeedableRng;
use rand::rngs::StdRng;

use spmvlab::cpu;
use spmvlab::matrix::{CsrMatrix, DenseMatrix, EllMatrix};
#[cfg(feature = "wgpu")]
use spmvlab::config::KernelGeometry;
#[cfg(feature = "wgpu")]
use spmvlab::runtime::wgpu::{
    KernelConfig, SpmvDispatcher, WgpuClient, WgpuDevice, is_wgpu_available,
};

const SIZES: [usize; 3] = [256, 1024, 2048];
const SPARSE_RATE: f32 = 90.0;

fn dataset(n: usize) -> (DenseMatrix, DenseMatrix) {
    let mut rng = StdRng::seed_from_u64(n as u64);
    let m = DenseMatrix::random(n, n, SPARSE_RATE, &mut rng).unwrap();
    let v = DenseMatrix::random(1, n, 0.0, &mut rng).unwrap();
    (m, v)
}

fn bench_host(c: &mut Criterion) {
    let mut group = c.benchmark_group("spmv_host");
    for n in SIZES {
        let (m, v) = dataset(n);
        let csr = CsrMatrix::from_dense(&m).unwrap();
        let ell = EllMatrix::from_dense(&m).unwrap();

        group.bench_with_input(BenchmarkId::new("classical", n), &n, |b, _| {
            b.iter(|| black_box(cpu::spmv_classical(&m, &v).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("csr", n), &n, |b, _| {
            b.iter(|| black_box(cpu::spmv_csr(&csr, &v).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("ell", n), &n, |b, _| {
            b.iter(|| black_box(cpu::spmv_ell(&ell, &v).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("to_csr", n), &n, |b, _| {
            b.iter(|| black_box(CsrMatrix::from_dense(&m).unwrap()))
        });
    }
    group.finish();
}

#[cfg(feature = "wgpu")]
fn bench_gpu(c: &mut Criterion) {
    if !is_wgpu_available() {
        return;
    }
    let Ok(client) = WgpuClient::new(WgpuDevice::new(0)) else {
        return;
    };
    let Ok(kernels) = KernelConfig::for_device(&KernelGeometry::default(), &client) else {
        return;
    };
    let gpu = SpmvDispatcher::new(client, kernels, Default::default());
    if gpu.build_all().is_err() {
        return;
    }

    let mut group = c.benchmark_group("spmv_gpu");
    for n in SIZES {
        let (m, v) = dataset(n);
        let csr = CsrMatrix::from_dense(&m).unwrap();
        let ell = EllMatrix::from_dense(&m).unwrap();

        group.bench_with_input(BenchmarkId::new("csr", n), &n, |b, _| {
            b.iter(|| black_box(gpu.spmv_csr(&csr, &v, None).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("csr_vector", n), &n, |b, _| {
            b.iter(|| black_box(gpu.spmv_csr_vector(&csr, &v, None).unwrap()))
        });
        group.bench_with_input(BenchmarkId::new("ell", n), &n, |b, _| {
            b.iter(|| black_box(gpu.spmv_ell(&ell, &v, None).unwrap()))
        });
    }
    group.finish();
}

#[cfg(not(feature = "wgpu"))]
fn bench_gpu(_c: &mut Criterion) {}

criterion_group!(benches, bench_host, bench_gpu);
criterion_main!(benches);
