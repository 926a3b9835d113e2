//! spmvlab driver
//!
//! Reads a dataset, computes the reference product on the CPU, then runs the
//! CSR, CSR-Vector and ELL kernels on the GPU and checks each against it.
//!
//! ```bash
//! spmvlab data/mat_1000x1500_0.50            # reads .M and .V
//! spmvlab data/mat_1000x1500_0.50 --lanes 16 --warps-per-block 8
//! RUST_LOG=debug spmvlab data/mat_10x10_0.50 --print
//! ```
//!
//! Exit status is 0 on success and 1 on a wrong command line, a bad dataset
//! or any device error. Failed verifications are reported but do not change
//! the exit status.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use clap::error::ErrorKind;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spmvlab::config::{
    DEFAULT_LANES, DEFAULT_WARPS_PER_BLOCK, DEFAULT_WORKGROUP_SIZE, KernelGeometry, RunConfig,
};
use spmvlab::cpu;
use spmvlab::error::{DeviceError, Error};
use spmvlab::io;
use spmvlab::matrix::{CsrMatrix, EllMatrix};
use spmvlab::runtime::SpmvRun;
use spmvlab::runtime::wgpu::{KernelConfig, SpmvDispatcher, WgpuClient, WgpuDevice};
use spmvlab::verify::{DEFAULT_ATOL, DEFAULT_RTOL, Reference, Tolerance};

/// Sparse matrix-vector product on the GPU, checked against the CPU
#[derive(Parser, Debug)]
#[command(name = "spmvlab")]
#[command(override_usage = "spmvlab <dataset_basename> [OPTIONS]")]
#[command(version)]
struct Cli {
    /// Dataset basename: reads <dataset_basename>.M and <dataset_basename>.V
    dataset_basename: PathBuf,

    /// Lanes per warp in the CSR-Vector kernel (power of two)
    #[arg(long, default_value_t = DEFAULT_LANES)]
    lanes: u32,

    /// Warps per work-group in the CSR-Vector kernel
    #[arg(long, default_value_t = DEFAULT_WARPS_PER_BLOCK)]
    warps_per_block: u32,

    /// Invocations per work-group in the CSR and ELL kernels
    #[arg(long, default_value_t = DEFAULT_WORKGROUP_SIZE)]
    workgroup_size: u32,

    /// Relative tolerance of the verification
    #[arg(long, default_value_t = DEFAULT_RTOL)]
    rtol: f32,

    /// Absolute tolerance of the verification
    #[arg(long, default_value_t = DEFAULT_ATOL)]
    atol: f32,

    /// Adapter index, GPUs first
    #[arg(long, default_value_t = 0)]
    adapter: usize,

    /// Print the inputs, their encodings and every result
    #[arg(long)]
    print: bool,

    /// Log filter (overrides RUST_LOG), e.g. `info` or `spmvlab=debug`
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    fn into_config(self) -> spmvlab::error::Result<RunConfig> {
        Ok(RunConfig {
            dataset: self.dataset_basename,
            adapter_index: self.adapter,
            geometry: KernelGeometry::new(self.workgroup_size, self.lanes, self.warps_per_block)?,
            tolerance: Tolerance::new(self.rtol, self.atol)?,
            print_matrices: self.print,
        })
    }
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => {
                let _ = err.print();
                return ExitCode::FAILURE;
            }
        },
    };

    setup_logging(cli.log_level.as_deref());

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(level_override: Option<&str>) {
    let filter = match level_override {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.into_config()?;
    let (m, v) = io::read_dataset(&config.dataset)
        .with_context(|| format!("cannot load dataset {}", config.dataset.display()))?;
    info!(
        width = m.width(),
        height = m.height(),
        nonzeros = m.count_nonzeros(),
        "dataset loaded"
    );
    if config.print_matrices {
        print_titled("M", &m);
        print_titled("V", &v);
    }

    // Operand validation happens here, before any device is touched.
    let classical = cpu::run_classical(&m, &v)?;
    report_run(&classical, config.print_matrices);
    let reference = Reference::new(classical.result, cpu::spmv_magnitude(&m, &v)?)?;

    let csr = CsrMatrix::from_dense(&m)?;
    let ell = EllMatrix::from_dense(&m)?;
    if config.print_matrices {
        print_titled("M (CSR)", &csr);
        print_titled("M (ELL)", &ell);
    }

    let client = WgpuClient::new(WgpuDevice::new(config.adapter_index)).map_err(Error::from)?;
    let kernels = KernelConfig::for_device(&config.geometry, &client)?;
    let gpu = SpmvDispatcher::new(client, kernels, config.tolerance);

    report_run(&gpu.spmv_csr(&csr, &v, Some(&reference))?, config.print_matrices);
    report_run(
        &gpu.spmv_csr_vector(&csr, &v, Some(&reference))?,
        config.print_matrices,
    );
    report_run(&gpu.spmv_ell(&ell, &v, Some(&reference))?, config.print_matrices);
    Ok(())
}

fn print_titled(title: &str, value: &impl std::fmt::Display) {
    println!("{title}:\n{value}");
}

fn report_run(run: &SpmvRun, print_result: bool) {
    if print_result {
        print_titled(&format!("Y ({})", run.method), &run.result);
    }
    if let Some(verification) = &run.verification {
        println!("{verification}");
    }
    if let Some(line) = run.timing_line() {
        println!("{line}");
    }
}

fn device_error(err: &anyhow::Error) -> Option<&DeviceError> {
    match err.downcast_ref::<Error>() {
        Some(Error::Device(device)) => Some(device),
        _ => err.downcast_ref::<DeviceError>(),
    }
}

fn report(err: &anyhow::Error) {
    match device_error(err) {
        Some(device) => {
            eprintln!("ERROR: {device} ({})", device.category());
            if let Some(log) = device.build_log() {
                eprintln!("Build log:\n{log}");
            }
        }
        None => eprintln!("ERROR: {err:#}"),
    }
}
