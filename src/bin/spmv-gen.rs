//! Random dataset generator
//!
//! Writes `mat_{width}x{height}_{rate}.M` and the matching dense vector
//! `.V`, ready for `spmvlab`.
//!
//! ```bash
//! spmv-gen 1000 1500 50 --out-dir data --seed 7
//! spmvlab data/mat_1000x1500_50.00
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use spmvlab::io;
use spmvlab::matrix::DenseMatrix;

/// Generate a random sparse matrix and a dense vector
#[derive(Parser, Debug)]
#[command(name = "spmv-gen")]
#[command(version)]
struct Args {
    /// Matrix width, also the vector height
    width: usize,

    /// Matrix height
    height: usize,

    /// Percentage of zero values in the matrix, in [0, 99.9]
    sparse_rate: f32,

    /// Directory the files are written to
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Seed for reproducible datasets
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let m = DenseMatrix::random(args.width, args.height, args.sparse_rate, &mut rng)?;
    let v = DenseMatrix::random(1, args.width, 0.0, &mut rng)?;

    std::fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("cannot create {}", args.out_dir.display()))?;
    let basename = args.out_dir.join(format!(
        "mat_{}x{}_{:.2}",
        args.width, args.height, args.sparse_rate
    ));
    io::write_dataset(&basename, &m, &v)?;

    info!(
        nonzeros = m.count_nonzeros(),
        total = args.width * args.height,
        "dataset generated"
    );
    println!("{}", basename.display());
    Ok(())
}
