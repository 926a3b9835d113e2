//! WGSL compute shader infrastructure for SpMV
//!
//! # Module Structure
//!
//! - `generator` - WGSL source generation for each kernel and geometry
//! - `pipeline` - Kernel builds, pipeline caching and dispatch utilities
//! - `sparse_spmv_launcher` - Compute pass encoding and submission

pub mod generator;
pub mod pipeline;
pub mod sparse_spmv_launcher;

pub use pipeline::{
    CompiledKernel, KernelSource, LayoutKey, PipelineCache, check_kernel_source, dispatch_grid,
    max_workgroup_size, workgroup_count,
};
pub use sparse_spmv_launcher::launch_spmv;
