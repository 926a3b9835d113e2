//! GPU SpMV dispatch
//!
//! [`SpmvDispatcher`] runs one kernel per call: it validates the operands,
//! uploads them, launches the kernel, reads `y` back and optionally checks
//! it against a reference.
//!
//! Each call reports two durations:
//!
//! ```text
//! total   ├─ upload ─┼─ launch + kernel ─┼─ readback ─┤
//! compute            ├─ launch + kernel ─┤
//! ```
//!
//! Kernel builds and buffer creation happen before the clock starts.

use std::time::Instant;

use bytemuck::{Pod, Zeroable};
use tracing::debug;
use wgpu::Buffer;

use super::client::WgpuClient;
use super::shaders::generator::{csr_kernel, csr_vector_kernel, ell_kernel};
use super::shaders::{KernelSource, dispatch_grid, launch_spmv, workgroup_count};
use crate::config::KernelGeometry;
use crate::error::{Error, Result};
use crate::matrix::{CsrMatrix, DenseMatrix, EllMatrix, SparseStorage};
use crate::runtime::{SpmvMethod, SpmvRun, SpmvTiming, validate_spmv_operands};
use crate::verify::{Reference, Tolerance, check_result};

/// Uniform parameters shared by the SpMV kernels
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct SpmvParams {
    /// Rows of M, length of y
    pub rows_nbr: u32,
    /// Slots per ELL row; unused by the CSR kernels
    pub row_width: u32,
    _pad: [u32; 2],
}

impl SpmvParams {
    /// Parameters for a matrix of `rows` rows
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if a value does not fit the kernels' 32-bit indices.
    pub fn new(rows: usize, row_width: usize) -> Result<Self> {
        let to_u32 = |arg: &'static str, value: usize| {
            u32::try_from(value).map_err(|_| {
                Error::invalid_argument(arg, format!("{value} exceeds 32-bit kernel indices"))
            })
        };
        Ok(Self {
            rows_nbr: to_u32("rows", rows)?,
            row_width: to_u32("row_width", row_width)?,
            _pad: [0; 2],
        })
    }
}

/// Kernel sources used by a dispatcher.
///
/// Sources are plain configuration: callers may substitute their own WGSL
/// as long as it keeps the entry point name, the binding order and the
/// launch geometry recorded in `geometry`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelConfig {
    /// Geometry the sources were generated for
    pub geometry: KernelGeometry,
    /// `spmvCSR`
    pub csr: KernelSource,
    /// `kernelSpmvCSRVect`
    pub csr_vector: KernelSource,
    /// `spmvELL`
    pub ell: KernelSource,
}

impl KernelConfig {
    /// Generated kernels for a launch geometry
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the geometry is invalid.
    pub fn new(geometry: &KernelGeometry) -> Result<Self> {
        geometry.validate()?;
        Ok(Self {
            geometry: *geometry,
            csr: csr_kernel(geometry),
            csr_vector: csr_vector_kernel(geometry),
            ell: ell_kernel(geometry),
        })
    }

    /// Generated kernels with the row-per-invocation work-group capped to the device
    pub fn for_device(geometry: &KernelGeometry, client: &WgpuClient) -> Result<Self> {
        let fitted = geometry.fit_to_device(client.device().max_workgroup_size());
        if fitted.workgroup_size != geometry.workgroup_size {
            debug!(
                requested = geometry.workgroup_size,
                used = fitted.workgroup_size,
                "work-group size capped to device"
            );
        }
        Self::new(&fitted)
    }
}

/// Runs SpMV kernels on one device
#[derive(Debug, Clone)]
pub struct SpmvDispatcher {
    client: WgpuClient,
    kernels: KernelConfig,
    tolerance: Tolerance,
}

impl SpmvDispatcher {
    /// Create a dispatcher. Kernels are built on first use.
    pub fn new(client: WgpuClient, kernels: KernelConfig, tolerance: Tolerance) -> Self {
        Self {
            client,
            kernels,
            tolerance,
        }
    }

    /// Client the kernels run on
    pub fn client(&self) -> &WgpuClient {
        &self.client
    }

    /// Kernel sources
    pub fn kernels(&self) -> &KernelConfig {
        &self.kernels
    }

    /// Build all three kernels now, so a build failure surfaces before any run
    pub fn build_all(&self) -> Result<()> {
        let cache = self.client.pipeline_cache();
        for kernel in [&self.kernels.csr, &self.kernels.csr_vector, &self.kernels.ell] {
            cache.build_kernel(kernel)?;
        }
        Ok(())
    }

    /// `y = M * v` with one invocation per CSR row.
    ///
    /// # Errors
    ///
    /// Operand validation errors before any device work, then device errors.
    pub fn spmv_csr(
        &self,
        m: &CsrMatrix,
        v: &DenseMatrix,
        reference: Option<&Reference>,
    ) -> Result<SpmvRun> {
        validate_spmv_operands("spmv_csr", m.width(), v)?;
        let kernel = &self.kernels.csr;
        let groups = workgroup_count(m.height(), kernel.workgroup_size);
        let params = SpmvParams::new(m.height(), 0)?;
        let (y, timing) = self.execute(
            kernel,
            &[
                ("values", bytemuck::cast_slice(m.data())),
                ("col_ind", bytemuck::cast_slice(m.col_ind())),
                ("row_ptr", bytemuck::cast_slice(m.row_ptr())),
                ("v", bytemuck::cast_slice(v.data())),
            ],
            params,
            m.height(),
            groups,
        )?;
        Ok(self.finish(SpmvMethod::GpuCsr, m, y, timing, reference))
    }

    /// `y = M * v` with one warp per CSR row.
    ///
    /// Rows are distributed `warps_per_block` to a work-group.
    pub fn spmv_csr_vector(
        &self,
        m: &CsrMatrix,
        v: &DenseMatrix,
        reference: Option<&Reference>,
    ) -> Result<SpmvRun> {
        validate_spmv_operands("spmv_csr_vector", m.width(), v)?;
        let kernel = &self.kernels.csr_vector;
        let groups = workgroup_count(m.height(), self.kernels.geometry.warps_per_block);
        let params = SpmvParams::new(m.height(), 0)?;
        let (y, timing) = self.execute(
            kernel,
            &[
                ("values", bytemuck::cast_slice(m.data())),
                ("col_ind", bytemuck::cast_slice(m.col_ind())),
                ("row_ptr", bytemuck::cast_slice(m.row_ptr())),
                ("v", bytemuck::cast_slice(v.data())),
            ],
            params,
            m.height(),
            groups,
        )?;
        Ok(self.finish(SpmvMethod::GpuCsrVector, m, y, timing, reference))
    }

    /// `y = M * v` with one invocation per ELL row
    pub fn spmv_ell(
        &self,
        m: &EllMatrix,
        v: &DenseMatrix,
        reference: Option<&Reference>,
    ) -> Result<SpmvRun> {
        validate_spmv_operands("spmv_ell", m.width(), v)?;
        let kernel = &self.kernels.ell;
        let groups = workgroup_count(m.height(), kernel.workgroup_size);
        let params = SpmvParams::new(m.height(), m.nz_row_sz())?;
        let (y, timing) = self.execute(
            kernel,
            &[
                ("ell_data", bytemuck::cast_slice(m.data())),
                ("col_ind", bytemuck::cast_slice(m.col_ind())),
                ("v", bytemuck::cast_slice(v.data())),
            ],
            params,
            m.height(),
            groups,
        )?;
        Ok(self.finish(SpmvMethod::GpuEll, m, y, timing, reference))
    }

    fn execute(
        &self,
        kernel: &KernelSource,
        inputs: &[(&'static str, &[u8])],
        params: SpmvParams,
        rows: usize,
        groups: u64,
    ) -> Result<(Vec<f32>, SpmvTiming)> {
        let client = &self.client;
        let compiled = client.pipeline_cache().build_kernel(kernel)?;
        let grid = dispatch_grid(groups, client.limits().max_compute_workgroups_per_dimension)?;

        let y_bytes = (rows * std::mem::size_of::<f32>()) as u64;
        let mut operands = Vec::with_capacity(inputs.len());
        for (label, bytes) in inputs {
            operands.push(client.create_storage_buffer(label, bytes.len() as u64)?);
        }
        let y = client.create_storage_buffer("y", y_bytes)?;
        let params_buffer =
            client.create_uniform_buffer("spmv_params", std::mem::size_of::<SpmvParams>() as u64)?;
        let staging = client.create_staging_buffer("y_staging", y_bytes)?;

        debug!(
            kernel = compiled.name(),
            rows,
            groups,
            grid = ?grid,
            "launching spmv"
        );

        let start = Instant::now();
        for (buffer, (_, bytes)) in operands.iter().zip(inputs) {
            client.write_buffer(buffer, *bytes)?;
        }
        client.write_buffer(&params_buffer, &[params])?;
        client.flush()?;

        let launch = Instant::now();
        let mut bound: Vec<&Buffer> = operands.iter().collect();
        bound.push(&y);
        bound.push(&params_buffer);
        let submission = launch_spmv(
            client.pipeline_cache(),
            client.wgpu_queue(),
            &compiled,
            &bound,
            grid,
        )?;
        client.wait(Some(submission))?;
        let compute = launch.elapsed();

        let mut out = vec![0.0f32; rows];
        if rows > 0 {
            let mut encoder =
                client.wgpu_device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("spmv_readback"),
                });
            encoder.copy_buffer_to_buffer(&y, 0, &staging, 0, y_bytes);
            client.submit_and_wait(encoder)?;
            client.read_buffer(&staging, &mut out)?;
        }
        let total = start.elapsed();

        debug!(kernel = compiled.name(), ?total, ?compute, "spmv done");
        Ok((out, SpmvTiming { total, compute }))
    }

    fn finish(
        &self,
        method: SpmvMethod,
        m: &impl SparseStorage,
        y: Vec<f32>,
        timing: SpmvTiming,
        reference: Option<&Reference>,
    ) -> SpmvRun {
        let result = DenseMatrix::column(y);
        let verification =
            reference.map(|r| check_result(method.title(), r, &result, self.tolerance));
        SpmvRun {
            method,
            result,
            matrix_shape: (m.width(), m.height()),
            timing,
            verification,
        }
    }
}
