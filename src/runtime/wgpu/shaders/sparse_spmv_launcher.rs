//! WGSL kernel launcher for sparse matrix-vector multiplication.
//!
//! Encodes one compute pass for any of the SpMV kernels and submits it.
//! Buffers are bound in the order of the kernel's [`LayoutKey`]:
//!
//! | Kernel | Buffers |
//! |--------|---------|
//! | `spmvCSR`, `kernelSpmvCSRVect` | values, col_ind, row_ptr, v, y, params |
//! | `spmvELL` | data, col_ind, v, y, params |
//!
//! [`LayoutKey`]: super::pipeline::LayoutKey

use wgpu::{Buffer, Queue, SubmissionIndex};

use super::pipeline::{CompiledKernel, PipelineCache};
use crate::error::DeviceError;
use crate::runtime::wgpu::error_scope::capture_device_errors;

/// Launch a compiled SpMV kernel on a `(x, y)` work-group grid.
///
/// An empty grid submits an empty command buffer, so the returned index can
/// always be waited on.
///
/// # Errors
///
/// `Execution` if the device rejects the bind group, the pass or the
/// submission.
pub fn launch_spmv(
    cache: &PipelineCache,
    queue: &Queue,
    kernel: &CompiledKernel,
    buffers: &[&Buffer],
    grid: (u32, u32),
) -> Result<SubmissionIndex, DeviceError> {
    let device = cache.device();
    let (submission, captured) = capture_device_errors(device, || {
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(kernel.name()),
        });

        if grid.0 > 0 && grid.1 > 0 {
            let bind_group = cache.create_bind_group(kernel.layout(), buffers);
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some(kernel.name()),
                timestamp_writes: None,
            });
            pass.set_pipeline(kernel.pipeline());
            pass.set_bind_group(0, Some(&bind_group), &[]);
            pass.dispatch_workgroups(grid.0, grid.1, 1);
        }

        queue.submit(std::iter::once(encoder.finish()))
    });

    match captured {
        Some(err) => Err(DeviceError::Execution(format!("{}: {err}", kernel.name()))),
        None => Ok(submission),
    }
}
