//! WebGPU Client implementation.
//!
//! `WgpuClient` owns the WebGPU device and queue, creates buffers within the
//! device limits and moves data between host and device.
//!
//! # Thread Safety
//!
//! `WgpuClient` is `Clone` and the underlying wgpu::Device and wgpu::Queue
//! are already `Send + Sync`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info};
use wgpu::{Buffer, BufferDescriptor, BufferUsages, Device, Limits, Queue, SubmissionIndex};

use super::device::{WgpuDevice, query_adapter_info_blocking};
use super::error_scope::capture_device_errors;
use super::shaders::PipelineCache;
use crate::error::DeviceError;

/// Upper bound on a blocking wait for submitted work
const WAIT_TIMEOUT: Duration = Duration::from_secs(60);

/// Smallest buffer created; bindings of size zero are invalid
const MIN_BUFFER_SIZE: u64 = 4;

/// WebGPU Runtime Client.
///
/// Owns the device and queue for kernel dispatch. Storage buffers hold
/// matrix data, staging buffers carry results back to the host.
#[derive(Clone)]
pub struct WgpuClient {
    /// GPU device identifier, with adapter info
    pub(crate) device_id: WgpuDevice,

    /// WebGPU device handle
    pub(crate) wgpu_device: Arc<Device>,

    /// WebGPU queue for command submission
    pub(crate) queue: Arc<Queue>,

    /// Pipeline cache for compute shaders
    pub(crate) pipeline_cache: Arc<PipelineCache>,
}

impl std::fmt::Debug for WgpuClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuClient")
            .field("device", &self.device_id)
            .finish_non_exhaustive()
    }
}

impl WgpuClient {
    /// Create a new WebGPU client for a device.
    ///
    /// The device is requested with the adapter's own limits so kernels can
    /// use everything the hardware offers.
    ///
    /// # Errors
    ///
    /// - `NoAdapter` / `AdapterNotFound` if the adapter cannot be selected
    /// - `DeviceRequest` if device creation fails
    pub fn new(device: WgpuDevice) -> Result<Self, DeviceError> {
        let (adapter, info) = query_adapter_info_blocking(device.index)?;

        let (wgpu_device, queue) = pollster::block_on(async {
            adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("spmvlab WebGPU Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: info.limits.clone(),
                    memory_hints: wgpu::MemoryHints::Performance,
                    trace: wgpu::Trace::Off,
                    experimental_features: wgpu::ExperimentalFeatures::default(),
                })
                .await
        })
        .map_err(|e| DeviceError::DeviceRequest(e.to_string()))?;

        info!(
            index = device.index,
            vendor = info.vendor,
            max_workgroup_size = super::shaders::max_workgroup_size(&info.limits),
            "Using device: {}",
            info
        );

        // errors outside a capture scope are logged instead of panicking
        wgpu_device.on_uncaptured_error(Arc::new(|err: wgpu::Error| {
            error!("uncaptured device error: {err}");
        }));

        let wgpu_device = Arc::new(wgpu_device);
        let queue = Arc::new(queue);
        let pipeline_cache = Arc::new(PipelineCache::new(
            wgpu_device.clone(),
            info.limits.clone(),
        ));

        Ok(Self {
            device_id: WgpuDevice::with_info(device.index, info),
            wgpu_device,
            queue,
            pipeline_cache,
        })
    }

    /// Device identifier, with adapter info
    #[inline]
    pub fn device(&self) -> &WgpuDevice {
        &self.device_id
    }

    /// Get reference to the WebGPU device.
    #[inline]
    pub fn wgpu_device(&self) -> &Device {
        &self.wgpu_device
    }

    /// Get reference to the WebGPU queue.
    #[inline]
    pub fn wgpu_queue(&self) -> &Queue {
        &self.queue
    }

    /// Get reference to the pipeline cache.
    #[inline]
    pub fn pipeline_cache(&self) -> &PipelineCache {
        &self.pipeline_cache
    }

    /// Limits the device was created with
    #[inline]
    pub fn limits(&self) -> &Limits {
        self.pipeline_cache.limits()
    }

    fn create_buffer(
        &self,
        label: &str,
        size: u64,
        max: u64,
        usage: BufferUsages,
    ) -> Result<Buffer, DeviceError> {
        let size = size.max(MIN_BUFFER_SIZE).next_multiple_of(MIN_BUFFER_SIZE);
        if size > max {
            return Err(DeviceError::BufferAllocation {
                label: label.to_string(),
                size,
                max,
            });
        }
        debug!(label, size, "creating buffer");
        let (buffer, captured) = capture_device_errors(&self.wgpu_device, || {
            self.wgpu_device.create_buffer(&BufferDescriptor {
                label: Some(label),
                size,
                usage,
                mapped_at_creation: false,
            })
        });
        match captured {
            Some(err) => Err(DeviceError::Allocation {
                label: label.to_string(),
                size,
                reason: err.to_string(),
            }),
            None => Ok(buffer),
        }
    }

    /// Create a storage buffer for kernel operands.
    ///
    /// Empty operands still get a minimal buffer.
    ///
    /// # Errors
    ///
    /// `BufferAllocation` if `size` exceeds the storage binding or buffer limit.
    pub fn create_storage_buffer(&self, label: &str, size: u64) -> Result<Buffer, DeviceError> {
        let limits = self.limits();
        let max = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        self.create_buffer(
            label,
            size,
            max,
            BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC,
        )
    }

    /// Create a staging buffer for CPU readback.
    pub fn create_staging_buffer(&self, label: &str, size: u64) -> Result<Buffer, DeviceError> {
        self.create_buffer(
            label,
            size,
            self.limits().max_buffer_size,
            BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        )
    }

    /// Create a uniform buffer for shader parameters.
    pub fn create_uniform_buffer(&self, label: &str, size: u64) -> Result<Buffer, DeviceError> {
        self.create_buffer(
            label,
            size,
            self.limits().max_uniform_buffer_binding_size as u64,
            BufferUsages::UNIFORM | BufferUsages::COPY_DST,
        )
    }

    /// Write data to a buffer.
    ///
    /// # Errors
    ///
    /// `Execution` if the device rejects the write.
    pub fn write_buffer<T: bytemuck::Pod>(
        &self,
        buffer: &Buffer,
        data: &[T],
    ) -> Result<(), DeviceError> {
        if data.is_empty() {
            return Ok(());
        }
        let ((), captured) = capture_device_errors(&self.wgpu_device, || {
            self.queue.write_buffer(buffer, 0, bytemuck::cast_slice(data));
        });
        captured.map_or(Ok(()), |err| Err(DeviceError::Execution(err.to_string())))
    }

    /// Block until `submission` (or all work, for `None`) has completed.
    pub fn wait(&self, submission: Option<SubmissionIndex>) -> Result<(), DeviceError> {
        self.wgpu_device
            .poll(wgpu::PollType::Wait {
                submission_index: submission,
                timeout: Some(WAIT_TIMEOUT),
            })
            .map(|_| ())
            .map_err(|e| DeviceError::Execution(e.to_string()))
    }

    /// Submit pending queue writes and wait for them to land.
    pub fn flush(&self) -> Result<(), DeviceError> {
        let submission = self.queue.submit(std::iter::empty::<wgpu::CommandBuffer>());
        self.wait(Some(submission))
    }

    /// Submit commands and wait for completion.
    pub fn submit_and_wait(&self, encoder: wgpu::CommandEncoder) -> Result<(), DeviceError> {
        let (submission, captured) = capture_device_errors(&self.wgpu_device, || {
            self.queue.submit(std::iter::once(encoder.finish()))
        });
        if let Some(err) = captured {
            return Err(DeviceError::Execution(err.to_string()));
        }
        self.wait(Some(submission))
    }

    /// Read buffer data back to CPU (blocking).
    pub fn read_buffer<T: bytemuck::Pod>(
        &self,
        staging: &Buffer,
        output: &mut [T],
    ) -> Result<(), DeviceError> {
        let bytes = std::mem::size_of_val(output) as u64;
        if bytes == 0 {
            return Ok(());
        }
        let slice = staging.slice(..bytes);

        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        self.wait(None)?;

        let map_result = receiver.recv().map_err(|_| {
            DeviceError::Map("map_async callback was not invoked during buffer read".into())
        })?;
        map_result.map_err(|e| DeviceError::Map(e.to_string()))?;

        {
            let data = slice.get_mapped_range();
            let src: &[T] = bytemuck::cast_slice(&data);
            output.copy_from_slice(src);
        }

        staging.unmap();
        Ok(())
    }
}
