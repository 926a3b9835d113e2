//! WGSL compute pipeline infrastructure
//!
//! Builds kernels from WGSL source, caches the resulting pipelines and
//! bind group layouts, and computes dispatch grids within device limits.
//!
//! A build runs the WGSL front end and validator before handing the module
//! to the device, so compile errors come back as a readable log instead of
//! an uncaptured device error.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};
use wgpu::naga;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, Buffer, BufferBindingType, ComputePipeline,
    ComputePipelineDescriptor, Device, Limits, PipelineLayoutDescriptor, ShaderModuleDescriptor,
    ShaderSource, ShaderStages,
};

use crate::error::DeviceError;
use crate::runtime::wgpu::error_scope::capture_device_errors;

/// Key for bind group layout cache.
///
/// Bindings are numbered in order: read-only storage buffers first, then
/// read-write storage buffers, then uniform buffers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    /// Read-only storage buffers
    pub read_only_storage: u32,
    /// Read-write storage buffers
    pub read_write_storage: u32,
    /// Uniform buffers
    pub uniform: u32,
}

impl LayoutKey {
    /// Total number of bindings
    pub fn len(&self) -> u32 {
        self.read_only_storage + self.read_write_storage + self.uniform
    }

    /// Layout without bindings
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// WGSL program and the launch parameters baked into it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KernelSource {
    /// Entry point name
    pub name: String,
    /// WGSL source
    pub source: String,
    /// `@workgroup_size` of the entry point
    pub workgroup_size: u32,
    /// Bytes of `var<workgroup>` storage
    pub workgroup_storage_bytes: u64,
    /// Bindings of the entry point
    pub layout: LayoutKey,
}

/// A kernel ready to dispatch
pub struct CompiledKernel {
    name: String,
    workgroup_size: u32,
    pipeline: ComputePipeline,
    layout: Arc<BindGroupLayout>,
}

impl CompiledKernel {
    /// Entry point name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invocations per work-group
    pub fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }

    /// Compute pipeline
    pub fn pipeline(&self) -> &ComputePipeline {
        &self.pipeline
    }

    /// Bind group layout
    pub fn layout(&self) -> &BindGroupLayout {
        &self.layout
    }
}

impl std::fmt::Debug for CompiledKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledKernel")
            .field("name", &self.name)
            .field("workgroup_size", &self.workgroup_size)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Pipeline Cache
// ============================================================================

/// Cache for compiled kernels and bind group layouts
pub struct PipelineCache {
    device: Arc<Device>,
    limits: Limits,
    /// Compiled kernels by source
    kernels: Mutex<HashMap<KernelSource, Arc<CompiledKernel>>>,
    /// Bind group layouts by layout key
    layouts: Mutex<HashMap<LayoutKey, Arc<BindGroupLayout>>>,
}

impl PipelineCache {
    /// Create a new pipeline cache for a device with the given limits
    pub fn new(device: Arc<Device>, limits: Limits) -> Self {
        Self {
            device,
            limits,
            kernels: Mutex::new(HashMap::new()),
            layouts: Mutex::new(HashMap::new()),
        }
    }

    /// Build a kernel, or return the cached build of the same source.
    ///
    /// # Errors
    ///
    /// - `InvalidWorkGroupSize` if the work-group exceeds the device maximum
    /// - `OutOfLocalMemory` if work-group storage exceeds the device maximum
    /// - `Build` if the source does not compile, with the compiler log
    /// - `InvalidKernelName` if the program has no such entry point
    pub fn build_kernel(&self, kernel: &KernelSource) -> Result<Arc<CompiledKernel>, DeviceError> {
        if let Some(compiled) = self.kernels.lock().get(kernel) {
            return Ok(compiled.clone());
        }

        let max = max_workgroup_size(&self.limits);
        if kernel.workgroup_size == 0 || kernel.workgroup_size > max {
            return Err(DeviceError::InvalidWorkGroupSize {
                requested: kernel.workgroup_size,
                max,
            });
        }
        let max_storage = u64::from(self.limits.max_compute_workgroup_storage_size);
        if kernel.workgroup_storage_bytes > max_storage {
            return Err(DeviceError::OutOfLocalMemory {
                kernel: kernel.name.clone(),
                requested: kernel.workgroup_storage_bytes,
                max: max_storage,
            });
        }
        check_kernel_source(kernel)?;

        // the backend compiler may still reject what naga accepted
        let layout = self.get_or_create_layout(kernel.layout);
        let (pipeline, captured) = capture_device_errors(&self.device, || {
            let module = self.device.create_shader_module(ShaderModuleDescriptor {
                label: Some(&kernel.name),
                source: ShaderSource::Wgsl(kernel.source.as_str().into()),
            });
            let pipeline_layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
                label: Some(&format!("{}_layout", kernel.name)),
                bind_group_layouts: &[&layout],
                immediate_size: 0,
            });
            self.device.create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(&kernel.name),
                layout: Some(&pipeline_layout),
                module: &module,
                entry_point: Some(&kernel.name),
                compilation_options: Default::default(),
                cache: None,
            })
        });
        if let Some(err) = captured {
            return Err(DeviceError::Build {
                kernel: kernel.name.clone(),
                log: error_chain(&err),
            });
        }

        info!(
            kernel = %kernel.name,
            workgroup_size = kernel.workgroup_size,
            "Program successfully built"
        );

        let compiled = Arc::new(CompiledKernel {
            name: kernel.name.clone(),
            workgroup_size: kernel.workgroup_size,
            pipeline,
            layout,
        });
        self.kernels.lock().insert(kernel.clone(), compiled.clone());
        Ok(compiled)
    }

    /// Get or create a bind group layout
    pub fn get_or_create_layout(&self, key: LayoutKey) -> Arc<BindGroupLayout> {
        let mut layouts = self.layouts.lock();

        if let Some(layout) = layouts.get(&key) {
            return layout.clone();
        }

        let buffer_entry = |binding: u32, ty: BufferBindingType| BindGroupLayoutEntry {
            binding,
            visibility: ShaderStages::COMPUTE,
            ty: BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let mut entries = Vec::with_capacity(key.len() as usize);
        let mut binding = 0;
        for _ in 0..key.read_only_storage {
            entries.push(buffer_entry(
                binding,
                BufferBindingType::Storage { read_only: true },
            ));
            binding += 1;
        }
        for _ in 0..key.read_write_storage {
            entries.push(buffer_entry(
                binding,
                BufferBindingType::Storage { read_only: false },
            ));
            binding += 1;
        }
        for _ in 0..key.uniform {
            entries.push(buffer_entry(binding, BufferBindingType::Uniform));
            binding += 1;
        }

        let layout = self.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("spmv_layout"),
            entries: &entries,
        });

        let layout = Arc::new(layout);
        layouts.insert(key, layout.clone());
        layout
    }

    /// Create a bind group from buffers, bound in order
    pub fn create_bind_group(&self, layout: &BindGroupLayout, buffers: &[&Buffer]) -> BindGroup {
        let entries: Vec<BindGroupEntry> = buffers
            .iter()
            .enumerate()
            .map(|(i, buffer)| BindGroupEntry {
                binding: i as u32,
                resource: buffer.as_entire_binding(),
            })
            .collect();

        self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("spmv_bind_group"),
            layout,
            entries: &entries,
        })
    }

    /// Get device reference
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Limits the cache checks kernels against
    pub fn limits(&self) -> &Limits {
        &self.limits
    }
}

// ============================================================================
// Source Checks
// ============================================================================

/// Compile and validate a kernel source without a device.
///
/// # Errors
///
/// `Build` with the front-end or validator log, or `InvalidKernelName` when
/// the module has no entry point named `kernel.name`.
pub fn check_kernel_source(kernel: &KernelSource) -> Result<(), DeviceError> {
    let module = naga::front::wgsl::parse_str(&kernel.source).map_err(|e| DeviceError::Build {
        kernel: kernel.name.clone(),
        log: e.emit_to_string(&kernel.source),
    })?;

    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::empty(),
    )
    .validate(&module)
    .map_err(|e| DeviceError::Build {
        kernel: kernel.name.clone(),
        log: error_chain(&e),
    })?;

    if !module.entry_points.iter().any(|ep| ep.name == kernel.name) {
        return Err(DeviceError::InvalidKernelName {
            kernel: kernel.name.clone(),
        });
    }
    debug!(kernel = %kernel.name, "kernel source validated");
    Ok(())
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut log = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        log.push_str("\n  caused by: ");
        log.push_str(&cause.to_string());
        source = cause.source();
    }
    log
}

// ============================================================================
// Dispatch Helpers
// ============================================================================

/// Largest work-group a one-dimensional kernel may declare
pub fn max_workgroup_size(limits: &Limits) -> u32 {
    limits
        .max_compute_invocations_per_workgroup
        .min(limits.max_compute_workgroup_size_x)
}

/// Compute number of work-groups covering `n` items
#[inline]
pub fn workgroup_count(n: usize, workgroup_size: u32) -> u64 {
    (n as u64).div_ceil(u64::from(workgroup_size.max(1)))
}

/// Arrange `groups` work-groups on an `(x, y)` grid.
///
/// Stays one-dimensional when possible. Otherwise `x` is the per-dimension
/// maximum and `y` rounds up, so the grid may hold a few surplus groups that
/// kernels mask out.
///
/// # Errors
///
/// `InvalidGlobalWorkSize` if even the folded grid exceeds the limit.
pub fn dispatch_grid(groups: u64, max_per_dimension: u32) -> Result<(u32, u32), DeviceError> {
    let max = u64::from(max_per_dimension);
    if groups == 0 {
        return Ok((0, 0));
    }
    if groups <= max {
        return Ok((groups as u32, 1));
    }
    let y = groups.div_ceil(max);
    if y > max {
        return Err(DeviceError::InvalidGlobalWorkSize {
            groups,
            max_per_dimension,
        });
    }
    Ok((max_per_dimension, y as u32))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel(name: &str, source: &str) -> KernelSource {
        KernelSource {
            name: name.to_string(),
            source: source.to_string(),
            workgroup_size: 1,
            workgroup_storage_bytes: 0,
            layout: LayoutKey {
                read_only_storage: 0,
                read_write_storage: 1,
                uniform: 0,
            },
        }
    }

    const FILL: &str = r#"
@group(0) @binding(0) var<storage, read_write> out: array<f32>;

@compute @workgroup_size(1)
fn fill(@builtin(global_invocation_id) gid: vec3<u32>) {
    out[gid.x] = 1.0;
}
"#;

    #[test]
    fn test_check_valid_source() {
        assert!(check_kernel_source(&kernel("fill", FILL)).is_ok());
    }

    #[test]
    fn test_check_syntax_error_has_log() {
        let broken = FILL.replace("= 1.0;", "= 1.0");
        let err = check_kernel_source(&kernel("fill", &broken)).unwrap_err();
        assert_eq!(err.category(), "BUILD_PROGRAM_FAILURE");
        assert!(!err.build_log().unwrap().is_empty());
    }

    #[test]
    fn test_check_type_error_has_log() {
        let broken = FILL.replace("= 1.0;", "= 1u;");
        let err = check_kernel_source(&kernel("fill", &broken)).unwrap_err();
        assert!(matches!(err, DeviceError::Build { .. }));
    }

    #[test]
    fn test_check_missing_entry_point() {
        let err = check_kernel_source(&kernel("spmvCSR", FILL)).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::InvalidKernelName { ref kernel } if kernel == "spmvCSR"
        ));
    }

    #[test]
    fn test_dispatch_grid() {
        assert_eq!(dispatch_grid(0, 65535).unwrap(), (0, 0));
        assert_eq!(dispatch_grid(1, 65535).unwrap(), (1, 1));
        assert_eq!(dispatch_grid(65535, 65535).unwrap(), (65535, 1));
        assert_eq!(dispatch_grid(65536, 65535).unwrap(), (65535, 2));
        assert_eq!(dispatch_grid(10, 4).unwrap(), (4, 3));
        assert!(matches!(
            dispatch_grid(17, 4),
            Err(DeviceError::InvalidGlobalWorkSize { groups: 17, .. })
        ));
    }

    #[test]
    fn test_workgroup_count() {
        assert_eq!(workgroup_count(0, 256), 0);
        assert_eq!(workgroup_count(1, 256), 1);
        assert_eq!(workgroup_count(256, 256), 1);
        assert_eq!(workgroup_count(257, 256), 2);
        assert_eq!(workgroup_count(4, 1), 4);
    }

    #[test]
    fn test_layout_key_len() {
        let key = LayoutKey {
            read_only_storage: 4,
            read_write_storage: 1,
            uniform: 1,
        };
        assert_eq!(key.len(), 6);
        assert!(!key.is_empty());
    }

    #[test]
    fn test_max_workgroup_size() {
        let limits = Limits::default();
        assert_eq!(max_workgroup_size(&limits), 256);
        let limits = Limits::downlevel_defaults();
        assert!(max_workgroup_size(&limits) <= limits.max_compute_workgroup_size_x);
    }
}
