//! WebGPU device selection.
//!
//! `WgpuDevice` names an adapter by index and caches its properties once the
//! adapter has been queried.
//!
//! Adapters are ordered GPUs first (discrete, integrated, virtual), then
//! software and unknown adapters, keeping enumeration order within each
//! class. Index 0 is therefore the first GPU when one exists.

use std::fmt;
use std::sync::Arc;

use wgpu::{Adapter, Backend, DeviceType, Limits};

use super::shaders::max_workgroup_size;
use crate::error::DeviceError;

/// Cached adapter information for a WebGPU device.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// Adapter name (e.g., "NVIDIA GeForce RTX 4090")
    pub name: String,
    /// PCI vendor id
    pub vendor: u32,
    /// Adapter class
    pub device_type: DeviceType,
    /// Driver name
    pub driver: String,
    /// Driver version details
    pub driver_info: String,
    /// Backend type (Vulkan, Metal, DX12, etc.)
    pub backend: Backend,
    /// Device limits
    pub limits: Limits,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?}", self.name, self.device_type, self.backend)?;
        if !self.driver.is_empty() {
            write!(f, ", {} {}", self.driver, self.driver_info)?;
        }
        write!(f, ")")
    }
}

/// WebGPU device identifier.
///
/// ```ignore
/// let device = WgpuDevice::new(0);  // First GPU
/// let client = WgpuClient::new(device)?;
/// println!("Device: {}", client.device().adapter_name());
/// ```
#[derive(Clone)]
pub struct WgpuDevice {
    /// Device index (adapter order)
    pub(crate) index: usize,
    /// Cached adapter info (lazily populated)
    info: Option<Arc<AdapterInfo>>,
}

impl WgpuDevice {
    /// Create a device identifier for the specified adapter index.
    ///
    /// This does not initialize the GPU - that happens when `WgpuClient::new`
    /// is called.
    pub fn new(index: usize) -> Self {
        Self { index, info: None }
    }

    pub(crate) fn with_info(index: usize, info: Arc<AdapterInfo>) -> Self {
        Self {
            index,
            info: Some(info),
        }
    }

    /// Adapter index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Adapter properties, `None` before the client is created
    pub fn info(&self) -> Option<&AdapterInfo> {
        self.info.as_deref()
    }

    /// Get the adapter name.
    ///
    /// Returns "unknown" if the device hasn't been initialized yet.
    pub fn adapter_name(&self) -> String {
        self.info
            .as_ref()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }

    /// Get the backend type (Vulkan, Metal, DX12, etc.).
    pub fn backend(&self) -> Option<Backend> {
        self.info.as_ref().map(|i| i.backend)
    }

    /// Get device limits.
    ///
    /// Returns default limits if the device hasn't been initialized yet.
    pub fn limits(&self) -> Limits {
        self.info
            .as_ref()
            .map(|i| i.limits.clone())
            .unwrap_or_default()
    }

    /// Largest one-dimensional work-group.
    pub fn max_workgroup_size(&self) -> u32 {
        max_workgroup_size(&self.limits())
    }
}

impl fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("index", &self.index)
            .field("adapter", &self.adapter_name())
            .field("backend", &self.backend())
            .finish()
    }
}

// ============================================================================
// Adapter Discovery
// ============================================================================

fn device_type_rank(device_type: DeviceType) -> u8 {
    match device_type {
        DeviceType::DiscreteGpu => 0,
        DeviceType::IntegratedGpu => 1,
        DeviceType::VirtualGpu => 2,
        DeviceType::Cpu => 3,
        DeviceType::Other => 4,
    }
}

async fn enumerate_adapters() -> Vec<Adapter> {
    let instance = wgpu::Instance::default();
    let mut adapters: Vec<_> = instance.enumerate_adapters(wgpu::Backends::all()).await;
    adapters.sort_by_key(|a| device_type_rank(a.get_info().device_type));
    adapters
}

/// Query adapter information for a device index.
///
/// # Errors
///
/// `NoAdapter` when the system exposes no adapter at all,
/// `AdapterNotFound` when `index` is out of range.
pub(crate) async fn query_adapter_info(
    index: usize,
) -> Result<(Adapter, Arc<AdapterInfo>), DeviceError> {
    let mut adapters = enumerate_adapters().await;

    if adapters.is_empty() {
        return Err(DeviceError::NoAdapter);
    }
    if index >= adapters.len() {
        return Err(DeviceError::AdapterNotFound {
            index,
            available: adapters.len(),
        });
    }
    let adapter = adapters.swap_remove(index);

    let wgpu_info = adapter.get_info();
    let info = Arc::new(AdapterInfo {
        name: wgpu_info.name,
        vendor: wgpu_info.vendor,
        device_type: wgpu_info.device_type,
        driver: wgpu_info.driver,
        driver_info: wgpu_info.driver_info,
        backend: wgpu_info.backend,
        limits: adapter.limits(),
    });

    Ok((adapter, info))
}

/// Query adapter information synchronously using pollster.
pub(crate) fn query_adapter_info_blocking(
    index: usize,
) -> Result<(Adapter, Arc<AdapterInfo>), DeviceError> {
    pollster::block_on(query_adapter_info(index))
}

/// Properties of every adapter, in selection order
pub fn list_adapters() -> Vec<AdapterInfo> {
    pollster::block_on(enumerate_adapters())
        .into_iter()
        .map(|adapter| {
            let info = adapter.get_info();
            AdapterInfo {
                name: info.name,
                vendor: info.vendor,
                device_type: info.device_type,
                driver: info.driver,
                driver_info: info.driver_info,
                backend: info.backend,
                limits: adapter.limits(),
            }
        })
        .collect()
}
