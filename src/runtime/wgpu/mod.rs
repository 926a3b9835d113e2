//! WebGPU backend (requires `wgpu` feature)
//!
//! Runs the SpMV kernels on any adapter wgpu exposes (Vulkan, Metal, DX12,
//! GL). Kernels are WGSL generated for the configured launch geometry.
//!
//! ```ignore
//! let client = WgpuClient::new(WgpuDevice::new(0))?;
//! let kernels = KernelConfig::for_device(&KernelGeometry::default(), &client)?;
//! let gpu = SpmvDispatcher::new(client, kernels, Tolerance::default());
//! let run = gpu.spmv_csr(&csr, &v, Some(&reference))?;
//! ```

mod client;
mod device;
mod error_scope;
pub mod shaders;
mod spmv;

pub use client::WgpuClient;
pub use device::{AdapterInfo, WgpuDevice, list_adapters};
pub use spmv::{KernelConfig, SpmvDispatcher, SpmvParams};

/// Check if WebGPU is available on this system
pub fn is_wgpu_available() -> bool {
    device::query_adapter_info_blocking(0).is_ok()
}
