//! Run configuration: kernel launch geometry, tolerances and device choice

use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::verify::Tolerance;

/// Default invocations per work-group for the row-per-invocation kernels
pub const DEFAULT_WORKGROUP_SIZE: u32 = 256;

/// Default lanes per warp (NVIDIA warp width)
pub const DEFAULT_LANES: u32 = 32;

/// Default warps per work-group for the CSR-Vector kernel
pub const DEFAULT_WARPS_PER_BLOCK: u32 = 1;

/// Largest accepted lanes-per-warp value
pub const MAX_LANES: u32 = 256;

/// Launch geometry of the SpMV kernels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelGeometry {
    /// Invocations per work-group for `spmvCSR` and `spmvELL`
    pub workgroup_size: u32,
    /// Lanes cooperating on one row in `kernelSpmvCSRVect`; a power of two
    pub lanes: u32,
    /// Warps per work-group in `kernelSpmvCSRVect`
    pub warps_per_block: u32,
}

impl Default for KernelGeometry {
    fn default() -> Self {
        Self {
            workgroup_size: DEFAULT_WORKGROUP_SIZE,
            lanes: DEFAULT_LANES,
            warps_per_block: DEFAULT_WARPS_PER_BLOCK,
        }
    }
}

impl KernelGeometry {
    /// Create a validated geometry
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if a value is zero, `lanes` is not a power
    /// of two or exceeds [`MAX_LANES`], or the CSR-Vector work-group size
    /// overflows.
    pub fn new(workgroup_size: u32, lanes: u32, warps_per_block: u32) -> Result<Self> {
        let geometry = Self {
            workgroup_size,
            lanes,
            warps_per_block,
        };
        geometry.validate()?;
        Ok(geometry)
    }

    /// Check the invariants listed on [`KernelGeometry::new`]
    pub fn validate(&self) -> Result<()> {
        if self.workgroup_size == 0 {
            return Err(Error::invalid_argument("workgroup_size", "must be > 0"));
        }
        if !self.lanes.is_power_of_two() || self.lanes > MAX_LANES {
            return Err(Error::invalid_argument(
                "lanes",
                format!(
                    "{} must be a power of two in [1, {MAX_LANES}]",
                    self.lanes
                ),
            ));
        }
        if self.warps_per_block == 0 {
            return Err(Error::invalid_argument("warps_per_block", "must be > 0"));
        }
        if self.lanes.checked_mul(self.warps_per_block).is_none() {
            return Err(Error::invalid_argument(
                "warps_per_block",
                "lanes * warps_per_block overflows",
            ));
        }
        Ok(())
    }

    /// Invocations per work-group of the CSR-Vector kernel
    #[inline]
    pub fn vector_workgroup_size(&self) -> u32 {
        self.lanes * self.warps_per_block
    }

    /// Number of tree-reduction steps, `log2(lanes)`
    #[inline]
    pub fn reduction_steps(&self) -> u32 {
        self.lanes.trailing_zeros()
    }

    /// Cap the row-per-invocation work-group size to a device limit.
    ///
    /// The CSR-Vector size is left alone: lanes are part of the algorithm,
    /// and an oversized warp group is reported as a device error instead.
    pub fn fit_to_device(mut self, max_workgroup_size: u32) -> Self {
        self.workgroup_size = self.workgroup_size.min(max_workgroup_size.max(1));
        self
    }
}

/// Everything the driver needs for one run
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Dataset basename; `X` reads `X.M` and `X.V`
    pub dataset: PathBuf,
    /// Adapter index, in enumeration order
    pub adapter_index: usize,
    /// Kernel launch geometry
    pub geometry: KernelGeometry,
    /// Verification tolerance
    pub tolerance: Tolerance,
    /// Dump inputs, encodings and results
    pub print_matrices: bool,
}

impl RunConfig {
    /// Configuration with defaults for `dataset`
    pub fn new(dataset: impl Into<PathBuf>) -> Self {
        Self {
            dataset: dataset.into(),
            adapter_index: 0,
            geometry: KernelGeometry::default(),
            tolerance: Tolerance::default(),
            print_matrices: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_geometry() {
        let g = KernelGeometry::default();
        assert!(g.validate().is_ok());
        assert_eq!(g.vector_workgroup_size(), 32);
        assert_eq!(g.reduction_steps(), 5);
    }

    #[test]
    fn test_geometry_validation() {
        assert!(KernelGeometry::new(256, 32, 4).is_ok());
        assert!(KernelGeometry::new(256, 1, 1).is_ok());
        assert!(KernelGeometry::new(0, 32, 1).is_err());
        assert!(KernelGeometry::new(256, 24, 1).is_err());
        assert!(KernelGeometry::new(256, 0, 1).is_err());
        assert!(KernelGeometry::new(256, 512, 1).is_err());
        assert!(KernelGeometry::new(256, 32, 0).is_err());
        assert!(KernelGeometry::new(256, 256, u32::MAX).is_err());
    }

    #[test]
    fn test_reduction_steps_follow_lanes() {
        assert_eq!(KernelGeometry::new(64, 8, 1).unwrap().reduction_steps(), 3);
        assert_eq!(KernelGeometry::new(64, 64, 1).unwrap().reduction_steps(), 6);
        assert_eq!(KernelGeometry::new(64, 1, 1).unwrap().reduction_steps(), 0);
    }

    #[test]
    fn test_fit_to_device() {
        let g = KernelGeometry::new(1024, 32, 8).unwrap().fit_to_device(256);
        assert_eq!(g.workgroup_size, 256);
        assert_eq!(g.vector_workgroup_size(), 256);

        let g = KernelGeometry::default().fit_to_device(1024);
        assert_eq!(g.workgroup_size, 256);
    }

    #[test]
    fn test_run_config_defaults() {
        let cfg = RunConfig::new("mat_1000x1500_0.50");
        assert_eq!(cfg.adapter_index, 0);
        assert_eq!(cfg.geometry, KernelGeometry::default());
        assert!(!cfg.print_matrices);
    }
}
