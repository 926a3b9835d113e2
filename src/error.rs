//! Error types for spmvlab

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using spmvlab's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in spmvlab operations
#[derive(Error, Debug)]
pub enum Error {
    /// Operand dimensions are incompatible for the operation
    #[error("{op}: size mismatch, expected {expected} got {got}")]
    ShapeMismatch {
        /// The operation that rejected its operands
        op: &'static str,
        /// Expected extent
        expected: usize,
        /// Actual extent
        got: usize,
    },

    /// A column vector (width 1) was required
    #[error("{op}: vector size mismatch, expected a column vector but width is {width}")]
    NotColumnVector {
        /// The operation that rejected its operand
        op: &'static str,
        /// Width of the offending operand
        width: usize,
    },

    /// Invalid argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Sparse storage violates one of its structural invariants
    #[error("Invalid {format} matrix: {reason}")]
    InvalidFormat {
        /// Storage format name
        format: &'static str,
        /// Which invariant is broken
        reason: String,
    },

    /// Matrix file could not be read or written
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// File involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Matrix file content is malformed
    #[error("{}:{line}: {reason}", path.display())]
    Parse {
        /// File involved
        path: PathBuf,
        /// 1-based line number
        line: usize,
        /// What was wrong
        reason: String,
    },

    /// Compute device failure
    #[error(transparent)]
    Device(#[from] DeviceError),
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(op: &'static str, expected: usize, got: usize) -> Self {
        Self::ShapeMismatch { op, expected, got }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Create an invalid sparse format error
    pub fn invalid_format(format: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            format,
            reason: reason.into(),
        }
    }

    /// Returns true for errors raised by argument validation, before any device work
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::ShapeMismatch { .. } | Self::NotColumnVector { .. } | Self::InvalidArgument { .. }
        )
    }
}

/// Failures of the compute device, its program builds and kernel launches.
///
/// Every variant maps to a stable category name through [`DeviceError::category`],
/// which the driver prints before aborting the run.
#[derive(Error, Debug, Clone)]
pub enum DeviceError {
    /// No suitable GPU adapter found.
    #[error("No compute adapter found. Check the GPU driver installation")]
    NoAdapter,

    /// The requested adapter index does not exist.
    #[error("Adapter {index} requested but only {available} available")]
    AdapterNotFound {
        /// Requested adapter index
        index: usize,
        /// Number of adapters found
        available: usize,
    },

    /// Device or queue creation failed.
    #[error("Device request failed: {0}")]
    DeviceRequest(String),

    /// Kernel source failed to compile. `log` holds the compiler output.
    #[error("Program build failed for kernel '{kernel}'")]
    Build {
        /// Kernel name
        kernel: String,
        /// Human-readable build log
        log: String,
    },

    /// The program does not define the requested kernel entry point.
    #[error("Kernel '{kernel}' is not defined by its program")]
    InvalidKernelName {
        /// Kernel name
        kernel: String,
    },

    /// Work-group size exceeds what the device supports.
    #[error("Work-group size {requested} exceeds the device maximum of {max}")]
    InvalidWorkGroupSize {
        /// Requested invocations per work-group
        requested: u32,
        /// Device maximum
        max: u32,
    },

    /// Work-group shared memory exceeds what the device supports.
    #[error("Kernel '{kernel}' needs {requested} bytes of work-group memory, device allows {max}")]
    OutOfLocalMemory {
        /// Kernel name
        kernel: String,
        /// Requested bytes
        requested: u64,
        /// Device maximum
        max: u64,
    },

    /// Too many work-groups for a single dispatch.
    #[error("{groups} work-groups exceed the device dispatch limit")]
    InvalidGlobalWorkSize {
        /// Requested work-group count
        groups: u64,
        /// Per-dimension device maximum
        max_per_dimension: u32,
    },

    /// Buffer larger than the device allows.
    #[error("Cannot allocate buffer '{label}' of {size} bytes (device limit {max})")]
    BufferAllocation {
        /// Buffer label
        label: String,
        /// Requested bytes
        size: u64,
        /// Device maximum
        max: u64,
    },

    /// The device could not create a buffer within the limits, e.g. out of memory.
    #[error("Device failed to allocate buffer '{label}' of {size} bytes: {reason}")]
    Allocation {
        /// Buffer label
        label: String,
        /// Requested bytes
        size: u64,
        /// Device error message
        reason: String,
    },

    /// Mapping a buffer for host readback failed.
    #[error("Buffer map failed: {0}")]
    Map(String),

    /// Waiting for submitted work failed or timed out.
    #[error("Device execution failed: {0}")]
    Execution(String),
}

impl DeviceError {
    /// Stable category name of the error, for diagnostics.
    pub fn category(&self) -> &'static str {
        match self {
            DeviceError::NoAdapter => "NO_ADAPTER",
            DeviceError::AdapterNotFound { .. } => "DEVICE_NOT_FOUND",
            DeviceError::DeviceRequest(_) => "DEVICE_REQUEST_FAILURE",
            DeviceError::Build { .. } => "BUILD_PROGRAM_FAILURE",
            DeviceError::InvalidKernelName { .. } => "INVALID_KERNEL_NAME",
            DeviceError::InvalidWorkGroupSize { .. } => "INVALID_WORK_GROUP_SIZE",
            DeviceError::OutOfLocalMemory { .. } => "OUT_OF_RESOURCES",
            DeviceError::InvalidGlobalWorkSize { .. } => "INVALID_GLOBAL_WORK_SIZE",
            DeviceError::BufferAllocation { .. } | DeviceError::Allocation { .. } => {
                "MEM_OBJECT_ALLOCATION_FAILURE"
            }
            DeviceError::Map(_) => "MAP_FAILURE",
            DeviceError::Execution(_) => "EXECUTION_FAILURE",
        }
    }

    /// Build log attached to a program build failure.
    pub fn build_log(&self) -> Option<&str> {
        match self {
            DeviceError::Build { log, .. } => Some(log),
            _ => None,
        }
    }
}
