//! Device error capture.
//!
//! wgpu reports most failures (validation, out-of-memory, backend compile
//! errors) asynchronously instead of through a return value. Wrapping the
//! call sites in error scopes turns them into a `Result` the caller can
//! classify.

use wgpu::{Device, ErrorFilter};

/// Run `op` with out-of-memory, validation and internal errors captured.
///
/// Scopes are thread-local, so the work must be issued from this thread.
/// When several errors are captured, the out-of-memory one is reported first.
pub(crate) fn capture_device_errors<R>(
    device: &Device,
    op: impl FnOnce() -> R,
) -> (R, Option<wgpu::Error>) {
    let internal = device.push_error_scope(ErrorFilter::Internal);
    let validation = device.push_error_scope(ErrorFilter::Validation);
    let out_of_memory = device.push_error_scope(ErrorFilter::OutOfMemory);

    let value = op();

    // innermost scope first
    let captured = [out_of_memory.pop(), validation.pop(), internal.pop()];
    let error = captured.into_iter().find_map(pollster::block_on);
    (value, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::wgpu::{WgpuClient, WgpuDevice, is_wgpu_available};

    fn client() -> Option<WgpuClient> {
        if !is_wgpu_available() {
            return None;
        }
        WgpuClient::new(WgpuDevice::new(0)).ok()
    }

    #[test]
    fn test_clean_operation_captures_nothing() {
        let Some(client) = client() else {
            return;
        };
        let (buffer, error) = capture_device_errors(client.wgpu_device(), || {
            client.wgpu_device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("ok"),
                size: 16,
                usage: wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        });
        assert!(error.is_none(), "{error:?}");
        assert_eq!(buffer.size(), 16);
    }

    #[test]
    fn test_invalid_buffer_is_captured() {
        let Some(client) = client() else {
            return;
        };
        // MAP_READ may only be combined with COPY_DST
        let (_, error) = capture_device_errors(client.wgpu_device(), || {
            client.wgpu_device().create_buffer(&wgpu::BufferDescriptor {
                label: Some("invalid"),
                size: 16,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::STORAGE,
                mapped_at_creation: false,
            })
        });
        assert!(matches!(error, Some(wgpu::Error::Validation { .. })), "{error:?}");
    }
}
