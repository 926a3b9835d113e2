//! WGSL shader generation for sparse matrix-vector multiplication.
//!
//! Three kernels compute `y = M * v` in f32:
//! - `spmvCSR` - one invocation per CSR row
//! - `kernelSpmvCSRVect` - one warp of `lanes` invocations per CSR row, with a
//!   tree reduction in work-group memory
//! - `spmvELL` - one invocation per ELL row, fixed row width
//!
//! Work-groups are addressed linearly as `wid.y * nwg.x + wid.x` so a
//! dispatch can be folded into two dimensions when the group count exceeds
//! the per-dimension limit. Surplus invocations are masked on the row index.

use std::fmt::Write;

use super::super::pipeline::{KernelSource, LayoutKey};
use crate::config::KernelGeometry;

/// Entry point of the row-per-invocation CSR kernel
pub const CSR_KERNEL: &str = "spmvCSR";

/// Entry point of the warp-per-row CSR kernel
pub const CSR_VECTOR_KERNEL: &str = "kernelSpmvCSRVect";

/// Entry point of the row-per-invocation ELL kernel
pub const ELL_KERNEL: &str = "spmvELL";

const SIZE_OF_F32: u64 = 4;

const PARAMS_STRUCT: &str = r#"struct SpmvParams {
    rows_nbr: u32,
    row_width: u32,
    _pad0: u32,
    _pad1: u32,
}
"#;

const CSR_BINDINGS: &str = r#"@group(0) @binding(0) var<storage, read> values: array<f32>;
@group(0) @binding(1) var<storage, read> col_ind: array<u32>;
@group(0) @binding(2) var<storage, read> row_ptr: array<u32>;
@group(0) @binding(3) var<storage, read> v: array<f32>;
@group(0) @binding(4) var<storage, read_write> y: array<f32>;
@group(0) @binding(5) var<uniform> params: SpmvParams;
"#;

/// Bindings of both CSR kernels: values, col_ind, row_ptr, v, y, params
pub const CSR_LAYOUT: LayoutKey = LayoutKey {
    read_only_storage: 4,
    read_write_storage: 1,
    uniform: 1,
};

/// Bindings of the ELL kernel: data, col_ind, v, y, params
pub const ELL_LAYOUT: LayoutKey = LayoutKey {
    read_only_storage: 3,
    read_write_storage: 1,
    uniform: 1,
};

/// Generate WGSL for `spmvCSR` with `workgroup_size` invocations per group.
pub fn generate_csr_spmv_shader(workgroup_size: u32) -> String {
    format!(
        r#"// CSR SpMV: y = M * v, one invocation per row

const WG: u32 = {workgroup_size}u;

{PARAMS_STRUCT}
{CSR_BINDINGS}
@compute @workgroup_size({workgroup_size})
fn {CSR_KERNEL}(
    @builtin(local_invocation_id) lid: vec3<u32>,
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {{
    let r = (wid.y * nwg.x + wid.x) * WG + lid.x;
    if (r >= params.rows_nbr) {{
        return;
    }}

    let row_start = row_ptr[r];
    let row_end = row_ptr[r + 1u];

    var sum: f32 = 0.0;
    for (var i: u32 = row_start; i < row_end; i = i + 1u) {{
        sum = sum + values[i] * v[col_ind[i]];
    }}
    y[r] = sum;
}}
"#
    )
}

/// Generate WGSL for `kernelSpmvCSRVect`.
///
/// The work-group holds `warps_per_block` warps of `lanes` invocations.
/// Lane `l` of a warp accumulates entries `row_start + l`, `row_start + l + lanes`,
/// and so on; the partial sums are then halved `log2(lanes)` times in
/// work-group memory and lane 0 writes the row result. `lanes` must be a
/// power of two.
pub fn generate_csr_vector_spmv_shader(lanes: u32, warps_per_block: u32) -> String {
    let wg = lanes * warps_per_block;

    // Every invocation reaches every barrier; only the accumulation is masked.
    let mut reduction = String::new();
    let mut offset = lanes / 2;
    while offset > 0 {
        let _ = write!(
            reduction,
            r#"    if (lane < {offset}u) {{
        dots[tid] = dots[tid] + dots[tid + {offset}u];
    }}
    workgroupBarrier();
"#
        );
        offset /= 2;
    }

    format!(
        r#"// CSR-Vector SpMV: y = M * v, one warp of {lanes} lanes per row

const LANES: u32 = {lanes}u;
const WARPS: u32 = {warps_per_block}u;

{PARAMS_STRUCT}
{CSR_BINDINGS}
var<workgroup> dots: array<f32, {wg}>;

@compute @workgroup_size({wg})
fn {CSR_VECTOR_KERNEL}(
    @builtin(local_invocation_id) lid: vec3<u32>,
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {{
    let tid = lid.x;
    let lane = tid % LANES;
    let r = (wid.y * nwg.x + wid.x) * WARPS + tid / LANES;
    let in_range = r < params.rows_nbr;

    var sum: f32 = 0.0;
    if (in_range) {{
        let row_start = row_ptr[r];
        let row_end = row_ptr[r + 1u];
        for (var i: u32 = row_start + lane; i < row_end; i = i + LANES) {{
            sum = sum + values[i] * v[col_ind[i]];
        }}
    }}
    dots[tid] = sum;
    workgroupBarrier();

{reduction}
    if (in_range && lane == 0u) {{
        y[r] = dots[tid];
    }}
}}
"#
    )
}

/// Generate WGSL for `spmvELL` with `workgroup_size` invocations per group.
pub fn generate_ell_spmv_shader(workgroup_size: u32) -> String {
    format!(
        r#"// ELL SpMV: y = M * v, one invocation per row of row_width slots

const WG: u32 = {workgroup_size}u;

{PARAMS_STRUCT}
@group(0) @binding(0) var<storage, read> ell_data: array<f32>;
@group(0) @binding(1) var<storage, read> col_ind: array<u32>;
@group(0) @binding(2) var<storage, read> v: array<f32>;
@group(0) @binding(3) var<storage, read_write> y: array<f32>;
@group(0) @binding(4) var<uniform> params: SpmvParams;

@compute @workgroup_size({workgroup_size})
fn {ELL_KERNEL}(
    @builtin(local_invocation_id) lid: vec3<u32>,
    @builtin(workgroup_id) wid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {{
    let r = (wid.y * nwg.x + wid.x) * WG + lid.x;
    if (r >= params.rows_nbr) {{
        return;
    }}

    let base = r * params.row_width;
    var sum: f32 = 0.0;
    for (var k: u32 = 0u; k < params.row_width; k = k + 1u) {{
        // padding slots hold 0.0; skipping them keeps v[0] out of padded rows
        let a = ell_data[base + k];
        if (a != 0.0) {{
            sum = sum + a * v[col_ind[base + k]];
        }}
    }}
    y[r] = sum;
}}
"#
    )
}

/// `spmvCSR` kernel for a launch geometry
pub fn csr_kernel(geometry: &KernelGeometry) -> KernelSource {
    KernelSource {
        name: CSR_KERNEL.to_string(),
        source: generate_csr_spmv_shader(geometry.workgroup_size),
        workgroup_size: geometry.workgroup_size,
        workgroup_storage_bytes: 0,
        layout: CSR_LAYOUT,
    }
}

/// `kernelSpmvCSRVect` kernel for a launch geometry
pub fn csr_vector_kernel(geometry: &KernelGeometry) -> KernelSource {
    let wg = geometry.vector_workgroup_size();
    KernelSource {
        name: CSR_VECTOR_KERNEL.to_string(),
        source: generate_csr_vector_spmv_shader(geometry.lanes, geometry.warps_per_block),
        workgroup_size: wg,
        workgroup_storage_bytes: u64::from(wg) * SIZE_OF_F32,
        layout: CSR_LAYOUT,
    }
}

/// `spmvELL` kernel for a launch geometry
pub fn ell_kernel(geometry: &KernelGeometry) -> KernelSource {
    KernelSource {
        name: ELL_KERNEL.to_string(),
        source: generate_ell_spmv_shader(geometry.workgroup_size),
        workgroup_size: geometry.workgroup_size,
        workgroup_storage_bytes: 0,
        layout: ELL_LAYOUT,
    }
}

#[cfg(test)]
mod tests {
    use super::super::super::pipeline::check_kernel_source;
    use super::*;

    #[test]
    fn test_csr_shader_valid() {
        for wg in [1, 64, 256] {
            let geometry = KernelGeometry::new(wg, 32, 1).unwrap();
            let kernel = csr_kernel(&geometry);
            check_kernel_source(&kernel).unwrap_or_else(|e| panic!("wg={wg}: {e:?}"));
        }
    }

    #[test]
    fn test_csr_vector_shader_valid() {
        for (lanes, warps) in [(1, 1), (2, 4), (32, 1), (32, 8), (64, 2)] {
            let geometry = KernelGeometry::new(256, lanes, warps).unwrap();
            let kernel = csr_vector_kernel(&geometry);
            check_kernel_source(&kernel)
                .unwrap_or_else(|e| panic!("lanes={lanes} warps={warps}: {e:?}"));
        }
    }

    #[test]
    fn test_csr_vector_reduction_steps() {
        let src = generate_csr_vector_spmv_shader(32, 1);
        // one barrier after the stores, one per halving
        assert_eq!(src.matches("workgroupBarrier()").count(), 1 + 5);
        assert!(src.contains("lane < 16u"));
        assert!(src.contains("lane < 1u"));
        assert!(!src.contains("lane < 32u"));

        let src = generate_csr_vector_spmv_shader(1, 4);
        assert_eq!(src.matches("workgroupBarrier()").count(), 1);
    }

    #[test]
    fn test_csr_vector_storage_bytes() {
        let geometry = KernelGeometry::new(256, 32, 4).unwrap();
        let kernel = csr_vector_kernel(&geometry);
        assert_eq!(kernel.workgroup_size, 128);
        assert_eq!(kernel.workgroup_storage_bytes, 512);
        assert!(kernel.source.contains("array<f32, 128>"));
    }

    #[test]
    fn test_ell_shader_valid() {
        for wg in [1, 128, 256] {
            let geometry = KernelGeometry::new(wg, 32, 1).unwrap();
            check_kernel_source(&ell_kernel(&geometry))
                .unwrap_or_else(|e| panic!("wg={wg}: {e:?}"));
        }
    }

    #[test]
    fn test_ell_shader_skips_padding() {
        let source = generate_ell_spmv_shader(64);
        let guard = source.find("if (a != 0.0)").expect("padding guard");
        let product = source.find("a * v[col_ind[base + k]]").expect("product");
        assert!(guard < product);
    }

    #[test]
    fn test_entry_point_names() {
        let geometry = KernelGeometry::default();
        assert!(csr_kernel(&geometry).source.contains("fn spmvCSR("));
        assert!(
            csr_vector_kernel(&geometry)
                .source
                .contains("fn kernelSpmvCSRVect(")
        );
        assert!(ell_kernel(&geometry).source.contains("fn spmvELL("));
    }
}
