//! WGSL shader generation
//!
//! WGSL has no templates, so launch geometry is baked into the source:
//! work-group size, lanes per warp and the unrolled reduction are formatted
//! in before compilation. Sources are cached by their full text in the
//! pipeline cache.
//!
//! ```text
//! generate_csr_vector_spmv_shader(32, 4) → @workgroup_size(128), 5 reduction steps
//! generate_csr_vector_spmv_shader(8, 1)  → @workgroup_size(8), 3 reduction steps
//! ```

pub mod spmv;

pub use spmv::{
    CSR_KERNEL, CSR_LAYOUT, CSR_VECTOR_KERNEL, ELL_KERNEL, ELL_LAYOUT, csr_kernel,
    csr_vector_kernel, ell_kernel, generate_csr_spmv_shader, generate_csr_vector_spmv_shader,
    generate_ell_spmv_shader,
};
