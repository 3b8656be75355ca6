/**
 * Implementations of [`RenderBackend`](crate::render::RenderBackend).
 */
pub mod gpu;
pub mod software;

pub use gpu::WgpuBackend;
pub use software::{BackendCall, SoftwareBackend};
