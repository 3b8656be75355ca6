//! tex-ngin
//!
//! The texture and mesh-instance layer of a small cross-platform engine. It
//! owns GPU textures behind a path-keyed cache, hides the differences between
//! native pixel formats and backends, and draws textured mesh instances
//! through a stateful render backend.
//!
//! High-level modules
//! - `backends`: the software (immediate-mode style) and `wgpu` backends
//! - `context`: bundles one backend with its texture cache
//! - `data_structures`: pixel formats, textures, meshes and scene nodes
//! - `error`: error taxonomy shared by the texture and scene layers
//! - `render`: the backend facade, capabilities and render state types
//! - `resources`: file loaders (PNG, PVR) and the texture cache
//!

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod backends;
pub mod context;
pub mod data_structures;
pub mod error;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use cgmath::{Matrix4, Point3, Quaternion, Vector3};
pub use wgpu;

/// Locks `mutex`, taking over the data of a poisoned lock.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
