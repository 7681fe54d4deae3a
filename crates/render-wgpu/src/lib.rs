//! wgpu backend for the reflective floor scene.
//!
//! [`WgpuPassExecutor`] records the reflection passes into offscreen targets;
//! [`WgpuRenderer`] draws the scene and samples the saved reflection on the floor.
//!
//! # Invariants
//! - Reflection commands are submitted before the main pass on the same queue.
//! - The floor samples the save target only, never a target being written.
//! - A failed target allocation degrades the frame; the next frame retries.

mod camera;
mod geometry;
mod gpu;
mod meshes;
mod passes;
mod shaders;
mod targets;
mod textures;

pub use camera::OrbitCamera;
pub use gpu::{FloorMaterial, RenderError, WgpuRenderer};
pub use passes::{ReflectionResources, WgpuPassExecutor};
pub use targets::{validate_size, ReflectionTargets, TargetError, TargetSlot, DEPTH_FORMAT, REFLECTION_FORMAT};
