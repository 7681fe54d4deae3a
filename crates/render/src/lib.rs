//! Reflection render-pass pipeline: renderer-agnostic passes, their
//! dispatcher and the demo scene they draw.
//!
//! # Invariants
//! - Passes run in a fixed order; hooks run once per frame no matter what.
//! - A failed or skipped frame never writes the floor's reflector uniforms.
//! - GPU work goes through [`PassExecutor`]; this crate never touches a device.

mod pass;
mod pipeline;
mod reflector;
mod renderer;
mod scene;

pub use pass::{BlurSettings, Hook, Pass, PassKind};
pub use pipeline::{FrameOutcome, FrameReport, PassPipeline, PipelineError};
pub use reflector::{Reflector, ReflectorParts};
pub use renderer::{DebugError, DebugExecutor, PassExecutor};
pub use scene::{DemoScene, Drawable, DrawableId, MeshKind, Scene, Totem};

pub fn crate_info() -> &'static str {
    "mirrorfloor-render v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("render"));
    }
}
