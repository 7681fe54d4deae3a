//! Offscreen render targets for the reflection passes.

use mirrorfloor_material::TargetId;

pub const REFLECTION_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TargetError {
    #[error("render target size must be non-zero, got {width}x{height}")]
    ZeroSize { width: u32, height: u32 },
    #[error("render target size {width}x{height} exceeds device limit {limit}")]
    TooLarge { width: u32, height: u32, limit: u32 },
    #[error("render target allocation failed: {0}")]
    Allocation(String),
}

/// Check a target size against the device's 2D texture limit.
pub fn validate_size(width: u32, height: u32, limit: u32) -> Result<(), TargetError> {
    if width == 0 || height == 0 {
        return Err(TargetError::ZeroSize { width, height });
    }
    if width > limit || height > limit {
        return Err(TargetError::TooLarge { width, height, limit });
    }
    Ok(())
}

pub struct RenderTarget {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
}

fn create_target(
    device: &wgpu::Device,
    label: &str,
    size: wgpu::Extent3d,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> RenderTarget {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    RenderTarget { texture, view }
}

/// Every texture the reflection passes write.
pub struct ReflectionTargets {
    pub width: u32,
    pub height: u32,
    /// Mirror-view color; blurred in place via `blur`.
    pub color: RenderTarget,
    /// Depth attachment of the color pass.
    pub color_depth: RenderTarget,
    /// Output of the depth pass. Nothing in the main pass samples it; the
    /// pass is skipped unless `depth_pass` is set.
    pub depth: RenderTarget,
    /// Intermediate of the separable blur.
    pub blur: RenderTarget,
    /// Copy of the finished reflection, sampled by the floor.
    pub save: RenderTarget,
}

impl ReflectionTargets {
    /// Allocate inside an out-of-memory error scope.
    pub fn allocate(device: &wgpu::Device, width: u32, height: u32) -> Result<Self, TargetError> {
        validate_size(width, height, device.limits().max_texture_dimension_2d)?;
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let color_usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC;
        let depth_usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let targets = Self {
            width,
            height,
            color: create_target(device, "reflection_color", size, REFLECTION_FORMAT, color_usage),
            color_depth: create_target(
                device,
                "reflection_color_depth",
                size,
                DEPTH_FORMAT,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            ),
            depth: create_target(device, "reflection_depth", size, DEPTH_FORMAT, depth_usage),
            blur: create_target(device, "reflection_blur", size, REFLECTION_FORMAT, color_usage),
            save: create_target(
                device,
                "reflection_save",
                size,
                REFLECTION_FORMAT,
                wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            ),
        };
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(TargetError::Allocation(err.to_string()));
        }
        tracing::info!(width, height, "allocated reflection targets");
        Ok(targets)
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}

/// Lazily allocated targets. A failed allocation is retried on the next use.
pub struct TargetSlot<T = ReflectionTargets> {
    width: u32,
    height: u32,
    targets: Option<T>,
    generation: u64,
}

impl<T> TargetSlot<T> {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            targets: None,
            generation: 0,
        }
    }

    /// Return the live targets, building them with `init` if missing.
    /// The generation moves only when `init` succeeds.
    pub fn get_or_try_init(
        &mut self,
        init: impl FnOnce(u32, u32) -> Result<T, TargetError>,
    ) -> Result<&T, TargetError> {
        if self.targets.is_none() {
            let targets = init(self.width, self.height)?;
            self.generation += 1;
            self.targets = Some(targets);
        }
        match &self.targets {
            Some(targets) => Ok(targets),
            None => Err(TargetError::Allocation("targets missing after allocation".into())),
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.targets.as_ref()
    }

    /// Drop the targets if the size changed; they are rebuilt on next use.
    pub fn resize(&mut self, width: u32, height: u32) {
        if (width, height) != (self.width, self.height) {
            self.width = width;
            self.height = height;
            self.targets = None;
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bumped on every successful allocation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Generation of the live allocation, `None` while the targets are missing.
    pub fn current(&self) -> Option<u64> {
        self.targets.as_ref().map(|_| self.generation)
    }
}

impl TargetSlot {
    pub fn get_or_allocate(&mut self, device: &wgpu::Device) -> Result<&ReflectionTargets, TargetError> {
        self.get_or_try_init(|width, height| ReflectionTargets::allocate(device, width, height))
    }
}

/// Whether the floor must rebind after the uniforms committed `committed`.
///
/// `current` is the generation of the live targets. An id from another
/// allocation is stale and keeps whatever is bound now.
pub fn rebind_needed(bound: Option<TargetId>, committed: Option<TargetId>, current: Option<u64>) -> bool {
    if committed == bound {
        return false;
    }
    match committed {
        Some(id) => current == Some(id.0),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_validation() {
        assert!(validate_size(512, 512, 8192).is_ok());
        assert_eq!(
            validate_size(0, 512, 8192),
            Err(TargetError::ZeroSize { width: 0, height: 512 })
        );
        assert_eq!(
            validate_size(512, 16384, 8192),
            Err(TargetError::TooLarge {
                width: 512,
                height: 16384,
                limit: 8192
            })
        );
    }

    #[test]
    fn resize_only_invalidates_on_change() {
        let mut slot: TargetSlot<u32> = TargetSlot::new(512, 512);
        slot.resize(512, 512);
        assert_eq!(slot.size(), (512, 512));
        slot.resize(1024, 256);
        assert_eq!(slot.size(), (1024, 256));
        assert!(slot.get().is_none());
        assert_eq!(slot.generation(), 0);
    }

    #[test]
    fn failed_allocation_is_retried_without_bumping() {
        let mut slot: TargetSlot<(u32, u32)> = TargetSlot::new(256, 128);
        let err = slot
            .get_or_try_init(|_, _| Err(TargetError::Allocation("out of memory".into())))
            .unwrap_err();
        assert_eq!(err, TargetError::Allocation("out of memory".into()));
        assert_eq!(slot.generation(), 0);
        assert_eq!(slot.current(), None);

        assert_eq!(slot.get_or_try_init(|w, h| Ok((w, h))).unwrap(), &(256, 128));
        assert_eq!(slot.current(), Some(1));

        // a live allocation is reused
        slot.get_or_try_init(|_, _| panic!("reallocated")).unwrap();
        assert_eq!(slot.generation(), 1);

        slot.resize(64, 64);
        assert_eq!(slot.current(), None);
        assert_eq!(slot.get_or_try_init(|w, h| Ok((w, h))).unwrap(), &(64, 64));
        assert_eq!(slot.current(), Some(2));
    }

    #[test]
    fn stale_target_keeps_binding() {
        let old = Some(TargetId(1));
        let new = Some(TargetId(2));
        // already bound
        assert!(!rebind_needed(old, old, Some(1)));
        // fresh save from the live allocation
        assert!(rebind_needed(old, new, Some(2)));
        assert!(rebind_needed(None, old, Some(1)));
        // committed id outlived a resize or failed reallocation
        assert!(!rebind_needed(old, new, Some(3)));
        assert!(!rebind_needed(old, new, None));
        // nothing saved yet: fall back to the placeholder
        assert!(rebind_needed(old, None, Some(1)));
        assert!(!rebind_needed(None, None, None));
    }
}
