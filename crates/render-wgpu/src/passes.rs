use crate::geometry::{
    self, background_linear, CameraBinding, CameraUniform, InstanceBatches, InstanceData, SceneGeometry,
};
use crate::meshes::Vertex;
use crate::shaders;
use crate::targets::{ReflectionTargets, TargetError, TargetSlot, REFLECTION_FORMAT};
use crate::textures;
use bytemuck::{Pod, Zeroable};
use mirrorfloor_material::TargetId;
use mirrorfloor_render::{BlurSettings, MeshKind, PassExecutor, Scene};
use mirrorfloor_reflect::MirrorCamera;
use wgpu::util::DeviceExt;

const MAX_REFLECTED_INSTANCES: u32 = 1024;
const REFLECTED_MESHES: [MeshKind; 3] = [MeshKind::Pillar, MeshKind::Orb, MeshKind::Floor];

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct BlurParams {
    direction: [f32; 4],
}

/// Bind groups reading each blur source. Tied to one target generation.
struct BlurBindGroups {
    generation: u64,
    horizontal: wgpu::BindGroup,
    vertical: wgpu::BindGroup,
}

/// Long-lived state of the reflection passes.
pub struct ReflectionResources {
    slot: TargetSlot,
    color_pipeline: wgpu::RenderPipeline,
    depth_pipeline: wgpu::RenderPipeline,
    blur_pipeline: wgpu::RenderPipeline,
    blur_layout: wgpu::BindGroupLayout,
    blur_sampler: wgpu::Sampler,
    blur_h_params: wgpu::Buffer,
    blur_v_params: wgpu::Buffer,
    blur_groups: Option<BlurBindGroups>,
    camera: CameraBinding,
    instances: wgpu::Buffer,
}

impl ReflectionResources {
    pub fn new(device: &wgpu::Device, camera_layout: &wgpu::BindGroupLayout, width: u32, height: u32) -> Self {
        let color_pipeline =
            geometry::create_scene_pipeline(device, camera_layout, REFLECTION_FORMAT, "reflection_pipeline");

        let depth_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("reflection_depth_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::depth_shader().into()),
        });
        let depth_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("reflection_depth_layout"),
            bind_group_layouts: &[camera_layout],
            push_constant_ranges: &[],
        });
        let depth_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("reflection_depth_pipeline"),
            layout: Some(&depth_layout),
            vertex: wgpu::VertexState {
                module: &depth_shader,
                entry_point: Some("vs_depth"),
                compilation_options: Default::default(),
                buffers: &[Vertex::layout(), InstanceData::layout()],
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(geometry::depth_state(true)),
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let blur_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("blur_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });
        let blur_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("blur_shader"),
            source: wgpu::ShaderSource::Wgsl(shaders::BLUR_WGSL.into()),
        });
        let blur_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("blur_pipeline_layout"),
            bind_group_layouts: &[&blur_layout],
            push_constant_ranges: &[],
        });
        let blur_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("blur_pipeline"),
            layout: Some(&blur_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &blur_shader,
                entry_point: Some("vs_fullscreen"),
                compilation_options: Default::default(),
                buffers: &[],
            },
            fragment: Some(wgpu::FragmentState {
                module: &blur_shader,
                entry_point: Some("fs_blur"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: REFLECTION_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: Default::default(),
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
            cache: None,
        });

        let params_buffer = |label: &str, x: f32, y: f32| {
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::bytes_of(&BlurParams {
                    direction: [x, y, 1.0, 0.0],
                }),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            })
        };

        Self {
            slot: TargetSlot::new(width, height),
            color_pipeline,
            depth_pipeline,
            blur_pipeline,
            blur_layout,
            blur_sampler: textures::create_clamp_sampler(device),
            blur_h_params: params_buffer("blur_h_params", 1.0, 0.0),
            blur_v_params: params_buffer("blur_v_params", 0.0, 1.0),
            blur_groups: None,
            camera: CameraBinding::new(device, camera_layout, "mirror_camera"),
            instances: geometry::create_instance_buffer(device, "reflection_instances", MAX_REFLECTED_INSTANCES),
        }
    }

    /// Generation of the live targets, if allocated.
    pub fn current_target(&self) -> Option<u64> {
        self.slot.current()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.slot.resize(width, height);
    }

    /// The saved reflection if `target` names the current allocation.
    pub fn saved_view(&self, target: TargetId) -> Option<&wgpu::TextureView> {
        if target.0 != self.slot.generation() {
            return None;
        }
        self.slot.get().map(|t| &t.save.view)
    }

    fn blur_bind_group(&self, device: &wgpu::Device, source: &wgpu::TextureView, params: &wgpu::Buffer) -> wgpu::BindGroup {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("blur_bind_group"),
            layout: &self.blur_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(source),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.blur_sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: params.as_entire_binding(),
                },
            ],
        })
    }
}

/// Records one frame's reflection passes into `encoder`.
///
/// Built fresh each frame; the caller submits the encoder before the main pass.
pub struct WgpuPassExecutor<'a> {
    device: &'a wgpu::Device,
    queue: &'a wgpu::Queue,
    encoder: &'a mut wgpu::CommandEncoder,
    resources: &'a mut ReflectionResources,
    geometry: &'a SceneGeometry,
    batches: Option<InstanceBatches>,
}

impl<'a> WgpuPassExecutor<'a> {
    pub fn new(
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        encoder: &'a mut wgpu::CommandEncoder,
        resources: &'a mut ReflectionResources,
        geometry: &'a SceneGeometry,
    ) -> Self {
        Self {
            device,
            queue,
            encoder,
            resources,
            geometry,
            batches: None,
        }
    }

    /// Upload the mirror camera and the scene's instances once per frame.
    fn prepare(&mut self, scene: &Scene, mirror: &MirrorCamera) {
        if self.batches.is_some() {
            return;
        }
        let uniform = CameraUniform::new(mirror.view_projection(), mirror.position);
        self.resources.camera.write(self.queue, &uniform);
        let batches = InstanceBatches::collect(scene, &REFLECTED_MESHES, MAX_REFLECTED_INSTANCES as usize);
        if !batches.is_empty() {
            self.queue
                .write_buffer(&self.resources.instances, 0, bytemuck::cast_slice(&batches.instances));
        }
        self.batches = Some(batches);
    }
}

impl PassExecutor<Scene> for WgpuPassExecutor<'_> {
    type Error = TargetError;

    fn reflection(&mut self, scene: &Scene, mirror: &MirrorCamera) -> Result<(), TargetError> {
        let _span = tracing::debug_span!("reflection_pass").entered();
        self.resources.slot.get_or_allocate(self.device)?;
        self.prepare(scene, mirror);
        let res = &*self.resources;
        let Some(targets) = res.slot.get() else {
            return Err(TargetError::Allocation("reflection targets unavailable".into()));
        };
        let [r, g, b] = background_linear();

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("reflection_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &targets.color.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &targets.color_depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        if let Some(batches) = self.batches.as_ref().filter(|b| !b.is_empty()) {
            pass.set_pipeline(&res.color_pipeline);
            pass.set_bind_group(0, &res.camera.bind_group, &[]);
            self.geometry.draw_batches(&mut pass, &res.instances, batches);
        }
        Ok(())
    }

    fn depth(&mut self, scene: &Scene, mirror: &MirrorCamera) -> Result<(), TargetError> {
        let _span = tracing::debug_span!("reflection_depth_pass").entered();
        self.resources.slot.get_or_allocate(self.device)?;
        self.prepare(scene, mirror);
        let res = &*self.resources;
        let Some(targets) = res.slot.get() else {
            return Err(TargetError::Allocation("reflection targets unavailable".into()));
        };

        let mut pass = self.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("reflection_depth_pass"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &targets.depth.view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            ..Default::default()
        });
        if let Some(batches) = self.batches.as_ref().filter(|b| !b.is_empty()) {
            pass.set_pipeline(&res.depth_pipeline);
            pass.set_bind_group(0, &res.camera.bind_group, &[]);
            self.geometry.draw_batches(&mut pass, &res.instances, batches);
        }
        Ok(())
    }

    fn blur(&mut self, settings: &BlurSettings) -> Result<(), TargetError> {
        if settings.is_noop() {
            return Ok(());
        }
        let _span = tracing::debug_span!("reflection_blur_pass", iterations = settings.iterations).entered();
        let generation = {
            self.resources.slot.get_or_allocate(self.device)?;
            self.resources.slot.generation()
        };

        for (buffer, x, y) in [(&self.resources.blur_h_params, 1.0, 0.0), (&self.resources.blur_v_params, 0.0, 1.0)] {
            let params = BlurParams {
                direction: [x, y, settings.radius, 0.0],
            };
            self.queue.write_buffer(buffer, 0, bytemuck::bytes_of(&params));
        }

        if self.resources.blur_groups.as_ref().is_none_or(|g| g.generation != generation) {
            let res = &*self.resources;
            let Some(targets) = res.slot.get() else {
                return Err(TargetError::Allocation("reflection targets unavailable".into()));
            };
            let groups = BlurBindGroups {
                generation,
                horizontal: res.blur_bind_group(self.device, &targets.color.view, &res.blur_h_params),
                vertical: res.blur_bind_group(self.device, &targets.blur.view, &res.blur_v_params),
            };
            self.resources.blur_groups = Some(groups);
        }

        let res = &*self.resources;
        let (Some(targets), Some(groups)) = (res.slot.get(), res.blur_groups.as_ref()) else {
            return Err(TargetError::Allocation("reflection targets unavailable".into()));
        };
        for _ in 0..settings.iterations {
            fullscreen(self.encoder, &res.blur_pipeline, &groups.horizontal, &targets.blur.view, "blur_horizontal");
            fullscreen(self.encoder, &res.blur_pipeline, &groups.vertical, &targets.color.view, "blur_vertical");
        }
        Ok(())
    }

    fn save(&mut self) -> Result<TargetId, TargetError> {
        let targets: &ReflectionTargets = self.resources.slot.get_or_allocate(self.device)?;
        self.encoder.copy_texture_to_texture(
            targets.color.texture.as_image_copy(),
            targets.save.texture.as_image_copy(),
            targets.extent(),
        );
        Ok(TargetId(self.resources.slot.generation()))
    }
}

fn fullscreen(
    encoder: &mut wgpu::CommandEncoder,
    pipeline: &wgpu::RenderPipeline,
    bind_group: &wgpu::BindGroup,
    target: &wgpu::TextureView,
    label: &str,
) {
    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
            resolve_target: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        ..Default::default()
    });
    pass.set_pipeline(pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.draw(0..3, 0..1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blur_params_are_one_vec4() {
        assert_eq!(std::mem::size_of::<BlurParams>(), 16);
    }
}
