use crate::camera::OrbitCamera;
use crate::geometry::{
    self, background_linear, CameraBinding, CameraUniform, InstanceBatches, SceneGeometry,
};
use crate::meshes::Vertex;
use crate::passes::{ReflectionResources, WgpuPassExecutor};
use crate::targets::{rebind_needed, DEPTH_FORMAT};
use crate::textures;
use bytemuck::{Pod, Zeroable};
use glam::Mat4;
use mirrorfloor_common::ReflectorConfig;
use mirrorfloor_material::{
    patch_shader, MaterialDescriptor, ReflectorBindings, ReflectorUniforms, ShaderPatchError, TargetId,
};
use mirrorfloor_render::{MeshKind, Scene};
use wgpu::util::DeviceExt;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("shader `{label}` failed to compile: {message}")]
    ShaderCompile { label: String, message: String },
    #[error(transparent)]
    ShaderPatch(#[from] ShaderPatchError),
}

/// Surface parameters of the reflective floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorMaterial {
    pub base_color: [f32; 4],
    pub metalness: f32,
    pub roughness: f32,
    /// Times the roughness map tiles across the floor.
    pub uv_repeat: f32,
}

impl Default for FloorMaterial {
    fn default() -> Self {
        Self {
            base_color: [1.0, 1.0, 1.0, 1.0],
            metalness: 0.8,
            roughness: 0.1,
            uv_repeat: 16.0,
        }
    }
}

/// GPU layout of the `Physical` block.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct PhysicalUniform {
    model: [[f32; 4]; 4],
    base_color: [f32; 4],
    params: [f32; 4],
}

impl PhysicalUniform {
    fn new(model: Mat4, material: &FloorMaterial) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            base_color: material.base_color,
            params: [material.metalness, material.roughness, material.uv_repeat, 0.0],
        }
    }
}

const MAX_INSTANCES: u32 = 1024;
const MAIN_MESHES: [MeshKind; 2] = [MeshKind::Pillar, MeshKind::Orb];

/// Main scene renderer. Owns the reflection pass resources and the floor's
/// patched material.
pub struct WgpuRenderer {
    main_camera: CameraBinding,
    scene_pipeline: wgpu::RenderPipeline,
    floor_pipeline: wgpu::RenderPipeline,
    geometry: SceneGeometry,
    instances: wgpu::Buffer,
    floor_material: FloorMaterial,
    material_buffer: wgpu::Buffer,
    material_bind_group: wgpu::BindGroup,
    reflector_layout: wgpu::BindGroupLayout,
    reflector_buffer: wgpu::Buffer,
    reflector_sampler: wgpu::Sampler,
    reflector_bind_group: wgpu::BindGroup,
    bound_target: Option<TargetId>,
    placeholder: wgpu::TextureView,
    reflection: ReflectionResources,
    depth_texture: wgpu::TextureView,
}

impl WgpuRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        config: &ReflectorConfig,
    ) -> Result<Self, RenderError> {
        let camera_layout = geometry::camera_layout(device);
        let main_camera = CameraBinding::new(device, &camera_layout, "main_camera");
        let scene_pipeline = geometry::create_scene_pipeline(device, &camera_layout, surface_format, "scene_pipeline");

        // Floor material: group 1 physical params and maps
        let floor_material = FloorMaterial::default();
        let material_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("floor_material"),
            contents: bytemuck::bytes_of(&PhysicalUniform::new(Mat4::IDENTITY, &floor_material)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let material_layout = texture_group_layout(device, "floor_material_layout");
        let roughness_view = textures::create_roughness_texture(device, queue);
        let material_sampler = textures::create_repeat_sampler(device);
        let material_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("floor_material_bind_group"),
            layout: &material_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: material_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&roughness_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&material_sampler),
                },
            ],
        });

        // Reflector: group 2 texture matrix, tint and saved reflection
        let reflector_layout = texture_group_layout(device, "reflector_layout");
        let reflector_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("reflector_uniforms"),
            contents: bytemuck::bytes_of(&ReflectorUniforms::default().to_gpu()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let reflector_sampler = textures::create_clamp_sampler(device);
        let placeholder = textures::create_placeholder_texture(device, queue);
        let reflector_bind_group = reflector_bind_group(
            device,
            &reflector_layout,
            &reflector_buffer,
            &placeholder,
            &reflector_sampler,
        );

        let floor_pipeline = create_floor_pipeline(
            device,
            &[&camera_layout, &material_layout, &reflector_layout],
            surface_format,
        )?;

        let reflection = ReflectionResources::new(device, &camera_layout, config.texture_width, config.texture_height);

        Ok(Self {
            main_camera,
            scene_pipeline,
            floor_pipeline,
            geometry: SceneGeometry::new(device),
            instances: geometry::create_instance_buffer(device, "scene_instances", MAX_INSTANCES),
            floor_material,
            material_buffer,
            material_bind_group,
            reflector_layout,
            reflector_buffer,
            reflector_sampler,
            reflector_bind_group,
            bound_target: None,
            placeholder,
            reflection,
            depth_texture: Self::create_depth_texture(device, width, height),
        })
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth_texture = Self::create_depth_texture(device, width, height);
    }

    /// Change the reflection resolution. Targets are rebuilt by the next frame.
    pub fn resize_reflection(&mut self, width: u32, height: u32) {
        self.reflection.resize(width, height);
    }

    /// Executor recording this frame's reflection passes into `encoder`.
    pub fn reflection_executor<'a>(
        &'a mut self,
        device: &'a wgpu::Device,
        queue: &'a wgpu::Queue,
        encoder: &'a mut wgpu::CommandEncoder,
    ) -> WgpuPassExecutor<'a> {
        WgpuPassExecutor::new(device, queue, encoder, &mut self.reflection, &self.geometry)
    }

    /// Render the scene and the reflective floor from `camera`.
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        view: &wgpu::TextureView,
        camera: &OrbitCamera,
        scene: &Scene,
        uniforms: &ReflectorUniforms,
    ) {
        let _span = tracing::debug_span!("main_pass").entered();
        self.main_camera
            .write(queue, &CameraUniform::new(camera.view_projection(), camera.position()));
        queue.write_buffer(&self.reflector_buffer, 0, bytemuck::bytes_of(&uniforms.to_gpu()));
        self.sync_reflector_binding(device, uniforms.t_diffuse);

        let batches = InstanceBatches::collect(scene, &MAIN_MESHES, MAX_INSTANCES as usize);
        if !batches.is_empty() {
            queue.write_buffer(&self.instances, 0, bytemuck::cast_slice(&batches.instances));
        }
        let floor = scene.visible().find(|d| d.mesh == MeshKind::Floor);
        if let Some(floor) = floor {
            let uniform = PhysicalUniform::new(floor.transform.matrix(), &self.floor_material);
            queue.write_buffer(&self.material_buffer, 0, bytemuck::bytes_of(&uniform));
        }

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("render_encoder"),
        });
        {
            let [r, g, b] = background_linear();
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
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
                    view: &self.depth_texture,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            if !batches.is_empty() {
                pass.set_pipeline(&self.scene_pipeline);
                pass.set_bind_group(0, &self.main_camera.bind_group, &[]);
                self.geometry.draw_batches(&mut pass, &self.instances, &batches);
            }

            if floor.is_some() {
                let quad = &self.geometry.quad;
                pass.set_pipeline(&self.floor_pipeline);
                pass.set_bind_group(0, &self.main_camera.bind_group, &[]);
                pass.set_bind_group(1, &self.material_bind_group, &[]);
                pass.set_bind_group(2, &self.reflector_bind_group, &[]);
                pass.set_vertex_buffer(0, quad.vertices.slice(..));
                pass.set_index_buffer(quad.indices.slice(..), wgpu::IndexFormat::Uint16);
                pass.draw_indexed(0..quad.index_count, 0, 0..1);
            }
        }

        queue.submit(std::iter::once(encoder.finish()));
    }

    /// Point the floor at the saved reflection `target`.
    ///
    /// A target from an older allocation keeps the previous binding.
    fn sync_reflector_binding(&mut self, device: &wgpu::Device, target: Option<TargetId>) {
        if !rebind_needed(self.bound_target, target, self.reflection.current_target()) {
            return;
        }
        let source = match target {
            Some(id) => match self.reflection.saved_view(id) {
                Some(view) => view,
                None => return,
            },
            None => &self.placeholder,
        };
        let bind_group = reflector_bind_group(
            device,
            &self.reflector_layout,
            &self.reflector_buffer,
            source,
            &self.reflector_sampler,
        );
        self.reflector_bind_group = bind_group;
        self.bound_target = target;
        tracing::debug!(?target, "floor bound to reflection target");
    }

    fn create_depth_texture(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth_texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&Default::default())
    }
}

/// Uniform + texture + sampler, the shape of both the material and reflector groups.
fn texture_group_layout(device: &wgpu::Device, label: &str) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                count: None,
            },
        ],
    })
}

fn reflector_bind_group(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    uniforms: &wgpu::Buffer,
    reflection: &wgpu::TextureView,
    sampler: &wgpu::Sampler,
) -> wgpu::BindGroup {
    device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("reflector_bind_group"),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::TextureView(reflection),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    })
}

/// Build the floor pipeline from the reflector-patched physical shader.
///
/// Compilation runs in a validation error scope so a bad patch fails here
/// instead of at the first draw.
fn create_floor_pipeline(
    device: &wgpu::Device,
    layouts: &[&wgpu::BindGroupLayout],
    format: wgpu::TextureFormat,
) -> Result<wgpu::RenderPipeline, RenderError> {
    let base = MaterialDescriptor::physical();
    let material = patch_shader(&base, &ReflectorBindings::after(&base))?;

    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(&material.label),
        source: wgpu::ShaderSource::Wgsl(material.source.as_str().into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("floor_pipeline_layout"),
        bind_group_layouts: layouts,
        push_constant_ranges: &[],
    });
    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("floor_pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[Vertex::layout()],
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(geometry::depth_state(true)),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(RenderError::ShaderCompile {
            label: material.label,
            message: err.to_string(),
        });
    }
    tracing::info!(uniforms = ?material.uniforms, "created floor material `{}`", material.label);
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn physical_uniform_packs_params() {
        assert_eq!(std::mem::size_of::<PhysicalUniform>(), 64 + 32);
        let u = PhysicalUniform::new(Mat4::IDENTITY, &FloorMaterial::default());
        assert_eq!(u.params, [0.8, 0.1, 16.0, 0.0]);
    }
}
