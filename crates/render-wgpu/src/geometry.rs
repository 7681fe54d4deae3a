use crate::meshes::{self, MeshData, Vertex};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use mirrorfloor_render::{MeshKind, Scene};
use std::ops::Range;
use wgpu::util::DeviceExt;

pub const FOG_NEAR: f32 = 15.0;
pub const FOG_FAR: f32 = 30.0;
/// Background and fog color, #020202.
pub const BACKGROUND_SRGB: [u8; 3] = [0x02, 0x02, 0x02];

pub fn srgb_to_linear(c: u8) -> f32 {
    let c = c as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn background_linear() -> [f32; 3] {
    BACKGROUND_SRGB.map(srgb_to_linear)
}

/// GPU layout of the `Camera` block.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    pub position: [f32; 4],
    pub fog_color: [f32; 4],
    pub fog_range: [f32; 4],
}

impl CameraUniform {
    pub fn new(view_proj: Mat4, position: Vec3) -> Self {
        let [r, g, b] = background_linear();
        Self {
            view_proj: view_proj.to_cols_array_2d(),
            position: position.extend(1.0).to_array(),
            fog_color: [r, g, b, 1.0],
            fog_range: [FOG_NEAR, FOG_FAR, 0.0, 0.0],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct InstanceData {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl InstanceData {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
        3 => Float32x4,
        4 => Float32x4,
        5 => Float32x4,
        6 => Float32x4,
        7 => Float32x4,
    ];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<InstanceData>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Instances of the visible drawables grouped by mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstanceBatches {
    pub instances: Vec<InstanceData>,
    pub ranges: Vec<(MeshKind, Range<u32>)>,
}

impl InstanceBatches {
    const ORDER: [MeshKind; 3] = [MeshKind::Pillar, MeshKind::Orb, MeshKind::Floor];

    /// Batch the visible drawables of `scene` whose mesh is in `kinds`.
    pub fn collect(scene: &Scene, kinds: &[MeshKind], max: usize) -> Self {
        let mut batches = Self::default();
        for kind in Self::ORDER.into_iter().filter(|k| kinds.contains(k)) {
            let start = batches.instances.len() as u32;
            for drawable in scene.visible().filter(|d| d.mesh == kind) {
                if batches.instances.len() >= max {
                    tracing::warn!(max, "instance buffer full, dropping drawables");
                    break;
                }
                batches.instances.push(InstanceData {
                    model: drawable.transform.matrix().to_cols_array_2d(),
                    color: drawable.color,
                });
            }
            let end = batches.instances.len() as u32;
            if end > start {
                batches.ranges.push((kind, start..end));
            }
        }
        batches
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

pub struct MeshBuffers {
    pub vertices: wgpu::Buffer,
    pub indices: wgpu::Buffer,
    pub index_count: u32,
}

impl MeshBuffers {
    pub fn upload(device: &wgpu::Device, label: &str, mesh: &MeshData) -> Self {
        let vertices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let indices = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}_indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertices,
            indices,
            index_count: mesh.indices.len() as u32,
        }
    }
}

/// Mesh buffers for every [`MeshKind`].
pub struct SceneGeometry {
    pub cube: MeshBuffers,
    pub sphere: MeshBuffers,
    pub quad: MeshBuffers,
}

impl SceneGeometry {
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            cube: MeshBuffers::upload(device, "cube", &meshes::cube()),
            sphere: MeshBuffers::upload(device, "sphere", &meshes::sphere(32, 16)),
            quad: MeshBuffers::upload(device, "quad", &meshes::quad()),
        }
    }

    pub fn mesh(&self, kind: MeshKind) -> &MeshBuffers {
        match kind {
            MeshKind::Pillar => &self.cube,
            MeshKind::Orb => &self.sphere,
            MeshKind::Floor => &self.quad,
        }
    }

    /// Issue one instanced draw per batch. Pipeline and bind groups must be set.
    pub fn draw_batches(&self, pass: &mut wgpu::RenderPass<'_>, instances: &wgpu::Buffer, batches: &InstanceBatches) {
        pass.set_vertex_buffer(1, instances.slice(..));
        for (kind, range) in &batches.ranges {
            let mesh = self.mesh(*kind);
            pass.set_vertex_buffer(0, mesh.vertices.slice(..));
            pass.set_index_buffer(mesh.indices.slice(..), wgpu::IndexFormat::Uint16);
            pass.draw_indexed(0..mesh.index_count, 0, range.clone());
        }
    }
}

pub fn camera_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("camera_bind_group_layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// Uniform buffer plus bind group for one camera.
pub struct CameraBinding {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl CameraBinding {
    pub fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str) -> Self {
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::bytes_of(&CameraUniform::new(Mat4::IDENTITY, Vec3::ZERO)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }

    pub fn write(&self, queue: &wgpu::Queue, uniform: &CameraUniform) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(uniform));
    }
}

pub fn create_instance_buffer(device: &wgpu::Device, label: &str, max_instances: u32) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: max_instances as u64 * std::mem::size_of::<InstanceData>() as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

/// Lit, fogged, instanced pipeline for pillars and orbs.
pub fn create_scene_pipeline(
    device: &wgpu::Device,
    camera_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
    label: &str,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene_shader"),
        source: wgpu::ShaderSource::Wgsl(crate::shaders::scene_shader().into()),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[camera_layout],
        push_constant_ranges: &[],
    });
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[Vertex::layout(), InstanceData::layout()],
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
            cull_mode: Some(wgpu::Face::Back),
            ..Default::default()
        },
        depth_stencil: Some(depth_state(true)),
        multisample: Default::default(),
        multiview: None,
        cache: None,
    })
}

pub fn depth_state(write: bool) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: crate::targets::DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: Default::default(),
        bias: Default::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorfloor_render::DemoScene;

    #[test]
    fn batches_group_by_mesh() {
        let demo = DemoScene::new();
        let batches = InstanceBatches::collect(&demo.scene, &[MeshKind::Pillar, MeshKind::Orb], 100);
        assert_eq!(batches.instances.len(), 6);
        assert_eq!(
            batches.ranges,
            vec![(MeshKind::Pillar, 0..3), (MeshKind::Orb, 3..6)]
        );
    }

    #[test]
    fn batches_skip_hidden_and_respect_capacity() {
        let mut demo = DemoScene::new();
        demo.scene.set_visible(demo.totems[0].pillar, false);
        let all = [MeshKind::Pillar, MeshKind::Orb, MeshKind::Floor];
        let batches = InstanceBatches::collect(&demo.scene, &all, 100);
        assert_eq!(batches.instances.len(), 6);
        assert_eq!(batches.ranges[0], (MeshKind::Pillar, 0..2));
        assert_eq!(batches.ranges[2], (MeshKind::Floor, 5..6));

        let capped = InstanceBatches::collect(&demo.scene, &all, 4);
        assert_eq!(capped.instances.len(), 4);
        assert_eq!(capped.ranges.last(), Some(&(MeshKind::Orb, 2..4)));
    }

    #[test]
    fn background_is_dark() {
        let [r, g, b] = background_linear();
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!(r > 0.0 && r < 0.001);
    }

    #[test]
    fn uniform_layouts() {
        assert_eq!(std::mem::size_of::<CameraUniform>(), 64 + 48);
        assert_eq!(std::mem::size_of::<InstanceData>(), 80);
    }
}
