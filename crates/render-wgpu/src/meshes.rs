use bytemuck::{Pod, Zeroable};
use std::f32::consts::{PI, TAU};

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

fn v(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Vertex {
    Vertex { position, normal, uv }
}

/// Unit cube centred on the origin.
pub fn cube() -> MeshData {
    let p = 0.5_f32;
    // (normal, tangent u, tangent v) per face
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut mesh = MeshData::default();
    for (n, u, w) in faces {
        let base = mesh.vertices.len() as u16;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let position = [
                p * (n[0] + su * u[0] + sv * w[0]),
                p * (n[1] + su * u[1] + sv * w[1]),
                p * (n[2] + su * u[2] + sv * w[2]),
            ];
            mesh.vertices.push(v(position, n, [(su + 1.0) * 0.5, (1.0 - sv) * 0.5]));
        }
        mesh.indices.extend([base, base + 1, base + 2, base + 2, base + 3, base]);
    }
    mesh
}

/// Unit-radius UV sphere.
pub fn sphere(segments: u16, rings: u16) -> MeshData {
    let mut mesh = MeshData::default();
    for ring in 0..=rings {
        let theta = ring as f32 / rings as f32 * PI;
        let (st, ct) = theta.sin_cos();
        for seg in 0..=segments {
            let phi = seg as f32 / segments as f32 * TAU;
            let (sp, cp) = phi.sin_cos();
            let n = [st * sp, ct, st * cp];
            mesh.vertices.push(v(
                n,
                n,
                [seg as f32 / segments as f32, ring as f32 / rings as f32],
            ));
        }
    }
    let stride = segments + 1;
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            mesh.indices.extend([a, b, a + 1, a + 1, b, b + 1]);
        }
    }
    mesh
}

/// Unit quad in the XY plane facing +Z.
pub fn quad() -> MeshData {
    let n = [0.0, 0.0, 1.0];
    MeshData {
        vertices: vec![
            v([-0.5, -0.5, 0.0], n, [0.0, 1.0]),
            v([0.5, -0.5, 0.0], n, [1.0, 1.0]),
            v([0.5, 0.5, 0.0], n, [1.0, 0.0]),
            v([-0.5, 0.5, 0.0], n, [0.0, 0.0]),
        ],
        indices: vec![0, 1, 2, 2, 3, 0],
    }
}
