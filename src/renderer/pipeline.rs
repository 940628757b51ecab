// Scene pipelines.
//
// One shader module with a shared vertex stage and two fragment entry points
// (flat shape vs. atlas-sampled sprite), built in the two blend variants the
// batcher can record. Vertices come straight from the CPU draw stream.

use crate::batch::{BlendMode, DrawMode, Vertex};

const SCENE_SHADER: &str = "
@group(0) @binding(0) var<uniform> projection: mat4x4<f32>;

struct VsIn {
    @location(0) position: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
}

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
}

@vertex
fn vs_main(in: VsIn) -> VsOut {
    var out: VsOut;
    out.pos = projection * vec4<f32>(in.position, 0.0, 1.0);
    out.uv = in.uv;
    out.color = in.color;
    return out;
}

@fragment
fn fs_shape(in: VsOut) -> @location(0) vec4<f32> {
    return in.color;
}

@group(1) @binding(0) var t_atlas: texture_2d<f32>;
@group(1) @binding(1) var s_atlas: sampler;

@fragment
fn fs_sprite(in: VsOut) -> @location(0) vec4<f32> {
    return textureSample(t_atlas, s_atlas, in.uv) * in.color;
}
";

/// Additive blending: colors sum toward white, standard for glow work.
const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

pub fn vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x2, // position
        1 => Float32x2, // uv
        2 => Float32x4, // color
    ];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &ATTRIBS,
    }
}

/// The four scene pipelines (shape/sprite × alpha/additive) plus the bind
/// group layouts shared with the rest of the renderer.
pub struct ScenePipelines {
    pub shape_alpha: wgpu::RenderPipeline,
    pub shape_additive: wgpu::RenderPipeline,
    pub sprite_alpha: wgpu::RenderPipeline,
    pub sprite_additive: wgpu::RenderPipeline,
    pub projection_bind_group_layout: wgpu::BindGroupLayout,
    pub atlas_bind_group_layout: wgpu::BindGroupLayout,
}

impl ScenePipelines {
    pub fn pipeline_for(&self, mode: DrawMode, blend: BlendMode) -> &wgpu::RenderPipeline {
        match (mode, blend) {
            (DrawMode::Shape, BlendMode::Alpha) => &self.shape_alpha,
            (DrawMode::Shape, BlendMode::Additive) => &self.shape_additive,
            (DrawMode::Sprite, BlendMode::Alpha) => &self.sprite_alpha,
            (DrawMode::Sprite, BlendMode::Additive) => &self.sprite_additive,
        }
    }
}

pub fn create_scene_pipelines(device: &wgpu::Device, format: wgpu::TextureFormat) -> ScenePipelines {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("scene_shader"),
        source: wgpu::ShaderSource::Wgsl(SCENE_SHADER.into()),
    });

    let projection_bind_group_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("projection_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

    let atlas_bind_group_layout =
        device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("atlas_bgl"),
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
            ],
        });

    let shape_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("shape_pipeline_layout"),
        bind_group_layouts: &[&projection_bind_group_layout],
        ..Default::default()
    });

    let sprite_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("sprite_pipeline_layout"),
        bind_group_layouts: &[&projection_bind_group_layout, &atlas_bind_group_layout],
        ..Default::default()
    });

    let build = |label: &str,
                 layout: &wgpu::PipelineLayout,
                 entry: &'static str,
                 blend: wgpu::BlendState| {
        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[vertex_layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some(entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(blend),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    };

    ScenePipelines {
        shape_alpha: build("shape_alpha", &shape_layout, "fs_shape", wgpu::BlendState::ALPHA_BLENDING),
        shape_additive: build("shape_additive", &shape_layout, "fs_shape", ADDITIVE_BLEND),
        sprite_alpha: build("sprite_alpha", &sprite_layout, "fs_sprite", wgpu::BlendState::ALPHA_BLENDING),
        sprite_additive: build("sprite_additive", &sprite_layout, "fs_sprite", ADDITIVE_BLEND),
        projection_bind_group_layout,
        atlas_bind_group_layout,
    }
}

/// Orthographic projection matrix (column-major) mapping pixel coords
/// `[0..w] × [0..h]` (y-down) to clip space.
pub fn orthographic_projection(width: f32, height: f32) -> [f32; 16] {
    [
        2.0 / width, 0.0,           0.0, 0.0,
        0.0,         -2.0 / height, 0.0, 0.0,
        0.0,         0.0,           1.0, 0.0,
        -1.0,        1.0,           0.0, 1.0,
    ]
}
