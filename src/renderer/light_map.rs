// Light-map accumulation.
//
// The frame's point lights are uploaded as one uniform array and folded into
// an off-screen light map by a single fullscreen pass; the composite stage
// multiplies the scene by it. The map is recreated only when the framebuffer
// size actually changes.

use wgpu::util::DeviceExt;

use crate::lighting::{Light, MAX_LIGHTS};

use super::post_process::{create_fullscreen_pipeline, FULLSCREEN_VS};

/// Base illumination where no light reaches.
const AMBIENT: f32 = 0.42;

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LightsUniform {
    /// x = light count, yz = framebuffer size, w = ambient level.
    meta: [f32; 4],
    /// Two vec4 per light: (x, y, radius, intensity), (r, g, b, _).
    items: [[f32; 4]; MAX_LIGHTS * 2],
}

fn lights_shader() -> String {
    format!(
        "{FULLSCREEN_VS}
struct Lights {{
    meta: vec4<f32>,
    items: array<vec4<f32>, {slots}>,
}};
@group(0) @binding(0) var<uniform> lights: Lights;

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {{
    let count = u32(lights.meta.x);
    let px = in.uv * lights.meta.yz;
    var acc = vec3<f32>(lights.meta.w);
    for (var i = 0u; i < count; i++) {{
        let a = lights.items[i * 2u];
        let col = lights.items[i * 2u + 1u];
        let d = distance(px, a.xy);
        let fall = 1.0 - clamp(d / max(a.z, 1.0), 0.0, 1.0);
        acc += col.rgb * (fall * fall * a.w);
    }}
    return vec4<f32>(min(acc, vec3<f32>(1.0, 1.0, 1.0)), 1.0);
}}",
        slots = MAX_LIGHTS * 2
    )
}

pub struct LightMapPass {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    pub texture_view: wgpu::TextureView,
    size: (u32, u32),
}

impl LightMapPass {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("lights_bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let pipeline = create_fullscreen_pipeline(device, "light_map", &lights_shader(), &[&bgl], format);

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("lights_uniform"),
            contents: bytemuck::bytes_of(&LightsUniform {
                meta: [0.0, width as f32, height as f32, AMBIENT],
                items: [[0.0; 4]; MAX_LIGHTS * 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lights_bg"),
            layout: &bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let texture_view = create_light_texture(device, format, width, height);

        Self { pipeline, uniform_buffer, uniform_bind_group, texture_view, size: (width, height) }
    }

    pub fn resize(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) {
        self.texture_view = create_light_texture(device, format, width, height);
        self.size = (width, height);
    }

    /// Upload the frame's lights and render the map.
    pub fn render(&self, queue: &wgpu::Queue, encoder: &mut wgpu::CommandEncoder, lights: &[Light]) {
        let count = lights.len().min(MAX_LIGHTS);
        let mut uniform = LightsUniform {
            meta: [count as f32, self.size.0 as f32, self.size.1 as f32, AMBIENT],
            items: [[0.0; 4]; MAX_LIGHTS * 2],
        };
        for (i, l) in lights.iter().take(count).enumerate() {
            uniform.items[i * 2] = [l.pos.x, l.pos.y, l.radius, l.intensity];
            uniform.items[i * 2 + 1] = [l.color[0], l.color[1], l.color[2], 0.0];
        }
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniform));

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("light_map_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.texture_view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.uniform_bind_group, &[]);
        pass.draw(0..6, 0..1);
    }
}

fn create_light_texture(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("light_map"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}
