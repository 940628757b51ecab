// Post-processing chain.
//
// bright-pass extract (half resolution) → horizontal blur → vertical blur →
// composite. Each stage reads the previous stage's texture; the composite
// folds scene + bloom + light map + vignette + overlay + aberration +
// distortion into the real framebuffer in one pass. All tunables travel in
// one `PostParams` uniform written once per frame.

use wgpu::util::DeviceExt;

use crate::state::RenderSettings;

/// Per-frame post-processing parameters. Plain numeric fields: the
/// orchestrator writes them from game-state signals, the composite pass
/// reads them once.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PostParams {
    pub bloom_threshold: f32,
    pub bloom_strength: f32,
    pub vignette_strength: f32,
    /// Chromatic aberration offset in UV units.
    pub aberration: f32,
    /// Flat color mixed over the composite by its alpha (damage flash).
    pub overlay_color: [f32; 4],
    /// Radial distortion center in normalized screen coordinates.
    pub distortion_center: [f32; 2],
    pub distortion_strength: f32,
    pub light_map_enabled: bool,
}

impl PostParams {
    pub fn from_settings(s: &RenderSettings) -> Self {
        Self {
            bloom_threshold: s.bloom_threshold,
            bloom_strength: s.bloom_strength,
            vignette_strength: s.vignette_strength,
            aberration: 0.0,
            overlay_color: [0.0; 4],
            distortion_center: [0.5, 0.5],
            distortion_strength: 0.0,
            light_map_enabled: true,
        }
    }
}

impl Default for PostParams {
    fn default() -> Self {
        Self::from_settings(&RenderSettings::default())
    }
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PostUniform {
    /// threshold, bloom strength, vignette strength, aberration.
    a: [f32; 4],
    overlay: [f32; 4],
    /// distortion center xy, distortion strength, light-map toggle.
    b: [f32; 4],
}

impl From<&PostParams> for PostUniform {
    fn from(p: &PostParams) -> Self {
        Self {
            a: [p.bloom_threshold, p.bloom_strength, p.vignette_strength, p.aberration],
            overlay: p.overlay_color,
            b: [
                p.distortion_center[0],
                p.distortion_center[1],
                p.distortion_strength,
                if p.light_map_enabled { 1.0 } else { 0.0 },
            ],
        }
    }
}

// ── Shared fullscreen plumbing ────────────────────────────────────────────────

/// Fullscreen-triangle-pair vertex stage shared by every post pass.
pub const FULLSCREEN_VS: &str = "
struct VertexOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@builtin(vertex_index) vi: u32) -> VertexOut {
    var positions = array<vec2<f32>, 6>(
        vec2<f32>(-1.0,  1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0,  1.0),
        vec2<f32>( 1.0,  1.0),
        vec2<f32>(-1.0, -1.0),
        vec2<f32>( 1.0, -1.0),
    );
    var uvs = array<vec2<f32>, 6>(
        vec2<f32>(0.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(1.0, 0.0),
        vec2<f32>(0.0, 1.0),
        vec2<f32>(1.0, 1.0),
    );
    var out: VertexOut;
    out.pos = vec4<f32>(positions[vi], 0.0, 1.0);
    out.uv  = uvs[vi];
    return out;
}
";

pub fn create_fullscreen_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader_source: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    output_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shader_source.into()),
    });

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(&format!("{}_layout", label)),
        bind_group_layouts,
        ..Default::default()
    });

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        vertex: wgpu::VertexState {
            module: &shader,
            entry_point: Some("vs_main"),
            buffers: &[],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: output_format,
                blend: None,
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
}

// ── Shaders ───────────────────────────────────────────────────────────────────

fn bright_shader() -> String {
    format!(
        "{FULLSCREEN_VS}
@group(0) @binding(0) var t_scene: texture_2d<f32>;
@group(0) @binding(1) var s_linear: sampler;
struct Params {{ a: vec4<f32>, overlay: vec4<f32>, b: vec4<f32> }};
@group(1) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {{
    let color = textureSample(t_scene, s_linear, in.uv);
    let brightness = dot(color.rgb, vec3<f32>(0.2126, 0.7152, 0.0722));
    let threshold = params.a.x;
    let keep = smoothstep(threshold, threshold + 0.2, brightness);
    return vec4<f32>(color.rgb * keep, 1.0);
}}"
    )
}

/// Separable 9-tap gaussian; `dx`/`dy` select the axis.
fn blur_shader(dx: u32, dy: u32) -> String {
    format!(
        "{FULLSCREEN_VS}
@group(0) @binding(0) var t_src: texture_2d<f32>;
@group(0) @binding(1) var s_linear: sampler;

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {{
    let texel = 1.0 / vec2<f32>(textureDimensions(t_src));
    let dir = vec2<f32>({dx}.0, {dy}.0) * texel;
    var weights = array<f32, 5>(0.227027, 0.1945946, 0.1216216, 0.054054, 0.016216);
    var acc = textureSample(t_src, s_linear, in.uv).rgb * weights[0];
    for (var i = 1; i < 5; i++) {{
        let off = dir * f32(i);
        acc += textureSample(t_src, s_linear, in.uv + off).rgb * weights[i];
        acc += textureSample(t_src, s_linear, in.uv - off).rgb * weights[i];
    }}
    return vec4<f32>(acc, 1.0);
}}"
    )
}

fn composite_shader() -> String {
    format!(
        "{FULLSCREEN_VS}
@group(0) @binding(0) var t_scene: texture_2d<f32>;
@group(0) @binding(1) var t_bloom: texture_2d<f32>;
@group(0) @binding(2) var t_light: texture_2d<f32>;
@group(0) @binding(3) var s_linear: sampler;
struct Params {{ a: vec4<f32>, overlay: vec4<f32>, b: vec4<f32> }};
@group(1) @binding(0) var<uniform> params: Params;

@fragment
fn fs_main(in: VertexOut) -> @location(0) vec4<f32> {{
    // Radial distortion toward the configured center.
    let dc = in.uv - params.b.xy;
    let warp = params.b.z * (1.0 - clamp(length(dc) * 2.0, 0.0, 1.0));
    let uv = in.uv - dc * warp;

    // Chromatic aberration splits the red/blue samples horizontally.
    let ab = vec2<f32>(params.a.w, 0.0);
    let lo = vec2<f32>(0.0, 0.0);
    let hi = vec2<f32>(1.0, 1.0);
    let r = textureSample(t_scene, s_linear, clamp(uv + ab, lo, hi)).r;
    let g = textureSample(t_scene, s_linear, uv).g;
    let b = textureSample(t_scene, s_linear, clamp(uv - ab, lo, hi)).b;
    var color = vec3<f32>(r, g, b);

    let light = textureSample(t_light, s_linear, in.uv).rgb;
    color = mix(color, color * light, params.b.w);

    let bloom = textureSample(t_bloom, s_linear, in.uv).rgb;
    color += bloom * params.a.y;

    let dist = distance(in.uv, vec2<f32>(0.5, 0.5));
    let vig = 1.0 - params.a.z * smoothstep(0.35, 0.78, dist);
    color *= vig;

    color = mix(color, params.overlay.rgb, params.overlay.a);
    return vec4<f32>(color, 1.0);
}}"
    )
}

// ── Targets ───────────────────────────────────────────────────────────────────

/// Half-resolution bloom targets plus every bind group that references a
/// size-dependent texture. Rebuilt wholesale on resize.
struct PostTargets {
    half_view_a: wgpu::TextureView,
    half_view_b: wgpu::TextureView,
    bright_bg: wgpu::BindGroup,
    blur_h_bg: wgpu::BindGroup,
    blur_v_bg: wgpu::BindGroup,
    composite_bg: wgpu::BindGroup,
}

#[allow(clippy::too_many_arguments)]
fn build_targets(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    source_bgl: &wgpu::BindGroupLayout,
    composite_bgl: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    scene_view: &wgpu::TextureView,
    light_view: &wgpu::TextureView,
    width: u32,
    height: u32,
) -> PostTargets {
    let hw = (width / 2).max(1);
    let hh = (height / 2).max(1);
    let half_view_a = create_target(device, format, hw, hh, "post_half_a");
    let half_view_b = create_target(device, format, hw, hh, "post_half_b");

    let source_bg = |view: &wgpu::TextureView| {
        device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: None,
            layout: source_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view) },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(sampler) },
            ],
        })
    };

    let bright_bg = source_bg(scene_view);
    let blur_h_bg = source_bg(&half_view_a);
    let blur_v_bg = source_bg(&half_view_b);

    let composite_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("composite_bg"),
        layout: composite_bgl,
        entries: &[
            wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(scene_view) },
            wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&half_view_a) },
            wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::TextureView(light_view) },
            wgpu::BindGroupEntry { binding: 3, resource: wgpu::BindingResource::Sampler(sampler) },
        ],
    });

    PostTargets { half_view_a, half_view_b, bright_bg, blur_h_bg, blur_v_bg, composite_bg }
}

// ── The stack ─────────────────────────────────────────────────────────────────

pub struct PostStack {
    bright_pipeline: wgpu::RenderPipeline,
    blur_h_pipeline: wgpu::RenderPipeline,
    blur_v_pipeline: wgpu::RenderPipeline,
    composite_pipeline: wgpu::RenderPipeline,
    source_bgl: wgpu::BindGroupLayout,
    composite_bgl: wgpu::BindGroupLayout,
    params_buffer: wgpu::Buffer,
    params_bind_group: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    targets: PostTargets,
}

impl PostStack {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        scene_view: &wgpu::TextureView,
        light_view: &wgpu::TextureView,
        width: u32,
        height: u32,
    ) -> Self {
        let source_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post_source_bgl"),
            entries: &[texture_entry(0), sampler_entry(1)],
        });

        let composite_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("composite_bgl"),
            entries: &[texture_entry(0), texture_entry(1), texture_entry(2), sampler_entry(3)],
        });

        let params_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("post_params_bgl"),
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

        let bright_pipeline =
            create_fullscreen_pipeline(device, "bright_pass", &bright_shader(), &[&source_bgl, &params_bgl], format);
        let blur_h_pipeline =
            create_fullscreen_pipeline(device, "blur_h", &blur_shader(1, 0), &[&source_bgl], format);
        let blur_v_pipeline =
            create_fullscreen_pipeline(device, "blur_v", &blur_shader(0, 1), &[&source_bgl], format);
        let composite_pipeline = create_fullscreen_pipeline(
            device,
            "composite",
            &composite_shader(),
            &[&composite_bgl, &params_bgl],
            format,
        );

        let params_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("post_params"),
            contents: bytemuck::bytes_of(&PostUniform::from(&PostParams::default())),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let params_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("post_params_bg"),
            layout: &params_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: params_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            ..Default::default()
        });

        let targets = build_targets(
            device,
            format,
            &source_bgl,
            &composite_bgl,
            &sampler,
            scene_view,
            light_view,
            width,
            height,
        );

        Self {
            bright_pipeline,
            blur_h_pipeline,
            blur_v_pipeline,
            composite_pipeline,
            source_bgl,
            composite_bgl,
            params_buffer,
            params_bind_group,
            sampler,
            targets,
        }
    }

    /// Recreate the half-resolution targets and every bind group that
    /// references a resized texture.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        scene_view: &wgpu::TextureView,
        light_view: &wgpu::TextureView,
        width: u32,
        height: u32,
    ) {
        self.targets = build_targets(
            device,
            format,
            &self.source_bgl,
            &self.composite_bgl,
            &self.sampler,
            scene_view,
            light_view,
            width,
            height,
        );
    }

    /// Run the whole chain: bright → blur → blur → composite into `target`.
    pub fn run(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        params: &PostParams,
        target: &wgpu::TextureView,
    ) {
        queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&PostUniform::from(params)));

        // Bright pass into half A.
        {
            let mut pass = fullscreen_pass(encoder, "bright_pass", &self.targets.half_view_a);
            pass.set_pipeline(&self.bright_pipeline);
            pass.set_bind_group(0, &self.targets.bright_bg, &[]);
            pass.set_bind_group(1, &self.params_bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
        // Horizontal blur A → B.
        {
            let mut pass = fullscreen_pass(encoder, "blur_h", &self.targets.half_view_b);
            pass.set_pipeline(&self.blur_h_pipeline);
            pass.set_bind_group(0, &self.targets.blur_h_bg, &[]);
            pass.draw(0..6, 0..1);
        }
        // Vertical blur B → A.
        {
            let mut pass = fullscreen_pass(encoder, "blur_v", &self.targets.half_view_a);
            pass.set_pipeline(&self.blur_v_pipeline);
            pass.set_bind_group(0, &self.targets.blur_v_bg, &[]);
            pass.draw(0..6, 0..1);
        }
        // Composite into the real framebuffer.
        {
            let mut pass = fullscreen_pass(encoder, "composite", target);
            pass.set_pipeline(&self.composite_pipeline);
            pass.set_bind_group(0, &self.targets.composite_bg, &[]);
            pass.set_bind_group(1, &self.params_bind_group, &[]);
            pass.draw(0..6, 0..1);
        }
    }
}

fn fullscreen_pass<'a>(
    encoder: &'a mut wgpu::CommandEncoder,
    label: &str,
    target: &wgpu::TextureView,
) -> wgpu::RenderPass<'a> {
    encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some(label),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view: target,
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
    })
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Texture {
            sample_type: wgpu::TextureSampleType::Float { filterable: true },
            view_dimension: wgpu::TextureViewDimension::D2,
            multisampled: false,
        },
        count: None,
    }
}

fn sampler_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    }
}

pub fn create_target(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    label: &str,
) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_pack_into_uniform_lanes() {
        let p = PostParams {
            bloom_threshold: 0.6,
            aberration: 0.003,
            overlay_color: [0.8, 0.1, 0.0, 0.25],
            distortion_strength: 0.04,
            light_map_enabled: false,
            ..PostParams::default()
        };
        let u = PostUniform::from(&p);
        assert_eq!(u.a[0], 0.6);
        assert_eq!(u.a[3], 0.003);
        assert_eq!(u.overlay, [0.8, 0.1, 0.0, 0.25]);
        assert_eq!(u.b[2], 0.04);
        assert_eq!(u.b[3], 0.0);
    }

    #[test]
    fn params_default_matches_settings_default() {
        let s = RenderSettings::default();
        let p = PostParams::default();
        assert_eq!(p.bloom_threshold, s.bloom_threshold);
        assert_eq!(p.vignette_strength, s.vignette_strength);
        assert!(p.light_map_enabled);
    }
}
