// GPU submission.
//
// `GpuContext` owns the wgpu device/queue and replays a `ComposedFrame`: one
// vertex upload and one draw per recorded call into the scene target, the
// light-map pass, the post chain into the real framebuffer, and finally the
// pixel-space overlay stream on top. Pipelines and render targets are built
// lazily on the first submit and resized only when the framebuffer size
// actually changes. `dispose` releases everything exactly once.

pub mod light_map;
pub mod pipeline;
pub mod post_process;

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::batch::{DrawMode, DrawStream};
use crate::frame::ComposedFrame;
use crate::state::TextureId;
use crate::RenderError;

use light_map::LightMapPass;
use pipeline::{create_scene_pipelines, orthographic_projection, ScenePipelines};
use post_process::{create_target, PostStack};

/// Everything built lazily on first submit.
struct GpuState {
    pipelines: ScenePipelines,
    scene_view: wgpu::TextureView,
    light: LightMapPass,
    post: PostStack,
    scene_projection: wgpu::Buffer,
    scene_projection_bg: wgpu::BindGroup,
    overlay_projection: wgpu::Buffer,
    overlay_projection_bg: wgpu::BindGroup,
    sampler: wgpu::Sampler,
    frame_size: (u32, u32),
    window_size: (u32, u32),
}

pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    state: Option<GpuState>,
    /// Host-registered texture pages (atlas, font) by id.
    textures: HashMap<TextureId, wgpu::TextureView>,
    /// Bind groups built on demand from `textures`.
    texture_bind_groups: HashMap<TextureId, wgpu::BindGroup>,
    disposed: bool,
}

impl GpuContext {
    /// Wrap a host-provided device. The host keeps ownership of the surface
    /// and swapchain; this context only ever draws into views it is handed.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        Self {
            device,
            queue,
            format,
            state: None,
            textures: HashMap::new(),
            texture_bind_groups: HashMap::new(),
            disposed: false,
        }
    }

    /// Acquire a device with no surface, for demos and offline rendering.
    pub fn headless() -> Self {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions::default()))
            .expect("no suitable GPU adapter found");
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default()))
            .expect("failed to create device");
        Self::new(device, queue, wgpu::TextureFormat::Rgba8UnormSrgb)
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Register (or replace) a texture page the draw streams may reference.
    pub fn register_texture(&mut self, id: TextureId, view: wgpu::TextureView) {
        self.texture_bind_groups.remove(&id);
        self.textures.insert(id, view);
    }

    /// Release all GPU resources. The context is unusable afterwards;
    /// calling it twice is a programmer error.
    pub fn dispose(&mut self) {
        assert!(!self.disposed, "GpuContext::dispose called twice");
        self.state = None;
        self.textures.clear();
        self.texture_bind_groups.clear();
        self.disposed = true;
        log::info!("gpu context disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Replay one composed frame into `target`.
    pub fn submit(&mut self, frame: &ComposedFrame, target: &wgpu::TextureView) -> Result<(), RenderError> {
        assert!(!self.disposed, "GpuContext used after dispose");

        self.ensure_state(frame.frame_size, frame.window_size);
        self.build_texture_bind_groups(frame);

        let state = self.state.as_ref().expect("state initialized above");
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("frame") });

        // Scene pass into the offscreen target.
        let scene_vbuf = self.upload_vertices(&frame.scene, "scene_vertices");
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &state.scene_view,
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
            if let Some(vbuf) = &scene_vbuf {
                self.replay(&mut pass, state, vbuf, &frame.scene, &state.scene_projection_bg);
            }
        }

        // Light map from the frame's accumulated lights.
        state.light.render(&self.queue, &mut encoder, &frame.lights);

        // Bright → blur → blur → composite into the framebuffer.
        state.post.run(&self.queue, &mut encoder, &frame.post, target);

        // Pixel-space overlay (HUD, state screens) on top of the composite.
        let overlay_vbuf = self.upload_vertices(&frame.overlay, "overlay_vertices");
        if let Some(vbuf) = &overlay_vbuf {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("overlay_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            self.replay(&mut pass, state, vbuf, &frame.overlay, &state.overlay_projection_bg);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Issue one GPU draw per recorded call, switching pipeline/bind state
    /// only between calls. Calls referencing an unregistered texture are
    /// skipped (missing-asset policy).
    fn replay(
        &self,
        pass: &mut wgpu::RenderPass<'_>,
        state: &GpuState,
        vbuf: &wgpu::Buffer,
        stream: &DrawStream,
        projection_bg: &wgpu::BindGroup,
    ) {
        pass.set_vertex_buffer(0, vbuf.slice(..));
        for call in &stream.calls {
            pass.set_pipeline(state.pipelines.pipeline_for(call.mode, call.blend));
            pass.set_bind_group(0, projection_bg, &[]);
            if call.mode == DrawMode::Sprite {
                let Some(texture) = call.texture else { continue };
                let Some(bg) = self.texture_bind_groups.get(&texture) else {
                    log::debug!("draw call skipped: texture {texture:?} not registered");
                    continue;
                };
                pass.set_bind_group(1, bg, &[]);
            }
            pass.draw(call.first..call.first + call.count, 0..1);
        }
    }

    fn upload_vertices(&self, stream: &DrawStream, label: &str) -> Option<wgpu::Buffer> {
        if stream.vertices.is_empty() {
            return None;
        }
        Some(self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: stream.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        }))
    }

    /// Build pipelines/targets on first use; resize targets only when the
    /// framebuffer size actually changed since the previous frame.
    fn ensure_state(&mut self, frame_size: (u32, u32), window_size: (u32, u32)) {
        let (fw, fh) = frame_size;
        match &mut self.state {
            None => {
                log::info!("initializing gpu state at {fw}x{fh}");
                let pipelines = create_scene_pipelines(&self.device, self.format);
                let scene_view = create_target(&self.device, self.format, fw, fh, "scene_target");
                let light = LightMapPass::new(&self.device, self.format, fw, fh);
                let post = PostStack::new(&self.device, self.format, &scene_view, &light.texture_view, fw, fh);

                let scene_projection = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("scene_projection"),
                    contents: bytemuck::cast_slice(&orthographic_projection(fw as f32, fh as f32)),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });
                let overlay_projection = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("overlay_projection"),
                    contents: bytemuck::cast_slice(&orthographic_projection(
                        window_size.0 as f32,
                        window_size.1 as f32,
                    )),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                });

                let proj_bg = |buffer: &wgpu::Buffer, label: &str| {
                    self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some(label),
                        layout: &pipelines.projection_bind_group_layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffer.as_entire_binding(),
                        }],
                    })
                };
                let scene_projection_bg = proj_bg(&scene_projection, "scene_projection_bg");
                let overlay_projection_bg = proj_bg(&overlay_projection, "overlay_projection_bg");

                let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
                    mag_filter: wgpu::FilterMode::Nearest,
                    min_filter: wgpu::FilterMode::Nearest,
                    ..Default::default()
                });

                self.state = Some(GpuState {
                    pipelines,
                    scene_view,
                    light,
                    post,
                    scene_projection,
                    scene_projection_bg,
                    overlay_projection,
                    overlay_projection_bg,
                    sampler,
                    frame_size,
                    window_size,
                });
            }
            Some(state) => {
                if state.frame_size != frame_size {
                    log::debug!(
                        "framebuffer resized {:?} -> {:?}, rebuilding targets",
                        state.frame_size,
                        frame_size
                    );
                    state.scene_view = create_target(&self.device, self.format, fw, fh, "scene_target");
                    state.light.resize(&self.device, self.format, fw, fh);
                    state.post.resize(
                        &self.device,
                        self.format,
                        &state.scene_view,
                        &state.light.texture_view,
                        fw,
                        fh,
                    );
                    self.queue.write_buffer(
                        &state.scene_projection,
                        0,
                        bytemuck::cast_slice(&orthographic_projection(fw as f32, fh as f32)),
                    );
                    state.frame_size = frame_size;
                }
                if state.window_size != window_size {
                    self.queue.write_buffer(
                        &state.overlay_projection,
                        0,
                        bytemuck::cast_slice(&orthographic_projection(
                            window_size.0 as f32,
                            window_size.1 as f32,
                        )),
                    );
                    state.window_size = window_size;
                }
            }
        }
    }

    /// Make sure every texture referenced by this frame's sprite calls has a
    /// bind group, building missing ones from the registered views.
    fn build_texture_bind_groups(&mut self, frame: &ComposedFrame) {
        let Some(state) = &self.state else { return };
        for call in frame.scene.calls.iter().chain(frame.overlay.calls.iter()) {
            let Some(id) = call.texture else { continue };
            if self.texture_bind_groups.contains_key(&id) {
                continue;
            }
            let Some(view) = self.textures.get(&id) else { continue };
            let bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("atlas_page_bg"),
                layout: &state.pipelines.atlas_bind_group_layout,
                entries: &[
                    wgpu::BindGroupEntry { binding: 0, resource: wgpu::BindingResource::TextureView(view) },
                    wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::Sampler(&state.sampler) },
                ],
            });
            self.texture_bind_groups.insert(id, bg);
        }
    }
}
