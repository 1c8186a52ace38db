// SPDX-License-Identifier: GPL-3.0-only

//! GPU filter engine
//!
//! Compute-shader implementation of the filter renderer. Lives entirely on
//! the render thread: device creation, resource allocation and dispatch are
//! all blocking calls from that thread, which is the sole owner of the GPU
//! context.

use super::{FilterType, RenderedFrame};
use crate::camera::{CameraFrame, PixelFormat, SensorRotation};
use crate::errors::RenderError;
use std::sync::Arc;
use tracing::{debug, info};

/// Filter parameters uniform
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct FilterParams {
    src_width: u32,
    src_height: u32,
    out_width: u32,
    out_height: u32,
    filter_mode: u32,
    rotation: u32,
    mirror: u32,
    _padding: u32,
}

/// Cached resource dimensions - avoids reallocation when dimensions match
#[derive(Default, Clone, Copy, PartialEq, Debug)]
struct CachedDimensions {
    width: u32,
    height: u32,
}

impl CachedDimensions {
    fn needs_update(&self, width: u32, height: u32) -> bool {
        self.width != width || self.height != height
    }

    fn update(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }
}

/// GPU compute pipeline applying rotation, mirror and color filter
pub struct GpuFilterEngine {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    // Cached resources for current source dimensions
    cached_dims: CachedDimensions,
    input_texture: Option<wgpu::Texture>,
    output_buffer: Option<wgpu::Buffer>,
    staging_buffer: Option<wgpu::Buffer>,
}

impl GpuFilterEngine {
    /// Create the engine, blocking on adapter/device acquisition.
    ///
    /// Fails with a message when no suitable GPU is present; callers fall
    /// back to the CPU engine in that case.
    pub fn new() -> Result<Self, String> {
        pollster::block_on(Self::new_async())
    }

    async fn new_async() -> Result<Self, String> {
        info!("Initializing GPU filter engine");

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::VULKAN,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| format!("Failed to find suitable GPU adapter: {}", e))?;

        let adapter_info = adapter.get_info();
        info!(
            adapter = %adapter_info.name,
            backend = ?adapter_info.backend,
            "GPU adapter selected for filter engine"
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("filter_engine_device"),
                required_features: wgpu::Features::empty(),
                required_limits: adapter.limits(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(|e| format!("Failed to create GPU device: {}", e))?;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("filter_compute_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("filter_compute.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("filter_bind_group_layout"),
            entries: &[
                // Input texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Output storage buffer
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: false },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Uniform buffer
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("filter_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("filter_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filter_uniform_buffer"),
            size: std::mem::size_of::<FilterParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Ok(Self {
            device,
            queue,
            pipeline,
            bind_group_layout,
            uniform_buffer,
            cached_dims: CachedDimensions::default(),
            input_texture: None,
            output_buffer: None,
            staging_buffer: None,
        })
    }

    /// Ensure resources are allocated for the given source dimensions
    fn ensure_resources(&mut self, width: u32, height: u32) {
        if !self.cached_dims.needs_update(width, height) {
            return;
        }

        debug!(width, height, "Allocating filter engine resources");

        // Output is the same pixel count regardless of rotation
        let buffer_size = (width as u64) * (height as u64) * 4;

        self.input_texture = Some(self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("filter_input_texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        }));

        self.output_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filter_output_buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        }));

        self.staging_buffer = Some(self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filter_staging_buffer"),
            size: buffer_size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        }));

        self.cached_dims.update(width, height);
    }

    /// Render one frame on the GPU
    pub fn render(
        &mut self,
        frame: &CameraFrame,
        filter: FilterType,
        rotation: SensorRotation,
        mirror: bool,
    ) -> Result<RenderedFrame, RenderError> {
        let width = frame.width;
        let height = frame.height;
        let (out_width, out_height) = if rotation.swaps_dimensions() {
            (height, width)
        } else {
            (width, height)
        };

        self.ensure_resources(width, height);

        let input_texture = self
            .input_texture
            .as_ref()
            .ok_or_else(|| RenderError::FilterFailed("input texture not allocated".into()))?;
        let output_buffer = self
            .output_buffer
            .as_ref()
            .ok_or_else(|| RenderError::FilterFailed("output buffer not allocated".into()))?;
        let staging_buffer = self
            .staging_buffer
            .as_ref()
            .ok_or_else(|| RenderError::FilterFailed("staging buffer not allocated".into()))?;

        // Upload packed RGBA (Gray8 sources expand on the way in)
        let rgba_data = match frame.format {
            PixelFormat::RGBA => frame.packed_data(),
            PixelFormat::Gray8 => frame
                .packed_data()
                .iter()
                .flat_map(|&v| [v, v, v, 255])
                .collect(),
        };

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: input_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba_data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let params = FilterParams {
            src_width: width,
            src_height: height,
            out_width,
            out_height,
            filter_mode: filter.gpu_filter_code(),
            rotation: rotation.gpu_rotation_code(),
            mirror: mirror as u32,
            _padding: 0,
        };
        self.queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&params));

        let input_view = input_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("filter_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&input_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: output_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.uniform_buffer.as_entire_binding(),
                },
            ],
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filter_encoder"),
            });

        {
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("filter_compute_pass"),
                timestamp_writes: None,
            });

            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, Some(&bind_group), &[]);
            compute_pass.dispatch_workgroups(
                out_width.div_ceil(16),
                out_height.div_ceil(16),
                1,
            );
        }

        let buffer_size = (out_width as u64) * (out_height as u64) * 4;
        encoder.copy_buffer_to_buffer(output_buffer, 0, staging_buffer, 0, buffer_size);

        self.queue.submit(std::iter::once(encoder.finish()));

        let data = pollster::block_on(self.read_staging_buffer(buffer_size))
            .map_err(RenderError::FilterFailed)?;

        Ok(RenderedFrame {
            width: out_width,
            height: out_height,
            data: Arc::from(data),
            filter,
            sequence: frame.sequence,
            captured_at: frame.captured_at,
            sensor_timestamp_ns: frame.sensor_timestamp_ns,
        })
    }

    /// Async buffer readback (map, poll, read, unmap)
    async fn read_staging_buffer(&self, size: u64) -> Result<Vec<u8>, String> {
        let buffer = self
            .staging_buffer
            .as_ref()
            .ok_or("staging buffer not allocated")?;
        let slice = buffer.slice(..size);
        let (sender, receiver) = futures::channel::oneshot::channel();

        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        let _ = self.device.poll(wgpu::PollType::wait_indefinitely());

        receiver
            .await
            .map_err(|_| "Failed to receive buffer mapping".to_string())?
            .map_err(|e| format!("Failed to map buffer: {:?}", e))?;

        let data = slice.get_mapped_range().to_vec();
        buffer.unmap();

        Ok(data)
    }
}

impl std::fmt::Debug for GpuFilterEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuFilterEngine")
            .field("cached_dims", &self.cached_dims)
            .finish()
    }
}
