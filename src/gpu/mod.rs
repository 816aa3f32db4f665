//! Compute-shader evaluation of the density field.
//!
//! The field is laid out as a `size` × `size²` grid of RGBA texels, one
//! invocation per texel. Channel 0 holds the density of the current frame and
//! channel 1 the density of the previous one. Two storage buffers alternate
//! between the read and write role each frame.

use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use ndarray::Array3;
use tracing::{debug, info};
use wgpu::util::DeviceExt;

use crate::{
    error::{GpuError, Result},
    field::DensityBackend,
    settings::{DEFAULT_SPHERE_RADIUS, DensityFieldSettings, ShapeMode},
    types::Value,
};

const SHADER: &str = include_str!("density.wgsl");

/// Must match `@workgroup_size` in `density.wgsl`.
const WORKGROUP_SIZE: u32 = 8;

const TEXEL_CHANNELS: usize = 4;
const TEXEL_BYTES: u64 = (TEXEL_CHANNELS * size_of::<f32>()) as u64;

const MODE_SPHERE: u32 = 0;
const MODE_TERRAIN: u32 = 1;

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct DensityUniforms {
    time: f32,
    frequency: f32,
    amplitude: f32,
    persistence: f32,
    lacunarity: f32,
    ridge_sharpness: f32,
    time_scale: f32,
    radius: f32,
    octaves: u32,
    size: u32,
    mode: u32,
    seed: u32,
    width: u32,
    height: u32,
    _pad: [u32; 2],
}

impl DensityUniforms {
    fn new(settings: &DensityFieldSettings, mode: ShapeMode, time: Value, size: u32) -> Self {
        let (mode, radius) = match mode {
            ShapeMode::Terrain => (MODE_TERRAIN, DEFAULT_SPHERE_RADIUS),
            ShapeMode::Sphere { radius } => (MODE_SPHERE, radius),
        };
        Self {
            time,
            frequency: settings.frequency,
            amplitude: settings.amplitude,
            persistence: settings.persistence,
            lacunarity: settings.lacunarity,
            ridge_sharpness: settings.ridge_sharpness,
            time_scale: settings.time_scale,
            radius,
            octaves: settings.octaves,
            size,
            mode,
            seed: settings.seed,
            width: size,
            height: size * size,
            _pad: [0; 2],
        }
    }
}

/// Headless wgpu device evaluating one fixed-size density field per frame.
pub struct GpuDensityBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    pipeline: wgpu::ComputePipeline,
    uniforms: wgpu::Buffer,
    texels: [wgpu::Buffer; 2],
    /// `bind_groups[i]` reads `texels[i]` and writes the other buffer.
    bind_groups: [wgpu::BindGroup; 2],
    readback: wgpu::Buffer,
    host: Vec<f32>,
    /// Index of the buffer holding the latest frame.
    latest: usize,
    size: u32,
}

impl GpuDensityBackend {
    /// Requests a compute-capable adapter and builds the pipeline for `settings.size`.
    pub fn new(settings: &DensityFieldSettings) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::from_env_or_default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }))
        .map_err(|err| GpuError::NoAdapter(err.to_string()))?;

        if !adapter
            .get_downlevel_capabilities()
            .flags
            .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
        {
            return Err(GpuError::ComputeUnsupported.into());
        }
        info!("density compute adapter: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("density field"),
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_defaults(),
            memory_hints: wgpu::MemoryHints::Performance,
            trace: wgpu::Trace::Off,
        }))
        .map_err(|err| GpuError::DeviceRequest(err.to_string()))?;

        Self::from_device(device, queue, settings.size)
    }

    fn from_device(device: wgpu::Device, queue: wgpu::Queue, size: usize) -> Result<Self> {
        let limits = device.limits();
        let texel_count = size.pow(3);
        let buffer_bytes = texel_count as u64 * TEXEL_BYTES;
        if buffer_bytes > u64::from(limits.max_storage_buffer_binding_size) {
            return Err(GpuError::GridTooLarge {
                size,
                limit: u64::from(limits.max_storage_buffer_binding_size),
            }
            .into());
        }
        let rows = (size * size) as u64;
        if rows.div_ceil(u64::from(WORKGROUP_SIZE))
            > u64::from(limits.max_compute_workgroups_per_dimension)
        {
            return Err(GpuError::GridTooLarge {
                size,
                limit: u64::from(limits.max_compute_workgroups_per_dimension),
            }
            .into());
        }
        let size = size as u32;

        // shader or layout problems surface here instead of through the panic handler
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("density.wgsl"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("density layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage(1, true),
                storage(2, false),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("density pipeline layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("density pipeline"),
            layout: Some(&pipeline_layout),
            module: &module,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        let uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("density uniforms"),
            contents: bytemuck::bytes_of(&DensityUniforms::zeroed()),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let texels = [0, 1].map(|i| {
            device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(if i == 0 { "density texels a" } else { "density texels b" }),
                size: buffer_bytes,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            })
        });
        let bind_groups = [0, 1].map(|read| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("density bind group"),
                layout: &layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: texels[read].as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: texels[1 - read].as_entire_binding(),
                    },
                ],
            })
        });
        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("density readback"),
            size: buffer_bytes,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            return Err(GpuError::Validation(err.to_string()).into());
        }
        debug!("density pipeline ready for {size}³ field ({buffer_bytes} bytes per buffer)");

        Ok(Self {
            device,
            queue,
            pipeline,
            uniforms,
            texels,
            bind_groups,
            readback,
            host: vec![0.0; texel_count * TEXEL_CHANNELS],
            latest: 0,
            size,
        })
    }

    fn dispatch(&mut self, uniforms: &DensityUniforms) -> Result<()> {
        self.queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(uniforms));

        let written = 1 - self.latest;
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("density encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("density pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &self.bind_groups[self.latest], &[]);
            pass.dispatch_workgroups(
                uniforms.width.div_ceil(WORKGROUP_SIZE),
                uniforms.height.div_ceil(WORKGROUP_SIZE),
                1,
            );
        }
        encoder.copy_buffer_to_buffer(
            &self.texels[written],
            0,
            &self.readback,
            0,
            self.readback.size(),
        );
        self.queue.submit(Some(encoder.finish()));
        self.latest = written;

        self.read_back()
    }

    fn read_back(&mut self) -> Result<()> {
        let slice = self.readback.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.device
            .poll(wgpu::PollType::Wait)
            .map_err(|err| GpuError::Poll(err.to_string()))?;
        receiver
            .recv()
            .map_err(|err| GpuError::BufferMapping(err.to_string()))?
            .map_err(|err| GpuError::BufferMapping(err.to_string()))?;

        {
            let mapped = slice.get_mapped_range();
            let texels: &[f32] = bytemuck::cast_slice(&mapped);
            if texels.len() != self.host.len() {
                let actual = texels.len();
                drop(mapped);
                self.readback.unmap();
                return Err(GpuError::ReadbackMismatch {
                    expected: self.host.len(),
                    actual,
                }
                .into());
            }
            self.host.copy_from_slice(texels);
        }
        self.readback.unmap();
        Ok(())
    }
}

impl DensityBackend for GpuDensityBackend {
    fn evaluate(
        &mut self,
        settings: &DensityFieldSettings,
        mode: ShapeMode,
        time: Value,
        out: &mut Array3<Value>,
    ) -> Result<()> {
        let expected = self.host.len() / TEXEL_CHANNELS;
        if out.len() != expected {
            return Err(GpuError::ReadbackMismatch {
                expected,
                actual: out.len(),
            }
            .into());
        }

        self.dispatch(&DensityUniforms::new(settings, mode, time, self.size))?;

        for (value, texel) in out.iter_mut().zip(self.host.chunks_exact(TEXEL_CHANNELS)) {
            *value = texel[0];
        }
        Ok(())
    }
}

impl Drop for GpuDensityBackend {
    fn drop(&mut self) {
        debug!("destroying density buffers");
        for buffer in self.texels.iter().chain([&self.readback, &self.uniforms]) {
            buffer.destroy();
        }
    }
}
