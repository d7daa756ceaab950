use crate::buffer_util::{make_default_uniform_buffer, make_storage_buffer, SizedBuffer};
use crate::effect_params::FallingParams;
use crate::gpu::{finish_pipeline_scope, GpuError};
use crate::pipeline::{make_quad_pipeline, BlendChoice};
use std::borrow::Cow;

// Threadgroup width of both compute entry points. This needs to match the
// workgroup_size attribute in falling_sim.wgsl.
pub const WORKGROUP_SIZE: u32 = 64;

// One slot of the particle store. Must match the struct in both falling
// shaders; x is normalized to [0,1] of surface width, y is in points from
// the top of the particle area. life <= 0 means the slot is dormant and its
// remaining fields are stale.
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct Particle {
    pub position: [f32; 2],
    pub velocity: [f32; 2],
    pub size: f32,
    pub alpha: f32,
    pub life: f32,
    pub _pad: f32,
}

// Per-frame scalar block pushed to the device once per tick.
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct SimUniforms {
    pub delta_time: f32,
    pub screen_width: f32,
    pub screen_height: f32,
    pub spawn_rate: f32,
    pub max_particles: u32,
    pub spawn_count: u32,
    pub time: f32,
    pub area_height: f32,
}

impl SimUniforms {
    pub fn new(params: &FallingParams, dt: f32, width: f32, height: f32, time: f32) -> Self {
        SimUniforms {
            delta_time: dt,
            screen_width: width,
            screen_height: height,
            spawn_rate: params.spawn_rate,
            max_particles: params.max_particles,
            spawn_count: spawn_count(params.spawn_rate, dt),
            time,
            area_height: params.area_height,
        }
    }
}

// Slots claimed per tick. The +1 guarantees visible activity even when dt is
// tiny enough that rate * dt rounds to zero.
pub fn spawn_count(spawn_rate: f32, dt: f32) -> u32 {
    (spawn_rate * dt) as u32 + 1
}

pub struct FallingRenderer {
    pub params: FallingParams,
    update_work_groups: u32,
    spawn_work_groups: u32,

    // GPU interface cruft
    pub uniform_buffer: SizedBuffer,
    pub particle_buffer: SizedBuffer,
    pub cursor_buffer: SizedBuffer,
    update_pipeline: wgpu::ComputePipeline,
    spawn_pipeline: wgpu::ComputePipeline,
    sim_bind_group: wgpu::BindGroup,
    render_pipeline: wgpu::RenderPipeline,
    render_bind_group: wgpu::BindGroup,
}

impl FallingRenderer {
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        params: &FallingParams,
    ) -> Result<Self, GpuError> {
        // Any validation failure below surfaces as a single construction
        // error; there is no partially built pipeline state.
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let particle_buffer_size = (params.max_particles as usize
            * std::mem::size_of::<Particle>())
            as wgpu::BufferAddress;
        // Zero-initialized by the device, so every slot starts dormant.
        let particle_buffer = make_storage_buffer(device, particle_buffer_size, "Particle store");
        let cursor_buffer = make_storage_buffer(
            device,
            std::mem::size_of::<u32>() as wgpu::BufferAddress,
            "Spawn cursor",
        );
        let uniform_buffer =
            make_default_uniform_buffer::<SimUniforms>(device, "Falling sim uniforms");

        let sim_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Falling sim shader module"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(crate::include_shader!(
                "falling_sim.wgsl"
            ))),
        });

        let sim_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Falling sim bind group layout"),
                entries: &[
                    // Uniform inputs
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(uniform_buffer.size as _),
                        },
                        count: None,
                    },
                    // Particle storage buffer
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(particle_buffer.size as _),
                        },
                        count: None,
                    },
                    // Spawn cursor
                    wgpu::BindGroupLayoutEntry {
                        binding: 2,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: false },
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(cursor_buffer.size as _),
                        },
                        count: None,
                    },
                ],
            });

        let sim_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Falling sim bind group"),
            layout: &sim_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: particle_buffer.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: cursor_buffer.buffer.as_entire_binding(),
                },
            ],
        });

        let sim_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Falling sim pipeline layout"),
            bind_group_layouts: &[&sim_bind_group_layout],
            push_constant_ranges: &[],
        });

        let update_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Falling update pipeline"),
            layout: Some(&sim_pipeline_layout),
            module: &sim_module,
            entry_point: Some("update_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });
        let spawn_pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("Falling spawn pipeline"),
            layout: Some(&sim_pipeline_layout),
            module: &sim_module,
            entry_point: Some("spawn_main"),
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        // The draw stage binds the store read-only; it never mutates
        // particle state.
        let draw_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Falling draw shader module"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(crate::include_shader!(
                "falling_draw.wgsl"
            ))),
        });

        let render_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Falling render bind group layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Uniform,
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(uniform_buffer.size as _),
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::VERTEX,
                        ty: wgpu::BindingType::Buffer {
                            ty: wgpu::BufferBindingType::Storage { read_only: true },
                            has_dynamic_offset: false,
                            min_binding_size: wgpu::BufferSize::new(particle_buffer.size as _),
                        },
                        count: None,
                    },
                ],
            });

        let render_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Falling render bind group"),
            layout: &render_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: particle_buffer.buffer.as_entire_binding(),
                },
            ],
        });

        let render_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Falling render pipeline layout"),
                bind_group_layouts: &[&render_bind_group_layout],
                push_constant_ranges: &[],
            });

        let render_pipeline = make_quad_pipeline(
            device,
            "Falling render pipeline",
            &render_pipeline_layout,
            &draw_module,
            target_format,
            BlendChoice::Additive,
        );

        let update_work_groups = params.max_particles.div_ceil(WORKGROUP_SIZE);
        log::info!(
            "Falling renderer: {} particles, {} update work groups",
            params.max_particles,
            update_work_groups
        );

        finish_pipeline_scope(device)?;

        Ok(FallingRenderer {
            params: *params,
            update_work_groups,
            spawn_work_groups: 0,
            uniform_buffer,
            particle_buffer,
            cursor_buffer,
            update_pipeline,
            spawn_pipeline,
            sim_bind_group,
            render_pipeline,
            render_bind_group,
        })
    }

    // Push this tick's parameter block and size the spawn dispatch.
    pub fn update(&mut self, queue: &wgpu::Queue, dt: f32, width: f32, height: f32, time: f32) {
        let uniforms = SimUniforms::new(&self.params, dt, width, height, time);
        self.spawn_work_groups = uniforms.spawn_count.div_ceil(WORKGROUP_SIZE);
        queue.write_buffer(&self.uniform_buffer.buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    // Integrate, age and expire every slot. Must precede the spawn pass
    // within the frame so a particle is never expired and respawned in
    // contradictory order.
    pub fn encode_update(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Falling update"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.update_pipeline);
        cpass.set_bind_group(0, &self.sim_bind_group, &[]);
        log::trace!("Dispatching {} update work groups", self.update_work_groups);
        cpass.dispatch_workgroups(self.update_work_groups, 1, 1);
    }

    // Claim ring-buffer slots through the device-side atomic cursor and
    // reinitialize them as newly born.
    pub fn encode_spawn(&self, encoder: &mut wgpu::CommandEncoder) {
        let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Falling spawn"),
            timestamp_writes: None,
        });
        cpass.set_pipeline(&self.spawn_pipeline);
        cpass.set_bind_group(0, &self.sim_bind_group, &[]);
        log::trace!("Dispatching {} spawn work groups", self.spawn_work_groups);
        cpass.dispatch_workgroups(self.spawn_work_groups, 1, 1);
    }

    pub fn compute(&self, encoder: &mut wgpu::CommandEncoder) {
        self.encode_update(encoder);
        self.encode_spawn(encoder);
    }

    // Expand every slot into a camera-facing quad. Dormant slots come out
    // fully transparent, so no compaction of the store is needed.
    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Falling render"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        rpass.set_pipeline(&self.render_pipeline);
        rpass.set_bind_group(0, &self.render_bind_group, &[]);
        rpass.draw(0..4, 0..self.params.max_particles);
    }

    // Existing particles keep aging out under the new bound; only future
    // spawns and expiry checks see it. No flush.
    pub fn set_area_height(&mut self, height: f32) {
        self.params.area_height = height;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts_match_the_shaders() {
        // Buffer layouts are shared with WGSL by convention, not by codegen.
        assert_eq!(std::mem::size_of::<Particle>(), 32);
        assert_eq!(std::mem::size_of::<SimUniforms>(), 32);
    }

    #[test]
    fn spawn_count_scenario() {
        // capacity 4000, rate 300/s, dt 1/60 -> floor(300/60) + 1 = 6.
        assert_eq!(spawn_count(300.0, 1.0 / 60.0), 6);
    }

    #[test]
    fn at_least_one_spawn_for_tiny_dt() {
        assert_eq!(spawn_count(300.0, 0.0), 1);
        assert_eq!(spawn_count(300.0, 1.0e-6), 1);
        assert_eq!(spawn_count(0.5, 1.0 / 60.0), 1);
    }

    #[test]
    fn uniforms_reflect_a_resize() {
        let params = FallingParams::default();
        let before = SimUniforms::new(&params, 1.0 / 60.0, 390.0, 844.0, 1.0);
        assert_eq!(before.screen_width, 390.0);
        assert_eq!(before.screen_height, 844.0);
        // The next tick after a resize rebuilds the block from the new size.
        let after = SimUniforms::new(&params, 1.0 / 60.0, 430.0, 930.0, 1.0 + 1.0 / 60.0);
        assert_eq!(after.screen_width, 430.0);
        assert_eq!(after.screen_height, 930.0);
        assert_eq!(after.max_particles, params.max_particles);
    }

    #[test]
    fn delta_time_never_negative_yields_spawns() {
        for i in 0..10 {
            let dt = i as f32 / 600.0;
            assert!(spawn_count(300.0, dt) >= 1);
        }
    }
}
