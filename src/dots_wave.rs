use crate::buffer_util::{make_default_uniform_buffer, SizedBuffer};
use crate::effect_params::DotsWaveParams;
use crate::gpu::{finish_pipeline_scope, GpuError};
use crate::pipeline::{make_quad_pipeline, BlendChoice};
use std::borrow::Cow;

// Must match the struct in dots_wave.wgsl, including the explicit padding
// around the vec2 resolution.
#[derive(Copy, Clone, Debug, Default, bytemuck::Pod, bytemuck::Zeroable)]
#[repr(C)]
pub struct DotsWaveUniforms {
    pub time: f32,
    pub _pad0: f32,
    pub resolution: [f32; 2],
    pub dot_size: f32,
    pub spacing: f32,
    pub wave_width: f32,
    pub peak_flat_fraction: f32,
    pub base_opacity: f32,
    pub peak_opacity: f32,
    pub animation_speed: f32,
    pub falloff_exponent: f32,
    pub min_brightness: f32,
    pub _pad1: f32,
    pub _pad2: f32,
    pub _pad3: f32,
}

impl DotsWaveUniforms {
    pub fn new(params: &DotsWaveParams, time: f32, width: f32, height: f32) -> Self {
        DotsWaveUniforms {
            time,
            resolution: [width, height],
            dot_size: params.dot_size,
            spacing: params.spacing,
            wave_width: params.wave_width,
            peak_flat_fraction: params.peak_flat_fraction,
            base_opacity: params.base_opacity,
            peak_opacity: params.peak_opacity,
            animation_speed: params.animation_speed,
            falloff_exponent: params.falloff_exponent,
            min_brightness: params.min_brightness,
            ..Default::default()
        }
    }
}

// The stateless variant: no particle store, no compute passes. Brightness is
// a pure function of dot grid position and elapsed time.
pub struct DotsWaveRenderer {
    pub params: DotsWaveParams,
    pub uniform_buffer: SizedBuffer,
    render_pipeline: wgpu::RenderPipeline,
    render_bind_group: wgpu::BindGroup,
}

impl DotsWaveRenderer {
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        params: &DotsWaveParams,
    ) -> Result<Self, GpuError> {
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let uniform_buffer =
            make_default_uniform_buffer::<DotsWaveUniforms>(device, "Dots wave uniforms");

        let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Dots wave shader module"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(crate::include_shader!(
                "dots_wave.wgsl"
            ))),
        });

        let bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Dots wave bind group layout"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(uniform_buffer.size as _),
                    },
                    count: None,
                }],
            });

        let render_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Dots wave bind group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Dots wave pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // Dots must not brighten past their own color under overlap, hence
        // plain alpha compositing rather than the sparks' additive blend.
        let render_pipeline = make_quad_pipeline(
            device,
            "Dots wave pipeline",
            &pipeline_layout,
            &module,
            target_format,
            BlendChoice::AlphaOver,
        );

        finish_pipeline_scope(device)?;

        Ok(DotsWaveRenderer {
            params: *params,
            uniform_buffer,
            render_pipeline,
            render_bind_group,
        })
    }

    pub fn update(&self, queue: &wgpu::Queue, time: f32, width: f32, height: f32) {
        let uniforms = DotsWaveUniforms::new(&self.params, time, width, height);
        queue.write_buffer(&self.uniform_buffer.buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    pub fn render(&self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Dots wave render"),
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
        rpass.draw(0..4, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_the_shader() {
        assert_eq!(std::mem::size_of::<DotsWaveUniforms>(), 64);
    }

    #[test]
    fn uniforms_carry_the_configuration() {
        let params = DotsWaveParams::default();
        let u = DotsWaveUniforms::new(&params, 2.5, 390.0, 200.0);
        assert_eq!(u.time, 2.5);
        assert_eq!(u.resolution, [390.0, 200.0]);
        assert_eq!(u.dot_size, 9.0);
        assert_eq!(u.spacing, 11.0);
        assert_eq!(u.animation_speed, 1.75);
        assert_eq!(u.min_brightness, 0.3);
    }
}
