use std::sync::Arc;

use winit::window::Window;

use crate::dots_wave::DotsWaveRenderer;
use crate::effect_params::OverlayParams;
use crate::falling::FallingRenderer;
use crate::frame_clock::FrameClock;
use crate::gpu::{GpuContext, GpuError};

// The per-refresh orchestrator. While running, every tick computes a delta,
// pushes uniforms and issues Update -> Spawn -> Render on one command
// stream; stopped just withholds ticks, buffers stay allocated.
pub struct Overlay {
    pub gpu: GpuContext,
    clock: FrameClock,
    running: bool,
    falling: Option<FallingRenderer>,
    dots_wave: Option<DotsWaveRenderer>,
}

impl Overlay {
    pub async fn new(window: Arc<Window>, params: &OverlayParams) -> Result<Self, GpuError> {
        let gpu = GpuContext::new(window).await?;

        let falling = if params.enable_falling {
            Some(FallingRenderer::new(
                &gpu.device,
                gpu.config.format,
                &params.falling,
            )?)
        } else {
            None
        };
        let dots_wave = if params.enable_dots_wave {
            Some(DotsWaveRenderer::new(
                &gpu.device,
                gpu.config.format,
                &params.dots_wave,
            )?)
        } else {
            None
        };

        Ok(Overlay {
            gpu,
            clock: FrameClock::new(),
            running: false,
            falling,
            dots_wave,
        })
    }

    // Becoming visible. The first tick after this reports dt = 0 so the idle
    // gap never reaches the integrator.
    pub fn start(&mut self) {
        if !self.running {
            self.running = true;
            self.clock.pause();
        }
    }

    // Leaving the screen. In-flight GPU work completes and is discarded.
    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    pub fn set_particle_area_height(&mut self, height: f32) {
        if let Some(falling) = &mut self.falling {
            falling.set_area_height(height);
        }
    }

    // One display-refresh tick. Only OutOfMemory escapes; every other
    // surface failure skips the tick and self-heals on the next one.
    pub fn frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        if !self.running {
            return Ok(());
        }

        let frame = match self.gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::OutOfMemory) => {
                return Err(wgpu::SurfaceError::OutOfMemory);
            }
            Err(e) => {
                log::warn!("No drawable this tick ({:?}), skipping", e);
                if matches!(
                    e,
                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated
                ) {
                    self.gpu.reconfigure();
                }
                // Simulation time must not advance for a skipped tick.
                self.clock.skip();
                return Ok(());
            }
        };

        let dt = self.clock.tick();
        let time = self.clock.elapsed();
        let width = self.gpu.config.width as f32;
        let height = self.gpu.config.height as f32;

        if let Some(falling) = &mut self.falling {
            falling.update(&self.gpu.queue, dt, width, height, time);
        }
        if let Some(dots_wave) = &self.dots_wave {
            dots_wave.update(&self.gpu.queue, time, width, height);
        }

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Overlay frame"),
            });

        // Update must precede Spawn, and Render must observe post-spawn
        // state; one encoder gives exactly that ordering.
        if let Some(falling) = &self.falling {
            falling.compute(&mut encoder);
        }

        // Clear to zero alpha so the overlay composites over whatever the
        // host draws underneath.
        {
            encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Overlay clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        if let Some(dots_wave) = &self.dots_wave {
            dots_wave.render(&mut encoder, &view);
        }
        if let Some(falling) = &self.falling {
            falling.render(&mut encoder, &view);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}
