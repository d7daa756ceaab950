use std::sync::Arc;

use winit::window::Window;

// Construction failures are terminal for the renderer instance; the host is
// expected to degrade to "no effect" rather than crash. Per-frame surface
// errors are not represented here, they are transient (see overlay.rs).
#[derive(Debug, thiserror::Error)]
pub enum GpuError {
    #[error("no compatible graphics adapter found")]
    NoAdapter,
    #[error("failed to acquire graphics device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("failed to create render surface: {0}")]
    CreateSurface(#[from] wgpu::CreateSurfaceError),
    #[error("device rejected a pipeline descriptor: {0}")]
    PipelineBuild(String),
}

pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub config: wgpu::SurfaceConfiguration,
}

impl GpuContext {
    pub async fn new(window: Arc<Window>) -> Result<Self, GpuError> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("lightfall device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = preferred_surface_format(&surface_caps);
        let alpha_mode = preferred_alpha_mode(&surface_caps);
        log::info!(
            "Using adapter \"{}\", surface format {:?}, alpha mode {:?}",
            adapter.get_info().name,
            format,
            alpha_mode
        );

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        Ok(GpuContext {
            device,
            queue,
            surface,
            config,
        })
    }

    // A resize is never fatal; the new extent lands in the next tick's
    // uniforms when the frame driver reads config.width/height.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
    }

    pub fn reconfigure(&self) {
        self.surface.configure(&self.device, &self.config);
    }
}

// Additive blending benefits from extended-range headroom; prefer a wide
// format when the surface offers one.
fn preferred_surface_format(caps: &wgpu::SurfaceCapabilities) -> wgpu::TextureFormat {
    caps.formats
        .iter()
        .copied()
        .find(|format| {
            matches!(
                format,
                wgpu::TextureFormat::Rgba16Float | wgpu::TextureFormat::Rgb10a2Unorm
            )
        })
        .unwrap_or(caps.formats[0])
}

// The zero-alpha clear only layers over host content if the surface's alpha
// channel actually reaches the compositor; an opaque mode would flatten the
// overlay onto a black background.
fn preferred_alpha_mode(caps: &wgpu::SurfaceCapabilities) -> wgpu::CompositeAlphaMode {
    caps.alpha_modes
        .iter()
        .copied()
        .find(|mode| {
            matches!(
                mode,
                wgpu::CompositeAlphaMode::PostMultiplied
                    | wgpu::CompositeAlphaMode::PreMultiplied
                    | wgpu::CompositeAlphaMode::Inherit
            )
        })
        .unwrap_or(caps.alpha_modes[0])
}

// Device without a surface, for offline simulation tests.
pub async fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions::default())
        .await?;
    adapter
        .request_device(
            &wgpu::DeviceDescriptor {
                label: Some("lightfall headless device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::default(),
            },
            None,
        )
        .await
        .ok()
}

// Collects any validation error raised since the matching push_error_scope
// into the construction-level error taxonomy.
pub fn finish_pipeline_scope(device: &wgpu::Device) -> Result<(), GpuError> {
    match pollster::block_on(device.pop_error_scope()) {
        Some(error) => Err(GpuError::PipelineBuild(error.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps_with_alpha_modes(modes: Vec<wgpu::CompositeAlphaMode>) -> wgpu::SurfaceCapabilities {
        wgpu::SurfaceCapabilities {
            alpha_modes: modes,
            ..Default::default()
        }
    }

    #[test]
    fn non_opaque_alpha_mode_wins_over_declaration_order() {
        // Surfaces commonly list Opaque (or Auto) first; the overlay needs
        // the compositor to honor its alpha channel, so a non-opaque mode
        // must be picked whenever one is offered.
        let caps = caps_with_alpha_modes(vec![
            wgpu::CompositeAlphaMode::Opaque,
            wgpu::CompositeAlphaMode::PostMultiplied,
        ]);
        assert_eq!(
            preferred_alpha_mode(&caps),
            wgpu::CompositeAlphaMode::PostMultiplied
        );

        let caps = caps_with_alpha_modes(vec![
            wgpu::CompositeAlphaMode::Auto,
            wgpu::CompositeAlphaMode::PreMultiplied,
            wgpu::CompositeAlphaMode::PostMultiplied,
        ]);
        assert_eq!(
            preferred_alpha_mode(&caps),
            wgpu::CompositeAlphaMode::PreMultiplied
        );
    }

    #[test]
    fn opaque_only_surface_falls_back_to_first_mode() {
        let caps = caps_with_alpha_modes(vec![wgpu::CompositeAlphaMode::Opaque]);
        assert_eq!(
            preferred_alpha_mode(&caps),
            wgpu::CompositeAlphaMode::Opaque
        );
    }

    #[test]
    fn wide_format_wins_over_declaration_order() {
        let caps = wgpu::SurfaceCapabilities {
            formats: vec![
                wgpu::TextureFormat::Bgra8UnormSrgb,
                wgpu::TextureFormat::Rgba16Float,
            ],
            ..Default::default()
        };
        assert_eq!(
            preferred_surface_format(&caps),
            wgpu::TextureFormat::Rgba16Float
        );

        let caps = wgpu::SurfaceCapabilities {
            formats: vec![wgpu::TextureFormat::Bgra8UnormSrgb],
            ..Default::default()
        };
        assert_eq!(
            preferred_surface_format(&caps),
            wgpu::TextureFormat::Bgra8UnormSrgb
        );
    }
}
