use std::sync::Arc;

use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

gflags::define! {
    --width: u32 = 390
}
gflags::define! {
    --height: u32 = 700
}
gflags::define! {
    --no_falling = false
}
gflags::define! {
    --no_dots_wave = false
}
gflags::define! {
    --area_height: f32 = 0.0
}

struct App {
    params: lightfall::effect_params::OverlayParams,
    window: Option<Arc<Window>>,
    overlay: Option<lightfall::overlay::Overlay>,
}

impl App {
    fn new(params: lightfall::effect_params::OverlayParams) -> Self {
        App {
            params,
            window: None,
            overlay: None,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_none() {
            // Transparent so the zero-alpha clear shows whatever the host
            // compositor has underneath.
            let attrs = Window::default_attributes()
                .with_title("lightfall")
                .with_transparent(true)
                .with_inner_size(winit::dpi::LogicalSize::new(WIDTH.flag, HEIGHT.flag));
            let window = Arc::new(event_loop.create_window(attrs).unwrap());

            match pollster::block_on(lightfall::overlay::Overlay::new(
                window.clone(),
                &self.params,
            )) {
                Ok(overlay) => self.overlay = Some(overlay),
                Err(e) => {
                    // Effect unavailable; keep the window alive with no
                    // overlay rather than crash.
                    log::error!("Overlay unavailable: {}", e);
                }
            }
            self.window = Some(window);
        }
        if let Some(overlay) = &mut self.overlay {
            overlay.start();
        }
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(overlay) = &mut self.overlay {
            overlay.stop();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                if let Some(overlay) = &mut self.overlay {
                    overlay.resize(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => {
                if let Some(overlay) = &mut self.overlay {
                    match overlay.frame() {
                        Ok(()) => {}
                        Err(wgpu::SurfaceError::OutOfMemory) => {
                            log::error!("Out of device memory, shutting down");
                            event_loop.exit();
                        }
                        Err(e) => log::warn!("Frame error: {:?}", e),
                    }
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }
}

fn main() -> anyhow::Result<()> {
    scrub_log::init().unwrap();
    gflags::parse();

    let mut params = lightfall::effect_params::get_overlay_config_from_default_file();
    if NO_FALLING.flag {
        params.enable_falling = false;
    }
    if NO_DOTS_WAVE.flag {
        params.enable_dots_wave = false;
    }
    if AREA_HEIGHT.flag > 0.0 {
        params.falling.area_height = AREA_HEIGHT.flag;
    }

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(params);
    event_loop.run_app(&mut app)?;
    Ok(())
}
