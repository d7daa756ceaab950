pub mod buffer_util;
pub mod dots_wave;
pub mod effect_params;
pub mod falling;
pub mod frame_clock;
pub mod gpu;
pub mod overlay;
pub mod pipeline;

#[cfg(test)]
mod tests {
    #[test]
    fn internal() {
        // All embedded shader sources are present and non-empty.
        assert!(!crate::include_shader!("falling_sim.wgsl").is_empty());
        assert!(!crate::include_shader!("falling_draw.wgsl").is_empty());
        assert!(!crate::include_shader!("dots_wave.wgsl").is_empty());
    }
}
