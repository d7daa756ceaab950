use serde::{Deserialize, Serialize};

// Parameters that define the overlay. These are fixed per renderer instance,
// except for the falling-particle area height which may be retuned at
// runtime through the frame driver.
#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct OverlayParams {
    pub enable_falling: bool,
    pub enable_dots_wave: bool,

    #[serde(default)]
    pub falling: FallingParams,

    #[serde(default)]
    pub dots_wave: DotsWaveParams,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct FallingParams {
    // Particles born per second.
    pub spawn_rate: f32,
    // Fixed particle store capacity; slots are recycled, never reallocated.
    pub max_particles: u32,
    // Vertical extent (points) within which particles are in play.
    pub area_height: f32,
}

impl Default for FallingParams {
    fn default() -> Self {
        FallingParams {
            spawn_rate: 300.0,
            max_particles: 4000,
            area_height: 200.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct DotsWaveParams {
    pub dot_size: f32,
    pub spacing: f32,
    pub wave_width: f32,
    pub peak_flat_fraction: f32,
    pub base_opacity: f32,
    pub peak_opacity: f32,
    pub animation_speed: f32,
    pub falloff_exponent: f32,
    pub min_brightness: f32,
}

impl Default for DotsWaveParams {
    fn default() -> Self {
        DotsWaveParams {
            dot_size: 9.0,
            spacing: 11.0,
            wave_width: 0.8,
            peak_flat_fraction: 0.1,
            base_opacity: 0.0,
            peak_opacity: 1.0,
            animation_speed: 1.75,
            falloff_exponent: 6.0,
            min_brightness: 0.3,
        }
    }
}

impl std::str::FromStr for OverlayParams {
    type Err = toml::de::Error;
    fn from_str(serialized: &str) -> Result<Self, Self::Err> {
        let params = toml::from_str(serialized)?;
        Ok(params)
    }
}

impl Default for OverlayParams {
    fn default() -> Self {
        OverlayParams {
            enable_falling: true,
            enable_dots_wave: true,
            falling: FallingParams::default(),
            dots_wave: DotsWaveParams::default(),
        }
    }
}

pub fn get_overlay_config_from_default_file() -> OverlayParams {
    let config_data = include_str!("../overlay.toml");
    match config_data.parse() {
        Ok(params) => params,
        Err(e) => {
            log::error!("Failed to parse config file({}): {:?}", "../overlay.toml", e);
            OverlayParams::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smoke() {
        let params = OverlayParams::default();
        let serialized = toml::to_string(&params).unwrap();
        println!("serialized = {}", serialized);
        let deserialized: OverlayParams = toml::from_str(&serialized).unwrap();
        println!("deserialized = {:?}", deserialized);
        assert_eq!(
            params.falling.max_particles,
            deserialized.falling.max_particles
        );
        assert_eq!(params.falling.spawn_rate, deserialized.falling.spawn_rate);
        assert_eq!(params.dots_wave.spacing, deserialized.dots_wave.spacing);
    }

    #[test]
    fn nested_sections_are_optional() {
        let params: OverlayParams = "enable_falling = true\nenable_dots_wave = false\n"
            .parse()
            .unwrap();
        assert!(params.enable_falling);
        assert!(!params.enable_dots_wave);
        assert_eq!(params.falling.max_particles, 4000);
        assert_eq!(params.falling.spawn_rate, 300.0);
    }

    #[test]
    fn default_file_parses() {
        let params = get_overlay_config_from_default_file();
        assert!(params.falling.max_particles > 0);
    }
}
