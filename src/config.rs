// ============================================================================
// ENGINE CONFIGURATION — explicit settings passed at construction
// ============================================================================

use std::path::{Path, PathBuf};

use image::Rgba;

use crate::brush::{WHITE, parse_hex_color};
use crate::ops::stroke::InterpolationPolicy;

/// Device class the engine is tuned for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PlatformProfile {
    #[default]
    Desktop,
    Mobile,
}

impl PlatformProfile {
    /// Base images are divided by this before becoming the working texture.
    pub fn texture_scale(&self) -> u32 {
        match self {
            PlatformProfile::Desktop => 1,
            PlatformProfile::Mobile => 2,
        }
    }

    /// Multiplier from slider radius to working-texture radius.
    pub fn radius_scale(&self) -> f32 {
        match self {
            PlatformProfile::Desktop => 1.0,
            PlatformProfile::Mobile => 0.5,
        }
    }

    /// Spray droplets per unit of radius.
    pub fn spray_scatter(&self) -> u32 {
        match self {
            PlatformProfile::Desktop => 5,
            PlatformProfile::Mobile => 2,
        }
    }

    /// Upper bound of the brush-size slider.
    pub fn max_brush_radius(&self) -> u32 {
        match self {
            PlatformProfile::Desktop => 20,
            PlatformProfile::Mobile => 10,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PlatformProfile::Desktop => "desktop",
            PlatformProfile::Mobile => "mobile",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    pub platform: PlatformProfile,
    pub interpolation: InterpolationPolicy,
    /// Ticks between a stroke/fill finishing and its save being written.
    pub save_delay_ticks: u64,
    /// Seed for the brush texture generator.
    pub seed: u64,
    /// Canvas background; also what the eraser and `clear_canvas` paint.
    pub background: Rgba<u8>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            platform: PlatformProfile::Desktop,
            interpolation: InterpolationPolicy::default(),
            save_delay_ticks: 1,
            seed: 0x00c0_105e,
            background: WHITE,
        }
    }
}

impl EngineConfig {
    pub fn mobile() -> Self {
        Self { platform: PlatformProfile::Mobile, ..Self::default() }
    }

    pub fn set_platform(&mut self, platform: PlatformProfile) {
        self.platform = platform;
    }

    pub fn set_interpolation(&mut self, policy: InterpolationPolicy) {
        self.interpolation = policy;
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    pub fn set_save_delay_ticks(&mut self, ticks: u64) {
        self.save_delay_ticks = ticks;
    }

    pub fn set_background(&mut self, color: Rgba<u8>) {
        self.background = color;
    }

    /// Brush radius → working-texture radius.
    pub fn effective_radius(&self, radius: u32) -> u32 {
        (radius as f32 * self.platform.radius_scale()).round() as u32
    }

    /// Default settings file location.
    ///
    /// `$XDG_CONFIG_HOME/colorbook/colorbook_settings.cfg` (Linux),
    /// `%APPDATA%\colorbook\…` (Windows), `~/Library/Application Support/colorbook/…` (macOS).
    pub fn settings_path() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        let base = std::env::var("APPDATA").ok().map(PathBuf::from);
        #[cfg(target_os = "macos")]
        let base = std::env::var("HOME")
            .ok()
            .map(|h| PathBuf::from(h).join("Library").join("Application Support"));
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let base = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .ok()
            .or_else(|| std::env::var("HOME").ok().map(|h| PathBuf::from(h).join(".config")));
        base.map(|b| b.join("colorbook").join("colorbook_settings.cfg"))
    }

    /// Read a settings file.  A missing or unreadable file yields defaults.
    pub fn load_from(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse_cfg(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_cfg_string())
    }

    pub fn to_cfg_string(&self) -> String {
        let steps = match self.interpolation {
            InterpolationPolicy::Capped(n) => n.to_string(),
            InterpolationPolicy::Uncapped => "uncapped".to_string(),
        };
        let bg = self.background.0;
        format!(
            "platform={}\n\
             interpolation_steps={steps}\n\
             save_delay_ticks={}\n\
             seed={}\n\
             background=#{:02x}{:02x}{:02x}{:02x}\n",
            self.platform.name(),
            self.save_delay_ticks,
            self.seed,
            bg[0], bg[1], bg[2], bg[3],
        )
    }

    /// Parse `key=value` lines.  Unknown keys are ignored; malformed values
    /// keep their defaults.
    pub fn parse_cfg(content: &str) -> Self {
        let mut cfg = Self::default();
        for line in content.lines() {
            let Some((key, val)) = line.split_once('=') else { continue };
            let key = key.trim();
            let val = val.trim();
            match key {
                "platform" => {
                    cfg.platform = match val {
                        "mobile" => PlatformProfile::Mobile,
                        _ => PlatformProfile::Desktop,
                    };
                }
                "interpolation_steps" => {
                    if val == "uncapped" {
                        cfg.interpolation = InterpolationPolicy::Uncapped;
                    } else if let Ok(n) = val.parse::<u32>()
                        && n > 0
                    {
                        cfg.interpolation = InterpolationPolicy::Capped(n);
                    }
                }
                "save_delay_ticks" => {
                    if let Ok(n) = val.parse() {
                        cfg.save_delay_ticks = n;
                    }
                }
                "seed" => {
                    if let Ok(n) = val.parse() {
                        cfg.seed = n;
                    }
                }
                "background" => {
                    if let Some(c) = parse_hex_color(val) {
                        cfg.background = c;
                    }
                }
                _ => {}
            }
        }
        cfg
    }
}
