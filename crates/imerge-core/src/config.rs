use serde::{Deserialize, Serialize};

use crate::{Color, MergeError, MergeResult};

/// Which surface dimension the vertical overlay fractions (`y`, `height`) are
/// multiplied by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeightBasis {
    /// Vertical fractions scale with the surface width, like horizontal ones.
    /// Requests authored for the browser widget expect this.
    #[default]
    SurfaceWidth,
    /// Vertical fractions scale with the surface height.
    SurfaceHeight,
}

impl std::str::FromStr for HeightBasis {
    type Err = MergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "surface_width" | "width" => Ok(HeightBasis::SurfaceWidth),
            "surface_height" | "height" => Ok(HeightBasis::SurfaceHeight),
            other => Err(MergeError::InvalidArgument(format!(
                "unknown height basis '{}' (expected surface-width or surface-height)",
                other
            ))),
        }
    }
}

/// Compositor settings. Every field has a default so partial TOML files work.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MergeConfig {
    /// Oversampling factor applied to the display width.
    pub scale_factor: f64,
    /// Width available for display, before oversampling.
    pub display_width: u32,
    pub height_basis: HeightBasis,
    /// JPEG quality, 1..=100.
    pub jpeg_quality: u8,
    /// Hex color transparent pixels are flattened onto before JPEG encoding.
    pub matte: String,
    /// Rewrite `http://` references to `https://` before fetching.
    pub upgrade_insecure: bool,
    /// Per-request HTTP timeout. `None` waits forever.
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            scale_factor: 2.0,
            display_width: 375,
            height_basis: HeightBasis::SurfaceWidth,
            jpeg_quality: 92,
            matte: "#000000".to_string(),
            upgrade_insecure: true,
            fetch_timeout_secs: None,
        }
    }
}

impl MergeConfig {
    /// Longest side, in pixels, a surface may have.
    pub const MAX_SURFACE_SIDE: u32 = 16_384;
    /// Largest surface area, in pixels.
    pub const MAX_SURFACE_PIXELS: u64 = 64 * 1024 * 1024;

    pub fn load_from_file(path: &std::path::Path) -> MergeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: MergeConfig = toml::from_str(&contents)
            .map_err(|e| MergeError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &std::path::Path) -> MergeResult<()> {
        std::fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> MergeResult<String> {
        toml::to_string_pretty(self).map_err(|e| MergeError::Config(e.to_string()))
    }

    /// Reject settings that would produce an empty or undefined surface.
    pub fn validate(&self) -> MergeResult<()> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 0.0 {
            return Err(MergeError::InvalidArgument(format!(
                "scale_factor must be a positive number, got {}",
                self.scale_factor
            )));
        }
        if self.display_width == 0 {
            return Err(MergeError::InvalidArgument(
                "display_width must be greater than zero".into(),
            ));
        }
        let width = self.scale_factor * self.display_width as f64;
        if width > Self::MAX_SURFACE_SIDE as f64 {
            return Err(MergeError::InvalidArgument(format!(
                "scale_factor * display_width is {}, above the {} pixel limit",
                width,
                Self::MAX_SURFACE_SIDE
            )));
        }
        self.matte_color()?;
        Ok(())
    }

    /// Reject a surface too large to allocate. Checked once the background's
    /// size is known, before any pixel buffer is created.
    pub fn check_surface_size(&self, width: u32, height: u32) -> MergeResult<()> {
        let pixels = width as u64 * height as u64;
        if width > Self::MAX_SURFACE_SIDE
            || height > Self::MAX_SURFACE_SIDE
            || pixels > Self::MAX_SURFACE_PIXELS
        {
            return Err(MergeError::InvalidArgument(format!(
                "surface {}x{} exceeds the {}px side / {} pixel limit",
                width,
                height,
                Self::MAX_SURFACE_SIDE,
                Self::MAX_SURFACE_PIXELS
            )));
        }
        Ok(())
    }

    pub fn matte_color(&self) -> MergeResult<Color> {
        Color::from_hex(&self.matte)
            .map_err(|e| MergeError::InvalidArgument(format!("matte '{}': {}", self.matte, e)))
    }

    pub fn quality(&self) -> u8 {
        self.jpeg_quality.clamp(1, 100)
    }

    /// Output surface width: `scale_factor * display_width`, truncated.
    pub fn surface_width(&self) -> u32 {
        (self.scale_factor * self.display_width as f64) as u32
    }

    /// Output surface size for a background of the given intrinsic size,
    /// keeping the background's aspect ratio. Heights are truncated.
    pub fn surface_size(&self, bg_width: u32, bg_height: u32) -> (u32, u32) {
        let width = self.surface_width();
        if bg_width == 0 {
            return (width, 0);
        }
        let height = (bg_height as f64 * width as f64 / bg_width as f64) as u32;
        (width, height)
    }
}
