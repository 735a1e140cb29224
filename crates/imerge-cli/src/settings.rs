use std::path::Path;

use anyhow::{Context, Result};

use imerge_core::{HeightBasis, MergeConfig};

/// Command-line overrides layered on top of the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub scale: Option<f64>,
    pub display_width: Option<u32>,
    pub height_basis: Option<HeightBasis>,
    pub quality: Option<u8>,
    pub matte: Option<String>,
    pub timeout_secs: Option<u64>,
}

/// Load the config file (or defaults), apply overrides, then validate.
pub fn resolve_config(path: Option<&Path>, overrides: &Overrides) -> Result<MergeConfig> {
    let mut config = match path {
        Some(p) => MergeConfig::load_from_file(p)
            .with_context(|| format!("failed to load config: {}", p.display()))?,
        None => MergeConfig::default(),
    };

    if let Some(scale) = overrides.scale {
        config.scale_factor = scale;
    }
    if let Some(width) = overrides.display_width {
        config.display_width = width;
    }
    if let Some(basis) = overrides.height_basis {
        config.height_basis = basis;
    }
    if let Some(quality) = overrides.quality {
        config.jpeg_quality = quality;
    }
    if let Some(matte) = &overrides.matte {
        config.matte = matte.clone();
    }
    if overrides.timeout_secs.is_some() {
        config.fetch_timeout_secs = overrides.timeout_secs;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}
