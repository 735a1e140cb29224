//! The merge request model. Field names follow the JSON shape used by
//! existing callers (`bgImg`, `otherImgs`, `isCircle`).

use serde::{Deserialize, Serialize};

use crate::math::{Circle, Rect};
use crate::{HeightBasis, MergeResult};

/// Background image reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackgroundSpec {
    pub url: String,
}

/// One overlay: a reference plus geometry expressed as fractions of the
/// output surface.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlaySpec {
    pub url: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub radius: f64,
    #[serde(default)]
    pub is_circle: bool,
}

/// Where an overlay lands on the surface, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Drawn into the rectangle with no clipping.
    Rect(Rect),
    /// Drawn into the circle's bounding square, clipped to the circle.
    Circle(Circle),
}

impl Placement {
    /// Destination rectangle of the draw.
    pub fn bounds(&self) -> Rect {
        match self {
            Placement::Rect(r) => *r,
            Placement::Circle(c) => c.bounds(),
        }
    }

    pub fn clip(&self) -> Option<&Circle> {
        match self {
            Placement::Rect(_) => None,
            Placement::Circle(c) => Some(c),
        }
    }
}

impl OverlaySpec {
    pub fn rect(url: impl Into<String>, x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            url: url.into(),
            x,
            y,
            width,
            height,
            ..Default::default()
        }
    }

    pub fn circle(url: impl Into<String>, x: f64, y: f64, radius: f64) -> Self {
        Self {
            url: url.into(),
            x,
            y,
            radius,
            is_circle: true,
            ..Default::default()
        }
    }

    /// Convert the fractional geometry to surface pixels.
    ///
    /// `x`, `width` and `radius` always scale with the surface width. `y` and
    /// `height` scale with whichever dimension `basis` names. Fractions are not
    /// range checked; values outside [0, 1] simply land outside the surface.
    pub fn placement(&self, surface_width: u32, surface_height: u32, basis: HeightBasis) -> Placement {
        let sw = surface_width as f64;
        let sv = match basis {
            HeightBasis::SurfaceWidth => sw,
            HeightBasis::SurfaceHeight => surface_height as f64,
        };
        let x = self.x * sw;
        let y = self.y * sv;
        if self.is_circle {
            Placement::Circle(Circle::inscribed_at(x, y, self.radius * sw))
        } else {
            Placement::Rect(Rect::new(x, y, self.width * sw, self.height * sv))
        }
    }
}

/// A complete merge job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeRequest {
    /// Opaque caller context echoed back in reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(rename = "bgImg")]
    pub background: BackgroundSpec,
    #[serde(rename = "otherImgs", default)]
    pub overlays: Vec<OverlaySpec>,
}

impl MergeRequest {
    pub fn new(background: impl Into<String>) -> Self {
        Self {
            target: None,
            background: BackgroundSpec {
                url: background.into(),
            },
            overlays: Vec::new(),
        }
    }

    pub fn with_overlay(mut self, overlay: OverlaySpec) -> Self {
        self.overlays.push(overlay);
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn from_json(json: &str) -> MergeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load_from_file(path: &std::path::Path) -> MergeResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }
}
