//! # imerge-core
//!
//! Core types shared by the imerge crates: the raster buffer used for
//! decoded images and the output surface, colors, geometry, the data URI
//! codec, request model, configuration, and error types.

pub mod color;
pub mod config;
pub mod data_uri;
pub mod error;
pub mod frame;
pub mod math;
pub mod request;

pub use config::{HeightBasis, MergeConfig};

pub use color::Color;
pub use data_uri::DataUri;
pub use error::{MergeError, MergeResult};
pub use frame::{FrameBuffer, PixelFormat};
pub use math::{Circle, Rect};
pub use request::{BackgroundSpec, MergeRequest, OverlaySpec, Placement};
