//! # imerge-encode
//!
//! Encoding module: converts the finished surface into the single output
//! format, a base64 JPEG data URI.

pub mod jpeg;

pub use jpeg::JpegEncoder;
