//! Turns an image reference into pixels: the resolver inlines remote bytes,
//! then the result is decoded from a data URI or read from a local path.

use std::path::Path;
use std::sync::Arc;

use imerge_core::data_uri::abbreviate;
use imerge_core::frame::FrameBuffer;
use imerge_core::{DataUri, MergeError, MergeResult};

use crate::resolver::ResourceResolver;

/// Load an image file and convert it to a FrameBuffer.
pub fn load_image(path: &Path) -> MergeResult<FrameBuffer> {
    let img = image::open(path).map_err(|e| {
        MergeError::decode(
            path.display().to_string(),
            format!("failed to load image: {}", e),
        )
    })?;
    into_frame(img.to_rgba8(), &path.display().to_string())
}

/// Load an image from raw bytes.
pub fn load_image_from_bytes(data: &[u8], reference: &str) -> MergeResult<FrameBuffer> {
    let img = image::load_from_memory(data).map_err(|e| {
        MergeError::decode(abbreviate(reference), format!("failed to decode image: {}", e))
    })?;
    into_frame(img.to_rgba8(), reference)
}

/// Decode a resolved reference: data URIs are decoded in memory, anything
/// else is opened as a local file.
pub fn decode_embedded(reference: &str) -> MergeResult<FrameBuffer> {
    if DataUri::is_data_uri(reference) {
        let uri = DataUri::parse(reference)?;
        load_image_from_bytes(&uri.data, reference)
    } else {
        load_image(Path::new(reference))
    }
}

/// Resolve then decode one reference. Decoding runs on the blocking pool.
pub async fn load_reference(
    resolver: Arc<dyn ResourceResolver>,
    reference: String,
) -> MergeResult<FrameBuffer> {
    let embedded = resolver.resolve(&reference).await?;
    tokio::task::spawn_blocking(move || decode_embedded(&embedded))
        .await
        .map_err(|e| MergeError::decode(abbreviate(&reference), format!("decode task failed: {}", e)))?
}

fn into_frame(rgba: image::RgbaImage, reference: &str) -> MergeResult<FrameBuffer> {
    let (width, height) = rgba.dimensions();
    if width == 0 || height == 0 {
        return Err(MergeError::decode(
            abbreviate(reference),
            format!("image has no pixels ({}x{})", width, height),
        ));
    }
    Ok(FrameBuffer::from_rgba_image(rgba))
}
