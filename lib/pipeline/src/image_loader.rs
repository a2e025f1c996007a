use crate::collaborators::{Bitmap, ImageLoader};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Decodes uploads with the `image` crate and converts them to RGB.
///
/// Decoding runs on the blocking pool so it does not stall other runs.
#[derive(Debug, Clone, Default)]
pub struct ImageCrateLoader;

impl ImageCrateLoader {
    pub fn new() -> Self {
        Self
    }

    fn decode_blocking(bytes: &[u8]) -> Result<Bitmap> {
        let img = image::load_from_memory(bytes).context("failed to decode image")?;
        Ok(img.to_rgb8())
    }
}

#[async_trait]
impl ImageLoader for ImageCrateLoader {
    async fn decode(&self, bytes: &[u8]) -> Result<Bitmap> {
        let owned = bytes.to_vec();
        let bitmap = tokio::task::spawn_blocking(move || Self::decode_blocking(&owned))
            .await
            .context("image decode task panicked")??;
        debug!(width = bitmap.width(), height = bitmap.height(), "Image decoded");
        Ok(bitmap)
    }
}

/// Encode a bitmap as PNG, for collaborators that take image files.
pub fn encode_png(bitmap: &Bitmap) -> Result<Vec<u8>> {
    let mut buf = std::io::Cursor::new(Vec::new());
    bitmap
        .write_to(&mut buf, image::ImageFormat::Png)
        .context("failed to encode PNG")?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn sample_png() -> Vec<u8> {
        let mut img = Bitmap::new(4, 3);
        img.put_pixel(1, 1, Rgb([200, 10, 10]));
        encode_png(&img).unwrap()
    }

    #[tokio::test]
    async fn test_decode_png() {
        let bitmap = ImageCrateLoader::new().decode(&sample_png()).await.unwrap();
        assert_eq!(bitmap.dimensions(), (4, 3));
        assert_eq!(bitmap.get_pixel(1, 1), &Rgb([200, 10, 10]));
    }

    #[tokio::test]
    async fn test_decode_garbage_fails() {
        let result = ImageCrateLoader::new().decode(b"definitely not an image").await;
        assert!(result.is_err());
    }
}
