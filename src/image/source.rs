//! Background photo loading for the Capture target.

use std::time::Duration;

use image::DynamicImage;
use log::{debug, warn};

use crate::core::permit::ImageSource;
use crate::error::CaptureError;

/// Fetch and decode `source`, giving up after `timeout`.
pub async fn load_background(
    source: &ImageSource,
    timeout: Duration,
) -> Result<DynamicImage, CaptureError> {
    let location = source.to_string();
    debug!("loading background image {location}");
    let bytes = match tokio::time::timeout(timeout, fetch_bytes(source)).await {
        Ok(result) => result?,
        Err(_) => {
            warn!("background image {location} timed out");
            return Err(CaptureError::Timeout {
                ms: timeout.as_millis() as u64,
            });
        }
    };

    let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
        .await
        .map_err(|err| CaptureError::Raster(format!("decode task failed: {err}")))?;
    decoded.map_err(|source| CaptureError::ImageDecode { location, source })
}

async fn fetch_bytes(source: &ImageSource) -> Result<Vec<u8>, CaptureError> {
    let unreachable = |reason: String| CaptureError::ImageUnreachable {
        location: source.to_string(),
        reason,
    };
    match source {
        ImageSource::Remote(url) => {
            let response = reqwest::get(url)
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|err| unreachable(err.to_string()))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|err| unreachable(err.to_string()))?;
            Ok(bytes.to_vec())
        }
        ImageSource::Local(path) => tokio::fs::read(path)
            .await
            .map_err(|err| unreachable(err.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    #[tokio::test]
    async fn missing_file_is_unreachable() {
        let source = ImageSource::from("/definitely/not/here.png");
        let err = load_background(&source, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::ImageUnreachable { .. }));
    }

    #[tokio::test]
    async fn garbage_bytes_fail_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        std::fs::write(&path, b"not an image").unwrap();
        let err = load_background(&ImageSource::Local(path), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::ImageDecode { .. }));
    }

    #[tokio::test]
    async fn local_png_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.png");
        RgbImage::from_pixel(8, 4, Rgb([20, 40, 60]))
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        let source = ImageSource::from(format!("file://{}", path.display()));
        let img = load_background(&source, Duration::from_secs(1)).await.unwrap();
        assert_eq!((img.width(), img.height()), (8, 4));
    }
}
