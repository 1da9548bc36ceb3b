//! Image encoding: rendered page → PNG bytes → base64 data URI.
//!
//! PNG keeps rendered text crisp; JPEG artefacts around glyphs hurt the
//! model's reading of fine print such as deposit amounts and clause numbers.
//! The data URI goes into an `image_url` content part with `detail: "high"`.

use crate::error::LeaseError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Lossless PNG encoding of a rendered page.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    Ok(buf)
}

/// `data:image/png;base64,...`
pub fn png_data_uri(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Read a stored page image and wrap it as a data URI.
pub async fn load_data_uri(path: &Path) -> Result<String, LeaseError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| LeaseError::workspace(path, e))?;
    let uri = png_data_uri(&bytes);
    debug!("Encoded {} → {} bytes base64", path.display(), uri.len());
    Ok(uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).unwrap();
        assert!(png.starts_with(b"\x89PNG"));

        let uri = png_data_uri(&png);
        let b64 = uri.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(STANDARD.decode(b64).unwrap(), png);
    }

    #[tokio::test]
    async fn missing_image_is_workspace_error() {
        let err = load_data_uri(Path::new("/nonexistent/page_1.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, LeaseError::Workspace { .. }));
    }
}
