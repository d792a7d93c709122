//! Data-URL encoding and decoding for page rasters.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, RgbaImage};

const PNG_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, thiserror::Error)]
pub enum DataUrlError {
    #[error("not a base64 image data URL")]
    InvalidPrefix,
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("image payload error: {0}")]
    Image(#[from] image::ImageError),
}

/// Encodes a raster as a `data:image/png;base64,` URL.
pub fn encode_png_data_url(image: &RgbaImage) -> Result<String, DataUrlError> {
    let mut png = Vec::new();
    image.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
    Ok(format!("{PNG_PREFIX}{}", STANDARD.encode(&png)))
}

/// Decodes any `data:image/<fmt>;base64,` URL back to a raster.
pub fn decode_data_url(url: &str) -> Result<RgbaImage, DataUrlError> {
    let payload = url
        .strip_prefix("data:image/")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, payload)| payload)
        .ok_or(DataUrlError::InvalidPrefix)?;

    let bytes = STANDARD.decode(payload)?;
    let decoded = image::load_from_memory(&bytes)?;
    Ok(DynamicImage::into_rgba8(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn png_data_url_round_trips_pixels() {
        let mut source = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 255]));
        source.put_pixel(2, 1, Rgba([200, 100, 50, 255]));

        let url = encode_png_data_url(&source).expect("encode");
        assert!(url.starts_with("data:image/png;base64,"));

        let restored = decode_data_url(&url).expect("decode");
        assert_eq!(restored.dimensions(), (3, 2));
        assert_eq!(restored.get_pixel(2, 1), &Rgba([200, 100, 50, 255]));
    }

    #[test]
    fn decode_rejects_non_image_urls() {
        assert!(matches!(
            decode_data_url("data:text/plain;base64,aGVsbG8="),
            Err(DataUrlError::InvalidPrefix)
        ));
        assert!(matches!(decode_data_url("plain string"), Err(DataUrlError::InvalidPrefix)));
    }

    #[test]
    fn decode_rejects_bad_base64() {
        assert!(matches!(
            decode_data_url("data:image/png;base64,!!not-base64!!"),
            Err(DataUrlError::Base64(_))
        ));
    }
}
