use std::io::Cursor;

use image::{imageops, DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::config::ThumbnailFormat;
use crate::errors::SyncError;
use crate::sources::ThumbnailSource;

/// Downloads thumbnails over HTTP
#[derive(Debug, Clone)]
pub struct HttpThumbnails {
    client: reqwest::Client,
}

impl HttpThumbnails {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ThumbnailSource for HttpThumbnails {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SyncError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::Http(format!("Failed to download thumbnail: {e}")))?;

        if !response.status().is_success() {
            return Err(SyncError::Http(format!(
                "HTTP {} when downloading thumbnail",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| SyncError::Http(format!("Failed to read thumbnail bytes: {e}")))?;
        Ok(bytes.to_vec())
    }
}

/// Square version of `img`: padded with transparency or center-cropped
pub fn make_square(img: &DynamicImage, format: ThumbnailFormat) -> DynamicImage {
    let (w, h) = (img.width(), img.height());
    if w == h {
        return img.clone();
    }
    match format {
        ThumbnailFormat::Pad => {
            let side = w.max(h);
            let mut canvas = RgbaImage::from_pixel(side, side, Rgba([0, 0, 0, 0]));
            let x = i64::from((side - w) / 2);
            let y = i64::from((side - h) / 2);
            imageops::overlay(&mut canvas, &img.to_rgba8(), x, y);
            DynamicImage::ImageRgba8(canvas)
        }
        ThumbnailFormat::Crop => {
            let side = w.min(h);
            img.crop_imm((w - side) / 2, (h - side) / 2, side, side)
        }
    }
}

/// Decodes any supported image and re-encodes it as a square PNG
pub fn square_png(bytes: &[u8], format: ThumbnailFormat) -> Result<Vec<u8>, SyncError> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| SyncError::Image(format!("Failed to decode image: {e}")))?;
    let square = make_square(&img, format);

    let mut out = Vec::new();
    square
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .map_err(|e| SyncError::Image(format!("Failed to encode PNG: {e}")))?;
    debug!("[Thumbnail] {}x{} -> {}x{}", img.width(), img.height(), square.width(), square.height());
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn red_png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([255, 0, 0, 255])));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png).unwrap();
        out
    }

    #[test]
    fn test_pad_keeps_whole_image() {
        let png = square_png(&red_png(4, 2), ThumbnailFormat::Pad).unwrap();
        let img = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (4, 4));
        assert_eq!(img.get_pixel(0, 0)[3], 0);
        assert_eq!(*img.get_pixel(0, 1), Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_crop_center() {
        let png = square_png(&red_png(6, 2), ThumbnailFormat::Crop).unwrap();
        let img = image::load_from_memory(&png).unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
    }

    #[test]
    fn test_garbage_is_image_error() {
        assert!(matches!(square_png(b"nope", ThumbnailFormat::Pad), Err(SyncError::Image(_))));
    }
}
