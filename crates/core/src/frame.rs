//! Camera frame handling

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat};

use crate::{Error, Result};

/// Pixel-space rectangle inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// An encoded camera frame (JPEG or PNG)
///
/// The payload is shared, so cloning a frame is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    data: Arc<[u8]>,
}

impl Frame {
    pub fn new(width: u32, height: u32, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            width,
            height,
            data: data.into(),
        }
    }

    /// Encoded image bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// MIME type guessed from the payload, defaulting to JPEG
    pub fn mime_type(&self) -> &'static str {
        match image::guess_format(&self.data) {
            Ok(ImageFormat::Png) => "image/png",
            _ => "image/jpeg",
        }
    }

    /// Cut out `rect` and re-encode it as JPEG.
    pub fn crop(&self, rect: PixelRect) -> Result<Frame> {
        if rect.is_empty() {
            return Err(Error::Image(format!("empty crop region {:?}", rect)));
        }

        let image = image::load_from_memory(&self.data)?;
        let x = rect.x.min(image.width().saturating_sub(1));
        let y = rect.y.min(image.height().saturating_sub(1));
        let width = rect.width.min(image.width() - x);
        let height = rect.height.min(image.height() - y);
        if width == 0 || height == 0 {
            return Err(Error::Image(format!("crop region {:?} outside frame", rect)));
        }

        let cropped = DynamicImage::ImageRgb8(image.crop_imm(x, y, width, height).to_rgb8());
        let mut buf = Cursor::new(Vec::new());
        cropped.write_to(&mut buf, ImageFormat::Jpeg)?;

        Ok(Frame::new(width, height, buf.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn test_frame(width: u32, height: u32) -> Frame {
        let img = RgbImage::from_pixel(width, height, Rgb([10, 200, 30]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut buf, ImageFormat::Png)
            .unwrap();
        Frame::new(width, height, buf.into_inner())
    }

    #[test]
    fn test_mime_type() {
        let frame = test_frame(4, 4);
        assert_eq!(frame.mime_type(), "image/png");
    }

    #[test]
    fn test_crop() {
        let frame = test_frame(64, 48);
        let cropped = frame
            .crop(PixelRect {
                x: 16,
                y: 8,
                width: 32,
                height: 20,
            })
            .unwrap();
        assert_eq!(cropped.width, 32);
        assert_eq!(cropped.height, 20);
        assert_eq!(cropped.mime_type(), "image/jpeg");
    }

    #[test]
    fn test_crop_clamps_to_frame() {
        let frame = test_frame(20, 20);
        let cropped = frame
            .crop(PixelRect {
                x: 10,
                y: 10,
                width: 50,
                height: 50,
            })
            .unwrap();
        assert_eq!(cropped.width, 10);
        assert_eq!(cropped.height, 10);
    }

    #[test]
    fn test_empty_crop_fails() {
        let frame = test_frame(8, 8);
        let result = frame.crop(PixelRect {
            x: 0,
            y: 0,
            width: 0,
            height: 4,
        });
        assert!(result.is_err());
    }
}
