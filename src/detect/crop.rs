use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, ColorType, GenericImageView};

use super::NormalizedBox;
use crate::config::ThumbnailConfig;
use crate::error::CropError;

/// Pixel region of the source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}

/// Crop around the box center, grown by the configured padding and never
/// smaller than `min_extent` of the image, clipped to the image bounds.
pub fn crop_region(image_width: u32, image_height: u32, bbox: &NormalizedBox, config: &ThumbnailConfig) -> CropRegion {
    let (img_w, img_h) = (image_width.max(1) as f64, image_height.max(1) as f64);
    let grow = 1.0 + config.padding.max(0.0) * 2.0;
    let padded_w = (bbox.w.max(config.min_extent) * grow).min(1.0);
    let padded_h = (bbox.h.max(config.min_extent) * grow).min(1.0);

    let mut left = (bbox.center_x() - padded_w / 2.0) * img_w;
    let mut top = (bbox.center_y() - padded_h / 2.0) * img_h;
    let mut width = padded_w * img_w;
    let mut height = padded_h * img_h;

    if left < 0.0 {
        width += left;
        left = 0.0;
    }
    if top < 0.0 {
        height += top;
        top = 0.0;
    }
    if left + width > img_w {
        width = img_w - left;
    }
    if top + height > img_h {
        height = img_h - top;
    }

    let x = round_half_up(left.min(img_w - 1.0).max(0.0));
    let y = round_half_up(top.min(img_h - 1.0).max(0.0));
    let w = round_half_up(width.min(img_w - x)).max(1.0);
    let h = round_half_up(height.min(img_h - y)).max(1.0);

    CropRegion {
        x: x as u32,
        y: y as u32,
        width: w as u32,
        height: h as u32,
    }
}

/// Square JPEG thumbnail of one face.
///
/// EXIF orientation is not applied; boxes are expected in the stored pixel
/// orientation.
pub fn crop_face_thumbnail(bytes: &[u8], bbox: &NormalizedBox, config: &ThumbnailConfig) -> Result<Vec<u8>, CropError> {
    let img = image::load_from_memory(bytes).map_err(CropError::Decode)?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(CropError::ZeroDimensions);
    }

    let region = crop_region(width, height, bbox, config);
    let thumb = img
        .crop_imm(region.x, region.y, region.width, region.height)
        .resize_to_fill(config.size, config.size, FilterType::Triangle)
        .to_rgb8();

    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, config.jpeg_quality.clamp(1, 100))
        .encode(thumb.as_raw(), thumb.width(), thumb.height(), ColorType::Rgb8)
        .map_err(CropError::Encode)?;
    Ok(out)
}
