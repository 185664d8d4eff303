//! # Annotate Module
//!
//! Draws detection results on top of the source image: one red outlined rectangle per
//! bounding box, optionally captioned with black text on a red label.
//!
//! Geometry returned by the remote API is relative to the orientation-corrected image,
//! so the [`Orientation`] is applied before any box is drawn.
//!
//! Captions need a TrueType font. Without one the boxes are still drawn.

use crate::types::BoxGeometry;
use crate::{Error, Result};
use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use bytes::Bytes;
use image::{imageops, DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const TEXT_COLOR: Rgb<u8> = Rgb([0, 0, 0]);

/// Caption size before scaling, in pixels.
pub const DEFAULT_FONT_SIZE: u32 = 18;

const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A box in normalized coordinates with an optional caption.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    /// Caption; may span several lines.
    pub label: Option<String>,
    pub confidence: f64,
}

impl BoundingBox {
    pub fn from_geometry(geometry: &BoxGeometry, label: Option<String>, confidence: f64) -> Self {
        Self {
            top: geometry.top,
            left: geometry.left,
            width: geometry.width,
            height: geometry.height,
            label,
            confidence,
        }
    }

    /// Pixel rectangle `(left, top, right, bottom)` for an image of the given size.
    pub fn to_pixels(&self, image_width: u32, image_height: u32) -> (i32, i32, i32, i32) {
        let w = image_width as f64;
        let h = image_height as f64;
        (
            (self.left * w).round() as i32,
            (self.top * h).round() as i32,
            ((self.left + self.width) * w).round() as i32,
            ((self.top + self.height) * h).round() as i32,
        )
    }
}

/// Rotation reported by the remote API to present an image upright.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Orientation {
    #[default]
    Rotate0,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// `ROTATE_0|90|180|270`; anything else (including "") is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "ROTATE_0" => Some(Self::Rotate0),
            "ROTATE_90" => Some(Self::Rotate90),
            "ROTATE_180" => Some(Self::Rotate180),
            "ROTATE_270" => Some(Self::Rotate270),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotate0 => "ROTATE_0",
            Self::Rotate90 => "ROTATE_90",
            Self::Rotate180 => "ROTATE_180",
            Self::Rotate270 => "ROTATE_270",
        }
    }

    pub fn is_identity(&self) -> bool {
        *self == Self::Rotate0
    }

    /// Rotate clockwise by the reported angle.
    pub fn apply(&self, image: RgbImage) -> RgbImage {
        match self {
            Self::Rotate0 => image,
            Self::Rotate90 => imageops::rotate90(&image),
            Self::Rotate180 => imageops::rotate180(&image),
            Self::Rotate270 => imageops::rotate270(&image),
        }
    }
}

/// Caption font size for text `text_width_at_default` pixels wide at
/// [`DEFAULT_FONT_SIZE`], drawn over a box `box_width` pixels wide.
///
/// The text is first fitted to 80 % of the box. If it then covers less than 15 % of the
/// image width it is fitted to 120 % instead; above 33 % it is fitted to 33 %. The size is
/// rounded up to an even number. Text width is taken to grow linearly with font size.
pub fn caption_font_size(text_width_at_default: f32, box_width: f32, image_width: u32) -> u32 {
    if text_width_at_default <= 0.0 || box_width <= 0.0 {
        return DEFAULT_FONT_SIZE;
    }
    let default = DEFAULT_FONT_SIZE as f32;
    let fit = box_width / text_width_at_default * default;
    let mut size = (0.8 * fit).floor();
    let scaled_width = text_width_at_default * size / default;
    let image_width = image_width as f32;
    if scaled_width < (0.15 * image_width).ceil() {
        size = (1.2 * fit).floor();
    } else if scaled_width > (0.33 * image_width).ceil() {
        size = (0.33 * fit).floor();
    }
    let even = 2.0 * (size / 2.0).ceil();
    (even as u32).max(2)
}

/// Outline thickness for an image of the given size.
pub fn line_thickness(image_width: u32, image_height: u32) -> u32 {
    4 * (0.001 * image_width.max(image_height) as f64).ceil() as u32
}

fn measure_text_width(text: &str, font: &FontVec, scale: f32) -> f32 {
    let scaled_font = font.as_scaled(scale);
    text.chars()
        .map(|ch| scaled_font.h_advance(scaled_font.scaled_glyph(ch).id))
        .sum()
}

pub struct ImageAnnotator {
    font: Option<FontVec>,
}

impl Default for ImageAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageAnnotator {
    /// Annotator without a font: boxes only.
    pub fn new() -> Self {
        Self { font: None }
    }

    pub fn with_font_path(font_path: &Path) -> Result<Self> {
        let font_data = std::fs::read(font_path)?;
        let font = FontVec::try_from_vec(font_data).map_err(|_| {
            Error::configuration(
                "font_path",
                format!("Failed to parse font file: {}", font_path.display()),
            )
        })?;
        Ok(Self { font: Some(font) })
    }

    /// Load the first readable font from common system locations.
    pub fn with_system_font() -> Self {
        for path in SYSTEM_FONT_PATHS {
            if let Ok(font_data) = std::fs::read(path) {
                if let Ok(font) = FontVec::try_from_vec(font_data) {
                    info!("Loaded system font: {}", path);
                    return Self { font: Some(font) };
                }
            }
        }
        debug!("No system font found, captions will be skipped");
        Self::new()
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Rotate `image` by `orientation`, then draw every box in the given order.
    pub fn annotate(
        &self,
        image: RgbImage,
        orientation: Orientation,
        boxes: &[BoundingBox],
    ) -> RgbImage {
        let mut image = orientation.apply(image);
        for bbox in boxes {
            self.draw_box(&mut image, bbox);
        }
        image
    }

    fn draw_box(&self, img: &mut RgbImage, bbox: &BoundingBox) {
        let (width, height) = img.dimensions();
        let (left, top, right, bottom) = bbox.to_pixels(width, height);
        let thickness = line_thickness(width, height) as i32;
        // Centre the stroke on the box edge.
        for i in 0..thickness {
            let offset = i - thickness / 2;
            let w = right - left + 2 * offset;
            let h = bottom - top + 2 * offset;
            if w > 0 && h > 0 {
                let rect = Rect::at(left - offset, top - offset).of_size(w as u32, h as u32);
                draw_hollow_rect_mut(img, rect, BOX_COLOR);
            }
        }

        let Some(label) = bbox.label.as_deref().filter(|l| !l.is_empty()) else {
            return;
        };
        let Some(font) = &self.font else {
            debug!(label, "no font loaded, caption skipped");
            return;
        };
        self.draw_caption(img, font, label, left, top, (right - left).max(0) as f32);
    }

    /// Draw `label` on filled red bands, one per line, flush with the box's left edge.
    ///
    /// The bands sit directly above the box. When the box top is closer to the image top
    /// than the caption is tall, the caption starts at the box's top edge instead and runs
    /// down inside the box.
    fn draw_caption(
        &self,
        img: &mut RgbImage,
        font: &FontVec,
        label: &str,
        left: i32,
        top: i32,
        box_width: f32,
    ) {
        let lines: Vec<&str> = label.lines().collect();
        let default_width = lines
            .iter()
            .map(|l| measure_text_width(l, font, DEFAULT_FONT_SIZE as f32))
            .fold(0.0_f32, f32::max);
        let size = caption_font_size(default_width, box_width, img.width()) as f32;
        let scale = PxScale::from(size);
        let line_height = font.as_scaled(scale).height().ceil() as i32;
        let margin = (0.05 * line_height as f32).ceil() as i32;
        let total_height = ((1.0 + 2.0 * 0.05) * (line_height * lines.len() as i32) as f32) as i32;

        let mut text_bottom = top;
        if top < total_height {
            text_bottom += total_height;
        }
        for line in lines.iter().rev() {
            let text_width = measure_text_width(line, font, size).ceil() as u32;
            let label_height = (line_height + 2 * margin) as u32;
            let label_top = text_bottom - line_height - 2 * margin;
            if text_width > 0 {
                let rect = Rect::at(left, label_top).of_size(text_width + 2 * margin as u32, label_height);
                draw_filled_rect_mut(img, rect, BOX_COLOR);
            }
            draw_text_mut(img, TEXT_COLOR, left + margin, label_top + margin, scale, font, line);
            text_bottom -= line_height + 2 * margin;
        }
    }
}

pub fn decode_image(data: &[u8], path: &str) -> Result<RgbImage> {
    image::load_from_memory(data)
        .map(|img| img.to_rgb8())
        .map_err(|e| Error::ImageDecode {
            path: path.to_string(),
            message: e.to_string(),
        })
}

/// Encode in the format implied by `path`'s extension, PNG when unknown.
pub fn encode_image(image: RgbImage, path: &str) -> Result<Bytes> {
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut buf, format)
        .map_err(|e| Error::ImageDecode {
            path: path.to_string(),
            message: format!("encoding as {:?} failed: {}", format, e),
        })?;
    Ok(Bytes::from(buf.into_inner()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_thickness() {
        assert_eq!(line_thickness(100, 80), 4);
        assert_eq!(line_thickness(1000, 200), 4);
        assert_eq!(line_thickness(1001, 200), 8);
        assert_eq!(line_thickness(640, 2500), 12);
    }

    #[test]
    fn test_caption_font_size_buckets() {
        // 80 % of a medium box
        assert_eq!(caption_font_size(100.0, 200.0, 1000), 28);
        // narrow box: 120 %
        assert_eq!(caption_font_size(100.0, 50.0, 1000), 10);
        // wide box: 33 %
        assert_eq!(caption_font_size(100.0, 900.0, 1000), 54);
        assert_eq!(caption_font_size(0.0, 900.0, 1000), DEFAULT_FONT_SIZE);
        assert_eq!(caption_font_size(100.0, 200.0, 1000) % 2, 0);
    }

    #[test]
    fn test_orientation_parse_and_apply() {
        assert_eq!(Orientation::parse("ROTATE_90"), Some(Orientation::Rotate90));
        assert_eq!(Orientation::parse(""), None);
        let img = RgbImage::new(40, 10);
        let rotated = Orientation::Rotate90.apply(img.clone());
        assert_eq!(rotated.dimensions(), (10, 40));
        assert_eq!(Orientation::Rotate180.apply(img).dimensions(), (40, 10));
    }

    #[test]
    fn test_boxes_placed_after_rotation() {
        let annotator = ImageAnnotator::new();
        let img = RgbImage::from_pixel(40, 80, Rgb([200, 200, 200]));
        let bbox = BoundingBox {
            top: 0.5,
            left: 0.5,
            width: 0.25,
            height: 0.25,
            label: None,
            confidence: 0.9,
        };
        let out = annotator.annotate(img, Orientation::Rotate90, &[bbox]);
        assert_eq!(out.dimensions(), (80, 40));
        // Box corner lands at (0.5 * 80, 0.5 * 40) of the rotated image.
        assert_eq!(out.get_pixel(40, 20), &BOX_COLOR);
        assert_eq!(out.get_pixel(5, 5), &Rgb([200, 200, 200]));
    }

    #[test]
    fn test_caption_runs_inside_box_at_image_top() {
        let annotator = ImageAnnotator::with_system_font();
        if !annotator.has_font() {
            return;
        }
        let img = RgbImage::from_pixel(200, 200, Rgb([255, 255, 255]));
        let bbox = BoundingBox {
            top: 0.0,
            left: 0.1,
            width: 0.8,
            height: 0.8,
            label: Some("Cat - 90.0%".into()),
            confidence: 0.9,
        };
        let out = annotator.annotate(img, Orientation::Rotate0, &[bbox]);
        // Interior just below the top edge is covered by the caption band.
        let banded = (24..60)
            .flat_map(|x| (6..12).map(move |y| (x, y)))
            .filter(|&(x, y)| out.get_pixel(x, y) == &BOX_COLOR)
            .count();
        assert!(banded > 0);
    }

    #[test]
    fn test_box_drawn_without_font() {
        let annotator = ImageAnnotator::new();
        let img = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        let bbox = BoundingBox {
            top: 0.2,
            left: 0.2,
            width: 0.5,
            height: 0.5,
            label: Some("Cat - 91.2%".into()),
            confidence: 0.912,
        };
        let out = annotator.annotate(img, Orientation::Rotate0, &[bbox]);
        assert_eq!(out.get_pixel(20, 20), &BOX_COLOR);
        assert_eq!(out.get_pixel(45, 45), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_decode_failure_names_path() {
        let err = decode_image(b"not an image", "/broken.png").unwrap_err();
        assert_eq!(err.kind_name(), "ImageDecodeError");
        assert!(err.to_string().contains("/broken.png"));
    }

    #[test]
    fn test_encode_then_decode_png() {
        let img = RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]));
        let bytes = encode_image(img, "/out.png").unwrap();
        let back = decode_image(&bytes, "/out.png").unwrap();
        assert_eq!(back.dimensions(), (4, 3));
    }
}
