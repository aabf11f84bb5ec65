use std::{
    path::Path,
    sync::{Mutex, PoisonError},
};

use image::RgbaImage;
use thiserror::Error;

use crate::{
    geometry::{ScreenPoint, ScreenSize},
    util::Rgba,
};

/// Destination of rendered pixels.
///
/// Writes may come from several render workers at once, but never to the same pixel.
pub trait RenderTarget: Sync {
    fn size(&self) -> ScreenSize;

    fn write(&self, point: ScreenPoint, color: Rgba);

    /// Writes a complete row, starting at x = 0.
    fn write_row(&self, y: u32, colors: &[Rgba]) {
        for (x, color) in colors.iter().enumerate() {
            self.write(ScreenPoint::new(x as u32, y), *color);
        }
    }
}

#[derive(Debug, Error)]
#[error("Failed to save image")]
pub struct ImageSaveError(#[from] image::ImageError);

/// In-memory image with one lock per row.
#[derive(Debug)]
pub struct FrameBuffer {
    size: ScreenSize,
    rows: Vec<Mutex<Vec<Rgba>>>,
}

impl FrameBuffer {
    /// Creates a buffer filled with transparent black.
    pub fn new(size: ScreenSize) -> Self {
        let row = vec![Rgba::new(0.0, 0.0, 0.0, 0.0); size.x as usize];
        FrameBuffer {
            size,
            rows: (0..size.y).map(|_| Mutex::new(row.clone())).collect(),
        }
    }

    pub fn get(&self, point: ScreenPoint) -> Rgba {
        self.rows[point.y as usize]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)[point.x as usize]
    }

    pub fn get_mut(&mut self, point: ScreenPoint) -> &mut Rgba {
        &mut self.rows[point.y as usize]
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)[point.x as usize]
    }

    /// Copy of all pixels in row major order.
    pub fn to_pixels(&self) -> Vec<Rgba> {
        self.rows
            .iter()
            .flat_map(|row| row.lock().unwrap_or_else(PoisonError::into_inner).clone())
            .collect()
    }

    pub fn to_image(&self) -> RgbaImage {
        let pixels = self.to_pixels();
        let width = self.size.x as usize;
        RgbaImage::from_fn(self.size.x, self.size.y, |x, y| {
            color_to_image(pixels[y as usize * width + x as usize])
        })
    }

    pub fn save_png(&self, path: impl AsRef<Path>) -> Result<(), ImageSaveError> {
        self.to_image()
            .save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

impl RenderTarget for FrameBuffer {
    fn size(&self) -> ScreenSize {
        self.size
    }

    fn write(&self, point: ScreenPoint, color: Rgba) {
        self.rows[point.y as usize]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)[point.x as usize] = color;
    }

    fn write_row(&self, y: u32, colors: &[Rgba]) {
        let mut row = self.rows[y as usize]
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        row[..colors.len()].copy_from_slice(colors);
    }
}

/// Maps a 0-1 f32 rgba pixel to pixel type compatible with module image.
pub fn color_to_image(color: Rgba) -> image::Rgba<u8> {
    image::Rgba([
        (color.r * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.g * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.b * 255.0).round().clamp(0.0, 255.0) as u8,
        (color.a * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}
