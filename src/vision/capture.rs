//! Frame capture helpers
//!
//! Converts captured pixels into BGR frames and crops the progress bar
//! region out of them.

use std::path::PathBuf;

use image::{RgbImage, RgbaImage};
use ndarray::{s, Array3};
use serde::{Deserialize, Serialize};

use super::{BgrFrame, VisionError};

/// A rectangle in relative coordinates (0.0 to 1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeRect {
    /// Left edge as a fraction of frame width
    pub x: f32,
    /// Top edge as a fraction of frame height
    pub y: f32,
    /// Width as a fraction of frame width
    pub width: f32,
    /// Height as a fraction of frame height
    pub height: f32,
}

impl Default for RelativeRect {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        }
    }
}

impl RelativeRect {
    /// Resolve to pixel bounds `(x0, y0, x1, y1)`, clamped to the frame
    pub fn to_pixels(
        &self,
        frame_width: usize,
        frame_height: usize,
    ) -> (usize, usize, usize, usize) {
        let clamp = |v: f32| v.clamp(0.0, 1.0);
        let x0 = (clamp(self.x) * frame_width as f32) as usize;
        let y0 = (clamp(self.y) * frame_height as f32) as usize;
        let x1 = (clamp(self.x + self.width) * frame_width as f32).round() as usize;
        let y1 = (clamp(self.y + self.height) * frame_height as f32).round() as usize;
        (x0, y0, x1.min(frame_width), y1.min(frame_height))
    }
}

/// Build a BGR frame from raw RGBA (4 channels) or RGB (3 channels) bytes
pub fn frame_from_raw(
    data: &[u8],
    width: u32,
    height: u32,
    channels: usize,
) -> Result<BgrFrame, VisionError> {
    if channels != 3 && channels != 4 {
        return Err(VisionError::InvalidFrame(format!(
            "unsupported channel count {}",
            channels
        )));
    }

    let expected_size = width as usize * height as usize * channels;
    if data.len() != expected_size {
        return Err(VisionError::InvalidFrame(format!(
            "expected {} bytes for {}x{}x{}, got {}",
            expected_size,
            width,
            height,
            channels,
            data.len()
        )));
    }

    let width = width as usize;
    Ok(Array3::from_shape_fn(
        (height as usize, width, 3),
        |(y, x, c)| data[(y * width + x) * channels + (2 - c)],
    ))
}

/// Convert an RGBA image to a BGR frame, dropping alpha
pub fn frame_from_rgba(image: &RgbaImage) -> BgrFrame {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
        image.get_pixel(x as u32, y as u32)[2 - c]
    })
}

/// Convert an RGB image to a BGR frame
pub fn frame_from_rgb(image: &RgbImage) -> BgrFrame {
    let (width, height) = image.dimensions();
    Array3::from_shape_fn((height as usize, width as usize, 3), |(y, x, c)| {
        image.get_pixel(x as u32, y as u32)[2 - c]
    })
}

/// Crop a relative region out of a frame
pub fn crop_relative(frame: &BgrFrame, rect: &RelativeRect) -> Result<BgrFrame, VisionError> {
    let (height, width, _) = frame.dim();
    let (x0, y0, x1, y1) = rect.to_pixels(width, height);

    if x1 <= x0 || y1 <= y0 {
        return Err(VisionError::InvalidFrame(format!(
            "region {:?} is empty on a {}x{} frame",
            rect, width, height
        )));
    }

    Ok(frame.slice(s![y0..y1, x0..x1, ..]).to_owned())
}

/// Supplies frames to a grinding session
pub trait FrameSource {
    /// Next frame, or `None` when the source is exhausted
    fn next_frame(&mut self) -> Result<Option<BgrFrame>, VisionError>;
}

/// Replays screenshots from disk in order
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    position: usize,
    region: Option<RelativeRect>,
}

impl ImageSequence {
    /// Create a sequence over the given files
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            position: 0,
            region: None,
        }
    }

    /// Crop every frame to the progress bar region
    pub fn with_region(mut self, region: Option<RelativeRect>) -> Self {
        self.region = region;
        self
    }

    /// Number of frames not yet returned
    pub fn remaining(&self) -> usize {
        self.paths.len() - self.position
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<BgrFrame>, VisionError> {
        let Some(path) = self.paths.get(self.position) else {
            return Ok(None);
        };
        self.position += 1;

        let image = image::open(path).map_err(|source| VisionError::ImageLoad {
            path: path.display().to_string(),
            source,
        })?;
        let frame = frame_from_rgba(&image.to_rgba8());

        match &self.region {
            Some(rect) => crop_relative(&frame, rect).map(Some),
            None => Ok(Some(frame)),
        }
    }
}
