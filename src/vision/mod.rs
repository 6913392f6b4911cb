//! Vision and image processing module
//!
//! Turns captured pixels into progress bar states. Frames are BGR
//! `ndarray` buffers shaped `(height, width, channels)`.

pub mod capture;
pub mod classifier;

use ndarray::ArrayView3;

use crate::grind::state::ProgressBarState;

pub use capture::{
    crop_relative, frame_from_raw, frame_from_rgb, frame_from_rgba, FrameSource, ImageSequence,
    RelativeRect,
};
pub use classifier::ColorStateClassifier;

/// Owned BGR frame, `(height, width, 3)`
pub type BgrFrame = ndarray::Array3<u8>;

/// Anything that can label a progress bar region
///
/// `ColorStateClassifier` is the production implementation; the monitor
/// only depends on this contract.
pub trait StateClassifier {
    /// Classify one BGR region
    fn classify(&self, image: ArrayView3<'_, u8>) -> Result<ProgressBarState, VisionError>;
}

impl<T: StateClassifier + ?Sized> StateClassifier for &T {
    fn classify(&self, image: ArrayView3<'_, u8>) -> Result<ProgressBarState, VisionError> {
        (**self).classify(image)
    }
}

/// Vision system errors
#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    #[error("Failed to load image {path}: {source}")]
    ImageLoad {
        path: String,
        #[source]
        source: image::ImageError,
    },
    #[error("Frame capture failed: {0}")]
    CaptureFailed(String),
}
