//! Colour threshold classifier for the progress bar
//!
//! Averages the region to one BGR triple and walks a fixed rule list.

use ndarray::{ArrayView3, Axis};

use super::{StateClassifier, VisionError};
use crate::grind::state::ProgressBarState;

/// Mean colour of a region, channel order B, G, R
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeanBgr {
    pub b: f64,
    pub g: f64,
    pub r: f64,
}

/// Stateless classifier using fixed BGR thresholds
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorStateClassifier;

impl ColorStateClassifier {
    /// Create a new classifier
    pub fn new() -> Self {
        Self
    }

    /// Classify a BGR region
    ///
    /// Rejects empty buffers and anything that isn't exactly 3 channels.
    pub fn classify(&self, image: ArrayView3<'_, u8>) -> Result<ProgressBarState, VisionError> {
        let mean = mean_bgr(image)?;
        let state = state_for_color(mean);

        if state == ProgressBarState::Unknown {
            log::debug!(
                "Unrecognised progress bar colour: b={:.1} g={:.1} r={:.1}",
                mean.b,
                mean.g,
                mean.r
            );
        }

        Ok(state)
    }
}

impl StateClassifier for ColorStateClassifier {
    fn classify(&self, image: ArrayView3<'_, u8>) -> Result<ProgressBarState, VisionError> {
        ColorStateClassifier::classify(self, image)
    }
}

/// Average each channel over the whole region
pub fn mean_bgr(image: ArrayView3<'_, u8>) -> Result<MeanBgr, VisionError> {
    let (height, width, channels) = image.dim();

    if height == 0 || width == 0 {
        return Err(VisionError::InvalidFrame(format!(
            "empty region ({}x{})",
            width, height
        )));
    }
    if channels != 3 {
        return Err(VisionError::InvalidFrame(format!(
            "expected 3 BGR channels, got {}",
            channels
        )));
    }

    let mut totals = [0u64; 3];
    for pixel in image.lanes(Axis(2)) {
        for (total, &value) in totals.iter_mut().zip(pixel.iter()) {
            *total += value as u64;
        }
    }

    let count = (height * width) as f64;
    Ok(MeanBgr {
        b: totals[0] as f64 / count,
        g: totals[1] as f64 / count,
        r: totals[2] as f64 / count,
    })
}

/// Threshold rules, first match wins
fn state_for_color(MeanBgr { b, g, r }: MeanBgr) -> ProgressBarState {
    if b < 70.0 && g < 90.0 && r > 130.0 {
        ProgressBarState::Fail
    } else if b < 70.0 && (r - g).abs() < 50.0 {
        ProgressBarState::Progress
    } else if b < 30.0 && g < 60.0 && r < 70.0 {
        ProgressBarState::Standby
    } else if b > g && b > r && b > 50.0 {
        ProgressBarState::ConnectionError
    } else {
        ProgressBarState::Unknown
    }
}
