//! Single-object detection over remotely hosted images.
//!
//! The flow is fetch, decode, infer once, keep the first candidate. Each step
//! fails with its own [`DetectError`] variant so callers can tell an image that
//! never arrived from one that showed nothing ([`DetectOutcome::NoDetection`]).
//!
//! - [`fetch`]: the [`ImageFetcher`] seam and its HTTP implementation
//! - [`yolo`]: [`YoloModel`], a YOLOv5-family model run through rten
//! - [`labels`]: the class table of the bundled model family
//! - [`artifacts`]: annotated and cropped copies written for debugging
//! - [`detector`]: [`Detector`], which ties the above together

use image::DynamicImage;
use thiserror::Error;

use crate::{Error, Result};

pub mod artifacts;
pub mod detector;
pub mod fetch;
pub mod labels;
pub mod yolo;

pub use artifacts::{ArtifactPaths, ArtifactWriter};
pub use detector::Detector;
pub use fetch::{HttpImageFetcher, ImageFetcher};
pub use labels::COCO_LABELS;
pub use yolo::{YoloModel, YoloParams};

/// Errors raised while detecting objects in an image.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DetectError {
    /// The image could not be retrieved at all.
    #[error("Failed to fetch image from {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    /// The image host answered with something other than 200.
    #[error("Image fetch from {url} returned status {status}")]
    FetchStatus { url: String, status: u16 },

    /// The fetched bytes are not a decodable image.
    #[error("Failed to decode image: {reason}")]
    DecodeFailed { reason: String },

    /// The model could not be loaded or failed during inference.
    #[error("Detection model error: {reason}")]
    ModelFailed { reason: String },

    /// The model reported a class id it has no label for.
    #[error("Detection model reported unknown class id {class_id}")]
    UnknownClass { class_id: usize },

    /// Writing a debug artifact failed.
    #[error("Failed to write detection artifact {path}: {reason}")]
    ArtifactFailed { path: String, reason: String },
}

impl DetectError {
    /// Check if the image never arrived.
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            DetectError::FetchFailed { .. } | DetectError::FetchStatus { .. }
        )
    }

    /// Check if the image arrived but could not be decoded.
    pub fn is_decode_error(&self) -> bool {
        matches!(self, DetectError::DecodeFailed { .. })
    }

    /// Check if the model itself misbehaved.
    pub fn is_model_error(&self) -> bool {
        matches!(
            self,
            DetectError::ModelFailed { .. } | DetectError::UnknownClass { .. }
        )
    }
}

impl From<DetectError> for Error {
    fn from(err: DetectError) -> Self {
        Error::Detect(err)
    }
}

/// Axis-aligned box in source image pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub xmin: f32,
    pub ymin: f32,
    pub xmax: f32,
    pub ymax: f32,
}

impl BoundingBox {
    pub fn new(xmin: f32, ymin: f32, xmax: f32, ymax: f32) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Build from a center point and size.
    pub fn from_center(cx: f32, cy: f32, w: f32, h: f32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0)
    }

    pub fn width(&self) -> f32 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f32 {
        self.ymax - self.ymin
    }

    pub fn area(&self) -> f32 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// True when the box encloses a positive area.
    pub fn is_proper(&self) -> bool {
        self.xmin < self.xmax && self.ymin < self.ymax
    }

    /// Intersection over union with `other`; zero when either box is empty.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.xmax.min(other.xmax) - self.xmin.max(other.xmin)).max(0.0);
        let iy = (self.ymax.min(other.ymax) - self.ymin.max(other.ymin)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 { 0.0 } else { intersection / union }
    }

    /// Clamp every edge into `[0, width] x [0, height]`.
    pub fn clip(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);
        Self::new(
            self.xmin.clamp(0.0, w),
            self.ymin.clamp(0.0, h),
            self.xmax.clamp(0.0, w),
            self.ymax.clamp(0.0, h),
        )
    }
}

/// One raw model output: a box, a score and a numeric class.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
}

/// A candidate with its class resolved to a label.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_name: String,
}

/// What a successful detection run found.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectOutcome {
    Detected(Detection),
    /// The image decoded fine but the model reported nothing.
    NoDetection,
}

/// A pretrained detector, treated as a pure function from image to candidates.
///
/// Implementations are shared read-only across concurrent requests.
pub trait ObjectModel: Send + Sync {
    /// Run the model once over `image`.
    ///
    /// Candidates come back in the model's native order; callers must not
    /// assume any particular sort.
    fn infer(&self, image: &DynamicImage) -> Result<Vec<Candidate>>;

    /// Label for `class_id`, if the model knows it.
    fn class_name(&self, class_id: usize) -> Option<&str>;
}
