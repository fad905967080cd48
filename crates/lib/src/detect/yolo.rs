//! YOLOv5-family detector run on the rten inference engine.
//!
//! The model file is an `.rten` conversion of a YOLOv5 ONNX export. It takes a
//! `[1, 3, S, S]` RGB tensor in `[0, 1]` and produces `[1, N, 5 + C]` rows of
//! `cx, cy, w, h, objectness, class scores...` in input pixel space.
//!
//! Post-processing mirrors the reference YOLOv5 pipeline: score is objectness
//! times the best class score, low scores are dropped, class-aware NMS keeps
//! the survivors in descending score order, and boxes are mapped back from the
//! letterboxed input to source image pixels.

use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage, imageops::FilterType};
use rten::Model;
use rten_tensor::{NdTensor, prelude::*};

use super::{BoundingBox, Candidate, DetectError, ObjectModel, labels::COCO_LABELS};
use crate::{Result, config::DetectionSettings};

/// Grey used by YOLOv5 to pad letterboxed inputs.
const PAD_VALUE: u8 = 114;

/// Inference parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct YoloParams {
    /// Square input edge in pixels.
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
}

impl Default for YoloParams {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
            max_detections: 300,
        }
    }
}

impl From<&DetectionSettings> for YoloParams {
    fn from(settings: &DetectionSettings) -> Self {
        Self {
            confidence_threshold: settings.confidence_threshold,
            iou_threshold: settings.iou_threshold,
            ..Self::default()
        }
    }
}

/// How a source image was fitted into the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
}

impl Letterbox {
    /// Map a box in model input space back to source pixels.
    pub fn unmap(&self, bbox: &BoundingBox) -> BoundingBox {
        BoundingBox::new(
            (bbox.xmin - self.pad_x) / self.scale,
            (bbox.ymin - self.pad_y) / self.scale,
            (bbox.xmax - self.pad_x) / self.scale,
            (bbox.ymax - self.pad_y) / self.scale,
        )
    }
}

/// Resize `image` to fit a `size` square without distortion, centered on grey.
pub(crate) fn letterbox(image: &DynamicImage, size: u32) -> (RgbImage, Letterbox) {
    let (width, height) = (image.width().max(1), image.height().max(1));
    let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
    let new_w = ((width as f32 * scale).round() as u32).clamp(1, size);
    let new_h = ((height as f32 * scale).round() as u32).clamp(1, size);
    let pad_x = (size - new_w) / 2;
    let pad_y = (size - new_h) / 2;

    let resized = image::imageops::resize(&image.to_rgb8(), new_w, new_h, FilterType::Triangle);
    let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
    image::imageops::replace(&mut canvas, &resized, pad_x as i64, pad_y as i64);

    (
        canvas,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

/// Pack an RGB image into a `[1, 3, H, W]` tensor scaled to `[0, 1]`.
pub(crate) fn to_nchw(image: &RgbImage) -> NdTensor<f32, 4> {
    let (width, height) = image.dimensions();
    let plane = (width * height) as usize;
    let mut data = vec![0f32; 3 * plane];
    for (x, y, pixel) in image.enumerate_pixels() {
        let offset = (y * width + x) as usize;
        for channel in 0..3 {
            data[channel * plane + offset] = pixel[channel] as f32 / 255.0;
        }
    }
    NdTensor::from_data([1, 3, height as usize, width as usize], data)
}

/// Turn raw `[N, 5 + C]` rows into scored candidates above `threshold`.
///
/// Boxes stay in model input space.
pub(crate) fn decode_rows(rows: &[f32], stride: usize, threshold: f32) -> Vec<Candidate> {
    if stride < 6 {
        return Vec::new();
    }
    rows.chunks_exact(stride)
        .filter_map(|row| {
            let objectness = row[4];
            if objectness <= threshold {
                return None;
            }
            let (class_id, class_score) = row[5..]
                .iter()
                .copied()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(&b.1))?;
            let confidence = objectness * class_score;
            if confidence <= threshold {
                return None;
            }
            Some(Candidate {
                bbox: BoundingBox::from_center(row[0], row[1], row[2], row[3]),
                confidence: confidence.clamp(0.0, 1.0),
                class_id,
            })
        })
        .collect()
}

/// Class-aware greedy non-maximum suppression.
///
/// Returns at most `max_detections` candidates ordered by descending
/// confidence.
pub(crate) fn non_max_suppression(
    mut candidates: Vec<Candidate>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept.iter().any(|k| {
            k.class_id == candidate.class_id && k.bbox.iou(&candidate.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

/// Turn a raw `[1, N, 5 + C]` model output into candidates in source pixels.
///
/// `source` is the `(width, height)` of the image before letterboxing. Boxes
/// that vanish once clipped to the source image are dropped.
pub(crate) fn postprocess(
    output: &NdTensor<f32, 3>,
    fit: &Letterbox,
    source: (u32, u32),
    params: &YoloParams,
) -> Result<Vec<Candidate>> {
    let [_, rows, stride] = output.shape();
    if stride < 6 {
        return Err(DetectError::ModelFailed {
            reason: format!("expected [1, N, 5 + classes] output, got [1, {rows}, {stride}]"),
        }
        .into());
    }

    let raw = decode_rows(&output.to_vec(), stride, params.confidence_threshold);
    let kept = non_max_suppression(raw, params.iou_threshold, params.max_detections);

    let candidates: Vec<Candidate> = kept
        .into_iter()
        .filter_map(|c| {
            let bbox = fit.unmap(&c.bbox).clip(source.0, source.1);
            bbox.is_proper().then_some(Candidate { bbox, ..c })
        })
        .collect();

    tracing::debug!(rows, candidates = candidates.len(), "Ran detection model");
    Ok(candidates)
}

/// A YOLOv5 model loaded once and shared across requests.
pub struct YoloModel {
    model: Model,
    params: YoloParams,
}

impl YoloModel {
    /// Load a model file.
    pub fn load(path: impl AsRef<Path>, params: YoloParams) -> Result<Self> {
        let path = path.as_ref();
        let model = Model::load_file(path).map_err(|e| DetectError::ModelFailed {
            reason: format!("loading {}: {e}", path.display()),
        })?;
        tracing::info!(path = %path.display(), input_size = params.input_size, "Loaded detection model");
        Ok(Self { model, params })
    }

    /// Load the model named by `settings`.
    pub fn from_settings(settings: &DetectionSettings) -> Result<Self> {
        Self::load(&settings.model_path, YoloParams::from(settings))
    }
}

impl ObjectModel for YoloModel {
    fn infer(&self, image: &DynamicImage) -> Result<Vec<Candidate>> {
        let (input, fit) = letterbox(image, self.params.input_size);
        let input = to_nchw(&input);

        let output = self
            .model
            .run_one(input.view().into(), None)
            .map_err(|e| DetectError::ModelFailed {
                reason: e.to_string(),
            })?;
        let output: NdTensor<f32, 3> = output.try_into().map_err(|e| DetectError::ModelFailed {
            reason: format!("unexpected output: {e}"),
        })?;

        postprocess(&output, &fit, (image.width(), image.height()), &self.params)
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        COCO_LABELS.get(class_id).copied()
    }
}
