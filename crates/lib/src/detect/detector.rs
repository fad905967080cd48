//! Fetch, decode, infer and select.

use std::sync::Arc;

use image::DynamicImage;

use super::{
    ArtifactWriter, DetectError, DetectOutcome, Detection, ImageFetcher, ObjectModel,
};
use crate::Result;

/// Runs the shared model against images addressed by URL.
#[derive(Clone)]
pub struct Detector {
    fetcher: Arc<dyn ImageFetcher>,
    model: Arc<dyn ObjectModel>,
    artifacts: Option<ArtifactWriter>,
}

impl Detector {
    pub fn new(fetcher: Arc<dyn ImageFetcher>, model: Arc<dyn ObjectModel>) -> Self {
        Self {
            fetcher,
            model,
            artifacts: None,
        }
    }

    /// Also write annotated/cropped copies of every detection.
    pub fn with_artifacts(mut self, writer: ArtifactWriter) -> Self {
        self.artifacts = Some(writer);
        self
    }

    /// Detect the first object in the image at `url`.
    ///
    /// The first candidate in the model's own order wins; no re-sorting
    /// happens here.
    ///
    /// # Errors
    /// - fetch errors from the [`ImageFetcher`]
    /// - [`DetectError::DecodeFailed`] if the bytes are not an image
    /// - [`DetectError::ModelFailed`] / [`DetectError::UnknownClass`] if the
    ///   model fails or reports something unusable
    pub async fn detect(&self, url: &str) -> Result<DetectOutcome> {
        let bytes = self.fetcher.fetch(url).await?;
        let image = image::load_from_memory(&bytes).map_err(|e| DetectError::DecodeFailed {
            reason: e.to_string(),
        })?;
        tracing::debug!(url = %url, width = image.width(), height = image.height(), "Decoded image");

        let model = Arc::clone(&self.model);
        let artifacts = self.artifacts.clone();
        tokio::task::spawn_blocking(move || select_first(model.as_ref(), artifacts.as_ref(), &image))
            .await
            .map_err(|e| DetectError::ModelFailed {
                reason: format!("inference task failed: {e}"),
            })?
    }
}

/// Run `model` once and resolve its first candidate.
fn select_first(
    model: &dyn ObjectModel,
    artifacts: Option<&ArtifactWriter>,
    image: &DynamicImage,
) -> Result<DetectOutcome> {
    let candidates = model.infer(image)?;
    let Some(first) = candidates.into_iter().next() else {
        tracing::info!("No objects detected");
        return Ok(DetectOutcome::NoDetection);
    };

    let class_name = model
        .class_name(first.class_id)
        .filter(|name| !name.is_empty())
        .ok_or(DetectError::UnknownClass {
            class_id: first.class_id,
        })?
        .to_string();

    let bbox = first.bbox.clip(image.width(), image.height());
    if !bbox.is_proper() || !(0.0..=1.0).contains(&first.confidence) {
        return Err(DetectError::ModelFailed {
            reason: format!(
                "unusable candidate: box {:?}, confidence {}",
                first.bbox, first.confidence
            ),
        }
        .into());
    }

    let detection = Detection {
        bbox,
        confidence: first.confidence,
        class_name,
    };
    tracing::info!(
        object = %detection.class_name,
        confidence = detection.confidence,
        xmin = bbox.xmin,
        xmax = bbox.xmax,
        ymin = bbox.ymin,
        ymax = bbox.ymax,
        "Detected object"
    );

    if let Some(writer) = artifacts {
        match writer.write(image, &detection) {
            Ok(paths) => tracing::debug!(
                object = %detection.class_name,
                annotated = %paths.annotated.display(),
                cropped = %paths.cropped.display(),
                "Wrote detection artifacts"
            ),
            Err(e) => tracing::warn!("Failed to write detection artifacts: {e}"),
        }
    }

    Ok(DetectOutcome::Detected(detection))
}
