//! Upload, detect, respond.
//!
//! [`ImagePipeline::handle`] keeps each failure kind distinct in
//! [`PipelineFailure`]; only [`ImageAiResponse`] collapses them into the
//! single `{"success": false}` body clients see.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::{
    Error,
    assets::AssetHost,
    detect::{DetectError, DetectOutcome, Detection, Detector},
};

/// Why an image request produced no detection.
#[derive(Debug, Error)]
pub enum PipelineFailure {
    #[error("No image was provided")]
    MissingImage,

    #[error("Upload failed: {0}")]
    Upload(#[source] Error),

    #[error("Fetch failed: {0}")]
    Fetch(#[source] Error),

    #[error("Decode failed: {0}")]
    Decode(#[source] Error),

    #[error("Model failed: {0}")]
    Model(#[source] Error),

    #[error("No objects detected")]
    NoDetection,
}

impl PipelineFailure {
    /// Short stable name, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineFailure::MissingImage => "missing_image",
            PipelineFailure::Upload(_) => "upload",
            PipelineFailure::Fetch(_) => "fetch",
            PipelineFailure::Decode(_) => "decode",
            PipelineFailure::Model(_) => "model",
            PipelineFailure::NoDetection => "no_detection",
        }
    }

    fn from_detect(err: Error) -> Self {
        match &err {
            Error::Detect(e) if e.is_fetch_error() => PipelineFailure::Fetch(err),
            Error::Detect(DetectError::DecodeFailed { .. }) => PipelineFailure::Decode(err),
            _ => PipelineFailure::Model(err),
        }
    }
}

/// A successful run: where the image lives and what was found in it.
#[derive(Debug, Clone, PartialEq)]
pub struct Detected {
    pub secure_url: String,
    pub detection: Detection,
}

/// Body of the image endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ImageAiResponse {
    Detected {
        secure_url: String,
        #[serde(rename = "Object")]
        object: String,
        xmin: i64,
        xmax: i64,
        ymin: i64,
        ymax: i64,
    },
    Failed {
        success: bool,
    },
}

impl From<Result<Detected, PipelineFailure>> for ImageAiResponse {
    fn from(result: Result<Detected, PipelineFailure>) -> Self {
        match result {
            Ok(found) => {
                let bbox = found.detection.bbox;
                ImageAiResponse::Detected {
                    secure_url: found.secure_url,
                    object: found.detection.class_name,
                    xmin: bbox.xmin.trunc() as i64,
                    xmax: bbox.xmax.trunc() as i64,
                    ymin: bbox.ymin.trunc() as i64,
                    ymax: bbox.ymax.trunc() as i64,
                }
            }
            Err(_) => ImageAiResponse::Failed { success: false },
        }
    }
}

/// Wires the asset host to the detector.
#[derive(Clone)]
pub struct ImagePipeline {
    assets: Arc<dyn AssetHost>,
    detector: Detector,
}

impl ImagePipeline {
    pub fn new(assets: Arc<dyn AssetHost>, detector: Detector) -> Self {
        Self { assets, detector }
    }

    /// Upload `bytes`, then detect on the hosted copy.
    ///
    /// Detection runs against the uploaded URL rather than the local bytes,
    /// so what is analysed is exactly what the host serves.
    pub async fn handle(
        &self,
        bytes: Vec<u8>,
        filename: &str,
    ) -> Result<Detected, PipelineFailure> {
        if bytes.is_empty() {
            return Err(PipelineFailure::MissingImage);
        }

        let asset = self
            .assets
            .upload(bytes, filename)
            .await
            .map_err(PipelineFailure::Upload)?;

        match self
            .detector
            .detect(&asset.secure_url)
            .await
            .map_err(PipelineFailure::from_detect)?
        {
            DetectOutcome::Detected(detection) => Ok(Detected {
                secure_url: asset.secure_url,
                detection,
            }),
            DetectOutcome::NoDetection => Err(PipelineFailure::NoDetection),
        }
    }
}
