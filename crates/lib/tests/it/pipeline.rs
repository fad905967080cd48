//! Upload then detect, with each failure kind kept distinct.

use std::sync::Arc;

use glimpse::{
    detect::{BoundingBox, Detector, HttpImageFetcher},
    pipeline::{ImageAiResponse, ImagePipeline, PipelineFailure},
};

use crate::helpers::{ImageServer, RecordingAssetHost, ScriptedModel, UploadMode, candidate, png};

async fn build(mode: UploadMode, model: ScriptedModel) -> (ImagePipeline, Arc<RecordingAssetHost>) {
    let images = ImageServer::start().await;
    let assets = Arc::new(RecordingAssetHost::new(images, mode));
    let detector = Detector::new(Arc::new(HttpImageFetcher::new()), Arc::new(model));
    (ImagePipeline::new(assets.clone(), detector), assets)
}

fn one_dog() -> ScriptedModel {
    ScriptedModel::new(vec![candidate(BoundingBox::new(2.0, 3.0, 9.5, 7.9), 0.8, 16)])
}

#[tokio::test]
async fn success_carries_url_and_detection() {
    let (pipeline, assets) = build(UploadMode::Publish, one_dog()).await;

    let found = pipeline.handle(png(10, 10), "pet.png").await.unwrap();
    assert!(found.secure_url.ends_with("/images/asset-0"));
    assert_eq!(found.detection.class_name, "dog");
    assert_eq!(assets.uploads(), vec![("pet.png".to_string(), png(10, 10).len())]);

    let response = ImageAiResponse::from(Ok(found));
    assert!(matches!(
        response,
        ImageAiResponse::Detected { xmin: 2, xmax: 9, ymin: 3, ymax: 7, .. }
    ));
}

#[tokio::test]
async fn failure_kinds_stay_distinct() {
    let (pipeline, assets) = build(UploadMode::Publish, one_dog()).await;
    let failure = pipeline.handle(Vec::new(), "empty.png").await.unwrap_err();
    assert!(matches!(failure, PipelineFailure::MissingImage));
    assert!(assets.uploads().is_empty());

    let (pipeline, _) = build(UploadMode::Reject, one_dog()).await;
    let failure = pipeline.handle(png(10, 10), "a.png").await.unwrap_err();
    assert_eq!(failure.kind(), "upload");

    let (pipeline, _) = build(UploadMode::Dangling, one_dog()).await;
    let failure = pipeline.handle(png(10, 10), "a.png").await.unwrap_err();
    assert_eq!(failure.kind(), "fetch");

    let (pipeline, _) = build(UploadMode::Publish, one_dog()).await;
    let failure = pipeline.handle(b"GIF89a nope".to_vec(), "a.gif").await.unwrap_err();
    assert_eq!(failure.kind(), "decode");

    let (pipeline, _) = build(UploadMode::Publish, ScriptedModel::new(vec![])).await;
    let failure = pipeline.handle(png(10, 10), "a.png").await.unwrap_err();
    assert!(matches!(failure, PipelineFailure::NoDetection));

    let (pipeline, _) = build(
        UploadMode::Publish,
        ScriptedModel::new(vec![candidate(BoundingBox::new(0.0, 0.0, 5.0, 5.0), 0.5, 500)]),
    )
    .await;
    let failure = pipeline.handle(png(10, 10), "a.png").await.unwrap_err();
    assert_eq!(failure.kind(), "model");
}
