//! The detector against images served over real HTTP.

use std::sync::Arc;

use glimpse::{
    Error,
    detect::{
        ArtifactWriter, BoundingBox, DetectError, DetectOutcome, Detector, HttpImageFetcher,
        ImageFetcher,
        artifacts::{ANNOTATED_FILE, CROPPED_FILE},
    },
};
use image::ImageFormat;

use crate::helpers::{ImageServer, ScriptedModel, candidate, image_bytes, png};

fn detector(model: Arc<ScriptedModel>) -> Detector {
    Detector::new(Arc::new(HttpImageFetcher::new()), model)
}

#[tokio::test]
async fn fetcher_only_accepts_ok() {
    let images = ImageServer::start().await;
    let url = images.put("a.png", png(4, 4));

    let fetcher = HttpImageFetcher::new();
    assert_eq!(fetcher.fetch(&url).await.unwrap(), png(4, 4));

    let err = fetcher.fetch(&images.url("missing.png")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Detect(DetectError::FetchStatus { status: 404, .. })
    ));
}

#[tokio::test]
async fn missing_image_is_a_fetch_failure_not_a_panic() {
    let images = ImageServer::start().await;
    let model = Arc::new(ScriptedModel::new(vec![candidate(
        BoundingBox::new(0.0, 0.0, 1.0, 1.0),
        0.5,
        0,
    )]));

    let err = detector(model.clone())
        .detect(&images.url("nope.jpg"))
        .await
        .unwrap_err();
    assert!(matches!(&err, Error::Detect(e) if e.is_fetch_error()));
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn undecodable_image_is_a_decode_failure() {
    let images = ImageServer::start().await;
    let url = images.put("bad.jpg", b"\xff\xd8\xff garbage".to_vec());
    let model = Arc::new(ScriptedModel::new(vec![]));

    let err = detector(model.clone()).detect(&url).await.unwrap_err();
    assert!(matches!(&err, Error::Detect(e) if e.is_decode_error()), "{err:?}");
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn empty_model_output_is_no_detection() {
    let images = ImageServer::start().await;
    let url = images.put("a.png", png(32, 32));
    let model = Arc::new(ScriptedModel::new(vec![]));

    let outcome = detector(model.clone()).detect(&url).await.unwrap();
    assert_eq!(outcome, DetectOutcome::NoDetection);
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn detection_satisfies_box_invariants() {
    let images = ImageServer::start().await;
    let url = images.put("a.jpg", image_bytes(64, 48, ImageFormat::Jpeg));
    let model = Arc::new(ScriptedModel::new(vec![
        // Extends past the right and bottom edges; clipped to the image.
        candidate(BoundingBox::new(40.0, 30.0, 90.0, 70.0), 0.66, 2),
        candidate(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0.99, 0),
    ]));

    let DetectOutcome::Detected(detection) = detector(model).detect(&url).await.unwrap() else {
        panic!("expected a detection");
    };
    assert_eq!(detection.class_name, "car");
    assert_eq!(detection.confidence, 0.66);
    assert_eq!(detection.bbox, BoundingBox::new(40.0, 30.0, 64.0, 48.0));
    assert!(detection.bbox.xmin < detection.bbox.xmax);
    assert!(detection.bbox.ymin < detection.bbox.ymax);
}

#[tokio::test]
async fn concurrent_requests_share_one_model() {
    let images = ImageServer::start().await;
    let url = images.put("a.png", png(16, 16));
    let model = Arc::new(ScriptedModel::new(vec![candidate(
        BoundingBox::new(1.0, 1.0, 8.0, 8.0),
        0.5,
        15,
    )]));
    let detector = detector(model.clone());

    let runs = (0..8).map(|_| {
        let detector = detector.clone();
        let url = url.clone();
        tokio::spawn(async move { detector.detect(&url).await })
    });
    for run in runs.collect::<Vec<_>>() {
        let outcome = run.await.unwrap().unwrap();
        assert!(matches!(outcome, DetectOutcome::Detected(d) if d.class_name == "cat"));
    }
    assert_eq!(model.calls(), 8);
}

#[tokio::test]
async fn artifacts_land_in_the_configured_directory() {
    let images = ImageServer::start().await;
    let url = images.put("a.png", png(50, 40));
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new(vec![candidate(
        BoundingBox::new(10.0, 5.0, 30.0, 25.0),
        0.8,
        9,
    )]));

    detector(model)
        .with_artifacts(ArtifactWriter::new(dir.path().join("out")))
        .detect(&url)
        .await
        .unwrap();

    let out = dir.path().join("out");
    assert_eq!(artifact_names(&out), vec![ANNOTATED_FILE, CROPPED_FILE]);
    let cropped = image::open(out.join(CROPPED_FILE)).unwrap();
    assert_eq!((cropped.width(), cropped.height()), (20, 20));
}

#[tokio::test]
async fn artifact_directory_stays_bounded() {
    let images = ImageServer::start().await;
    let url = images.put("a.png", png(32, 32));
    let dir = tempfile::tempdir().unwrap();
    let model = Arc::new(ScriptedModel::new(vec![candidate(
        BoundingBox::new(2.0, 2.0, 20.0, 20.0),
        0.7,
        16,
    )]));
    let detector = detector(model.clone()).with_artifacts(ArtifactWriter::new(dir.path()));

    let runs: Vec<_> = (0..25)
        .map(|_| {
            let detector = detector.clone();
            let url = url.clone();
            tokio::spawn(async move { detector.detect(&url).await })
        })
        .collect();
    for run in runs {
        run.await.unwrap().unwrap();
    }
    for _ in 0..25 {
        detector.detect(&url).await.unwrap();
    }

    assert_eq!(model.calls(), 50);
    assert_eq!(artifact_names(dir.path()), vec![ANNOTATED_FILE, CROPPED_FILE]);
}

fn artifact_names(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
