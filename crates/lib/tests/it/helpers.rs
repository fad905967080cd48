use std::{
    collections::HashMap,
    io::Cursor,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    routing::get,
};
use glimpse::{
    FixedClock, Result,
    api::{self, AppState},
    assets::{AssetError, AssetHost, UploadedAsset},
    auth::{AuthService, JwtCodec},
    config::TokenSettings,
    detect::{ArtifactWriter, BoundingBox, Candidate, Detector, HttpImageFetcher, ObjectModel},
    pipeline::ImagePipeline,
    store::{CredentialStore, InMemoryCredentialStore},
};
use image::{DynamicImage, ImageFormat, RgbImage};

pub const TEST_SECRET: &str = "integration-secret";
pub const TEST_EXPIRY_MINUTES: i64 = 30;

// ==========================
// CORE TEST FACTORIES
// ==========================

/// Creates a credential store based on the TEST_BACKEND env var.
///
/// Supported values:
/// - "inmemory" or unset: in-memory store (default)
/// - "sqlite": private in-memory SQLite database (requires `sqlite` feature)
///
/// # Panics
/// Panics if TEST_BACKEND=sqlite but the `sqlite` feature is not enabled.
pub async fn test_store() -> Arc<dyn CredentialStore> {
    match std::env::var("TEST_BACKEND").as_deref() {
        Ok("sqlite") => {
            #[cfg(feature = "sqlite")]
            {
                Arc::new(
                    glimpse::store::SqlxCredentialStore::sqlite_in_memory()
                        .await
                        .expect("Failed to create SQLite store"),
                )
            }
            #[cfg(not(feature = "sqlite"))]
            panic!("TEST_BACKEND=sqlite requires the `sqlite` feature")
        }
        _ => Arc::new(InMemoryCredentialStore::new()),
    }
}

/// An auth service over a fresh store with a controllable clock.
pub async fn test_auth(clock: Arc<FixedClock>) -> AuthService {
    let settings = TokenSettings::new(TEST_SECRET, "HS256", TEST_EXPIRY_MINUTES).unwrap();
    AuthService::new(test_store().await, Arc::new(JwtCodec::new(&settings, clock)))
}

/// Encode a blank image of the given size.
pub fn image_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(RgbImage::new(width, height))
        .write_to(&mut bytes, format)
        .unwrap();
    bytes.into_inner()
}

pub fn png(width: u32, height: u32) -> Vec<u8> {
    image_bytes(width, height, ImageFormat::Png)
}

pub fn candidate(bbox: BoundingBox, confidence: f32, class_id: usize) -> Candidate {
    Candidate {
        bbox,
        confidence,
        class_id,
    }
}

// ==========================
// IMAGE HOSTING
// ==========================

type Images = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// A tiny HTTP server standing in for a remote image host.
///
/// Serves `GET /images/{name}` from an in-memory map; unknown names are 404.
#[derive(Clone)]
pub struct ImageServer {
    pub addr: SocketAddr,
    images: Images,
}

async fn serve_image(
    State(images): State<Images>,
    Path(name): Path<String>,
) -> std::result::Result<Vec<u8>, StatusCode> {
    images
        .lock()
        .unwrap()
        .get(&name)
        .cloned()
        .ok_or(StatusCode::NOT_FOUND)
}

impl ImageServer {
    pub async fn start() -> Self {
        let images: Images = Arc::default();
        let router = Router::new()
            .route("/images/{name}", get(serve_image))
            .with_state(images.clone());
        let addr = spawn(router).await;
        Self { addr, images }
    }

    /// Publish `bytes` under `name` and return its URL.
    pub fn put(&self, name: &str, bytes: Vec<u8>) -> String {
        self.images.lock().unwrap().insert(name.to_string(), bytes);
        self.url(name)
    }

    pub fn url(&self, name: &str) -> String {
        format!("http://{}/images/{name}", self.addr)
    }
}

/// Serve `router` on an ephemeral loopback port.
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind address");
    let addr = listener.local_addr().expect("Failed to get local address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    addr
}

/// How a [`RecordingAssetHost`] answers uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadMode {
    /// Publish the bytes on the image server.
    Publish,
    /// Report success with a URL that 404s.
    Dangling,
    /// Refuse the upload.
    Reject,
}

/// Asset host double that records uploads and publishes them on an
/// [`ImageServer`].
pub struct RecordingAssetHost {
    server: ImageServer,
    mode: UploadMode,
    uploads: Mutex<Vec<(String, usize)>>,
    counter: AtomicUsize,
}

impl RecordingAssetHost {
    pub fn new(server: ImageServer, mode: UploadMode) -> Self {
        Self {
            server,
            mode,
            uploads: Mutex::new(Vec::new()),
            counter: AtomicUsize::new(0),
        }
    }

    /// `(filename, size)` of every upload attempt.
    pub fn uploads(&self) -> Vec<(String, usize)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AssetHost for RecordingAssetHost {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<UploadedAsset> {
        self.uploads
            .lock()
            .unwrap()
            .push((filename.to_string(), bytes.len()));
        let name = format!("asset-{}", self.counter.fetch_add(1, Ordering::SeqCst));

        let secure_url = match self.mode {
            UploadMode::Publish => self.server.put(&name, bytes),
            UploadMode::Dangling => self.server.url(&name),
            UploadMode::Reject => {
                return Err(AssetError::Rejected {
                    status: 401,
                    message: "Invalid Signature".to_string(),
                }
                .into());
            }
        };
        Ok(UploadedAsset {
            secure_url,
            public_id: Some(name),
        })
    }
}

// ==========================
// MODEL
// ==========================

/// Object model double that returns scripted candidates.
pub struct ScriptedModel {
    candidates: Vec<Candidate>,
    calls: AtomicUsize,
    seen: Mutex<Vec<(u32, u32)>>,
}

impl ScriptedModel {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self {
            candidates,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Dimensions of every image the model was run on.
    pub fn seen(&self) -> Vec<(u32, u32)> {
        self.seen.lock().unwrap().clone()
    }
}

impl ObjectModel for ScriptedModel {
    fn infer(&self, image: &DynamicImage) -> Result<Vec<Candidate>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((image.width(), image.height()));
        Ok(self.candidates.clone())
    }

    fn class_name(&self, class_id: usize) -> Option<&str> {
        glimpse::detect::COCO_LABELS.get(class_id).copied()
    }
}

// ==========================
// FULL SERVER
// ==========================

/// A running router plus handles on its collaborators.
pub struct TestServer {
    pub base: String,
    pub client: reqwest::Client,
    pub clock: Arc<FixedClock>,
    pub assets: Arc<RecordingAssetHost>,
    pub model: Arc<ScriptedModel>,
    pub images: ImageServer,
}

impl TestServer {
    /// Start a server whose uploads are published and whose model reports
    /// `candidates`.
    pub async fn start(candidates: Vec<Candidate>) -> Self {
        Self::start_with(candidates, UploadMode::Publish, None).await
    }

    pub async fn start_with(
        candidates: Vec<Candidate>,
        mode: UploadMode,
        artifacts: Option<ArtifactWriter>,
    ) -> Self {
        let clock = Arc::new(FixedClock::default());
        let auth = test_auth(clock.clone()).await;

        let images = ImageServer::start().await;
        let assets = Arc::new(RecordingAssetHost::new(images.clone(), mode));
        let model = Arc::new(ScriptedModel::new(candidates));

        let mut detector = Detector::new(Arc::new(HttpImageFetcher::new()), model.clone());
        if let Some(writer) = artifacts {
            detector = detector.with_artifacts(writer);
        }
        let pipeline = ImagePipeline::new(assets.clone(), detector);

        let addr = spawn(api::router(AppState::new(auth, pipeline))).await;
        Self {
            base: format!("http://{addr}"),
            client: reqwest::Client::new(),
            clock,
            assets,
            model,
            images,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> reqwest::Response {
        self.client.post(self.url(path)).json(&body).send().await.unwrap()
    }

    pub async fn register(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/register",
            serde_json::json!({"email": email, "password": password}),
        )
        .await
    }

    pub async fn signin(&self, email: &str, password: &str) -> reqwest::Response {
        self.post_json(
            "/signin",
            serde_json::json!({"email": email, "password": password}),
        )
        .await
    }

    /// Register and sign in, returning the access token.
    pub async fn token_for(&self, email: &str, password: &str) -> String {
        assert_eq!(self.register(email, password).await.status(), 201);
        let body: serde_json::Value = self.signin(email, password).await.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn me(&self, token: &str) -> reqwest::Response {
        self.client
            .get(self.url("/me"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    /// POST `bytes` to the image endpoint as the `file` part.
    pub async fn upload(&self, bytes: Vec<u8>, filename: &str) -> serde_json::Value {
        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string()),
        );
        let response = self
            .client
            .post(self.url("/image-ai"))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        response.json().await.unwrap()
    }
}
