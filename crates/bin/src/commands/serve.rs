//! Serve command - runs the glimpse HTTP server.

use std::{net::SocketAddr, sync::Arc};

use glimpse::{
    Clock, SystemClock,
    api::{self, AppState},
    assets::CloudinaryHost,
    auth::{AuthService, JwtCodec},
    config::{CloudinaryCredentials, DetectionSettings, StoreLocation, TokenSettings},
    detect::{ArtifactWriter, Detector, HttpImageFetcher, YoloModel},
    pipeline::ImagePipeline,
};
use tokio::signal::unix::{SignalKind, signal};

use crate::cli::ServeArgs;
use crate::store::{create_credential_store, persist_on_shutdown};

/// Run the glimpse server
pub async fn run(args: &ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Validate every setting before touching the network or the model.
    let token_settings = TokenSettings::new(
        args.secret_key.clone(),
        &args.algorithm,
        args.access_token_expire_minutes,
    )?;
    let credentials = CloudinaryCredentials::new(
        args.cloudinary_cloud_name.clone(),
        args.cloudinary_api_key.clone(),
        args.cloudinary_api_secret.clone(),
    )?
    .with_signature_algorithm(args.cloudinary_signature_algorithm.parse()?);
    let detection = DetectionSettings::new(
        args.model_path.clone(),
        args.confidence_threshold,
        args.iou_threshold,
        args.artifact_dir.clone(),
    )?;
    let location: StoreLocation = args.database_uri.parse()?;
    tracing::debug!(?token_settings, ?credentials, ?detection, "Loaded configuration");

    let store = create_credential_store(&location).await?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let tokens = JwtCodec::new(&token_settings, Arc::clone(&clock));
    let auth = AuthService::new(Arc::clone(&store), Arc::new(tokens));

    // Loaded once; every request shares it read-only.
    let model = YoloModel::from_settings(&detection)?;
    let detector = Detector::new(Arc::new(HttpImageFetcher::new()), Arc::new(model))
        .with_artifacts(ArtifactWriter::new(&detection.artifact_dir));
    tracing::info!(
        "Writing detection artifacts to {}",
        detection.artifact_dir.display()
    );

    let assets = CloudinaryHost::new(credentials, clock);
    let pipeline = ImagePipeline::new(Arc::new(assets), detector);

    let app = api::router(AppState::new(auth, pipeline));

    // Bind server
    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!("Listening on {local_addr}");

    println!("glimpse server started on http://localhost:{}", local_addr.port());
    println!();
    println!("Available endpoints:");
    println!("  POST /register     - Register an email and password");
    println!("  POST /signin       - Exchange credentials for a bearer token");
    println!("  GET  /me           - Email of the bearer token's owner");
    println!("  POST /image-ai     - Upload an image and detect one object");
    println!("  GET  /health       - Health check");
    println!();
    println!("Press Ctrl+C to shutdown");

    // Start server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    persist_on_shutdown(store.as_ref(), &location).await;

    println!("Server shut down");
    Ok(())
}

/// Resolve on SIGTERM or SIGINT.
async fn shutdown_signal() {
    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!("Failed to install signal handlers ({e}), falling back to Ctrl+C");
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {e}");
                }
                return;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, initiating graceful shutdown..."),
        _ = sigint.recv() => tracing::info!("Received SIGINT, initiating graceful shutdown..."),
    }
}
