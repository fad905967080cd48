//! CLI argument definitions for the glimpse binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sign-in and single-object image detection server
#[derive(Parser, Debug)]
#[command(name = "glimpse")]
#[command(about = "glimpse: account sign-in and single-object image detection")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the glimpse server
    Serve(Box<ServeArgs>),
    /// Check health of a running glimpse server
    Health(HealthArgs),
}

/// Arguments for the serve command
#[derive(clap::Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value_t = 8000, env = "GLIMPSE_PORT")]
    pub port: u16,

    /// Bind address
    #[arg(long, default_value = "0.0.0.0", env = "GLIMPSE_HOST")]
    pub host: String,

    /// Credential store URI: memory:, json:<path>, sqlite:<path> or postgres://...
    #[arg(long, env = "DATABASE_URI", hide_env_values = true)]
    pub database_uri: String,

    /// Token signing secret
    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: String,

    /// Token signing algorithm (HS256, HS384 or HS512)
    #[arg(long, env = "ALGORITHM")]
    pub algorithm: String,

    /// Token lifetime in minutes
    #[arg(long, env = "ACCESS_TOKEN_EXPIRE_MINUTES")]
    pub access_token_expire_minutes: i64,

    /// Cloudinary cloud name
    #[arg(long, env = "CLOUDINARY_CLOUD_NAME")]
    pub cloudinary_cloud_name: String,

    /// Cloudinary API key
    #[arg(long, env = "CLOUDINARY_API_KEY", hide_env_values = true)]
    pub cloudinary_api_key: String,

    /// Cloudinary API secret
    #[arg(long, env = "CLOUDINARY_API_SECRET", hide_env_values = true)]
    pub cloudinary_api_secret: String,

    /// Digest Cloudinary expects for request signatures (sha1 or sha256)
    #[arg(long, default_value = "sha1", env = "CLOUDINARY_SIGNATURE_ALGORITHM")]
    pub cloudinary_signature_algorithm: String,

    /// Path of the detection model (.rten)
    #[arg(long, env = "MODEL_PATH")]
    pub model_path: PathBuf,

    /// Directory for annotated and cropped debug images
    #[arg(long, env = "GLIMPSE_ARTIFACT_DIR")]
    pub artifact_dir: Option<PathBuf>,

    /// Minimum detection score
    #[arg(long, default_value_t = 0.25, env = "GLIMPSE_CONFIDENCE_THRESHOLD")]
    pub confidence_threshold: f32,

    /// Overlap above which weaker boxes of the same class are suppressed
    #[arg(long, default_value_t = 0.45, env = "GLIMPSE_IOU_THRESHOLD")]
    pub iou_threshold: f32,
}

/// Arguments for the health command
#[derive(clap::Args, Debug)]
pub struct HealthArgs {
    /// Base URL of the server to check
    #[arg(long, default_value = "http://127.0.0.1:8000", env = "GLIMPSE_URL")]
    pub url: String,

    /// Timeout in seconds
    #[arg(short, long, default_value_t = 5)]
    pub timeout: u64,
}
