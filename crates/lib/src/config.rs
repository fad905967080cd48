//! Typed configuration shared by the library and the `glimpse` binary.
//!
//! The binary reads raw values from flags or the environment; everything is
//! validated here so a bad value stops the process at startup instead of
//! surfacing on the first request.

use std::{path::PathBuf, str::FromStr};

use jsonwebtoken::Algorithm;
use thiserror::Error;

use crate::Error;

/// Errors raised while validating startup configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    #[error("Unsupported token algorithm '{value}': expected one of HS256, HS384, HS512")]
    UnsupportedAlgorithm { value: String },

    #[error("Token expiry must be at least one minute, got {minutes}")]
    InvalidExpiry { minutes: i64 },

    #[error("Unsupported signature algorithm '{value}': expected sha1 or sha256")]
    UnsupportedSignature { value: String },

    #[error("{name} must be within [0, 1], got {value}")]
    OutOfRange { name: &'static str, value: f32 },

    #[error("Unrecognized database URI '{uri}': expected memory:, json:<path>, sqlite: or postgres://")]
    UnknownStoreScheme { uri: String },
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

fn require(name: &'static str, value: String) -> Result<String, ConfigError> {
    if value.trim().is_empty() {
        Err(ConfigError::Empty { name })
    } else {
        Ok(value)
    }
}

/// Signing parameters for session tokens.
#[derive(Clone)]
pub struct TokenSettings {
    pub secret: String,
    pub algorithm: Algorithm,
    pub expiry_minutes: i64,
}

impl TokenSettings {
    /// Validate raw values. Only the symmetric HMAC family is accepted since
    /// the same secret signs and verifies.
    pub fn new(
        secret: impl Into<String>,
        algorithm: &str,
        expiry_minutes: i64,
    ) -> Result<Self, ConfigError> {
        let secret = require("SECRET_KEY", secret.into())?;
        let algorithm = match Algorithm::from_str(algorithm.trim()) {
            Ok(alg @ (Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)) => alg,
            _ => {
                return Err(ConfigError::UnsupportedAlgorithm {
                    value: algorithm.to_string(),
                });
            }
        };
        if expiry_minutes < 1 {
            return Err(ConfigError::InvalidExpiry {
                minutes: expiry_minutes,
            });
        }
        Ok(Self {
            secret,
            algorithm,
            expiry_minutes,
        })
    }

    /// Lifetime of an issued token in seconds.
    pub fn expiry_secs(&self) -> i64 {
        self.expiry_minutes * 60
    }
}

impl std::fmt::Debug for TokenSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSettings")
            .field("secret", &"***")
            .field("algorithm", &self.algorithm)
            .field("expiry_minutes", &self.expiry_minutes)
            .finish()
    }
}

/// Digest used to sign Cloudinary API requests.
///
/// Product environments sign with SHA-1 unless switched to SHA-256 in the
/// console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SignatureAlgorithm {
    #[default]
    Sha1,
    Sha256,
}

impl FromStr for SignatureAlgorithm {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(SignatureAlgorithm::Sha1),
            "sha256" => Ok(SignatureAlgorithm::Sha256),
            _ => Err(ConfigError::UnsupportedSignature {
                value: value.to_string(),
            }),
        }
    }
}

/// Credentials for the Cloudinary asset host.
#[derive(Clone)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    pub signature_algorithm: SignatureAlgorithm,
}

impl CloudinaryCredentials {
    pub fn new(
        cloud_name: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            cloud_name: require("CLOUDINARY_CLOUD_NAME", cloud_name.into())?,
            api_key: require("CLOUDINARY_API_KEY", api_key.into())?,
            api_secret: require("CLOUDINARY_API_SECRET", api_secret.into())?,
            signature_algorithm: SignatureAlgorithm::default(),
        })
    }

    pub fn with_signature_algorithm(mut self, algorithm: SignatureAlgorithm) -> Self {
        self.signature_algorithm = algorithm;
        self
    }
}

impl std::fmt::Debug for CloudinaryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudinaryCredentials")
            .field("cloud_name", &self.cloud_name)
            .field("api_key", &"***")
            .field("api_secret", &"***")
            .field("signature_algorithm", &self.signature_algorithm)
            .finish()
    }
}

/// Detection model settings.
#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub model_path: PathBuf,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub artifact_dir: PathBuf,
}

impl DetectionSettings {
    pub fn new(
        model_path: PathBuf,
        confidence_threshold: f32,
        iou_threshold: f32,
        artifact_dir: Option<PathBuf>,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("confidence threshold", confidence_threshold),
            ("IoU threshold", iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { name, value });
            }
        }
        Ok(Self {
            model_path,
            confidence_threshold,
            iou_threshold,
            artifact_dir: artifact_dir
                .unwrap_or_else(|| std::env::temp_dir().join("glimpse-artifacts")),
        })
    }
}

/// Where identities live, parsed from the database URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    /// Ephemeral in-process map.
    Memory,
    /// In-process map loaded from and saved to a JSON file.
    JsonFile(PathBuf),
    /// SQLite connection URL, passed to sqlx unchanged.
    Sqlite(String),
    /// PostgreSQL connection URL, passed to sqlx unchanged.
    Postgres(String),
}

impl FromStr for StoreLocation {
    type Err = ConfigError;

    fn from_str(uri: &str) -> Result<Self, Self::Err> {
        let uri = uri.trim();
        if uri == "memory" || uri == "memory:" {
            Ok(StoreLocation::Memory)
        } else if let Some(path) = uri.strip_prefix("json:") {
            let path = require("json store path", path.to_string())?;
            Ok(StoreLocation::JsonFile(PathBuf::from(path)))
        } else if uri.starts_with("sqlite:") {
            Ok(StoreLocation::Sqlite(uri.to_string()))
        } else if uri.starts_with("postgres://") || uri.starts_with("postgresql://") {
            Ok(StoreLocation::Postgres(uri.to_string()))
        } else {
            Err(ConfigError::UnknownStoreScheme {
                uri: redact_uri(uri),
            })
        }
    }
}

/// Redact credentials from a connection URI for safe logging.
pub fn redact_uri(uri: &str) -> String {
    match url::Url::parse(uri) {
        Ok(parsed) => {
            let mut redacted = parsed.clone();
            if !parsed.username().is_empty() {
                let _ = redacted.set_username("***");
            }
            if parsed.password().is_some() {
                let _ = redacted.set_password(Some("***"));
            }
            redacted.to_string()
        }
        Err(_) => "<unparsable-uri>".to_string(),
    }
}
