use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3 / MinIO bucket holding receipts and product images.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    pub allowed_extensions: Vec<String>,
    pub max_bytes: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            allowed_extensions: parse_extensions(DEFAULT_EXTENSIONS),
            max_bytes: 16 * 1024 * 1024,
        }
    }
}

const DEFAULT_EXTENSIONS: &str = "pdf,jpg,jpeg,png,webp,avif";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub max_connections: u32,
    pub jwt: JwtConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: optional("JWT_ISSUER").unwrap_or_else(|| "warranty-tracker".into()),
            audience: optional("JWT_AUDIENCE")
                .unwrap_or_else(|| "warranty-tracker-users".into()),
            ttl_minutes: parsed("JWT_TTL_MINUTES").unwrap_or(60),
            refresh_ttl_minutes: parsed("JWT_REFRESH_TTL_MINUTES").unwrap_or(60 * 24 * 14),
        };

        let storage = StorageConfig {
            endpoint: required("S3_ENDPOINT")?,
            bucket: required("S3_BUCKET")?,
            access_key: required("S3_ACCESS_KEY")?,
            secret_key: required("S3_SECRET_KEY")?,
            region: optional("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
        };

        let defaults = UploadConfig::default();
        let upload = UploadConfig {
            allowed_extensions: optional("UPLOAD_ALLOWED_EXTENSIONS")
                .map(|v| parse_extensions(&v))
                .filter(|exts| !exts.is_empty())
                .unwrap_or(defaults.allowed_extensions),
            max_bytes: parsed("UPLOAD_MAX_BYTES").unwrap_or(defaults.max_bytes),
        };

        Ok(Self {
            host: optional("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parsed("APP_PORT").unwrap_or(8080),
            database_url: required("DATABASE_URL")?,
            max_connections: parsed("DATABASE_MAX_CONNECTIONS").unwrap_or(10),
            jwt,
            storage,
            upload,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("missing environment variable {key}"))
}

fn optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    optional(key).and_then(|v| v.trim().parse::<T>().ok())
}

/// Splits a comma separated list into normalized (lowercase, no dot) extensions.
pub(crate) fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}
