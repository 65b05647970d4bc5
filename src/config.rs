use anyhow::{Context, Result};
use clap::Parser;
use std::{env, time::Duration};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Bound on every object-store call.
    pub remote_timeout: Duration,
    /// `None` when no bucket is set; the service then runs metadata-only.
    pub s3: Option<S3Settings>,
}

/// Connection settings for the S3-compatible object store.
#[derive(Clone)]
pub struct S3Settings {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for non-AWS stores (MinIO, R2, ...).
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl std::fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Settings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<set>"))
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Folder tree and multipart upload metadata service")]
pub struct Args {
    /// Host to bind to (overrides DRIVE_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides DRIVE_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides DRIVE_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Object store bucket (overrides S3_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Timeout for object-store calls in seconds (overrides DRIVE_STORE_REMOTE_TIMEOUT_SECS)
    #[arg(long)]
    pub remote_timeout_secs: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let cfg = Self::merge(args.host, args.port, args.database_url, args.bucket, args.remote_timeout_secs)?;
        Ok((cfg, args.migrate))
    }

    fn merge(
        host: Option<String>,
        port: Option<u16>,
        database_url: Option<String>,
        bucket: Option<String>,
        remote_timeout_secs: Option<u64>,
    ) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("DRIVE_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("DRIVE_STORE_PORT", 3000u16)?;
        let env_db = env::var("DRIVE_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/drive_store.db".into());
        let env_timeout = parse_env("DRIVE_STORE_REMOTE_TIMEOUT_SECS", 30u64)?;

        let bucket = bucket
            .or_else(|| env::var("S3_BUCKET").ok())
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty());
        let s3 = bucket.map(|bucket| S3Settings {
            bucket,
            region: non_empty_env("S3_REGION").unwrap_or_else(|| "us-east-1".into()),
            endpoint: non_empty_env("S3_ENDPOINT"),
            access_key_id: non_empty_env("S3_ACCESS_KEY_ID"),
            secret_access_key: non_empty_env("S3_SECRET_ACCESS_KEY"),
        });

        // --- Merge ---
        Ok(Self {
            host: host.unwrap_or(env_host),
            port: port.unwrap_or(env_port),
            database_url: database_url.unwrap_or(env_db),
            remote_timeout: Duration::from_secs(remote_timeout_secs.unwrap_or(env_timeout)),
            s3,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}
