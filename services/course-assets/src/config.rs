use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the course asset service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// S3 configuration
    pub s3: S3Config,
    /// Upload batch configuration
    #[serde(default)]
    pub upload: UploadConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Prometheus exporter port, disabled when unset
    pub metrics_port: Option<u16>,
}

/// S3 storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// S3 bucket name for course assets
    pub bucket: String,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Multipart upload threshold in bytes (8MB default)
    #[serde(default = "default_multipart_threshold")]
    pub multipart_threshold_bytes: usize,
    /// Part size for multipart uploads in bytes (8MB default)
    #[serde(default = "default_part_size")]
    pub part_size_bytes: usize,
    /// Attempts per request made by the SDK retry policy
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

/// Upload batch configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Key prefix for course thumbnails
    #[serde(default = "default_thumbnail_prefix")]
    pub thumbnail_prefix: String,
    /// Key prefix for lesson videos
    #[serde(default = "default_lesson_prefix")]
    pub lesson_prefix: String,
    /// Delete objects uploaded earlier in a create batch that aborted
    #[serde(default)]
    pub cleanup_orphans_on_abort: bool,
    /// Per-upload timeout in seconds, none when unset
    pub timeout_secs: Option<u64>,
}

// Default value functions
fn default_service_name() -> String {
    "course-assets".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_multipart_threshold() -> usize {
    8 * 1024 * 1024 // 8MB
}

fn default_part_size() -> usize {
    8 * 1024 * 1024 // 8MB
}

fn default_max_attempts() -> u32 {
    3
}

fn default_thumbnail_prefix() -> String {
    "courseThumbnail".to_string()
}

fn default_lesson_prefix() -> String {
    "courses".to_string()
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("service.name", "course-assets")?
            .set_default("service.log_level", "info")?
            .add_source(config::File::with_name("config/course-assets").required(false))
            .add_source(config::File::with_name("/etc/course-assets/config").required(false))
            // ASSETS__S3__BUCKET -> s3.bucket
            .add_source(
                config::Environment::with_prefix("ASSETS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }
}

impl UploadConfig {
    /// Get the per-upload timeout as Duration
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: None,
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            thumbnail_prefix: default_thumbnail_prefix(),
            lesson_prefix: default_lesson_prefix(),
            cleanup_orphans_on_abort: false,
            timeout_secs: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let upload = UploadConfig::default();
        assert_eq!(upload.thumbnail_prefix, "courseThumbnail");
        assert_eq!(upload.lesson_prefix, "courses");
        assert!(!upload.cleanup_orphans_on_abort);
        assert_eq!(upload.timeout(), None);
        assert_eq!(default_max_attempts(), 3);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "s3": { "bucket": "course-assets" },
            "upload": { "timeout_secs": 30 }
        }))
        .unwrap();

        assert_eq!(config.s3.bucket, "course-assets");
        assert_eq!(config.s3.region, "us-east-1");
        assert_eq!(config.s3.multipart_threshold_bytes, 8 * 1024 * 1024);
        assert_eq!(config.service.name, "course-assets");
        assert_eq!(config.upload.lesson_prefix, "courses");
        assert_eq!(config.upload.timeout(), Some(Duration::from_secs(30)));
    }
}
