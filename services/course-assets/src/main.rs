use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use course_assets::{
    Config, CourseAssetUploader, CourseDraft, HydrateScope, S3ObjectStore, UploadError,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Upload the local assets of a course draft to object storage
#[derive(Parser)]
#[command(name = "course-assets", version)]
struct Cli {
    /// Directory relative file paths are resolved against
    /// (defaults to the course file's directory)
    #[arg(long)]
    base_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload every asset of a new course; any failure aborts
    Create {
        /// Course draft JSON file
        course: PathBuf,
    },
    /// Upload the assets changed in an edit session
    Edit {
        /// Course draft JSON file
        course: PathBuf,
    },
}

// Exit code for an edit batch where some items failed
const EXIT_PARTIAL_FAILURE: u8 = 2;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(service = %config.service.name, "Starting course asset upload");

    if let Some(port) = config.service.metrics_port {
        init_metrics(port)?;
    }

    let store = Arc::new(S3ObjectStore::new(&config.s3).await);
    info!(bucket = %store.bucket(), "Using S3 bucket for course assets");
    let uploader = CourseAssetUploader::new(store, config.upload.clone());

    match cli.command {
        Command::Create { course } => {
            let draft = read_course(&course, cli.base_dir.as_deref(), HydrateScope::All)?;
            match uploader.upload_new_course_assets(draft).await {
                Ok(revised) => {
                    print_json(&revised)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(e) => {
                    if let UploadError::Aborted { orphaned_keys, .. } = &e {
                        if !orphaned_keys.is_empty() {
                            error!(orphaned_keys = ?orphaned_keys, "Objects need manual cleanup");
                        }
                    }
                    Err(e).context("Course asset upload failed")
                }
            }
        }
        Command::Edit { course } => {
            let draft = read_course(&course, cli.base_dir.as_deref(), HydrateScope::EditedOnly)?;
            let report = uploader.upload_edited_course_assets(draft).await;
            print_json(&report)?;

            if report.has_failures() {
                Ok(ExitCode::from(EXIT_PARTIAL_FAILURE))
            } else {
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

/// Read a course draft and load the local files the operation will upload
fn read_course(path: &Path, base_dir: Option<&Path>, scope: HydrateScope) -> Result<CourseDraft> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read course file {}", path.display()))?;
    let mut course = CourseDraft::from_json(&bytes)?;

    let base_dir = base_dir
        .or_else(|| path.parent())
        .unwrap_or_else(|| Path::new("."));
    // Unreadable files surface as missing assets for their slot
    course.hydrate(base_dir, scope);

    Ok(course)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", json);
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();
}

/// Initialize Prometheus metrics exporter
fn init_metrics(port: u16) -> Result<()> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus metrics exporter")?;

    info!(port = port, "Prometheus metrics exporter started");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_edit_command() {
        let cli = Cli::parse_from(["course-assets", "--base-dir", "/tmp/uploads", "edit", "draft.json"]);
        assert_eq!(cli.base_dir, Some(PathBuf::from("/tmp/uploads")));
        assert!(matches!(cli.command, Command::Edit { ref course } if course == Path::new("draft.json")));
    }
}
