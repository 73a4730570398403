//! Course Asset Service
//!
//! Uploads the assets of an e-learning course draft to object storage. A
//! course create or edit form hands over a [`CourseDraft`] whose thumbnail and
//! lesson videos may still be local files. The uploader stores each one under a
//! deterministic key and returns the draft with those references replaced by
//! stored keys.
//!
//! ## Features
//!
//! - **Create path**: every asset is required, the first failure aborts the
//!   batch and reports the objects it left behind
//! - **Edit path**: only assets changed in the edit session are uploaded, and
//!   failures are isolated per item and returned in an [`EditReport`]
//! - **Deterministic keys**: `courseThumbnail/thumbnail_<slug>_<millis>` and
//!   `courses/<slug>_<millis>`, disambiguated within a batch
//! - **S3 storage**: single-part or multipart uploads depending on size
//!
//! ## Architecture
//!
//! ```text
//! Course draft (JSON)          Uploader                   S3 Bucket
//! ┌──────────────┐           ┌──────────────┐          ┌──────────────────┐
//! │ thumbnail    │──────────▶│ Key          │          │ courseThumbnail/ │
//! │ lessons[]    │           │ Generator    │          │ courses/         │
//! └──────────────┘           └──────────────┘          └──────────────────┘
//!        ▲                          │                           ▲
//!        │                          ▼                           │
//!        │                   ┌──────────────┐          ┌──────────────────┐
//!        └───────────────────│ Course Asset │─────────▶│ Object Store     │
//!          revised draft     │ Uploader     │          │ (S3)             │
//!                            └──────────────┘          └──────────────────┘
//! ```

pub mod config;
pub mod course;
pub mod error;
pub mod keys;
pub mod s3;
pub mod storage;
pub mod uploader;

pub use config::{Config, S3Config, UploadConfig};
pub use course::{
    AssetRef, AssetSlot, CourseDraft, HydrateScope, LessonDraft, LocalFile, MediaCategory,
};
pub use error::{AssetError, UploadError};
pub use keys::{slug, Clock, SystemClock};
pub use s3::S3ObjectStore;
pub use storage::{ObjectStore, StorageError};
pub use uploader::{BatchState, CourseAssetUploader, EditReport, ItemOutcome, ItemReport};
