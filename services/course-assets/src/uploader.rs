//! Batch upload of course assets.
//!
//! Both operations walk the course in a fixed order, thumbnail first and then
//! lessons by index, awaiting one upload at a time:
//!
//! ```text
//! Idle -> UploadingThumbnail -> UploadingLessons(0) .. UploadingLessons(n-1) -> Done
//!                  \___________________ first error (create) ___________________-> Aborted
//! ```
//!
//! The create path aborts on the first failing item. The edit path records the
//! failure in its [`EditReport`] and moves on to the next item.

use crate::config::UploadConfig;
use crate::course::{AssetRef, AssetSlot, CourseDraft, LocalFile, MediaCategory};
use crate::error::{AssetError, UploadError};
use crate::keys::{Clock, KeyGenerator, SystemClock};
use crate::storage::{ObjectStore, StorageError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Progress of a single upload call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "lesson")]
pub enum BatchState {
    Idle,
    UploadingThumbnail,
    UploadingLessons(usize),
    Done,
    Aborted,
}

/// Outcome of one attempted asset on the edit path
#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum ItemOutcome {
    Uploaded { key: String },
    Failed { reason: String },
}

/// Report entry for one attempted asset
#[derive(Debug, Serialize)]
pub struct ItemReport {
    #[serde(flatten)]
    pub slot: AssetSlot,
    pub outcome: ItemOutcome,
    #[serde(skip)]
    pub error: Option<AssetError>,
}

/// Result of an edit-path upload
#[derive(Debug, Serialize)]
pub struct EditReport {
    pub course: CourseDraft,
    /// One entry per attempted asset, in upload order
    pub items: Vec<ItemReport>,
    pub state: BatchState,
}

impl EditReport {
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ItemReport> {
        self.items
            .iter()
            .filter(|item| matches!(item.outcome, ItemOutcome::Failed { .. }))
    }
}

struct Batch<'a> {
    id: Uuid,
    state: BatchState,
    keys: KeyGenerator<'a>,
    uploaded: Vec<String>,
}

impl<'a> Batch<'a> {
    fn new(config: &'a UploadConfig, clock: &'a dyn Clock) -> Self {
        Self {
            id: Uuid::new_v4(),
            state: BatchState::Idle,
            keys: KeyGenerator::new(config, clock),
            uploaded: Vec::new(),
        }
    }

    fn transition(&mut self, next: BatchState) {
        debug!(batch_id = %self.id, from = ?self.state, to = ?next, "Batch state change");
        self.state = next;
    }
}

/// Uploads the pending assets of a course draft to object storage
pub struct CourseAssetUploader<S: ObjectStore> {
    store: Arc<S>,
    config: UploadConfig,
    clock: Arc<dyn Clock>,
}

impl<S: ObjectStore> CourseAssetUploader<S> {
    pub fn new(store: Arc<S>, config: UploadConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, config: UploadConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Upload every asset of a new course.
    ///
    /// The thumbnail and every lesson video must be local files of the right
    /// kind. The first failure aborts the call. Objects stored before the
    /// failure are reported in [`UploadError::Aborted`].
    #[instrument(skip(self, course), fields(title = %course.basic_details.title, lessons = course.course_content.lessons.len()))]
    pub async fn upload_new_course_assets(
        &self,
        mut course: CourseDraft,
    ) -> Result<CourseDraft, UploadError> {
        let mut batch = Batch::new(&self.config, self.clock.as_ref());
        info!(batch_id = %batch.id, "Uploading new course assets");

        match self.upload_all(&mut course, &mut batch).await {
            Ok(()) => {
                batch.transition(BatchState::Done);
                info!(
                    batch_id = %batch.id,
                    uploaded = batch.uploaded.len(),
                    "Course assets uploaded"
                );
                Ok(course)
            }
            Err(source) => {
                batch.transition(BatchState::Aborted);
                error!(batch_id = %batch.id, error = %source, "Course asset upload aborted");
                metrics::counter!("course_assets.batches.aborted").increment(1);

                let orphaned_keys = self.handle_orphans(batch.uploaded).await;
                Err(UploadError::Aborted {
                    source,
                    orphaned_keys,
                })
            }
        }
    }

    async fn upload_all(
        &self,
        course: &mut CourseDraft,
        batch: &mut Batch<'_>,
    ) -> Result<(), AssetError> {
        batch.transition(BatchState::UploadingThumbnail);
        let slot = AssetSlot::Thumbnail;
        let thumbnail = required_local(
            course.basic_details.thumbnail.as_ref(),
            slot,
            MediaCategory::Image,
        )?;
        require_title(&course.basic_details.title, slot)?;
        let key = batch.keys.thumbnail_key(&course.basic_details.title);
        self.store_tracked(batch, slot, &key, thumbnail).await?;
        course.basic_details.thumbnail = Some(AssetRef::Stored(key));

        let lessons = std::mem::take(&mut course.course_content.lessons);
        let mut revised = Vec::with_capacity(lessons.len());

        for (index, mut lesson) in lessons.into_iter().enumerate() {
            batch.transition(BatchState::UploadingLessons(index));
            let slot = AssetSlot::Lesson(index);

            let video = required_local(lesson.video_url.as_ref(), slot, MediaCategory::Video)?;
            let key = batch.keys.lesson_key(&lesson.title);
            self.store_tracked(batch, slot, &key, video).await?;

            lesson.video_url = Some(AssetRef::Stored(key));
            revised.push(lesson);
        }

        course.course_content.lessons = revised;
        Ok(())
    }

    /// Store a file and remember its key for orphan handling. A timed-out
    /// upload is remembered too since the object may have landed anyway.
    async fn store_tracked(
        &self,
        batch: &mut Batch<'_>,
        slot: AssetSlot,
        key: &str,
        file: &LocalFile,
    ) -> Result<(), AssetError> {
        match self.store_file(slot, key, file).await {
            Ok(()) => {
                batch.uploaded.push(key.to_string());
                Ok(())
            }
            Err(e) => {
                if e.may_have_stored() {
                    warn!(batch_id = %batch.id, key = %key, "Upload timed out, object may exist");
                    batch.uploaded.push(key.to_string());
                }
                Err(e)
            }
        }
    }

    /// Upload the assets changed during an edit session.
    ///
    /// Only a local thumbnail and lessons carrying a video preview are
    /// uploaded. A failing item is logged, left unchanged and recorded in the
    /// report, and the remaining items are still processed.
    #[instrument(skip(self, course), fields(title = %course.basic_details.title, lessons = course.course_content.lessons.len()))]
    pub async fn upload_edited_course_assets(&self, mut course: CourseDraft) -> EditReport {
        let mut batch = Batch::new(&self.config, self.clock.as_ref());
        let mut items = Vec::new();
        info!(batch_id = %batch.id, "Uploading edited course assets");

        batch.transition(BatchState::UploadingThumbnail);
        if let Some(AssetRef::Local(file)) = course.basic_details.thumbnail.as_ref() {
            let slot = AssetSlot::Thumbnail;
            let title = &course.basic_details.title;
            let result = match check_local(file, slot, MediaCategory::Image)
                .and_then(|()| require_title(title, slot))
            {
                Ok(()) => {
                    let key = batch.keys.thumbnail_key(title);
                    self.store_file(slot, &key, file).await.map(|()| key)
                }
                Err(e) => Err(e),
            };

            if let Ok(key) = &result {
                course.basic_details.thumbnail = Some(AssetRef::Stored(key.clone()));
            }
            items.push(record(&batch, slot, result));
        }

        for (index, lesson) in course.course_content.lessons.iter_mut().enumerate() {
            if lesson.video_preview.is_none() {
                continue;
            }
            batch.transition(BatchState::UploadingLessons(index));
            let slot = AssetSlot::Lesson(index);

            let result = match required_local(lesson.video_url.as_ref(), slot, MediaCategory::Video)
            {
                Ok(video) => {
                    let key = batch.keys.lesson_key(&lesson.title);
                    self.store_file(slot, &key, video).await.map(|()| key)
                }
                Err(e) => Err(e),
            };

            if let Ok(key) = &result {
                lesson.video_url = Some(AssetRef::Stored(key.clone()));
                lesson.video_preview = None;
            }
            items.push(record(&batch, slot, result));
        }

        batch.transition(BatchState::Done);
        let report = EditReport {
            course,
            items,
            state: batch.state,
        };

        let failed = report.failures().count();
        if failed > 0 {
            warn!(
                batch_id = %batch.id,
                attempted = report.items.len(),
                failed,
                "Edited course assets uploaded with failures"
            );
        } else {
            info!(
                batch_id = %batch.id,
                attempted = report.items.len(),
                "Edited course assets uploaded"
            );
        }

        report
    }

    async fn store_file(
        &self,
        slot: AssetSlot,
        key: &str,
        file: &LocalFile,
    ) -> Result<(), AssetError> {
        let content_type = file.effective_content_type();
        debug!(
            %slot,
            key = %key,
            size_bytes = file.data.len(),
            content_type = %content_type,
            "Uploading asset"
        );

        let upload = self.store.put_object(key, file.data.clone(), &content_type);
        let result = match self.config.timeout() {
            Some(limit) => match tokio::time::timeout(limit, upload).await {
                Ok(result) => result,
                Err(_) => Err(StorageError::Timeout(limit)),
            },
            None => upload.await,
        };

        match result {
            Ok(()) => {
                metrics::counter!("course_assets.uploads.succeeded").increment(1);
                info!(%slot, key = %key, size_bytes = file.data.len(), "Asset uploaded");
                Ok(())
            }
            Err(source) => {
                metrics::counter!("course_assets.uploads.failed").increment(1);
                Err(AssetError::TransportFailure {
                    slot,
                    key: key.to_string(),
                    source,
                })
            }
        }
    }

    /// Log the keys left behind by an aborted batch, deleting them when
    /// configured to. Returns the keys still in storage.
    async fn handle_orphans(&self, uploaded: Vec<String>) -> Vec<String> {
        if uploaded.is_empty() {
            return uploaded;
        }
        if !self.config.cleanup_orphans_on_abort {
            for key in &uploaded {
                warn!(key = %key, "Orphaned object left in storage");
            }
            metrics::counter!("course_assets.orphans").increment(uploaded.len() as u64);
            return uploaded;
        }

        let mut remaining = Vec::new();
        for key in uploaded {
            match self.store.delete_object(&key).await {
                Ok(()) => debug!(key = %key, "Deleted orphaned object"),
                Err(e) => {
                    warn!(key = %key, error = %e, "Orphaned object left in storage");
                    remaining.push(key);
                }
            }
        }
        metrics::counter!("course_assets.orphans").increment(remaining.len() as u64);
        remaining
    }
}

fn required_local(
    asset: Option<&AssetRef>,
    slot: AssetSlot,
    expected: MediaCategory,
) -> Result<&LocalFile, AssetError> {
    match asset {
        Some(AssetRef::Local(file)) => {
            check_local(file, slot, expected)?;
            Ok(file)
        }
        Some(AssetRef::Stored(_)) | None => Err(AssetError::MissingAsset { slot }),
    }
}

// A local handle without bytes never had its file loaded.
fn check_local(file: &LocalFile, slot: AssetSlot, expected: MediaCategory) -> Result<(), AssetError> {
    if file.data.is_empty() {
        return Err(AssetError::MissingAsset { slot });
    }
    if file.category() == expected {
        Ok(())
    } else {
        Err(AssetError::InvalidAssetType {
            slot,
            expected,
            found: file.effective_content_type(),
        })
    }
}

fn require_title(title: &str, slot: AssetSlot) -> Result<(), AssetError> {
    if title.trim().is_empty() {
        Err(AssetError::BlankTitle { slot })
    } else {
        Ok(())
    }
}

fn record(batch: &Batch<'_>, slot: AssetSlot, result: Result<String, AssetError>) -> ItemReport {
    match result {
        Ok(key) => ItemReport {
            slot,
            outcome: ItemOutcome::Uploaded { key },
            error: None,
        },
        Err(e) => {
            error!(batch_id = %batch.id, %slot, error = %e, "Asset upload failed, keeping previous value");
            ItemReport {
                slot,
                outcome: ItemOutcome::Failed {
                    reason: e.to_string(),
                },
                error: Some(e),
            }
        }
    }
}
