//! Storage key derivation.
//!
//! Keys have the form `<prefix>/<stem>_<unixMillis>`, where the stem is the
//! slug of a title. With the default prefixes:
//!
//! ```text
//! courseThumbnail/thumbnail_<slug(course title)>_<unixMillis>
//! courses/<slug(lesson title)>_<unixMillis>
//! ```

use crate::config::UploadConfig;
use std::collections::HashSet;

/// Source of wall-clock time for keys
pub trait Clock: Send + Sync {
    /// Milliseconds since the unix epoch
    fn now_millis(&self) -> i64;
}

/// Clock backed by the system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Lower-case the trimmed title and replace everything outside `[a-z0-9]` with `_`
pub fn slug(title: &str) -> String {
    title
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' => c,
            _ => '_',
        })
        .collect()
}

/// Issues keys for one upload batch, never handing out the same key twice
pub struct KeyGenerator<'a> {
    config: &'a UploadConfig,
    clock: &'a dyn Clock,
    issued: HashSet<String>,
}

impl<'a> KeyGenerator<'a> {
    pub fn new(config: &'a UploadConfig, clock: &'a dyn Clock) -> Self {
        Self {
            config,
            clock,
            issued: HashSet::new(),
        }
    }

    /// Key for a course thumbnail, derived from the course title
    pub fn thumbnail_key(&mut self, course_title: &str) -> String {
        let base = format!(
            "{}/thumbnail_{}_{}",
            self.config.thumbnail_prefix,
            slug(course_title),
            self.clock.now_millis()
        );
        self.claim(base)
    }

    /// Key for a lesson video, derived from the lesson title
    pub fn lesson_key(&mut self, lesson_title: &str) -> String {
        let base = format!(
            "{}/{}_{}",
            self.config.lesson_prefix,
            slug(lesson_title),
            self.clock.now_millis()
        );
        self.claim(base)
    }

    // Same title within the same millisecond gets a `_<n>` suffix.
    fn claim(&mut self, base: String) -> String {
        let mut key = base.clone();
        let mut n = 1;
        while self.issued.contains(&key) {
            key = format!("{}_{}", base, n);
            n += 1;
        }
        self.issued.insert(key.clone());
        key
    }
}
