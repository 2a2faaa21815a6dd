//! Progress-callback trait for per-chapter and per-section events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the pipeline works through the book. The CLI drives its
//! progress bar from these; library callers can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use tex2docx::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     sections: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_section_complete(&self, chapter: u32, section: &str, chars: usize) {
//!         self.sections.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Chapter {chapter}: section {section} done ({chars} chars)");
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback {
//!     sections: AtomicUsize::new(0),
//! });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the conversion pipeline as it processes each chapter.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Chapters are converted one at a time, but the trait
/// is `Send + Sync` so a callback can be shared with other threads.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before the first chapter.
    ///
    /// # Arguments
    /// * `total_chapters` — number of chapters selected for conversion
    fn on_conversion_start(&self, total_chapters: usize) {
        let _ = total_chapters;
    }

    /// Called when a chapter starts.
    ///
    /// # Arguments
    /// * `chapter`        — chapter number
    /// * `total_sections` — sections the chapter will normalize
    fn on_chapter_start(&self, chapter: u32, total_sections: usize) {
        let _ = (chapter, total_sections);
    }

    /// Called after a section has been normalized.
    ///
    /// # Arguments
    /// * `chapter` — chapter number
    /// * `section` — dotted section number
    /// * `chars`   — characters in the normalized text
    fn on_section_complete(&self, chapter: u32, section: &str, chars: usize) {
        let _ = (chapter, section, chars);
    }

    /// Called when the external compiler is about to run for a chapter.
    fn on_compile_start(&self, chapter: u32) {
        let _ = chapter;
    }

    /// Called when a chapter's document has been written.
    ///
    /// # Arguments
    /// * `chapter`        — chapter number
    /// * `style_warnings` — non-fatal style problems recorded for it
    fn on_chapter_complete(&self, chapter: u32, style_warnings: usize) {
        let _ = (chapter, style_warnings);
    }

    /// Called when a chapter aborts. The run stops after this.
    fn on_chapter_error(&self, chapter: u32, error: &str) {
        let _ = (chapter, error);
    }

    /// Called once after the last chapter succeeded.
    fn on_conversion_complete(&self, total_chapters: usize) {
        let _ = total_chapters;
    }
}

/// A no-op implementation for callers that don't need progress events.
///
/// This is the default when no callback is configured.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
