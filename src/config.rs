//! Configuration types for chapter conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Callers set only what differs from the
//! defaults, which match the layout of a manuscript checkout:
//!
//! ```text
//! input/metadata.json
//! input/latex_files/Chapter_<n>/Section_<n.m>.tex
//! input/latex_files/Chapter_<n>/images/
//! output/
//! ```

use crate::error::Tex2DocxError;
use crate::progress::ProgressCallback;
use crate::style::StyleSheet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Configuration for a conversion run.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use tex2docx::{ChapterSelection, ConversionConfig};
///
/// let config = ConversionConfig::builder()
///     .latex_root("manuscript/tex")
///     .output_dir("build")
///     .chapters(ChapterSelection::Single(2))
///     .build()
///     .unwrap();
/// assert_eq!(config.output_dir.to_str(), Some("build"));
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Book metadata JSON. Default: `input/metadata.json`.
    pub metadata_path: PathBuf,

    /// Directory holding one `Chapter_<n>` directory per chapter.
    /// Default: `input/latex_files`.
    pub latex_root: PathBuf,

    /// Where `C<NN>_<Title>.tex` and `.docx` are written. Default: `output`.
    pub output_dir: PathBuf,

    /// Image subdirectory inside each chapter directory. Default: `images`.
    pub images_subdir: String,

    /// Pandoc executable. If None, `$PANDOC` or `pandoc` on the `PATH`.
    pub pandoc: Option<PathBuf>,

    /// Chapters to convert. Default: all of them.
    pub chapters: ChapterSelection,

    /// Run the style post-processor on compiled documents. Default: true.
    ///
    /// With styling off the document is exactly what pandoc produced.
    pub apply_styles: bool,

    /// Publisher style table, page layout and colors.
    pub style_sheet: StyleSheet,

    /// Optional per-chapter/per-section progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            metadata_path: PathBuf::from("input/metadata.json"),
            latex_root: PathBuf::from("input/latex_files"),
            output_dir: PathBuf::from("output"),
            images_subdir: "images".to_string(),
            pandoc: None,
            chapters: ChapterSelection::default(),
            apply_styles: true,
            style_sheet: StyleSheet::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("metadata_path", &self.metadata_path)
            .field("latex_root", &self.latex_root)
            .field("output_dir", &self.output_dir)
            .field("images_subdir", &self.images_subdir)
            .field("pandoc", &self.pandoc)
            .field("chapters", &self.chapters)
            .field("apply_styles", &self.apply_styles)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn metadata_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.metadata_path = path.into();
        self
    }

    pub fn latex_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.latex_root = path.into();
        self
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_dir = path.into();
        self
    }

    pub fn images_subdir(mut self, name: impl Into<String>) -> Self {
        self.config.images_subdir = name.into();
        self
    }

    pub fn pandoc(mut self, program: impl Into<PathBuf>) -> Self {
        self.config.pandoc = Some(program.into());
        self
    }

    pub fn chapters(mut self, selection: ChapterSelection) -> Self {
        self.config.chapters = selection;
        self
    }

    pub fn apply_styles(mut self, v: bool) -> Self {
        self.config.apply_styles = v;
        self
    }

    pub fn style_sheet(mut self, sheet: StyleSheet) -> Self {
        self.config.style_sheet = sheet;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Tex2DocxError> {
        let c = &self.config;
        for (name, path) in [
            ("metadata path", &c.metadata_path),
            ("LaTeX root", &c.latex_root),
            ("output directory", &c.output_dir),
        ] {
            if path.as_os_str().is_empty() {
                return Err(Tex2DocxError::InvalidConfig(format!(
                    "{name} must not be empty"
                )));
            }
        }
        if c.images_subdir.trim().is_empty() {
            return Err(Tex2DocxError::InvalidConfig(
                "images subdirectory must not be empty".into(),
            ));
        }
        let page = &c.style_sheet.page;
        if page.width_mm <= 0.0 || page.height_mm <= 0.0 {
            return Err(Tex2DocxError::InvalidConfig(format!(
                "page size must be positive, got {}×{} mm",
                page.width_mm, page.height_mm
            )));
        }
        let margin_mm = page.margin_in * 25.4;
        if page.margin_in < 0.0 || 2.0 * margin_mm >= page.width_mm.min(page.height_mm) {
            return Err(Tex2DocxError::InvalidConfig(format!(
                "margin of {} in leaves no room on a {}×{} mm page",
                page.margin_in, page.width_mm, page.height_mm
            )));
        }
        if let ChapterSelection::Single(0) = c.chapters {
            return Err(Tex2DocxError::InvalidConfig(
                "chapter numbers start at 1".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Which chapters of the book to convert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChapterSelection {
    /// Every chapter in metadata order (default).
    #[default]
    All,
    /// One chapter by number.
    Single(u32),
}

impl ChapterSelection {
    pub fn includes(&self, number: u32) -> bool {
        match self {
            ChapterSelection::All => true,
            ChapterSelection::Single(n) => *n == number,
        }
    }
}
