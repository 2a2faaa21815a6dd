//! Result types returned by the conversion entry points.
//!
//! Everything here is `Serialize` so the CLI can print a run summary with
//! `--json` and library callers can persist it.

use crate::error::StyleWarning;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What normalization did to one section file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionReport {
    /// Dotted section number, e.g. `"1.2"`.
    pub number: String,
    pub title: String,
    /// Source file the section was read from.
    pub source: PathBuf,
    /// Characters in the normalized text.
    pub chars: usize,
    /// Graphic references rewritten to an indexed image.
    pub resolved_images: usize,
    /// Figure blocks replaced by a figure-detail annotation.
    pub missing_images: Vec<String>,
    /// Bibliography entries moved into the chapter bibliography.
    pub references_extracted: usize,
}

/// What the style post-processor did to one compiled document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleReport {
    /// Named styles rewritten from the style sheet.
    pub applied_styles: Vec<String>,
    /// Patches that could not be applied.
    pub warnings: Vec<StyleWarning>,
    pub removed_duplicate_heading: bool,
    pub promoted_conclusion: bool,
    /// Headings whose text or run formatting was rewritten.
    pub fixed_headings: usize,
    /// Graphic and caption paragraphs centered.
    pub centered_images: usize,
    /// Figure-detail annotations recolored.
    pub recolored_annotations: usize,
}

impl StyleReport {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Output of one chapter conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterOutput {
    pub number: u32,
    pub title: String,
    /// Assembled source kept next to the document for debugging.
    pub tex_path: PathBuf,
    pub docx_path: PathBuf,
    pub sections: Vec<SectionReport>,
    /// Entries in the consolidated bibliography.
    pub references: usize,
    /// `None` when styling was disabled.
    pub style: Option<StyleReport>,
    pub stats: ChapterStats,
}

/// Timing for one chapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterStats {
    pub normalize_duration_ms: u64,
    pub compile_duration_ms: u64,
    pub style_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Output of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub book_title: String,
    pub chapters: Vec<ChapterOutput>,
    pub stats: ConversionStats,
}

/// Totals across every converted chapter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversionStats {
    pub chapters: usize,
    pub sections: usize,
    pub resolved_images: usize,
    pub missing_images: usize,
    pub references: usize,
    pub style_warnings: usize,
    pub total_duration_ms: u64,
}

impl ConversionStats {
    /// Sum up chapter results.
    pub fn from_chapters(chapters: &[ChapterOutput], total_duration_ms: u64) -> Self {
        let sections = chapters.iter().flat_map(|c| &c.sections);
        let (resolved, missing) = sections.fold((0, 0), |(r, m), s| {
            (r + s.resolved_images, m + s.missing_images.len())
        });
        Self {
            chapters: chapters.len(),
            sections: chapters.iter().map(|c| c.sections.len()).sum(),
            resolved_images: resolved,
            missing_images: missing,
            references: chapters.iter().map(|c| c.references).sum(),
            style_warnings: chapters
                .iter()
                .filter_map(|c| c.style.as_ref())
                .map(|s| s.warnings.len())
                .sum(),
            total_duration_ms,
        }
    }
}
