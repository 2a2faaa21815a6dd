//! # tex2docx
//!
//! Assemble a book chapter written as one LaTeX file per section into a
//! single publisher-styled DOCX document.
//!
//! ## Why this crate?
//!
//! Pandoc turns LaTeX into DOCX well, but a manuscript assembled from many
//! section files is not ready for it: figure paths point at files that were
//! renamed, citations reference a bibliography that does not exist, every
//! section carries its own reference list. And what pandoc produces uses its
//! own fonts, page size and heading layout, not the publisher's. This crate
//! fixes the sources before compilation and the document after.
//!
//! ## Pipeline Overview
//!
//! ```text
//! metadata.json
//!  │
//!  ├─ 1. Discover   find the file of every section in Chapter_<n>/
//!  ├─ 2. Normalize  citations, figures, bibliography, house style (per section)
//!  ├─ 3. Assemble   title page + sections + consolidated bibliography
//!  ├─ 4. Compile    pandoc → DOCX
//!  └─ 5. Restyle    page geometry, fonts, headings, footer, annotations
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tex2docx::{convert_book, ConversionConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::default();
//!     let output = convert_book(&config)?;
//!     for chapter in &output.chapters {
//!         println!("{}", chapter.docx_path.display());
//!     }
//!     eprintln!("missing images: {}", output.stats.missing_images);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `tex2docx` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! tex2docx = { version = "0.1", default-features = false }
//! ```
//!
//! ## Restyling Without Compiling
//!
//! [`restyle_document`] runs only the style post-processor, for documents
//! produced some other way. The passes are idempotent, so running it twice
//! is harmless. [`verify_document`] reads a document back and lists every
//! style that differs from the sheet.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod docx;
pub mod error;
pub mod metadata;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod style;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ChapterSelection, ConversionConfig, ConversionConfigBuilder};
pub use convert::{
    convert_book, convert_book_with, convert_chapter, restyle_document, verify_document,
};
pub use docx::{DocumentPort, DocxDocument, DocxPackage};
pub use error::{StyleWarning, Tex2DocxError};
pub use metadata::{BookMetadata, Chapter, Section};
pub use output::{ChapterOutput, ConversionOutput, ConversionStats, SectionReport, StyleReport};
pub use pipeline::compile::{CompileRequest, DocumentCompiler, PandocCompiler};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use style::{apply_publisher_style, verify_styles, StyleMismatch, StyleSheet, StyleVerification};
