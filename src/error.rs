//! Error types for the tex2docx library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Tex2DocxError`] — **Fatal**: the run cannot proceed at all (missing
//!   chapter directory, missing section file, the external compiler failed).
//!   Returned as `Err(Tex2DocxError)` from the top-level `convert*` functions;
//!   the binary exits non-zero on the first one.
//!
//! * [`StyleWarning`] — **Non-fatal**: a single style patch could not be
//!   applied (unknown style name, absent document part). Stored inside
//!   [`crate::output::StyleReport`] so the remaining style work still runs and
//!   callers can print every degradation after the fact.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the tex2docx library.
///
/// Style-level failures use [`StyleWarning`] and are stored in
/// [`crate::output::StyleReport`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Tex2DocxError {
    // ── Metadata errors ───────────────────────────────────────────────────
    /// The metadata JSON file does not exist.
    #[error("Metadata file not found: '{path}'\nGenerate it with --generate-metadata <OUTLINE>.")]
    MetadataNotFound { path: PathBuf },

    /// The metadata file exists but is not valid chapter metadata.
    #[error("Metadata file '{path}' is invalid: {source}")]
    MetadataParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `--chapter N` named a chapter that is not in the metadata.
    #[error("Chapter {chapter} not found in metadata")]
    ChapterNotFound { chapter: u32 },

    // ── Discovery errors ──────────────────────────────────────────────────
    /// The chapter's source directory does not exist.
    #[error("Chapter directory not found: '{path}'")]
    MissingDirectory { path: PathBuf },

    /// No file in the chapter directory matches the section number.
    #[error("Missing file for Section {section} in '{dir}'\nExpected a file named like 'Section_{section}.tex'.")]
    MissingSectionFile { section: String, dir: PathBuf },

    /// More than one file in the chapter directory matches the section number.
    #[error("Section {section} matches several files in '{dir}': {candidates:?}")]
    AmbiguousSectionFile {
        section: String,
        dir: PathBuf,
        candidates: Vec<String>,
    },

    /// Reading a section file or writing its normalized copy failed.
    #[error("Failed to process section file '{path}': {source}")]
    SectionProcessing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Compiler errors ───────────────────────────────────────────────────
    /// The external document compiler could not be started.
    #[error("Document compiler '{program}' could not be started: {reason}\nInstall pandoc or point --pandoc / PANDOC at it.")]
    ConverterNotFound { program: String, reason: String },

    /// The external document compiler ran but reported an error.
    #[error("Document compilation of '{input}' failed: {detail}")]
    ConversionFailed { input: PathBuf, detail: String },

    // ── Document errors ───────────────────────────────────────────────────
    /// The compiled document could not be opened as a DOCX package.
    #[error("Failed to read document '{path}': {detail}")]
    DocumentRead { path: PathBuf, detail: String },

    /// A required document part is missing or not well-formed XML.
    #[error("Malformed document part '{part}': {detail}")]
    DocumentMalformed { part: String, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal problem met while restyling the compiled document.
///
/// Stored in [`crate::output::StyleReport::warnings`]. The post-processor
/// skips the affected patch and carries on with the rest.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum StyleWarning {
    /// The document's style table has no style with this name.
    #[error("Style '{name}' not found in document; skipped")]
    UnknownStyle { name: String },

    /// An optional document part is absent (e.g. no numbering definitions).
    #[error("Document part '{part}' is absent; {action} skipped")]
    MissingPart { part: String, action: String },

    /// A document element did not have the expected shape.
    #[error("Malformed element in '{part}': {detail}")]
    MalformedElement { part: String, detail: String },

    /// The custom chapter title block was not found at the top of the
    /// document, so no duplicate chapter heading was removed.
    #[error("Chapter title block not found at document start; duplicate chapter heading left in place")]
    TitleBlockMissing,
}
