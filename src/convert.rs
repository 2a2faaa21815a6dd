//! Chapter conversion entry points.
//!
//! A chapter goes through the whole pipeline before the next one starts:
//! its image index, reference accumulator and temporary directory all live
//! in one [`convert_chapter`] call and are dropped when it returns, on the
//! error path too.

use crate::config::{ChapterSelection, ConversionConfig};
use crate::docx::DocxDocument;
use crate::error::Tex2DocxError;
use crate::metadata::{BookMetadata, Chapter};
use crate::output::{
    ChapterOutput, ChapterStats, ConversionOutput, ConversionStats, SectionReport, StyleReport,
};
use crate::pipeline::assemble::{self, OutputPaths};
use crate::pipeline::bibliography::ReferenceAccumulator;
use crate::pipeline::compile::{CompileRequest, DocumentCompiler, PandocCompiler};
use crate::pipeline::discover;
use crate::pipeline::images::ImageIndex;
use crate::pipeline::normalize::{self, RuleContext};
use crate::style::{self, StyleSheet, StyleVerification};
use std::path::Path;
use std::time::Instant;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Convert the chapters selected in `config`, compiling with pandoc.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns the first fatal error; chapters after it are not attempted.
pub fn convert_book(config: &ConversionConfig) -> Result<ConversionOutput, Tex2DocxError> {
    let metadata = BookMetadata::load(&config.metadata_path)?;
    let compiler = PandocCompiler::locate(config.pandoc.as_deref());
    convert_book_with(&metadata, config, &compiler)
}

/// Convert the selected chapters of already-loaded metadata with any
/// compiler.
pub fn convert_book_with(
    metadata: &BookMetadata,
    config: &ConversionConfig,
    compiler: &dyn DocumentCompiler,
) -> Result<ConversionOutput, Tex2DocxError> {
    let total_start = Instant::now();
    info!("Converting '{}'", metadata.book_title);

    let chapters = select_chapters(metadata, config)?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(chapters.len());
    }

    let mut outputs = Vec::with_capacity(chapters.len());
    for chapter in &chapters {
        outputs.push(convert_chapter(chapter, config, compiler)?);
    }

    let stats = ConversionStats::from_chapters(&outputs, elapsed_ms(total_start));
    info!(
        "Conversion complete: {} chapters, {} sections, {}ms total",
        stats.chapters, stats.sections, stats.total_duration_ms
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(outputs.len());
    }

    Ok(ConversionOutput {
        book_title: metadata.book_title.clone(),
        chapters: outputs,
        stats,
    })
}

fn select_chapters<'a>(
    metadata: &'a BookMetadata,
    config: &ConversionConfig,
) -> Result<Vec<&'a Chapter>, Tex2DocxError> {
    if let ChapterSelection::Single(number) = config.chapters {
        return metadata
            .chapter(number)
            .map(|c| vec![c])
            .ok_or(Tex2DocxError::ChapterNotFound { chapter: number });
    }
    if metadata.chapters.is_empty() {
        warn!("No chapters found in metadata");
    }
    Ok(metadata.chapters.iter().collect())
}

/// Convert one chapter: normalize, assemble, compile, restyle.
pub fn convert_chapter(
    chapter: &Chapter,
    config: &ConversionConfig,
    compiler: &dyn DocumentCompiler,
) -> Result<ChapterOutput, Tex2DocxError> {
    let result = run_chapter(chapter, config, compiler);
    if let (Err(e), Some(cb)) = (&result, &config.progress_callback) {
        cb.on_chapter_error(chapter.number, &e.to_string());
    }
    result
}

fn run_chapter(
    chapter: &Chapter,
    config: &ConversionConfig,
    compiler: &dyn DocumentCompiler,
) -> Result<ChapterOutput, Tex2DocxError> {
    let chapter_start = Instant::now();
    info!("Processing Chapter {}: {}", chapter.number, chapter.title);
    if let Some(ref cb) = config.progress_callback {
        cb.on_chapter_start(chapter.number, chapter.sections.len());
    }

    // ── Step 1: Locate the chapter's files ───────────────────────────────
    let chapter_dir = chapter.directory(&config.latex_root);
    if !chapter_dir.is_dir() {
        return Err(Tex2DocxError::MissingDirectory { path: chapter_dir });
    }
    let section_files = chapter
        .sections
        .iter()
        .map(|s| discover::find_section_file(&chapter_dir, &s.number))
        .collect::<Result<Vec<_>, _>>()?;
    let images = ImageIndex::scan(&chapter_dir, &config.images_subdir)?;

    // ── Step 2: Normalize every section into the scratch directory ───────
    let normalize_start = Instant::now();
    let scratch = TempDir::with_prefix("tex2docx-")
        .map_err(|e| Tex2DocxError::Internal(format!("Failed to create temp dir: {e}")))?;
    let mut references = ReferenceAccumulator::new();
    let mut sections = Vec::with_capacity(section_files.len());
    let mut normalized_paths = Vec::with_capacity(section_files.len());

    for (i, (section, source)) in chapter.sections.iter().zip(&section_files).enumerate() {
        let target = scratch.path().join(format!("{:03}_section.tex", i + 1));
        let report = normalize_section(source, &target, &images, &mut references)?;
        info!(
            "  Processed {}: {} chars",
            file_name(source),
            report.chars
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_section_complete(chapter.number, &section.number, report.chars);
        }
        sections.push(SectionReport {
            number: section.number.clone(),
            title: section.title.clone(),
            ..report
        });
        normalized_paths.push(target);
    }
    let normalize_duration_ms = elapsed_ms(normalize_start);

    // ── Step 3: Assemble the chapter source ──────────────────────────────
    let mut units = vec![assemble::title_unit(chapter.number, &chapter.title)];
    for path in &normalized_paths {
        units.push(read_section(path)?);
    }
    if let Some(bibliography) = references.render() {
        units.push(bibliography);
    }
    let source = assemble::assemble(&units);

    let paths = OutputPaths::new(&config.output_dir, chapter.number, &chapter.title);
    write_output(&paths.tex, source.as_bytes())?;
    debug!("Assembled source written to {}", paths.tex.display());

    // ── Step 4: Compile ──────────────────────────────────────────────────
    if let Some(ref cb) = config.progress_callback {
        cb.on_compile_start(chapter.number);
    }
    info!(
        "  Combining {} units into {}",
        units.len(),
        paths.docx.display()
    );
    let compile_start = Instant::now();
    let chapter_abs = std::path::absolute(&chapter_dir).unwrap_or_else(|_| chapter_dir.clone());
    compiler.compile(&CompileRequest {
        input: paths.tex.clone(),
        output: paths.docx.clone(),
        resource_paths: vec![chapter_abs.clone(), chapter_abs.join(&config.images_subdir)],
    })?;
    let compile_duration_ms = elapsed_ms(compile_start);

    // ── Step 5: Restyle ──────────────────────────────────────────────────
    let style_start = Instant::now();
    let style = if config.apply_styles {
        Some(restyle_document(&paths.docx, &config.style_sheet)?)
    } else {
        debug!("Styling disabled; keeping compiler output as is");
        None
    };
    let style_duration_ms = elapsed_ms(style_start);

    let warnings = style.as_ref().map(|s| s.warnings.len()).unwrap_or(0);
    if let Some(ref cb) = config.progress_callback {
        cb.on_chapter_complete(chapter.number, warnings);
    }
    info!("  Successfully created {}", paths.docx.display());

    Ok(ChapterOutput {
        number: chapter.number,
        title: chapter.title.clone(),
        tex_path: paths.tex,
        docx_path: paths.docx,
        sections,
        references: references.len(),
        style,
        stats: ChapterStats {
            normalize_duration_ms,
            compile_duration_ms,
            style_duration_ms,
            total_duration_ms: elapsed_ms(chapter_start),
        },
    })
}

/// Apply the publisher style to a compiled document in place.
pub fn restyle_document(path: &Path, sheet: &StyleSheet) -> Result<StyleReport, Tex2DocxError> {
    let mut doc = DocxDocument::open(path)?;
    let report = style::apply_publisher_style(&mut doc, sheet);
    doc.save(path)?;
    for warning in &report.warnings {
        debug!("Style warning for {}: {}", path.display(), warning);
    }
    Ok(report)
}

/// Compare a document's styles with `sheet` without changing the file.
pub fn verify_document(path: &Path, sheet: &StyleSheet) -> Result<StyleVerification, Tex2DocxError> {
    let doc = DocxDocument::open(path)?;
    let verification = style::verify_styles(&doc, sheet);
    for mismatch in &verification.mismatches {
        debug!(
            "{}: style '{}' {} is {}, expected {}",
            path.display(),
            mismatch.style,
            mismatch.property,
            mismatch.actual,
            mismatch.expected
        );
    }
    Ok(verification)
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn normalize_section(
    source: &Path,
    target: &Path,
    images: &ImageIndex,
    references: &mut ReferenceAccumulator,
) -> Result<SectionReport, Tex2DocxError> {
    let text = read_section(source)?;
    let mut ctx = RuleContext::new(images, references);
    let normalized = normalize::normalize(&text, &mut ctx);
    std::fs::write(target, &normalized).map_err(|e| Tex2DocxError::SectionProcessing {
        path: source.to_path_buf(),
        source: e,
    })?;

    Ok(SectionReport {
        source: source.to_path_buf(),
        chars: normalized.chars().count(),
        resolved_images: ctx.resolved_images,
        missing_images: ctx.missing_images,
        references_extracted: ctx.references_extracted,
        ..SectionReport::default()
    })
}

fn read_section(path: &Path) -> Result<String, Tex2DocxError> {
    std::fs::read_to_string(path).map_err(|e| Tex2DocxError::SectionProcessing {
        path: path.to_path_buf(),
        source: e,
    })
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<(), Tex2DocxError> {
    let write_err = |e| Tex2DocxError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, bytes).map_err(write_err)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::Section;

    fn book() -> BookMetadata {
        BookMetadata {
            book_title: "B".into(),
            chapters: vec![
                Chapter {
                    number: 1,
                    title: "One".into(),
                    sections: vec![Section {
                        number: "1.1".into(),
                        title: "S".into(),
                        file_path: String::new(),
                    }],
                },
                Chapter {
                    number: 2,
                    title: "Two".into(),
                    sections: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_select_all_and_single() {
        let book = book();
        let all = select_chapters(&book, &ConversionConfig::default()).expect("all");
        assert_eq!(all.len(), 2);

        let config = ConversionConfig::builder()
            .chapters(ChapterSelection::Single(2))
            .build()
            .expect("config");
        let one = select_chapters(&book, &config).expect("single");
        assert_eq!(one[0].title, "Two");
    }

    #[test]
    fn test_unknown_chapter() {
        let config = ConversionConfig::builder()
            .chapters(ChapterSelection::Single(9))
            .build()
            .expect("config");
        let err = select_chapters(&book(), &config).unwrap_err();
        assert!(matches!(err, Tex2DocxError::ChapterNotFound { chapter: 9 }));
    }

    #[test]
    fn test_normalize_section_writes_target() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("Section_1.1.tex");
        std::fs::write(&source, "Text\\cite{a} vs. more.").expect("write");
        let target = dir.path().join("out.tex");
        let images = ImageIndex::default();
        let mut refs = ReferenceAccumulator::new();

        let report = normalize_section(&source, &target, &images, &mut refs).expect("normalize");
        let written = std::fs::read_to_string(&target).expect("read");
        assert_eq!(written, "Text versus more.");
        assert_eq!(report.chars, written.chars().count());
        assert_eq!(report.source, source);
    }

    #[test]
    fn test_missing_section_source() {
        let dir = tempfile::tempdir().expect("tempdir");
        let images = ImageIndex::default();
        let mut refs = ReferenceAccumulator::new();
        let err = normalize_section(
            &dir.path().join("gone.tex"),
            &dir.path().join("out.tex"),
            &images,
            &mut refs,
        )
        .unwrap_err();
        assert!(matches!(err, Tex2DocxError::SectionProcessing { .. }));
    }
}
