//! CLI binary for tex2docx.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tex2docx::{
    convert_book, verify_document, BookMetadata, ChapterSelection, ConversionConfig,
    ConversionOutput, ConversionProgressCallback, ProgressCallback, StyleSheet, StyleVerification,
};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar over every section plus one compile
/// step per chapter, with a log line per finished unit.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} steps  \
             ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_chapters: usize) {
        self.bar.set_prefix("Converting");
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_chapters} chapter(s)…"))
        ));
    }

    fn on_chapter_start(&self, chapter: u32, total_sections: usize) {
        // Sections plus the compile/restyle step.
        self.bar.inc_length(total_sections as u64 + 1);
        self.bar.set_message(format!("chapter {chapter}"));
        self.bar.println(format!(
            "{} Chapter {chapter}  {}",
            cyan("▸"),
            dim(&format!("{total_sections} sections"))
        ));
    }

    fn on_section_complete(&self, _chapter: u32, section: &str, chars: usize) {
        self.bar.println(format!(
            "  {} Section {:<8}  {}",
            green("✓"),
            section,
            dim(&format!("{chars:>6} chars")),
        ));
        self.bar.inc(1);
    }

    fn on_compile_start(&self, chapter: u32) {
        self.bar.set_message(format!("chapter {chapter}: pandoc"));
    }

    fn on_chapter_complete(&self, chapter: u32, style_warnings: usize) {
        let note = if style_warnings == 0 {
            dim("styled")
        } else {
            yellow(&format!("{style_warnings} style warning(s)"))
        };
        self.bar
            .println(format!("  {} Chapter {chapter} compiled  {note}", green("✓")));
        self.bar.inc(1);
    }

    fn on_chapter_error(&self, chapter: u32, error: &str) {
        // Truncate very long error messages to keep output tidy.
        let first_line = error.lines().next().unwrap_or_default();
        let msg = if first_line.chars().count() > 100 {
            format!("{}\u{2026}", first_line.chars().take(99).collect::<String>())
        } else {
            first_line.to_string()
        };
        self.bar
            .println(format!("  {} Chapter {chapter}  {}", red("✗"), red(&msg)));
        self.bar.abandon();
    }

    fn on_conversion_complete(&self, total_chapters: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} chapter(s) converted successfully",
            green("✔"),
            bold(&total_chapters.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert every chapter listed in input/metadata.json
  tex2docx

  # One chapter only
  tex2docx --chapter 3

  # Custom layout and pandoc binary
  tex2docx --metadata book/meta.json --latex-root book/tex --output-dir build \
           --pandoc /opt/pandoc/bin/pandoc

  # Generate metadata.json from the manuscript outline, then exit
  tex2docx --generate-metadata "input/Master Production Manuscript.txt"

  # Check a styled document against the publisher style, then exit
  tex2docx --verify output/C01_Introduction.docx

  # Plain pandoc output, JSON run summary
  tex2docx --no-style --json > summary.json

INPUT LAYOUT:
  input/metadata.json
  input/latex_files/Chapter_<n>/Section_<n.m>.tex
  input/latex_files/Chapter_<n>/images/

OUTPUT:
  output/C<NN>_<Title>.docx   styled document
  output/C<NN>_<Title>.tex    assembled source, as handed to pandoc

ENVIRONMENT VARIABLES:
  PANDOC        Path to the pandoc executable (when --pandoc is not given)
  RUST_LOG      Log filter, e.g. RUST_LOG=tex2docx=debug
"#;

/// Assemble LaTeX book chapters into publisher-styled DOCX documents.
#[derive(Parser, Debug)]
#[command(
    name = "tex2docx",
    version,
    about = "Assemble LaTeX book chapters into publisher-styled DOCX documents",
    long_about = "Assemble the section files of each book chapter into one LaTeX source, \
resolve figures and citations, consolidate bibliographies, compile with pandoc and \
apply the publisher's page layout, fonts and heading style to the resulting DOCX.",
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Convert only this chapter number.
    #[arg(long, env = "TEX2DOCX_CHAPTER")]
    chapter: Option<u32>,

    /// Book metadata JSON.
    #[arg(long, env = "TEX2DOCX_METADATA", default_value = "input/metadata.json")]
    metadata: PathBuf,

    /// Directory holding one Chapter_<n> directory per chapter.
    #[arg(long, env = "TEX2DOCX_LATEX_ROOT", default_value = "input/latex_files")]
    latex_root: PathBuf,

    /// Where .tex and .docx outputs are written.
    #[arg(long, env = "TEX2DOCX_OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    /// Pandoc executable (default: $PANDOC, then pandoc on PATH).
    #[arg(long, env = "TEX2DOCX_PANDOC")]
    pandoc: Option<PathBuf>,

    /// Keep pandoc's document as is; skip the publisher style pass.
    #[arg(long, env = "TEX2DOCX_NO_STYLE")]
    no_style: bool,

    /// Print the run summary (ConversionOutput) as JSON on stdout.
    #[arg(long, env = "TEX2DOCX_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "TEX2DOCX_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "TEX2DOCX_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "TEX2DOCX_QUIET")]
    quiet: bool,

    /// Parse a manuscript outline into the metadata file, then exit.
    #[arg(long, value_name = "OUTLINE")]
    generate_metadata: Option<PathBuf>,

    /// Compare a DOCX's styles with the publisher style sheet, then exit.
    /// Fails when any style differs.
    #[arg(long, value_name = "DOCX")]
    verify: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar provides all the feedback that matters to the user.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Metadata generation mode ─────────────────────────────────────────
    if let Some(ref outline_path) = cli.generate_metadata {
        return generate_metadata(&cli, outline_path);
    }

    // ── Style verification mode ──────────────────────────────────────────
    if let Some(ref docx_path) = cli.verify {
        return verify(&cli, docx_path);
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new();
        Some(cb as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let output = convert_book(&config).context("Conversion failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output);
    }

    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .metadata_path(&cli.metadata)
        .latex_root(&cli.latex_root)
        .output_dir(&cli.output_dir)
        .apply_styles(!cli.no_style)
        .chapters(match cli.chapter {
            Some(n) => ChapterSelection::Single(n),
            None => ChapterSelection::All,
        });
    if let Some(ref pandoc) = cli.pandoc {
        builder = builder.pandoc(pandoc);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn generate_metadata(cli: &Cli, outline_path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(outline_path)
        .with_context(|| format!("Failed to read outline from {}", outline_path.display()))?;
    let root = cli.latex_root.to_string_lossy().replace('\\', "/");
    let book = BookMetadata::from_outline(&text, &root);
    book.save(&cli.metadata)
        .context("Failed to write metadata")?;

    if !cli.quiet {
        eprintln!(
            "{} Generated {}",
            green("✔"),
            bold(&cli.metadata.display().to_string())
        );
        eprintln!("Book: {}", book.book_title);
        eprintln!("Chapters: {}", book.chapters.len());
        for chapter in &book.chapters {
            eprintln!(
                "  Chapter {}: {} sections",
                chapter.number,
                chapter.sections.len()
            );
        }
    }
    Ok(())
}

fn verify(cli: &Cli, docx_path: &Path) -> Result<()> {
    let verification = verify_document(docx_path, &StyleSheet::default())
        .with_context(|| format!("Failed to read {}", docx_path.display()))?;

    if cli.json {
        let json =
            serde_json::to_string_pretty(&verification).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_verification(docx_path, &verification);
    }

    if !verification.is_clean() {
        anyhow::bail!(
            "{} style mismatch(es), {} heading(s) with tabs in {}",
            verification.mismatches.len(),
            verification.headings_with_tabs.len(),
            docx_path.display()
        );
    }
    Ok(())
}

fn print_verification(docx_path: &Path, verification: &StyleVerification) {
    eprintln!("{} {}", cyan("◆"), bold(&docx_path.display().to_string()));
    for style in &verification.checked {
        let failed: Vec<_> = verification
            .mismatches
            .iter()
            .filter(|m| &m.style == style)
            .collect();
        if failed.is_empty() {
            eprintln!("  {} {style}", green("✓"));
            continue;
        }
        eprintln!("  {} {style}", red("✗"));
        for m in failed {
            eprintln!(
                "      {:<10} {}  {}",
                m.property,
                red(&m.actual),
                dim(&format!("expected {}", m.expected))
            );
        }
    }
    for style in &verification.missing {
        eprintln!("  {} {style}  {}", yellow("·"), dim("not defined"));
    }
    for heading in &verification.headings_with_tabs {
        eprintln!("  {} tab in heading '{}'", red("✗"), heading.replace('\t', "→"));
    }
}

fn print_summary(output: &ConversionOutput) {
    for chapter in &output.chapters {
        eprintln!(
            "{}  Chapter {}  →  {}",
            green("✔"),
            chapter.number,
            bold(&chapter.docx_path.display().to_string())
        );
        for section in &chapter.sections {
            for missing in &section.missing_images {
                eprintln!(
                    "   {} Section {}: missing image {}",
                    yellow("⚠"),
                    section.number,
                    missing
                );
            }
        }
        if let Some(ref style) = chapter.style {
            for warning in &style.warnings {
                eprintln!("   {} {}", yellow("⚠"), warning);
            }
        }
    }
    let stats = &output.stats;
    eprintln!(
        "   {} sections  /  {} images resolved  /  {} missing  /  {} references  —  {}ms total",
        stats.sections,
        dim(&stats.resolved_images.to_string()),
        dim(&stats.missing_images.to_string()),
        dim(&stats.references.to_string()),
        stats.total_duration_ms,
    );
}
