//! Style post-processing passes.
//!
//! The compiler's DOCX output has the right structure but the compiler's
//! default look. Each pass below fixes one aspect of it through a
//! [`DocumentPort`]. Passes run in a fixed order:
//!
//! 1. Page geometry (A4, narrow margins)
//! 2. Numbering suffix (space instead of tab after every list number)
//! 3. Footer page number
//! 4. Named style table rewrite
//! 5. Title block formatting and duplicate chapter heading removal
//! 6. Conclusion promotion (heading 3 → heading 2)
//! 7. Heading text and run fix-up
//! 8. Image and caption centering
//! 9. Figure-detail annotation recoloring
//!
//! Named styles (4) go before the direct run formatting of 5–9 so the direct
//! formatting wins. Duplicate heading removal (5) goes before heading
//! fix-up (7) so the removed heading is not counted.
//!
//! Every pass is idempotent: running the whole list twice leaves the same
//! document as running it once.

use super::{Alignment, RunFormat, StyleSheet};
use crate::docx::{DocumentPort, FieldKind, ParagraphInfo};
use crate::error::StyleWarning;
use crate::output::StyleReport;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

/// Marker placed by the normalizer in front of missing-figure annotations.
pub const FIGURE_DETAIL_MARKER: &str = "[[FIGURE-DETAIL]]";

type Pass = fn(&mut dyn DocumentPort, &StyleSheet, &mut StyleReport);

const PASSES: &[(&str, Pass)] = &[
    ("page geometry", page_geometry),
    ("numbering suffix", numbering_suffix),
    ("footer page number", footer_page_number),
    ("named styles", named_styles),
    ("title block", title_block),
    ("conclusion promotion", promote_conclusion),
    ("heading fix-up", fix_headings),
    ("image centering", center_images),
    ("figure-detail annotations", recolor_annotations),
];

/// Apply every style pass to `doc` and report what changed.
///
/// Never fails: a patch that cannot be applied is recorded as a
/// [`StyleWarning`] and the remaining passes still run.
pub fn apply_publisher_style(doc: &mut dyn DocumentPort, sheet: &StyleSheet) -> StyleReport {
    let mut report = StyleReport::default();
    for (name, pass) in PASSES {
        debug!("Style pass: {}", name);
        pass(doc, sheet, &mut report);
    }
    debug!(
        "Styling done: {} styles, {} warnings",
        report.applied_styles.len(),
        report.warnings.len()
    );
    report
}

fn record(report: &mut StyleReport, warning: StyleWarning) {
    warn!("{}", warning);
    report.warnings.push(warning);
}

// ── Pass 1: Page geometry ────────────────────────────────────────────────────

fn page_geometry(doc: &mut dyn DocumentPort, sheet: &StyleSheet, _report: &mut StyleReport) {
    let sections = doc.set_page_layout(&sheet.page);
    debug!("Page layout applied to {} section(s)", sections);
}

// ── Pass 2: Numbering suffix ─────────────────────────────────────────────────

fn numbering_suffix(doc: &mut dyn DocumentPort, sheet: &StyleSheet, report: &mut StyleReport) {
    match doc.set_numbering_suffix(&sheet.numbering_suffix) {
        Ok(levels) => debug!("Numbering suffix set on {} level(s)", levels),
        Err(w) => record(report, w),
    }
}

// ── Pass 3: Footer page number ───────────────────────────────────────────────

fn footer_page_number(doc: &mut dyn DocumentPort, sheet: &StyleSheet, report: &mut StyleReport) {
    match doc.insert_footer_field(FieldKind::Page, &sheet.footer) {
        Ok(true) => debug!("Page number field added to footer"),
        Ok(false) => debug!("Footer already has a page number"),
        Err(w) => {
            record(report, w);
            return;
        }
    }
    if let Err(w) = doc.set_footer_alignment(Alignment::Center) {
        record(report, w);
    }
}

// ── Pass 4: Named styles ─────────────────────────────────────────────────────

fn named_styles(doc: &mut dyn DocumentPort, sheet: &StyleSheet, report: &mut StyleReport) {
    for (name, rule) in &sheet.rules {
        match doc.set_style(name, rule) {
            Ok(()) => report.applied_styles.push(name.clone()),
            Err(w) => record(report, w),
        }
    }
}

// ── Pass 5: Title block and duplicate heading ────────────────────────────────

static RE_CHAPTER_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CHAPTER \d+$").unwrap());
static RE_NUMBER_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+(?:\.\d+)*\.?\s+").unwrap());

/// The `CHAPTER N` and title paragraphs, if they open the document.
fn find_title_block(paragraphs: &[ParagraphInfo]) -> Option<(usize, usize)> {
    let mut non_empty = paragraphs.iter().filter(|p| !p.text.trim().is_empty());
    match (non_empty.next(), non_empty.next()) {
        (Some(number), Some(title))
            if RE_CHAPTER_LINE.is_match(number.text.trim()) && title.heading_level().is_none() =>
        {
            Some((number.id, title.id))
        }
        _ => None,
    }
}

/// Whitespace-collapsed heading text without a leading section number.
fn heading_text(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    RE_NUMBER_PREFIX.replace(&collapsed, "").into_owned()
}

/// The structural chapter heading: the first heading after the title block,
/// when it is a `heading 1` repeating the title.
fn find_duplicate_heading<'a>(
    paragraphs: &'a [ParagraphInfo],
    title: &ParagraphInfo,
) -> Option<&'a ParagraphInfo> {
    let next_heading = paragraphs
        .iter()
        .filter(|p| p.id > title.id)
        .find(|p| p.heading_level().is_some())?;
    (next_heading.heading_level() == Some(1)
        && heading_text(&next_heading.text) == heading_text(&title.text))
    .then_some(next_heading)
}

fn title_block(doc: &mut dyn DocumentPort, sheet: &StyleSheet, report: &mut StyleReport) {
    let paragraphs = doc.paragraphs();

    let Some((number, title)) = find_title_block(&paragraphs) else {
        // No anchor for the structural heading; leave every heading alone.
        record(report, StyleWarning::TitleBlockMissing);
        return;
    };
    doc.set_alignment(number, Alignment::Right);
    doc.format_runs(number, &sheet.chapter_number);
    doc.set_alignment(title, Alignment::Right);
    doc.format_runs(title, &sheet.chapter_title);

    if let Some(heading) = find_duplicate_heading(&paragraphs, &paragraphs[title]) {
        debug!("Removing duplicate chapter heading '{}'", heading.text.trim());
        report.removed_duplicate_heading = doc.remove_paragraph(heading.id);
    }
}

// ── Pass 6: Conclusion promotion ─────────────────────────────────────────────

static RE_CONCLUSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:\d+(?:\.\d+)*\.?\s+)?Conclusion$").unwrap());

fn promote_conclusion(doc: &mut dyn DocumentPort, _sheet: &StyleSheet, report: &mut StyleReport) {
    let paragraphs = doc.paragraphs();
    let Some(conclusion) = paragraphs
        .iter()
        .rev()
        .find(|p| p.heading_level() == Some(3) && RE_CONCLUSION.is_match(p.text.trim()))
    else {
        return;
    };
    // A bare "Conclusion" section heading after it means an earlier run
    // already promoted the last one.
    let already_promoted = paragraphs.iter().any(|p| {
        p.id > conclusion.id && p.heading_level() == Some(2) && p.text.trim() == "Conclusion"
    });
    if already_promoted {
        debug!("Conclusion already promoted");
        return;
    }

    if let Err(w) = doc.set_paragraph_style(conclusion.id, "Heading 2") {
        record(report, w);
        return;
    }
    doc.set_paragraph_text(conclusion.id, "Conclusion");
    doc.clear_numbering(conclusion.id);
    report.promoted_conclusion = true;
}

// ── Pass 7: Heading fix-up ───────────────────────────────────────────────────

static RE_HEADING_TABS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]*\t[ \t]*").unwrap());

fn fix_headings(doc: &mut dyn DocumentPort, sheet: &StyleSheet, report: &mut StyleReport) {
    let headings = doc.find_paragraphs(&|p| matches!(p.heading_level(), Some(1..=5)));
    for heading in headings {
        let mut changed = false;
        if heading.text.contains('\t') {
            let text = RE_HEADING_TABS.replace_all(&heading.text, " ");
            changed = doc.set_paragraph_text(heading.id, text.trim());
        }
        if let Some(rule) = heading.heading_level().and_then(|l| sheet.heading_rule(l)) {
            changed |= doc.format_runs(heading.id, &rule.run_format());
        }
        if changed {
            report.fixed_headings += 1;
        }
    }
}

// ── Pass 8: Image and caption centering ──────────────────────────────────────

fn center_images(doc: &mut dyn DocumentPort, sheet: &StyleSheet, report: &mut StyleReport) {
    let caption_format = sheet.caption_rule().map(|r| r.run_format());
    for p in doc.find_paragraphs(&|p| p.has_graphic || p.is_caption()) {
        doc.set_alignment(p.id, Alignment::Center);
        if !p.has_graphic {
            if let Some(format) = &caption_format {
                doc.format_runs(p.id, format);
            }
        }
        report.centered_images += 1;
    }
}

// ── Pass 9: Figure-detail annotations ────────────────────────────────────────

fn recolor_annotations(doc: &mut dyn DocumentPort, sheet: &StyleSheet, report: &mut StyleReport) {
    let alert = RunFormat {
        color: Some(sheet.alert),
        ..RunFormat::default()
    };
    for p in doc.find_paragraphs(&|p| p.text.contains(FIGURE_DETAIL_MARKER)) {
        let text = p.text.replace(FIGURE_DETAIL_MARKER, "");
        doc.set_paragraph_text(p.id, text.trim());
        doc.format_runs(p.id, &alert);
        report.recolored_annotations += 1;
    }
}
