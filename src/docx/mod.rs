//! WordprocessingML document access.
//!
//! The style passes never touch XML directly. They talk to a
//! [`DocumentPort`], a small set of queries and edits over paragraphs, styles,
//! numbering, page geometry and footers. [`DocxDocument`] implements it on top
//! of an owned XML tree ([`xml`]) read from the zip container ([`package`]).

pub mod document;
pub mod package;
pub mod xml;

pub use document::DocxDocument;
pub use package::DocxPackage;

use crate::error::StyleWarning;
use crate::style::{heading_level, Alignment, PageLayout, RunFormat, StyleRule};

/// Position of a paragraph among the body's top-level paragraphs.
///
/// Ids are only valid until the next [`DocumentPort::remove_paragraph`];
/// passes re-query after removing anything.
pub type ParagraphId = usize;

/// Read-only view of one body paragraph.
#[derive(Debug, Clone, PartialEq)]
pub struct ParagraphInfo {
    pub id: ParagraphId,
    /// Display name of the paragraph style (`"heading 1"`), falling back to
    /// the raw style id when the style table does not know it.
    pub style_name: Option<String>,
    /// Visible text. Tabs come through as `'\t'`, breaks as `'\n'`.
    pub text: String,
    /// Contains a `w:drawing` or legacy `w:pict`.
    pub has_graphic: bool,
    /// Carries direct list numbering (`w:numPr`).
    pub has_numbering: bool,
    pub alignment: Option<Alignment>,
}

impl ParagraphInfo {
    /// Heading level of the paragraph style, if it is a heading.
    pub fn heading_level(&self) -> Option<u8> {
        self.style_name.as_deref().and_then(heading_level)
    }

    /// `true` when the style is one of the caption styles.
    pub fn is_caption(&self) -> bool {
        self.style_name
            .as_deref()
            .map(|name| crate::style::style_key(name).ends_with("caption"))
            .unwrap_or(false)
    }
}

/// Supported field codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Current page number.
    Page,
}

impl FieldKind {
    /// The field instruction keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            FieldKind::Page => "PAGE",
        }
    }
}

/// Current formatting of a named style, as stored in the style table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleSnapshot {
    pub style_id: String,
    pub name: String,
    pub font: Option<String>,
    pub size_pt: Option<f32>,
    pub bold: bool,
    pub italic: bool,
    pub color: Option<String>,
    pub alignment: Option<Alignment>,
    /// Character styles carry no paragraph properties.
    pub character: bool,
}

/// Query and edit operations the style passes need from a document.
pub trait DocumentPort {
    /// Look up a style by display name or id (case and spaces ignored).
    fn style(&self, name: &str) -> Option<StyleSnapshot>;

    /// Overwrite a named style's font, size, weight, color, alignment and
    /// spacing. Theme font references are dropped so the explicit font wins.
    fn set_style(&mut self, name: &str, rule: &StyleRule) -> Result<(), StyleWarning>;

    /// Every top-level body paragraph, in document order.
    fn paragraphs(&self) -> Vec<ParagraphInfo>;

    fn find_paragraphs(&self, predicate: &dyn Fn(&ParagraphInfo) -> bool) -> Vec<ParagraphInfo> {
        self.paragraphs()
            .into_iter()
            .filter(|p| predicate(p))
            .collect()
    }

    /// Apply page size and margins to every section. Returns how many
    /// sections were updated.
    fn set_page_layout(&mut self, layout: &PageLayout) -> usize;

    /// Set the suffix after every numbering level. Returns the number of
    /// levels touched.
    fn set_numbering_suffix(&mut self, suffix: &str) -> Result<usize, StyleWarning>;

    /// Insert a field into the first paragraph of the last section's default
    /// footer. Returns `false` when the footer already shows a field of that
    /// kind. The footer part is created when the document has none.
    fn insert_footer_field(
        &mut self,
        kind: FieldKind,
        format: &RunFormat,
    ) -> Result<bool, StyleWarning>;

    /// Align the first paragraph of the default footer.
    fn set_footer_alignment(&mut self, alignment: Alignment) -> Result<(), StyleWarning>;

    fn remove_paragraph(&mut self, id: ParagraphId) -> bool;

    fn set_alignment(&mut self, id: ParagraphId, alignment: Alignment) -> bool;

    fn set_paragraph_style(&mut self, id: ParagraphId, style_name: &str)
        -> Result<(), StyleWarning>;

    /// Replace the paragraph's runs with a single run holding `text`;
    /// `'\n'` becomes a line break.
    /// Paragraph properties and bookmarks survive; the new run copies the
    /// first old run's properties.
    fn set_paragraph_text(&mut self, id: ParagraphId, text: &str) -> bool;

    /// Apply direct formatting to every run in the paragraph. Returns `true`
    /// when any run property changed.
    fn format_runs(&mut self, id: ParagraphId, format: &RunFormat) -> bool;

    /// Drop direct list numbering from the paragraph.
    fn clear_numbering(&mut self, id: ParagraphId) -> bool;
}
