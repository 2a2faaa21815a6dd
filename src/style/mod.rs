//! Publisher style rules and the post-processing passes that apply them.
//!
//! [`StyleSheet`] is pure data: page geometry, the named-style rule table and
//! the run formats used for the title block and annotations. The passes in
//! [`passes`] read it and mutate a document through
//! [`crate::docx::DocumentPort`], so the rules can change without touching
//! any XML handling. [`verify`] reads the same sheet back against a
//! document without changing it.

pub mod passes;
pub mod verify;

pub use passes::apply_publisher_style;
pub use verify::{verify_styles, StyleMismatch, StyleVerification};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Paragraph alignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alignment {
    Left,
    Center,
    Right,
    Justify,
}

impl Alignment {
    /// The WordprocessingML `w:jc` value.
    pub fn as_jc(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
            Alignment::Justify => "both",
        }
    }

    /// Parse a `w:jc` value; `start`/`end` are the bidi-aware spellings.
    pub fn from_jc(value: &str) -> Option<Self> {
        match value {
            "left" | "start" => Some(Alignment::Left),
            "center" => Some(Alignment::Center),
            "right" | "end" => Some(Alignment::Right),
            "both" | "distribute" => Some(Alignment::Justify),
            _ => None,
        }
    }
}

/// An sRGB color.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);

    /// Upper-case six-digit hex, as `w:color w:val` expects.
    pub fn hex(self) -> String {
        format!("{:02X}{:02X}{:02X}", self.0, self.1, self.2)
    }
}

impl fmt::Debug for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex())
    }
}

/// Formatting for one named style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleRule {
    pub font: String,
    pub size_pt: f32,
    pub bold: bool,
    pub italic: bool,
    pub color: Rgb,
    /// `None` leaves the style's alignment as the compiler wrote it.
    pub alignment: Option<Alignment>,
    pub space_before_pt: f32,
    pub space_after_pt: f32,
    /// Line spacing as a multiple of single spacing.
    pub line_spacing: f32,
}

impl StyleRule {
    /// Lora 11pt regular, black, no space before, 10pt after, 1.15 lines.
    pub fn body(font: &str, size_pt: f32) -> Self {
        Self {
            font: font.to_string(),
            size_pt,
            bold: false,
            italic: false,
            color: Rgb::BLACK,
            alignment: None,
            space_before_pt: 0.0,
            space_after_pt: 10.0,
            line_spacing: 1.15,
        }
    }

    pub fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    pub fn italic(mut self) -> Self {
        self.italic = true;
        self
    }

    pub fn aligned(mut self, alignment: Alignment) -> Self {
        self.alignment = Some(alignment);
        self
    }

    pub fn spacing(mut self, before_pt: f32, after_pt: f32) -> Self {
        self.space_before_pt = before_pt;
        self.space_after_pt = after_pt;
        self
    }

    /// The run-level subset of this rule.
    pub fn run_format(&self) -> RunFormat {
        RunFormat {
            font: Some(self.font.clone()),
            size_pt: Some(self.size_pt),
            bold: Some(self.bold),
            italic: Some(self.italic),
            color: None,
        }
    }
}

/// Direct run formatting. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFormat {
    pub font: Option<String>,
    pub size_pt: Option<f32>,
    pub bold: Option<bool>,
    pub italic: Option<bool>,
    pub color: Option<Rgb>,
}

/// Page size and margins applied to every section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub width_mm: f32,
    pub height_mm: f32,
    pub margin_in: f32,
}

impl PageLayout {
    /// A4 with 0.79" margins.
    pub const A4: PageLayout = PageLayout {
        width_mm: 210.0,
        height_mm: 297.0,
        margin_in: 0.79,
    };

    pub fn width_twips(&self) -> u32 {
        mm_to_twips(self.width_mm)
    }

    pub fn height_twips(&self) -> u32 {
        mm_to_twips(self.height_mm)
    }

    pub fn margin_twips(&self) -> u32 {
        (self.margin_in * 1440.0).round() as u32
    }
}

fn mm_to_twips(mm: f32) -> u32 {
    (mm * 1440.0 / 25.4).round() as u32
}

/// Everything the post-processor needs to know about the target look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleSheet {
    pub page: PageLayout,
    /// Named style rules, applied in order.
    pub rules: Vec<(String, StyleRule)>,
    /// Run format of the "CHAPTER N" line of the title block.
    pub chapter_number: RunFormat,
    /// Run format of the chapter title line of the title block.
    pub chapter_title: RunFormat,
    /// Run format of the page number in the footer.
    pub footer: RunFormat,
    /// Color of figure-detail annotation paragraphs.
    pub alert: Rgb,
    /// Suffix written after every list/heading number.
    pub numbering_suffix: String,
}

impl StyleSheet {
    /// The rule declared for a style name, compared like Word does
    /// (case-insensitive, spaces ignored).
    pub fn rule(&self, style_name: &str) -> Option<&StyleRule> {
        let key = style_key(style_name);
        self.rules
            .iter()
            .find(|(name, _)| style_key(name) == key)
            .map(|(_, rule)| rule)
    }

    /// The rule for heading level `level` (1-based), if declared.
    pub fn heading_rule(&self, level: u8) -> Option<&StyleRule> {
        self.rule(&format!("Heading {level}"))
    }

    /// The caption rule, used for direct caption run formatting.
    pub fn caption_rule(&self) -> Option<&StyleRule> {
        self.rule("Caption")
    }
}

impl Default for StyleSheet {
    fn default() -> Self {
        use Alignment::*;
        const SERIF: &str = "Lora";
        const MONO: &str = "Consolas";
        let accent = Rgb(54, 95, 145);

        let body = StyleRule::body(SERIF, 11.0).aligned(Justify);
        let caption = StyleRule::body(SERIF, 9.0).italic().aligned(Center);
        let code = StyleRule::body(MONO, 10.0).aligned(Left);

        let rules = vec![
            ("Normal".to_string(), body.clone()),
            ("Body Text".to_string(), body.clone()),
            ("First Paragraph".to_string(), body),
            (
                "Heading 1".to_string(),
                StyleRule::body(SERIF, 24.0).bold().spacing(24.0, 24.0),
            ),
            (
                "Heading 2".to_string(),
                StyleRule::body(SERIF, 20.0).bold().spacing(42.0, 18.0),
            ),
            (
                "Heading 3".to_string(),
                StyleRule::body(SERIF, 18.0)
                    .bold()
                    .spacing(24.0, 12.0)
                    .aligned(Justify),
            ),
            (
                "Heading 4".to_string(),
                StyleRule::body(SERIF, 16.0)
                    .bold()
                    .spacing(12.0, 12.0)
                    .aligned(Justify),
            ),
            (
                "Heading 5".to_string(),
                StyleRule::body(SERIF, 14.0)
                    .bold()
                    .spacing(12.0, 12.0)
                    .aligned(Justify),
            ),
            ("Source Code".to_string(), code.clone()),
            ("Verbatim Char".to_string(), code),
            ("Caption".to_string(), caption.clone()),
            ("Image Caption".to_string(), caption.clone()),
            ("Figure Caption".to_string(), caption.clone()),
            ("Table Caption".to_string(), caption),
        ];

        Self {
            page: PageLayout::A4,
            rules,
            chapter_number: RunFormat {
                font: Some(SERIF.to_string()),
                size_pt: Some(35.0),
                bold: Some(false),
                italic: None,
                color: Some(accent),
            },
            chapter_title: RunFormat {
                font: Some(SERIF.to_string()),
                size_pt: Some(40.0),
                bold: Some(true),
                italic: None,
                color: Some(accent),
            },
            footer: RunFormat {
                font: Some(SERIF.to_string()),
                size_pt: Some(10.0),
                ..RunFormat::default()
            },
            alert: Rgb(0xC0, 0x00, 0x00),
            numbering_suffix: "space".to_string(),
        }
    }
}

/// Normalise a style name or id for comparison: `"Heading 1"`, `"heading 1"`
/// and `"Heading1"` all map to `"heading1"`.
pub fn style_key(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Heading level encoded in a style name (`"heading 3"` → `Some(3)`).
pub fn heading_level(style_name: &str) -> Option<u8> {
    let key = style_key(style_name);
    let level = key.strip_prefix("heading")?.parse::<u8>().ok()?;
    (1..=9).contains(&level).then_some(level)
}
