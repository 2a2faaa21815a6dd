//! Check a document's style table and headings against a [`StyleSheet`].
//!
//! Read-only counterpart of [`super::apply_publisher_style`]: nothing is
//! changed, every difference is listed so a styled document can be audited
//! after the fact (or after someone edited it in Word).

use super::{StyleRule, StyleSheet};
use crate::docx::{DocumentPort, StyleSnapshot};
use serde::{Deserialize, Serialize};

/// Half-point rounding in `w:sz` makes sizes exact to 0.5 pt.
const SIZE_TOLERANCE_PT: f32 = 0.25;

/// One style property whose stored value differs from its rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleMismatch {
    /// Style name as declared in the sheet.
    pub style: String,
    /// `font`, `size`, `bold`, `italic`, `color` or `alignment`.
    pub property: String,
    pub expected: String,
    /// `"unset"` when the style does not carry the property at all.
    pub actual: String,
}

/// Result of [`verify_styles`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleVerification {
    /// Sheet styles found in the document and compared.
    pub checked: Vec<String>,
    /// Sheet styles the document does not define.
    pub missing: Vec<String>,
    pub mismatches: Vec<StyleMismatch>,
    /// Heading paragraphs whose text still contains a tab.
    pub headings_with_tabs: Vec<String>,
}

impl StyleVerification {
    /// `true` when every defined style matches and no heading has a tab.
    /// Missing styles do not count: compilers only emit what they use.
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.headings_with_tabs.is_empty()
    }
}

/// Compare every rule of `sheet` with the matching style in `doc`.
pub fn verify_styles(doc: &dyn DocumentPort, sheet: &StyleSheet) -> StyleVerification {
    let mut result = StyleVerification::default();
    for (name, rule) in &sheet.rules {
        match doc.style(name) {
            Some(snapshot) => {
                compare(name, rule, &snapshot, &mut result.mismatches);
                result.checked.push(name.clone());
            }
            None => result.missing.push(name.clone()),
        }
    }
    result.headings_with_tabs = doc
        .find_paragraphs(&|p| p.heading_level().is_some() && p.text.contains('\t'))
        .into_iter()
        .map(|p| p.text)
        .collect();
    result
}

fn compare(name: &str, rule: &StyleRule, snapshot: &StyleSnapshot, out: &mut Vec<StyleMismatch>) {
    let mut check = |property: &str, expected: String, actual: Option<String>, same: bool| {
        if !same {
            out.push(StyleMismatch {
                style: name.to_string(),
                property: property.to_string(),
                expected,
                actual: actual.unwrap_or_else(|| "unset".to_string()),
            });
        }
    };

    check(
        "font",
        rule.font.clone(),
        snapshot.font.clone(),
        snapshot.font.as_deref() == Some(rule.font.as_str()),
    );
    check(
        "size",
        format!("{}pt", rule.size_pt),
        snapshot.size_pt.map(|s| format!("{s}pt")),
        snapshot
            .size_pt
            .is_some_and(|s| (s - rule.size_pt).abs() < SIZE_TOLERANCE_PT),
    );
    check(
        "bold",
        rule.bold.to_string(),
        Some(snapshot.bold.to_string()),
        snapshot.bold == rule.bold,
    );
    check(
        "italic",
        rule.italic.to_string(),
        Some(snapshot.italic.to_string()),
        snapshot.italic == rule.italic,
    );
    let expected_color = rule.color.hex();
    check(
        "color",
        expected_color.clone(),
        snapshot.color.clone(),
        snapshot
            .color
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(&expected_color)),
    );
    if let (Some(alignment), false) = (rule.alignment, snapshot.character) {
        check(
            "alignment",
            alignment.as_jc().to_string(),
            snapshot.alignment.map(|a| a.as_jc().to_string()),
            snapshot.alignment == Some(alignment),
        );
    }
}
