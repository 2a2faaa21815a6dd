//! Chapter assembly: title page, normalized sections and the consolidated
//! bibliography, concatenated into the one source text pandoc compiles.
//!
//! The title page is plain right-aligned text rather than a `\chapter`
//! heading so the style post-processor can find it as the first two
//! paragraphs of the compiled document.

use super::normalize::escape_latex;
use std::path::{Path, PathBuf};

/// Source for the chapter title page, table of contents and chapter heading.
pub fn title_unit(number: u32, title: &str) -> String {
    let title = escape_latex(title);
    format!(
        "\\begin{{flushright}}\n\
         CHAPTER {number}\n\
         \\par\n\
         \\vspace{{0.5cm}}\n\
         {title}\n\
         \\end{{flushright}}\n\
         \\thispagestyle{{empty}}\n\
         \\newpage\n\
         \\tableofcontents\n\
         \\newpage\n\
         \\chapter{{{title}}}\n"
    )
}

/// Concatenate units in order, each followed by a newline.
pub fn assemble<S: AsRef<str>>(units: &[S]) -> String {
    let mut out = String::with_capacity(units.iter().map(|u| u.as_ref().len() + 1).sum());
    for unit in units {
        out.push_str(unit.as_ref());
        out.push('\n');
    }
    out
}

/// Keep alphanumerics, space, `_` and `-`, trim, then turn spaces into `_`.
pub fn sanitize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect::<String>()
        .trim()
        .replace(' ', "_")
}

/// `C<NN>_<Sanitized_Title>` without extension.
pub fn output_stem(number: u32, title: &str) -> String {
    format!("C{number:02}_{}", sanitize_title(title))
}

/// Where the assembled source and the compiled document of a chapter go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub tex: PathBuf,
    pub docx: PathBuf,
}

impl OutputPaths {
    pub fn new(output_dir: &Path, number: u32, title: &str) -> Self {
        let stem = output_stem(number, title);
        Self {
            tex: output_dir.join(format!("{stem}.tex")),
            docx: output_dir.join(format!("{stem}.docx")),
        }
    }
}
