//! Book metadata: which chapters exist and which sections each one holds.
//!
//! The canonical form is `metadata.json`. It can be generated from the
//! manuscript outline with [`BookMetadata::from_outline`]:
//!
//! ```text
//! **Book Title:** Production Machine Learning
//! ### Chapter 1: From Notebooks to Systems
//! * **1.1 The Identity Crisis**
//! * **1.2. Shipping Models**
//! ```

use crate::error::Tex2DocxError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The whole book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookMetadata {
    #[serde(default = "default_book_title")]
    pub book_title: String,
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

fn default_book_title() -> String {
    "Book".to_string()
}

/// One chapter, with sections in reading order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub number: u32,
    pub title: String,
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// One section. `file_path` is informational; the file actually read is
/// found by [`crate::pipeline::discover`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Dotted number such as `"1.2"`.
    pub number: String,
    pub title: String,
    #[serde(default)]
    pub file_path: String,
}

impl Chapter {
    /// `<latex_root>/Chapter_<n>`.
    pub fn directory(&self, latex_root: &Path) -> PathBuf {
        latex_root.join(format!("Chapter_{}", self.number))
    }
}

impl BookMetadata {
    /// Read `metadata.json`.
    pub fn load(path: &Path) -> Result<Self, Tex2DocxError> {
        let text = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Tex2DocxError::MetadataNotFound {
                path: path.to_path_buf(),
            },
            _ => Tex2DocxError::Internal(format!("reading '{}': {e}", path.display())),
        })?;
        let metadata: Self =
            serde_json::from_str(&text).map_err(|e| Tex2DocxError::MetadataParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        debug!(
            "Loaded metadata for '{}' ({} chapters)",
            metadata.book_title,
            metadata.chapters.len()
        );
        Ok(metadata)
    }

    /// Write pretty-printed JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), Tex2DocxError> {
        let write_err = |e| Tex2DocxError::OutputWriteFailed {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Tex2DocxError::Internal(format!("serialising metadata: {e}")))?;
        std::fs::write(path, json + "\n").map_err(write_err)
    }

    pub fn chapter(&self, number: u32) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.number == number)
    }

    /// Parse a manuscript outline. Section file paths point at
    /// `<latex_root>/Chapter_<n>/Section_<n.m>.tex`.
    pub fn from_outline(text: &str, latex_root: &str) -> Self {
        let mut book = BookMetadata {
            book_title: "Untitled Book".to_string(),
            chapters: Vec::new(),
        };

        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if let Some((_, title)) = line.split_once(BOOK_TITLE_MARKER) {
                book.book_title = title.trim().to_string();
            } else if line.starts_with("### Chapter") {
                match RE_CHAPTER.captures(line) {
                    Some(caps) => match caps[1].parse() {
                        Ok(number) => book.chapters.push(Chapter {
                            number,
                            title: caps[2].trim().to_string(),
                            sections: Vec::new(),
                        }),
                        Err(_) => warn!("Chapter number out of range: {line}"),
                    },
                    None => warn!("Could not parse chapter line: {line}"),
                }
            } else if line.starts_with("* **") {
                // Bold list items before the first chapter are not sections.
                let Some(chapter) = book.chapters.last_mut() else {
                    continue;
                };
                if let Some(caps) = RE_SECTION.captures(line) {
                    let number = caps[1].trim_end_matches('.').to_string();
                    chapter.sections.push(Section {
                        file_path: format!(
                            "{latex_root}/Chapter_{}/Section_{number}.tex",
                            chapter.number
                        ),
                        number,
                        title: caps[2].trim().to_string(),
                    });
                }
            }
        }
        book
    }
}

const BOOK_TITLE_MARKER: &str = "**Book Title:**";

static RE_CHAPTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^### Chapter\s*(\d+)[:\s]*(.*)$").unwrap());
static RE_SECTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*\s*\*\*([\d.]+)\s+(.*?)\*\*").unwrap());
