//! Section discovery: find the source file for a section number inside a
//! chapter directory.
//!
//! Metadata names sections by number (`1.2`), while files on disk follow
//! whatever convention the author used: `Section_1.2.tex`,
//! `section-1.2-draft.tex`, `SECTION 1.2.tex`. Matching is a
//! case-insensitive `section<sep><number>` where the number must not be
//! followed by another digit, so `1.1` never picks up `Section_1.10.tex`.

use crate::error::Tex2DocxError;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Resolve the single file in `dir` that holds section `number`.
pub fn find_section_file(dir: &Path, number: &str) -> Result<PathBuf, Tex2DocxError> {
    let pattern = section_pattern(number)?;
    let mut candidates: Vec<String> = list_files(dir)?
        .into_iter()
        .filter(|name| pattern.is_match(name))
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => Err(Tex2DocxError::MissingSectionFile {
            section: number.to_string(),
            dir: dir.to_path_buf(),
        }),
        1 => {
            let path = dir.join(&candidates[0]);
            debug!("Section {} -> {}", number, path.display());
            Ok(path)
        }
        _ => Err(Tex2DocxError::AmbiguousSectionFile {
            section: number.to_string(),
            dir: dir.to_path_buf(),
            candidates,
        }),
    }
}

fn section_pattern(number: &str) -> Result<Regex, Tex2DocxError> {
    let escaped = regex::escape(number.trim());
    Regex::new(&format!(r"(?i)section[\s._]*{escaped}(\D|$)"))
        .map_err(|e| Tex2DocxError::Internal(format!("section pattern for '{number}': {e}")))
}

fn list_files(dir: &Path) -> Result<Vec<String>, Tex2DocxError> {
    if !dir.is_dir() {
        return Err(Tex2DocxError::MissingDirectory {
            path: dir.to_path_buf(),
        });
    }
    let entries = std::fs::read_dir(dir).map_err(|e| Tex2DocxError::SectionProcessing {
        path: dir.to_path_buf(),
        source: e,
    })?;
    Ok(entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect())
}
