//! Image index: map the graphic paths written by authors to the image files
//! that actually exist in a chapter directory.
//!
//! Authors reference figures loosely (`figures/Figure_1_2.png` while the file
//! on disk is `figure_1_2_pipeline.jpg`). Lookup is by lower-cased,
//! extension-free basename; when that misses, a `figure_<n>_<m>` prefix is
//! tried.

use crate::error::Tex2DocxError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

static RE_FIGURE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^figure_\d+_\d+").unwrap());

/// Lookup tables from reference names to filenames.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    exact: HashMap<String, String>,
    prefix: HashMap<String, String>,
}

impl ImageIndex {
    /// Index the given filenames. The first filename wins for each key, so
    /// callers pass names in a deterministic order.
    pub fn from_filenames<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::default();
        for name in names {
            index.insert(name.as_ref());
        }
        index
    }

    /// Index the files of `chapter_dir` and then of its `images_subdir`.
    ///
    /// Each directory is read in sorted order; a missing images directory is
    /// not an error.
    pub fn scan(chapter_dir: &Path, images_subdir: &str) -> Result<Self, Tex2DocxError> {
        let mut names = sorted_file_names(chapter_dir)?;
        let images_dir = chapter_dir.join(images_subdir);
        if images_dir.is_dir() {
            names.extend(sorted_file_names(&images_dir)?);
        }
        let index = Self::from_filenames(&names);
        debug!(
            "Indexed {} image candidates in {}",
            index.exact.len(),
            chapter_dir.display()
        );
        Ok(index)
    }

    fn insert(&mut self, file_name: &str) {
        let key = reference_key(file_name);
        if let Some(m) = RE_FIGURE_PREFIX.find(&key) {
            self.prefix
                .entry(m.as_str().to_string())
                .or_insert_with(|| file_name.to_string());
        }
        self.exact
            .entry(key)
            .or_insert_with(|| file_name.to_string());
    }

    /// The indexed filename for a graphic reference, if any.
    pub fn resolve(&self, reference: &str) -> Option<&str> {
        let key = reference_key(reference);
        if let Some(found) = self.exact.get(&key) {
            return Some(found);
        }
        let prefix = RE_FIGURE_PREFIX.find(&key)?;
        self.prefix.get(prefix.as_str()).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.exact.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

/// Lower-cased basename without extension. Both `/` and `\` separate
/// directories, whatever the host platform.
fn reference_key(reference: &str) -> String {
    let base = reference
        .trim()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    let stem = match base.rfind('.') {
        Some(dot) if dot > 0 => &base[..dot],
        _ => base,
    };
    stem.to_lowercase()
}

fn sorted_file_names(dir: &Path) -> Result<Vec<String>, Tex2DocxError> {
    let entries = std::fs::read_dir(dir).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Tex2DocxError::MissingDirectory {
            path: dir.to_path_buf(),
        },
        _ => Tex2DocxError::SectionProcessing {
            path: dir.to_path_buf(),
            source: e,
        },
    })?;

    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_ignores_case_extension_and_directories() {
        let index = ImageIndex::from_filenames(["Pipeline.PNG", "other.jpg"]);
        assert_eq!(index.resolve("figures/pipeline.pdf"), Some("Pipeline.PNG"));
        assert_eq!(index.resolve(r"figures\sub\PIPELINE"), Some("Pipeline.PNG"));
        assert_eq!(index.resolve("missing.png"), None);
    }

    #[test]
    fn test_prefix_match_when_exact_misses() {
        let index = ImageIndex::from_filenames(["figure_1_2_block_diagram.png"]);
        assert_eq!(
            index.resolve("figure_1_2.png"),
            Some("figure_1_2_block_diagram.png")
        );
        assert_eq!(
            index.resolve("Figure_1_2_old_name.jpg"),
            Some("figure_1_2_block_diagram.png")
        );
        assert_eq!(index.resolve("figure_1_3.png"), None);
    }

    #[test]
    fn test_exact_match_beats_prefix() {
        let index =
            ImageIndex::from_filenames(["figure_2_1_a.png", "figure_2_1_b.png", "figure_2_1.jpg"]);
        assert_eq!(index.resolve("figure_2_1_b"), Some("figure_2_1_b.png"));
        assert_eq!(index.resolve("figure_2_1.png"), Some("figure_2_1.jpg"));
        // Prefix lookups take the first file in the given order.
        assert_eq!(index.resolve("figure_2_1_zzz"), Some("figure_2_1_a.png"));
    }

    #[test]
    fn test_scan_prefers_chapter_dir_over_images_subdir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("diagram.png"), b"top").expect("write");
        std::fs::create_dir(dir.path().join("images")).expect("mkdir");
        std::fs::write(dir.path().join("images").join("Diagram.jpg"), b"sub").expect("write");
        std::fs::write(dir.path().join("images").join("figure_4_1_x.png"), b"sub").expect("write");

        let index = ImageIndex::scan(dir.path(), "images").expect("scan");
        assert_eq!(index.resolve("diagram"), Some("diagram.png"));
        assert_eq!(index.resolve("figure_4_1.png"), Some("figure_4_1_x.png"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_scan_missing_directory() {
        let err = ImageIndex::scan(Path::new("/no/such/chapter"), "images").unwrap_err();
        assert!(matches!(err, Tex2DocxError::MissingDirectory { .. }));
    }
}
