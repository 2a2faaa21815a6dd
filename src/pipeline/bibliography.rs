//! Chapter-wide bibliography consolidation.
//!
//! Section files each carry their own `thebibliography` list. The lists are
//! cut out during normalization, merged by citation key (first one seen
//! wins) and emitted once at the end of the chapter.

use super::scan;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// One `\bibitem` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    pub key: String,
    /// Optional `[label]` printed instead of the entry number.
    pub label: Option<String>,
    /// Entry text with whitespace runs collapsed to single spaces.
    pub text: String,
}

/// References collected across every section of one chapter, in first-seen
/// order.
#[derive(Debug, Clone, Default)]
pub struct ReferenceAccumulator {
    entries: IndexMap<String, Reference>,
}

impl ReferenceAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a reference. Returns `false` (and keeps the earlier text) when
    /// the key is already known.
    pub fn insert(&mut self, reference: Reference) -> bool {
        if self.entries.contains_key(&reference.key) {
            debug!("Duplicate bibliography key '{}' ignored", reference.key);
            return false;
        }
        self.entries.insert(reference.key.clone(), reference);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|r| r.text.as_str())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// The consolidated `thebibliography` block, or `None` when no section
    /// had any references.
    pub fn render(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let mut out = format!(
            "\\begin{{thebibliography}}{{{}}}\n",
            width_label(self.entries.len())
        );
        for reference in self.entries.values() {
            let label = reference
                .label
                .as_deref()
                .map(|l| format!("[{l}]"))
                .unwrap_or_default();
            out.push_str(&format!(
                "\\bibitem{label}{{{}}} {}\n",
                reference.key, reference.text
            ));
        }
        out.push_str("\\end{thebibliography}\n");
        Some(out)
    }
}

/// Widest label LaTeX has to reserve room for: `9`, `99`, `999`, ...
fn width_label(count: usize) -> String {
    "9".repeat(count.to_string().len())
}

/// Remove every `thebibliography` environment from `src`, returning the
/// remaining text and the entries found, in order.
pub fn extract_references(src: &str) -> (String, Vec<Reference>) {
    let mut references = Vec::new();
    let mut edits = Vec::new();

    let mut from = 0;
    while let Some(begin) = scan::commands(&src[from..], "begin").next() {
        let begin_span = from + begin.span.start..from + begin.span.end;
        let is_bibliography = begin.argument(&src[from..]).trim() == "thebibliography";
        from = begin_span.end;
        if !is_bibliography {
            continue;
        }
        let Some(end) = scan::commands(&src[from..], "end")
            .find(|c| c.argument(&src[from..]).trim() == "thebibliography")
        else {
            break;
        };
        let body_end = from + end.span.start;
        let env_end = from + end.span.end;

        let body = skip_width_argument(&src[begin_span.end..body_end]);
        references.extend(parse_items(body));
        edits.push((begin_span.start..env_end, String::new()));
        from = env_end;
    }

    (scan::replace_spans(src, edits), references)
}

/// Skip the `{99}` width argument that follows `\begin{thebibliography}`.
fn skip_width_argument(body: &str) -> &str {
    let trimmed = body.trim_start();
    let offset = body.len() - trimmed.len();
    match scan::brace_group(body, offset) {
        Some(end) => &body[end..],
        None => body,
    }
}

fn parse_items(body: &str) -> Vec<Reference> {
    let items: Vec<scan::CommandMatch> = scan::commands(body, "bibitem").collect();
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let text_end = items
                .get(i + 1)
                .map(|next| next.span.start)
                .unwrap_or(body.len());
            let text = &body[item.span.end..text_end];
            Reference {
                key: item.argument(body).trim().to_string(),
                label: item.options(body).map(|l| l.trim().to_string()),
                text: RE_WHITESPACE.replace_all(text.trim(), " ").into_owned(),
            }
        })
        .collect()
}
