//! Content normalization: deterministic rewrites of one section's LaTeX.
//!
//! Section files come from several authors and tools. Before they can be
//! concatenated into one chapter and handed to pandoc, authoring leftovers
//! have to go (citation keys that point nowhere, `[cite: ..]` notes), figure
//! paths have to point at files that exist, per-section bibliographies have
//! to move into the chapter-wide list, and the publisher's house style has
//! to be applied to the prose.
//!
//! ## Rule Order
//!
//! Rules run in the order of [`RULES`]. Citations are stripped before the
//! italicization rule so that `Figure~\ref{..}` never becomes an empty
//! `\textit{Figure~}`; figure blocks are resolved before bare graphics so an
//! image inside a figure is only counted once.

use super::bibliography::{self, ReferenceAccumulator};
use super::images::ImageIndex;
use super::scan;
use crate::style::passes::FIGURE_DETAIL_MARKER;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

/// State shared by the rules while one section is normalized.
///
/// The image index and reference accumulator are chapter-scoped; the
/// counters describe the current section only.
pub struct RuleContext<'a> {
    pub images: &'a ImageIndex,
    pub references: &'a mut ReferenceAccumulator,
    /// Graphic references rewritten to an indexed file.
    pub resolved_images: usize,
    /// Graphic paths of figure blocks replaced by an annotation.
    pub missing_images: Vec<String>,
    /// `\bibitem` entries cut out of the section.
    pub references_extracted: usize,
}

impl<'a> RuleContext<'a> {
    pub fn new(images: &'a ImageIndex, references: &'a mut ReferenceAccumulator) -> Self {
        Self {
            images,
            references,
            resolved_images: 0,
            missing_images: Vec::new(),
            references_extracted: 0,
        }
    }
}

/// A rewrite rule: section text in, section text out.
pub type RuleFn = fn(&str, &mut RuleContext<'_>) -> String;

/// A named rewrite rule.
#[derive(Clone, Copy)]
pub struct Rule {
    pub name: &'static str,
    pub apply: RuleFn,
}

/// Every rule, in the order it runs.
pub const RULES: &[Rule] = &[
    Rule {
        name: "strip_citations",
        apply: strip_citations,
    },
    Rule {
        name: "resolve_figure_blocks",
        apply: resolve_figure_blocks,
    },
    Rule {
        name: "resolve_inline_images",
        apply: resolve_inline_images,
    },
    Rule {
        name: "extract_bibliography",
        apply: extract_bibliography,
    },
    Rule {
        name: "publisher_phrasing",
        apply: publisher_phrasing,
    },
    Rule {
        name: "typography",
        apply: typography,
    },
];

/// Run every rule over `src`.
pub fn normalize(src: &str, ctx: &mut RuleContext<'_>) -> String {
    RULES.iter().fold(src.to_string(), |text, rule| {
        let out = (rule.apply)(&text, ctx);
        if out != text {
            debug!(
                "Rule {} changed section text ({} -> {} bytes)",
                rule.name,
                text.len(),
                out.len()
            );
        }
        out
    })
}

/// Escape text so LaTeX prints it literally.
pub fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

// ── Rule 1: Strip citations and authoring notes ──────────────────────────────

static RE_CITATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:cite|citep|citet|ref)(?:\[[^\]]*\])?\{[^}]+\}|\[cite:[^\]]+\]|\[cite_start\]")
        .unwrap()
});

fn strip_citations(src: &str, _ctx: &mut RuleContext<'_>) -> String {
    RE_CITATION.replace_all(src, "").into_owned()
}

// ── Rule 2: Resolve figure blocks ────────────────────────────────────────────

fn resolve_figure_blocks(src: &str, ctx: &mut RuleContext<'_>) -> String {
    let mut edits = Vec::new();
    for block in scan::figure_blocks(src) {
        let Some(graphic) = &block.graphic else {
            continue;
        };
        match ctx.images.resolve(&graphic.path) {
            Some(file) => {
                ctx.resolved_images += 1;
                edits.push((
                    graphic.span.clone(),
                    graphic_command(graphic.options.as_deref(), file),
                ));
            }
            None => {
                warn!("Image not found for figure: {}", graphic.path);
                ctx.missing_images.push(graphic.path.clone());
                edits.push((block.span.clone(), missing_figure_annotation(&block, &graphic.path)));
            }
        }
    }
    scan::replace_spans(src, edits)
}

fn graphic_command(options: Option<&str>, file: &str) -> String {
    match options {
        Some(opts) => format!("\\includegraphics[{opts}]{{{file}}}"),
        None => format!("\\includegraphics{{{file}}}"),
    }
}

/// One paragraph, one line per known detail. The style post-processor
/// recognises the marker and recolors the paragraph.
fn missing_figure_annotation(block: &scan::FigureBlock, path: &str) -> String {
    let mut lines = vec![format!(
        "{FIGURE_DETAIL_MARKER} Missing image: {}",
        escape_latex(path)
    )];
    if let Some(placeholder) = &block.placeholder {
        lines.push(format!("Placeholder: {}", escape_latex(placeholder)));
    }
    if let Some(label) = &block.label {
        lines.push(format!("Label: {}", escape_latex(label)));
    }
    if let Some(prompt) = &block.prompt {
        lines.push(format!("Prompt: {}", escape_latex(prompt)));
    }
    if let Some(caption) = &block.caption {
        lines.push(format!("Caption: {caption}"));
    }
    format!("\\par\\noindent {}\n\\par", lines.join("\\\\\n"))
}

// ── Rule 3: Resolve bare graphics ────────────────────────────────────────────

/// Graphics outside figure blocks. Unresolved ones are left alone.
fn resolve_inline_images(src: &str, ctx: &mut RuleContext<'_>) -> String {
    let blocks: Vec<_> = scan::figure_blocks(src)
        .into_iter()
        .map(|b| b.span)
        .collect();
    let mut edits = Vec::new();
    for g in scan::commands(src, "includegraphics") {
        if blocks.iter().any(|span| span.contains(&g.span.start)) {
            continue;
        }
        let path = g.argument(src).trim();
        match ctx.images.resolve(path) {
            Some(file) => {
                ctx.resolved_images += 1;
                edits.push((g.span.clone(), graphic_command(g.options(src), file)));
            }
            None => debug!("Inline image left unresolved: {path}"),
        }
    }
    scan::replace_spans(src, edits)
}

// ── Rule 4: Extract bibliography ─────────────────────────────────────────────

fn extract_bibliography(src: &str, ctx: &mut RuleContext<'_>) -> String {
    let (text, references) = bibliography::extract_references(src);
    ctx.references_extracted += references.len();
    for reference in references {
        ctx.references.insert(reference);
    }
    text
}

// ── Rule 5: Publisher phrasing ───────────────────────────────────────────────

static RE_EG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\be\.g\.").unwrap());
static RE_VS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bvs\.").unwrap());
static RE_REF_EXPLICIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(Figure|Table)\s+(\d+\.\d+)").unwrap());
static RE_REF_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(Figure|Table)(~|\s+)(\\(?:autoref|cref|Cref|ref)\{[^}]+\})").unwrap()
});

const TITLE_COMMANDS: [&str; 4] = ["section", "subsection", "subsubsection", "paragraph"];

fn publisher_phrasing(src: &str, _ctx: &mut RuleContext<'_>) -> String {
    let s = RE_EG.replace_all(src, "for example");
    let s = RE_VS.replace_all(&s, "versus");
    let s = strip_title_colons(&s);
    let s = strip_caption_periods(&s);
    let s = italicize(&s, &RE_REF_EXPLICIT, |caps| {
        format!("\\textit{{{} {}}}", &caps[1], &caps[2])
    });
    italicize(&s, &RE_REF_COMMAND, |caps| {
        format!("\\textit{{{}{}{}}}", &caps[1], &caps[2], &caps[3])
    })
}

fn strip_title_colons(src: &str) -> String {
    let edits = TITLE_COMMANDS
        .iter()
        .flat_map(|name| scan::commands(src, name))
        .filter_map(|cmd| {
            let title = cmd.argument(src).trim_end();
            let stripped = title.strip_suffix(':')?;
            Some((cmd.argument.clone(), stripped.trim_end().to_string()))
        })
        .collect();
    scan::replace_spans(src, edits)
}

fn strip_caption_periods(src: &str) -> String {
    let edits = scan::commands(src, "caption")
        .filter_map(|cmd| {
            let caption = cmd.argument(src).trim_end();
            let stripped = caption.strip_suffix('.')?;
            Some((cmd.argument.clone(), stripped.to_string()))
        })
        .collect();
    scan::replace_spans(src, edits)
}

/// Wrap matches in `\textit{..}` unless they already sit in one.
fn italicize(src: &str, re: &Regex, wrap: impl Fn(&Captures) -> String) -> String {
    re.replace_all(src, |caps: &Captures| {
        let start = caps.get(0).map_or(0, |m| m.start());
        if src[..start].ends_with("\\textit{") {
            caps[0].to_string()
        } else {
            wrap(caps)
        }
    })
    .into_owned()
}

// ── Rule 6: Typography ───────────────────────────────────────────────────────

fn typography(src: &str, _ctx: &mut RuleContext<'_>) -> String {
    // The mis-decoded em dash ends in U+201D, so it goes before the quotes.
    src.replace("\u{00E2}\u{20AC}\u{201D}", "-")
        .replace('\u{2014}', "-")
        .replace("``", "\"")
        .replace("''", "\"")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace("**", "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(rule: RuleFn, src: &str) -> String {
        let images = ImageIndex::from_filenames(["figure_1_2_arch.png", "logo.PNG"]);
        let mut refs = ReferenceAccumulator::new();
        let mut ctx = RuleContext::new(&images, &mut refs);
        rule(src, &mut ctx)
    }

    #[test]
    fn test_rule_order() {
        let names: Vec<&str> = RULES.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            [
                "strip_citations",
                "resolve_figure_blocks",
                "resolve_inline_images",
                "extract_bibliography",
                "publisher_phrasing",
                "typography"
            ]
        );
    }

    #[test]
    fn test_strip_citations() {
        let out = run(
            strip_citations,
            r"See \cite{a} and \citep[p.~3]{b}\ref{fig:x}.[cite: 3][cite_start]Done \autoref{t}",
        );
        assert_eq!(out, r"See  and .Done \autoref{t}");
    }

    #[test]
    fn test_figure_block_found_rewrites_path_only() {
        let src = "\\begin{figure}\n\\includegraphics[width=0.8\\linewidth]{figures/Figure_1_2.png}\n\\caption{Arch.}\n\\end{figure}\n% Image Prompt: a diagram\nNext.";
        let images = ImageIndex::from_filenames(["figure_1_2_arch.png"]);
        let mut refs = ReferenceAccumulator::new();
        let mut ctx = RuleContext::new(&images, &mut refs);
        let out = resolve_figure_blocks(src, &mut ctx);
        assert_eq!(
            out,
            "\\begin{figure}\n\\includegraphics[width=0.8\\linewidth]{figure_1_2_arch.png}\n\\caption{Arch.}\n\\end{figure}\n% Image Prompt: a diagram\nNext."
        );
        assert_eq!(ctx.resolved_images, 1);
        assert!(ctx.missing_images.is_empty());
    }

    #[test]
    fn test_figure_block_missing_becomes_annotation() {
        let src = "Intro.\n\\begin{figure}[h]\n% Placeholder: Radar chart\n\\includegraphics{missing_fig.png}\n\\caption{Radar \\emph{view}}\n\\label{fig:radar}\n\\end{figure}\n% Image Prompt: radar, 50% opacity\nAfter.";
        let images = ImageIndex::from_filenames(["other.png"]);
        let mut refs = ReferenceAccumulator::new();
        let mut ctx = RuleContext::new(&images, &mut refs);
        let out = resolve_figure_blocks(src, &mut ctx);
        assert_eq!(
            out,
            "Intro.\n\\par\\noindent [[FIGURE-DETAIL]] Missing image: missing\\_fig.png\\\\\nPlaceholder: Radar chart\\\\\nLabel: fig:radar\\\\\nPrompt: radar, 50\\% opacity\\\\\nCaption: Radar \\emph{view}\n\\par\nAfter."
        );
        assert_eq!(ctx.missing_images, vec!["missing_fig.png".to_string()]);
        assert_eq!(ctx.resolved_images, 0);
    }

    #[test]
    fn test_figure_without_graphic_is_unchanged() {
        let src = "\\begin{figure}\\caption{Only text}\\end{figure}";
        assert_eq!(run(resolve_figure_blocks, src), src);
    }

    #[test]
    fn test_inline_images() {
        let src = r"A \includegraphics[height=1em]{img/logo.svg} and \includegraphics{nowhere}.";
        let out = run(resolve_inline_images, src);
        assert_eq!(
            out,
            r"A \includegraphics[height=1em]{logo.PNG} and \includegraphics{nowhere}."
        );
    }

    #[test]
    fn test_inline_rule_skips_figure_blocks() {
        let src = "\\begin{figure}\\includegraphics{logo}\\end{figure}";
        let images = ImageIndex::from_filenames(["logo.PNG"]);
        let mut refs = ReferenceAccumulator::new();
        let mut ctx = RuleContext::new(&images, &mut refs);
        assert_eq!(resolve_inline_images(src, &mut ctx), src);
        assert_eq!(ctx.resolved_images, 0);
    }

    #[test]
    fn test_phrasing_abbreviations() {
        let out = run(publisher_phrasing, "E.g. speed vs. cost, e.g., latency.");
        assert_eq!(out, "for example speed versus cost, for example, latency.");
    }

    #[test]
    fn test_phrasing_titles_and_captions() {
        let src = "\\section{Results:}\n\\subsection*{Setup: }\n\\paragraph{Note}\n\\caption{A \\textbf{bold} view.}";
        let out = run(publisher_phrasing, src);
        assert_eq!(
            out,
            "\\section{Results}\n\\subsection*{Setup}\n\\paragraph{Note}\n\\caption{A \\textbf{bold} view}"
        );
    }

    #[test]
    fn test_phrasing_italicizes_references_once() {
        let src = r"See Figure 1.2 and Table~\cref{tab:x}.";
        let once = run(publisher_phrasing, src);
        assert_eq!(
            once,
            r"See \textit{Figure 1.2} and \textit{Table~\cref{tab:x}}."
        );
        assert_eq!(run(publisher_phrasing, &once), once);
    }

    #[test]
    fn test_typography() {
        let out = run(
            typography,
            "``quoted'' \u{201C}curly\u{201D} a\u{2014}b c\u{00E2}\u{20AC}\u{201D}d **bold**",
        );
        assert_eq!(out, "\"quoted\" \"curly\" a-b c-d bold");
    }

    #[test]
    fn test_normalize_full_section() {
        let src = "\\section{Intro:}\nAs shown in [cite: 4]Figure 1.2, e.g. here\\cite{x}.\n\\begin{figure}\\includegraphics{figure_1_2.png}\\end{figure}\n\\begin{thebibliography}{9}\n\\bibitem{x} X. Author.\n\\end{thebibliography}\n";
        let images = ImageIndex::from_filenames(["figure_1_2_arch.png"]);
        let mut refs = ReferenceAccumulator::new();
        let mut ctx = RuleContext::new(&images, &mut refs);
        let out = normalize(src, &mut ctx);
        assert_eq!(
            out,
            "\\section{Intro}\nAs shown in \\textit{Figure 1.2}, for example here.\n\\begin{figure}\\includegraphics{figure_1_2_arch.png}\\end{figure}\n\n"
        );
        assert_eq!(ctx.resolved_images, 1);
        assert_eq!(ctx.references_extracted, 1);
        assert_eq!(refs.get("x"), Some("X. Author."));
    }

    #[test]
    fn test_escape_latex() {
        assert_eq!(
            escape_latex(r"50% of $x_1 & {y} #2 ~ ^ \"),
            r"50\% of \$x\_1 \& \{y\} \#2 \textasciitilde{} \textasciicircum{} \textbackslash{}"
        );
    }
}
