//! A small recursive-descent scanner over LaTeX source.
//!
//! Only the handful of constructs the normalizer rewrites are recognised:
//! commands with an optional `[..]` argument and a mandatory `{..}` argument,
//! `figure` environments with their trailing image-prompt comment, and
//! comment lines. Brace groups nest to any depth, `\{`/`\}` are escapes and
//! `%` starts a comment that runs to the end of the line.
//!
//! All positions are byte offsets into the scanned string.

use std::ops::Range;

/// One `\name[options]{argument}` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMatch {
    /// Span of the whole command, backslash to closing brace.
    pub span: Range<usize>,
    /// `\name*` form.
    pub starred: bool,
    /// Span of the optional argument, without brackets.
    pub options: Option<Range<usize>>,
    /// Span of the mandatory argument, without braces.
    pub argument: Range<usize>,
}

impl CommandMatch {
    pub fn argument<'a>(&self, src: &'a str) -> &'a str {
        &src[self.argument.clone()]
    }

    pub fn options<'a>(&self, src: &'a str) -> Option<&'a str> {
        self.options.clone().map(|r| &src[r])
    }
}

/// An `\includegraphics` inside a figure block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Graphic {
    /// Span of the whole command in the scanned source.
    pub span: Range<usize>,
    pub options: Option<String>,
    pub path: String,
}

/// A `figure`/`figure*` environment plus an optional trailing
/// `% Image Prompt: ...` comment line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FigureBlock {
    /// From `\begin` to the end of the prompt line (or of `\end{figure}`).
    pub span: Range<usize>,
    pub graphic: Option<Graphic>,
    pub caption: Option<String>,
    pub label: Option<String>,
    /// Text of a `% Placeholder:` or `% Description:` comment in the block.
    pub placeholder: Option<String>,
    /// Text after `Image Prompt:` in the trailing comment.
    pub prompt: Option<String>,
}

/// End of the line containing `at` (the offset of the `'\n'`, or `src.len()`).
fn line_end(src: &str, at: usize) -> usize {
    src[at..].find('\n').map(|n| at + n).unwrap_or(src.len())
}

/// Offset just past the `}` matching the `{` at `open`.
pub fn brace_group(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    if bytes.get(open) != Some(&b'{') {
        return None;
    }
    let mut depth = 0usize;
    let mut i = open;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'%' => {
                i = line_end(src, i);
                continue;
            }
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Offset just past the `]` closing the optional argument at `open`.
/// Brackets inside a brace group do not count.
fn bracket_group(src: &str, open: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    if bytes.get(open) != Some(&b'[') {
        return None;
    }
    let mut i = open + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'{' => i = brace_group(src, i)?,
            b']' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

fn skip_whitespace(src: &str, mut i: usize) -> usize {
    let bytes = src.as_bytes();
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i
}

/// Offset of the next `\name` at or after `from`, outside comments.
/// `\name` must not continue with a letter, so `cite` does not match
/// `\citep`.
pub fn find_command(src: &str, name: &str, from: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = from;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => i = line_end(src, i),
            b'\\' => {
                let rest = &src[i + 1..];
                if rest.starts_with(name)
                    && !rest[name.len()..].starts_with(|c: char| c.is_ascii_alphabetic())
                {
                    return Some(i);
                }
                i += 2;
            }
            _ => i += 1,
        }
    }
    None
}

/// Parse `\name*[options]{argument}` starting at the backslash at `at`.
pub fn parse_command(src: &str, name: &str, at: usize) -> Option<CommandMatch> {
    let mut i = at + 1 + name.len();
    if !src[at..].starts_with('\\') || !src[at + 1..].starts_with(name) {
        return None;
    }
    let starred = src[i..].starts_with('*');
    if starred {
        i += 1;
    }
    i = skip_whitespace(src, i);
    let mut options = None;
    if src[i..].starts_with('[') {
        let end = bracket_group(src, i)?;
        options = Some(i + 1..end - 1);
        i = skip_whitespace(src, end);
    }
    let end = brace_group(src, i)?;
    Some(CommandMatch {
        span: at..end,
        starred,
        options,
        argument: i + 1..end - 1,
    })
}

/// Every well-formed `\name...{..}` in `src`, in order. Malformed
/// occurrences (no argument, unbalanced braces) are skipped.
pub fn commands<'a>(src: &'a str, name: &'a str) -> impl Iterator<Item = CommandMatch> + 'a {
    let mut from = 0;
    std::iter::from_fn(move || {
        while let Some(at) = find_command(src, name, from) {
            match parse_command(src, name, at) {
                Some(found) => {
                    from = found.span.end;
                    return Some(found);
                }
                None => from = at + 1,
            }
        }
        None
    })
}

/// Find every figure block in `src`.
pub fn figure_blocks(src: &str) -> Vec<FigureBlock> {
    let mut blocks = Vec::new();
    let mut from = 0;
    while let Some(begin) = commands(&src[from..], "begin").next() {
        let begin_at = from + begin.span.start;
        let env = begin.argument(&src[from..]).trim().to_string();
        from += begin.span.end;
        if env != "figure" && env != "figure*" {
            continue;
        }

        let Some(end) = commands(&src[from..], "end").find(|c| c.argument(&src[from..]).trim() == env)
        else {
            break;
        };
        let environment_end = from + end.span.end;
        let body = &src[begin_at..environment_end];
        let (prompt, block_end) = trailing_prompt(src, environment_end);
        blocks.push(parse_block(body, begin_at, prompt, block_end));
        from = block_end;
    }
    blocks
}

/// `% Image Prompt: ...` directly after an environment, separated only by
/// whitespace. Returns the prompt and the end of its line.
fn trailing_prompt(src: &str, after: usize) -> (Option<String>, usize) {
    let start = skip_whitespace(src, after);
    let Some(comment) = src[start..].strip_prefix('%') else {
        return (None, after);
    };
    let text = comment.trim_start();
    let label = "image prompt:";
    let is_prompt = text
        .get(..label.len())
        .map(|head| head.eq_ignore_ascii_case(label))
        .unwrap_or(false);
    if !is_prompt {
        return (None, after);
    }
    let end = line_end(src, start);
    let line = &src[start..end];
    let prompt = line
        .split_once(':')
        .map(|(_, rest)| rest.trim().to_string())
        .unwrap_or_default();
    (Some(prompt), end)
}

fn parse_block(
    body: &str,
    offset: usize,
    prompt: Option<String>,
    block_end: usize,
) -> FigureBlock {
    let graphic = commands(body, "includegraphics").next().map(|g| Graphic {
        span: offset + g.span.start..offset + g.span.end,
        options: g.options(body).map(str::to_string),
        path: g.argument(body).trim().to_string(),
    });
    let caption = commands(body, "caption")
        .next()
        .map(|c| c.argument(body).trim().to_string());
    let label = commands(body, "label")
        .next()
        .map(|c| c.argument(body).trim().to_string());

    let placeholder = body
        .lines()
        .filter_map(|line| line.trim_start().strip_prefix('%'))
        .map(|c| c.trim_start_matches('%').trim())
        .find_map(|c| {
            let (key, value) = c.split_once(':')?;
            let key = key.trim().to_ascii_lowercase();
            (key == "placeholder" || key == "description").then(|| value.trim().to_string())
        });

    FigureBlock {
        span: offset..block_end,
        graphic,
        caption,
        label,
        placeholder,
        prompt,
    }
}

/// Apply non-overlapping `(span, replacement)` edits to `src`.
pub fn replace_spans(src: &str, mut edits: Vec<(Range<usize>, String)>) -> String {
    edits.sort_by_key(|(span, _)| span.start);
    let mut out = String::with_capacity(src.len());
    let mut last = 0;
    for (span, replacement) in edits {
        if span.start < last {
            continue;
        }
        out.push_str(&src[last..span.start]);
        out.push_str(&replacement);
        last = span.end;
    }
    out.push_str(&src[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_brace_group_nesting_and_escapes() {
        let src = r"{a {b} \} {c {d}}} tail";
        assert_eq!(brace_group(src, 0), Some(src.find(" tail").unwrap()));
        assert_eq!(brace_group("{open", 0), None);
        assert_eq!(brace_group("x{}", 0), None);
    }

    #[test]
    fn test_brace_group_ignores_comments() {
        let src = "{a % } not closing\n b}";
        assert_eq!(brace_group(src, 0), Some(src.len()));
    }

    #[test]
    fn test_find_command_respects_name_boundary() {
        let src = r"\citep{a} \cite{b}";
        assert_eq!(find_command(src, "cite", 0), Some(10));
        assert_eq!(find_command(src, "citep", 0), Some(0));
    }

    #[test]
    fn test_find_command_skips_comments() {
        let src = "% \\caption{old}\n\\caption{new}";
        let at = find_command(src, "caption", 0).unwrap();
        assert_eq!(parse_command(src, "caption", at).unwrap().argument(src), "new");
    }

    #[test]
    fn test_parse_command_with_options_and_star() {
        let src = r"\section*{Intro:} \includegraphics[width=0.5\textwidth]{img/fig.png}";
        let section = commands(src, "section").next().unwrap();
        assert!(section.starred);
        assert_eq!(section.argument(src), "Intro:");

        let g = commands(src, "includegraphics").next().unwrap();
        assert_eq!(g.options(src), Some(r"width=0.5\textwidth"));
        assert_eq!(g.argument(src), "img/fig.png");
    }

    #[test]
    fn test_caption_with_nested_braces() {
        let src = r"\caption{The \textbf{bold {nested}} value.}";
        let c = commands(src, "caption").next().unwrap();
        assert_eq!(c.argument(src), r"The \textbf{bold {nested}} value.");
        assert_eq!(c.span.end, src.len());
    }

    #[test]
    fn test_figure_block_fields() {
        let src = "Before.\n\\begin{figure}[h]\n\\centering\n% Placeholder: A block diagram\n\\includegraphics[width=\\linewidth]{figures/figure_1_2.png}\n\\caption{Overview of {the} system.}\n\\label{fig:overview}\n\\end{figure}\n% Image Prompt: draw a diagram\nAfter.";
        let blocks = figure_blocks(src);
        assert_eq!(blocks.len(), 1);
        let b = &blocks[0];
        assert_eq!(&src[b.span.clone()][..13], "\\begin{figure");
        assert!(src[b.span.clone()].ends_with("draw a diagram"));
        assert_eq!(b.prompt.as_deref(), Some("draw a diagram"));
        assert_eq!(b.placeholder.as_deref(), Some("A block diagram"));
        assert_eq!(b.caption.as_deref(), Some("Overview of {the} system."));
        assert_eq!(b.label.as_deref(), Some("fig:overview"));
        let g = b.graphic.as_ref().unwrap();
        assert_eq!(g.path, "figures/figure_1_2.png");
        assert_eq!(g.options.as_deref(), Some("width=\\linewidth"));
        assert!(src[g.span.clone()].starts_with("\\includegraphics"));
    }

    #[test]
    fn test_starred_figure_and_no_prompt() {
        let src = "\\begin{figure*}\\includegraphics{a}\\end{figure*}\n% unrelated comment";
        let blocks = figure_blocks(src);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].prompt, None);
        assert!(src[blocks[0].span.clone()].ends_with("\\end{figure*}"));
    }

    #[test]
    fn test_other_environments_are_not_figures() {
        let src = "\\begin{table}\\caption{T}\\end{table}\\begin{figure}\\caption{F}\\end{figure}";
        let blocks = figure_blocks(src);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].caption.as_deref(), Some("F"));
        assert!(blocks[0].graphic.is_none());
    }

    #[test]
    fn test_replace_spans_in_order() {
        let out = replace_spans("abcdef", vec![(4..5, "E".into()), (0..1, "A".into())]);
        assert_eq!(out, "AbcdEf");
    }
}
