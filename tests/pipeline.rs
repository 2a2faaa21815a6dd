//! End-to-end chapter conversion with a stand-in compiler, so pandoc is not
//! needed. The fake writes a small DOCX shaped like pandoc output and keeps
//! the sources it was given.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tex2docx::{
    convert_book_with, BookMetadata, Chapter, ChapterSelection, CompileRequest, ConversionConfig,
    DocumentCompiler, DocumentPort, DocxDocument, DocxPackage, Section, StyleSheet, StyleWarning,
    Tex2DocxError,
};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";

fn para(style: &str, text: &str) -> String {
    format!(
        r#"<w:p><w:pPr><w:pStyle w:val="{style}"/></w:pPr><w:r><w:t xml:space="preserve">{text}</w:t></w:r></w:p>"#
    )
}

fn plain(text: &str) -> String {
    format!(r#"<w:p><w:r><w:t>{text}</w:t></w:r></w:p>"#)
}

fn styles_xml() -> String {
    let styles: String = [
        ("Normal", "Normal"),
        ("BodyText", "Body Text"),
        ("FirstParagraph", "First Paragraph"),
        ("Heading1", "heading 1"),
        ("Heading2", "heading 2"),
        ("Heading3", "heading 3"),
        ("ImageCaption", "Image Caption"),
    ]
    .iter()
    .map(|(id, name)| {
        format!(
            r#"<w:style w:type="paragraph" w:styleId="{id}"><w:name w:val="{name}"/><w:rPr><w:rFonts w:asciiTheme="majorHAnsi"/></w:rPr></w:style>"#
        )
    })
    .collect();
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><w:styles xmlns:w="{W_NS}">{styles}</w:styles>"#)
}

fn pandoc_like_docx(body: &str) -> DocxPackage {
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="{W_NS}"><w:body>{body}<w:sectPr><w:pgSz w:w="12240" w:h="15840"/><w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440"/></w:sectPr></w:body></w:document>"#
    );
    DocxPackage::from_entries(vec![
        (
            "[Content_Types].xml".into(),
            br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/></Types>"#.to_vec(),
        ),
        ("word/document.xml".into(), document.into_bytes()),
        (
            "word/_rels/document.xml.rels".into(),
            br#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#.to_vec(),
        ),
        ("word/styles.xml".into(), styles_xml().into_bytes()),
        ("word/media/rId20.png".into(), vec![0x89, b'P', b'N', b'G']),
    ])
}

/// Records each request and writes a fixed pandoc-like document.
#[derive(Default)]
struct FakeCompiler {
    sources: Mutex<Vec<String>>,
    requests: Mutex<Vec<CompileRequest>>,
}

impl DocumentCompiler for FakeCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<(), Tex2DocxError> {
        let source = std::fs::read_to_string(&request.input).map_err(|e| {
            Tex2DocxError::ConversionFailed {
                input: request.input.clone(),
                detail: e.to_string(),
            }
        })?;
        let body = [
            plain("CHAPTER 1"),
            plain("Intro Chapter"),
            para("Heading1", "Intro Chapter"),
            para("Heading2", "1.1\tFoundations"),
            para("FirstParagraph", "Body text."),
            para("Heading3", "Conclusion"),
            plain("[[FIGURE-DETAIL]] Missing image: figures/radar.png"),
            para("Heading1", "Appendix"),
            para("Heading3", "1.2.4 Conclusion"),
        ]
        .concat();
        pandoc_like_docx(&body).save(&request.output)?;

        self.sources.lock().expect("lock").push(source);
        self.requests.lock().expect("lock").push(request.clone());
        Ok(())
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let root = dir.path().to_path_buf();
        let chapter = root.join("tex").join("Chapter_1");
        std::fs::create_dir_all(chapter.join("images")).expect("mkdir");
        std::fs::write(chapter.join("images").join("figure_1_1_arch.png"), b"png").expect("img");

        write(
            &chapter.join("Section_1.1.tex"),
            "\\section{Foundations:}\nAs \\citet{lee} shows in Figure 1.1, e.g. here.\n\
             \\begin{figure}[h]\n\\includegraphics[width=\\linewidth]{figures/figure_1_1.png}\n\
             \\caption{Architecture.}\n\\label{fig:arch}\n\\end{figure}\n\
             \\begin{thebibliography}{9}\n\\bibitem{lee} A. Lee, 2021.\n\\end{thebibliography}\n",
        );
        write(
            &chapter.join("Section_1.2.tex"),
            "\\section{Results}\n``Fast'' vs. slow.\n\
             \\begin{figure}\n% Placeholder: Radar chart\n\\includegraphics{figures/radar.png}\n\
             \\caption{Radar}\n\\end{figure}\n% Image Prompt: a radar chart\n\
             \\begin{thebibliography}{9}\n\\bibitem{lee} A.  Lee,\n 2021.\n\\bibitem{kim} B. Kim.\n\\end{thebibliography}\n",
        );
        // Not in the metadata; must not be confused with 1.1.
        write(&chapter.join("Section_1.10.tex"), "\\section{Stray}\n");

        Self { _dir: dir, root }
    }

    fn config(&self, apply_styles: bool) -> ConversionConfig {
        ConversionConfig::builder()
            .latex_root(self.root.join("tex"))
            .output_dir(self.root.join("out"))
            .apply_styles(apply_styles)
            .build()
            .expect("config")
    }
}

fn write(path: &Path, text: &str) {
    std::fs::write(path, text).expect("write");
}

fn book() -> BookMetadata {
    BookMetadata {
        book_title: "Test Book".into(),
        chapters: vec![Chapter {
            number: 1,
            title: "Intro Chapter".into(),
            sections: vec![
                Section {
                    number: "1.1".into(),
                    title: "Foundations".into(),
                    file_path: String::new(),
                },
                Section {
                    number: "1.2".into(),
                    title: "Results".into(),
                    file_path: String::new(),
                },
            ],
        }],
    }
}

#[test]
fn test_chapter_source_is_normalized_and_assembled() {
    let fx = Fixture::new();
    let compiler = FakeCompiler::default();
    let output = convert_book_with(&book(), &fx.config(false), &compiler).expect("convert");

    let chapter = &output.chapters[0];
    assert_eq!(chapter.tex_path, fx.root.join("out").join("C01_Intro_Chapter.tex"));
    assert_eq!(chapter.docx_path, fx.root.join("out").join("C01_Intro_Chapter.docx"));
    assert!(chapter.docx_path.exists());
    assert!(chapter.style.is_none());

    let source = std::fs::read_to_string(&chapter.tex_path).expect("tex");
    assert_eq!(compiler.sources.lock().expect("lock")[0], source);

    assert!(source.starts_with("\\begin{flushright}\nCHAPTER 1\n"));
    assert!(source.contains("\\chapter{Intro Chapter}\n"));
    assert!(source.contains("\\section{Foundations}"));
    assert!(source.contains("As  shows in \\textit{Figure 1.1}, for example here."));
    assert!(source.contains("\\includegraphics[width=\\linewidth]{figure_1_1_arch.png}"));
    assert!(source.contains("\\caption{Architecture}"));
    assert!(source.contains("\"Fast\" versus slow."));
    assert!(source.contains(
        "[[FIGURE-DETAIL]] Missing image: figures/radar.png\\\\\nPlaceholder: Radar chart\\\\\nPrompt: a radar chart\\\\\nCaption: Radar\n\\par"
    ));
    assert!(!source.contains("Stray"));

    // Sections in metadata order, bibliography once at the end.
    let s1 = source.find("\\section{Foundations}").expect("1.1");
    let s2 = source.find("\\section{Results}").expect("1.2");
    assert!(s1 < s2);
    assert_eq!(source.matches("\\begin{thebibliography}").count(), 1);
    assert!(source.ends_with(
        "\\begin{thebibliography}{9}\n\\bibitem{lee} A. Lee, 2021.\n\\bibitem{kim} B. Kim.\n\\end{thebibliography}\n\n"
    ));

    let request = &compiler.requests.lock().expect("lock")[0];
    assert_eq!(request.resource_paths.len(), 2);
    assert!(request.resource_paths[0].ends_with("Chapter_1"));
    assert!(request.resource_paths[1].ends_with("Chapter_1/images"));
    assert!(request.resource_paths[0].is_absolute());

    assert_eq!(output.stats.sections, 2);
    assert_eq!(output.stats.resolved_images, 1);
    assert_eq!(output.stats.missing_images, 1);
    assert_eq!(output.stats.references, 2);
    assert_eq!(chapter.sections[0].number, "1.1");
    assert_eq!(chapter.sections[0].references_extracted, 1);
    assert_eq!(chapter.sections[1].missing_images, vec!["figures/radar.png"]);
}

#[test]
fn test_compiled_document_is_restyled() {
    let fx = Fixture::new();
    let compiler = FakeCompiler::default();
    let output = convert_book_with(&book(), &fx.config(true), &compiler).expect("convert");

    let chapter = &output.chapters[0];
    let style = chapter.style.as_ref().expect("style report");
    assert!(style.removed_duplicate_heading);
    assert!(style.promoted_conclusion);
    assert_eq!(style.recolored_annotations, 1);
    assert!(!style.warnings.contains(&StyleWarning::TitleBlockMissing));
    // The fake package has no numbering part.
    assert!(style
        .warnings
        .iter()
        .any(|w| matches!(w, StyleWarning::MissingPart { part, .. } if part.contains("numbering"))));

    let doc = DocxDocument::open(&chapter.docx_path).expect("open");
    let xml = doc.part_xml("word/document.xml").expect("document");
    assert_eq!(xml.matches("Intro Chapter").count(), 1);
    assert!(xml.contains("Appendix"));
    assert!(xml.contains("1.1 Foundations"));
    assert!(!xml.contains("[[FIGURE-DETAIL]]"));
    assert!(xml.contains(r#"w:w="11906""#));
    assert!(xml.contains(r#"w:h="16838""#));

    let package = doc.into_package();
    assert_eq!(
        package.get("word/media/rId20.png"),
        Some(&[0x89, b'P', b'N', b'G'][..])
    );
}

const STYLED_PARTS: [&str; 3] = ["word/document.xml", "word/styles.xml", "word/footer1.xml"];

fn styled_parts(doc: &DocxDocument) -> Vec<Option<String>> {
    STYLED_PARTS.iter().map(|p| doc.part_xml(p)).collect()
}

#[test]
fn test_restyling_twice_changes_nothing() {
    let fx = Fixture::new();
    let compiler = FakeCompiler::default();
    let output = convert_book_with(&book(), &fx.config(true), &compiler).expect("convert");
    let path = &output.chapters[0].docx_path;

    let first = DocxDocument::open(path).expect("open");
    let paragraphs = first.paragraphs();
    let before = styled_parts(&first);

    let report = tex2docx::restyle_document(path, &StyleSheet::default()).expect("restyle");
    let second = DocxDocument::open(path).expect("reopen");

    assert_eq!(second.paragraphs(), paragraphs);
    assert_eq!(styled_parts(&second), before);
    assert!(!report.removed_duplicate_heading);
    assert!(!report.promoted_conclusion);
    assert_eq!(report.fixed_headings, 0);

    // The appendix heading and the earlier conclusion survive both runs.
    let headings: Vec<(String, Option<u8>)> = paragraphs
        .iter()
        .filter(|p| p.heading_level().is_some())
        .map(|p| (p.text.clone(), p.heading_level()))
        .collect();
    assert_eq!(
        headings,
        vec![
            ("1.1 Foundations".to_string(), Some(2)),
            ("Conclusion".to_string(), Some(3)),
            ("Appendix".to_string(), Some(1)),
            ("Conclusion".to_string(), Some(2)),
        ]
    );
    let footer = before[2].as_deref().expect("footer");
    assert_eq!(footer.matches(" PAGE ").count(), 1);
}

#[test]
fn test_verify_reports_unstyled_and_accepts_restyled_document() {
    let fx = Fixture::new();
    let output = convert_book_with(&book(), &fx.config(false), &FakeCompiler::default())
        .expect("convert");
    let path = &output.chapters[0].docx_path;
    let sheet = StyleSheet::default();

    let raw = tex2docx::verify_document(path, &sheet).expect("verify");
    assert!(!raw.is_clean());
    assert!(raw
        .mismatches
        .iter()
        .any(|m| m.style == "Heading 1" && m.property == "font" && m.actual == "unset"));
    assert_eq!(raw.headings_with_tabs, vec!["1.1\tFoundations".to_string()]);

    tex2docx::restyle_document(path, &sheet).expect("restyle");
    let styled = tex2docx::verify_document(path, &sheet).expect("verify");
    assert!(styled.is_clean(), "{:?}", styled.mismatches);
    assert_eq!(styled.checked.len(), 7);
    assert!(styled.missing.contains(&"Source Code".to_string()));
    assert!(!styled.missing.contains(&"Heading 3".to_string()));
}

#[test]
fn test_missing_section_file_is_fatal() {
    let fx = Fixture::new();
    let mut metadata = book();
    metadata.chapters[0].sections.push(Section {
        number: "1.3".into(),
        title: "Missing".into(),
        file_path: String::new(),
    });
    let compiler = FakeCompiler::default();
    let err = convert_book_with(&metadata, &fx.config(true), &compiler).unwrap_err();
    assert!(matches!(err, Tex2DocxError::MissingSectionFile { ref section, .. } if section == "1.3"));
    assert!(compiler.requests.lock().expect("lock").is_empty());
}

#[test]
fn test_unknown_chapter_is_fatal() {
    let fx = Fixture::new();
    let config = ConversionConfig::builder()
        .latex_root(fx.root.join("tex"))
        .output_dir(fx.root.join("out"))
        .chapters(ChapterSelection::Single(4))
        .build()
        .expect("config");
    let err = convert_book_with(&book(), &config, &FakeCompiler::default()).unwrap_err();
    assert!(matches!(err, Tex2DocxError::ChapterNotFound { chapter: 4 }));
}

#[test]
fn test_missing_chapter_directory_is_fatal() {
    let fx = Fixture::new();
    let mut metadata = book();
    metadata.chapters[0].number = 2;
    let err = convert_book_with(&metadata, &fx.config(true), &FakeCompiler::default()).unwrap_err();
    assert!(matches!(err, Tex2DocxError::MissingDirectory { .. }));
}
