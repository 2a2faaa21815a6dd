//! [`DocumentPort`] over a DOCX package.

use super::package::DocxPackage;
use super::xml::{Element, Node, XmlDocument};
use super::{DocumentPort, FieldKind, ParagraphId, ParagraphInfo, StyleSnapshot};
use crate::error::{StyleWarning, Tex2DocxError};
use crate::style::{style_key, Alignment, PageLayout, RunFormat, StyleRule};
use std::path::Path;
use tracing::debug;

const DOCUMENT_PART: &str = "word/document.xml";
const STYLES_PART: &str = "word/styles.xml";
const NUMBERING_PART: &str = "word/numbering.xml";
const RELS_PART: &str = "word/_rels/document.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const R_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
const FOOTER_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer";
const FOOTER_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.footer+xml";

// Child sequences from the WordprocessingML schema. New children are inserted
// at their schema position so Word accepts the result.

const STYLE_ORDER: &[&str] = &[
    "w:name", "w:aliases", "w:basedOn", "w:next", "w:link", "w:autoRedefine", "w:hidden",
    "w:uiPriority", "w:semiHidden", "w:unhideWhenUsed", "w:qFormat", "w:locked", "w:personal",
    "w:personalCompose", "w:personalReply", "w:rsid", "w:pPr", "w:rPr", "w:tblPr", "w:trPr",
    "w:tcPr", "w:tblStylePr",
];

const PPR_ORDER: &[&str] = &[
    "w:pStyle", "w:keepNext", "w:keepLines", "w:pageBreakBefore", "w:framePr",
    "w:widowControl", "w:numPr", "w:suppressLineNumbers", "w:pBdr", "w:shd", "w:tabs",
    "w:suppressAutoHyphens", "w:kinsoku", "w:wordWrap", "w:overflowPunct", "w:topLinePunct",
    "w:autoSpaceDE", "w:autoSpaceDN", "w:bidi", "w:adjustRightInd", "w:snapToGrid",
    "w:spacing", "w:ind", "w:contextualSpacing", "w:mirrorIndents", "w:suppressOverlap",
    "w:jc", "w:textDirection", "w:textAlignment", "w:textboxTightWrap", "w:outlineLvl",
    "w:divId", "w:cnfStyle", "w:rPr", "w:sectPr", "w:pPrChange",
];

const RPR_ORDER: &[&str] = &[
    "w:rStyle", "w:rFonts", "w:b", "w:bCs", "w:i", "w:iCs", "w:caps", "w:smallCaps",
    "w:strike", "w:dstrike", "w:outline", "w:shadow", "w:emboss", "w:imprint", "w:noProof",
    "w:snapToGrid", "w:vanish", "w:webHidden", "w:color", "w:spacing", "w:w", "w:kern",
    "w:position", "w:sz", "w:szCs", "w:highlight", "w:u", "w:effect", "w:bdr", "w:shd",
    "w:fitText", "w:vertAlign", "w:rtl", "w:cs", "w:em", "w:lang", "w:eastAsianLayout",
    "w:specVanish", "w:oMath",
];

const SECTPR_ORDER: &[&str] = &[
    "w:headerReference", "w:footerReference", "w:footnotePr", "w:endnotePr", "w:type",
    "w:pgSz", "w:pgMar", "w:paperSrc", "w:pgBorders", "w:lnNumType", "w:pgNumType", "w:cols",
    "w:formProt", "w:vAlign", "w:noEndnote", "w:titlePg", "w:textDirection", "w:bidi",
    "w:rtlGutter", "w:docGrid", "w:printerSettings", "w:sectPrChange",
];

const LVL_ORDER: &[&str] = &[
    "w:start", "w:numFmt", "w:lvlRestart", "w:pStyle", "w:isLgl", "w:suff", "w:lvlText",
    "w:lvlPicBulletId", "w:legacy", "w:lvlJc", "w:pPr", "w:rPr",
];

/// Paragraph and run property containers always come first.
const PARAGRAPH_ORDER: &[&str] = &["w:pPr"];
const RUN_ORDER: &[&str] = &["w:rPr"];

/// An editable DOCX document.
///
/// The parts the style passes edit are parsed once on open and written back on
/// [`save`](Self::save); every other part is carried through untouched.
#[derive(Debug, Clone)]
pub struct DocxDocument {
    package: DocxPackage,
    document: XmlDocument,
    styles: Option<XmlDocument>,
    numbering: Option<XmlDocument>,
    rels: Option<XmlDocument>,
    content_types: XmlDocument,
    /// Footer parts loaded or created during editing, by part name.
    footers: Vec<(String, XmlDocument)>,
}

impl DocxDocument {
    /// Open and parse a DOCX file.
    pub fn open(path: &Path) -> Result<Self, Tex2DocxError> {
        let package = DocxPackage::open(path)?;
        Self::from_package(package)
    }

    /// Parse the editable parts of an in-memory package.
    pub fn from_package(package: DocxPackage) -> Result<Self, Tex2DocxError> {
        let document = parse_required(&package, DOCUMENT_PART)?;
        let content_types = parse_required(&package, CONTENT_TYPES_PART)?;
        let styles = parse_optional(&package, STYLES_PART)?;
        let numbering = parse_optional(&package, NUMBERING_PART)?;
        let rels = parse_optional(&package, RELS_PART)?;

        if document.root.child("w:body").is_none() {
            return Err(Tex2DocxError::DocumentMalformed {
                part: DOCUMENT_PART.into(),
                detail: "no w:body element".into(),
            });
        }

        debug!(
            "Opened document: styles={}, numbering={}, rels={}",
            styles.is_some(),
            numbering.is_some(),
            rels.is_some()
        );

        Ok(Self {
            package,
            document,
            styles,
            numbering,
            rels,
            content_types,
            footers: Vec::new(),
        })
    }

    /// Write every edited part back into the package.
    pub fn into_package(self) -> DocxPackage {
        let mut package = self.package;
        package.put(DOCUMENT_PART, self.document.to_xml().into_bytes());
        package.put(CONTENT_TYPES_PART, self.content_types.to_xml().into_bytes());
        if let Some(styles) = self.styles {
            package.put(STYLES_PART, styles.to_xml().into_bytes());
        }
        if let Some(numbering) = self.numbering {
            package.put(NUMBERING_PART, numbering.to_xml().into_bytes());
        }
        if let Some(rels) = self.rels {
            package.put(RELS_PART, rels.to_xml().into_bytes());
        }
        for (name, footer) in self.footers {
            package.put(&name, footer.to_xml().into_bytes());
        }
        package
    }

    /// Save to `path` (atomically).
    pub fn save(self, path: &Path) -> Result<(), Tex2DocxError> {
        self.into_package().save(path)
    }

    /// Current serialised XML of a part, reflecting unsaved edits.
    pub fn part_xml(&self, name: &str) -> Option<String> {
        match name {
            DOCUMENT_PART => Some(self.document.to_xml()),
            CONTENT_TYPES_PART => Some(self.content_types.to_xml()),
            STYLES_PART => self.styles.as_ref().map(XmlDocument::to_xml),
            NUMBERING_PART => self.numbering.as_ref().map(XmlDocument::to_xml),
            RELS_PART => self.rels.as_ref().map(XmlDocument::to_xml),
            _ => self
                .footers
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, doc)| doc.to_xml())
                .or_else(|| self.package.get_text(name)),
        }
    }

    fn body(&self) -> &Element {
        // Checked in `from_package`.
        self.document
            .root
            .child("w:body")
            .unwrap_or(&self.document.root)
    }

    fn body_mut(&mut self) -> &mut Element {
        if self.document.root.child("w:body").is_some() {
            self.document.root.ensure_child("w:body", &[])
        } else {
            &mut self.document.root
        }
    }

    fn paragraph_mut(&mut self, id: ParagraphId) -> Option<&mut Element> {
        self.body_mut()
            .elements_mut()
            .filter(|e| e.name == "w:p")
            .nth(id)
    }

    fn find_style_element(&self, name: &str) -> Option<&Element> {
        let styles = self.styles.as_ref()?;
        find_style(&styles.root, name)
    }

    /// Display name for a style id.
    fn style_display_name(&self, style_id: &str) -> String {
        self.styles
            .as_ref()
            .and_then(|s| {
                s.root
                    .children_named("w:style")
                    .find(|st| st.attr("w:styleId") == Some(style_id))
            })
            .and_then(|st| st.child("w:name"))
            .and_then(|n| n.attr("w:val"))
            .unwrap_or(style_id)
            .to_string()
    }

    fn paragraph_info(&self, id: ParagraphId, p: &Element) -> ParagraphInfo {
        let ppr = p.child("w:pPr");
        let style_name = ppr
            .and_then(|ppr| ppr.child("w:pStyle"))
            .and_then(|s| s.attr("w:val"))
            .map(|style_id| self.style_display_name(style_id));
        let mut text = String::new();
        collect_visible_text(p, &mut text);
        ParagraphInfo {
            id,
            style_name,
            text,
            has_graphic: p.contains_descendant("w:drawing") || p.contains_descendant("w:pict"),
            has_numbering: ppr.map(|ppr| ppr.child("w:numPr").is_some()).unwrap_or(false),
            alignment: ppr
                .and_then(|ppr| ppr.child("w:jc"))
                .and_then(|jc| jc.attr("w:val"))
                .and_then(Alignment::from_jc),
        }
    }

    /// Resolve the default footer of the last section to a part name,
    /// creating the footer part and its relationship when there is none.
    fn default_footer_part(&mut self) -> String {
        let existing = self
            .body()
            .child("w:sectPr")
            .and_then(|sect| {
                let refs: Vec<&Element> = sect.children_named("w:footerReference").collect();
                refs.iter()
                    .find(|r| r.attr("w:type") == Some("default"))
                    .or_else(|| refs.first())
                    .and_then(|r| r.attr("r:id"))
                    .map(str::to_string)
            })
            .and_then(|rid| self.relationship_target(&rid));

        if let Some(part) = existing {
            return part;
        }
        self.create_footer_part()
    }

    fn relationship_target(&self, rid: &str) -> Option<String> {
        let rels = self.rels.as_ref()?;
        let target = rels
            .root
            .children_named("Relationship")
            .find(|r| r.attr("Id") == Some(rid))?
            .attr("Target")?;
        Some(match target.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("word/{target}"),
        })
    }

    fn create_footer_part(&mut self) -> String {
        let mut n = 1;
        while self.package.contains(&format!("word/footer{n}.xml"))
            || self.footers.iter().any(|(name, _)| *name == format!("word/footer{n}.xml"))
        {
            n += 1;
        }
        let file_name = format!("footer{n}.xml");
        let part_name = format!("word/{file_name}");

        let rels = self.rels.get_or_insert_with(|| {
            XmlDocument::new(Element::new("Relationships").with_attr("xmlns", RELS_NS))
        });
        let next_id = rels
            .root
            .children_named("Relationship")
            .filter_map(|r| r.attr("Id")?.strip_prefix("rId")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        let rid = format!("rId{next_id}");
        rels.root.children.push(Node::Element(
            Element::new("Relationship")
                .with_attr("Id", rid.as_str())
                .with_attr("Type", FOOTER_REL_TYPE)
                .with_attr("Target", file_name.as_str()),
        ));

        self.content_types.root.children.push(Node::Element(
            Element::new("Override")
                .with_attr("PartName", format!("/{part_name}"))
                .with_attr("ContentType", FOOTER_CONTENT_TYPE),
        ));

        if self.document.root.attr("xmlns:r").is_none() {
            self.document.root.set_attr("xmlns:r", R_NS);
        }
        let body = self.body_mut();
        let sect = body.ensure_child("w:sectPr", &[]);
        let reference = Element::new("w:footerReference")
            .with_attr("w:type", "default")
            .with_attr("r:id", rid.as_str());
        let idx = sect
            .children
            .iter()
            .position(|n| matches!(n, Node::Element(e) if e.name != "w:headerReference"))
            .unwrap_or(sect.children.len());
        sect.children.insert(idx, Node::Element(reference));

        let footer = Element::new("w:ftr")
            .with_attr("xmlns:w", W_NS)
            .with_attr("xmlns:r", R_NS);
        self.footers.push((part_name.clone(), XmlDocument::new(footer)));
        debug!("Created footer part {} ({})", part_name, rid);
        part_name
    }

    fn load_footer(&mut self, part_name: &str) -> Result<usize, StyleWarning> {
        if let Some(idx) = self.footers.iter().position(|(n, _)| n == part_name) {
            return Ok(idx);
        }
        let doc = match self.package.get_text(part_name) {
            Some(xml) => XmlDocument::parse(&xml).map_err(|e| StyleWarning::MalformedElement {
                part: part_name.to_string(),
                detail: e.to_string(),
            })?,
            None => XmlDocument::new(
                Element::new("w:ftr")
                    .with_attr("xmlns:w", W_NS)
                    .with_attr("xmlns:r", R_NS),
            ),
        };
        self.footers.push((part_name.to_string(), doc));
        Ok(self.footers.len() - 1)
    }
}

impl DocumentPort for DocxDocument {
    fn style(&self, name: &str) -> Option<StyleSnapshot> {
        let style = self.find_style_element(name)?;
        let rpr = style.child("w:rPr");
        let ppr = style.child("w:pPr");
        Some(StyleSnapshot {
            style_id: style.attr("w:styleId").unwrap_or_default().to_string(),
            name: style
                .child("w:name")
                .and_then(|n| n.attr("w:val"))
                .unwrap_or_default()
                .to_string(),
            font: rpr
                .and_then(|r| r.child("w:rFonts"))
                .and_then(|f| f.attr("w:ascii"))
                .map(str::to_string),
            size_pt: rpr
                .and_then(|r| r.child("w:sz"))
                .and_then(|s| s.attr("w:val"))
                .and_then(|v| v.parse::<f32>().ok())
                .map(|half_points| half_points / 2.0),
            bold: rpr.and_then(|r| r.child("w:b")).map(is_on).unwrap_or(false),
            italic: rpr.and_then(|r| r.child("w:i")).map(is_on).unwrap_or(false),
            color: rpr
                .and_then(|r| r.child("w:color"))
                .and_then(|c| c.attr("w:val"))
                .map(str::to_string),
            alignment: ppr
                .and_then(|p| p.child("w:jc"))
                .and_then(|jc| jc.attr("w:val"))
                .and_then(Alignment::from_jc),
            character: style.attr("w:type") == Some("character"),
        })
    }

    fn set_style(&mut self, name: &str, rule: &StyleRule) -> Result<(), StyleWarning> {
        let Some(styles) = self.styles.as_mut() else {
            return Err(StyleWarning::MissingPart {
                part: STYLES_PART.into(),
                action: format!("style '{name}'"),
            });
        };
        let key = style_key(name);
        let style = styles
            .root
            .elements_mut()
            .filter(|e| e.name == "w:style")
            .find(|st| style_matches(st, &key))
            .ok_or_else(|| StyleWarning::UnknownStyle {
                name: name.to_string(),
            })?;

        let is_character_style = style.attr("w:type") == Some("character");
        if !is_character_style {
            let ppr = style.ensure_child("w:pPr", STYLE_ORDER);
            let spacing = ppr.ensure_child("w:spacing", PPR_ORDER);
            spacing.set_attr("w:before", twips(rule.space_before_pt).to_string());
            spacing.set_attr("w:after", twips(rule.space_after_pt).to_string());
            spacing.set_attr(
                "w:line",
                ((rule.line_spacing * 240.0).round() as u32).to_string(),
            );
            spacing.set_attr("w:lineRule", "auto");
            if let Some(alignment) = rule.alignment {
                ppr.ensure_child("w:jc", PPR_ORDER)
                    .set_attr("w:val", alignment.as_jc());
            }
        }

        let rpr = style.ensure_child("w:rPr", STYLE_ORDER);
        let mut format = rule.run_format();
        format.color = Some(rule.color);
        apply_run_format(rpr, &format);
        Ok(())
    }

    fn paragraphs(&self) -> Vec<ParagraphInfo> {
        self.body()
            .children_named("w:p")
            .enumerate()
            .map(|(id, p)| self.paragraph_info(id, p))
            .collect()
    }

    fn set_page_layout(&mut self, layout: &PageLayout) -> usize {
        let body = self.body_mut();
        if body.child("w:sectPr").is_none() {
            body.children.push(Node::Element(Element::new("w:sectPr")));
        }

        let width = layout.width_twips().to_string();
        let height = layout.height_twips().to_string();
        let margin = layout.margin_twips().to_string();
        let mut sections = 0;
        self.document.root.for_each_named_mut("w:sectPr", &mut |sect| {
            let size = sect.ensure_child("w:pgSz", SECTPR_ORDER);
            size.set_attr("w:w", width.as_str());
            size.set_attr("w:h", height.as_str());
            size.remove_attr("w:orient");

            let mar = sect.ensure_child("w:pgMar", SECTPR_ORDER);
            for side in ["w:top", "w:right", "w:bottom", "w:left"] {
                mar.set_attr(side, margin.as_str());
            }
            for (attr, default) in [("w:header", "720"), ("w:footer", "720"), ("w:gutter", "0")] {
                if mar.attr(attr).is_none() {
                    mar.set_attr(attr, default);
                }
            }
            sections += 1;
        });
        sections
    }

    fn set_numbering_suffix(&mut self, suffix: &str) -> Result<usize, StyleWarning> {
        let numbering = self.numbering.as_mut().ok_or_else(|| StyleWarning::MissingPart {
            part: NUMBERING_PART.into(),
            action: "numbering suffix".into(),
        })?;
        let mut levels = 0;
        numbering.root.for_each_named_mut("w:lvl", &mut |lvl| {
            lvl.ensure_child("w:suff", LVL_ORDER).set_attr("w:val", suffix);
            levels += 1;
        });
        Ok(levels)
    }

    fn insert_footer_field(
        &mut self,
        kind: FieldKind,
        format: &RunFormat,
    ) -> Result<bool, StyleWarning> {
        let part = self.default_footer_part();
        let idx = self.load_footer(&part)?;
        let footer = &mut self.footers[idx].1.root;
        if has_field(footer, kind) {
            return Ok(false);
        }

        let mut rpr = Element::new("w:rPr");
        apply_run_format(&mut rpr, format);
        let field = Element::new("w:fldSimple")
            .with_attr("w:instr", format!(" {} ", kind.keyword()))
            .with_child(
                Element::new("w:r")
                    .with_child(rpr)
                    .with_child(Element::new("w:t").with_text("1")),
            );
        first_paragraph(footer).children.push(Node::Element(field));
        debug!("Inserted {} field into {}", kind.keyword(), part);
        Ok(true)
    }

    fn set_footer_alignment(&mut self, alignment: Alignment) -> Result<(), StyleWarning> {
        let part = self.default_footer_part();
        let idx = self.load_footer(&part)?;
        first_paragraph(&mut self.footers[idx].1.root)
            .ensure_child("w:pPr", PARAGRAPH_ORDER)
            .ensure_child("w:jc", PPR_ORDER)
            .set_attr("w:val", alignment.as_jc());
        Ok(())
    }

    fn remove_paragraph(&mut self, id: ParagraphId) -> bool {
        let body = self.body_mut();
        let index = body
            .children
            .iter()
            .enumerate()
            .filter(|(_, n)| matches!(n, Node::Element(e) if e.name == "w:p"))
            .nth(id)
            .map(|(i, _)| i);
        match index {
            Some(i) => {
                body.children.remove(i);
                true
            }
            None => false,
        }
    }

    fn set_alignment(&mut self, id: ParagraphId, alignment: Alignment) -> bool {
        let Some(p) = self.paragraph_mut(id) else {
            return false;
        };
        p.ensure_child("w:pPr", PARAGRAPH_ORDER)
            .ensure_child("w:jc", PPR_ORDER)
            .set_attr("w:val", alignment.as_jc());
        true
    }

    fn set_paragraph_style(
        &mut self,
        id: ParagraphId,
        style_name: &str,
    ) -> Result<(), StyleWarning> {
        let style_id = self
            .find_style_element(style_name)
            .and_then(|st| st.attr("w:styleId"))
            .map(str::to_string)
            .ok_or_else(|| StyleWarning::UnknownStyle {
                name: style_name.to_string(),
            })?;
        let p = self
            .paragraph_mut(id)
            .ok_or_else(|| StyleWarning::MalformedElement {
                part: DOCUMENT_PART.into(),
                detail: format!("paragraph {id} does not exist"),
            })?;
        p.ensure_child("w:pPr", PARAGRAPH_ORDER)
            .ensure_child("w:pStyle", PPR_ORDER)
            .set_attr("w:val", style_id);
        Ok(())
    }

    fn set_paragraph_text(&mut self, id: ParagraphId, text: &str) -> bool {
        let Some(p) = self.paragraph_mut(id) else {
            return false;
        };
        // Only run properties count, not the paragraph mark's.
        let run_rpr = {
            let mut runs = Vec::new();
            p.descendants_named("w:r", &mut runs);
            runs.first().and_then(|r| r.child("w:rPr")).cloned()
        };

        let mut ppr = None;
        let mut starts = Vec::new();
        let mut ends = Vec::new();
        for node in p.children.drain(..) {
            if let Node::Element(e) = node {
                match e.name.as_str() {
                    "w:pPr" => ppr = Some(e),
                    "w:bookmarkStart" => starts.push(e),
                    "w:bookmarkEnd" => ends.push(e),
                    _ => {}
                }
            }
        }

        let mut run = Element::new("w:r");
        if let Some(rpr) = run_rpr {
            run = run.with_child(rpr);
        }
        for (i, line) in text.split('\n').enumerate() {
            if i > 0 {
                run = run.with_child(Element::new("w:br"));
            }
            run = run.with_child(
                Element::new("w:t")
                    .with_attr("xml:space", "preserve")
                    .with_text(line),
            );
        }

        p.children.extend(ppr.map(Node::Element));
        p.children.extend(starts.into_iter().map(Node::Element));
        p.children.push(Node::Element(run));
        p.children.extend(ends.into_iter().map(Node::Element));
        true
    }

    fn format_runs(&mut self, id: ParagraphId, format: &RunFormat) -> bool {
        let Some(p) = self.paragraph_mut(id) else {
            return false;
        };
        let before = p.clone();
        p.for_each_named_mut("w:r", &mut |run| {
            apply_run_format(run.ensure_child("w:rPr", RUN_ORDER), format);
        });
        *p != before
    }

    fn clear_numbering(&mut self, id: ParagraphId) -> bool {
        let Some(p) = self.paragraph_mut(id) else {
            return false;
        };
        match p.child_mut("w:pPr") {
            Some(ppr) => ppr.remove_children_named("w:numPr") > 0,
            None => false,
        }
    }
}

fn parse_required(package: &DocxPackage, part: &str) -> Result<XmlDocument, Tex2DocxError> {
    let xml = package
        .get_text(part)
        .ok_or_else(|| Tex2DocxError::DocumentMalformed {
            part: part.to_string(),
            detail: "part is missing".into(),
        })?;
    XmlDocument::parse(&xml).map_err(|e| Tex2DocxError::DocumentMalformed {
        part: part.to_string(),
        detail: e.to_string(),
    })
}

fn parse_optional(package: &DocxPackage, part: &str) -> Result<Option<XmlDocument>, Tex2DocxError> {
    if !package.contains(part) {
        return Ok(None);
    }
    parse_required(package, part).map(Some)
}

/// Find a style by display name first, then by id.
fn find_style<'a>(styles: &'a Element, name: &str) -> Option<&'a Element> {
    let key = style_key(name);
    let by_name = styles.children_named("w:style").find(|st| {
        st.child("w:name")
            .and_then(|n| n.attr("w:val"))
            .map(|v| style_key(v) == key)
            .unwrap_or(false)
    });
    by_name.or_else(|| {
        styles
            .children_named("w:style")
            .find(|st| st.attr("w:styleId").map(style_key).as_deref() == Some(key.as_str()))
    })
}

fn style_matches(style: &Element, key: &str) -> bool {
    let name_match = style
        .child("w:name")
        .and_then(|n| n.attr("w:val"))
        .map(|v| style_key(v) == key)
        .unwrap_or(false);
    name_match || style.attr("w:styleId").map(style_key).as_deref() == Some(key)
}

/// Toggle properties (`w:b`, `w:i`) are on unless `w:val` says otherwise.
fn is_on(toggle: &Element) -> bool {
    !matches!(toggle.attr("w:val"), Some("0") | Some("false") | Some("off"))
}

fn twips(points: f32) -> u32 {
    (points * 20.0).round() as u32
}

fn set_toggle(rpr: &mut Element, name: &str, on: bool) {
    let el = rpr.ensure_child(name, RPR_ORDER);
    if on {
        el.remove_attr("w:val");
    } else {
        el.set_attr("w:val", "0");
    }
}

/// Write direct run properties into an `w:rPr`.
fn apply_run_format(rpr: &mut Element, format: &RunFormat) {
    if let Some(font) = &format.font {
        let fonts = rpr.ensure_child("w:rFonts", RPR_ORDER);
        for attr in ["w:ascii", "w:hAnsi", "w:cs", "w:eastAsia"] {
            fonts.set_attr(attr, font.as_str());
        }
        for attr in ["w:asciiTheme", "w:hAnsiTheme", "w:cstheme", "w:eastAsiaTheme"] {
            fonts.remove_attr(attr);
        }
    }
    if let Some(bold) = format.bold {
        set_toggle(rpr, "w:b", bold);
        set_toggle(rpr, "w:bCs", bold);
    }
    if let Some(italic) = format.italic {
        set_toggle(rpr, "w:i", italic);
        set_toggle(rpr, "w:iCs", italic);
    }
    if let Some(color) = format.color {
        let el = rpr.ensure_child("w:color", RPR_ORDER);
        el.set_attr("w:val", color.hex());
        for attr in ["w:themeColor", "w:themeShade", "w:themeTint"] {
            el.remove_attr(attr);
        }
    }
    if let Some(size) = format.size_pt {
        let half_points = ((size * 2.0).round() as u32).to_string();
        rpr.ensure_child("w:sz", RPR_ORDER)
            .set_attr("w:val", half_points.as_str());
        rpr.ensure_child("w:szCs", RPR_ORDER)
            .set_attr("w:val", half_points);
    }
}

/// Visible text of a paragraph. Property containers and field codes are
/// skipped.
fn collect_visible_text(element: &Element, out: &mut String) {
    for child in element.elements() {
        match child.name.as_str() {
            "w:pPr" | "w:rPr" | "w:instrText" | "w:delText" => {}
            "w:t" => out.push_str(&child.text()),
            "w:tab" => out.push('\t'),
            "w:br" | "w:cr" => out.push('\n'),
            _ => collect_visible_text(child, out),
        }
    }
}

/// `true` if `scope` already contains a simple or complex field of `kind`.
fn has_field(scope: &Element, kind: FieldKind) -> bool {
    let is_kind = |instr: &str| instr.split_whitespace().next() == Some(kind.keyword());
    let mut simple = Vec::new();
    scope.descendants_named("w:fldSimple", &mut simple);
    if simple.iter().any(|f| f.attr("w:instr").map(is_kind).unwrap_or(false)) {
        return true;
    }
    let mut codes = Vec::new();
    scope.descendants_named("w:instrText", &mut codes);
    codes.iter().any(|c| is_kind(&c.text()))
}

/// First paragraph of a header/footer, created when the part is empty.
fn first_paragraph(part_root: &mut Element) -> &mut Element {
    if part_root.child("w:p").is_none() {
        part_root.children.push(Node::Element(Element::new("w:p")));
    }
    part_root.ensure_child("w:p", &[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docx::testing::*;
    use crate::style::StyleSheet;

    fn open(body: &str) -> DocxDocument {
        DocxDocument::from_package(sample_package(body)).expect("open")
    }

    #[test]
    fn test_paragraphs_report_style_names_and_text() {
        let body = format!(
            "{}{}",
            para("Heading1", "Intro"),
            r#"<w:p><w:pPr><w:pStyle w:val="Heading2"/><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>1.1</w:t></w:r><w:r><w:tab/><w:t>Scope</w:t></w:r></w:p>"#
        );
        let doc = open(&body);
        let paras = doc.paragraphs();
        assert_eq!(paras.len(), 2);
        assert_eq!(paras[0].style_name.as_deref(), Some("heading 1"));
        assert_eq!(paras[0].heading_level(), Some(1));
        assert_eq!(paras[1].text, "1.1\tScope");
    }

    #[test]
    fn test_graphic_paragraphs_are_detected() {
        let doc = open(&figure_para());
        assert!(doc.paragraphs()[0].has_graphic);
    }

    #[test]
    fn test_set_style_writes_fonts_and_drops_theme_refs() {
        let mut doc = open("");
        let sheet = StyleSheet::default();
        let rule = sheet.rule("Heading 1").expect("rule");
        doc.set_style("Heading 1", rule).expect("style");

        let snapshot = doc.style("heading1").expect("snapshot");
        assert_eq!(snapshot.font.as_deref(), Some("Lora"));
        assert_eq!(snapshot.size_pt, Some(24.0));
        assert!(snapshot.bold);
        assert_eq!(snapshot.color.as_deref(), Some("000000"));

        let xml = doc.part_xml(STYLES_PART).expect("styles");
        assert!(xml.contains(r#"w:before="480""#));
        assert!(xml.contains(r#"w:line="276""#));
    }

    #[test]
    fn test_set_style_matches_names_without_spaces() {
        let mut doc = open("");
        let rule = StyleRule::body("Consolas", 10.0);
        doc.set_style("VerbatimChar", &rule).expect("character style");
        let snap = doc.style("Verbatim Char").expect("snapshot");
        assert_eq!(snap.font.as_deref(), Some("Consolas"));
        assert_eq!(snap.alignment, None);
    }

    #[test]
    fn test_unknown_style_is_a_warning() {
        let mut doc = open("");
        let err = doc
            .set_style("Nonexistent", &StyleRule::body("Lora", 11.0))
            .unwrap_err();
        assert_eq!(
            err,
            StyleWarning::UnknownStyle {
                name: "Nonexistent".into()
            }
        );
    }

    #[test]
    fn test_page_layout_is_a4() {
        let mut doc = open("");
        assert_eq!(doc.set_page_layout(&PageLayout::A4), 1);
        let xml = doc.part_xml(DOCUMENT_PART).expect("document");
        assert!(xml.contains(r#"w:w="11906""#));
        assert!(xml.contains(r#"w:h="16838""#));
        assert!(xml.contains(r#"w:top="1138""#));
    }

    #[test]
    fn test_numbering_suffix_is_inserted_before_lvl_text() {
        let mut doc = open("");
        assert_eq!(doc.set_numbering_suffix("space"), Ok(2));
        let xml = doc.part_xml(NUMBERING_PART).expect("numbering");
        assert!(xml.contains(r#"<w:suff w:val="space"/><w:lvlText w:val="%1."/>"#));
        assert_eq!(xml.matches("<w:suff").count(), 2);
    }

    #[test]
    fn test_footer_is_created_once() {
        let mut doc = open(&para("BodyText", "x"));
        let fmt = RunFormat::default();
        assert_eq!(doc.insert_footer_field(FieldKind::Page, &fmt), Ok(true));
        assert_eq!(doc.insert_footer_field(FieldKind::Page, &fmt), Ok(false));
        doc.set_footer_alignment(Alignment::Center).expect("align");

        let footer = doc.part_xml("word/footer1.xml").expect("footer");
        assert_eq!(footer.matches("w:fldSimple").count(), 2); // open + close tag
        assert!(footer.contains(r#"<w:p><w:pPr><w:jc w:val="center"/></w:pPr><w:fldSimple w:instr=" PAGE ">"#));
        let rels = doc.part_xml(RELS_PART).expect("rels");
        assert!(rels.contains(r#"Id="rId3""#));
        assert!(rels.contains("footer1.xml"));
        let types = doc.part_xml(CONTENT_TYPES_PART).expect("types");
        assert!(types.contains("/word/footer1.xml"));
        let document = doc.part_xml(DOCUMENT_PART).expect("document");
        assert!(document.contains(r#"<w:sectPr><w:footerReference w:type="default" r:id="rId3"/>"#));
        assert!(document.contains("xmlns:r="));
    }

    #[test]
    fn test_existing_complex_page_field_is_detected() {
        let footer = r#"<w:ftr><w:p><w:r><w:fldChar w:fldCharType="begin"/></w:r><w:r><w:instrText xml:space="preserve"> PAGE \* MERGEFORMAT </w:instrText></w:r></w:p></w:ftr>"#;
        let mut pkg = sample_package("");
        pkg.put("word/footer1.xml", footer.as_bytes().to_vec());
        let mut rels = rels_xml();
        rels = rels.replace(
            "</Relationships>",
            r#"<Relationship Id="rId7" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/></Relationships>"#,
        );
        pkg.put(RELS_PART, rels.into_bytes());
        let document = document_xml("").replace(
            "<w:sectPr>",
            r#"<w:sectPr><w:footerReference w:type="default" r:id="rId7"/>"#,
        );
        pkg.put(DOCUMENT_PART, document.into_bytes());

        let mut doc = DocxDocument::from_package(pkg).expect("open");
        let inserted = doc
            .insert_footer_field(FieldKind::Page, &RunFormat::default())
            .expect("field");
        assert!(!inserted);
        assert!(doc.part_xml("word/footer2.xml").is_none());
    }

    #[test]
    fn test_set_paragraph_text_keeps_bookmarks() {
        let body = r#"<w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:bookmarkStart w:id="0" w:name="sec"/><w:r><w:rPr><w:b/></w:rPr><w:t>2.1</w:t></w:r><w:r><w:tab/><w:t>Scope</w:t></w:r><w:bookmarkEnd w:id="0"/></w:p>"#;
        let mut doc = open(body);
        assert!(doc.set_paragraph_text(0, "2.1 Scope"));
        let xml = doc.part_xml(DOCUMENT_PART).expect("document");
        assert!(xml.contains(
            r#"<w:bookmarkStart w:id="0" w:name="sec"/><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">2.1 Scope</w:t></w:r><w:bookmarkEnd w:id="0"/>"#
        ));
        assert_eq!(doc.paragraphs()[0].text, "2.1 Scope");
    }

    #[test]
    fn test_remove_and_restyle_paragraphs() {
        let body = format!(
            "{}{}",
            para("Heading1", "Dup"),
            numbered_para("Heading3", "Conclusion")
        );
        let mut doc = open(&body);
        assert!(doc.remove_paragraph(0));
        assert!(!doc.remove_paragraph(5));
        assert!(doc.clear_numbering(0));
        doc.set_paragraph_style(0, "Heading 2").expect("restyle");
        let p = &doc.paragraphs()[0];
        assert_eq!(p.heading_level(), Some(2));
        assert!(!p.has_numbering);
    }

    #[test]
    fn test_format_runs_sets_color_on_every_run() {
        let body = r#"<w:p><w:r><w:t>a</w:t></w:r><w:hyperlink><w:r><w:t>b</w:t></w:r></w:hyperlink></w:p>"#;
        let mut doc = open(body);
        let fmt = RunFormat {
            color: Some(crate::style::Rgb(0xC0, 0, 0)),
            ..RunFormat::default()
        };
        assert!(doc.format_runs(0, &fmt));
        let xml = doc.part_xml(DOCUMENT_PART).expect("document");
        assert_eq!(xml.matches(r#"<w:color w:val="C00000"/>"#).count(), 2);
        assert!(!doc.format_runs(0, &fmt), "second call changes nothing");
    }

    #[test]
    fn test_missing_document_part_is_malformed() {
        let pkg = DocxPackage::from_entries(vec![(
            CONTENT_TYPES_PART.into(),
            content_types_xml().into_bytes(),
        )]);
        let err = DocxDocument::from_package(pkg).unwrap_err();
        assert!(matches!(err, Tex2DocxError::DocumentMalformed { .. }));
    }

    #[test]
    fn test_edits_survive_save_and_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("ch.docx");
        let mut doc = open(&para("BodyText", "hello"));
        doc.set_alignment(0, Alignment::Center);
        doc.save(&path).expect("save");

        let reopened = DocxDocument::open(&path).expect("reopen");
        assert_eq!(reopened.paragraphs()[0].alignment, Some(Alignment::Center));
    }
}
