/*!
 * Slide part generation.
 *
 * A slide copies the placeholders of its layout (geometry is inherited, so
 * only the placeholder reference is written) and appends free text boxes.
 */

use log::warn;
use std::fmt::Write as _;

use super::template::{LayoutInfo, Placeholder};
use crate::xml::{escape, escape_text};

/// English Metric Units per inch
pub const EMU_PER_INCH: i64 = 914_400;

/// Convert inches to EMU
pub fn inches(value: f64) -> i64 {
    (value * EMU_PER_INCH as f64).round() as i64
}

// Placeholder kinds that hold media rather than text.
const NON_TEXT_PLACEHOLDERS: [&str; 6] = ["pic", "chart", "tbl", "media", "clipArt", "dgm"];

const SLIDE_NAMESPACES: &str = concat!(
    r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" "#,
    r#"xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" "#,
    r#"xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#
);

/// A free-floating text box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextBox {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    /// One entry per paragraph
    pub paragraphs: Vec<String>,
    /// Font size in hundredths of a point
    pub font_size: Option<u32>,
}

impl TextBox {
    pub fn new(x: i64, y: i64, width: i64, height: i64, paragraphs: Vec<String>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            paragraphs,
            font_size: None,
        }
    }

    /// Set the font size in points
    pub fn font_size_pt(mut self, points: u32) -> Self {
        self.font_size = Some(points * 100);
        self
    }
}

/// Body text destined for a specific placeholder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyText {
    /// `idx` of the receiving placeholder
    pub placeholder_idx: u32,
    /// One entry per paragraph
    pub paragraphs: Vec<String>,
}

/// Everything needed to write one slide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideContent {
    /// Layout index within the template
    pub layout_index: usize,
    /// Text for the title placeholder
    pub title: String,
    /// Body text, if the slide has any
    pub body: Option<BodyText>,
    /// Extra text boxes in drawing order
    pub text_boxes: Vec<TextBox>,
}

impl SlideContent {
    pub fn new(layout_index: usize, title: impl Into<String>) -> Self {
        Self {
            layout_index,
            title: title.into(),
            body: None,
            text_boxes: Vec::new(),
        }
    }

    /// Put `text` into placeholder `placeholder_idx`, one paragraph per line
    pub fn with_body(mut self, placeholder_idx: u32, text: &str) -> Self {
        self.body = Some(BodyText {
            placeholder_idx,
            paragraphs: split_paragraphs(text),
        });
        self
    }

    pub fn with_text_box(mut self, text_box: TextBox) -> Self {
        self.text_boxes.push(text_box);
        self
    }
}

/// Split text into paragraphs the way a text frame does
pub fn split_paragraphs(text: &str) -> Vec<String> {
    text.split('\n').map(|line| line.trim_end_matches('\r').to_string()).collect()
}

// Writes slide XML for `content` on `layout`.
pub(crate) fn slide_xml(layout: &LayoutInfo, content: &SlideContent) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    let _ = write!(out, "<p:sld {}>", SLIDE_NAMESPACES);
    out.push_str("<p:cSld><p:spTree>");
    out.push_str(r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr>"#);
    out.push_str(
        r#"<p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#,
    );

    let mut next_id = 2u32;
    let title_placeholder = layout.title_placeholder();
    let body_idx = content.body.as_ref().map(|b| b.placeholder_idx);
    let mut body_written = false;

    for placeholder in &layout.placeholders {
        let is_title = title_placeholder.is_some_and(|title| std::ptr::eq(title, placeholder));
        let paragraphs: Option<&[String]> = if is_title {
            Some(std::slice::from_ref(&content.title))
        } else if Some(placeholder.idx) == body_idx {
            body_written = true;
            content.body.as_ref().map(|b| b.paragraphs.as_slice())
        } else {
            None
        };
        write_placeholder(&mut out, next_id, placeholder, paragraphs);
        next_id += 1;
    }

    if title_placeholder.is_none() && !content.title.is_empty() {
        warn!("Layout '{}' has no title placeholder; header placed in a text box", layout.name);
        let text_box = TextBox::new(inches(0.5), inches(0.3), inches(9.0), inches(1.0), vec![content.title.clone()])
            .font_size_pt(32);
        write_text_box(&mut out, next_id, &text_box);
        next_id += 1;
    }

    if let Some(body) = content.body.as_ref().filter(|_| !body_written) {
        warn!(
            "Layout '{}' has no placeholder {}; body placed in a text box",
            layout.name, body.placeholder_idx
        );
        let text_box = TextBox::new(inches(0.5), inches(1.5), inches(9.0), inches(5.0), body.paragraphs.clone());
        write_text_box(&mut out, next_id, &text_box);
        next_id += 1;
    }

    for text_box in &content.text_boxes {
        write_text_box(&mut out, next_id, text_box);
        next_id += 1;
    }

    out.push_str("</p:spTree></p:cSld>");
    out.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>");
    out.push_str("</p:sld>");
    out
}

fn write_placeholder(out: &mut String, id: u32, placeholder: &Placeholder, paragraphs: Option<&[String]>) {
    out.push_str("<p:sp><p:nvSpPr>");
    let _ = write!(out, r#"<p:cNvPr id="{}" name="{}"/>"#, id, escape(&placeholder.name));
    out.push_str(r#"<p:cNvSpPr><a:spLocks noGrp="1"/></p:cNvSpPr><p:nvPr><p:ph"#);
    if placeholder.kind != "obj" {
        let _ = write!(out, r#" type="{}""#, escape(&placeholder.kind));
    }
    if placeholder.idx != 0 {
        let _ = write!(out, r#" idx="{}""#, placeholder.idx);
    }
    out.push_str("/></p:nvPr></p:nvSpPr><p:spPr/>");

    if !NON_TEXT_PLACEHOLDERS.contains(&placeholder.kind.as_str()) {
        out.push_str("<p:txBody><a:bodyPr/><a:lstStyle/>");
        match paragraphs {
            Some(paragraphs) if !paragraphs.is_empty() => write_paragraphs(out, paragraphs, None),
            _ => out.push_str("<a:p/>"),
        }
        out.push_str("</p:txBody>");
    }
    out.push_str("</p:sp>");
}

fn write_text_box(out: &mut String, id: u32, text_box: &TextBox) {
    out.push_str("<p:sp><p:nvSpPr>");
    let _ = write!(out, r#"<p:cNvPr id="{}" name="TextBox {}"/>"#, id, id - 1);
    out.push_str(r#"<p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr>"#);
    out.push_str("<p:spPr><a:xfrm>");
    let _ = write!(out, r#"<a:off x="{}" y="{}"/>"#, text_box.x, text_box.y);
    let _ = write!(out, r#"<a:ext cx="{}" cy="{}"/>"#, text_box.width, text_box.height);
    out.push_str(r#"</a:xfrm><a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr>"#);
    out.push_str(r#"<p:txBody><a:bodyPr wrap="square" rtlCol="0"><a:spAutoFit/></a:bodyPr><a:lstStyle/>"#);
    if text_box.paragraphs.is_empty() {
        out.push_str("<a:p/>");
    } else {
        write_paragraphs(out, &text_box.paragraphs, text_box.font_size);
    }
    out.push_str("</p:txBody></p:sp>");
}

fn write_paragraphs(out: &mut String, paragraphs: &[String], font_size: Option<u32>) {
    let size_attr = font_size.map(|sz| format!(r#" sz="{}""#, sz)).unwrap_or_default();
    for paragraph in paragraphs {
        if paragraph.is_empty() {
            let _ = write!(out, r#"<a:p><a:endParaRPr lang="en-US"{} dirty="0"/></a:p>"#, size_attr);
        } else {
            out.push_str("<a:p>");
            // A vertical tab is a soft line break inside the paragraph
            for (i, line) in paragraph.split('\u{B}').enumerate() {
                if i > 0 {
                    let _ = write!(out, r#"<a:br><a:rPr lang="en-US"{} dirty="0"/></a:br>"#, size_attr);
                }
                if !line.is_empty() {
                    let _ = write!(
                        out,
                        r#"<a:r><a:rPr lang="en-US"{} dirty="0"/><a:t>{}</a:t></a:r>"#,
                        size_attr,
                        escape_text(line)
                    );
                }
            }
            out.push_str("</a:p>");
        }
    }
}
