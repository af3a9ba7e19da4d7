/*!
 * Read a finished deck back as a text outline.
 */

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt;
use std::path::Path;

use super::package::{resolve_part_name, Package, REL_SLIDE_LAYOUT};
use super::template::layout_part_names;
use crate::errors::DeckError;
use crate::xml;

/// Text carried by one shape of a slide
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShapeText {
    /// Placeholder type and idx, for placeholder shapes
    pub placeholder: Option<(String, u32)>,
    /// Whether the shape is a free text box
    pub is_text_box: bool,
    /// Paragraph texts in order
    pub paragraphs: Vec<String>,
    /// First explicit font size, in hundredths of a point
    pub font_size: Option<u32>,
    /// Top-left corner in EMU, when the shape sets its own geometry
    pub offset: Option<(i64, i64)>,
}

impl ShapeText {
    /// Paragraphs joined by newlines
    pub fn text(&self) -> String {
        self.paragraphs.join("\n")
    }

    fn is_title(&self) -> bool {
        matches!(&self.placeholder, Some((kind, _)) if kind == "title" || kind == "ctrTitle")
    }
}

/// Outline of a single slide
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlideOutline {
    /// Slide part name
    pub part_name: String,
    /// Index of the slide's layout within the first master, when known
    pub layout_index: Option<usize>,
    /// Shapes in drawing order
    pub shapes: Vec<ShapeText>,
}

impl SlideOutline {
    /// Text of the title placeholder
    pub fn title(&self) -> Option<String> {
        self.shapes.iter().find(|s| s.is_title()).map(ShapeText::text)
    }

    /// Text of the non-title placeholder with the given idx
    pub fn placeholder_text(&self, idx: u32) -> Option<String> {
        self.shapes
            .iter()
            .find(|s| !s.is_title() && matches!(&s.placeholder, Some((_, i)) if *i == idx))
            .map(ShapeText::text)
    }

    /// Free text boxes in drawing order
    pub fn text_boxes(&self) -> impl Iterator<Item = &ShapeText> {
        self.shapes.iter().filter(|s| s.is_text_box)
    }
}

impl fmt::Display for SlideOutline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layout_index {
            Some(index) => writeln!(f, "{} (layout {})", self.part_name, index)?,
            None => writeln!(f, "{}", self.part_name)?,
        }
        for shape in &self.shapes {
            let label = match (&shape.placeholder, shape.is_text_box) {
                (Some((kind, idx)), _) => format!("{}[{}]", kind, idx),
                (None, true) => "textbox".to_string(),
                (None, false) => "shape".to_string(),
            };
            for paragraph in &shape.paragraphs {
                writeln!(f, "  {:<12} {}", label, paragraph)?;
            }
        }
        Ok(())
    }
}

/// Outline every slide of the deck at `path`, in presentation order
pub fn read_outline(path: &Path) -> Result<Vec<SlideOutline>, DeckError> {
    outline_package(&Package::open(path)?)
}

/// Outline every slide of an opened package, in presentation order
pub fn outline_package(package: &Package) -> Result<Vec<SlideOutline>, DeckError> {
    let presentation_part = package.main_document_part()?;
    let relationships = package.relationships(&presentation_part)?;
    let layouts = layout_part_names(package)?;

    slide_rel_ids(package.part_str(&presentation_part)?)?
        .into_iter()
        .filter_map(|id| relationships.iter().find(|rel| rel.id == id))
        .map(|rel| -> Result<SlideOutline, DeckError> {
            let part_name = resolve_part_name(&presentation_part, &rel.target);
            let layout_index = package
                .related_part(&part_name, REL_SLIDE_LAYOUT)?
                .and_then(|layout| layouts.iter().position(|l| *l == layout));
            let shapes = read_shapes(package.part_str(&part_name)?)?;
            Ok(SlideOutline { part_name, layout_index, shapes })
        })
        .collect()
}

fn slide_rel_ids(presentation: &str) -> Result<Vec<String>, DeckError> {
    let mut reader = Reader::from_str(presentation);
    let mut ids = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldId" => {
                if let Some(id) = xml::attr_value_qualified(&e, b"r:id") {
                    ids.push(id);
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(ids)
}

fn read_shapes(slide_xml: &str) -> Result<Vec<ShapeText>, DeckError> {
    let mut reader = Reader::from_str(slide_xml);
    let mut shapes = Vec::new();
    let mut current: Option<ShapeText> = None;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"sp" => current = Some(ShapeText::default()),
                b"p" => {
                    if let Some(shape) = current.as_mut() {
                        shape.paragraphs.push(String::new());
                    }
                },
                b"t" => in_text = true,
                b"br" => push_text(current.as_mut(), "\u{B}"),
                _ => inspect_element(&e, current.as_mut()),
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"p" => {
                    if let Some(shape) = current.as_mut() {
                        shape.paragraphs.push(String::new());
                    }
                },
                b"br" => push_text(current.as_mut(), "\u{B}"),
                _ => inspect_element(&e, current.as_mut()),
            },
            Event::Text(text) if in_text => push_text(current.as_mut(), &xml::text_content(&text)),
            Event::GeneralRef(reference) if in_text => {
                push_text(current.as_mut(), &xml::reference_content(&reference))
            },
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"sp" => shapes.extend(current.take()),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(shapes)
}

fn push_text(shape: Option<&mut ShapeText>, text: &str) {
    if let Some(paragraph) = shape.and_then(|s| s.paragraphs.last_mut()) {
        paragraph.push_str(text);
    }
}

fn inspect_element(element: &BytesStart<'_>, shape: Option<&mut ShapeText>) {
    let Some(shape) = shape else {
        return;
    };
    match element.local_name().as_ref() {
        b"cNvSpPr" => shape.is_text_box = xml::attr_value(element, b"txBox").is_some_and(|v| v == "1" || v == "true"),
        b"ph" => {
            let kind = xml::attr_value(element, b"type").unwrap_or_else(|| "obj".to_string());
            let idx = xml::attr_value(element, b"idx").and_then(|i| i.parse().ok()).unwrap_or(0);
            shape.placeholder = Some((kind, idx));
        },
        b"rPr" | b"endParaRPr" if shape.font_size.is_none() => {
            shape.font_size = xml::attr_value(element, b"sz").and_then(|sz| sz.parse().ok());
        },
        b"off" if shape.offset.is_none() => {
            let x = xml::attr_value(element, b"x").and_then(|v| v.parse().ok());
            let y = xml::attr_value(element, b"y").and_then(|v| v.parse().ok());
            shape.offset = x.zip(y);
        },
        _ => {}
    }
}
