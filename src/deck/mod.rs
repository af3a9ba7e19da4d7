/*!
 * Slide-deck documents built on top of `.pptx` templates.
 *
 * - `package`: zip parts and relationships
 * - `template`: template selection, layouts and their placeholders
 * - `slide`: slide XML generation
 * - `inspect`: reading a finished deck back as an outline
 */

use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use crate::errors::DeckError;
use crate::xml;

pub mod inspect;
pub mod package;
pub mod slide;
pub mod template;

pub use inspect::{read_outline, ShapeText, SlideOutline};
pub use package::Package;
pub use slide::{inches, SlideContent, TextBox, EMU_PER_INCH};
pub use template::{DeckTemplate, LayoutInfo, Placeholder, TemplateSelection};

use package::{
    add_content_type_override, next_relationship_id, relative_target, Relationship, CONTENT_TYPES_PART, CT_SLIDE,
    REL_SLIDE, REL_SLIDE_LAYOUT,
};

// Slide ids below this value are reserved.
const MIN_SLIDE_ID: u32 = 256;

/// A template plus the slides to append to it
#[derive(Debug, Clone)]
pub struct SlideDeck {
    // @field: Template the slides are created from
    template: DeckTemplate,
    // @field: Slides to append, in order
    slides: Vec<SlideContent>,
}

impl SlideDeck {
    // @creates: Empty deck on top of a template
    pub fn new(template: DeckTemplate) -> Self {
        Self {
            template,
            slides: Vec::new(),
        }
    }

    pub fn template(&self) -> &DeckTemplate {
        &self.template
    }

    /// Append a slide; its layout must exist in the template
    pub fn add_slide(&mut self, slide: SlideContent) -> Result<(), DeckError> {
        self.template.layout(slide.layout_index)?;
        self.slides.push(slide);
        Ok(())
    }

    pub fn slides(&self) -> &[SlideContent] {
        &self.slides
    }

    /// Write every slide into the template package and return it
    pub fn into_package(self) -> Result<Package, DeckError> {
        let presentation_part = self.template.presentation_part().to_string();
        let slide_parts: Vec<(String, String)> = self
            .slides
            .iter()
            .map(|content| -> Result<(String, String), DeckError> {
                let layout = self.template.layout(content.layout_index)?;
                Ok((layout.part_name.clone(), slide::slide_xml(layout, content)))
            })
            .collect::<Result<_, DeckError>>()?;

        let mut package = self.template.into_package();
        let mut slide_number = last_slide_number(&package) + 1;
        let mut presentation_rels = package.relationships(&presentation_part)?;
        let mut content_types = package.part_str(CONTENT_TYPES_PART)?.to_string();
        let mut slide_ids = Vec::with_capacity(slide_parts.len());
        let mut next_slide_id = max_slide_id(package.part_str(&presentation_part)?)?.max(MIN_SLIDE_ID - 1) + 1;

        for (layout_part, slide_xml) in slide_parts {
            let slide_part = format!("ppt/slides/slide{}.xml", slide_number);
            slide_number += 1;

            package.set_part(slide_part.clone(), slide_xml);
            package.set_relationships(
                &slide_part,
                &[Relationship::new(
                    "rId1",
                    REL_SLIDE_LAYOUT,
                    relative_target(&slide_part, &layout_part),
                )],
            );
            content_types = add_content_type_override(&content_types, &slide_part, CT_SLIDE)?;

            let rel_id = next_relationship_id(&presentation_rels);
            presentation_rels.push(Relationship::new(
                rel_id.clone(),
                REL_SLIDE,
                relative_target(&presentation_part, &slide_part),
            ));
            slide_ids.push((next_slide_id, rel_id));
            next_slide_id += 1;
        }

        let presentation = insert_slide_ids(package.part_str(&presentation_part)?, &slide_ids)?;
        package.set_part(presentation_part.clone(), presentation);
        package.set_relationships(&presentation_part, &presentation_rels);
        package.set_part(CONTENT_TYPES_PART, content_types);

        debug!("Wrote {} slides into {}", slide_ids.len(), presentation_part);
        Ok(package)
    }

    /// Persist the deck at `path`
    pub fn save(self, path: &Path) -> Result<PathBuf, DeckError> {
        self.into_package()?.save(path)
    }
}

// Highest N among existing ppt/slides/slideN.xml parts.
fn last_slide_number(package: &Package) -> u32 {
    package
        .part_names()
        .filter_map(|name| name.strip_prefix("ppt/slides/slide"))
        .filter_map(|rest| rest.strip_suffix(".xml"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0)
}

fn max_slide_id(presentation: &str) -> Result<u32, DeckError> {
    let mut reader = Reader::from_str(presentation);
    let mut max = 0;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldId" => {
                if let Some(id) = xml::attr_value_qualified(&e, b"id").and_then(|id| id.parse::<u32>().ok()) {
                    max = max.max(id);
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(max)
}

// Adds <p:sldId> entries, creating the list after the master lists when absent.
fn insert_slide_ids(presentation: &str, slide_ids: &[(u32, String)]) -> Result<String, DeckError> {
    if slide_ids.is_empty() {
        return Ok(presentation.to_string());
    }

    let mut entries = String::new();
    for (id, rel_id) in slide_ids {
        let _ = write!(entries, r#"<p:sldId id="{}" r:id="{}"/>"#, id, rel_id);
    }

    if let Some(position) = presentation.find("</p:sldIdLst>") {
        return Ok(splice(presentation, position, position, &entries));
    }
    if let Some(position) = presentation.find("<p:sldIdLst/>") {
        let list = format!("<p:sldIdLst>{}</p:sldIdLst>", entries);
        return Ok(splice(presentation, position, position + "<p:sldIdLst/>".len(), &list));
    }

    let list = format!("<p:sldIdLst>{}</p:sldIdLst>", entries);
    for anchor in ["</p:handoutMasterIdLst>", "</p:notesMasterIdLst>", "</p:sldMasterIdLst>"] {
        if let Some(position) = presentation.find(anchor) {
            let end = position + anchor.len();
            return Ok(splice(presentation, end, end, &list));
        }
    }

    Err(DeckError::Xml("presentation has no slide master list".to_string()))
}

fn splice(text: &str, start: usize, end: usize, insert: &str) -> String {
    let mut out = String::with_capacity(text.len() + insert.len());
    out.push_str(&text[..start]);
    out.push_str(insert);
    out.push_str(&text[end..]);
    out
}
