/*!
 * Presentation templates.
 *
 * A template is an ordinary `.pptx` whose first slide master provides the
 * layouts slides are created from. Layout indices are positions in that
 * master's `sldLayoutIdLst`.
 */

use log::{debug, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::{Path, PathBuf};

use super::package::{resolve_part_name, Package, REL_SLIDE_MASTER};
use crate::errors::DeckError;
use crate::xml;

/// Template used when the requested one is out of range
pub const DEFAULT_TEMPLATE: u8 = 1;

/// Highest template number shipped in the designs directory
pub const MAX_TEMPLATE: u8 = 7;

/// Placeholder types that are never copied onto generated slides
const SKIPPED_PLACEHOLDERS: [&str; 3] = ["dt", "ftr", "sldNum"];

/// A validated template number in `1..=MAX_TEMPLATE`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TemplateSelection(u8);

impl TemplateSelection {
    /// Clamp a requested design number; anything outside the range selects the default
    pub fn clamped(requested: i64) -> Self {
        if Self::is_available(requested) {
            Self(requested as u8)
        } else {
            Self(DEFAULT_TEMPLATE)
        }
    }

    /// Whether a requested design number names a shipped template
    pub fn is_available(requested: i64) -> bool {
        (1..=i64::from(MAX_TEMPLATE)).contains(&requested)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// `Design-<n>.pptx`
    pub fn file_name(self) -> String {
        format!("Design-{}.pptx", self.0)
    }

    /// Template file inside the designs directory
    pub fn template_path(self, designs_dir: &Path) -> PathBuf {
        designs_dir.join(self.file_name())
    }
}

impl Default for TemplateSelection {
    fn default() -> Self {
        Self(DEFAULT_TEMPLATE)
    }
}

impl std::fmt::Display for TemplateSelection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A placeholder declared by a slide layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    /// `type` attribute; `obj` when absent
    pub kind: String,
    /// `idx` attribute; 0 when absent
    pub idx: u32,
    /// Shape name from `cNvPr`
    pub name: String,
}

impl Placeholder {
    /// Title-like placeholders receive the slide header
    pub fn is_title(&self) -> bool {
        matches!(self.kind.as_str(), "title" | "ctrTitle")
    }
}

/// One slide layout of the template
#[derive(Debug, Clone)]
pub struct LayoutInfo {
    /// Layout name from `p:cSld/@name`
    pub name: String,
    /// Part name, e.g. `ppt/slideLayouts/slideLayout2.xml`
    pub part_name: String,
    /// Placeholders in document order
    pub placeholders: Vec<Placeholder>,
}

impl LayoutInfo {
    /// Placeholder that receives the slide header
    pub fn title_placeholder(&self) -> Option<&Placeholder> {
        self.placeholders
            .iter()
            .find(|p| p.is_title())
            .or_else(|| self.placeholders.iter().find(|p| p.idx == 0))
    }

    /// Placeholder with the given `idx`
    pub fn placeholder(&self, idx: u32) -> Option<&Placeholder> {
        self.placeholders.iter().find(|p| p.idx == idx && !p.is_title())
    }
}

/// A loaded template: its package plus the layout table
#[derive(Debug, Clone)]
pub struct DeckTemplate {
    // @field: File the template was read from
    path: PathBuf,
    // @field: Parts of the template package
    package: Package,
    // @field: Main document part name
    presentation_part: String,
    // @field: Layouts of the first slide master in list order
    layouts: Vec<LayoutInfo>,
}

impl DeckTemplate {
    /// Load a template from disk
    pub fn load(path: &Path) -> Result<Self, DeckError> {
        let package = Package::open(path).map_err(|e| as_template_error(path, e))?;
        Self::from_package(path, package).map_err(|e| as_template_error(path, e))
    }

    /// Build the layout table of an already opened package
    pub fn from_package(path: &Path, package: Package) -> Result<Self, DeckError> {
        let presentation_part = package.main_document_part()?;
        let master_part = first_master_part(&package, &presentation_part)?;
        let layouts = read_layouts(&package, &master_part)?;

        debug!(
            "Template {:?}: master {} with {} layouts",
            path,
            master_part,
            layouts.len()
        );

        Ok(Self {
            path: path.to_path_buf(),
            package,
            presentation_part,
            layouts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn layouts(&self) -> &[LayoutInfo] {
        &self.layouts
    }

    /// Layout at `index`
    pub fn layout(&self, index: usize) -> Result<&LayoutInfo, DeckError> {
        self.layouts.get(index).ok_or(DeckError::UnknownLayout {
            index,
            available: self.layouts.len(),
        })
    }

    /// Fail unless every listed layout exists
    pub fn ensure_layouts(&self, required: &[usize]) -> Result<(), DeckError> {
        let missing: Vec<String> = required
            .iter()
            .filter(|&&index| index >= self.layouts.len())
            .map(|index| index.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(DeckError::InvalidTemplate {
                path: self.path.clone(),
                reason: format!(
                    "missing slide layouts {} (template has {})",
                    missing.join(", "),
                    self.layouts.len()
                ),
            })
        }
    }

    pub fn presentation_part(&self) -> &str {
        &self.presentation_part
    }

    pub fn package(&self) -> &Package {
        &self.package
    }

    pub(crate) fn into_package(self) -> Package {
        self.package
    }
}

// Structural problems become InvalidTemplate; a missing file or I/O failure stays as is.
fn as_template_error(path: &Path, error: DeckError) -> DeckError {
    match error {
        DeckError::TemplateNotFound(_) | DeckError::InvalidTemplate { .. } | DeckError::Io(_) => error,
        other => DeckError::InvalidTemplate {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    }
}

fn first_master_part(package: &Package, presentation_part: &str) -> Result<String, DeckError> {
    let relationships = package.relationships(presentation_part)?;
    let presentation = package.part_str(presentation_part)?;

    // The first sldMasterId decides; fall back to any master relationship.
    let mut reader = Reader::from_str(presentation);
    reader.config_mut().trim_text(true);
    let mut first_id = None;
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldMasterId" => {
                first_id = xml::attr_value_qualified(&e, b"r:id");
                break;
            },
            Event::Eof => break,
            _ => {}
        }
    }

    let by_id = first_id.and_then(|id| relationships.iter().find(|rel| rel.id == id));
    let rel = by_id
        .or_else(|| relationships.iter().find(|rel| rel.rel_type == REL_SLIDE_MASTER))
        .ok_or_else(|| DeckError::MissingPart("slide master".to_string()))?;

    Ok(resolve_part_name(presentation_part, &rel.target))
}

/// Layout part names of the package's first slide master, in list order
pub(crate) fn layout_part_names(package: &Package) -> Result<Vec<String>, DeckError> {
    let presentation_part = package.main_document_part()?;
    let master_part = first_master_part(package, &presentation_part)?;
    master_layout_parts(package, &master_part)
}

fn master_layout_parts(package: &Package, master_part: &str) -> Result<Vec<String>, DeckError> {
    let relationships = package.relationships(master_part)?;
    let master = package.part_str(master_part)?;

    let mut reader = Reader::from_str(master);
    reader.config_mut().trim_text(true);
    let mut layout_parts = Vec::new();
    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sldLayoutId" => {
                let Some(id) = xml::attr_value_qualified(&e, b"r:id") else {
                    continue;
                };
                match relationships.iter().find(|rel| rel.id == id) {
                    Some(rel) => layout_parts.push(resolve_part_name(master_part, &rel.target)),
                    None => warn!("Slide master {} lists unknown layout relationship {}", master_part, id),
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(layout_parts)
}

fn read_layouts(package: &Package, master_part: &str) -> Result<Vec<LayoutInfo>, DeckError> {
    master_layout_parts(package, master_part)?
        .into_iter()
        .map(|part_name| -> Result<LayoutInfo, DeckError> {
            let (name, placeholders) = scan_layout(package.part_str(&part_name)?)?;
            Ok(LayoutInfo { name, part_name, placeholders })
        })
        .collect()
}

// Returns the layout name and its placeholders.
fn scan_layout(layout_xml: &str) -> Result<(String, Vec<Placeholder>), DeckError> {
    let mut reader = Reader::from_str(layout_xml);
    reader.config_mut().trim_text(true);

    let mut name = String::new();
    let mut placeholders = Vec::new();
    let mut current: Option<(String, Option<Placeholder>)> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"cSld" => name = xml::attr_value(&e, b"name").unwrap_or_default(),
                b"sp" => current = Some((String::new(), None)),
                _ => inspect_shape_child(&e, &mut current),
            },
            Event::Empty(e) => inspect_shape_child(&e, &mut current),
            Event::End(e) if e.local_name().as_ref() == b"sp" => {
                if let Some((shape_name, Some(mut placeholder))) = current.take() {
                    placeholder.name = shape_name;
                    if !SKIPPED_PLACEHOLDERS.contains(&placeholder.kind.as_str()) {
                        placeholders.push(placeholder);
                    }
                }
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((name, placeholders))
}

fn inspect_shape_child(element: &BytesStart<'_>, current: &mut Option<(String, Option<Placeholder>)>) {
    let Some((shape_name, placeholder)) = current.as_mut() else {
        return;
    };
    match element.local_name().as_ref() {
        b"cNvPr" => *shape_name = xml::attr_value(element, b"name").unwrap_or_default(),
        b"ph" => {
            *placeholder = Some(Placeholder {
                kind: xml::attr_value(element, b"type").unwrap_or_else(|| "obj".to_string()),
                idx: xml::attr_value(element, b"idx")
                    .and_then(|idx| idx.parse().ok())
                    .unwrap_or(0),
                name: String::new(),
            });
        },
        _ => {}
    }
}
