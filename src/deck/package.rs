/*!
 * Open Packaging Conventions container used by `.pptx` files.
 *
 * A package is a zip archive of named parts. Parts are kept in memory keyed
 * by their name without the leading slash (`ppt/presentation.xml`), and are
 * linked to each other through `_rels/<part>.rels` relationship parts.
 */

use log::debug;
use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::io::{Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::errors::DeckError;
use crate::xml;

/// Name of the content-types part
pub const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Package-level relationships part
pub const ROOT_RELS_PART: &str = "_rels/.rels";

pub const REL_OFFICE_DOCUMENT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const REL_SLIDE_MASTER: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideMaster";
pub const REL_SLIDE_LAYOUT: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slideLayout";
pub const REL_SLIDE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide";

pub const CT_SLIDE: &str = "application/vnd.openxmlformats-officedocument.presentationml.slide+xml";

const RELS_NAMESPACE: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

/// One entry of a relationships part
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// `Id` attribute, e.g. `rId3`
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target, relative to the source part's directory unless external
    pub target: String,
    /// Whether `TargetMode="External"`
    pub external: bool,
}

impl Relationship {
    pub fn new(id: impl Into<String>, rel_type: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            rel_type: rel_type.into(),
            target: target.into(),
            external: false,
        }
    }
}

/// In-memory view of every part in a package
#[derive(Debug, Clone, Default)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    /// Read a package from disk
    pub fn open(path: &Path) -> Result<Self, DeckError> {
        if !path.is_file() {
            return Err(DeckError::TemplateNotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        Self::from_reader(Cursor::new(bytes))
    }

    /// Read a package from any seekable zip stream
    pub fn from_reader<R: Read + Seek>(reader: R) -> Result<Self, DeckError> {
        let mut archive = ZipArchive::new(reader)?;
        let mut parts = BTreeMap::new();

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            if entry.is_dir() {
                continue;
            }
            let name = entry.name().trim_start_matches('/').to_string();
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.insert(name, data);
        }

        debug!("Loaded package with {} parts", parts.len());
        Ok(Self { parts })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.parts.get(name).map(Vec::as_slice)
    }

    /// Part content as UTF-8 text
    pub fn part_str(&self, name: &str) -> Result<&str, DeckError> {
        let data = self.part(name).ok_or_else(|| DeckError::MissingPart(name.to_string()))?;
        std::str::from_utf8(data).map_err(|e| DeckError::Xml(format!("{} is not UTF-8: {}", name, e)))
    }

    /// Insert or replace a part
    pub fn set_part(&mut self, name: impl Into<String>, data: impl Into<Vec<u8>>) {
        self.parts.insert(name.into(), data.into());
    }

    pub fn part_names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// Relationships declared by a part; an absent rels part means none
    pub fn relationships(&self, source_part: &str) -> Result<Vec<Relationship>, DeckError> {
        let rels_name = rels_part_name(source_part);
        if !self.contains(&rels_name) {
            return Ok(Vec::new());
        }
        parse_relationships(self.part_str(&rels_name)?)
    }

    /// Replace the relationships of a part
    pub fn set_relationships(&mut self, source_part: &str, relationships: &[Relationship]) {
        self.set_part(rels_part_name(source_part), relationships_xml(relationships));
    }

    /// Main document part (normally `ppt/presentation.xml`)
    pub fn main_document_part(&self) -> Result<String, DeckError> {
        let root = parse_relationships(self.part_str(ROOT_RELS_PART)?)?;
        root.iter()
            .find(|rel| rel.rel_type == REL_OFFICE_DOCUMENT)
            .map(|rel| resolve_part_name("", &rel.target))
            .ok_or_else(|| DeckError::MissingPart("officeDocument relationship".to_string()))
    }

    /// Target part of the first relationship of the given type
    pub fn related_part(&self, source_part: &str, rel_type: &str) -> Result<Option<String>, DeckError> {
        Ok(self
            .relationships(source_part)?
            .into_iter()
            .find(|rel| rel.rel_type == rel_type && !rel.external)
            .map(|rel| resolve_part_name(source_part, &rel.target)))
    }

    /// Serialize the package as zip bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, DeckError> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        // Content types go first so streaming readers can find them.
        if let Some(content_types) = self.parts.get(CONTENT_TYPES_PART) {
            writer.start_file(CONTENT_TYPES_PART, part_options())?;
            writer.write_all(content_types)?;
        }
        for (name, data) in &self.parts {
            if name == CONTENT_TYPES_PART {
                continue;
            }
            writer.start_file(name.as_str(), part_options())?;
            writer.write_all(data)?;
        }

        let cursor = writer.finish()?;
        Ok(cursor.into_inner())
    }

    /// Write the package to `path`, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<PathBuf, DeckError> {
        let bytes = self.to_bytes()?;
        let write_error = |source| DeckError::Write { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(write_error)?;
            }
        }
        std::fs::write(path, bytes).map_err(write_error)?;
        Ok(path.to_path_buf())
    }
}

fn part_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated)
}

/// `ppt/slides/slide1.xml` -> `ppt/slides/_rels/slide1.xml.rels`
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{}/_rels/{}.rels", dir, file),
        None if part.is_empty() => ROOT_RELS_PART.to_string(),
        None => format!("_rels/{}.rels", part),
    }
}

/// Resolve a relationship target against the part that declares it
pub fn resolve_part_name(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut segments: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            },
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Relative target that reaches `target_part` from `source_part`
pub fn relative_target(source_part: &str, target_part: &str) -> String {
    let source_dir: Vec<&str> = match source_part.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').collect(),
        None => Vec::new(),
    };
    let target: Vec<&str> = target_part.split('/').collect();

    let common = source_dir
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count()
        .min(target.len().saturating_sub(1));

    let mut parts: Vec<&str> = std::iter::repeat_n("..", source_dir.len() - common).collect();
    parts.extend_from_slice(&target[common..]);
    parts.join("/")
}

/// Parse a relationships part
pub fn parse_relationships(xml_text: &str) -> Result<Vec<Relationship>, DeckError> {
    let mut reader = Reader::from_str(xml_text);
    reader.config_mut().trim_text(true);
    let mut relationships = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                let id = xml::attr_value(&e, b"Id").unwrap_or_default();
                let rel_type = xml::attr_value(&e, b"Type").unwrap_or_default();
                let target = xml::attr_value(&e, b"Target").unwrap_or_default();
                let external = xml::attr_value(&e, b"TargetMode")
                    .is_some_and(|mode| mode.eq_ignore_ascii_case("External"));
                relationships.push(Relationship { id, rel_type, target, external });
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(relationships)
}

/// Serialize a relationships part
pub fn relationships_xml(relationships: &[Relationship]) -> String {
    let mut out = String::with_capacity(256 + relationships.len() * 160);
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#);
    let _ = write!(out, r#"<Relationships xmlns="{}">"#, RELS_NAMESPACE);
    for rel in relationships {
        let _ = write!(
            out,
            r#"<Relationship Id="{}" Type="{}" Target="{}""#,
            xml::escape(&rel.id),
            xml::escape(&rel.rel_type),
            xml::escape(&rel.target)
        );
        if rel.external {
            out.push_str(r#" TargetMode="External""#);
        }
        out.push_str("/>");
    }
    out.push_str("</Relationships>");
    out
}

/// Next free `rIdN` among existing relationships
pub fn next_relationship_id(relationships: &[Relationship]) -> String {
    let max = relationships
        .iter()
        .filter_map(|rel| rel.id.strip_prefix("rId"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

/// Add an `<Override>` for a part to `[Content_Types].xml`
pub fn add_content_type_override(
    content_types: &str,
    part_name: &str,
    content_type: &str,
) -> Result<String, DeckError> {
    let override_xml = format!(
        r#"<Override PartName="/{}" ContentType="{}"/>"#,
        xml::escape(part_name),
        xml::escape(content_type)
    );
    let position = content_types
        .rfind("</Types>")
        .ok_or_else(|| DeckError::Xml("[Content_Types].xml has no closing </Types>".to_string()))?;

    let mut updated = String::with_capacity(content_types.len() + override_xml.len());
    updated.push_str(&content_types[..position]);
    updated.push_str(&override_xml);
    updated.push_str(&content_types[position..]);
    Ok(updated)
}
