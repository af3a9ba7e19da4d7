use anyhow::{Result, Context};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File and directory utilities

// Characters that are unsafe in file names on common filesystems
static UNSAFE_FILE_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[<>:"/\\|?*\x00-\x1F]+"#).expect("file name pattern is valid"));

/// Stem used when a name sanitizes to nothing
pub const FALLBACK_STEM: &str = "presentation";

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)
                .with_context(|| format!("Failed to create directory: {:?}", path))?;
        }
        Ok(())
    }

    // @generates: Markup cache path for a topic
    // @params: cache_dir, topic
    pub fn cache_path<P: AsRef<Path>>(cache_dir: P, topic: &str) -> PathBuf {
        cache_dir.as_ref().join(format!("{}.txt", sanitize_file_stem(topic)))
    }

    /// Find files with a specific extension in a directory
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();
        let normalized_ext = extension.trim_start_matches('.');

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_file() {
                if let Some(ext) = path.extension() {
                    if ext.to_string_lossy().eq_ignore_ascii_case(normalized_ext) {
                        result.push(path.to_path_buf());
                    }
                }
            }
        }

        result.sort();
        Ok(result)
    }

    /// Design numbers that have a `Design-<n>.pptx` file in the designs directory
    pub fn available_designs<P: AsRef<Path>>(designs_dir: P) -> Result<Vec<u8>> {
        let designs_dir = designs_dir.as_ref();
        if !Self::dir_exists(designs_dir) {
            return Ok(Vec::new());
        }

        let mut designs: Vec<u8> = Self::find_files(designs_dir, "pptx")?
            .iter()
            .filter_map(|path| path.file_stem())
            .filter_map(|stem| stem.to_str())
            .filter_map(|stem| stem.strip_prefix("Design-"))
            .filter_map(|n| n.parse().ok())
            .collect();
        designs.sort_unstable();
        designs.dedup();
        Ok(designs)
    }

    /// Read a file to a string
    pub fn read_to_string<P: AsRef<Path>>(path: P) -> Result<String> {
        fs::read_to_string(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))
    }

    /// Write a string to a file
    pub fn write_to_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        Self::write_bytes(path, content.as_bytes())
    }

    /// Write bytes to a file, creating the parent directory first
    pub fn write_bytes<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
        // Ensure the parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            Self::ensure_dir(parent)?;
        }

        fs::write(&path, content)
            .with_context(|| format!("Failed to write to file: {:?}", path.as_ref()))?;

        Ok(())
    }

    /// HTML anchor that downloads `deck_path` as `<name>.pptx` from an inline data URI
    pub fn download_link<P: AsRef<Path>>(deck_path: P, name: &str) -> Result<String> {
        let bytes = fs::read(&deck_path)
            .with_context(|| format!("Failed to read presentation: {:?}", deck_path.as_ref()))?;
        let encoded = BASE64.encode(bytes);
        Ok(format!(
            r#"<a href="data:application/vnd.openxmlformats-officedocument.presentationml.presentation;base64,{}" download="{}.pptx">Click here to download your presentation</a>"#,
            encoded,
            html_escape(name)
        ))
    }

    /// Write `<dir>/<name>.html` holding the download link for a deck
    pub fn write_download_page<P: AsRef<Path>>(deck_path: P, name: &str) -> Result<PathBuf> {
        let deck_path = deck_path.as_ref();
        let link = Self::download_link(deck_path, name)?;
        let page_path = deck_path.with_extension("html");
        let page = format!(
            "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{}</title></head>\n<body>\n{}\n</body>\n</html>\n",
            html_escape(name),
            link
        );
        Self::write_to_file(&page_path, &page)?;
        Ok(page_path)
    }

    /// Detect what kind of input a file is
    pub fn detect_file_type<P: AsRef<Path>>(path: P) -> Result<FileType> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("File does not exist: {:?}", path));
        }

        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "json" => return Ok(FileType::References),
            "txt" | "md" | "markup" => return Ok(FileType::Markup),
            _ => {}
        }

        // Presentations are zip containers; check the magic bytes
        let mut magic = [0u8; 4];
        let read = fs::File::open(path)
            .and_then(|mut file| file.read(&mut magic))
            .with_context(|| format!("Failed to read file: {:?}", path))?;
        if read == 4 && magic == *b"PK\x03\x04" {
            return Ok(FileType::Presentation);
        }

        // Fall back to examining file contents
        if let Ok(content) = fs::read_to_string(path) {
            if content.lines().any(crate::markup::is_marker_line) {
                return Ok(FileType::Markup);
            }
        }

        // Default to unknown if we couldn't determine the type
        Ok(FileType::Unknown)
    }
}

/// Enum representing different file types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Slide markup text
    Markup,
    /// `.pptx` package (zip container)
    Presentation,
    /// JSON list of bibliographic records
    References,
    /// Unknown file type
    Unknown,
}

/// Turn a free-text topic into a safe file stem
pub fn sanitize_file_stem(name: &str) -> String {
    let cleaned = UNSAFE_FILE_CHARS.replace_all(name.trim(), "_");
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c == '_' || c.is_whitespace());
    if cleaned.is_empty() {
        FALLBACK_STEM.to_string()
    } else {
        cleaned.to_string()
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
