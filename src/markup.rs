/*!
 * Slide markup parsing.
 *
 * The text-generation step answers with a small line-oriented markup:
 *
 * ```text
 * #Title: Periodontal regeneration
 *
 * #Slide: 1
 * #Header: Table of contents
 * #Content: 1. Introduction
 * 2. Methods
 * #Footer: Smith J (2020)
 *
 * #Slide: END
 * ```
 *
 * This module turns that text into an ordered list of [`Directive`]s. It does
 * not judge the order of directives; that is the compiler's job.
 */

/// Marker opening the document title line
pub const TITLE_MARKER: &str = "#Title:";
/// Marker opening a new slide (or closing the deck with `END`)
pub const SLIDE_MARKER: &str = "#Slide:";
/// Marker for the slide header line
pub const HEADER_MARKER: &str = "#Header:";
/// Marker for the first line of slide body content
pub const CONTENT_MARKER: &str = "#Content:";
/// Marker for a slide footnote
pub const FOOTER_MARKER: &str = "#Footer:";

const END_VALUE: &str = "END";

const MARKERS: [&str; 5] = [TITLE_MARKER, SLIDE_MARKER, HEADER_MARKER, CONTENT_MARKER, FOOTER_MARKER];

/// A single parsed markup instruction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `#Title: <text>`
    Title(String),
    /// `#Slide: <n>`; the number itself carries no meaning
    SlideStart,
    /// `#Header: <text>`
    Header(String),
    /// `#Content: <text>` plus its continuation lines, joined by `\n`
    Content(String),
    /// `#Footer: <text>`
    Footer(String),
    /// `#Slide: END`
    End,
}

impl Directive {
    /// Short name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Title(_) => "title",
            Self::SlideStart => "slide",
            Self::Header(_) => "header",
            Self::Content(_) => "content",
            Self::Footer(_) => "footer",
            Self::End => "end",
        }
    }
}

/// Ordered directives parsed from one markup buffer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkupDocument {
    directives: Vec<Directive>,
}

impl MarkupDocument {
    /// Parse markup text into directives.
    ///
    /// Lines are scanned with a cursor. A `#Content:` line starts a run that
    /// swallows every following line up to the next recognized marker line or
    /// the end of input. Anything else that is not a marker is ignored.
    pub fn parse(text: &str) -> Self {
        let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
        let lines: Vec<&str> = text.lines().collect();
        let mut directives = Vec::new();
        let mut cursor = 0;

        while cursor < lines.len() {
            let line = lines[cursor].trim_start();
            cursor += 1;

            if let Some(rest) = line.strip_prefix(TITLE_MARKER) {
                directives.push(Directive::Title(rest.trim().to_string()));
            } else if let Some(rest) = line.strip_prefix(SLIDE_MARKER) {
                if rest.trim().eq_ignore_ascii_case(END_VALUE) {
                    directives.push(Directive::End);
                } else {
                    directives.push(Directive::SlideStart);
                }
            } else if let Some(rest) = line.strip_prefix(HEADER_MARKER) {
                directives.push(Directive::Header(rest.trim().to_string()));
            } else if let Some(rest) = line.strip_prefix(CONTENT_MARKER) {
                let (content, next) = collect_content(rest, &lines, cursor);
                cursor = next;
                directives.push(Directive::Content(content));
            } else if let Some(rest) = line.strip_prefix(FOOTER_MARKER) {
                directives.push(Directive::Footer(rest.trim().to_string()));
            }
        }

        Self { directives }
    }

    /// All directives in input order
    pub fn directives(&self) -> &[Directive] {
        &self.directives
    }

    /// The first title in the document, if any
    pub fn title(&self) -> Option<&str> {
        self.directives.iter().find_map(|d| match d {
            Directive::Title(text) => Some(text.as_str()),
            _ => None,
        })
    }

    /// Number of slide-start markers (the end marker is not counted)
    pub fn slide_count(&self) -> usize {
        self.directives.iter().filter(|d| matches!(d, Directive::SlideStart)).count()
    }

    /// Whether the document carries an explicit `#Slide: END`
    pub fn has_end_marker(&self) -> bool {
        self.directives.iter().any(|d| matches!(d, Directive::End))
    }

    pub fn is_empty(&self) -> bool {
        self.directives.is_empty()
    }
}

/// Whether a line starts with one of the five recognized markers
pub fn is_marker_line(line: &str) -> bool {
    let line = line.trim_start();
    MARKERS.iter().any(|marker| line.starts_with(marker))
}

// Collects the body starting at `first` and continuing from `lines[cursor..]`.
// Returns the body and the index of the first line not consumed.
fn collect_content(first: &str, lines: &[&str], mut cursor: usize) -> (String, usize) {
    let mut content = first.trim().to_string();

    while cursor < lines.len() && !is_marker_line(lines[cursor]) {
        content.push('\n');
        content.push_str(lines[cursor].trim());
        cursor += 1;
    }

    let trimmed_len = content.trim_end().len();
    content.truncate(trimmed_len);

    (content, cursor)
}
