/*!
 * Slide-markup compiler.
 *
 * Turns a parsed [`MarkupDocument`] plus bibliographic records into a
 * [`RenderedDocument`] (title slide, content slides, references slide) and
 * writes it onto a template as a `.pptx` file.
 *
 * Assembly is a small state machine. A slide is committed when the next
 * `#Slide:` marker arrives, at `#Slide: END`, or at end of input, so the
 * last slide is always kept. Malformed markup never fails compilation; every
 * deviation is reported as a [`MarkupWarning`].
 */

use log::{debug, info, warn};
use rand::Rng;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::bibliography::BibliographicRecord;
use crate::deck::{inches, DeckTemplate, SlideContent, SlideDeck, TemplateSelection, TextBox};
use crate::errors::CompileError;
use crate::layout::{next_layout, SlideLayoutChoice, REFERENCES_LAYOUT, REQUIRED_LAYOUTS, TITLE_LAYOUT};
use crate::markup::{Directive, MarkupDocument};

/// Title of the closing slide
pub const REFERENCES_TITLE: &str = "References";

/// Font size of footer text boxes, in points
pub const FOOTER_FONT_PT: u32 = 12;

/// Role of a slide within the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlideKind {
    Title,
    Content,
    References,
}

/// One slide of the assembled document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedSlide {
    pub kind: SlideKind,
    /// Layout index within the template
    pub layout_index: usize,
    /// Text of the title placeholder
    pub header: String,
    /// Body text, one paragraph per line
    pub body: String,
    /// Placeholder receiving the body; `None` puts the body in a text box
    pub body_placeholder: Option<u32>,
    /// Footnotes, each rendered as its own small text box
    pub footers: Vec<String>,
}

impl RenderedSlide {
    fn title(title: String) -> Self {
        Self {
            kind: SlideKind::Title,
            layout_index: TITLE_LAYOUT,
            header: title,
            body: String::new(),
            body_placeholder: None,
            footers: Vec::new(),
        }
    }

    fn references(records: &[BibliographicRecord]) -> Self {
        Self {
            kind: SlideKind::References,
            layout_index: REFERENCES_LAYOUT,
            header: REFERENCES_TITLE.to_string(),
            body: records
                .iter()
                .map(BibliographicRecord::reference_line)
                .collect::<Vec<_>>()
                .join("\n"),
            body_placeholder: None,
            footers: Vec::new(),
        }
    }

    // Deck representation of this slide.
    fn to_slide_content(&self) -> SlideContent {
        let mut content = SlideContent::new(self.layout_index, self.header.clone());

        match (self.kind, self.body_placeholder) {
            (SlideKind::References, _) => {
                let lines = if self.body.is_empty() {
                    Vec::new()
                } else {
                    self.body.split('\n').map(str::to_string).collect()
                };
                content = content.with_text_box(TextBox::new(
                    inches(0.5),
                    inches(1.0),
                    inches(6.0),
                    inches(6.0),
                    lines,
                ));
            },
            (_, Some(placeholder)) => content = content.with_body(placeholder, &self.body),
            (_, None) => {}
        }

        for footer in &self.footers {
            content = content.with_text_box(
                TextBox::new(inches(0.5), inches(7.0), inches(6.0), inches(0.5), vec![footer.clone()])
                    .font_size_pt(FOOTER_FONT_PT),
            );
        }
        content
    }
}

/// The in-memory document produced by assembly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Document title (empty when the markup has none)
    pub title: String,
    /// Title slide, content slides, references slide
    pub slides: Vec<RenderedSlide>,
}

impl RenderedDocument {
    pub fn content_slides(&self) -> impl Iterator<Item = &RenderedSlide> {
        self.slides.iter().filter(|s| s.kind == SlideKind::Content)
    }

    pub fn references_slide(&self) -> Option<&RenderedSlide> {
        self.slides.iter().rev().find(|s| s.kind == SlideKind::References)
    }
}

/// Non-fatal problems found while assembling markup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupWarning {
    /// No `#Title:` line; the title slide is left empty
    MissingTitle,
    /// A second `#Title:` line was ignored
    DuplicateTitle { text: String },
    /// Slide committed without a header
    MissingHeader { slide: usize },
    /// Slide committed without content
    MissingContent { slide: usize },
    /// A header or content line appeared before any `#Slide:`; a slide was opened for it
    OutsideSlide { directive: &'static str },
    /// A header or content line replaced an earlier one on the same slide
    Repeated { slide: usize, directive: &'static str },
    /// A footer appeared before any `#Slide:` and went onto the title slide
    FooterBeforeSlide,
    /// Input ended without `#Slide: END`
    MissingEndMarker,
    /// A directive after `#Slide: END` was ignored
    AfterEnd { directive: &'static str },
}

impl fmt::Display for MarkupWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingTitle => write!(f, "markup has no #Title: line"),
            Self::DuplicateTitle { text } => write!(f, "ignoring duplicate title '{}'", text),
            Self::MissingHeader { slide } => write!(f, "slide {} has no #Header:", slide),
            Self::MissingContent { slide } => write!(f, "slide {} has no #Content:", slide),
            Self::OutsideSlide { directive } => {
                write!(f, "{} found before any #Slide:; opened a slide for it", directive)
            },
            Self::Repeated { slide, directive } => {
                write!(f, "slide {} has more than one {}; keeping the last", slide, directive)
            },
            Self::FooterBeforeSlide => write!(f, "footer found before any #Slide:; added to the title slide"),
            Self::MissingEndMarker => write!(f, "markup ends without #Slide: END"),
            Self::AfterEnd { directive } => write!(f, "ignoring {} after #Slide: END", directive),
        }
    }
}

/// Result of assembling a markup document
#[derive(Debug, Clone)]
pub struct Compilation {
    pub document: RenderedDocument,
    pub warnings: Vec<MarkupWarning>,
}

// A content slide that has been opened but not yet committed.
#[derive(Debug)]
struct PendingSlide {
    number: usize,
    layout: SlideLayoutChoice,
    header: Option<String>,
    content: Option<String>,
    footers: Vec<String>,
}

#[derive(Debug)]
enum AssemblyState {
    NoActiveSlide,
    Accumulating(PendingSlide),
    Ended,
}

struct Assembler<'r, R: Rng + ?Sized> {
    rng: &'r mut R,
    state: AssemblyState,
    title: Option<String>,
    title_footers: Vec<String>,
    slides: Vec<RenderedSlide>,
    previous_layout: Option<SlideLayoutChoice>,
    opened: usize,
    warnings: Vec<MarkupWarning>,
}

impl<'r, R: Rng + ?Sized> Assembler<'r, R> {
    fn new(rng: &'r mut R) -> Self {
        Self {
            rng,
            state: AssemblyState::NoActiveSlide,
            title: None,
            title_footers: Vec::new(),
            slides: Vec::new(),
            previous_layout: None,
            opened: 0,
            warnings: Vec::new(),
        }
    }

    fn apply(&mut self, directive: &Directive) {
        if matches!(self.state, AssemblyState::Ended) {
            self.warnings.push(MarkupWarning::AfterEnd { directive: directive.kind() });
            return;
        }

        match directive {
            Directive::Title(text) => {
                if self.title.is_some() {
                    self.warnings.push(MarkupWarning::DuplicateTitle { text: text.clone() });
                } else {
                    self.title = Some(text.clone());
                }
            },
            Directive::SlideStart => {
                self.commit();
                self.open();
            },
            Directive::Header(text) => {
                let pending = self.pending_or_open("header");
                let replaced = pending.header.replace(text.clone()).is_some();
                let slide = pending.number;
                if replaced {
                    self.warnings.push(MarkupWarning::Repeated { slide, directive: "header" });
                }
            },
            Directive::Content(text) => {
                let pending = self.pending_or_open("content");
                let replaced = pending.content.replace(text.clone()).is_some();
                let slide = pending.number;
                if replaced {
                    self.warnings.push(MarkupWarning::Repeated { slide, directive: "content" });
                }
            },
            Directive::Footer(text) => match &mut self.state {
                AssemblyState::Accumulating(pending) => pending.footers.push(text.clone()),
                _ => {
                    self.title_footers.push(text.clone());
                    self.warnings.push(MarkupWarning::FooterBeforeSlide);
                },
            },
            Directive::End => {
                self.commit();
                self.state = AssemblyState::Ended;
            },
        }
    }

    fn open(&mut self) {
        let layout = next_layout(self.previous_layout, &mut *self.rng);
        self.previous_layout = Some(layout);
        self.opened += 1;
        debug!("Slide {} uses layout {}", self.opened, layout.layout_index);
        self.state = AssemblyState::Accumulating(PendingSlide {
            number: self.opened,
            layout,
            header: None,
            content: None,
            footers: Vec::new(),
        });
    }

    fn pending_or_open(&mut self, directive: &'static str) -> &mut PendingSlide {
        if !matches!(self.state, AssemblyState::Accumulating(_)) {
            self.warnings.push(MarkupWarning::OutsideSlide { directive });
            self.open();
        }
        match &mut self.state {
            AssemblyState::Accumulating(pending) => pending,
            _ => unreachable!("a slide was just opened"),
        }
    }

    fn commit(&mut self) {
        let AssemblyState::Accumulating(pending) = std::mem::replace(&mut self.state, AssemblyState::NoActiveSlide)
        else {
            return;
        };

        let header = pending.header.unwrap_or_else(|| {
            self.warnings.push(MarkupWarning::MissingHeader { slide: pending.number });
            String::new()
        });
        let body = pending.content.unwrap_or_else(|| {
            self.warnings.push(MarkupWarning::MissingContent { slide: pending.number });
            String::new()
        });

        self.slides.push(RenderedSlide {
            kind: SlideKind::Content,
            layout_index: pending.layout.layout_index,
            header,
            body,
            body_placeholder: Some(pending.layout.body_placeholder),
            footers: pending.footers,
        });
    }

    fn finish(mut self, records: &[BibliographicRecord]) -> Compilation {
        if !matches!(self.state, AssemblyState::Ended) {
            self.warnings.push(MarkupWarning::MissingEndMarker);
            self.commit();
        }

        let title = self.title.unwrap_or_else(|| {
            self.warnings.push(MarkupWarning::MissingTitle);
            String::new()
        });

        let mut title_slide = RenderedSlide::title(title.clone());
        title_slide.footers = self.title_footers;

        let mut slides = Vec::with_capacity(self.slides.len() + 2);
        slides.push(title_slide);
        slides.extend(self.slides);
        slides.push(RenderedSlide::references(records));

        Compilation {
            document: RenderedDocument { title, slides },
            warnings: self.warnings,
        }
    }
}

/// Assemble a parsed markup document and its records into slides
pub fn assemble<R: Rng + ?Sized>(
    document: &MarkupDocument,
    records: &[BibliographicRecord],
    rng: &mut R,
) -> Compilation {
    let mut assembler = Assembler::new(rng);
    for directive in document.directives() {
        assembler.apply(directive);
    }
    assembler.finish(records)
}

/// Outcome of a successful compilation
#[derive(Debug, Clone)]
pub struct CompileOutcome {
    /// Written `.pptx` file
    pub path: PathBuf,
    /// The document that was written
    pub document: RenderedDocument,
    /// Markup problems that were tolerated
    pub warnings: Vec<MarkupWarning>,
}

/// Compiles markup onto templates from a designs directory
#[derive(Debug, Clone)]
pub struct SlideCompiler {
    // @field: Directory holding Design-<n>.pptx
    designs_dir: PathBuf,
    // @field: Directory receiving generated decks
    output_dir: PathBuf,
}

impl SlideCompiler {
    pub fn new(designs_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            designs_dir: designs_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn designs_dir(&self) -> &Path {
        &self.designs_dir
    }

    /// `<output_dir>/<document_name>.pptx`
    pub fn output_path(&self, document_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.pptx", document_name))
    }

    /// Compile markup into `<output_dir>/<document_name>.pptx`
    pub fn compile(
        &self,
        markup_text: &str,
        template: TemplateSelection,
        records: &[BibliographicRecord],
        document_name: &str,
    ) -> Result<CompileOutcome, CompileError> {
        self.compile_with_rng(markup_text, template, records, document_name, &mut rand::rng())
    }

    /// Same as [`compile`](Self::compile) with an explicit layout RNG
    pub fn compile_with_rng<R: Rng + ?Sized>(
        &self,
        markup_text: &str,
        template: TemplateSelection,
        records: &[BibliographicRecord],
        document_name: &str,
        rng: &mut R,
    ) -> Result<CompileOutcome, CompileError> {
        let template_path = template.template_path(&self.designs_dir);
        let deck_template = DeckTemplate::load(&template_path).map_err(CompileError::Configuration)?;
        deck_template
            .ensure_layouts(&REQUIRED_LAYOUTS)
            .map_err(CompileError::Configuration)?;

        let markup = MarkupDocument::parse(markup_text);
        let Compilation { document, warnings } = assemble(&markup, records, rng);
        for warning in &warnings {
            warn!("Markup: {}", warning);
        }

        let mut deck = SlideDeck::new(deck_template);
        for slide in &document.slides {
            deck.add_slide(slide.to_slide_content()).map_err(CompileError::Configuration)?;
        }
        let package = deck.into_package().map_err(CompileError::Configuration)?;

        let output_path = self.output_path(document_name);
        let path = package.save(&output_path).map_err(CompileError::Persistence)?;

        info!(
            "Compiled {} slides onto design {} into {}",
            document.slides.len(),
            template,
            path.display()
        );

        Ok(CompileOutcome { path, document, warnings })
    }
}
