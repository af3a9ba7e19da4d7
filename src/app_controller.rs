use anyhow::{anyhow, bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::app_config::{validate_year_range, Config};
use crate::bibliography::pubmed::PubMedClient;
use crate::bibliography::{ArticleQuery, ArticleSource, BibliographicRecord, StaticArticles};
use crate::compiler::{MarkupWarning, SlideCompiler};
use crate::deck::TemplateSelection;
use crate::file_utils::{sanitize_file_stem, FileManager, FileType};
use crate::generation_service::GenerationService;
use crate::images::{ImageFetcher, ImageReport};

// @module: Application controller for presentation generation

/// What the user asked for
#[derive(Debug, Clone)]
pub struct PresentationRequest {
    /// Free-text topic
    pub topic: String,
    /// Requested design number, clamped to an available one
    pub design: i64,
    /// First publication year searched
    pub start_year: u16,
    /// Last publication year searched
    pub end_year: u16,
    /// Output file stem, defaults to the sanitized topic
    pub name: Option<String>,
    /// Also search and download topic images
    pub images: bool,
}

impl PresentationRequest {
    /// Request with the configured defaults for everything but the topic
    pub fn new(topic: impl Into<String>, config: &Config) -> Self {
        Self {
            topic: topic.into(),
            design: i64::from(TemplateSelection::default().number()),
            start_year: config.bibliography.start_year,
            end_year: config.bibliography.end_year,
            name: None,
            images: config.images.enabled,
        }
    }

    /// Output file stem
    pub fn document_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => sanitize_file_stem(name),
            _ => sanitize_file_stem(&self.topic),
        }
    }
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct PresentationOutcome {
    // @field: Written deck
    pub path: PathBuf,
    // @field: Cached markup the deck was compiled from
    pub markup_path: Option<PathBuf>,
    // @field: HTML download page, when enabled
    pub download_page: Option<PathBuf>,
    // @field: Design actually used
    pub design: TemplateSelection,
    // @field: Articles cited on the references slide
    pub articles: Vec<BibliographicRecord>,
    // @field: Articles that could not be fetched (id, reason)
    pub lookup_failures: Vec<(String, String)>,
    // @field: Image step result, when it ran
    pub images: Option<ImageReport>,
    // @field: Tolerated markup problems
    pub warnings: Vec<MarkupWarning>,
}

/// Main application controller for presentation generation
pub struct Controller {
    // @field: App configuration
    config: Config,

    // @field: Markup generator, absent for offline compilation
    generator: Option<GenerationService>,

    // @field: Article lookup service
    articles: Box<dyn ArticleSource>,
}

impl Controller {
    // @method: Create a controller that talks to the configured services
    pub fn with_config(config: Config) -> Result<Self> {
        let generator = GenerationService::new(config.generation.clone())
            .context("Failed to create generation service")?;
        let articles = PubMedClient::from_config(&config.bibliography);

        Ok(Self {
            config,
            generator: Some(generator),
            articles: Box::new(articles),
        })
    }

    // @method: Create a controller that only compiles existing markup
    pub fn offline(config: Config) -> Self {
        Self {
            config,
            generator: None,
            articles: Box::new(StaticArticles::default()),
        }
    }

    // @method: Create a controller from explicit collaborators
    pub fn with_services(config: Config, generator: GenerationService, articles: Box<dyn ArticleSource>) -> Self {
        Self {
            config,
            generator: Some(generator),
            articles,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn compiler(&self) -> SlideCompiler {
        SlideCompiler::new(&self.config.paths.designs_dir, &self.config.paths.output_dir)
    }

    /// Run the whole workflow: lookup, generation, caching and compilation
    pub async fn run(&self, request: PresentationRequest) -> Result<PresentationOutcome> {
        let start_time = std::time::Instant::now();
        let generator = self.generator.as_ref()
            .ok_or_else(|| anyhow!("No generation provider configured"))?;

        let topic = request.topic.trim();
        if topic.is_empty() {
            return Err(anyhow!("Topic must not be empty"));
        }
        validate_year_range(request.start_year, request.end_year)?;

        let design = select_design(request.design);
        self.ensure_design(design)?;
        info!("Design number {} selected.", design);

        let progress = new_spinner("Checking generation provider...");
        let connection = generator.test_connection().await;
        progress.finish_and_clear();
        connection?;

        let images = if request.images {
            self.fetch_images(topic).await
        } else {
            None
        };

        // Lookup
        let progress = new_spinner("Fetching PubMed articles...");
        let query = ArticleQuery::new(
            topic,
            request.start_year,
            request.end_year,
            self.config.bibliography.max_articles,
        );
        let report = self.articles.find_articles(&query).await;
        progress.finish_and_clear();
        let report = report.context("Failed to search PubMed")?;

        for (i, article) in report.records.iter().enumerate() {
            info!(
                "Article {}: {} ({}) by {}",
                i + 1,
                article.title,
                article.publication_year,
                article.authors_line()
            );
        }
        for (id, reason) in &report.failures {
            warn!("Article {} skipped: {}", id, reason);
        }
        info!("PubMed articles fetched: {} found, {} skipped", report.records.len(), report.failures.len());

        // Generation
        let progress = new_spinner("Generating presentation text...");
        let markup = generator.generate_markup(topic, &report.records).await;
        progress.finish_and_clear();
        let markup = markup.context("Failed to generate presentation text")?;
        debug!("{}", generator.usage().summary());

        let markup_path = FileManager::cache_path(&self.config.paths.cache_dir, topic);
        FileManager::write_to_file(&markup_path, &markup)?;
        debug!("Cached markup at {:?}", markup_path);

        // Compilation reads back the cached text
        let cached = FileManager::read_to_string(&markup_path)?;
        let document_name = request.document_name();
        let outcome = self.compiler()
            .compile(&cached, design, &report.records, &document_name)
            .with_context(|| format!("Failed to build presentation '{}'", document_name))?;

        let download_page = self.write_download_page(&outcome.path, &document_name)?;

        info!(
            "Presentation ready at {} ({} warnings) in {:.1}s",
            outcome.path.display(),
            outcome.warnings.len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(PresentationOutcome {
            path: outcome.path,
            markup_path: Some(markup_path),
            download_page,
            design,
            articles: report.records,
            lookup_failures: report.failures,
            images,
            warnings: outcome.warnings,
        })
    }

    /// Compile an existing markup file without calling any remote service
    pub fn compile_file(
        &self,
        markup_path: &Path,
        design: i64,
        references: Option<&Path>,
        name: Option<&str>,
    ) -> Result<PresentationOutcome> {
        ensure_input_kind(markup_path, FileType::Markup)?;
        if let Some(path) = references {
            ensure_input_kind(path, FileType::References)?;
        }

        let markup = FileManager::read_to_string(markup_path)?;
        let articles = match references {
            Some(path) => load_references(path)?,
            None => Vec::new(),
        };

        let design = select_design(design);
        self.ensure_design(design)?;
        let document_name = match name {
            Some(name) if !name.trim().is_empty() => sanitize_file_stem(name),
            _ => markup_path
                .file_stem()
                .map(|stem| sanitize_file_stem(&stem.to_string_lossy()))
                .unwrap_or_else(|| sanitize_file_stem("")),
        };

        let outcome = self.compiler()
            .compile(&markup, design, &articles, &document_name)
            .with_context(|| format!("Failed to build presentation '{}'", document_name))?;
        let download_page = self.write_download_page(&outcome.path, &document_name)?;

        Ok(PresentationOutcome {
            path: outcome.path,
            markup_path: Some(markup_path.to_path_buf()),
            download_page,
            design,
            articles,
            lookup_failures: Vec::new(),
            images: None,
            warnings: outcome.warnings,
        })
    }

    // Image failures never abort the run.
    async fn fetch_images(&self, topic: &str) -> Option<ImageReport> {
        let fetcher = ImageFetcher::new(&self.config.images, &self.config.paths.images_dir);
        let progress = new_spinner("Searching images...");
        let result = fetcher.fetch(topic).await;
        progress.finish_and_clear();

        match result {
            Ok(report) => Some(report),
            Err(e) => {
                warn!("Image search skipped: {}", e);
                None
            }
        }
    }

    // Fails before any remote call when the design file is missing.
    fn ensure_design(&self, design: TemplateSelection) -> Result<()> {
        let designs_dir = &self.config.paths.designs_dir;
        if FileManager::file_exists(design.template_path(designs_dir)) {
            return Ok(());
        }

        let available = FileManager::available_designs(designs_dir)?;
        if available.is_empty() {
            bail!("Design {} not found: no designs in {}", design, designs_dir.display());
        }
        let listed: Vec<String> = available.iter().map(u8::to_string).collect();
        bail!(
            "Design {} not found in {}; available designs: {}",
            design,
            designs_dir.display(),
            listed.join(", ")
        )
    }

    fn write_download_page(&self, deck_path: &Path, document_name: &str) -> Result<Option<PathBuf>> {
        if !self.config.output.write_download_page {
            return Ok(None);
        }
        let page = FileManager::write_download_page(deck_path, document_name)?;
        info!("Download page written to {}", page.display());
        Ok(Some(page))
    }
}

/// Clamp a requested design number, reporting when the default is used
pub fn select_design(requested: i64) -> TemplateSelection {
    if !TemplateSelection::is_available(requested) {
        warn!("Unavailable design {}, using default design...", requested);
    }
    TemplateSelection::clamped(requested)
}

// Markup must not be a deck or a references file, and the other way round.
// Inputs whose kind can't be told apart are accepted with a warning.
fn ensure_input_kind(path: &Path, expected: FileType) -> Result<()> {
    if !FileManager::file_exists(path) {
        bail!("Input file not found: {:?}", path);
    }
    match FileManager::detect_file_type(path)? {
        found if found == expected => Ok(()),
        FileType::Unknown => {
            warn!("Could not tell what kind of file {:?} is, reading it as {:?}", path, expected);
            Ok(())
        },
        found => bail!("{:?} looks like a {:?} file, expected {:?}", path, found, expected),
    }
}

/// Read a JSON array of bibliographic records
pub fn load_references(path: &Path) -> Result<Vec<BibliographicRecord>> {
    let content = FileManager::read_to_string(path)?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse references file: {:?}", path))
}

fn new_spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner} [{elapsed_precise}] {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
