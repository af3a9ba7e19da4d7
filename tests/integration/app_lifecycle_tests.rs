/*!
 * Full application lifecycle: lookup, generation, caching and compilation
 */

use anyhow::Result;
use async_trait::async_trait;

use pubdeck::app_config::GenerationConfig;
use pubdeck::bibliography::{ArticleQuery, ArticleSource, LookupReport, StaticArticles};
use pubdeck::errors::LookupError;
use pubdeck::file_utils::FileManager;
use pubdeck::providers::mock::MockProvider;
use pubdeck::{read_outline, BibliographicRecord, Config, Controller, GenerationService, PresentationRequest};
use crate::common;

fn controller(config: Config, provider: MockProvider) -> Controller {
    Controller::with_services(
        config,
        GenerationService::with_mock(provider, GenerationConfig::default()),
        Box::new(StaticArticles::new(common::sample_records())),
    )
}

/// Article source where one identifier out of several cannot be fetched
struct PartiallyFailingArticles {
    failing_id: &'static str,
}

#[async_trait]
impl ArticleSource for PartiallyFailingArticles {
    async fn find_articles(&self, _query: &ArticleQuery) -> Result<LookupReport, LookupError> {
        let mut report = LookupReport::default();
        for (id, record) in ["101", "102", "103"].into_iter().zip(
            common::sample_records().into_iter().chain(std::iter::once(BibliographicRecord::new(
                "Peri-implantitis",
                vec!["Novak P".to_string()],
                "2022",
            ))),
        ) {
            if id == self.failing_id {
                report.failures.push((id.to_string(), LookupError::NotFound(id.to_string()).to_string()));
            } else {
                report.records.push(record);
            }
        }
        Ok(report)
    }
}

/// Test a complete run with a working provider
#[tokio::test]
async fn test_run_withWorkingProvider_shouldCacheMarkupAndWriteDeck() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let controller = controller(config.clone(), MockProvider::working());

    let request = PresentationRequest::new("Dental implants", &config);
    let outcome = controller.run(request).await?;

    assert_eq!(outcome.path, config.paths.output_dir.join("Dental implants.pptx"));
    assert!(outcome.path.exists());
    assert_eq!(outcome.articles.len(), 2);
    assert!(outcome.lookup_failures.is_empty());
    assert!(outcome.images.is_none());
    assert!(outcome.download_page.is_none());

    let markup_path = outcome.markup_path.expect("markup is cached");
    assert_eq!(markup_path, config.paths.cache_dir.join("Dental implants.txt"));
    assert!(FileManager::read_to_string(&markup_path)?.starts_with("#Title: Mock presentation"));

    let slides = read_outline(&outcome.path)?;
    assert_eq!(slides.len(), 1 + 3 + 1);
    assert_eq!(slides[0].title().as_deref(), Some("Mock presentation"));
    let references: Vec<String> = slides[4].text_boxes().flat_map(|b| b.paragraphs.clone()).collect();
    assert_eq!(references[0], "Implant survival by Smith J, Doe A (2019)");
    Ok(())
}

/// Test that one failed article is skipped while the rest reach the references slide
#[tokio::test]
async fn test_run_withOneFailedArticle_shouldSkipItAndContinue() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let controller = Controller::with_services(
        config.clone(),
        GenerationService::with_mock(MockProvider::working(), GenerationConfig::default()),
        Box::new(PartiallyFailingArticles { failing_id: "102" }),
    );

    let outcome = controller.run(PresentationRequest::new("implants", &config)).await?;

    assert!(outcome.path.exists());
    assert_eq!(outcome.articles.len(), 2);
    assert_eq!(outcome.lookup_failures.len(), 1);
    assert_eq!(outcome.lookup_failures[0].0, "102");
    let slides = read_outline(&outcome.path)?;
    let references: Vec<String> = slides.last().expect("deck has slides").text_boxes().flat_map(|b| b.paragraphs.clone()).collect();
    assert_eq!(
        references,
        vec![
            "Implant survival by Smith J, Doe A (2019)".to_string(),
            "Peri-implantitis by Novak P (2022)".to_string(),
        ]
    );
    Ok(())
}

/// Test that an unavailable design falls back to the default one
#[tokio::test]
async fn test_run_withUnavailableDesign_shouldUseDefaultDesign() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let controller = controller(config.clone(), MockProvider::working());

    let mut request = PresentationRequest::new("implants", &config);
    request.design = 9;
    request.name = Some("fallback".to_string());
    let outcome = controller.run(request).await?;

    assert_eq!(outcome.design.number(), 1);
    assert_eq!(outcome.path.file_name().and_then(|n| n.to_str()), Some("fallback.pptx"));
    Ok(())
}

/// Test that an unreachable provider aborts before anything is written
#[tokio::test]
async fn test_run_withFailingProvider_shouldFailConnectionCheckWithoutDeck() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let controller = controller(config.clone(), MockProvider::failing());

    let result = controller.run(PresentationRequest::new("implants", &config)).await;

    let error = result.expect_err("connection failure is fatal");
    assert!(format!("{:#}", error).contains("Failed to connect"));
    assert!(!config.paths.output_dir.join("implants.pptx").exists());
    assert!(!config.paths.cache_dir.join("implants.txt").exists());
    Ok(())
}

/// Test that an empty answer aborts before anything is written
#[tokio::test]
async fn test_run_withEmptyProvider_shouldFailWithoutDeck() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let controller = controller(config.clone(), MockProvider::empty());

    let result = controller.run(PresentationRequest::new("implants", &config)).await;

    let error = result.expect_err("generation failure is fatal");
    assert!(format!("{:#}", error).contains("Failed to generate presentation text"));
    assert!(!config.paths.output_dir.join("implants.pptx").exists());
    assert!(!config.paths.cache_dir.join("implants.txt").exists());
    Ok(())
}

/// Test that a missing design file is reported with the designs that do exist
#[tokio::test]
async fn test_run_withMissingDesignFile_shouldListAvailableDesigns() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    common::write_minimal_template(&config.paths.designs_dir, 3)?;
    let controller = controller(config.clone(), MockProvider::working());

    let mut request = PresentationRequest::new("implants", &config);
    request.design = 4;
    let error = controller.run(request).await.expect_err("design 4 is missing");

    assert!(error.to_string().contains("available designs: 1, 3"));
    assert!(!config.paths.cache_dir.join("implants.txt").exists());
    Ok(())
}

/// Test that a truncated answer still compiles with a warning
#[tokio::test]
async fn test_run_withTruncatedProvider_shouldCompileWithWarning() -> Result<()> {
    common::init_test_logging();
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let controller = controller(config.clone(), MockProvider::truncated());

    let outcome = controller.run(PresentationRequest::new("implants", &config)).await?;

    assert!(outcome.warnings.contains(&pubdeck::MarkupWarning::MissingEndMarker));
    assert_eq!(read_outline(&outcome.path)?.len(), 1 + 2 + 1);
    Ok(())
}

/// Test request validation
#[tokio::test]
async fn test_run_withInvalidRequest_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let controller = controller(config.clone(), MockProvider::working());

    assert!(controller.run(PresentationRequest::new("   ", &config)).await.is_err());

    let mut reversed = PresentationRequest::new("implants", &config);
    reversed.start_year = 2024;
    reversed.end_year = 2020;
    assert!(controller.run(reversed).await.is_err());
    Ok(())
}

/// Test that offline controllers refuse to generate
#[test]
fn test_run_onOfflineController_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    let controller = Controller::offline(config.clone());

    let result = tokio_test::block_on(async {
        controller.run(PresentationRequest::new("implants", &config)).await
    });

    assert!(result.is_err());
    Ok(())
}

/// Test the download page option
#[tokio::test]
async fn test_run_withDownloadPage_shouldWriteHtml() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let mut config = common::config_in(temp_dir.path());
    config.output.write_download_page = true;
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let controller = controller(config.clone(), MockProvider::working());

    let outcome = controller.run(PresentationRequest::new("implants", &config)).await?;

    let page = outcome.download_page.expect("download page requested");
    assert_eq!(page, config.paths.output_dir.join("implants.html"));
    assert!(FileManager::read_to_string(&page)?.contains("download=\"implants.pptx\""));
    Ok(())
}

/// Test compiling a cached markup file with a references file
#[test]
fn test_compileFile_withReferences_shouldCompileOffline() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let markup = common::create_test_file(temp_dir.path(), "lecture.txt", &common::sample_markup(2))?;
    let references = common::create_test_file(
        temp_dir.path(),
        "refs.json",
        r#"[{"title": "A", "authors": ["B"], "publication_year": "2020"},
            {"title": "C", "authors": "D, E", "pub_date": "2021"}]"#,
    )?;
    let controller = Controller::offline(config.clone());

    let outcome = controller.compile_file(&markup, 1, Some(&references), None)?;

    assert_eq!(outcome.path, config.paths.output_dir.join("lecture.pptx"));
    assert_eq!(outcome.articles.len(), 2);
    let slides = read_outline(&outcome.path)?;
    assert_eq!(slides.len(), 4);
    let lines: Vec<String> = slides[3].text_boxes().flat_map(|b| b.paragraphs.clone()).collect();
    assert_eq!(lines, vec!["A by B (2020)".to_string(), "C by D, E (2021)".to_string()]);
    Ok(())
}

/// Test that a malformed references file is reported
#[test]
fn test_compileFile_withBadReferences_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let markup = common::create_test_file(temp_dir.path(), "lecture.txt", common::ROUND_TRIP_MARKUP)?;
    let references = common::create_test_file(temp_dir.path(), "refs.json", "{ not a list")?;
    let controller = Controller::offline(config);

    assert!(controller.compile_file(&markup, 1, Some(&references), Some("named")).is_err());
    Ok(())
}

/// Test that a deck passed as markup is refused before compiling
#[test]
fn test_compileFile_withPresentationAsMarkup_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let config = common::config_in(temp_dir.path());
    common::write_minimal_template(&config.paths.designs_dir, 1)?;
    let deck = config.paths.designs_dir.join("Design-1.pptx");
    let markup = common::create_test_file(temp_dir.path(), "lecture.txt", common::ROUND_TRIP_MARKUP)?;
    let controller = Controller::offline(config.clone());

    let error = controller.compile_file(&deck, 1, None, Some("deck")).expect_err("a deck is not markup");
    assert!(error.to_string().contains("Presentation"));

    let error = controller.compile_file(&markup, 1, Some(&markup), None).expect_err("markup is not a references list");
    assert!(error.to_string().contains("expected References"));

    let missing = temp_dir.path().join("missing.txt");
    assert!(controller.compile_file(&missing, 1, None, None).is_err());
    assert!(!config.paths.output_dir.join("deck.pptx").exists());
    Ok(())
}
