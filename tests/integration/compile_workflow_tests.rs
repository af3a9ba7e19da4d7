/*!
 * Markup to presentation compilation, checked by reading the written deck back
 */

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::io::Read;

use pubdeck::app_controller::select_design;
use pubdeck::compiler::{RenderedSlide, SlideKind, REFERENCES_TITLE};
use pubdeck::{read_outline, BibliographicRecord, CompileError, MarkupWarning, SlideCompiler, TemplateSelection};
use crate::common;

fn compiler_in(root: &std::path::Path) -> Result<SlideCompiler> {
    let designs = root.join("Designs");
    common::write_minimal_template(&designs, 1)?;
    Ok(SlideCompiler::new(designs, root.join("GeneratedPresentations")))
}

/// Test the round-trip example end to end
#[test]
fn test_compile_roundTripMarkup_shouldWriteExpectedSlides() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let compiler = compiler_in(temp_dir.path())?;
    let records = vec![BibliographicRecord::new("A", vec!["B".to_string()], "2020")];

    let outcome = compiler.compile(common::ROUND_TRIP_MARKUP, TemplateSelection::default(), &records, "round-trip")?;

    assert_eq!(outcome.path, temp_dir.path().join("GeneratedPresentations").join("round-trip.pptx"));
    assert!(outcome.warnings.is_empty());

    let slides = read_outline(&outcome.path)?;
    assert_eq!(slides.len(), 3);

    assert_eq!(slides[0].title().as_deref(), Some("T"));
    assert_eq!(slides[0].layout_index, Some(0));

    assert_eq!(slides[1].layout_index, Some(1));
    assert_eq!(slides[1].title().as_deref(), Some("H1"));
    assert_eq!(slides[1].placeholder_text(1).as_deref(), Some("line1\nline2"));
    let footers: Vec<_> = slides[1].text_boxes().collect();
    assert_eq!(footers.len(), 1);
    assert_eq!(footers[0].text(), "F1");
    assert_eq!(footers[0].font_size, Some(1200));

    assert_eq!(slides[2].layout_index, Some(5));
    assert_eq!(slides[2].title().as_deref(), Some(REFERENCES_TITLE));
    let references: Vec<_> = slides[2].text_boxes().collect();
    assert_eq!(references.len(), 1);
    assert_eq!(references[0].text(), "A by B (2020)");
    Ok(())
}

/// Test slide count and body placement across several content slides
#[test]
fn test_compile_withSeveralSlides_shouldPlaceBodiesInChosenPlaceholders() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let compiler = compiler_in(temp_dir.path())?;
    let mut rng = StdRng::seed_from_u64(3);

    let outcome = compiler.compile_with_rng(
        &common::sample_markup(6),
        TemplateSelection::default(),
        &common::sample_records(),
        "implants",
        &mut rng,
    )?;

    let slides = read_outline(&outcome.path)?;
    assert_eq!(slides.len(), 1 + 6 + 1);
    assert_eq!(outcome.document.slides.len(), slides.len());

    let rendered: Vec<&RenderedSlide> = outcome.document.content_slides().collect();
    for (i, (slide, outline)) in rendered.iter().zip(&slides[1..7]).enumerate() {
        assert_eq!(outline.layout_index, Some(slide.layout_index));
        assert_eq!(outline.title(), Some(format!("Header {}", i + 1)));
        let placeholder = slide.body_placeholder.expect("content slides use a placeholder");
        assert_eq!(outline.placeholder_text(placeholder), Some(slide.body.clone()));
        assert!(slide.body.contains(&format!("Second line {}", i + 1)));
        let footers: Vec<String> = outline.text_boxes().map(|b| b.text()).collect();
        assert_eq!(footers, vec![format!("Source {}", i + 1)]);
    }
    Ok(())
}

/// Test that consecutive content slides never share a layout
#[test]
fn test_compile_withManySlides_shouldNeverRepeatLayoutConsecutively() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let compiler = compiler_in(temp_dir.path())?;

    for seed in 0..5 {
        let mut rng = StdRng::seed_from_u64(seed);
        let outcome = compiler.compile_with_rng(
            &common::sample_markup(12),
            TemplateSelection::default(),
            &[],
            "layouts",
            &mut rng,
        )?;

        let layouts: Vec<usize> = outcome.document.content_slides().map(|s| s.layout_index).collect();
        assert_eq!(layouts[0], 1);
        assert!(layouts.iter().all(|l| [1, 7, 8].contains(l)));
        assert!(layouts.windows(2).all(|pair| pair[0] != pair[1]));
    }
    Ok(())
}

/// Test that the references slide lists every record in order
#[test]
fn test_compile_withRecords_shouldListAllReferencesInOrder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let compiler = compiler_in(temp_dir.path())?;

    let outcome = compiler.compile(&common::sample_markup(1), TemplateSelection::default(), &common::sample_records(), "refs")?;

    let slides = read_outline(&outcome.path)?;
    let last = slides.last().expect("deck has slides");
    let lines: Vec<String> = last.text_boxes().flat_map(|b| b.paragraphs.clone()).collect();
    assert_eq!(
        lines,
        vec![
            "Implant survival by Smith J, Doe A (2019)".to_string(),
            "Bone grafts by Lee K (2021)".to_string(),
        ]
    );
    let references = outcome.document.references_slide().expect("references slide");
    assert_eq!(references.kind, SlideKind::References);
    Ok(())
}

/// Test that markup without an end marker still keeps its last slide
#[test]
fn test_compile_withoutEndMarker_shouldKeepLastSlideAndWarn() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let compiler = compiler_in(temp_dir.path())?;
    let markup = "#Title: T\n#Slide: 1\n#Header: H1\n#Content: c1\n#Slide: 2\n#Header: last\n#Content: tail";

    let outcome = compiler.compile(markup, TemplateSelection::default(), &[], "truncated")?;

    assert!(outcome.warnings.contains(&MarkupWarning::MissingEndMarker));
    let slides = read_outline(&outcome.path)?;
    assert_eq!(slides.len(), 4);
    assert_eq!(slides[2].title().as_deref(), Some("last"));
    Ok(())
}

/// Test that an empty document still yields title and references slides
#[test]
fn test_compile_withEmptyMarkup_shouldWriteTitleAndReferencesOnly() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let compiler = compiler_in(temp_dir.path())?;

    let outcome = compiler.compile("", TemplateSelection::default(), &[], "empty")?;

    assert!(outcome.warnings.contains(&MarkupWarning::MissingTitle));
    assert_eq!(read_outline(&outcome.path)?.len(), 2);
    Ok(())
}

/// Test design clamping resolves to the default template file
#[test]
fn test_compile_withOutOfRangeDesign_shouldUseDefaultTemplate() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let compiler = compiler_in(temp_dir.path())?;

    for requested in [0, 8] {
        let selection = select_design(requested);
        assert_eq!(selection, TemplateSelection::default());
        let outcome = compiler.compile(common::ROUND_TRIP_MARKUP, selection, &[], &format!("design-{}", requested))?;
        assert!(outcome.path.exists());
    }
    Ok(())
}

/// Test that a missing design file is a configuration error
#[test]
fn test_compile_withMissingTemplate_shouldReturnConfigurationError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let compiler = compiler_in(temp_dir.path())?;

    let result = compiler.compile(common::ROUND_TRIP_MARKUP, TemplateSelection::clamped(4), &[], "missing");

    assert!(matches!(result, Err(CompileError::Configuration(_))));
    Ok(())
}

/// Test that a template lacking a required layout is a configuration error
#[test]
fn test_compile_withTooFewLayouts_shouldReturnConfigurationError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let designs = temp_dir.path().join("Designs");
    common::write_template_with_layouts(&designs, 2, 6)?;
    let compiler = SlideCompiler::new(designs, temp_dir.path().join("out"));

    let result = compiler.compile(common::ROUND_TRIP_MARKUP, TemplateSelection::clamped(2), &[], "short");

    assert!(matches!(result, Err(CompileError::Configuration(_))));
    assert!(!temp_dir.path().join("out").join("short.pptx").exists());
    Ok(())
}

/// Test that an unwritable output location is a persistence error
#[test]
fn test_compile_withOutputDirIsFile_shouldReturnPersistenceError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let designs = temp_dir.path().join("Designs");
    common::write_minimal_template(&designs, 1)?;
    let blocker = common::create_test_file(temp_dir.path(), "GeneratedPresentations", "not a directory")?;
    let compiler = SlideCompiler::new(designs, blocker);

    let result = compiler.compile(common::ROUND_TRIP_MARKUP, TemplateSelection::default(), &[], "blocked");

    assert!(matches!(result, Err(CompileError::Persistence(_))));
    Ok(())
}

/// Test that compiling twice under one name replaces the earlier deck
#[test]
fn test_compile_twiceWithSameName_shouldOverwrite() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let compiler = compiler_in(temp_dir.path())?;

    compiler.compile(&common::sample_markup(4), TemplateSelection::default(), &[], "same")?;
    let outcome = compiler.compile(common::ROUND_TRIP_MARKUP, TemplateSelection::default(), &[], "same")?;

    assert_eq!(read_outline(&outcome.path)?.len(), 3);
    Ok(())
}

/// Test that control characters in markup and records never reach the XML unencoded
#[test]
fn test_compile_withControlCharacters_shouldWriteWellFormedParts() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let compiler = compiler_in(temp_dir.path())?;
    let markup = "#Title: T\n#Slide: 1\n#Header: H\u{0B}1\n#Content: a\u{01}b\n#Slide: END\n";
    let records = vec![BibliographicRecord::new("A\u{1B}", vec!["B".to_string()], "2020")];

    let outcome = compiler.compile(markup, TemplateSelection::default(), &records, "control")?;

    let mut archive = zip::ZipArchive::new(std::fs::File::open(&outcome.path)?)?;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let mut content = String::new();
        entry.read_to_string(&mut content)?;
        assert!(
            !content.chars().any(|c| c < ' ' && !matches!(c, '\t' | '\n' | '\r')),
            "{} holds a character XML 1.0 forbids",
            entry.name()
        );
    }

    let slides = read_outline(&outcome.path)?;
    assert_eq!(slides[1].title().as_deref(), Some("H\u{0B}1"));
    assert_eq!(slides[1].placeholder_text(1).as_deref(), Some("a_x0001_b"));
    let references: Vec<String> = slides[2].text_boxes().map(|b| b.text()).collect();
    assert_eq!(references, vec!["A_x001B_ by B (2020)".to_string()]);
    Ok(())
}
