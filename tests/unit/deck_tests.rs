/*!
 * Tests for template loading and slide deck writing
 */

use anyhow::Result;
use pubdeck::deck::{
    inches, read_outline, DeckTemplate, Package, SlideContent, SlideDeck, TextBox,
};
use pubdeck::DeckError;
use crate::common;

/// Test that layouts follow the master's list order and skip footer placeholders
#[test]
fn test_load_withMinimalTemplate_shouldListLayoutsInMasterOrder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::write_minimal_template(temp_dir.path(), 1)?;

    let template = DeckTemplate::load(&path)?;

    assert_eq!(template.layouts().len(), 9);
    assert_eq!(template.presentation_part(), "ppt/presentation.xml");
    let title_layout = template.layout(0)?;
    assert_eq!(title_layout.title_placeholder().map(|p| p.kind.as_str()), Some("ctrTitle"));
    assert!(title_layout.placeholders.iter().all(|p| p.kind != "dt"));
    assert!(template.layout(1)?.placeholders.iter().all(|p| p.kind != "ftr"));
    assert_eq!(template.layout(8)?.placeholder(2).map(|p| p.kind.as_str()), Some("body"));
    assert!(matches!(template.layout(9), Err(DeckError::UnknownLayout { index: 9, available: 9 })));
    Ok(())
}

/// Test the missing-file error
#[test]
fn test_load_withMissingFile_shouldReturnTemplateNotFound() {
    let temp_dir = common::create_temp_dir().unwrap();
    let result = DeckTemplate::load(&temp_dir.path().join("Design-1.pptx"));
    assert!(matches!(result, Err(DeckError::TemplateNotFound(_))));
}

/// Test that a file that is not a zip is an invalid template
#[test]
fn test_load_withGarbageFile_shouldReturnInvalidTemplate() {
    let temp_dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(temp_dir.path(), "Design-1.pptx", "not a zip").unwrap();

    let result = DeckTemplate::load(&path);

    assert!(matches!(result, Err(DeckError::InvalidTemplate { .. })));
}

/// Test the required-layout check
#[test]
fn test_ensureLayouts_withTooFewLayouts_shouldNameMissingOnes() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::write_template_with_layouts(temp_dir.path(), 1, 6)?;
    let template = DeckTemplate::load(&path)?;

    let error = template.ensure_layouts(&[0, 1, 5, 7, 8]).unwrap_err();

    assert!(error.to_string().contains("7, 8"));
    Ok(())
}

/// Test that written slides read back in order with their text
#[test]
fn test_save_withSlides_shouldReadBackInOrder() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::write_minimal_template(temp_dir.path(), 1)?;
    let mut deck = SlideDeck::new(DeckTemplate::load(&path)?);

    deck.add_slide(SlideContent::new(0, "Deck & <title>"))?;
    deck.add_slide(SlideContent::new(7, "Second").with_body(1, "a\n\nb"))?;
    deck.add_slide(
        SlideContent::new(5, "Third").with_text_box(
            TextBox::new(inches(0.5), inches(7.0), inches(6.0), inches(0.5), vec!["note".to_string()])
                .font_size_pt(12),
        ),
    )?;
    let out = temp_dir.path().join("out").join("deck.pptx");
    deck.save(&out)?;

    let slides = read_outline(&out)?;
    assert_eq!(slides.len(), 3);
    assert_eq!(slides[0].title().as_deref(), Some("Deck & <title>"));
    assert_eq!(slides[0].layout_index, Some(0));
    assert_eq!(slides[1].placeholder_text(1).as_deref(), Some("a\n\nb"));
    assert_eq!(slides[1].layout_index, Some(7));
    let note: Vec<_> = slides[2].text_boxes().collect();
    assert_eq!(note.len(), 1);
    assert_eq!(note[0].text(), "note");
    assert_eq!(note[0].font_size, Some(1200));
    assert_eq!(note[0].offset, Some((inches(0.5), inches(7.0))));
    Ok(())
}

/// Test that an unknown layout is rejected when the slide is added
#[test]
fn test_addSlide_withUnknownLayout_shouldFail() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::write_minimal_template(temp_dir.path(), 1)?;
    let mut deck = SlideDeck::new(DeckTemplate::load(&path)?);

    assert!(deck.add_slide(SlideContent::new(12, "x")).is_err());
    assert!(deck.slides().is_empty());
    Ok(())
}

/// Test that the saved package declares every new slide part
#[test]
fn test_save_shouldRegisterSlidePartsAndContentTypes() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::write_minimal_template(temp_dir.path(), 1)?;
    let mut deck = SlideDeck::new(DeckTemplate::load(&path)?);
    deck.add_slide(SlideContent::new(1, "One"))?;
    deck.add_slide(SlideContent::new(1, "Two"))?;

    let out = temp_dir.path().join("deck.pptx");
    deck.save(&out)?;
    let package = Package::open(&out)?;

    assert!(package.contains("ppt/slides/slide1.xml"));
    assert!(package.contains("ppt/slides/slide2.xml"));
    assert!(package.contains("ppt/slides/_rels/slide2.xml.rels"));
    let content_types = package.part_str("[Content_Types].xml")?;
    assert!(content_types.contains("/ppt/slides/slide2.xml"));
    let presentation = package.part_str("ppt/presentation.xml")?;
    assert!(presentation.contains(r#"<p:sldId id="256""#));
    assert!(presentation.contains(r#"<p:sldId id="257""#));
    Ok(())
}

/// Test that a deck compiled twice onto its own output keeps the earlier slides
#[test]
fn test_save_onDeckWithSlides_shouldAppendAfterExisting() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::write_minimal_template(temp_dir.path(), 1)?;
    let mut first = SlideDeck::new(DeckTemplate::load(&path)?);
    first.add_slide(SlideContent::new(1, "Existing"))?;
    let intermediate = temp_dir.path().join("Design-2.pptx");
    first.save(&intermediate)?;

    let mut second = SlideDeck::new(DeckTemplate::load(&intermediate)?);
    second.add_slide(SlideContent::new(1, "Added"))?;
    let out = temp_dir.path().join("final.pptx");
    second.save(&out)?;

    let titles: Vec<Option<String>> = read_outline(&out)?.iter().map(|s| s.title()).collect();
    assert_eq!(titles, vec![Some("Existing".to_string()), Some("Added".to_string())]);
    Ok(())
}
