/*!
 * Layout selection for generated slides.
 *
 * Layout identifiers are positions in the template's slide-layout list. The
 * numbers below match the stock Office layout order: 0 is the title slide,
 * 1 title and content, 5 title only, 7 content with caption, 8 picture with
 * caption.
 */

use rand::Rng;

/// Layout used for the opening title slide
pub const TITLE_LAYOUT: usize = 0;

/// Layout used for the closing references slide
pub const REFERENCES_LAYOUT: usize = 5;

/// Layouts a content slide may use
pub const CONTENT_LAYOUTS: [usize; 3] = [1, 7, 8];

/// Every layout the compiler may ask a template for
pub const REQUIRED_LAYOUTS: [usize; 5] = [TITLE_LAYOUT, 1, REFERENCES_LAYOUT, 7, 8];

/// Layout plus the placeholder that receives the slide body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlideLayoutChoice {
    /// Index into the template's layout list
    pub layout_index: usize,
    /// `idx` of the placeholder that receives the body text
    pub body_placeholder: u32,
}

impl SlideLayoutChoice {
    /// The fixed choice for the first content slide
    pub const FIRST: SlideLayoutChoice = SlideLayoutChoice { layout_index: 1, body_placeholder: 1 };

    /// Build the choice for a layout, deriving its body placeholder
    pub fn for_layout(layout_index: usize) -> Self {
        let body_placeholder = if layout_index == 8 { 2 } else { 1 };
        Self { layout_index, body_placeholder }
    }
}

/// Pick the layout of the next content slide.
///
/// `previous` is the layout of the preceding content slide, `None` for the
/// first one. The first slide always gets [`SlideLayoutChoice::FIRST`]; later
/// slides draw uniformly from [`CONTENT_LAYOUTS`] until the draw differs from
/// `previous`.
pub fn next_layout<R: Rng + ?Sized>(previous: Option<SlideLayoutChoice>, rng: &mut R) -> SlideLayoutChoice {
    let Some(previous) = previous else {
        return SlideLayoutChoice::FIRST;
    };

    loop {
        let candidate = CONTENT_LAYOUTS[rng.random_range(0..CONTENT_LAYOUTS.len())];
        if candidate != previous.layout_index {
            return SlideLayoutChoice::for_layout(candidate);
        }
    }
}
