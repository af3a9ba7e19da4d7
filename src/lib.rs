/*!
 * # pubdeck - literature-backed slide decks
 *
 * A Rust library that turns a topic into a `.pptx` presentation grounded in
 * PubMed articles.
 *
 * ## Features
 *
 * - Look up recent articles for a topic (PubMed E-utilities)
 * - Draft slide text with an LLM in a small line-oriented markup:
 *   - OpenAI API
 *   - Anthropic API
 *   - LM Studio (local, OpenAI-compatible)
 * - Compile the markup onto one of seven pre-authored designs
 * - Append a references slide listing every article used
 * - Optionally download topic images and write an HTML download page
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `markup`: Slide markup parser
 * - `layout`: Content-slide layout selection
 * - `compiler`: Markup to slide deck compilation
 * - `deck`: `.pptx` package reading, slide instantiation and writing
 * - `bibliography`: Article records and the PubMed client
 * - `prompts`: Prompts sent to the generation provider
 * - `generation_service`: Markup generation over a provider
 * - `providers`: Client implementations for various LLM providers:
 *   - `providers::openai`: OpenAI API client
 *   - `providers::anthropic`: Anthropic API client
 *   - `providers::mock`: Canned responses for tests
 * - `images`: Best-effort topic image download
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `errors`: Custom error types for the application
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod bibliography;
pub mod compiler;
pub mod deck;
pub mod errors;
pub mod file_utils;
pub mod generation_service;
pub mod images;
pub mod layout;
pub mod markup;
pub mod prompts;
pub mod providers;
mod xml;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, PresentationOutcome, PresentationRequest};
pub use bibliography::{ArticleQuery, ArticleSource, BibliographicRecord};
pub use compiler::{CompileOutcome, MarkupWarning, RenderedDocument, SlideCompiler};
pub use deck::{read_outline, SlideOutline, TemplateSelection};
pub use errors::{AppError, CompileError, DeckError, ImageError, LookupError, ProviderError};
pub use generation_service::GenerationService;
pub use markup::{Directive, MarkupDocument};
