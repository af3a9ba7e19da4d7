/*!
 * Error types for the pubdeck application.
 *
 * This module contains custom error types for different parts of the application,
 * using the thiserror crate for ergonomic error definitions.
 */

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when working with text-generation provider APIs
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error with authentication
    #[error("Authentication error: {0}")]
    AuthenticationError(String),

    /// The provider answered, but with nothing usable
    #[error("Provider returned an empty completion")]
    EmptyResponse,
}

/// Errors raised by the bibliographic lookup service
#[derive(Error, Debug)]
pub enum LookupError {
    /// The HTTP request could not be sent or completed
    #[error("Lookup request failed: {0}")]
    RequestFailed(String),

    /// The service answered with a non-success status
    #[error("Lookup service responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Body or reason returned by the service
        message: String,
    },

    /// The response body could not be understood
    #[error("Failed to parse lookup response: {0}")]
    ParseError(String),

    /// The record exists but has no usable article data
    #[error("No article found for identifier {0}")]
    NotFound(String),
}

/// Errors raised while searching for or downloading topic images
#[derive(Error, Debug)]
pub enum ImageError {
    /// The search request could not be completed
    #[error("Image search failed: {0}")]
    SearchFailed(String),

    /// The download did not finish in time
    #[error("Timed out fetching {0}")]
    Timeout(String),

    /// The host could not be reached
    #[error("Could not connect to {0}")]
    Connection(String),

    /// The server answered with a non-success status
    #[error("{url} responded with status {status_code}")]
    Http {
        /// Image URL
        url: String,
        /// HTTP status code
        status_code: u16,
    },

    /// The payload is not a recognized image format
    #[error("Couldn't open image from URL: {0}")]
    UnrecognizedFormat(String),

    /// The image could not be stored
    #[error("Failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading or writing a slide-deck package
#[derive(Error, Debug)]
pub enum DeckError {
    /// Template file does not exist
    #[error("Template not found: {0:?}")]
    TemplateNotFound(PathBuf),

    /// Template file exists but is not a usable presentation package
    #[error("Invalid template {path:?}: {reason}")]
    InvalidTemplate {
        /// Template path
        path: PathBuf,
        /// What is wrong with it
        reason: String,
    },

    /// A required part is missing from the package
    #[error("Package part missing: {0}")]
    MissingPart(String),

    /// The template does not provide the requested layout
    #[error("Layout {index} not available (template has {available} layouts)")]
    UnknownLayout {
        /// Requested layout index
        index: usize,
        /// Number of layouts in the template
        available: usize,
    },

    /// XML content could not be parsed
    #[error("XML error: {0}")]
    Xml(String),

    /// Zip container could not be read or written
    #[error("Archive error: {0}")]
    Archive(String),

    /// Output could not be written to storage
    #[error("Failed to write {path:?}: {source}")]
    Write {
        /// Destination path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Any other I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for DeckError {
    fn from(error: zip::result::ZipError) -> Self {
        Self::Archive(error.to_string())
    }
}

impl From<quick_xml::Error> for DeckError {
    fn from(error: quick_xml::Error) -> Self {
        Self::Xml(error.to_string())
    }
}

/// Errors surfaced by the slide-markup compiler
#[derive(Error, Debug)]
pub enum CompileError {
    /// The requested template cannot be located or loaded
    #[error("Configuration error: {0}")]
    Configuration(#[source] DeckError),

    /// The finished document cannot be written
    #[error("Persistence error: {0}")]
    Persistence(#[source] DeckError),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from a provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from the bibliographic lookup
    #[error("Lookup error: {0}")]
    Lookup(#[from] LookupError),

    /// Error from the image search
    #[error("Image error: {0}")]
    Image(#[from] ImageError),

    /// Error from compilation
    #[error("Compile error: {0}")]
    Compile(#[from] CompileError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
