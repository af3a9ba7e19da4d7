use anyhow::{anyhow, Context, Result};
use log::{warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::deck::TemplateSelection;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Text generation config
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Bibliographic lookup config
    #[serde(default)]
    pub bibliography: BibliographyConfig,

    /// Best-effort image search config
    #[serde(default)]
    pub images: ImageConfig,

    /// Where templates, caches and decks live
    #[serde(default)]
    pub paths: PathConfig,

    /// Output options
    #[serde(default)]
    pub output: OutputConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Text generation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    // @provider: OpenAI
    #[default]
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl GenerationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }

    // @returns: Environment variable consulted when the config has no key
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::LMStudio => None,
        }
    }
}

// Implement Display trait for GenerationProvider
impl std::fmt::Display for GenerationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

// Implement FromStr trait for GenerationProvider
impl std::str::FromStr for GenerationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: Timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: GenerationProvider) -> Self {
        match provider_type {
            GenerationProvider::OpenAI => Self {
                provider_type: "openai".to_string(),
                model: default_openai_model(),
                api_key: String::new(),
                endpoint: default_openai_endpoint(),
                timeout_secs: default_timeout_secs(),
            },
            GenerationProvider::Anthropic => Self {
                provider_type: "anthropic".to_string(),
                model: default_anthropic_model(),
                api_key: String::new(),
                endpoint: default_anthropic_endpoint(),
                timeout_secs: default_timeout_secs(),
            },
            GenerationProvider::LMStudio => Self {
                provider_type: "lmstudio".to_string(),
                model: default_lmstudio_model(),
                api_key: String::new(),
                endpoint: default_lmstudio_endpoint(),
                timeout_secs: default_timeout_secs(),
            },
        }
    }
}

/// Text generation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerationConfig {
    /// Provider used to draft the slide markup
    #[serde(default)]
    pub provider: GenerationProvider,

    /// Available providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common generation settings
    #[serde(default)]
    pub common: GenerationCommonConfig,
}

/// Common generation settings applicable to all providers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct GenerationCommonConfig {
    /// Temperature parameter for text generation (0.0 to 1.0)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on generated tokens
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for GenerationCommonConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// PubMed lookup configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BibliographyConfig {
    /// E-utilities base URL
    #[serde(default = "default_pubmed_endpoint")]
    pub endpoint: String,

    /// Optional NCBI API key
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Optional contact email sent to NCBI
    #[serde(default = "String::new")]
    pub email: String,

    /// Number of articles to retrieve
    #[serde(default = "default_max_articles")]
    pub max_articles: usize,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Default first publication year
    #[serde(default = "default_start_year")]
    pub start_year: u16,

    /// Default last publication year
    #[serde(default = "default_end_year")]
    pub end_year: u16,
}

impl Default for BibliographyConfig {
    fn default() -> Self {
        Self {
            endpoint: default_pubmed_endpoint(),
            api_key: String::new(),
            email: String::new(),
            max_articles: default_max_articles(),
            timeout_secs: default_timeout_secs(),
            start_year: default_start_year(),
            end_year: default_end_year(),
        }
    }
}

/// Image search configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImageConfig {
    /// Whether to look up images at all
    #[serde(default)]
    pub enabled: bool,

    /// Search endpoint (SerpAPI compatible)
    #[serde(default = "default_image_endpoint")]
    pub endpoint: String,

    /// Search API key
    #[serde(default = "String::new")]
    pub api_key: String,

    /// Maximum number of images to download
    #[serde(default = "default_max_images")]
    pub max_images: usize,

    /// Per-download timeout in seconds
    #[serde(default = "default_image_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_image_endpoint(),
            api_key: String::new(),
            max_images: default_max_images(),
            timeout_secs: default_image_timeout_secs(),
        }
    }
}

/// Filesystem locations
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PathConfig {
    /// Directory holding `Design-<n>.pptx` templates
    #[serde(default = "default_designs_dir")]
    pub designs_dir: PathBuf,

    /// Directory receiving generated decks
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Directory receiving the raw generated markup
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Directory receiving downloaded images
    #[serde(default = "default_images_dir")]
    pub images_dir: PathBuf,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            designs_dir: default_designs_dir(),
            output_dir: default_output_dir(),
            cache_dir: default_cache_dir(),
            images_dir: default_images_dir(),
        }
    }
}

/// Output options
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OutputConfig {
    /// Also write an HTML page with a download link next to the deck
    #[serde(default)]
    pub write_download_page: bool,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Matching `log` level filter
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// Earliest year accepted for a lookup
pub const MIN_YEAR: u16 = 1900;

/// Latest year accepted for a lookup
pub const MAX_YEAR: u16 = 2100;

fn default_timeout_secs() -> u64 {
    60
}

fn default_image_timeout_secs() -> u64 {
    5
}

fn default_temperature() -> f32 {
    0.5
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_max_articles() -> usize {
    10
}

fn default_max_images() -> usize {
    10
}

fn default_start_year() -> u16 {
    2010
}

fn default_end_year() -> u16 {
    2023
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_lmstudio_endpoint() -> String {
    // LM Studio default server (OpenAI compatible) runs on port 1234 under /v1
    "http://localhost:1234/v1".to_string()
}

fn default_pubmed_endpoint() -> String {
    "https://eutils.ncbi.nlm.nih.gov/entrez/eutils".to_string()
}

fn default_image_endpoint() -> String {
    "https://serpapi.com/search.json".to_string()
}

fn default_openai_model() -> String {
    "gpt-4".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_lmstudio_model() -> String {
    // Placeholder; users should set to the loaded model name in LM Studio
    "local-model".to_string()
}

fn default_designs_dir() -> PathBuf {
    PathBuf::from("Designs")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("GeneratedPresentations")
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("Cache")
}

fn default_images_dir() -> PathBuf {
    PathBuf::from("Images")
}

impl Config {
    /// Load a configuration file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open config file: {:?}", path))?;

        let reader = BufReader::new(file);
        serde_json::from_reader(reader)
            .with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self)
            .context("Failed to serialize config to JSON")?;

        std::fs::write(path, config_json)
            .with_context(|| format!("Failed to write config to file: {:?}", path))
    }

    /// Load the configuration, writing a default file first when none exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            return Self::from_file(path);
        }

        warn!("Config file not found at {:?}, creating default config.", path);
        let config = Config::default();
        config.save(path)?;
        Ok(config)
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        // Validate API key for hosted providers
        match self.generation.provider {
            GenerationProvider::OpenAI | GenerationProvider::Anthropic => {
                if self.generation.get_api_key().is_empty() {
                    return Err(anyhow!(
                        "API key is required for {} provider",
                        self.generation.provider.display_name()
                    ));
                }
            },
            GenerationProvider::LMStudio => {}
        }

        if !(0.0..=2.0).contains(&self.generation.common.temperature) {
            return Err(anyhow!(
                "Temperature must be between 0.0 and 2.0, got {}",
                self.generation.common.temperature
            ));
        }

        if self.bibliography.max_articles == 0 {
            return Err(anyhow!("bibliography.max_articles must be at least 1"));
        }

        validate_year_range(self.bibliography.start_year, self.bibliography.end_year)?;

        if self.images.enabled && self.images.api_key.is_empty() {
            return Err(anyhow!("images.api_key is required when image search is enabled"));
        }

        Ok(())
    }

    /// Template file for a design selection
    pub fn template_path(&self, selection: TemplateSelection) -> PathBuf {
        selection.template_path(&self.paths.designs_dir)
    }
}

/// Check a lookup year range: both ends within bounds and in order
pub fn validate_year_range(start_year: u16, end_year: u16) -> Result<()> {
    for year in [start_year, end_year] {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(anyhow!("Year {} is outside {}..={}", year, MIN_YEAR, MAX_YEAR));
        }
    }
    if start_year > end_year {
        return Err(anyhow!("Start year {} is after end year {}", start_year, end_year));
    }
    Ok(())
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            generation: GenerationConfig::default(),
            bibliography: BibliographyConfig::default(),
            images: ImageConfig::default(),
            paths: PathConfig::default(),
            output: OutputConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl GenerationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &GenerationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter()
            .find(|p| p.provider_type == provider_str)
    }

    /// Mutable access to the active provider configuration, created on demand
    pub fn active_provider_config_mut(&mut self) -> &mut ProviderConfig {
        let provider_str = self.provider.to_lowercase_string();
        if let Some(index) = self.available_providers.iter().position(|p| p.provider_type == provider_str) {
            return &mut self.available_providers[index];
        }
        self.available_providers.push(ProviderConfig::new(self.provider.clone()));
        let last = self.available_providers.len() - 1;
        &mut self.available_providers[last]
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        // Default fallback based on provider type
        match self.provider {
            GenerationProvider::OpenAI => default_openai_model(),
            GenerationProvider::Anthropic => default_anthropic_model(),
            GenerationProvider::LMStudio => default_lmstudio_model(),
        }
    }

    /// Get the API key for the active provider, falling back to the environment
    pub fn get_api_key(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.api_key.is_empty() {
                return provider_config.api_key.clone();
            }
        }

        self.provider
            .api_key_env_var()
            .and_then(|var| std::env::var(var).ok())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        // Default fallback based on provider type
        match self.provider {
            GenerationProvider::OpenAI => default_openai_endpoint(),
            GenerationProvider::Anthropic => default_anthropic_endpoint(),
            GenerationProvider::LMStudio => default_lmstudio_endpoint(),
        }
    }

    /// Get the request timeout for the active provider
    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|secs| *secs > 0)
            .unwrap_or_else(default_timeout_secs)
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: GenerationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(GenerationProvider::OpenAI),
                ProviderConfig::new(GenerationProvider::Anthropic),
                ProviderConfig::new(GenerationProvider::LMStudio),
            ],
            common: GenerationCommonConfig::default(),
        }
    }
}
