/*!
 * Tests for application configuration functionality
 */

use pubdeck::app_config::{
    validate_year_range, Config, GenerationProvider, LogLevel, ProviderConfig,
};
use pubdeck::TemplateSelection;
use std::path::PathBuf;
use crate::common;

/// Test default configuration values
#[test]
fn test_default_config_withNoParameters_shouldHaveCorrectDefaults() {
    let config = Config::default();

    assert_eq!(config.generation.provider, GenerationProvider::OpenAI);
    assert_eq!(config.generation.get_model(), "gpt-4");
    assert_eq!(config.generation.common.temperature, 0.5);

    let openai = config.generation.get_provider_config(&GenerationProvider::OpenAI)
        .expect("OpenAI provider config should exist");
    assert_eq!(openai.endpoint, "https://api.openai.com/v1");
    assert_eq!(openai.timeout_secs, 60);

    assert_eq!(config.bibliography.max_articles, 10);
    assert_eq!(config.bibliography.start_year, 2010);
    assert_eq!(config.bibliography.end_year, 2023);
    assert!(!config.images.enabled);
    assert_eq!(config.images.timeout_secs, 5);
    assert_eq!(config.paths.designs_dir, PathBuf::from("Designs"));
    assert_eq!(config.paths.output_dir, PathBuf::from("GeneratedPresentations"));
    assert_eq!(config.log_level, LogLevel::Info);
}

/// Test configuration validation
#[test]
fn test_config_validation_withVariousConfigs_shouldValidateCorrectly() {
    let mut config = Config::default();
    config.generation.provider = GenerationProvider::LMStudio;
    assert!(config.validate().is_ok());

    config.generation.common.temperature = 3.0;
    assert!(config.validate().is_err());
    config.generation.common.temperature = 0.5;

    config.bibliography.max_articles = 0;
    assert!(config.validate().is_err());
    config.bibliography.max_articles = 10;

    config.bibliography.start_year = 2024;
    config.bibliography.end_year = 2020;
    assert!(config.validate().is_err());
    config.bibliography.start_year = 2010;
    config.bibliography.end_year = 2023;

    config.images.enabled = true;
    assert!(config.validate().is_err());
    config.images.api_key = "serp-key".to_string();
    assert!(config.validate().is_ok());
}

/// Test that hosted providers need a key
#[test]
fn test_config_validation_withOpenAIKeyInConfig_shouldPass() {
    let mut config = Config::default();
    config.generation.provider = GenerationProvider::OpenAI;
    config.generation.active_provider_config_mut().api_key = "sk-test".to_string();

    assert!(config.validate().is_ok());
    assert_eq!(config.generation.get_api_key(), "sk-test");
}

#[test]
fn test_validateYearRange_withBounds_shouldAcceptOnlyOrderedInRangeYears() {
    assert!(validate_year_range(1900, 2100).is_ok());
    assert!(validate_year_range(2020, 2020).is_ok());
    assert!(validate_year_range(1899, 2000).is_err());
    assert!(validate_year_range(2000, 2101).is_err());
    assert!(validate_year_range(2021, 2020).is_err());
}

#[test]
fn test_providerFromStr_withKnownNames_shouldParse() {
    assert_eq!("openai".parse::<GenerationProvider>().unwrap(), GenerationProvider::OpenAI);
    assert_eq!("Anthropic".parse::<GenerationProvider>().unwrap(), GenerationProvider::Anthropic);
    assert_eq!("lmstudio".parse::<GenerationProvider>().unwrap(), GenerationProvider::LMStudio);
    assert!("ollama".parse::<GenerationProvider>().is_err());
}

#[test]
fn test_activeProviderConfigMut_withMissingEntry_shouldCreateDefaults() {
    let mut config = Config::default();
    config.generation.available_providers.clear();
    config.generation.provider = GenerationProvider::Anthropic;

    config.generation.active_provider_config_mut().model = "claude-test".to_string();

    assert_eq!(config.generation.available_providers.len(), 1);
    assert_eq!(config.generation.get_model(), "claude-test");
    assert_eq!(config.generation.get_endpoint(), "https://api.anthropic.com");
}

#[test]
fn test_loadOrCreate_withMissingFile_shouldWriteDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path).unwrap();

    assert!(path.exists());
    assert_eq!(config.bibliography.max_articles, 10);
    let reloaded = Config::from_file(&path).unwrap();
    assert_eq!(reloaded.generation.available_providers.len(), 3);
}

#[test]
fn test_fromFile_withPartialJson_shouldFillDefaults() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "generation": {
                "provider": "lmstudio",
                "available_providers": [{"type": "lmstudio", "model": "mistral"}]
            },
            "bibliography": {"max_articles": 3},
            "log_level": "debug"
        }"#,
    ).unwrap();

    let config = Config::from_file(&path).unwrap();

    assert_eq!(config.generation.provider, GenerationProvider::LMStudio);
    assert_eq!(config.generation.get_model(), "mistral");
    assert_eq!(config.generation.get_timeout_secs(), 60);
    assert_eq!(config.bibliography.max_articles, 3);
    assert_eq!(config.bibliography.start_year, 2010);
    assert_eq!(config.log_level, LogLevel::Debug);
    assert_eq!(config.log_level.to_level_filter(), log::LevelFilter::Debug);
}

#[test]
fn test_fromFile_withInvalidJson_shouldFail() {
    let dir = common::create_temp_dir().unwrap();
    let path = common::create_test_file(dir.path(), "conf.json", "{ not json").unwrap();

    assert!(Config::from_file(&path).is_err());
}

#[test]
fn test_templatePath_shouldResolveInsideDesignsDir() {
    let config = Config::default();
    assert_eq!(
        config.template_path(TemplateSelection::clamped(4)),
        PathBuf::from("Designs").join("Design-4.pptx")
    );
}

#[test]
fn test_providerConfigNew_forEachProvider_shouldSetType() {
    for provider in [GenerationProvider::OpenAI, GenerationProvider::Anthropic, GenerationProvider::LMStudio] {
        let provider_config = ProviderConfig::new(provider.clone());
        assert_eq!(provider_config.provider_type, provider.to_lowercase_string());
        assert!(!provider_config.model.is_empty());
    }
}
