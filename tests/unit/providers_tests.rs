/*!
 * Tests for the generation providers and the generation service
 */

use pubdeck::app_config::{GenerationConfig, GenerationProvider};
use pubdeck::generation_service::GenerationService;
use pubdeck::markup::MarkupDocument;
use pubdeck::prompts::DeckPromptBuilder;
use pubdeck::providers::anthropic::AnthropicResponse;
use pubdeck::providers::mock::{MockProvider, MockRequest};
use pubdeck::providers::openai::{OpenAIRequest, OpenAIResponse};
use pubdeck::providers::Provider;
use pubdeck::ProviderError;
use crate::common;

fn echo_user_message(request: &MockRequest) -> String {
    format!("#Title: Echo\n#Slide: 1\n#Header: Prompt\n#Content: {}\n#Slide: END", request.user)
}

/// Test that the service sends the topic and articles to the provider
#[tokio::test]
async fn test_generateMarkup_withArticles_shouldIncludeThemInUserMessage() {
    let provider = MockProvider::working().with_custom_response(echo_user_message);
    let service = GenerationService::with_mock(provider.clone(), GenerationConfig::default());

    let markup = service.generate_markup("dental implants", &common::sample_records()).await.unwrap();

    assert_eq!(provider.request_count(), 1);
    assert!(markup.contains("The user wants a presentation about dental implants."));
    assert!(markup.contains("Implant survival"));
    assert!(markup.contains("Bone grafts"));
    let doc = MarkupDocument::parse(&markup);
    assert_eq!(doc.title(), Some("Echo"));
}

/// Test that provider failures surface as provider errors
#[tokio::test]
async fn test_generateMarkup_withFailingProvider_shouldReturnApiError() {
    let service = GenerationService::with_mock(MockProvider::failing(), GenerationConfig::default());

    let result = service.generate_markup("implants", &[]).await;

    assert!(matches!(result, Err(ProviderError::ApiError { status_code: 500, .. })));
    assert!(service.test_connection().await.is_err());
}

/// Test that an intermittent provider recovers on the next request
#[tokio::test]
async fn test_generateMarkup_withIntermittentProvider_shouldRecover() {
    let service = GenerationService::with_mock(MockProvider::intermittent(2), GenerationConfig::default());

    assert!(service.generate_markup("implants", &[]).await.is_ok());
    assert!(service.generate_markup("implants", &[]).await.is_err());
    assert!(service.generate_markup("implants", &[]).await.is_ok());
}

/// Test that truncated markup is passed through for the compiler to finish
#[tokio::test]
async fn test_generateMarkup_withTruncatedProvider_shouldReturnMarkupWithoutEnd() {
    let service = GenerationService::with_mock(MockProvider::truncated(), GenerationConfig::default());

    let markup = service.generate_markup("implants", &[]).await.unwrap();

    let doc = MarkupDocument::parse(&markup);
    assert!(!doc.has_end_marker());
    assert_eq!(doc.slide_count(), 2);
}

/// Test that fenced output is unwrapped
#[tokio::test]
async fn test_generateMarkup_withCodeFence_shouldStripFence() {
    fn fenced(_: &MockRequest) -> String {
        "```text\n#Title: Fenced\n#Slide: END\n```".to_string()
    }
    let service = GenerationService::with_mock(
        MockProvider::working().with_custom_response(fenced),
        GenerationConfig::default(),
    );

    let markup = service.generate_markup("implants", &[]).await.unwrap();

    assert_eq!(markup, "#Title: Fenced\n#Slide: END");
}

/// Test that a replacement system prompt reaches the provider
#[tokio::test]
async fn test_withPrompts_withCustomSystemPrompt_shouldSendIt() {
    fn echo_system(request: &MockRequest) -> String {
        format!("#Title: {}\n#Slide: END", request.system)
    }
    let service = GenerationService::with_mock(
        MockProvider::working().with_custom_response(echo_system),
        GenerationConfig::default(),
    )
    .with_prompts(DeckPromptBuilder::with_system_prompt("Be brief"));

    let markup = service.generate_markup("implants", &[]).await.unwrap();

    assert!(markup.starts_with("#Title: Be brief"));
}

/// Test that token usage accumulates across requests
#[tokio::test]
async fn test_usage_afterTwoRequests_shouldAccumulate() {
    let service = GenerationService::with_mock(MockProvider::working(), GenerationConfig::default());

    service.generate_markup("implants", &[]).await.unwrap();
    let first = service.usage().total_tokens;
    service.generate_markup("implants", &[]).await.unwrap();
    let usage = service.usage();

    assert!(first > 0);
    assert_eq!(usage.total_tokens, 2 * first);
    assert!(usage.summary().contains("Mock"));
}

/// Test service construction for a local provider without a key
#[test]
fn test_new_withLMStudio_shouldNotNeedKey() {
    let mut config = GenerationConfig::default();
    config.provider = GenerationProvider::LMStudio;

    assert!(GenerationService::new(config).is_ok());
}

/// Test service construction for a hosted provider with a configured key
#[test]
fn test_new_withOpenAIKey_shouldSucceed() {
    let mut config = GenerationConfig::default();
    config.provider = GenerationProvider::OpenAI;
    config.active_provider_config_mut().api_key = "sk-test".to_string();

    let service = GenerationService::new(config).unwrap();

    assert_eq!(service.usage().provider, "OpenAI");
}

/// Test the chat completion wire format
#[test]
fn test_openAIWireFormat_shouldSerializeRequestAndParseResponse() {
    let request = OpenAIRequest::new("gpt-4")
        .add_message("system", "You build slides")
        .add_message("user", "Implants")
        .temperature(0.5);
    let json = serde_json::to_value(&request).unwrap();
    assert_eq!(json["model"], "gpt-4");
    assert_eq!(json["messages"][1]["content"], "Implants");
    assert!(json.get("max_tokens").is_none());

    let response: OpenAIResponse = serde_json::from_str(
        r##"{"choices":[{"message":{"role":"assistant","content":"#Title: X"},"finish_reason":"stop"}],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"##,
    )
    .unwrap();
    assert_eq!(pubdeck::providers::openai::OpenAI::extract_text(&response), "#Title: X");
}

/// Test the messages API response parsing
#[test]
fn test_anthropicResponse_withMixedBlocks_shouldJoinTextBlocks() {
    let response: AnthropicResponse = serde_json::from_str(
        r##"{"content":[{"type":"text","text":"#Title: A\n"},{"type":"tool_use"},{"type":"text","text":"#Slide: END"}],"usage":{"input_tokens":3,"output_tokens":4}}"##,
    )
    .unwrap();

    assert_eq!(
        pubdeck::providers::anthropic::Anthropic::extract_text(&response),
        "#Title: A\n#Slide: END"
    );
}
