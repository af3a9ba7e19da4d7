use anyhow::{Result, Context, anyhow};
use log::{debug, error, info};
use std::time::{Duration, Instant};
use std::sync::Mutex as StdMutex;
use url::Url;

use crate::app_config::{GenerationConfig, GenerationProvider as ConfigGenerationProvider};
use crate::bibliography::BibliographicRecord;
use crate::errors::ProviderError;
use crate::prompts::DeckPromptBuilder;
use crate::providers::Provider;
use crate::providers::openai::{OpenAI, OpenAIRequest};
use crate::providers::anthropic::{Anthropic, AnthropicRequest};
use crate::providers::mock::{MockProvider, MockRequest};

// @module: Markup generation service backed by an LLM provider

// @struct: Token usage statistics
#[derive(Clone, Debug)]
pub struct TokenUsageStats {
    // @field: Number of prompt tokens
    pub prompt_tokens: u64,

    // @field: Number of completion tokens
    pub completion_tokens: u64,

    // @field: Total number of tokens
    pub total_tokens: u64,

    // @field: Total time spent on API requests
    pub api_duration: Duration,

    // @field: Provider name
    pub provider: String,

    // @field: Model name
    pub model: String,
}

impl TokenUsageStats {
    // @creates: New token usage stats with provider info
    pub fn with_provider_info(provider: String, model: String) -> Self {
        Self {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            api_duration: Duration::from_secs(0),
            provider,
            model,
        }
    }

    // @updates: Add token usage numbers
    pub fn add_token_usage(&mut self, prompt_tokens: Option<u64>, completion_tokens: Option<u64>) {
        if let Some(pt) = prompt_tokens {
            self.prompt_tokens += pt;
            self.total_tokens += pt;
        }

        if let Some(ct) = completion_tokens {
            self.completion_tokens += ct;
            self.total_tokens += ct;
        }
    }

    // @updates: Add API request duration
    pub fn add_request_duration(&mut self, duration: Duration) {
        self.api_duration += duration;
    }

    // @returns: Summary of token usage as a string
    pub fn summary(&self) -> String {
        format!(
            "Token usage ({} / {}): {} total ({} prompt, {} completion) in {:.1}s of API time",
            self.provider,
            self.model,
            self.total_tokens,
            self.prompt_tokens,
            self.completion_tokens,
            self.api_duration.as_secs_f64()
        )
    }
}

// @enum: Available generation provider implementations
#[derive(Debug)]
enum GenerationProviderImpl {
    // @variant: OpenAI API service
    OpenAI {
        // @field: Client instance
        client: OpenAI,
    },

    // @variant: LM Studio local server (OpenAI-compatible)
    LMStudio {
        // @field: Client instance
        client: OpenAI,
    },

    // @variant: Anthropic API service
    Anthropic {
        // @field: Client instance
        client: Anthropic,
    },

    // @variant: Canned responses for tests
    Mock {
        // @field: Client instance
        client: MockProvider,
    },
}

// @struct: Markup generation service
pub struct GenerationService {
    // @field: Provider implementation
    provider: GenerationProviderImpl,

    // @field: Configuration
    config: GenerationConfig,

    // @field: Prompt builder
    prompts: DeckPromptBuilder,

    // @field: Accumulated token usage
    usage: StdMutex<TokenUsageStats>,
}

// @validates: Endpoint URL and strips the trailing slash
fn normalize_endpoint(endpoint: &str) -> Result<String> {
    let url = Url::parse(endpoint)
        .with_context(|| format!("Failed to parse endpoint URL: {}", endpoint))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(anyhow!("Unsupported endpoint scheme '{}' in {}", url.scheme(), endpoint));
    }

    Ok(endpoint.trim_end_matches('/').to_string())
}

impl GenerationService {
    /// Create a service for the provider selected in the configuration
    pub fn new(config: GenerationConfig) -> Result<Self> {
        let endpoint = normalize_endpoint(&config.get_endpoint())?;
        let model = config.get_model();
        let timeout = config.get_timeout_secs();

        let provider = match config.provider {
            ConfigGenerationProvider::OpenAI => {
                let api_key = config.get_api_key();
                if api_key.is_empty() {
                    return Err(anyhow!("OpenAI API key is missing (set it in the config or OPENAI_API_KEY)"));
                }
                GenerationProviderImpl::OpenAI {
                    client: OpenAI::new(api_key, endpoint, model, timeout),
                }
            },
            ConfigGenerationProvider::LMStudio => {
                GenerationProviderImpl::LMStudio {
                    client: OpenAI::new(config.get_api_key(), endpoint, model, timeout),
                }
            },
            ConfigGenerationProvider::Anthropic => {
                let api_key = config.get_api_key();
                if api_key.is_empty() {
                    return Err(anyhow!("Anthropic API key is missing (set it in the config or ANTHROPIC_API_KEY)"));
                }
                GenerationProviderImpl::Anthropic {
                    client: Anthropic::new(api_key, endpoint, model, timeout),
                }
            },
        };

        Ok(Self::from_parts(provider, config))
    }

    /// Create a service that answers from a mock provider
    pub fn with_mock(client: MockProvider, config: GenerationConfig) -> Self {
        Self::from_parts(GenerationProviderImpl::Mock { client }, config)
    }

    fn from_parts(provider: GenerationProviderImpl, config: GenerationConfig) -> Self {
        let provider_name = match &provider {
            GenerationProviderImpl::Mock { .. } => "Mock".to_string(),
            _ => config.provider.display_name().to_string(),
        };
        let usage = TokenUsageStats::with_provider_info(provider_name, config.get_model());

        Self {
            provider,
            config,
            prompts: DeckPromptBuilder::new(),
            usage: StdMutex::new(usage),
        }
    }

    /// Replace the prompt builder
    pub fn with_prompts(mut self, prompts: DeckPromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Token usage accumulated so far
    pub fn usage(&self) -> TokenUsageStats {
        match self.usage.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Test the connection to the generation service
    pub async fn test_connection(&self) -> Result<()> {
        let result = match &self.provider {
            GenerationProviderImpl::OpenAI { client } | GenerationProviderImpl::LMStudio { client } => {
                client.test_connection().await
            },
            GenerationProviderImpl::Anthropic { client } => client.test_connection().await,
            GenerationProviderImpl::Mock { client } => client.test_connection().await,
        };

        result.map_err(|e| {
            error!("{} connection failed: {}", self.config.provider.display_name(), e);
            anyhow!("Failed to connect to {}: {}", self.config.provider.display_name(), e)
        })
    }

    /// Draft slide markup for a topic from the articles found for it
    pub async fn generate_markup(
        &self,
        topic: &str,
        articles: &[BibliographicRecord],
    ) -> Result<String, ProviderError> {
        let system = self.prompts.system_prompt().to_string();
        let user = self.prompts.user_message(topic, articles);
        let model = self.config.get_model();
        let temperature = self.config.common.temperature;
        let max_tokens = self.config.common.max_tokens;

        debug!("Requesting markup for '{}' with {} article(s)", topic, articles.len());
        let started = Instant::now();

        let (text, prompt_tokens, completion_tokens) = match &self.provider {
            GenerationProviderImpl::OpenAI { client } | GenerationProviderImpl::LMStudio { client } => {
                let request = OpenAIRequest::new(model)
                    .add_message("system", system)
                    .add_message("user", user)
                    .temperature(temperature)
                    .max_tokens(max_tokens);
                let response = client.complete(request).await?;
                let usage = response.usage.as_ref()
                    .map(|u| (u.prompt_tokens as u64, u.completion_tokens as u64));
                (OpenAI::extract_text(&response), usage.map(|u| u.0), usage.map(|u| u.1))
            },
            GenerationProviderImpl::Anthropic { client } => {
                let request = AnthropicRequest::new(model, max_tokens, user)
                    .system(system)
                    .temperature(temperature);
                let response = client.complete(request).await?;
                (
                    Anthropic::extract_text(&response),
                    Some(response.usage.input_tokens as u64),
                    Some(response.usage.output_tokens as u64),
                )
            },
            GenerationProviderImpl::Mock { client } => {
                let response = client.complete(MockRequest { system, user }).await?;
                (MockProvider::extract_text(&response), response.prompt_tokens, response.completion_tokens)
            },
        };

        let elapsed = started.elapsed();
        {
            let mut usage = match self.usage.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            usage.add_token_usage(prompt_tokens, completion_tokens);
            usage.add_request_duration(elapsed);
        }

        let text = strip_code_fence(&text);
        if text.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        info!("Received {} characters of markup in {:.1}s", text.len(), elapsed.as_secs_f64());
        Ok(text)
    }
}

// Models sometimes wrap the whole answer in a ``` fence.
fn strip_code_fence(text: &str) -> String {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        return body.trim_end().trim_end_matches("```").trim_end().to_string();
    }
    text.to_string()
}
