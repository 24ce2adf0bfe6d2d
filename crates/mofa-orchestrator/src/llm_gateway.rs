//! Unified LLM request/stream interface across model providers, with retry.
//!
//! Deliberately narrower than `mofa_foundation::llm`'s full chat-completions
//! API: every call site in this crate wants "one prompt string in, one
//! reply string out" (the domain planners, the router, the reasoning
//! engine), so the gateway speaks that shape directly rather than adapting
//! a message-array API at every call site. The retry/backoff/provider-registry
//! idioms are carried over from `mofa_foundation::llm::{provider, retry}`.

use crate::error::LlmGatewayError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};
use std::time::Duration;
use tracing::{info_span, Instrument};

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn default_model(&self) -> &str;
    fn supports_streaming(&self) -> bool {
        false
    }

    async fn call(&self, prompt: &str, model: &str, temperature: f32) -> Result<String, LlmGatewayError>;

    async fn call_stream(
        &self,
        _prompt: &str,
        _model: &str,
        _temperature: f32,
        _on_chunk: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<String, LlmGatewayError> {
        Err(LlmGatewayError::StreamingNotSupported)
    }
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub default_temperature: f32,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub extra: HashMap<String, String>,
}

impl LlmConfig {
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider: "openai".to_string(),
            api_key: Some(api_key.into()),
            base_url: None,
            default_model: Some("gpt-4o-mini".to_string()),
            default_temperature: 0.7,
            timeout_secs: 120,
            max_retries: 3,
            extra: HashMap::new(),
        }
    }

    pub fn anthropic(api_key: impl Into<String>) -> Self {
        Self {
            provider: "anthropic".to_string(),
            api_key: Some(api_key.into()),
            base_url: None,
            default_model: Some("claude-3-5-sonnet-latest".to_string()),
            default_temperature: 0.7,
            timeout_secs: 120,
            max_retries: 3,
            extra: HashMap::new(),
        }
    }

    /// `ollama` needs no credential, only a reachable URL.
    pub fn ollama(model: impl Into<String>) -> Self {
        Self {
            provider: "ollama".to_string(),
            api_key: None,
            base_url: Some("http://localhost:11434".to_string()),
            default_model: Some(model.into()),
            default_temperature: 0.7,
            timeout_secs: 120,
            max_retries: 3,
            extra: HashMap::new(),
        }
    }
}

type ProviderFactory = Arc<dyn Fn(&LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmGatewayError> + Send + Sync>;

/// Resolves an `LlmConfig.provider` string to a constructed provider.
/// Session-scoped, not a process-global singleton (§9 "Global state").
#[derive(Default, Clone)]
pub struct LlmRegistry {
    factories: Arc<RwLock<HashMap<String, ProviderFactory>>>,
}

impl LlmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-populated with the built-in providers this crate ships.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_factory("ollama", Arc::new(|cfg| Ok(Arc::new(OllamaProvider::new(cfg.clone())?))));
        registry
    }

    pub fn register_factory(&self, provider: &str, factory: ProviderFactory) {
        self.factories
            .write()
            .expect("llm registry lock poisoned")
            .insert(provider.to_string(), factory);
    }

    pub fn create(&self, config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmGatewayError> {
        let factories = self.factories.read().expect("llm registry lock poisoned");
        let factory = factories
            .get(&config.provider)
            .ok_or_else(|| LlmGatewayError::ProviderNotSupported(config.provider.clone()))?;
        factory(config)
    }
}

/// Global fallback registry for hosts that don't want to thread one through
/// explicitly, mirroring `mofa_foundation::llm::provider`'s `global_registry()`.
pub fn global_registry() -> &'static LlmRegistry {
    static REGISTRY: OnceLock<LlmRegistry> = OnceLock::new();
    REGISTRY.get_or_init(LlmRegistry::with_builtins)
}

/// Arithmetic backoff: `base_delay * attempt`, distinct from the exponential
/// policy `mofa_foundation::llm::retry` uses for its chat-completions path.
pub struct LlmGateway {
    provider: Arc<dyn LlmProvider>,
    base_delay: Duration,
}

impl LlmGateway {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn from_config(config: &LlmConfig, registry: &LlmRegistry) -> Result<Self, LlmGatewayError> {
        Ok(Self::new(registry.create(config)?))
    }

    pub fn provider(&self) -> &Arc<dyn LlmProvider> {
        &self.provider
    }

    pub async fn call(&self, prompt: &str, temperature: f32, max_retries: u32) -> Result<String, LlmGatewayError> {
        let model = self.provider.default_model().to_string();
        let attempts = max_retries.max(1);
        let mut last_err = None;

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(self.base_delay * attempt).await;
            }
            let span = info_span!("llm.call", provider = self.provider.name(), attempt, attempts);
            match self
                .provider
                .call(prompt, &model, temperature)
                .instrument(span)
                .await
            {
                Ok(reply) if reply.trim().is_empty() => {
                    last_err = Some(LlmGatewayError::EmptyResponse);
                }
                Ok(reply) => return Ok(reply),
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err.unwrap_or(LlmGatewayError::EmptyResponse))
    }

    pub async fn call_stream(
        &self,
        prompt: &str,
        temperature: f32,
        on_chunk: &(dyn Fn(&str) + Send + Sync),
    ) -> Result<String, LlmGatewayError> {
        let model = self.provider.default_model().to_string();
        self.provider.call_stream(prompt, &model, temperature, on_chunk).await
    }
}

/// Minimal real provider talking to Ollama's native `/api/generate` endpoint.
pub struct OllamaProvider {
    base_url: String,
    default_model: String,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: LlmConfig) -> Result<Self, LlmGatewayError> {
        Ok(Self {
            base_url: config.base_url.unwrap_or_else(|| "http://localhost:11434".to_string()),
            default_model: config.default_model.unwrap_or_else(|| "llama3".to_string()),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build()
                .map_err(|e| LlmGatewayError::Transport(e.to_string()))?,
        })
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    async fn call(&self, prompt: &str, model: &str, temperature: f32) -> Result<String, LlmGatewayError> {
        let url = format!("{}/api/generate", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": temperature },
        });

        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|_| LlmGatewayError::ConnectionError(url.clone()))?;

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| LlmGatewayError::Transport(e.to_string()))?;

        Ok(value
            .get("response")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Deterministic fake provider: canned replies, call counter, optional
    /// induced failures. Mirrors `mofa_foundation::llm::retry`'s `MockProvider`.
    pub struct FakeLlmProvider {
        pub replies: Vec<Result<String, LlmGatewayError>>,
        pub calls: AtomicUsize,
    }

    impl FakeLlmProvider {
        pub fn new(replies: Vec<Result<String, LlmGatewayError>>) -> Self {
            Self {
                replies,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LlmProvider for FakeLlmProvider {
        fn name(&self) -> &str {
            "fake"
        }

        fn default_model(&self) -> &str {
            "fake-model"
        }

        async fn call(&self, _prompt: &str, _model: &str, _temperature: f32) -> Result<String, LlmGatewayError> {
            let idx = self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .get(idx)
                .cloned()
                .unwrap_or_else(|| Err(LlmGatewayError::EmptyResponse))
        }
    }

    impl Clone for LlmGatewayError {
        fn clone(&self) -> Self {
            match self {
                Self::ConnectionError(s) => Self::ConnectionError(s.clone()),
                Self::ProviderNotSupported(s) => Self::ProviderNotSupported(s.clone()),
                Self::MissingCredentials(s) => Self::MissingCredentials(s.clone()),
                Self::EmptyResponse => Self::EmptyResponse,
                Self::Timeout(d) => Self::Timeout(*d),
                Self::Transport(s) => Self::Transport(s.clone()),
                Self::StreamingNotSupported => Self::StreamingNotSupported,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::FakeLlmProvider;
    use super::*;

    #[tokio::test]
    async fn retries_until_non_empty_reply() {
        let provider = Arc::new(FakeLlmProvider::new(vec![
            Ok("".to_string()),
            Ok("second try".to_string()),
        ]));
        let gateway = LlmGateway::new(provider.clone());
        let reply = gateway.call("hi", 0.1, 3).await.unwrap();
        assert_eq!(reply, "second try");
        assert_eq!(provider.call_count(), 2);
    }

    #[tokio::test]
    async fn exhausts_retries_and_surfaces_last_error() {
        let provider = Arc::new(FakeLlmProvider::new(vec![
            Err(LlmGatewayError::ConnectionError("http://x".into())),
            Err(LlmGatewayError::ConnectionError("http://x".into())),
        ]));
        let gateway = LlmGateway::new(provider);
        let err = gateway.call("hi", 0.1, 2).await.unwrap_err();
        assert!(matches!(err, LlmGatewayError::ConnectionError(_)));
    }

    #[test]
    fn unregistered_provider_errors() {
        let registry = LlmRegistry::new();
        let cfg = LlmConfig::ollama("llama3");
        let err = registry.create(&cfg).unwrap_err();
        assert!(matches!(err, LlmGatewayError::ProviderNotSupported(_)));
    }

    #[test]
    fn builtin_ollama_provider_constructs() {
        let registry = LlmRegistry::with_builtins();
        let cfg = LlmConfig::ollama("llama3");
        let provider = registry.create(&cfg).unwrap();
        assert_eq!(provider.default_model(), "llama3");
    }
}
