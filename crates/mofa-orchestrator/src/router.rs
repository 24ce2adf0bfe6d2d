//! Intent classification: is a turn a plain conversational question, or does
//! it need the full Planner → RAOI execution pipeline?
//!
//! LLM-first, with a keyword-rule fallback used both when the call fails and
//! as the sole behaviour when no gateway classification can be obtained.

use crate::llm_gateway::LlmGateway;
use crate::prompt_registry::PromptManager;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteResult {
    Qa,
    Technical,
}

impl RouteResult {
    pub fn is_qa(self) -> bool {
        matches!(self, RouteResult::Qa)
    }
}

const GREETING_KEYWORDS: &[&str] = &["你好", "嗨", "hello", "hi", "再见", "bye", "谢谢", "感谢", "帮助", "help"];
const TECHNICAL_KEYWORDS: &[&str] = &[
    "创建", "建", "画", "添加", "执行", "分析", "扫描", "生成", "建模", "几何", "物理", "网格", "求解", "研究", "create", "add", "build",
    "run", "solve", "model",
];

/// Keyword-only classification, used as the fallback path when the LLM
/// gateway is unreachable or misconfigured.
pub fn route_by_keywords(user_input: &str) -> RouteResult {
    let text = user_input.trim().to_lowercase();
    if text.is_empty() {
        return RouteResult::Qa;
    }

    for w in GREETING_KEYWORDS {
        if text.contains(w) && text.chars().count() < 80 {
            return RouteResult::Qa;
        }
    }

    for w in TECHNICAL_KEYWORDS {
        if text.contains(w) {
            return RouteResult::Technical;
        }
    }

    if text.chars().count() < 30 {
        RouteResult::Qa
    } else {
        RouteResult::Technical
    }
}

pub struct Router {
    gateway: Arc<LlmGateway>,
    prompts: Arc<PromptManager>,
}

impl Router {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptManager>) -> Self {
        Self { gateway, prompts }
    }

    pub async fn route(&self, user_input: &str) -> RouteResult {
        if user_input.trim().is_empty() {
            return RouteResult::Qa;
        }

        let Ok(prompt) = self.prompts.format("router", "classify", &[("user_input", user_input)]) else {
            return route_by_keywords(user_input);
        };

        match self.gateway.call(&prompt, 0.0, 1).await {
            Ok(reply) => {
                let text = reply.trim().to_lowercase();
                if text.contains("technical") {
                    RouteResult::Technical
                } else if text.contains("qa") {
                    RouteResult::Qa
                } else {
                    RouteResult::Technical
                }
            }
            Err(e) => {
                warn!(error = %e, "router LLM classification failed, falling back to keyword rule");
                route_by_keywords(user_input)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_gateway::test_support::FakeLlmProvider;

    #[test]
    fn empty_keyword_route_is_qa() {
        assert_eq!(route_by_keywords(""), RouteResult::Qa);
    }

    #[test]
    fn greeting_routes_to_qa() {
        assert_eq!(route_by_keywords("hello there"), RouteResult::Qa);
    }

    #[test]
    fn operational_verb_routes_to_technical() {
        assert_eq!(route_by_keywords("create a rectangle"), RouteResult::Technical);
    }

    #[test]
    fn short_generic_sentence_routes_to_qa() {
        assert_eq!(route_by_keywords("what is comsol"), RouteResult::Qa);
    }

    #[tokio::test]
    async fn empty_input_never_calls_gateway() {
        let provider = Arc::new(FakeLlmProvider::new(vec![]));
        let gateway = Arc::new(LlmGateway::new(provider.clone()));
        let router = Router::new(gateway, Arc::new(PromptManager::new()));
        assert_eq!(router.route("").await, RouteResult::Qa);
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn transport_error_falls_back_to_keyword_rule() {
        use crate::error::LlmGatewayError;
        let provider = Arc::new(FakeLlmProvider::new(vec![Err(LlmGatewayError::ConnectionError("x".into()))]));
        let gateway = Arc::new(LlmGateway::new(provider));
        let router = Router::new(gateway, Arc::new(PromptManager::new()));
        assert_eq!(router.route("Create a rectangle").await, RouteResult::Technical);
    }
}
