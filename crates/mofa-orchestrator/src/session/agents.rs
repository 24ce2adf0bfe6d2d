//! Thin LLM passthroughs used by the session orchestrator outside the
//! planning/execution pipeline: a conversational Q&A responder and a
//! post-turn summarizer.

use crate::error::LlmGatewayError;
use crate::llm_gateway::LlmGateway;
use crate::prompt_registry::PromptManager;
use std::sync::Arc;

const QA_SYSTEM_PROMPT: &str = "你是 COMSOL Multiphysics 建模助手，帮助用户理解仿真建模相关的问题。请用简洁、准确、专业的语言回答，必要时给出具体的操作建议。";

const SUMMARY_SYSTEM_PROMPT: &str =
    "你是一个建模过程总结助手，请根据提供的执行信息，用简短的中文总结这次建模操作的结果，突出关键的变化和结果。";

/// Answers free-form questions about COMSOL modeling without touching the
/// planner or RAOI pipeline.
pub struct QaAgent {
    gateway: Arc<LlmGateway>,
    prompts: Arc<PromptManager>,
}

impl QaAgent {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptManager>) -> Self {
        Self { gateway, prompts }
    }

    pub async fn process(&self, user_input: &str, context: Option<&str>) -> Result<String, LlmGatewayError> {
        let prompt = self
            .prompts
            .format("qa", "answer", &[("system_prompt", QA_SYSTEM_PROMPT), ("context", context.unwrap_or("")), ("user_input", user_input)])
            .unwrap_or_else(|_| format!("{QA_SYSTEM_PROMPT}\n\n{}\n\n{user_input}", context.unwrap_or("")));
        self.gateway.call(&prompt, 0.7, 2).await
    }
}

/// Produces a short human-readable summary of a completed (or failed)
/// technical turn for the event stream and conversation history.
pub struct SummaryAgent {
    gateway: Arc<LlmGateway>,
    prompts: Arc<PromptManager>,
}

impl SummaryAgent {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptManager>) -> Self {
        Self { gateway, prompts }
    }

    pub async fn process(&self, execution_info: &str) -> Result<String, LlmGatewayError> {
        let prompt = self
            .prompts
            .format("summary", "summarize", &[("system_prompt", SUMMARY_SYSTEM_PROMPT), ("execution_info", execution_info)])
            .unwrap_or_else(|_| format!("{SUMMARY_SYSTEM_PROMPT}\n\n{execution_info}"));
        self.gateway.call(&prompt, 0.3, 2).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_gateway::test_support::FakeLlmProvider;

    #[tokio::test]
    async fn qa_agent_returns_gateway_reply() {
        let provider = Arc::new(FakeLlmProvider::new(vec![Ok("静电场用于求解泊松方程".to_string())]));
        let gateway = Arc::new(LlmGateway::new(provider));
        let agent = QaAgent::new(gateway, Arc::new(PromptManager::new()));
        let reply = agent.process("什么是静电场?", None).await.unwrap();
        assert!(reply.contains("泊松"));
    }

    #[tokio::test]
    async fn summary_agent_returns_gateway_reply() {
        let provider = Arc::new(FakeLlmProvider::new(vec![Ok("已创建矩形并完成求解".to_string())]));
        let gateway = Arc::new(LlmGateway::new(provider));
        let agent = SummaryAgent::new(gateway, Arc::new(PromptManager::new()));
        let reply = agent.process("geometry: 1 shape; study: solved").await.unwrap();
        assert_eq!(reply, "已创建矩形并完成求解");
    }
}
