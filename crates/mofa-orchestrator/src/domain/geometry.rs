//! Geometry domain planner: the only one of the four that is mandatory —
//! every technical request must resolve to at least a geometry plan.

use super::types::GeometryPlan;
use crate::error::PlannerError;
use crate::json_extract::extract_json;
use crate::llm_gateway::LlmGateway;
use crate::prompt_registry::PromptManager;
use crate::skills::SkillInjector;
use std::sync::{Arc, Mutex};

pub struct GeometryAgent {
    gateway: Arc<LlmGateway>,
    prompts: Arc<PromptManager>,
    skills: Option<Arc<Mutex<SkillInjector>>>,
    temperature: f32,
    max_retries: u32,
}

impl GeometryAgent {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptManager>, skills: Option<Arc<Mutex<SkillInjector>>>) -> Self {
        Self {
            gateway,
            prompts,
            skills,
            temperature: 0.1,
            max_retries: 3,
        }
    }

    pub async fn parse(&self, user_input: &str, context: Option<&str>) -> Result<GeometryPlan, PlannerError> {
        let enhanced_input = match context {
            Some(ctx) if !ctx.is_empty() => format!("{ctx}\n\ncurrent request: {user_input}"),
            _ => user_input.to_string(),
        };

        let mut prompt = self
            .prompts
            .format("planner", "geometry_planner", &[("user_input", &enhanced_input)])?;

        if let Some(skills) = &self.skills {
            let mut injector = skills.lock().expect("skill injector lock poisoned");
            prompt = injector.inject_into_prompt(user_input, &prompt);
        }

        let response = self.gateway.call(&prompt, self.temperature, self.max_retries).await?;
        let plan: GeometryPlan = extract_json(&response).map_err(PlannerError::ParseError)?;
        plan.validate().map_err(PlannerError::SchemaError)?;
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_gateway::test_support::FakeLlmProvider;

    #[tokio::test]
    async fn parses_a_valid_geometry_plan() {
        let reply = r#"{"shapes":[{"type":"rectangle","parameters":{"width":1.0,"height":2.0}}],"model_name":"bracket"}"#;
        let provider = Arc::new(FakeLlmProvider::new(vec![Ok(reply.to_string())]));
        let gateway = Arc::new(LlmGateway::new(provider));
        let prompts = Arc::new(PromptManager::new());
        let agent = GeometryAgent::new(gateway, prompts, None);

        let plan = agent.parse("a steel bracket", None).await.unwrap();
        assert_eq!(plan.model_name, "bracket");
        assert_eq!(plan.shapes.len(), 1);
    }

    #[tokio::test]
    async fn invalid_shape_is_a_schema_error() {
        let reply = r#"{"shapes":[{"type":"circle","parameters":{"radius":-1.0}}]}"#;
        let provider = Arc::new(FakeLlmProvider::new(vec![Ok(reply.to_string())]));
        let gateway = Arc::new(LlmGateway::new(provider));
        let prompts = Arc::new(PromptManager::new());
        let agent = GeometryAgent::new(gateway, prompts, None);

        let err = agent.parse("a circle", None).await.unwrap_err();
        assert!(matches!(err, PlannerError::SchemaError(_)));
    }
}
