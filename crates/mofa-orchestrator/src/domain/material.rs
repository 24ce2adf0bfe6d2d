//! Material domain planner. Empty input and bare keyword matches never even
//! reach the model — only a genuinely free-form description does.

use super::types::{MaterialAssignment, MaterialDefinition, MaterialPlan, MaterialProperty};
use crate::error::PlannerError;
use crate::json_extract::extract_json;
use crate::llm_gateway::LlmGateway;
use crate::prompt_registry::PromptManager;
use std::sync::Arc;
use tracing::warn;

/// Bilingual substring keywords checked against the lowercased input before
/// ever calling the model.
const BUILTIN_MATERIAL_KEYWORDS: &[(&str, &str)] = &[
    ("铜", "Copper"),
    ("copper", "Copper"),
    ("钢", "Steel AISI 4340"),
    ("steel", "Steel AISI 4340"),
    ("铝", "Aluminum"),
    ("aluminum", "Aluminum"),
    ("aluminium", "Aluminum"),
    ("玻璃", "Glass (quartz)"),
    ("glass", "Glass (quartz)"),
    ("硅", "Silicon"),
    ("silicon", "Silicon"),
    ("空气", "Air"),
    ("air", "Air"),
    ("水", "Water"),
    ("water", "Water"),
    ("金", "Gold"),
    ("gold", "Gold"),
    ("银", "Silver"),
    ("silver", "Silver"),
    ("钛", "Titanium beta-21S"),
    ("titanium", "Titanium beta-21S"),
];

/// Default steel material, assigned to every domain, used whenever nothing
/// more specific can be determined.
pub fn default_material_plan() -> MaterialPlan {
    MaterialPlan {
        materials: vec![MaterialDefinition {
            name: "mat1".to_string(),
            label: "Steel".to_string(),
            builtin_name: None,
            properties: vec![
                MaterialProperty { name: "density".to_string(), value: 7850.0.into(), unit: "kg/m^3".to_string() },
                MaterialProperty { name: "thermalconductivity".to_string(), value: 44.5.into(), unit: "W/(m*K)".to_string() },
                MaterialProperty { name: "specificheat".to_string(), value: 475.0.into(), unit: "J/(kg*K)".to_string() },
                MaterialProperty { name: "youngsmodulus".to_string(), value: 200e9.into(), unit: "Pa".to_string() },
                MaterialProperty { name: "poissonsratio".to_string(), value: 0.3.into(), unit: "".to_string() },
            ],
            property_group: "Def".to_string(),
        }],
        assignments: vec![MaterialAssignment {
            material_name: "mat1".to_string(),
            domain_ids: Vec::new(),
            assign_all: true,
        }],
    }
}

fn builtin_keyword_plan(user_input: &str) -> Option<MaterialPlan> {
    let lower = user_input.to_lowercase();
    let (_, builtin_name) = BUILTIN_MATERIAL_KEYWORDS.iter().find(|(kw, _)| lower.contains(kw))?;
    Some(MaterialPlan {
        materials: vec![MaterialDefinition {
            name: "mat1".to_string(),
            label: (*builtin_name).to_string(),
            builtin_name: Some((*builtin_name).to_string()),
            properties: Vec::new(),
            property_group: "Def".to_string(),
        }],
        assignments: vec![MaterialAssignment {
            material_name: "mat1".to_string(),
            domain_ids: Vec::new(),
            assign_all: true,
        }],
    })
}

pub struct MaterialAgent {
    gateway: Arc<LlmGateway>,
    prompts: Arc<PromptManager>,
    temperature: f32,
    max_retries: u32,
}

impl MaterialAgent {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptManager>) -> Self {
        Self {
            gateway,
            prompts,
            temperature: 0.1,
            max_retries: 2,
        }
    }

    /// Never fails: any downstream problem (LLM error, unparsable reply)
    /// degrades to [`default_material_plan`] rather than aborting the plan.
    pub async fn parse(&self, user_input: &str, context: Option<&str>) -> MaterialPlan {
        if user_input.trim().is_empty() {
            return default_material_plan();
        }
        if let Some(plan) = builtin_keyword_plan(user_input) {
            return plan;
        }

        match self.parse_via_llm(user_input, context).await {
            Ok(plan) => plan,
            Err(e) => {
                warn!(error = %e, "material planner falling back to default steel plan");
                default_material_plan()
            }
        }
    }

    async fn parse_via_llm(&self, user_input: &str, context: Option<&str>) -> Result<MaterialPlan, PlannerError> {
        let enhanced_input = match context {
            Some(ctx) if !ctx.is_empty() => format!("{ctx}\n\ncurrent request: {user_input}"),
            _ => user_input.to_string(),
        };
        let prompt = self
            .prompts
            .format("planner", "material_planner", &[("user_input", &enhanced_input)])?;
        let response = self.gateway.call(&prompt, self.temperature, self.max_retries).await?;
        extract_json(&response).map_err(PlannerError::ParseError)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_gateway::test_support::FakeLlmProvider;

    #[tokio::test]
    async fn empty_input_returns_default_plan() {
        let provider = Arc::new(FakeLlmProvider::new(vec![]));
        let gateway = Arc::new(LlmGateway::new(provider));
        let agent = MaterialAgent::new(gateway, Arc::new(PromptManager::new()));

        let plan = agent.parse("", None).await;
        assert_eq!(plan.materials[0].label, "Steel");
    }

    #[tokio::test]
    async fn keyword_match_skips_the_model_entirely() {
        let provider = Arc::new(FakeLlmProvider::new(vec![]));
        let gateway = Arc::new(LlmGateway::new(provider));
        let agent = MaterialAgent::new(gateway, Arc::new(PromptManager::new()));

        let plan = agent.parse("use copper for the bracket", None).await;
        assert_eq!(plan.materials[0].builtin_name.as_deref(), Some("Copper"));
    }

    #[tokio::test]
    async fn llm_failure_degrades_to_default_plan() {
        use crate::error::LlmGatewayError;
        let provider = Arc::new(FakeLlmProvider::new(vec![Err(LlmGatewayError::EmptyResponse)]));
        let gateway = Arc::new(LlmGateway::new(provider));
        let agent = MaterialAgent::new(gateway, Arc::new(PromptManager::new()));

        let plan = agent.parse("some exotic alloy nobody names", None).await;
        assert_eq!(plan.materials[0].label, "Steel");
    }
}
