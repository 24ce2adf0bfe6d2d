//! Decomposes a user request into an ordered sequence of domain-planner
//! steps, then runs each step in turn against a shared A2A context.

use super::context::{AgentType, PlannerSharedContext, SerialPlan, SerialPlanStep};
use super::geometry::GeometryAgent;
use super::material::{default_material_plan, MaterialAgent};
use super::physics::{default_physics_plan, PhysicsAgent};
use super::study::{default_study_plan, StudyAgent};
use super::types::TaskPlan;
use crate::error::PlannerError;
use crate::json_extract::extract_json_value;
use crate::llm_gateway::LlmGateway;
use crate::prompt_registry::PromptManager;
use crate::skills::SkillInjector;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const MATERIAL_KEYWORDS: &[&str] = &["材料", "赋", "钢材", "铜", "铝", "属性", "分配", "material"];
const PHYSICS_KEYWORDS: &[&str] = &[
    "物理场", "传热", "热传导", "静电场", "电场", "力学", "流体", "电磁", "physics", "heat", "solid",
];
const STUDY_KEYWORDS: &[&str] = &[
    "研究", "求解", "仿真", "稳态", "瞬态", "计算", "算一下", "完整", "全流程", "study", "solve",
];
const SCOPE_LIMIT_PHRASES: &[&str] = &[
    "就行", "就可以", "就好", "只要", "仅", "只画", "只建", "建个", "画个", "就结束", "只建几何", "只创建几何", "仅几何",
];

const STEP_ORDER: [&str; 4] = ["geometry", "material", "physics", "study"];

fn agent_rank(agent_type: AgentType) -> usize {
    match agent_type {
        AgentType::Geometry => 0,
        AgentType::Material => 1,
        AgentType::Physics => 2,
        AgentType::Study => 3,
    }
}

fn max_scope_from_keywords(has_material: bool, has_physics: bool, has_study: bool) -> &'static str {
    if has_study {
        "study"
    } else if has_physics {
        "physics"
    } else if has_material {
        "material"
    } else {
        "geometry"
    }
}

/// Ports the Python orchestrator's post-decomposition filter: without an
/// explicit material/physics/study keyword the plan is geometry-only, and an
/// explicit "just do X" scope phrase overrides everything else.
fn filter_steps_by_user_intent(user_input: &str, steps: Vec<SerialPlanStep>) -> Vec<SerialPlanStep> {
    if steps.is_empty() {
        return steps;
    }
    let raw = user_input.trim();
    let text = raw.to_lowercase();
    let has_material = MATERIAL_KEYWORDS.iter().any(|k| text.contains(k));
    let has_physics = PHYSICS_KEYWORDS.iter().any(|k| text.contains(k));
    let has_study = STUDY_KEYWORDS.iter().any(|k| text.contains(k));
    let has_scope_limit = SCOPE_LIMIT_PHRASES.iter().any(|p| text.contains(p));

    if has_scope_limit && !(has_material || has_physics || has_study) {
        let geometry_only: Vec<_> = steps.into_iter().filter(|s| s.agent_type == AgentType::Geometry).collect();
        if !geometry_only.is_empty() {
            return geometry_only;
        }
        return vec![SerialPlanStep {
            step_index: 1,
            agent_type: AgentType::Geometry,
            description: "geometry modeling".to_string(),
            input_snippet: raw.to_string(),
        }];
    }

    let max_scope = max_scope_from_keywords(has_material, has_physics, has_study);
    let max_index = STEP_ORDER.iter().position(|s| *s == max_scope).unwrap_or(0);

    let filtered: Vec<_> = steps
        .into_iter()
        .filter(|s| agent_rank(s.agent_type) <= max_index)
        .collect();

    if filtered.is_empty() {
        return vec![SerialPlanStep {
            step_index: 1,
            agent_type: AgentType::Geometry,
            description: "geometry modeling".to_string(),
            input_snippet: raw.to_string(),
        }];
    }

    filtered
        .into_iter()
        .enumerate()
        .map(|(i, s)| SerialPlanStep { step_index: i + 1, ..s })
        .collect()
}

pub struct PlannerOrchestrator {
    gateway: Arc<LlmGateway>,
    prompts: Arc<PromptManager>,
    geometry: GeometryAgent,
    material: MaterialAgent,
    physics: PhysicsAgent,
    study: StudyAgent,
    decompose_temperature: f32,
}

impl PlannerOrchestrator {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptManager>) -> Self {
        Self {
            geometry: GeometryAgent::new(gateway.clone(), prompts.clone(), None),
            material: MaterialAgent::new(gateway.clone(), prompts.clone()),
            physics: PhysicsAgent::new(),
            study: StudyAgent::new(),
            gateway,
            prompts,
            decompose_temperature: 0.1,
        }
    }

    /// Same as [`Self::new`], except the geometry planner merges a
    /// skill-injected block into its prompt for every query.
    pub fn with_skills(gateway: Arc<LlmGateway>, prompts: Arc<PromptManager>, skills: Arc<Mutex<SkillInjector>>) -> Self {
        Self {
            geometry: GeometryAgent::new(gateway.clone(), prompts.clone(), Some(skills)),
            material: MaterialAgent::new(gateway.clone(), prompts.clone()),
            physics: PhysicsAgent::new(),
            study: StudyAgent::new(),
            gateway,
            prompts,
            decompose_temperature: 0.1,
        }
    }

    pub async fn decompose(&self, user_input: &str) -> Result<SerialPlan, PlannerError> {
        info!(request = %user_input, "decomposing user request into serial plan");
        let prompt = self
            .prompts
            .format("planner", "orchestrator_decompose", &[("user_input", user_input)])?;
        let response = self.gateway.call(&prompt, self.decompose_temperature, 2).await?;

        let data = extract_json_value(&response).map_err(PlannerError::ParseError)?;
        let mut steps = Vec::new();
        if let Some(items) = data.get("steps").and_then(|v| v.as_array()) {
            for item in items {
                let Some(agent_type_str) = item.get("agent_type").and_then(|v| v.as_str()) else {
                    continue;
                };
                let Ok(agent_type) = AgentType::from_str(agent_type_str) else {
                    continue;
                };
                steps.push(SerialPlanStep {
                    step_index: steps.len() + 1,
                    agent_type,
                    description: item.get("description").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                    input_snippet: item.get("input_snippet").and_then(|v| v.as_str()).unwrap_or("").to_string(),
                });
            }
        }

        if steps.is_empty() {
            steps.push(SerialPlanStep {
                step_index: 1,
                agent_type: AgentType::Geometry,
                description: "geometry modeling".to_string(),
                input_snippet: user_input.to_string(),
            });
        }

        let steps = filter_steps_by_user_intent(user_input, steps);
        let plan_description = data.get("plan_description").and_then(|v| v.as_str()).map(str::to_string);
        info!(count = steps.len(), "decomposed serial plan");
        Ok(SerialPlan { steps, plan_description })
    }

    pub async fn run(
        &self,
        user_input: &str,
        context: Option<&str>,
        shared_context: Option<PlannerSharedContext>,
    ) -> Result<(TaskPlan, PlannerSharedContext, SerialPlan), PlannerError> {
        let serial_plan = self.decompose(user_input).await?;
        let mut ctx = shared_context.unwrap_or_else(|| PlannerSharedContext::new(user_input));
        ctx.user_input = user_input.to_string();

        let mut task_plan = TaskPlan::default();

        for step in &serial_plan.steps {
            let step_input = if !step.input_snippet.is_empty() {
                step.input_snippet.clone()
            } else if !step.description.is_empty() {
                step.description.clone()
            } else {
                user_input.to_string()
            };
            let other_ctx = ctx.get_context_for_agent(Some(step.agent_type));
            let combined_context = format!("{}\n\n[changes made by other agents]\n{other_ctx}", context.unwrap_or(""));

            match step.agent_type {
                AgentType::Geometry => match self.geometry.parse(&step_input, Some(&combined_context)).await {
                    Ok(plan) => {
                        let summary = format!("{} shapes, {} operations, {}D", plan.shapes.len(), plan.operations.len(), plan.dimension);
                        task_plan.geometry = Some(plan);
                        ctx.append_success(step.step_index, AgentType::Geometry, summary);
                    }
                    Err(e) => {
                        warn!(step = step.step_index, error = %e, "geometry planner step failed");
                        ctx.append_failure(step.step_index, AgentType::Geometry, e.to_string());
                        if task_plan.geometry.is_none() {
                            task_plan.geometry = Some(super::types::GeometryPlan::empty("model"));
                        }
                    }
                },
                AgentType::Material => {
                    let plan = self.material.parse(&step_input, Some(&combined_context)).await;
                    let summary = format!("{} materials", plan.materials.len());
                    task_plan.material = Some(plan);
                    ctx.append_success(step.step_index, AgentType::Material, summary);
                }
                AgentType::Physics => match self.physics.parse(&step_input, Some(&combined_context)).await {
                    Ok(plan) => {
                        let summary = format!("{} physics fields", plan.fields.len());
                        task_plan.physics = Some(plan);
                        ctx.append_success(step.step_index, AgentType::Physics, summary);
                    }
                    Err(e) => {
                        warn!(step = step.step_index, error = %e, "physics planner step failed");
                        ctx.append_failure(step.step_index, AgentType::Physics, e.to_string());
                        if task_plan.physics.is_none() {
                            task_plan.physics = Some(default_physics_plan());
                        }
                    }
                },
                AgentType::Study => match self.study.parse(&step_input, Some(&combined_context)).await {
                    Ok(plan) => {
                        let summary = format!("{} studies", plan.studies.len());
                        task_plan.study = Some(plan);
                        ctx.append_success(step.step_index, AgentType::Study, summary);
                    }
                    Err(e) => {
                        warn!(step = step.step_index, error = %e, "study planner step failed");
                        ctx.append_failure(step.step_index, AgentType::Study, e.to_string());
                        if task_plan.study.is_none() {
                            task_plan.study = Some(default_study_plan());
                        }
                    }
                },
            }
        }

        Ok((task_plan, ctx, serial_plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_limit_phrase_keeps_only_geometry() {
        let steps = vec![
            SerialPlanStep { step_index: 1, agent_type: AgentType::Geometry, description: "g".into(), input_snippet: "".into() },
            SerialPlanStep { step_index: 2, agent_type: AgentType::Material, description: "m".into(), input_snippet: "".into() },
        ];
        let filtered = filter_steps_by_user_intent("建个矩形就行", steps);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].agent_type, AgentType::Geometry);
    }

    #[test]
    fn material_keyword_caps_scope_at_material() {
        let steps = vec![
            SerialPlanStep { step_index: 1, agent_type: AgentType::Geometry, description: "g".into(), input_snippet: "".into() },
            SerialPlanStep { step_index: 2, agent_type: AgentType::Material, description: "m".into(), input_snippet: "".into() },
            SerialPlanStep { step_index: 3, agent_type: AgentType::Physics, description: "p".into(), input_snippet: "".into() },
        ];
        let filtered = filter_steps_by_user_intent("assign copper material to the part", steps);
        assert_eq!(filtered.len(), 2);
        assert!(filtered.iter().all(|s| s.agent_type != AgentType::Physics));
    }

    #[test]
    fn no_keywords_falls_back_to_geometry_only() {
        let steps = vec![
            SerialPlanStep { step_index: 1, agent_type: AgentType::Geometry, description: "g".into(), input_snippet: "".into() },
            SerialPlanStep { step_index: 2, agent_type: AgentType::Study, description: "s".into(), input_snippet: "".into() },
        ];
        let filtered = filter_steps_by_user_intent("draw a rectangle", steps);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].agent_type, AgentType::Geometry);
    }
}
