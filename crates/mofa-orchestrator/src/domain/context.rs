//! A2A shared context: an append-only log of what each domain agent did,
//! readable by later agents so a failure upstream can be taken into account
//! instead of silently repeated downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Geometry,
    Material,
    Physics,
    Study,
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentType::Geometry => "geometry",
            AgentType::Material => "material",
            AgentType::Physics => "physics",
            AgentType::Study => "study",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "geometry" => Ok(AgentType::Geometry),
            "material" => Ok(AgentType::Material),
            "physics" => Ok(AgentType::Physics),
            "study" => Ok(AgentType::Study),
            other => Err(format!("unknown agent type: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerStepRecord {
    pub step_index: usize,
    pub agent_type: AgentType,
    pub success: bool,
    pub result_summary: Option<String>,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl PlannerStepRecord {
    pub fn to_context_line(&self) -> String {
        if self.success {
            format!(
                "[step {}] {}: success — {}",
                self.step_index,
                self.agent_type,
                self.result_summary.as_deref().unwrap_or("done")
            )
        } else {
            format!(
                "[step {}] {}: failed — {}",
                self.step_index,
                self.agent_type,
                self.error.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerSharedContext {
    pub user_input: String,
    pub execution_history: Vec<PlannerStepRecord>,
    pub last_error: Option<String>,
}

impl PlannerSharedContext {
    pub fn new(user_input: impl Into<String>) -> Self {
        Self {
            user_input: user_input.into(),
            execution_history: Vec::new(),
            last_error: None,
        }
    }

    /// A summary of "what the other agents did", excluding `for_agent_type`'s
    /// own history so an agent doesn't see itself echoed back.
    pub fn get_context_for_agent(&self, for_agent_type: Option<AgentType>) -> String {
        if self.execution_history.is_empty() {
            return "(no other agent has recorded changes yet.)".to_string();
        }
        let mut lines: Vec<String> = self
            .execution_history
            .iter()
            .filter(|r| Some(r.agent_type) != for_agent_type)
            .map(|r| r.to_context_line())
            .collect();
        if let Some(err) = &self.last_error {
            lines.push(format!("most recent error: {err}"));
        }
        if lines.is_empty() {
            "(no other agent has recorded changes yet.)".to_string()
        } else {
            lines.join("\n")
        }
    }

    pub fn append_success(&mut self, step_index: usize, agent_type: AgentType, result_summary: impl Into<String>) {
        self.execution_history.push(PlannerStepRecord {
            step_index,
            agent_type,
            success: true,
            result_summary: Some(result_summary.into()),
            error: None,
            timestamp: Utc::now(),
        });
        self.last_error = None;
    }

    pub fn append_failure(&mut self, step_index: usize, agent_type: AgentType, error: impl Into<String>) {
        let error = error.into();
        self.execution_history.push(PlannerStepRecord {
            step_index,
            agent_type,
            success: false,
            result_summary: None,
            error: Some(error.clone()),
            timestamp: Utc::now(),
        });
        self.last_error = Some(error);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialPlanStep {
    pub step_index: usize,
    pub agent_type: AgentType,
    pub description: String,
    #[serde(default)]
    pub input_snippet: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SerialPlan {
    pub steps: Vec<SerialPlanStep>,
    pub plan_description: Option<String>,
}

impl SerialPlan {
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_excludes_the_requesting_agent() {
        let mut ctx = PlannerSharedContext::new("build a bracket");
        ctx.append_success(1, AgentType::Geometry, "2 shapes");
        ctx.append_failure(2, AgentType::Material, "boom");

        let for_material = ctx.get_context_for_agent(Some(AgentType::Material));
        assert!(for_material.contains("geometry"));
        assert!(!for_material.contains("[step 2] material"));
        assert!(for_material.contains("most recent error: boom"));
    }
}
