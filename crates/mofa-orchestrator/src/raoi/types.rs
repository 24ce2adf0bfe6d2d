//! The ReAct task plan and its constituent records: execution steps,
//! reasoning checkpoints, observations, iteration history.

use crate::domain::{GeometryPlan, MaterialPlan, PhysicsPlan, StudyPlan};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    Geometry,
    Material,
    Physics,
    Mesh,
    Study,
    Solve,
    Selection,
    GeometryIo,
    Postprocess,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepType::Geometry => "geometry",
            StepType::Material => "material",
            StepType::Physics => "physics",
            StepType::Mesh => "mesh",
            StepType::Study => "study",
            StepType::Solve => "solve",
            StepType::Selection => "selection",
            StepType::GeometryIo => "geometry_io",
            StepType::Postprocess => "postprocess",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub step_id: String,
    pub step_type: StepType,
    pub action: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    pub status: StepStatus,
    #[serde(default)]
    pub result: Option<Value>,
}

impl ExecutionStep {
    pub fn new(step_id: impl Into<String>, step_type: StepType, action: impl Into<String>, parameters: Map<String, Value>) -> Self {
        Self {
            step_id: step_id.into(),
            step_type,
            action: action.into(),
            parameters,
            status: StepStatus::Pending,
            result: None,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.parameters.get("retry_count").and_then(|v| v.as_u64()).unwrap_or(0) as u32
    }

    pub fn set_retry_count(&mut self, count: u32) {
        self.parameters.insert("retry_count".to_string(), Value::from(count));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointType {
    Validation,
    Verification,
    Optimization,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStatus {
    Pending,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningCheckpoint {
    pub checkpoint_id: String,
    pub checkpoint_type: CheckpointType,
    pub description: String,
    #[serde(default)]
    pub criteria: Map<String, Value>,
    pub status: CheckpointStatus,
    #[serde(default)]
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub observation_id: String,
    pub step_id: String,
    pub timestamp: DateTime<Utc>,
    pub status: ObservationStatus,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl Observation {
    pub fn new(step_id: impl Into<String>, status: ObservationStatus, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            observation_id: uuid::Uuid::new_v4().to_string(),
            step_id: step_id.into(),
            timestamp: Utc::now(),
            status,
            message: message.into(),
            data,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IterationRecord {
    pub iteration_id: usize,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub changes: Map<String, Value>,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Planning,
    Executing,
    Observing,
    Iterating,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReActTaskPlan {
    pub task_id: String,
    pub model_name: String,
    pub user_input: String,
    #[serde(default = "default_dimension")]
    pub dimension: u8,

    pub execution_path: Vec<ExecutionStep>,
    #[serde(default)]
    pub current_step_index: usize,

    #[serde(default)]
    pub reasoning_path: Vec<ReasoningCheckpoint>,
    #[serde(default)]
    pub observations: Vec<Observation>,
    #[serde(default)]
    pub iterations: Vec<IterationRecord>,

    pub status: TaskStatus,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub integration_suggestions: Option<String>,
    #[serde(default)]
    pub plan_description: Option<String>,
    #[serde(default)]
    pub stop_after_step: Option<String>,

    #[serde(default)]
    pub geometry_plan: Option<GeometryPlan>,
    #[serde(default)]
    pub material_plan: Option<MaterialPlan>,
    #[serde(default)]
    pub physics_plan: Option<PhysicsPlan>,
    #[serde(default)]
    pub study_plan: Option<StudyPlan>,
}

fn default_dimension() -> u8 {
    2
}

impl ReActTaskPlan {
    pub fn new(task_id: impl Into<String>, model_name: impl Into<String>, user_input: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            model_name: model_name.into(),
            user_input: user_input.into(),
            dimension: 2,
            execution_path: Vec::new(),
            current_step_index: 0,
            reasoning_path: Vec::new(),
            observations: Vec::new(),
            iterations: Vec::new(),
            status: TaskStatus::Planning,
            model_path: None,
            output_dir: None,
            error: None,
            integration_suggestions: None,
            plan_description: None,
            stop_after_step: None,
            geometry_plan: None,
            material_plan: None,
            physics_plan: None,
            study_plan: None,
        }
    }

    pub fn get_current_step(&self) -> Option<&ExecutionStep> {
        self.execution_path.get(self.current_step_index)
    }

    pub fn get_current_step_mut(&mut self) -> Option<&mut ExecutionStep> {
        self.execution_path.get_mut(self.current_step_index)
    }

    pub fn add_observation(&mut self, observation: Observation) {
        self.observations.push(observation);
    }

    pub fn add_iteration(&mut self, iteration: IterationRecord) {
        self.iterations.push(iteration);
    }

    pub fn is_complete(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    pub fn has_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    pub fn all_steps_completed(&self) -> bool {
        !self.execution_path.is_empty() && self.execution_path.iter().all(|s| s.status == StepStatus::Completed)
    }

    pub fn warning_count(&self) -> usize {
        self.observations.iter().filter(|o| o.status == ObservationStatus::Warning).count()
    }
}
