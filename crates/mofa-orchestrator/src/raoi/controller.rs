//! The Reason-Act-Observe-Iterate controller: drives an already-built
//! [`ReActTaskPlan`] step by step against a [`Backend`], reasoning about
//! failures and rolling back or refining the plan as needed.

use super::backend::{Backend, BackendResult, BackendStatus};
use super::observer::Observer;
use super::types::{ExecutionStep, IterationRecord, Observation, ObservationStatus, ReActTaskPlan, StepStatus, StepType, TaskStatus};
use crate::domain::TaskPlan;
use crate::error::{LlmGatewayError, RaoiError};
use crate::json_extract::extract_json_value;
use crate::llm_gateway::LlmGateway;
use crate::prompt_registry::PromptManager;
use chrono::Utc;
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

/// Builds the step list from a completed [`TaskPlan`], per the fixed COMSOL
/// ordering: geometry → material → physics → [mesh, study, solve] (the
/// latter three only when a physics or study plan is present — a
/// pure-geometry or geometry-plus-material run never solves).
pub fn expand_steps_from_task_plan(task_plan: &TaskPlan) -> Vec<ExecutionStep> {
    let mut steps = Vec::new();
    let mut idx = 0;

    if task_plan.has_geometry() {
        idx += 1;
        steps.push(ExecutionStep::new(format!("step_{idx}"), StepType::Geometry, "create_geometry", Map::new()));
    }
    if task_plan.has_material() {
        idx += 1;
        steps.push(ExecutionStep::new(format!("step_{idx}"), StepType::Material, "add_material", Map::new()));
    }
    if task_plan.has_physics() {
        idx += 1;
        steps.push(ExecutionStep::new(format!("step_{idx}"), StepType::Physics, "add_physics", Map::new()));
    }

    if task_plan.has_physics() || task_plan.has_study() {
        idx += 1;
        steps.push(ExecutionStep::new(format!("step_{idx}"), StepType::Mesh, "generate_mesh", Map::new()));
        idx += 1;
        steps.push(ExecutionStep::new(format!("step_{idx}"), StepType::Study, "configure_study", Map::new()));
        idx += 1;
        steps.push(ExecutionStep::new(format!("step_{idx}"), StepType::Solve, "solve", Map::new()));
    }

    steps
}

/// Builds the initial [`ReActTaskPlan`] from a [`TaskPlan`] already produced
/// by the Planner Orchestrator. This is the primary path; [`RaoiController::legacy_plan`]
/// is the orchestrator-bypass fallback used only when that orchestrator itself failed.
pub fn build_initial_plan(task_id: impl Into<String>, model_name: impl Into<String>, user_input: impl Into<String>, task_plan: TaskPlan, plan_description: Option<String>) -> ReActTaskPlan {
    let user_input = user_input.into();
    let execution_path = expand_steps_from_task_plan(&task_plan);
    let stop_after_step = execution_path.last().map(|s| s.action.clone());

    let mut plan = ReActTaskPlan::new(task_id, model_name, user_input);
    plan.execution_path = execution_path;
    plan.plan_description = plan_description;
    plan.stop_after_step = stop_after_step;
    plan.geometry_plan = task_plan.geometry;
    plan.material_plan = task_plan.material;
    plan.physics_plan = task_plan.physics;
    plan.study_plan = task_plan.study;
    plan
}

const GEOMETRY_ONLY_PHRASES: &[&str] = &["只建几何", "只创建几何", "仅几何", "只画几何", "就建几何", "建几何就行", "只要几何", "just geometry", "only the geometry"];
const MATERIAL_STOP_PHRASES: &[&str] = &["加完材料就行", "只加材料", "材料加完就停", "赋完材料就结束", "stop after material"];
const PHYSICS_STOP_PHRASES: &[&str] = &["加完物理场就行", "加完物理场就停", "只加物理场", "物理场加完就结束", "stop after physics"];
const MESH_STOP_PHRASES: &[&str] = &["划分完网格就停", "划分网格就停", "网格划完就结束", "只划分网格", "stop after mesh"];

const LEGACY_STEP_ORDER: [&str; 6] = ["create_geometry", "add_material", "add_physics", "generate_mesh", "configure_study", "solve"];

fn infer_stop_after_from_user_input(user_input: &str) -> Option<&'static str> {
    let text = user_input.trim();
    if text.is_empty() {
        return None;
    }
    if GEOMETRY_ONLY_PHRASES.iter().any(|p| text.contains(p)) {
        return Some("create_geometry");
    }
    if MATERIAL_STOP_PHRASES.iter().any(|p| text.contains(p)) {
        return Some("add_material");
    }
    if PHYSICS_STOP_PHRASES.iter().any(|p| text.contains(p)) {
        return Some("add_physics");
    }
    if MESH_STOP_PHRASES.iter().any(|p| text.contains(p)) {
        return Some("generate_mesh");
    }
    None
}

fn legacy_step_type(action: &str) -> StepType {
    match action {
        "create_geometry" => StepType::Geometry,
        "add_material" => StepType::Material,
        "add_physics" => StepType::Physics,
        "generate_mesh" => StepType::Mesh,
        "configure_study" => StepType::Study,
        "solve" => StepType::Solve,
        "import_geometry" => StepType::GeometryIo,
        "create_selection" => StepType::Selection,
        "export_results" => StepType::Postprocess,
        _ => StepType::Geometry,
    }
}

fn step_type_from_name(name: &str) -> Option<StepType> {
    Some(match name {
        "geometry" => StepType::Geometry,
        "material" => StepType::Material,
        "physics" => StepType::Physics,
        "mesh" => StepType::Mesh,
        "study" => StepType::Study,
        "solve" => StepType::Solve,
        "selection" => StepType::Selection,
        "geometry_io" => StepType::GeometryIo,
        "postprocess" => StepType::Postprocess,
        _ => return None,
    })
}

fn first_balanced_brace_json(text: &str) -> Option<Value> {
    fn re() -> &'static Regex {
        static RE: OnceLock<Regex> = OnceLock::new();
        RE.get_or_init(|| Regex::new(r"(?s)\{[^{}]*\}").unwrap())
    }
    let m = re().find(text)?;
    serde_json::from_str(m.as_str()).ok()
}

struct Thought {
    action: String,
    reasoning: String,
    parameters: Map<String, Value>,
}

impl Thought {
    fn complete(reason: impl Into<String>) -> Self {
        Self { action: "complete".to_string(), reasoning: reason.into(), parameters: Map::new() }
    }
}

pub struct RaoiController {
    gateway: Arc<LlmGateway>,
    prompts: Arc<PromptManager>,
    backend: Arc<dyn Backend>,
    observer: Observer,
    max_iterations: usize,
}

impl RaoiController {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptManager>, backend: Arc<dyn Backend>) -> Self {
        Self { gateway, prompts, backend, observer: Observer::new(), max_iterations: 10 }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Orchestrator-bypass fallback: asks the model directly for a task type
    /// and step list, from a fixed default-steps-by-task-type table, then
    /// truncates by an explicit or user-phrasing-inferred stop-after step.
    pub async fn legacy_plan(&self, task_id: impl Into<String>, model_name: impl Into<String>, user_input: &str, memory_context: Option<&str>) -> ReActTaskPlan {
        let understanding = self.understand_requirement(user_input, memory_context).await;

        let task_type = understanding.get("task_type").and_then(|v| v.as_str()).unwrap_or("full");
        let mut required_steps: Vec<String> = understanding
            .get("required_steps")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if required_steps.is_empty() {
            required_steps = default_steps_for_task_type(task_type);
        }

        let mut stop_after = understanding.get("stop_after_step").and_then(|v| v.as_str()).map(str::to_string);
        if stop_after.as_deref().unwrap_or("").is_empty() || stop_after.as_deref() == Some("solve") {
            if let Some(inferred) = infer_stop_after_from_user_input(user_input) {
                stop_after = Some(inferred.to_string());
                info!(stop_after = inferred, "inferred stop-after step from user phrasing");
            }
        }

        if let Some(stop) = &stop_after {
            if let Some(pos) = LEGACY_STEP_ORDER.iter().position(|s| s == stop) {
                let allowed: Vec<&str> = LEGACY_STEP_ORDER[..=pos].to_vec();
                required_steps.retain(|s| allowed.contains(&s.as_str()));
            }
        }

        let params = understanding.get("parameters").and_then(|v| v.as_object()).cloned().unwrap_or_default();
        let mut execution_path = Vec::new();
        for (i, action) in required_steps.iter().enumerate() {
            let step_type = legacy_step_type(action);
            let parameters = legacy_step_parameters(action, &params);
            execution_path.push(ExecutionStep::new(format!("step_{}", i + 1), step_type, action.clone(), parameters));
        }

        let plan_description = understanding.get("plan_description").and_then(|v| v.as_str()).map(str::to_string);

        let mut plan = ReActTaskPlan::new(task_id, model_name, user_input);
        plan.execution_path = execution_path;
        plan.plan_description = plan_description;
        plan.stop_after_step = stop_after.filter(|s| s != "solve");
        plan
    }

    async fn understand_requirement(&self, user_input: &str, memory_context: Option<&str>) -> Value {
        let memory = memory_context.unwrap_or("(none)");
        let fallback = || serde_json::json!({"task_type": "geometry", "required_steps": ["create_geometry"], "parameters": {}});

        let Ok(prompt) = self.prompts.format("raoi", "understand_requirement", &[("user_input", user_input), ("memory_context", memory)]) else {
            return fallback();
        };
        let Ok(response) = self.gateway.call(&prompt, 0.1, 2).await else {
            return fallback();
        };
        extract_json_value(&response).unwrap_or_else(|_| fallback())
    }

    /// Runs the Think-Act-Observe-Iterate loop to completion, failure, or the
    /// iteration cap. Mutates `plan` in place so the caller retains it for
    /// inspection regardless of outcome.
    pub async fn run(&self, plan: &mut ReActTaskPlan) -> Result<(), RaoiError> {
        for n in 0..self.max_iterations {
            let thought = self.think(plan);
            info!(iteration = n + 1, action = %thought.action, reasoning = %thought.reasoning, "think");

            if thought.action == "complete" {
                plan.status = TaskStatus::Completed;
                break;
            }

            let executed_step = plan.get_current_step().cloned().unwrap_or_else(|| ExecutionStep::new("unknown", StepType::Geometry, "unknown", Map::new()));
            let result = self.act(plan, &thought).await;
            let observation = self.observe(plan, &executed_step, &result);
            info!(iteration = n + 1, status = ?observation.status, message = %observation.message, "observe");

            if observation.status == ObservationStatus::Success && plan.all_steps_completed() {
                plan.status = TaskStatus::Completed;
                break;
            }

            if observation.status != ObservationStatus::Success {
                self.iterate(plan, observation.clone()).await?;
                if plan.status == TaskStatus::Failed {
                    break;
                }
            }

            if plan.warning_count() >= 5 {
                let feedback = self.generate_feedback(plan, &observation);
                if let Err(e) = self.llm_refine_plan(plan, &feedback, None).await {
                    warn!(error = %e, "periodic warning-triggered refine failed");
                }
            }
        }

        match plan.status {
            TaskStatus::Completed => Ok(()),
            TaskStatus::Failed => Err(RaoiError::Fatal(plan.error.clone().unwrap_or_else(|| "task failed".to_string()))),
            _ => Err(RaoiError::MaxIterationsReached(self.max_iterations)),
        }
    }

    fn think(&self, plan: &mut ReActTaskPlan) -> Thought {
        if plan.all_steps_completed() {
            return Thought::complete("all steps completed");
        }

        let failed_ids: Vec<String> = plan.execution_path.iter().filter(|s| s.status == StepStatus::Failed).map(|s| s.step_id.clone()).collect();
        if !failed_ids.is_empty() {
            let action = if failed_ids.len() == 1 { "retry" } else { "skip" };
            let mut parameters = Map::new();
            parameters.insert("failed_steps".to_string(), Value::from(failed_ids.clone()));
            return Thought { action: action.to_string(), reasoning: format!("detected {} failed step(s)", failed_ids.len()), parameters };
        }

        if let Some(step) = plan.get_current_step() {
            if step.status == StepStatus::Pending {
                return Thought { action: step.action.clone(), reasoning: format!("executing step: {}", step.action), parameters: step.parameters.clone() };
            }
        }

        if plan.current_step_index + 1 < plan.execution_path.len() {
            plan.current_step_index += 1;
            if let Some(next) = plan.get_current_step() {
                return Thought { action: next.action.clone(), reasoning: format!("advancing to next step: {}", next.action), parameters: next.parameters.clone() };
            }
        }

        Thought::complete("no more steps")
    }

    async fn act(&self, plan: &mut ReActTaskPlan, thought: &Thought) -> BackendResult {
        plan.status = TaskStatus::Executing;

        match thought.action.as_str() {
            "create_geometry" => {
                let geometry_plan = plan.geometry_plan.clone().unwrap_or_else(|| crate::domain::GeometryPlan::empty(&plan.model_name));
                let result = self.backend.create_geometry(&geometry_plan, &plan.model_name).await;
                self.finish_step(plan, &result);
                result
            }
            "add_material" => {
                let Some(model_path) = plan.model_path.clone() else {
                    return BackendResult::error("no artifact yet; run geometry first");
                };
                let material_plan = plan.material_plan.clone().unwrap_or_default();
                let result = self.backend.add_material(&model_path, &material_plan).await;
                self.finish_step(plan, &result);
                result
            }
            "add_physics" => {
                let Some(model_path) = plan.model_path.clone() else {
                    return BackendResult::error("no artifact yet; run geometry first");
                };
                let physics_plan = plan.physics_plan.clone().unwrap_or_default();
                let result = self.backend.add_physics(&model_path, &physics_plan).await;
                self.finish_step(plan, &result);
                result
            }
            "generate_mesh" => {
                let Some(model_path) = plan.model_path.clone() else {
                    return BackendResult::error("no artifact yet; run geometry first");
                };
                let params = thought.parameters.get("mesh").cloned().unwrap_or(Value::Null);
                let result = self.backend.generate_mesh(&model_path, &params).await;
                self.finish_step(plan, &result);
                result
            }
            "configure_study" => {
                let Some(model_path) = plan.model_path.clone() else {
                    return BackendResult::error("no artifact yet; run geometry first");
                };
                let study_plan = plan.study_plan.clone().unwrap_or_default();
                let result = self.backend.configure_study(&model_path, &study_plan).await;
                self.finish_step(plan, &result);
                result
            }
            "solve" => {
                let Some(model_path) = plan.model_path.clone() else {
                    return BackendResult::error("no artifact yet");
                };
                let result = self.backend.solve(&model_path).await;
                self.finish_step(plan, &result);
                result
            }
            "retry" => self.handle_retry_action(plan, thought),
            "skip" => self.handle_skip_action(plan, thought),
            other => BackendResult::error(format!("unknown action: {other}")),
        }
    }

    fn finish_step(&self, plan: &mut ReActTaskPlan, result: &BackendResult) {
        if let Some(path) = &result.saved_path {
            plan.model_path = Some(path.clone());
        }

        let idx = plan.current_step_index;
        let at_last = idx + 1 >= plan.execution_path.len();
        if let Some(step) = plan.execution_path.get_mut(idx) {
            step.status = if result.status == BackendStatus::Success { StepStatus::Completed } else { StepStatus::Failed };
            step.result = Some(backend_result_to_value(result));
        }

        if result.status == BackendStatus::Success {
            if at_last {
                plan.status = TaskStatus::Completed;
            } else {
                plan.current_step_index += 1;
            }
        }
    }

    fn handle_retry_action(&self, plan: &mut ReActTaskPlan, thought: &Thought) -> BackendResult {
        let Some(ids) = thought.parameters.get("failed_steps").and_then(|v| v.as_array()) else {
            return BackendResult::error("no steps to retry");
        };
        let ids: Vec<&str> = ids.iter().filter_map(|v| v.as_str()).collect();
        let mut reset = 0;
        for step in plan.execution_path.iter_mut() {
            if ids.contains(&step.step_id.as_str()) && step.status == StepStatus::Failed {
                step.status = StepStatus::Pending;
                reset += 1;
            }
        }
        BackendResult::success(format!("reset {reset} failed step(s)"))
    }

    fn handle_skip_action(&self, plan: &mut ReActTaskPlan, thought: &Thought) -> BackendResult {
        let Some(ids) = thought.parameters.get("failed_steps").and_then(|v| v.as_array()) else {
            return BackendResult::error("no steps to skip");
        };
        let ids: Vec<&str> = ids.iter().filter_map(|v| v.as_str()).collect();
        let mut skipped = 0;
        for step in plan.execution_path.iter_mut() {
            if ids.contains(&step.step_id.as_str()) {
                step.status = StepStatus::Completed;
                skipped += 1;
            }
        }
        BackendResult::success(format!("skipped {skipped} failed step(s)"))
    }

    /// `step` must be the step `act()` just executed, captured before `act()`
    /// runs — `act()` advances `plan.current_step_index` on success, so
    /// re-deriving "current" from `plan` here would observe the next step
    /// instead of the one the result actually belongs to.
    fn observe(&self, plan: &mut ReActTaskPlan, step: &ExecutionStep, result: &BackendResult) -> Observation {
        plan.status = TaskStatus::Observing;
        let observation = self.observer.observe(step, result, self.backend.as_ref());
        plan.add_observation(observation.clone());
        observation
    }

    async fn iterate(&self, plan: &mut ReActTaskPlan, observation: Observation) -> Result<(), RaoiError> {
        plan.status = TaskStatus::Iterating;
        let feedback = self.generate_feedback(plan, &observation);
        let iteration_id = plan.iterations.len() + 1;
        let reason = observation.message.clone();
        let record_observation = observation.clone();

        let outcome = match observation.status {
            ObservationStatus::Error => self.handle_error(plan, &observation, &feedback).await,
            ObservationStatus::Warning => {
                info!(message = %observation.message, "received warning");
                Ok(())
            }
            ObservationStatus::Success => Ok(()),
        };

        plan.add_iteration(IterationRecord { iteration_id, timestamp: Utc::now(), reason, changes: Map::new(), observations: vec![record_observation] });

        outcome
    }

    fn generate_feedback(&self, plan: &ReActTaskPlan, observation: &Observation) -> String {
        let mut parts = vec![format!("observation: {}", observation.message)];

        if let Some(step) = plan.get_current_step() {
            parts.push(format!("current step: {} ({})", step.action, step.step_type));
            if step.status == StepStatus::Failed {
                if let Some(result) = &step.result {
                    parts.push(format!("step failed: {result}"));
                }
            }
        }

        let recent: Vec<&Observation> = plan.observations.iter().rev().take(5).collect();
        let error_count = recent.iter().filter(|o| o.status == ObservationStatus::Error).count();
        let warning_count = recent.iter().filter(|o| o.status == ObservationStatus::Warning).count();
        if error_count > 0 {
            parts.push(format!("{error_count} recent error(s)"));
        }
        if warning_count > 0 {
            parts.push(format!("{warning_count} recent warning(s)"));
        }

        let completed = plan.execution_path.iter().filter(|s| s.status == StepStatus::Completed).count();
        parts.push(format!("progress: {completed}/{} steps completed", plan.execution_path.len()));

        parts.join("\n")
    }

    async fn handle_error(&self, plan: &mut ReActTaskPlan, observation: &Observation, feedback: &str) -> Result<(), RaoiError> {
        let lower = observation.message.to_lowercase();
        if is_fatal_error(&lower) {
            plan.status = TaskStatus::Failed;
            plan.error = Some(observation.message.clone());
            error!(message = %observation.message, "fatal error, terminating RAOI loop");
            return Err(RaoiError::Fatal(observation.message.clone()));
        }

        let step_type = plan.get_current_step().map(|s| s.step_type);
        let is_rollback_candidate = matches!(step_type, Some(StepType::Solve) | Some(StepType::Study) | Some(StepType::Mesh) | Some(StepType::Physics));
        let suggests_material =
            observation.message.contains("材料属性") || (observation.message.contains("未定义") && observation.message.contains("材料")) || lower.contains("material") || (lower.contains("missing") && step_type == Some(StepType::Solve));

        if is_rollback_candidate && suggests_material {
            match self.rollback_and_inject(plan, observation).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                Err(e) => warn!(error = %e, "rollback-and-inject failed, falling back to generic retry"),
            }
        }

        self.generic_retry(plan);

        if let Err(e) = self.llm_refine_plan(plan, feedback, Some(observation)).await {
            warn!(error = %e, "plan refine failed");
        }

        Ok(())
    }

    fn generic_retry(&self, plan: &mut ReActTaskPlan) {
        let idx = plan.current_step_index;
        let at_last = idx + 1 >= plan.execution_path.len();
        let mut advance = false;

        if let Some(step) = plan.execution_path.get_mut(idx) {
            if step.status == StepStatus::Failed {
                let retry_count = step.retry_count();
                if retry_count < 3 {
                    step.status = StepStatus::Pending;
                    step.set_retry_count(retry_count + 1);
                    info!(step_id = %step.step_id, attempt = retry_count + 1, "retrying failed step");
                } else {
                    step.status = StepStatus::Completed;
                    warn!(step_id = %step.step_id, "skipping step after too many retries");
                    advance = !at_last;
                }
            }
        }

        if advance {
            plan.current_step_index += 1;
        }
    }

    /// Asks the model to pick a rollback target and repair inputs. Returns
    /// `Ok(true)` iff a rollback was actually applied.
    async fn rollback_and_inject(&self, plan: &mut ReActTaskPlan, observation: &Observation) -> Result<bool, LlmGatewayError> {
        let steps_desc: Vec<String> = plan.execution_path.iter().map(|s| format!("({}, {})", s.step_type, s.action)).collect();
        let prompt = self
            .prompts
            .format("raoi", "rollback_and_inject", &[("error_message", &observation.message), ("steps", &steps_desc.join(", "))])
            .map_err(|e| LlmGatewayError::Transport(e.to_string()))?;
        let response = self.gateway.call(&prompt, 0.1, 2).await?;

        let Some(value) = first_balanced_brace_json(&response) else {
            return Ok(false);
        };

        let raw_action = value.get("rollback_action").and_then(|v| v.as_str()).unwrap_or("").trim().to_lowercase();
        let rollback_action = raw_action.split_whitespace().next().unwrap_or("").to_string();
        if rollback_action.is_empty() || rollback_action == "solve" {
            return Ok(false);
        }

        let target_index = plan.execution_path.iter().position(|s| {
            s.action == rollback_action || (rollback_action == "add_material" && s.step_type == StepType::Material) || (rollback_action == "add_physics" && s.step_type == StepType::Physics)
        });
        let Some(target_index) = target_index else {
            return Ok(false);
        };

        let material_input = value.get("material_input").and_then(|v| v.as_str()).map(str::to_string);
        let physics_input = value.get("physics_input").and_then(|v| v.as_str()).map(str::to_string);

        for i in target_index..plan.execution_path.len() {
            plan.execution_path[i].status = StepStatus::Pending;
            plan.execution_path[i].result = None;
            if i == target_index {
                let step = &mut plan.execution_path[i];
                if step.step_type == StepType::Material {
                    if let Some(mi) = &material_input {
                        step.parameters.insert("material_input".to_string(), Value::String(mi.clone()));
                    }
                }
                if step.step_type == StepType::Physics {
                    if let Some(pi) = &physics_input {
                        step.parameters.insert("physics_input".to_string(), Value::String(pi.clone()));
                    }
                }
            }
        }
        plan.current_step_index = target_index;
        info!(target_step = target_index, action = %rollback_action, "rolled back to earlier step and injected repair parameters");
        Ok(true)
    }

    async fn llm_refine_plan(&self, plan: &mut ReActTaskPlan, feedback: &str, observation: Option<&Observation>) -> Result<(), LlmGatewayError> {
        let err_msg = observation.map(|o| o.message.clone()).unwrap_or_else(|| feedback.to_string());
        let steps_desc = plan.execution_path.iter().map(|s| s.action.clone()).collect::<Vec<_>>().join(", ");
        let current_step = format!("{}/{}", plan.current_step_index + 1, plan.execution_path.len());

        let prompt = self
            .prompts
            .format("raoi", "refine_plan", &[
                ("error_message", &err_msg),
                ("model_name", &plan.model_name),
                ("user_input", &plan.user_input),
                ("current_step", &current_step),
                ("steps", &steps_desc),
            ])
            .map_err(|e| LlmGatewayError::Transport(e.to_string()))?;
        let response = self.gateway.call(&prompt, 0.2, 2).await?;

        let Ok(suggestions) = extract_json_value(&response) else {
            warn!("could not extract refine suggestions from model reply");
            return Ok(());
        };

        if suggestions.get("skip_current").and_then(|v| v.as_bool()).unwrap_or(false) {
            let idx = plan.current_step_index;
            let at_last = idx + 1 >= plan.execution_path.len();
            if let Some(step) = plan.execution_path.get_mut(idx) {
                step.status = StepStatus::Completed;
            }
            if !at_last {
                plan.current_step_index += 1;
            }
        }

        if let Some(new_steps) = suggestions.get("new_steps").and_then(|v| v.as_array()) {
            for item in new_steps {
                let step_type = item.get("step_type").and_then(|v| v.as_str()).and_then(step_type_from_name).unwrap_or(StepType::Geometry);
                let action = item.get("action").and_then(|v| v.as_str()).unwrap_or("create_geometry").to_string();
                let parameters = item.get("parameters").and_then(|v| v.as_object()).cloned().unwrap_or_default();
                let idx = plan.execution_path.len() + 1;
                plan.execution_path.push(ExecutionStep::new(format!("step_{idx}"), step_type, action, parameters));
            }
        }

        if let Some(modified) = suggestions.get("modified_steps").and_then(|v| v.as_array()) {
            for item in modified {
                let Some(step_id) = item.get("step_id").and_then(|v| v.as_str()) else {
                    continue;
                };
                if let Some(step) = plan.execution_path.iter_mut().find(|s| s.step_id == step_id) {
                    if let Some(params) = item.get("parameters").and_then(|v| v.as_object()) {
                        for (k, v) in params {
                            step.parameters.insert(k.clone(), v.clone());
                        }
                    }
                    if let Some(action) = item.get("action").and_then(|v| v.as_str()) {
                        step.action = action.to_string();
                    }
                    step.status = StepStatus::Pending;
                }
            }
        }

        if let Some(changes) = suggestions.get("suggested_changes").and_then(|v| v.as_str()) {
            info!(changes, "plan refined from model feedback");
        }

        Ok(())
    }
}

fn is_fatal_error(message_lower: &str) -> bool {
    (message_lower.contains("object has no attribute") || message_lower.contains("has no attribute"))
        || (message_lower.contains("cannot find") && (message_lower.contains("project root") || message_lower.contains("jvm") || message_lower.contains("jar")))
}

fn backend_result_to_value(result: &BackendResult) -> Value {
    serde_json::json!({
        "status": match result.status {
            BackendStatus::Success => "success",
            BackendStatus::Warning => "warning",
            BackendStatus::Error => "error",
        },
        "message": result.message,
        "data": result.data,
    })
}

fn default_steps_for_task_type(task_type: &str) -> Vec<String> {
    let steps: &[&str] = match task_type {
        "geometry" => &["create_geometry"],
        "physics" => &["create_geometry", "add_material", "add_physics"],
        "study" => &["create_geometry", "add_material", "add_physics", "configure_study"],
        _ => &["create_geometry", "add_material", "add_physics", "generate_mesh", "configure_study", "solve"],
    };
    steps.iter().map(|s| s.to_string()).collect()
}

fn legacy_step_parameters(action: &str, params: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    match action {
        "create_geometry" => {
            out.insert("geometry_input".to_string(), params.get("geometry_input").cloned().unwrap_or_default());
        }
        "add_material" => {
            out.insert("material_input".to_string(), params.get("material_input").cloned().unwrap_or_default());
        }
        "add_physics" => {
            out.insert("physics_input".to_string(), params.get("physics_input").cloned().unwrap_or_default());
        }
        "generate_mesh" => {
            out.insert("mesh".to_string(), params.get("mesh").cloned().unwrap_or(Value::Object(Map::new())));
        }
        "configure_study" => {
            out.insert("study_input".to_string(), params.get("study_input").cloned().unwrap_or_default());
        }
        "import_geometry" => {
            out.insert("file_path".to_string(), params.get("file_path").cloned().unwrap_or(Value::Null));
            out.insert("geom_tag".to_string(), params.get("geom_tag").cloned().unwrap_or_else(|| Value::String("geom1".to_string())));
        }
        "create_selection" => {
            out.insert("tag".to_string(), params.get("tag").cloned().unwrap_or_else(|| Value::String("sel1".to_string())));
            out.insert("geom_tag".to_string(), params.get("geom_tag").cloned().unwrap_or_else(|| Value::String("geom1".to_string())));
            out.insert("entities".to_string(), params.get("entities").cloned().unwrap_or(Value::Null));
            out.insert("all".to_string(), params.get("all").cloned().unwrap_or(Value::Null));
        }
        "export_results" => {
            out.insert("out_path".to_string(), params.get("out_path").cloned().unwrap_or(Value::Null));
            out.insert("plot_group_tag".to_string(), params.get("plot_group_tag").cloned().unwrap_or(Value::Null));
            out.insert("export_type".to_string(), params.get("export_type").cloned().unwrap_or(Value::Null));
        }
        _ => {}
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GeometryPlan, GeometryShape, MaterialDefinition, MaterialPlan, ShapeType};
    use crate::llm_gateway::test_support::FakeLlmProvider;
    use std::collections::HashMap;

    fn geometry_only_task_plan() -> TaskPlan {
        TaskPlan { geometry: Some(GeometryPlan::empty("m")), material: None, physics: None, study: None }
    }

    #[test]
    fn pure_geometry_plan_never_solves() {
        let steps = expand_steps_from_task_plan(&geometry_only_task_plan());
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action, "create_geometry");
    }

    #[test]
    fn physics_plan_appends_mesh_study_solve() {
        let mut task_plan = geometry_only_task_plan();
        task_plan.physics = Some(crate::domain::PhysicsPlan::default());
        let steps = expand_steps_from_task_plan(&task_plan);
        let actions: Vec<&str> = steps.iter().map(|s| s.action.as_str()).collect();
        assert_eq!(actions, vec!["create_geometry", "add_physics", "generate_mesh", "configure_study", "solve"]);
    }

    fn controller_with_backend(backend: Arc<dyn Backend>) -> RaoiController {
        let provider = Arc::new(FakeLlmProvider::new(vec![]));
        let gateway = Arc::new(LlmGateway::new(provider));
        RaoiController::new(gateway, Arc::new(PromptManager::new()), backend)
    }

    #[tokio::test]
    async fn geometry_only_run_completes_without_solving() {
        let backend: Arc<dyn Backend> = Arc::new(super::super::backend::FakeBackend::new());
        let controller = controller_with_backend(backend);

        let mut shape_params = HashMap::new();
        shape_params.insert("width".to_string(), 1.0);
        shape_params.insert("height".to_string(), 0.5);
        let geometry = GeometryPlan {
            shapes: vec![GeometryShape { shape_type: ShapeType::Rectangle, parameters: shape_params, position: HashMap::new(), name: "r1".to_string() }],
            units: "m".to_string(),
            model_name: "model".to_string(),
            operations: Vec::new(),
            dimension: 2,
        };
        let task_plan = TaskPlan { geometry: Some(geometry), material: None, physics: None, study: None };
        let mut plan = build_initial_plan("t1", "model", "build a rectangle", task_plan, None);

        controller.run(&mut plan).await.unwrap();

        assert_eq!(plan.status, TaskStatus::Completed);
        assert_eq!(plan.model_path.as_deref(), Some("model.mph"));
        assert!(plan.execution_path.iter().all(|s| s.status == StepStatus::Completed));
    }

    #[tokio::test]
    async fn geometry_observation_targets_the_executed_step_not_the_next_one() {
        let fake = super::super::backend::FakeBackend::new();
        fake.script(
            "create_geometry",
            BackendResult { status: BackendStatus::Success, message: Some("ok".into()), saved_path: Some("model.mph".into()), data: Value::Null },
        );
        let backend: Arc<dyn Backend> = Arc::new(fake);
        let controller = controller_with_backend(backend);

        let mut task_plan = geometry_only_task_plan();
        task_plan.material = Some(MaterialPlan {
            materials: vec![MaterialDefinition { name: "mat1".into(), label: "Steel".into(), builtin_name: None, properties: vec![], property_group: "Def".into() }],
            assignments: vec![],
        });
        let mut plan = build_initial_plan("t3", "model", "build a rectangle and assign steel", task_plan, None);

        controller.run(&mut plan).await.unwrap();

        let geometry_step_id = plan.execution_path.iter().find(|s| s.action == "create_geometry").unwrap().step_id.clone();
        let geometry_observation = plan
            .observations
            .iter()
            .find(|o| o.step_id == geometry_step_id)
            .expect("geometry step should have its own observation, not the material step's");
        assert_eq!(geometry_observation.status, ObservationStatus::Warning);
    }

    #[tokio::test]
    async fn max_iterations_reached_leaves_plan_inspectable() {
        let fake = super::super::backend::FakeBackend::new();
        fake.script("add_material", BackendResult::error("boom"));
        let backend: Arc<dyn Backend> = Arc::new(fake);
        let controller = controller_with_backend(backend).with_max_iterations(1);

        let task_plan = TaskPlan { geometry: None, material: Some(MaterialPlan { materials: vec![MaterialDefinition { name: "mat1".into(), label: "Steel".into(), builtin_name: None, properties: vec![], property_group: "Def".into() }], assignments: vec![] }), physics: None, study: None };
        let mut plan = build_initial_plan("t2", "model", "assign steel", task_plan, None);
        plan.model_path = Some("model.mph".to_string());

        let err = controller.run(&mut plan).await.unwrap_err();
        assert!(matches!(err, RaoiError::MaxIterationsReached(1)));
    }
}
