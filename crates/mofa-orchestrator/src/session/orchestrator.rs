//! Per-turn orchestration: route the input, then either answer it directly
//! (qa) or run the full Planner → RAOI pipeline (technical), emitting events
//! at each stage and persisting the turn to session memory. Never raises —
//! any internal failure converts into an `Error` event plus a best-effort
//! summary string.

use super::context::SessionContext;
use crate::domain::{PlannerOrchestrator, PlannerSharedContext, TaskPlan};
use crate::error::{PlannerError, SessionError};
use crate::events::{EventBus, EventType};
use crate::llm_gateway::LlmGateway;
use crate::prompt_registry::PromptManager;
use crate::raoi::{build_initial_plan, Backend, RaoiController, ReActTaskPlan, StepStatus, TaskStatus};
use crate::router::Router;
use crate::skills::SkillInjector;
use serde_json::json;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;
use uuid::Uuid;

use super::agents::{QaAgent, SummaryAgent};

const DEFAULT_SESSION_KEY: &str = "default";

/// Bundles the dependencies a session needs to share, in place of process-wide
/// singletons: an LLM gateway, a prompt registry, a simulation backend, and
/// an event bus. All four are safe to hand to multiple concurrent sessions —
/// the gateway and prompt registry are stateless, the backend is whatever the
/// embedder chose to make thread-safe, and the event bus is internally
/// synchronized.
#[derive(Clone)]
pub struct CoreServices {
    pub gateway: Arc<LlmGateway>,
    pub prompts: Arc<PromptManager>,
    pub backend: Arc<dyn Backend>,
    pub events: EventBus,
    pub skills: Option<Arc<Mutex<SkillInjector>>>,
}

impl CoreServices {
    pub fn new(gateway: Arc<LlmGateway>, prompts: Arc<PromptManager>, backend: Arc<dyn Backend>) -> Self {
        Self { gateway, prompts, backend, events: EventBus::new(), skills: None }
    }

    /// Replaces the default, freshly-constructed event bus with a caller's —
    /// e.g. one a bridge adapter also holds a clone of, so it can observe
    /// every event a session emits.
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = events;
        self
    }

    /// Supplies the skill injector the geometry planner merges retrieved
    /// skills from. Without this, planners run with no skill retrieval at all.
    pub fn with_skills(mut self, skills: Arc<Mutex<SkillInjector>>) -> Self {
        self.skills = Some(skills);
        self
    }
}

/// Builds a [`SessionOrchestrator`] from a [`CoreServices`] bundle plus the
/// session-local knobs that make one session distinct from another sharing
/// the same services: where its history lives, and how much of it to keep.
pub struct SessionOrchestratorBuilder {
    services: CoreServices,
    context_root: PathBuf,
    max_history_entries: usize,
}

impl SessionOrchestratorBuilder {
    pub fn new(services: CoreServices) -> Self {
        Self { services, context_root: PathBuf::from("."), max_history_entries: 100 }
    }

    pub fn context_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.context_root = root.into();
        self
    }

    pub fn max_history_entries(mut self, max_history_entries: usize) -> Self {
        self.max_history_entries = max_history_entries;
        self
    }

    pub fn build(self) -> SessionOrchestrator {
        SessionOrchestrator::new(
            self.services.gateway,
            self.services.prompts,
            self.services.backend,
            self.services.events,
            self.services.skills,
            self.context_root,
            self.max_history_entries,
        )
    }
}

pub struct SessionOrchestrator {
    router: Router,
    planner: PlannerOrchestrator,
    raoi: RaoiController,
    qa_agent: QaAgent,
    summary_agent: SummaryAgent,
    events: EventBus,
    context_root: PathBuf,
    max_history_entries: usize,
    contexts: Mutex<HashMap<String, Arc<SessionContext>>>,
    shared_contexts: Mutex<HashMap<String, PlannerSharedContext>>,
}

impl SessionOrchestrator {
    pub fn new(
        gateway: Arc<LlmGateway>,
        prompts: Arc<PromptManager>,
        backend: Arc<dyn Backend>,
        events: EventBus,
        skills: Option<Arc<Mutex<SkillInjector>>>,
        context_root: impl Into<PathBuf>,
        max_history_entries: usize,
    ) -> Self {
        let planner = match skills {
            Some(skills) => PlannerOrchestrator::with_skills(gateway.clone(), prompts.clone(), skills),
            None => PlannerOrchestrator::new(gateway.clone(), prompts.clone()),
        };
        Self {
            router: Router::new(gateway.clone(), prompts.clone()),
            planner,
            raoi: RaoiController::new(gateway.clone(), prompts.clone(), backend),
            qa_agent: QaAgent::new(gateway.clone(), prompts.clone()),
            summary_agent: SummaryAgent::new(gateway, prompts),
            events,
            context_root: context_root.into(),
            max_history_entries,
            contexts: Mutex::new(HashMap::new()),
            shared_contexts: Mutex::new(HashMap::new()),
        }
    }

    fn context_for(&self, session_id: Option<&str>) -> Result<Arc<SessionContext>, SessionError> {
        let key = session_id.unwrap_or(DEFAULT_SESSION_KEY).to_string();
        let mut contexts = self.contexts.lock().expect("session context map lock poisoned");
        if let Some(ctx) = contexts.get(&key) {
            return Ok(ctx.clone());
        }
        let ctx = Arc::new(SessionContext::for_session(&self.context_root, session_id, self.max_history_entries)?);
        contexts.insert(key, ctx.clone());
        Ok(ctx)
    }

    fn take_shared_context(&self, session_id: Option<&str>) -> Option<PlannerSharedContext> {
        let key = session_id.unwrap_or(DEFAULT_SESSION_KEY).to_string();
        self.shared_contexts.lock().expect("shared context map lock poisoned").get(&key).cloned()
    }

    fn store_shared_context(&self, session_id: Option<&str>, ctx: Option<PlannerSharedContext>) {
        let Some(ctx) = ctx else { return };
        let key = session_id.unwrap_or(DEFAULT_SESSION_KEY).to_string();
        self.shared_contexts.lock().expect("shared context map lock poisoned").insert(key, ctx);
    }

    /// Runs a single conversational turn to completion and returns the reply
    /// surfaced to the user (the QA answer, or the post-execution summary).
    pub async fn run(&self, session_id: Option<&str>, user_input: &str) -> String {
        let context = match self.context_for(session_id) {
            Ok(ctx) => ctx,
            Err(e) => {
                warn!(error = %e, "failed to open session context");
                self.events.emit_type(EventType::Error, json!({"message": e.to_string()}), None);
                return format!("内部错误: {e}");
            }
        };

        let route = self.router.route(user_input).await;

        if route.is_qa() {
            return self.run_qa_turn(&context, user_input).await;
        }

        self.run_technical_turn(&context, session_id, user_input).await
    }

    async fn run_qa_turn(&self, context: &SessionContext, user_input: &str) -> String {
        self.events.emit_type(EventType::TaskPhase, json!({"phase": "qa"}), None);

        let planner_context = context.get_context_for_planner();
        let ctx_opt = (!planner_context.is_empty()).then_some(planner_context.as_str());
        let reply = match self.qa_agent.process(user_input, ctx_opt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "qa agent call failed");
                format!("抱歉，暂时无法回答这个问题：{e}")
            }
        };

        self.events.emit_type(EventType::Content, json!({"content": reply}), None);

        if let Err(e) = context.add_conversation(user_input, None, None, true, None) {
            warn!(error = %e, "failed to record qa turn in session history");
        }

        reply
    }

    async fn run_technical_turn(&self, context: &SessionContext, session_id: Option<&str>, user_input: &str) -> String {
        self.events.emit_type(EventType::PlanStart, json!({"user_input": user_input}), None);

        let planner_context = context.get_context_for_planner();
        let shared = self.take_shared_context(session_id);
        let plan_result = self.planner.run(user_input, Some(&planner_context), shared).await;

        let (task_plan, new_shared, mut react_plan) = match plan_result {
            Ok((task_plan, shared_ctx, serial_plan)) => {
                let task_id = Uuid::new_v4().to_string();
                let model_name = task_plan.geometry.as_ref().map(|g| g.model_name.clone()).unwrap_or_else(|| "model".to_string());
                let react_plan = build_initial_plan(task_id, model_name, user_input, task_plan.clone(), serial_plan.plan_description);
                (Some(task_plan), Some(shared_ctx), react_plan)
            }
            Err(e) => {
                warn!(error = %e, "planner orchestrator failed, falling back to legacy plan");
                let task_id = Uuid::new_v4().to_string();
                let react_plan = self.raoi.legacy_plan(task_id, "model", user_input, Some(&planner_context)).await;
                (None, None, react_plan)
            }
        };

        self.events.emit_type(
            EventType::PlanEnd,
            json!({"steps": react_plan.execution_path.len(), "plan_description": react_plan.plan_description}),
            None,
        );
        self.store_shared_context(session_id, new_shared);

        let run_result = self.raoi.run(&mut react_plan).await;
        let success = run_result.is_ok();
        let model_path = react_plan.model_path.clone();

        if let Err(e) = &run_result {
            self.events.emit_type(EventType::Error, json!({"message": e.to_string()}), None);
        } else {
            self.events.emit_type(EventType::ExecResult, json!({"status": "success", "model_path": model_path}), None);
        }

        let execution_info = build_execution_info(&react_plan, run_result.as_ref().err().map(ToString::to_string).as_deref());
        let summary = match self.summary_agent.process(&execution_info).await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "summary agent call failed, using fallback summary text");
                fallback_summary(&react_plan, success)
            }
        };
        self.events.emit_type(EventType::Content, json!({"content": summary}), None);

        let plan_json = serde_json::to_value(&react_plan).ok();
        let error_text = run_result.err().map(|e| e.to_string());
        if let Err(e) = context.add_conversation(user_input, plan_json, model_path, success, error_text) {
            warn!(error = %e, "failed to record technical turn in session history");
        }
        let _ = task_plan;

        summary
    }

    /// Runs only the Planner Orchestrator (no RAOI execution) and returns the
    /// typed sub-plan, for callers that want to preview a plan before acting
    /// on it.
    pub async fn run_plan_only(&self, session_id: Option<&str>, user_input: &str) -> Result<TaskPlan, PlannerError> {
        self.events.emit_type(EventType::PlanStart, json!({"user_input": user_input}), None);

        let planner_context = match self.context_for(session_id) {
            Ok(ctx) => ctx.get_context_for_planner(),
            Err(_) => String::new(),
        };
        let shared = self.take_shared_context(session_id);
        let result = self.planner.run(user_input, Some(&planner_context), shared).await;

        match &result {
            Ok((task_plan, shared_ctx, serial_plan)) => {
                self.store_shared_context(session_id, Some(shared_ctx.clone()));
                self.events.emit_type(
                    EventType::PlanEnd,
                    json!({"steps": serial_plan.step_count(), "plan_description": serial_plan.plan_description}),
                    None,
                );
                let _ = task_plan;
            }
            Err(e) => {
                self.events.emit_type(EventType::Error, json!({"message": e.to_string()}), None);
            }
        }

        result.map(|(task_plan, _, _)| task_plan)
    }
}

fn build_execution_info(plan: &ReActTaskPlan, error: Option<&str>) -> String {
    let mut parts = vec![format!("model: {}", plan.model_name), format!("user request: {}", plan.user_input)];

    let completed = plan.execution_path.iter().filter(|s| s.status == StepStatus::Completed).map(|s| s.action.as_str()).collect::<Vec<_>>();
    if !completed.is_empty() {
        parts.push(format!("completed steps: {}", completed.join(", ")));
    }

    let failed = plan.execution_path.iter().filter(|s| s.status == StepStatus::Failed).map(|s| s.action.as_str()).collect::<Vec<_>>();
    if !failed.is_empty() {
        parts.push(format!("failed steps: {}", failed.join(", ")));
    }

    if let Some(path) = &plan.model_path {
        parts.push(format!("model artifact: {path}"));
    }
    if let Some(error) = error {
        parts.push(format!("error: {error}"));
    }

    parts.join("\n")
}

fn fallback_summary(plan: &ReActTaskPlan, success: bool) -> String {
    let completed = plan.execution_path.iter().filter(|s| s.status == StepStatus::Completed).count();
    let total = plan.execution_path.len();
    if success {
        format!("已完成 {completed}/{total} 个建模步骤。")
    } else {
        let reason = plan.error.as_deref().unwrap_or("未知错误");
        format!("建模未能完成（{completed}/{total} 步骤已完成），原因：{reason}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_gateway::test_support::FakeLlmProvider;
    use crate::raoi::FakeBackend;

    fn orchestrator(replies: Vec<Result<String, crate::error::LlmGatewayError>>, tmp: &std::path::Path) -> SessionOrchestrator {
        let provider = Arc::new(FakeLlmProvider::new(replies));
        let gateway = Arc::new(LlmGateway::new(provider));
        let prompts = Arc::new(PromptManager::new());
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::new());
        SessionOrchestrator::new(gateway, prompts, backend, EventBus::new(), None, tmp.to_path_buf(), 100)
    }

    #[tokio::test]
    async fn empty_input_routes_to_qa_and_never_touches_planner() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(vec![Ok("你好，我可以帮你建模。".to_string())], dir.path());
        let reply = orch.run(Some("s1"), "").await;
        assert!(reply.contains("你好"));
    }

    #[tokio::test]
    async fn qa_turn_is_recorded_in_history() {
        let dir = tempfile::tempdir().unwrap();
        let orch = orchestrator(vec![Ok("静电场是一种物理场。".to_string())], dir.path());
        orch.run(Some("s1"), "什么是静电场").await;
        let ctx = orch.context_for(Some("s1")).unwrap();
        assert_eq!(ctx.load_history().len(), 1);
    }

    #[tokio::test]
    async fn technical_turn_runs_plan_and_raoi_and_records_model_path() {
        let dir = tempfile::tempdir().unwrap();
        let decompose_reply = r#"{"steps":[{"agent_type":"geometry","description":"draw a rectangle","input_snippet":"draw a rectangle"}]}"#;
        let geometry_reply = r#"{"shapes":[{"type":"rectangle","parameters":{"width":1.0,"height":2.0}}],"model_name":"model"}"#;
        let orch = orchestrator(
            vec![
                Ok("technical".to_string()),
                Ok(decompose_reply.to_string()),
                Ok(geometry_reply.to_string()),
                Ok("已创建矩形几何。".to_string()),
            ],
            dir.path(),
        );

        let reply = orch.run(Some("s1"), "只画一个矩形就行").await;
        assert_eq!(reply, "已创建矩形几何。");

        let ctx = orch.context_for(Some("s1")).unwrap();
        let history = ctx.load_history();
        assert_eq!(history.len(), 1);
        assert!(history[0].success);
        assert_eq!(history[0].model_path.as_deref(), Some("model.mph"));
    }

    #[tokio::test]
    async fn builder_produces_an_equivalent_orchestrator_to_new() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(FakeLlmProvider::new(vec![Ok("你好".to_string())]));
        let gateway = Arc::new(LlmGateway::new(provider));
        let prompts = Arc::new(PromptManager::new());
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::new());
        let services = CoreServices::new(gateway, prompts, backend);

        let orch = SessionOrchestratorBuilder::new(services).context_root(dir.path()).max_history_entries(50).build();

        let reply = orch.run(Some("s1"), "").await;
        assert!(reply.contains("你好"));
    }
}
