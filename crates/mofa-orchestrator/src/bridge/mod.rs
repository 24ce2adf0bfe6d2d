//! Line-delimited JSON adapter over stdio: reads one request object per
//! line, dispatches it, writes one reply line, and streams event lines
//! (`{"_event": true, ...}`) as the underlying turn runs. A thin transport
//! over [`SessionOrchestrator`]/[`SessionContext`]/[`RaoiController`] — no
//! orchestration logic lives here.

use crate::error::BridgeError;
use crate::events::{Event, EventBus, EventType};
use crate::llm_gateway::LlmGateway;
use crate::prompt_registry::PromptManager;
use crate::raoi::{Backend, RaoiController, ReActTaskPlan};
use crate::session::{get_all_models_from_context, CoreServices, SessionContext, SessionOrchestrator, SessionOrchestratorBuilder};
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

const DEMO_PROMPT: &str = "画一个长10mm宽5mm的矩形";

/// Everything one stdio bridge session needs: the turn orchestrator, a
/// standalone RAOI controller for re-executing an already-planned task
/// (the `exec` command), and where session state lives on disk.
pub struct Bridge {
    orchestrator: Arc<SessionOrchestrator>,
    raoi: RaoiController,
    gateway: Arc<LlmGateway>,
    events: EventBus,
    context_root: PathBuf,
    max_history_entries: usize,
    had_error: Arc<AtomicBool>,
}

impl Bridge {
    /// Convenience constructor for a single-session bridge process: wraps the
    /// four dependencies into a fresh [`CoreServices`] bundle and defers to
    /// [`Bridge::from_services`].
    pub fn new(
        gateway: Arc<LlmGateway>,
        prompts: Arc<PromptManager>,
        backend: Arc<dyn Backend>,
        context_root: impl Into<PathBuf>,
        max_history_entries: usize,
    ) -> Self {
        Self::from_services(CoreServices::new(gateway, prompts, backend), context_root, max_history_entries)
    }

    /// Builds a bridge on top of an already-assembled [`CoreServices`]
    /// bundle, the way a host hosting several concurrent sessions would
    /// share one bundle's gateway/prompts/backend/event-bus across them.
    pub fn from_services(services: CoreServices, context_root: impl Into<PathBuf>, max_history_entries: usize) -> Self {
        let context_root = context_root.into();
        let had_error = Arc::new(AtomicBool::new(false));
        let flag = had_error.clone();
        services.events.subscribe(EventType::Error, Arc::new(move |_: &Event| flag.store(true, Ordering::SeqCst)));

        let gateway = services.gateway.clone();
        let events = services.events.clone();
        let raoi = RaoiController::new(services.gateway.clone(), services.prompts.clone(), services.backend.clone());
        let orchestrator = Arc::new(
            SessionOrchestratorBuilder::new(services).context_root(context_root.clone()).max_history_entries(max_history_entries).build(),
        );

        Self { orchestrator, raoi, gateway, events, context_root, max_history_entries, had_error }
    }

    /// Subscribes a writer that serializes every event on the bus as one
    /// `{"_event": true, ...}` JSON line. Intended to be called once, before
    /// the first request is dispatched.
    pub fn subscribe_event_writer<W: Write + Send + 'static>(&self, writer: Arc<Mutex<W>>) {
        self.events.subscribe_all(Arc::new(move |event: &Event| {
            let line = event_to_line(event);
            let mut guard = writer.lock().expect("bridge event writer lock poisoned");
            let _ = writeln!(guard, "{line}");
            let _ = guard.flush();
        }));
    }

    fn context_for(&self, conversation_id: Option<&str>) -> Result<SessionContext, BridgeError> {
        Ok(SessionContext::for_session(&self.context_root, conversation_id, self.max_history_entries)?)
    }

    /// Dispatches one parsed request object, returning the reply object
    /// (never an `Err` — failures are folded into `{"ok": false, ...}`).
    pub async fn handle(&self, req: &Value) -> Value {
        let cmd = req.get("cmd").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
        if cmd.is_empty() {
            return reply(false, "缺少 cmd", &[]);
        }

        match cmd.as_str() {
            "run" => self.cmd_run(req).await,
            "plan" => self.cmd_plan(req).await,
            "exec" => self.cmd_exec(req).await,
            "demo" => self.cmd_demo(req).await,
            "doctor" => self.cmd_doctor(req).await,
            "context_show" => self.cmd_context_show(req),
            "context_get_summary" => self.cmd_context_get_summary(req),
            "context_set_summary" => self.cmd_context_set_summary(req),
            "context_history" => self.cmd_context_history(req),
            "context_stats" => self.cmd_context_stats(req),
            "context_clear" => self.cmd_context_clear(req),
            "config_save" => cmd_config_save(),
            "model_preview" => cmd_model_preview(),
            "models_list" => self.cmd_models_list(req),
            "conversation_delete" => self.cmd_conversation_delete(req),
            other => reply(false, &format!("未知命令: {other}"), &[]),
        }
    }

    async fn cmd_run(&self, req: &Value) -> Value {
        let input = req.get("input").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
        let conversation_id = req.get("conversation_id").and_then(|v| v.as_str());
        self.had_error.store(false, Ordering::SeqCst);

        let reply_text = self.orchestrator.run(conversation_id, &input).await;
        let ok = !self.had_error.load(Ordering::SeqCst);
        reply(ok, &reply_text, &[])
    }

    async fn cmd_plan(&self, req: &Value) -> Value {
        let input = req.get("input").and_then(|v| v.as_str()).unwrap_or("").trim().to_string();
        let conversation_id = req.get("conversation_id").and_then(|v| v.as_str());
        match self.orchestrator.run_plan_only(conversation_id, &input).await {
            Ok(plan) => {
                let stages = [plan.has_geometry(), plan.has_material(), plan.has_physics(), plan.has_study()].iter().filter(|b| **b).count();
                reply(true, &format!("计划包含 {stages} 个阶段"), &[("plan", serde_json::to_value(&plan).unwrap_or(Value::Null))])
            }
            Err(e) => reply(false, &e.to_string(), &[]),
        }
    }

    async fn cmd_exec(&self, req: &Value) -> Value {
        let Some(path) = req.get("path").and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty()) else {
            return reply(false, "缺少 path", &[]);
        };
        let path = path.trim();
        if !std::path::Path::new(path).exists() {
            return reply(false, &format!("文件不存在: {path}"), &[]);
        }

        let mut plan: ReActTaskPlan = match std::fs::read_to_string(path).ok().and_then(|s| serde_json::from_str(&s).ok()) {
            Some(plan) => plan,
            None => return reply(false, "无法解析计划文件", &[]),
        };

        let outcome = self.raoi.run(&mut plan).await;
        let ok = outcome.is_ok();
        let message = match &outcome {
            Ok(()) => "执行完成".to_string(),
            Err(e) => e.to_string(),
        };

        if let Some(out) = req.get("output").and_then(|v| v.as_str()) {
            if let Ok(text) = serde_json::to_string_pretty(&plan) {
                if let Err(e) = std::fs::write(out, text) {
                    warn!(error = %e, "failed to write executed plan to output path");
                }
            }
        }

        reply(ok, &message, &[("model_path", plan.model_path.map(Value::String).unwrap_or(Value::Null))])
    }

    async fn cmd_demo(&self, _req: &Value) -> Value {
        self.had_error.store(false, Ordering::SeqCst);
        let reply_text = self.orchestrator.run(None, DEMO_PROMPT).await;
        let ok = !self.had_error.load(Ordering::SeqCst);
        reply(ok, &reply_text, &[])
    }

    async fn cmd_doctor(&self, _req: &Value) -> Value {
        match self.gateway.call("ping", 0.0, 1).await {
            Ok(_) => reply(true, "LLM 网关可用", &[]),
            Err(e) => reply(false, &format!("LLM 网关不可用: {e}"), &[]),
        }
    }

    fn cmd_context_show(&self, req: &Value) -> Value {
        let conversation_id = req.get("conversation_id").and_then(|v| v.as_str());
        match self.context_for(conversation_id) {
            Ok(ctx) => {
                let history = ctx.load_history();
                let summary = ctx.load_summary();
                reply(
                    true,
                    "ok",
                    &[("history", serde_json::to_value(history).unwrap_or(Value::Null)), ("summary", serde_json::to_value(summary).unwrap_or(Value::Null))],
                )
            }
            Err(e) => reply(false, &e.to_string(), &[]),
        }
    }

    fn cmd_context_get_summary(&self, req: &Value) -> Value {
        let conversation_id = req.get("conversation_id").and_then(|v| v.as_str());
        match self.context_for(conversation_id) {
            Ok(ctx) => {
                let text = ctx.load_summary().map(|s| s.summary).unwrap_or_else(|| "no summary yet".to_string());
                reply(true, &text, &[])
            }
            Err(e) => reply(false, &e.to_string(), &[]),
        }
    }

    fn cmd_context_set_summary(&self, req: &Value) -> Value {
        let Some(text) = req.get("text").and_then(|v| v.as_str()) else {
            return reply(false, "缺少 text", &[]);
        };
        let conversation_id = req.get("conversation_id").and_then(|v| v.as_str());
        match self.context_for(conversation_id) {
            Ok(ctx) => {
                ctx.set_summary_text(text);
                reply(true, "已更新摘要", &[])
            }
            Err(e) => reply(false, &e.to_string(), &[]),
        }
    }

    fn cmd_context_history(&self, req: &Value) -> Value {
        let conversation_id = req.get("conversation_id").and_then(|v| v.as_str());
        let limit = req.get("limit").and_then(|v| v.as_u64()).unwrap_or(10) as usize;
        match self.context_for(conversation_id) {
            Ok(ctx) => {
                let history = ctx.get_recent_history(limit);
                reply(true, "ok", &[("history", serde_json::to_value(history).unwrap_or(Value::Null))])
            }
            Err(e) => reply(false, &e.to_string(), &[]),
        }
    }

    fn cmd_context_stats(&self, req: &Value) -> Value {
        let conversation_id = req.get("conversation_id").and_then(|v| v.as_str());
        match self.context_for(conversation_id) {
            Ok(ctx) => {
                let stats = ctx.get_stats();
                reply(true, "ok", &[("stats", serde_json::to_value(stats).unwrap_or(Value::Null))])
            }
            Err(e) => reply(false, &e.to_string(), &[]),
        }
    }

    fn cmd_context_clear(&self, req: &Value) -> Value {
        let conversation_id = req.get("conversation_id").and_then(|v| v.as_str());
        match self.context_for(conversation_id) {
            Ok(ctx) => match ctx.clear_history() {
                Ok(()) => reply(true, "已清空历史", &[]),
                Err(e) => reply(false, &e.to_string(), &[]),
            },
            Err(e) => reply(false, &e.to_string(), &[]),
        }
    }

    fn cmd_models_list(&self, req: &Value) -> Value {
        let limit = req.get("limit").and_then(|v| v.as_u64()).unwrap_or(50) as usize;
        let models = get_all_models_from_context(&self.context_root, limit);
        reply(true, "ok", &[("models", serde_json::to_value(models).unwrap_or(Value::Null))])
    }

    fn cmd_conversation_delete(&self, req: &Value) -> Value {
        let Some(conversation_id) = req.get("conversation_id").and_then(|v| v.as_str()).filter(|s| !s.trim().is_empty()) else {
            return reply(false, "缺少 conversation_id", &[("deleted_paths", Value::Array(vec![]))]);
        };
        match self.context_for(Some(conversation_id)) {
            Ok(ctx) => {
                let deleted = ctx.delete_conversation_and_models();
                reply(true, "已删除对话及其关联的模型", &[("deleted_paths", serde_json::to_value(deleted).unwrap_or(Value::Null))])
            }
            Err(e) => reply(false, &e.to_string(), &[("deleted_paths", Value::Array(vec![]))]),
        }
    }
}

fn cmd_config_save() -> Value {
    reply(false, "配置持久化由宿主进程负责", &[])
}

fn cmd_model_preview() -> Value {
    reply(false, "模型预览需要原生仿真后端", &[("image_base64", Value::Null)])
}

fn reply(ok: bool, message: &str, extra: &[(&str, Value)]) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("ok".to_string(), Value::Bool(ok));
    obj.insert("message".to_string(), Value::String(message.to_string()));
    for (k, v) in extra {
        obj.insert((*k).to_string(), v.clone());
    }
    Value::Object(obj)
}

fn event_to_line(event: &Event) -> String {
    let payload = json!({
        "_event": true,
        "type": event.event_type,
        "data": event.data,
        "iteration": event.iteration,
    });
    payload.to_string()
}

/// Reads one JSON request per line from `reader`, dispatches it against
/// `bridge`, and writes one JSON reply line to `writer`. Blank lines are
/// skipped; a line that fails to parse as JSON gets an `{ok:false}` reply
/// rather than aborting the loop.
pub async fn run_stdio<R: BufRead, W: Write>(bridge: &Bridge, mut reader: R, mut writer: W) -> Result<(), BridgeError> {
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader.read_line(&mut line)?;
        if read == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let reply_value = match serde_json::from_str::<Value>(trimmed) {
            Ok(req) => bridge.handle(&req).await,
            Err(e) => reply(false, &format!("JSON 解析错误: {e}"), &[]),
        };

        writeln!(writer, "{reply_value}")?;
        writer.flush()?;
    }
    Ok(())
}

/// Subscribes an event-line writer sharing `writer` and runs the request/reply
/// loop over the same handle. Convenience entry point for the bridge binary.
pub async fn serve<R: BufRead, W: Write + Send + 'static>(bridge: &Bridge, reader: R, writer: Arc<Mutex<W>>) -> Result<(), BridgeError> {
    bridge.subscribe_event_writer(writer.clone());
    info!("bridge stdio loop starting");
    let outcome = run_stdio(bridge, reader, LockedWriter(writer)).await;
    if let Err(e) = &outcome {
        warn!(error = %e, "bridge stdio loop ended with an error");
    }
    outcome
}

struct LockedWriter<W: Write>(Arc<Mutex<W>>);

impl<W: Write> Write for LockedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("bridge writer lock poisoned").write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().expect("bridge writer lock poisoned").flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_gateway::test_support::FakeLlmProvider;
    use crate::raoi::FakeBackend;

    fn bridge(replies: Vec<Result<String, crate::error::LlmGatewayError>>, tmp: &std::path::Path) -> Bridge {
        let provider = Arc::new(FakeLlmProvider::new(replies));
        let gateway = Arc::new(LlmGateway::new(provider));
        let prompts = Arc::new(PromptManager::new());
        let backend: Arc<dyn Backend> = Arc::new(FakeBackend::new());
        Bridge::new(gateway, prompts, backend, tmp.to_path_buf(), 100)
    }

    #[tokio::test]
    async fn unknown_command_does_not_abort() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(vec![], dir.path());
        let resp = b.handle(&json!({"cmd": "nonsense"})).await;
        assert_eq!(resp["ok"], false);
        assert!(resp["message"].as_str().unwrap().contains("nonsense"));
    }

    #[tokio::test]
    async fn missing_cmd_field_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(vec![], dir.path());
        let resp = b.handle(&json!({})).await;
        assert_eq!(resp["ok"], false);
    }

    #[tokio::test]
    async fn run_command_replies_ok_on_qa_turn() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(vec![Ok("你好！".to_string())], dir.path());
        let resp = b.handle(&json!({"cmd": "run", "input": "你好"})).await;
        assert_eq!(resp["ok"], true);
        assert_eq!(resp["message"], "你好！");
    }

    #[tokio::test]
    async fn context_stats_on_empty_session_reports_zero() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(vec![], dir.path());
        let resp = b.handle(&json!({"cmd": "context_stats", "conversation_id": "s1"})).await;
        assert_eq!(resp["ok"], true);
        assert_eq!(resp["stats"]["total_conversations"], 0);
    }

    #[tokio::test]
    async fn conversation_delete_without_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(vec![], dir.path());
        let resp = b.handle(&json!({"cmd": "conversation_delete"})).await;
        assert_eq!(resp["ok"], false);
    }

    #[tokio::test]
    async fn exec_without_existing_file_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(vec![], dir.path());
        let resp = b.handle(&json!({"cmd": "exec", "path": dir.path().join("nope.json").to_string_lossy()})).await;
        assert_eq!(resp["ok"], false);
        assert!(resp["message"].as_str().unwrap().contains("不存在"));
    }

    #[tokio::test]
    async fn run_stdio_processes_one_line_and_writes_one_reply() {
        let dir = tempfile::tempdir().unwrap();
        let b = bridge(vec![Ok("你好！".to_string())], dir.path());
        let input = b"{\"cmd\": \"run\", \"input\": \"hi\"}\n".to_vec();
        let mut output = Vec::new();
        run_stdio(&b, input.as_slice(), &mut output).await.unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.contains("\"ok\":true"));
    }
}
