//! File-based per-session persistence: conversation history, a derived
//! summary, a pointer to the most recently touched model artifact, and an
//! append-only operations log.

use super::types::{ConversationEntry, ContextSummary, RecentModel, SessionStats};
use crate::error::SessionError;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::{debug, warn};

const RECENT_WINDOW: usize = 20;
const RECENT_ACTIVITY_LINES: usize = 5;
const RECENT_SHAPE_LIMIT: usize = 5;

/// Per-session persisted context: history, summary, latest-model pointer,
/// and an operations log, all rooted at one directory.
///
/// Writes are serialized by an internal `RwLock` and replace the target file
/// by writing to a sibling `.tmp` path and renaming over it, so a reader
/// never observes a partially written file.
pub struct SessionContext {
    context_dir: PathBuf,
    history_file: PathBuf,
    summary_file: PathBuf,
    latest_model_file: PathBuf,
    operations_file: PathBuf,
    max_history_entries: usize,
    lock: RwLock<()>,
}

impl SessionContext {
    pub fn new(context_dir: impl Into<PathBuf>, max_history_entries: usize) -> Result<Self, SessionError> {
        let context_dir = context_dir.into();
        fs::create_dir_all(&context_dir)?;
        Ok(Self {
            history_file: context_dir.join("history.json"),
            summary_file: context_dir.join("summary.json"),
            latest_model_file: context_dir.join("latest_model.txt"),
            operations_file: context_dir.join("operations.md"),
            context_dir,
            max_history_entries: max_history_entries.max(1),
            lock: RwLock::new(()),
        })
    }

    /// `<context_root>/<session_id>`, or `<context_root>/default` when no
    /// session id is given (single-session / CLI use).
    pub fn for_session(context_root: impl AsRef<Path>, session_id: Option<&str>, max_history_entries: usize) -> Result<Self, SessionError> {
        let dir = context_root.as_ref().join(session_id.unwrap_or("default"));
        Self::new(dir, max_history_entries)
    }

    pub fn context_dir(&self) -> &Path {
        &self.context_dir
    }

    pub fn set_latest_model(&self, model_path: &str) -> Result<(), SessionError> {
        if model_path.trim().is_empty() {
            return Ok(());
        }
        let _guard = self.lock.write().expect("session context lock poisoned");
        write_atomic(&self.latest_model_file, model_path.trim().as_bytes())
    }

    pub fn get_latest_model_path(&self) -> Option<String> {
        let _guard = self.lock.read().expect("session context lock poisoned");
        let text = fs::read_to_string(&self.latest_model_file).ok()?;
        let trimmed = text.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    }

    pub fn start_run_log(&self, user_input: &str) -> Result<(), SessionError> {
        let _guard = self.lock.write().expect("session context lock poisoned");
        if !self.operations_file.exists() {
            fs::write(&self.operations_file, "# Modeling operations log\n\n")?;
        }
        let head = format!("\n---\n\n## {} run\n\n**User input**: {user_input}\n\n", Utc::now().format("%Y-%m-%d %H:%M:%S"));
        append(&self.operations_file, &head)
    }

    pub fn append_operation(&self, step_type: &str, message: &str, result_summary: &str, model_path: Option<&str>) -> Result<(), SessionError> {
        let _guard = self.lock.write().expect("session context lock poisoned");
        let mut line = format!("- **{step_type}** ({}): {message}", Utc::now().format("%H:%M:%S"));
        if !result_summary.is_empty() {
            line.push_str(&format!(" — {result_summary}"));
        }
        if let Some(path) = model_path {
            line.push_str(&format!("\n  - model: `{path}`"));
        }
        line.push('\n');
        append(&self.operations_file, &line)
    }

    pub fn add_conversation(
        &self,
        user_input: &str,
        plan: Option<Value>,
        model_path: Option<String>,
        success: bool,
        error: Option<String>,
    ) -> Result<ConversationEntry, SessionError> {
        let entry = ConversationEntry::new(user_input, plan, model_path.clone(), success, error);

        let mut history = self.load_history();
        history.push(entry.clone());
        if history.len() > self.max_history_entries {
            let drop = history.len() - self.max_history_entries;
            history.drain(0..drop);
        }
        self.save_history(&history)?;
        self.update_summary();

        if let Some(path) = &model_path {
            self.set_latest_model(path)?;
        }

        debug!(user_input = %truncate(user_input, 50), "conversation entry recorded");
        Ok(entry)
    }

    pub fn load_history(&self) -> Vec<ConversationEntry> {
        let _guard = self.lock.read().expect("session context lock poisoned");
        let Ok(text) = fs::read_to_string(&self.history_file) else {
            return Vec::new();
        };
        serde_json::from_str(&text).unwrap_or_else(|e| {
            warn!(error = %e, "failed to parse history.json, treating as empty");
            Vec::new()
        })
    }

    fn save_history(&self, history: &[ConversationEntry]) -> Result<(), SessionError> {
        let _guard = self.lock.write().expect("session context lock poisoned");
        let bytes = serde_json::to_vec_pretty(history)?;
        write_atomic(&self.history_file, &bytes)
    }

    pub fn get_recent_history(&self, limit: usize) -> Vec<ConversationEntry> {
        let history = self.load_history();
        let start = history.len().saturating_sub(limit);
        history[start..].to_vec()
    }

    pub fn load_summary(&self) -> Option<ContextSummary> {
        let _guard = self.lock.read().expect("session context lock poisoned");
        let text = fs::read_to_string(&self.summary_file).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn save_summary(&self, summary: &ContextSummary) -> Result<(), SessionError> {
        let _guard = self.lock.write().expect("session context lock poisoned");
        let bytes = serde_json::to_vec_pretty(summary)?;
        write_atomic(&self.summary_file, &bytes)
    }

    /// Rebuilds the summary from the last [`RECENT_WINDOW`] history entries:
    /// distinct recently used shape kinds, a majority-vote preferred unit,
    /// and a short textual digest.
    pub fn update_summary(&self) {
        let history = self.load_history();
        if history.is_empty() {
            return;
        }

        let window: Vec<&ConversationEntry> = history.iter().rev().take(RECENT_WINDOW).rev().collect();

        let mut recent_shapes = Vec::new();
        let mut unit_counts: HashMap<String, usize> = HashMap::new();
        for entry in &window {
            let Some(plan) = &entry.plan else { continue };
            if let Some(shapes) = plan.get("shapes").and_then(|v| v.as_array()) {
                for shape in shapes {
                    if let Some(kind) = shape.get("type").and_then(|v| v.as_str()) {
                        if !recent_shapes.contains(&kind.to_string()) {
                            recent_shapes.push(kind.to_string());
                        }
                    }
                }
            }
            let unit = plan.get("units").and_then(|v| v.as_str()).unwrap_or("m");
            *unit_counts.entry(unit.to_string()).or_insert(0) += 1;
        }

        let mut preferences: HashMap<String, Value> = HashMap::new();
        if let Some((unit, _)) = unit_counts.into_iter().max_by_key(|(_, count)| *count) {
            preferences.insert("preferred_unit".to_string(), Value::String(unit));
        }

        let summary_text = generate_summary_text(&history, &recent_shapes, &preferences);

        let summary = ContextSummary {
            summary: summary_text,
            last_updated: Utc::now(),
            total_conversations: history.len(),
            recent_shapes,
            preferences,
        };

        if let Err(e) = self.save_summary(&summary) {
            warn!(error = %e, "failed to persist rebuilt summary");
        }
    }

    /// Replaces the summary text directly (a user-authored "session memory"),
    /// preserving the other summary fields. Not overwritten by the next
    /// automatic rebuild unless a new conversation entry triggers one.
    pub fn set_summary_text(&self, text: &str) {
        let current = self.load_summary();
        let summary = match current {
            Some(mut existing) => {
                existing.summary = text.trim().to_string();
                existing.last_updated = Utc::now();
                existing
            }
            None => ContextSummary {
                summary: text.trim().to_string(),
                last_updated: Utc::now(),
                total_conversations: self.load_history().len(),
                recent_shapes: Vec::new(),
                preferences: HashMap::new(),
            },
        };
        if let Err(e) = self.save_summary(&summary) {
            warn!(error = %e, "failed to persist user-authored summary");
        }
    }

    /// A Planner-facing context string built from the summary plus the
    /// shapes mentioned in the last 3 history entries.
    pub fn get_context_for_planner(&self) -> String {
        let Some(summary) = self.load_summary() else {
            return String::new();
        };

        let mut parts = Vec::new();
        if !summary.recent_shapes.is_empty() {
            parts.push(format!("User's recently used shape kinds: {}", summary.recent_shapes.join(", ")));
        }
        if let Some(unit) = summary.preferences.get("preferred_unit").and_then(|v| v.as_str()) {
            parts.push(format!("User's preferred unit: {unit}"));
        }

        let recent = self.get_recent_history(3);
        let mut activity_lines = Vec::new();
        for entry in &recent {
            if !entry.success {
                continue;
            }
            let Some(plan) = &entry.plan else { continue };
            let shapes: Vec<&str> = plan
                .get("shapes")
                .and_then(|v| v.as_array())
                .into_iter()
                .flatten()
                .filter_map(|s| s.get("type").and_then(|v| v.as_str()))
                .collect();
            if !shapes.is_empty() {
                activity_lines.push(format!("  - created: {}", shapes.join(", ")));
            }
        }
        if !activity_lines.is_empty() {
            parts.push("Recent conversations:".to_string());
            parts.extend(activity_lines);
        }

        parts.join("\n")
    }

    pub fn get_stats(&self) -> SessionStats {
        let history = self.load_history();
        let summary = self.load_summary();
        SessionStats {
            total_conversations: history.len(),
            successful: history.iter().filter(|e| e.success).count(),
            failed: history.iter().filter(|e| !e.success).count(),
            summary: summary.as_ref().map(|s| s.summary.clone()).unwrap_or_else(|| "no summary yet".to_string()),
            recent_shapes: summary.as_ref().map(|s| s.recent_shapes.clone()).unwrap_or_default(),
            preferences: summary.map(|s| s.preferences).unwrap_or_default(),
        }
    }

    pub fn get_recent_models(&self, limit: usize) -> Vec<RecentModel> {
        let history = self.load_history();
        let latest_path = self.get_latest_model_path();
        recent_models_from_history(&history, latest_path.as_deref(), limit)
    }

    pub fn clear_history(&self) -> Result<(), SessionError> {
        let _guard = self.lock.write().expect("session context lock poisoned");
        if self.history_file.exists() {
            fs::remove_file(&self.history_file)?;
        }
        if self.summary_file.exists() {
            fs::remove_file(&self.summary_file)?;
        }
        Ok(())
    }

    /// Removes every `.mph` artifact referenced by this session's history,
    /// then clears the history and the whole session directory. Returns the
    /// deleted model paths for the caller to surface (e.g. a cleanup preview).
    pub fn delete_conversation_and_models(&self) -> Vec<String> {
        let mut deleted = Vec::new();
        for entry in self.load_history() {
            let Some(path) = entry.model_path else { continue };
            let p = Path::new(&path);
            if p.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("mph")).unwrap_or(false) && p.exists() {
                match fs::remove_file(p) {
                    Ok(()) => deleted.push(path),
                    Err(e) => warn!(path, error = %e, "failed to remove model artifact"),
                }
            }
        }
        let _ = self.clear_history();
        if self.context_dir.exists() {
            if let Err(e) = fs::remove_dir_all(&self.context_dir) {
                warn!(error = %e, "failed to remove session context directory");
            }
        }
        deleted
    }
}

fn recent_models_from_history(history: &[ConversationEntry], latest_path: Option<&str>, limit: usize) -> Vec<RecentModel> {
    let mut out = Vec::new();
    let mut seen = std::collections::HashSet::new();
    for entry in history.iter().rev() {
        let Some(path) = &entry.model_path else { continue };
        if seen.contains(path) || !Path::new(path).exists() {
            continue;
        }
        seen.insert(path.clone());
        let title = if !entry.user_input.trim().is_empty() {
            truncate(&entry.user_input, 50)
        } else {
            Path::new(path).file_stem().and_then(|s| s.to_str()).unwrap_or(path).to_string()
        };
        out.push(RecentModel {
            path: path.clone(),
            title,
            timestamp: entry.timestamp,
            is_latest: Some(path.as_str()) == latest_path,
        });
        if out.len() >= limit {
            break;
        }
    }
    out
}

/// Aggregates recent artifact pointers across every session directory under
/// `context_root`, most-recently-modified session first.
pub fn get_all_models_from_context(context_root: impl AsRef<Path>, limit: usize) -> Vec<RecentModel> {
    let context_root = context_root.as_ref();
    let Ok(entries) = fs::read_dir(context_root) else {
        return Vec::new();
    };

    let mut dirs: Vec<PathBuf> = entries.filter_map(|e| e.ok()).map(|e| e.path()).filter(|p| p.is_dir()).collect();
    dirs.sort_by_key(|p| std::cmp::Reverse(fs::metadata(p).and_then(|m| m.modified()).ok()));

    let mut collected = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for dir in dirs {
        let history_file = dir.join("history.json");
        let Ok(text) = fs::read_to_string(&history_file) else { continue };
        let Ok(history): Result<Vec<ConversationEntry>, _> = serde_json::from_str(&text) else { continue };
        let latest_path = fs::read_to_string(dir.join("latest_model.txt")).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        for entry in history.iter().rev() {
            let Some(path) = &entry.model_path else { continue };
            if seen.contains(path) || !Path::new(path).exists() {
                continue;
            }
            seen.insert(path.clone());
            let title = if !entry.user_input.trim().is_empty() {
                truncate(&entry.user_input, 50)
            } else {
                Path::new(path).file_stem().and_then(|s| s.to_str()).unwrap_or(path).to_string()
            };
            collected.push(RecentModel {
                path: path.clone(),
                title,
                timestamp: entry.timestamp,
                is_latest: latest_path.as_deref() == Some(path.as_str()),
            });
            if collected.len() >= limit {
                return collected;
            }
        }
    }

    collected
}

fn generate_summary_text(history: &[ConversationEntry], recent_shapes: &[String], preferences: &HashMap<String, Value>) -> String {
    if history.is_empty() {
        return "no conversation history yet".to_string();
    }

    let total = history.len();
    let successful = history.iter().filter(|e| e.success).count();
    let mut parts = vec![format!("{total} conversation(s) total, {successful} succeeded.")];

    if !recent_shapes.is_empty() {
        let shown: Vec<&String> = recent_shapes.iter().take(RECENT_SHAPE_LIMIT).collect();
        parts.push(format!("Recently used shape kinds: {}.", shown.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")));
    }

    if let Some(unit) = preferences.get("preferred_unit").and_then(|v| v.as_str()) {
        parts.push(format!("Preferred unit: {unit}."));
    }

    let recent_count = RECENT_ACTIVITY_LINES.min(history.len());
    let recent_entries = &history[history.len() - recent_count..];
    if !recent_entries.is_empty() {
        parts.push("Recent activity:".to_string());
        for entry in recent_entries {
            let status = if entry.success { "ok" } else { "failed" };
            parts.push(format!("  - {}... ({status})", truncate(&entry.user_input, 50)));
        }
    }

    parts.join("\n")
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), SessionError> {
    let tmp = path.with_extension(match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{ext}.tmp"),
        None => "tmp".to_string(),
    });
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn append(path: &Path, content: &str) -> Result<(), SessionError> {
    use std::io::Write;
    let mut file = fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_ctx() -> (tempfile::TempDir, SessionContext) {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SessionContext::new(dir.path().join("s1"), 100).unwrap();
        (dir, ctx)
    }

    #[test]
    fn add_conversation_persists_and_rebuilds_summary() {
        let (_dir, ctx) = temp_ctx();
        let plan = serde_json::json!({"shapes": [{"type": "rectangle"}], "units": "m"});
        ctx.add_conversation("build a rectangle", Some(plan), Some("model.mph".to_string()), true, None).unwrap();

        let history = ctx.load_history();
        assert_eq!(history.len(), 1);

        let summary = ctx.load_summary().unwrap();
        assert_eq!(summary.total_conversations, 1);
        assert_eq!(summary.recent_shapes, vec!["rectangle".to_string()]);
        assert_eq!(summary.preferences.get("preferred_unit").and_then(|v| v.as_str()), Some("m"));
    }

    #[test]
    fn history_is_tail_truncated_to_max_entries() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = SessionContext::new(dir.path().join("s1"), 3).unwrap();
        for i in 0..5 {
            ctx.add_conversation(&format!("turn {i}"), None, None, true, None).unwrap();
        }
        let history = ctx.load_history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].user_input, "turn 2");
        assert_eq!(history[2].user_input, "turn 4");
    }

    #[test]
    fn set_summary_text_preserves_other_fields_and_is_not_auto_overwritten() {
        let (_dir, ctx) = temp_ctx();
        ctx.add_conversation("first", None, None, true, None).unwrap();
        ctx.set_summary_text("my own notes about this session");
        let summary = ctx.load_summary().unwrap();
        assert_eq!(summary.summary, "my own notes about this session");
        assert_eq!(summary.total_conversations, 1);
    }

    #[test]
    fn latest_model_pointer_round_trips() {
        let (_dir, ctx) = temp_ctx();
        assert_eq!(ctx.get_latest_model_path(), None);
        ctx.set_latest_model("model.mph").unwrap();
        assert_eq!(ctx.get_latest_model_path(), Some("model.mph".to_string()));
    }

    #[test]
    fn delete_conversation_and_models_removes_artifact_file() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("a_model.mph");
        fs::write(&model_path, b"fake mph").unwrap();

        let ctx = SessionContext::new(dir.path().join("s1"), 100).unwrap();
        ctx.add_conversation("build", None, Some(model_path.to_string_lossy().to_string()), true, None).unwrap();

        let deleted = ctx.delete_conversation_and_models();
        assert_eq!(deleted.len(), 1);
        assert!(!model_path.exists());
    }
}
