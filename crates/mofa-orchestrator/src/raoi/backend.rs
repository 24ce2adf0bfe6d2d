//! The simulation backend contract. This crate never shells out to COMSOL
//! or any native library — `Backend` is the seam an embedder supplies a
//! real implementation for; [`FakeBackend`] stands in for tests.

use crate::domain::{GeometryPlan, MaterialPlan, PhysicsPlan, StudyPlan};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct BackendResult {
    pub status: BackendStatus,
    pub message: Option<String>,
    /// A new artifact path, set when the backend had to save to a sibling
    /// path (e.g. the original target was locked by another process).
    pub saved_path: Option<String>,
    pub data: Value,
}

impl BackendResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self { status: BackendStatus::Success, message: Some(message.into()), saved_path: None, data: Value::Null }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { status: BackendStatus::Error, message: Some(message.into()), saved_path: None, data: Value::Null }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self { status: BackendStatus::Warning, message: Some(message.into()), saved_path: None, data: Value::Null }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    async fn create_geometry(&self, plan: &GeometryPlan, model_name: &str) -> BackendResult;
    async fn add_material(&self, model_path: &str, plan: &MaterialPlan) -> BackendResult;
    async fn add_physics(&self, model_path: &str, plan: &PhysicsPlan) -> BackendResult;
    async fn generate_mesh(&self, model_path: &str, params: &Value) -> BackendResult;
    async fn configure_study(&self, model_path: &str, plan: &StudyPlan) -> BackendResult;
    async fn solve(&self, model_path: &str) -> BackendResult;

    /// Whether the artifact at `path` actually exists. Synchronous: the
    /// Observe phase needs this as a plain predicate, not a suspension point.
    fn artifact_exists(&self, path: &str) -> bool;
}

/// Deterministic in-memory stand-in: "files" are just keys in a map, keyed
/// by path. Scripted failures let a test force the rollback-and-inject or
/// fatal-error paths without a real COMSOL install.
#[derive(Default)]
pub struct FakeBackend {
    artifacts: Mutex<HashSet<String>>,
    locked_paths: Mutex<HashSet<String>>,
    scripted_errors: Mutex<HashMap<&'static str, Vec<BackendResult>>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subsequent `create_geometry` saves to `path` will instead land on a
    /// sibling `..._updated.mph` path, mirroring a locked-file fallback.
    pub fn lock_path(&self, path: impl Into<String>) {
        self.locked_paths.lock().expect("fake backend lock poisoned").insert(path.into());
    }

    /// Queue a scripted result for `op` (one of "add_material", "add_physics",
    /// "generate_mesh", "configure_study", "solve"); consumed front-to-back,
    /// falling back to a generic success once exhausted.
    pub fn script(&self, op: &'static str, result: BackendResult) {
        self.scripted_errors.lock().expect("fake backend lock poisoned").entry(op).or_default().push(result);
    }

    fn next_scripted(&self, op: &'static str) -> Option<BackendResult> {
        let mut guard = self.scripted_errors.lock().expect("fake backend lock poisoned");
        let queue = guard.get_mut(op)?;
        if queue.is_empty() {
            None
        } else {
            Some(queue.remove(0))
        }
    }

    fn save(&self, path: &str) -> String {
        let mut locked = self.locked_paths.lock().expect("fake backend lock poisoned");
        let target = if locked.remove(path) {
            let stem = path.strip_suffix(".mph").unwrap_or(path);
            format!("{stem}_updated.mph")
        } else {
            path.to_string()
        };
        self.artifacts.lock().expect("fake backend lock poisoned").insert(target.clone());
        target
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn create_geometry(&self, plan: &GeometryPlan, model_name: &str) -> BackendResult {
        if let Some(r) = self.next_scripted("create_geometry") {
            return r;
        }
        let path = self.save(&format!("{model_name}.mph"));
        BackendResult {
            status: BackendStatus::Success,
            message: Some(format!("created {} shapes", plan.shapes.len())),
            saved_path: Some(path),
            data: Value::Null,
        }
    }

    async fn add_material(&self, model_path: &str, plan: &MaterialPlan) -> BackendResult {
        if let Some(r) = self.next_scripted("add_material") {
            return r;
        }
        let saved_path = self.save(model_path);
        BackendResult {
            status: BackendStatus::Success,
            message: Some(format!("assigned {} materials", plan.materials.len())),
            saved_path: Some(saved_path),
            data: Value::Null,
        }
    }

    async fn add_physics(&self, model_path: &str, plan: &PhysicsPlan) -> BackendResult {
        if let Some(r) = self.next_scripted("add_physics") {
            return r;
        }
        let saved_path = self.save(model_path);
        BackendResult {
            status: BackendStatus::Success,
            message: Some(format!("added {} physics fields", plan.fields.len())),
            saved_path: Some(saved_path),
            data: Value::Null,
        }
    }

    async fn generate_mesh(&self, model_path: &str, _params: &Value) -> BackendResult {
        if let Some(r) = self.next_scripted("generate_mesh") {
            return r;
        }
        let saved_path = self.save(model_path);
        BackendResult {
            status: BackendStatus::Success,
            message: Some("mesh generated".to_string()),
            saved_path: Some(saved_path),
            data: serde_json::json!({"elements": 1024}),
        }
    }

    async fn configure_study(&self, model_path: &str, plan: &StudyPlan) -> BackendResult {
        if let Some(r) = self.next_scripted("configure_study") {
            return r;
        }
        let saved_path = self.save(model_path);
        BackendResult {
            status: BackendStatus::Success,
            message: Some(format!("configured {} studies", plan.studies.len())),
            saved_path: Some(saved_path),
            data: Value::Null,
        }
    }

    async fn solve(&self, model_path: &str) -> BackendResult {
        if let Some(r) = self.next_scripted("solve") {
            return r;
        }
        let saved_path = self.save(model_path);
        BackendResult {
            status: BackendStatus::Success,
            message: Some("solved".to_string()),
            saved_path: Some(saved_path),
            data: serde_json::json!({"converged": true}),
        }
    }

    fn artifact_exists(&self, path: &str) -> bool {
        self.artifacts.lock().expect("fake backend lock poisoned").contains(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GeometryPlan;

    #[tokio::test]
    async fn locked_target_saves_to_sibling_path() {
        let backend = FakeBackend::new();
        backend.lock_path("model.mph");
        let result = backend.create_geometry(&GeometryPlan::empty("model"), "model").await;
        assert_eq!(result.saved_path.as_deref(), Some("model_updated.mph"));
        assert!(backend.artifact_exists("model_updated.mph"));
        assert!(!backend.artifact_exists("model.mph"));
    }

    #[tokio::test]
    async fn scripted_error_is_consumed_once() {
        let backend = FakeBackend::new();
        backend.script("solve", BackendResult::error("missing material properties"));
        let first = backend.solve("model.mph").await;
        assert_eq!(first.status, BackendStatus::Error);
        let second = backend.solve("model.mph").await;
        assert_eq!(second.status, BackendStatus::Success);
    }
}
