//! Turns a backend result into an [`Observation`], with per-step-type rules.

use super::backend::{Backend, BackendResult, BackendStatus};
use super::types::{ExecutionStep, Observation, ObservationStatus, StepType};

#[derive(Default)]
pub struct Observer;

impl Observer {
    pub fn new() -> Self {
        Self
    }

    pub fn observe(&self, step: &ExecutionStep, result: &BackendResult, backend: &dyn Backend) -> Observation {
        match step.step_type {
            StepType::Geometry => self.observe_geometry(step, result, backend),
            StepType::Physics | StepType::Study => self.observe_verbatim(step, result),
            StepType::Mesh | StepType::Solve => self.observe_strict(step, result),
            _ => self.observe_generic(step, result),
        }
    }

    fn observe_geometry(&self, step: &ExecutionStep, result: &BackendResult, backend: &dyn Backend) -> Observation {
        let message = result.message.clone().unwrap_or_default();
        match result.status {
            BackendStatus::Success => {
                let path = result.saved_path.as_deref();
                match path {
                    Some(p) if backend.artifact_exists(p) => {
                        Observation::new(&step.step_id, ObservationStatus::Success, "geometry build succeeded, artifact written", Some(result.data.clone()))
                    }
                    _ => Observation::new(
                        &step.step_id,
                        ObservationStatus::Warning,
                        "geometry build succeeded but the artifact file was not found",
                        Some(result.data.clone()),
                    ),
                }
            }
            _ => Observation::new(&step.step_id, ObservationStatus::Error, format!("geometry build failed: {message}"), Some(result.data.clone())),
        }
    }

    /// physics/study: the backend's own status tier passes straight through.
    fn observe_verbatim(&self, step: &ExecutionStep, result: &BackendResult) -> Observation {
        let message = result.message.clone().unwrap_or_else(|| format!("{} step finished", step.step_type));
        let status = match result.status {
            BackendStatus::Success => ObservationStatus::Success,
            BackendStatus::Warning => ObservationStatus::Warning,
            BackendStatus::Error => ObservationStatus::Error,
        };
        Observation::new(&step.step_id, status, message, Some(result.data.clone()))
    }

    /// mesh/solve: no warning tier, only success or error.
    fn observe_strict(&self, step: &ExecutionStep, result: &BackendResult) -> Observation {
        match result.status {
            BackendStatus::Success => {
                let message = result.message.clone().unwrap_or_else(|| format!("{} succeeded", step.step_type));
                Observation::new(&step.step_id, ObservationStatus::Success, message, Some(result.data.clone()))
            }
            _ => {
                let message = result.message.clone().unwrap_or_else(|| format!("{} failed", step.step_type));
                Observation::new(&step.step_id, ObservationStatus::Error, message, Some(result.data.clone()))
            }
        }
    }

    fn observe_generic(&self, step: &ExecutionStep, result: &BackendResult) -> Observation {
        let message = result.message.clone().unwrap_or_else(|| format!("step {} finished", step.action));
        let status = if result.status == BackendStatus::Success { ObservationStatus::Success } else { ObservationStatus::Error };
        Observation::new(&step.step_id, status, message, Some(result.data.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raoi::backend::FakeBackend;
    use crate::raoi::types::{StepStatus, StepType};
    use serde_json::Map;

    #[test]
    fn geometry_success_without_artifact_is_a_warning() {
        let backend = FakeBackend::new();
        let observer = Observer::new();
        let step = ExecutionStep::new("s1", StepType::Geometry, "create_geometry", Map::new());
        let result = BackendResult { status: BackendStatus::Success, message: Some("ok".into()), saved_path: Some("missing.mph".into()), data: serde_json::Value::Null };
        let obs = observer.observe(&step, &result, &backend);
        assert_eq!(obs.status, ObservationStatus::Warning);
    }

    #[test]
    fn mesh_warning_from_backend_is_observed_as_error() {
        let backend = FakeBackend::new();
        let observer = Observer::new();
        let mut step = ExecutionStep::new("s1", StepType::Mesh, "generate_mesh", Map::new());
        step.status = StepStatus::Running;
        let result = BackendResult::warning("partial mesh");
        let obs = observer.observe(&step, &result, &backend);
        assert_eq!(obs.status, ObservationStatus::Error);
    }

    #[test]
    fn physics_warning_stays_a_warning() {
        let backend = FakeBackend::new();
        let observer = Observer::new();
        let step = ExecutionStep::new("s1", StepType::Physics, "add_physics", Map::new());
        let result = BackendResult::warning("not implemented");
        let obs = observer.observe(&step, &result, &backend);
        assert_eq!(obs.status, ObservationStatus::Warning);
    }
}
