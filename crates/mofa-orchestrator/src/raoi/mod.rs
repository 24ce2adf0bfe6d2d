//! The Reason-Act-Observe-Iterate controller: executes a task plan against
//! a [`Backend`] step by step, observing outcomes and repairing the plan
//! when a step fails.

pub mod backend;
pub mod controller;
pub mod observer;
pub mod types;

pub use backend::{Backend, BackendResult, BackendStatus, FakeBackend};
pub use controller::{build_initial_plan, expand_steps_from_task_plan, RaoiController};
pub use observer::Observer;
pub use types::{
    CheckpointStatus, CheckpointType, ExecutionStep, IterationRecord, Observation, ObservationStatus, ReActTaskPlan,
    ReasoningCheckpoint, StepStatus, StepType, TaskStatus,
};
