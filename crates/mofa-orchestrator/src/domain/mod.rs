//! The four domain planners (geometry, material, physics, study), their
//! typed sub-plans, the A2A shared context they communicate through, and
//! the orchestrator that sequences them.

pub mod context;
pub mod geometry;
pub mod material;
pub mod orchestrator;
pub mod physics;
pub mod study;
pub mod types;

pub use context::{AgentType, PlannerSharedContext, PlannerStepRecord, SerialPlan, SerialPlanStep};
pub use geometry::GeometryAgent;
pub use material::{default_material_plan, MaterialAgent};
pub use orchestrator::PlannerOrchestrator;
pub use physics::{default_physics_plan, PhysicsAgent};
pub use study::{default_study_plan, StudyAgent};
pub use types::{
    GeometryOperation, GeometryPlan, GeometryShape, MaterialAssignment, MaterialDefinition, MaterialPlan,
    MaterialProperty, PhysicsField, PhysicsPlan, ShapeType, StudyPlan, StudyType, TaskPlan,
};
