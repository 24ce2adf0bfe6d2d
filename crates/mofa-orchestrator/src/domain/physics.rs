//! Physics domain planner — not implemented upstream either; callers treat
//! [`PlannerError::NotImplemented`] as a recoverable condition and fall back
//! to [`default_physics_plan`], not a fatal error.

use super::types::PhysicsPlan;
use crate::error::PlannerError;

pub fn default_physics_plan() -> PhysicsPlan {
    PhysicsPlan::default()
}

pub struct PhysicsAgent;

impl PhysicsAgent {
    pub fn new() -> Self {
        Self
    }

    pub async fn parse(&self, _user_input: &str, _context: Option<&str>) -> Result<PhysicsPlan, PlannerError> {
        Err(PlannerError::NotImplemented("physics planner".to_string()))
    }
}

impl Default for PhysicsAgent {
    fn default() -> Self {
        Self::new()
    }
}
