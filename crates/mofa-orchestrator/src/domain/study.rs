//! Study domain planner — not implemented upstream either; callers treat
//! [`PlannerError::NotImplemented`] as a recoverable condition and fall back
//! to [`default_study_plan`], not a fatal error.

use super::types::StudyPlan;
use crate::error::PlannerError;

pub fn default_study_plan() -> StudyPlan {
    StudyPlan::default()
}

pub struct StudyAgent;

impl StudyAgent {
    pub fn new() -> Self {
        Self
    }

    pub async fn parse(&self, _user_input: &str, _context: Option<&str>) -> Result<StudyPlan, PlannerError> {
        Err(PlannerError::NotImplemented("study planner".to_string()))
    }
}

impl Default for StudyAgent {
    fn default() -> Self {
        Self::new()
    }
}
