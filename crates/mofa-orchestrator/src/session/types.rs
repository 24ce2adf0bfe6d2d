//! Per-session persisted records: conversation history entries and the
//! rolling context summary derived from them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    #[serde(default)]
    pub plan: Option<Value>,
    #[serde(default)]
    pub model_path: Option<String>,
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ConversationEntry {
    pub fn new(user_input: impl Into<String>, plan: Option<Value>, model_path: Option<String>, success: bool, error: Option<String>) -> Self {
        Self { timestamp: Utc::now(), user_input: user_input.into(), plan, model_path, success, error }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextSummary {
    pub summary: String,
    pub last_updated: DateTime<Utc>,
    pub total_conversations: usize,
    #[serde(default)]
    pub recent_shapes: Vec<String>,
    #[serde(default)]
    pub preferences: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub total_conversations: usize,
    pub successful: usize,
    pub failed: usize,
    pub summary: String,
    pub recent_shapes: Vec<String>,
    pub preferences: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentModel {
    pub path: String,
    pub title: String,
    pub timestamp: DateTime<Utc>,
    pub is_latest: bool,
}
