//! Layered settings for the orchestration core.
//!
//! Loading settings from an actual config file on disk is out of scope for
//! this crate (see the top-level spec's Non-goals); what's here is the
//! typed `Settings` struct, its defaults, and a thin layering helper built
//! on `mofa_kernel::config` the way the rest of the workspace uses it.

use mofa_kernel::config::{ConfigResult, from_str};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub llm_backend: String,
    pub api_keys: HashMap<String, String>,
    pub base_urls: HashMap<String, String>,
    pub ollama_url: String,
    pub context_root: String,
    pub skills_root: String,
    pub skills_db_path: String,
    pub embedding_dim: usize,
    pub max_history_entries: usize,
    pub max_raoi_iterations: usize,
    pub planner_temperature: f32,
    pub router_temperature: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            llm_backend: "ollama".to_string(),
            api_keys: HashMap::new(),
            base_urls: HashMap::new(),
            ollama_url: "http://localhost:11434".to_string(),
            context_root: ".context".to_string(),
            skills_root: "skills".to_string(),
            skills_db_path: "data/skills.db".to_string(),
            embedding_dim: 384,
            max_history_entries: 100,
            max_raoi_iterations: 10,
            planner_temperature: 0.1,
            router_temperature: 0.0,
        }
    }
}

impl Settings {
    pub fn get_api_key_for_backend(&self, backend: &str) -> Option<String> {
        self.api_keys.get(backend).cloned()
    }

    pub fn get_base_url_for_backend(&self, backend: &str) -> Option<String> {
        self.base_urls.get(backend).cloned()
    }

    /// Layer a TOML/YAML/JSON fragment (already read from wherever the host
    /// loads its config) on top of these defaults.
    pub fn merged_with(&self, override_content: &str, format: mofa_kernel::config::FileFormat) -> ConfigResult<Settings> {
        let base = serde_json::to_string(self).expect("Settings always serializes");
        let base_format = mofa_kernel::config::FileFormat::Json;
        mofa_kernel::config::merge_configs(&[(base.as_str(), base_format), (override_content, format)])
    }
}

/// Convenience: parse a standalone settings fragment (for hosts that already
/// read the file bytes themselves).
pub fn settings_from_str(content: &str, format: mofa_kernel::config::FileFormat) -> ConfigResult<Settings> {
    from_str(content, format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let s = Settings::default();
        assert_eq!(s.embedding_dim, 384);
        assert_eq!(s.max_history_entries, 100);
        assert_eq!(s.max_raoi_iterations, 10);
    }

    #[test]
    fn merge_overrides_port_like_field() {
        let base = Settings::default();
        let merged = base
            .merged_with(r#"{"max_raoi_iterations": 20}"#, mofa_kernel::config::FileFormat::Json)
            .unwrap();
        assert_eq!(merged.max_raoi_iterations, 20);
        assert_eq!(merged.embedding_dim, 384);
    }
}
