//! Matches a query against loaded skills and injects their instructions as
//! implicit knowledge into a prompt: vector search first, trigger/tag
//! substring matching as a fallback, first-K skills as a last resort.

use super::loader::SkillLoader;
use super::store::SkillStore;

pub const MARKER: &str = "=== RELEVANT SKILLS ===";

pub struct SkillInjector {
    loader: SkillLoader,
    store: Option<SkillStore>,
    top_k: usize,
    last_used: Vec<String>,
}

impl SkillInjector {
    pub fn new(loader: SkillLoader, store: Option<SkillStore>, top_k: usize) -> Self {
        Self {
            loader,
            store,
            top_k: top_k.max(1),
            last_used: Vec::new(),
        }
    }

    /// Vector search first (if a store is configured and has embeddings),
    /// then trigger/tag matching, then the first `top_k` skills loaded.
    fn skills_block(&mut self, query: &str) -> String {
        self.last_used.clear();

        if let Some(store) = &self.store {
            if !query.is_empty() {
                let _ = store.ensure_indexed(&self.loader.list_skills().into_iter().cloned().collect::<Vec<_>>());
                if let Ok(hits) = store.search(query, self.top_k) {
                    let mut parts = Vec::new();
                    for (name, content, _distance) in hits {
                        if !content.is_empty() && !self.last_used.contains(&name) {
                            parts.push(content);
                            self.last_used.push(name);
                        }
                    }
                    if !parts.is_empty() {
                        return parts.join("\n\n");
                    }
                }
            }
        }

        let mut matched = self.loader.get_skills_by_triggers(query);
        if matched.is_empty() {
            matched = self.loader.list_skills();
        }
        matched.truncate(self.top_k);
        if matched.is_empty() {
            return String::new();
        }

        self.last_used = matched.iter().map(|s| s.name.clone()).collect();
        matched
            .iter()
            .filter(|s| !s.instructions.trim().is_empty())
            .map(|s| s.instructions.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Appends the matched skill block after `system_prompt`, unchanged if
    /// nothing matched.
    pub fn inject(&mut self, query: &str, system_prompt: &str) -> String {
        let block = self.skills_block(query);
        if block.is_empty() {
            return system_prompt.to_string();
        }
        format!("{system_prompt}\n\n{MARKER}\n{block}")
    }

    /// Prepends the matched skill block before `user_prompt`, for providers
    /// that only accept a single combined message.
    pub fn inject_into_prompt(&mut self, query: &str, user_prompt: &str) -> String {
        let block = self.skills_block(query);
        if block.is_empty() {
            return user_prompt.to_string();
        }
        format!("{MARKER}\n{block}\n\n---\n\n{user_prompt}")
    }

    pub fn last_used_skills(&self) -> &[String] {
        &self.last_used
    }
}
