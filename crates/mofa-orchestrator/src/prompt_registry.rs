//! Named `category/name` prompt templates with variable substitution and an
//! inline fallback set, layered on top of `mofa_foundation::prompt::PromptRegistry`
//! (same `{var}`-placeholder template engine, addressed by a flat id here
//! built as `"{category}/{name}"`).

use crate::error::PromptError;
use mofa_foundation::prompt::{PromptRegistry as InnerRegistry, PromptTemplate};
use std::collections::HashMap;

pub struct PromptManager {
    inner: InnerRegistry,
    defaults: HashMap<(&'static str, &'static str), &'static str>,
}

impl Default for PromptManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptManager {
    pub fn new() -> Self {
        Self {
            inner: InnerRegistry::new(),
            defaults: builtin_defaults(),
        }
    }

    pub fn register(&mut self, category: &str, name: &str, content: impl Into<String>) {
        let id = format!("{category}/{name}");
        self.inner.register(PromptTemplate::new(id, content));
    }

    /// Load every template defined in a YAML document (`templates:` list of
    /// `{id, content, ...}` in the teacher's schema, `id` expected to already
    /// be in `category/name` form).
    pub fn load_from_yaml(&mut self, yaml: &str) -> Result<(), PromptError> {
        self.inner
            .load_from_yaml(yaml)
            .map_err(|e| PromptError::Source(e.to_string()))
    }

    pub fn format(&self, category: &str, name: &str, vars: &[(&str, &str)]) -> Result<String, PromptError> {
        let id = format!("{category}/{name}");
        if self.inner.contains(&id) {
            return self
                .inner
                .render(&id, vars)
                .map_err(|e| PromptError::Source(e.to_string()));
        }

        let template = self
            .defaults
            .get(&(category, name))
            .copied()
            .ok_or_else(|| PromptError::NotFound {
                category: category.to_string(),
                name: name.to_string(),
            })?;

        Ok(substitute(template, vars))
    }
}

/// The same brace-substitution rule as `PromptTemplate::render`: `{var}` is
/// replaced if present in `vars`, `{{`/`}}` are literal braces.
fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let map: HashMap<&str, &str> = vars.iter().copied().collect();
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                for nc in chars.by_ref() {
                    if nc == '}' {
                        break;
                    }
                    name.push(nc);
                }
                if let Some(value) = map.get(name.as_str()) {
                    out.push_str(value);
                } else {
                    out.push('{');
                    out.push_str(&name);
                    out.push('}');
                }
            }
            other => out.push(other),
        }
    }

    out
}

fn builtin_defaults() -> HashMap<(&'static str, &'static str), &'static str> {
    let mut m = HashMap::new();
    m.insert(
        ("router", "classify"),
        "Classify the following user message as exactly one word, `qa` or `technical`, and output nothing else.\n\nMessage: {user_input}",
    );
    m.insert(
        ("planner", "orchestrator_decompose"),
        "Decompose the following modeling request into an ordered JSON list of steps. \
         Each step has \"agent_type\" (one of geometry, material, physics, study) and \
         \"input\" (the relevant fragment of the request). Output JSON only.\n\nRequest: {user_input}",
    );
    m.insert(
        ("planner", "geometry_planner"),
        "Produce a JSON geometry plan (model_name, units, dimension, shapes, operations) \
         for the following request. Output JSON only.\n\nRequest: {user_input}",
    );
    m.insert(
        ("planner", "material_planner"),
        "Produce a JSON material plan (materials, assignments) for the following request. \
         Output JSON only.\n\nRequest: {user_input}",
    );
    m.insert(
        ("planner", "physics_planner"),
        "Produce a JSON physics plan for the following request. Output JSON only.\n\nRequest: {user_input}",
    );
    m.insert(
        ("planner", "study_planner"),
        "Produce a JSON study plan for the following request. Output JSON only.\n\nRequest: {user_input}",
    );
    m.insert(
        ("react", "reasoning"),
        "Given the user's modeling request, determine task_type (one of geometry, physics, \
         study, full) and the required_steps. Output JSON only.\n\nRequest: {user_input}",
    );
    m.insert(
        ("raoi", "rollback_and_inject"),
        "A COMSOL solve/study step just failed, and the error suggests an earlier step (material \
         or physics) was left incomplete. Propose a rollback target and repair input.\n\n\
         Error: {error_message}\n\nExecution steps (type, action): {steps}\n\n\
         Return exactly one JSON object and nothing else:\n\
         {{\"rollback_action\": \"add_material or add_physics\", \"reason\": \"short reason\", \
         \"material_input\": \"repair description if rolling back to add_material\", \
         \"physics_input\": \"repair description if rolling back to add_physics\"}}\n\
         If no rollback target can be determined, set rollback_action to \"solve\".",
    );
    m.insert(
        ("raoi", "refine_plan"),
        "The execution of a COMSOL modeling task hit a problem. Propose a concrete, actionable \
         adjustment — do not just restate the request.\n\n\
         Error/observation: {error_message}\n\n\
         Model: {model_name}\nOriginal request: {user_input}\n\
         Current step: {current_step}\nSteps: {steps}\n\n\
         Return exactly one JSON object:\n\
         {{\"suggested_changes\": \"short description\", \"skip_current\": false, \
         \"modified_steps\": [{{\"step_id\": \"step_2\", \"parameters\": {{}}}}], \"new_steps\": []}}",
    );
    m.insert(
        ("qa", "answer"),
        "{system_prompt}\n\n{context}\n\n{user_input}",
    );
    m.insert(
        ("summary", "summarize"),
        "{system_prompt}\n\n{execution_info}",
    );
    m.insert(
        ("raoi", "understand_requirement"),
        "Analyse the following COMSOL modeling request and identify the required steps.\n\n\
         Request: {user_input}\nMemory: {memory_context}\n\n\
         Return JSON with task_type (one of geometry, physics, study, full), required_steps \
         (a list of action names among create_geometry, add_material, add_physics, generate_mesh, \
         configure_study, solve), and parameters (a map of relevant inputs).",
    );
    m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_builtin_default_when_unregistered() {
        let manager = PromptManager::new();
        let rendered = manager
            .format("router", "classify", &[("user_input", "hello")])
            .unwrap();
        assert!(rendered.contains("hello"));
    }

    #[test]
    fn registered_template_overrides_default() {
        let mut manager = PromptManager::new();
        manager.register("router", "classify", "Custom: {user_input}");
        let rendered = manager
            .format("router", "classify", &[("user_input", "hi")])
            .unwrap();
        assert_eq!(rendered, "Custom: hi");
    }

    #[test]
    fn missing_template_and_default_errors() {
        let manager = PromptManager::new();
        let err = manager.format("nope", "nope", &[]).unwrap_err();
        assert!(matches!(err, PromptError::NotFound { .. }));
    }

    #[test]
    fn literal_braces_are_preserved() {
        let rendered = substitute("use {{literal}} braces, {var}", &[("var", "x")]);
        assert_eq!(rendered, "use {literal} braces, x");
    }
}
