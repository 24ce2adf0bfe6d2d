//! Bridge binary: wires a `Settings`-configured LLM gateway, prompt registry,
//! and in-process fake simulation backend into a [`Bridge`] and drives it
//! over stdio. The only place in this crate that initializes a `tracing`
//! subscriber — library modules only emit through the ambient subscriber a
//! host installs.

use mofa_orchestrator::bridge::{serve, Bridge};
use mofa_orchestrator::config::Settings;
use mofa_orchestrator::llm_gateway::{LlmConfig, LlmGateway, LlmRegistry};
use mofa_orchestrator::prompt_registry::PromptManager;
use mofa_orchestrator::raoi::{Backend, FakeBackend};
use mofa_orchestrator::session::CoreServices;
use mofa_orchestrator::skills::{SkillInjector, SkillLoader, SkillStore};
use std::io::{self, BufReader, IsTerminal, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Builds the skill injector from `settings.skills_root`/`skills_db_path`.
/// No embedding model is linked into this binary (out of scope, like the
/// native COMSOL backend), so the injector runs on trigger/tag matching
/// alone; an embedder-backed `SkillStore` is available to embedders that
/// link this crate as a library instead of running this binary.
fn build_skills(settings: &Settings) -> Arc<Mutex<SkillInjector>> {
    let loader = SkillLoader::new(vec![PathBuf::from(&settings.skills_root)]);
    let store = match SkillStore::open(std::path::Path::new(&settings.skills_db_path), settings.embedding_dim, None) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!(error = %e, path = %settings.skills_db_path, "failed to open skill store, falling back to trigger matching only");
            None
        }
    };
    Arc::new(Mutex::new(SkillInjector::new(loader, store, 3)))
}

fn settings_from_env() -> Settings {
    let mut settings = Settings::default();
    if let Ok(backend) = std::env::var("COMSOL_AGENT_LLM_BACKEND") {
        settings.llm_backend = backend;
    }
    if let Ok(url) = std::env::var("COMSOL_AGENT_OLLAMA_URL") {
        settings.ollama_url = url;
    }
    if let Ok(root) = std::env::var("COMSOL_AGENT_CONTEXT_ROOT") {
        settings.context_root = root;
    }
    if let Ok(n) = std::env::var("COMSOL_AGENT_MAX_HISTORY_ENTRIES") {
        if let Ok(n) = n.parse() {
            settings.max_history_entries = n;
        }
    }
    settings
}

fn build_gateway(settings: &Settings) -> Option<Arc<LlmGateway>> {
    let registry = LlmRegistry::with_builtins();
    let config = match settings.llm_backend.as_str() {
        "ollama" => {
            let mut config = LlmConfig::ollama("llama3");
            config.base_url = Some(settings.ollama_url.clone());
            config
        }
        other => {
            error!(backend = other, "unsupported llm_backend for the bridge binary, falling back to ollama");
            LlmConfig::ollama("llama3")
        }
    };
    match registry.create(&config) {
        Ok(provider) => Some(Arc::new(LlmGateway::new(provider))),
        Err(e) => {
            error!(error = %e, "failed to construct llm provider");
            None
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("mofa_orchestrator=info".parse().unwrap()))
        .init();

    if io::stdin().is_terminal() {
        eprintln!("bridge: stdin must not be a TTY; pipe line-delimited JSON requests in");
        std::process::exit(1);
    }

    let settings = settings_from_env();
    let Some(gateway) = build_gateway(&settings) else {
        std::process::exit(1);
    };
    let prompts = Arc::new(PromptManager::new());
    let backend: Arc<dyn Backend> = Arc::new(FakeBackend::new());
    let skills = build_skills(&settings);

    let services = CoreServices::new(gateway, prompts, backend).with_skills(skills);
    let bridge = Bridge::from_services(services, settings.context_root.clone(), settings.max_history_entries);

    let stdout = Arc::new(Mutex::new(io::stdout()));
    let stdin = BufReader::new(io::stdin());

    info!(context_root = %settings.context_root, "bridge ready");
    if let Err(e) = serve(&bridge, stdin, stdout).await {
        error!(error = %e, "bridge loop exited with an error");
        let mut stderr = io::stderr();
        let _ = writeln!(stderr, "bridge: {e}");
        std::process::exit(1);
    }
}
