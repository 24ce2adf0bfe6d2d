//! Orchestration core for a natural-language-driven modeling agent: router,
//! planner orchestrator, RAOI controller, session memory, and the bridge
//! adapter that drives them from line-delimited JSON on stdio.

// error module - per-component error enums plus the crate-level aggregate
pub mod error;

// config module - layered Settings
pub mod config;

// event bus - type-tagged synchronous publish/subscribe
pub mod events;

// JSON extraction from LLM replies
pub mod json_extract;

// LLM gateway - provider trait, registry, retrying call wrapper
pub mod llm_gateway;

// prompt registry - category/name addressed templates
pub mod prompt_registry;

// skill loader, store and injector
pub mod skills;

// domain planners and their typed sub-plans
pub mod domain;

// intent classification - qa vs technical
pub mod router;

// RAOI controller - plan/step/observation/iteration types and the main loop
pub mod raoi;

// session orchestrator and per-session persisted memory
pub mod session;

// bridge adapter - line-delimited JSON over stdio
pub mod bridge;

pub use error::{CoreError, CoreResult};
pub use events::{Event, EventBus, EventType, Handler};
pub use llm_gateway::{LlmConfig, LlmGateway, LlmProvider, LlmRegistry};
pub use prompt_registry::PromptManager;
pub use router::{RouteResult, Router};
pub use session::{CoreServices, SessionContext, SessionOrchestrator, SessionOrchestratorBuilder};
