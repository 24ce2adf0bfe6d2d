//! Per-session turn orchestration and file-based conversation memory.

pub mod agents;
pub mod context;
pub mod orchestrator;
pub mod types;

pub use agents::{QaAgent, SummaryAgent};
pub use context::{get_all_models_from_context, SessionContext};
pub use orchestrator::{CoreServices, SessionOrchestrator, SessionOrchestratorBuilder};
pub use types::{ConversationEntry, ContextSummary, RecentModel, SessionStats};
