//! Per-component error types, aggregated into a crate-level [`CoreError`].

use thiserror::Error;

/// Errors from the event bus. Handlers never propagate errors to `emit`,
/// so this exists only for API symmetry with the other components.
#[derive(Debug, Error)]
pub enum EventBusError {}

#[derive(Debug, Error)]
pub enum SkillStoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("embedding dimension mismatch for skill '{name}': expected {expected}, got {got}")]
    DimensionMismatch {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("skill source error: {0}")]
    Source(String),
}

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    #[error("cannot reach model endpoint {0}")]
    ConnectionError(String),
    #[error("provider '{0}' is not registered")]
    ProviderNotSupported(String),
    #[error("missing credentials for provider '{0}'")]
    MissingCredentials(String),
    #[error("model endpoint returned an empty response")]
    EmptyResponse,
    #[error("model request timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("streaming is not supported by this provider")]
    StreamingNotSupported,
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("template not found: {category}/{name}")]
    NotFound { category: String, name: String },
    #[error("missing variable '{0}' in template")]
    MissingVariable(String),
    #[error("template source error: {0}")]
    Source(String),
}

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("unknown agent type: {0}")]
    UnknownAgentType(String),
    #[error("failed to parse JSON from model reply: {0}")]
    ParseError(String),
    #[error("plan failed schema validation: {0}")]
    SchemaError(String),
    #[error("planner not implemented: {0}")]
    NotImplemented(String),
    #[error(transparent)]
    Gateway(#[from] LlmGatewayError),
}

#[derive(Debug, Error)]
pub enum RaoiError {
    #[error("task did not complete within {0} iterations")]
    MaxIterationsReached(usize),
    #[error("task failed: {0}")]
    Fatal(String),
    #[error("unknown action: {0}")]
    UnknownAction(String),
    #[error(transparent)]
    Gateway(#[from] LlmGatewayError),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("I/O error persisting session state: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialize session state: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing required field '{0}'")]
    MissingField(String),
    #[error("stdin must not be a TTY")]
    StdinIsTty,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Crate-level aggregate error. Every component error converts into this
/// via `?`, matching how `mofa-foundation`'s modules compose their own
/// per-module error enums.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    SkillStore(#[from] SkillStoreError),
    #[error(transparent)]
    LlmGateway(#[from] LlmGatewayError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Planner(#[from] PlannerError),
    #[error(transparent)]
    Raoi(#[from] RaoiError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type CoreResult<T> = Result<T, CoreError>;
