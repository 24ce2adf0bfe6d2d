// context module
pub mod context;

// plugin module
pub mod plugin;
pub use plugin::*;

// bus module
pub mod bus;
pub use bus::*;

// logging module
pub mod logging;

// error module
pub mod error;


// core module
pub mod core;
pub use core::*;

// message module
pub mod message;

// Agent Framework (统一 Agent 框架)
pub mod agent;

// Unified Configuration System (统一配置系统)
pub mod config;

// Storage traits (存储接口)
pub mod storage;
pub use storage::Storage;

// RAG traits and types (vector store, document chunks)
pub mod rag;
