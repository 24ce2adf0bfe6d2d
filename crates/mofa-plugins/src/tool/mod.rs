//! Tool module
//!
//! Provides tool-related functionality for the plugin system.

pub mod adapter;

pub use adapter::{ToolPluginAdapter, adapt_tool};
