//! Agent invokers.

pub mod claude;

pub use claude::ClaudeAgent;
