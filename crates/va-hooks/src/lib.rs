//! Ambient observability hook engine: before/after interception points around
//! LLM calls, tool execution, and booking outcomes, feature-gated behind
//! `hooks` in crates that want to emit events without a hard dependency.

pub mod engine;
pub mod error;
pub mod types;

pub use engine::HookEngine;
pub use error::{HookError, Result};
pub use types::{HookAction, HookContext, HookDefinition, HookEvent, HookHandler, HookResult, HookTiming};
