use std::sync::{Arc, RwLock};
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::types::{HookAction, HookContext, HookDefinition, HookResult, HookTiming};

/// Central registry and dispatcher for all hooks in the system.
///
/// Designed to be cheaply cloneable via Arc — a single HookEngine instance
/// should be shared across the whole process (pass as Arc<HookEngine>).
pub struct HookEngine {
    /// Sorted by priority ascending after every registration.
    hooks: RwLock<Vec<HookDefinition>>,
}

impl HookEngine {
    pub fn new() -> Self {
        Self { hooks: RwLock::new(Vec::new()) }
    }

    /// Register a hook. Re-sorts the list so priority order is always correct.
    pub fn register(&self, hook: HookDefinition) {
        let mut hooks = self.hooks.write().expect("hook registry poisoned");
        hooks.push(hook);
        // Stable sort preserves registration order within the same priority.
        hooks.sort_by_key(|h| h.priority);
        debug!(name = %hooks.last().unwrap().name, "hook registered");
    }

    /// Remove a hook by name. Silent no-op if the name is not found.
    pub fn unregister(&self, name: &str) {
        let mut hooks = self.hooks.write().expect("hook registry poisoned");
        let before = hooks.len();
        hooks.retain(|h| h.name != name);
        if hooks.len() < before {
            debug!(name, "hook unregistered");
        }
    }

    /// Emit an event: run Before hooks (blocking), then After hooks (fire-and-forget).
    ///
    /// Returns the combined result — callers should check `action` to decide
    /// whether to continue or abort their operation.
    pub fn emit(&self, mut ctx: HookContext) -> HookResult {
        let action = self.emit_before(&mut ctx);

        // If a Before hook blocked, skip After hooks — the event never happened.
        if matches!(action, HookAction::Block { .. }) {
            return HookResult { action, duration_ms: 0 };
        }

        self.emit_after(ctx);

        HookResult { action, duration_ms: 0 }
    }

    /// Run all Before hooks in priority order.
    ///
    /// Stops at the first Block. Modify updates the context payload in-place
    /// so subsequent hooks see the mutated version.
    pub fn emit_before(&self, ctx: &mut HookContext) -> HookAction {
        let hooks = self.hooks.read().expect("hook registry poisoned");

        for hook in hooks.iter().filter(|h| h.event == ctx.event && h.timing == HookTiming::Before)
        {
            let t = Instant::now();
            let result = hook.handler.handle(ctx);
            let elapsed_ms = t.elapsed().as_millis() as u64;

            debug!(
                hook = %hook.name,
                duration_ms = elapsed_ms,
                "before hook completed"
            );

            match result.action {
                HookAction::Block { ref reason } => {
                    warn!(hook = %hook.name, reason, "hook blocked event");
                    return result.action;
                }
                HookAction::Modify { ref payload } => {
                    // Propagate payload mutation so the next hook sees updated data.
                    ctx.payload = payload.clone();
                }
                HookAction::Allow => {}
            }
        }

        HookAction::Allow
    }

    /// Spawn all After hooks concurrently — errors are logged, never propagated.
    pub fn emit_after(&self, ctx: HookContext) {
        let hooks = self.hooks.read().expect("hook registry poisoned");

        for hook in hooks.iter().filter(|h| h.event == ctx.event && h.timing == HookTiming::After)
        {
            let ctx_clone = ctx.clone();
            // Clone Arc — cheap pointer bump, not a deep copy of the handler.
            let handler = Arc::clone(&hook.handler);
            let hook_name = hook.name.clone();

            tokio::spawn(async move {
                let t = Instant::now();
                let result = handler.handle(&ctx_clone);
                let elapsed_ms = t.elapsed().as_millis() as u64;

                if let HookAction::Block { reason } = result.action {
                    // After hooks cannot actually block — log the misconfiguration.
                    error!(
                        hook = %hook_name,
                        duration_ms = elapsed_ms,
                        reason,
                        "after hook returned Block — ignored (use Before timing to block)"
                    );
                } else {
                    debug!(hook = %hook_name, duration_ms = elapsed_ms, "after hook completed");
                }
            });
        }
    }
}

impl Default for HookEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HookEvent, HookHandler};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler(Arc<AtomicUsize>);
    impl HookHandler for CountingHandler {
        fn handle(&self, _ctx: &HookContext) -> HookResult {
            self.0.fetch_add(1, Ordering::SeqCst);
            HookResult::allow(0)
        }
    }

    struct BlockingHandler;
    impl HookHandler for BlockingHandler {
        fn handle(&self, _ctx: &HookContext) -> HookResult {
            HookResult::block("no tool calls after 9pm", 0)
        }
    }

    #[test]
    fn before_hook_can_block_the_pipeline() {
        let engine = HookEngine::new();
        engine.register(HookDefinition::new(
            "curfew",
            HookEvent::ToolCall,
            HookTiming::Before,
            Arc::new(BlockingHandler),
        ));

        let action = engine.emit(HookContext::new(HookEvent::ToolCall, serde_json::json!({})));
        assert!(matches!(action.action, HookAction::Block { .. }));
    }

    #[tokio::test]
    async fn after_hooks_run_without_blocking_the_caller() {
        let count = Arc::new(AtomicUsize::new(0));
        let engine = HookEngine::new();
        engine.register(HookDefinition::new(
            "metrics",
            HookEvent::LlmOutput,
            HookTiming::After,
            Arc::new(CountingHandler(Arc::clone(&count))),
        ));

        engine.emit(HookContext::new(HookEvent::LlmOutput, serde_json::json!({})));
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn priority_orders_before_hooks() {
        let engine = HookEngine::new();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        struct RecordingHandler(Arc<std::sync::Mutex<Vec<&'static str>>>, &'static str);
        impl HookHandler for RecordingHandler {
            fn handle(&self, _ctx: &HookContext) -> HookResult {
                self.0.lock().unwrap().push(self.1);
                HookResult::allow(0)
            }
        }

        engine.register(
            HookDefinition::new(
                "second",
                HookEvent::ToolCall,
                HookTiming::Before,
                Arc::new(RecordingHandler(Arc::clone(&order), "second")),
            )
            .with_priority(10),
        );
        engine.register(
            HookDefinition::new(
                "first",
                HookEvent::ToolCall,
                HookTiming::Before,
                Arc::new(RecordingHandler(Arc::clone(&order), "first")),
            )
            .with_priority(0),
        );

        engine.emit_before(&mut HookContext::new(HookEvent::ToolCall, serde_json::json!({})));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }
}
