//! Call Session Orchestrator (C12) — the per-call state machine that
//! interleaves inbound audio, STT transcripts, streamed LLM output, tool
//! execution, and synthesized speech on one `/media-stream` socket.
//!
//! Everything here runs on a single task per call: history mutation, the
//! TTS live session, and the in-flight LLM stream are all single-writer by
//! construction because only this task ever touches them.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::time::Instant;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use va_core::types::{CallStatus, MetricPoint, Tenant, TenantId, TurnRole};
use va_hooks::{HookContext, HookEvent};
use va_llm::prompt::BookingContext;
use va_llm::stream::{BlockDelta, BlockKind, LlmStreamEvent};
use va_llm::types::{ContentBlock, HistoryMessage, HistoryRole, ToolDefinition};
use va_protocol::frames::MediaStreamFrame;
use va_stt::SttEvent;
use va_tools::{to_definitions, Tool, ToolResult, VOICEMAIL_SENTINEL};
use va_tts::TtsSessionHandle;

use crate::app::AppState;
use crate::ws::outbound::OutboundHandle;

const RING_BUFFER_CAP: usize = 64;
const MAX_LLM_RETRIES: u32 = 2;
const BARGE_IN_WORD_COUNT: usize = 4;
const BARGE_IN_CONFIDENCE: f64 = 0.8;
const GRACE_CLOSE_SECS: u64 = 3;

/// Lightweight handle registered in `AppState::active_calls` so an HTTP
/// path can observe or abort an in-flight call.
#[derive(Clone)]
pub struct ActiveCall {
    pub cancel: CancellationToken,
    pub tenant_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CallState {
    Greeting,
    Conversation,
    ToolWait,
    Confirmation,
    Terminated,
}

enum BlockAcc {
    Text(String),
    Tool { id: String, name: String, json: String },
}

struct CallCtx {
    tenant_id: String,
    call_sid: String,
    history: Vec<HistoryMessage>,
    call_state: CallState,
    ai_speaking: bool,
    cancel_pending: bool,
    tts_session: Option<TtsSessionHandle>,
    pending_turns: VecDeque<(TurnRole, String)>,
    llm_retry_count: u32,
    fallback_level: u8,
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn is_barge_in(confidence: Option<f64>, words: usize) -> bool {
    words >= BARGE_IN_WORD_COUNT || confidence.unwrap_or(0.0) >= BARGE_IN_CONFIDENCE
}

fn flush_ring_buffer(state: &AppState, ctx: &mut CallCtx) {
    while let Some((role, content)) = ctx.pending_turns.front().cloned() {
        if state.store.append_turn(&ctx.tenant_id, &ctx.call_sid, role, &content).is_ok() {
            ctx.pending_turns.pop_front();
        } else {
            break;
        }
    }
}

fn persist_turn_best_effort(state: &AppState, ctx: &mut CallCtx, role: TurnRole, content: &str) {
    flush_ring_buffer(state, ctx);
    if let Err(err) = state.store.append_turn(&ctx.tenant_id, &ctx.call_sid, role, content) {
        warn!(%err, tenant_id = %ctx.tenant_id, call_sid = %ctx.call_sid, "turn persistence failed, buffering");
        if ctx.pending_turns.len() >= RING_BUFFER_CAP {
            ctx.pending_turns.pop_front();
        }
        ctx.pending_turns.push_back((role, content.to_string()));
    }
}

fn record_metric(state: &AppState, tenant_id: &str, name: &str, value: f64, metadata: Option<Value>) {
    let point = MetricPoint {
        tenant_id: Some(TenantId(tenant_id.to_string())),
        name: name.to_string(),
        value,
        metadata,
        timestamp: chrono::Utc::now(),
    };
    if let Err(err) = state.store.record_metric(tenant_id, &point) {
        warn!(%err, tenant_id, name, "failed to record call metric");
    }
}

fn persist_status_best_effort(
    state: &AppState,
    tenant_id: &str,
    call_sid: &str,
    status: CallStatus,
    duration_secs: Option<u32>,
    error_text: Option<&str>,
) {
    if let Err(err) = state.store.update_call_status(tenant_id, call_sid, status, duration_secs, error_text) {
        warn!(%err, tenant_id, call_sid, "failed to update call status");
    }
}

/// Queues speech through the live TTS session if one is open, else
/// synthesizes and plays it one-shot. Used for short scripted utterances
/// (re-asks, apologies) that don't need low-latency streaming.
async fn speak_one_shot(state: &AppState, outbound: &OutboundHandle, text: &str) {
    match state.tts.synthesize(text).await {
        Ok(audio) => outbound.send_media(audio),
        Err(err) => warn!(%err, "one-shot synthesis failed"),
    }
}

async fn handle_barge_in(state: &AppState, ctx: &mut CallCtx, outbound: &OutboundHandle, llm_stream: &mut Option<ReceiverStream<LlmStreamEvent>>) {
    if !ctx.ai_speaking && llm_stream.is_none() {
        return;
    }
    outbound.send_clear();
    if let Some(tts) = ctx.tts_session.take() {
        drop(tts);
    }
    *llm_stream = None;
    ctx.ai_speaking = false;
    ctx.cancel_pending = true;
    ctx.tts_session = state.tts.open_session(outbound.as_tts_callback()).await.ok();
}

async fn start_llm_stream(
    state: &AppState,
    ctx: &mut CallCtx,
    booking_context: &BookingContext,
    tool_defs: &[ToolDefinition],
) -> Option<ReceiverStream<LlmStreamEvent>> {
    ctx.cancel_pending = false;
    state.hooks.emit(
        HookContext::new(
            HookEvent::LlmInput,
            serde_json::json!({ "model": state.llm.name(), "message_count": ctx.history.len() }),
        )
        .with_tenant(TenantId(ctx.tenant_id.clone()))
        .with_call_sid(ctx.call_sid.clone()),
    );
    match state.llm.generate_stream(&ctx.history, booking_context, tool_defs).await {
        Ok(stream) => Some(stream),
        Err(err) => {
            warn!(%err, tenant_id = %ctx.tenant_id, call_sid = %ctx.call_sid, "failed to open LLM stream");
            None
        }
    }
}

/// Applies history pruning (4.12.6): keep messages mentioning an identity
/// token plus the most recent `KEEP_RECENT` entries.
fn prune_history(history: &mut Vec<HistoryMessage>) {
    let max = va_core::config::DEFAULT_MAX_HISTORY;
    let keep_recent = va_core::config::DEFAULT_KEEP_RECENT;
    if history.len() <= max {
        return;
    }
    let cutoff = history.len().saturating_sub(keep_recent);
    let mut keep: Vec<bool> = (0..history.len())
        .map(|i| i >= cutoff || history[i].mentions_identity_token())
        .collect();

    // A tool_use and its paired tool_result must survive pruning together
    // (§5 ordering guarantee (b) / P3): cutting one but not the other
    // leaves a dangling tool_use or an orphaned tool_result in history,
    // which providers reject on the next turn.
    for i in 0..history.len() {
        if !keep[i] {
            continue;
        }
        for block in &history[i].content {
            let partner = match block {
                ContentBlock::ToolUse { id, .. } => history.iter().position(|m| {
                    m.content
                        .iter()
                        .any(|b| matches!(b, ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == id))
                }),
                ContentBlock::ToolResult { tool_use_id, .. } => history.iter().position(|m| {
                    m.content
                        .iter()
                        .any(|b| matches!(b, ContentBlock::ToolUse { id, .. } if id == tool_use_id))
                }),
                ContentBlock::Text { .. } => None,
            };
            if let Some(j) = partner {
                keep[j] = true;
            }
        }
    }

    let mut idx = 0;
    history.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

async fn graduated_fallback(state: &AppState, ctx: &mut CallCtx, outbound: &OutboundHandle) -> bool {
    ctx.fallback_level = ctx.fallback_level.saturating_add(1);
    record_metric(
        state,
        &ctx.tenant_id,
        "fallback_triggered",
        1.0,
        Some(serde_json::json!({ "level": ctx.fallback_level })),
    );
    persist_status_best_effort(state, &ctx.tenant_id, &ctx.call_sid, CallStatus::InProgress, None, Some("fallback_triggered"));

    match ctx.fallback_level {
        1 => {
            speak_one_shot(state, outbound, "I'm sorry, I'm having trouble understanding. Could you say that again?").await;
            false
        }
        2 => {
            warn!(tenant_id = %ctx.tenant_id, call_sid = %ctx.call_sid, "fallback level 2: SMS handoff would be sent to business owner");
            speak_one_shot(state, outbound, "I'm sorry for the trouble. I've notified our team and they'll follow up with you shortly.").await;
            false
        }
        _ => {
            speak_one_shot(state, outbound, "I'm sorry, I'm unable to continue this call right now. Please try again later. Goodbye.").await;
            true
        }
    }
}

/// Executes one tool call and returns its result plus any side-effect
/// state transition the orchestrator should apply.
async fn execute_tool(state: &AppState, ctx: &CallCtx, tools: &[Box<dyn Tool>], name: &str, input: Value) -> ToolResult {
    state.hooks.emit(
        HookContext::new(HookEvent::ToolCall, serde_json::json!({ "tool_name": name, "input": input }))
            .with_tenant(TenantId(ctx.tenant_id.clone()))
            .with_call_sid(ctx.call_sid.clone()),
    );
    let started = Instant::now();
    let result = match tools.iter().find(|t| t.name() == name) {
        Some(tool) => tool.execute(input).await,
        None => ToolResult::error(format!("unknown tool: {name}")),
    };
    state.hooks.emit(
        HookContext::new(
            HookEvent::ToolResult,
            serde_json::json!({
                "tool_name": name,
                "is_error": result.is_error,
                "duration_ms": started.elapsed().as_millis() as u64,
            }),
        )
        .with_tenant(TenantId(ctx.tenant_id.clone()))
        .with_call_sid(ctx.call_sid.clone()),
    );
    if name == "book_appointment" {
        let event = if result.is_error { HookEvent::BookingFailed } else { HookEvent::BookingCreated };
        state.hooks.emit(
            HookContext::new(event, serde_json::json!({ "reason": result.content.clone() }))
                .with_tenant(TenantId(ctx.tenant_id.clone()))
                .with_call_sid(ctx.call_sid.clone()),
        );
        record_metric(state, &ctx.tenant_id, if result.is_error { "booking_failed" } else { "booking_success" }, 1.0, None);
    }
    result
}

#[allow(clippy::too_many_arguments)]
async fn handle_llm_event(
    state: &AppState,
    ctx: &mut CallCtx,
    outbound: &OutboundHandle,
    tools: &[Box<dyn Tool>],
    booking_context: &BookingContext,
    tool_defs: &[ToolDefinition],
    blocks: &mut HashMap<u32, BlockAcc>,
    assistant_content: &mut Vec<ContentBlock>,
    event: LlmStreamEvent,
    llm_stream: &mut Option<ReceiverStream<LlmStreamEvent>>,
) -> bool {
    match event {
        LlmStreamEvent::MessageStart => {}
        LlmStreamEvent::ContentBlockStart { index, kind } => {
            let acc = match kind {
                BlockKind::Text => BlockAcc::Text(String::new()),
                BlockKind::ToolUse { id, name } => BlockAcc::Tool { id, name, json: String::new() },
            };
            blocks.insert(index, acc);
        }
        LlmStreamEvent::ContentBlockDelta { index, delta } => match (blocks.get_mut(&index), delta) {
            (Some(BlockAcc::Text(text)), BlockDelta::TextDelta(chunk)) => {
                text.push_str(&chunk);
                ctx.ai_speaking = true;
                if let Some(tts) = ctx.tts_session.as_ref() {
                    let _ = tts.send(chunk);
                }
            }
            (Some(BlockAcc::Tool { json, .. }), BlockDelta::InputJsonDelta(chunk)) => {
                json.push_str(&chunk);
            }
            _ => {}
        },
        LlmStreamEvent::ContentBlockStop { index } => {
            if let Some(acc) = blocks.remove(&index) {
                match acc {
                    BlockAcc::Text(text) => assistant_content.push(ContentBlock::Text { text }),
                    BlockAcc::Tool { id, name, json } => {
                        let input: Value = serde_json::from_str(&json).unwrap_or(Value::Null);
                        assistant_content.push(ContentBlock::ToolUse { id, name, input });
                    }
                }
            }
        }
        LlmStreamEvent::Usage(usage) => {
            record_metric(state, &ctx.tenant_id, "tokens_input", usage.input_tokens as f64, None);
            record_metric(state, &ctx.tenant_id, "tokens_output", usage.output_tokens as f64, None);
            state.hooks.emit(
                HookContext::new(
                    HookEvent::LlmOutput,
                    serde_json::json!({ "model": state.llm.name(), "tokens_in": usage.input_tokens, "tokens_out": usage.output_tokens }),
                )
                .with_tenant(TenantId(ctx.tenant_id.clone()))
                .with_call_sid(ctx.call_sid.clone()),
            );
        }
        LlmStreamEvent::Error(msg) => {
            warn!(tenant_id = %ctx.tenant_id, call_sid = %ctx.call_sid, %msg, "LLM stream error");
            state.hooks.emit(
                HookContext::new(HookEvent::LlmError, serde_json::json!({ "model": state.llm.name(), "error": msg }))
                    .with_tenant(TenantId(ctx.tenant_id.clone()))
                    .with_call_sid(ctx.call_sid.clone()),
            );
            *llm_stream = None;
            if ctx.llm_retry_count < MAX_LLM_RETRIES {
                ctx.llm_retry_count += 1;
                *llm_stream = start_llm_stream(state, ctx, booking_context, tool_defs).await;
            } else {
                ctx.llm_retry_count = 0;
                let should_close = graduated_fallback(state, ctx, outbound).await;
                return should_close;
            }
        }
        LlmStreamEvent::MessageStop => {
            let tool_uses: Vec<(String, String, Value)> = assistant_content
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::ToolUse { id, name, input } => Some((id.clone(), name.clone(), input.clone())),
                    _ => None,
                })
                .collect();

            if !assistant_content.is_empty() {
                let text: String = assistant_content
                    .iter()
                    .filter_map(|b| match b {
                        ContentBlock::Text { text } => Some(text.clone()),
                        _ => None,
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                ctx.history.push(HistoryMessage {
                    role: HistoryRole::Assistant,
                    content: std::mem::take(assistant_content),
                });
                if !text.is_empty() {
                    persist_turn_best_effort(state, ctx, TurnRole::Assistant, &text);
                }
            }

            if tool_uses.is_empty() {
                ctx.llm_retry_count = 0;
                ctx.fallback_level = 0;
                ctx.ai_speaking = false;
                *llm_stream = None;
                return false;
            }

            ctx.call_state = CallState::ToolWait;
            let mut should_close = false;
            for (id, name, input) in tool_uses {
                let result = execute_tool(state, ctx, tools, &name, input).await;
                persist_turn_best_effort(state, ctx, TurnRole::Assistant, &format!("[TOOL RESULT] {name}: {}", result.content));
                ctx.history.push(HistoryMessage::tool_result(&id, result.content.clone(), result.is_error));

                if name == "book_appointment" && !result.is_error {
                    ctx.call_state = CallState::Confirmation;
                } else if name == "take_voicemail" && result.content == VOICEMAIL_SENTINEL {
                    should_close = true;
                }
            }

            if should_close {
                speak_one_shot(state, outbound, "Thanks for calling — I'll make sure someone follows up with you soon. Goodbye!").await;
                ctx.call_state = CallState::Terminated;
                *llm_stream = None;
                return true;
            }

            prune_history(&mut ctx.history);
            ctx.call_state = CallState::Conversation;
            *llm_stream = start_llm_stream(state, ctx, booking_context, tool_defs).await;
        }
    }
    false
}

#[allow(clippy::too_many_arguments)]
pub async fn run_call(
    state: Arc<AppState>,
    tenant: Tenant,
    call_sid: String,
    caller_phone: String,
    mut inbound: SplitStream<WebSocket>,
    outbound: OutboundHandle,
    cancel: CancellationToken,
) {
    let tenant_id = tenant.tenant_id.as_str().to_string();
    let call_started_at = Instant::now();

    persist_status_best_effort(&state, &tenant_id, &call_sid, CallStatus::InProgress, None, None);
    record_metric(&state, &tenant_id, "call_count", 1.0, None);
    state.hooks.emit(
        HookContext::new(HookEvent::CallStart, serde_json::json!({ "caller_phone": caller_phone }))
            .with_tenant(TenantId(tenant_id.clone()))
            .with_call_sid(call_sid.clone()),
    );

    let mut stt_session = match state.stt.open_session().await {
        Ok(session) => session,
        Err(err) => {
            warn!(%err, tenant_id, call_sid, "failed to open STT session; ending call");
            record_metric(&state, &tenant_id, "stream_connect_error", 1.0, None);
            return;
        }
    };
    record_metric(&state, &tenant_id, "stream_connect_ok", 1.0, None);

    let mut ctx = CallCtx {
        tenant_id: tenant_id.clone(),
        call_sid: call_sid.clone(),
        history: Vec::new(),
        call_state: CallState::Greeting,
        ai_speaking: true,
        cancel_pending: false,
        tts_session: None,
        pending_turns: VecDeque::new(),
        llm_retry_count: 0,
        fallback_level: 0,
    };

    let greeting = format!(
        "This call may be recorded for quality assurance. {}",
        tenant.config.ai.greeting_text
    );
    speak_one_shot(&state, &outbound, &greeting).await;
    ctx.tts_session = state.tts.open_session(outbound.as_tts_callback()).await.ok();
    ctx.ai_speaking = false;
    ctx.call_state = CallState::Conversation;

    let tools = va_tools::catalog_for_tenant(tenant_id.clone(), tenant.timezone, state.scheduler.clone());
    let tool_defs = to_definitions(&tools);
    let booking_context = BookingContext {
        business_name: tenant.config.business_name.clone(),
        timezone: tenant.timezone.to_string(),
    };

    let mut llm_stream: Option<ReceiverStream<LlmStreamEvent>> = None;
    let mut blocks: HashMap<u32, BlockAcc> = HashMap::new();
    let mut assistant_content: Vec<ContentBlock> = Vec::new();

    let hard_deadline = Instant::now() + Duration::from_millis(state.config.call.max_call_duration_ms);
    let hard_timer = tokio::time::sleep_until(hard_deadline);
    tokio::pin!(hard_timer);
    let inactivity_timer = tokio::time::sleep(Duration::from_millis(state.config.call.inactivity_timeout_ms));
    tokio::pin!(inactivity_timer);

    'outer: loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                break;
            }

            _ = &mut hard_timer => {
                speak_one_shot(&state, &outbound, "I'm sorry, but we need to end this call now. Goodbye.").await;
                tokio::time::sleep(Duration::from_secs(GRACE_CLOSE_SECS)).await;
                break;
            }

            _ = &mut inactivity_timer => {
                speak_one_shot(&state, &outbound, "I haven't heard from you in a while, so I'll let you go now. Goodbye.").await;
                tokio::time::sleep(Duration::from_secs(GRACE_CLOSE_SECS)).await;
                break;
            }

            msg = inbound.next() => {
                match msg {
                    Some(Ok(Message::Binary(bytes))) => {
                        let _ = stt_session.send_audio(bytes.to_vec()).await;
                        let _ = state.coordinator.refresh_call(&call_sid, &tenant_id, state.config.call.max_call_duration_ms / 1000 + 60).await;
                    }
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<MediaStreamFrame>(&text) {
                            Ok(MediaStreamFrame::Media { media, .. }) => {
                                match MediaStreamFrame::decode_media_payload(&media.payload) {
                                    Ok(bytes) => {
                                        let _ = stt_session.send_audio(bytes).await;
                                        let _ = state.coordinator.refresh_call(&call_sid, &tenant_id, state.config.call.max_call_duration_ms / 1000 + 60).await;
                                    }
                                    Err(err) => warn!(%err, "failed to decode media payload"),
                                }
                            }
                            Ok(MediaStreamFrame::Stop) => break 'outer,
                            Ok(_) => {}
                            Err(err) => warn!(%err, "malformed media-stream frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break 'outer,
                    Some(Err(err)) => {
                        warn!(%err, "websocket error");
                        break 'outer;
                    }
                    _ => {}
                }
            }

            event = stt_session.events.recv() => {
                match event {
                    Some(SttEvent::SpeechStarted) => {
                        handle_barge_in(&state, &mut ctx, &outbound, &mut llm_stream).await;
                    }
                    Some(SttEvent::Partial { text, confidence }) => {
                        if is_barge_in(confidence, word_count(&text)) {
                            handle_barge_in(&state, &mut ctx, &outbound, &mut llm_stream).await;
                        }
                    }
                    Some(SttEvent::Final { text, confidence }) => {
                        ctx.cancel_pending = true;
                        handle_barge_in(&state, &mut ctx, &outbound, &mut llm_stream).await;
                        inactivity_timer.as_mut().reset(Instant::now() + Duration::from_millis(state.config.call.inactivity_timeout_ms));
                        ctx.call_state = CallState::Conversation;

                        if confidence.unwrap_or(1.0) < state.config.call.asr_confidence_threshold {
                            speak_one_shot(&state, &outbound, "Sorry, could you say that again?").await;
                        } else {
                            persist_turn_best_effort(&state, &mut ctx, TurnRole::User, &text);
                            ctx.history.push(HistoryMessage::text(HistoryRole::User, text));
                            prune_history(&mut ctx.history);
                            llm_stream = start_llm_stream(&state, &mut ctx, &booking_context, &tool_defs).await;
                        }
                    }
                    Some(SttEvent::UtteranceEnd) => {}
                    None => {
                        warn!(tenant_id, call_sid, "STT session ended unexpectedly");
                        break 'outer;
                    }
                }
            }

            Some(event) = async {
                match llm_stream.as_mut() {
                    Some(stream) => stream.next().await,
                    None => std::future::pending().await,
                }
            } => {
                let should_close = handle_llm_event(
                    &state, &mut ctx, &outbound, &tools, &booking_context, &tool_defs,
                    &mut blocks, &mut assistant_content, event, &mut llm_stream,
                ).await;
                if should_close {
                    break 'outer;
                }
            }
        }
    }

    let reached_conversation = !ctx.history.is_empty() || ctx.call_state == CallState::Confirmation;
    ctx.call_state = CallState::Terminated;
    if let Some(tts) = ctx.tts_session.take() {
        tts.finish().await;
    }
    stt_session.close().await;
    flush_ring_buffer(&state, &mut ctx);

    let _ = state.coordinator.release_call(&call_sid, &tenant_id).await;
    let duration_secs = call_started_at.elapsed().as_secs() as u32;
    let final_status = if reached_conversation {
        CallStatus::Completed
    } else {
        CallStatus::NoAnswer
    };
    persist_status_best_effort(&state, &tenant_id, &call_sid, final_status, Some(duration_secs), None);
    record_metric(&state, &tenant_id, "call_duration", duration_secs as f64, None);
    state.hooks.emit(
        HookContext::new(HookEvent::CallEnd, serde_json::json!({ "duration_secs": duration_secs }))
            .with_tenant(TenantId(tenant_id.clone()))
            .with_call_sid(call_sid.clone()),
    );

    info!(tenant_id, call_sid, duration_secs, "call session ended");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filler(n: usize) -> Vec<HistoryMessage> {
        (0..n)
            .map(|i| HistoryMessage::text(HistoryRole::User, format!("filler message {i}")))
            .collect()
    }

    #[test]
    fn prune_keeps_tool_use_and_tool_result_paired() {
        let max = va_core::config::DEFAULT_MAX_HISTORY;
        let mut history = filler(max - 4);
        history.push(HistoryMessage {
            role: HistoryRole::Assistant,
            content: vec![ContentBlock::ToolUse {
                id: "call_1".to_string(),
                name: "check_availability".to_string(),
                input: json!({}),
            }],
        });
        history.push(HistoryMessage::tool_result("call_1", "That entire time range is free.", false));
        // Sized so the KEEP_RECENT cutoff falls exactly between the pair:
        // the tool_result lands in the kept tail but the tool_use doesn't,
        // and neither trips the identity heuristic on its own.
        history.extend(filler(9));

        prune_history(&mut history);

        let tool_use_idx = history.iter().position(|m| {
            m.content.iter().any(|b| matches!(b, ContentBlock::ToolUse { id, .. } if id == "call_1"))
        });
        let tool_result_idx = history.iter().position(|m| {
            m.content
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "call_1"))
        });
        assert!(tool_use_idx.is_some(), "tool_use for call_1 was pruned");
        assert!(tool_result_idx.is_some(), "tool_result for call_1 was pruned");
        assert_eq!(tool_use_idx.unwrap() + 1, tool_result_idx.unwrap(), "pair must stay adjacent and ordered");
    }

    #[test]
    fn prune_is_a_noop_under_the_cap() {
        let mut history = filler(3);
        let before = history.len();
        prune_history(&mut history);
        assert_eq!(history.len(), before);
    }
}
