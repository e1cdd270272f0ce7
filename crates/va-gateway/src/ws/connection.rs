use std::sync::Arc;

use axum::extract::{ws::Message, ws::WebSocket, State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use va_protocol::frames::MediaStreamFrame;

use crate::app::AppState;
use crate::ws::orchestrator::ActiveCall;

/// GET `/media-stream?callSid=&tenantId=` — the provider's duplex audio
/// socket. `callSid`/`tenantId` also ride along in the `start` frame's
/// custom parameters; we trust the frame over the query string since some
/// providers don't forward query parameters on the WS upgrade.
pub async fn media_stream_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let (sink, mut rx) = socket.split();

    let start = loop {
        match rx.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<MediaStreamFrame>(&text) {
                Ok(MediaStreamFrame::Start { start }) => break start,
                Ok(_) => continue,
                Err(err) => {
                    warn!(%err, "malformed frame before start, dropping connection");
                    return;
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Err(err)) => {
                warn!(%err, "websocket error while awaiting start frame");
                return;
            }
            _ => continue,
        }
    };

    let call_sid = start.call_sid.clone();
    let stream_sid = start.stream_sid.clone();
    let Some(tenant_id) = start.custom_parameters.tenant_id.clone() else {
        warn!(call_sid, "start frame missing tenantId custom parameter");
        return;
    };
    let caller_phone = start.custom_parameters.caller_phone.clone().unwrap_or_default();

    let tenant = match state.tenants.find_by_id(&tenant_id) {
        Ok(Some(tenant)) => tenant,
        Ok(None) => {
            warn!(tenant_id, call_sid, "media stream for unknown tenant");
            return;
        }
        Err(err) => {
            warn!(%err, tenant_id, "tenant lookup failed");
            return;
        }
    };

    info!(tenant_id, call_sid, stream_sid, "media stream connected");

    let (outbound, writer_task) = crate::ws::outbound::spawn_writer(sink, stream_sid.clone());
    let cancel = CancellationToken::new();
    state.active_calls.insert(
        call_sid.clone(),
        ActiveCall {
            cancel: cancel.clone(),
            tenant_id: tenant_id.clone(),
        },
    );

    crate::ws::orchestrator::run_call(
        state.clone(),
        tenant,
        call_sid.clone(),
        caller_phone,
        rx,
        outbound,
        cancel,
    )
    .await;

    state.active_calls.remove(&call_sid);
    let _ = writer_task.await;
    info!(tenant_id, call_sid, "media stream closed");
}
