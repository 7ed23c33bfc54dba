use std::collections::HashMap;
use std::net::SocketAddr;

use axum::extract::connect_info::ConnectInfo;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tracing::{debug, warn};

use vigil_core::constants::KILL_SWITCH_CHANNEL;
use vigil_coord::keys;
use vigil_tokens::TokenType;

use crate::extract::{assert_device_access, ws_token};
use crate::state::AppState;

// Close codes: 1008 policy violation, 1013 try again later (rate limited),
// 4003 payment required (application-defined).
const CLOSE_POLICY: u16 = 1008;
const CLOSE_TRY_AGAIN: u16 = 1013;
const CLOSE_PAYMENT: u16 = 4003;

fn close_reason(code: u16) -> &'static str {
    match code {
        CLOSE_TRY_AGAIN => "rate limited",
        CLOSE_PAYMENT => "payment required",
        _ => "policy violation",
    }
}

/// Complete the upgrade, deliver the close code, and hang up. Close codes
/// can only be sent on an established socket, so rejection happens after
/// the handshake.
async fn reject(mut socket: WebSocket, code: u16) {
    let frame = CloseFrame { code, reason: close_reason(code).into() };
    let _ = socket.send(Message::Close(Some(frame))).await;
}

// ── Kill-switch socket ───────────────────────────────────────────────────────

/// Persistent push socket carrying kill-switch messages for one device.
pub async fn kill_switch_ws(
    State(ctx): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    let ws = ws.protocols(["bearer"]);
    match admit_kill_switch(&ctx, &headers, &params, addr).await {
        Ok(device_id) => ws.on_upgrade(move |socket| serve_kill_switch(socket, ctx, device_id)),
        Err(code) => ws.on_upgrade(move |socket| reject(socket, code)),
    }
}

/// Admission for a new kill-switch socket: origin allowlist, bearer token
/// (subprotocol or header), device binding, per-IP+device connection rate
/// limit, paywall. Returns the resolved device id or a close code.
async fn admit_kill_switch(
    ctx: &AppState,
    headers: &HeaderMap,
    params: &HashMap<String, String>,
    addr: SocketAddr,
) -> Result<String, u16> {
    if !ctx.config.ws_allowed_origins.is_empty() {
        let origin = headers.get("origin").and_then(|v| v.to_str().ok()).unwrap_or("");
        if !ctx.config.ws_allowed_origins.iter().any(|allowed| allowed == origin) {
            debug!(origin, "push socket origin rejected");
            return Err(CLOSE_POLICY);
        }
    }

    let token = ws_token(headers).ok_or(CLOSE_POLICY)?;
    let claims = ctx
        .tokens
        .verify_with_revocation(&token, TokenType::Access)
        .await
        .map_err(|_| CLOSE_POLICY)?;

    let device_id = params
        .get("device_id")
        .cloned()
        .unwrap_or_else(|| claims.device_id.clone());
    assert_device_access(&device_id, &claims).map_err(|_| CLOSE_POLICY)?;

    let rate_key = keys::ws_conn_rate_key(&addr.ip().to_string(), &device_id);
    let count = ctx
        .coord
        .bump_counter(&rate_key, ctx.config.ws_rate_limit_window_secs)
        .await
        .map_err(|_| CLOSE_POLICY)?;
    if count > ctx.config.ws_rate_limit_max {
        return Err(CLOSE_TRY_AGAIN);
    }

    let paywall = ctx
        .access
        .compute_paywall_state(&claims.sub, &device_id, Utc::now(), None)
        .await
        .map_err(|_| CLOSE_POLICY)?;
    if paywall.trial_expired && !paywall.is_premium {
        return Err(CLOSE_PAYMENT);
    }

    Ok(device_id)
}

/// Pump hub fan-out messages to the client until either side goes away.
async fn serve_kill_switch(socket: WebSocket, ctx: AppState, device_id: String) {
    let (socket_id, mut outbound) = ctx.hub.register(&device_id).await;
    ctx.hub.ensure_relay(&ctx.coord).await;

    let (mut sender, mut receiver) = socket.split();
    loop {
        tokio::select! {
            message = outbound.recv() => match message {
                Some(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = receiver.next() => match incoming {
                // Inbound frames on this socket are keepalives; ignore them.
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }

    ctx.hub.unregister(socket_id).await;
    debug!(device_id, "kill-switch socket closed");
}

// ── Priority socket ──────────────────────────────────────────────────────────

/// Priority socket: token and device id arrive as query parameters. Serves
/// the forced-overlay greeting and accepts client-pushed synthetic alarms.
pub async fn priority_ws(
    State(ctx): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let admitted = match (params.get("token"), params.get("device_id")) {
        (Some(token), Some(device_id)) => {
            match ctx.tokens.verify_with_revocation(token, TokenType::Access).await {
                Ok(claims) => assert_device_access(device_id, &claims)
                    .map(|_| device_id.clone())
                    .map_err(|_| CLOSE_POLICY),
                Err(_) => Err(CLOSE_POLICY),
            }
        }
        _ => Err(CLOSE_POLICY),
    };

    match admitted {
        Ok(device_id) => ws.on_upgrade(move |socket| serve_priority(socket, ctx, device_id)),
        Err(code) => ws.on_upgrade(move |socket| reject(socket, code)),
    }
}

async fn serve_priority(mut socket: WebSocket, ctx: AppState, device_id: String) {
    // A device under forced overlay learns it the moment it reconnects.
    let overlay_flag = ctx.coord.get(&keys::force_overlay_key(&device_id)).await;
    if matches!(overlay_flag, Ok(Some(_))) {
        let greeting = format!("force_overlay:{device_id}");
        if socket.send(Message::Text(greeting.into())).await.is_err() {
            return;
        }
    }

    while let Some(Ok(message)) = socket.recv().await {
        if let Message::Text(text) = message {
            if text.as_str() == "SYNTHETIC_TOUCH_ALARM" {
                // Client-detected touch-injection: escalate through the same
                // relay every other kill-switch message uses.
                let lock = format!("CRITICAL_LOCK:{device_id}");
                if let Err(e) = ctx.coord.publish(KILL_SWITCH_CHANNEL, &lock).await {
                    warn!(device_id, error = %e, "critical-lock publish failed");
                }
            }
        }
    }
    debug!(device_id, "priority socket closed");
}
