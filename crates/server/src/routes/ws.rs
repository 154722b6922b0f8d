// SPDX-License-Identifier: MIT

//! `/ws/state` — one subscriber connection per client. No server-side
//! session state: each connection just forwards Broker events as JSON text
//! frames until the client disconnects, then unsubscribes.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use low_tide_broker::BrokerEvent;
use serde::Serialize;
use tracing::debug;

use crate::state::AppState;

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle(socket, state))
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum Frame<'a> {
    #[serde(rename = "job_snapshot")]
    JobSnapshot { job: &'a low_tide_core::Job },
    #[serde(rename = "job_log")]
    JobLog { job_id: low_tide_core::JobId, seq: u64, line: &'a str },
    #[serde(rename = "jobs_archived")]
    JobsArchived,
}

async fn handle(mut socket: WebSocket, state: AppState) {
    let mut subscription = state.broker.subscribe();
    loop {
        tokio::select! {
            event = subscription.recv() => {
                let frame = match &event {
                    BrokerEvent::JobSnapshot(job) => Frame::JobSnapshot { job },
                    BrokerEvent::JobLog { job_id, seq, line } => Frame::JobLog { job_id: *job_id, seq: *seq, line },
                    BrokerEvent::JobsArchived => Frame::JobsArchived,
                };
                let text = match serde_json::to_string(&frame) {
                    Ok(text) => text,
                    Err(source) => { debug!(%source, "failed to serialize ws frame"); continue; }
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
    subscription.unsubscribe();
}
