// Copyright © 2025 rustmailer.com
// Licensed under RustMailer License Agreement v1.0
// Unauthorized copying, modification, or distribution is prohibited.

//! `GET /ws/status` (spec §6.2): a raw WebSocket endpoint, not part of the
//! `OpenApiService` — status fan-out is push-based and doesn't fit the
//! request/response shape OpenAPI documents. On open the socket gets one
//! snapshot of whatever is currently live, then every subsequent Publisher
//! broadcast (status updates and 30s pings) until the client disconnects. A
//! client may ask for the recent-runs ring with `{"type":"get_recent_runs"}`.

use futures::{SinkExt, StreamExt};
use poem::web::websocket::{Message, WebSocket};
use poem::{handler, IntoResponse};

use crate::modules::publisher::{WsServerMsg, PUBLISHER};
use crate::modules::registry::REGISTRY;
use crate::utc_now;

const RECENT_RUNS_REQUEST: &str = "get_recent_runs";
const DEFAULT_RECENT_RUNS_LIMIT: usize = 50;

#[handler]
pub fn ws_status(ws: WebSocket) -> impl IntoResponse {
    ws.on_upgrade(|socket| async move {
        let (mut sink, mut stream) = socket.split();
        let mut updates = PUBLISHER.subscribe();

        let snapshot = WsServerMsg::StatusUpdate {
            data: REGISTRY.current(None),
            ts: utc_now!(),
        };
        if write(&mut sink, &snapshot).await.is_err() {
            return;
        }

        loop {
            tokio::select! {
                update = updates.recv() => {
                    let Some(update) = update else { break };
                    if write(&mut sink, &update).await.is_err() {
                        break;
                    }
                }
                incoming = stream.next() => {
                    match incoming {
                        Some(Ok(Message::Text(text))) => {
                            if text.contains(RECENT_RUNS_REQUEST) {
                                let reply = WsServerMsg::RecentRuns {
                                    data: REGISTRY.recent_runs(DEFAULT_RECENT_RUNS_LIMIT),
                                };
                                if write(&mut sink, &reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(_)) => break,
                    }
                }
            }
        }
    })
}

async fn write<S>(sink: &mut S, msg: &WsServerMsg) -> Result<(), ()>
where
    S: futures::Sink<Message> + Unpin,
{
    let text = serde_json::to_string(msg).map_err(|_| ())?;
    sink.send(Message::Text(text)).await.map_err(|_| ())
}
