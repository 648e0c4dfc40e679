//! Per-connection handler: URL parsing, room attach, and frame pumping.
//!
//! The connect URL carries everything this layer needs:
//!
//! ```text
//! ws://host/room/ABCD?id=<player-id>&name=<display-name>
//! ```
//!
//! `id` is the stable player identifier — a client that reconnects with
//! the same id gets its roster record back. When absent, a fresh one is
//! generated, which makes the connection a brand-new player.

use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parlor_protocol::{room_code, PlayerId};
use rand::Rng;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;

use crate::server::ServerState;
use crate::ParlorError;

/// What we extract from the connect URL.
struct ConnectParams {
    room_code: String,
    player_id: PlayerId,
    name: String,
}

/// Handles one connection from WebSocket accept to close.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    state: Arc<ServerState>,
) -> Result<(), ParlorError> {
    let mut uri = String::new();
    let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        uri = req.uri().to_string();
        Ok(resp)
    })
    .await?;

    let Some(params) = parse_connect_uri(&uri) else {
        tracing::debug!(%uri, "rejecting connection with bad room URL");
        let mut ws = ws;
        let _ = ws.close(None).await;
        return Ok(());
    };

    let player_id = params.player_id.clone();
    tracing::info!(
        room = %params.room_code,
        player = %player_id,
        "connection attached"
    );

    // Attach to the room before serving frames, so the client's first
    // inbound message already has a roster record to land on.
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let room = {
        let mut rooms = state.rooms.lock().await;
        rooms.get_or_create(&params.room_code)
    };
    room.connect(player_id.clone(), params.name, tx).await?;

    let (mut sink, mut source) = ws.split();

    // Outbound pump: room broadcasts → socket.
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Inbound pump: socket frames → room. The transport closing is a
    // disconnect, never an error.
    while let Some(msg) = source.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if room.frame(player_id.clone(), text.to_string()).await.is_err() {
                    break;
                }
            }
            Ok(Message::Binary(data)) => {
                let Ok(text) = String::from_utf8(data.to_vec()) else {
                    continue;
                };
                if room.frame(player_id.clone(), text).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue, // ping/pong
        }
    }

    let _ = room.disconnect(player_id.clone()).await;
    writer.abort();
    tracing::debug!(player = %player_id, "connection closed");
    Ok(())
}

/// Parses `/room/<CODE>?id=..&name=..` into connect parameters.
///
/// Returns `None` for anything that is not a well-formed room path with
/// a valid code (codes are case-insensitive on the wire).
fn parse_connect_uri(uri: &str) -> Option<ConnectParams> {
    let (path, query) = match uri.split_once('?') {
        Some((p, q)) => (p, q),
        None => (uri, ""),
    };

    let code = path.strip_prefix("/room/")?;
    let code = code.trim_end_matches('/').to_ascii_uppercase();
    if !room_code::is_valid(&code) {
        return None;
    }

    let mut id = None;
    let mut name = String::new();
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        match key {
            "id" => id = Some(percent_decode(value)),
            "name" => name = percent_decode(value),
            _ => {}
        }
    }

    let player_id = PlayerId(
        id.filter(|s| !s.is_empty())
            .unwrap_or_else(generate_player_id),
    );

    Some(ConnectParams {
        room_code: code,
        player_id,
        name,
    })
}

fn generate_player_id() -> String {
    let mut rng = rand::rng();
    (0..8)
        .map(|_| char::from(rng.sample(rand::distr::Alphanumeric)))
        .collect()
}

/// Minimal query-string decoding: `%XX` escapes and `+` as space.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' if i + 2 < bytes.len() => {
                let decoded = std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok());
                if let Some(byte) = decoded {
                    out.push(byte);
                    i += 3;
                } else {
                    out.push(b'%');
                    i += 1;
                }
            }
            b'%' => {
                out.push(b'%');
                i += 1;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}
