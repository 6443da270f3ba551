use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::adapters::http::state::HttpState;
use crate::domain::stream::UiEvent;

pub async fn ws_handler(ws: WebSocketUpgrade, State(st): State<HttpState>) -> impl axum::response::IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, st))
}

async fn handle_socket(mut socket: WebSocket, st: HttpState) {
    let mut rx = st.labeling.subscribe();

    // Estado inicial para que el cliente no espere al primer cambio
    let snap = st.labeling.snapshot().await;
    let hello = [
        UiEvent::Status { status: snap.status, can_start: snap.can_start, can_stop: snap.can_stop },
        UiEvent::Labels { labels: snap.labels },
        UiEvent::Banner { banner: snap.banner },
    ];
    for ev in hello {
        let json = serde_json::to_string(&ev).unwrap_or_default();
        if socket.send(Message::Text(json)).await.is_err() {
            return;
        }
    }

    loop {
        let (event, jpeg) = match rx.recv().await {
            Ok(msg) => msg,
            // Un cliente lento pierde frames, no la conexión
            Err(RecvError::Lagged(n)) => {
                debug!("WebSocket retrasado, {} eventos descartados", n);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let json = serde_json::to_string(&event).unwrap_or_default();
        if socket.send(Message::Text(json)).await.is_err() { break; }
        if let Some(jpeg) = jpeg {
            if socket.send(Message::Binary(jpeg)).await.is_err() { break; }
        }
    }
}
