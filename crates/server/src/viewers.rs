//! WebSocket viewer transport at `GET /ws`.
//!
//! Server messages: `{"type":"products","revision":n,"products":[...]}` and
//! `{"type":"error","message":"..."}`. Viewer messages: `{"type":"createProduct","product":{...}}`
//! and `{"type":"deleteProduct","id":"..."}`.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vitrina_core::domain::product::{Product, ProductDraft};
use vitrina_services::{CatalogSnapshot, ProductService};

use crate::api::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ViewerMessage {
    CreateProduct { product: ProductDraft },
    DeleteProduct { id: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage<'a> {
    Products { revision: u64, products: &'a [Product] },
    Error { message: String },
}

impl<'a> ServerMessage<'a> {
    pub fn snapshot(snapshot: &'a CatalogSnapshot) -> Self {
        Self::Products { revision: snapshot.revision, products: &snapshot.products }
    }

    fn to_text(&self) -> Option<Message> {
        serde_json::to_string(self).ok().map(|json| Message::Text(json.into()))
    }
}

pub async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve_viewer(socket, state))
}

async fn serve_viewer(mut socket: WebSocket, state: AppState) {
    let mut channel = match state.viewers.connect().await {
        Ok(channel) => channel,
        Err(error) => {
            warn!(event_name = "notifier.viewer.connect_failed", error = %error, "viewer rejected");
            if let Some(message) = (ServerMessage::Error { message: error.to_string() }).to_text() {
                let _ = socket.send(message).await;
            }
            return;
        }
    };
    let viewer_id = channel.id();

    loop {
        tokio::select! {
            pushed = channel.recv() => {
                // `None` means the registry evicted this viewer.
                let Some(snapshot) = pushed else { break };
                let Some(message) = ServerMessage::snapshot(&snapshot).to_text() else { continue };
                if socket.send(message).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(reply) = handle_viewer_text(&state.products, text.as_str()).await {
                            if let Some(message) = reply.to_text() {
                                if socket.send(message).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(error)) => {
                        debug!(event_name = "notifier.viewer.transport_error", viewer_id, error = %error, "websocket error");
                        break;
                    }
                }
            }
        }
    }

    state.viewers.disconnect(viewer_id).await;
}

/// Routes one viewer message through the catalog service. Success is answered by the
/// broadcast the mutation triggers, so only failures produce a direct reply.
pub async fn handle_viewer_text(products: &ProductService, text: &str) -> Option<ServerMessage<'static>> {
    let message = match serde_json::from_str::<ViewerMessage>(text) {
        Ok(message) => message,
        Err(error) => {
            return Some(ServerMessage::Error { message: format!("invalid message: {error}") });
        }
    };

    let outcome = match message {
        ViewerMessage::CreateProduct { product } => products.create(product).await.map(|_| ()),
        ViewerMessage::DeleteProduct { id } => products.delete(&id).await,
    };

    outcome.err().map(|error| ServerMessage::Error { message: error.to_string() })
}
