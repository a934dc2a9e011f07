//! Price-push WebSocket (§6, §5 "WebSocket broadcast loop"): `X-API-Key` or
//! `?api_key=` auth, subscribe/unsubscribe by feed ID, a 30s ping, and
//! non-blocking per-client sends that drop on a full buffer rather than
//! block the broadcast loop.

use crate::feed_registry::FeedRegistry;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

const CLIENT_BUFFER: usize = 64;
const PING_INTERVAL: Duration = Duration::from_secs(30);
const READ_DEADLINE: Duration = Duration::from_secs(60);
const WRITE_DEADLINE: Duration = Duration::from_secs(10);
const BROADCAST_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone, Default)]
pub struct WsHub {
    next_id: Arc<AtomicU64>,
    clients: Arc<RwLock<HashMap<u64, ClientHandle>>>,
}

struct ClientHandle {
    sender: mpsc::Sender<Message>,
    subscriptions: Arc<RwLock<HashSet<String>>>,
}

impl WsHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self) -> (u64, mpsc::Receiver<Message>, Arc<RwLock<HashSet<String>>>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(CLIENT_BUFFER);
        let subscriptions = Arc::new(RwLock::new(HashSet::new()));
        self.clients
            .write()
            .expect("ws hub lock poisoned")
            .insert(id, ClientHandle { sender, subscriptions: subscriptions.clone() });
        (id, receiver, subscriptions)
    }

    fn deregister(&self, id: u64) {
        self.clients.write().expect("ws hub lock poisoned").remove(&id);
    }

    /// Pushes `message` to every client subscribed to `feed_id` (or
    /// subscribed to nothing in particular — an empty set means "all").
    /// Drops silently on a full client buffer (§5).
    fn broadcast(&self, feed_id: &str, message: Message) {
        let clients = self.clients.read().expect("ws hub lock poisoned");
        for handle in clients.values() {
            let subs = handle.subscriptions.read().expect("subscription lock poisoned");
            if !subs.is_empty() && !subs.contains(feed_id) {
                continue;
            }
            drop(subs);
            if handle.sender.try_send(message.clone()).is_err() {
                debug!(feed_id, "client buffer full, dropping update");
            }
        }
    }
}

#[derive(Deserialize)]
pub struct WsQuery {
    api_key: Option<String>,
}

#[derive(Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientMessage {
    Subscribe { feed_ids: Vec<String> },
    Unsubscribe { feed_ids: Vec<String> },
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<super::AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
) -> axum::response::Response {
    if !state.api_keys.is_empty() {
        let provided = headers
            .get("X-API-Key")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .or(query.api_key);
        if provided.map(|key| state.api_keys.contains(&key)).unwrap_or(false) == false {
            return (StatusCode::UNAUTHORIZED, "invalid or missing api key").into_response();
        }
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state.ws.clone()))
}

async fn handle_socket(socket: WebSocket, hub: WsHub) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut outbound, subscriptions) = hub.register();

    let writer = tokio::spawn(async move {
        let mut ping_ticker = tokio::time::interval(PING_INTERVAL);
        loop {
            tokio::select! {
                maybe_msg = outbound.recv() => {
                    let Some(msg) = maybe_msg else { break };
                    if tokio::time::timeout(WRITE_DEADLINE, sender.send(msg)).await.is_err() {
                        break;
                    }
                }
                _ = ping_ticker.tick() => {
                    if tokio::time::timeout(WRITE_DEADLINE, sender.send(Message::Ping(vec![]))).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    loop {
        match tokio::time::timeout(READ_DEADLINE, receiver.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                if let Ok(client_msg) = serde_json::from_str::<ClientMessage>(&text) {
                    let mut subs = subscriptions.write().expect("subscription lock poisoned");
                    match client_msg {
                        ClientMessage::Subscribe { feed_ids } => {
                            subs.extend(feed_ids);
                        }
                        ClientMessage::Unsubscribe { feed_ids } => {
                            for feed_id in feed_ids {
                                subs.remove(&feed_id);
                            }
                        }
                    }
                }
            }
            Ok(Some(Ok(Message::Close(_)))) | Ok(None) => break,
            Ok(Some(Ok(_))) => {}
            Ok(Some(Err(e))) => {
                warn!(error = %e, "websocket read error");
                break;
            }
            Err(_) => {
                debug!("websocket read deadline elapsed, closing connection");
                break;
            }
        }
    }

    writer.abort();
    hub.deregister(id);
}

/// Wire shape for a price-push update (§6 WebSocket push): `decimals` and
/// `latency_ms` aren't carried on [`FeedLiveStatus`] itself, so they're
/// filled in here from the feed's static config and the status's age.
#[derive(serde::Serialize)]
struct PriceUpdate {
    feed_id: String,
    value: String,
    round_id: u64,
    timestamp: chrono::DateTime<chrono::Utc>,
    decimals: u8,
    confidence: f64,
    zk_verified: bool,
    latency_ms: i64,
}

/// Polls the Feed Registry and pushes live statuses to subscribed clients
/// (§5 "one WebSocket broadcast loop").
pub async fn broadcast_loop(feeds: FeedRegistry, hub: WsHub, mut shutdown: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(BROADCAST_INTERVAL);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for status in feeds.live_status() {
                    let decimals = feeds.get(&status.feed_id).map(|c| c.decimals).unwrap_or(0);
                    let latency_ms = chrono::Utc::now()
                        .signed_duration_since(status.timestamp)
                        .num_milliseconds()
                        .max(0);
                    let update = PriceUpdate {
                        feed_id: status.feed_id.clone(),
                        value: status.value_formatted.clone(),
                        round_id: status.round_id,
                        timestamp: status.timestamp,
                        decimals,
                        confidence: status.confidence,
                        zk_verified: status.zk_verified,
                        latency_ms,
                    };
                    let Ok(payload) = serde_json::to_string(&update) else { continue };
                    hub.broadcast(&status.feed_id, Message::Text(payload));
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
