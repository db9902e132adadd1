//! One persistent broker connection, run as an owned actor task.
//!
//! Callers talk to the actor over an mpsc channel and receive responses on
//! oneshot channels; the actor owns the socket, assigns `req_id`s and
//! correlates response frames. Subscriptions emit into owned queues, so no
//! handler closure ever holds a reference back to the client.
//!
//! On transport failure the actor reconnects with backoff while the rest of
//! the pool keeps serving. Two consecutive reconnect failures mark the
//! connection dead.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::BrokerError;

use super::messages::{self, classify_api_error, ApiErrorFrame};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Responder = oneshot::Sender<Result<Value, BrokerError>>;

const AUTHORIZE_TIMEOUT: Duration = Duration::from_secs(30);
const RECONNECT_ATTEMPTS: u32 = 2;
/// The broker drops connections idle for two minutes; ping well inside that.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Work submitted to the connection actor.
pub(crate) enum Command {
    Request {
        payload: Value,
        resp: Responder,
    },
    Subscribe {
        payload: Value,
        symbol: String,
        sink: mpsc::Sender<Value>,
    },
}

/// Handle to a pooled connection.
pub(crate) struct Connection {
    tx: mpsc::Sender<Command>,
    alive: Arc<AtomicBool>,
}

impl Connection {
    pub(crate) fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub(crate) async fn send(&self, command: Command) -> Result<(), BrokerError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| BrokerError::ConnectionClosed("connection actor stopped".into()))
    }
}

/// Connect, authorize (30 s budget) and spawn the actor.
pub(crate) async fn spawn(id: usize, url: String, token: String) -> Result<Connection, BrokerError> {
    let ws = tokio::time::timeout(AUTHORIZE_TIMEOUT, establish(&url, &token))
        .await
        .map_err(|_| BrokerError::Timeout {
            endpoint: "authorize",
            seconds: AUTHORIZE_TIMEOUT.as_secs(),
        })??;

    info!(connection = id, "broker connection authorized");

    let (tx, rx) = mpsc::channel(32);
    let alive = Arc::new(AtomicBool::new(true));
    tokio::spawn(actor(id, url, token, ws, rx, alive.clone()));
    Ok(Connection { tx, alive })
}

/// Open the socket and authorize it, draining unrelated frames.
async fn establish(url: &str, token: &str) -> Result<WsStream, BrokerError> {
    let (mut ws, _) = connect_async(url)
        .await
        .map_err(|e| BrokerError::WebSocket(Box::new(e)))?;

    let mut frame = messages::authorize(token);
    frame["req_id"] = 1.into();
    ws.send(Message::Text(frame.to_string()))
        .await
        .map_err(|e| BrokerError::WebSocket(Box::new(e)))?;

    while let Some(message) = ws.next().await {
        match message.map_err(|e| BrokerError::WebSocket(Box::new(e)))? {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(&text)?;
                if let Some(frame) = error_frame(&value) {
                    let err = classify_api_error(frame);
                    // Any rejection during the handshake is an auth failure.
                    return Err(match err {
                        BrokerError::Auth(_) => err,
                        other => BrokerError::Auth(other.to_string()),
                    });
                }
                if value.get("authorize").is_some() {
                    return Ok(ws);
                }
            }
            Message::Ping(data) => ws
                .send(Message::Pong(data))
                .await
                .map_err(|e| BrokerError::WebSocket(Box::new(e)))?,
            Message::Close(frame) => {
                return Err(BrokerError::ConnectionClosed(format!(
                    "closed during authorize: {frame:?}"
                )))
            }
            _ => {}
        }
    }
    Err(BrokerError::ConnectionClosed(
        "stream ended during authorize".into(),
    ))
}

fn error_frame(value: &Value) -> Option<ApiErrorFrame> {
    value
        .get("error")
        .and_then(|e| serde_json::from_value(e.clone()).ok())
}

struct ActorState {
    pending: HashMap<u64, Responder>,
    /// Active subscriptions by symbol, with the payload needed to
    /// re-subscribe after a reconnect.
    subs: HashMap<String, (Value, mpsc::Sender<Value>)>,
    next_req_id: u64,
}

impl ActorState {
    fn next_id(&mut self) -> u64 {
        self.next_req_id += 1;
        self.next_req_id
    }

    /// In-flight requests do not survive a transport break.
    fn fail_pending(&mut self, reason: &str) {
        for (_, resp) in self.pending.drain() {
            let _ = resp.send(Err(BrokerError::ConnectionClosed(reason.into())));
        }
    }
}

async fn actor(
    id: usize,
    url: String,
    token: String,
    mut ws: WsStream,
    mut rx: mpsc::Receiver<Command>,
    alive: Arc<AtomicBool>,
) {
    let mut state = ActorState {
        pending: HashMap::new(),
        subs: HashMap::new(),
        // req_id 1 was spent on the initial authorize.
        next_req_id: 1,
    };

    let mut keepalive = tokio::time::interval(PING_INTERVAL);
    keepalive.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    keepalive.tick().await;

    loop {
        tokio::select! {
            command = rx.recv() => match command {
                None => {
                    debug!(connection = id, "all handles dropped, closing");
                    let _ = ws.close(None).await;
                    break;
                }
                Some(Command::Request { mut payload, resp }) => {
                    let req_id = state.next_id();
                    payload["req_id"] = req_id.into();
                    match ws.send(Message::Text(payload.to_string())).await {
                        Ok(()) => {
                            state.pending.insert(req_id, resp);
                        }
                        Err(e) => {
                            let _ = resp.send(Err(BrokerError::WebSocket(Box::new(e))));
                            match reconnect(id, &url, &token, &mut state).await {
                                Some(stream) => ws = stream,
                                None => break,
                            }
                        }
                    }
                }
                Some(Command::Subscribe { mut payload, symbol, sink }) => {
                    let req_id = state.next_id();
                    payload["req_id"] = req_id.into();
                    match ws.send(Message::Text(payload.to_string())).await {
                        Ok(()) => {
                            state.subs.insert(symbol, (payload, sink));
                        }
                        Err(e) => {
                            warn!(connection = id, error = %e, "subscribe send failed");
                            match reconnect(id, &url, &token, &mut state).await {
                                Some(stream) => ws = stream,
                                None => break,
                            }
                        }
                    }
                }
            },
            // Fire-and-forget keepalive; the pong frame carries a req_id
            // with no pending waiter and is dropped by `handle_text`.
            _ = keepalive.tick() => {
                let mut frame = messages::ping();
                frame["req_id"] = state.next_id().into();
                if let Err(e) = ws.send(Message::Text(frame.to_string())).await {
                    warn!(connection = id, error = %e, "keepalive send failed");
                    match reconnect(id, &url, &token, &mut state).await {
                        Some(stream) => ws = stream,
                        None => break,
                    }
                }
            }
            frame = ws.next() => match frame {
                Some(Ok(Message::Text(text))) => handle_text(&mut state, &text),
                Some(Ok(Message::Ping(data))) => {
                    if ws.send(Message::Pong(data)).await.is_err() {
                        match reconnect(id, &url, &token, &mut state).await {
                            Some(stream) => ws = stream,
                            None => break,
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | None => {
                    warn!(connection = id, "broker closed the connection");
                    match reconnect(id, &url, &token, &mut state).await {
                        Some(stream) => ws = stream,
                        None => break,
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(connection = id, error = %e, "transport error");
                    match reconnect(id, &url, &token, &mut state).await {
                        Some(stream) => ws = stream,
                        None => break,
                    }
                }
            }
        }
    }

    alive.store(false, Ordering::SeqCst);
    state.fail_pending("connection dead");
}

/// Resolve a response frame or route a subscription push.
fn handle_text(state: &mut ActorState, text: &str) {
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "unparseable broker frame");
            return;
        }
    };

    let req_id = value.get("req_id").and_then(Value::as_u64);
    if let Some(resp) = req_id.and_then(|id| state.pending.remove(&id)) {
        let result = match error_frame(&value) {
            Some(frame) => Err(classify_api_error(frame)),
            None => Ok(value),
        };
        let _ = resp.send(result);
        return;
    }

    // Pushed tick for a subscription.
    if let Some(symbol) = value
        .get("tick")
        .and_then(|t| t.get("symbol"))
        .and_then(Value::as_str)
    {
        let gone = match state.subs.get(symbol) {
            Some((_, sink)) => sink.try_send(value.clone()).is_err() && sink.is_closed(),
            None => false,
        };
        if gone {
            state.subs.remove(symbol);
        }
    }
}

/// Re-open the socket with backoff, failing in-flight requests first and
/// restoring subscriptions on success. `None` means the connection is dead.
async fn reconnect(
    id: usize,
    url: &str,
    token: &str,
    state: &mut ActorState,
) -> Option<WsStream> {
    state.fail_pending("reconnecting");

    let mut backoff = Duration::from_secs(1);
    for attempt in 1..=RECONNECT_ATTEMPTS {
        tokio::time::sleep(backoff).await;
        match tokio::time::timeout(AUTHORIZE_TIMEOUT, establish(url, token)).await {
            Ok(Ok(mut ws)) => {
                info!(connection = id, attempt, "reconnected");
                for (symbol, (payload, _)) in &state.subs {
                    if let Err(e) = ws.send(Message::Text(payload.to_string())).await {
                        warn!(connection = id, symbol = %symbol, error = %e, "re-subscribe failed");
                    }
                }
                return Some(ws);
            }
            Ok(Err(BrokerError::Auth(message))) => {
                // Credentials went bad; retrying cannot help.
                warn!(connection = id, %message, "authorization rejected on reconnect");
                return None;
            }
            Ok(Err(e)) => warn!(connection = id, attempt, error = %e, "reconnect failed"),
            Err(_) => warn!(connection = id, attempt, "reconnect timed out"),
        }
        backoff *= 2;
    }
    warn!(connection = id, "declared dead after {RECONNECT_ATTEMPTS} failed reconnects");
    None
}
