// WebSocket server for draft clients.
//
// One task per connection. Each task reads client frames, answers them
// through its `Session` and forwards snapshots for the draft it follows.

use std::sync::Arc;

use anyhow::Context;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::broadcast::error::RecvError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

use rinkside_core::service::DraftService;
use rinkside_core::sync::DraftSnapshot;

use crate::protocol::ServerMessage;
use crate::session::{Session, Subscription};

/// Bind the listener on all interfaces.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let listener = TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .with_context(|| format!("failed to bind port {port}"))?;
    info!("WebSocket server listening on {}", listener.local_addr()?);
    Ok(listener)
}

/// Accept connections forever, spawning a task for each.
pub async fn run(listener: TcpListener, service: Arc<DraftService>) -> anyhow::Result<()> {
    loop {
        let (stream, addr) = listener.accept().await?;
        let service = Arc::clone(&service);

        tokio::spawn(async move {
            let addr = addr.to_string();
            let ws_stream = match tokio_tungstenite::accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    warn!("WebSocket handshake failed for {addr}: {e}");
                    return;
                }
            };
            info!("Client {addr} connected");

            let (write, read) = ws_stream.split();
            serve_connection(read, write, service, &addr).await;
            info!("Client {addr} disconnected");
        });
    }
}

enum Event {
    Incoming(Option<Result<Message, WsError>>),
    Push(Result<Arc<DraftSnapshot>, RecvError>),
}

/// Drive one client until it closes, errors or stops accepting frames.
///
/// Generic over the stream and sink so tests can run it on in-memory
/// message lists.
pub async fn serve_connection<St, Si>(
    mut read: St,
    mut write: Si,
    service: Arc<DraftService>,
    addr: &str,
) where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
    Si: Sink<Message, Error = WsError> + Unpin,
{
    let mut session = Session::new(Arc::clone(&service));
    let mut subscription: Option<Subscription> = None;

    loop {
        let event = tokio::select! {
            msg = read.next() => Event::Incoming(msg),
            push = next_push(&mut subscription) => Event::Push(push),
        };

        let outgoing = match event {
            Event::Incoming(Some(Ok(Message::Text(text)))) => {
                let outcome = session.handle_text(text.as_str()).await;
                if let Some(sub) = outcome.subscription {
                    subscription = Some(sub);
                }
                outcome.replies
            }
            Event::Incoming(Some(Ok(Message::Close(_)))) => {
                info!("Client {addr} sent close frame");
                break;
            }
            Event::Incoming(Some(Err(e))) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            Event::Incoming(None) => break,
            // Binary, Ping, Pong and raw frames carry nothing for us.
            Event::Incoming(Some(Ok(_))) => continue,

            Event::Push(Ok(snapshot)) => {
                let Some(sub) = subscription.as_mut() else {
                    continue;
                };
                if !sub.advance(&snapshot) {
                    continue;
                }
                vec![ServerMessage::DraftState {
                    snapshot: (*snapshot).clone(),
                }]
            }
            Event::Push(Err(RecvError::Lagged(missed))) => {
                let Some(sub) = subscription.as_mut() else {
                    continue;
                };
                warn!(
                    "Client {addr} lagged {missed} snapshots on draft {}, resending current state",
                    sub.draft_id
                );
                sub.rx = sub.rx.resubscribe();
                match service.snapshot(sub.draft_id) {
                    Ok(snapshot) if sub.advance(&snapshot) => {
                        vec![ServerMessage::DraftState { snapshot }]
                    }
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Failed to rebuild snapshot for {addr}: {e}");
                        continue;
                    }
                }
            }
            Event::Push(Err(RecvError::Closed)) => {
                subscription = None;
                continue;
            }
        };

        if let Err(e) = send_all(&mut write, outgoing).await {
            debug!("Stopped writing to {addr}: {e}");
            break;
        }
    }
}

async fn next_push(
    subscription: &mut Option<Subscription>,
) -> Result<Arc<DraftSnapshot>, RecvError> {
    match subscription {
        Some(sub) => sub.rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn send_all<Si>(write: &mut Si, messages: Vec<ServerMessage>) -> Result<(), WsError>
where
    Si: Sink<Message, Error = WsError> + Unpin,
{
    for message in messages {
        match message.to_json() {
            Ok(json) => write.send(Message::Text(json.into())).await?,
            Err(e) => warn!("Failed to encode server message: {e:#}"),
        }
    }
    Ok(())
}
