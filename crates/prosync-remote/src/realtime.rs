//! Realtime websocket client.
//!
//! One socket task per [`HttpRemote`](crate::HttpRemote) multiplexes every
//! subscription as a Phoenix channel topic. Subscriptions talk to the
//! task through a command channel: joins wait for their `phx_reply`,
//! releases send `phx_leave`. A dropped connection ends every open
//! subscription stream; it is not resubscribed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};

use prosync_types::realtime::{
    PHX_CLOSE, PHX_ERROR, PhoenixMessage, topic_for,
};
use prosync_types::{ChangeEvent, ChannelSpec};

use crate::error::excerpt;
use crate::{RemoteConfig, RemoteError, Subscription};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;

enum Command {
    Join {
        topic: String,
        spec: ChannelSpec,
        access_token: Option<String>,
        events: mpsc::UnboundedSender<ChangeEvent>,
        reply: oneshot::Sender<Result<(), RemoteError>>,
    },
    Leave {
        topic: String,
    },
}

/// Handle to the socket task. Dropping it shuts the task down.
pub(crate) struct RealtimeSocket {
    commands: mpsc::UnboundedSender<Command>,
    seq: AtomicU64,
    _shutdown: DropGuard,
}

impl RealtimeSocket {
    pub(crate) async fn connect(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let url = config.realtime_url();
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| RemoteError::Realtime(format!("connect failed: {}", e)))?;
        info!("Realtime socket connected to {}", config.url);

        let (commands, command_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();
        tokio::spawn(run_socket(ws, command_rx, config.heartbeat, shutdown.clone()));

        Ok(Self {
            commands,
            seq: AtomicU64::new(1),
            _shutdown: shutdown.drop_guard(),
        })
    }

    /// False once the socket task has exited.
    pub(crate) fn is_alive(&self) -> bool {
        !self.commands.is_closed()
    }

    pub(crate) async fn join(
        &self,
        spec: ChannelSpec,
        access_token: Option<String>,
        timeout: Duration,
    ) -> Result<Subscription, RemoteError> {
        let topic = topic_for(&spec, self.seq.fetch_add(1, Ordering::Relaxed));
        let label = spec.label();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();

        self.commands
            .send(Command::Join {
                topic: topic.clone(),
                spec,
                access_token,
                events: events_tx,
                reply: reply_tx,
            })
            .map_err(|_| RemoteError::Realtime("socket closed".into()))?;

        match tokio::time::timeout(timeout, reply_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => return Err(e),
            Ok(Err(_)) => return Err(RemoteError::Realtime("socket closed during join".into())),
            Err(_) => {
                let _ = self.commands.send(Command::Leave { topic });
                return Err(RemoteError::Realtime(format!("join of {} timed out", label)));
            }
        }

        debug!("Joined {}", topic);
        let commands = self.commands.clone();
        let leave_topic = topic;
        Ok(Subscription::new(label, events_rx, move || {
            let _ = commands.send(Command::Leave { topic: leave_topic });
        }))
    }
}

struct PendingJoin {
    topic: String,
    events: mpsc::UnboundedSender<ChangeEvent>,
    reply: oneshot::Sender<Result<(), RemoteError>>,
}

/// Per-connection routing state owned by the socket task.
#[derive(Default)]
struct Router {
    next_ref: u64,
    /// ref -> join waiting for its reply
    pending: HashMap<String, PendingJoin>,
    /// topic -> subscriber
    topics: HashMap<String, mpsc::UnboundedSender<ChangeEvent>>,
}

impl Router {
    fn next_ref(&mut self) -> String {
        self.next_ref += 1;
        self.next_ref.to_string()
    }

    fn handle_frame(&mut self, frame: PhoenixMessage) {
        if let Some(status) = frame.reply_status() {
            let Some(join) = frame
                .reference
                .as_ref()
                .and_then(|r| self.pending.remove(r))
            else {
                // Replies to heartbeats and leaves
                trace!("Unmatched reply on {}", frame.topic);
                return;
            };

            if status == "ok" {
                self.topics.insert(join.topic, join.events);
                let _ = join.reply.send(Ok(()));
            } else {
                let reason = frame
                    .payload
                    .get("response")
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| status.to_string());
                warn!("Join of {} rejected: {}", join.topic, reason);
                let _ = join.reply.send(Err(RemoteError::Realtime(format!(
                    "join rejected: {}",
                    reason
                ))));
            }
            return;
        }

        if frame.event == PHX_ERROR || frame.event == PHX_CLOSE {
            if self.topics.remove(&frame.topic).is_some() {
                warn!("Channel {} closed by server ({})", frame.topic, frame.event);
            }
            return;
        }

        if let Some(event) = frame.change_event() {
            let delivered = match self.topics.get(&frame.topic) {
                Some(tx) => tx.send(event).is_ok(),
                None => {
                    trace!("Change for unknown topic {}", frame.topic);
                    return;
                }
            };
            if !delivered {
                self.topics.remove(&frame.topic);
            }
        }
    }

    /// Forget a topic. Returns whether the server knows about it and
    /// needs a leave frame.
    fn forget(&mut self, topic: &str) -> bool {
        let was_joined = self.topics.remove(topic).is_some();
        let before = self.pending.len();
        self.pending.retain(|_, join| join.topic != topic);
        was_joined || self.pending.len() != before
    }
}

async fn send_frame(sink: &mut WsSink, frame: &PhoenixMessage) -> Result<(), RemoteError> {
    let text = serde_json::to_string(frame)?;
    sink.send(Message::Text(text.into()))
        .await
        .map_err(|e| RemoteError::Realtime(e.to_string()))
}

async fn run_socket(
    ws: WsStream,
    mut commands: mpsc::UnboundedReceiver<Command>,
    heartbeat: Duration,
    shutdown: CancellationToken,
) {
    let (mut sink, mut stream): (WsSink, SplitStream<WsStream>) = ws.split();
    let mut router = Router::default();

    let mut ticker = tokio::time::interval(heartbeat);
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                debug!("Realtime socket shutting down");
                let _ = sink.send(Message::Close(None)).await;
                break;
            }
            cmd = commands.recv() => {
                let Some(cmd) = cmd else { break };
                match cmd {
                    Command::Join { topic, spec, access_token, events, reply } => {
                        let r = router.next_ref();
                        let frame = PhoenixMessage::join(&topic, &spec, access_token.as_deref(), r.clone());
                        if let Err(e) = send_frame(&mut sink, &frame).await {
                            let _ = reply.send(Err(e));
                            break;
                        }
                        router.pending.insert(r, PendingJoin { topic, events, reply });
                    }
                    Command::Leave { topic } => {
                        if router.forget(&topic) {
                            let r = router.next_ref();
                            if send_frame(&mut sink, &PhoenixMessage::leave(&topic, r)).await.is_err() {
                                break;
                            }
                            debug!("Left {}", topic);
                        }
                    }
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<PhoenixMessage>(text.as_str()) {
                            Ok(frame) => router.handle_frame(frame),
                            Err(e) => warn!("Bad realtime frame: {} -- raw: {}", e, excerpt(text.as_str(), 200)),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        warn!("Realtime socket closed by server");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!("Realtime socket error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            _ = ticker.tick() => {
                let r = router.next_ref();
                if send_frame(&mut sink, &PhoenixMessage::heartbeat(r)).await.is_err() {
                    warn!("Heartbeat failed, dropping realtime socket");
                    break;
                }
            }
        }
    }

    // Dropping the router closes every subscriber stream and fails
    // pending joins.
    for (_, join) in router.pending.drain() {
        let _ = join.reply.send(Err(RemoteError::Realtime("socket closed".into())));
    }
    info!("Realtime socket task exited ({} open topics dropped)", router.topics.len());
}
