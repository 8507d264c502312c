//! Subscription connection over WebSocket.
//!
//! One background task owns the socket. [`SubscriptionClient`] handles talk to
//! it through a command channel, and every running subscription is a
//! [`SubscriptionStream`] fed by that task.
//!
//! The `connection_init` payload is fixed when the client is created. Automatic
//! reconnects reuse it unchanged; [`SubscriptionClient::reconnect`] replaces it.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use authlink_application::ports::{ExecutionStream, SubscriptionError, SubscriptionForwarder};
use authlink_domain::websocket::GRAPHQL_WS_PROTOCOL;
use authlink_domain::{
    ConnectionParams, ConnectionState, ExecutionResult, Operation, SubscriptionConfig,
    WebSocketError,
};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::protocol::{ClientMessage, ServerMessage, describe_payload};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;
type ResultSink = mpsc::UnboundedSender<Result<ExecutionResult, SubscriptionError>>;

/// Longest wait between reconnect attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Delay before reconnect attempt `attempt` (1-based).
fn backoff(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(5);
    Duration::from_millis(1000 << exponent).min(MAX_BACKOFF)
}

enum Command {
    Start {
        id: String,
        payload: serde_json::Value,
        sink: ResultSink,
    },
    Stop {
        id: String,
    },
    Reconnect {
        params: ConnectionParams,
    },
    Close,
}

/// Handle to the subscription connection. Clones share the connection.
///
/// The connection closes once [`SubscriptionClient::close`] is called or every
/// handle and stream has been dropped.
#[derive(Clone)]
pub struct SubscriptionClient {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    next_id: Arc<AtomicU64>,
}

impl SubscriptionClient {
    /// Starts connecting in the background.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or no tokio runtime is
    /// running.
    pub fn connect(config: SubscriptionConfig) -> Result<Self, WebSocketError> {
        config.validate()?;
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| WebSocketError::ConnectionFailed(e.to_string()))?;

        let (commands, receiver) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(ConnectionState::Disconnected);
        let driver = Driver {
            config,
            commands: receiver,
            state: state_tx,
            active: HashMap::new(),
            reconnects: 0,
        };
        runtime.spawn(driver.run());

        Ok(Self {
            commands,
            state,
            next_id: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Receiver for connection state changes.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Waits until the connection is acknowledged.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or is closed first.
    pub async fn wait_until_connected(&self) -> Result<(), WebSocketError> {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|s| s.is_connected() || s.is_terminal())
            .await
            .map_err(|_| WebSocketError::NotConnected)?;
        if reached.is_connected() {
            Ok(())
        } else {
            Err(WebSocketError::NotConnected)
        }
    }

    /// Starts a subscription.
    ///
    /// # Errors
    ///
    /// Returns [`WebSocketError::NotConnected`] if the connection task has
    /// ended.
    pub fn subscribe(&self, operation: &Operation) -> Result<SubscriptionStream, WebSocketError> {
        let id = (self.next_id.fetch_add(1, Ordering::Relaxed) + 1).to_string();
        let (sink, results) = mpsc::unbounded_channel();
        self.commands
            .send(Command::Start {
                id: id.clone(),
                payload: operation.request.body(),
                sink,
            })
            .map_err(|_| WebSocketError::NotConnected)?;
        tracing::debug!(%id, key = %operation.key(), "subscription started");

        Ok(SubscriptionStream {
            id,
            results,
            commands: self.commands.clone(),
        })
    }

    /// Re-establishes the connection with new handshake parameters.
    ///
    /// Running subscriptions are restarted on the new connection. Streams
    /// that were ended when the connection reached
    /// [`ConnectionState::Failed`] stay ended; subscribe again after
    /// reconnecting.
    ///
    /// # Errors
    ///
    /// Returns [`WebSocketError::NotConnected`] if the connection task has
    /// ended.
    pub fn reconnect(&self, params: ConnectionParams) -> Result<(), WebSocketError> {
        self.commands
            .send(Command::Reconnect { params })
            .map_err(|_| WebSocketError::NotConnected)
    }

    /// Closes the connection; running subscriptions end.
    pub fn close(&self) {
        let _ = self.commands.send(Command::Close);
    }
}

impl std::fmt::Debug for SubscriptionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionClient")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl SubscriptionForwarder for SubscriptionClient {
    fn forward(&self, operation: &Operation) -> Result<ExecutionStream, SubscriptionError> {
        Ok(self.subscribe(operation)?.boxed())
    }
}

/// Results of one running subscription. Dropping it stops the subscription.
pub struct SubscriptionStream {
    id: String,
    results: mpsc::UnboundedReceiver<Result<ExecutionResult, SubscriptionError>>,
    commands: mpsc::UnboundedSender<Command>,
}

impl SubscriptionStream {
    /// Operation id on the connection.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Stream for SubscriptionStream {
    type Item = Result<ExecutionResult, SubscriptionError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.results.poll_recv(cx)
    }
}

impl Drop for SubscriptionStream {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Stop {
            id: std::mem::take(&mut self.id),
        });
    }
}

impl std::fmt::Debug for SubscriptionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionStream")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

struct ActiveOperation {
    payload: serde_json::Value,
    sink: ResultSink,
}

enum Exit {
    Closed,
    Reconnect,
    Dropped(WebSocketError),
}

enum Flow {
    Reconnect,
    Close,
}

struct Driver {
    config: SubscriptionConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    state: watch::Sender<ConnectionState>,
    active: HashMap<String, ActiveOperation>,
    reconnects: u32,
}

impl Driver {
    async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting);
            let error = match self.connect().await {
                Ok(socket) => {
                    self.reconnects = 0;
                    match self.serve(socket).await {
                        Exit::Closed => return self.finish(),
                        Exit::Reconnect => continue,
                        Exit::Dropped(error) => error,
                    }
                }
                Err(error) => error,
            };
            tracing::warn!(url = %self.config.url, %error, "subscription connection lost");

            let flow = if self.config.may_reconnect(self.reconnects) {
                self.reconnects += 1;
                self.set_state(ConnectionState::Reconnecting);
                self.wait(backoff(self.reconnects)).await
            } else {
                self.set_state(ConnectionState::Failed);
                self.fail_all(&error);
                self.idle().await
            };
            match flow {
                Flow::Reconnect => {}
                Flow::Close => return self.finish(),
            }
        }
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(?previous, ?state, "subscription connection state");
        }
    }

    fn finish(&mut self) {
        self.active.clear();
        self.set_state(ConnectionState::Closed);
        tracing::debug!(url = %self.config.url, "subscription connection closed");
    }

    /// Ends every active stream with `error`. They are not restarted by a
    /// later reconnect.
    fn fail_all(&mut self, error: &WebSocketError) {
        for (_, operation) in self.active.drain() {
            let _ = operation.sink.send(Err(error.clone().into()));
        }
    }

    async fn connect(&self) -> Result<Socket, WebSocketError> {
        let mut request = self
            .config
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| WebSocketError::InvalidUrl(e.to_string()))?;
        request.headers_mut().insert(
            "Sec-WebSocket-Protocol",
            HeaderValue::from_static(GRAPHQL_WS_PROTOCOL),
        );

        let timeout = self.config.connect_timeout();
        let (mut socket, _) = tokio::time::timeout(timeout, connect_async(request))
            .await
            .map_err(|_| WebSocketError::Timeout)?
            .map_err(|e| WebSocketError::ConnectionFailed(e.to_string()))?;

        let init = ClientMessage::ConnectionInit {
            payload: self.config.connection_params.clone(),
        };
        socket
            .send(Message::Text(init.to_text()))
            .await
            .map_err(|e| WebSocketError::SendFailed(e.to_string()))?;

        tokio::time::timeout(timeout, await_ack(&mut socket))
            .await
            .map_err(|_| WebSocketError::Timeout)??;
        Ok(socket)
    }

    async fn serve(&mut self, mut socket: Socket) -> Exit {
        self.set_state(ConnectionState::Connected);
        for (id, operation) in &self.active {
            let start = ClientMessage::Start {
                id: id.clone(),
                payload: operation.payload.clone(),
            };
            if let Err(error) = send(&mut socket, &start).await {
                return Exit::Dropped(error);
            }
        }

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let result = match command {
                        None | Some(Command::Close) => {
                            terminate(&mut socket).await;
                            return Exit::Closed;
                        }
                        Some(Command::Reconnect { params }) => {
                            self.config.connection_params = params;
                            terminate(&mut socket).await;
                            return Exit::Reconnect;
                        }
                        Some(Command::Start { id, payload, sink }) => {
                            let start = ClientMessage::Start { id: id.clone(), payload: payload.clone() };
                            self.active.insert(id, ActiveOperation { payload, sink });
                            send(&mut socket, &start).await
                        }
                        Some(Command::Stop { id }) => {
                            if self.active.remove(&id).is_some() {
                                send(&mut socket, &ClientMessage::Stop { id }).await
                            } else {
                                Ok(())
                            }
                        }
                    };
                    if let Err(error) = result {
                        return Exit::Dropped(error);
                    }
                }
                frame = socket.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.dispatch(&text),
                    Some(Ok(Message::Close(_))) | None => {
                        return Exit::Dropped(WebSocketError::ConnectionClosed(
                            "server closed the connection".to_string(),
                        ));
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Exit::Dropped(WebSocketError::ConnectionClosed(e.to_string())),
                },
            }
        }
    }

    fn dispatch(&mut self, text: &str) {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(error) => {
                tracing::debug!(%error, "ignoring unrecognized subscription message");
                return;
            }
        };
        match message {
            ServerMessage::Data { id, payload } => {
                if let Some(operation) = self.active.get(&id) {
                    let _ = operation.sink.send(Ok(payload));
                }
            }
            ServerMessage::Error { id, payload } => {
                if let Some(operation) = self.active.remove(&id) {
                    let error = WebSocketError::Protocol(describe_payload(&payload));
                    let _ = operation.sink.send(Err(error.into()));
                }
            }
            ServerMessage::Complete { id } => {
                self.active.remove(&id);
            }
            ServerMessage::ConnectionError { payload } => {
                let reason = payload.as_ref().map(describe_payload).unwrap_or_default();
                tracing::warn!(%reason, "subscription server reported a connection error");
            }
            ServerMessage::ConnectionAck { .. } | ServerMessage::KeepAlive => {}
        }
    }

    /// Waits out a reconnect delay while still taking commands.
    async fn wait(&mut self, delay: Duration) -> Flow {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);
        loop {
            tokio::select! {
                () = &mut sleep => return Flow::Reconnect,
                command = self.commands.recv() => {
                    if let Some(flow) = self.offline_command(command, true) {
                        return flow;
                    }
                }
            }
        }
    }

    /// Waits for an explicit reconnect or close after giving up.
    async fn idle(&mut self) -> Flow {
        loop {
            let command = self.commands.recv().await;
            if let Some(flow) = self.offline_command(command, false) {
                return flow;
            }
        }
    }

    fn offline_command(&mut self, command: Option<Command>, queue: bool) -> Option<Flow> {
        match command {
            None | Some(Command::Close) => Some(Flow::Close),
            Some(Command::Reconnect { params }) => {
                self.config.connection_params = params;
                self.reconnects = 0;
                Some(Flow::Reconnect)
            }
            Some(Command::Start { id, payload, sink }) => {
                if queue {
                    self.active.insert(id, ActiveOperation { payload, sink });
                } else {
                    let _ = sink.send(Err(WebSocketError::NotConnected.into()));
                }
                None
            }
            Some(Command::Stop { id }) => {
                self.active.remove(&id);
                None
            }
        }
    }
}

async fn send(socket: &mut Socket, message: &ClientMessage) -> Result<(), WebSocketError> {
    socket
        .send(Message::Text(message.to_text()))
        .await
        .map_err(|e| WebSocketError::SendFailed(e.to_string()))
}

async fn terminate(socket: &mut Socket) {
    let _ = send(socket, &ClientMessage::ConnectionTerminate).await;
    let _ = socket.close(None).await;
}

async fn await_ack(socket: &mut Socket) -> Result<(), WebSocketError> {
    while let Some(frame) = socket.next().await {
        let frame = frame.map_err(|e| WebSocketError::ConnectionFailed(e.to_string()))?;
        let Message::Text(text) = frame else {
            continue;
        };
        match ServerMessage::parse(&text) {
            Ok(ServerMessage::ConnectionAck { .. }) => return Ok(()),
            Ok(ServerMessage::ConnectionError { payload }) => {
                let reason = payload.as_ref().map(describe_payload).unwrap_or_default();
                return Err(WebSocketError::ConnectionRejected(reason));
            }
            Ok(_) | Err(_) => {}
        }
    }
    Err(WebSocketError::ConnectionClosed(
        "closed before connection_ack".to_string(),
    ))
}
