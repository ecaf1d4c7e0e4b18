//! One MCP server subprocess and the JSON-RPC session over its stdio.
//!
//! A [`Connection`] writes newline-terminated requests to the server's stdin
//! and matches responses read from stdout back to their callers by id, so
//! responses may arrive in any order. Every caller waiting on a response gets
//! exactly one completion: the response, or [`McpError::NotConnected`] when
//! the transport goes away first.
//!
//! A connection never reconnects itself. When the stdout of a connection that
//! completed its handshake closes, a [`ConnectionEvent::Terminated`] is sent
//! and the owner decides what happens next.

use std::collections::HashMap;
use std::fmt;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use mcpvisor_core::{McpError, Resource, ServerConfig, Tool};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::content::render_tool_result;
use crate::deadline::run_with_deadline;
use crate::discovery::{parse_resources, parse_tools};
use crate::framing::LineBuffer;
use crate::path::child_environment;
use crate::protocol::{
    Incoming, InitializeResult, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    PROTOCOL_VERSION, ServerInfo, encode_line, parse_incoming,
};
use crate::resolver::resolve_executable;
use crate::shutdown::shutdown_child;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

const READ_CHUNK: usize = 8 * 1024;
const LOGGED_LINE_MAX: usize = 200;

/// Asynchronous notices from a connection to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// The server's stdout closed after a successful handshake.
    Terminated {
        server_name: String,
        connection_id: u64,
        reason: String,
    },
    /// The server wrote something that looks like an error to stderr.
    /// The connection stays up.
    StderrError {
        server_name: String,
        connection_id: u64,
        line: String,
    },
}

impl ConnectionEvent {
    pub fn server_name(&self) -> &str {
        match self {
            Self::Terminated { server_name, .. } | Self::StderrError { server_name, .. } => {
                server_name
            }
        }
    }

    pub const fn connection_id(&self) -> u64 {
        match self {
            Self::Terminated { connection_id, .. } | Self::StderrError { connection_id, .. } => {
                *connection_id
            }
        }
    }
}

pub type ConnectionEventSender = mpsc::UnboundedSender<ConnectionEvent>;

/// Knobs for a single connection.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Bound on `initialize` plus the `initialized` notification.
    pub handshake_timeout: Duration,
    pub client_name: String,
    pub client_version: String,
    pub protocol_version: String,
    /// Time between SIGTERM and SIGKILL when stopping the server.
    pub shutdown_grace: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            handshake_timeout: Duration::from_secs(5),
            client_name: "mcpvisor".to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            protocol_version: PROTOCOL_VERSION.to_string(),
            shutdown_grace: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
}

type PendingSender = oneshot::Sender<Result<JsonRpcResponse, McpError>>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

struct Session {
    state: ConnectionState,
    /// Bumped whenever a transport is attached or torn down. Reader tasks
    /// carry the generation they were started for and go quiet once it moves.
    generation: u64,
    /// No live transport: nothing new may be registered.
    closed: bool,
    pending: HashMap<u64, PendingSender>,
}

struct Shared {
    server_name: String,
    connection_id: u64,
    session: Mutex<Session>,
    events: Option<ConnectionEventSender>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Session> {
        lock(&self.session)
    }

    fn emit(&self, event: ConnectionEvent) {
        if let Some(events) = &self.events {
            // Receiver gone means nobody supervises us anymore
            let _ = events.send(event);
        }
    }

    fn dispatch_line(&self, line: &str, generation: u64) {
        match parse_incoming(line) {
            Ok(Incoming::Response(response)) => {
                let Some(id) = response.id else {
                    warn!(
                        server_name = %self.server_name,
                        line = %clip(line),
                        "Dropping response without id"
                    );
                    return;
                };

                let waiter = {
                    let mut session = self.lock();
                    if session.generation != generation {
                        return;
                    }
                    session.pending.remove(&id)
                };

                match waiter {
                    Some(waiter) => {
                        // The caller may have given up (deadline); that is fine
                        let _ = waiter.send(Ok(response));
                    }
                    None => warn!(
                        server_name = %self.server_name,
                        id,
                        "Dropping response with no pending request"
                    ),
                }
            }
            Ok(Incoming::ServerMessage { method }) => {
                debug!(
                    server_name = %self.server_name,
                    method = %method,
                    "Ignoring server-initiated message"
                );
            }
            Err(reason) => {
                warn!(
                    server_name = %self.server_name,
                    reason = %reason,
                    line = %clip(line),
                    "Dropping unparseable line from server"
                );
            }
        }
    }

    fn transport_closed(&self, generation: u64, reason: &str) {
        let (was_connected, pending) = {
            let mut session = self.lock();
            if session.generation != generation || session.closed {
                return;
            }
            session.closed = true;
            let was_connected = session.state == ConnectionState::Connected;
            session.state = ConnectionState::Unconnected;
            (was_connected, std::mem::take(&mut session.pending))
        };

        fail_all(pending);

        if was_connected {
            warn!(server_name = %self.server_name, reason = %reason, "MCP server terminated");
            self.emit(ConnectionEvent::Terminated {
                server_name: self.server_name.clone(),
                connection_id: self.connection_id,
                reason: reason.to_string(),
            });
        } else {
            debug!(server_name = %self.server_name, reason = %reason, "Transport closed");
        }
    }
}

/// Removes a pending entry when its caller stops waiting, for whatever reason.
struct PendingGuard<'a> {
    shared: &'a Shared,
    id: u64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock().pending.remove(&self.id);
    }
}

/// A JSON-RPC session with one MCP server.
pub struct Connection {
    config: ServerConfig,
    options: ConnectionOptions,
    shared: Arc<Shared>,
    next_request_id: AtomicU64,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    child: Mutex<Option<Child>>,
    readers: Mutex<Vec<JoinHandle<()>>>,
    server_info: Mutex<Option<ServerInfo>>,
}

impl Connection {
    /// Create an unconnected connection for `config`.
    ///
    /// `events` receives [`ConnectionEvent`]s; pass `None` for throwaway
    /// connections nobody supervises.
    pub fn new(
        config: ServerConfig,
        options: ConnectionOptions,
        events: Option<ConnectionEventSender>,
    ) -> Self {
        let shared = Shared {
            server_name: config.name.clone(),
            connection_id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            session: Mutex::new(Session {
                state: ConnectionState::Unconnected,
                generation: 0,
                closed: true,
                pending: HashMap::new(),
            }),
            events,
        };

        Self {
            config,
            options,
            shared: Arc::new(shared),
            next_request_id: AtomicU64::new(1),
            writer: tokio::sync::Mutex::new(None),
            child: Mutex::new(None),
            readers: Mutex::new(Vec::new()),
            server_info: Mutex::new(None),
        }
    }

    /// Process-unique identity of this connection.
    pub fn id(&self) -> u64 {
        self.shared.connection_id
    }

    pub fn server_name(&self) -> &str {
        &self.config.name
    }

    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.lock().state
    }

    pub fn is_connected(&self) -> bool {
        let session = self.shared.lock();
        session.state == ConnectionState::Connected && !session.closed
    }

    /// `serverInfo` from the last successful handshake.
    pub fn server_info(&self) -> Option<ServerInfo> {
        lock(&self.server_info).clone()
    }

    /// Launch the server process and perform the MCP handshake.
    ///
    /// Any previous process is stopped first. On failure nothing is left
    /// running and the connection is back to [`ConnectionState::Unconnected`].
    pub async fn connect(&self) -> Result<(), McpError> {
        self.disconnect().await;
        self.set_state(ConnectionState::Connecting);

        let result = self.spawn_and_handshake().await;
        self.finish_connect(result).await
    }

    /// Perform the handshake over an existing pair of pipes instead of a
    /// subprocess. Same timeout and cleanup rules as [`Connection::connect`].
    pub async fn connect_with_streams<W, R>(&self, writer: W, reader: R) -> Result<(), McpError>
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        self.disconnect().await;
        self.set_state(ConnectionState::Connecting);

        self.attach(Box::new(writer), reader).await;
        let result = self.handshake().await;
        self.finish_connect(result).await
    }

    /// Stop the server and fail every pending request with `NotConnected`.
    ///
    /// Idempotent. The process is stopped on a background task so this
    /// returns without waiting out the shutdown grace period.
    pub async fn disconnect(&self) {
        for handle in lock(&self.readers).drain(..) {
            handle.abort();
        }

        let (was_live, pending) = {
            let mut session = self.shared.lock();
            let was_live = session.state != ConnectionState::Unconnected || !session.closed;
            session.generation += 1;
            session.closed = true;
            session.state = ConnectionState::Unconnected;
            (was_live, std::mem::take(&mut session.pending))
        };
        fail_all(pending);

        let child = lock(&self.child).take();
        if let Some(child) = child {
            let grace = self.options.shutdown_grace;
            let server_name = self.config.name.clone();
            tokio::spawn(async move {
                match shutdown_child(child, grace).await {
                    Ok(status) => debug!(server_name = %server_name, status = %status, "MCP server stopped"),
                    Err(e) => warn!(server_name = %server_name, error = %e, "Failed to stop MCP server"),
                }
            });
        }

        let writer = self.writer.lock().await.take();
        if let Some(mut writer) = writer {
            let _ = writer.shutdown().await;
        }

        *lock(&self.server_info) = None;

        if was_live {
            debug!(server_name = %self.config.name, "Disconnected");
        }
    }

    /// Send a request and wait for its result.
    ///
    /// A JSON-RPC error object in the response becomes [`McpError::Rpc`].
    /// There is no per-request timeout; wrap the call in
    /// [`run_with_deadline`] to bound it.
    pub async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value, McpError> {
        self.round_trip(method, params).await?.into_result()
    }

    /// Send a notification. Nothing is awaited besides the write.
    pub async fn send_notification(&self, method: &str, params: Option<Value>) -> Result<(), McpError> {
        let line = encode_line(&JsonRpcNotification::new(method, params))?;

        let mut writer = self.writer.lock().await;
        let stream = writer.as_mut().ok_or(McpError::NotConnected)?;
        write_line(stream, &line).await
    }

    pub async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        let result = self.send_request("tools/list", None).await?;
        parse_tools(self.server_name(), &result)
    }

    pub async fn list_resources(&self) -> Result<Vec<Resource>, McpError> {
        let result = self.send_request("resources/list", None).await?;
        parse_resources(self.server_name(), &result)
    }

    /// Invoke a tool and render its content as text.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<String, McpError> {
        let arguments = if arguments.is_null() { json!({}) } else { arguments };
        let result = self
            .send_request("tools/call", Some(json!({ "name": name, "arguments": arguments })))
            .await?;
        render_tool_result(&result)
    }

    async fn round_trip(&self, method: &str, params: Option<Value>) -> Result<JsonRpcResponse, McpError> {
        let (receiver, _guard) = {
            let mut writer = self.writer.lock().await;
            let Some(stream) = writer.as_mut() else {
                return Err(McpError::NotConnected);
            };

            let id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
            let line = encode_line(&JsonRpcRequest::new(id, method, params))?;

            let (sender, receiver) = oneshot::channel();
            let guard = self.register(id, sender)?;
            write_line(stream, &line).await?;

            debug!(server_name = %self.config.name, id, method, "Sent request");
            (receiver, guard)
        };

        receiver.await.unwrap_or(Err(McpError::NotConnected))
    }

    fn register(&self, id: u64, sender: PendingSender) -> Result<PendingGuard<'_>, McpError> {
        let mut session = self.shared.lock();
        if session.closed {
            return Err(McpError::NotConnected);
        }
        session.pending.insert(id, sender);

        Ok(PendingGuard {
            shared: &self.shared,
            id,
        })
    }

    async fn spawn_and_handshake(&self) -> Result<(), McpError> {
        let command = self.config.command.clone();
        let resolution = tokio::task::spawn_blocking(move || resolve_executable(&command))
            .await
            .map_err(|e| McpError::Transport(format!("executable lookup failed: {e}")))?
            .map_err(|e| McpError::ExecutableNotFound(e.to_string()))?;

        for warning in &resolution.warnings {
            warn!(server_name = %self.config.name, "{warning}");
        }
        debug!(
            server_name = %self.config.name,
            path = %resolution.path.display(),
            attempts = resolution.attempts.len(),
            "Resolved server executable"
        );

        let mut child = Command::new(&resolution.path)
            .args(&self.config.args)
            .envs(child_environment(&resolution.path, &self.config.env))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                McpError::Transport(format!("failed to start {}: {e}", resolution.path.display()))
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("server stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("server stdout unavailable".into()))?;
        if let Some(stderr) = child.stderr.take() {
            let handle = tokio::spawn(read_stderr(Arc::clone(&self.shared), stderr));
            lock(&self.readers).push(handle);
        }

        info!(
            server_name = %self.config.name,
            pid = child.id().unwrap_or_default(),
            "Started MCP server"
        );
        *lock(&self.child) = Some(child);

        self.attach(Box::new(stdin), stdout).await;
        self.handshake().await
    }

    async fn attach<R>(&self, writer: BoxedWriter, reader: R)
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        let generation = {
            let mut session = self.shared.lock();
            session.generation += 1;
            session.closed = false;
            session.generation
        };

        *self.writer.lock().await = Some(writer);

        let handle = tokio::spawn(read_stdout(Arc::clone(&self.shared), reader, generation));
        lock(&self.readers).push(handle);
    }

    async fn handshake(&self) -> Result<(), McpError> {
        let params = json!({
            "protocolVersion": self.options.protocol_version,
            "capabilities": {
                "roots": { "listChanged": true },
                "sampling": {}
            },
            "clientInfo": {
                "name": self.options.client_name,
                "version": self.options.client_version
            }
        });

        let exchange = async {
            let result = self.send_request("initialize", Some(params)).await?;
            let init: InitializeResult = serde_json::from_value(result)
                .map_err(|e| McpError::InvalidResponse(format!("initialize result: {e}")))?;
            self.send_notification("notifications/initialized", None).await?;
            Ok::<_, McpError>(init)
        };

        let init = match run_with_deadline(self.options.handshake_timeout, exchange).await {
            Ok(Ok(init)) => init,
            Ok(Err(McpError::Rpc { message, .. })) => {
                return Err(McpError::InitializationFailed(message));
            }
            Ok(Err(McpError::NotConnected)) => {
                return Err(McpError::InitializationFailed(
                    "server closed its output during the handshake".into(),
                ));
            }
            Ok(Err(e)) => return Err(e),
            Err(elapsed) => {
                return Err(McpError::InitializationFailed(format!(
                    "no initialize response: {elapsed}"
                )));
            }
        };

        if let Some(version) = &init.protocol_version {
            if *version != self.options.protocol_version {
                debug!(
                    server_name = %self.config.name,
                    server_version = %version,
                    "Server negotiated a different protocol version"
                );
            }
        }
        *lock(&self.server_info) = init.server_info;

        Ok(())
    }

    async fn finish_connect(&self, result: Result<(), McpError>) -> Result<(), McpError> {
        let result = result.and_then(|()| self.mark_connected());

        match result {
            Ok(()) => {
                info!(
                    server_name = %self.config.name,
                    connection_id = self.id(),
                    "MCP server connected"
                );
                Ok(())
            }
            Err(e) => {
                debug!(server_name = %self.config.name, error = %e, "Connect failed");
                self.disconnect().await;
                Err(e)
            }
        }
    }

    fn mark_connected(&self) -> Result<(), McpError> {
        let mut session = self.shared.lock();
        if session.closed || session.state != ConnectionState::Connecting {
            return Err(McpError::InitializationFailed(
                "server exited right after the handshake".into(),
            ));
        }
        session.state = ConnectionState::Connected;
        Ok(())
    }

    fn set_state(&self, state: ConnectionState) {
        self.shared.lock().state = state;
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id())
            .field("server_name", &self.config.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for handle in lock(&self.readers).drain(..) {
            handle.abort();
        }
        // The child, if any, is killed by kill_on_drop
    }
}

async fn read_stdout<R>(shared: Arc<Shared>, mut reader: R, generation: u64)
where
    R: AsyncRead + Unpin,
{
    let mut lines = LineBuffer::new();
    let mut chunk = vec![0u8; READ_CHUNK];

    let reason = loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break "server closed stdout".to_string(),
            Ok(n) => {
                for line in lines.push(&chunk[..n]) {
                    shared.dispatch_line(&line, generation);
                }
            }
            Err(e) => break format!("stdout read failed: {e}"),
        }
    };

    shared.transport_closed(generation, &reason);
}

async fn read_stderr<R>(shared: Arc<Shared>, stderr: R)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if looks_like_error(line) {
            warn!(server_name = %shared.server_name, line = %line, "MCP server reported an error");
            shared.emit(ConnectionEvent::StderrError {
                server_name: shared.server_name.clone(),
                connection_id: shared.connection_id,
                line: line.to_string(),
            });
        } else {
            debug!(server_name = %shared.server_name, line = %line, "MCP server stderr");
        }
    }
}

async fn write_line(stream: &mut BoxedWriter, line: &str) -> Result<(), McpError> {
    stream
        .write_all(line.as_bytes())
        .await
        .map_err(|e| McpError::Transport(format!("write to server failed: {e}")))?;
    stream
        .flush()
        .await
        .map_err(|e| McpError::Transport(format!("flush to server failed: {e}")))
}

fn fail_all(pending: HashMap<u64, PendingSender>) {
    for waiter in pending.into_values() {
        let _ = waiter.send(Err(McpError::NotConnected));
    }
}

fn looks_like_error(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("error") || lower.contains("failed")
}

fn clip(line: &str) -> &str {
    match line.char_indices().nth(LOGGED_LINE_MAX) {
        Some((idx, _)) => &line[..idx],
        None => line,
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
