//! In-memory MCP servers and a connector that hands them out.
//!
//! Each fake server speaks newline-delimited JSON-RPC over a duplex pipe, so
//! the supervisor runs its real connection code without spawning processes.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mcpvisor_mcp::{
    BackoffPolicy, Connection, ConnectionEventSender, ConnectionOptions, Connector, McpError,
    ServerConfig, SupervisorEvent, SupervisorEventEmitter, SupervisorSettings,
};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, WriteHalf, duplex, split};
use tokio::sync::Notify;

/// What a fake server offers.
#[derive(Debug, Default)]
pub struct ServerScript {
    tools: Mutex<Vec<Value>>,
    /// Tool name to artificial latency of `tools/call`.
    delays: Mutex<HashMap<String, Duration>>,
}

impl ServerScript {
    pub fn with_tools(names: &[&str]) -> Arc<Self> {
        let script = Self::default();
        script.set_tools(names);
        Arc::new(script)
    }

    pub fn set_tools(&self, names: &[&str]) {
        let tools = names.iter().map(|name| tool_descriptor(name)).collect();
        *self.tools.lock().unwrap() = tools;
    }

    pub fn set_raw_tools(&self, tools: Vec<Value>) {
        *self.tools.lock().unwrap() = tools;
    }

    pub fn delay(&self, tool: &str, latency: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(tool.to_string(), latency);
    }

    fn tools(&self) -> Vec<Value> {
        self.tools.lock().unwrap().clone()
    }

    fn latency(&self, tool: &str) -> Option<Duration> {
        self.delays.lock().unwrap().get(tool).copied()
    }
}

pub fn tool_descriptor(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("The {name} tool"),
        "inputSchema": {
            "type": "object",
            "properties": {"query": {"type": "string"}},
            "required": ["query"]
        }
    })
}

#[derive(Clone)]
pub enum Behavior {
    /// Every connect attempt fails before a process would start.
    Fail,
    Serve(Arc<ServerScript>),
    /// Completes the handshake, then the server exits before the connector
    /// hands the connection back.
    ExitAfterHandshake(Arc<ServerScript>),
}

/// Connector whose servers live in memory.
#[derive(Default)]
pub struct FakeConnector {
    behaviors: Mutex<HashMap<String, Behavior>>,
    attempts: Mutex<HashMap<String, u32>>,
    /// Latency of every connect attempt, before it succeeds or fails.
    connect_delays: Mutex<HashMap<String, Duration>>,
    kill_switches: Mutex<HashMap<String, Arc<Notify>>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, server_name: &str, behavior: Behavior) {
        self.behaviors
            .lock()
            .unwrap()
            .insert(server_name.to_string(), behavior);
    }

    pub fn delay_connect(&self, server_name: &str, latency: Duration) {
        self.connect_delays
            .lock()
            .unwrap()
            .insert(server_name.to_string(), latency);
    }

    pub fn attempts(&self, server_name: &str) -> u32 {
        self.attempts
            .lock()
            .unwrap()
            .get(server_name)
            .copied()
            .unwrap_or(0)
    }

    /// Make the most recent server for `server_name` exit.
    pub fn kill(&self, server_name: &str) {
        if let Some(switch) = self.kill_switches.lock().unwrap().get(server_name) {
            switch.notify_one();
        }
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        config: &ServerConfig,
        events: ConnectionEventSender,
    ) -> Result<Arc<Connection>, McpError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(config.name.clone())
            .or_default() += 1;

        let latency = self.connect_delays.lock().unwrap().get(&config.name).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let behavior = self.behaviors.lock().unwrap().get(&config.name).cloned();
        let (script, exit_early) = match behavior {
            Some(Behavior::Serve(script)) => (script, false),
            Some(Behavior::ExitAfterHandshake(script)) => (script, true),
            Some(Behavior::Fail) | None => {
                return Err(McpError::ExecutableNotFound(config.command.clone()));
            }
        };

        let (client, server) = duplex(64 * 1024);
        let kill = Arc::new(Notify::new());
        self.kill_switches
            .lock()
            .unwrap()
            .insert(config.name.clone(), Arc::clone(&kill));
        tokio::spawn(serve(server, script, Arc::clone(&kill)));

        let (client_read, client_write) = split(client);
        let options = ConnectionOptions {
            handshake_timeout: Duration::from_secs(2),
            ..ConnectionOptions::default()
        };
        let connection = Arc::new(Connection::new(config.clone(), options, Some(events)));
        connection
            .connect_with_streams(client_write, client_read)
            .await?;

        if exit_early {
            kill.notify_one();
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        Ok(connection)
    }
}

async fn serve(stream: DuplexStream, script: Arc<ServerScript>, kill: Arc<Notify>) {
    let (read, write) = split(stream);
    let writer = Arc::new(tokio::sync::Mutex::new(write));
    let mut lines = BufReader::new(read).lines();

    loop {
        let line = tokio::select! {
            () = kill.notified() => return,
            line = lines.next_line() => match line {
                Ok(Some(line)) => line,
                _ => return,
            },
        };

        let Ok(message) = serde_json::from_str::<Value>(&line) else {
            continue;
        };
        // Notifications get no reply
        let Some(id) = message.get("id").cloned() else {
            continue;
        };

        match message["method"].as_str().unwrap_or_default() {
            "initialize" => {
                let result = json!({
                    "protocolVersion": "2024-11-05",
                    "serverInfo": {"name": "fake", "version": "0.1.0"},
                    "capabilities": {"tools": {}}
                });
                reply(&writer, &id, result).await;
            }
            "tools/list" => reply(&writer, &id, json!({"tools": script.tools()})).await,
            "resources/list" => reply(&writer, &id, json!({"resources": []})).await,
            "tools/call" => {
                let name = message["params"]["name"].as_str().unwrap_or_default().to_string();
                let arguments = message["params"]["arguments"].clone();
                let latency = script.latency(&name);
                let writer = Arc::clone(&writer);
                tokio::spawn(async move {
                    if let Some(latency) = latency {
                        tokio::time::sleep(latency).await;
                    }
                    let text = format!("{name} {arguments}");
                    let result = json!({"content": [{"type": "text", "text": text}]});
                    reply(&writer, &id, result).await;
                });
            }
            _ => {
                let error = json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "Method not found"}});
                write_line(&writer, &error).await;
            }
        }
    }
}

async fn reply(writer: &tokio::sync::Mutex<WriteHalf<DuplexStream>>, id: &Value, result: Value) {
    let response = json!({"jsonrpc": "2.0", "id": id, "result": result});
    write_line(writer, &response).await;
}

async fn write_line(writer: &tokio::sync::Mutex<WriteHalf<DuplexStream>>, message: &Value) {
    let mut writer = writer.lock().await;
    // The client may already be gone
    let _ = writer.write_all(format!("{message}\n").as_bytes()).await;
    let _ = writer.flush().await;
}

/// Emitter that keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingEmitter {
    events: Mutex<Vec<SupervisorEvent>>,
}

impl RecordingEmitter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SupervisorEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Status labels seen for `server_name`, with repeats collapsed.
    pub fn status_trail(&self, server_name: &str) -> Vec<String> {
        let mut trail: Vec<String> = Vec::new();
        for event in self.events() {
            if let SupervisorEvent::StatusChanged {
                server_name: name,
                status,
            } = event
            {
                let label = status.status.label().to_string();
                if name == server_name && trail.last() != Some(&label) {
                    trail.push(label);
                }
            }
        }
        trail
    }
}

impl SupervisorEventEmitter for RecordingEmitter {
    fn emit(&self, event: SupervisorEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Fast settings: no backoff, short timeouts.
pub fn fast_settings() -> SupervisorSettings {
    SupervisorSettings {
        max_connect_attempts: 3,
        backoff: BackoffPolicy::none(),
        execution_timeout: Duration::from_secs(2),
        reconnect_delay: Duration::from_millis(50),
        handshake_timeout: Duration::from_secs(2),
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
