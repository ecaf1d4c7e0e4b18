//! Supervisor behavior against in-memory MCP servers.

mod common;

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use common::{
    Behavior, FakeConnector, RecordingEmitter, ServerScript, eventually, fast_settings,
    tool_descriptor,
};
use mcpvisor_mcp::{
    BackoffPolicy, ConfigStoreError, InMemoryConfigStore, McpError, ServerConfig, ServerConfigStore,
    ServerStatus, Supervisor, SupervisorEvent, SupervisorSettings,
};
use mockall::mock;
use serde_json::json;

struct Harness {
    supervisor: Supervisor,
    store: Arc<InMemoryConfigStore>,
    emitter: Arc<RecordingEmitter>,
    connector: Arc<FakeConnector>,
}

fn harness_with(configs: Vec<ServerConfig>, settings: SupervisorSettings) -> Harness {
    let store = Arc::new(InMemoryConfigStore::with_servers(configs.clone()));
    let emitter = RecordingEmitter::new();
    let connector = FakeConnector::new();
    let supervisor = Supervisor::with_options(
        configs,
        store.clone(),
        emitter.clone(),
        settings,
        connector.clone(),
    );

    Harness {
        supervisor,
        store,
        emitter,
        connector,
    }
}

fn harness(configs: Vec<ServerConfig>) -> Harness {
    harness_with(configs, fast_settings())
}

fn config(name: &str) -> ServerConfig {
    ServerConfig::new(name, format!("{name}-server"), vec![])
}

#[tokio::test]
async fn test_failing_server_is_auto_disabled() {
    let broken = config("broken");
    let h = harness(vec![broken.clone()]);
    h.connector.set("broken", Behavior::Fail);

    let result = h.supervisor.connect_to_server(&broken).await;

    assert!(matches!(result, Err(McpError::ExecutableNotFound(_))));
    assert_eq!(h.connector.attempts("broken"), 3);

    let status = h.supervisor.get_server_status("broken").await;
    assert_eq!(status.status, ServerStatus::Disabled);
    assert!(status.last_error.is_some());
    assert_eq!(status.tool_count, 0);
    assert!(h.supervisor.get_enabled_tools().await.is_empty());

    let stored = h.store.snapshot().await;
    assert!(!stored[0].enabled, "auto-disable must be persisted");
    assert!(h.emitter.events().iter().any(|e| matches!(
        e,
        SupervisorEvent::ServerAutoDisabled { server_name, .. } if server_name == "broken"
    )));
}

#[tokio::test]
async fn test_manual_reconnect_does_not_auto_disable() {
    let h = harness(vec![config("flaky")]);
    h.connector.set("flaky", Behavior::Fail);

    assert!(h.supervisor.reconnect_server("flaky").await.is_err());

    let status = h.supervisor.get_server_status("flaky").await;
    assert_eq!(status.status.label(), "error");
    assert!(h.store.snapshot().await[0].enabled);
}

#[tokio::test]
async fn test_enabling_server_connects_and_discovers() {
    let fs = config("fs").with_enabled(false);
    let h = harness(vec![fs.clone()]);
    h.connector
        .set("fs", Behavior::Serve(ServerScript::with_tools(&["read", "write"])));

    h.supervisor
        .update_server_config(fs.with_enabled(true))
        .await
        .unwrap();

    assert_eq!(h.emitter.status_trail("fs"), vec!["idle", "connecting", "connected"]);
    assert!(h.supervisor.is_server_connected("fs").await);
    assert_eq!(h.supervisor.get_enabled_tools().await.len(), 2);
    assert_eq!(h.supervisor.get_server_status("fs").await.tool_count, 2);

    let schemas = h.supervisor.get_enabled_tools_as_function_schema().await;
    assert_eq!(schemas[0]["type"], "function");
    assert_eq!(schemas[0]["function"]["name"], "read");
}

#[tokio::test]
async fn test_disabling_server_disconnects_and_hides_tools() {
    let fs = config("fs");
    let h = harness(vec![fs.clone()]);
    h.connector
        .set("fs", Behavior::Serve(ServerScript::with_tools(&["read"])));
    h.supervisor.connect_to_server(&fs).await.unwrap();

    h.supervisor
        .update_server_config(fs.with_enabled(false))
        .await
        .unwrap();

    assert!(!h.supervisor.is_server_connected("fs").await);
    assert!(h.supervisor.get_enabled_tools().await.is_empty());
    assert_eq!(
        h.supervisor.get_server_status("fs").await.status,
        ServerStatus::Disabled
    );
}

#[tokio::test]
async fn test_execute_on_disconnected_server_is_tool_not_found() {
    let fs = config("fs");
    let h = harness(vec![fs.clone()]);
    h.connector
        .set("fs", Behavior::Serve(ServerScript::with_tools(&["read"])));
    h.supervisor.connect_to_server(&fs).await.unwrap();

    h.supervisor.disconnect_server("fs").await;

    let result = h.supervisor.execute_tool("read", json!({"query": "x"})).await;
    assert!(matches!(result, Err(McpError::ToolNotFound(name)) if name == "read"));
    assert_eq!(
        h.supervisor.get_server_status("fs").await.status,
        ServerStatus::Idle
    );
}

#[tokio::test]
async fn test_execute_tool_routes_by_name() {
    let fs = config("fs");
    let web = config("web");
    let h = harness(vec![fs, web]);
    h.connector
        .set("fs", Behavior::Serve(ServerScript::with_tools(&["read"])));
    h.connector
        .set("web", Behavior::Serve(ServerScript::with_tools(&["fetch"])));

    assert!(h.supervisor.connect_to_all_enabled_servers().await.is_empty());
    assert_eq!(h.supervisor.get_connected_server_count().await, 2);

    let text = h
        .supervisor
        .execute_tool("fetch", json!({"query": "rust"}))
        .await
        .unwrap();
    assert_eq!(text, r#"fetch {"query":"rust"}"#);

    let text = h
        .supervisor
        .execute_server_tool("fs", "read", json!({"query": "a"}))
        .await
        .unwrap();
    assert!(text.starts_with("read "));

    let missing = h
        .supervisor
        .execute_server_tool("web", "read", json!({}))
        .await;
    assert!(matches!(missing, Err(McpError::ToolNotFound(_))));
}

#[tokio::test]
async fn test_connect_all_reports_failures() {
    let h = harness(vec![config("good"), config("bad")]);
    h.connector
        .set("good", Behavior::Serve(ServerScript::with_tools(&["ping"])));
    h.connector.set("bad", Behavior::Fail);

    let failures = h.supervisor.connect_to_all_enabled_servers().await;

    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, "bad");
    assert!(h.supervisor.is_server_connected("good").await);
}

#[tokio::test]
async fn test_rediscovery_replaces_catalog() {
    let fs = config("fs");
    let h = harness(vec![fs.clone()]);
    let script = ServerScript::with_tools(&["read", "write"]);
    h.connector.set("fs", Behavior::Serve(Arc::clone(&script)));
    h.supervisor.connect_to_server(&fs).await.unwrap();

    script.set_tools(&["list"]);
    h.supervisor.discover_tools("fs").await;

    let names: Vec<String> = h
        .supervisor
        .get_tools_by_server("fs")
        .await
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["list"]);
    assert_eq!(h.supervisor.get_server_status("fs").await.tool_count, 1);

    script.set_tools(&["list", "stat"]);
    h.supervisor.discover_all_tools().await;
    assert_eq!(h.supervisor.get_enabled_tools().await.len(), 2);
}

#[tokio::test]
async fn test_concurrent_calls_complete_out_of_order() {
    let fs = config("fs");
    let h = harness(vec![fs.clone()]);
    let script = ServerScript::with_tools(&["slow", "fast"]);
    script.delay("slow", Duration::from_millis(300));
    h.connector.set("fs", Behavior::Serve(script));
    h.supervisor.connect_to_server(&fs).await.unwrap();

    let slow = async {
        let text = h.supervisor.execute_tool("slow", json!({"query": "1"})).await;
        (text, Instant::now())
    };
    let fast = async {
        let text = h.supervisor.execute_tool("fast", json!({"query": "2"})).await;
        (text, Instant::now())
    };
    let ((slow_text, slow_done), (fast_text, fast_done)) = tokio::join!(slow, fast);

    assert_eq!(slow_text.unwrap(), r#"slow {"query":"1"}"#);
    assert_eq!(fast_text.unwrap(), r#"fast {"query":"2"}"#);
    assert!(fast_done < slow_done);
}

#[tokio::test]
async fn test_execution_timeout() {
    let fs = config("fs");
    let settings = SupervisorSettings {
        execution_timeout: Duration::from_millis(100),
        ..fast_settings()
    };
    let h = harness_with(vec![fs.clone()], settings);
    let script = ServerScript::with_tools(&["hang"]);
    script.delay("hang", Duration::from_secs(5));
    h.connector.set("fs", Behavior::Serve(script));
    h.supervisor.connect_to_server(&fs).await.unwrap();

    let result = h.supervisor.execute_tool("hang", json!({})).await;

    assert!(matches!(result, Err(McpError::ExecutionTimedOut)));
    // A slow tool is not a dead server
    assert!(h.supervisor.is_server_connected("fs").await);
}

#[tokio::test]
async fn test_tool_without_input_schema_is_skipped() {
    let fs = config("fs");
    let h = harness(vec![fs.clone()]);
    let script = ServerScript::with_tools(&[]);
    script.set_raw_tools(vec![
        tool_descriptor("good"),
        json!({"name": "bad", "description": "no schema"}),
    ]);
    h.connector.set("fs", Behavior::Serve(script));

    h.supervisor.connect_to_server(&fs).await.unwrap();

    let tools = h.supervisor.get_tools_by_server("fs").await;
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "good");
}

#[tokio::test]
async fn test_crashed_server_is_reconnected() {
    let fs = config("fs");
    let h = harness(vec![fs.clone()]);
    h.connector
        .set("fs", Behavior::Serve(ServerScript::with_tools(&["read"])));
    h.supervisor.connect_to_server(&fs).await.unwrap();

    h.connector.kill("fs");

    let connector = Arc::clone(&h.connector);
    let supervisor = h.supervisor.clone();
    let reconnected = eventually(|| {
        let connector = Arc::clone(&connector);
        let supervisor = supervisor.clone();
        async move {
            connector.attempts("fs") == 2 && supervisor.get_enabled_tools().await.len() == 1
        }
    })
    .await;

    assert!(reconnected);
    assert!(h.emitter.status_trail("fs").contains(&"reconnecting".to_string()));
    assert_eq!(
        h.supervisor.get_server_status("fs").await.status,
        ServerStatus::Connected
    );
}

#[tokio::test]
async fn test_server_exiting_before_registration_is_reconnected() {
    let fs = config("fs");
    let settings = SupervisorSettings {
        reconnect_delay: Duration::from_millis(300),
        ..fast_settings()
    };
    let h = harness_with(vec![fs.clone()], settings);
    let script = ServerScript::with_tools(&["read"]);
    h.connector
        .set("fs", Behavior::ExitAfterHandshake(Arc::clone(&script)));

    h.supervisor.connect_to_server(&fs).await.unwrap();

    let status = h.supervisor.get_server_status("fs").await;
    assert_eq!(status.status, ServerStatus::Reconnecting);
    assert!(status.last_error.is_some());
    assert!(!h.supervisor.is_server_connected("fs").await);
    assert_eq!(h.supervisor.get_connected_server_count().await, 0);
    assert!(h.supervisor.get_enabled_tools().await.is_empty());

    h.connector.set("fs", Behavior::Serve(script));

    let supervisor = h.supervisor.clone();
    let reconnected = eventually(|| {
        let supervisor = supervisor.clone();
        async move {
            supervisor.is_server_connected("fs").await
                && supervisor.get_enabled_tools().await.len() == 1
        }
    })
    .await;
    assert!(reconnected);
    assert_eq!(h.connector.attempts("fs"), 2);
}

#[tokio::test]
async fn test_disabling_during_failing_connect_ends_disabled() {
    let fs = config("fs");
    let h = harness(vec![fs.clone()]);
    h.connector.set("fs", Behavior::Fail);
    h.connector.delay_connect("fs", Duration::from_millis(100));

    let connecting = {
        let supervisor = h.supervisor.clone();
        let fs = fs.clone();
        tokio::spawn(async move { supervisor.connect_to_server(&fs).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.supervisor
        .update_server_config(fs.with_enabled(false))
        .await
        .unwrap();

    assert!(connecting.await.unwrap().is_err());

    let status = h.supervisor.get_server_status("fs").await;
    assert_eq!(status.status, ServerStatus::Disabled);
    assert!(status.last_error.is_some());
    assert!(!h.emitter.events().iter().any(|e| matches!(
        e,
        SupervisorEvent::ServerAutoDisabled { .. }
    )));
}

#[tokio::test]
async fn test_overlapping_connects_share_one_attempt() {
    let fs = config("fs");
    let h = harness(vec![fs.clone()]);
    h.connector
        .set("fs", Behavior::Serve(ServerScript::with_tools(&["read"])));
    h.connector.delay_connect("fs", Duration::from_millis(100));

    let (first, second) = tokio::join!(
        h.supervisor.connect_to_server(&fs),
        h.supervisor.connect_to_server(&fs)
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(h.connector.attempts("fs"), 1);
    assert!(h.supervisor.is_server_connected("fs").await);
    assert_eq!(h.supervisor.get_enabled_tools().await.len(), 1);
}

#[tokio::test]
async fn test_pending_reconnect_respects_disable() {
    let fs = config("fs");
    let settings = SupervisorSettings {
        reconnect_delay: Duration::from_millis(200),
        ..fast_settings()
    };
    let h = harness_with(vec![fs.clone()], settings);
    h.connector
        .set("fs", Behavior::Serve(ServerScript::with_tools(&["read"])));
    h.supervisor.connect_to_server(&fs).await.unwrap();

    h.connector.kill("fs");
    let supervisor = h.supervisor.clone();
    let reconnecting = eventually(|| {
        let supervisor = supervisor.clone();
        async move {
            supervisor.get_server_status("fs").await.status == ServerStatus::Reconnecting
        }
    })
    .await;
    assert!(reconnecting);

    h.supervisor
        .update_server_config(fs.with_enabled(false))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(h.connector.attempts("fs"), 1);
    assert!(!h.supervisor.is_server_connected("fs").await);
    assert_eq!(
        h.supervisor.get_server_status("fs").await.status,
        ServerStatus::Disabled
    );
}

#[tokio::test(start_paused = true)]
async fn test_retries_wait_as_backoff_policy_says() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::clone(&seen);
    let settings = SupervisorSettings {
        backoff: BackoffPolicy::from_fn(move |attempt| {
            recorder.lock().unwrap().push(attempt);
            Duration::from_secs(u64::from(attempt))
        }),
        ..fast_settings()
    };
    let broken = config("broken");
    let h = harness_with(vec![broken.clone()], settings);
    h.connector.set("broken", Behavior::Fail);

    let started = tokio::time::Instant::now();
    assert!(h.supervisor.connect_to_server(&broken).await.is_err());

    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert_eq!(h.connector.attempts("broken"), 3);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test]
async fn test_crash_schedules_a_single_reconnect() {
    let fs = config("fs");
    let settings = SupervisorSettings {
        reconnect_delay: Duration::from_millis(150),
        ..fast_settings()
    };
    let h = harness_with(vec![fs.clone()], settings);
    h.connector
        .set("fs", Behavior::Serve(ServerScript::with_tools(&["read"])));
    h.supervisor.connect_to_server(&fs).await.unwrap();

    h.connector.kill("fs");
    let supervisor = h.supervisor.clone();
    let reconnecting = eventually(|| {
        let supervisor = supervisor.clone();
        async move {
            supervisor.get_server_status("fs").await.status == ServerStatus::Reconnecting
        }
    })
    .await;
    assert!(reconnecting);

    // A manual reconnect replaces the scheduled one
    h.supervisor.reconnect_server("fs").await.unwrap();
    assert_eq!(h.connector.attempts("fs"), 2);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.connector.attempts("fs"), 2);
    assert!(h.supervisor.is_server_connected("fs").await);
}

#[tokio::test]
async fn test_rename_restarts_under_new_name() {
    let fs = config("fs");
    let h = harness(vec![fs.clone()]);
    let script = ServerScript::with_tools(&["read"]);
    h.connector.set("fs", Behavior::Serve(Arc::clone(&script)));
    h.connector.set("files", Behavior::Serve(script));
    h.supervisor.connect_to_server(&fs).await.unwrap();

    let renamed = ServerConfig {
        name: "files".to_string(),
        ..fs
    };
    h.supervisor.update_server_config(renamed).await.unwrap();

    assert!(!h.supervisor.is_server_connected("fs").await);
    assert!(h.supervisor.is_server_connected("files").await);
    assert!(h.supervisor.get_tools_by_server("fs").await.is_empty());
    assert_eq!(h.supervisor.get_tools_by_server("files").await.len(), 1);
    assert!(h.emitter.events().iter().any(|e| matches!(
        e,
        SupervisorEvent::ServerRemoved { server_name } if server_name == "fs"
    )));
}

#[tokio::test]
async fn test_add_and_remove_server() {
    let h = harness(vec![]);
    h.connector
        .set("fs", Behavior::Serve(ServerScript::with_tools(&["read"])));

    let fs = config("fs");
    h.supervisor.add_server_config(fs.clone()).await.unwrap();
    assert!(h.supervisor.is_server_connected("fs").await);
    assert_eq!(h.store.snapshot().await.len(), 1);

    let duplicate = h.supervisor.add_server_config(config("fs")).await;
    assert!(matches!(duplicate, Err(McpError::DuplicateServer(_))));

    h.supervisor.remove_server_config(&fs.id).await.unwrap();
    assert!(h.supervisor.server_configs().await.is_empty());
    assert!(h.supervisor.get_enabled_tools().await.is_empty());
    assert!(h.store.snapshot().await.is_empty());

    let unknown = h.supervisor.remove_server_config(&fs.id).await;
    assert!(matches!(unknown, Err(McpError::UnknownServer(_))));
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let h = harness(vec![]);
    let result = h
        .supervisor
        .add_server_config(ServerConfig::new("fs", "npx -y fs-server", vec![]))
        .await;

    assert!(matches!(result, Err(McpError::InvalidConfig(_))));
    assert!(h.supervisor.server_configs().await.is_empty());
}

#[tokio::test]
async fn test_shutdown_disconnects_everything() {
    let h = harness(vec![config("a"), config("b")]);
    h.connector
        .set("a", Behavior::Serve(ServerScript::with_tools(&["x"])));
    h.connector
        .set("b", Behavior::Serve(ServerScript::with_tools(&["y"])));
    h.supervisor.connect_to_all_enabled_servers().await;

    h.supervisor.shutdown().await;

    assert_eq!(h.supervisor.get_connected_server_count().await, 0);
    assert!(h.supervisor.get_enabled_tools().await.is_empty());
}

#[tokio::test]
async fn test_connection_check_leaves_catalog_alone() {
    let h = harness(vec![]);
    h.connector
        .set("probe", Behavior::Serve(ServerScript::with_tools(&["a", "b"])));

    let tools = h.supervisor.test_connection(&config("probe")).await.unwrap();

    assert_eq!(tools.len(), 2);
    assert!(h.supervisor.get_enabled_tools().await.is_empty());
    assert!(h.supervisor.get_all_statuses().await.is_empty());
}

mock! {
    Store {}

    #[async_trait]
    impl ServerConfigStore for Store {
        async fn load(&self) -> Result<Vec<ServerConfig>, ConfigStoreError>;
        async fn save(&self, servers: &[ServerConfig]) -> Result<(), ConfigStoreError>;
    }
}

#[tokio::test]
async fn test_adding_disabled_server_saves_once() {
    let mut store = MockStore::new();
    store.expect_load().never();
    store
        .expect_save()
        .withf(|servers| servers.len() == 1 && !servers[0].enabled)
        .times(1)
        .returning(|_| Ok(()));

    let connector = FakeConnector::new();
    let supervisor = Supervisor::with_options(
        vec![],
        Arc::new(store),
        RecordingEmitter::new(),
        fast_settings(),
        connector.clone(),
    );

    supervisor
        .add_server_config(config("fs").with_enabled(false))
        .await
        .unwrap();

    assert_eq!(connector.attempts("fs"), 0);
    assert_eq!(
        supervisor.get_server_status("fs").await.status,
        ServerStatus::Disabled
    );
}
