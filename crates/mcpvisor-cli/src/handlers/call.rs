//! `call`: execute one tool and print its text.

use anyhow::{Context, Result, bail};
use mcpvisor_core::McpError;
use serde_json::Value;

use crate::bootstrap::CliContext;
use crate::handlers::connect_enabled;

pub async fn execute(ctx: &CliContext, tool: &str, args: &str, server: Option<&str>) -> Result<()> {
    let arguments = parse_arguments(args)?;

    let supervisor = ctx.supervisor();
    let outcome = match server {
        Some(server_name) => {
            let config = supervisor
                .server_configs()
                .await
                .into_iter()
                .find(|c| c.name == server_name);
            match config {
                Some(config) => match supervisor.connect_to_server(&config).await {
                    Ok(()) => supervisor.execute_server_tool(server_name, tool, arguments).await,
                    Err(e) => Err(e),
                },
                None => Err(McpError::UnknownServer(server_name.to_string())),
            }
        }
        None => {
            connect_enabled(ctx).await;
            supervisor.execute_tool(tool, arguments).await
        }
    };
    supervisor.shutdown().await;

    let text = outcome.with_context(|| format!("Calling '{tool}' failed"))?;
    println!("{text}");
    Ok(())
}

fn parse_arguments(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--args must be valid JSON")?;
    if !(value.is_object() || value.is_null()) {
        bail!("--args must be a JSON object");
    }
    Ok(value)
}
