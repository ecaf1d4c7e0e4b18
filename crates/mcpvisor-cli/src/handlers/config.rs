//! `add`, `remove`, `enable`, `disable`: edit server definitions.
//!
//! Every edit goes through the supervisor, which validates it and writes the
//! whole list back to the file store.

use anyhow::{Context, Result};
use mcpvisor_core::ServerConfig;

use crate::bootstrap::CliContext;
use crate::handlers::id_of;

pub async fn add(
    ctx: &CliContext,
    name: &str,
    command: &str,
    args: Vec<String>,
    env: Vec<(String, String)>,
    disabled: bool,
) -> Result<()> {
    let config = env
        .into_iter()
        .fold(ServerConfig::new(name, command, args), |config, (key, value)| {
            config.with_env(key, value)
        })
        .with_enabled(!disabled);

    let supervisor = ctx.supervisor();
    supervisor
        .add_server_config(config)
        .await
        .with_context(|| format!("Cannot add server '{name}'"))?;

    let status = supervisor.get_server_status(name).await;
    println!(
        "Added '{name}' ({}, {} tools)",
        status.status, status.tool_count
    );
    supervisor.shutdown().await;
    Ok(())
}

pub async fn remove(ctx: &CliContext, name: &str) -> Result<()> {
    let id = id_of(ctx, name).await?;
    ctx.supervisor().remove_server_config(&id).await?;
    println!("Removed '{name}'");
    Ok(())
}

pub async fn set_enabled(ctx: &CliContext, name: &str, enabled: bool) -> Result<()> {
    let supervisor = ctx.supervisor();
    let config = supervisor
        .server_configs()
        .await
        .into_iter()
        .find(|c| c.name == name)
        .with_context(|| format!("No server named '{name}'"))?;

    supervisor
        .update_server_config(config.with_enabled(enabled))
        .await?;

    let status = supervisor.get_server_status(name).await;
    println!("'{name}' is now {}", status.status);
    supervisor.shutdown().await;
    Ok(())
}
