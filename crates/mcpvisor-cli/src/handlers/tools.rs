//! `tools`: list what enabled servers offer.

use anyhow::Result;
use mcpvisor_core::Tool;

use crate::bootstrap::CliContext;
use crate::handlers::connect_enabled;

pub async fn execute(ctx: &CliContext, json: bool) -> Result<()> {
    connect_enabled(ctx).await;

    if json {
        let schemas = ctx.supervisor().get_enabled_tools_as_function_schema().await;
        println!("{}", serde_json::to_string_pretty(&schemas)?);
    } else {
        let tools = ctx.supervisor().get_enabled_tools().await;
        if tools.is_empty() {
            println!("No tools available.");
        }
        for tool in &tools {
            println!("{}", tool_line(tool));
        }
    }

    ctx.supervisor().shutdown().await;
    Ok(())
}

fn tool_line(tool: &Tool) -> String {
    format!("{}/{} - {}", tool.server_name, tool.name, tool.description)
}
