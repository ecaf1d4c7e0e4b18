//! `servers`: connect everything enabled and report.

use anyhow::Result;
use mcpvisor_core::ServerStatusInfo;

use crate::bootstrap::CliContext;
use crate::handlers::connect_enabled;

pub async fn execute(ctx: &CliContext) -> Result<()> {
    connect_enabled(ctx).await;

    let statuses = ctx.supervisor().get_all_statuses().await;
    if statuses.is_empty() {
        println!("No servers configured. Add one with 'mcpvisor add <name> <command>'.");
    }
    for (name, info) in &statuses {
        println!("{}", status_line(name, info));
    }

    ctx.supervisor().shutdown().await;
    Ok(())
}

fn status_line(name: &str, info: &ServerStatusInfo) -> String {
    let mut line = format!("{name:<24} {:<12} {:>3} tools", info.status.label(), info.tool_count);
    if let Some(error) = &info.last_error {
        line.push_str("  (");
        line.push_str(error);
        line.push(')');
    }
    line
}
