//! CLI entry point.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use mcpvisor_cli::{Cli, CliConfig, Commands, bootstrap, handlers};

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = CliConfig::resolve(cli.config)?;
    let ctx = bootstrap(config).await?;

    match cli.command {
        Commands::Servers => handlers::servers::execute(&ctx).await?,
        Commands::Tools { json } => handlers::tools::execute(&ctx, json).await?,
        Commands::Call { tool, args, server } => {
            handlers::call::execute(&ctx, &tool, &args, server.as_deref()).await?;
        }
        Commands::Add {
            name,
            command,
            args,
            env,
            disabled,
        } => handlers::config::add(&ctx, &name, &command, args, env, disabled).await?,
        Commands::Remove { name } => handlers::config::remove(&ctx, &name).await?,
        Commands::Enable { name } => handlers::config::set_enabled(&ctx, &name, true).await?,
        Commands::Disable { name } => handlers::config::set_enabled(&ctx, &name, false).await?,
    }

    Ok(())
}
