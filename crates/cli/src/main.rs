mod health;
mod links_commands;

use std::sync::Arc;

use {
    clap::{Parser, Subcommand},
    secrecy::ExposeSecret,
    serenity::all::Http,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use mirrorlink_discord::MirrorHandler;

#[derive(Parser)]
#[command(name = "mirrorlink", about = "Mirrorlink: mirror messages across Discord channels")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to Discord and mirror messages until interrupted.
    Run,
    /// Inspect the persisted link set.
    Links {
        #[command(subcommand)]
        action: links_commands::LinksAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the config file in use, or where a new one would be written.
    Path,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

async fn run() -> anyhow::Result<()> {
    let config = mirrorlink_config::discover_and_load();
    let token = config.discord.resolve_token().ok_or_else(|| {
        anyhow::anyhow!(
            "no Discord token: set discord.token in {} or export {}",
            mirrorlink_config::find_or_default_config_path().display(),
            mirrorlink_config::TOKEN_ENV_VAR
        )
    })?;

    let http = Arc::new(Http::new(token.expose_secret()));
    let service = mirrorlink_discord::mirror_service(http, &config);
    let report = service.initialize().await?;
    if !report.rebuild.failed.is_empty() {
        warn!(
            failed = report.rebuild.failed.len(),
            "some linked channels have no webhook"
        );
    }

    let shutdown = CancellationToken::new();
    let health = if config.health.enabled {
        let listener = health::bind(&config.health.bind, config.health.port).await?;
        Some(tokio::spawn(health::serve(
            listener,
            Arc::clone(&service),
            shutdown.clone(),
        )))
    } else {
        None
    };

    let handler = MirrorHandler::new(Arc::clone(&service), config.discord.register_commands);
    let mut client = mirrorlink_discord::build_client(&token, handler).await?;
    let shard_manager = Arc::clone(&client.shard_manager);

    tokio::select! {
        result = client.start() => {
            if let Err(e) = result {
                warn!(error = %e, "discord client stopped");
            }
        },
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received, shutting down");
            shard_manager.shutdown_all().await;
        },
    }

    service.shutdown().await;
    shutdown.cancel();
    if let Some(health) = health
        && let Err(e) = health.await?
    {
        warn!(error = %e, "health endpoint failed");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "mirrorlink starting");

    match cli.command {
        Commands::Run => run().await,
        Commands::Links { action } => links_commands::handle_links(action).await,
        Commands::Config {
            action: ConfigAction::Path,
        } => {
            println!(
                "{}",
                mirrorlink_config::find_or_default_config_path().display()
            );
            Ok(())
        },
    }
}
