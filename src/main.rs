// coordinator-watch: live summary of a coordination server
//
// Connects, logs a one-line summary on every state change, and disconnects
// cleanly on Ctrl-C.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;

use coordinator_client::types::options::{DEFAULT_POLL_INTERVAL, DEFAULT_SERVER_PACKAGE};
use coordinator_client::{ClientOptions, CoordinatorClient, ServerCommand, StateViews};

#[derive(Parser)]
#[command(
    name = "coordinator-watch",
    version,
    about = "Watch agents, locks, messages and plans of a coordination server"
)]
struct Cli {
    /// Server script to run with node (default: run the npm package with npx)
    #[arg(long, env = "COORD_SERVER_SCRIPT")]
    server_script: Option<PathBuf>,

    /// npm package to run with npx when no script is given
    #[arg(long, env = "COORD_SERVER_PACKAGE", default_value = DEFAULT_SERVER_PACKAGE)]
    package: String,

    /// Polling interval in milliseconds
    #[arg(long, env = "COORD_POLL_MS", default_value_t = DEFAULT_POLL_INTERVAL.as_millis() as u64)]
    poll_interval_ms: u64,

    /// Subscriber id used for event subscription (default: generated)
    #[arg(long, env = "COORD_SUBSCRIBER_ID")]
    subscriber_id: Option<String>,

    /// Working directory for the server process
    #[arg(long, env = "COORD_SERVER_CWD")]
    cwd: Option<PathBuf>,

    /// Refresh once, print the summary and exit
    #[arg(long)]
    once: bool,
}

impl Cli {
    fn options(&self) -> ClientOptions {
        let server = self.server_script.as_ref().map_or_else(
            || ServerCommand::Npx {
                package: self.package.clone(),
            },
            |script| ServerCommand::Node {
                script: script.clone(),
            },
        );

        let mut builder = ClientOptions::builder()
            .server(server)
            .poll_interval(Duration::from_millis(self.poll_interval_ms));
        if let Some(id) = &self.subscriber_id {
            builder = builder.subscriber_id(id.as_str());
        }
        if let Some(cwd) = &self.cwd {
            builder = builder.cwd(cwd);
        }
        builder.build()
    }
}

fn summary(views: &StateViews) -> String {
    let locks = views.lock_partition();
    format!(
        "agents={} locks={} active/{} expired messages={} ({} unread) plans={}",
        views.agent_count(),
        locks.active.len(),
        locks.expired.len(),
        views.message_count(),
        views.unread_message_count(),
        views.plan_count()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let client = CoordinatorClient::new(cli.options()).context("invalid options")?;

    client
        .connect()
        .await
        .context("failed to connect to the coordination server")?;

    if cli.once {
        println!("{}", summary(client.views()));
        client.disconnect().await;
        return Ok(());
    }

    log::info!("{}", summary(client.views()));
    let mut changes = Box::pin(client.views().changes());
    let mut connection = client.watch_connection();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                log::info!("interrupted, disconnecting");
                break;
            }
            change = changes.next() => {
                let Some(change) = change else { break };
                log::info!("[rev {}] {}", change.revision, summary(client.views()));
            }
            changed = connection.changed() => {
                if changed.is_err() || !client.is_connected() {
                    log::warn!("connection lost");
                    break;
                }
            }
        }
    }

    client.disconnect().await;
    Ok(())
}
