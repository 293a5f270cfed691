use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use uuid::Uuid;

use prosync_app::tail::{self, Backend, TailConfig, TailTarget};
use prosync_app::{ChatRoom, TaskBoard};
use prosync_db::{LocalBackend, LocalClient};
use prosync_remote::{AuthProvider, HttpRemote, RemoteClient, RemoteError};
use prosync_services::Services;
use prosync_sync::Notifier;
use prosync_types::api::Credentials;
use prosync_types::models::chat::ChatMessage;
use prosync_types::models::tasks::Task;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "prosync=info".into()),
        )
        .init();

    let config = TailConfig::from_env()?;

    match config.backend {
        Backend::Local(path) => {
            let backend = LocalBackend::open(&path)
                .with_context(|| format!("opening {}", path.display()))?;
            let client = backend.client();
            sign_in_or_up(&client, &config.credentials).await?;
            info!("Using local backend at {}", path.display());
            run(Arc::new(client), config.target).await
        }
        Backend::Remote(remote) => {
            info!("Connecting to {}", remote.url);
            let client = HttpRemote::new(remote)?;
            client
                .sign_in(&config.credentials)
                .await
                .context("sign-in failed")?;
            let client = Arc::new(client);
            let result = run(client.clone(), config.target).await;
            if let Err(e) = client.sign_out().await {
                warn!("Sign-out failed: {}", e);
            }
            result
        }
    }
}

/// The embedded backend starts empty, so a first run registers the
/// account.
async fn sign_in_or_up(client: &LocalClient, credentials: &Credentials) -> anyhow::Result<()> {
    match client.sign_in(credentials).await {
        Ok(_) => Ok(()),
        Err(RemoteError::Unauthorized(_)) => {
            info!("Creating local account for {}", credentials.email);
            client.sign_up(credentials).await?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

async fn run<R: RemoteClient>(remote: Arc<R>, target: TailTarget) -> anyhow::Result<()> {
    let (notifier, mut notices) = Notifier::channel();
    let stop = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let services = Services::new(remote);
    match target {
        TailTarget::Channel(channel_id) => {
            let room = ChatRoom::open(services.chat, channel_id, notifier);
            tail::follow(room.view(), &mut notices, describe_message, stop).await;
        }
        TailTarget::Board(board_id) => {
            let board = TaskBoard::open(services.tasks, board_id, notifier);
            tail::follow(board.view(), &mut notices, describe_task, stop).await;
        }
    }
    Ok(())
}

fn describe_message(message: &ChatMessage) -> String {
    let edited = if message.edited { " (edited)" } else { "" };
    format!(
        "{} {}: {}{}",
        message.created_at.format("%H:%M"),
        short_id(message.author_id),
        message.body,
        edited
    )
}

fn describe_task(task: &Task) -> String {
    format!("{} [{}] {}", task.key, task.status.as_str(), task.title)
}

fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
