//! Configuration and follow loop of `prosync-tail`.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, bail};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use prosync_remote::RemoteConfig;
use prosync_sync::{Notice, Source, SyncView, ViewStatus};
use prosync_types::Record;
use prosync_types::api::Credentials;

/// What to follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailTarget {
    Channel(Uuid),
    Board(Uuid),
}

#[derive(Debug, Clone)]
pub enum Backend {
    /// Embedded backend stored in a SQLite file.
    Local(PathBuf),
    Remote(RemoteConfig),
}

#[derive(Debug, Clone)]
pub struct TailConfig {
    pub backend: Backend,
    pub credentials: Credentials,
    pub target: TailTarget,
}

impl TailConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any variable source. `PROSYNC_LOCAL_DB` selects the
    /// embedded backend, otherwise the remote settings are required.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let require = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{} is not set", key))
        };

        let backend = match lookup("PROSYNC_LOCAL_DB").filter(|v| !v.trim().is_empty()) {
            Some(path) => Backend::Local(PathBuf::from(path)),
            None => Backend::Remote(RemoteConfig::from_lookup(&lookup)?),
        };

        let credentials = Credentials {
            email: require("PROSYNC_EMAIL")?,
            password: require("PROSYNC_PASSWORD")?,
        };

        let parse = |key: &'static str, raw: String| {
            Uuid::parse_str(raw.trim()).with_context(|| format!("{} is not a UUID", key))
        };
        let target = match (lookup("PROSYNC_TAIL_CHANNEL"), lookup("PROSYNC_TAIL_BOARD")) {
            (Some(channel), None) => TailTarget::Channel(parse("PROSYNC_TAIL_CHANNEL", channel)?),
            (None, Some(board)) => TailTarget::Board(parse("PROSYNC_TAIL_BOARD", board)?),
            (Some(_), Some(_)) => bail!("set only one of PROSYNC_TAIL_CHANNEL and PROSYNC_TAIL_BOARD"),
            (None, None) => bail!("set PROSYNC_TAIL_CHANNEL or PROSYNC_TAIL_BOARD"),
        };

        Ok(Self {
            backend,
            credentials,
            target,
        })
    }
}

/// Diff successive list states by id, keyed on a one-line description.
#[derive(Debug, Default)]
pub struct ChangeLog {
    seen: HashMap<Uuid, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogLine {
    Added(String),
    Changed(String),
}

impl ChangeLog {
    pub fn diff(&mut self, items: impl IntoIterator<Item = (Uuid, String)>) -> Vec<LogLine> {
        let mut lines = Vec::new();
        for (id, line) in items {
            match self.seen.get(&id) {
                None => lines.push(LogLine::Added(line.clone())),
                Some(previous) if *previous != line => lines.push(LogLine::Changed(line.clone())),
                Some(_) => continue,
            }
            self.seen.insert(id, line);
        }
        lines
    }
}

/// Log a view's records as they change until `stop` resolves.
pub async fn follow<S, F>(
    view: &SyncView<S>,
    notices: &mut mpsc::UnboundedReceiver<Notice>,
    describe: F,
    stop: impl std::future::Future<Output = ()>,
) where
    S: Source,
    F: Fn(&S::Item) -> String,
{
    let status = view.ready().await;
    info!("Following {} ({:?}, {} records)", view.label(), status, view.len());
    if status == ViewStatus::Failed {
        warn!("Initial load failed; showing live changes only");
    }

    let mut log = ChangeLog::default();
    log.diff(view.items().iter().map(|item| (item.id(), describe(item))));

    let mut updates = view.watch();
    tokio::pin!(stop);
    loop {
        tokio::select! {
            _ = &mut stop => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let items = updates.borrow_and_update().clone();
                for line in log.diff(items.iter().map(|item| (item.id(), describe(item)))) {
                    match line {
                        LogLine::Added(text) => info!("+ {}", text),
                        LogLine::Changed(text) => info!("~ {}", text),
                    }
                }
            }
            Some(notice) = notices.recv() => {
                if notice.is_error() {
                    warn!("{}", notice.message);
                }
            }
        }
    }
    info!("Stopped following {}", view.label());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn local_board_config() {
        let board = Uuid::new_v4();
        let board_var = board.to_string();
        let config = TailConfig::from_lookup(vars(&[
            ("PROSYNC_LOCAL_DB", "/tmp/prosync.db"),
            ("PROSYNC_EMAIL", "ada@example.com"),
            ("PROSYNC_PASSWORD", "hunter22"),
            ("PROSYNC_TAIL_BOARD", board_var.as_str()),
        ]))
        .unwrap();

        assert!(matches!(config.backend, Backend::Local(ref p) if p == &PathBuf::from("/tmp/prosync.db")));
        assert_eq!(config.target, TailTarget::Board(board));
        assert_eq!(config.credentials.email, "ada@example.com");
    }

    #[test]
    fn remote_settings_come_from_the_same_source() {
        let config = TailConfig::from_lookup(vars(&[
            ("PROSYNC_URL", "https://demo.example"),
            ("PROSYNC_ANON_KEY", "anon"),
            ("PROSYNC_EMAIL", "ada@example.com"),
            ("PROSYNC_PASSWORD", "hunter22"),
            ("PROSYNC_TAIL_CHANNEL", "6c1b3c2e-8d4f-4a55-9d1e-1f2a3b4c5d6e"),
        ]))
        .unwrap();
        assert!(matches!(config.backend, Backend::Remote(ref r) if r.url == "https://demo.example"));
        assert!(matches!(config.target, TailTarget::Channel(_)));
    }

    #[test]
    fn exactly_one_target() {
        let id = Uuid::new_v4().to_string();
        let base = [
            ("PROSYNC_LOCAL_DB", "/tmp/prosync.db"),
            ("PROSYNC_EMAIL", "ada@example.com"),
            ("PROSYNC_PASSWORD", "hunter22"),
        ];

        assert!(TailConfig::from_lookup(vars(&base)).is_err());

        let mut both = base.to_vec();
        both.push(("PROSYNC_TAIL_CHANNEL", id.as_str()));
        both.push(("PROSYNC_TAIL_BOARD", id.as_str()));
        assert!(TailConfig::from_lookup(vars(&both)).is_err());

        let mut bad = base.to_vec();
        bad.push(("PROSYNC_TAIL_CHANNEL", "general"));
        let err = TailConfig::from_lookup(vars(&bad)).unwrap_err();
        assert!(err.to_string().contains("PROSYNC_TAIL_CHANNEL"));
    }

    #[test]
    fn missing_credentials() {
        let board_var = Uuid::new_v4().to_string();
        let err = TailConfig::from_lookup(vars(&[
            ("PROSYNC_LOCAL_DB", "/tmp/prosync.db"),
            ("PROSYNC_TAIL_BOARD", board_var.as_str()),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("PROSYNC_EMAIL"));
    }

    #[test]
    fn change_log_reports_new_and_edited_only() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let mut log = ChangeLog::default();

        assert_eq!(
            log.diff([(a, "a".to_string())]),
            [LogLine::Added("a".into())]
        );
        assert_eq!(
            log.diff([(a, "a".to_string()), (b, "b".to_string())]),
            [LogLine::Added("b".into())]
        );
        assert_eq!(
            log.diff([(a, "a (edited)".to_string()), (b, "b".to_string())]),
            [LogLine::Changed("a (edited)".into())]
        );
    }
}
