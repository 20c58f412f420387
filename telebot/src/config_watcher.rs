//! Drives the config reload path: once at startup (by the caller), again
//! whenever the rule/chat YAML file changes on disk, and again on the
//! hourly admin-refresh tick. The file-watch half follows the same
//! `notify::recommended_watcher` shape used for watching a live file
//! elsewhere in this codebase.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};

use crate::dispatcher::{Action, Dispatcher};
use crate::state::ModerationState;

const ADMIN_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// Re-read the config file, atomically swap it into the registry, and
/// schedule a `getChat` per surviving chat so admin caches stay fresh. A
/// read or top-level parse failure is logged and the existing registry is
/// left untouched.
pub async fn reload_config(state: &Arc<ModerationState>) {
    let path = &state.settings.config_path;
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) => {
            log::error!("could not read config file '{path}': {e}");
            return;
        }
    };

    let doc = match modbot_core::load_document(&raw) {
        Ok(doc) => doc,
        Err(e) => {
            log::error!("config file '{path}' failed to parse: {e}");
            return;
        }
    };

    let chat_count = doc.chats.len();
    state.registry.replace(doc.chats);
    state.mark_config_dirty();
    log::info!("reloaded config: {chat_count} chats");

    let dispatcher = Dispatcher::new(Arc::clone(state));
    for chat in state.registry.snapshot() {
        dispatcher.submit(Action::GetChat { chat_id: chat.id });
    }
}

/// Watch the directory containing the config file and re-run
/// [`reload_config`] whenever it changes, until `state.stop` fires.
pub async fn watch_config(state: Arc<ModerationState>) {
    let path = state.settings.config_path.clone();
    let watch_dir = Path::new(&path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| Path::new(".").to_path_buf());

    let changed = Arc::new(tokio::sync::Notify::new());
    let changed_in_watcher = Arc::clone(&changed);
    let target_file = path.clone();

    let mut watcher = match notify::recommended_watcher(move |event: Result<notify::Event, notify::Error>| {
        let Ok(event) = event else {
            return;
        };
        if !(event.kind.is_create() || event.kind.is_modify()) {
            return;
        }
        for changed_path in &event.paths {
            if changed_path.ends_with(&target_file) || changed_path.to_string_lossy().ends_with(&target_file) {
                changed_in_watcher.notify_waiters();
                break;
            }
        }
    }) {
        Ok(watcher) => watcher,
        Err(e) => {
            log::error!("failed to create config file watcher: {e}");
            return;
        }
    };

    if let Err(e) = watcher.watch(&watch_dir, RecursiveMode::NonRecursive) {
        log::error!("failed to watch '{}': {e}", watch_dir.display());
        return;
    }

    loop {
        tokio::select! {
            () = changed.notified() => {
                log::debug!("config file changed, reloading");
                reload_config(&state).await;
            }
            () = state.stop.notified() => {
                return;
            }
        }
    }
}

/// Re-invoke [`reload_config`] once per hour until `state.stop` fires.
pub async fn run_admin_refresh_timer(state: Arc<ModerationState>) {
    loop {
        tokio::select! {
            () = tokio::time::sleep(ADMIN_REFRESH_INTERVAL) => {
                log::debug!("hourly admin-refresh tick");
                reload_config(&state).await;
            }
            () = state.stop.notified() => {
                return;
            }
        }
    }
}
